// Herald
// Copyright (C) 2025 Throneless Tech

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Cooldown ledger: per (entity, event) expiry timestamps.

use chrono::{DateTime, Utc};
use herald_common::error::{HeraldError, Result};
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tracing::{debug, warn};

use crate::data::CooldownStatus;
use crate::db::{self, entities::cooldown};

pub async fn check_cooldown_expired(
    entity_id: &str,
    event: &str,
    db: &DatabaseConnection,
) -> CooldownStatus {
    check_cooldown_expired_at(entity_id, event, Utc::now(), db).await
}

/// An absent row counts as expired. A storage failure counts as not
/// expired, so a broken ledger never lets rate-limited actions through.
pub async fn check_cooldown_expired_at(
    entity_id: &str,
    event: &str,
    now: DateTime<Utc>,
    db: &DatabaseConnection,
) -> CooldownStatus {
    match db::cooldown::get(entity_id, event, db).await {
        Ok(None) => CooldownStatus::expired(),
        Ok(Some(row)) => CooldownStatus {
            expired: now >= row.expired_at,
            expired_at: Some(row.expired_at),
        },
        Err(err) => {
            warn!(entity = %entity_id, event, "cooldown lookup failed: {err}");
            CooldownStatus {
                expired: false,
                expired_at: None,
            }
        }
    }
}

pub async fn set_cooldown(
    entity_id: &str,
    event: &str,
    duration: Duration,
    description: Option<&str>,
    db: &DatabaseConnection,
) -> Result<DateTime<Utc>> {
    set_cooldown_at(entity_id, event, duration, description, Utc::now(), db).await
}

/// Records `now + duration` as the expiry, replacing any earlier one.
pub async fn set_cooldown_at(
    entity_id: &str,
    event: &str,
    duration: Duration,
    description: Option<&str>,
    now: DateTime<Utc>,
    db: &DatabaseConnection,
) -> Result<DateTime<Utc>> {
    let delta = chrono::Duration::from_std(duration)
        .map_err(|_| HeraldError::Validation(format!("cooldown of {duration:?} is too long")))?;
    let expired_at = now
        .checked_add_signed(delta)
        .ok_or_else(|| HeraldError::Validation(format!("cooldown of {duration:?} is too long")))?;

    let entry = db::cooldown::set(entity_id, event, expired_at, description, db).await?;
    debug!(entity = %entity_id, event, expired_at = %entry.expired_at, "cooldown set");
    Ok(entry.expired_at)
}

/// Returns whether a cooldown was removed.
pub async fn clear_cooldown(entity_id: &str, event: &str, db: &DatabaseConnection) -> Result<bool> {
    Ok(db::cooldown::delete(entity_id, event, db).await? > 0)
}

pub async fn list_cooldowns(
    entity_id: &str,
    db: &DatabaseConnection,
) -> Result<Vec<cooldown::Model>> {
    db::cooldown::list_by_entity(entity_id, db).await
}
