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

use chrono::{DateTime, Utc};
use herald_common::error::{HeraldError, Result, is_unique_violation};
use sea_orm::*;
use tracing::debug;
use uuid;

use super::entities::{prelude::*, *};

pub async fn get(
    entity_id: &str,
    event: &str,
    db: &DatabaseConnection,
) -> Result<Option<cooldown::Model>> {
    let entry = Cooldown::find()
        .filter(cooldown::Column::EntityId.eq(entity_id))
        .filter(cooldown::Column::Event.eq(event))
        .one(db)
        .await?;

    Ok(entry)
}

pub async fn list_by_entity(
    entity_id: &str,
    db: &DatabaseConnection,
) -> Result<Vec<cooldown::Model>> {
    let entries = Cooldown::find()
        .filter(cooldown::Column::EntityId.eq(entity_id))
        .order_by_asc(cooldown::Column::ExpiredAt)
        .all(db)
        .await?;

    Ok(entries)
}

/// Upsert: replaces any prior expiry for the same event.
pub async fn set(
    entity_id: &str,
    event: &str,
    expired_at: DateTime<Utc>,
    description: Option<&str>,
    db: &DatabaseConnection,
) -> Result<cooldown::Model> {
    if let Some(existing) = get(entity_id, event, db).await? {
        return update(existing, expired_at, description, db).await;
    }

    let to_insert = cooldown::ActiveModel {
        id: ActiveValue::Set(uuid::Uuid::new_v4().to_string()),
        entity_id: ActiveValue::Set(entity_id.to_owned()),
        event: ActiveValue::Set(event.to_owned()),
        expired_at: ActiveValue::Set(expired_at),
        description: ActiveValue::Set(description.map(str::to_owned)),
        ..Default::default()
    };

    match to_insert.insert(db).await {
        Ok(entry) => Ok(entry),
        Err(err) if is_unique_violation(&err) => {
            debug!(entity = %entity_id, event, "cooldown created concurrently");
            let existing = get(entity_id, event, db)
                .await?
                .ok_or_else(|| HeraldError::NotFound(format!("cooldown {event} for {entity_id}")))?;
            update(existing, expired_at, description, db).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn update(
    existing: cooldown::Model,
    expired_at: DateTime<Utc>,
    description: Option<&str>,
    db: &DatabaseConnection,
) -> Result<cooldown::Model> {
    let mut to_update: cooldown::ActiveModel = existing.into();
    to_update.expired_at = ActiveValue::Set(expired_at);
    to_update.description = ActiveValue::Set(description.map(str::to_owned));
    Ok(to_update.update(db).await?)
}

pub async fn delete(entity_id: &str, event: &str, db: &DatabaseConnection) -> Result<u64> {
    let result = Cooldown::delete_many()
        .filter(cooldown::Column::EntityId.eq(entity_id))
        .filter(cooldown::Column::Event.eq(event))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
