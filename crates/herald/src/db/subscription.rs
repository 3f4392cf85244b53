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

use herald_common::{
    error::{HeraldError, Result, is_unique_violation},
    source::SubType,
};
use sea_orm::*;
use tracing::debug;
use uuid;

use super::entities::{prelude::*, *};

pub async fn get(
    entity_id: &str,
    source_id: &str,
    db: &DatabaseConnection,
) -> Result<Option<subscription::Model>> {
    let entry = Subscription::find()
        .filter(subscription::Column::EntityId.eq(entity_id))
        .filter(subscription::Column::SubscriptionSourceId.eq(source_id))
        .one(db)
        .await?;

    Ok(entry)
}

/// Idempotent: an existing (entity, source) pair only gets its info refreshed.
pub async fn upsert(
    entity_id: &str,
    source_id: &str,
    sub_info: Option<&str>,
    db: &DatabaseConnection,
) -> Result<subscription::Model> {
    if let Some(existing) = get(entity_id, source_id, db).await? {
        return update(existing, sub_info, db).await;
    }

    let to_insert = subscription::ActiveModel {
        id: ActiveValue::Set(uuid::Uuid::new_v4().to_string()),
        entity_id: ActiveValue::Set(entity_id.to_owned()),
        subscription_source_id: ActiveValue::Set(source_id.to_owned()),
        sub_info: ActiveValue::Set(sub_info.map(str::to_owned)),
        ..Default::default()
    };

    match to_insert.insert(db).await {
        Ok(entry) => Ok(entry),
        Err(err) if is_unique_violation(&err) => {
            debug!(entity = %entity_id, source = %source_id, "subscription created concurrently");
            let existing = get(entity_id, source_id, db).await?.ok_or_else(|| {
                HeraldError::NotFound(format!("subscription of {entity_id} to {source_id}"))
            })?;
            update(existing, sub_info, db).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn update(
    existing: subscription::Model,
    sub_info: Option<&str>,
    db: &DatabaseConnection,
) -> Result<subscription::Model> {
    let mut to_update: subscription::ActiveModel = existing.into();
    to_update.sub_info = ActiveValue::Set(sub_info.map(str::to_owned));
    Ok(to_update.update(db).await?)
}

/// Returns the number of removed rows; zero when there was nothing to remove.
pub async fn delete(entity_id: &str, source_id: &str, db: &DatabaseConnection) -> Result<u64> {
    let result = Subscription::delete_many()
        .filter(subscription::Column::EntityId.eq(entity_id))
        .filter(subscription::Column::SubscriptionSourceId.eq(source_id))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

pub async fn list_sources_by_entity(
    entity_id: &str,
    sub_type: Option<SubType>,
    db: &DatabaseConnection,
) -> Result<Vec<subscription_source::Model>> {
    let mut query = SubscriptionSource::find()
        .inner_join(Subscription)
        .filter(subscription::Column::EntityId.eq(entity_id));

    if let Some(sub_type) = sub_type {
        query = query.filter(subscription_source::Column::SubType.eq(sub_type));
    }

    let entries = query
        .order_by_asc(subscription_source::Column::SubType)
        .order_by_asc(subscription_source::Column::SubId)
        .all(db)
        .await?;

    Ok(entries)
}

pub async fn list_entities_by_source(
    source_id: &str,
    db: &DatabaseConnection,
) -> Result<Vec<chat_entity::Model>> {
    let entries = ChatEntity::find()
        .inner_join(Subscription)
        .filter(subscription::Column::SubscriptionSourceId.eq(source_id))
        .order_by_asc(chat_entity::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(entries)
}

pub async fn count_by_source(source_id: &str, db: &DatabaseConnection) -> Result<u64> {
    let count = Subscription::find()
        .filter(subscription::Column::SubscriptionSourceId.eq(source_id))
        .count(db)
        .await?;

    Ok(count)
}
