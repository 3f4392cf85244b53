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

use herald_common::error::{HeraldError, Result, is_unique_violation};
use sea_orm::*;
use tracing::debug;
use uuid;

use super::entities::{chat_entity::EntityType, prelude::*, *};
use crate::data::EntityRef;

pub async fn get(
    bot_id: &str,
    parent_id: &str,
    entity_type: EntityType,
    entity_id: &str,
    db: &DatabaseConnection,
) -> Result<Option<chat_entity::Model>> {
    let entry = ChatEntity::find()
        .filter(chat_entity::Column::BotId.eq(bot_id))
        .filter(chat_entity::Column::ParentId.eq(parent_id))
        .filter(chat_entity::Column::EntityType.eq(entity_type))
        .filter(chat_entity::Column::EntityId.eq(entity_id))
        .one(db)
        .await?;

    Ok(entry)
}

pub async fn get_by_ref(
    entity: &EntityRef,
    db: &DatabaseConnection,
) -> Result<Option<chat_entity::Model>> {
    get(
        &entity.bot_id,
        &entity.parent_id,
        entity.entity_type,
        &entity.entity_id,
        db,
    )
    .await
}

pub async fn get_by_id(id: &str, db: &DatabaseConnection) -> Result<Option<chat_entity::Model>> {
    let entry = ChatEntity::find_by_id(id).one(db).await?;

    Ok(entry)
}

pub async fn get_bot(self_id: &str, db: &DatabaseConnection) -> Result<Option<chat_entity::Model>> {
    get(self_id, self_id, EntityType::Bot, self_id, db).await
}

/// Get-or-create for an entity address. A concurrent insert of the same
/// address loses on the unique index and falls back to the stored row.
pub async fn ensure(entity: &EntityRef, db: &DatabaseConnection) -> Result<chat_entity::Model> {
    if let Some(existing) = get_by_ref(entity, db).await? {
        if !entity.entity_name.is_empty() && existing.entity_name != entity.entity_name {
            let mut to_update: chat_entity::ActiveModel = existing.into();
            to_update.entity_name = ActiveValue::Set(entity.entity_name.to_owned());
            return Ok(to_update.update(db).await?);
        }
        return Ok(existing);
    }

    let to_insert = chat_entity::ActiveModel {
        id: ActiveValue::Set(uuid::Uuid::new_v4().to_string()),
        bot_id: ActiveValue::Set(entity.bot_id.to_owned()),
        parent_id: ActiveValue::Set(entity.parent_id.to_owned()),
        entity_type: ActiveValue::Set(entity.entity_type),
        entity_id: ActiveValue::Set(entity.entity_id.to_owned()),
        entity_name: ActiveValue::Set(entity.entity_name.to_owned()),
        ..Default::default()
    };

    match to_insert.insert(db).await {
        Ok(entry) => Ok(entry),
        Err(err) if is_unique_violation(&err) => {
            debug!(
                bot = %entity.bot_id,
                entity = %entity.entity_id,
                "entity created concurrently, re-reading"
            );
            get_by_ref(entity, db).await?.ok_or_else(|| {
                HeraldError::NotFound(format!(
                    "{} {} vanished after insert race",
                    entity.entity_type, entity.entity_id
                ))
            })
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn list_by_bot(
    bot_id: &str,
    limit: Option<u64>,
    offset: Option<u64>,
    db: &DatabaseConnection,
) -> Result<Vec<chat_entity::Model>> {
    let entries = ChatEntity::find()
        .filter(chat_entity::Column::BotId.eq(bot_id))
        .order_by(chat_entity::Column::CreatedAt, Order::Asc)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await?;

    Ok(entries)
}

pub async fn list_by_type(
    bot_id: &str,
    entity_type: EntityType,
    db: &DatabaseConnection,
) -> Result<Vec<chat_entity::Model>> {
    let entries = ChatEntity::find()
        .filter(chat_entity::Column::BotId.eq(bot_id))
        .filter(chat_entity::Column::EntityType.eq(entity_type))
        .all(db)
        .await?;

    Ok(entries)
}
