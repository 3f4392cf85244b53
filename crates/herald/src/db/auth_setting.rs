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

use super::entities::{prelude::*, *};
use crate::data::AuthNode;

pub async fn get(
    entity_id: &str,
    node: &AuthNode,
    db: &DatabaseConnection,
) -> Result<Option<auth_setting::Model>> {
    let entry = AuthSetting::find()
        .filter(auth_setting::Column::EntityId.eq(entity_id))
        .filter(auth_setting::Column::Module.eq(&node.module))
        .filter(auth_setting::Column::Plugin.eq(&node.plugin))
        .filter(auth_setting::Column::Node.eq(&node.node))
        .one(db)
        .await?;

    Ok(entry)
}

pub async fn list_by_entity(
    entity_id: &str,
    db: &DatabaseConnection,
) -> Result<Vec<auth_setting::Model>> {
    let entries = AuthSetting::find()
        .filter(auth_setting::Column::EntityId.eq(entity_id))
        .order_by_asc(auth_setting::Column::Module)
        .order_by_asc(auth_setting::Column::Plugin)
        .order_by_asc(auth_setting::Column::Node)
        .all(db)
        .await?;

    Ok(entries)
}

/// Upsert: overwrites `available` and `value` of an existing node.
pub async fn set(
    entity_id: &str,
    node: &AuthNode,
    available: bool,
    value: Option<&str>,
    db: &DatabaseConnection,
) -> Result<auth_setting::Model> {
    if let Some(existing) = get(entity_id, node, db).await? {
        return update(existing, available, value, db).await;
    }

    let to_insert = auth_setting::ActiveModel {
        id: ActiveValue::Set(uuid::Uuid::new_v4().to_string()),
        entity_id: ActiveValue::Set(entity_id.to_owned()),
        module: ActiveValue::Set(node.module.to_owned()),
        plugin: ActiveValue::Set(node.plugin.to_owned()),
        node: ActiveValue::Set(node.node.to_owned()),
        available: ActiveValue::Set(available as i32),
        value: ActiveValue::Set(value.map(str::to_owned)),
        ..Default::default()
    };

    match to_insert.insert(db).await {
        Ok(entry) => Ok(entry),
        Err(err) if is_unique_violation(&err) => {
            debug!(entity = %entity_id, node = %node.node, "auth node created concurrently");
            let existing = get(entity_id, node, db).await?.ok_or_else(|| {
                HeraldError::NotFound(format!("auth node {} for {entity_id}", node.node))
            })?;
            update(existing, available, value, db).await
        }
        Err(err) => Err(err.into()),
    }
}

async fn update(
    existing: auth_setting::Model,
    available: bool,
    value: Option<&str>,
    db: &DatabaseConnection,
) -> Result<auth_setting::Model> {
    let mut to_update: auth_setting::ActiveModel = existing.into();
    to_update.available = ActiveValue::Set(available as i32);
    to_update.value = ActiveValue::Set(value.map(str::to_owned));
    Ok(to_update.update(db).await?)
}
