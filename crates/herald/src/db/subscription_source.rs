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
    source::{SourceRef, SubType},
};
use sea_orm::*;
use tracing::debug;
use uuid;

use super::entities::{prelude::*, *};

pub async fn get(
    sub_type: SubType,
    sub_id: &str,
    db: &DatabaseConnection,
) -> Result<Option<subscription_source::Model>> {
    let entry = SubscriptionSource::find()
        .filter(subscription_source::Column::SubType.eq(sub_type))
        .filter(subscription_source::Column::SubId.eq(sub_id))
        .one(db)
        .await?;

    Ok(entry)
}

pub async fn get_by_id(
    id: &str,
    db: &DatabaseConnection,
) -> Result<Option<subscription_source::Model>> {
    let entry = SubscriptionSource::find_by_id(id).one(db).await?;

    Ok(entry)
}

/// Query, on not-found insert, and re-query if the insert lost a race.
/// Sources are never deleted, so a found row stays valid.
pub async fn get_or_create(
    source: &SourceRef,
    db: &DatabaseConnection,
) -> Result<subscription_source::Model> {
    if let Some(existing) = get(source.sub_type, &source.sub_id, db).await? {
        return Ok(existing);
    }

    let to_insert = subscription_source::ActiveModel {
        id: ActiveValue::Set(uuid::Uuid::new_v4().to_string()),
        sub_type: ActiveValue::Set(source.sub_type),
        sub_id: ActiveValue::Set(source.sub_id.to_owned()),
        sub_user_name: ActiveValue::Set(source.sub_user_name.to_owned()),
        sub_info: ActiveValue::Set(source.sub_info.to_owned()),
        ..Default::default()
    };

    match to_insert.insert(db).await {
        Ok(entry) => Ok(entry),
        Err(err) if is_unique_violation(&err) => {
            debug!(source = %source, "subscription source created concurrently, re-reading");
            get(source.sub_type, &source.sub_id, db)
                .await?
                .ok_or_else(|| HeraldError::NotFound(format!("subscription source {source}")))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn update_info(
    id: &str,
    sub_user_name: &str,
    sub_info: Option<&str>,
    db: &DatabaseConnection,
) -> Result<subscription_source::Model> {
    let Some(existing) = get_by_id(id, db).await? else {
        return Err(HeraldError::NotFound(format!("subscription source {id}")));
    };

    let mut to_update: subscription_source::ActiveModel = existing.into();
    to_update.sub_user_name = ActiveValue::Set(sub_user_name.to_owned());
    to_update.sub_info = ActiveValue::Set(sub_info.map(str::to_owned));
    Ok(to_update.update(db).await?)
}

pub async fn list_by_type(
    sub_type: SubType,
    db: &DatabaseConnection,
) -> Result<Vec<subscription_source::Model>> {
    let entries = SubscriptionSource::find()
        .filter(subscription_source::Column::SubType.eq(sub_type))
        .order_by_asc(subscription_source::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(entries)
}

/// Sources of one type that still have at least one subscriber.
pub async fn list_subscribed(
    sub_type: SubType,
    db: &DatabaseConnection,
) -> Result<Vec<subscription_source::Model>> {
    let entries = SubscriptionSource::find()
        .inner_join(Subscription)
        .filter(subscription_source::Column::SubType.eq(sub_type))
        .distinct()
        .order_by_asc(subscription_source::Column::SubId)
        .all(db)
        .await?;

    Ok(entries)
}
