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
    error::{Result, is_unique_violation},
    source::{Item, SubType},
};
use sea_orm::*;
use std::collections::HashSet;
use uuid;

use super::entities::{prelude::*, *};

// Stays well below SQLite's bound-parameter limit.
const ID_CHUNK_SIZE: usize = 500;

/// Which of `item_ids` are already recorded for this feed kind.
pub async fn seen_ids(
    sub_type: SubType,
    item_ids: &[String],
    db: &DatabaseConnection,
) -> Result<HashSet<String>> {
    let mut seen = HashSet::new();

    for chunk in item_ids.chunks(ID_CHUNK_SIZE) {
        let found: Vec<String> = SeenItem::find()
            .select_only()
            .column(seen_item::Column::ItemId)
            .filter(seen_item::Column::SubType.eq(sub_type))
            .filter(seen_item::Column::ItemId.is_in(chunk.iter().cloned()))
            .into_tuple()
            .all(db)
            .await?;
        seen.extend(found);
    }

    Ok(seen)
}

pub async fn exists(sub_type: SubType, item_id: &str, db: &DatabaseConnection) -> Result<bool> {
    let count = SeenItem::find()
        .filter(seen_item::Column::SubType.eq(sub_type))
        .filter(seen_item::Column::ItemId.eq(item_id))
        .count(db)
        .await?;

    Ok(count > 0)
}

/// Insert-if-absent. Returns `false` when the item was already recorded,
/// including when a concurrent writer won the unique index.
pub async fn insert(sub_type: SubType, item: &Item, db: &DatabaseConnection) -> Result<bool> {
    if exists(sub_type, &item.external_id, db).await? {
        return Ok(false);
    }

    let to_insert = seen_item::ActiveModel {
        id: ActiveValue::Set(uuid::Uuid::new_v4().to_string()),
        sub_type: ActiveValue::Set(sub_type),
        item_id: ActiveValue::Set(item.external_id.to_owned()),
        owner_ref: ActiveValue::Set(item.owner_ref.to_owned()),
        content: ActiveValue::Set(serde_json::to_string(&item.content)?),
        ..Default::default()
    };

    match SeenItem::insert(to_insert).exec(db).await {
        Ok(_) => Ok(true),
        Err(err) if is_unique_violation(&err) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

pub async fn count_by_type(sub_type: SubType, db: &DatabaseConnection) -> Result<u64> {
    let count = SeenItem::find()
        .filter(seen_item::Column::SubType.eq(sub_type))
        .count(db)
        .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{get_test_db, item};

    fn row(item_id: &str) -> seen_item::ActiveModel {
        seen_item::ActiveModel {
            id: ActiveValue::Set(uuid::Uuid::new_v4().to_string()),
            sub_type: ActiveValue::Set(SubType::ArtistAccount),
            item_id: ActiveValue::Set(item_id.to_owned()),
            owner_ref: ActiveValue::Set("owner".to_owned()),
            content: ActiveValue::Set("{}".to_owned()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn it_should_classify_duplicate_items_as_unique_violations() {
        let db = get_test_db().await;
        SeenItem::insert(row("A")).exec(&db).await.unwrap();

        let err = SeenItem::insert(row("A")).exec(&db).await.unwrap_err();
        assert!(is_unique_violation(&err));

        assert!(!insert(SubType::ArtistAccount, &item("A", ""), &db).await.unwrap());
        assert_eq!(count_by_type(SubType::ArtistAccount, &db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn it_should_record_racing_inserts_once() {
        let db = get_test_db().await;
        let seen = item("B", "");

        let (a, b, c) = tokio::join!(
            insert(SubType::ArtistAccount, &seen, &db),
            insert(SubType::ArtistAccount, &seen, &db),
            insert(SubType::ArtistAccount, &seen, &db),
        );
        let recorded = [a.unwrap(), b.unwrap(), c.unwrap()];
        assert_eq!(recorded.iter().filter(|r| **r).count(), 1);
        assert_eq!(count_by_type(SubType::ArtistAccount, &db).await.unwrap(), 1);
    }
}
