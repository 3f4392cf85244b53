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

//! Change detection: which items of a remote listing have not been seen.

use herald_common::{
    error::{HeraldError, Result},
    source::{Item, SourceAdapter, SourceRef, SubType},
};
use sea_orm::DatabaseConnection;
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use crate::db;

/// Source adapters keyed by the feed kind they serve.
#[derive(Clone, Default)]
pub struct Adapters {
    inner: HashMap<SubType, Arc<dyn SourceAdapter>>,
}

impl Adapters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any adapter already registered for the same kind.
    pub fn register<A: SourceAdapter + 'static>(&mut self, adapter: A) {
        self.inner.insert(adapter.sub_type(), Arc::new(adapter));
    }

    pub fn get(&self, sub_type: SubType) -> Option<Arc<dyn SourceAdapter>> {
        self.inner.get(&sub_type).cloned()
    }

    pub fn sub_types(&self) -> Vec<SubType> {
        self.inner.keys().copied().collect()
    }
}

#[derive(Clone)]
pub struct ChangeDetector {
    db: DatabaseConnection,
    adapters: Adapters,
}

impl ChangeDetector {
    pub fn new(db: DatabaseConnection, adapters: Adapters) -> Self {
        Self { db, adapters }
    }

    pub fn adapters(&self) -> &Adapters {
        &self.adapters
    }

    pub async fn fetch(&self, source: &SourceRef) -> Result<Vec<Item>> {
        let adapter = self.adapters.get(source.sub_type).ok_or_else(|| {
            HeraldError::NotFound(format!("no adapter for {}", source.sub_type))
        })?;
        adapter.list_items(source).await
    }

    /// Unseen items of the current listing, in listing order.
    pub async fn new_items(&self, source: &SourceRef) -> Result<Vec<Item>> {
        let items = self.fetch(source).await?;
        let fresh = self.filter_unseen(source.sub_type, items).await?;
        debug!(source = %source, count = fresh.len(), "detected new items");
        Ok(fresh)
    }

    /// Drops items already recorded, and repeats within the listing itself.
    pub async fn filter_unseen(&self, sub_type: SubType, items: Vec<Item>) -> Result<Vec<Item>> {
        if items.is_empty() {
            return Ok(items);
        }

        let ids: Vec<String> = items.iter().map(|i| i.external_id.clone()).collect();
        let mut seen = db::seen_item::seen_ids(sub_type, &ids, &self.db).await?;

        Ok(items
            .into_iter()
            .filter(|item| seen.insert(item.external_id.clone()))
            .collect())
    }

    /// Records `item` as seen. Returns false if it already was.
    pub async fn mark_seen(&self, sub_type: SubType, item: &Item) -> Result<bool> {
        db::seen_item::insert(sub_type, item, &self.db).await
    }

    /// Marks the whole current listing of `source` seen without returning
    /// it for dispatch. Returns how many items were newly recorded.
    pub async fn backfill(&self, source: &SourceRef) -> Result<usize> {
        let fresh = self.new_items(source).await?;
        let mut recorded = 0;
        for item in &fresh {
            if self.mark_seen(source.sub_type, item).await? {
                recorded += 1;
            }
        }
        debug!(source = %source, recorded, "backfilled listing");
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{StaticAdapter, get_test_db, item};

    fn detector(db: DatabaseConnection, adapter: &StaticAdapter) -> ChangeDetector {
        let mut adapters = Adapters::new();
        adapters.register(adapter.clone());
        ChangeDetector::new(db, adapters)
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.external_id.as_str()).collect()
    }

    #[tokio::test]
    async fn it_should_return_only_unseen_items() {
        let db = get_test_db().await;
        let adapter = StaticAdapter::new(SubType::ArtistAccount);
        let detector = detector(db, &adapter);
        let source = SourceRef::new(SubType::ArtistAccount, "114514", "artist");

        detector.mark_seen(SubType::ArtistAccount, &item("A", "a")).await.unwrap();
        detector.mark_seen(SubType::ArtistAccount, &item("B", "b")).await.unwrap();
        adapter.set_items("114514", vec![item("A", "a"), item("B", "b"), item("C", "c")]);

        let fresh = detector.new_items(&source).await.unwrap();
        assert_eq!(ids(&fresh), vec!["C"]);
    }

    #[tokio::test]
    async fn it_should_keep_listing_order_and_drop_repeats() {
        let db = get_test_db().await;
        let adapter = StaticAdapter::new(SubType::SocialFeed);
        let detector = detector(db, &adapter);
        let source = SourceRef::new(SubType::SocialFeed, "feed", "");

        adapter.set_items("feed", vec![item("3", ""), item("1", ""), item("3", ""), item("2", "")]);
        let fresh = detector.new_items(&source).await.unwrap();
        assert_eq!(ids(&fresh), vec!["3", "1", "2"]);
    }

    #[tokio::test]
    async fn it_should_scope_seen_ids_by_kind() {
        let db = get_test_db().await;
        let adapter = StaticAdapter::new(SubType::LiveRoom);
        let detector = detector(db, &adapter);

        detector.mark_seen(SubType::SocialFeed, &item("7", "")).await.unwrap();
        adapter.set_items("room", vec![item("7", "")]);

        let fresh = detector
            .new_items(&SourceRef::new(SubType::LiveRoom, "room", ""))
            .await
            .unwrap();
        assert_eq!(ids(&fresh), vec!["7"]);
    }

    #[tokio::test]
    async fn it_should_record_each_item_once() {
        let db = get_test_db().await;
        let adapter = StaticAdapter::new(SubType::Aggregator);
        let detector = detector(db, &adapter);

        assert!(detector.mark_seen(SubType::Aggregator, &item("X", "")).await.unwrap());
        assert!(!detector.mark_seen(SubType::Aggregator, &item("X", "")).await.unwrap());
    }

    #[tokio::test]
    async fn it_should_fail_without_adapter() {
        let db = get_test_db().await;
        let detector = ChangeDetector::new(db, Adapters::new());
        let err = detector
            .new_items(&SourceRef::new(SubType::LiveRoom, "room", ""))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn it_should_backfill_without_returning_items() {
        let db = get_test_db().await;
        let adapter = StaticAdapter::new(SubType::ArtistAccount);
        let detector = detector(db, &adapter);
        let source = SourceRef::new(SubType::ArtistAccount, "1", "");

        adapter.set_items("1", vec![item("A", ""), item("B", "")]);
        assert_eq!(detector.backfill(&source).await.unwrap(), 2);
        assert!(detector.new_items(&source).await.unwrap().is_empty());

        let db = &detector.db;
        assert!(db::seen_item::exists(SubType::ArtistAccount, "A", db).await.unwrap());
        assert_eq!(db::seen_item::count_by_type(SubType::ArtistAccount, db).await.unwrap(), 2);
        assert_eq!(db::seen_item::count_by_type(SubType::LiveRoom, db).await.unwrap(), 0);
    }
}
