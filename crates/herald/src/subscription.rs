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

//! Subscription registry: which entities follow which sources.

use herald_common::{
    error::Result,
    source::{SourceRef, SubType},
};
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use crate::detect::ChangeDetector;
use crate::db::{
    self,
    entities::{chat_entity, subscription, subscription_source},
};
use crate::scheduler::JobControl;

pub async fn get_or_create_source(
    source: &SourceRef,
    db: &DatabaseConnection,
) -> Result<subscription_source::Model> {
    db::subscription_source::get_or_create(source, db).await
}

pub async fn get_source(
    sub_type: SubType,
    sub_id: &str,
    db: &DatabaseConnection,
) -> Result<Option<subscription_source::Model>> {
    db::subscription_source::get(sub_type, sub_id, db).await
}

pub async fn update_source_info(
    source_id: &str,
    sub_user_name: &str,
    sub_info: Option<&str>,
    db: &DatabaseConnection,
) -> Result<subscription_source::Model> {
    db::subscription_source::update_info(source_id, sub_user_name, sub_info, db).await
}

/// Idempotent. The source is created on first use.
pub async fn add_subscription(
    entity_id: &str,
    source: &SourceRef,
    sub_info: Option<&str>,
    db: &DatabaseConnection,
) -> Result<subscription::Model> {
    let source_model = get_or_create_source(source, db).await?;
    let entry = db::subscription::upsert(entity_id, &source_model.id, sub_info, db).await?;
    info!(entity = %entity_id, source = %source, "subscribed");
    Ok(entry)
}

/// Removes the link only. The source and its seen items stay, so a later
/// subscriber is not flooded with history. Returns whether a link existed.
pub async fn delete_subscription(
    entity_id: &str,
    source: &SourceRef,
    db: &DatabaseConnection,
) -> Result<bool> {
    let Some(source_model) = get_source(source.sub_type, &source.sub_id, db).await? else {
        return Ok(false);
    };
    let removed = db::subscription::delete(entity_id, &source_model.id, db).await? > 0;
    if removed {
        info!(entity = %entity_id, source = %source, "unsubscribed");
    }
    Ok(removed)
}

pub async fn query_subscribed_source(
    entity_id: &str,
    sub_type: Option<SubType>,
    db: &DatabaseConnection,
) -> Result<Vec<subscription_source::Model>> {
    db::subscription::list_sources_by_entity(entity_id, sub_type, db).await
}

pub async fn query_all_entity_subscribed(
    source_id: &str,
    db: &DatabaseConnection,
) -> Result<Vec<chat_entity::Model>> {
    db::subscription::list_entities_by_source(source_id, db).await
}

/// Sources of `sub_type` with at least one subscriber.
pub async fn list_subscribed_sources(
    sub_type: SubType,
    db: &DatabaseConnection,
) -> Result<Vec<subscription_source::Model>> {
    db::subscription_source::list_subscribed(sub_type, db).await
}

pub async fn count_subscriptions(source_id: &str, db: &DatabaseConnection) -> Result<u64> {
    db::subscription::count_by_source(source_id, db).await
}

#[derive(Debug, Clone)]
pub struct SubscribeOutcome {
    pub subscription: subscription::Model,
    pub backfilled: usize,
}

/// Subscribes and marks the source's current listing seen, so the new
/// subscriber only hears about items published from now on.
///
/// The polling job for the source's kind is paused for the duration and
/// resumed whether or not the backfill succeeded, including when the
/// returned future is dropped early.
pub async fn subscribe_with_backfill(
    entity_id: &str,
    source: &SourceRef,
    sub_info: Option<&str>,
    detector: &ChangeDetector,
    control: Option<&JobControl>,
    db: &DatabaseConnection,
) -> Result<SubscribeOutcome> {
    let paused = match control {
        Some(control) => Some(control.paused().await),
        None => None,
    };

    let outcome = backfill_and_subscribe(entity_id, source, sub_info, detector, db).await;
    drop(paused);

    if let Err(err) = &outcome {
        warn!(entity = %entity_id, source = %source, "subscribe with backfill failed: {err}");
    }
    outcome
}

async fn backfill_and_subscribe(
    entity_id: &str,
    source: &SourceRef,
    sub_info: Option<&str>,
    detector: &ChangeDetector,
    db: &DatabaseConnection,
) -> Result<SubscribeOutcome> {
    get_or_create_source(source, db).await?;
    let backfilled = detector.backfill(source).await?;
    let subscription = add_subscription(entity_id, source, sub_info, db).await?;
    Ok(SubscribeOutcome {
        subscription,
        backfilled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EntityRef;
    use crate::detect::Adapters;
    use crate::entity::ensure_entity;
    use crate::utils::{StaticAdapter, get_test_db, item};

    fn pixiv() -> SourceRef {
        SourceRef::new(SubType::ArtistAccount, "114514", "artist")
    }

    async fn entity(id: &str, db: &DatabaseConnection) -> String {
        ensure_entity(&EntityRef::group("bot_1", id, ""), db)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn it_should_keep_one_row_per_pair() {
        let db = get_test_db().await;
        let e = entity("g1", &db).await;

        add_subscription(&e, &pixiv(), None, &db).await.unwrap();
        add_subscription(&e, &pixiv(), Some("r18"), &db).await.unwrap();

        let sources = query_subscribed_source(&e, None, &db).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(count_subscriptions(&sources[0].id, &db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn it_should_share_sources_between_subscribers() {
        let db = get_test_db().await;
        let a = entity("g1", &db).await;
        let b = entity("g2", &db).await;

        add_subscription(&a, &pixiv(), None, &db).await.unwrap();
        add_subscription(&b, &pixiv(), None, &db).await.unwrap();

        let source = get_source(SubType::ArtistAccount, "114514", &db)
            .await
            .unwrap()
            .unwrap();
        let subscribers = query_all_entity_subscribed(&source.id, &db).await.unwrap();
        assert_eq!(subscribers.len(), 2);
    }

    #[tokio::test]
    async fn it_should_filter_by_kind() {
        let db = get_test_db().await;
        let e = entity("g1", &db).await;

        add_subscription(&e, &pixiv(), None, &db).await.unwrap();
        add_subscription(&e, &SourceRef::new(SubType::LiveRoom, "9", "room"), None, &db)
            .await
            .unwrap();

        let live = query_subscribed_source(&e, Some(SubType::LiveRoom), &db)
            .await
            .unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].sub_id, "9");
        assert_eq!(query_subscribed_source(&e, None, &db).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn it_should_keep_source_after_last_unsubscribe() {
        let db = get_test_db().await;
        let e = entity("g1", &db).await;

        add_subscription(&e, &pixiv(), None, &db).await.unwrap();
        assert!(delete_subscription(&e, &pixiv(), &db).await.unwrap());
        assert!(!delete_subscription(&e, &pixiv(), &db).await.unwrap());

        let source = get_source(SubType::ArtistAccount, "114514", &db).await.unwrap();
        assert!(source.is_some());
        assert_eq!(
            db::subscription_source::list_by_type(SubType::ArtistAccount, &db)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(
            list_subscribed_sources(SubType::ArtistAccount, &db)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn it_should_update_source_info() {
        let db = get_test_db().await;
        let source = get_or_create_source(&pixiv(), &db).await.unwrap();
        let updated = update_source_info(&source.id, "renamed", Some("{\"lang\":\"ja\"}"), &db)
            .await
            .unwrap();
        assert_eq!(updated.id, source.id);
        assert_eq!(updated.sub_user_name, "renamed");
        assert_eq!(get_or_create_source(&pixiv(), &db).await.unwrap().sub_user_name, "renamed");
    }

    #[tokio::test]
    async fn it_should_ignore_unknown_source_on_delete() {
        let db = get_test_db().await;
        let e = entity("g1", &db).await;
        assert!(!delete_subscription(&e, &pixiv(), &db).await.unwrap());
    }

    #[tokio::test]
    async fn it_should_not_flood_new_subscribers_with_history() {
        let db = get_test_db().await;
        let adapter = StaticAdapter::new(SubType::ArtistAccount);
        let mut adapters = Adapters::new();
        adapters.register(adapter.clone());
        let detector = ChangeDetector::new(db.clone(), adapters);
        let control = JobControl::new();

        let first = entity("g1", &db).await;
        adapter.set_items("114514", vec![item("1", ""), item("2", "")]);
        let outcome = subscribe_with_backfill(&first, &pixiv(), None, &detector, Some(&control), &db)
            .await
            .unwrap();
        assert_eq!(outcome.backfilled, 2);
        assert!(!control.is_paused());

        delete_subscription(&first, &pixiv(), &db).await.unwrap();

        let second = entity("g2", &db).await;
        adapter.set_items("114514", vec![item("1", ""), item("2", ""), item("3", "")]);
        let outcome = subscribe_with_backfill(&second, &pixiv(), None, &detector, Some(&control), &db)
            .await
            .unwrap();
        assert_eq!(outcome.backfilled, 1);
        assert!(detector.new_items(&pixiv()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn it_should_resume_after_failed_backfill() {
        let db = get_test_db().await;
        let adapter = StaticAdapter::new(SubType::ArtistAccount);
        adapter.fail("114514");
        let mut adapters = Adapters::new();
        adapters.register(adapter);
        let detector = ChangeDetector::new(db.clone(), adapters);
        let control = JobControl::new();
        let e = entity("g1", &db).await;

        let result = subscribe_with_backfill(&e, &pixiv(), None, &detector, Some(&control), &db).await;
        assert!(result.is_err());
        assert!(!control.is_paused());
        assert!(query_subscribed_source(&e, None, &db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn it_should_resume_when_backfill_is_abandoned() {
        let db = get_test_db().await;
        let adapter = StaticAdapter::new(SubType::ArtistAccount);
        let mut adapters = Adapters::new();
        adapters.register(adapter.clone());
        let detector = ChangeDetector::new(db.clone(), adapters);
        let control = JobControl::new();
        let e = entity("g1", &db).await;

        // Hold the cycle lock so the backfill is stuck waiting for the pause.
        let cycle = control.enter().await;
        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            subscribe_with_backfill(&e, &pixiv(), None, &detector, Some(&control), &db),
        )
        .await;
        assert!(abandoned.is_err());
        drop(cycle);

        assert!(!control.is_paused());
        assert_eq!(adapter.call_count(), 0);
        assert!(query_subscribed_source(&e, None, &db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn it_should_create_one_source_under_concurrent_callers() {
        let db = get_test_db().await;

        let (p1, p2, p3) = (pixiv(), pixiv(), pixiv());
        let (a, b, c) = tokio::join!(
            get_or_create_source(&p1, &db),
            get_or_create_source(&p2, &db),
            get_or_create_source(&p3, &db),
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(a.id, b.id);
        assert_eq!(b.id, c.id);
        assert_eq!(
            db::subscription_source::list_by_type(SubType::ArtistAccount, &db)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn it_should_link_once_under_concurrent_subscribes() {
        let db = get_test_db().await;
        let e = entity("g1", &db).await;

        let (p1, p2) = (pixiv(), pixiv());
        let (a, b) = tokio::join!(
            add_subscription(&e, &p1, None, &db),
            add_subscription(&e, &p2, None, &db),
        );
        assert_eq!(a.unwrap().id, b.unwrap().id);
        let source = get_source(SubType::ArtistAccount, "114514", &db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(count_subscriptions(&source.id, &db).await.unwrap(), 1);
    }
}
