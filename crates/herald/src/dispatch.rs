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

//! Fan-out of new items to every subscriber of a source.

use async_trait::async_trait;
use herald_common::{
    error::{Result, TransportError},
    message::{Message, Target},
};
use sea_orm::DatabaseConnection;
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, error, info, warn};

use crate::db::{
    self,
    entities::{chat_entity, subscription_source},
};

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Sends messages on behalf of one bot.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, target: &Target, message: &Message)
    -> std::result::Result<(), TransportError>;
}

/// Live transports keyed by bot self-id. A bot absent here is offline.
#[derive(Clone, Default)]
pub struct BotRegistry {
    bots: Arc<RwLock<HashMap<String, Arc<dyn Transport>>>>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Transport + 'static>(&self, self_id: &str, transport: T) {
        self.bots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self_id.to_owned(), Arc::new(transport));
        info!(bot = self_id, "bot online");
    }

    pub fn unregister(&self, self_id: &str) -> bool {
        let removed = self
            .bots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self_id)
            .is_some();
        if removed {
            info!(bot = self_id, "bot offline");
        }
        removed
    }

    pub fn get(&self, self_id: &str) -> Option<Arc<dyn Transport>> {
        self.bots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(self_id)
            .cloned()
    }

    pub fn is_online(&self, self_id: &str) -> bool {
        self.get(self_id).is_some()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl DispatchReport {
    fn record(&mut self, outcome: Outcome) {
        self.attempted += 1;
        match outcome {
            Outcome::Delivered => self.delivered += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: DispatchReport) {
        self.attempted += other.attempted;
        self.delivered += other.delivered;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Delivered,
    Skipped,
    Failed,
}

#[derive(Clone)]
pub struct Dispatcher {
    db: DatabaseConnection,
    bots: BotRegistry,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(db: DatabaseConnection, bots: BotRegistry) -> Self {
        Self {
            db,
            bots,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn bots(&self) -> &BotRegistry {
        &self.bots
    }

    /// Sends every message to every current subscriber of `source`.
    ///
    /// Each (subscriber, message) pair is attempted on its own and a failed
    /// send never stops the others. Only the subscriber lookup can fail.
    pub async fn notify(
        &self,
        source: &subscription_source::Model,
        messages: &[Message],
    ) -> Result<DispatchReport> {
        if messages.is_empty() {
            return Ok(DispatchReport::default());
        }

        let subscribers = db::subscription::list_entities_by_source(&source.id, &self.db).await?;
        debug!(
            source = %source.sub_id,
            kind = %source.sub_type,
            subscribers = subscribers.len(),
            messages = messages.len(),
            "dispatching"
        );

        Ok(self.deliver_all(&subscribers, messages).await)
    }

    /// Subscribers run concurrently, up to the configured limit. Each one
    /// receives the messages sequentially, in the order given.
    ///
    /// Every subscriber gets its own task, so a panicking transport only
    /// fails that subscriber's sends.
    pub async fn deliver_all(
        &self,
        subscribers: &[chat_entity::Model],
        messages: &[Message],
    ) -> DispatchReport {
        let messages: Arc<[Message]> = Arc::from(messages);
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for entity in subscribers.iter().cloned() {
            let dispatcher = self.clone();
            let messages = messages.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let mut report = DispatchReport::default();
                for message in messages.iter() {
                    report.record(dispatcher.deliver(&entity, message).await);
                }
                report
            });
        }

        let mut total = DispatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => total.merge(report),
                Err(err) => {
                    error!("delivery task aborted: {err}");
                    for _ in messages.iter() {
                        total.record(Outcome::Failed);
                    }
                }
            }
        }
        total
    }

    async fn deliver(&self, entity: &chat_entity::Model, message: &Message) -> Outcome {
        let Some(target) = entity.target() else {
            debug!(entity = %entity.id, kind = %entity.entity_type, "entity is not addressable");
            return Outcome::Skipped;
        };

        let Some(transport) = self.bots.get(&entity.bot_id) else {
            info!(bot = %entity.bot_id, %target, "bot offline, skipping delivery");
            return Outcome::Skipped;
        };

        match transport.send(&target, message).await {
            Ok(()) => Outcome::Delivered,
            Err(err) => {
                match &err {
                    TransportError::Offline(_) => info!(bot = %entity.bot_id, %target, "{err}"),
                    TransportError::Rejected(_) => warn!(bot = %entity.bot_id, %target, "{err}"),
                    TransportError::Network(_) => error!(bot = %entity.bot_id, %target, "{err}"),
                }
                Outcome::Failed
            }
        }
    }
}
