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

#[cfg(test)]
use crate::db;
#[cfg(test)]
use crate::dispatch::Transport;
#[cfg(test)]
use async_trait::async_trait;
#[cfg(test)]
use herald_common::{
    error::{HeraldError, Result, TransportError},
    message::{Message, Target},
    source::{Item, SourceAdapter, SourceRef, SubType},
};
#[cfg(test)]
use sea_orm::{Database, DatabaseConnection};
#[cfg(test)]
use sea_orm_migration::MigratorTrait;
#[cfg(test)]
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

#[cfg(test)]
pub async fn get_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db::migration::Migrator::refresh(&db).await.unwrap();
    db
}

#[cfg(test)]
pub fn item(id: &str, text: &str) -> Item {
    Item {
        external_id: id.to_owned(),
        owner_ref: "owner".to_owned(),
        content: Message::text(text),
    }
}

/// Adapter serving canned listings keyed by `sub_id`.
#[cfg(test)]
#[derive(Clone)]
pub struct StaticAdapter {
    sub_type: SubType,
    listings: Arc<Mutex<HashMap<String, Vec<Item>>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    panicking: Arc<Mutex<HashSet<String>>>,
    pub calls: Arc<AtomicUsize>,
}

#[cfg(test)]
impl StaticAdapter {
    pub fn new(sub_type: SubType) -> Self {
        Self {
            sub_type,
            listings: Default::default(),
            failing: Default::default(),
            panicking: Default::default(),
            calls: Default::default(),
        }
    }

    pub fn set_items(&self, sub_id: &str, items: Vec<Item>) {
        self.listings
            .lock()
            .unwrap()
            .insert(sub_id.to_owned(), items);
    }

    pub fn fail(&self, sub_id: &str) {
        self.failing.lock().unwrap().insert(sub_id.to_owned());
    }

    pub fn panic_on(&self, sub_id: &str) {
        self.panicking.lock().unwrap().insert(sub_id.to_owned());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn sub_type(&self) -> SubType {
        self.sub_type
    }

    async fn list_items(&self, source: &SourceRef) -> Result<Vec<Item>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let panics = self.panicking.lock().unwrap().contains(&source.sub_id);
        if panics {
            panic!("adapter crashed on {source}");
        }
        if self.failing.lock().unwrap().contains(&source.sub_id) {
            return Err(HeraldError::Source(format!("{source} unreachable")));
        }
        Ok(self
            .listings
            .lock()
            .unwrap()
            .get(&source.sub_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Transport recording every delivery, optionally rejecting some targets.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<(Target, Message)>>>,
    rejected: Arc<Mutex<HashSet<Target>>>,
    panicking: Arc<Mutex<HashSet<Target>>>,
}

#[cfg(test)]
impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self, target: Target) {
        self.rejected.lock().unwrap().insert(target);
    }

    pub fn panic_on(&self, target: Target) {
        self.panicking.lock().unwrap().insert(target);
    }

    pub fn sent(&self) -> Vec<(Target, Message)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, target: &Target) -> Vec<Message> {
        self.sent()
            .into_iter()
            .filter(|(t, _)| t == target)
            .map(|(_, m)| m)
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        target: &Target,
        message: &Message,
    ) -> std::result::Result<(), TransportError> {
        let panics = self.panicking.lock().unwrap().contains(target);
        if panics {
            panic!("transport crashed sending to {target}");
        }
        if self.rejected.lock().unwrap().contains(target) {
            return Err(TransportError::Rejected(format!("{target} blocked the bot")));
        }
        self.sent
            .lock()
            .unwrap()
            .push((target.clone(), message.clone()));
        Ok(())
    }
}
