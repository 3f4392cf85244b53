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

//! Per-entity facade over the permission, cooldown and subscription stores.

use chrono::{DateTime, Utc};
use herald_common::{
    error::Result,
    source::{SourceRef, SubType},
};
use sea_orm::DatabaseConnection;
use std::time::Duration;

use crate::cooldown;
use crate::data::{AuthNode, CooldownStatus, EntityRef};
use crate::db;
use crate::db::entities::{auth_setting, chat_entity, subscription, subscription_source};
use crate::detect::ChangeDetector;
use crate::entity;
use crate::permission::{self, PermissionQuery};
use crate::scheduler::JobControl;
use crate::subscription::{self as registry, SubscribeOutcome};

/// A registered entity together with the connection its operations use.
#[derive(Clone, Debug)]
pub struct EntityContext {
    entity: chat_entity::Model,
    db: DatabaseConnection,
}

impl EntityContext {
    /// Registers `entity` (and its bot) if needed.
    pub async fn ensure(entity: &EntityRef, db: &DatabaseConnection) -> Result<Self> {
        let entity = entity::ensure_entity(entity, db).await?;
        Ok(Self {
            entity,
            db: db.clone(),
        })
    }

    /// Looks `entity` up without registering it.
    pub async fn lookup(entity: &EntityRef, db: &DatabaseConnection) -> Result<Option<Self>> {
        let entity = db::chat_entity::get_by_ref(entity, db).await?;
        Ok(entity.map(|entity| Self::from_model(entity, db)))
    }

    pub fn from_model(entity: chat_entity::Model, db: &DatabaseConnection) -> Self {
        Self {
            entity,
            db: db.clone(),
        }
    }

    pub fn entity(&self) -> &chat_entity::Model {
        &self.entity
    }

    pub fn id(&self) -> &str {
        &self.entity.id
    }

    pub async fn bot(&self) -> Result<chat_entity::Model> {
        entity::resolve_bot(&self.entity, &self.db).await
    }

    pub async fn check_permission(&self, query: &PermissionQuery) -> bool {
        permission::resolve(self.id(), query, &self.db).await
    }

    pub async fn check_global_permission(&self) -> bool {
        permission::check_global_permission(self.id(), &self.db).await
    }

    pub async fn check_permission_level(&self, level: i32) -> bool {
        permission::check_permission_level(self.id(), level, &self.db).await
    }

    pub async fn check_auth_setting(
        &self,
        module: &str,
        plugin: &str,
        node: &str,
        require_available: bool,
        value: Option<&str>,
    ) -> bool {
        let node = AuthNode::new(module, plugin, node);
        permission::check_auth_setting(self.id(), &node, require_available, value, &self.db).await
    }

    pub async fn get_auth_setting(
        &self,
        module: &str,
        plugin: &str,
        node: &str,
    ) -> Result<Option<auth_setting::Model>> {
        permission::get_auth_setting(self.id(), &AuthNode::new(module, plugin, node), &self.db).await
    }

    pub async fn set_auth_setting(
        &self,
        module: &str,
        plugin: &str,
        node: &str,
        available: bool,
        value: Option<&str>,
    ) -> Result<auth_setting::Model> {
        let node = AuthNode::new(module, plugin, node);
        permission::set_auth_setting(self.id(), &node, available, value, &self.db).await
    }

    pub async fn set_global_permission(&self, enabled: bool) -> Result<auth_setting::Model> {
        permission::set_global_permission(self.id(), enabled, &self.db).await
    }

    pub async fn set_permission_level(&self, level: i32) -> Result<auth_setting::Model> {
        permission::set_permission_level(self.id(), level, &self.db).await
    }

    pub async fn check_cooldown_expired(&self, event: &str) -> CooldownStatus {
        cooldown::check_cooldown_expired(self.id(), event, &self.db).await
    }

    pub async fn set_cooldown(&self, event: &str, duration: Duration) -> Result<DateTime<Utc>> {
        cooldown::set_cooldown(self.id(), event, duration, None, &self.db).await
    }

    pub async fn clear_cooldown(&self, event: &str) -> Result<bool> {
        cooldown::clear_cooldown(self.id(), event, &self.db).await
    }

    pub async fn add_subscription(
        &self,
        source: &SourceRef,
        sub_info: Option<&str>,
    ) -> Result<subscription::Model> {
        registry::add_subscription(self.id(), source, sub_info, &self.db).await
    }

    pub async fn subscribe_with_backfill(
        &self,
        source: &SourceRef,
        sub_info: Option<&str>,
        detector: &ChangeDetector,
        control: Option<&JobControl>,
    ) -> Result<SubscribeOutcome> {
        registry::subscribe_with_backfill(self.id(), source, sub_info, detector, control, &self.db)
            .await
    }

    pub async fn delete_subscription(&self, source: &SourceRef) -> Result<bool> {
        registry::delete_subscription(self.id(), source, &self.db).await
    }

    pub async fn query_subscribed_source(
        &self,
        sub_type: Option<SubType>,
    ) -> Result<Vec<subscription_source::Model>> {
        registry::query_subscribed_source(self.id(), sub_type, &self.db).await
    }
}
