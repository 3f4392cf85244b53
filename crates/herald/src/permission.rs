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

//! Permission resolver.
//!
//! An entity passes a check only if every layer the query asks for passes:
//! the global switch, then the numeric level, then an optional auth node.
//! Storage or parse failures deny instead of raising, since callers check
//! speculatively before an entity is known to be registered.

use herald_common::error::{HeraldError, Result};
use sea_orm::DatabaseConnection;
use tracing::{debug, warn};

use crate::data::{AuthNode, EntityRef};
use crate::db::{self, entities::auth_setting};

pub const CORE_MODULE: &str = "herald";
pub const CORE_PLUGIN: &str = "core";
pub const GLOBAL_PERMISSION_NODE: &str = "global_permission";
pub const PERMISSION_LEVEL_NODE: &str = "permission_level";

pub fn global_permission_node() -> AuthNode {
    AuthNode::new(CORE_MODULE, CORE_PLUGIN, GLOBAL_PERMISSION_NODE)
}

pub fn permission_level_node() -> AuthNode {
    AuthNode::new(CORE_MODULE, CORE_PLUGIN, PERMISSION_LEVEL_NODE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCheck {
    pub node: AuthNode,
    /// Deny when no row exists for the node.
    pub require_available: bool,
    /// When set, the stored value must equal it.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionQuery {
    pub global: bool,
    pub level: Option<i32>,
    pub node: Option<NodeCheck>,
}

impl Default for PermissionQuery {
    fn default() -> Self {
        Self {
            global: true,
            level: None,
            node: None,
        }
    }
}

impl PermissionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_global(mut self) -> Self {
        self.global = false;
        self
    }

    pub fn level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn node(mut self, node: AuthNode, require_available: bool) -> Self {
        self.node = Some(NodeCheck {
            node,
            require_available,
            value: None,
        });
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        if let Some(check) = self.node.as_mut() {
            check.value = Some(value.to_owned());
        }
        self
    }
}

/// Evaluates `query` for the stored entity `entity_id`, denying on error.
pub async fn resolve(entity_id: &str, query: &PermissionQuery, db: &DatabaseConnection) -> bool {
    match try_resolve(entity_id, query, db).await {
        Ok(allowed) => allowed,
        Err(err) => {
            warn!(entity = %entity_id, "permission check failed, denying: {err}");
            false
        }
    }
}

/// Like [`resolve`], for an entity that may not have been stored yet.
pub async fn resolve_ref(entity: &EntityRef, query: &PermissionQuery, db: &DatabaseConnection) -> bool {
    match db::chat_entity::get_by_ref(entity, db).await {
        Ok(Some(model)) => resolve(&model.id, query, db).await,
        Ok(None) => {
            debug!(entity = %entity.entity_id, kind = %entity.entity_type, "unregistered entity, denying");
            false
        }
        Err(err) => {
            warn!(entity = %entity.entity_id, "entity lookup failed, denying: {err}");
            false
        }
    }
}

pub async fn try_resolve(
    entity_id: &str,
    query: &PermissionQuery,
    db: &DatabaseConnection,
) -> Result<bool> {
    if db::chat_entity::get_by_id(entity_id, db).await?.is_none() {
        return Err(HeraldError::NotFound(format!("entity {entity_id}")));
    }

    if query.global && !global_enabled(entity_id, db).await? {
        return Ok(false);
    }

    if let Some(required) = query.level {
        if stored_level(entity_id, db).await? < required {
            return Ok(false);
        }
    }

    if let Some(check) = &query.node {
        if !node_allows(entity_id, check, db).await? {
            return Ok(false);
        }
    }

    Ok(true)
}

pub async fn check_global_permission(entity_id: &str, db: &DatabaseConnection) -> bool {
    resolve(entity_id, &PermissionQuery::new(), db).await
}

pub async fn check_permission_level(entity_id: &str, level: i32, db: &DatabaseConnection) -> bool {
    resolve(entity_id, &PermissionQuery::new().ignore_global().level(level), db).await
}

pub async fn check_auth_setting(
    entity_id: &str,
    node: &AuthNode,
    require_available: bool,
    value: Option<&str>,
    db: &DatabaseConnection,
) -> bool {
    let mut query = PermissionQuery::new()
        .ignore_global()
        .node(node.clone(), require_available);
    if let Some(value) = value {
        query = query.value(value);
    }
    resolve(entity_id, &query, db).await
}

pub async fn get_auth_setting(
    entity_id: &str,
    node: &AuthNode,
    db: &DatabaseConnection,
) -> Result<Option<auth_setting::Model>> {
    db::auth_setting::get(entity_id, node, db).await
}

pub async fn list_auth_settings(
    entity_id: &str,
    db: &DatabaseConnection,
) -> Result<Vec<auth_setting::Model>> {
    db::auth_setting::list_by_entity(entity_id, db).await
}

pub async fn set_auth_setting(
    entity_id: &str,
    node: &AuthNode,
    available: bool,
    value: Option<&str>,
    db: &DatabaseConnection,
) -> Result<auth_setting::Model> {
    debug!(entity = %entity_id, module = %node.module, plugin = %node.plugin, node = %node.node, available, "setting auth node");
    db::auth_setting::set(entity_id, node, available, value, db).await
}

pub async fn set_global_permission(
    entity_id: &str,
    enabled: bool,
    db: &DatabaseConnection,
) -> Result<auth_setting::Model> {
    set_auth_setting(entity_id, &global_permission_node(), enabled, None, db).await
}

pub async fn set_permission_level(
    entity_id: &str,
    level: i32,
    db: &DatabaseConnection,
) -> Result<auth_setting::Model> {
    let value = level.to_string();
    set_auth_setting(entity_id, &permission_level_node(), true, Some(&value), db).await
}

// No row means enabled.
async fn global_enabled(entity_id: &str, db: &DatabaseConnection) -> Result<bool> {
    let setting = db::auth_setting::get(entity_id, &global_permission_node(), db).await?;
    Ok(setting.is_none_or(|s| s.available != 0))
}

async fn stored_level(entity_id: &str, db: &DatabaseConnection) -> Result<i32> {
    let setting = db::auth_setting::get(entity_id, &permission_level_node(), db).await?;
    match setting {
        Some(s) if s.available != 0 => match s.value.as_deref() {
            Some(raw) => raw.trim().parse::<i32>().map_err(|_| {
                HeraldError::Validation(format!("permission level `{raw}` is not a number"))
            }),
            None => Ok(0),
        },
        _ => Ok(0),
    }
}

async fn node_allows(entity_id: &str, check: &NodeCheck, db: &DatabaseConnection) -> Result<bool> {
    let Some(setting) = db::auth_setting::get(entity_id, &check.node, db).await? else {
        return Ok(!check.require_available);
    };

    if setting.available == 0 {
        return Ok(false);
    }

    Ok(match &check.value {
        Some(expected) => setting.value.as_deref() == Some(expected.as_str()),
        None => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ensure_entity;
    use crate::utils::get_test_db;
    use quickcheck_macros::quickcheck;

    async fn user(db: &DatabaseConnection) -> String {
        ensure_entity(&EntityRef::user("bot_1", "alice", "Alice"), db)
            .await
            .unwrap()
            .id
    }

    fn feature() -> AuthNode {
        AuthNode::new("herald", "pixiv", "daily_ranking")
    }

    #[tokio::test]
    async fn it_should_follow_the_available_flag() {
        let db = get_test_db().await;
        let id = user(&db).await;

        set_auth_setting(&id, &feature(), true, None, &db).await.unwrap();
        assert!(check_auth_setting(&id, &feature(), true, None, &db).await);

        set_auth_setting(&id, &feature(), false, None, &db).await.unwrap();
        assert!(!check_auth_setting(&id, &feature(), true, None, &db).await);

        assert_eq!(list_auth_settings(&id, &db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn it_should_treat_absent_node_per_require_available() {
        let db = get_test_db().await;
        let id = user(&db).await;

        assert!(!check_auth_setting(&id, &feature(), true, None, &db).await);
        assert!(check_auth_setting(&id, &feature(), false, None, &db).await);
    }

    #[tokio::test]
    async fn it_should_match_node_value() {
        let db = get_test_db().await;
        let id = user(&db).await;

        set_auth_setting(&id, &feature(), true, Some("r18"), &db)
            .await
            .unwrap();
        assert!(check_auth_setting(&id, &feature(), true, Some("r18"), &db).await);
        assert!(!check_auth_setting(&id, &feature(), true, Some("safe"), &db).await);
    }

    #[tokio::test]
    async fn it_should_gate_everything_behind_global_permission() {
        let db = get_test_db().await;
        let id = user(&db).await;
        set_auth_setting(&id, &feature(), true, None, &db).await.unwrap();

        assert!(check_global_permission(&id, &db).await);

        set_global_permission(&id, false, &db).await.unwrap();
        assert!(!check_global_permission(&id, &db).await);

        let query = PermissionQuery::new().node(feature(), true);
        assert!(!resolve(&id, &query, &db).await);
        assert!(resolve(&id, &query.clone().ignore_global(), &db).await);
    }

    #[tokio::test]
    async fn it_should_compare_levels() {
        let db = get_test_db().await;
        let id = user(&db).await;

        assert!(check_permission_level(&id, 0, &db).await);
        assert!(!check_permission_level(&id, 10, &db).await);

        set_permission_level(&id, 30, &db).await.unwrap();
        assert!(check_permission_level(&id, 10, &db).await);
        assert!(check_permission_level(&id, 30, &db).await);
        assert!(!check_permission_level(&id, 31, &db).await);
    }

    #[tokio::test]
    async fn it_should_deny_on_corrupt_level() {
        let db = get_test_db().await;
        let id = user(&db).await;
        set_auth_setting(&id, &permission_level_node(), true, Some("lots"), &db)
            .await
            .unwrap();

        assert!(!check_permission_level(&id, 0, &db).await);
        assert!(matches!(
            try_resolve(&id, &PermissionQuery::new().level(0), &db).await,
            Err(HeraldError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn it_should_deny_unregistered_entities() {
        let db = get_test_db().await;
        let stranger = EntityRef::user("bot_1", "mallory", "");
        assert!(!resolve_ref(&stranger, &PermissionQuery::new(), &db).await);
    }

    #[tokio::test]
    async fn it_should_deny_unknown_entity_ids() {
        let db = get_test_db().await;
        user(&db).await;

        assert!(!check_global_permission("no-such-entity", &db).await);
        assert!(!check_permission_level("no-such-entity", 0, &db).await);
        assert!(!check_auth_setting("no-such-entity", &feature(), false, None, &db).await);
        assert!(matches!(
            try_resolve("no-such-entity", &PermissionQuery::new(), &db).await,
            Err(HeraldError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn it_should_keep_one_row_under_concurrent_setters() {
        let db = get_test_db().await;
        let id = user(&db).await;

        let (f1, f2) = (feature(), feature());
        let (a, b) = tokio::join!(
            set_auth_setting(&id, &f1, true, None, &db),
            set_auth_setting(&id, &f2, false, None, &db),
        );
        assert_eq!(a.unwrap().id, b.unwrap().id);
        assert_eq!(list_auth_settings(&id, &db).await.unwrap().len(), 1);
    }

    #[quickcheck]
    fn last_write_decides(writes: Vec<bool>) -> bool {
        let writes = &writes[..writes.len().min(8)];
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let db = get_test_db().await;
            let id = user(&db).await;
            for available in writes {
                set_auth_setting(&id, &feature(), *available, None, &db)
                    .await
                    .unwrap();
            }
            let allowed = check_auth_setting(&id, &feature(), true, None, &db).await;
            allowed == writes.last().copied().unwrap_or(false)
        })
    }
}
