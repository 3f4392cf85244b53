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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::entities::chat_entity::EntityType;

/// Address of a chat entity, as known before it has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub bot_id: String,
    pub parent_id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub entity_name: String,
}

impl EntityRef {
    pub fn bot(self_id: &str, name: &str) -> Self {
        Self {
            bot_id: self_id.to_owned(),
            parent_id: self_id.to_owned(),
            entity_type: EntityType::Bot,
            entity_id: self_id.to_owned(),
            entity_name: name.to_owned(),
        }
    }

    pub fn user(bot_id: &str, user_id: &str, name: &str) -> Self {
        Self {
            bot_id: bot_id.to_owned(),
            parent_id: bot_id.to_owned(),
            entity_type: EntityType::User,
            entity_id: user_id.to_owned(),
            entity_name: name.to_owned(),
        }
    }

    pub fn group(bot_id: &str, group_id: &str, name: &str) -> Self {
        Self {
            bot_id: bot_id.to_owned(),
            parent_id: bot_id.to_owned(),
            entity_type: EntityType::Group,
            entity_id: group_id.to_owned(),
            entity_name: name.to_owned(),
        }
    }

    pub fn group_user(bot_id: &str, group_id: &str, user_id: &str, name: &str) -> Self {
        Self {
            bot_id: bot_id.to_owned(),
            parent_id: group_id.to_owned(),
            entity_type: EntityType::GroupUser,
            entity_id: user_id.to_owned(),
            entity_name: name.to_owned(),
        }
    }

    pub fn guild_channel(bot_id: &str, guild_id: &str, channel_id: &str, name: &str) -> Self {
        Self {
            bot_id: bot_id.to_owned(),
            parent_id: guild_id.to_owned(),
            entity_type: EntityType::GuildChannel,
            entity_id: channel_id.to_owned(),
            entity_name: name.to_owned(),
        }
    }
}

/// Namespaced auth node, e.g. `("herald", "core", "global_permission")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthNode {
    pub module: String,
    pub plugin: String,
    pub node: String,
}

impl AuthNode {
    pub fn new(module: &str, plugin: &str, node: &str) -> Self {
        Self {
            module: module.to_owned(),
            plugin: plugin.to_owned(),
            node: node.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CooldownStatus {
    pub expired: bool,
    pub expired_at: Option<DateTime<Utc>>,
}

impl CooldownStatus {
    pub fn expired() -> Self {
        Self {
            expired: true,
            expired_at: None,
        }
    }

    /// Remaining time until expiry, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        match self.expired_at {
            Some(at) if at > now => at - now,
            _ => chrono::Duration::zero(),
        }
    }
}
