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

//! Entity store: the ownership hierarchy of addressable chat targets.
//!
//! Every non-bot entity belongs to exactly one bot through `bot_id`, and
//! `parent_id` names the enclosing scope (the bot for users and groups, the
//! group for group members, the guild for guild channels). Entities are
//! created lazily and never deleted.

use herald_common::{
    error::{HeraldError, Result},
    message::Target,
};
use sea_orm::DatabaseConnection;
use tracing::warn;

use crate::data::EntityRef;
use crate::db::{
    self,
    entities::chat_entity::{self, EntityType},
};

// bot > group > group_user is the deepest chain.
const MAX_DEPTH: usize = 4;

pub async fn ensure_bot(
    self_id: &str,
    name: &str,
    db: &DatabaseConnection,
) -> Result<chat_entity::Model> {
    db::chat_entity::ensure(&EntityRef::bot(self_id, name), db).await
}

/// Registers an entity, creating its owning bot first.
pub async fn ensure_entity(
    entity: &EntityRef,
    db: &DatabaseConnection,
) -> Result<chat_entity::Model> {
    if entity.entity_type != EntityType::Bot {
        ensure_bot(&entity.bot_id, "", db).await?;
    }
    if entity.entity_type == EntityType::GroupUser {
        let group = EntityRef::group(&entity.bot_id, &entity.parent_id, "");
        db::chat_entity::ensure(&group, db).await?;
    }
    db::chat_entity::ensure(entity, db).await
}

pub async fn resolve_bot(
    entity: &chat_entity::Model,
    db: &DatabaseConnection,
) -> Result<chat_entity::Model> {
    if entity.entity_type == EntityType::Bot {
        return Ok(entity.clone());
    }
    db::chat_entity::get_bot(&entity.bot_id, db)
        .await?
        .ok_or_else(|| HeraldError::NotFound(format!("bot {} of {}", entity.bot_id, entity.id)))
}

pub async fn parent(
    entity: &chat_entity::Model,
    db: &DatabaseConnection,
) -> Result<Option<chat_entity::Model>> {
    match entity.entity_type {
        EntityType::Bot => Ok(None),
        EntityType::GroupUser => {
            let group = db::chat_entity::get(
                &entity.bot_id,
                &entity.bot_id,
                EntityType::Group,
                &entity.parent_id,
                db,
            )
            .await?;
            match group {
                Some(group) => Ok(Some(group)),
                None => db::chat_entity::get_bot(&entity.bot_id, db).await,
            }
        }
        // Guilds are not entities themselves, so channels hang off the bot.
        EntityType::User | EntityType::Group | EntityType::GuildChannel => {
            db::chat_entity::get_bot(&entity.bot_id, db).await
        }
    }
}

/// Parents of `entity`, nearest first, ending at the bot.
pub async fn ancestors(
    entity: &chat_entity::Model,
    db: &DatabaseConnection,
) -> Result<Vec<chat_entity::Model>> {
    let mut chain = Vec::new();
    let mut current = entity.clone();

    while let Some(next) = parent(&current, db).await? {
        chain.push(next.clone());
        if next.entity_type == EntityType::Bot {
            return Ok(chain);
        }
        if chain.len() >= MAX_DEPTH {
            warn!(entity = %entity.id, "entity hierarchy deeper than expected");
            break;
        }
        current = next;
    }

    if chain.last().map(|e| e.entity_type) != Some(EntityType::Bot)
        && entity.entity_type != EntityType::Bot
    {
        return Err(HeraldError::NotFound(format!(
            "entity {} does not resolve to a bot",
            entity.id
        )));
    }

    Ok(chain)
}

impl chat_entity::Model {
    /// Delivery address for this entity. Bots cannot be sent to.
    pub fn target(&self) -> Option<Target> {
        match self.entity_type {
            EntityType::Bot => None,
            EntityType::User => Some(Target::Private {
                user_id: self.entity_id.to_owned(),
            }),
            EntityType::Group => Some(Target::Group {
                group_id: self.entity_id.to_owned(),
            }),
            EntityType::GroupUser => Some(Target::GroupMember {
                group_id: self.parent_id.to_owned(),
                user_id: self.entity_id.to_owned(),
            }),
            EntityType::GuildChannel => Some(Target::GuildChannel {
                guild_id: self.parent_id.to_owned(),
                channel_id: self.entity_id.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::get_test_db;

    #[tokio::test]
    async fn it_should_create_entities_lazily_once() {
        let db = get_test_db().await;
        let user = EntityRef::user("bot_1", "alice", "Alice");

        let first = ensure_entity(&user, &db).await.unwrap();
        let second = ensure_entity(&user, &db).await.unwrap();
        assert_eq!(first.id, second.id);

        let bots = db::chat_entity::list_by_type("bot_1", EntityType::Bot, &db)
            .await
            .unwrap();
        assert_eq!(bots.len(), 1);

        let all = db::chat_entity::list_by_bot("bot_1", None, None, &db)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn it_should_refresh_entity_name() {
        let db = get_test_db().await;
        ensure_entity(&EntityRef::group("bot_1", "g1", "Old"), &db)
            .await
            .unwrap();
        let renamed = ensure_entity(&EntityRef::group("bot_1", "g1", "New"), &db)
            .await
            .unwrap();
        assert_eq!(renamed.entity_name, "New");

        // An empty name never clobbers a known one.
        let kept = ensure_entity(&EntityRef::group("bot_1", "g1", ""), &db)
            .await
            .unwrap();
        assert_eq!(kept.entity_name, "New");
    }

    #[tokio::test]
    async fn it_should_resolve_every_entity_to_its_bot() {
        let db = get_test_db().await;
        ensure_bot("bot_1", "Herald", &db).await.unwrap();
        let member = ensure_entity(&EntityRef::group_user("bot_1", "g1", "bob", "Bob"), &db)
            .await
            .unwrap();
        let channel = ensure_entity(
            &EntityRef::guild_channel("bot_1", "guild", "general", "#general"),
            &db,
        )
        .await
        .unwrap();

        let bot = resolve_bot(&member, &db).await.unwrap();
        assert_eq!(bot.entity_type, EntityType::Bot);
        assert_eq!(bot.entity_id, "bot_1");
        assert_eq!(resolve_bot(&channel, &db).await.unwrap().id, bot.id);

        let chain = ancestors(&member, &db).await.unwrap();
        let kinds: Vec<_> = chain.iter().map(|e| e.entity_type).collect();
        assert_eq!(kinds, vec![EntityType::Group, EntityType::Bot]);
        assert!(ancestors(&bot, &db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn it_should_keep_same_id_distinct_across_kinds() {
        let db = get_test_db().await;
        let user = ensure_entity(&EntityRef::user("bot_1", "42", "u"), &db)
            .await
            .unwrap();
        let group = ensure_entity(&EntityRef::group("bot_1", "42", "g"), &db)
            .await
            .unwrap();
        assert_ne!(user.id, group.id);
    }

    #[tokio::test]
    async fn it_should_map_kinds_to_targets() {
        let db = get_test_db().await;
        let bot = ensure_bot("bot_1", "Herald", &db).await.unwrap();
        let channel = ensure_entity(&EntityRef::guild_channel("bot_1", "g", "c", "c"), &db)
            .await
            .unwrap();
        assert_eq!(bot.target(), None);
        assert_eq!(
            channel.target(),
            Some(Target::GuildChannel {
                guild_id: "g".to_owned(),
                channel_id: "c".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn it_should_create_one_row_under_concurrent_callers() {
        let db = get_test_db().await;
        let member = EntityRef::group_user("bot_1", "g1", "alice", "");

        let (a, b, c) = tokio::join!(
            ensure_entity(&member, &db),
            ensure_entity(&member, &db),
            ensure_entity(&member, &db),
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(a.id, b.id);
        assert_eq!(b.id, c.id);

        // bot, group and member, each stored once
        let stored = db::chat_entity::list_by_bot("bot_1", None, None, &db)
            .await
            .unwrap();
        assert_eq!(stored.len(), 3);
    }
}
