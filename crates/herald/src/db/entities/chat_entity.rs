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

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use herald_common::error::HeraldError;

/// Closed set of addressable chat targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    #[sea_orm(string_value = "bot")]
    Bot,
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "group")]
    Group,
    #[sea_orm(string_value = "guild_channel")]
    GuildChannel,
    #[sea_orm(string_value = "group_user")]
    GroupUser,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Bot => "bot",
            EntityType::User => "user",
            EntityType::Group => "group",
            EntityType::GuildChannel => "guild_channel",
            EntityType::GroupUser => "group_user",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bot" => Ok(EntityType::Bot),
            "user" => Ok(EntityType::User),
            "group" => Ok(EntityType::Group),
            "guild_channel" => Ok(EntityType::GuildChannel),
            "group_user" => Ok(EntityType::GroupUser),
            other => Err(HeraldError::Validation(format!(
                "{other} is not a valid entity type"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "entity")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub bot_id: String,
    pub parent_id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub entity_name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::auth_setting::Entity")]
    AuthSetting,
    #[sea_orm(has_many = "super::cooldown::Entity")]
    Cooldown,
    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscription,
}

impl Related<super::auth_setting::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthSetting.def()
    }
}

impl Related<super::cooldown::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cooldown.def()
    }
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl Related<super::subscription_source::Entity> for Entity {
    fn to() -> RelationDef {
        super::subscription::Relation::SubscriptionSource.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::subscription::Relation::ChatEntity.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
