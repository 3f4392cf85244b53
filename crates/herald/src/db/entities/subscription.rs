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
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "subscription")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub entity_id: String,
    pub subscription_source_id: String,
    pub sub_info: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chat_entity::Entity",
        from = "Column::EntityId",
        to = "super::chat_entity::Column::Id"
    )]
    ChatEntity,
    #[sea_orm(
        belongs_to = "super::subscription_source::Entity",
        from = "Column::SubscriptionSourceId",
        to = "super::subscription_source::Column::Id"
    )]
    SubscriptionSource,
}

impl Related<super::chat_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChatEntity.def()
    }
}

impl Related<super::subscription_source::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubscriptionSource.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
