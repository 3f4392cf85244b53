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

use herald_common::source::{SourceRef, SubType};
use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize)]
#[sea_orm(table_name = "subscription_source")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sub_type: SubType,
    pub sub_id: String,
    pub sub_user_name: String,
    pub sub_info: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscription,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl Related<super::chat_entity::Entity> for Entity {
    fn to() -> RelationDef {
        super::subscription::Relation::ChatEntity.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::subscription::Relation::SubscriptionSource.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            sub_type: self.sub_type,
            sub_id: self.sub_id.to_owned(),
            sub_user_name: self.sub_user_name.to_owned(),
            sub_info: self.sub_info.to_owned(),
        }
    }
}
