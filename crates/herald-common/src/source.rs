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

use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{HeraldError, Result};
use crate::message::Message;

/// Kind of external feed a subscription source points at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum SubType {
    #[sea_orm(string_value = "artist_account")]
    ArtistAccount,
    #[sea_orm(string_value = "social_feed")]
    SocialFeed,
    #[sea_orm(string_value = "live_room")]
    LiveRoom,
    #[sea_orm(string_value = "aggregator")]
    Aggregator,
}

impl SubType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubType::ArtistAccount => "artist_account",
            SubType::SocialFeed => "social_feed",
            SubType::LiveRoom => "live_room",
            SubType::Aggregator => "aggregator",
        }
    }
}

impl fmt::Display for SubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubType {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "artist_account" => Ok(SubType::ArtistAccount),
            "social_feed" => Ok(SubType::SocialFeed),
            "live_room" => Ok(SubType::LiveRoom),
            "aggregator" => Ok(SubType::Aggregator),
            other => Err(HeraldError::Validation(format!(
                "{other} is not a valid subscription type"
            ))),
        }
    }
}

/// Normalized handle to an external feed, independent of its subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub sub_type: SubType,
    pub sub_id: String,
    pub sub_user_name: String,
    pub sub_info: Option<String>,
}

impl SourceRef {
    pub fn new<I: Into<String>, N: Into<String>>(sub_type: SubType, sub_id: I, name: N) -> Self {
        Self {
            sub_type,
            sub_id: sub_id.into(),
            sub_user_name: name.into(),
            sub_info: None,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sub_type, self.sub_id)
    }
}

/// One entry of a remote listing, as produced by a [`SourceAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub external_id: String,
    pub owner_ref: String,
    pub content: Message,
}

impl Item {
    pub fn render(&self) -> Message {
        self.content.clone()
    }
}

/// Produces the current remote listing of one kind of feed.
///
/// Adapters own all protocol and parsing details, including their own
/// timeouts and retries. An empty listing is never taken as a deletion.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn sub_type(&self) -> SubType;

    async fn list_items(&self, source: &SourceRef) -> Result<Vec<Item>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn sub_type_round_trips_through_str() {
        for sub_type in SubType::iter() {
            assert_eq!(sub_type.as_str().parse::<SubType>().unwrap(), sub_type);
        }
        assert!("rss".parse::<SubType>().is_err());
    }

    #[test]
    fn sub_type_matches_stored_value() {
        assert_eq!(SubType::SocialFeed.to_value(), "social_feed".to_owned());
    }
}
