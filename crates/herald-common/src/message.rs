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

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    Text(String),
    Image(String),
}

/// A renderable outbound message, transport agnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub segments: Vec<Segment>,
}

impl Message {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            segments: vec![Segment::Text(text.into())],
        }
    }

    pub fn with_image<S: Into<String>>(mut self, url: S) -> Self {
        self.segments.push(Segment::Image(url.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Text-only rendering, used for logs and plain-text transports.
    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) => t.to_owned(),
                Segment::Image(url) => format!("[image: {url}]"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.plain_text())
    }
}

/// Where a transport should deliver a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Private { user_id: String },
    Group { group_id: String },
    GroupMember { group_id: String, user_id: String },
    GuildChannel { guild_id: String, channel_id: String },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Private { user_id } => write!(f, "user:{user_id}"),
            Target::Group { group_id } => write!(f, "group:{group_id}"),
            Target::GroupMember { group_id, user_id } => {
                write!(f, "group:{group_id}/user:{user_id}")
            }
            Target::GuildChannel {
                guild_id,
                channel_id,
            } => write!(f, "guild:{guild_id}/channel:{channel_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_joins_segments() {
        let msg = Message::text("new artwork").with_image("https://example.org/1.png");
        assert_eq!(
            msg.plain_text(),
            "new artwork\n[image: https://example.org/1.png]"
        );
    }

    #[test]
    fn message_serializes_tagged_segments() {
        let msg = Message::text("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["segments"][0]["type"], "text");
        assert_eq!(json["segments"][0]["data"], "hi");
    }
}
