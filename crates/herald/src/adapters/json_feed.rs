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

//! Generic adapter for feeds published as a JSON array of entries.
//!
//! The endpoint is built from a URL template where `{sub_id}` is replaced by
//! the source's external id. Each entry must carry at least an `id`.

use async_trait::async_trait;
use herald_common::{
    error::{HeraldError, Result},
    message::Message,
    source::{Item, SourceAdapter, SourceRef, SubType},
};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const SUB_ID_PLACEHOLDER: &str = "{sub_id}";

#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl FeedEntry {
    fn into_item(self, source: &SourceRef) -> Item {
        let owner = self
            .author
            .clone()
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| source.sub_user_name.to_owned());

        let mut lines = vec![match &self.title {
            Some(title) => format!("{owner}: {title}"),
            None => format!("{owner} posted an update"),
        }];
        lines.extend(self.text.clone().filter(|t| !t.is_empty()));
        lines.extend(self.url.clone());

        let content = self
            .images
            .into_iter()
            .fold(Message::text(lines.join("\n")), Message::with_image);

        Item {
            external_id: self.id,
            owner_ref: source.sub_id.to_owned(),
            content,
        }
    }
}

pub fn parse_entries(body: &str, source: &SourceRef) -> Result<Vec<Item>> {
    let entries: Vec<FeedEntry> = serde_json::from_str(body)?;
    Ok(entries.into_iter().map(|e| e.into_item(source)).collect())
}

#[derive(Clone)]
pub struct JsonFeedAdapter {
    sub_type: SubType,
    url_template: String,
    agent: ureq::Agent,
}

impl JsonFeedAdapter {
    pub fn new(sub_type: SubType, url_template: &str, timeout: Duration) -> Result<Self> {
        if !url_template.contains(SUB_ID_PLACEHOLDER) {
            return Err(HeraldError::Validation(format!(
                "feed url `{url_template}` has no {SUB_ID_PLACEHOLDER} placeholder"
            )));
        }

        Ok(Self {
            sub_type,
            url_template: url_template.to_owned(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        })
    }

    pub fn url_for(&self, source: &SourceRef) -> String {
        self.url_template.replace(SUB_ID_PLACEHOLDER, &source.sub_id)
    }
}

#[async_trait]
impl SourceAdapter for JsonFeedAdapter {
    fn sub_type(&self) -> SubType {
        self.sub_type
    }

    async fn list_items(&self, source: &SourceRef) -> Result<Vec<Item>> {
        let url = self.url_for(source);
        let agent = self.agent.clone();
        debug!(source = %source, url = %url, "fetching feed");

        let body = tokio::task::spawn_blocking(move || -> Result<String> {
            let response = agent
                .get(&url)
                .set("Accept", "application/json")
                .call()
                .map_err(|err| HeraldError::Source(format!("{url}: {err}")))?;
            Ok(response.into_string()?)
        })
        .await??;

        parse_entries(&body, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceRef {
        SourceRef::new(SubType::SocialFeed, "1001", "Some Artist")
    }

    #[test]
    fn it_should_require_placeholder() {
        let err = JsonFeedAdapter::new(
            SubType::SocialFeed,
            "https://feeds.example.org/all.json",
            Duration::from_secs(5),
        );
        assert!(matches!(err, Err(HeraldError::Validation(_))));
    }

    #[test]
    fn it_should_fill_url_template() {
        let adapter = JsonFeedAdapter::new(
            SubType::SocialFeed,
            "https://feeds.example.org/{sub_id}.json",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            adapter.url_for(&source()),
            "https://feeds.example.org/1001.json"
        );
    }

    #[test]
    fn it_should_render_entries_in_order() {
        let body = r#"[
            {"id": "b", "title": "Sunset", "images": ["https://img.example.org/b.png"]},
            {"id": "a", "author": "Guest", "text": "hello"}
        ]"#;
        let items = parse_entries(body, &source()).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].external_id, "b");
        assert_eq!(items[0].owner_ref, "1001");
        assert_eq!(
            items[0].content.plain_text(),
            "Some Artist: Sunset\n[image: https://img.example.org/b.png]"
        );
        assert_eq!(items[1].content.plain_text(), "Guest posted an update\nhello");
    }

    #[test]
    fn it_should_reject_malformed_bodies() {
        assert!(matches!(
            parse_entries(r#"{"id": 1}"#, &source()),
            Err(HeraldError::Serde(_))
        ));
    }
}
