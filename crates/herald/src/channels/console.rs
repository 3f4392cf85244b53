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

//! Transport that writes deliveries to the log instead of a chat network.
//! Useful for dry runs and for bots whose real connection is not wired up.

use async_trait::async_trait;
use herald_common::{
    error::TransportError,
    message::{Message, Target},
};
use tracing::info;

use crate::dispatch::Transport;

#[derive(Debug, Clone)]
pub struct ConsoleTransport {
    bot_id: String,
}

impl ConsoleTransport {
    pub fn new(bot_id: &str) -> Self {
        Self {
            bot_id: bot_id.to_owned(),
        }
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(
        &self,
        target: &Target,
        message: &Message,
    ) -> std::result::Result<(), TransportError> {
        if message.is_empty() {
            return Err(TransportError::Rejected("empty message".to_owned()));
        }
        info!(bot = %self.bot_id, %target, "{message}");
        Ok(())
    }
}
