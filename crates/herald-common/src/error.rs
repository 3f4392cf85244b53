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

use figment;
use sea_orm::{DbErr, SqlErr};
use serde_json::Error as SerdeError;
use std::io;
use thiserror::Error;
use tokio;

/// Failure reported by a transport while delivering a message.
///
/// The kind decides how loudly the dispatcher logs it: an offline bot is
/// routine, a rejected send usually means the bot lost access to the target,
/// and network failures are worth an operator's attention.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Bot `{0}` is not connected")]
    Offline(String),
    #[error("Send rejected: `{0}`")]
    Rejected(String),
    #[error("Network error: `{0}`")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("Not found: `{0}`")]
    NotFound(String),
    #[error("Validation error: `{0}`")]
    Validation(String),
    #[error("Transport error: `{0}`")]
    Transport(#[from] TransportError),
    #[error("Duplicate entry: `{0}`")]
    Duplicate(String),
    #[error("Source error: `{0}`")]
    Source(String),
    #[error("Database error: `{0}`")]
    Db(#[from] DbErr),
    #[error("I/O error: `{0}`")]
    Io(#[from] io::Error),
    #[error("Figment error: `{0}`")]
    Figment(#[from] Box<figment::Error>),
    #[error("Task join error: `{0}`")]
    Join(#[from] tokio::task::JoinError),
    #[error("Serialization/deserialization error")]
    Serde(#[from] SerdeError),
}

impl From<figment::Error> for HeraldError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl HeraldError {
    /// Lift a storage error into the taxonomy, turning unique-constraint
    /// violations into [`HeraldError::Duplicate`].
    pub fn from_db(err: DbErr) -> Self {
        if is_unique_violation(&err) {
            Self::Duplicate(err.to_string())
        } else {
            Self::Db(err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Db(DbErr::RecordNotFound(_))
        )
    }
}

pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub type Result<T> = std::result::Result<T, HeraldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_not_found_counts_as_not_found() {
        let err = HeraldError::from_db(DbErr::RecordNotFound("entity".to_owned()));
        assert!(err.is_not_found());
        assert!(!HeraldError::Validation("level".to_owned()).is_not_found());
    }

    #[test]
    fn transport_errors_convert() {
        let err: HeraldError = TransportError::Offline("bot".to_owned()).into();
        assert!(matches!(err, HeraldError::Transport(TransportError::Offline(_))));
    }
}
