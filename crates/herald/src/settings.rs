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

//! Layered configuration: built-in defaults, then a TOML file, then
//! `HERALD_`-prefixed environment variables (`__` separates nested keys).

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use herald_common::{
    error::{HeraldError, Result},
    source::SubType,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::dispatch::DEFAULT_CONCURRENCY;
use crate::scheduler::DEFAULT_SOURCE_CONCURRENCY;

pub const CONFIG_FILE: &str = "herald.toml";
pub const ENV_PREFIX: &str = "HERALD_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSettings {
    pub sub_type: SubType,
    /// Feed endpoint, with `{sub_id}` standing for the source id.
    pub url: String,
    pub interval_secs: u64,
    /// Defaults to the job's position times `stagger_secs`.
    #[serde(default)]
    pub start_delay_secs: Option<u64>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub dispatch_concurrency: Option<usize>,
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the SQLite database file.
    pub database: String,
    pub dispatch_concurrency: usize,
    pub source_concurrency: usize,
    pub stagger_secs: u64,
    /// Self-ids of bots served by the console transport.
    pub bots: Vec<String>,
    pub jobs: Vec<JobSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: default_database(),
            dispatch_concurrency: DEFAULT_CONCURRENCY,
            source_concurrency: DEFAULT_SOURCE_CONCURRENCY,
            stagger_secs: 15,
            bots: Vec::new(),
            jobs: Vec::new(),
        }
    }
}

impl Settings {
    /// Reads `path`, or the per-user config file when none is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        Self::from_figment(Self::figment(path.as_deref()))
    }

    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dispatch_concurrency == 0 || self.source_concurrency == 0 {
            return Err(HeraldError::Validation(
                "concurrency limits must be at least 1".to_owned(),
            ));
        }

        let mut kinds = HashSet::new();
        for job in &self.jobs {
            if job.interval_secs == 0 {
                return Err(HeraldError::Validation(format!(
                    "job {} has a zero interval",
                    job.sub_type
                )));
            }
            if !kinds.insert(job.sub_type) {
                return Err(HeraldError::Validation(format!(
                    "more than one job for {}",
                    job.sub_type
                )));
            }
        }
        Ok(())
    }

    pub fn database_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.database)
    }

    /// Start delay of the job at `index`.
    pub fn start_delay(&self, index: usize) -> Duration {
        let explicit = self.jobs.get(index).and_then(|job| job.start_delay_secs);
        Duration::from_secs(explicit.unwrap_or(self.stagger_secs.saturating_mul(index as u64)))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("tech", "throneless", "herald")
}

pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

pub fn default_database() -> String {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("herald.sqlite"))
        .unwrap_or_else(|| PathBuf::from("herald.sqlite"))
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn it_should_layer_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "herald.toml",
                r#"
                database = "/tmp/herald-test.sqlite"
                bots = ["bot_1"]

                [[jobs]]
                sub_type = "artist_account"
                url = "https://feeds.example.org/{sub_id}.json"
                interval_secs = 60

                [[jobs]]
                sub_type = "live_room"
                url = "https://live.example.org/{sub_id}"
                interval_secs = 30
                start_delay_secs = 5
                "#,
            )?;
            jail.set_env("HERALD_DISPATCH_CONCURRENCY", "2");

            let settings =
                Settings::from_figment(Settings::figment(Some(Path::new("herald.toml"))))
                    .unwrap();
            assert_eq!(settings.database, "/tmp/herald-test.sqlite");
            assert_eq!(settings.dispatch_concurrency, 2);
            assert_eq!(settings.source_concurrency, DEFAULT_SOURCE_CONCURRENCY);
            assert_eq!(settings.jobs.len(), 2);
            assert_eq!(settings.jobs[0].timeout_secs, 10);
            assert_eq!(settings.start_delay(0), Duration::ZERO);
            assert_eq!(settings.start_delay(1), Duration::from_secs(5));
            assert_eq!(
                settings.database_url(),
                "sqlite:///tmp/herald-test.sqlite?mode=rwc"
            );
            Ok(())
        });
    }

    #[test]
    fn it_should_reject_duplicate_jobs() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "herald.toml",
                r#"
                [[jobs]]
                sub_type = "social_feed"
                url = "https://a.example.org/{sub_id}"
                interval_secs = 60

                [[jobs]]
                sub_type = "social_feed"
                url = "https://b.example.org/{sub_id}"
                interval_secs = 60
                "#,
            )?;
            let result = Settings::from_figment(Settings::figment(Some(Path::new("herald.toml"))));
            assert!(matches!(result, Err(HeraldError::Validation(_))));
            Ok(())
        });
    }

    #[test]
    fn it_should_stagger_jobs_without_explicit_delay() {
        let settings = Settings {
            stagger_secs: 20,
            jobs: vec![
                JobSettings {
                    sub_type: SubType::SocialFeed,
                    url: "u/{sub_id}".to_owned(),
                    interval_secs: 60,
                    start_delay_secs: None,
                    timeout_secs: 10,
                    dispatch_concurrency: None,
                },
                JobSettings {
                    sub_type: SubType::LiveRoom,
                    url: "v/{sub_id}".to_owned(),
                    interval_secs: 60,
                    start_delay_secs: None,
                    timeout_secs: 10,
                    dispatch_concurrency: None,
                },
            ],
            ..Default::default()
        };
        assert_eq!(settings.start_delay(0), Duration::ZERO);
        assert_eq!(settings.start_delay(1), Duration::from_secs(20));

        let absurd = Settings {
            stagger_secs: u64::MAX,
            ..settings
        };
        assert_eq!(absurd.start_delay(1), Duration::from_secs(u64::MAX));
        assert_eq!(absurd.start_delay(7), Duration::from_secs(u64::MAX));
    }
}
