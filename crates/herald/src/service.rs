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

//! Assembles the engine from [`Settings`] and runs it until interrupted.

use herald_common::error::Result;
use sea_orm::{Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

use crate::adapters::JsonFeedAdapter;
use crate::channels::ConsoleTransport;
use crate::db;
use crate::detect::{Adapters, ChangeDetector};
use crate::dispatch::{BotRegistry, Dispatcher};
use crate::entity;
use crate::scheduler::{PollJob, Scheduler};
use crate::settings::Settings;

pub struct Herald {
    pub db: DatabaseConnection,
    pub detector: ChangeDetector,
    pub dispatcher: Dispatcher,
    pub scheduler: Scheduler,
}

pub async fn connect(settings: &Settings) -> Result<DatabaseConnection> {
    let db = Database::connect(settings.database_url()).await?;
    db::migration::migrate(&db).await?;
    Ok(db)
}

impl Herald {
    pub fn build(settings: &Settings, db: DatabaseConnection) -> Result<Self> {
        let mut adapters = Adapters::new();
        for job in &settings.jobs {
            adapters.register(JsonFeedAdapter::new(
                job.sub_type,
                &job.url,
                Duration::from_secs(job.timeout_secs),
            )?);
        }

        let bots = BotRegistry::new();
        for bot in &settings.bots {
            bots.register(bot, ConsoleTransport::new(bot));
        }

        let detector = ChangeDetector::new(db.clone(), adapters);
        let dispatcher =
            Dispatcher::new(db.clone(), bots).with_concurrency(settings.dispatch_concurrency);

        let mut scheduler = Scheduler::new();
        for (index, job) in settings.jobs.iter().enumerate() {
            let job_dispatcher = match job.dispatch_concurrency {
                Some(limit) => dispatcher.clone().with_concurrency(limit),
                None => dispatcher.clone(),
            };
            scheduler.add_job(
                PollJob::new(
                    job.sub_type,
                    Duration::from_secs(job.interval_secs),
                    detector.clone(),
                    job_dispatcher,
                    db.clone(),
                )
                .with_start_delay(settings.start_delay(index))
                .with_source_concurrency(settings.source_concurrency),
            );
        }

        Ok(Self {
            db,
            detector,
            dispatcher,
            scheduler,
        })
    }

    /// Registers the configured bots so their entities can be addressed.
    pub async fn register_bots(&self, settings: &Settings) -> Result<()> {
        for bot in &settings.bots {
            entity::ensure_bot(bot, "", &self.db).await?;
        }
        Ok(())
    }
}

pub async fn run(settings: Settings) -> Result<()> {
    let db = connect(&settings).await?;
    let herald = Herald::build(&settings, db)?;
    herald.register_bots(&settings).await?;

    herald.scheduler.start();
    info!(database = %settings.database, "herald is running");

    tokio::signal::ctrl_c().await?;
    info!("interrupted, shutting down");
    herald.scheduler.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::JobSettings;
    use crate::utils::get_test_db;
    use herald_common::source::SubType;

    fn settings() -> Settings {
        Settings {
            bots: vec!["bot_1".to_owned()],
            jobs: vec![JobSettings {
                sub_type: SubType::SocialFeed,
                url: "https://feeds.example.org/{sub_id}.json".to_owned(),
                interval_secs: 60,
                start_delay_secs: None,
                timeout_secs: 5,
                dispatch_concurrency: Some(2),
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn it_should_wire_jobs_and_bots() {
        let db = get_test_db().await;
        let settings = settings();
        let herald = Herald::build(&settings, db).unwrap();

        assert!(herald.scheduler.control(SubType::SocialFeed).is_some());
        assert!(herald.scheduler.control(SubType::LiveRoom).is_none());
        assert!(herald.detector.adapters().get(SubType::SocialFeed).is_some());
        assert!(herald.dispatcher.bots().is_online("bot_1"));

        herald.register_bots(&settings).await.unwrap();
        assert!(
            db::chat_entity::get_bot("bot_1", &herald.db)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn it_should_migrate_a_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings();
        settings.database = dir.path().join("herald.sqlite").to_string_lossy().into_owned();

        let db = connect(&settings).await.unwrap();
        entity::ensure_bot("bot_1", "Herald", &db).await.unwrap();
        drop(db);

        // Reconnecting runs migrations again as a no-op and keeps data.
        let db = connect(&settings).await.unwrap();
        assert!(db::chat_entity::get_bot("bot_1", &db).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn it_should_reject_templates_without_placeholder() {
        let db = get_test_db().await;
        let mut settings = settings();
        settings.jobs[0].url = "https://feeds.example.org/all.json".to_owned();
        assert!(Herald::build(&settings, db).is_err());
    }
}
