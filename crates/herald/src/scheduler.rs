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

//! Periodic polling jobs, one per feed kind.
//!
//! A cycle lists every source of its kind that still has subscribers,
//! detects new items, records them as seen and only then dispatches them.
//! Recording first means a crash between the two loses a notification
//! instead of repeating it.

use herald_common::{error::Result, message::Message, source::SubType};
use sea_orm::DatabaseConnection;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{Mutex, MutexGuard, Semaphore},
    task::JoinSet,
    time::MissedTickBehavior,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};

use crate::db::entities::subscription_source;
use crate::detect::ChangeDetector;
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::subscription;

pub const DEFAULT_SOURCE_CONCURRENCY: usize = 4;

/// Pause switch shared between a job and interactive callers.
///
/// Pauses nest: the job stays paused until every `pause` has been matched
/// by a `resume`.
#[derive(Clone, Default)]
pub struct JobControl {
    pauses: Arc<AtomicUsize>,
    cycle: Arc<Mutex<()>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns once no cycle is in flight. Cycles starting afterwards are
    /// skipped until [`JobControl::resume`].
    pub async fn pause(&self) {
        self.paused().await.keep();
    }

    /// Like [`JobControl::pause`], but the pause ends when the guard drops.
    /// Dropping the future before it completes leaves the job running.
    pub async fn paused(&self) -> PauseGuard {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        let guard = PauseGuard {
            control: Some(self.clone()),
        };
        let _cycle = self.cycle.lock().await;
        debug!("job paused");
        guard
    }

    pub fn resume(&self) {
        let previous = self
            .pauses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        if previous == 1 {
            debug!("job resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pauses.load(Ordering::SeqCst) > 0
    }

    pub(crate) async fn enter(&self) -> Option<MutexGuard<'_, ()>> {
        let guard = self.cycle.lock().await;
        if self.is_paused() { None } else { Some(guard) }
    }
}

/// Resumes its job on drop.
#[must_use = "the job resumes as soon as the guard is dropped"]
pub struct PauseGuard {
    control: Option<JobControl>,
}

impl PauseGuard {
    /// Leaves the job paused; a later `resume` is then up to the caller.
    pub fn keep(mut self) {
        self.control = None;
    }
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        if let Some(control) = self.control.take() {
            control.resume();
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub skipped: bool,
    pub sources: usize,
    pub failed_sources: usize,
    pub new_items: usize,
    pub dispatch: DispatchReport,
}

#[derive(Clone)]
pub struct PollJob {
    sub_type: SubType,
    interval: Duration,
    start_delay: Duration,
    source_concurrency: usize,
    control: JobControl,
    detector: ChangeDetector,
    dispatcher: Dispatcher,
    db: DatabaseConnection,
}

impl PollJob {
    pub fn new(
        sub_type: SubType,
        interval: Duration,
        detector: ChangeDetector,
        dispatcher: Dispatcher,
        db: DatabaseConnection,
    ) -> Self {
        Self {
            sub_type,
            interval: interval.max(Duration::from_millis(1)),
            start_delay: Duration::ZERO,
            source_concurrency: DEFAULT_SOURCE_CONCURRENCY,
            control: JobControl::new(),
            detector,
            dispatcher,
            db,
        }
    }

    pub fn with_start_delay(mut self, start_delay: Duration) -> Self {
        self.start_delay = start_delay;
        self
    }

    pub fn with_source_concurrency(mut self, concurrency: usize) -> Self {
        self.source_concurrency = concurrency.max(1);
        self
    }

    pub fn sub_type(&self) -> SubType {
        self.sub_type
    }

    pub fn control(&self) -> JobControl {
        self.control.clone()
    }

    /// One polling pass over every subscribed source of this kind.
    ///
    /// Each source is polled in its own task. A failing or panicking source
    /// is logged and counted; it never aborts the others.
    pub async fn run_cycle(&self) -> CycleReport {
        let Some(_cycle) = self.control.enter().await else {
            debug!(kind = %self.sub_type, "job paused, skipping cycle");
            return CycleReport {
                skipped: true,
                ..Default::default()
            };
        };

        let sources = match subscription::list_subscribed_sources(self.sub_type, &self.db).await {
            Ok(sources) => sources,
            Err(err) => {
                error!(kind = %self.sub_type, "failed to list sources: {err}");
                return CycleReport::default();
            }
        };

        let mut report = CycleReport {
            sources: sources.len(),
            ..Default::default()
        };

        let permits = Arc::new(Semaphore::new(self.source_concurrency));
        let mut tasks = JoinSet::new();
        for source in sources {
            let job = self.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let result = job.poll_source(&source).await;
                (source.sub_id, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok((new_items, dispatch)))) => {
                    report.new_items += new_items;
                    report.dispatch.merge(dispatch);
                }
                Ok((sub_id, Err(err))) => {
                    warn!(kind = %self.sub_type, source = %sub_id, "polling source failed: {err}");
                    report.failed_sources += 1;
                }
                Err(err) => {
                    error!(kind = %self.sub_type, "polling task aborted: {err}");
                    report.failed_sources += 1;
                }
            }
        }

        debug!(kind = %self.sub_type, ?report, "cycle finished");
        report
    }

    async fn poll_source(
        &self,
        source: &subscription_source::Model,
    ) -> Result<(usize, DispatchReport)> {
        let items = self.detector.new_items(&source.source_ref()).await?;
        if items.is_empty() {
            return Ok((0, DispatchReport::default()));
        }

        let mut messages: Vec<Message> = Vec::with_capacity(items.len());
        for item in &items {
            match self.detector.mark_seen(self.sub_type, item).await {
                Ok(true) => messages.push(item.render()),
                Ok(false) => {
                    debug!(source = %source.sub_id, item = %item.external_id, "item recorded elsewhere, not dispatching");
                }
                Err(err) => {
                    warn!(source = %source.sub_id, item = %item.external_id, "failed to record item, not dispatching: {err}");
                }
            }
        }

        info!(kind = %self.sub_type, source = %source.sub_id, count = messages.len(), "new items");
        let dispatch = self.dispatcher.notify(source, &messages).await?;
        Ok((messages.len(), dispatch))
    }

    /// Polls every `interval` after `start_delay` until `token` is cancelled.
    /// A cycle already running when cancellation arrives runs to completion.
    pub async fn run(self, token: CancellationToken) {
        info!(kind = %self.sub_type, interval = ?self.interval, delay = ?self.start_delay, "polling job started");

        tokio::select! {
            _ = token.cancelled() => {
                info!(kind = %self.sub_type, "polling job stopped before first cycle");
                return;
            }
            _ = tokio::time::sleep(self.start_delay) => {}
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }

        info!(kind = %self.sub_type, "polling job stopped");
    }
}

/// Owns the polling jobs and their lifetime.
pub struct Scheduler {
    jobs: HashMap<SubType, PollJob>,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Adds a job, replacing any earlier one of the same kind.
    pub fn add_job(&mut self, job: PollJob) -> JobControl {
        let control = job.control();
        if self.jobs.insert(job.sub_type(), job).is_some() {
            warn!("replaced an existing polling job");
        }
        control
    }

    pub fn control(&self, sub_type: SubType) -> Option<JobControl> {
        self.jobs.get(&sub_type).map(PollJob::control)
    }

    pub fn start(&self) {
        for job in self.jobs.values() {
            self.tracker.spawn(job.clone().run(self.token.child_token()));
        }
        info!(jobs = self.jobs.len(), "scheduler started");
    }

    /// Stops scheduling new cycles and waits for in-flight ones.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EntityRef;
    use crate::detect::Adapters;
    use crate::dispatch::BotRegistry;
    use crate::entity::ensure_entity;
    use crate::subscription::add_subscription;
    use crate::utils::{RecordingTransport, StaticAdapter, get_test_db, item};
    use herald_common::source::SourceRef;

    struct Fixture {
        db: DatabaseConnection,
        adapter: StaticAdapter,
        transport: RecordingTransport,
        job: PollJob,
    }

    async fn fixture() -> Fixture {
        let db = get_test_db().await;
        let adapter = StaticAdapter::new(SubType::ArtistAccount);
        let mut adapters = Adapters::new();
        adapters.register(adapter.clone());

        let bots = BotRegistry::new();
        let transport = RecordingTransport::new();
        bots.register("bot_1", transport.clone());

        let job = PollJob::new(
            SubType::ArtistAccount,
            Duration::from_millis(20),
            ChangeDetector::new(db.clone(), adapters),
            Dispatcher::new(db.clone(), bots),
            db.clone(),
        );

        Fixture {
            db,
            adapter,
            transport,
            job,
        }
    }

    async fn subscribe(group: &str, sub_id: &str, db: &DatabaseConnection) {
        let entity = ensure_entity(&EntityRef::group("bot_1", group, ""), db)
            .await
            .unwrap();
        add_subscription(
            &entity.id,
            &SourceRef::new(SubType::ArtistAccount, sub_id, ""),
            None,
            db,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn it_should_detect_persist_and_dispatch() {
        let f = fixture().await;
        subscribe("g1", "114514", &f.db).await;
        subscribe("g2", "114514", &f.db).await;
        f.adapter
            .set_items("114514", vec![item("A", "first"), item("B", "second")]);

        let report = f.job.run_cycle().await;
        assert_eq!(report.sources, 1);
        assert_eq!(report.new_items, 2);
        assert_eq!(report.dispatch.attempted, 4);
        assert_eq!(report.dispatch.delivered, 4);

        let again = f.job.run_cycle().await;
        assert_eq!(again.new_items, 0);
        assert_eq!(f.transport.sent().len(), 4);
    }

    #[tokio::test]
    async fn it_should_isolate_failing_sources() {
        let f = fixture().await;
        subscribe("g1", "broken", &f.db).await;
        subscribe("g1", "fine", &f.db).await;
        f.adapter.fail("broken");
        f.adapter.set_items("fine", vec![item("1", "")]);

        let report = f.job.run_cycle().await;
        assert_eq!(report.sources, 2);
        assert_eq!(report.failed_sources, 1);
        assert_eq!(report.dispatch.delivered, 1);
    }

    #[tokio::test]
    async fn it_should_survive_a_panicking_adapter() {
        let f = fixture().await;
        subscribe("g1", "crashing", &f.db).await;
        subscribe("g1", "fine", &f.db).await;
        f.adapter.panic_on("crashing");
        f.adapter.set_items("fine", vec![item("1", "")]);

        let report = f.job.run_cycle().await;
        assert_eq!(report.sources, 2);
        assert_eq!(report.failed_sources, 1);
        assert_eq!(report.new_items, 1);
        assert_eq!(report.dispatch.delivered, 1);

        // The job keeps cycling after the panic.
        let again = f.job.run_cycle().await;
        assert!(!again.skipped);
        assert_eq!(again.failed_sources, 1);
        assert_eq!(f.adapter.call_count(), 4);
    }

    #[tokio::test]
    async fn it_should_skip_unsubscribed_sources() {
        let f = fixture().await;
        crate::subscription::get_or_create_source(
            &SourceRef::new(SubType::ArtistAccount, "orphan", ""),
            &f.db,
        )
        .await
        .unwrap();

        let report = f.job.run_cycle().await;
        assert_eq!(report.sources, 0);
        assert_eq!(f.adapter.call_count(), 0);
    }

    #[tokio::test]
    async fn it_should_skip_cycles_while_paused() {
        let f = fixture().await;
        subscribe("g1", "114514", &f.db).await;
        f.adapter.set_items("114514", vec![item("A", "")]);
        let control = f.job.control();

        control.pause().await;
        control.pause().await;
        assert!(f.job.run_cycle().await.skipped);

        control.resume();
        assert!(control.is_paused());
        assert!(f.job.run_cycle().await.skipped);
        assert_eq!(f.adapter.call_count(), 0);

        control.resume();
        let report = f.job.run_cycle().await;
        assert!(!report.skipped);
        assert_eq!(report.new_items, 1);
    }

    #[tokio::test]
    async fn it_should_resume_when_the_guard_drops() {
        let control = JobControl::new();

        let guard = control.paused().await;
        assert!(control.is_paused());
        drop(guard);
        assert!(!control.is_paused());

        // A pause abandoned while waiting for the cycle lock leaves no trace.
        let cycle = control.enter().await;
        assert!(cycle.is_some());
        let waited = tokio::time::timeout(Duration::from_millis(20), control.paused()).await;
        assert!(waited.is_err());
        drop(cycle);
        assert!(!control.is_paused());
    }

    #[tokio::test]
    async fn it_should_poll_until_shutdown() {
        let f = fixture().await;
        subscribe("g1", "114514", &f.db).await;

        let mut scheduler = Scheduler::new();
        scheduler.add_job(f.job.clone());
        assert!(scheduler.control(SubType::ArtistAccount).is_some());
        assert!(scheduler.control(SubType::LiveRoom).is_none());

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.shutdown().await;

        let calls = f.adapter.call_count();
        assert!(calls >= 1);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(f.adapter.call_count(), calls);
    }

    #[tokio::test]
    async fn it_should_honor_start_delay() {
        let f = fixture().await;
        subscribe("g1", "114514", &f.db).await;

        let mut scheduler = Scheduler::new();
        scheduler.add_job(f.job.clone().with_start_delay(Duration::from_secs(3600)));
        scheduler.start();
        tokio::time::sleep(Duration::from_millis(60)).await;
        scheduler.shutdown().await;

        assert_eq!(f.adapter.call_count(), 0);
    }
}
