//! Periodic check cycle: immediate alerts every tick, digests inside their
//! daily window.
//!
//! Cycles run one at a time on the caller's task; a tick that fires while a
//! cycle is still running is skipped rather than queued.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, NaiveTime, Utc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    calendar,
    config::Config,
    domain::{Category, ChatId, EntityKey, Outcome, PostKind},
    engine::{NotificationEngine, Selection, Snapshot},
    formatting::truncate_message,
    messaging::port::MessagingPort,
    ports::RecordStore,
    Result,
};

/// Delay before the first cycle after startup.
const FIRST_CYCLE_DELAY: Duration = Duration::from_secs(1);
/// The active list is re-posted at most twice a day.
const ACTIVE_LIST_PERIOD: Duration = Duration::from_secs(12 * 3600);

#[derive(Clone, Copy, Debug)]
pub struct DispatchSettings {
    /// Real chat behind [`ChatId::BROADCAST`].
    pub broadcast_chat: ChatId,
    pub message_limit: usize,
    /// UTC time of the broadcast digest.
    pub digest_time: NaiveTime,
    pub retry_window: Duration,
    pub check_interval: Duration,
}

impl From<&Config> for DispatchSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            broadcast_chat: ChatId(cfg.broadcast_chat_id),
            message_limit: cfg.message_limit,
            digest_time: cfg.digest_time,
            retry_window: cfg.post_retry_window,
            check_interval: cfg.check_interval,
        }
    }
}

impl DispatchSettings {
    /// Minimum spacing between two active-list broadcasts.
    pub fn active_list_window(&self) -> Duration {
        ACTIVE_LIST_PERIOD.saturating_sub(self.retry_window)
    }
}

/// Delivery counts of one cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    engine: Arc<NotificationEngine>,
    store: Arc<dyn RecordStore>,
    messenger: Arc<dyn MessagingPort>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<NotificationEngine>,
        store: Arc<dyn RecordStore>,
        messenger: Arc<dyn MessagingPort>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            engine,
            store,
            messenger,
            settings,
        }
    }

    /// Run cycles until cancelled. The first error ends the loop.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut ticker = interval_at(
            Instant::now() + FIRST_CYCLE_DELAY,
            self.settings.check_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("dispatcher stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            match self.run_cycle(Utc::now()).await {
                Ok(report) if report.delivered + report.failed > 0 => {
                    tracing::info!(
                        delivered = report.delivered,
                        failed = report.failed,
                        "cycle finished"
                    );
                }
                Ok(_) => tracing::debug!("cycle finished, nothing to post"),
                Err(e) => {
                    tracing::error!(error = %e, "cycle failed");
                    return Err(e);
                }
            }
        }
    }

    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        self.immediate_pass(now, &mut report).await?;
        self.digest_pass(now, &mut report).await?;
        Ok(report)
    }

    async fn immediate_pass(&self, now: DateTime<Utc>, report: &mut CycleReport) -> Result<()> {
        let snapshot = self.engine.snapshot().await?;
        let retry = self.settings.retry_window;

        // New phase entries.
        let selection = self
            .engine
            .select_new_phase_entries(&snapshot, ChatId::BROADCAST, None)
            .await?;
        self.deliver_selection(PostKind::NewPhaseEntry, ChatId::BROADCAST, selection, now, report)
            .await?;

        for chat in self
            .store
            .list_eligible_subscribers(Category::PhaseEntry, now, retry)
            .await?
        {
            let selection = self
                .engine
                .select_new_phase_entries(&snapshot, chat, None)
                .await?;
            self.deliver_selection(PostKind::NewPhaseEntry, chat, selection, now, report)
                .await?;
        }

        for chat in self
            .store
            .list_eligible_subscribers(Category::SpecificProposals, now, retry)
            .await?
        {
            let watched = self.store.watched_proposals(chat).await?;
            if watched.is_empty() {
                continue;
            }
            let selection = self
                .engine
                .select_new_phase_entries(&snapshot, chat, Some(&watched))
                .await?;
            self.deliver_selection(PostKind::NewPhaseEntry, chat, selection, now, report)
                .await?;
        }

        // Failed and expiring votes go to the broadcast chat and extra-alert subscribers.
        let mut alerted = vec![ChatId::BROADCAST];
        alerted.extend(
            self.store
                .list_eligible_subscribers(Category::ExtraAlerts, now, retry)
                .await?,
        );
        for chat in alerted {
            self.alert_pass(&snapshot, chat, now, report).await?;
        }
        Ok(())
    }

    async fn alert_pass(
        &self,
        snapshot: &Snapshot,
        chat: ChatId,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<()> {
        let failed = self
            .engine
            .select_failed_no_quorum(&snapshot.completed, chat)
            .await?;
        self.deliver_selection(PostKind::FailedNoQuorum, chat, failed, now, report)
            .await?;

        let expiring = self.engine.select_expiring_no_quorum(snapshot, chat).await?;
        self.deliver_selection(PostKind::ExpiringNoQuorum, chat, expiring, now, report)
            .await
    }

    async fn digest_pass(&self, now: DateTime<Utc>, report: &mut CycleReport) -> Result<()> {
        let retry = self.settings.retry_window;
        let mut digest: Option<String> = None;

        let in_window =
            calendar::slot_start(now.naive_utc(), self.settings.digest_time, retry).is_some();
        if in_window {
            if self
                .store
                .was_delivered_since(
                    PostKind::Digest,
                    ChatId::BROADCAST,
                    calendar::window_start(now, retry),
                )
                .await?
            {
                tracing::debug!("digest already posted, skipping");
            } else {
                let text = self.engine.digest(now).await?;
                self.deliver(PostKind::Digest, ChatId::BROADCAST, &text, &[], now, report)
                    .await?;
                digest = Some(text);
            }

            if !self
                .store
                .was_delivered_since(
                    PostKind::ActiveList,
                    ChatId::BROADCAST,
                    calendar::window_start(now, self.settings.active_list_window()),
                )
                .await?
            {
                let text = self.engine.active_list().await?;
                self.deliver(PostKind::ActiveList, ChatId::BROADCAST, &text, &[], now, report)
                    .await?;
            }
        }

        let subscribers = self
            .store
            .list_eligible_subscribers(Category::Digest, now, retry)
            .await?;
        for chat in subscribers {
            let text = match &digest {
                Some(text) => text.clone(),
                None => {
                    let text = self.engine.digest(now).await?;
                    digest = Some(text.clone());
                    text
                }
            };
            self.deliver(PostKind::Digest, chat, &text, &[], now, report)
                .await?;
        }
        Ok(())
    }

    async fn deliver_selection(
        &self,
        kind: PostKind,
        subscriber: ChatId,
        selection: Selection,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<()> {
        self.deliver(kind, subscriber, &selection.text, &selection.keys, now, report)
            .await
    }

    /// Send one message and record the outcome for every key it covers.
    ///
    /// Send failures are recorded, not returned; store failures are returned.
    async fn deliver(
        &self,
        kind: PostKind,
        subscriber: ChatId,
        text: &str,
        keys: &[EntityKey],
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let chat = if subscriber.is_broadcast() {
            self.settings.broadcast_chat
        } else {
            subscriber
        };
        if text.chars().count() > self.settings.message_limit {
            tracing::warn!(chat = chat.0, ?kind, "message too long, truncating");
        }
        let text = truncate_message(text, self.settings.message_limit);

        let outcome = match self.messenger.send_markdown(chat, &text).await {
            Ok(_) => {
                report.delivered += 1;
                tracing::info!(chat = chat.0, ?kind, "posted");
                Outcome::Success
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(chat = chat.0, ?kind, error = %e, "failed to post");
                Outcome::Failure
            }
        };

        if keys.is_empty() {
            self.store
                .record_delivery(kind, outcome, None, subscriber, now)
                .await?;
        } else {
            for key in keys {
                self.store
                    .record_delivery(kind, outcome, Some(*key), subscriber, now)
                    .await?;
            }
        }
        Ok(())
    }
}
