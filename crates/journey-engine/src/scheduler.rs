//! Scheduled day delivery.
//!
//! Every process runs [`Scheduler::run_with_shutdown`]; the lease makes
//! sure only one of them delivers on a given tick. Interval checks are
//! pure functions over the bot's own last-delivery timestamp.

use chrono::{DateTime, Duration, Utc};
use database::{bot, user, Bot, DeliveryInterval};
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::day::DayOutcome;
use crate::engine::Engine;
use crate::error::Result;
use crate::lease::LeaseCoordinator;

/// Whether a bot is due for its next delivery at `now`.
pub fn interval_elapsed(interval: &DeliveryInterval, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match interval {
        DeliveryInterval::EveryMinutes { minutes } => match last {
            None => true,
            Some(last) => now - last >= Duration::minutes(i64::from(*minutes)),
        },
        DeliveryInterval::DailyAt { timezone, time } => {
            let local_now = now.with_timezone(timezone);
            if local_now.time() < *time {
                return false;
            }
            match last {
                None => true,
                Some(last) => last.with_timezone(timezone).date_naive() < local_now.date_naive(),
            }
        }
    }
}

/// Summary of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Another process holds the lease.
    pub skipped: bool,
    pub bots_due: usize,
    pub delivered: usize,
    pub completed: usize,
    pub already_delivered: usize,
    pub gaps: usize,
    pub failed: usize,
    /// The lease was taken over mid-tick and delivery stopped.
    pub lost_lease: bool,
}

impl TickReport {
    fn record(&mut self, outcome: DayOutcome) {
        match outcome {
            DayOutcome::Delivered { completed, .. } => {
                self.delivered += 1;
                if completed {
                    self.completed += 1;
                }
            }
            DayOutcome::AlreadyDelivered { .. } => self.already_delivered += 1,
            DayOutcome::Gap { .. } => self.gaps += 1,
            DayOutcome::Failed { .. } => self.failed += 1,
            DayOutcome::Completed => self.completed += 1,
            DayOutcome::Skipped => {}
        }
    }
}

/// The delivery loop for all bots.
pub struct Scheduler {
    engine: Engine,
    config: SchedulerConfig,
    lease: LeaseCoordinator,
}

impl Scheduler {
    pub fn new(engine: Engine, config: SchedulerConfig) -> Self {
        let lease = LeaseCoordinator::new(config.lease_name.clone(), config.lease_staleness);
        Self {
            engine,
            config,
            lease,
        }
    }

    /// Use a specific lease, e.g. with a fixed owner token.
    pub fn with_lease(mut self, lease: LeaseCoordinator) -> Self {
        self.lease = lease;
        self
    }

    pub fn lease(&self) -> &LeaseCoordinator {
        &self.lease
    }

    /// Run one tick: take the lease, then deliver for every due bot.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let pool = self.engine.pool();
        let mut report = TickReport::default();

        if !self.lease.acquire(pool, now).await? {
            debug!("Scheduler lease held elsewhere, skipping tick");
            report.skipped = true;
            return Ok(report);
        }

        for due in bot::list_active_bots(pool).await? {
            let last = bot::last_delivery_at(pool, due.id).await?;
            if !interval_elapsed(&due.delivery_interval, last, now) {
                continue;
            }

            if !self.lease.renew(pool, Utc::now()).await? {
                warn!("Scheduler lease lost before bot {}", due.id);
                report.lost_lease = true;
                break;
            }

            report.bots_due += 1;
            let finished = self.deliver_bot(&due, &mut report).await?;
            bot::record_delivery(pool, due.id, now).await?;
            if !finished {
                report.lost_lease = true;
                break;
            }
        }

        if report.bots_due > 0 {
            info!(
                "Tick: {} bots, {} delivered, {} completed, {} gaps, {} failed",
                report.bots_due, report.delivered, report.completed, report.gaps, report.failed
            );
        }
        Ok(report)
    }

    /// Deliver the current day to every active user of `due`.
    ///
    /// Returns `false` if the lease was lost part way through.
    async fn deliver_bot(&self, due: &Bot, report: &mut TickReport) -> Result<bool> {
        let pool = self.engine.pool();
        let renew_every = self.config.lease_staleness / 2;
        let mut renewed = Instant::now();

        let users = user::list_active_users(pool, due.id).await?;
        debug!(bot_id = due.id, "Delivering to {} users", users.len());

        for recipient in users {
            if renewed.elapsed() >= renew_every {
                if !self.lease.renew(pool, Utc::now()).await? {
                    warn!(bot_id = due.id, "Scheduler lease lost mid-batch");
                    return Ok(false);
                }
                renewed = Instant::now();
            }

            match self
                .engine
                .deliver_day(due, recipient.id, Some(recipient.current_day))
                .await
            {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(bot_id = due.id, user_id = recipient.id, "Delivery failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        Ok(true)
    }

    /// Tick until `shutdown_signal` completes, then release the lease.
    pub async fn run_with_shutdown<S>(self, shutdown_signal: S)
    where
        S: std::future::Future<Output = ()> + Send,
    {
        info!(
            "Starting scheduler as {} (tick {:?})",
            self.lease.owner_token(),
            self.config.tick
        );

        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown_signal);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown_signal => {
                    info!("Shutdown signal received, stopping scheduler");
                    if let Err(e) = self.lease.release(self.engine.pool()).await {
                        warn!("Failed to release scheduler lease: {}", e);
                    }
                    return;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!("Scheduler tick failed: {}", e);
                    }
                }
            }
        }
    }
}
