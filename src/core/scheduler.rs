//! Periodic jobs - Daily remine and popular-product cache warming.
//!
//! Each job is a plain async function that can be triggered by hand (the CLI does so)
//! or from the [`Scheduler`] loops. Remines within one process are serialized; a second
//! request while one is running is skipped rather than queued.

use crate::{
    config::settings::SchedulerSettings,
    core::{
        cache::{CacheBackend, RecommendationCache},
        pipeline::{self, MiningOutcome},
        sales, settings,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use std::sync::Arc;
use tokio::{signal, sync::Mutex, task::JoinHandle};
use tracing::{debug, error, info, warn};

/// Seconds between expired-entry sweeps of the cache backend.
const EVICTION_INTERVAL_SECS: u64 = 60;

/// Result of a remine request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemineOutcome {
    /// The last run is recent enough; nothing was done
    Skipped {
        /// Calendar days since the last completed run
        days_since: i64,
        /// Configured refresh interval in days
        interval: i32,
    },
    /// Another remine is in progress in this process
    AlreadyRunning,
    /// The mining pipeline ran
    Ran(MiningOutcome),
}

/// Runs the mining pipeline unless the last run is younger than the refresh interval.
///
/// The age of the last run is counted in calendar days at `now`. `force` bypasses the
/// interval check. After a completed run every cached recommendation is dropped; a cache
/// failure at that point is logged, not returned.
///
/// # Errors
/// Returns an error if the configuration cannot be read or the mining run fails.
pub async fn run_remine<C, B>(
    db: &C,
    cache: &RecommendationCache<B>,
    force: bool,
    now: DateTime<Utc>,
) -> Result<RemineOutcome>
where
    C: ConnectionTrait + TransactionTrait,
    B: CacheBackend,
{
    let config = settings::get_or_create_config(db).await?;
    if !force {
        if let Some(days_since) = settings::days_since_last_run(&config, now) {
            if days_since < i64::from(config.refresh_interval_days) {
                info!(
                    days_since,
                    interval = config.refresh_interval_days,
                    "Skipping remine, last run is recent"
                );
                return Ok(RemineOutcome::Skipped {
                    days_since,
                    interval: config.refresh_interval_days,
                });
            }
        }
    }

    let outcome = pipeline::run_mining(db).await?;
    if let MiningOutcome::Completed { .. } = outcome {
        if let Err(e) = cache.invalidate(None) {
            warn!("Could not invalidate cache after remine: {}", e);
        }
    }
    Ok(RemineOutcome::Ran(outcome))
}

/// Recomputes and caches recommendations for the best-selling products of the trailing
/// window. Returns the number of products warmed.
///
/// # Errors
/// Returns an error if the popularity query or a rule store read fails.
pub async fn precompute_popular<C, B>(
    db: &C,
    cache: &RecommendationCache<B>,
    settings: &SchedulerSettings,
    now: DateTime<Utc>,
) -> Result<usize>
where
    C: ConnectionTrait,
    B: CacheBackend,
{
    let since = now - Duration::days(settings.popular_window_days);
    let popular = sales::top_selling_products(db, since, settings.popular_limit).await?;

    let mut warmed = 0;
    for (product_id, line_count) in popular {
        let recommendations = cache
            .refresh_product(db, product_id, settings.precompute_limit)
            .await?;
        debug!(
            product_id,
            line_count,
            recommendations = recommendations.len(),
            "Precomputed recommendations"
        );
        warmed += 1;
    }

    info!(warmed, window_days = settings.popular_window_days, "Popular products precomputed");
    Ok(warmed)
}

fn schedule_time(hour: u32, minute: u32) -> Result<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| Error::Config {
        message: format!("Invalid schedule time {hour:02}:{minute:02}"),
    })
}

/// Next occurrence of `hour:minute` UTC strictly after `now`.
///
/// # Errors
/// Returns `Config` if the time of day is invalid.
pub fn next_daily_run(now: DateTime<Utc>, hour: u32, minute: u32) -> Result<DateTime<Utc>> {
    let at = schedule_time(hour, minute)?;
    let today = now.date_naive().and_time(at).and_utc();
    Ok(if today > now {
        today
    } else {
        today + Duration::days(1)
    })
}

/// Next slot strictly after `now` on the grid of hours divisible by `every_hours`, at
/// `minute` past the hour. With `every_hours = 4, minute = 15` the slots are 00:15,
/// 04:15, 08:15 and so on.
///
/// # Errors
/// Returns `Config` if `every_hours` is zero or the minute is invalid.
pub fn next_periodic_run(
    now: DateTime<Utc>,
    every_hours: u32,
    minute: u32,
) -> Result<DateTime<Utc>> {
    if every_hours == 0 {
        return Err(Error::Config {
            message: "precompute_every_hours must be positive".to_string(),
        });
    }
    schedule_time(0, minute)?;

    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let step = Duration::hours(i64::from(every_hours));
    let mut slot = midnight + Duration::minutes(i64::from(minute));
    while slot <= now {
        slot += step;
    }
    Ok(slot)
}

async fn sleep_until(at: DateTime<Utc>) {
    let wait = (at - Utc::now()).to_std().unwrap_or_default();
    tokio::time::sleep(wait).await;
}

/// Owns the periodic jobs of a running service.
pub struct Scheduler<B: CacheBackend + 'static> {
    db: DatabaseConnection,
    cache: Arc<RecommendationCache<B>>,
    settings: SchedulerSettings,
    remine_lock: Mutex<()>,
}

impl<B: CacheBackend + 'static> Scheduler<B> {
    /// Creates a scheduler over a database and a shared cache.
    pub fn new(
        db: DatabaseConnection,
        cache: Arc<RecommendationCache<B>>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            db,
            cache,
            settings,
            remine_lock: Mutex::new(()),
        }
    }

    /// Remines now, unless another remine is already running in this process.
    ///
    /// # Errors
    /// See [`run_remine`].
    pub async fn remine_now(&self, force: bool) -> Result<RemineOutcome> {
        let Ok(_guard) = self.remine_lock.try_lock() else {
            warn!("Remine already in progress, skipping");
            return Ok(RemineOutcome::AlreadyRunning);
        };
        run_remine(&self.db, self.cache.as_ref(), force, Utc::now()).await
    }

    /// Runs one popular-product precompute pass.
    ///
    /// # Errors
    /// See [`precompute_popular`].
    pub async fn precompute_now(&self) -> Result<usize> {
        precompute_popular(&self.db, self.cache.as_ref(), &self.settings, Utc::now()).await
    }

    async fn remine_loop(self: Arc<Self>) {
        loop {
            let next = match next_daily_run(
                Utc::now(),
                self.settings.remine_hour,
                self.settings.remine_minute,
            ) {
                Ok(next) => next,
                Err(e) => {
                    error!("Remine job disabled: {}", e);
                    return;
                }
            };
            info!(next = %next, "Next remine check scheduled");
            sleep_until(next).await;

            match self.remine_now(false).await {
                Ok(outcome) => info!(?outcome, "Scheduled remine finished"),
                Err(e) => error!("Scheduled remine failed: {}", e),
            }
        }
    }

    async fn precompute_loop(self: Arc<Self>) {
        loop {
            let next = match next_periodic_run(
                Utc::now(),
                self.settings.precompute_every_hours,
                self.settings.precompute_minute,
            ) {
                Ok(next) => next,
                Err(e) => {
                    error!("Precompute job disabled: {}", e);
                    return;
                }
            };
            debug!(next = %next, "Next precompute scheduled");
            sleep_until(next).await;

            if let Err(e) = self.precompute_now().await {
                error!("Scheduled precompute failed: {}", e);
            }
        }
    }

    async fn eviction_loop(self: Arc<Self>) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(EVICTION_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let evicted = self.cache.backend().evict_expired();
            if evicted > 0 {
                debug!(evicted, "Expired cache entries evicted");
            }
        }
    }

    /// Spawns the job loops and waits for Ctrl-C, then stops them.
    ///
    /// # Errors
    /// Returns an error if the shutdown signal cannot be installed.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let tasks: Vec<JoinHandle<()>> = vec![
            tokio::spawn(Arc::clone(&self).remine_loop()),
            tokio::spawn(Arc::clone(&self).precompute_loop()),
            tokio::spawn(Arc::clone(&self).eviction_loop()),
        ];
        info!(
            remine_hour = self.settings.remine_hour,
            remine_minute = self.settings.remine_minute,
            precompute_every_hours = self.settings.precompute_every_hours,
            "Scheduler started"
        );

        signal::ctrl_c().await?;
        info!("Shutdown signal received");
        for task in tasks {
            task.abort();
        }
        info!("Scheduler stopped");
        Ok(())
    }
}
