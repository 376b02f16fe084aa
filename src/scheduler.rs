//! Offset-aligned refresh loops
//!
//! Ticks sit on interval boundaries counted from local midnight on the wall
//! clock, shifted by a fixed number of seconds. Each loop survives failed
//! cycles and only ends when the cancel signal flips.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, LocalResult, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Result, StromspotError};
use crate::logging::{StructuredLogger, get_logger};

/// Delay used when the next tick cannot be computed
pub const FALLBACK_DELAY: Duration = Duration::from_secs(60);

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Interval and offset of one loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTiming {
    pub interval_minutes: u32,
    pub offset_seconds: u32,
}

impl CycleTiming {
    pub const fn new(interval_minutes: u32, offset_seconds: u32) -> Self {
        Self {
            interval_minutes,
            offset_seconds,
        }
    }
}

/// First tick strictly after `now`
///
/// Candidates are `local midnight + k * interval + offset` on the wall clock.
/// Candidates inside a spring-forward gap are skipped. Ambiguous ones count
/// with both instants, so the repeated fall-back hour ticks twice.
pub fn next_tick_after(now: DateTime<Utc>, tz: Tz, timing: CycleTiming) -> Result<DateTime<Utc>> {
    if timing.interval_minutes == 0 {
        return Err(StromspotError::validation(
            "interval_minutes",
            "interval must be positive",
        ));
    }
    let offset = chrono::Duration::seconds(i64::from(timing.offset_seconds));
    let step = chrono::Duration::minutes(i64::from(timing.interval_minutes));
    let slots_per_day = MINUTES_PER_DAY.div_ceil(timing.interval_minutes);

    // one day back covers an offset pushing yesterday's last tick past midnight
    let today = now.with_timezone(&tz).date_naive();
    let first_day = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    for day_offset in 0..4 {
        let Some(day) = first_day.checked_add_days(Days::new(day_offset)) else {
            break;
        };
        let midnight = day.and_time(NaiveTime::MIN);
        // wall-clock order differs from instant order inside the repeated hour
        let best = (0..slots_per_day)
            .map(|k| midnight + step * i32::try_from(k).unwrap_or(i32::MAX) + offset)
            .flat_map(|candidate| match tz.from_local_datetime(&candidate) {
                LocalResult::Single(t) => [Some(t), None],
                LocalResult::Ambiguous(earliest, latest) => [Some(earliest), Some(latest)],
                LocalResult::None => [None, None],
            })
            .flatten()
            .map(|t| t.with_timezone(&Utc))
            .filter(|&t| t > now)
            .min();
        if let Some(tick) = best {
            return Ok(tick);
        }
    }
    Err(StromspotError::validation(
        "schedule",
        "no upcoming tick found",
    ))
}

/// Time to sleep until the next tick, or [`FALLBACK_DELAY`] on failure
pub fn delay_until_next_tick(
    now: DateTime<Utc>,
    tz: Tz,
    timing: CycleTiming,
    logger: &StructuredLogger,
) -> Duration {
    match next_tick_after(now, tz, timing) {
        Ok(tick) => (tick - now).to_std().unwrap_or(FALLBACK_DELAY),
        Err(e) => {
            logger.warn(&format!(
                "Could not compute next tick, retrying in {}s: {e}",
                FALLBACK_DELAY.as_secs()
            ));
            FALLBACK_DELAY
        }
    }
}

/// One unit of scheduled work
#[async_trait::async_trait]
pub trait CycleJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run_cycle(&self, now: DateTime<Utc>) -> Result<()>;
}

/// A job with its timing
#[derive(Clone)]
pub struct ScheduledJob {
    pub job: Arc<dyn CycleJob>,
    pub timing: CycleTiming,
}

/// Run `job` on every tick until `cancel` turns true or its sender drops
pub async fn run_cycle_loop(
    job: Arc<dyn CycleJob>,
    tz: Tz,
    timing: CycleTiming,
    cycle_timeout: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let logger = get_logger("scheduler").with_field("job", job.name());
    logger.info(&format!(
        "Loop started: every {} min, offset {}s",
        timing.interval_minutes, timing.offset_seconds
    ));

    loop {
        if *cancel.borrow() {
            break;
        }
        let delay = delay_until_next_tick(Utc::now(), tz, timing, &logger);
        logger.debug(&format!("Next cycle in {:.1}s", delay.as_secs_f64()));

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = cancel.changed() => break,
        }

        let cycle_logger = logger.for_cycle(Uuid::new_v4());
        let started = std::time::Instant::now();
        tokio::select! {
            outcome = tokio::time::timeout(cycle_timeout, job.run_cycle(Utc::now())) => {
                match outcome {
                    Ok(Ok(())) => cycle_logger.debug(&format!(
                        "Cycle finished in {} ms",
                        started.elapsed().as_millis()
                    )),
                    Ok(Err(e)) if e.is_transient() => {
                        cycle_logger.warn(&format!("Cycle failed, retrying next tick: {e}"));
                    }
                    Ok(Err(e)) => cycle_logger.error(&format!("Cycle failed: {e}")),
                    Err(_) => cycle_logger.error(&format!(
                        "Cycle timed out after {}s",
                        cycle_timeout.as_secs()
                    )),
                }
            }
            _ = cancel.changed() => {
                cycle_logger.info("Cycle interrupted by shutdown");
                break;
            }
        }
    }
    logger.info("Loop stopped");
}

/// Owner of the running loops
pub struct Scheduler {
    tz: Tz,
    cycle_timeout: Duration,
    cancel_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    logger: StructuredLogger,
}

impl Scheduler {
    pub fn new(tz: Tz, cycle_timeout: Duration) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            tz,
            cycle_timeout,
            cancel_tx,
            handles: Vec::new(),
            logger: get_logger("scheduler"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// Spawn one loop per job
    pub fn start(&mut self, jobs: &[ScheduledJob]) {
        let (cancel_tx, _) = watch::channel(false);
        self.cancel_tx = cancel_tx;
        for scheduled in jobs {
            let handle = tokio::spawn(run_cycle_loop(
                Arc::clone(&scheduled.job),
                self.tz,
                scheduled.timing,
                self.cycle_timeout,
                self.cancel_tx.subscribe(),
            ));
            self.handles.push(handle);
        }
        self.logger.info(&format!("Started {} refresh loop(s)", jobs.len()));
    }

    /// Signal every loop and wait for it to end
    pub async fn shutdown(&mut self) {
        self.cancel_tx.send_replace(true);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                self.logger.warn(&format!("Loop task ended abnormally: {e}"));
            }
        }
    }

    /// Stop the current loops and start fresh ones with new settings
    pub async fn restart(&mut self, tz: Tz, cycle_timeout: Duration, jobs: &[ScheduledJob]) {
        self.shutdown().await;
        self.tz = tz;
        self.cycle_timeout = cycle_timeout;
        self.start(jobs);
    }
}
