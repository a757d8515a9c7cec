//! Daily wall-clock trigger polled on a fixed interval.

use crate::config::ScheduleConfig;
use anyhow::{Result, bail};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::future::Future;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailySchedule {
    at: NaiveTime,
    tz: Tz,
}

impl DailySchedule {
    pub fn new(at: &str, tz: Tz) -> Result<Self> {
        let at = match NaiveTime::parse_from_str(at, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(at, "%H:%M:%S"))
        {
            Ok(t) => t,
            Err(e) => bail!("Invalid schedule time {:?}: {}", at, e),
        };
        Ok(Self { at, tz })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// First instant strictly after `now` whose local time is `at`.
    /// On a DST overlap the earlier instant wins; a day whose local `at`
    /// falls into a DST gap is skipped.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut day = now.with_timezone(&self.tz).date_naive();
        loop {
            if let Some(local) = self.tz.from_local_datetime(&day.and_time(self.at)).earliest() {
                let candidate = local.with_timezone(&Utc);
                if candidate > now {
                    return candidate;
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => return now + chrono::Duration::days(1),
            }
        }
    }
}

pub struct Scheduler {
    schedule: DailySchedule,
    poll_interval: Duration,
    next_run: DateTime<Utc>,
}

impl Scheduler {
    pub fn new(config: &ScheduleConfig, now: DateTime<Utc>) -> Result<Self> {
        let schedule = DailySchedule::new(&config.time, config.timezone)?;
        Ok(Self {
            schedule,
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            next_run: schedule.next_after(now),
        })
    }

    pub fn next_run(&self) -> DateTime<Utc> {
        self.next_run
    }

    /// True when a run is due at `now`; the next trigger is then computed
    /// from `now`, so missed days are not caught up.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.next_run {
            return false;
        }
        self.next_run = self.schedule.next_after(now);
        true
    }

    /// Poll forever, running `job` to completion whenever it is due.
    pub async fn run_forever<F, Fut>(&mut self, mut job: F)
    where
        F: FnMut() -> Fut,
        Fut: Future,
    {
        let tz = self.schedule.timezone();
        info!(
            "Scheduler started. Next run: {}",
            self.next_run().with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z")
        );

        loop {
            if self.poll(Utc::now()) {
                job().await;
                // Re-anchor on completion time for runs that cross the trigger.
                self.next_run = self.schedule.next_after(Utc::now());
                info!(
                    "Next run: {}",
                    self.next_run().with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z")
                );
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
