use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::QuotaConfig;
use crate::error::{Result, SubtradError};
use crate::matrix::CooldownMatrix;

/// Install the process Ctrl-C handler. The returned token is cancelled on the
/// first interrupt and stays cancelled; a second interrupt exits immediately.
pub fn spawn_interrupt_listener() -> CancellationToken {
    let interrupt = CancellationToken::new();
    let trigger = interrupt.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for interrupt signal: {}", e);
            return;
        }
        warn!("🛑 Interrupt received, stopping (Ctrl-C again to exit now)");
        trigger.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    interrupt
}

/// `Interrupted` once the token has been cancelled
pub fn check_interrupt(interrupt: &CancellationToken) -> Result<()> {
    if interrupt.is_cancelled() {
        return Err(SubtradError::Interrupted);
    }
    Ok(())
}

/// Sleep for `duration` unless the interrupt token is, or becomes, cancelled
pub async fn sleep_interruptible(duration: Duration, interrupt: &CancellationToken) -> Result<()> {
    check_interrupt(interrupt)?;
    if duration.is_zero() {
        return Ok(());
    }

    tokio::select! {
        biased;
        _ = interrupt.cancelled() => Err(SubtradError::Interrupted),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Knows the daily wall-clock instant at which provider quotas replenish
#[derive(Debug, Clone)]
pub struct QuotaResetScheduler {
    reset_time: NaiveTime,
    timezone: Tz,
}

impl QuotaResetScheduler {
    pub fn new(reset_time: NaiveTime, timezone: Tz) -> Self {
        Self { reset_time, timezone }
    }

    pub fn from_config(config: &QuotaConfig) -> Result<Self> {
        Ok(Self::new(config.parsed_reset_time()?, config.parsed_timezone()?))
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Next occurrence of the reset time
    pub fn next_reset(&self) -> DateTime<Tz> {
        self.next_reset_after(Utc::now())
    }

    /// Today's reset if it is still ahead of `now`, else tomorrow's
    pub fn next_reset_after(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        let local_now = now.with_timezone(&self.timezone);
        let today = self.occurrence_on(local_now.date_naive());

        if today > local_now {
            today
        } else {
            let tomorrow = local_now.date_naive() + ChronoDuration::days(1);
            self.occurrence_on(tomorrow)
        }
    }

    pub fn wait_duration_from(&self, now: DateTime<Utc>) -> Duration {
        (self.next_reset_after(now).with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or_default()
    }

    /// Resolve the reset time on `date`. In a DST gap the first valid
    /// minute after it is used; in an overlap the earlier instant wins.
    fn occurrence_on(&self, date: NaiveDate) -> DateTime<Tz> {
        let mut naive = date.and_time(self.reset_time);
        for _ in 0..180 {
            if let Some(resolved) = self.timezone.from_local_datetime(&naive).earliest() {
                return resolved;
            }
            naive += ChronoDuration::minutes(1);
        }
        self.timezone.from_utc_datetime(&naive)
    }

    /// Sleep until the next reset, then clear every cooldown. The provider is
    /// not probed: quota is assumed to be back once the reset time passes.
    pub async fn await_reset(&self, matrix: &mut CooldownMatrix, interrupt: &CancellationToken) -> Result<()> {
        self.await_reset_from(Utc::now(), matrix, interrupt).await
    }

    pub async fn await_reset_from(
        &self,
        now: DateTime<Utc>,
        matrix: &mut CooldownMatrix,
        interrupt: &CancellationToken,
    ) -> Result<()> {
        let next_reset = self.next_reset_after(now);
        let wait = self.wait_duration_from(now);

        info!("❌ All API keys are cooling down (quota exceeded)");
        info!(
            "⏰ Next attempt: {} ({})",
            next_reset.format("%d/%m/%Y at %H:%M"),
            self.timezone
        );
        info!("💤 Sleeping for {:.1}h...", wait.as_secs_f64() / 3600.0);

        sleep_interruptible(wait, interrupt).await?;

        info!("✨ Awake, quota presumed reset");
        matrix.reset_all();
        Ok(())
    }
}
