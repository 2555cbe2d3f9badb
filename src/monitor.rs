use crate::notifier::{Alert, Notifier};
use crate::prober::Prober;
use crate::target::{TargetRegistry, TargetStatus, Transition};
use chrono::Local;
use std::time::{Duration, Instant};
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub checked: usize,
    pub up: usize,
    pub down: usize,
    pub transitions: usize,
    pub notifications_sent: usize,
}

/// Drives sweeps over the registry. This is the registry's only writer.
pub struct Monitor {
    targets: TargetRegistry,
    prober: Prober,
    notifier: Notifier,
}

impl Monitor {
    pub fn new(targets: TargetRegistry, prober: Prober, notifier: Notifier) -> Self {
        Self {
            targets,
            prober,
            notifier,
        }
    }

    pub fn targets(&self) -> &TargetRegistry {
        &self.targets
    }

    /// Sweeps immediately, then once per `period`. A sweep always finishes
    /// before the next tick is awaited; ticks missed while sweeping are
    /// dropped.
    pub async fn run(&self, period: Duration) {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }

    /// Probes every target in list order, one at a time.
    pub async fn sweep(&self) -> SweepSummary {
        let started = Instant::now();
        let mut summary = SweepSummary::default();
        if self.targets.is_empty().await {
            warn!("No targets configured, skipping sweep");
            return summary;
        }
        info!(started_at = %Local::now().to_rfc3339(), "Checking all servers");

        for index in 0..self.targets.len().await {
            let Some(report) = self.check_target(index).await else {
                continue;
            };

            summary.checked += 1;
            match report.status {
                TargetStatus::Up => summary.up += 1,
                TargetStatus::Down => summary.down += 1,
            }
            if report.transition.is_some() {
                summary.transitions += 1;
            }
            if report.notified {
                summary.notifications_sent += 1;
            }
        }

        info!(
            checked = summary.checked,
            up = summary.up,
            down = summary.down,
            notifications = summary.notifications_sent,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Sweep completed"
        );
        summary
    }

    /// Probes one target, applies the outcome and, on a transition, sends the
    /// alert before returning.
    pub async fn check_target(&self, index: usize) -> Option<CheckReport> {
        let target = self.targets.get(index).await?;
        let outcome = self.prober.probe(&target.name, &target.url).await;
        let (target, transition) = self.targets.record_probe(index, &outcome).await?;

        let mut notified = false;
        if let Some(transition) = &transition {
            let at = Local::now();
            let alert = Alert::new(&target, transition, at);
            match self.notifier.notify(&alert).await {
                Ok(()) => {
                    self.targets.mark_notified(index, at).await;
                    notified = true;
                    info!(target_name = %target.name, status = %alert.status, "Alert email sent");
                }
                Err(e) => {
                    error!(target_name = %target.name, status = %alert.status, error = %e, "Failed to send alert email");
                }
            }
        }

        info!(
            target_name = %target.name,
            status = %target.status(),
            failures = target.consecutive_failures,
            "Target checked"
        );

        Some(CheckReport {
            status: target.status(),
            consecutive_failures: target.consecutive_failures,
            transition,
            notified,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub status: TargetStatus,
    pub consecutive_failures: u32,
    pub transition: Option<Transition>,
    pub notified: bool,
}
