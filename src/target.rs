use crate::prober::{ProbeError, ProbeOutcome};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetStatus {
    Up,
    Down,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Up => "UP",
            TargetStatus::Down => "DOWN",
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change of classification caused by one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    WentDown { error: ProbeError },
    Recovered,
}

impl Transition {
    pub fn status(&self) -> TargetStatus {
        match self {
            Transition::WentDown { .. } => TargetStatus::Down,
            Transition::Recovered => TargetStatus::Up,
        }
    }

    pub fn error(&self) -> Option<&ProbeError> {
        match self {
            Transition::WentDown { error } => Some(error),
            Transition::Recovered => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    pub url: String,
    pub is_down: bool,
    pub last_notified: Option<DateTime<Local>>,
    pub consecutive_failures: u32,
}

impl Target {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            is_down: false,
            last_notified: None,
            consecutive_failures: 0,
        }
    }

    pub fn status(&self) -> TargetStatus {
        if self.is_down {
            TargetStatus::Down
        } else {
            TargetStatus::Up
        }
    }

    /// Applies the latest probe. `is_down` follows that probe alone, so a
    /// single failure flips an UP target. Returns the transition, if any.
    pub fn apply(&mut self, outcome: &ProbeOutcome) -> Option<Transition> {
        match outcome {
            ProbeOutcome::Success => {
                self.consecutive_failures = 0;
                if self.is_down {
                    self.is_down = false;
                    Some(Transition::Recovered)
                } else {
                    None
                }
            }
            ProbeOutcome::Failure(error) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.is_down {
                    None
                } else {
                    self.is_down = true;
                    Some(Transition::WentDown {
                        error: error.clone(),
                    })
                }
            }
        }
    }
}

/// The endpoints watched by this deployment, in sweep and report order.
pub fn default_targets() -> Vec<Target> {
    vec![
        Target::new("DMS Server", "https://dms.bzsconnect.com"),
        Target::new("Moja Server", "https://moja.bzsconnect.com/"),
        Target::new("Zatca Server", "https://zatca.bzsconnect.com"),
        Target::new("Marriage Experts Server", "https://marriage.bzsconnect.com"),
        Target::new("Quickdoc Api Server", "https://quickdoc-api.vercel.app"),
        Target::new("Quickdoc Server", "https://quickdoc-server.vercel.app"),
    ]
}

/// Formats a local timestamp the way the status page and alert emails show
/// it, e.g. `3/14/2025, 9:05:07 AM`.
pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

/// Shared, fixed-size set of targets. The monitor is the only writer; locks
/// are held for in-memory updates only, never across network I/O.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    targets: Arc<RwLock<Vec<Target>>>,
}

impl TargetRegistry {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets: Arc::new(RwLock::new(targets)),
        }
    }

    pub async fn len(&self) -> usize {
        self.targets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.targets.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<Target> {
        self.targets.read().await.clone()
    }

    pub async fn get(&self, index: usize) -> Option<Target> {
        self.targets.read().await.get(index).cloned()
    }

    /// Applies a probe outcome to the target at `index` and returns the
    /// updated target alongside any transition.
    pub async fn record_probe(
        &self,
        index: usize,
        outcome: &ProbeOutcome,
    ) -> Option<(Target, Option<Transition>)> {
        let mut targets = self.targets.write().await;
        let target = targets.get_mut(index)?;
        let transition = target.apply(outcome);
        Some((target.clone(), transition))
    }

    pub async fn mark_notified(&self, index: usize, at: DateTime<Local>) {
        if let Some(target) = self.targets.write().await.get_mut(index) {
            target.last_notified = Some(at);
        }
    }
}
