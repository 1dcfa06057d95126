//! Synthetic progress for documents being analyzed.
//!
//! The analysis service reports nothing until it answers, so progress and
//! milestones are simulated on timers. The simulated value never reaches 100:
//! only the dispatcher's settlement patch does that.

use std::time::Duration;

use rand::Rng;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::models::{started_steps, DocumentId, DocumentStatus, RunToken, StepState, STEP_COUNT};
use crate::registry::{DocumentPatch, DocumentRegistry, TimerSet, UpdateOutcome, WeakRegistry};

/// Timing and bounds of the simulated progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressConfig {
    pub tick: Duration,
    pub increment_min: u8,
    pub increment_max: u8,
    /// Progress shown as soon as analysis starts.
    pub floor: u8,
    /// Highest simulated value, always below 100.
    pub cap: u8,
    /// Delays after start at which `extract`, `analyze` and `finalize`
    /// become active.
    pub milestones: [Duration; STEP_COUNT - 1],
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(700),
            increment_min: 2,
            increment_max: 7,
            floor: 5,
            cap: 90,
            milestones: [
                Duration::from_millis(1500),
                Duration::from_millis(4000),
                Duration::from_millis(7500),
            ],
        }
    }
}

impl ProgressConfig {
    /// Clamp values into a consistent range.
    pub fn normalized(mut self) -> Self {
        self.cap = self.cap.min(99);
        self.floor = self.floor.min(self.cap);
        self.increment_min = self.increment_min.max(1);
        self.increment_max = self.increment_max.max(self.increment_min);
        if self.tick.is_zero() {
            self.tick = Duration::from_millis(1);
        }
        self.milestones.sort();
        self
    }
}

/// Drives progress timers through the registry.
#[derive(Debug, Clone, Default)]
pub struct ProgressSimulator {
    config: ProgressConfig,
}

impl ProgressSimulator {
    pub fn new(config: ProgressConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    /// Start simulating progress for `token`'s attempt.
    ///
    /// Does nothing unless the document is loading under `token`.
    pub fn start(&self, registry: &DocumentRegistry, id: DocumentId, token: RunToken) -> bool {
        let floor = self.config.floor;
        let outcome = registry.update(id, |doc| {
            (doc.is_current(token) && doc.status == DocumentStatus::Loading).then(|| {
                DocumentPatch::new()
                    .progress(floor)
                    .steps(started_steps())
            })
        });
        if !outcome.is_applied() {
            debug!("Not starting progress for {} ({:?})", id, outcome);
            return false;
        }

        let weak = registry.downgrade();
        let mut timers = TimerSet::new(token);
        timers.push(tokio::spawn(tick_loop(
            weak.clone(),
            id,
            token,
            self.config.clone(),
        )));
        for (index, delay) in self.config.milestones.iter().enumerate() {
            timers.push(tokio::spawn(milestone(
                weak.clone(),
                id,
                token,
                index + 1,
                *delay,
            )));
        }

        registry.attach_timers(id, timers)
    }

    /// Stop the timers of `token`'s attempt. A newer attempt's timers are
    /// left alone.
    pub fn stop(&self, registry: &DocumentRegistry, id: DocumentId, token: RunToken) -> bool {
        registry.cancel_timers(id, token)
    }
}

async fn tick_loop(weak: WeakRegistry, id: DocumentId, token: RunToken, config: ProgressConfig) {
    let mut interval = tokio::time::interval(config.tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(registry) = weak.upgrade() else {
            break;
        };

        let increment = rand::thread_rng().gen_range(config.increment_min..=config.increment_max);
        let mut stale = false;
        let outcome = registry.update(id, |doc| {
            if !doc.is_current(token) || doc.status != DocumentStatus::Loading {
                stale = true;
                return None;
            }
            let next = doc
                .analysis_progress
                .saturating_add(increment)
                .min(config.cap);
            (next > doc.analysis_progress).then(|| DocumentPatch::new().progress(next))
        });

        if stale || outcome == UpdateOutcome::Missing {
            break;
        }
    }
}

async fn milestone(
    weak: WeakRegistry,
    id: DocumentId,
    token: RunToken,
    target: usize,
    delay: Duration,
) {
    tokio::time::sleep(delay).await;
    let Some(registry) = weak.upgrade() else {
        return;
    };

    registry.update(id, |doc| {
        if !doc.is_current(token) || doc.status != DocumentStatus::Loading {
            return None;
        }
        let mut steps = doc.analysis_steps.clone();
        for step in steps.iter_mut().take(target) {
            step.state = StepState::Completed;
        }
        if steps[target].state == StepState::Pending {
            steps[target].state = StepState::Active;
        }
        (steps != doc.analysis_steps).then(|| DocumentPatch::new().steps(steps))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::completed_steps;
    use crate::registry::{BlobStore, NewDocument};

    fn loading_document() -> (tempfile::TempDir, DocumentRegistry, DocumentId, RunToken) {
        let dir = tempfile::tempdir().unwrap();
        let registry = DocumentRegistry::with_blob_store(BlobStore::in_dir(dir.path()));
        let id = registry
            .add(vec![NewDocument::local("a.pdf", &b"%PDF-1.4"[..])])
            .unwrap()[0]
            .id;
        let token = RunToken::mint();
        registry.patch(
            id,
            DocumentPatch::new()
                .status(DocumentStatus::Queued)
                .run_token(Some(token)),
        );
        registry.patch(id, DocumentPatch::new().status(DocumentStatus::Loading));
        (dir, registry, id, token)
    }

    fn states(registry: &DocumentRegistry, id: DocumentId) -> Vec<StepState> {
        registry
            .get(id)
            .unwrap()
            .analysis_steps
            .iter()
            .map(|s| s.state)
            .collect()
    }

    #[test]
    fn test_config_normalized() {
        let config = ProgressConfig {
            cap: 150,
            floor: 120,
            increment_min: 0,
            increment_max: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.cap, 99);
        assert_eq!(config.floor, 99);
        assert_eq!(config.increment_min, 1);
        assert_eq!(config.increment_max, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_stays_below_cap() {
        let (_dir, registry, id, token) = loading_document();
        let simulator = ProgressSimulator::default();

        assert!(simulator.start(&registry, id, token));
        let doc = registry.get(id).unwrap();
        assert_eq!(doc.analysis_progress, 5);
        assert_eq!(
            states(&registry, id),
            [
                StepState::Active,
                StepState::Pending,
                StepState::Pending,
                StepState::Pending
            ]
        );

        let mut last = 5;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(700)).await;
            let progress = registry.get(id).unwrap().analysis_progress;
            assert!(progress >= last);
            assert!(progress <= 90);
            last = progress;
        }
        assert_eq!(last, 90);
    }

    #[tokio::test(start_paused = true)]
    async fn test_milestones_advance_in_order() {
        let (_dir, registry, id, token) = loading_document();
        let simulator = ProgressSimulator::default();
        simulator.start(&registry, id, token);

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(
            states(&registry, id),
            [
                StepState::Completed,
                StepState::Active,
                StepState::Pending,
                StepState::Pending
            ]
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            states(&registry, id),
            [
                StepState::Completed,
                StepState::Completed,
                StepState::Completed,
                StepState::Active
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_stale_milestones() {
        let (_dir, registry, id, token) = loading_document();
        let simulator = ProgressSimulator::default();
        simulator.start(&registry, id, token);

        registry.patch_if_current(
            id,
            token,
            DocumentPatch::new()
                .status(DocumentStatus::Success)
                .progress(100)
                .steps(completed_steps())
                .run_token(None),
        );
        assert!(simulator.stop(&registry, id, token));
        assert!(!registry.has_timers(id));

        tokio::time::sleep(Duration::from_secs(30)).await;
        let doc = registry.get(id).unwrap();
        assert_eq!(doc.analysis_progress, 100);
        assert_eq!(doc.analysis_steps, completed_steps());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_token_does_not_start_or_stop() {
        let (_dir, registry, id, token) = loading_document();
        let simulator = ProgressSimulator::default();

        assert!(!simulator.start(&registry, id, RunToken::mint()));
        assert!(!registry.has_timers(id));

        assert!(simulator.start(&registry, id, token));
        assert!(!simulator.stop(&registry, id, RunToken::mint()));
        assert!(registry.has_timers(id));
    }
}
