//! Background timers that fire `periodicallyTrigger` pipelines.

use super::TriggerService;
use crate::cancellation::CancellationToken;
use crate::config::PipelineSettings;
use crate::core::Payload;
use crate::definition::{PipelineDefinition, PipelineDefinitionRegistry};
use crate::handlers::step_names;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Source label for scheduled runs.
pub const PERIODIC_TRIGGER_LABEL: &str = "periodicTrigger";

/// Timing of one scheduled pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Pipeline fired.
    pub pipeline_tag: String,
    /// Delay between runs.
    pub period: Duration,
    /// Run limit; 0 means unlimited.
    pub max_runs: u32,
}

impl Schedule {
    /// Builds the schedule for `definition` when its first step is
    /// `periodicallyTrigger`. `periodInSeconds` and `maxRuns` on that step
    /// override the defaults; unusable values fall back to them.
    #[must_use]
    pub fn for_definition(definition: &PipelineDefinition, default_period: Duration) -> Option<Self> {
        let step = definition.first_step().ok()?;
        if !step.is_named(step_names::PERIODIC_TRIGGER) {
            return None;
        }

        let period = match step.parameters.first_non_blank(&["periodInSeconds"]) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(seconds) if seconds > 0 => Duration::from_secs(seconds),
                _ => {
                    warn!(pipeline = %definition.tag, value = raw, "invalid periodInSeconds; using default");
                    default_period
                }
            },
            None => default_period,
        };

        let max_runs = match step.parameters.first_non_blank(&["maxRuns"]) {
            Some(raw) => raw.trim().parse::<u32>().unwrap_or_else(|_| {
                warn!(pipeline = %definition.tag, value = raw, "invalid maxRuns; running unlimited");
                0
            }),
            None => 0,
        };

        Some(Self {
            pipeline_tag: definition.tag.clone(),
            period,
            max_runs,
        })
    }

    fn exhausted(&self, runs: u32) -> bool {
        self.max_runs > 0 && runs >= self.max_runs
    }
}

/// Fires scheduled pipelines, one independent timer task per pipeline.
pub struct PeriodicScheduler {
    registry: Arc<PipelineDefinitionRegistry>,
    service: Arc<TriggerService>,
    settings: Arc<PipelineSettings>,
}

impl std::fmt::Debug for PeriodicScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicScheduler")
            .field("trigger_mode", &self.settings.ftp_detection.trigger_mode)
            .field("schedules", &self.schedules())
            .finish()
    }
}

impl PeriodicScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(
        registry: Arc<PipelineDefinitionRegistry>,
        service: Arc<TriggerService>,
        settings: Arc<PipelineSettings>,
    ) -> Self {
        Self {
            registry,
            service,
            settings,
        }
    }

    /// Schedules for every enabled pipeline that starts with
    /// `periodicallyTrigger`. Empty when the default period is not positive.
    #[must_use]
    pub fn schedules(&self) -> Vec<Schedule> {
        let Some(default_period) = self.settings.ftp_detection.period() else {
            return Vec::new();
        };
        self.registry
            .all()
            .iter()
            .filter_map(|def| Schedule::for_definition(def, default_period))
            .collect()
    }

    /// Runs every schedule until it hits its run limit or `cancel` fires.
    ///
    /// Returns the number of runs started.
    pub async fn run(&self, cancel: Arc<CancellationToken>) -> u32 {
        let mode = self.settings.ftp_detection.trigger_mode;
        if !mode.allows_scheduler() {
            info!(%mode, "background trigger disabled by trigger mode");
            return 0;
        }
        if self.settings.ftp_detection.period().is_none() {
            warn!(
                period_in_seconds = self.settings.ftp_detection.period_in_seconds,
                "background scheduling disabled"
            );
            return 0;
        }

        let schedules = self.schedules();
        if schedules.is_empty() {
            warn!("background scheduling skipped; no pipeline starts with periodicallyTrigger");
            return 0;
        }

        let mut tasks = Vec::with_capacity(schedules.len());
        for schedule in schedules {
            let Ok(definition) = self.registry.by_tag(&schedule.pipeline_tag) else {
                continue;
            };
            info!(
                pipeline = %schedule.pipeline_tag,
                period_seconds = schedule.period.as_secs(),
                max_runs = schedule.max_runs,
                "background schedule started"
            );
            tasks.push(tokio::spawn(run_schedule(
                self.service.clone(),
                definition.clone(),
                schedule,
                cancel.clone(),
            )));
        }

        let mut total = 0;
        for result in futures::future::join_all(tasks).await {
            match result {
                Ok(runs) => total += runs,
                Err(e) => warn!(error = %e, "schedule task aborted"),
            }
        }
        total
    }
}

async fn run_schedule(
    service: Arc<TriggerService>,
    definition: PipelineDefinition,
    schedule: Schedule,
    cancel: Arc<CancellationToken>,
) -> u32 {
    let mut runs = 0;
    while !cancel.is_cancelled() {
        if schedule.exhausted(runs) {
            info!(pipeline = %schedule.pipeline_tag, runs, "schedule reached maxRuns");
            break;
        }

        match service
            .publish_trigger(&definition, PERIODIC_TRIGGER_LABEL, Payload::new())
            .await
        {
            Ok(receipt) => {
                runs += 1;
                info!(
                    pipeline = %receipt.pipeline_tag,
                    iteration = receipt.iteration,
                    period_seconds = schedule.period.as_secs(),
                    "periodic trigger fired"
                );
            }
            Err(e) => warn!(pipeline = %schedule.pipeline_tag, error = %e, "periodic trigger failed"),
        }

        if cancel.sleep(schedule.period).await.is_err() {
            break;
        }
    }
    runs
}
