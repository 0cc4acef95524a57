//! Operator-initiated runs targeted by pipeline tag or step type.

use super::{TriggerReceipt, TriggerService};
use crate::config::TriggerMode;
use crate::core::{payload_keys, Payload};
use crate::definition::{PipelineDefinition, PipelineDefinitionRegistry};
use crate::errors::TriggerError;
use crate::handlers::step_names;
use std::sync::Arc;
use tracing::{info, warn};

/// Source label for operator-initiated runs.
pub const MANUAL_TRIGGER_LABEL: &str = "manualTrigger";

/// Which pipelines a manual trigger starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerTarget {
    /// Exactly the pipeline with this tag.
    Tag(String),
    /// Every enabled pipeline containing a step of this type.
    StepType(String),
}

/// On-demand runs requested by an operator.
#[derive(Debug)]
pub struct ManualTrigger {
    registry: Arc<PipelineDefinitionRegistry>,
    service: Arc<TriggerService>,
    mode: TriggerMode,
}

impl ManualTrigger {
    /// Creates a manual trigger honouring `mode`.
    #[must_use]
    pub fn new(
        registry: Arc<PipelineDefinitionRegistry>,
        service: Arc<TriggerService>,
        mode: TriggerMode,
    ) -> Self {
        Self {
            registry,
            service,
            mode,
        }
    }

    /// Starts one run per matched pipeline, each carrying `payload`.
    pub async fn trigger(
        &self,
        target: &TriggerTarget,
        payload: Payload,
    ) -> Result<Vec<TriggerReceipt>, TriggerError> {
        if !self.mode.allows_manual() {
            return Err(TriggerError::ManualDisabled);
        }

        let definitions = self.resolve(target)?;
        if definitions.is_empty() {
            warn!(?target, "manual trigger matched no pipeline");
        }

        let mut receipts = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let receipt = self
                .service
                .publish_trigger(definition, MANUAL_TRIGGER_LABEL, payload.clone())
                .await?;
            receipts.push(receipt);
        }

        info!(?target, runs = receipts.len(), "manual trigger published");
        Ok(receipts)
    }

    /// Re-runs ingestion for one remote file. With a tag only that pipeline
    /// runs; otherwise every pipeline with an `ftpScan` step does.
    pub async fn trigger_file(
        &self,
        file_name: &str,
        pipeline_tag: Option<&str>,
    ) -> Result<Vec<TriggerReceipt>, TriggerError> {
        let target = match pipeline_tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(tag) => TriggerTarget::Tag(tag.to_string()),
            None => TriggerTarget::StepType(step_names::FTP_SCAN.to_string()),
        };
        let mut payload = Payload::new();
        payload.insert(payload_keys::FILE_NAME.to_string(), file_name.to_string());
        self.trigger(&target, payload).await
    }

    fn resolve(&self, target: &TriggerTarget) -> Result<Vec<&PipelineDefinition>, TriggerError> {
        Ok(match target {
            TriggerTarget::Tag(tag) => vec![self.registry.by_tag(tag)?],
            TriggerTarget::StepType(name) => self.registry.definitions_with_step(name),
        })
    }
}
