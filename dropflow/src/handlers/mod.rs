//! Step handlers and the shared dispatch boundary.
//!
//! A handler implements one step type (`ftpScan`, `log`, ...). It may serve
//! many pipelines at once: it subscribes to every topic that feeds its step
//! name and learns which pipeline a message belongs to from the topic. The
//! [`StepDispatcher`] resolves that context, runs the handler, and turns
//! every outcome (including failures) into a logged, acknowledged message.

mod context;
mod dependencies;
mod dispatch;
mod ftp_scan;
#[cfg(test)]
mod handler_tests;
mod log_message;
mod log_sink;
mod parse_csv;
#[cfg(feature = "http")]
mod post_to;

pub use context::StepContext;
pub use dependencies::{default_handlers, HandlerDependencies};
pub use dispatch::{DispatchReport, StepDispatcher};
pub use ftp_scan::{FtpScanHandler, ScanOptions};
pub use log_message::LogMessageHandler;
pub use log_sink::LogSinkHandler;
pub use parse_csv::{parse_csv, CsvOptions, ParseCsvHandler};
#[cfg(feature = "http")]
pub use post_to::PostToHandler;

use crate::cancellation::CancellationToken;
use crate::core::{PipelineEvent, StepOutcome, Topic};
use crate::definition::PipelineDefinitionRegistry;
use crate::errors::StepError;
use async_trait::async_trait;

/// Built-in step type keys.
pub mod step_names {
    /// Entry step fired by the periodic scheduler.
    pub const PERIODIC_TRIGGER: &str = "periodicallyTrigger";
    /// Remote file detection and staging.
    pub const FTP_SCAN: &str = "ftpScan";
    /// CSV to JSON conversion.
    pub const PARSE_CSV: &str = "parseCsvToJsonArray";
    /// Parsed document sink.
    pub const LOG: &str = "log";
    /// Free-form log line.
    pub const LOG_MESSAGE: &str = "logMessage";
    /// HTTP forwarder.
    pub const POST_TO: &str = "postTo";
}

/// One step type's implementation.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// The step type key this handler serves.
    fn step_name(&self) -> &str;

    /// Topics to subscribe. Defaults to every topic that feeds a step of
    /// this type in any enabled pipeline.
    fn topics(&self, registry: &PipelineDefinitionRegistry) -> Vec<Topic> {
        registry.all_input_topics(self.step_name())
    }

    /// Disabled handlers are never subscribed.
    fn enabled(&self) -> bool {
        true
    }

    /// Processes one message whose context has already been resolved.
    async fn handle(
        &self,
        ctx: &StepContext,
        event: &PipelineEvent,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, StepError>;
}
