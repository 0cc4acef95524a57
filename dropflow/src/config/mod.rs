//! Process settings, read once from a JSON file at startup.

mod settings;

pub use settings::{
    DeduplicationSettings, FtpConnectionSettings, FtpDetectionSettings, HandlerSettings,
    LoggingSettings, PipelineDefinitionSettings, PipelineSettings, SinkSettings,
    StateStoreSettings, StoragePathsSettings, TriggerMode,
};
