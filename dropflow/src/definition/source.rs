//! Where definitions come from.

use super::{DefinitionDocument, PipelineDefinition};
use crate::config::PipelineDefinitionSettings;
use crate::errors::ConfigError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Supplies the raw definition set. Called once at startup.
pub trait DefinitionSource: Send + Sync {
    /// Loads every definition, enabled or not.
    fn load(&self) -> Result<Vec<PipelineDefinition>, ConfigError>;
}

/// Reads one definition per JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileDefinitionSource {
    files: Vec<PathBuf>,
}

impl JsonFileDefinitionSource {
    /// Creates a source over explicit paths.
    #[must_use]
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    /// Resolves configured file names. `fileNames` takes precedence over
    /// `fileName`; relative paths are joined onto the base directory.
    pub fn from_settings(settings: &PipelineDefinitionSettings) -> Result<Self, ConfigError> {
        let names: Vec<&str> = if settings.file_names.iter().any(|n| !n.trim().is_empty()) {
            settings.file_names.iter().map(String::as_str).collect()
        } else {
            settings
                .file_name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .into_iter()
                .collect()
        };

        if names.is_empty() {
            return Err(ConfigError::NoDefinitionFiles);
        }

        let base = settings
            .base_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let files = names
            .into_iter()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| resolve_path(&base, n))
            .collect();
        Ok(Self::new(files))
    }

    /// Paths this source reads.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn load_file(path: &Path) -> Result<Option<PipelineDefinition>, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document = DefinitionDocument::from_json(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if !document.enabled {
            debug!(tag = %document.tag, path = %path.display(), "skipping disabled pipeline definition");
            return Ok(None);
        }

        let definition = document.into_definition()?;
        info!(
            tag = %definition.tag,
            steps = definition.steps.len(),
            path = %path.display(),
            "pipeline definition loaded"
        );
        Ok(Some(definition))
    }
}

fn resolve_path(base: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl DefinitionSource for JsonFileDefinitionSource {
    fn load(&self) -> Result<Vec<PipelineDefinition>, ConfigError> {
        let mut definitions = Vec::with_capacity(self.files.len());
        for path in &self.files {
            if let Some(definition) = Self::load_file(path)? {
                definitions.push(definition);
            }
        }
        Ok(definitions)
    }
}

/// In-memory definitions, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDefinitionSource {
    definitions: Vec<PipelineDefinition>,
}

impl StaticDefinitionSource {
    /// Wraps a fixed definition set.
    #[must_use]
    pub fn new(definitions: Vec<PipelineDefinition>) -> Self {
        Self { definitions }
    }
}

impl DefinitionSource for StaticDefinitionSource {
    fn load(&self) -> Result<Vec<PipelineDefinition>, ConfigError> {
        Ok(self.definitions.clone())
    }
}
