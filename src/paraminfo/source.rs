//! Parameter description sources.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::paraminfo::types::AllInfo;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("no description for plugin '{0}'")]
    UnknownPlugin(String),
    #[error("parameter source unavailable")]
    Unavailable,
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Produces the parameter description of a plugin.
///
/// Implementations may block (native introspection, file access).
pub trait ParameterSource: Send + Sync + 'static {
    fn describe(&self, plugin_uri: &str) -> Result<AllInfo, SourceError>;
}

/// Run `describe` on the blocking pool.
pub async fn describe_blocking(
    source: Arc<dyn ParameterSource>,
    plugin_uri: &str,
) -> Result<AllInfo, SourceError> {
    let uri = plugin_uri.to_string();
    tokio::task::spawn_blocking(move || source.describe(&uri))
        .await
        .unwrap_or(Err(SourceError::Unavailable))
}

/// Source with nothing behind it.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySource;

impl ParameterSource for EmptySource {
    fn describe(&self, _plugin_uri: &str) -> Result<AllInfo, SourceError> {
        Err(SourceError::Unavailable)
    }
}

/// Descriptions loaded from a JSON object keyed by plugin URI.
#[derive(Debug, Default, Clone)]
pub struct CatalogSource {
    plugins: HashMap<String, AllInfo>,
}

impl CatalogSource {
    pub fn new(plugins: HashMap<String, AllInfo>) -> Self {
        Self { plugins }
    }

    pub fn from_json(text: &str) -> Result<Self, SourceError> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let catalog = Self::from_json(&fs::read_to_string(path)?)?;
        tracing::info!(
            path = %path.display(),
            plugins = catalog.plugins.len(),
            "Parameter catalog loaded"
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl ParameterSource for CatalogSource {
    fn describe(&self, plugin_uri: &str) -> Result<AllInfo, SourceError> {
        self.plugins
            .get(plugin_uri)
            .cloned()
            .ok_or_else(|| SourceError::UnknownPlugin(plugin_uri.to_string()))
    }
}
