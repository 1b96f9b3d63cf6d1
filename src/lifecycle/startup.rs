//! Startup orchestration helpers.

use std::path::Path;
use std::sync::Arc;

use crate::config::ParameterConfig;
use crate::paraminfo::{CatalogSource, EmptySource, ParameterSource, SourceError};

/// Build the parameter source named by the configuration.
///
/// A configured catalog that cannot be read is a startup error; no catalog
/// at all means every device registers with an empty description.
pub fn build_source(config: &ParameterConfig) -> Result<Arc<dyn ParameterSource>, SourceError> {
    match &config.catalog_path {
        Some(path) => Ok(Arc::new(CatalogSource::load(Path::new(path))?)),
        None => {
            tracing::warn!("No parameter catalog configured; devices get empty descriptions");
            Ok(Arc::new(EmptySource))
        }
    }
}
