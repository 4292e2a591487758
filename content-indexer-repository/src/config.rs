//! Configuration types for the SearchEngineService.

/// Configuration for the SearchEngineService.
///
/// Controls how large a single request to the engine may get. Larger inputs
/// are split into consecutive chunks of at most `max_batch_size` documents.
#[derive(Debug, Clone)]
pub struct SearchEngineServiceConfig {
    /// Maximum number of documents sent to the engine in one request.
    ///
    /// `None` sends every batch in a single request. Defaults to 1000.
    pub max_batch_size: Option<usize>,
}

impl Default for SearchEngineServiceConfig {
    fn default() -> Self {
        Self {
            max_batch_size: Some(1000),
        }
    }
}

impl SearchEngineServiceConfig {
    /// Create a config with no batch size limit.
    ///
    /// # Warning
    ///
    /// A single request per batch can time out on large rebuilds.
    ///
    /// # Returns
    ///
    /// A `SearchEngineServiceConfig` with `max_batch_size` set to `None`.
    pub fn unlimited() -> Self {
        Self {
            max_batch_size: None,
        }
    }

    /// Create a config with a custom batch size limit.
    ///
    /// # Arguments
    ///
    /// * `max_batch_size` - Maximum number of documents per engine request; zero is
    ///   treated as one
    ///
    /// # Returns
    ///
    /// A `SearchEngineServiceConfig` with the specified batch size limit.
    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: Some(max_batch_size.max(1)),
        }
    }
}
