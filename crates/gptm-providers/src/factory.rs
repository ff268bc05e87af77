//! Provider factory — picks and builds the backend named by the config.

use std::sync::Arc;

use tracing::debug;

use gptm_core::config::{BackendKind, Config};
use gptm_core::error::{ProviderError, Result};

use crate::local::LocalProvider;
use crate::remote::RemoteClient;
use crate::traits::Provider;

/// Build the provider selected by `config.backend`.
///
/// Only presence is validated; a wrong key or unreachable URL surfaces on the
/// first call. There is no failover between backends.
pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    match config.backend {
        BackendKind::Local => {
            let local = &config.local;
            if local.base_url.trim().is_empty() {
                return Err(ProviderError::Config(
                    "local backend requires local.baseUrl".to_string(),
                ));
            }
            debug!(
                base_url = %local.base_url,
                model = %local.default_model,
                "Creating local provider"
            );
            Ok(Arc::new(LocalProvider::new(local)?))
        }
        BackendKind::Remote => {
            let remote = &config.remote;
            if !remote.is_configured() {
                return Err(ProviderError::Config(
                    "remote backend requires remote.apiKey (or GPTM_REMOTE__API_KEY)".to_string(),
                ));
            }
            if remote.model.trim().is_empty() {
                return Err(ProviderError::Config(
                    "remote backend requires remote.model".to_string(),
                ));
            }
            debug!(
                base_url = %remote.base_url,
                model = %remote.model,
                max_retries = remote.max_retries,
                "Creating remote provider"
            );
            Ok(Arc::new(RemoteClient::new(remote)?))
        }
    }
}
