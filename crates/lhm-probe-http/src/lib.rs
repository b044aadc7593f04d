// # HTTP Reachability Probe
//
// This crate provides the HTTP transport for the localhost server registry's
// status checks.
//
// ## Behavior
//
// Each probe sends a single `HEAD` request with caching disabled
// (`Cache-Control: no-cache`, `Pragma: no-cache`). Redirects are not
// followed: a redirect is already an answer.
//
// Any HTTP response, whatever its status code, means the server is
// reachable. Connection errors, TLS failures and the transport timeout all
// mean it is not. The probe never returns an error to its caller.

use lhm_core::BackendRegistry;
use lhm_core::config::ProbeConfig;
use lhm_core::traits::{Reachability, ReachabilityProbe, ReachabilityProbeFactory};
use lhm_core::{Error, Result};

use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue, PRAGMA};
use reqwest::redirect::Policy;

/// Backend name under which [`register`] installs the probe
pub const BACKEND_NAME: &str = "http";

/// Reachability probe issuing `HEAD` requests
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    /// Create a probe whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Transport timeout of a single probe
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait::async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Reachability {
        match self.client.head(url).send().await {
            Ok(response) => {
                tracing::trace!("{} answered {}", url, response.status());
                Reachability::Reachable
            }
            Err(e) => {
                // Timeouts and refused connections are the common case for
                // servers that are simply not running.
                tracing::debug!("{} not reachable: {}", url, e);
                Reachability::Unreachable
            }
        }
    }

    fn probe_name(&self) -> &'static str {
        BACKEND_NAME
    }
}

/// Factory for creating HTTP probes
pub struct HttpProbeFactory;

impl ReachabilityProbeFactory for HttpProbeFactory {
    fn create(&self, config: &ProbeConfig) -> Result<Box<dyn ReachabilityProbe>> {
        config.validate()?;
        let probe = HttpProbe::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Box::new(probe))
    }
}

/// Register the HTTP probe with a backend registry
pub fn register(registry: &BackendRegistry) {
    registry.register_probe(BACKEND_NAME, Box::new(HttpProbeFactory));
}
