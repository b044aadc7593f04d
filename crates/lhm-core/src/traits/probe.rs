// # Reachability Probe Trait
//
// Defines the interface for best-effort reachability checks.
//
// ## Semantics
//
// A probe answers one question: did *anything* answer at this URL? It never
// fails. Timeouts, refused connections, DNS and TLS failures all collapse to
// `Reachability::Unreachable`. A reachable result says nothing about the
// health of the endpoint (a 500 response is still "reachable").
//
// ## Implementations
//
// - HTTP HEAD: `lhm-probe-http` crate
// - Test doubles: gated probes in the contract tests

use async_trait::async_trait;

/// Outcome of a single reachability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reachability {
    /// Some response was obtained
    Reachable,
    /// The request did not complete
    Unreachable,
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

impl From<bool> for Reachability {
    fn from(reachable: bool) -> Self {
        if reachable {
            Self::Reachable
        } else {
            Self::Unreachable
        }
    }
}

/// Trait for reachability probe implementations
///
/// # Responsibilities
///
/// - ✅ Issue one request per call, without caching
/// - ✅ Map every transport outcome to a [`Reachability`]
/// - ❌ Retry, schedule or correlate results (owned by `StatusMonitor`)
/// - ❌ Inspect response status or body
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Probe a fully-formed URL
    async fn probe(&self, url: &str) -> Reachability;

    /// Short name used in logs
    fn probe_name(&self) -> &'static str;
}

/// Helper trait for constructing probes from configuration
pub trait ReachabilityProbeFactory: Send + Sync {
    /// Create a ReachabilityProbe instance from configuration
    fn create(
        &self,
        config: &crate::config::ProbeConfig,
    ) -> Result<Box<dyn ReachabilityProbe>, crate::Error>;
}
