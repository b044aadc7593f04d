// # Export Sink Trait
//
// Receives an exported registry payload together with a suggested filename.
// The registry does not observe what happens afterwards.

use async_trait::async_trait;

/// Suggested filename for exported registries
pub const EXPORT_FILENAME: &str = "localhost-manager-config.json";

/// Trait for export sinks
#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Deliver `payload`, suggesting `filename` as its name
    async fn deliver(&self, payload: &str, filename: &str) -> Result<(), crate::Error>;
}
