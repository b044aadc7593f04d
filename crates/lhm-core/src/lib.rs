// # lhm-core
//
// Core library for the localhost server registry.
//
// ## Architecture Overview
//
// This library keeps a small, locally persisted list of named endpoints
// (host, port, scheme) and everything needed to manage it:
// - **ServerRecord**: The single entity; its url is always derived
// - **RegistryStore**: Ordered in-memory registry, mirrored to a PersistencePort
// - **StatusMonitor**: Concurrent, best-effort reachability probes
// - **bulk**: Export to and validated import from JSON text
// - **BackendRegistry**: Plugin-based registry for storage and probe backends
//
// ## Design Principles
//
// 1. **Memory First**: Mutations are visible before their durable write completes
// 2. **Whole-Value Persistence**: The stored mirror is always overwritten, never patched
// 3. **Advisory Probing**: Probe results never fail and never outlive their server
// 4. **Library-First**: The CLI is a thin presentation layer over this crate

pub mod backends;
pub mod bulk;
pub mod config;
pub mod error;
pub mod id;
pub mod model;
pub mod persistence;
pub mod probe;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use backends::BackendRegistry;
pub use bulk::{ImportOutcome, ImportPlan};
pub use config::{ManagerConfig, ProbeConfig, StorageConfig};
pub use error::{Error, Result};
pub use id::IdGenerator;
pub use model::{Scheme, ServerId, ServerRecord};
pub use persistence::{FilePort, MemoryPort};
pub use probe::{ProbeOutcome, ProbeStatus, StatusMonitor, StatusUpdate};
pub use store::{RegistryEvent, RegistryStore};
pub use traits::{ExportSink, Navigator, PersistencePort, Reachability, ReachabilityProbe};
