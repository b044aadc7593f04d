//! Core traits for the server registry
//!
//! This module defines the abstract interfaces to the registry's external
//! collaborators.
//!
//! - [`PersistencePort`]: Durable key-value storage
//! - [`ReachabilityProbe`]: Best-effort "does anything answer" checks
//! - [`Navigator`]: Open a URL in a browser
//! - [`ExportSink`]: Receive an exported payload

pub mod export_sink;
pub mod navigator;
pub mod persistence_port;
pub mod probe;

pub use export_sink::{EXPORT_FILENAME, ExportSink};
pub use navigator::{Navigator, SystemNavigator};
pub use persistence_port::{PersistencePort, PersistencePortFactory, SERVERS_KEY};
pub use probe::{Reachability, ReachabilityProbe, ReachabilityProbeFactory};
