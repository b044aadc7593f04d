// # lhm - Localhost Manager
//
// Command-line front end for the localhost server registry.
//
// This binary is a thin presentation layer. Validation, persistence, probing
// and import rules all live in lhm-core; this crate only:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Creates backends through the BackendRegistry
// 4. Runs one command and maps its result to an exit code
//
// ## Configuration
//
// - `LHM_STORAGE_TYPE`: Storage backend (file, memory). Default: file
// - `LHM_STORAGE_PATH`: Storage file. Default: <data dir>/localhost-manager/storage.json
// - `LHM_PROBE_TIMEOUT_SECS`: Reachability timeout, 1 to 120. Default: 5
// - `LHM_LOG_LEVEL`: trace, debug, info, warn, error. Default: warn
//
// ## Example
//
// ```bash
// lhm add --port 5173 --label Vite
// lhm status
// lhm export --output - > servers.json
// ```

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use lhm_core::config::MAX_PROBE_TIMEOUT_SECS;
use lhm_core::{ManagerConfig, ProbeConfig, StorageConfig};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, debug, error};
use tracing_subscriber::FmtSubscriber;

use crate::cli::Args;
use crate::commands::{Context, Outcome};

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy)]
enum LhmExitCode {
    /// Command completed
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// The command failed
    RuntimeError = 2,
    /// The user declined a confirmation
    Declined = 3,
}

impl From<LhmExitCode> for ExitCode {
    fn from(code: LhmExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<Outcome> for LhmExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => Self::Success,
            Outcome::Declined => Self::Declined,
        }
    }
}

const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Application configuration
#[derive(Debug)]
struct Config {
    storage_type: String,
    storage_path: Option<String>,
    probe_timeout_secs: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            storage_type: lookup("LHM_STORAGE_TYPE").unwrap_or_else(|| "file".to_string()),
            storage_path: lookup("LHM_STORAGE_PATH"),
            probe_timeout_secs: lookup("LHM_PROBE_TIMEOUT_SECS"),
            log_level: lookup("LHM_LOG_LEVEL").unwrap_or_else(|| "warn".to_string()),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.storage_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "LHM_STORAGE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.storage_type
            ),
        }

        if self.storage_path.as_ref().is_some_and(|p| p.trim().is_empty()) {
            anyhow::bail!("LHM_STORAGE_PATH cannot be empty when set");
        }

        self.probe_timeout()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "LHM_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn probe_timeout(&self) -> Result<u64> {
        let Some(raw) = &self.probe_timeout_secs else {
            return Ok(DEFAULT_PROBE_TIMEOUT_SECS);
        };

        match raw.trim().parse::<u64>() {
            Ok(secs) if (1..=MAX_PROBE_TIMEOUT_SECS).contains(&secs) => Ok(secs),
            _ => anyhow::bail!(
                "LHM_PROBE_TIMEOUT_SECS must be between 1 and {} seconds. Got: {}",
                MAX_PROBE_TIMEOUT_SECS,
                raw
            ),
        }
    }

    fn storage_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.storage_path {
            return Ok(PathBuf::from(path));
        }

        let data_dir = dirs::data_dir().ok_or_else(|| {
            anyhow::anyhow!(
                "Could not determine the data directory. \
                Set it via: export LHM_STORAGE_PATH=/path/to/storage.json"
            )
        })?;
        Ok(data_dir.join("localhost-manager").join("storage.json"))
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    }

    /// Build the library configuration
    fn to_manager_config(&self) -> Result<ManagerConfig> {
        let storage = match self.storage_type.as_str() {
            "memory" => StorageConfig::Memory,
            _ => StorageConfig::File {
                path: self.storage_path()?.to_string_lossy().into_owned(),
            },
        };

        let config = ManagerConfig {
            storage,
            probe: ProbeConfig {
                timeout_secs: self.probe_timeout()?,
                ..ProbeConfig::default()
            },
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = Config::from_env();
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return LhmExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return LhmExitCode::ConfigError.into();
    }

    let manager_config = match config.to_manager_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return LhmExitCode::ConfigError.into();
        }
    };
    debug!("Using {:?}", manager_config);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return LhmExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        let context = match Context::open(manager_config).await {
            Ok(context) => context,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return LhmExitCode::RuntimeError;
            }
        };

        match context.run(args.command).await {
            Ok(outcome) => outcome.into(),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                LhmExitCode::RuntimeError
            }
        }
    });

    code.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);

        assert!(config.validate().is_ok());
        assert_eq!(config.storage_type, "file");
        assert_eq!(config.probe_timeout().unwrap(), 5);
        assert_eq!(config.log_level(), Level::WARN);
    }

    #[test]
    fn test_memory_storage() {
        let config = config(&[("LHM_STORAGE_TYPE", "memory")]);

        let manager = config.to_manager_config().unwrap();
        assert_eq!(manager.storage, StorageConfig::Memory);
    }

    #[test]
    fn test_explicit_path() {
        let config = config(&[("LHM_STORAGE_PATH", "/tmp/lhm/servers.json")]);

        let manager = config.to_manager_config().unwrap();
        assert_eq!(
            manager.storage,
            StorageConfig::File {
                path: "/tmp/lhm/servers.json".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("LHM_STORAGE_TYPE", "redis")]).validate().is_err());
        assert!(config(&[("LHM_STORAGE_PATH", " ")]).validate().is_err());
        assert!(config(&[("LHM_PROBE_TIMEOUT_SECS", "0")]).validate().is_err());
        assert!(config(&[("LHM_PROBE_TIMEOUT_SECS", "121")]).validate().is_err());
        assert!(config(&[("LHM_PROBE_TIMEOUT_SECS", "soon")]).validate().is_err());
        assert!(config(&[("LHM_LOG_LEVEL", "loud")]).validate().is_err());
    }

    #[test]
    fn test_timeout_passed_to_probe() {
        let config = config(&[("LHM_STORAGE_TYPE", "memory"), ("LHM_PROBE_TIMEOUT_SECS", "30")]);

        let manager = config.to_manager_config().unwrap();
        assert_eq!(manager.probe.timeout_secs, 30);
        assert_eq!(manager.probe.backend, "http");
    }
}
