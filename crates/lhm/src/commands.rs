// Command handlers
//
// Each handler works against a loaded RegistryStore and prints its result.
// Prompts and progress go to stderr, data goes to stdout.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use lhm_core::bulk::{self, AutoConfirm, FileExportSink, ImportPlan};
use lhm_core::traits::{EXPORT_FILENAME, ExportSink, Navigator, SystemNavigator};
use lhm_core::{
    BackendRegistry, ImportOutcome, ManagerConfig, ProbeStatus, RegistryStore, ServerId,
    ServerRecord, StatusMonitor,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::cli::Command;
use crate::output::{self, StdoutSink};

/// How a command ended, when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The user answered no to a confirmation
    Declined,
}

/// Where import text comes from
enum ImportSource<'a> {
    Stdin,
    File(&'a Path),
}

impl<'a> ImportSource<'a> {
    fn from_arg(path: &'a Path) -> Self {
        if path == Path::new("-") {
            Self::Stdin
        } else {
            Self::File(path)
        }
    }

    async fn read(&self) -> Result<String> {
        match self {
            ImportSource::Stdin => {
                let mut text = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut text)
                    .await
                    .context("Failed to read servers from stdin")?;
                Ok(text)
            }
            ImportSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    /// Stdin is taken by the payload, so nobody can answer a prompt
    fn can_prompt(&self) -> bool {
        matches!(self, ImportSource::File(_))
    }
}

/// Everything a command needs
pub struct Context {
    store: RegistryStore,
    backends: BackendRegistry,
    config: ManagerConfig,
}

impl Context {
    /// Create the configured storage and load the registry from it
    pub async fn open(config: ManagerConfig) -> Result<Self> {
        let backends = BackendRegistry::with_builtin_storage();
        #[cfg(feature = "http")]
        lhm_probe_http::register(&backends);

        let port = backends.create_storage(&config.storage).await?;
        let (store, _events) = RegistryStore::new(port);
        store.load().await?;

        Ok(Self {
            store,
            backends,
            config,
        })
    }

    pub async fn run(&self, command: Command) -> Result<Outcome> {
        match command {
            Command::List { json, no_probe } => self.list(json, no_probe).await,
            Command::Add {
                host,
                label,
                port,
                https,
            } => self.add(&host, &label, &port, https).await,
            Command::Remove { id, yes } => self.remove(&id, yes).await,
            Command::Open { id } => self.open_record(&id, &SystemNavigator),
            Command::Status => self.status().await,
            Command::Export { output } => self.export(output.as_deref()).await,
            Command::Import { file, yes } => self.import(&file, yes).await,
            Command::Edit { yes } => self.edit(yes).await,
        }
    }

    async fn list(&self, json: bool, no_probe: bool) -> Result<Outcome> {
        if json {
            println!("{}", bulk::export(&self.store)?);
            return Ok(Outcome::Done);
        }

        let records = self.store.list();
        print!("{}", output::render_list(&records));

        if !no_probe && !records.is_empty() {
            println!();
            self.probe_and_print(&records).await?;
        }
        Ok(Outcome::Done)
    }

    async fn add(&self, host: &str, label: &str, port: &str, https: bool) -> Result<Outcome> {
        let record = self.store.add(host, label, port, https).await?;
        println!("Added {}  {}  {}", record.id(), record.label(), record.url());
        Ok(Outcome::Done)
    }

    async fn remove(&self, id: &str, yes: bool) -> Result<Outcome> {
        let record = self.find(id)?;

        if !yes && !confirm(&format!("Delete \"{}\"?", record.label())).await? {
            return Ok(Outcome::Declined);
        }

        self.store.remove(record.id()).await?;
        println!("Removed {}", record.label());
        Ok(Outcome::Done)
    }

    fn open_record(&self, id: &str, navigator: &dyn Navigator) -> Result<Outcome> {
        let record = self.find(id)?;
        navigator.open_in_new_context(record.url())?;
        info!("Opened {}", record.url());
        Ok(Outcome::Done)
    }

    async fn status(&self) -> Result<Outcome> {
        let records = self.store.list();
        if records.is_empty() {
            print!("{}", output::render_list(&records));
            return Ok(Outcome::Done);
        }

        let statuses = self.probe_and_print(&records).await?;
        let online = statuses
            .values()
            .filter(|status| **status == ProbeStatus::Online)
            .count();
        println!("\n{} of {} server(s) accessible", online, records.len());
        Ok(Outcome::Done)
    }

    async fn export(&self, output: Option<&Path>) -> Result<Outcome> {
        let sink: Box<dyn ExportSink> = match output {
            Some(path) if path == Path::new("-") => Box::new(StdoutSink),
            Some(path) => Box::new(FileExportSink::to_path(path)),
            None => Box::new(FileExportSink::into_dir(".")),
        };

        let count = bulk::export_to(&self.store, sink.as_ref()).await?;

        if output != Some(Path::new("-")) {
            let destination = output.map_or_else(default_export_path, Path::to_path_buf);
            eprintln!("Exported {} server(s) to {}", count, destination.display());
        }
        Ok(Outcome::Done)
    }

    async fn import(&self, file: &Path, yes: bool) -> Result<Outcome> {
        let source = ImportSource::from_arg(file);
        let text = source.read().await?;
        self.apply_import(&text, yes, source.can_prompt()).await
    }

    async fn edit(&self, yes: bool) -> Result<Outcome> {
        let original = bulk::export(&self.store)?;

        let file = tempfile::Builder::new()
            .prefix("lhm-edit-")
            .suffix(".json")
            .tempfile()
            .context("Failed to create a temporary file")?;
        tokio::fs::write(file.path(), &original).await?;

        run_editor(file.path()).await?;

        let edited = tokio::fs::read_to_string(file.path())
            .await
            .context("Failed to read the edited file")?;
        if edited.trim() == original.trim() {
            eprintln!("No changes");
            return Ok(Outcome::Done);
        }

        self.apply_import(&edited, yes, true).await
    }

    /// Validate `text`, confirm drops, replace the registry
    async fn apply_import(&self, text: &str, yes: bool, can_prompt: bool) -> Result<Outcome> {
        let plan = ImportPlan::parse(text, self.store.id_generator())?;

        let proceed = if !plan.requires_confirmation() || yes {
            true
        } else if can_prompt {
            confirm(&format!(
                "{} invalid server(s) will be ignored. Continue?",
                plan.dropped()
            ))
            .await?
        } else {
            bail!(
                "{} invalid server(s) found; re-run with --yes to import the rest",
                plan.dropped()
            );
        };

        match plan.apply(&self.store, &AutoConfirm(proceed)).await? {
            ImportOutcome::Applied { imported, dropped } => {
                if dropped > 0 {
                    warn!("Ignored {} invalid server(s)", dropped);
                }
                println!("Imported {} server(s)", imported);
                Ok(Outcome::Done)
            }
            ImportOutcome::Declined { .. } => Ok(Outcome::Declined),
        }
    }

    /// Probe `records` and print each result as it arrives
    async fn probe_and_print(&self, records: &[ServerRecord]) -> Result<HashMap<ServerId, ProbeStatus>> {
        let probe = self.backends.create_probe(&self.config.probe)?;
        let (monitor, updates) = StatusMonitor::new(self.store.clone(), probe);

        let labels: HashMap<&ServerId, &str> =
            records.iter().map(|r| (r.id(), r.label())).collect();

        let batch = monitor.probe_all(records);
        debug!("Issued {} probe(s)", batch.len());

        // The stream ends once every probe task has dropped its monitor clone.
        drop(monitor);

        let mut statuses = HashMap::with_capacity(records.len());
        let mut updates = UnboundedReceiverStream::new(updates);
        while let Some(update) = updates.next().await {
            let label = labels.get(&update.id).copied().unwrap_or_default();
            println!("{}", output::render_status(label, &update.url, update.status));
            statuses.insert(update.id, update.status);
        }

        Ok(statuses)
    }

    /// Look a server up by the id shown in `lhm list`
    fn find(&self, id: &str) -> Result<ServerRecord> {
        if id.trim().is_empty() {
            bail!("Server id cannot be empty");
        }
        self.store
            .list()
            .into_iter()
            .find(|record| record.id().matches_display(id))
            .with_context(|| format!("No server with id {}", id.trim()))
    }
}

/// Ask a yes/no question on the terminal; anything but yes is no
async fn confirm(question: &str) -> Result<bool> {
    eprint!("{} [y/N] ", question);

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read answer")?;

    Ok(is_yes(&line))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Open `path` in the user's editor and wait for it to exit
async fn run_editor(path: &Path) -> Result<()> {
    let editor = editor_command();
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        bail!("No editor configured; set $VISUAL or $EDITOR");
    };

    debug!("Running editor {}", editor);
    let status = tokio::process::Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .await
        .with_context(|| format!("Failed to start editor '{}'", editor))?;

    if !status.success() {
        bail!("Editor exited with {}; registry left unchanged", status);
    }
    Ok(())
}

fn editor_command() -> String {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_editor().to_string())
}

fn default_editor() -> &'static str {
    if cfg!(windows) { "notepad" } else { "vi" }
}

/// Default location of the export written by `lhm export`
pub fn default_export_path() -> PathBuf {
    Path::new(".").join(EXPORT_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lhm_core::StorageConfig;
    use std::sync::Mutex;

    async fn context() -> Context {
        let config = ManagerConfig {
            storage: StorageConfig::Memory,
            ..ManagerConfig::default()
        };
        Context::open(config).await.unwrap()
    }

    #[derive(Default)]
    struct RecordingNavigator {
        opened: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn open_in_new_context(&self, url: &str) -> Result<(), lhm_core::Error> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[tokio::test]
    async fn test_add_then_open() {
        let ctx = context().await;
        ctx.run(Command::Add {
            host: String::new(),
            label: "Vite".into(),
            port: "5173".into(),
            https: false,
        })
        .await
        .unwrap();

        let id = ctx.store.list()[0].id().to_string();
        let navigator = RecordingNavigator::default();
        ctx.open_record(&id, &navigator).unwrap();

        assert_eq!(*navigator.opened.lock().unwrap(), vec!["http://localhost:5173"]);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let ctx = context().await;
        let result = ctx.remove("12345", true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_import_with_yes_drops_invalid() {
        let ctx = context().await;
        let outcome = ctx
            .apply_import(r#"[{"host":"a","port":80,"label":"x"},{"port":80}]"#, true, false)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(ctx.store.len(), 1);
    }

    #[tokio::test]
    async fn test_import_from_stdin_needs_yes_for_drops() {
        let ctx = context().await;
        let result = ctx
            .apply_import(r#"[{"host":"a","port":80,"label":"x"},{"port":80}]"#, false, false)
            .await;

        assert!(result.is_err());
        assert!(ctx.store.is_empty());
    }

    #[tokio::test]
    async fn test_export_then_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        let ctx = context().await;
        ctx.store.add("", "a", "3000", true).await.unwrap();

        ctx.export(Some(&path)).await.unwrap();
        ctx.store.replace_all(Vec::new()).await.unwrap();
        ctx.import(&path, false).await.unwrap();

        assert_eq!(ctx.store.list()[0].url(), "https://localhost:3000");
    }

    #[tokio::test]
    async fn test_string_numeric_id_is_reachable() {
        let ctx = context().await;
        ctx.apply_import(
            r#"[{"id":"42","host":"a","port":80,"label":"x"},{"id":7.5,"host":"b","port":81,"label":"y"}]"#,
            true,
            false,
        )
        .await
        .unwrap();

        let navigator = RecordingNavigator::default();
        ctx.open_record("7.5", &navigator).unwrap();
        assert_eq!(*navigator.opened.lock().unwrap(), vec!["http://b:81"]);

        assert_eq!(ctx.remove("42", true).await.unwrap(), Outcome::Done);
        assert_eq!(ctx.store.len(), 1);
        assert_eq!(ctx.store.list()[0].label(), "y");
    }

    #[test]
    fn test_import_source() {
        assert!(!ImportSource::from_arg(Path::new("-")).can_prompt());
        assert!(ImportSource::from_arg(Path::new("servers.json")).can_prompt());
    }
}
