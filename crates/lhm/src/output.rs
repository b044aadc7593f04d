// Terminal rendering of the registry
//
// Everything here returns strings so the commands decide where they go.

use async_trait::async_trait;
use lhm_core::traits::ExportSink;
use lhm_core::{Error, ProbeStatus, ServerRecord};
use tokio::io::AsyncWriteExt;

pub const EMPTY_TITLE: &str = "No registered servers";
pub const EMPTY_HINT: &str = "Run \"lhm add --port <port>\" to add a server";

/// Render the registry as an aligned table, or the empty state
pub fn render_list(records: &[ServerRecord]) -> String {
    if records.is_empty() {
        return format!("{}\n{}\n", EMPTY_TITLE, EMPTY_HINT);
    }

    let id_width = column_width(records, |r| r.id().to_string());
    let label_width = column_width(records, |r| r.label().to_string());

    let mut out = String::new();
    for record in records {
        out.push_str(&format!(
            "{:<id_width$}  {:<label_width$}  :{:<5}  {}\n",
            record.id().to_string(),
            record.label(),
            record.port(),
            record.url(),
        ));
    }
    out
}

/// One line per probe result
pub fn render_status(label: &str, url: &str, status: ProbeStatus) -> String {
    format!("{} {}  {}  {}", status_marker(status), label, url, status.description())
}

fn status_marker(status: ProbeStatus) -> &'static str {
    match status {
        ProbeStatus::Unknown => "?",
        ProbeStatus::Online => "●",
        ProbeStatus::Offline => "○",
    }
}

fn column_width(records: &[ServerRecord], field: impl Fn(&ServerRecord) -> String) -> usize {
    records
        .iter()
        .map(|r| field(r).chars().count())
        .max()
        .unwrap_or(0)
}

/// Export sink that prints the payload
pub struct StdoutSink;

#[async_trait]
impl ExportSink for StdoutSink {
    async fn deliver(&self, payload: &str, _filename: &str) -> Result<(), Error> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(payload.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        Ok(())
    }
}
