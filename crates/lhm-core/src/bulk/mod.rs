//! Bulk editing: export and import of the whole registry
//!
//! ## Export
//!
//! [`export`] renders the registry as a pretty-printed JSON array.
//! [`export_to`] hands the same text to an [`ExportSink`].
//!
//! ## Import
//!
//! Import is a full replace, never a merge:
//!
//! 1. [`ImportPlan::parse`] validates the text. Invalid JSON is an
//!    [`Error::Parse`], anything but an array is an [`Error::Schema`].
//! 2. Elements without a usable `host`, `port` and `label` are dropped and
//!    counted. Accepted elements keep their id (or get a fresh one) and have
//!    their `url` recomputed.
//! 3. [`ImportPlan::apply`] asks an [`ImportConfirmation`] when anything was
//!    dropped, then calls [`RegistryStore::replace_all`].
//!
//! ```rust,ignore
//! let outcome = bulk::import_text(&store, &text, |dropped, total| {
//!     prompt(&format!("{} of {} invalid server(s) will be ignored. Continue?", dropped, total))
//! })
//! .await?;
//! ```

mod sink;

pub use sink::FileExportSink;

use std::num::NonZeroU16;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::id::IdGenerator;
use crate::model::{ServerId, ServerRecord};
use crate::store::RegistryStore;
use crate::traits::{EXPORT_FILENAME, ExportSink};

/// Serialize the registry as pretty-printed JSON
pub fn export(store: &RegistryStore) -> Result<String> {
    Ok(serde_json::to_string_pretty(&store.list())?)
}

/// Export the registry into `sink` under the default filename
pub async fn export_to(store: &RegistryStore, sink: &dyn ExportSink) -> Result<usize> {
    let payload = export(store)?;
    sink.deliver(&payload, EXPORT_FILENAME).await?;

    let count = store.len();
    info!("Exported {} server(s) to {}", count, EXPORT_FILENAME);
    Ok(count)
}

/// Decides whether an import that dropped elements goes ahead
pub trait ImportConfirmation {
    /// `dropped` of `total` elements were invalid; return true to continue
    fn confirm_dropped(&self, dropped: usize, total: usize) -> bool;
}

impl<F> ImportConfirmation for F
where
    F: Fn(usize, usize) -> bool,
{
    fn confirm_dropped(&self, dropped: usize, total: usize) -> bool {
        self(dropped, total)
    }
}

/// Fixed answer, for non-interactive callers (`--yes`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoConfirm(pub bool);

impl ImportConfirmation for AutoConfirm {
    fn confirm_dropped(&self, _dropped: usize, _total: usize) -> bool {
        self.0
    }
}

/// Result of an import attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The registry was replaced
    Applied { imported: usize, dropped: usize },
    /// The user declined; the registry is unchanged
    Declined { dropped: usize },
}

/// A validated import, ready to be applied
#[derive(Debug, Clone)]
pub struct ImportPlan {
    accepted: Vec<ServerRecord>,
    dropped: usize,
}

impl ImportPlan {
    /// Parse and validate interchange text
    ///
    /// Missing ids are drawn from `ids`.
    ///
    /// # Returns
    ///
    /// - `Ok(plan)`: The text is a JSON array (possibly with invalid elements)
    /// - `Err(Error::Parse)`: Not valid JSON
    /// - `Err(Error::Schema)`: Valid JSON, but not an array
    pub fn parse(text: &str, ids: &IdGenerator) -> Result<Self> {
        let parsed: Value = serde_json::from_str(text).map_err(|e| Error::parse(e.to_string()))?;

        let Value::Array(elements) = parsed else {
            return Err(Error::schema("JSON must be an array"));
        };

        // Known ids first, so synthesized ones never collide with them.
        for element in &elements {
            if let Some(id) = element.get("id").and_then(ServerId::from_json) {
                ids.observe(&id);
            }
        }

        let total = elements.len();
        let accepted: Vec<ServerRecord> = elements
            .into_iter()
            .enumerate()
            .filter_map(|(index, element)| {
                let record = normalize(element, ids);
                if record.is_none() {
                    debug!("Dropping invalid server at index {}", index);
                }
                record
            })
            .collect();

        Ok(Self {
            dropped: total - accepted.len(),
            accepted,
        })
    }

    /// Servers that will replace the registry
    pub fn accepted(&self) -> &[ServerRecord] {
        &self.accepted
    }

    /// Number of elements that failed validation
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Number of elements in the input array
    pub fn total(&self) -> usize {
        self.accepted.len() + self.dropped
    }

    /// Whether the user must confirm before applying
    pub fn requires_confirmation(&self) -> bool {
        self.dropped > 0
    }

    /// Replace the registry with the accepted servers
    ///
    /// When elements were dropped, `confirm` decides; declining leaves the
    /// registry untouched.
    pub async fn apply(
        self,
        store: &RegistryStore,
        confirm: &dyn ImportConfirmation,
    ) -> Result<ImportOutcome> {
        if self.requires_confirmation() && !confirm.confirm_dropped(self.dropped, self.total()) {
            info!("Import declined ({} invalid server(s))", self.dropped);
            return Ok(ImportOutcome::Declined {
                dropped: self.dropped,
            });
        }

        let imported = self.accepted.len();
        store.replace_all(self.accepted).await?;

        Ok(ImportOutcome::Applied {
            imported,
            dropped: self.dropped,
        })
    }
}

/// Parse `text` and replace the registry with it
pub async fn import_text(
    store: &RegistryStore,
    text: &str,
    confirm: impl Fn(usize, usize) -> bool,
) -> Result<ImportOutcome> {
    let plan = ImportPlan::parse(text, store.id_generator())?;
    plan.apply(store, &confirm).await
}

/// Turn one array element into a record, or `None` if it is invalid
fn normalize(element: Value, ids: &IdGenerator) -> Option<ServerRecord> {
    let Value::Object(mut fields) = element else {
        return None;
    };

    let host = non_empty_string(fields.get("host"))?;
    let label = non_empty_string(fields.get("label"))?;
    let port = port_value(fields.get("port"))?;
    let is_secure = ["isSecure", "isHttps"]
        .iter()
        .any(|key| fields.get(*key).is_some_and(is_truthy));
    let id = fields
        .get("id")
        .and_then(ServerId::from_json)
        .unwrap_or_else(|| ids.next_id());

    for key in ["id", "host", "label", "port", "isSecure", "isHttps", "url"] {
        fields.remove(key);
    }

    ServerRecord::new(id, host, label, port, is_secure)
        .ok()
        .map(|record| record.with_extra(fields))
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Ports may be integers or digit strings; both must be in `1..=65535`
fn port_value(value: Option<&Value>) -> Option<NonZeroU16> {
    let port = match value? {
        Value::Number(n) => match n.as_u64() {
            Some(port) => port,
            None => whole_number(n.as_f64()?)?,
        },
        Value::String(s) => {
            let s = s.trim();
            match s.parse() {
                Ok(port) => port,
                Err(_) => whole_number(s.parse().ok()?)?,
            }
        }
        _ => return None,
    };
    u16::try_from(port).ok().and_then(NonZeroU16::new)
}

/// `80.0` is the port 80; `80.5` is not a port
fn whole_number(n: f64) -> Option<u64> {
    (n.fract() == 0.0 && (1.0..=f64::from(u16::MAX)).contains(&n)).then_some(n as u64)
}

/// JavaScript-style truthiness, used for the scheme flag
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
