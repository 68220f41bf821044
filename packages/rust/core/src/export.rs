//! JSON result export.
//!
//! Writes a single pretty-printed file per run:
//! ```text
//! {
//!   "metadata": { export_timestamp, total_contacts, export_format, tool_version, run_id },
//!   "contacts": [ ... ]
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use linkscout_shared::{Contact, Justification, LinkScoutError, Result, SearchRunId};

/// Format tag written into every export.
pub const EXPORT_FORMAT: &str = "JSON";

/// Caller-supplied metadata for an export.
#[derive(Debug, Clone)]
pub struct ExportMeta {
    pub tool_version: String,
    pub run_id: Option<SearchRunId>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportMetadata {
    export_timestamp: DateTime<Utc>,
    total_contacts: usize,
    export_format: String,
    tool_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run_id: Option<SearchRunId>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportDocument {
    metadata: ExportMetadata,
    contacts: Vec<Contact>,
}

/// Summary of an export file on disk.
#[derive(Debug, Clone)]
pub struct ExportStats {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub contact_count: usize,
    pub modified_at: DateTime<Utc>,
}

/// Default export file name for the current local time.
pub fn default_export_filename() -> String {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("linkscout_results_{stamp}.json")
}

/// Write `contacts` to `dir` and return the file path.
///
/// `justifications` is keyed by [`Contact::export_key`]; an entry replaces the
/// contact's own justification and connection angle.
#[instrument(skip_all, fields(dir = %dir.display(), contacts = contacts.len()))]
pub fn export_contacts(
    dir: &Path,
    filename: Option<&str>,
    contacts: &[Contact],
    justifications: &HashMap<String, Justification>,
    meta: &ExportMeta,
) -> Result<PathBuf> {
    if contacts.is_empty() {
        return Err(LinkScoutError::Export("no contacts to export".into()));
    }

    let filename = match filename.map(str::trim).filter(|f| !f.is_empty()) {
        Some(name) if name.ends_with(".json") => name.to_string(),
        Some(name) => format!("{name}.json"),
        None => default_export_filename(),
    };

    std::fs::create_dir_all(dir).map_err(|e| LinkScoutError::io(dir, e))?;

    let contacts: Vec<Contact> = contacts
        .iter()
        .map(|contact| {
            let mut contact = contact.clone();
            if let Some(j) = justifications.get(&contact.export_key()) {
                contact.justification = j.justification.clone();
                contact.connection_angle = j.connection_angle.clone();
            }
            contact
        })
        .collect();

    let document = ExportDocument {
        metadata: ExportMetadata {
            export_timestamp: Utc::now(),
            total_contacts: contacts.len(),
            export_format: EXPORT_FORMAT.to_string(),
            tool_version: meta.tool_version.clone(),
            run_id: meta.run_id.clone(),
        },
        contacts,
    };

    let json = serde_json::to_string_pretty(&document)
        .map_err(|e| LinkScoutError::Export(format!("JSON serialization failed: {e}")))?;

    let target = dir.join(&filename);
    let temp = dir.join(format!(".{filename}.tmp"));
    std::fs::write(&temp, json).map_err(|e| LinkScoutError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| LinkScoutError::io(&target, e))?;

    info!(path = %target.display(), "export complete");
    Ok(target)
}

/// Size, contact count and modification time of an export file.
pub fn export_stats(path: &Path) -> Result<ExportStats> {
    let metadata = std::fs::metadata(path).map_err(|e| LinkScoutError::io(path, e))?;
    let modified = metadata
        .modified()
        .map_err(|e| LinkScoutError::io(path, e))?;

    let content = std::fs::read_to_string(path).map_err(|e| LinkScoutError::io(path, e))?;
    let document: ExportDocument = serde_json::from_str(&content).map_err(|e| {
        LinkScoutError::Export(format!("invalid export file {}: {e}", path.display()))
    })?;
    debug!(path = %path.display(), contacts = document.contacts.len(), "read export");

    Ok(ExportStats {
        path: path.to_path_buf(),
        size_bytes: metadata.len(),
        contact_count: document.contacts.len(),
        modified_at: DateTime::<Utc>::from(modified),
    })
}
