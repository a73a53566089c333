//! Order intake: turns one client submission into a persisted `pending` order.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, info_span, warn};

use crate::db::{order_repo, Database};
use crate::error::{Result, ValidationError};
use crate::order::{ColorMode, FileEntry, Order, OrderId};
use crate::pricing::{self, PriceQuote, PrintSpec};
use crate::storage::{BlobStore, StoredBlob};

/// A number the browser may send as JSON number, numeric string or empty string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseNumber {
    /// Integer value with `parseInt`-like leniency: leading whitespace, an
    /// optional sign, then digits. Anything else yields `None`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            LooseNumber::Int(v) => Some(*v),
            LooseNumber::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            LooseNumber::Float(_) => None,
            LooseNumber::Text(s) => parse_leading_int(s),
        }
    }
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: &str = &rest[..rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len())];
    if digits.is_empty() {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Per-file print settings sent alongside the upload (`fileRanges` entries).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileMetadata {
    pub name: String,
    pub from: Option<LooseNumber>,
    pub to: Option<LooseNumber>,
    pub color: Option<String>,
    pub copies: Option<LooseNumber>,
    pub detected_pages: Option<LooseNumber>,
}

impl FileMetadata {
    /// Settings used for a file the client sent no metadata for.
    pub fn defaults_for(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn print_spec(&self) -> PrintSpec {
        PrintSpec {
            page_count: self.detected_pages.as_ref().and_then(LooseNumber::as_i64).unwrap_or(1),
            from: self.from.as_ref().and_then(LooseNumber::as_i64),
            to: self.to.as_ref().and_then(LooseNumber::as_i64),
            color: self
                .color
                .as_deref()
                .map(ColorMode::from_wire)
                .unwrap_or_default(),
            copies: self.copies.as_ref().and_then(LooseNumber::as_i64).unwrap_or(1),
        }
    }

    /// Normalized file entry for a stored blob.
    pub fn into_entry(self, blob: StoredBlob) -> FileEntry {
        let spec = self.print_spec();
        let (from, to) = match pricing::clamped_range(&spec) {
            Some((from, to)) => (Some(from), Some(to)),
            None => (
                pricing::normalize_bound(spec.from),
                pricing::normalize_bound(spec.to),
            ),
        };
        FileEntry {
            file_name: blob.original_name,
            saved_as: blob.saved_as,
            storage_ref: blob.storage_ref,
            from,
            to,
            color: spec.color,
            copies: pricing::normalize_copies(spec.copies),
            page_count: pricing::normalize_page_count(spec.page_count),
        }
    }
}

/// Parses the raw `fileRanges` JSON array.
pub fn parse_file_ranges(raw: Option<&str>) -> Result<Vec<FileMetadata>> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingMetadata)?;
    let metadata: Vec<FileMetadata> = serde_json::from_str(raw)
        .map_err(|e| ValidationError::MalformedMetadata(e.to_string()))?;
    Ok(metadata)
}

/// Parses the client's claimed total; blank or unparsable means "not claimed".
pub fn parse_total_cost(raw: Option<&str>) -> Option<u64> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    if let Ok(value) = raw.parse::<u64>() {
        return Some(value);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 => {
            Some(v as u64)
        }
        _ => {
            warn!(total_cost = raw, "Ignoring unparsable total cost");
            None
        }
    }
}

/// Quote computed straight from client metadata.
pub fn quote_metadata(metadata: &[FileMetadata]) -> PriceQuote {
    pricing::quote(metadata.iter().map(FileMetadata::print_spec))
}

/// Pairs each stored blob with the metadata of the same file name.
///
/// Files without metadata keep default settings; metadata naming no uploaded
/// file is ignored. When several metadata entries share a name the last wins.
pub fn match_metadata(blobs: Vec<StoredBlob>, metadata: Vec<FileMetadata>) -> Vec<FileEntry> {
    let mut by_name: HashMap<String, FileMetadata> = metadata
        .into_iter()
        .map(|meta| (meta.name.clone(), meta))
        .collect();

    let entries: Vec<FileEntry> = blobs
        .into_iter()
        .map(|blob| {
            let meta = match by_name.get(&blob.original_name) {
                Some(meta) => meta.clone(),
                None => {
                    warn!(
                        file = %blob.original_name,
                        "No metadata for uploaded file, using defaults"
                    );
                    FileMetadata::defaults_for(&blob.original_name)
                }
            };
            meta.into_entry(blob)
        })
        .collect();

    by_name.retain(|name, _| !entries.iter().any(|e| &e.file_name == name));
    for name in by_name.keys() {
        debug!(file = %name, "Ignoring metadata for a file that was not uploaded");
    }

    entries
}

/// One uploaded binary as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// Everything a single upload request carries. Owned by that request only.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub files: Vec<UploadedFile>,
    /// Raw `fileRanges` JSON; `None` when the field was absent.
    pub file_ranges: Option<String>,
    pub gateway: String,
    /// Raw `totalCost` as sent by the client.
    pub total_cost: Option<String>,
}

/// Validates submissions and writes new orders.
#[derive(Clone)]
pub struct OrderIntake {
    db: Database,
    blobs: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for OrderIntake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderIntake").field("db", &self.db).finish_non_exhaustive()
    }
}

impl OrderIntake {
    pub fn new(db: Database, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    /// Runs a whole submission: validate, store binaries, match metadata,
    /// price, persist.
    pub fn accept(&self, submission: Submission) -> Result<OrderId> {
        let _span = info_span!(
            "intake",
            files = submission.files.len(),
            gateway = %submission.gateway
        )
        .entered();

        if submission.files.is_empty() {
            return Err(ValidationError::EmptyOrder.into());
        }
        let metadata = parse_file_ranges(submission.file_ranges.as_deref())?;
        let claimed_cost = parse_total_cost(submission.total_cost.as_deref());

        let mut blobs = Vec::with_capacity(submission.files.len());
        for file in &submission.files {
            match self.blobs.put(&file.name, &file.content) {
                Ok(blob) => blobs.push(blob),
                Err(e) => {
                    self.discard(&blobs);
                    return Err(e.into());
                }
            }
        }

        let stored = blobs.clone();
        let entries = match_metadata(blobs, metadata);
        let result = self.submit_order(entries, submission.gateway, claimed_cost);
        if result.is_err() {
            self.discard(&stored);
        }
        result
    }

    /// Removes blobs of a submission that did not become an order.
    fn discard(&self, blobs: &[StoredBlob]) {
        for blob in blobs {
            if let Err(e) = self.blobs.remove(blob) {
                warn!(storage_ref = %blob.storage_ref, error = %e, "Failed to remove orphaned upload");
            }
        }
    }

    /// Persists a new `pending` order for already-stored files.
    ///
    /// The total is always recomputed here. A claimed total that disagrees is
    /// logged and the computed one is stored.
    pub fn submit_order(
        &self,
        files: Vec<FileEntry>,
        gateway: String,
        claimed_cost: Option<u64>,
    ) -> Result<OrderId> {
        if files.is_empty() {
            return Err(ValidationError::EmptyOrder.into());
        }
        if let Some(file) = files.iter().find(|f| f.storage_ref.trim().is_empty()) {
            return Err(ValidationError::MissingStorageRef {
                file_name: file.file_name.clone(),
            }
            .into());
        }

        let quote = pricing::quote_entries(&files);
        if let Some(claimed) = claimed_cost.filter(|c| *c != quote.total_cost) {
            warn!(
                claimed,
                computed = quote.total_cost,
                "Submitted total cost differs from computed cost, storing computed"
            );
        }

        let order = Order::new_pending(files, gateway, quote.total_cost);
        let id = order_repo::insert(&self.db, &order)?;

        info!(
            order_id = %id,
            pages = quote.total_pages,
            cost = quote.total_cost,
            "Order saved"
        );
        Ok(id)
    }
}
