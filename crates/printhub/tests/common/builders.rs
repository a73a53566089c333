//! Builders for creating test orders and upload payloads.

#![allow(dead_code)]

use serde_json::{json, Value};

use printhub::{ColorMode, FileEntry};

/// Builder for `FileEntry` values that skip the blob store.
pub struct FileEntryBuilder {
    entry: FileEntry,
}

impl FileEntryBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            entry: FileEntry {
                file_name: name.to_string(),
                saved_as: format!("2026-01-01/{}", name),
                storage_ref: format!("/srv/uploads/2026-01-01/{}", name),
                from: None,
                to: None,
                color: ColorMode::Bw,
                copies: 1,
                page_count: 1,
            },
        }
    }

    pub fn pages(mut self, page_count: u32) -> Self {
        self.entry.page_count = page_count;
        self
    }

    pub fn range(mut self, from: u32, to: u32) -> Self {
        self.entry.from = Some(from);
        self.entry.to = Some(to);
        self
    }

    pub fn color(mut self) -> Self {
        self.entry.color = ColorMode::Color;
        self
    }

    pub fn copies(mut self, copies: u32) -> Self {
        self.entry.copies = copies;
        self
    }

    pub fn storage_ref(mut self, storage_ref: &str) -> Self {
        self.entry.storage_ref = storage_ref.to_string();
        self
    }

    pub fn build(self) -> FileEntry {
        self.entry
    }
}

/// Builder for the `fileRanges` JSON array a storefront sends.
#[derive(Default)]
pub struct FileRangesBuilder {
    entries: Vec<Value>,
}

impl FileRangesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry the way the browser serializes it: numbers as strings.
    pub fn file(mut self, name: &str, pages: u32, color: &str, copies: u32) -> Self {
        self.entries.push(json!({
            "name": name,
            "from": "",
            "to": "",
            "color": color,
            "copies": copies.to_string(),
            "detectedPages": pages,
        }));
        self
    }

    pub fn ranged_file(mut self, name: &str, pages: u32, from: u32, to: u32) -> Self {
        self.entries.push(json!({
            "name": name,
            "from": from.to_string(),
            "to": to.to_string(),
            "color": "bw",
            "copies": "1",
            "detectedPages": pages,
        }));
        self
    }

    pub fn raw(mut self, value: Value) -> Self {
        self.entries.push(value);
        self
    }

    pub fn build(self) -> String {
        Value::Array(self.entries).to_string()
    }
}
