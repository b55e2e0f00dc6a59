//! # Diagnosis Log Module
//!
//! JSON history of delivered diagnoses. The file holds a single JSON array of
//! [`DiagnosisRecord`]s; a missing file is an empty history. The bot appends
//! to it after each successful reply and the `view_logs` binary renders it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

pub const EMPTY_HISTORY_MESSAGE: &str = "No diagnosis history found.";

const HEADERS: [&str; 5] = ["Timestamp", "Username", "Diagnosis", "Confidence", "Description"];

/// One delivered diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub timestamp: String,
    pub username: String,
    pub label: String,
    /// Percentage in `[0, 100]`
    pub confidence: f64,
    pub description: String,
}

impl DiagnosisRecord {
    pub fn new(
        at: DateTime<Utc>,
        username: impl Into<String>,
        label: impl Into<String>,
        confidence: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            username: username.into(),
            label: label.into(),
            confidence,
            description: description.into(),
        }
    }
}

/// Read every record; a missing file yields an empty history
pub fn load_records(path: &Path) -> Result<Vec<DiagnosisRecord>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content).with_context(|| format!("Malformed diagnosis log {}", path.display()))
}

/// Append one record, rewriting the JSON array in place
pub fn append_record(path: &Path, record: DiagnosisRecord) -> Result<()> {
    let mut records = load_records(path)?;
    records.push(record);

    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    debug!(path = %path.display(), records = records.len(), "Diagnosis log updated");
    Ok(())
}

/// Diagnosis log shared by concurrent handlers; appends are serialized
pub struct DiagnosisLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DiagnosisLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: DiagnosisRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_record(&path, record)).await?
    }
}

/// Render records as a box-drawn console table
pub fn render_table(records: &[DiagnosisRecord]) -> String {
    if records.is_empty() {
        return EMPTY_HISTORY_MESSAGE.to_string();
    }

    let rows: Vec<[String; 5]> = records
        .iter()
        .map(|r| {
            [
                r.timestamp.clone(),
                r.username.clone(),
                r.label.clone(),
                format!("{:.2}%", r.confidence),
                r.description.clone(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = |left: &str, mid: &str, right: &str, fill: &str| {
        let segments: Vec<String> = widths.iter().map(|w| fill.repeat(w + 2)).collect();
        format!("{left}{}{right}", segments.join(mid))
    };
    let line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, w)| format!(" {cell}{} ", " ".repeat(w - cell.chars().count())))
            .collect();
        format!("│{}│", padded.join("│"))
    };

    let mut out = Vec::with_capacity(rows.len() * 2 + 3);
    out.push(border("╒", "╤", "╕", "═"));
    out.push(line(&HEADERS.map(String::from)));
    out.push(border("╞", "╪", "╡", "═"));
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push(border("├", "┼", "┤", "─"));
        }
        out.push(line(row));
    }
    out.push(border("╘", "╧", "╛", "═"));

    out.join("\n")
}
