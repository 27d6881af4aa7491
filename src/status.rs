//! Status/progress reconciliation.
//!
//! Status labels in the sheet are free text ("Open", "Working on it",
//! "done", "Complete", ...). This module owns the mapping between those
//! labels and the canonical progress percentage, and the decision of when a
//! row moves to the Archive worksheet.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical task status, parsed leniently from sheet text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Open,
    Working,
    Done,
    /// Anything that matched none of the known labels. Kept verbatim so a
    /// write-back does not destroy what the user typed.
    Other(String),
}

impl TaskStatus {
    /// Parse a raw status cell. Case-insensitive substring match, same
    /// precedence as the sheet's progress helper: open first, then working,
    /// then done.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim().to_lowercase();
        if s.contains("not started") || s.contains("open") {
            TaskStatus::Open
        } else if s.contains("in progress") || s.contains("working") {
            TaskStatus::Working
        } else if s.contains("done") || s.contains("complete") {
            TaskStatus::Done
        } else {
            TaskStatus::Other(raw.trim().to_string())
        }
    }

    /// The label written back to the sheet.
    pub fn label(&self) -> &str {
        match self {
            TaskStatus::Open => "Open",
            TaskStatus::Working => "Working on it",
            TaskStatus::Done => "Done",
            TaskStatus::Other(raw) => raw,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a status label to its canonical percentage.
///
/// Total over all strings: unrecognized text maps to 0 rather than failing.
pub fn status_to_percent(status: &str) -> u8 {
    match TaskStatus::parse(status) {
        TaskStatus::Open => 0,
        TaskStatus::Working => 50,
        TaskStatus::Done => 100,
        TaskStatus::Other(_) => 0,
    }
}

/// Reconcile a status edit against the row's prior percentage.
///
/// Policy: a Working edit keeps an existing 1-99 value and falls back to the
/// 50% placeholder only when the prior value is 0 or unknown. Open and Done
/// always pin to 0 and 100.
pub fn reconcile_percent(status: &str, prior: Option<u8>) -> u8 {
    match TaskStatus::parse(status) {
        TaskStatus::Open => 0,
        TaskStatus::Working => match prior {
            Some(p) if (1..=99).contains(&p) => p,
            _ => 50,
        },
        TaskStatus::Done => 100,
        TaskStatus::Other(_) => prior.unwrap_or(0),
    }
}

/// Display label derived from a percentage. Never the source of truth.
pub fn percent_to_status_label(pct: f64) -> &'static str {
    if pct <= 0.0 {
        "Not Started"
    } else if pct < 100.0 {
        "In Progress"
    } else {
        "Complete"
    }
}

/// A row is archived iff its normalized status is exactly "done".
pub fn should_archive(status: &str) -> bool {
    status.trim().eq_ignore_ascii_case("done")
}

/// Parse a percentage cell ("50", "50%", " 50 % ") into 0-100.
pub fn parse_percent(raw: &str) -> Option<u8> {
    let cleaned = raw.trim().trim_end_matches('%').trim();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    Some(value.clamp(0.0, 100.0).round() as u8)
}
