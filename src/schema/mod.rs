//! Column normalization for raw sheet grids.
//!
//! The backing spreadsheet returns a header row that may contain blank and
//! duplicate names. Loading appends an `___{i}` ordinal (the original column
//! index) to every surviving header so physical ids are unique by
//! construction, keeps a first-occurrence map from each logical name back to
//! its physical id, and strips the suffix again on write-back.

use crate::error::{OpsError, OpsResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Everything after the first run of two-or-more underscores.
const SUFFIX_PATTERN: &str = r"__+.*$";

fn suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SUFFIX_PATTERN).expect("static suffix pattern"))
}

/// Remove the disambiguating suffix from a physical column id.
///
/// Idempotent: stripping an already-clean name is a no-op.
pub fn strip_suffix(physical: &str) -> String {
    suffix_regex().replace(physical, "").into_owned()
}

/// Normalizer knobs. The width cap and hidden set come from the sheet's
/// historical layout; both are configuration, not constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Columns at or beyond this original index are dropped outright.
    #[serde(default = "default_max_columns")]
    pub max_columns: usize,
    /// Headers dropped by exact name (helper/noise columns in the sheet).
    #[serde(default = "default_hidden_columns")]
    pub hidden_columns: Vec<String>,
}

fn default_max_columns() -> usize {
    10
}

fn default_hidden_columns() -> Vec<String> {
    [
        "Progress Bar",
        "Confidence",
        "Emails",
        "Email",
        "Duplicate Check",
        "0%",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_columns: default_max_columns(),
            hidden_columns: default_hidden_columns(),
        }
    }
}

impl NormalizerConfig {
    fn is_hidden(&self, name: &str) -> bool {
        self.hidden_columns.iter().any(|h| h == name)
            || name.to_lowercase().contains("confidence")
    }
}

/// A normalized table: unique physical column ids, rectangular string rows,
/// and the first-occurrence logical-to-physical map for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    logical_map: BTreeMap<String, String>,
}

/// Build a [`SheetTable`] from a raw grid (header row + data rows).
///
/// Blank headers are synthesized as `Unnamed_{i}`; a column that is blank in
/// both header and every cell is dropped, as are columns past the width cap
/// and columns in the hidden set. Fully-blank data rows are dropped. No I/O.
pub fn normalize(
    headers: &[String],
    rows: &[Vec<String>],
    config: &NormalizerConfig,
) -> SheetTable {
    // Decide which original column indices survive.
    let mut kept: Vec<(usize, String)> = Vec::new();
    for (i, raw) in headers.iter().enumerate() {
        if i >= config.max_columns {
            continue;
        }
        let name = raw.trim();
        if name.is_empty() {
            let has_data = rows
                .iter()
                .any(|row| row.get(i).map(|c| !c.trim().is_empty()).unwrap_or(false));
            if !has_data {
                continue;
            }
            kept.push((i, format!("Unnamed_{}", i)));
            continue;
        }
        if config.is_hidden(name) {
            continue;
        }
        kept.push((i, name.to_string()));
    }

    let columns: Vec<String> = kept
        .iter()
        .map(|(i, name)| format!("{}___{}", name, i))
        .collect();

    let mut logical_map = BTreeMap::new();
    for ((_, name), physical) in kept.iter().zip(&columns) {
        logical_map
            .entry(name.clone())
            .or_insert_with(|| physical.clone());
    }

    // Ragged source rows pad with empty cells; fully-blank rows are noise.
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            kept.iter()
                .map(|(i, _)| row.get(*i).cloned().unwrap_or_default())
                .collect::<Vec<String>>()
        })
        .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
        .collect();

    SheetTable {
        columns,
        rows,
        logical_map,
    }
}

impl SheetTable {
    /// Rebuild a table from physical ids and rows, e.g. an edited grid sent
    /// back by a client. The logical map is recomputed by stripping each id.
    pub fn from_parts(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut logical_map = BTreeMap::new();
        for physical in &columns {
            logical_map
                .entry(strip_suffix(physical))
                .or_insert_with(|| physical.clone());
        }
        Self {
            columns,
            rows,
            logical_map,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Vec<String>> {
        &mut self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Physical headers restored to their clean (logical) form, in column
    /// order. Used on write-back.
    pub fn clean_headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| strip_suffix(c)).collect()
    }

    /// Resolve a logical name to a physical id.
    ///
    /// Exact match wins, then the first physical id starting with
    /// `{logical}___`. A miss echoes the input back unchanged; the caller's
    /// downstream access fails instead. Known sharp edge, kept deliberately:
    /// use [`SheetSchema::resolve`] where a declared mapping is available.
    pub fn lookup<'a>(&'a self, logical: &'a str) -> &'a str {
        if self.columns.iter().any(|c| c == logical) {
            return logical;
        }
        let prefix = format!("{}___", logical);
        if let Some(col) = self.columns.iter().find(|c| c.starts_with(&prefix)) {
            return col;
        }
        logical
    }

    /// Whether a logical name resolves to a physical column. Never errors.
    pub fn exists(&self, logical: &str) -> bool {
        let prefix = format!("{}___", logical);
        self.columns
            .iter()
            .any(|c| c == logical || c.starts_with(&prefix))
    }

    /// Index of the column a logical name resolves to, if any.
    pub fn column_index(&self, logical: &str) -> Option<usize> {
        let physical = self.lookup(logical);
        self.columns.iter().position(|c| c == physical)
    }

    /// Cell accessor by row index and logical name.
    pub fn cell(&self, row: usize, logical: &str) -> Option<&str> {
        let idx = self.column_index(logical)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }
}

/// One expected column: a logical name plus its declared aliases.
#[derive(Debug, Clone)]
pub struct SchemaColumn {
    pub logical: String,
    pub aliases: Vec<String>,
    pub required: bool,
}

impl SchemaColumn {
    fn new(logical: &str, aliases: &[&str], required: bool) -> Self {
        Self {
            logical: logical.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            required,
        }
    }

    fn matches(&self, clean_name: &str) -> bool {
        self.logical.eq_ignore_ascii_case(clean_name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(clean_name))
    }
}

/// Declared column expectations, resolved once per load into a fixed
/// logical-to-index mapping. Replaces repeated runtime suffix scans.
#[derive(Debug, Clone)]
pub struct SheetSchema {
    pub columns: Vec<SchemaColumn>,
}

/// Fixed logical-name-to-column-index mapping for one loaded table.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    map: BTreeMap<String, usize>,
}

impl ResolvedSchema {
    pub fn index_of(&self, logical: &str) -> Option<usize> {
        self.map.get(logical).copied()
    }

    pub fn cell<'t>(&self, table: &'t SheetTable, row: usize, logical: &str) -> Option<&'t str> {
        let idx = self.index_of(logical)?;
        table.rows().get(row)?.get(idx).map(String::as_str)
    }
}

impl SheetSchema {
    /// The task sheet's expected columns, with the Person/Assigned To alias
    /// the sheet has carried across revisions.
    pub fn task_sheet() -> Self {
        Self {
            columns: vec![
                SchemaColumn::new("Transcript ID", &["Transcript"], false),
                SchemaColumn::new("Date Assigned", &[], false),
                SchemaColumn::new("Person", &["Assigned To"], true),
                SchemaColumn::new("Task", &[], true),
                SchemaColumn::new("Project", &[], false),
                SchemaColumn::new("Status", &[], false),
                SchemaColumn::new("Due Date", &[], false),
                SchemaColumn::new("Notes", &[], false),
                SchemaColumn::new("Progress %", &["Progress"], false),
            ],
        }
    }

    /// The declared logical name a clean header maps to, if any.
    pub fn logical_for(&self, clean_name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|col| col.matches(clean_name))
            .map(|col| col.logical.as_str())
    }

    /// Resolve each declared column against the table's physical ids.
    ///
    /// Duplicate physical copies of the same header bind to the first
    /// occurrence (the table's own invariant). Two *different* header names
    /// matching one logical column (e.g. both "Person" and "Assigned To"
    /// present) is ambiguous and rejected rather than inferred. A missing
    /// required column is an error; missing optional columns are simply
    /// absent from the mapping.
    pub fn resolve(&self, table: &SheetTable) -> OpsResult<ResolvedSchema> {
        let clean: Vec<String> = table.clean_headers();
        let mut map = BTreeMap::new();

        for col in &self.columns {
            let mut matched_names: Vec<&str> = Vec::new();
            let mut first_index = None;
            for (idx, name) in clean.iter().enumerate() {
                if col.matches(name) {
                    if first_index.is_none() {
                        first_index = Some(idx);
                    }
                    if !matched_names.iter().any(|m| m.eq_ignore_ascii_case(name)) {
                        matched_names.push(name);
                    }
                }
            }
            if matched_names.len() > 1 {
                return Err(OpsError::Schema(format!(
                    "column '{}' matches multiple headers: {}",
                    col.logical,
                    matched_names.join(", ")
                )));
            }
            match first_index {
                Some(idx) => {
                    map.insert(col.logical.clone(), idx);
                }
                None if col.required => {
                    return Err(OpsError::Schema(format!(
                        "required column '{}' not found in sheet",
                        col.logical
                    )));
                }
                None => {}
            }
        }

        Ok(ResolvedSchema { map })
    }
}
