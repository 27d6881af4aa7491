use crate::status::TaskStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

//==============================================================================
// Task records
//==============================================================================

/// A task row after the single coercion step at the load boundary.
///
/// Every cell arrives from the sheet as a string; this is the one place they
/// become typed. Person and Task are required — rows missing either are
/// quarantined, not defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub transcript_id: Option<String>,
    pub date_assigned: Option<NaiveDate>,
    pub person: String,
    pub task: String,
    pub project: String,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub notes: String,
    pub progress_percent: u8,
}

impl TaskRecord {
    /// Cell value for a logical column, as written to the sheet.
    pub fn field(&self, logical: &str) -> String {
        match logical {
            "Transcript ID" => self.transcript_id.clone().unwrap_or_default(),
            "Date Assigned" => format_date(self.date_assigned),
            "Person" => self.person.clone(),
            "Task" => self.task.clone(),
            "Project" => self.project.clone(),
            "Status" => self.status.label().to_string(),
            "Due Date" => format_date(self.due_date),
            "Notes" => self.notes.clone(),
            "Progress %" => format!("{}%", self.progress_percent),
            _ => String::new(),
        }
    }
}

/// The sheet's column order, used when appending to an empty worksheet.
pub const TASK_SHEET_HEADER: [&str; 9] = [
    "Transcript ID",
    "Date Assigned",
    "Person",
    "Task",
    "Project",
    "Status",
    "Due Date",
    "Notes",
    "Progress %",
];

fn format_date(date: Option<NaiveDate>) -> String {
    // The sheet has always carried US-style dates.
    date.map(|d| d.format("%m/%d/%Y").to_string())
        .unwrap_or_default()
}

/// A row the coercion step refused, with enough context to inspect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantinedRow {
    /// Zero-based index into the normalized table's data rows.
    pub row_index: usize,
    pub reason: String,
    pub cells: Vec<String>,
}

//==============================================================================
// Roles and access scopes
//==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Contributor,
}

/// What slice of the task table a user may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AccessScope {
    /// Every row.
    All,
    /// Every row except the named projects.
    Exclude { projects: Vec<String> },
    /// Only the named projects.
    Projects { projects: Vec<String> },
    /// Only rows assigned to the user themselves.
    Own,
}

impl AccessScope {
    /// Friendly description shown in the overview header.
    pub fn describe(&self) -> String {
        match self {
            AccessScope::All => "All projects".to_string(),
            AccessScope::Exclude { projects } => {
                format!("All projects except {}", projects.join(", "))
            }
            AccessScope::Projects { projects } => match projects.len() {
                1 => format!("{} projects", projects[0]),
                _ => format!("{} projects", projects.join(" and ")),
            },
            AccessScope::Own => "Your assigned tasks".to_string(),
        }
    }
}

//==============================================================================
// KPIs
//==============================================================================

/// Headline counts for a scope-filtered set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub my_open_tasks: usize,
    pub team_open_tasks: usize,
    pub active_projects: usize,
    pub open_tasks: usize,
    pub working_tasks: usize,
    pub done_tasks: usize,
    pub total_tasks: usize,
    /// Mean of the rows' progress percentages; unparseable cells counted as 0
    /// upstream, so this is total over any input.
    pub avg_progress: f64,
}

/// Per-project slice of the same counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectKpis {
    pub project: String,
    pub open_tasks: usize,
    pub working_tasks: usize,
    pub done_tasks: usize,
    pub total_tasks: usize,
    pub avg_progress: f64,
}
