//! Typed task records: the single coercion step at the load boundary, KPI
//! calculation, and scope/search filtering.

use crate::error::{OpsError, OpsResult};
use crate::schema::{ResolvedSchema, SheetSchema, SheetTable};
use crate::status::{self, TaskStatus};
use crate::types::{AccessScope, Kpis, ProjectKpis, QuarantinedRow, TaskRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Result of coercing a normalized table: the rows that became records, and
/// the rows that were refused with a reason.
#[derive(Debug, Clone, Default)]
pub struct CoercionOutcome {
    pub records: Vec<TaskRecord>,
    pub quarantined: Vec<QuarantinedRow>,
}

/// Coerce every row of a normalized table into [`TaskRecord`]s.
///
/// Person and Task are required; a row missing either is quarantined rather
/// than silently defaulted. Everything else degrades: unparseable dates
/// become `None`, unparseable percentages fall back to the status mapping.
pub fn coerce_records(table: &SheetTable) -> OpsResult<CoercionOutcome> {
    let resolved = SheetSchema::task_sheet().resolve(table)?;
    let mut outcome = CoercionOutcome::default();

    for (idx, row) in table.rows().iter().enumerate() {
        match coerce_row(table, &resolved, idx) {
            Ok(record) => outcome.records.push(record),
            Err(reason) => outcome.quarantined.push(QuarantinedRow {
                row_index: idx,
                reason,
                cells: row.clone(),
            }),
        }
    }

    Ok(outcome)
}

fn coerce_row(
    table: &SheetTable,
    resolved: &ResolvedSchema,
    idx: usize,
) -> Result<TaskRecord, String> {
    let cell = |logical: &str| {
        resolved
            .cell(table, idx, logical)
            .unwrap_or("")
            .trim()
            .to_string()
    };

    let person = cell("Person");
    if person.is_empty() {
        return Err("missing Person".to_string());
    }
    let task = cell("Task");
    if task.is_empty() {
        return Err("missing Task".to_string());
    }

    let status_raw = cell("Status");
    let status = TaskStatus::parse(&status_raw);
    let progress_percent = status::parse_percent(&cell("Progress %"))
        .unwrap_or_else(|| status::status_to_percent(&status_raw));

    let transcript_id = match cell("Transcript ID") {
        id if id.is_empty() || id.eq_ignore_ascii_case("nan") => None,
        id => Some(id),
    };

    Ok(TaskRecord {
        transcript_id,
        date_assigned: parse_date(&cell("Date Assigned")),
        person,
        task,
        project: cell("Project"),
        status,
        due_date: parse_date(&cell("Due Date")),
        notes: cell("Notes"),
        progress_percent,
    })
}

/// Locate a row by its Transcript ID. The sheet has used both "Transcript
/// ID" and plain "Transcript" as the header across revisions.
pub fn find_by_transcript(table: &SheetTable, transcript_id: &str) -> OpsResult<usize> {
    let column = if table.exists("Transcript ID") {
        "Transcript ID"
    } else if table.exists("Transcript") {
        "Transcript"
    } else {
        return Err(OpsError::Schema(
            "sheet has no Transcript ID column".to_string(),
        ));
    };
    let idx = table
        .column_index(column)
        .ok_or_else(|| OpsError::Schema("sheet has no Transcript ID column".to_string()))?;

    let needle = transcript_id.trim();
    table
        .rows()
        .iter()
        .position(|row| row.get(idx).map(|c| c.trim() == needle).unwrap_or(false))
        .ok_or_else(|| OpsError::Parse(format!("no task with transcript id '{}'", needle)))
}

/// Apply a status (and optional due date) edit to one row, keeping the
/// progress percentage reconciled with the new status.
pub fn apply_status_update(
    table: &mut SheetTable,
    row_idx: usize,
    status_raw: &str,
    due_date: Option<NaiveDate>,
) -> OpsResult<()> {
    let status_idx = table
        .column_index("Status")
        .ok_or_else(|| OpsError::Schema("sheet has no Status column".to_string()))?;
    let progress_idx = table.column_index("Progress %");
    let due_idx = table.column_index("Due Date");

    let prior = progress_idx
        .and_then(|idx| table.rows().get(row_idx)?.get(idx).cloned())
        .and_then(|cell| status::parse_percent(&cell));
    let percent = status::reconcile_percent(status_raw, prior);
    let label = TaskStatus::parse(status_raw).label().to_string();

    let row = table
        .rows_mut()
        .get_mut(row_idx)
        .ok_or_else(|| OpsError::Parse(format!("row {} out of range", row_idx)))?;
    row[status_idx] = label;
    if let Some(idx) = progress_idx {
        row[idx] = format!("{}%", percent);
    }
    if let (Some(idx), Some(due)) = (due_idx, due_date) {
        row[idx] = due.format("%m/%d/%Y").to_string();
    }
    Ok(())
}

/// Parse a date cell. The sheet carries US-style dates; ISO shows up in
/// rows pasted from elsewhere.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Case-insensitive first-name match, the way the sheet's Person cells have
/// always been filtered.
pub fn person_matches(person: &str, user_name: &str) -> bool {
    let needle = match user_name.split_whitespace().next() {
        Some(first) => first.to_lowercase(),
        None => return false,
    };
    person.to_lowercase().contains(&needle)
}

/// Apply a user's access scope to a record set.
pub fn filter_by_scope<'a>(
    records: &'a [TaskRecord],
    scope: &AccessScope,
    user_name: &str,
) -> Vec<&'a TaskRecord> {
    records
        .iter()
        .filter(|r| match scope {
            AccessScope::All => true,
            AccessScope::Exclude { projects } => !project_in(&r.project, projects),
            AccessScope::Projects { projects } => project_in(&r.project, projects),
            AccessScope::Own => person_matches(&r.person, user_name),
        })
        .collect()
}

fn project_in(project: &str, list: &[String]) -> bool {
    let p = project.trim().to_lowercase();
    list.iter().any(|candidate| candidate.trim().to_lowercase() == p)
}

/// Keyword search across every field of a record.
pub fn search<'a>(records: &[&'a TaskRecord], term: &str) -> Vec<&'a TaskRecord> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|r| {
            [
                r.transcript_id.clone().unwrap_or_default(),
                r.person.clone(),
                r.task.clone(),
                r.project.clone(),
                r.status.label().to_string(),
                r.notes.clone(),
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
        })
        .copied()
        .collect()
}

/// Headline counts for a record set, relative to the named user.
pub fn calculate_kpis(records: &[&TaskRecord], user_name: &str) -> Kpis {
    let open = records
        .iter()
        .filter(|r| r.status == TaskStatus::Open)
        .count();
    let working = records
        .iter()
        .filter(|r| r.status == TaskStatus::Working)
        .count();
    let done = records.iter().filter(|r| r.status.is_done()).count();

    let my_open = records
        .iter()
        .filter(|r| r.status == TaskStatus::Open && person_matches(&r.person, user_name))
        .count();

    let projects: std::collections::BTreeSet<String> = records
        .iter()
        .filter(|r| !r.project.trim().is_empty())
        .map(|r| r.project.trim().to_lowercase())
        .collect();

    let avg_progress = if records.is_empty() {
        0.0
    } else {
        let sum: f64 = records.iter().map(|r| r.progress_percent as f64).sum();
        (sum / records.len() as f64 * 10.0).round() / 10.0
    };

    Kpis {
        my_open_tasks: my_open,
        team_open_tasks: open,
        active_projects: projects.len(),
        open_tasks: open,
        working_tasks: working,
        done_tasks: done,
        total_tasks: records.len(),
        avg_progress,
    }
}

/// Per-project counts, sorted by project name.
pub fn project_breakdown(records: &[&TaskRecord]) -> Vec<ProjectKpis> {
    let mut groups: BTreeMap<String, Vec<&TaskRecord>> = BTreeMap::new();
    for record in records {
        let key = record.project.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        groups.entry(key).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|(_, members)| {
            let display = members[0].project.trim().to_string();
            let open = members
                .iter()
                .filter(|r| r.status == TaskStatus::Open)
                .count();
            let working = members
                .iter()
                .filter(|r| r.status == TaskStatus::Working)
                .count();
            let done = members.iter().filter(|r| r.status.is_done()).count();
            let avg: f64 = members
                .iter()
                .map(|r| r.progress_percent as f64)
                .sum::<f64>()
                / members.len() as f64;
            ProjectKpis {
                project: display,
                open_tasks: open,
                working_tasks: working,
                done_tasks: done,
                total_tasks: members.len(),
                avg_progress: (avg * 10.0).round() / 10.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{normalize, NormalizerConfig};
    use pretty_assertions::assert_eq;

    fn sample_table() -> SheetTable {
        let headers: Vec<String> = [
            "Transcript ID",
            "Date Assigned",
            "Person",
            "Task",
            "Project",
            "Status",
            "Due Date",
            "Notes",
            "Progress %",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let rows = vec![
            vec![
                "T1", "01/02/2024", "Téa Phillips", "Plan conference", "Conference",
                "Open", "02/01/2024", "", "0%",
            ],
            vec![
                "T2", "01/03/2024", "Megan Cole", "Draft campaign", "Marketing",
                "Working on it", "02/15/2024", "halfway", "50%",
            ],
            vec![
                "T3", "01/04/2024", "Justin Stehr", "Ship gloves", "Products",
                "Done", "01/20/2024", "", "100%",
            ],
            // Missing Person: quarantined.
            vec!["T4", "", "", "Orphan row", "Marketing", "Open", "", "", ""],
        ]
        .into_iter()
        .map(|r| r.into_iter().map(|c| c.to_string()).collect())
        .collect::<Vec<Vec<String>>>();
        normalize(&headers, &rows, &NormalizerConfig { max_columns: 16, ..Default::default() })
    }

    #[test]
    fn coercion_types_rows_and_quarantines_bad_ones() {
        let outcome = coerce_records(&sample_table()).unwrap();
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.quarantined.len(), 1);
        assert_eq!(outcome.quarantined[0].reason, "missing Person");

        let first = &outcome.records[0];
        assert_eq!(first.transcript_id.as_deref(), Some("T1"));
        assert_eq!(
            first.date_assigned,
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
        assert_eq!(first.status, TaskStatus::Open);
        assert_eq!(first.progress_percent, 0);
    }

    #[test]
    fn progress_falls_back_to_status_mapping() {
        let headers: Vec<String> = ["Person", "Task", "Status", "Progress %"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows = vec![vec![
            "Alice".to_string(),
            "Do thing".to_string(),
            "Working on it".to_string(),
            "n/a".to_string(),
        ]];
        let table = normalize(&headers, &rows, &NormalizerConfig::default());
        let outcome = coerce_records(&table).unwrap();
        assert_eq!(outcome.records[0].progress_percent, 50);
    }

    #[test]
    fn scope_filtering() {
        let outcome = coerce_records(&sample_table()).unwrap();
        let records = outcome.records;

        let all = filter_by_scope(&records, &AccessScope::All, "Téa Phillips");
        assert_eq!(all.len(), 3);

        let no_marketing = filter_by_scope(
            &records,
            &AccessScope::Exclude { projects: vec!["Marketing".to_string()] },
            "Jess Lewis",
        );
        assert_eq!(no_marketing.len(), 2);

        let marketing_only = filter_by_scope(
            &records,
            &AccessScope::Projects { projects: vec!["marketing".to_string()] },
            "Megan Cole",
        );
        assert_eq!(marketing_only.len(), 1);
        assert_eq!(marketing_only[0].person, "Megan Cole");

        let own = filter_by_scope(&records, &AccessScope::Own, "Téa Phillips");
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].task, "Plan conference");
    }

    #[test]
    fn kpis_count_by_status() {
        let outcome = coerce_records(&sample_table()).unwrap();
        let refs: Vec<&TaskRecord> = outcome.records.iter().collect();
        let kpis = calculate_kpis(&refs, "Téa Phillips");
        assert_eq!(kpis.open_tasks, 1);
        assert_eq!(kpis.working_tasks, 1);
        assert_eq!(kpis.done_tasks, 1);
        assert_eq!(kpis.total_tasks, 3);
        assert_eq!(kpis.my_open_tasks, 1);
        assert_eq!(kpis.active_projects, 3);
        assert_eq!(kpis.avg_progress, 50.0);
    }

    #[test]
    fn project_breakdown_groups_case_insensitively() {
        let outcome = coerce_records(&sample_table()).unwrap();
        let refs: Vec<&TaskRecord> = outcome.records.iter().collect();
        let breakdown = project_breakdown(&refs);
        let names: Vec<&str> = breakdown.iter().map(|p| p.project.as_str()).collect();
        assert_eq!(names, vec!["Conference", "Marketing", "Products"]);
    }

    #[test]
    fn status_update_reconciles_progress() {
        let mut table = sample_table();
        let row = find_by_transcript(&table, "T2").unwrap();

        // Working rows keep their midway percentage on a no-op status edit.
        apply_status_update(&mut table, row, "Working on it", None).unwrap();
        let progress_idx = table.column_index("Progress %").unwrap();
        assert_eq!(table.rows()[row][progress_idx], "50%");

        apply_status_update(
            &mut table,
            row,
            "Done",
            NaiveDate::from_ymd_opt(2024, 3, 1),
        )
        .unwrap();
        let status_idx = table.column_index("Status").unwrap();
        let due_idx = table.column_index("Due Date").unwrap();
        assert_eq!(table.rows()[row][status_idx], "Done");
        assert_eq!(table.rows()[row][progress_idx], "100%");
        assert_eq!(table.rows()[row][due_idx], "03/01/2024");

        assert!(find_by_transcript(&table, "T999").is_err());
    }

    #[test]
    fn search_matches_any_field() {
        let outcome = coerce_records(&sample_table()).unwrap();
        let refs: Vec<&TaskRecord> = outcome.records.iter().collect();
        assert_eq!(search(&refs, "campaign").len(), 1);
        assert_eq!(search(&refs, "GLOVES").len(), 1);
        assert_eq!(search(&refs, "").len(), 3);
        assert_eq!(search(&refs, "nothing-here").len(), 0);
    }
}
