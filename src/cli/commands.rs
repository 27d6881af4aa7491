//! Command implementations for the `mfops` binary.

use crate::api::server::ApiConfig;
use crate::api::run_api_server;
use crate::config::OpsConfig;
use crate::error::{OpsError, OpsResult};
use crate::schema::{SheetSchema, SheetTable};
use crate::sheets::{self, SheetStore, SheetWriter};
use crate::status::TaskStatus;
use crate::tasks;
use crate::types::{AccessScope, TaskRecord};
use chrono::NaiveDate;
use colored::Colorize;

fn load_active(config: &OpsConfig, store: &dyn SheetStore) -> OpsResult<SheetTable> {
    sheets::load_table(store, &config.sheet.worksheet, &config.normalizer)
}

fn colored_status(status: &TaskStatus) -> colored::ColoredString {
    match status {
        TaskStatus::Open => "Open".red(),
        TaskStatus::Working => "Working on it".yellow(),
        TaskStatus::Done => "Done".green(),
        TaskStatus::Other(raw) => raw.as_str().normal(),
    }
}

fn parse_due(raw: Option<&str>) -> OpsResult<Option<NaiveDate>> {
    match raw {
        None => Ok(None),
        Some(s) => tasks::parse_date(s)
            .map(Some)
            .ok_or_else(|| OpsError::Parse(format!("unrecognized date '{}'", s))),
    }
}

/// Execute the overview command
pub fn overview(config: &OpsConfig, user: Option<String>) -> OpsResult<()> {
    println!("{}", "MetaFlex Ops - Overview".bold().green());
    println!("   Worksheet: {}", config.sheet.worksheet);
    println!();

    let store = config.open_store()?;
    let table = load_active(config, store.as_ref())?;
    if table.is_empty() {
        println!("{}", "No tasks found.".yellow());
        return Ok(());
    }

    let outcome = tasks::coerce_records(&table)?;
    let refs: Vec<&TaskRecord> = outcome.records.iter().collect();
    let user_name = user.unwrap_or_default();
    let kpis = tasks::calculate_kpis(&refs, &user_name);

    println!("   {} {}", "Open:".red().bold(), kpis.open_tasks);
    println!("   {} {}", "In progress:".yellow().bold(), kpis.working_tasks);
    println!("   {} {}", "Done:".green().bold(), kpis.done_tasks);
    println!("   Total tasks: {}", kpis.total_tasks);
    println!("   Active projects: {}", kpis.active_projects);
    println!("   Avg progress: {}%", kpis.avg_progress);
    if !user_name.is_empty() {
        println!("   Open tasks for {}: {}", user_name, kpis.my_open_tasks);
    }
    if !outcome.quarantined.is_empty() {
        println!(
            "   {} {} row(s) failed coercion (see 'mfops quarantine')",
            "!".yellow().bold(),
            outcome.quarantined.len()
        );
    }

    let breakdown = tasks::project_breakdown(&refs);
    if !breakdown.is_empty() {
        println!();
        println!("{}", "Projects:".bold());
        for project in breakdown {
            println!(
                "   {:<16} open {:<3} working {:<3} done {:<3} avg {}%",
                project.project.bright_blue(),
                project.open_tasks,
                project.working_tasks,
                project.done_tasks,
                project.avg_progress
            );
        }
    }
    Ok(())
}

/// Execute the list command
pub fn list(
    config: &OpsConfig,
    user: Option<String>,
    project: Option<String>,
    person: Option<String>,
    search: Option<String>,
    include_done: bool,
) -> OpsResult<()> {
    let store = config.open_store()?;
    let table = load_active(config, store.as_ref())?;
    if table.is_empty() {
        println!("{}", "No tasks found.".yellow());
        return Ok(());
    }

    let outcome = tasks::coerce_records(&table)?;
    let scope = match &user {
        Some(_) => AccessScope::Own,
        None => AccessScope::All,
    };
    let user_name = user.unwrap_or_default();
    let mut visible = tasks::filter_by_scope(&outcome.records, &scope, &user_name);

    if let Some(project) = &project {
        let needle = project.trim().to_lowercase();
        visible.retain(|r| r.project.trim().to_lowercase() == needle);
    }
    if let Some(person) = &person {
        visible.retain(|r| tasks::person_matches(&r.person, person));
    }
    if let Some(term) = &search {
        visible = tasks::search(&visible, term);
    }
    if !include_done {
        visible.retain(|r| !r.status.is_done());
    }

    if visible.is_empty() {
        println!("{}", "No tasks match the current filters.".yellow());
        return Ok(());
    }

    println!(
        "{:<18} {:<40} {:<16} {:<14} {:<12} {:>8}",
        "Transcript".bold(),
        "Task".bold(),
        "Person".bold(),
        "Status".bold(),
        "Due".bold(),
        "Progress".bold()
    );
    for record in &visible {
        let due = record
            .due_date
            .map(|d| d.format("%m/%d/%Y").to_string())
            .unwrap_or_default();
        let mut task = record.task.clone();
        if task.chars().count() > 38 {
            task = task.chars().take(37).collect();
            task.push('…');
        }
        println!(
            "{:<18} {:<40} {:<16} {:<14} {:<12} {:>7}%",
            record.transcript_id.clone().unwrap_or_default(),
            task,
            record.person,
            colored_status(&record.status),
            due,
            record.progress_percent
        );
    }
    println!();
    println!("{} task(s)", visible.len());
    Ok(())
}

/// Execute the add command
#[allow(clippy::too_many_arguments)]
pub fn add(
    config: &OpsConfig,
    person: String,
    task: String,
    project: String,
    transcript_id: Option<String>,
    status: Option<String>,
    due_date: Option<String>,
    notes: Option<String>,
) -> OpsResult<()> {
    for (field, value) in [("person", &person), ("task", &task), ("project", &project)] {
        if value.trim().is_empty() {
            return Err(OpsError::Parse(format!("{} is required", field)));
        }
    }

    let status_raw = status.unwrap_or_else(|| "Open".to_string());
    let record = TaskRecord {
        transcript_id: transcript_id.filter(|t| !t.trim().is_empty()),
        date_assigned: Some(chrono::Local::now().date_naive()),
        person: person.trim().to_string(),
        task: task.trim().to_string(),
        project: project.trim().to_string(),
        status: TaskStatus::parse(&status_raw),
        due_date: parse_due(due_date.as_deref())?,
        notes: notes.unwrap_or_default(),
        progress_percent: crate::status::status_to_percent(&status_raw),
    };

    let mut store = config.open_store()?;
    SheetWriter::new(
        &mut *store,
        &config.sheet.worksheet,
        &config.sheet.archive_worksheet,
    )
    .append_task(&record)?;

    println!(
        "{} Task added, assigned to {}",
        "✓".green().bold(),
        record.person.bold()
    );
    Ok(())
}

/// Execute the update command
pub fn update(
    config: &OpsConfig,
    transcript_id: String,
    status: String,
    due_date: Option<String>,
) -> OpsResult<()> {
    let mut store = config.open_store()?;
    let mut table = load_active(config, store.as_ref())?;
    if table.is_empty() {
        return Err(OpsError::Schema("sheet is empty".to_string()));
    }

    let row_idx = tasks::find_by_transcript(&table, &transcript_id)?;
    tasks::apply_status_update(&mut table, row_idx, &status, parse_due(due_date.as_deref())?)?;

    let outcome = SheetWriter::new(
        &mut *store,
        &config.sheet.worksheet,
        &config.sheet.archive_worksheet,
    )
    .save(&table)?;

    println!("{} Task updated", "✓".green().bold());
    if outcome.archived > 0 {
        println!(
            "   {} task(s) moved to {}",
            outcome.archived,
            config.sheet.archive_worksheet.bold()
        );
    }
    Ok(())
}

/// Execute the archive command: sweep every "Done" row to the Archive sheet
pub fn archive_sweep(config: &OpsConfig) -> OpsResult<()> {
    let mut store = config.open_store()?;
    let archived = SheetWriter::new(
        &mut *store,
        &config.sheet.worksheet,
        &config.sheet.archive_worksheet,
    )
    .archive_done_rows()?;

    if archived == 0 {
        println!("{}", "Nothing to archive.".yellow());
    } else {
        println!(
            "{} Archived {} task(s) to {}",
            "✓".green().bold(),
            archived,
            config.sheet.archive_worksheet.bold()
        );
    }
    Ok(())
}

/// Execute the validate command: check the sheet's shape without writing
pub fn validate(config: &OpsConfig) -> OpsResult<()> {
    println!("{}", "MetaFlex Ops - Validating sheet".bold().green());
    println!("   Worksheet: {}", config.sheet.worksheet);
    println!();

    let store = config.open_store()?;
    let table = load_active(config, store.as_ref())?;
    if table.is_empty() {
        println!("{}", "Sheet is empty or has no data rows.".yellow());
        return Ok(());
    }

    println!("   {} column(s), {} row(s)", table.column_count(), table.row_count());
    for physical in table.columns() {
        println!("      {} -> {}", physical.cyan(), crate::schema::strip_suffix(physical));
    }

    let schema = SheetSchema::task_sheet();
    match schema.resolve(&table) {
        Ok(_) => println!("\n{}", "✓ Sheet shape OK".green().bold()),
        Err(e) => {
            println!("\n{} {}", "✗".red().bold(), e);
            return Err(e);
        }
    }

    let outcome = tasks::coerce_records(&table)?;
    println!(
        "   {} record(s) coerced, {} quarantined",
        outcome.records.len(),
        outcome.quarantined.len()
    );
    Ok(())
}

/// Execute the quarantine command
pub fn quarantine(config: &OpsConfig) -> OpsResult<()> {
    let store = config.open_store()?;
    let table = load_active(config, store.as_ref())?;
    if table.is_empty() {
        println!("{}", "No tasks found.".yellow());
        return Ok(());
    }

    let outcome = tasks::coerce_records(&table)?;
    if outcome.quarantined.is_empty() {
        println!("{}", "✓ No quarantined rows".green().bold());
        return Ok(());
    }

    println!(
        "{} {} row(s) failed coercion:",
        "!".yellow().bold(),
        outcome.quarantined.len()
    );
    for row in &outcome.quarantined {
        println!(
            "   row {:<4} {:<20} {}",
            row.row_index + 2, // 1-based sheet row, after the header
            row.reason.red(),
            row.cells.join(" | ")
        );
    }
    Ok(())
}

/// Execute the serve command: run the HTTP API in-process
pub fn serve(config: OpsConfig, host: Option<String>, port: Option<u16>) -> OpsResult<()> {
    let api = ApiConfig {
        host: host.unwrap_or_else(|| config.server.host.clone()),
        port: port.unwrap_or(config.server.port),
    };
    let runtime = tokio::runtime::Runtime::new()?;
    runtime
        .block_on(run_api_server(api, config))
        .map_err(|e| OpsError::Server(e.to_string()))
}
