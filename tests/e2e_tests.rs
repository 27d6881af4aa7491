//! End-to-end flows over the in-memory backend: load, normalize, edit,
//! guarded save, archival.

use metaflex_ops::schema::{strip_suffix, NormalizerConfig};
use metaflex_ops::sheets::{self, MemorySheets, SheetStore, SheetWriter};
use metaflex_ops::tasks;
use metaflex_ops::OpsError;
use pretty_assertions::assert_eq;

const ACTIVE: &str = "Otter_Tasks";
const ARCHIVE: &str = "Archive";

fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

#[test]
fn duplicate_headers_resolve_to_first_occurrence() {
    let store = MemorySheets::new().with_sheet(
        ACTIVE,
        grid(&[
            &["Task", "Task", "Status"],
            &["Fix bug", "Write tests", "Open"],
        ]),
    );
    let table = sheets::load_table(&store, ACTIVE, &NormalizerConfig::default()).unwrap();

    // Two distinct physical columns for the duplicated header.
    assert_eq!(table.columns(), &["Task___0", "Task___1", "Status___2"]);
    assert!(table.exists("Task"));
    assert_eq!(table.lookup("Task"), "Task___0");
    assert_eq!(table.cell(0, "Task"), Some("Fix bug"));

    // Round-trip law: stripping a produced id recovers the logical header.
    for physical in table.columns() {
        let logical = strip_suffix(physical);
        assert!(physical.starts_with(&logical));
        assert_eq!(strip_suffix(&logical), logical);
    }
}

#[test]
fn done_edit_relocates_row_to_archive() {
    let mut store = MemorySheets::new().with_sheet(
        ACTIVE,
        grid(&[
            &["Transcript ID", "Person", "Task", "Status", "Progress %"],
            &["T1", "Téa Phillips", "Plan conference", "Open", "0%"],
            &["T2", "Megan Cole", "Draft campaign", "Working on it", "50%"],
        ]),
    );

    // Edit T2 from Working to Done, the way the quick-update path does.
    let mut table = sheets::load_table(&store, ACTIVE, &NormalizerConfig::default()).unwrap();
    let row = tasks::find_by_transcript(&table, "T2").unwrap();
    tasks::apply_status_update(&mut table, row, "Done", None).unwrap();

    let outcome = SheetWriter::new(&mut store, ACTIVE, ARCHIVE)
        .save(&table)
        .unwrap();
    assert_eq!(outcome.archived, 1);

    // Gone from the active sheet.
    let active = store.read_all(ACTIVE).unwrap();
    assert_eq!(active.len(), 2);
    assert!(active.iter().all(|r| r[0] != "T2"));

    // Present in the archive, with the extra archived-date field filled in.
    let archive = store.read_all(ARCHIVE).unwrap();
    assert_eq!(archive[0].last().map(String::as_str), Some("Archived Date"));
    let archived_row = archive.iter().find(|r| r[0] == "T2").unwrap();
    assert_eq!(archived_row[3], "Done");
    assert_eq!(archived_row[4], "100%");
    assert!(!archived_row.last().unwrap().is_empty());
}

#[test]
fn shrinking_save_is_rejected_with_no_mutation() {
    // A 50-row sheet and an edited table of 40 rows: refused, still 50 rows.
    let mut rows: Vec<Vec<String>> = vec![vec![
        "Task".to_string(),
        "Person".to_string(),
        "Status".to_string(),
    ]];
    for i in 0..49 {
        rows.push(vec![
            format!("task {}", i),
            "Alice".to_string(),
            "Open".to_string(),
        ]);
    }
    let mut store = MemorySheets::new().with_sheet(ACTIVE, rows);
    assert_eq!(store.row_count(ACTIVE).unwrap(), 50);

    let mut table = sheets::load_table(&store, ACTIVE, &NormalizerConfig::default()).unwrap();
    table.rows_mut().truncate(39);

    let err = SheetWriter::new(&mut store, ACTIVE, ARCHIVE)
        .save(&table)
        .unwrap_err();
    assert!(matches!(err, OpsError::WouldDeleteRows { have: 40, need: 50 }));
    assert!(err.to_string().contains("would delete rows"));

    // Zero rows removed.
    assert_eq!(store.row_count(ACTIVE).unwrap(), 50);
}

#[test]
fn full_pipeline_load_coerce_edit_save_reload() {
    let mut store = MemorySheets::new().with_sheet(
        ACTIVE,
        grid(&[
            &["Transcript ID", "Date Assigned", "Person", "Task", "Project", "Status", "Due Date", "Notes", "Progress %"],
            &["T1", "01/02/2024", "Téa Phillips", "Plan conference", "Conference", "Open", "02/01/2024", "", "0%"],
            &["T2", "01/03/2024", "Megan Cole", "Draft campaign", "Marketing", "Working on it", "02/15/2024", "", "75%"],
        ]),
    );

    let table = sheets::load_table(&store, ACTIVE, &NormalizerConfig::default()).unwrap();
    let outcome = tasks::coerce_records(&table).unwrap();
    assert_eq!(outcome.records.len(), 2);
    assert!(outcome.quarantined.is_empty());

    // A Working edit keeps the midway 75% rather than resetting to 50%.
    let mut edited = table.clone();
    let row = tasks::find_by_transcript(&edited, "T2").unwrap();
    tasks::apply_status_update(&mut edited, row, "Working on it", None).unwrap();

    SheetWriter::new(&mut store, ACTIVE, ARCHIVE)
        .save(&edited)
        .unwrap();

    let reloaded = sheets::load_table(&store, ACTIVE, &NormalizerConfig::default()).unwrap();
    let records = tasks::coerce_records(&reloaded).unwrap().records;
    let t2 = records
        .iter()
        .find(|r| r.transcript_id.as_deref() == Some("T2"))
        .unwrap();
    assert_eq!(t2.progress_percent, 75);

    // Headers round-tripped clean (no ___ suffix leaked into the sheet).
    let raw = store.read_all(ACTIVE).unwrap();
    assert!(raw[0].iter().all(|h| !h.contains("___")));
}

#[test]
fn empty_sheet_degrades_to_empty_table() {
    let store = MemorySheets::new();
    let table = sheets::load_table(&store, ACTIVE, &NormalizerConfig::default()).unwrap();
    assert!(table.is_empty());
    assert_eq!(table.column_count(), 0);
}
