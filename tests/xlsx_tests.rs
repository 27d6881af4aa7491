//! The same flows against a real workbook on disk.

use metaflex_ops::schema::NormalizerConfig;
use metaflex_ops::sheets::{self, SheetStore, SheetWriter, XlsxSheets};
use metaflex_ops::status::TaskStatus;
use metaflex_ops::tasks;
use metaflex_ops::types::TaskRecord;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const ACTIVE: &str = "Otter_Tasks";
const ARCHIVE: &str = "Archive";

fn record(person: &str, task: &str, status: TaskStatus) -> TaskRecord {
    TaskRecord {
        transcript_id: Some(format!("T-{}", task.len())),
        date_assigned: None,
        person: person.to_string(),
        task: task.to_string(),
        project: "General".to_string(),
        status,
        due_date: None,
        notes: String::new(),
        progress_percent: 0,
    }
}

#[test]
fn workbook_round_trip_with_archive() {
    let dir = TempDir::new().unwrap();
    let mut store = XlsxSheets::new(dir.path().join("ops.xlsx"));

    {
        let mut writer = SheetWriter::new(&mut store, ACTIVE, ARCHIVE);
        writer
            .append_task(&record("Téa Phillips", "Plan conference", TaskStatus::Open))
            .unwrap();
        writer
            .append_task(&record("Megan Cole", "Draft campaign", TaskStatus::Working))
            .unwrap();
    }

    let table = sheets::load_table(&store, ACTIVE, &NormalizerConfig::default()).unwrap();
    assert_eq!(table.row_count(), 2);

    let records = tasks::coerce_records(&table).unwrap().records;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].person, "Téa Phillips");

    // Mark the second task Done and save; it should land in the Archive tab.
    let mut edited = table.clone();
    let status_idx = edited.column_index("Status").unwrap();
    edited.rows_mut()[1][status_idx] = "Done".to_string();

    let outcome = SheetWriter::new(&mut store, ACTIVE, ARCHIVE)
        .save(&edited)
        .unwrap();
    assert_eq!(outcome.archived, 1);

    assert!(store.worksheet_exists(ARCHIVE).unwrap());
    let archive = store.read_all(ARCHIVE).unwrap();
    assert_eq!(archive.len(), 2);
    assert_eq!(archive[0].last().map(String::as_str), Some("Archived Date"));

    let active = store.read_all(ACTIVE).unwrap();
    assert_eq!(active.len(), 2); // header + the one remaining task
}

#[test]
fn workbook_guard_rejects_shrinking_save() {
    let dir = TempDir::new().unwrap();
    let mut store = XlsxSheets::new(dir.path().join("ops.xlsx"));

    {
        let mut writer = SheetWriter::new(&mut store, ACTIVE, ARCHIVE);
        for i in 0..5 {
            writer
                .append_task(&record("Alice", &format!("task {}", i), TaskStatus::Open))
                .unwrap();
        }
    }

    let mut table = sheets::load_table(&store, ACTIVE, &NormalizerConfig::default()).unwrap();
    table.rows_mut().truncate(2);

    let result = SheetWriter::new(&mut store, ACTIVE, ARCHIVE).save(&table);
    assert!(result.is_err());
    assert_eq!(store.read_all(ACTIVE).unwrap().len(), 6);
}
