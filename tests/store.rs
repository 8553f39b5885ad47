use std::fs;

use camino::Utf8PathBuf;

use gisaid_harvest::domain::{METADATA_COLUMNS, SAMPLE_FIELD_COUNT, SampleRecord};
use gisaid_harvest::store::{METADATA_FILE, OutputStore, metadata_header};

fn temp_destination(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().join("fastas")).unwrap()
}

fn record(name: &str) -> SampleRecord {
    let fields = vec!["value".to_string(); SAMPLE_FIELD_COUNT];
    SampleRecord::new(name, fields, ">header\nacgtacgt\n")
}

#[test]
fn scan_matches_fasta_basenames() {
    let temp = tempfile::tempdir().unwrap();
    let destination = temp_destination(&temp);
    fs::create_dir_all(destination.as_std_path()).unwrap();
    fs::write(destination.join("EPI_ISL_1.fasta").as_std_path(), ">a\nACGT\n").unwrap();
    fs::write(destination.join("EPI_ISL_2.fasta").as_std_path(), ">b\nACGT\n").unwrap();
    fs::write(destination.join("notes.txt").as_std_path(), "ignore").unwrap();

    let store = OutputStore::open(destination).unwrap();
    assert!(store.contains("EPI_ISL_1"));
    assert!(store.contains("EPI_ISL_2"));
    assert!(!store.contains("notes"));
    assert_eq!(store.downloaded_count(), 2);
}

#[test]
fn finished_only_when_target_is_covered() {
    let temp = tempfile::tempdir().unwrap();
    let destination = temp_destination(&temp);
    fs::create_dir_all(destination.as_std_path()).unwrap();
    fs::write(destination.join("EPI_ISL_1.fasta").as_std_path(), ">a\nACGT\n").unwrap();
    fs::write(destination.join("EPI_ISL_2.fasta").as_std_path(), ">b\nACGT\n").unwrap();

    let mut store = OutputStore::open(destination).unwrap();
    assert!(!store.is_finished());
    assert_eq!(store.remaining(), None);

    store.set_target(5);
    assert_eq!(store.remaining(), Some(3));
    assert!(!store.is_finished());

    store.set_target(2);
    assert_eq!(store.remaining(), Some(0));
    assert!(store.is_finished());
}

#[test]
fn header_is_written_once_across_runs() {
    let temp = tempfile::tempdir().unwrap();
    let destination = temp_destination(&temp);

    let mut store = OutputStore::open(destination.clone()).unwrap();
    store.write_record(&record("EPI_ISL_1")).unwrap();
    drop(store);

    let mut store = OutputStore::open(destination.clone()).unwrap();
    store.write_record(&record("EPI_ISL_2")).unwrap();
    drop(store);

    let contents = fs::read_to_string(destination.join(METADATA_FILE).as_std_path()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(format!("{}\n", lines[0]), metadata_header());
    assert!(lines[1].starts_with("EPI_ISL_1\t"));
    assert!(lines[2].starts_with("EPI_ISL_2\t"));
    for row in &lines[1..] {
        assert_eq!(row.split('\t').count(), METADATA_COLUMNS.len());
    }
}

#[test]
fn write_record_persists_normalized_fasta() {
    let temp = tempfile::tempdir().unwrap();
    let destination = temp_destination(&temp);
    let mut store = OutputStore::open(destination.clone()).unwrap();

    let record = SampleRecord::new("EPI_ISL_7", Vec::new(), ">hCoV-19/x/7 \n acgt\n tt ");
    store.write_record(&record).unwrap();

    let written = fs::read_to_string(destination.join("EPI_ISL_7.fasta").as_std_path()).unwrap();
    assert_eq!(written, ">hCoV-19/x/7\nACGT\nTT\n");

    // Nothing besides the sequence file and the metadata table is left over.
    let mut names: Vec<String> = fs::read_dir(destination.as_std_path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["EPI_ISL_7.fasta", METADATA_FILE]);
}

#[test]
fn written_names_join_the_set_during_the_run() {
    let temp = tempfile::tempdir().unwrap();
    let mut store = OutputStore::open(temp_destination(&temp)).unwrap();

    assert!(!store.contains("EPI_ISL_9"));
    store.write_record(&record("EPI_ISL_9")).unwrap();
    assert!(store.contains("EPI_ISL_9"));

    // The durable record survives a fresh scan too.
    store.rescan().unwrap();
    assert!(store.contains("EPI_ISL_9"));
}

#[test]
fn reopening_sees_previous_downloads() {
    let temp = tempfile::tempdir().unwrap();
    let destination = temp_destination(&temp);

    let mut store = OutputStore::open(destination.clone()).unwrap();
    store.write_record(&record("EPI_ISL_11")).unwrap();
    drop(store);

    let store = OutputStore::open(destination).unwrap();
    assert!(store.contains("EPI_ISL_11"));
    assert_eq!(store.downloaded_count(), 1);
}
