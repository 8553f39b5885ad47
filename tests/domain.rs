use gisaid_harvest::domain::{
    COMPLETE_GENOME_MIN_LEN, RowOutcome, RunSummary, SAMPLE_FIELD_COUNT, SampleRecord,
};

#[test]
fn short_sequence_flag_uses_raw_text_length() {
    let body = "A".repeat(COMPLETE_GENOME_MIN_LEN);
    let raw = format!(">header\n{body}");
    let record = SampleRecord::new("EPI_ISL_1", Vec::new(), &raw);
    assert_eq!(record.sequence_length(), raw.len());
    assert!(!record.is_suspiciously_short());

    let record = SampleRecord::new("EPI_ISL_2", Vec::new(), ">header\nACGT");
    assert!(record.is_suspiciously_short());
}

#[test]
fn fasta_header_survives_unmodified() {
    let record = SampleRecord::new(
        "EPI_ISL_3",
        Vec::new(),
        ">hCoV-19/Wuhan/WIV04/2019|EPI_ISL_402124\nacgt\nACgt\n",
    );
    let mut lines = record.fasta().lines();
    assert_eq!(
        lines.next(),
        Some(">hCoV-19/Wuhan/WIV04/2019|EPI_ISL_402124")
    );
    assert_eq!(lines.next(), Some("ACGT"));
    assert_eq!(lines.next(), Some("ACGT"));
}

#[test]
fn summary_aggregates_row_outcomes() {
    let mut summary = RunSummary::started();
    summary.absorb(&[
        RowOutcome::Downloaded {
            name: "EPI_ISL_1".to_string(),
            length: 30_000,
            short: false,
        },
        RowOutcome::Skipped {
            name: "EPI_ISL_2".to_string(),
        },
        RowOutcome::Downloaded {
            name: "EPI_ISL_3".to_string(),
            length: 512,
            short: true,
        },
        RowOutcome::Failed {
            row: 7,
            reason: "record frame has no sequence block".to_string(),
        },
    ]);
    summary.absorb(&[RowOutcome::Skipped {
        name: "EPI_ISL_1".to_string(),
    }]);
    summary.finish();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.short_sequences, 1);
    assert_eq!(summary.failures, vec![
        "row 7: record frame has no sequence block".to_string()
    ]);
    assert!(summary.finished_at.is_some());
}

#[test]
fn record_pads_missing_fields_to_schema_width() {
    let record = SampleRecord::new("EPI_ISL_5", vec!["2020-02-02".to_string()], ">x\nacgt");
    let line = record.metadata_line();
    let columns: Vec<&str> = line.split('\t').collect();
    assert_eq!(columns.len(), SAMPLE_FIELD_COUNT + 2);
    assert_eq!(columns[0], "EPI_ISL_5");
    assert_eq!(columns[1], "2020-02-02");
    assert!(columns[2..=SAMPLE_FIELD_COUNT].iter().all(|c| c.is_empty()));
    assert_eq!(columns.last(), Some(&"7"));
}
