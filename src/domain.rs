use chrono::Local;
use serde::Serialize;

pub const METADATA_COLUMNS: [&str; 18] = [
    "Accession",
    "Collection date",
    "Location",
    "Host",
    "Additional location information",
    "Gender",
    "Patient age",
    "Patient status",
    "Specimen source",
    "Additional host information",
    "Outbreak",
    "Last vaccinated",
    "Treatment",
    "Sequencing technology",
    "Assembly method",
    "Coverage",
    "Comment",
    "Length",
];

/// Columns between Accession and the computed Length.
pub const SAMPLE_FIELD_COUNT: usize = 16;

/// Raw detail text shorter than this almost certainly means the full genome
/// was not rendered before capture.
pub const COMPLETE_GENOME_MIN_LEN: usize = 29_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    name: String,
    fields: Vec<String>,
    sequence_length: usize,
    fasta: String,
}

impl SampleRecord {
    pub fn new(name: &str, mut fields: Vec<String>, raw_sequence: &str) -> Self {
        fields.resize(SAMPLE_FIELD_COUNT, String::new());
        Self {
            name: name.to_string(),
            fields,
            sequence_length: raw_sequence.len(),
            fasta: normalize_fasta(raw_sequence),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn fasta(&self) -> &str {
        &self.fasta
    }

    pub fn is_suspiciously_short(&self) -> bool {
        self.sequence_length < COMPLETE_GENOME_MIN_LEN
    }

    pub fn metadata_line(&self) -> String {
        let mut line = self.name.clone();
        for field in &self.fields {
            line.push('\t');
            line.push_str(field);
        }
        line.push('\t');
        line.push_str(&self.sequence_length.to_string());
        line
    }
}

fn normalize_fasta(raw: &str) -> String {
    let mut lines = raw.split('\n');
    let mut out = String::with_capacity(raw.len() + 1);
    if let Some(header) = lines.next() {
        out.push_str(header.trim());
        out.push('\n');
    }
    for line in lines {
        out.push_str(&line.trim().to_uppercase());
        out.push('\n');
    }
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RowOutcome {
    Downloaded {
        name: String,
        length: usize,
        short: bool,
    },
    Skipped {
        name: String,
    },
    Failed {
        row: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub pages: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub short_sequences: usize,
    pub failures: Vec<String>,
}

impl RunSummary {
    pub fn started() -> Self {
        Self {
            started_at: Local::now().to_rfc3339(),
            finished_at: None,
            pages: 0,
            downloaded: 0,
            skipped: 0,
            failed: 0,
            short_sequences: 0,
            failures: Vec::new(),
        }
    }

    pub fn absorb(&mut self, outcomes: &[RowOutcome]) {
        self.pages += 1;
        for outcome in outcomes {
            match outcome {
                RowOutcome::Downloaded { short, .. } => {
                    self.downloaded += 1;
                    if *short {
                        self.short_sequences += 1;
                    }
                }
                RowOutcome::Skipped { .. } => self.skipped += 1,
                RowOutcome::Failed { row, reason } => {
                    self.failed += 1;
                    self.failures.push(format!("row {row}: {reason}"));
                }
            }
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now().to_rfc3339());
    }
}
