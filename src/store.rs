use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{METADATA_COLUMNS, SampleRecord};
use crate::error::HarvestError;

pub const METADATA_FILE: &str = "metadata.tsv";

/// Owns the destination directory and the append-only metadata handle.
/// The set of `*.fasta` base names on disk is the durable record of what has
/// already been downloaded.
pub struct OutputStore {
    destination: Utf8PathBuf,
    downloaded: BTreeSet<String>,
    metadata: BufWriter<File>,
    target: Option<usize>,
}

impl OutputStore {
    pub fn open(destination: impl Into<Utf8PathBuf>) -> Result<Self, HarvestError> {
        let destination = destination.into();
        fs::create_dir_all(destination.as_std_path()).map_err(HarvestError::filesystem)?;

        let metadata_path = destination.join(METADATA_FILE);
        let fresh = !metadata_path.as_std_path().exists();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(metadata_path.as_std_path())
            .map_err(HarvestError::filesystem)?;
        let mut metadata = BufWriter::new(file);
        if fresh {
            metadata
                .write_all(metadata_header().as_bytes())
                .and_then(|_| metadata.flush())
                .map_err(HarvestError::filesystem)?;
        }

        let mut store = Self {
            destination,
            downloaded: BTreeSet::new(),
            metadata,
            target: None,
        };
        store.rescan()?;
        Ok(store)
    }

    pub fn destination(&self) -> &Utf8Path {
        &self.destination
    }

    pub fn rescan(&mut self) -> Result<(), HarvestError> {
        let mut names = BTreeSet::new();
        let entries =
            fs::read_dir(self.destination.as_std_path()).map_err(HarvestError::filesystem)?;
        for entry in entries {
            let entry = entry.map_err(HarvestError::filesystem)?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("fasta") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.insert(stem.to_string());
            }
        }
        self.downloaded = names;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.downloaded.contains(name)
    }

    pub fn downloaded_count(&self) -> usize {
        self.downloaded.len()
    }

    pub fn set_target(&mut self, samples: usize) {
        self.target = Some(samples);
    }

    pub fn remaining(&self) -> Option<usize> {
        self.target
            .map(|target| target.saturating_sub(self.downloaded.len()))
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.remaining(), Some(0))
    }

    pub fn fasta_path(&self, name: &str) -> Utf8PathBuf {
        self.destination.join(format!("{name}.fasta"))
    }

    /// Writes the sequence file and appends the metadata row. The name joins
    /// the in-memory set immediately so a recurring name later in the same
    /// run is skipped rather than appended twice.
    pub fn write_record(&mut self, record: &SampleRecord) -> Result<(), HarvestError> {
        write_bytes_atomic(&self.fasta_path(record.name()), record.fasta().as_bytes())?;
        self.metadata
            .write_all(record.metadata_line().as_bytes())
            .and_then(|_| self.metadata.write_all(b"\n"))
            .and_then(|_| self.metadata.flush())
            .map_err(HarvestError::filesystem)?;
        self.downloaded.insert(record.name().to_string());
        Ok(())
    }
}

pub fn metadata_header() -> String {
    let mut header = METADATA_COLUMNS.join("\t");
    header.push('\n');
    header
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), HarvestError> {
    let parent = path
        .parent()
        .ok_or_else(|| HarvestError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path()).map_err(HarvestError::filesystem)?;
    let temp = tempfile::Builder::new()
        .prefix("gisaid-harvest")
        .tempfile_in(parent.as_std_path())
        .map_err(HarvestError::filesystem)?;
    fs::write(temp.path(), content).map_err(HarvestError::filesystem)?;
    if path.as_std_path().exists() {
        fs::remove_file(path.as_std_path()).map_err(HarvestError::filesystem)?;
    }
    temp.persist(path.as_std_path())
        .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    Ok(())
}
