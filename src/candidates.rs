// In-memory index of elected candidates, built once from the TSE candidates CSV.
// The file is streamed one record at a time; only rows whose round outcome is ELEITO survive.

use crate::text::normalize;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const ELECTED: &str = "ELEITO";

const COL_OUTCOME: &str = "DS_SIT_TOT_TURNO";
const COL_REGION: &str = "SG_UF";
const COL_ID: &str = "SQ_CANDIDATO";
const COL_NAME: &str = "NM_URNA_CANDIDATO";
const COL_OFFICE: &str = "DS_CARGO";
const COL_PARTY: &str = "SG_PARTIDO";
const COL_MUNICIPALITY: &str = "NM_UE";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Candidates file not found: {0}")]
    ConfigMissing(PathBuf),

    #[error("Candidates file is missing column {0}")]
    MissingColumn(&'static str),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Office {
    Mayor,
    ViceMayor,
    Councillor,
    Governor,
    ViceGovernor,
}

impl Office {
    // Labels as written in the DS_CARGO column
    pub fn label(&self) -> &'static str {
        match self {
            Office::Mayor => "PREFEITO",
            Office::ViceMayor => "VICE-PREFEITO",
            Office::Councillor => "VEREADOR",
            Office::Governor => "GOVERNADOR",
            Office::ViceGovernor => "VICE-GOVERNADOR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateRecord {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "cargo")]
    pub office: String,
    #[serde(rename = "partido")]
    pub party: String,
    #[serde(rename = "uf")]
    pub region: String,
    #[serde(rename = "municipio")]
    pub municipality: String,
    #[serde(rename = "foto")]
    pub photo_path: String,
}

pub fn photo_path(region: &str, id: &str) -> String {
    format!("/fotos2024/foto_cand2024_{}_div/{}.jpg", region, id)
}

fn region_key(region: &str) -> String {
    region.trim().to_ascii_lowercase()
}

// TSE publishes ISO-8859-1; UTF-8 exports also exist, so try that first
fn decode_field(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(s) => s.trim().to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect::<String>().trim().to_string(),
    }
}

struct Columns {
    outcome: usize,
    region: usize,
    id: usize,
    name: usize,
    office: usize,
    party: usize,
    municipality: usize,
}

impl Columns {
    fn from_headers(headers: &csv::ByteRecord) -> Result<Self, LoadError> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| decode_field(h).trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let find = |column: &'static str| {
            names
                .iter()
                .position(|h| h == column)
                .ok_or(LoadError::MissingColumn(column))
        };

        Ok(Self {
            outcome: find(COL_OUTCOME)?,
            region: find(COL_REGION)?,
            id: find(COL_ID)?,
            name: find(COL_NAME)?,
            office: find(COL_OFFICE)?,
            party: find(COL_PARTY)?,
            municipality: find(COL_MUNICIPALITY)?,
        })
    }
}

#[derive(Debug, Default)]
pub struct CandidateIndex {
    records: Vec<CandidateRecord>,
    // Normalized municipality names, parallel to `records`
    municipality_keys: Vec<String>,
    by_office_region: HashMap<(String, String), Vec<usize>>,
}

impl CandidateIndex {
    pub fn from_records(records: Vec<CandidateRecord>) -> Self {
        let mut index = Self::default();
        for record in records {
            index.push(record);
        }
        index
    }

    fn push(&mut self, record: CandidateRecord) {
        let position = self.records.len();
        self.by_office_region
            .entry((record.office.clone(), region_key(&record.region)))
            .or_default()
            .push(position);
        self.municipality_keys.push(normalize(&record.municipality));
        self.records.push(record);
    }

    /// Streams `;`-separated candidate rows, keeping only elected ones.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .trim(csv::Trim::All)
            .has_headers(true)
            .from_reader(reader);

        let columns = Columns::from_headers(csv_reader.byte_headers()?)?;
        let field = |record: &csv::ByteRecord, i: usize| {
            record.get(i).map(decode_field).unwrap_or_default()
        };

        let mut index = Self::default();
        let mut record = csv::ByteRecord::new();
        let mut rows = 0usize;
        let mut skipped = 0usize;

        loop {
            match csv_reader.read_byte_record(&mut record) {
                Ok(false) => break,
                Ok(true) => {}
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    skipped += 1;
                    debug!(error = %e, "skipping malformed candidates row");
                    continue;
                }
            }
            rows += 1;

            if field(&record, columns.outcome) != ELECTED {
                continue;
            }

            let region = field(&record, columns.region);
            let id = field(&record, columns.id);
            index.push(CandidateRecord {
                photo_path: photo_path(&region, &id),
                name: field(&record, columns.name),
                office: field(&record, columns.office),
                party: field(&record, columns.party),
                municipality: field(&record, columns.municipality),
                region,
                id,
            });
        }

        if skipped > 0 {
            warn!(skipped, "skipped malformed rows in candidates file");
        }
        debug!(rows, kept = index.len(), "candidates file scanned");
        Ok(index)
    }

    pub fn try_load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::ConfigMissing(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Loads the index, degrading to an empty one when the file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(index) => {
                info!(path = %path.display(), candidates = index.len(), "elected candidates loaded");
                if let Some(first) = index.records.first() {
                    debug!(example = ?first, "first loaded candidate");
                }
                index
            }
            Err(LoadError::ConfigMissing(path)) => {
                warn!(path = %path.display(), "candidates file not found, serving empty index");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not load candidates, serving empty index");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CandidateRecord] {
        &self.records
    }

    fn bucket(&self, office: &str, region: &str) -> &[usize] {
        self.by_office_region
            .get(&(office.to_string(), region_key(region)))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find_by_office_and_region(&self, office: &str, region: &str) -> Vec<CandidateRecord> {
        self.bucket(office, region)
            .iter()
            .map(|&i| self.records[i].clone())
            .collect()
    }

    pub fn find_by_office_region_and_municipality(
        &self,
        office: &str,
        region: &str,
        municipality: &str,
    ) -> Vec<CandidateRecord> {
        let wanted = normalize(municipality.trim());
        self.bucket(office, region)
            .iter()
            .filter(|&&i| self.municipality_keys[i] == wanted)
            .map(|&i| self.records[i].clone())
            .collect()
    }
}

/// Holds the index once it has been built. Until then every query answers
/// with an empty list, which callers treat as "no data yet".
#[derive(Debug, Default)]
pub struct CandidateStore {
    index: OnceLock<CandidateIndex>,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(index: CandidateIndex) -> Self {
        let store = Self::new();
        store.publish(index);
        store
    }

    // Only the first publish takes effect; the index is never replaced
    pub fn publish(&self, index: CandidateIndex) -> bool {
        self.index.set(index).is_ok()
    }

    pub fn is_ready(&self) -> bool {
        self.index.get().is_some()
    }

    pub fn len(&self) -> usize {
        self.index.get().map_or(0, CandidateIndex::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find_by_office_and_region(&self, office: &str, region: &str) -> Vec<CandidateRecord> {
        self.index
            .get()
            .map(|index| index.find_by_office_and_region(office, region))
            .unwrap_or_default()
    }

    pub fn find_by_office_region_and_municipality(
        &self,
        office: &str,
        region: &str,
        municipality: &str,
    ) -> Vec<CandidateRecord> {
        self.index
            .get()
            .map(|index| index.find_by_office_region_and_municipality(office, region, municipality))
            .unwrap_or_default()
    }
}

/// Builds the index on the blocking pool and publishes it into `store`.
pub fn spawn_load(path: PathBuf, store: Arc<CandidateStore>) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        info!(path = %path.display(), "loading elected candidates");
        let index = CandidateIndex::load(&path);
        store.publish(index);
    })
}
