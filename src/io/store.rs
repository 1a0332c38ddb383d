//! Keyed table storage at the pipeline boundary.
//!
//! The pipeline never touches files directly: inputs are read and outputs
//! written through a [`TableStore`]. Writes are staged and only become
//! visible on [`TableStore::commit`], so a failed run leaves no partial
//! output behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::TableRow;
use crate::error::{Result, SettlementError};

/// A keyed store of typed tables.
pub trait TableStore {
    /// Reads every row of the table stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::MissingTable`] if the key is unknown,
    /// [`SettlementError::Schema`] if a required column is absent, and
    /// [`SettlementError::DataQuality`] if a value cannot be parsed.
    fn read<T: TableRow>(&self, key: &str) -> Result<Vec<T>>;

    /// Stages `rows` under `key`; visible to readers only after [`commit`](Self::commit).
    fn write<T: TableRow>(&mut self, key: &str, rows: &[T]) -> Result<()>;

    /// Publishes all staged tables.
    fn commit(&mut self) -> Result<()>;

    /// Drops all staged tables without publishing them.
    fn discard(&mut self);
}

/// Decodes CSV rows, checking the header against `T::COLUMNS` first.
pub fn decode_rows<T: TableRow>(key: &str, reader: impl Read) -> Result<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let missing: Vec<String> = T::COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| (*col).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SettlementError::Schema {
            context: key.to_string(),
            missing,
            present: headers.iter().map(str::to_string).collect(),
        });
    }

    let mut rows = Vec::new();
    for (idx, record) in rdr.deserialize::<T>().enumerate() {
        let row = record.map_err(|e| {
            SettlementError::data_quality(
                key,
                format!("unparseable value in data row {idx}"),
                vec![e.to_string()],
            )
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Encodes rows as CSV with a header line.
pub fn encode_rows<T: TableRow>(rows: &[T], writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    if rows.is_empty() {
        wtr.write_record(T::COLUMNS)?;
    }
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Directory of `<key>.csv` files.
#[derive(Debug)]
pub struct CsvDirStore {
    dir: PathBuf,
    staged: Vec<(PathBuf, PathBuf)>,
}

impl CsvDirStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            staged: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final path of the table stored under `key`.
    pub fn table_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.csv"))
    }

    fn staging_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{key}.csv.partial"))
    }
}

impl TableStore for CsvDirStore {
    fn read<T: TableRow>(&self, key: &str) -> Result<Vec<T>> {
        let path = self.table_path(key);
        if !path.exists() {
            return Err(SettlementError::MissingTable {
                key: key.to_string(),
            });
        }
        let file = fs::File::open(&path)?;
        decode_rows(key, file)
    }

    fn write<T: TableRow>(&mut self, key: &str, rows: &[T]) -> Result<()> {
        let staging = self.staging_path(key);
        let file = fs::File::create(&staging)?;
        encode_rows(rows, std::io::BufWriter::new(file))?;
        self.staged.push((staging, self.table_path(key)));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        for (staging, target) in self.staged.drain(..) {
            debug!(table = %target.display(), "publishing table");
            fs::rename(&staging, &target)?;
        }
        Ok(())
    }

    fn discard(&mut self) {
        for (staging, _) in self.staged.drain(..) {
            let _ = fs::remove_file(staging);
        }
    }
}

/// In-memory store holding CSV bytes per key.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: BTreeMap<String, Vec<u8>>,
    staged: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts raw CSV text under `key`, bypassing staging.
    pub fn insert_csv(&mut self, key: &str, csv_text: &str) {
        self.tables
            .insert(key.to_string(), csv_text.as_bytes().to_vec());
    }

    /// Returns the published CSV text for `key`.
    pub fn csv(&self, key: &str) -> Option<&str> {
        self.tables
            .get(key)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Published table keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl TableStore for MemoryStore {
    fn read<T: TableRow>(&self, key: &str) -> Result<Vec<T>> {
        let bytes = self
            .tables
            .get(key)
            .ok_or_else(|| SettlementError::MissingTable {
                key: key.to_string(),
            })?;
        decode_rows(key, bytes.as_slice())
    }

    fn write<T: TableRow>(&mut self, key: &str, rows: &[T]) -> Result<()> {
        let mut buf = Vec::new();
        encode_rows(rows, &mut buf)?;
        self.staged.insert(key.to_string(), buf);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.tables.append(&mut self.staged);
        Ok(())
    }

    fn discard(&mut self) {
        self.staged.clear();
    }
}
