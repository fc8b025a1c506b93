//! Flat-file CSV store for price records.
//!
//! Writes are idempotent and atomic: records whose (name, date) identity is
//! already stored are skipped, and each batch is staged in a temp file in the
//! same directory (current bytes plus the new rows) which then replaces the
//! target. An interrupted write never leaves a partial row behind. Paths
//! ending in `.gz` are read and written gzip-compressed, one gzip member per
//! batch.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};
use tempfile::NamedTempFile;

use crate::error::{PriceError, Result};
use crate::models::{Dataset, PriceRecord, RecordId, REQUIRED_COLUMNS, STORE_COLUMNS};
use crate::parser;

/// Outcome of one [`DatasetStore::append`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Records newly added to the store.
    pub written: usize,
    /// Records skipped because their identity was already present.
    pub skipped_duplicates: usize,
    /// Records in the store after the write.
    pub total: usize,
}

/// Identities already in a store, loaded once and kept current across
/// batches by [`DatasetStore::append_indexed`].
#[derive(Debug, Clone, Default)]
pub struct StoreIndex {
    ids: HashSet<RecordId>,
    /// The file's header is not in canonical order, so rows cannot be
    /// appended to it as is.
    needs_rewrite: bool,
}

impl StoreIndex {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.ids.contains(id)
    }
}

pub struct DatasetStore {
    path: PathBuf,
}

impl DatasetStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn is_gzip(&self) -> bool {
        self.path.extension().and_then(|e| e.to_str()) == Some("gz")
    }

    /// Read the whole store into memory.
    ///
    /// Fails with [`PriceError::Schema`] if a required column is missing, a
    /// column is unknown, or any row does not parse. Nothing is returned on
    /// failure.
    pub fn load(&self) -> Result<Dataset> {
        let (dataset, _) = self.read()?;
        debug!("Loaded {} record(s) from {}", dataset.len(), self.path.display());
        Ok(dataset)
    }

    /// Load the store, or an empty dataset if the file does not exist yet.
    pub fn load_or_empty(&self) -> Result<Dataset> {
        if self.exists() {
            self.load()
        } else {
            Ok(Dataset::default())
        }
    }

    /// Identities currently stored. A missing file yields an empty index.
    pub fn index(&self) -> Result<StoreIndex> {
        if !self.exists() {
            return Ok(StoreIndex::default());
        }
        let (dataset, canonical) = self.read()?;
        Ok(StoreIndex {
            ids: dataset.ids(),
            needs_rewrite: !canonical,
        })
    }

    /// Append records whose identity is not stored yet.
    ///
    /// Loads the stored identities first; use [`append_indexed`] to write
    /// several batches against one index.
    ///
    /// [`append_indexed`]: DatasetStore::append_indexed
    pub fn append(&self, records: &[PriceRecord]) -> Result<WriteSummary> {
        let mut index = self.index()?;
        self.append_indexed(records, &mut index)
    }

    /// Append records whose identity is not in `index`, then add the new
    /// identities to it.
    ///
    /// Records are normalized first, so identities compare the way they load
    /// back. Duplicates within `records` are collapsed, keeping the first.
    /// If nothing is new and the store exists, the file is left untouched.
    /// The existing bytes are copied into a temp file beside the store, new
    /// rows are appended, and the temp file then replaces the store.
    pub fn append_indexed(
        &self,
        records: &[PriceRecord],
        index: &mut StoreIndex,
    ) -> Result<WriteSummary> {
        let mut batch_ids = HashSet::new();
        let mut fresh: Vec<PriceRecord> = Vec::new();
        let mut skipped = 0;

        for record in records {
            let record = record.normalized();
            check_storable(&record)?;
            let id = record.id();
            if index.contains(&id) || !batch_ids.insert(id) {
                skipped += 1;
            } else {
                fresh.push(record);
            }
        }

        let summary = WriteSummary {
            written: fresh.len(),
            skipped_duplicates: skipped,
            total: index.len() + fresh.len(),
        };

        if fresh.is_empty() && self.exists() {
            debug!(
                "No new records for {} ({} duplicate(s))",
                self.path.display(),
                skipped
            );
            return Ok(summary);
        }

        if index.needs_rewrite {
            let existing = self.load()?;
            self.replace_with(existing.iter().chain(fresh.iter()))?;
            index.needs_rewrite = false;
        } else {
            self.extend_with(&fresh)?;
        }
        index.ids.extend(batch_ids);

        info!(
            "Wrote {} new record(s) to {} ({} duplicate(s) skipped, {} total)",
            summary.written,
            self.path.display(),
            summary.skipped_duplicates,
            summary.total
        );
        Ok(summary)
    }

    fn read(&self) -> Result<(Dataset, bool)> {
        let file = File::open(&self.path)?;
        let reader: Box<dyn Read> = if self.is_gzip() {
            Box::new(MultiGzDecoder::new(BufReader::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        read_dataset(reader)
    }

    fn temp_file(&self) -> Result<NamedTempFile> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        Ok(NamedTempFile::new_in(&dir)?)
    }

    fn commit(&self, tmp: NamedTempFile) -> Result<()> {
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| PriceError::Io(e.error))?;
        Ok(())
    }

    /// Copy the current file into a temp file, append `rows`, swap it in.
    ///
    /// Gzip stores get the new rows as an extra gzip member.
    fn extend_with(&self, rows: &[PriceRecord]) -> Result<()> {
        let mut tmp = self.temp_file()?;
        let existed = self.exists();
        if existed {
            let mut current = File::open(&self.path)?;
            let needs_newline = !self.is_gzip() && !ends_with_newline(&mut current)?;
            io::copy(&mut current, tmp.as_file_mut())?;
            if needs_newline {
                tmp.as_file_mut().write_all(b"\n")?;
            }
        }
        self.encode_rows(&mut tmp, rows.iter(), !existed)?;
        self.commit(tmp)
    }

    /// Write `rows` with a header to a temp file beside the store, then swap
    /// it in.
    fn replace_with<'a, I>(&self, rows: I) -> Result<()>
    where
        I: Iterator<Item = &'a PriceRecord>,
    {
        let mut tmp = self.temp_file()?;
        self.encode_rows(&mut tmp, rows, true)?;
        self.commit(tmp)
    }

    fn encode_rows<'a, I>(&self, tmp: &mut NamedTempFile, rows: I, header: bool) -> Result<()>
    where
        I: Iterator<Item = &'a PriceRecord>,
    {
        if self.is_gzip() {
            let encoder = write_rows(
                GzEncoder::new(tmp.as_file_mut(), Compression::default()),
                rows,
                header,
            )?;
            encoder.finish()?;
        } else {
            let mut buf = write_rows(BufWriter::new(tmp.as_file_mut()), rows, header)?;
            buf.flush()?;
        }
        Ok(())
    }
}

/// Rows the loader would reject must not reach the file.
fn check_storable(record: &PriceRecord) -> Result<()> {
    if record.name.is_empty() {
        return Err(PriceError::InvalidArgument(
            "record without a product name".to_string(),
        ));
    }
    let negative = [record.low_price, record.avg_price, record.high_price]
        .iter()
        .flatten()
        .any(|p| p.is_sign_negative() && !p.is_zero());
    if negative {
        return Err(PriceError::InvalidArgument(format!(
            "negative price for {} on {}",
            record.name, record.date
        )));
    }
    Ok(())
}

/// Whether a non-empty file ends in a newline. Leaves the cursor at the start.
fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(last[0] == b'\n')
}

fn write_rows<'a, W, I>(sink: W, rows: I, header: bool) -> Result<W>
where
    W: Write,
    I: Iterator<Item = &'a PriceRecord>,
{
    let mut writer = csv::Writer::from_writer(sink);
    if header {
        writer.write_record(STORE_COLUMNS)?;
    }
    for record in rows {
        writer.write_record(record.to_fields())?;
    }
    writer
        .into_inner()
        .map_err(|e| PriceError::Io(e.into_error()))
}

/// Parse a store file. The flag reports whether the header is exactly the
/// canonical column list.
fn read_dataset<R: Read>(reader: R) -> Result<(Dataset, bool)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| PriceError::Schema(format!("unreadable header: {}", e)))?
        .clone();
    let columns: Vec<&str> = headers.iter().map(str::trim).collect();

    let unknown: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|c| !STORE_COLUMNS.contains(c))
        .collect();
    if !unknown.is_empty() {
        return Err(PriceError::Schema(format!(
            "unknown column(s): {}",
            unknown.join(", ")
        )));
    }
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !columns.contains(c))
        .collect();
    if !missing.is_empty() {
        return Err(PriceError::Schema(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )));
    }
    let mut present = HashSet::new();
    for c in &columns {
        if !present.insert(*c) {
            return Err(PriceError::Schema(format!("duplicate column: {}", c)));
        }
    }

    // Position of each store column in this file, in canonical order.
    let positions: Vec<Option<usize>> = STORE_COLUMNS
        .iter()
        .map(|name| columns.iter().position(|c| c == name))
        .collect();

    let mut records = Vec::new();
    for (index, row) in rdr.records().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = row.map_err(|e| PriceError::Schema(format!("line {}: {}", line, e)))?;
        let fields: Vec<&str> = positions
            .iter()
            .map(|pos| pos.and_then(|i| row.get(i)).unwrap_or(""))
            .collect();
        let record = parser::parse_fields(&fields)
            .map_err(|e| PriceError::Schema(format!("line {}: {}", line, e)))?;
        records.push(record);
    }
    let canonical = columns == STORE_COLUMNS;
    Ok((Dataset::new(records), canonical))
}
