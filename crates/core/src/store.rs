//! Whole-table persistence for the delimited stores.
//!
//! Every store is a header row followed by data rows. Readers always take a
//! full snapshot; writers either append rows or replace the whole table.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    process, thread,
    time::{Duration, Instant},
};

use chrono::Utc;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{BookingError, Result};

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(25);
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

/// In-memory snapshot of a delimited store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Header row, kept exactly as read.
    pub header: Vec<String>,
    /// Data rows in file order. Rows may be shorter or longer than the header.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table from a header and rows.
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    /// Split raw records into a header and data rows.
    pub fn from_records(mut records: Vec<Vec<String>>) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let header = records.remove(0);
        Self {
            header,
            rows: records,
        }
    }

    /// True when the table carries no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Exclusive access token returned by [`TableStore::lock`].
///
/// Dropping the guard releases the lock.
#[derive(Debug)]
pub struct StoreGuard {
    lock_path: Option<PathBuf>,
}

impl StoreGuard {
    /// Guard for stores that need no cross-process lock.
    pub fn unlocked() -> Self {
        Self { lock_path: None }
    }
}

impl Drop for StoreGuard {
    fn drop(&mut self) {
        if let Some(path) = self.lock_path.take() {
            if let Err(err) = fs::remove_file(&path) {
                warn!("Failed to release lock {}: {err}", path.display());
            }
        }
    }
}

/// Repository abstraction over one delimited store.
pub trait TableStore: Send + Sync {
    /// Read the full table. Returns `None` when the store does not exist yet.
    fn read_all(&self) -> Result<Option<Table>>;

    /// Append rows, writing `header` first when the store is newly created.
    fn append(&self, header: &[String], rows: &[Vec<String>]) -> Result<()>;

    /// Replace the whole store with `table`.
    fn rewrite_all(&self, table: &Table) -> Result<()>;

    /// Take exclusive access for a read-modify-write sequence.
    fn lock(&self) -> Result<StoreGuard>;
}

/// Comma-separated file store backed by the `csv` crate.
#[derive(Debug, Clone)]
pub struct CsvFileStore {
    path: PathBuf,
    lock_timeout: Duration,
    stale_after: Duration,
}

impl CsvFileStore {
    /// Store at `path` with a two second lock timeout.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: Duration::from_secs(2),
            stale_after: STALE_LOCK_AGE,
        }
    }

    /// Override how long [`TableStore::lock`] waits for a competing holder.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Override the age after which a held lock is considered abandoned.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn parent_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

impl TableStore for CsvFileStore {
    fn read_all(&self) -> Result<Option<Table>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;
        let mut records = Vec::new();
        for record in reader.records() {
            let record = record?;
            records.push(record.iter().map(str::to_string).collect());
        }
        Ok(Some(Table::from_records(records)))
    }

    fn append(&self, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        fs::create_dir_all(self.parent_dir())?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        let is_new = file.metadata()?.len() == 0;
        if !is_new && !ends_with_newline(&mut file)? {
            file.write_all(b"\n")?;
        }

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(file);
        if is_new && !header.is_empty() {
            writer.write_record(header)?;
        }
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn rewrite_all(&self, table: &Table) -> Result<()> {
        let dir = self.parent_dir();
        fs::create_dir_all(dir)?;
        let temp = NamedTempFile::new_in(dir)?;

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(temp);
        writer.write_record(&table.header)?;
        for row in &table.rows {
            writer.write_record(row)?;
        }
        let temp = writer
            .into_inner()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
        temp.persist(&self.path).map_err(|err| err.error)?;
        debug!(path = %self.path.display(), rows = table.rows.len(), "Store rewritten");
        Ok(())
    }

    fn lock(&self) -> Result<StoreGuard> {
        fs::create_dir_all(self.parent_dir())?;
        let lock_path = self.lock_path();
        let started = Instant::now();
        let mut contended = false;
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    let guard = StoreGuard {
                        lock_path: Some(lock_path),
                    };
                    LockHolder::current().write_to(&mut file)?;
                    return Ok(guard);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if lock_is_stale(&lock_path, self.stale_after) {
                        warn!("Breaking stale lock {}", lock_path.display());
                        match fs::remove_file(&lock_path) {
                            Ok(()) => continue,
                            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                            Err(err) => return Err(err.into()),
                        }
                    }
                    if !contended {
                        warn!("Waiting for lock {}", lock_path.display());
                        contended = true;
                    }
                    if started.elapsed() >= self.lock_timeout {
                        return Err(BookingError::LockTimeout(lock_path));
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Owner recorded inside a lock file: process id and acquisition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LockHolder {
    pid: u32,
    acquired_ms: i64,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            pid: process::id(),
            acquired_ms: Utc::now().timestamp_millis(),
        }
    }

    fn parse(contents: &str) -> Option<Self> {
        let mut lines = contents.lines().map(str::trim);
        let pid = lines.next()?.parse().ok()?;
        let acquired_ms = lines.next()?.parse().ok()?;
        Some(Self { pid, acquired_ms })
    }

    fn write_to(&self, file: &mut File) -> io::Result<()> {
        writeln!(file, "{}\n{}", self.pid, self.acquired_ms)?;
        file.flush()
    }

    fn age(&self) -> Duration {
        let elapsed = Utc::now().timestamp_millis() - self.acquired_ms;
        Duration::from_millis(u64::try_from(elapsed).unwrap_or(0))
    }
}

/// A lock is stale when its holder is gone or it has been held past `stale_after`.
///
/// Lock files without a readable holder fall back to their modification time.
fn lock_is_stale(lock_path: &Path, stale_after: Duration) -> bool {
    let Ok(contents) = fs::read_to_string(lock_path) else {
        return false;
    };
    match LockHolder::parse(&contents) {
        Some(holder) => !process_alive(holder.pid) || holder.age() > stale_after,
        None => fs::metadata(lock_path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > stale_after),
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Store kept entirely in memory, used to exercise invariants without files.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<Option<Table>>,
}

impl MemoryStore {
    /// A store that does not exist yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `table`.
    pub fn with_table(table: Table) -> Self {
        Self {
            table: Mutex::new(Some(table)),
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Option<Table> {
        self.table.lock().clone()
    }
}

impl TableStore for MemoryStore {
    fn read_all(&self) -> Result<Option<Table>> {
        Ok(self.table.lock().clone())
    }

    fn append(&self, header: &[String], rows: &[Vec<String>]) -> Result<()> {
        let mut guard = self.table.lock();
        let table = guard.get_or_insert_with(|| Table::new(header.to_vec(), Vec::new()));
        table.rows.extend(rows.iter().cloned());
        Ok(())
    }

    fn rewrite_all(&self, table: &Table) -> Result<()> {
        *self.table.lock() = Some(table.clone());
        Ok(())
    }

    fn lock(&self) -> Result<StoreGuard> {
        Ok(StoreGuard::unlocked())
    }
}

/// Turn a slice of string literals into an owned record.
pub fn record(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|field| field.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_as_none() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvFileStore::new(dir.path().join("absent.csv"));
        assert!(store.read_all()?.is_none());
        Ok(())
    }

    #[test]
    fn append_writes_header_once() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvFileStore::new(dir.path().join("bookings.csv"));
        let header = record(&["a", "b"]);

        store.append(&header, &[record(&["1", "2"])])?;
        store.append(&header, &[record(&["3", "4"]), record(&["5", "6"])])?;

        let table = store.read_all()?.expect("store should exist");
        assert_eq!(table.header, header);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[2], record(&["5", "6"]));
        Ok(())
    }

    #[test]
    fn append_repairs_missing_trailing_newline() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("trains.csv");
        fs::write(&path, "id,name\n1,Alpha")?;
        let store = CsvFileStore::new(&path);

        store.append(&record(&["id", "name"]), &[record(&["2", "Beta"])])?;

        let table = store.read_all()?.expect("store should exist");
        assert_eq!(table.rows, vec![record(&["1", "Alpha"]), record(&["2", "Beta"])]);
        Ok(())
    }

    #[test]
    fn rewrite_keeps_ragged_rows() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvFileStore::new(dir.path().join("trains.csv"));
        let table = Table::new(
            record(&["id", "name", "seats"]),
            vec![record(&["1", "Alpha, Express", "10"]), record(&["2"])],
        );

        store.rewrite_all(&table)?;

        assert_eq!(store.read_all()?, Some(table));
        Ok(())
    }

    #[test]
    fn lock_is_exclusive_until_dropped() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvFileStore::new(dir.path().join("trains.csv"))
            .with_lock_timeout(Duration::from_millis(60));

        let guard = store.lock()?;
        assert!(matches!(store.lock(), Err(BookingError::LockTimeout(_))));
        drop(guard);
        assert!(store.lock().is_ok());
        Ok(())
    }

    #[test]
    fn lock_records_its_holder() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvFileStore::new(dir.path().join("trains.csv"));
        let _guard = store.lock()?;

        let contents = fs::read_to_string(dir.path().join("trains.csv.lock"))?;
        let holder = LockHolder::parse(&contents).expect("holder written");
        assert_eq!(holder.pid, process::id());
        Ok(())
    }

    #[test]
    fn abandoned_lock_is_broken() -> Result<()> {
        let dir = tempdir()?;
        let lock_path = dir.path().join("trains.csv.lock");
        fs::write(&lock_path, format!("{}\n0\n", process::id()))?;
        let store = CsvFileStore::new(dir.path().join("trains.csv"))
            .with_lock_timeout(Duration::from_millis(60));

        let guard = store.lock()?;
        let holder = LockHolder::parse(&fs::read_to_string(&lock_path)?).expect("holder written");
        assert!(holder.acquired_ms > 0);
        drop(guard);
        assert!(!lock_path.exists());
        Ok(())
    }

    #[test]
    fn fresh_lock_of_a_live_process_is_respected() -> Result<()> {
        let dir = tempdir()?;
        let lock_path = dir.path().join("trains.csv.lock");
        LockHolder::current().write_to(&mut File::create(&lock_path)?)?;
        let store = CsvFileStore::new(dir.path().join("trains.csv"))
            .with_lock_timeout(Duration::from_millis(60));

        assert!(matches!(store.lock(), Err(BookingError::LockTimeout(_))));
        assert!(lock_path.exists());
        Ok(())
    }

    #[test]
    fn memory_store_creates_header_on_first_append() -> Result<()> {
        let store = MemoryStore::new();
        store.append(&record(&["h"]), &[record(&["x"])])?;
        let table = store.snapshot().expect("table should exist");
        assert_eq!(table.header, record(&["h"]));
        assert_eq!(table.rows, vec![record(&["x"])]);
        Ok(())
    }
}
