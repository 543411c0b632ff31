use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::records::{Dataset, MatchRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Round(u32),
    Aggregate,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Round(round) => write!(f, "round {round}"),
            CacheKey::Aggregate => f.write_str("aggregate"),
        }
    }
}

/// Persisted match tables keyed by round or by the whole-season aggregate.
///
/// `read` returns `Ok(None)` for an absent entry; an entry that exists but
/// cannot be decoded is an error.
pub trait MatchCache {
    fn read(&self, key: CacheKey) -> Result<Option<Dataset>>;
    fn write(&self, key: CacheKey, rows: &[MatchRecord]) -> Result<()>;
    fn location(&self, key: CacheKey) -> String;
}

/// One JSON-lines file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    aggregate_file: String,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, aggregate_file: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            aggregate_file: aggregate_file.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: CacheKey) -> PathBuf {
        match key {
            CacheKey::Round(round) => self.dir.join(round_file_name(round)),
            CacheKey::Aggregate => self.dir.join(&self.aggregate_file),
        }
    }
}

pub fn round_file_name(round: u32) -> String {
    format!("round_{round}_matches.json")
}

impl MatchCache for FileCache {
    fn read(&self, key: CacheKey) -> Result<Option<Dataset>> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("read {}", path.display()));
            }
        };
        let rows = parse_json_lines(&raw).with_context(|| format!("decode {}", path.display()))?;
        Ok(Some(rows))
    }

    fn write(&self, key: CacheKey, rows: &[MatchRecord]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create data dir {}", self.dir.display()))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let body = to_json_lines(rows).context("serialize match rows")?;
        fs::write(&tmp, body).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("swap {}", path.display()))?;
        Ok(())
    }

    fn location(&self, key: CacheKey) -> String {
        self.path_for(key).display().to_string()
    }
}

pub fn parse_json_lines(raw: &str) -> Result<Dataset> {
    let mut out = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = serde_json::from_str::<MatchRecord>(line)
            .with_context(|| format!("line {}", idx + 1))?;
        out.push(row);
    }
    Ok(out)
}

pub fn to_json_lines(rows: &[MatchRecord]) -> Result<String> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}

/// Process-local cache, used where nothing should touch the disk.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RefCell<HashMap<CacheKey, Dataset>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: CacheKey, rows: Dataset) -> Self {
        self.entries.borrow_mut().insert(key, rows);
        self
    }

    pub fn contains(&self, key: CacheKey) -> bool {
        self.entries.borrow().contains_key(&key)
    }
}

impl MatchCache for MemoryCache {
    fn read(&self, key: CacheKey) -> Result<Option<Dataset>> {
        Ok(self.entries.borrow().get(&key).cloned())
    }

    fn write(&self, key: CacheKey, rows: &[MatchRecord]) -> Result<()> {
        self.entries.borrow_mut().insert(key, rows.to_vec());
        Ok(())
    }

    fn location(&self, key: CacheKey) -> String {
        format!("memory:{key}")
    }
}
