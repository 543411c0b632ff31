use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, MatchCache};
use crate::config::{AggregatePolicy, DuplicatePolicy, FailurePolicy, Settings};
use crate::fetcher::{FetchReport, MatchFetcher};
use crate::provider::MatchProvider;
use crate::records::{Dataset, apply_duplicate_policy, concat_rounds};
use crate::schema::{Table, canonicalize, resolve_aliases};

const CANDIDATE_SUFFIX: &str = "_match_data.json";
const CANDIDATE_PREFIX: &str = "sofascore";

/// Loader tiers, tried in this order. A tier is left only on a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    TryAggregate,
    TryPerRound,
    TryAlternate,
    Fetch,
    Done,
}

impl LoadState {
    fn next(self) -> Self {
        match self {
            LoadState::TryAggregate => LoadState::TryPerRound,
            LoadState::TryPerRound => LoadState::TryAlternate,
            LoadState::TryAlternate => LoadState::Fetch,
            LoadState::Fetch | LoadState::Done => LoadState::Done,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DataSource {
    Aggregate,
    PerRound { rounds_loaded: usize },
    Alternate { path: PathBuf },
    Fetched(FetchReport),
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub dataset: Dataset,
    pub source: DataSource,
    /// States visited, ending in [`LoadState::Done`].
    pub trail: Vec<LoadState>,
}

pub struct DataLoader<'a> {
    cache: &'a dyn MatchCache,
    provider: &'a dyn MatchProvider,
    candidate_dirs: Vec<PathBuf>,
    aggregate_policy: AggregatePolicy,
    failure_policy: FailurePolicy,
    duplicate_policy: DuplicatePolicy,
}

impl<'a> DataLoader<'a> {
    pub fn new(cache: &'a dyn MatchCache, provider: &'a dyn MatchProvider) -> Self {
        Self {
            cache,
            provider,
            candidate_dirs: Vec::new(),
            aggregate_policy: AggregatePolicy::default(),
            failure_policy: FailurePolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }

    /// Candidate files are searched in the data dir, then the working dir.
    pub fn from_settings(
        cache: &'a dyn MatchCache,
        provider: &'a dyn MatchProvider,
        settings: &Settings,
    ) -> Self {
        let mut loader = Self::new(cache, provider)
            .candidate_dirs(vec![settings.data_dir.clone(), PathBuf::from(".")]);
        loader.aggregate_policy = settings.aggregate_policy;
        loader.failure_policy = settings.failure_policy;
        loader.duplicate_policy = settings.duplicate_policy;
        loader
    }

    pub fn candidate_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.candidate_dirs = dirs;
        self
    }

    pub fn aggregate_policy(mut self, policy: AggregatePolicy) -> Self {
        self.aggregate_policy = policy;
        self
    }

    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn load_data(&self, max_round: u32) -> Result<LoadOutcome> {
        let mut state = LoadState::TryAggregate;
        let mut trail = Vec::new();
        loop {
            debug!(?state, "loader state");
            trail.push(state);
            let found = match state {
                LoadState::TryAggregate => self.try_aggregate(),
                LoadState::TryPerRound => self.try_per_round(max_round),
                LoadState::TryAlternate => self.try_alternate(),
                LoadState::Fetch => Some(self.fetch(max_round)?),
                LoadState::Done => return Err(anyhow!("loader exhausted without data")),
            };
            if let Some((dataset, source)) = found {
                trail.push(LoadState::Done);
                return Ok(LoadOutcome {
                    dataset,
                    source,
                    trail,
                });
            }
            state = state.next();
        }
    }

    fn try_aggregate(&self) -> Option<(Dataset, DataSource)> {
        if self.aggregate_policy == AggregatePolicy::ValidateCoverage {
            debug!("aggregate cache bypassed, validating round coverage");
            return None;
        }
        match self.cache.read(CacheKey::Aggregate) {
            Ok(Some(rows)) => {
                info!(
                    "loaded {} matches from {}",
                    rows.len(),
                    self.cache.location(CacheKey::Aggregate)
                );
                let rows = apply_duplicate_policy(rows, self.duplicate_policy);
                Some((rows, DataSource::Aggregate))
            }
            Ok(None) => {
                info!("aggregate data file not found, checking round files");
                None
            }
            Err(err) => {
                warn!("aggregate data file unreadable, checking round files: {err:#}");
                None
            }
        }
    }

    fn try_per_round(&self, max_round: u32) -> Option<(Dataset, DataSource)> {
        if self.aggregate_policy == AggregatePolicy::ValidateCoverage {
            debug!("round coverage checked by the fetcher");
            return None;
        }
        let mut loaded = Vec::new();
        for round in 1..=max_round {
            match self.cache.read(CacheKey::Round(round)) {
                Ok(Some(rows)) => {
                    debug!(round, "round data loaded");
                    loaded.push((round, rows));
                }
                Ok(None) => info!(round, "round data not found"),
                Err(err) => warn!(round, "round data unreadable: {err:#}"),
            }
        }
        if loaded.is_empty() {
            info!("no round files found, looking for alternate files");
            return None;
        }

        let rounds_loaded = loaded.len();
        let dataset = apply_duplicate_policy(concat_rounds(loaded), self.duplicate_policy);
        info!(
            "merged {} matches from {rounds_loaded} round files",
            dataset.len()
        );
        match self.cache.write(CacheKey::Aggregate, &dataset) {
            Ok(()) => info!(
                "merged data saved to {}",
                self.cache.location(CacheKey::Aggregate)
            ),
            Err(err) => warn!("could not save merged data: {err:#}"),
        }
        Some((dataset, DataSource::PerRound { rounds_loaded }))
    }

    fn try_alternate(&self) -> Option<(Dataset, DataSource)> {
        if self.aggregate_policy == AggregatePolicy::ValidateCoverage {
            debug!("alternate files carry no round numbers, skipped");
            return None;
        }
        let path = find_candidate(&self.candidate_dirs)?;
        info!("trying alternate data file {}", path.display());
        match load_alternate_file(&path) {
            Ok(Some(rows)) => {
                let rows = apply_duplicate_policy(rows, self.duplicate_policy);
                Some((rows, DataSource::Alternate { path }))
            }
            Ok(None) => None,
            Err(err) => {
                warn!("alternate data file failed to load: {err:#}");
                None
            }
        }
    }

    fn fetch(&self, max_round: u32) -> Result<(Dataset, DataSource)> {
        info!("no usable local data, fetching from {}", self.provider.name());
        let outcome = MatchFetcher::new(self.cache, self.provider)
            .failure_policy(self.failure_policy)
            .duplicate_policy(self.duplicate_policy)
            .store_aggregate(self.aggregate_policy == AggregatePolicy::TrustCache)
            .get_match_data(max_round)?;
        Ok((outcome.dataset, DataSource::Fetched(outcome.report)))
    }
}

pub fn is_candidate_name(name: &str) -> bool {
    name.ends_with(CANDIDATE_SUFFIX) || name.starts_with(CANDIDATE_PREFIX)
}

/// First candidate file, by name, of the first directory that has any.
pub fn find_candidate(dirs: &[PathBuf]) -> Option<PathBuf> {
    for dir in dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        let mut names = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_candidate_name(name))
            .collect::<Vec<_>>();
        if names.is_empty() {
            continue;
        }
        names.sort();
        debug!(dir = %dir.display(), "candidate files: {names:?}");
        return Some(dir.join(&names[0]));
    }
    None
}

/// Loads a single-document JSON table and maps it onto the canonical columns.
/// `Ok(None)` means the table lacks some canonical column under every alias.
pub fn load_alternate_file(path: &Path) -> Result<Option<Dataset>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value: Value = serde_json::from_str(raw.trim()).context("invalid alternate json")?;
    let table = Table::from_json_value(value)?;
    debug!("alternate file columns: {:?}", table.columns());

    let mapping = match resolve_aliases(&table) {
        Ok(mapping) => mapping,
        Err(missing) => {
            warn!("alternate file is missing columns: {missing:?}");
            return Ok(None);
        }
    };
    let rows = canonicalize(&table, &mapping)?;
    info!("all required columns found, {} matches", rows.len());
    Ok(Some(rows))
}
