use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, MatchCache};
use crate::config::{DuplicatePolicy, FailurePolicy, Settings};
use crate::error::{DataError, RoundFailure};
use crate::provider::MatchProvider;
use crate::records::{Dataset, apply_duplicate_policy, concat_rounds};
use crate::schema::{canonicalize, recognize_provider_schema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    CacheHit { rows: usize },
    Fetched { rows: usize },
    Failed(RoundFailure),
}

#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: u32,
    pub outcome: RoundOutcome,
}

#[derive(Debug, Clone)]
pub struct FetchReport {
    pub started_at: String,
    pub finished_at: String,
    pub max_round: u32,
    pub rounds: Vec<RoundReport>,
    pub rows_total: usize,
}

impl FetchReport {
    pub fn succeeded(&self) -> usize {
        self.rounds
            .iter()
            .filter(|r| !matches!(r.outcome, RoundOutcome::Failed(_)))
            .count()
    }

    pub fn cache_hits(&self) -> usize {
        self.rounds
            .iter()
            .filter(|r| matches!(r.outcome, RoundOutcome::CacheHit { .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (u32, &RoundFailure)> {
        self.rounds.iter().filter_map(|r| match &r.outcome {
            RoundOutcome::Failed(failure) => Some((r.round, failure)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub dataset: Dataset,
    pub report: FetchReport,
}

pub struct MatchFetcher<'a> {
    cache: &'a dyn MatchCache,
    provider: &'a dyn MatchProvider,
    failure_policy: FailurePolicy,
    duplicate_policy: DuplicatePolicy,
    store_aggregate: bool,
}

impl<'a> MatchFetcher<'a> {
    pub fn new(cache: &'a dyn MatchCache, provider: &'a dyn MatchProvider) -> Self {
        Self {
            cache,
            provider,
            failure_policy: FailurePolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
            store_aggregate: true,
        }
    }

    pub fn from_settings(
        cache: &'a dyn MatchCache,
        provider: &'a dyn MatchProvider,
        settings: &Settings,
    ) -> Self {
        Self::new(cache, provider)
            .failure_policy(settings.failure_policy)
            .duplicate_policy(settings.duplicate_policy)
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// When off, the collected dataset is returned but the aggregate entry
    /// is left as it is.
    pub fn store_aggregate(mut self, store: bool) -> Self {
        self.store_aggregate = store;
        self
    }

    /// Collects rounds `1..=max_round`, preferring per-round cache entries
    /// over provider calls, and stores the concatenation as the aggregate
    /// unless [`MatchFetcher::store_aggregate`] turned that off.
    ///
    /// Fails with [`DataError::Unavailable`] when no round produced data.
    pub fn get_match_data(&self, max_round: u32) -> Result<FetchOutcome> {
        let started_at = Utc::now().to_rfc3339();
        info!(
            provider = self.provider.name(),
            "fetching match data for rounds 1-{max_round}"
        );

        let mut obtained: Vec<(u32, Dataset)> = Vec::new();
        let mut rounds = Vec::new();

        for round in 1..=max_round {
            debug!(round, "processing round");
            let outcome = match self.collect_round(round) {
                Ok((rows, from_cache)) => {
                    let n = rows.len();
                    obtained.push((round, rows));
                    if from_cache {
                        RoundOutcome::CacheHit { rows: n }
                    } else {
                        RoundOutcome::Fetched { rows: n }
                    }
                }
                Err(failure) => {
                    warn!(round, "round skipped: {failure}");
                    if self.failure_policy == FailurePolicy::Abort {
                        return Err(DataError::RoundAborted { round, failure }.into());
                    }
                    RoundOutcome::Failed(failure)
                }
            };
            rounds.push(RoundReport { round, outcome });
        }

        if obtained.is_empty() {
            return Err(DataError::Unavailable { max_round }.into());
        }

        let dataset = apply_duplicate_policy(concat_rounds(obtained), self.duplicate_policy);
        info!("collected {} match records", dataset.len());

        if self.store_aggregate {
            self.cache
                .write(CacheKey::Aggregate, &dataset)
                .context("write aggregate match cache")?;
            info!(
                "all match data saved to {}",
                self.cache.location(CacheKey::Aggregate)
            );
        }

        let report = FetchReport {
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            max_round,
            rounds,
            rows_total: dataset.len(),
        };
        Ok(FetchOutcome { dataset, report })
    }

    fn collect_round(&self, round: u32) -> Result<(Dataset, bool), RoundFailure> {
        let key = CacheKey::Round(round);
        match self.cache.read(key) {
            Ok(Some(rows)) => {
                info!(round, "loaded round from {}", self.cache.location(key));
                return Ok((rows, true));
            }
            Ok(None) => {}
            Err(err) => {
                warn!(round, "unreadable round cache, refetching: {err:#}");
            }
        }

        let table = self
            .provider
            .round_results(round)
            .map_err(|err| RoundFailure::Provider(format!("{err:#}")))?;
        let mapping = recognize_provider_schema(&table).into_mapping()?;
        debug!(
            round,
            home = %mapping.home_score,
            away = %mapping.away_score,
            "score columns recognized"
        );
        let rows = canonicalize(&table, &mapping)?;

        self.cache
            .write(key, &rows)
            .map_err(|err| RoundFailure::CacheWrite(format!("{err:#}")))?;
        info!(
            round,
            "fetched {} matches and saved to {}",
            rows.len(),
            self.cache.location(key)
        );
        Ok((rows, false))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use anyhow::anyhow;
    use serde_json::json;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::records::MatchRecord;
    use crate::schema::Table;

    #[derive(Default)]
    struct StubProvider {
        tables: HashMap<u32, serde_json::Value>,
        calls: RefCell<Vec<u32>>,
    }

    impl StubProvider {
        fn with_round(mut self, round: u32, rows: serde_json::Value) -> Self {
            self.tables.insert(round, rows);
            self
        }
    }

    impl MatchProvider for StubProvider {
        fn round_results(&self, round: u32) -> Result<Table> {
            self.calls.borrow_mut().push(round);
            let value = self
                .tables
                .get(&round)
                .cloned()
                .ok_or_else(|| anyhow!("connection reset"))?;
            Table::from_json_value(value)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn scored(home: &str, away: &str, h: u32, a: u32) -> serde_json::Value {
        json!({
            "home_team": home, "away_team": away,
            "home_score_current": h, "away_score_current": a
        })
    }

    #[test]
    fn cached_rounds_skip_the_provider() {
        let cache = MemoryCache::new()
            .with_entry(CacheKey::Round(1), vec![MatchRecord::new("A", "B", 1, 1)]);
        let provider = StubProvider::default().with_round(2, json!([scored("C", "D", 2, 0)]));
        let out = MatchFetcher::new(&cache, &provider).get_match_data(2).unwrap();

        assert_eq!(*provider.calls.borrow(), vec![2]);
        assert_eq!(out.dataset.len(), 2);
        assert_eq!(out.report.cache_hits(), 1);
        assert_eq!(out.report.rounds[1].outcome, RoundOutcome::Fetched { rows: 1 });
        assert!(cache.contains(CacheKey::Round(2)));
        assert_eq!(cache.read(CacheKey::Aggregate).unwrap(), Some(out.dataset));
    }

    #[test]
    fn unrecognized_round_contributes_nothing() {
        let cache = MemoryCache::new();
        let provider = StubProvider::default()
            .with_round(1, json!([scored("A", "B", 1, 0)]))
            .with_round(2, json!([{"home_team": "C", "away_team": "D", "status": "postponed"}]));
        let out = MatchFetcher::new(&cache, &provider).get_match_data(2).unwrap();

        assert_eq!(out.dataset, vec![MatchRecord::new("A", "B", 1, 0)]);
        assert!(!cache.contains(CacheKey::Round(2)));
        let failures: Vec<_> = out.report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], (2, RoundFailure::NoScoreColumns { .. })));
    }

    #[test]
    fn zero_successful_rounds_is_unavailable() {
        let cache = MemoryCache::new();
        let provider = StubProvider::default();
        let err = MatchFetcher::new(&cache, &provider).get_match_data(3).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::Unavailable { max_round: 3 })
        ));
        assert_eq!(*provider.calls.borrow(), vec![1, 2, 3]);
        assert!(!cache.contains(CacheKey::Aggregate));
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        let cache = MemoryCache::new();
        let provider = StubProvider::default().with_round(2, json!([scored("A", "B", 0, 0)]));
        let err = MatchFetcher::new(&cache, &provider)
            .failure_policy(FailurePolicy::Abort)
            .get_match_data(2)
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::RoundAborted { round: 1, .. })
        ));
        assert_eq!(*provider.calls.borrow(), vec![1]);
    }

    #[test]
    fn aggregate_left_alone_when_not_stored() {
        let stored = vec![MatchRecord::new("X", "Y", 4, 4)];
        let cache = MemoryCache::new().with_entry(CacheKey::Aggregate, stored.clone());
        let provider = StubProvider::default().with_round(1, json!([scored("A", "B", 1, 0)]));
        let out = MatchFetcher::new(&cache, &provider)
            .store_aggregate(false)
            .get_match_data(1)
            .unwrap();

        assert_eq!(out.dataset, vec![MatchRecord::new("A", "B", 1, 0)]);
        assert!(cache.contains(CacheKey::Round(1)));
        assert_eq!(cache.read(CacheKey::Aggregate).unwrap(), Some(stored));
    }

    #[test]
    fn repeated_fixtures_dropped_before_aggregate_write() {
        let cache = MemoryCache::new();
        let provider = StubProvider::default()
            .with_round(1, json!([scored("A", "B", 1, 0), scored("C", "D", 0, 0)]))
            .with_round(2, json!([scored("A", "B", 2, 2), scored("B", "A", 0, 3)]));
        let out = MatchFetcher::new(&cache, &provider)
            .duplicate_policy(DuplicatePolicy::DropRepeatedFixtures)
            .get_match_data(2)
            .unwrap();

        let expected = vec![
            MatchRecord::new("A", "B", 1, 0),
            MatchRecord::new("C", "D", 0, 0),
            MatchRecord::new("B", "A", 0, 3),
        ];
        assert_eq!(out.dataset, expected);
        assert_eq!(out.report.rows_total, 3);
        assert_eq!(cache.read(CacheKey::Round(2)).unwrap().map(|r| r.len()), Some(2));
        assert_eq!(cache.read(CacheKey::Aggregate).unwrap(), Some(expected));
    }

    #[test]
    fn missing_scores_become_zero() {
        let cache = MemoryCache::new();
        let provider = StubProvider::default().with_round(
            1,
            json!([
                scored("A", "B", 3, 1),
                {"home_team": "C", "away_team": "D", "home_score_current": null}
            ]),
        );
        let out = MatchFetcher::new(&cache, &provider).get_match_data(1).unwrap();
        assert_eq!(out.dataset[1], MatchRecord::new("C", "D", 0, 0));
    }
}
