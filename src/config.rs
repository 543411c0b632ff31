use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;

use crate::cache::FileCache;

/// Sofascore unique-tournament id of the Süper Lig.
pub const SUPER_LIG_TOURNAMENT_ID: u32 = 52;
/// Sofascore season id of 2024/25.
pub const SEASON_2425_ID: u32 = 63814;
pub const DEFAULT_MAX_ROUND: u32 = 28;
pub const DEFAULT_PROVIDER_URL: &str = "https://api.sofascore.com/api/v1";
pub const DEFAULT_DATA_DIR: &str = "data";

/// What to do with an aggregate file whose round coverage is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AggregatePolicy {
    /// Return the aggregate as-is, whatever round range was asked for.
    #[default]
    TrustCache,
    /// Skip every local tier and collect `1..=max_round` through the fetcher,
    /// leaving the aggregate file as it is.
    ValidateCoverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FailurePolicy {
    /// Log the failed round and carry on with the next one.
    #[default]
    Continue,
    /// Stop the run at the first failed round.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DuplicatePolicy {
    #[default]
    Keep,
    /// Keep only the first record of each (home, away) pairing.
    DropRepeatedFixtures,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub league_id: u32,
    pub season_id: u32,
    pub league_slug: String,
    pub season_label: String,
    pub aggregate_span: String,
    pub provider_url: String,
    pub http_timeout_secs: u64,
    pub aggregate_policy: AggregatePolicy,
    pub failure_policy: FailurePolicy,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            league_id: SUPER_LIG_TOURNAMENT_ID,
            season_id: SEASON_2425_ID,
            league_slug: "tff_super_lig".to_string(),
            season_label: "2425".to_string(),
            aggregate_span: format!("1-{DEFAULT_MAX_ROUND}"),
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            http_timeout_secs: 10,
            aggregate_policy: AggregatePolicy::default(),
            failure_policy: FailurePolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `SUPERLIG_*` variables. Unset or blank
    /// variables keep the default; malformed ones are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut out = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(dir) = get("SUPERLIG_DATA_DIR") {
            out.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("SUPERLIG_LEAGUE_ID") {
            out.league_id = parse_number("SUPERLIG_LEAGUE_ID", &raw)?;
        }
        if let Some(raw) = get("SUPERLIG_SEASON_ID") {
            out.season_id = parse_number("SUPERLIG_SEASON_ID", &raw)?;
        }
        if let Some(slug) = get("SUPERLIG_LEAGUE_SLUG") {
            out.league_slug = slug;
        }
        if let Some(label) = get("SUPERLIG_SEASON_LABEL") {
            out.season_label = label;
        }
        if let Some(url) = get("SUPERLIG_PROVIDER_URL") {
            out.provider_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = get("SUPERLIG_HTTP_TIMEOUT_SECS") {
            out.http_timeout_secs = parse_number("SUPERLIG_HTTP_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("SUPERLIG_AGGREGATE_POLICY") {
            out.aggregate_policy = parse_policy("SUPERLIG_AGGREGATE_POLICY", &raw)?;
        }
        if let Some(raw) = get("SUPERLIG_FAILURE_POLICY") {
            out.failure_policy = parse_policy("SUPERLIG_FAILURE_POLICY", &raw)?;
        }
        if let Some(raw) = get("SUPERLIG_DUPLICATE_POLICY") {
            out.duplicate_policy = parse_policy("SUPERLIG_DUPLICATE_POLICY", &raw)?;
        }
        Ok(out)
    }

    pub fn aggregate_file_name(&self) -> String {
        format!(
            "{}_{}_{}_matches.json",
            self.league_slug, self.season_label, self.aggregate_span
        )
    }

    pub fn file_cache(&self) -> FileCache {
        FileCache::new(self.data_dir.clone(), self.aggregate_file_name())
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("{key}: expected a number, got {raw:?}"))
}

fn parse_policy<T: ValueEnum>(key: &str, raw: &str) -> Result<T> {
    T::from_str(raw, true).map_err(|err| anyhow!("{key}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_name_the_season_aggregate() {
        let settings = Settings::default();
        assert_eq!(
            settings.aggregate_file_name(),
            "tff_super_lig_2425_1-28_matches.json"
        );
        assert_eq!(settings.league_id, 52);
        assert_eq!(settings.season_id, 63814);
    }

    #[test]
    fn env_overrides_apply() {
        let settings = Settings::from_lookup(lookup(&[
            ("SUPERLIG_DATA_DIR", "/tmp/sl"),
            ("SUPERLIG_SEASON_ID", " 70000 "),
            ("SUPERLIG_AGGREGATE_POLICY", "validate-coverage"),
            ("SUPERLIG_FAILURE_POLICY", "ABORT"),
            ("SUPERLIG_PROVIDER_URL", "http://localhost:9000/api/"),
            ("SUPERLIG_LEAGUE_SLUG", ""),
        ]))
        .unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/sl"));
        assert_eq!(settings.season_id, 70000);
        assert_eq!(settings.aggregate_policy, AggregatePolicy::ValidateCoverage);
        assert_eq!(settings.failure_policy, FailurePolicy::Abort);
        assert_eq!(settings.provider_url, "http://localhost:9000/api");
        assert_eq!(settings.league_slug, "tff_super_lig");
    }

    #[test]
    fn malformed_env_is_an_error() {
        let err = Settings::from_lookup(lookup(&[("SUPERLIG_LEAGUE_ID", "abc")])).unwrap_err();
        assert!(err.to_string().contains("SUPERLIG_LEAGUE_ID"));
        assert!(Settings::from_lookup(lookup(&[("SUPERLIG_DUPLICATE_POLICY", "nope")])).is_err());
    }
}
