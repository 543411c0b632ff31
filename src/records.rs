use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::DuplicatePolicy;

/// A scheduled (home, away) pairing, independent of its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixture {
    pub home: &'static str,
    pub away: &'static str,
}

/// One finished fixture in the canonical four-column shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub home_score: u32,
    #[serde(default)]
    pub away_score: u32,
}

impl MatchRecord {
    pub fn new(home_team: &str, away_team: &str, home_score: u32, away_score: u32) -> Self {
        Self {
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home_score,
            away_score,
        }
    }

    pub fn is_fixture(&self, fixture: &Fixture) -> bool {
        self.home_team == fixture.home && self.away_team == fixture.away
    }
}

pub type Dataset = Vec<MatchRecord>;

/// Concatenates per-round tables in round order, keeping row order inside each round.
pub fn concat_rounds(rounds: Vec<(u32, Dataset)>) -> Dataset {
    let mut rounds = rounds;
    rounds.sort_by_key(|(round, _)| *round);
    let total = rounds.iter().map(|(_, rows)| rows.len()).sum();
    let mut out = Vec::with_capacity(total);
    for (_, rows) in rounds {
        out.extend(rows);
    }
    out
}

/// Keeps the first record of every ordered (home, away) pairing.
pub fn drop_repeated_fixtures(rows: Dataset) -> Dataset {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|m| seen.insert((m.home_team.clone(), m.away_team.clone())))
        .collect()
}

pub fn apply_duplicate_policy(rows: Dataset, policy: DuplicatePolicy) -> Dataset {
    match policy {
        DuplicatePolicy::Keep => rows,
        DuplicatePolicy::DropRepeatedFixtures => drop_repeated_fixtures(rows),
    }
}
