//! Column-name tables for provider payloads and local alternate files.
//!
//! Upstream tables disagree on what the score columns are called. Instead of
//! renaming column by column until something sticks, each table is matched
//! once against an ordered list of known shapes and the first full match wins.

use anyhow::{Result, anyhow};
use serde_json::{Map, Value};

use crate::error::RoundFailure;
use crate::records::{Dataset, MatchRecord};

pub const HOME_TEAM: &str = "home_team";
pub const AWAY_TEAM: &str = "away_team";
pub const HOME_SCORE: &str = "home_score";
pub const AWAY_SCORE: &str = "away_score";

/// Provider score columns in preference order.
pub const SCORE_COLUMN_PAIRS: &[(&str, &str)] = &[
    ("home_score_normaltime", "away_score_normaltime"),
    ("home_score_current", "away_score_current"),
    ("home_score_display", "away_score_display"),
];

/// Accepted source names per canonical column, highest priority first.
pub const COLUMN_ALIASES: &[(&str, &[&str])] = &[
    (
        HOME_TEAM,
        &["home_team", "home_name", "homeTeam", "homeTeamName"],
    ),
    (
        AWAY_TEAM,
        &["away_team", "away_name", "awayTeam", "awayTeamName"],
    ),
    (
        HOME_SCORE,
        &["home_score", "home_score_ft", "home_score_normaltime", "homeScore"],
    ),
    (
        AWAY_SCORE,
        &["away_score", "away_score_ft", "away_score_normaltime", "awayScore"],
    ),
];

/// Row-oriented table with the column set of all rows combined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
}

impl Table {
    pub fn from_rows(rows: Vec<Map<String, Value>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    /// Accepts an array of records, or an object keyed by column whose values
    /// are either arrays or index-keyed objects.
    pub fn from_json_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Array(items) => {
                let mut rows = Vec::with_capacity(items.len());
                for (idx, item) in items.into_iter().enumerate() {
                    match item {
                        Value::Object(map) => rows.push(map),
                        other => return Err(anyhow!("row {idx} is not an object: {other}")),
                    }
                }
                Ok(Self::from_rows(rows))
            }
            Value::Object(columns) => Self::from_columns(columns),
            other => Err(anyhow!("unsupported table json: {other}")),
        }
    }

    fn from_columns(columns: Map<String, Value>) -> Result<Self> {
        let mut rows: Vec<Map<String, Value>> = Vec::new();
        let mut index: Vec<String> = Vec::new();
        for (column, cells) in columns {
            let cells: Vec<(String, Value)> = match cells {
                Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v))
                    .collect(),
                Value::Object(map) => map.into_iter().collect(),
                other => return Err(anyhow!("column {column} is not a list: {other}")),
            };
            for (key, cell) in cells {
                let pos = match index.iter().position(|k| *k == key) {
                    Some(pos) => pos,
                    None => {
                        index.push(key);
                        rows.push(Map::new());
                        rows.len() - 1
                    }
                };
                rows[pos].insert(column.clone(), cell);
            }
        }
        Ok(Self::from_rows(rows))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// Source column for each canonical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub home_team: String,
    pub away_team: String,
    pub home_score: String,
    pub away_score: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaMatch {
    Recognized(ColumnMapping),
    NoScoreColumns { available: Vec<String> },
    MissingTeamColumns { available: Vec<String> },
}

impl SchemaMatch {
    pub fn into_mapping(self) -> Result<ColumnMapping, RoundFailure> {
        match self {
            SchemaMatch::Recognized(mapping) => Ok(mapping),
            SchemaMatch::NoScoreColumns { available } => {
                Err(RoundFailure::NoScoreColumns { available })
            }
            SchemaMatch::MissingTeamColumns { available } => {
                Err(RoundFailure::MissingTeamColumns { available })
            }
        }
    }
}

/// Matches a provider table against [`SCORE_COLUMN_PAIRS`].
pub fn recognize_provider_schema(table: &Table) -> SchemaMatch {
    let Some((home, away)) = SCORE_COLUMN_PAIRS
        .iter()
        .find(|(home, away)| table.has_column(home) && table.has_column(away))
    else {
        return SchemaMatch::NoScoreColumns {
            available: table.columns().to_vec(),
        };
    };
    if !table.has_column(HOME_TEAM) || !table.has_column(AWAY_TEAM) {
        return SchemaMatch::MissingTeamColumns {
            available: table.columns().to_vec(),
        };
    }
    SchemaMatch::Recognized(ColumnMapping {
        home_team: HOME_TEAM.to_string(),
        away_team: AWAY_TEAM.to_string(),
        home_score: home.to_string(),
        away_score: away.to_string(),
    })
}

/// Resolves every canonical column through [`COLUMN_ALIASES`]; returns the
/// canonical names that found no source column.
pub fn resolve_aliases(table: &Table) -> Result<ColumnMapping, Vec<&'static str>> {
    let mut found: Vec<Option<&str>> = Vec::with_capacity(COLUMN_ALIASES.len());
    let mut missing = Vec::new();
    for (canonical, aliases) in COLUMN_ALIASES {
        let source = aliases.iter().copied().find(|alias| table.has_column(alias));
        if source.is_none() {
            missing.push(*canonical);
        }
        found.push(source);
    }
    if !missing.is_empty() {
        return Err(missing);
    }
    let pick = |idx: usize| found[idx].unwrap_or_default().to_string();
    Ok(ColumnMapping {
        home_team: pick(0),
        away_team: pick(1),
        home_score: pick(2),
        away_score: pick(3),
    })
}

/// Projects a table onto the canonical columns: missing scores become zero,
/// numeric scores are truncated to integers.
pub fn canonicalize(table: &Table, mapping: &ColumnMapping) -> Result<Dataset, RoundFailure> {
    let mut out = Vec::with_capacity(table.len());
    for (idx, row) in table.rows().iter().enumerate() {
        out.push(MatchRecord {
            home_team: team_cell(row, &mapping.home_team, idx)?,
            away_team: team_cell(row, &mapping.away_team, idx)?,
            home_score: score_cell(row, &mapping.home_score, idx)?,
            away_score: score_cell(row, &mapping.away_score, idx)?,
        });
    }
    Ok(out)
}

fn team_cell(row: &Map<String, Value>, column: &str, idx: usize) -> Result<String, RoundFailure> {
    match row.get(column) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        other => Err(bad_value(column, idx, other)),
    }
}

fn score_cell(row: &Map<String, Value>, column: &str, idx: usize) -> Result<u32, RoundFailure> {
    let cell = row.get(column);
    match cell {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                return u32::try_from(v).map_err(|_| bad_value(column, idx, cell));
            }
            n.as_f64()
                .and_then(truncate_score)
                .ok_or_else(|| bad_value(column, idx, cell))
        }
        Some(Value::String(s)) => parse_score_str(s).ok_or_else(|| bad_value(column, idx, cell)),
        Some(_) => Err(bad_value(column, idx, cell)),
    }
}

fn parse_score_str(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0);
    }
    if let Ok(v) = trimmed.parse::<u32>() {
        return Some(v);
    }
    trimmed.parse::<f64>().ok().and_then(truncate_score)
}

fn truncate_score(v: f64) -> Option<u32> {
    if !v.is_finite() || v < 0.0 || v > f64::from(u32::MAX) {
        return None;
    }
    Some(v.trunc() as u32)
}

fn bad_value(column: &str, row: usize, cell: Option<&Value>) -> RoundFailure {
    RoundFailure::BadValue {
        column: column.to_string(),
        row,
        value: cell.map(|v| v.to_string()).unwrap_or_else(|| "missing".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(value: Value) -> Table {
        Table::from_json_value(value).expect("valid table")
    }

    #[test]
    fn normaltime_pair_wins_over_current() {
        let t = table(json!([{
            "home_team": "A", "away_team": "B",
            "home_score_current": 3, "away_score_current": 1,
            "home_score_normaltime": 2, "away_score_normaltime": 1
        }]));
        let mapping = recognize_provider_schema(&t).into_mapping().unwrap();
        assert_eq!(mapping.home_score, "home_score_normaltime");
        let rows = canonicalize(&t, &mapping).unwrap();
        assert_eq!(rows, vec![MatchRecord::new("A", "B", 2, 1)]);
    }

    #[test]
    fn half_present_pair_is_skipped() {
        let t = table(json!([{
            "home_team": "A", "away_team": "B",
            "home_score_normaltime": 2,
            "home_score_display": 2, "away_score_display": 0
        }]));
        let mapping = recognize_provider_schema(&t).into_mapping().unwrap();
        assert_eq!(mapping.away_score, "away_score_display");
    }

    #[test]
    fn no_score_columns_reports_available() {
        let t = table(json!([{"home_team": "A", "away_team": "B", "status": "notstarted"}]));
        match recognize_provider_schema(&t) {
            SchemaMatch::NoScoreColumns { mut available } => {
                available.sort();
                assert_eq!(available, vec!["away_team", "home_team", "status"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_and_fractional_scores_coerce() {
        let t = table(json!([
            {"home_team": "A", "away_team": "B", "home_score_current": 1.0, "away_score_current": null},
            {"home_team": "C", "away_team": "D", "home_score_current": "2"}
        ]));
        let mapping = recognize_provider_schema(&t).into_mapping().unwrap();
        let rows = canonicalize(&t, &mapping).unwrap();
        assert_eq!(rows[0], MatchRecord::new("A", "B", 1, 0));
        assert_eq!(rows[1], MatchRecord::new("C", "D", 2, 0));
    }

    #[test]
    fn unusable_score_is_rejected() {
        let t = table(json!([{"home_team": "A", "away_team": "B", "home_score": "x", "away_score": 1}]));
        let mapping = resolve_aliases(&t).unwrap();
        let err = canonicalize(&t, &mapping).unwrap_err();
        assert!(matches!(err, RoundFailure::BadValue { row: 0, .. }));
    }

    #[test]
    fn aliases_prefer_canonical_names() {
        let t = table(json!([{
            "home_team": "A", "home_name": "a", "awayTeam": "B",
            "homeScore": 1, "away_score_ft": 2
        }]));
        let mapping = resolve_aliases(&t).unwrap();
        assert_eq!(mapping.home_team, "home_team");
        assert_eq!(mapping.away_team, "awayTeam");
        assert_eq!(mapping.home_score, "homeScore");
        assert_eq!(mapping.away_score, "away_score_ft");
    }

    #[test]
    fn aliases_report_missing_fields() {
        let t = table(json!([{"homeTeamName": "A", "homeScore": 1}]));
        assert_eq!(resolve_aliases(&t).unwrap_err(), vec![AWAY_TEAM, AWAY_SCORE]);
    }

    #[test]
    fn column_oriented_json_is_pivoted() {
        let t = table(json!({
            "home_team": {"0": "A", "1": "C"},
            "away_team": {"0": "B", "1": "D"},
            "home_score": {"0": 1, "1": null},
            "away_score": {"0": 0, "1": 4}
        }));
        assert_eq!(t.len(), 2);
        let rows = canonicalize(&t, &resolve_aliases(&t).unwrap()).unwrap();
        assert_eq!(rows[1], MatchRecord::new("C", "D", 0, 4));
    }
}
