use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::Settings;
use crate::http_client::http_client;
use crate::schema::Table;

/// Source of per-round results for one fixed league season.
pub trait MatchProvider {
    fn round_results(&self, round: u32) -> Result<Table>;

    fn name(&self) -> &str;
}

/// Score breakdown keys kept from the provider payload.
const SCORE_FIELDS: &[&str] = &["current", "display", "period1", "period2", "normaltime"];

pub struct SofascoreProvider {
    client: &'static Client,
    base_url: String,
    league_id: u32,
    season_id: u32,
}

impl SofascoreProvider {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings.http_timeout_secs)?,
            base_url: settings.provider_url.trim_end_matches('/').to_string(),
            league_id: settings.league_id,
            season_id: settings.season_id,
        })
    }

    pub fn round_url(&self, round: u32) -> String {
        round_url(&self.base_url, self.league_id, self.season_id, round)
    }
}

pub fn round_url(base: &str, league_id: u32, season_id: u32, round: u32) -> String {
    format!("{base}/unique-tournament/{league_id}/season/{season_id}/events/round/{round}")
}

impl MatchProvider for SofascoreProvider {
    fn round_results(&self, round: u32) -> Result<Table> {
        let url = self.round_url(round);
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .context("request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow!("http {}: {}", status, truncate(&body, 200)));
        }
        parse_round_events_json(&body)
    }

    fn name(&self) -> &str {
        "sofascore"
    }
}

#[derive(Debug, Deserialize)]
struct RoundEventsResponse {
    #[serde(default)]
    events: Vec<SofascoreEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SofascoreEvent {
    id: Option<u64>,
    home_team: SofascoreTeam,
    away_team: SofascoreTeam,
    #[serde(default)]
    home_score: Map<String, Value>,
    #[serde(default)]
    away_score: Map<String, Value>,
    status: Option<SofascoreStatus>,
    start_timestamp: Option<i64>,
    round_info: Option<SofascoreRoundInfo>,
}

#[derive(Debug, Deserialize)]
struct SofascoreTeam {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SofascoreStatus {
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SofascoreRoundInfo {
    round: Option<u32>,
}

/// Flattens a round's `events` payload into one row per event.
pub fn parse_round_events_json(raw: &str) -> Result<Table> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Table::default());
    }
    let data: RoundEventsResponse =
        serde_json::from_str(trimmed).context("invalid round events json")?;
    let rows = data.events.into_iter().map(flatten_event).collect();
    Ok(Table::from_rows(rows))
}

fn flatten_event(event: SofascoreEvent) -> Map<String, Value> {
    let mut row = Map::new();
    if let Some(id) = event.id {
        row.insert("game_id".to_string(), Value::from(id));
    }
    row.insert("home_team".to_string(), Value::from(event.home_team.name));
    row.insert("away_team".to_string(), Value::from(event.away_team.name));
    if let Some(kind) = event.status.and_then(|s| s.kind) {
        row.insert("status".to_string(), Value::from(kind));
    }
    if let Some(ts) = event.start_timestamp {
        row.insert("start_timestamp".to_string(), Value::from(ts));
    }
    if let Some(round) = event.round_info.and_then(|r| r.round) {
        row.insert("round".to_string(), Value::from(round));
    }
    for (side, scores) in [("home", &event.home_score), ("away", &event.away_score)] {
        for field in SCORE_FIELDS {
            if let Some(v) = scores.get(*field) {
                row.insert(format!("{side}_score_{field}"), v.clone());
            }
        }
    }
    row
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
