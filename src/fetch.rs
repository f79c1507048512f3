use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::identity::Identity;
use crate::pools::Pool;
use crate::stats::{GameRecord, GameSide, PlayerStats, PoolRecord, PoolStats, ProfileSnapshot};

const API_BASE: &str = "https://api.chess.com/pub/player/";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const RECENT_ARCHIVES: usize = 2;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("Mozilla/5.0")
            .build()
            .context("failed to build http client")
    })
}

/// Everything fetched for one identity. Sub-resource failures degrade to
/// defaults; the `*_ok` flags let the pipeline distinguish "no data at
/// all" from a legitimately empty account.
#[derive(Debug, Clone, Default)]
pub struct PlayerData {
    pub profile: ProfileSnapshot,
    pub stats: PlayerStats,
    pub games: Vec<GameRecord>,
    pub profile_ok: bool,
    pub stats_ok: bool,
}

impl PlayerData {
    pub fn is_empty(&self) -> bool {
        !self.profile_ok && !self.stats_ok && self.games.is_empty()
    }
}

/// Fetches profile, per-pool stats, and the last two monthly archives for
/// one identity. Never fails on a single bad sub-resource; only the
/// client build itself is an error.
pub async fn fetch_player_data(identity: &Identity) -> Result<PlayerData> {
    let client = http_client()?;
    let mut data = PlayerData::default();

    match api_text(client, &format!("{API_BASE}{identity}")).await {
        Ok(body) => match parse_profile_json(&body) {
            Ok(profile) => {
                data.profile = profile;
                data.profile_ok = true;
            }
            Err(err) => warn!(%identity, "profile payload malformed: {err}"),
        },
        Err(err) => warn!(%identity, "profile fetch failed: {err}"),
    }

    match api_text(client, &format!("{API_BASE}{identity}/stats")).await {
        Ok(body) => match parse_stats_json(&body) {
            Ok(stats) => {
                data.stats = stats;
                data.stats_ok = true;
            }
            Err(err) => warn!(%identity, "stats payload malformed: {err}"),
        },
        Err(err) => warn!(%identity, "stats fetch failed: {err}"),
    }

    let archives = match api_text(client, &format!("{API_BASE}{identity}/games/archives")).await {
        Ok(body) => parse_archives_json(&body).unwrap_or_else(|err| {
            warn!(%identity, "archives payload malformed: {err}");
            Vec::new()
        }),
        Err(err) => {
            warn!(%identity, "archives fetch failed: {err}");
            Vec::new()
        }
    };

    for url in pick_recent_archives(&archives) {
        match api_text(client, url).await {
            Ok(body) => match parse_monthly_games_json(&body) {
                Ok(mut games) => data.games.append(&mut games),
                Err(err) => warn!(%identity, url, "archive payload malformed: {err}"),
            },
            Err(err) => warn!(%identity, url, "archive fetch failed: {err}"),
        }
    }

    Ok(data)
}

/// The last two months of archives cover the 30-day scoring window even
/// right after a month rollover.
pub fn pick_recent_archives(urls: &[String]) -> &[String] {
    let start = urls.len().saturating_sub(RECENT_ARCHIVES);
    &urls[start..]
}

async fn api_text(client: &Client, url: &str) -> Result<String> {
    let resp = client.get(url).send().await.context("request failed")?;
    let status = resp.status();
    let body = resp.text().await.context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("http {status}: {url}"));
    }
    Ok(body)
}

pub fn parse_profile_json(raw: &str) -> Result<ProfileSnapshot> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(ProfileSnapshot::default());
    }
    let parsed: ProfileResponse = serde_json::from_str(trimmed).context("invalid profile json")?;
    Ok(ProfileSnapshot {
        joined_epoch: parsed.joined,
    })
}

pub fn parse_stats_json(raw: &str) -> Result<PlayerStats> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(PlayerStats::new());
    }
    let parsed: StatsResponse = serde_json::from_str(trimmed).context("invalid stats json")?;
    let mut stats = PlayerStats::new();
    for (pool, raw_pool) in [
        (Pool::Rapid, parsed.chess_rapid),
        (Pool::Blitz, parsed.chess_blitz),
        (Pool::Bullet, parsed.chess_bullet),
        (Pool::Daily, parsed.chess_daily),
    ] {
        let Some(raw_pool) = raw_pool else { continue };
        let record = raw_pool.record.unwrap_or_default();
        stats.insert(
            pool,
            PoolStats {
                rating: raw_pool.last.and_then(|l| l.rating),
                record: PoolRecord {
                    win: record.win,
                    loss: record.loss,
                    draw: record.draw,
                },
            },
        );
    }
    Ok(stats)
}

pub fn parse_archives_json(raw: &str) -> Result<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let parsed: ArchivesResponse =
        serde_json::from_str(trimmed).context("invalid archives json")?;
    Ok(parsed.archives.unwrap_or_default())
}

pub fn parse_monthly_games_json(raw: &str) -> Result<Vec<GameRecord>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let parsed: MonthlyGamesResponse =
        serde_json::from_str(trimmed).context("invalid games json")?;
    let games = parsed
        .games
        .unwrap_or_default()
        .into_iter()
        .map(|game| {
            let accuracies = game.accuracies.unwrap_or_default();
            GameRecord {
                end_epoch: game.end_time.unwrap_or_default(),
                white: side_from_raw(game.white),
                black: side_from_raw(game.black),
                white_accuracy: accuracies.white,
                black_accuracy: accuracies.black,
            }
        })
        .collect();
    Ok(games)
}

fn side_from_raw(raw: Option<SideRaw>) -> GameSide {
    let raw = raw.unwrap_or_default();
    GameSide {
        username: raw.username,
        result: raw.result,
    }
}

fn float_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(n) => Ok(n.as_f64()),
        serde_json::Value::String(s) => Ok(s.parse::<f64>().ok()),
        _ => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    joined: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    chess_rapid: Option<PoolRaw>,
    chess_blitz: Option<PoolRaw>,
    chess_bullet: Option<PoolRaw>,
    chess_daily: Option<PoolRaw>,
}

#[derive(Debug, Deserialize)]
struct PoolRaw {
    last: Option<LastRaw>,
    record: Option<RecordRaw>,
}

#[derive(Debug, Deserialize)]
struct LastRaw {
    rating: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct RecordRaw {
    #[serde(default)]
    win: u32,
    #[serde(default)]
    loss: u32,
    #[serde(default)]
    draw: u32,
}

#[derive(Debug, Deserialize)]
struct ArchivesResponse {
    archives: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct MonthlyGamesResponse {
    games: Option<Vec<GameRaw>>,
}

#[derive(Debug, Deserialize)]
struct GameRaw {
    end_time: Option<i64>,
    white: Option<SideRaw>,
    black: Option<SideRaw>,
    accuracies: Option<AccuraciesRaw>,
}

#[derive(Debug, Deserialize, Default)]
struct SideRaw {
    username: Option<String>,
    result: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AccuraciesRaw {
    #[serde(default, deserialize_with = "float_or_none")]
    white: Option<f64>,
    #[serde(default, deserialize_with = "float_or_none")]
    black: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_archives_are_the_last_two() {
        let urls: Vec<String> = (1..=5).map(|i| format!("https://x/{i}")).collect();
        assert_eq!(pick_recent_archives(&urls), &urls[3..]);
        assert_eq!(pick_recent_archives(&urls[..1]).len(), 1);
        assert!(pick_recent_archives(&[]).is_empty());
    }

    #[test]
    fn null_payloads_parse_to_empty() {
        assert!(parse_profile_json("null").unwrap().joined_epoch.is_none());
        assert!(parse_stats_json("null").unwrap().is_empty());
        assert!(parse_archives_json("null").unwrap().is_empty());
        assert!(parse_monthly_games_json("null").unwrap().is_empty());
    }

    #[test]
    fn accuracy_accepts_numbers_and_numeric_strings() {
        let raw = r#"{"games":[{"end_time":1,"accuracies":{"white":91.2,"black":"88.5"}},
                                {"end_time":2,"accuracies":{"white":"n/a","black":null}}]}"#;
        let games = parse_monthly_games_json(raw).unwrap();
        assert_eq!(games[0].white_accuracy, Some(91.2));
        assert_eq!(games[0].black_accuracy, Some(88.5));
        assert!(games[1].white_accuracy.is_none());
        assert!(games[1].black_accuracy.is_none());
    }
}
