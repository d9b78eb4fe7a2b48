//! Minimal TVDB v4 client for air-date lookups

use crate::config::{MetadataConfig, RetryConfig};
use crate::error::{Error, MetadataError, Result};
use crate::retry::with_retry;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

const SERVICE: &str = "tvdb";

/// An episode as returned by an air-date query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TvdbEpisode {
    /// Season number
    pub season: u32,
    /// Episode number within the season
    pub episode: u32,
    /// Air date reported by TVDB
    pub aired: Option<String>,
}

/// TVDB client holding a bearer token and a per-instance series id cache
pub struct TvdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    pin: Option<String>,
    retry: RetryConfig,
    token: Mutex<Option<String>>,
    series: std::sync::Mutex<HashMap<String, u64>>,
}

impl TvdbClient {
    /// Build a client from configuration; `None` without an API key.
    pub fn from_config(config: &MetadataConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.tvdb_api_key.clone().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Some(Self {
            http,
            base_url: config.tvdb_base_url.trim_end_matches('/').to_string(),
            api_key,
            pin: config.tvdb_pin.clone().filter(|p| !p.is_empty()),
            retry: config.retry.clone(),
            token: Mutex::new(None),
            series: std::sync::Mutex::new(HashMap::new()),
        }))
    }

    /// Episode of `series_name` that aired on `air_date` (`YYYY-MM-DD`).
    ///
    /// `Ok(None)` when the series or the episode is unknown to TVDB.
    pub async fn episode_by_air_date(
        &self,
        series_name: &str,
        air_date: &str,
    ) -> Result<Option<TvdbEpisode>> {
        let Some(series_id) = self.series_id(series_name).await? else {
            tracing::warn!(series = series_name, "no TVDB series found");
            return Ok(None);
        };

        let url = format!("{}/series/{}/episodes/default", self.base_url, series_id);
        let Some(body) = self.get(&url, &[("airDate", air_date)]).await? else {
            return Ok(None);
        };

        let episodes = match body.get("data") {
            Some(Value::Object(data)) => data.get("episodes").cloned().unwrap_or(Value::Null),
            Some(list @ Value::Array(_)) => list.clone(),
            _ => return Ok(None),
        };
        let Some(first) = episodes.as_array().and_then(|list| list.first()) else {
            return Ok(None);
        };

        let season = number_field(first, &["seasonNumber", "season"]);
        let episode = number_field(first, &["number", "episodeNumber"]);
        let (Some(season), Some(episode)) = (season, episode) else {
            tracing::warn!(series = series_name, air_date, "invalid episode structure from TVDB");
            return Ok(None);
        };
        let aired = ["aired", "firstAired"]
            .iter()
            .find_map(|k| first.get(*k).and_then(Value::as_str))
            .map(str::to_string);

        Ok(Some(TvdbEpisode {
            season,
            episode,
            aired,
        }))
    }

    async fn series_id(&self, series_name: &str) -> Result<Option<u64>> {
        let key = series_name.to_lowercase();
        if let Some(id) = self.cached_series(&key) {
            return Ok(Some(id));
        }

        let url = format!("{}/search", self.base_url);
        let Some(body) = self
            .get(&url, &[("query", series_name), ("type", "series")])
            .await?
        else {
            return Ok(None);
        };
        let id = body
            .get("data")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(|first| {
                ["tvdb_id", "id"]
                    .iter()
                    .find_map(|k| first.get(*k).and_then(parse_id))
            });

        if let Some(id) = id {
            if let Ok(mut cache) = self.series.lock() {
                cache.insert(key, id);
            }
        }
        Ok(id)
    }

    fn cached_series(&self, key: &str) -> Option<u64> {
        self.series.lock().ok()?.get(key).copied()
    }

    async fn bearer(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(token) = token.as_ref() {
            return Ok(token.clone());
        }

        let mut payload = serde_json::json!({ "apikey": self.api_key });
        if let Some(pin) = &self.pin {
            payload["pin"] = Value::String(pin.clone());
        }
        let login_url = format!("{}/login", self.base_url);
        let response = with_retry(&self.retry, "tvdb login", || async {
            Ok::<_, Error>(self.http.post(&login_url).json(&payload).send().await?)
        })
        .await?;

        if !response.status().is_success() {
            return Err(lookup(format!(
                "authentication failed: HTTP {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;
        let fresh = body
            .pointer("/data/token")
            .and_then(Value::as_str)
            .ok_or_else(|| lookup("authentication response missing token".to_string()))?
            .to_string();
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    /// GET with bearer auth. Non-success statuses other than transient ones
    /// are logged and yield `None`.
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Option<Value>> {
        let bearer = self.bearer().await?;
        let response = with_retry(&self.retry, "tvdb request", || async {
            let response = self
                .http
                .get(url)
                .bearer_auth(&bearer)
                .query(query)
                .send()
                .await?;
            let status = response.status();
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(lookup(format!("HTTP {}", status)));
            }
            Ok::<_, Error>(response)
        })
        .await?;

        if !response.status().is_success() {
            tracing::warn!(url, status = %response.status(), "TVDB request failed");
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }
}

fn lookup(reason: String) -> Error {
    MetadataError::Lookup {
        service: SERVICE.to_string(),
        reason,
    }
    .into()
}

fn number_field(value: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|k| {
        let field = value.get(*k)?;
        field
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .or_else(|| field.as_str()?.trim().parse().ok())
    })
}

/// Series ids come as numbers, numeric strings or `series-<n>`
fn parse_id(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let text = value.as_str()?;
    let digits = text.rsplit('-').next()?;
    digits.parse().ok()
}
