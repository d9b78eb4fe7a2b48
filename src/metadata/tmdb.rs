//! TMDb movie search, details and posters

use crate::config::{MetadataConfig, RetryConfig};
use crate::error::{Error, MetadataError, Result};
use crate::retry::with_retry;
use crate::utils::compile_regex;
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::LazyLock;

/// Poster image base
pub const DEFAULT_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

/// Minimum title similarity accepted as a search match
const MIN_SIMILARITY: f64 = 0.5;

static RE_BRACKETS: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"\[[^\]]*\]"));
static RE_QUALITY_PAREN: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"(?i)\((?:\d{4}p|HD|4K).*?\)"));
static RE_RESOLUTION: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"(?i)\b\d{3,4}p\b"));
static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"\s+"));

/// A search hit
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TmdbMovie {
    /// TMDb id
    pub id: u64,
    /// Title
    #[serde(default)]
    pub title: String,
}

#[derive(Deserialize)]
struct SearchResults {
    #[serde(default)]
    results: Vec<TmdbMovie>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<Named>,
}

/// Movie details with credits
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct MovieDetails {
    /// TMDb id
    pub id: u64,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Plot summary
    #[serde(default)]
    pub overview: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub release_date: String,
    /// Poster path relative to the image base
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    genres: Vec<Named>,
    #[serde(default)]
    credits: Credits,
}

impl MovieDetails {
    /// Release year, if known
    pub fn year(&self) -> Option<&str> {
        self.release_date.get(..4).filter(|y| !y.is_empty())
    }

    /// Genre names
    pub fn genres(&self) -> Vec<String> {
        self.genres.iter().map(|g| g.name.clone()).collect()
    }

    /// The first `limit` cast members
    pub fn actors(&self, limit: usize) -> Vec<String> {
        self.credits
            .cast
            .iter()
            .take(limit)
            .map(|c| c.name.clone())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

/// TMDb v3 client
pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    image_base: String,
    api_key: String,
    retry: RetryConfig,
}

impl TmdbClient {
    /// Build a client from configuration; `None` without an API key.
    pub fn from_config(config: &MetadataConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.tmdb_api_key.clone().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Some(Self {
            http,
            base_url: config.tmdb_base_url.trim_end_matches('/').to_string(),
            image_base: DEFAULT_IMAGE_BASE.to_string(),
            api_key,
            retry: config.retry.clone(),
        }))
    }

    /// Use a different poster image base
    pub fn with_image_base(mut self, image_base: impl Into<String>) -> Self {
        self.image_base = image_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Best-matching movie for `title`, optionally restricted to `year`
    pub async fn search_movie(&self, title: &str, year: Option<&str>) -> Result<Option<TmdbMovie>> {
        let mut query = vec![("api_key", self.api_key.as_str()), ("query", title)];
        if let Some(year) = year.filter(|y| !y.is_empty()) {
            query.push(("year", year));
        }
        let url = format!("{}/search/movie", self.base_url);
        let results: SearchResults = self.get_json(&url, &query).await?;

        let best = results
            .results
            .into_iter()
            .map(|movie| (similarity(title, &movie.title), movie))
            .fold(None::<(f64, TmdbMovie)>, |best, (score, movie)| match best {
                Some((top, _)) if top >= score => best,
                _ => Some((score, movie)),
            });
        Ok(best
            .filter(|(score, _)| *score >= MIN_SIMILARITY)
            .map(|(_, movie)| movie))
    }

    /// Details and credits of a movie
    pub async fn movie_details(&self, id: u64) -> Result<MovieDetails> {
        let url = format!("{}/movie/{}", self.base_url, id);
        self.get_json(
            &url,
            &[
                ("api_key", self.api_key.as_str()),
                ("append_to_response", "credits"),
            ],
        )
        .await
    }

    /// Download a poster to `dest`
    pub async fn download_poster(&self, poster_path: &str, dest: &Path) -> Result<()> {
        let url = format!("{}{}", self.image_base, poster_path);
        let bytes = with_retry(&self.retry, "tmdb poster", || async {
            let response = self.http.get(&url).send().await?.error_for_status()?;
            Ok::<_, Error>(response.bytes().await?)
        })
        .await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = with_retry(&self.retry, "tmdb request", || async {
            Ok::<_, Error>(self.http.get(url).query(query).send().await?.error_for_status()?)
        })
        .await
        .map_err(|e| MetadataError::Lookup {
            service: "tmdb".to_string(),
            reason: e.to_string(),
        })?;
        Ok(response.json().await?)
    }
}

/// Drop bracketed tags and resolution markers from a video title
pub fn clean_title(title: &str) -> String {
    let title = RE_BRACKETS.replace_all(title, "");
    let title = RE_QUALITY_PAREN.replace_all(&title, "");
    let title = RE_RESOLUTION.replace_all(&title, "");
    RE_SPACES.replace_all(&title, " ").trim().to_string()
}

/// Case-insensitive Ratcliff/Obershelp similarity in `0.0..=1.0`
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        let mut cur = vec![0usize; b.len() + 1];
        for j in 1..=b.len() {
            if a[i - 1] == b[j - 1] {
                cur[j] = prev[j - 1] + 1;
                if cur[j] > best.0 {
                    best = (cur[j], i - cur[j], j - cur[j]);
                }
            }
        }
        prev = cur;
    }

    let (len, i, j) = best;
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}
