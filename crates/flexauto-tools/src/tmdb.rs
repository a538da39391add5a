//! New-release check over the TMDb discover API.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, TimeDelta};
use serde::Deserialize;

use flexauto_core::error::{FlexError, Result};
use flexauto_core::traits::CatalogCheck;

const DEFAULT_API_BASE: &str = "https://api.themoviedb.org/3";
const MAX_ENTRIES: usize = 10;

/// Genre names accepted by the `Genre` parameter.
pub const GENRES: &[(&str, u32)] = &[
    ("Action", 28),
    ("Adventure", 12),
    ("Animation", 16),
    ("Comedy", 35),
    ("Crime", 80),
    ("Documentary", 99),
    ("Drama", 18),
    ("Family", 10751),
    ("Fantasy", 14),
    ("History", 36),
    ("Horror", 27),
    ("Music", 10402),
    ("Mystery", 9648),
    ("Romance", 10749),
    ("Science Fiction", 878),
    ("TV Movie", 10770),
    ("Thriller", 53),
    ("War", 10752),
    ("Western", 37),
];

/// Remembers which movie ids were already reported per genre and region.
pub struct TmdbService {
    client: reqwest::Client,
    api_base: String,
    seen: Mutex<HashMap<String, HashSet<i64>>>,
}

impl Default for TmdbService {
    fn default() -> Self {
        Self::new()
    }
}

impl TmdbService {
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    pub fn with_api_base(api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            seen: Mutex::new(HashMap::new()),
        }
    }

    async fn discover(
        &self,
        genre_id: u32,
        since: NaiveDate,
        region: &str,
        api_key: &str,
    ) -> Result<Vec<Movie>> {
        let resp = self
            .client
            .get(format!("{}/discover/movie", self.api_base))
            .query(&[
                ("api_key", api_key.to_string()),
                ("language", "uk-UA".into()),
                ("region", region.to_string()),
                ("with_genres", genre_id.to_string()),
                ("primary_release_date.gte", since.format("%Y-%m-%d").to_string()),
                ("sort_by", "primary_release_date.desc".into()),
                ("vote_count.gte", "5".into()),
                ("page", "1".into()),
            ])
            .send()
            .await
            .map_err(|e| FlexError::Http(format!("TMDb request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(FlexError::Http(format!("TMDb API {status}: {text}")));
        }

        let body: DiscoverPage = resp
            .json()
            .await
            .map_err(|e| FlexError::Http(format!("Invalid TMDb response: {e}")))?;
        Ok(body.results)
    }
}

#[async_trait]
impl CatalogCheck for TmdbService {
    async fn check_new_titles(
        &self,
        genre: &str,
        period: &str,
        region: &str,
        api_key: &str,
    ) -> Result<Option<Vec<String>>> {
        let genre_id =
            genre_id(genre).ok_or_else(|| FlexError::Http(format!("Unknown genre '{genre}'")))?;
        let since = Local::now().date_naive() - TimeDelta::days(days_back(period));
        let movies = self.discover(genre_id, since, region, api_key).await?;

        let entries = {
            let mut seen = self
                .seen
                .lock()
                .map_err(|_| FlexError::Http("TMDb cache lock poisoned".into()))?;
            let ids = seen.entry(format!("{genre_id}_{region}")).or_default();
            collect_new(ids, &movies)
        };
        Ok((!entries.is_empty()).then_some(entries))
    }
}

/// Genre id from a name (any case) or a numeric id.
pub fn genre_id(genre: &str) -> Option<u32> {
    let genre = genre.trim();
    GENRES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(genre))
        .map(|(_, id)| *id)
        .or_else(|| genre.parse().ok())
}

/// Size of the release-date window in days.
pub fn days_back(period: &str) -> i64 {
    match period.trim().to_ascii_lowercase().as_str() {
        "day" => 1,
        "month" => 30,
        _ => 7,
    }
}

/// Format unseen movies (at most ten) and mark every returned id as seen.
pub fn collect_new(seen: &mut HashSet<i64>, movies: &[Movie]) -> Vec<String> {
    let mut entries = Vec::new();
    for movie in movies {
        if !seen.insert(movie.id) {
            continue;
        }
        if entries.len() < MAX_ENTRIES {
            entries.push(movie.format_entry());
        }
    }
    entries
}

// --- API types ---

#[derive(Debug, Deserialize)]
struct DiscoverPage {
    #[serde(default)]
    results: Vec<Movie>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: Option<f64>,
}

impl Movie {
    pub fn format_entry(&self) -> String {
        format!(
            "{} ({}) [⭐{:.1}] — https://www.themoviedb.org/movie/{}",
            self.title.as_deref().unwrap_or("Unknown"),
            self.release_date.as_deref().unwrap_or("N/A"),
            self.vote_average.unwrap_or(0.0),
            self.id
        )
    }
}
