use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashSet;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    CommonMetadata, Details, Episode, ExternalId, Genre, MediaKind, MediaStatus, Metadata,
    MovieDetails, Season, ShowDetails, ShowType,
};
use crate::services::source::{MetadataSource, max_change_window};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_URL: &str = "https://image.tmdb.org/t/p";
const THUMBNAIL_SIZE: &str = "w342";

pub struct TmdbService {
    client: reqwest::Client,
    api_key: RwLock<String>,
    language: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct TmdbSearchResult<T> {
    pub results: Vec<T>,
    pub total_results: i32,
    pub total_pages: i32,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbMovie {
    pub id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: Option<f64>,
    pub popularity: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbTvShow {
    pub id: i64,
    pub name: String,
    pub original_name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub first_air_date: Option<String>,
    pub vote_average: Option<f64>,
    pub popularity: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbGenre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbCountry {
    pub iso_3166_1: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbNetwork {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbMovieDetails {
    pub id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub status: Option<String>,
    pub runtime: Option<i32>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    #[serde(default)]
    pub adult: bool,
    pub imdb_id: Option<String>,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub production_countries: Vec<TmdbCountry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbSeason {
    pub season_number: u32,
    #[serde(default)]
    pub episode_count: u32,
    pub name: Option<String>,
    pub air_date: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbEpisode {
    pub season_number: u32,
    pub episode_number: u32,
    pub name: Option<String>,
    pub air_date: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbTvDetails {
    pub id: i64,
    pub name: String,
    pub original_name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub first_air_date: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub show_type: Option<String>,
    pub number_of_episodes: Option<u32>,
    pub number_of_seasons: Option<u32>,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    #[serde(default)]
    pub seasons: Vec<TmdbSeason>,
    pub last_episode_to_air: Option<TmdbEpisode>,
    pub next_episode_to_air: Option<TmdbEpisode>,
    #[serde(default)]
    pub networks: Vec<TmdbNetwork>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub production_countries: Vec<TmdbCountry>,
}

#[derive(Debug, Deserialize)]
struct TmdbChange {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TmdbChangesPage {
    results: Vec<TmdbChange>,
    page: u32,
    total_pages: u32,
}

/// Parses a TMDB date. TMDB sends an empty string for unknown dates.
fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    value
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

fn genres(genres: Vec<TmdbGenre>) -> Vec<Genre> {
    genres.into_iter().map(|g| Genre::new(g.id, g.name)).collect()
}

fn countries(countries: Vec<TmdbCountry>) -> Vec<String> {
    countries.into_iter().map(|c| c.iso_3166_1).collect()
}

fn episode(episode: TmdbEpisode) -> Episode {
    Episode {
        season_number: episode.season_number,
        episode_number: episode.episode_number,
        air_date: parse_date(episode.air_date.as_deref()),
        name: episode.name,
    }
}

impl From<TmdbMovieDetails> for Metadata {
    fn from(movie: TmdbMovieDetails) -> Self {
        Metadata {
            tmdb_id: movie.id,
            common: CommonMetadata {
                title: movie.title,
                original_title: movie.original_title,
                overview: movie.overview,
                status: movie.status.as_deref().and_then(MediaStatus::from_tmdb),
                genres: genres(movie.genres),
                production_countries: countries(movie.production_countries),
                popularity: movie.popularity,
                vote_average: movie.vote_average,
                vote_count: movie.vote_count,
                poster_path: movie.poster_path,
                imdb_id: movie.imdb_id.filter(|id| !id.is_empty()),
            },
            details: Details::Movie(MovieDetails {
                release_date: parse_date(movie.release_date.as_deref()),
                runtime: movie.runtime,
                budget: movie.budget,
                revenue: movie.revenue,
                is_adult: movie.adult,
            }),
        }
    }
}

impl From<TmdbTvDetails> for Metadata {
    fn from(show: TmdbTvDetails) -> Self {
        let seasons = show
            .seasons
            .into_iter()
            .map(|s| Season {
                season_number: s.season_number,
                episode_count: s.episode_count,
                air_date: parse_date(s.air_date.as_deref()),
                name: s.name,
            })
            .collect();

        Metadata {
            tmdb_id: show.id,
            common: CommonMetadata {
                title: show.name,
                original_title: show.original_name,
                overview: show.overview,
                status: show.status.as_deref().and_then(MediaStatus::from_tmdb),
                genres: genres(show.genres),
                production_countries: countries(show.production_countries),
                popularity: show.popularity,
                vote_average: show.vote_average,
                vote_count: show.vote_count,
                poster_path: show.poster_path,
                imdb_id: None,
            },
            details: Details::Show(ShowDetails {
                first_air_date: parse_date(show.first_air_date.as_deref()),
                seasons,
                number_of_seasons: show.number_of_seasons,
                number_of_episodes: show.number_of_episodes,
                last_episode_to_air: show.last_episode_to_air.map(episode),
                next_episode_to_air: show.next_episode_to_air.map(episode),
                show_type: show.show_type.as_deref().and_then(ShowType::from_tmdb),
                networks: show.networks.into_iter().map(|n| n.name).collect(),
            }),
        }
    }
}

/// The request URL carries the API key, so it is stripped from transport errors.
fn transport_error(e: reqwest::Error) -> Error {
    Error::ExternalApi(e.without_url().to_string())
}

/// Shrinks `[since, until]` to the longest window the change feed accepts.
pub fn clamp_change_window(since: DateTime<Utc>, until: DateTime<Utc>) -> DateTime<Utc> {
    since.max(until - max_change_window())
}

impl TmdbService {
    pub fn new(api_key: String, language: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: RwLock::new(api_key),
            language,
            base_url: TMDB_BASE_URL.to_string(),
        })
    }

    /// Points the client at another API root, e.g. a local mirror.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn from_config(config: &Config, api_key: String) -> Result<Self> {
        Self::new(
            api_key,
            config.tmdb_language.clone(),
            config.request_timeout(),
        )
    }

    /// Update the API key at runtime (e.g., when settings are changed)
    pub fn set_api_key(&self, api_key: String) {
        if let Ok(mut key) = self.api_key.write() {
            *key = api_key;
        }
    }

    fn get_api_key(&self) -> Result<String> {
        let key = self.api_key.read().map(|k| k.clone()).unwrap_or_default();
        if key.is_empty() {
            return Err(Error::Configuration(
                "TMDB API key is not configured".to_string(),
            ));
        }
        Ok(key)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &str) -> Result<T> {
        let url = format!(
            "{}{}?api_key={}&language={}{}",
            self.base_url,
            path,
            self.get_api_key()?,
            urlencoding::encode(&self.language),
            params
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Error::ExternalApi(format!(
                "TMDB API error on {}: {}",
                path,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("TMDB response for {path}: {}", e.without_url())))
    }

    pub async fn search_movies(&self, query: &str, year: Option<i32>) -> Result<Vec<TmdbMovie>> {
        let mut params = format!("&query={}", urlencoding::encode(query));
        if let Some(y) = year {
            params.push_str(&format!("&year={}", y));
        }

        let result: TmdbSearchResult<TmdbMovie> = self.get_json("/search/movie", &params).await?;
        Ok(result.results)
    }

    pub async fn search_tv(&self, query: &str) -> Result<Vec<TmdbTvShow>> {
        let params = format!("&query={}", urlencoding::encode(query));
        let result: TmdbSearchResult<TmdbTvShow> = self.get_json("/search/tv", &params).await?;
        Ok(result.results)
    }

    pub async fn get_movie_details(&self, tmdb_id: i64) -> Result<TmdbMovieDetails> {
        self.get_json(&format!("/movie/{}", tmdb_id), "").await
    }

    pub async fn get_tv_details(&self, tmdb_id: i64) -> Result<TmdbTvDetails> {
        self.get_json(&format!("/tv/{}", tmdb_id), "").await
    }

    async fn changes(
        &self,
        kind: MediaKind,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<i64>> {
        let path = match kind {
            MediaKind::Movie => "/movie/changes",
            MediaKind::Show => "/tv/changes",
        };

        let mut ids = Vec::new();
        let mut page = 1;
        loop {
            let params = format!(
                "&start_date={}&end_date={}&page={}",
                since.format("%Y-%m-%d"),
                until.format("%Y-%m-%d"),
                page
            );
            let result: TmdbChangesPage = self.get_json(path, &params).await?;
            ids.extend(result.results.into_iter().map(|c| c.id));

            if result.page >= result.total_pages {
                break;
            }
            page = result.page + 1;
        }

        debug!(kind = %kind, count = ids.len(), "fetched changed ids");
        Ok(ids)
    }

    /// Get full poster URL
    pub fn poster_url(path: &str, size: &str) -> String {
        format!("{}/{}{}", TMDB_IMAGE_URL, size, path)
    }
}

#[async_trait]
impl MetadataSource for TmdbService {
    fn name(&self) -> &str {
        "tmdb"
    }

    async fn changed_ids(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<HashSet<ExternalId>> {
        let since = clamp_change_window(since, until);

        let movies = self.changes(MediaKind::Movie, since, until).await?;
        let shows = self.changes(MediaKind::Show, since, until).await?;

        Ok(movies
            .into_iter()
            .map(ExternalId::movie)
            .chain(shows.into_iter().map(ExternalId::show))
            .collect())
    }

    async fn fetch_metadata(&self, id: ExternalId) -> Result<Metadata> {
        match id.kind {
            MediaKind::Movie => self.get_movie_details(id.tmdb_id).await.map(Metadata::from),
            MediaKind::Show => self.get_tv_details(id.tmdb_id).await.map(Metadata::from),
        }
    }

    async fn fetch_thumbnail(&self, poster_path: &str) -> Result<Vec<u8>> {
        let url = Self::poster_url(poster_path, THUMBNAIL_SIZE);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Error::ExternalApi(format!(
                "TMDB image error: {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio_test::assert_err;

    #[tokio::test]
    async fn test_transport_error_does_not_leak_api_key() {
        let tmdb = TmdbService::new(
            "SECRET123".to_string(),
            "en-US".to_string(),
            Duration::from_secs(2),
        )
        .unwrap()
        .with_base_url("http://127.0.0.1:1/3");

        let err = assert_err!(tmdb.get_movie_details(550).await);
        assert!(matches!(err, Error::ExternalApi(_)));
        assert!(!err.to_string().contains("SECRET123"), "{err}");

        let err = assert_err!(
            tmdb.changed_ids(Utc::now() - chrono::Duration::days(1), Utc::now())
                .await
        );
        assert!(!err.to_string().contains("SECRET123"), "{err}");
    }

    const MOVIE_JSON: &str = r#"{
        "id": 550,
        "title": "Fight Club",
        "original_title": "Fight Club",
        "overview": "A ticking-time-bomb insomniac...",
        "poster_path": "/pB8BM7pdSp6B6Ih7QZ4DrQ3PmJK.jpg",
        "release_date": "1999-10-15",
        "status": "Released",
        "runtime": 139,
        "budget": 63000000,
        "revenue": 100853753,
        "adult": false,
        "imdb_id": "tt0137523",
        "popularity": 61.4,
        "vote_average": 8.4,
        "vote_count": 26280,
        "genres": [{"id": 18, "name": "Drama"}],
        "production_countries": [{"iso_3166_1": "US", "name": "United States of America"}]
    }"#;

    const TV_JSON: &str = r#"{
        "id": 1399,
        "name": "Game of Thrones",
        "first_air_date": "2011-04-17",
        "status": "Ended",
        "type": "Scripted",
        "number_of_seasons": 8,
        "number_of_episodes": 73,
        "seasons": [
            {"season_number": 0, "episode_count": 14, "name": "Specials", "air_date": "2010-12-05"},
            {"season_number": 1, "episode_count": 10, "name": "Season 1", "air_date": "2011-04-17"},
            {"season_number": 8, "episode_count": 6, "name": "Season 8", "air_date": ""}
        ],
        "last_episode_to_air": {"season_number": 8, "episode_number": 6, "name": "The Iron Throne", "air_date": "2019-05-19"},
        "next_episode_to_air": null,
        "networks": [{"id": 49, "name": "HBO"}],
        "genres": [{"id": 10765, "name": "Sci-Fi & Fantasy"}]
    }"#;

    #[test]
    fn test_movie_details_convert_to_metadata() {
        let details: TmdbMovieDetails = serde_json::from_str(MOVIE_JSON).unwrap();
        let metadata = Metadata::from(details);

        assert_eq!(metadata.external_id(), ExternalId::movie(550));
        assert_eq!(metadata.common.title, "Fight Club");
        assert_eq!(metadata.common.status, Some(MediaStatus::Released));
        assert_eq!(metadata.common.genres, vec![Genre::new(18, "Drama")]);
        assert_eq!(metadata.common.production_countries, vec!["US".to_string()]);
        assert_eq!(metadata.details.year(), Some(1999));
        match metadata.details {
            Details::Movie(movie) => {
                assert_eq!(movie.runtime, Some(139));
                assert!(!movie.is_adult);
            }
            other => panic!("expected movie details, got {:?}", other),
        }
    }

    #[test]
    fn test_tv_details_convert_to_metadata() {
        let details: TmdbTvDetails = serde_json::from_str(TV_JSON).unwrap();
        let metadata = Metadata::from(details);

        assert_eq!(metadata.external_id(), ExternalId::show(1399));
        assert_eq!(metadata.common.status, Some(MediaStatus::Ended));
        let Details::Show(show) = metadata.details else {
            panic!("expected show details");
        };
        assert_eq!(show.show_type, Some(ShowType::Scripted));
        assert_eq!(show.season_count(), Some(8));
        assert_eq!(show.latest_aired_season(), Some(8));
        assert_eq!(show.seasons[2].air_date, None);
        assert_eq!(show.networks, vec!["HBO".to_string()]);
        assert_eq!(
            show.last_episode_to_air.map(|e| (e.season_number, e.episode_number)),
            Some((8, 6))
        );
        assert!(show.next_episode_to_air.is_none());
    }

    #[test]
    fn test_unknown_status_and_type_decode_as_none() {
        let details: TmdbTvDetails = serde_json::from_str(
            r#"{"id": 1, "name": "X", "status": "Something New", "type": "Hologram"}"#,
        )
        .unwrap();
        let metadata = Metadata::from(details);
        assert_eq!(metadata.common.status, None);
        let Details::Show(show) = metadata.details else {
            panic!("expected show details");
        };
        assert_eq!(show.show_type, None);
        assert_eq!(show.season_count(), None);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(Some("2019-05-19")),
            NaiveDate::from_ymd_opt(2019, 5, 19)
        );
        assert_eq!(parse_date(Some("")), None);
        assert_eq!(parse_date(Some("2019")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn test_change_window_is_clamped() {
        let until = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        let long_ago = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let recent = Utc.with_ymd_and_hms(2024, 6, 25, 0, 0, 0).unwrap();

        assert_eq!(clamp_change_window(long_ago, until), until - max_change_window());
        assert_eq!(clamp_change_window(recent, until), recent);
    }

    #[test]
    fn test_poster_url() {
        assert_eq!(
            TmdbService::poster_url("/abc.jpg", "w342"),
            "https://image.tmdb.org/t/p/w342/abc.jpg"
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_is_a_configuration_error() {
        let service =
            TmdbService::new(String::new(), "en-US".into(), Duration::from_secs(5)).unwrap();
        let result = service.fetch_metadata(ExternalId::movie(550)).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
