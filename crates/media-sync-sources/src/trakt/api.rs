use chrono::{DateTime, Utc};
use media_sync_models::{
    ActivityMarker, BatchResponse, Facet, LastActivities, LibraryKind, MediaIds, MediaKind, MediaRecord, ShowGroup,
    SyncBatch,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::SourceError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraktIds {
    pub trakt: Option<u64>,
    pub imdb: Option<String>,
    pub tmdb: Option<u32>,
    pub tvdb: Option<u32>,
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TraktMovie {
    title: Option<String>,
    year: Option<u32>,
    ids: TraktIds,
}

#[derive(Debug, Deserialize)]
struct TraktShow {
    title: Option<String>,
    year: Option<u32>,
    ids: TraktIds,
}

#[derive(Debug, Deserialize)]
struct TraktEpisodeRef {
    season: Option<u32>,
    number: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WatchedMovie {
    plays: u32,
    last_watched_at: Option<DateTime<Utc>>,
    movie: TraktMovie,
}

#[derive(Debug, Deserialize)]
struct WatchedShow {
    show: TraktShow,
    #[serde(default)]
    seasons: Vec<SeasonEntry>,
}

#[derive(Debug, Deserialize)]
struct SeasonEntry {
    number: u32,
    #[serde(default)]
    episodes: Vec<EpisodeEntry>,
}

#[derive(Debug, Deserialize)]
struct EpisodeEntry {
    number: u32,
    #[serde(default)]
    plays: u32,
    last_watched_at: Option<DateTime<Utc>>,
    collected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CollectedMovie {
    collected_at: Option<DateTime<Utc>>,
    movie: TraktMovie,
}

#[derive(Debug, Deserialize)]
struct RatedItem {
    rated_at: Option<DateTime<Utc>>,
    rating: u8,
    movie: Option<TraktMovie>,
    show: Option<TraktShow>,
    episode: Option<TraktEpisodeRef>,
}

#[derive(Debug, Deserialize)]
struct ListedItem {
    listed_at: Option<DateTime<Utc>>,
    movie: Option<TraktMovie>,
    show: Option<TraktShow>,
}

#[derive(Debug, Default, Deserialize)]
struct ActivityBlock {
    watched_at: Option<String>,
    collected_at: Option<String>,
    rated_at: Option<String>,
    watchlisted_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LastActivitiesResponse {
    #[serde(default)]
    movies: ActivityBlock,
    #[serde(default)]
    episodes: ActivityBlock,
    #[serde(default)]
    shows: ActivityBlock,
}

#[derive(Debug, Default, Deserialize)]
struct CountBlock {
    #[serde(default)]
    movies: usize,
    #[serde(default)]
    shows: usize,
    #[serde(default)]
    episodes: usize,
}

impl CountBlock {
    fn total(&self) -> usize {
        self.movies + self.shows + self.episodes
    }
}

#[derive(Debug, Default, Deserialize)]
struct NotFoundBlock {
    #[serde(default)]
    movies: Vec<Value>,
    #[serde(default)]
    shows: Vec<Value>,
    #[serde(default)]
    episodes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct MutationResponse {
    #[serde(default)]
    added: CountBlock,
    #[serde(default)]
    deleted: CountBlock,
    #[serde(default)]
    existing: CountBlock,
    #[serde(default)]
    not_found: NotFoundBlock,
}

/// Trakt sometimes returns IMDB IDs with slashes
fn remove_slashes(s: &str) -> String {
    s.replace('/', "")
}

fn to_media_ids(ids: &TraktIds) -> MediaIds {
    MediaIds {
        trakt: ids.trakt,
        imdb: ids.imdb.as_deref().map(remove_slashes),
        tmdb: ids.tmdb,
        tvdb: ids.tvdb,
    }
}

fn movie_record(movie: &TraktMovie) -> MediaRecord {
    MediaRecord::movie(movie.title.clone().unwrap_or_default(), movie.year).with_ids(to_media_ids(&movie.ids))
}

fn show_record(show: &TraktShow) -> MediaRecord {
    MediaRecord::show(show.title.clone().unwrap_or_default(), show.year).with_ids(to_media_ids(&show.ids))
}

fn episode_record(show: &TraktShow, season: u32, number: u32) -> MediaRecord {
    MediaRecord::episode(show.title.clone().unwrap_or_default(), show.year, season, number)
        .with_ids(to_media_ids(&show.ids))
}

fn authorized(request: RequestBuilder, access_token: &str, client_id: &str) -> RequestBuilder {
    request
        .header("Authorization", format!("Bearer {}", access_token))
        .header("trakt-api-version", "2")
        .header("trakt-api-key", client_id)
        .header("Accept", "application/json")
        .header("Content-Type", "application/json")
}

async fn check_status(response: Response, what: &str) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    let message = format!("{}: {} - {}", what, status, error_text);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::NotAuthenticated(message),
        StatusCode::TOO_MANY_REQUESTS => SourceError::Unavailable(message),
        s if s.is_server_error() => SourceError::Unavailable(message),
        _ => SourceError::InvalidData(message),
    })
}

async fn get_json<T: DeserializeOwned>(
    client: &Client,
    api_url: &str,
    path: &str,
    access_token: &str,
    client_id: &str,
) -> Result<T, SourceError> {
    let url = format!("{}{}", api_url, path);
    debug!("GET {}", url);
    let response = authorized(client.get(&url), access_token, client_id).send().await?;
    let response = check_status(response, path).await?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| SourceError::InvalidData(format!("{}: {}", path, e)))
}

fn marker(value: &Option<String>) -> Option<ActivityMarker> {
    value.as_ref().map(ActivityMarker::new)
}

/// Fetch last activity timestamps and map them onto facet markers
pub async fn get_last_activities(
    client: &Client,
    api_url: &str,
    access_token: &str,
    client_id: &str,
) -> Result<LastActivities, SourceError> {
    let response: LastActivitiesResponse =
        get_json(client, api_url, "/sync/last_activities", access_token, client_id).await?;
    Ok(activities_from_response(&response))
}

fn activities_from_response(response: &LastActivitiesResponse) -> LastActivities {
    let mut activities = LastActivities::new();
    let mut put = |kind: LibraryKind, facet: Facet, value: Option<ActivityMarker>| {
        if let Some(value) = value {
            activities.insert(kind, facet, value);
        }
    };

    put(LibraryKind::Movies, Facet::Watched, marker(&response.movies.watched_at));
    put(LibraryKind::Movies, Facet::Collection, marker(&response.movies.collected_at));
    put(LibraryKind::Movies, Facet::Ratings, marker(&response.movies.rated_at));
    put(LibraryKind::Movies, Facet::Watchlist, marker(&response.movies.watchlisted_at));
    put(LibraryKind::Shows, Facet::Watched, marker(&response.episodes.watched_at));
    put(LibraryKind::Shows, Facet::Collection, marker(&response.episodes.collected_at));
    put(LibraryKind::Shows, Facet::Watchlist, marker(&response.shows.watchlisted_at));

    // Show ratings cover show-level and episode-level records
    let show_ratings = match (&response.shows.rated_at, &response.episodes.rated_at) {
        (None, None) => None,
        (shows, episodes) => Some(ActivityMarker::new(format!(
            "{}|{}",
            shows.as_deref().unwrap_or(""),
            episodes.as_deref().unwrap_or("")
        ))),
    };
    put(LibraryKind::Shows, Facet::Ratings, show_ratings);

    activities
}

/// Fetch one facet snapshot
pub async fn get_facet_snapshot(
    client: &Client,
    api_url: &str,
    access_token: &str,
    client_id: &str,
    kind: LibraryKind,
    facet: Facet,
) -> Result<Vec<MediaRecord>, SourceError> {
    match (kind, facet) {
        (LibraryKind::Movies, Facet::Watched) => {
            let items: Vec<WatchedMovie> = get_json(client, api_url, "/sync/watched/movies", access_token, client_id).await?;
            Ok(items
                .iter()
                .map(|item| {
                    let mut record = movie_record(&item.movie).with_plays(item.plays);
                    record.watched_at = item.last_watched_at;
                    record
                })
                .collect())
        }
        (LibraryKind::Shows, Facet::Watched) => {
            let items: Vec<WatchedShow> = get_json(client, api_url, "/sync/watched/shows", access_token, client_id).await?;
            Ok(flatten_shows(&items, |episode, record| {
                record.plays = episode.plays;
                record.watched = episode.plays > 0;
                record.watched_at = episode.last_watched_at;
            }))
        }
        (LibraryKind::Movies, Facet::Collection) => {
            let items: Vec<CollectedMovie> =
                get_json(client, api_url, "/sync/collection/movies", access_token, client_id).await?;
            Ok(items
                .iter()
                .map(|item| {
                    let mut record = movie_record(&item.movie).collected();
                    record.collected_at = item.collected_at;
                    record
                })
                .collect())
        }
        (LibraryKind::Shows, Facet::Collection) => {
            let items: Vec<WatchedShow> =
                get_json(client, api_url, "/sync/collection/shows", access_token, client_id).await?;
            Ok(flatten_shows(&items, |episode, record| {
                record.collected = true;
                record.collected_at = episode.collected_at;
            }))
        }
        (LibraryKind::Movies, Facet::Ratings) => {
            let items: Vec<RatedItem> = get_json(client, api_url, "/sync/ratings/movies", access_token, client_id).await?;
            Ok(rated_records(&items))
        }
        (LibraryKind::Shows, Facet::Ratings) => {
            let mut items: Vec<RatedItem> =
                get_json(client, api_url, "/sync/ratings/shows", access_token, client_id).await?;
            let episodes: Vec<RatedItem> =
                get_json(client, api_url, "/sync/ratings/episodes", access_token, client_id).await?;
            items.extend(episodes);
            Ok(rated_records(&items))
        }
        (LibraryKind::Movies, Facet::Watchlist) => {
            let items: Vec<ListedItem> =
                get_json(client, api_url, "/sync/watchlist/movies", access_token, client_id).await?;
            Ok(listed_records(&items))
        }
        (LibraryKind::Shows, Facet::Watchlist) => {
            let items: Vec<ListedItem> =
                get_json(client, api_url, "/sync/watchlist/shows", access_token, client_id).await?;
            Ok(listed_records(&items))
        }
    }
}

fn flatten_shows(shows: &[WatchedShow], fill: impl Fn(&EpisodeEntry, &mut MediaRecord)) -> Vec<MediaRecord> {
    let mut records = Vec::new();
    for item in shows {
        for season in &item.seasons {
            for episode in &season.episodes {
                let mut record = episode_record(&item.show, season.number, episode.number);
                fill(episode, &mut record);
                records.push(record);
            }
        }
    }
    records
}

fn rated_records(items: &[RatedItem]) -> Vec<MediaRecord> {
    let mut records = Vec::new();
    for item in items {
        let record = match (&item.movie, &item.show, &item.episode) {
            (Some(movie), _, _) => movie_record(movie),
            (None, Some(show), Some(episode)) => match (episode.season, episode.number) {
                (Some(season), Some(number)) => episode_record(show, season, number),
                _ => {
                    warn!("Skipping rated episode without season/number for {:?}", show.title);
                    continue;
                }
            },
            (None, Some(show), None) => show_record(show),
            _ => continue,
        };
        records.push(record.with_rating(item.rating, item.rated_at));
    }
    records
}

fn listed_records(items: &[ListedItem]) -> Vec<MediaRecord> {
    items
        .iter()
        .filter_map(|item| {
            let mut record = match (&item.movie, &item.show) {
                (Some(movie), _) => movie_record(movie),
                (None, Some(show)) => show_record(show),
                _ => return None,
            };
            record.listed_at = item.listed_at;
            Some(record)
        })
        .collect()
}

fn ids_json(ids: &MediaIds) -> Value {
    let mut ids_obj = Map::new();
    if let Some(trakt) = ids.primary() {
        ids_obj.insert("trakt".to_string(), Value::Number(trakt.into()));
    }
    if let Some(imdb) = ids.secondary() {
        ids_obj.insert("imdb".to_string(), Value::String(imdb.to_string()));
    }
    if let Some(tmdb) = ids.tmdb {
        ids_obj.insert("tmdb".to_string(), Value::Number(tmdb.into()));
    }
    if let Some(tvdb) = ids.tvdb {
        ids_obj.insert("tvdb".to_string(), Value::Number(tvdb.into()));
    }
    Value::Object(ids_obj)
}

/// Per-item fields for the facet being pushed
fn facet_fields(record: &MediaRecord, facet: Facet, obj: &mut Map<String, Value>) {
    match facet {
        Facet::Watched => {
            if let Some(ts) = record.watched_at {
                obj.insert("watched_at".to_string(), Value::String(ts.to_rfc3339()));
            }
        }
        Facet::Collection => {
            if let Some(ts) = record.collected_at {
                obj.insert("collected_at".to_string(), Value::String(ts.to_rfc3339()));
            }
        }
        Facet::Ratings => {
            if let Some(rating) = record.rating {
                obj.insert("rating".to_string(), Value::Number(rating.into()));
            }
            if let Some(ts) = record.rated_at {
                obj.insert("rated_at".to_string(), Value::String(ts.to_rfc3339()));
            }
        }
        Facet::Watchlist => {}
    }
}

fn item_json(record: &MediaRecord, facet: Facet) -> Value {
    let mut obj = Map::new();
    if !record.title.is_empty() {
        obj.insert("title".to_string(), Value::String(record.title.clone()));
    }
    if let Some(year) = record.year {
        obj.insert("year".to_string(), Value::Number(year.into()));
    }
    obj.insert("ids".to_string(), ids_json(&record.ids));
    facet_fields(record, facet, &mut obj);
    Value::Object(obj)
}

fn show_group_json(group: &ShowGroup, facet: Facet) -> Value {
    let seasons: Vec<Value> = group
        .seasons
        .iter()
        .map(|(number, episodes)| {
            let episodes: Vec<Value> = episodes
                .iter()
                .map(|episode| {
                    let mut obj = Map::new();
                    obj.insert("number".to_string(), json!(episode.episode.unwrap_or_default()));
                    facet_fields(episode, facet, &mut obj);
                    Value::Object(obj)
                })
                .collect();
            json!({ "number": number, "episodes": episodes })
        })
        .collect();

    let mut obj = Map::new();
    obj.insert("title".to_string(), Value::String(group.title.clone()));
    if let Some(year) = group.year {
        obj.insert("year".to_string(), Value::Number(year.into()));
    }
    obj.insert("ids".to_string(), ids_json(&group.ids));
    obj.insert("seasons".to_string(), Value::Array(seasons));
    Value::Object(obj)
}

/// Build the hierarchical payload Trakt expects for a batch
pub fn batch_payload(batch: &SyncBatch, facet: Facet) -> Value {
    match batch {
        SyncBatch::Items(items) => {
            let mut movies = Vec::new();
            let mut shows = Vec::new();
            for record in items {
                match record.kind {
                    MediaKind::Movie => movies.push(item_json(record, facet)),
                    _ => shows.push(item_json(record, facet)),
                }
            }
            json!({ "movies": movies, "shows": shows })
        }
        SyncBatch::Show(group) => json!({ "movies": [], "shows": [show_group_json(group, facet)] }),
    }
}

fn facet_endpoint(facet: Facet) -> &'static str {
    match facet {
        Facet::Watched => "/sync/history",
        Facet::Collection => "/sync/collection",
        Facet::Ratings => "/sync/ratings",
        Facet::Watchlist => "/sync/watchlist",
    }
}

/// POST a batch to the facet endpoint (or its `/remove` variant)
pub async fn post_batch(
    client: &Client,
    api_url: &str,
    access_token: &str,
    client_id: &str,
    facet: Facet,
    batch: &SyncBatch,
    remove: bool,
) -> Result<BatchResponse, SourceError> {
    let path = if remove {
        format!("{}/remove", facet_endpoint(facet))
    } else {
        facet_endpoint(facet).to_string()
    };
    let payload = batch_payload(batch, facet);
    let url = format!("{}{}", api_url, path);
    debug!("POST {} ({})", url, batch.label());

    let response = authorized(client.post(&url), access_token, client_id)
        .json(&payload)
        .send()
        .await?;
    let response = check_status(response, &path).await?;
    let body = response.text().await?;
    let parsed: MutationResponse =
        serde_json::from_str(&body).map_err(|e| SourceError::InvalidData(format!("{}: {}", path, e)))?;
    Ok(to_batch_response(&parsed, remove))
}

fn to_batch_response(parsed: &MutationResponse, remove: bool) -> BatchResponse {
    let not_found =
        parsed.not_found.movies.len() + parsed.not_found.shows.len() + parsed.not_found.episodes.len();
    BatchResponse {
        added: if remove { parsed.deleted.total() } else { parsed.added.total() },
        existing: parsed.existing.total(),
        skipped: not_found,
        errors: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_activities_mapping() {
        let response: LastActivitiesResponse = serde_json::from_str(
            r#"{
                "all": "2024-01-02T00:00:00.000Z",
                "movies": {"watched_at": "2024-01-01T10:00:00.000Z", "collected_at": "2023-12-01T00:00:00.000Z"},
                "episodes": {"watched_at": "2024-01-02T00:00:00.000Z", "rated_at": "2023-06-01T00:00:00.000Z"},
                "shows": {"watchlisted_at": "2023-05-01T00:00:00.000Z"}
            }"#,
        )
        .unwrap();
        let activities = activities_from_response(&response);
        let get = |kind, facet| activities.get(media_sync_models::FacetKey::new(kind, facet)).map(|m| m.to_string());

        assert_eq!(get(LibraryKind::Movies, Facet::Watched).as_deref(), Some("2024-01-01T10:00:00.000Z"));
        assert_eq!(get(LibraryKind::Movies, Facet::Ratings), None);
        assert_eq!(get(LibraryKind::Shows, Facet::Watched).as_deref(), Some("2024-01-02T00:00:00.000Z"));
        assert_eq!(get(LibraryKind::Shows, Facet::Ratings).as_deref(), Some("|2023-06-01T00:00:00.000Z"));
    }

    #[test]
    fn test_flatten_watched_shows() {
        let shows: Vec<WatchedShow> = serde_json::from_str(
            r#"[{
                "show": {"title": "Lost", "year": 2004, "ids": {"trakt": 100, "imdb": "tt0411008"}},
                "seasons": [{"number": 1, "episodes": [{"number": 1, "plays": 2}, {"number": 2, "plays": 1}]}]
            }]"#,
        )
        .unwrap();
        let records = flatten_shows(&shows, |episode, record| {
            record.plays = episode.plays;
            record.watched = episode.plays > 0;
        });
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ids.primary(), Some(100));
        assert_eq!(records[0].season, Some(1));
        assert_eq!(records[1].episode, Some(2));
        assert_eq!(records[0].plays, 2);
    }

    #[test]
    fn test_show_batch_payload_is_hierarchical() {
        let mut seasons = std::collections::BTreeMap::new();
        seasons.insert(
            1,
            vec![MediaRecord::episode("Lost", Some(2004), 1, 1), MediaRecord::episode("Lost", Some(2004), 1, 2)],
        );
        let group = ShowGroup {
            ids: MediaIds::new().with_trakt(100),
            title: "Lost".to_string(),
            year: Some(2004),
            seasons,
        };
        let payload = batch_payload(&SyncBatch::Show(group), Facet::Watched);
        assert_eq!(payload["shows"][0]["ids"]["trakt"], 100);
        assert_eq!(payload["shows"][0]["seasons"][0]["number"], 1);
        assert_eq!(payload["shows"][0]["seasons"][0]["episodes"][1]["number"], 2);
    }

    #[test]
    fn test_rating_payload_fields() {
        let movie = MediaRecord::movie("Heat", Some(1995))
            .with_ids(MediaIds::new().with_imdb("tt0113277"))
            .with_rating(9, None);
        let payload = batch_payload(&SyncBatch::Items(vec![movie]), Facet::Ratings);
        assert_eq!(payload["movies"][0]["rating"], 9);
        assert_eq!(payload["movies"][0]["ids"]["imdb"], "tt0113277");
    }

    #[test]
    fn test_mutation_response_counts() {
        let parsed: MutationResponse = serde_json::from_str(
            r#"{"added": {"movies": 2, "episodes": 3}, "existing": {"movies": 1},
                "not_found": {"movies": [{"ids": {"imdb": "tt0000001"}}]}}"#,
        )
        .unwrap();
        let response = to_batch_response(&parsed, false);
        assert_eq!(response.added, 5);
        assert_eq!(response.existing, 1);
        assert_eq!(response.skipped, 1);
    }
}
