//! Wire types shared by the inbound API and the upstream client.
//!
//! Field names follow the upstream payloads so responses can be passed through
//! to clients unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

pub const DEFAULT_TYPE: &str = "movie";

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Search parameters as accepted from clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Search query must be between 1 and 100 characters"
    ))]
    pub query: String,
    #[validate(range(min = 1, message = "Page must be greater than 0"))]
    pub page: Option<u32>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub year: Option<u16>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn page_or_default(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn type_or_default(&self) -> &str {
        match self.kind.as_deref() {
            Some(kind) if !kind.trim().is_empty() => kind,
            _ => DEFAULT_TYPE,
        }
    }
}

/// Query string form of [`SearchRequest`] (`?q=&page=&type=&year=`).
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub page: Option<u32>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub year: Option<u16>,
}

impl From<SearchQuery> for SearchRequest {
    fn from(query: SearchQuery) -> Self {
        Self {
            query: query.q,
            page: query.page,
            kind: query.kind,
            year: query.year,
        }
    }
}

/// Fully resolved upstream search call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchParams {
    pub title: String,
    pub page: u32,
    pub kind: Option<String>,
    pub year: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MovieSummary {
    pub title: Option<String>,
    pub year: Option<String>,
    #[serde(rename = "imdbID")]
    pub imdb_id: Option<String>,
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    pub poster: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "Search", default, deserialize_with = "null_as_empty")]
    pub search: Vec<MovieSummary>,
    #[serde(rename = "totalResults", default)]
    pub total_results: Option<String>,
    #[serde(rename = "Response", default)]
    pub response: String,
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn is_success(&self) -> bool {
        self.response == "True"
    }

    pub fn total_results_as_u64(&self) -> u64 {
        self.total_results
            .as_deref()
            .and_then(|total| total.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Rating {
    pub source: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MovieDetails {
    pub title: Option<String>,
    pub year: Option<String>,
    pub rated: Option<String>,
    pub released: Option<String>,
    pub runtime: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub writer: Option<String>,
    pub actors: Option<String>,
    pub plot: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub awards: Option<String>,
    pub poster: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ratings: Vec<Rating>,
    pub metascore: Option<String>,
    #[serde(rename = "imdbRating")]
    pub imdb_rating: Option<String>,
    #[serde(rename = "imdbVotes")]
    pub imdb_votes: Option<String>,
    #[serde(rename = "imdbID")]
    pub imdb_id: Option<String>,
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    #[serde(rename = "DVD")]
    pub dvd: Option<String>,
    pub box_office: Option<String>,
    pub production: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MovieDetails {
    pub fn is_success(&self) -> bool {
        self.response == "True"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_response_from_upstream_payload() {
        let response: SearchResponse = serde_json::from_value(json!({
            "Search": [{
                "Title": "Batman Begins",
                "Year": "2005",
                "imdbID": "tt0372784",
                "Type": "movie",
                "Poster": "https://example.com/poster.jpg"
            }],
            "totalResults": "1",
            "Response": "True"
        }))
        .unwrap();

        assert!(response.is_success());
        assert_eq!(response.total_results_as_u64(), 1);
        assert_eq!(response.search[0].imdb_id.as_deref(), Some("tt0372784"));
        assert_eq!(response.search[0].kind.as_deref(), Some("movie"));
    }

    #[test]
    fn test_missing_or_null_search_list_becomes_empty() {
        let missing: SearchResponse =
            serde_json::from_value(json!({"Response": "False", "Error": "Movie not found!"}))
                .unwrap();
        assert!(!missing.is_success());
        assert!(missing.search.is_empty());
        assert_eq!(missing.total_results_as_u64(), 0);

        let null: SearchResponse =
            serde_json::from_value(json!({"Search": null, "Response": "False"})).unwrap();
        assert!(null.search.is_empty());
    }

    #[test]
    fn test_movie_details_field_names() {
        let details: MovieDetails = serde_json::from_value(json!({
            "Title": "Batman Begins",
            "Year": "2005",
            "imdbRating": "8.2",
            "imdbID": "tt0372784",
            "DVD": "18 Oct 2005",
            "BoxOffice": "$206,863,479",
            "Poster": "N/A",
            "Ratings": [{"Source": "Internet Movie Database", "Value": "8.2/10"}],
            "Response": "True"
        }))
        .unwrap();

        assert!(details.is_success());
        assert_eq!(details.poster.as_deref(), Some("N/A"));
        assert_eq!(details.imdb_rating.as_deref(), Some("8.2"));
        assert_eq!(details.dvd.as_deref(), Some("18 Oct 2005"));
        assert_eq!(details.box_office.as_deref(), Some("$206,863,479"));
        assert_eq!(details.ratings.len(), 1);

        let out = serde_json::to_value(&details).unwrap();
        assert_eq!(out["imdbID"], "tt0372784");
        assert!(out.get("Error").is_none());
    }

    #[test]
    fn test_search_request_defaults() {
        let request: SearchRequest = serde_json::from_value(json!({"query": "Batman"})).unwrap();
        assert_eq!(request.page_or_default(), 1);
        assert_eq!(request.type_or_default(), "movie");

        let request: SearchRequest =
            serde_json::from_value(json!({"query": "Batman", "type": "series", "page": 3}))
                .unwrap();
        assert_eq!(request.page_or_default(), 3);
        assert_eq!(request.type_or_default(), "series");
    }
}
