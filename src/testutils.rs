//! Scripted [`MovieApi`] for exercising the gateway without a network.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{MovieDetails, MovieSummary, SearchParams, SearchResponse};
use crate::upstream::{MovieApi, UpstreamError};

/// Replays fixed results and counts how often each operation ran.
#[derive(Default)]
pub struct ScriptedMovieApi {
    search: Mutex<Option<Result<SearchResponse, UpstreamError>>>,
    details: Mutex<Option<Result<MovieDetails, UpstreamError>>>,
    last_search: Mutex<Option<SearchParams>>,
    search_calls: AtomicUsize,
    details_calls: AtomicUsize,
}

impl ScriptedMovieApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(self, result: Result<SearchResponse, UpstreamError>) -> Self {
        self.set_search(result);
        self
    }

    pub fn with_details(self, result: Result<MovieDetails, UpstreamError>) -> Self {
        self.set_details(result);
        self
    }

    pub fn set_search(&self, result: Result<SearchResponse, UpstreamError>) {
        *self.search.lock().unwrap_or_else(|p| p.into_inner()) = Some(result);
    }

    pub fn set_details(&self, result: Result<MovieDetails, UpstreamError>) {
        *self.details.lock().unwrap_or_else(|p| p.into_inner()) = Some(result);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn details_calls(&self) -> usize {
        self.details_calls.load(Ordering::SeqCst)
    }

    pub fn last_search(&self) -> Option<SearchParams> {
        self.last_search
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn unscripted<T>() -> Result<T, UpstreamError> {
        Err(UpstreamError::Transport("no scripted response".to_string()))
    }
}

#[async_trait]
impl MovieApi for ScriptedMovieApi {
    async fn search(&self, params: &SearchParams) -> Result<SearchResponse, UpstreamError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_search.lock().unwrap_or_else(|p| p.into_inner()) = Some(params.clone());
        self.search
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .unwrap_or_else(Self::unscripted)
    }

    async fn details_by_id(&self, _imdb_id: &str) -> Result<MovieDetails, UpstreamError> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        self.details
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .unwrap_or_else(Self::unscripted)
    }

    async fn details_by_title(
        &self,
        _title: &str,
        _year: Option<u16>,
    ) -> Result<MovieDetails, UpstreamError> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        self.details
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .unwrap_or_else(Self::unscripted)
    }
}

/// A successful search page containing `titles`.
pub fn search_hit(titles: &[&str]) -> SearchResponse {
    SearchResponse {
        search: titles
            .iter()
            .enumerate()
            .map(|(i, title)| MovieSummary {
                title: Some(title.to_string()),
                year: Some("2005".to_string()),
                imdb_id: Some(format!("tt{:07}", i + 1)),
                kind: Some("movie".to_string()),
                poster: None,
            })
            .collect(),
        total_results: Some(titles.len().to_string()),
        response: "True".to_string(),
        error: None,
    }
}

pub fn details_found(imdb_id: &str, title: &str) -> MovieDetails {
    MovieDetails {
        title: Some(title.to_string()),
        year: Some("2005".to_string()),
        imdb_id: Some(imdb_id.to_string()),
        response: "True".to_string(),
        ..MovieDetails::default()
    }
}

pub fn details_missing(error: &str) -> MovieDetails {
    MovieDetails {
        response: "False".to_string(),
        error: Some(error.to_string()),
        ..MovieDetails::default()
    }
}
