//! In-memory metadata provider and event helpers shared by the pipeline
//! integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sortarr_core::{
    BatchSummary, Candidate, DisambiguationRequest, Episode, MediaType, MetadataProvider,
    ProgressUpdate, ProviderError, ProviderId, SortEvent, TitleDetails,
};
use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Connection,
    InvalidApiKey,
    /// Never answers.
    Stall,
}

impl Failure {
    fn into_error(self) -> ProviderError {
        match self {
            Failure::Connection => ProviderError::Connection("connection reset".into()),
            Failure::InvalidApiKey => ProviderError::InvalidApiKey,
            Failure::Stall => ProviderError::Connection("unreachable".into()),
        }
    }
}

#[derive(Default)]
pub struct FakeProvider {
    searches: HashMap<String, Result<Vec<Candidate>, Failure>>,
    held: HashMap<String, Vec<Candidate>>,
    details: HashMap<(String, MediaType), TitleDetails>,
    seasons: HashMap<(String, u32), Result<Vec<Episode>, Failure>>,
    calls: Mutex<Vec<String>>,
    pub stalled: Arc<Notify>,
    /// Lets held searches answer.
    pub released: Arc<Notify>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, term: &str, results: Vec<Candidate>) -> Self {
        self.searches.insert(term.to_string(), Ok(results));
        self
    }

    /// Answers `term` only once `released` is notified.
    pub fn search_held(mut self, term: &str, results: Vec<Candidate>) -> Self {
        self.held.insert(term.to_string(), results);
        self
    }

    pub fn search_fails(mut self, term: &str, failure: Failure) -> Self {
        self.searches.insert(term.to_string(), Err(failure));
        self
    }

    pub fn movie(mut self, id: u64, title: &str, year: u16) -> Self {
        self.details.insert(
            (id.to_string(), MediaType::Movie),
            TitleDetails {
                provider_id: ProviderId::from(id),
                kind: MediaType::Movie,
                title: title.to_string(),
                year: Some(year),
            },
        );
        self
    }

    pub fn show(mut self, id: u64, title: &str, year: u16) -> Self {
        self.details.insert(
            (id.to_string(), MediaType::Tv),
            TitleDetails {
                provider_id: ProviderId::from(id),
                kind: MediaType::Tv,
                title: title.to_string(),
                year: Some(year),
            },
        );
        self
    }

    pub fn season(mut self, show_id: u64, season: u32, titles: &[&str]) -> Self {
        let episodes = titles
            .iter()
            .enumerate()
            .map(|(idx, title)| Episode::new(idx as u32 + 1, *title))
            .collect();
        self.seasons
            .insert((show_id.to_string(), season), Ok(episodes));
        self
    }

    pub fn season_fails(mut self, show_id: u64, season: u32, failure: Failure) -> Self {
        self.seasons
            .insert((show_id.to_string(), season), Err(failure));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    async fn answer<T: Clone>(&self, answer: Option<&Result<T, Failure>>) -> Result<T, ProviderError> {
        match answer {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(Failure::Stall)) => {
                self.stalled.notify_one();
                std::future::pending::<()>().await;
                Err(Failure::Stall.into_error())
            }
            Some(Err(failure)) => Err(failure.into_error()),
            None => Err(ProviderError::NotFound),
        }
    }
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    async fn search(
        &self,
        query: &str,
        _kind: Option<MediaType>,
    ) -> Result<Vec<Candidate>, ProviderError> {
        self.record(format!("search:{query}"));
        if let Some(results) = self.held.get(query) {
            self.stalled.notify_one();
            self.released.notified().await;
            return Ok(results.clone());
        }
        match self.searches.get(query) {
            None => Ok(Vec::new()),
            answer => self.answer(answer).await,
        }
    }

    async fn fetch_details(
        &self,
        id: &ProviderId,
        kind: MediaType,
    ) -> Result<TitleDetails, ProviderError> {
        self.record(format!("details:{id}"));
        self.details
            .get(&(id.to_string(), kind))
            .cloned()
            .ok_or(ProviderError::NotFound)
    }

    async fn fetch_season(
        &self,
        show_id: &ProviderId,
        season: u32,
    ) -> Result<Vec<Episode>, ProviderError> {
        self.record(format!("season:{show_id}:{season}"));
        self.answer(self.seasons.get(&(show_id.to_string(), season)))
            .await
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub fn tv(id: u64, title: &str, year: u16) -> Candidate {
    Candidate {
        provider_id: ProviderId::from(id),
        title: title.to_string(),
        year: Some(year),
        kind: MediaType::Tv,
        match_score: 10.0,
    }
}

pub fn film(id: u64, title: &str, year: u16) -> Candidate {
    Candidate {
        provider_id: ProviderId::from(id),
        title: title.to_string(),
        year: Some(year),
        kind: MediaType::Movie,
        match_score: 10.0,
    }
}

pub fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().expect("parent dir")).expect("create dirs");
    std::fs::write(path, b"video").expect("write file");
}

pub async fn next_event(events: &mut UnboundedReceiver<SortEvent>) -> SortEvent {
    tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

pub async fn next_request(
    events: &mut UnboundedReceiver<SortEvent>,
    seen: &mut Vec<SortEvent>,
) -> DisambiguationRequest {
    loop {
        let event = next_event(events).await;
        seen.push(event.clone());
        if let SortEvent::DisambiguationRequest(request) = event {
            return request;
        }
    }
}

/// Collects events up to and including `BatchComplete`.
pub async fn until_complete(
    events: &mut UnboundedReceiver<SortEvent>,
    seen: &mut Vec<SortEvent>,
) -> BatchSummary {
    loop {
        let event = next_event(events).await;
        seen.push(event.clone());
        if let SortEvent::BatchComplete(summary) = event {
            return summary;
        }
    }
}

pub fn final_progress<'a>(seen: &'a [SortEvent], file_name: &str) -> Option<&'a ProgressUpdate> {
    seen.iter()
        .filter_map(|event| match event {
            SortEvent::Progress(update) if update.file_name == file_name => Some(update),
            _ => None,
        })
        .last()
}
