//! # Sortarr Core
//!
//! Identification and sorting pipeline that turns loosely named local video
//! files into a Plex-style library layout.
//!
//! ## Overview
//!
//! A batch run walks a source directory and, for every video file:
//!
//! - **Parses** the file and folder names into a probable title, year and
//!   season/episode marker ([`parser`])
//! - **Generates** progressively shorter search terms ([`search_terms`])
//! - **Queries** the metadata provider through a timeout-bounded gateway
//!   ([`gateway`], [`providers`])
//! - **Ranks** the merged candidates and decides whether a human has to pick
//!   one ([`ranking`], [`disambiguation`])
//! - **Caches** confirmed identities, never in a half-populated state
//!   ([`cache`])
//! - **Plans** and applies the move or copy into the destination library
//!   ([`planner`], [`file_ops`])
//!
//! The [`worker::SortController`] drives all of this on a single background
//! task and talks to the interactive front-end purely through channels.
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sortarr_core::{
//!     BatchConfig, LocalFileOps, MediaFilter, PipelineSettings, SortController,
//!     SortEvent, TmdbProvider,
//! };
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(TmdbProvider::new("api-key".to_string()));
//!     let mut controller = SortController::new(
//!         provider,
//!         Arc::new(LocalFileOps),
//!         PipelineSettings::default(),
//!     );
//!
//!     let batch = BatchConfig::new("/downloads", "/library")
//!         .with_media_filter(MediaFilter::All)
//!         .keep_originals(true);
//!     let mut events = controller.start(batch)?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let SortEvent::BatchComplete(summary) = event {
//!             println!("{summary}");
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

/// In-process store of confirmed identities
pub mod cache;

/// Batch and pipeline settings
pub mod config;

/// Waiting on a human decision between ambiguous candidates
pub mod disambiguation;

/// Error taxonomy for sort jobs
pub mod error;

/// Messages exchanged between the worker and its front-end
pub mod events;

/// Move/copy primitives
pub mod file_ops;

/// Timeout-bounded access to the metadata provider
pub mod gateway;

/// Per-file job records
pub mod job;

/// Generic media shapes shared by every layer above the providers
pub mod media;

/// Filename and folder parsing
pub mod parser;

/// Destination path planning
pub mod planner;

/// Metadata provider capability and the TMDB adapter
pub mod providers;

/// Multi-query aggregation and candidate ranking
pub mod ranking;

/// Source directory walking
pub mod scanner;

/// Search term generation
pub mod search_terms;

/// Background worker and its controller
pub mod worker;

pub use cache::{CacheError, CacheKey, IdentityCache};
pub use config::{BatchConfig, MediaFilter, PipelineSettings};
pub use disambiguation::{Decision, DecisionMessage, DisambiguationGate, GateOutcome};
pub use error::{ErrorKind, Result, SortError};
pub use events::{
    BatchPosition, BatchSummary, DisambiguationRequest, ProgressUpdate, SortEvent, StopKind,
};
pub use file_ops::{FileOpError, FileOps, LocalFileOps};
pub use gateway::{GatewayError, MetadataGateway};
pub use job::{JobId, JobStatus, SortJob};
pub use media::{
    Candidate, CandidateKey, Episode, Identity, MediaKind, MediaType, ProviderId, SeasonListing,
    TitleDetails,
};
pub use parser::{FilenameParser, ParsedFilename};
pub use planner::{FileAction, FilePlan, SortPlanner};
pub use providers::{MetadataProvider, ProviderError, TmdbProvider};
pub use ranking::{Aggregator, RankedCandidate, Ranking, RankingOutcome};
pub use scanner::{MediaScanner, ScanResult};
pub use search_terms::SearchQuery;
pub use worker::{ControllerError, ControllerState, SortController};
