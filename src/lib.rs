//! # vidlens - remote media job tracking
//!
//! Upload a video (or any media file) to a hosted generative-AI file API,
//! wait until the service has processed it, ask questions about it, and
//! delete it again.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Backend-agnostic trait-based design with a Gemini Files API client
//! - Fixed-interval polling with a bounded wait budget
//! - A `Stream` of observed states for UIs that render progress
//! - "No answer produced" reported as a value, not an error
//!
//! ## Architecture
//!
//! 1. **Providers** act as factories to create backends.
//! 2. **Backends** (`MediaBackend`) speak the wire protocol of one service.
//! 3. **`RemoteJobTracker`** owns the asset lifecycle rules on top of a backend.
//! 4. **`Session`** holds one asset at a time plus the transcript of questions.
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use vidlens::options::PollOptions;
//! use vidlens::providers::{Gemini, Provider};
//! use vidlens::{MediaSource, RemoteJobTracker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Gemini::create("your-api-key".to_string(), "gemini-2.0-flash".to_string());
//!     let tracker = RemoteJobTracker::new(client);
//!
//!     let video = std::fs::read("workout.mp4")?;
//!     let mut asset = tracker.submit(MediaSource::new(video, "video/mp4")).await?;
//!     tracker.await_ready(&mut asset, PollOptions::default()).await?;
//!
//!     let answer = tracker
//!         .query(&asset, "Describe the exercise.", Duration::from_secs(600))
//!         .await?;
//!     println!("{:?}", answer);
//!
//!     tracker.release(&mut asset).await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod session;
pub mod staging;
pub mod tracker;

pub use client::{ClientError, MediaBackend};
pub use model::{
    Answer, AssetState, MediaSource, NoOutputReason, PromptPart, RemoteAsset, RemoteId,
    RemoteStatus, Turn, UploadBody, UploadedFile,
};
pub use providers::GeminiClient;
pub use session::Session;
pub use tracker::{DeletionWarning, RemoteJobTracker, TrackerError};
