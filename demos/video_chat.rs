//! Upload a video, wait for processing, then answer questions read from stdin.
//!
//! ```text
//! GEMINI_API_KEY=... cargo run --example video_chat -- workout.mp4
//! ```

use std::io::BufRead;
use vidlens::options::{SessionOptions, TrackerOptions};
use vidlens::{Answer, GeminiClient, MediaSource, RemoteJobTracker, Session};

fn mime_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mpg") | Some("mpeg") => "video/mpeg",
        Some("wmv") => "video/x-ms-wmv",
        _ => "video/mp4",
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let path = std::env::args().nth(1).ok_or("usage: video_chat <video file>")?;
    let data = std::fs::read(&path)?;

    let tracker = RemoteJobTracker::with_options(
        GeminiClient::from_env()?,
        TrackerOptions::new().with_system_staging(),
    );
    let mut session = Session::new(tracker).with_options(SessionOptions::default());

    let source = MediaSource::new(data, mime_type_for(&path)).with_display_name(path.clone());
    let loaded = session.load(source).await.map(|_| ());
    if let Err(e) = loaded {
        tracing::error!("Video processing failed: {}", e);
        session.clear().await;
        return Err(e.into());
    }

    println!("Ask questions about {path} (empty line to quit):");
    for line in std::io::stdin().lock().lines() {
        let prompt = line?;
        if prompt.trim().is_empty() {
            break;
        }
        match session.ask(prompt).await {
            Ok(Answer::Text(text)) => println!("{text}\n"),
            Ok(Answer::NoOutput(reason)) => println!("The model could not answer: {reason}\n"),
            Err(e) => tracing::error!("Query failed: {}", e),
        }
    }

    if let Some(warning) = session.clear().await {
        eprintln!("{warning}");
    }
    Ok(())
}
