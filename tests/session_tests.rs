mod common;

use common::{failed, video, MockBackend};
use std::time::Duration;
use vidlens::model::{Answer, AssetState, MediaSource, NoOutputReason, RemoteStatus, Turn};
use vidlens::options::{PollOptions, SessionOptions};
use vidlens::session::Session;
use vidlens::tracker::{RemoteJobTracker, TrackerError};

fn session(backend: &MockBackend) -> Session<MockBackend> {
    Session::new(RemoteJobTracker::new(backend.clone())).with_options(
        SessionOptions::new()
            .with_poll(PollOptions::new(Duration::from_secs(1), Duration::from_secs(10)))
            .with_query_timeout(Duration::from_secs(60)),
    )
}

#[tokio::test(start_paused = true)]
async fn test_ask_without_asset_fails() {
    let backend = MockBackend::new(vec![]);
    let mut session = session(&backend);

    let err = session.ask("Anything?").await.unwrap_err();

    assert!(matches!(err, TrackerError::NoAsset));
    assert!(session.transcript().is_empty());
    assert!(!session.is_ready());
}

#[tokio::test(start_paused = true)]
async fn test_load_then_ask_records_transcript() {
    let backend = MockBackend::new(vec![RemoteStatus::Processing, RemoteStatus::Ready])
        .with_answers(vec![Answer::Text("Knees track over toes.".to_string())]);
    let mut session = session(&backend);

    let asset = session.load(video()).await.unwrap();
    assert_eq!(asset.state(), AssetState::Ready);
    assert!(session.is_ready());

    let answer = session.ask("How is my form?").await.unwrap();

    assert_eq!(answer.text(), Some("Knees track over toes."));
    assert_eq!(
        session.transcript(),
        &[
            Turn::User("How is my form?".to_string()),
            Turn::Assistant(Answer::Text("Knees track over toes.".to_string())),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_output_answer_is_recorded() {
    let no_output = Answer::NoOutput(NoOutputReason::default());
    let backend = MockBackend::new(vec![RemoteStatus::Ready]).with_answers(vec![no_output.clone()]);
    let mut session = session(&backend);
    session.load(video()).await.unwrap();

    let answer = session.ask("Prescribe something.").await.unwrap();

    assert!(answer.is_no_output());
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.transcript()[1], Turn::Assistant(no_output));
}

#[tokio::test(start_paused = true)]
async fn test_failed_query_leaves_transcript_untouched() {
    let backend = MockBackend::new(vec![RemoteStatus::Ready]);
    let mut session = session(&backend);
    session.load(video()).await.unwrap();

    assert!(session.ask("Hello?").await.is_err());
    assert!(session.transcript().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_loading_new_asset_releases_previous_one() {
    let backend = MockBackend::new(vec![RemoteStatus::Ready, RemoteStatus::Ready])
        .with_answers(vec![Answer::Text("A squat.".to_string())]);
    let mut session = session(&backend);

    session.load(video()).await.unwrap();
    session.ask("What is this?").await.unwrap();

    let second = MediaSource::new(&b"other"[..], "video/quicktime").with_display_name("lunge.mov");
    let asset = session.load(second).await.unwrap();

    assert_eq!(asset.remote_id().as_str(), "files/mock-2");
    let deleted = backend.delete_calls();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].as_str(), "files/mock-1");
    assert!(session.transcript().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_load_keeps_asset_for_release() {
    let backend = MockBackend::new(vec![RemoteStatus::Processing, failed("bad container")]);
    let mut session = session(&backend);

    let err = session.load(video()).await.unwrap_err();
    assert!(matches!(err, TrackerError::RemoteProcessing { .. }));

    let asset = session.asset().expect("asset kept after failure");
    assert_eq!(asset.state(), AssetState::Failed);
    assert!(!session.is_ready());
    assert!(matches!(
        session.ask("Anything?").await,
        Err(TrackerError::NotReady {
            state: AssetState::Failed,
            ..
        })
    ));

    assert!(session.clear().await.is_none());
    assert!(session.asset().is_none());
    assert_eq!(backend.delete_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clear_removes_transcript_and_asset() {
    let backend = MockBackend::new(vec![RemoteStatus::Ready])
        .with_answers(vec![Answer::Text("Good depth.".to_string())]);
    let mut session = session(&backend);
    session.load(video()).await.unwrap();
    session.ask("Depth?").await.unwrap();

    assert!(session.clear().await.is_none());

    assert!(session.transcript().is_empty());
    assert!(session.asset().is_none());
    assert_eq!(backend.delete_calls().len(), 1);

    // Nothing left to release.
    assert!(session.clear().await.is_none());
    assert_eq!(backend.delete_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_release_keeps_transcript_and_is_idempotent() {
    let backend = MockBackend::new(vec![RemoteStatus::Ready])
        .with_answers(vec![Answer::Text("Good depth.".to_string())]);
    let mut session = session(&backend);
    session.load(video()).await.unwrap();
    session.ask("Depth?").await.unwrap();

    assert!(session.release().await.is_none());
    assert!(session.release().await.is_none());

    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.asset().unwrap().state(), AssetState::Deleted);
    assert_eq!(backend.delete_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_deletion_does_not_block_clear() {
    let backend = MockBackend::new(vec![RemoteStatus::Ready]).rejecting_deletes();
    let mut session = session(&backend);
    session.load(video()).await.unwrap();

    let warning = session.clear().await;

    assert!(warning.is_some());
    assert!(session.asset().is_none());
}
