use super::*;
use crate::error::SourceError;
use crate::mock::{FailingDecoder, SyntheticDecoder};
use crate::pipeline::{frame_queue, FrameReceiver, SourceMessage};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn drain(mut frame_rx: FrameReceiver) -> Vec<SourceMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = frame_rx.try_recv() {
        messages.push(message);
    }
    messages
}

#[test]
fn test_extract_pushes_frames_then_end_marker() {
    let (frame_tx, frame_rx) = frame_queue();
    let source = FrameSource::new(
        Arc::new(SyntheticDecoder::new(3)),
        frame_tx,
        CancellationToken::new(),
    );

    let produced = source.extract("synthetic").unwrap();
    assert_eq!(produced, 3);

    let messages = drain(frame_rx);
    assert_eq!(messages.len(), 4);

    let ids: Vec<u64> = messages
        .iter()
        .filter_map(|m| match m {
            SourceMessage::Frame(frame) => Some(frame.id),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(matches!(
        messages.last(),
        Some(SourceMessage::EndOfStream { frames: 3 })
    ));
}

#[test]
fn test_empty_source_sends_only_end_marker() {
    let (frame_tx, frame_rx) = frame_queue();
    let source = FrameSource::new(
        Arc::new(SyntheticDecoder::new(0)),
        frame_tx,
        CancellationToken::new(),
    );

    assert_eq!(source.extract("empty").unwrap(), 0);

    let messages = drain(frame_rx);
    assert_eq!(messages.len(), 1);
    assert!(matches!(
        messages[0],
        SourceMessage::EndOfStream { frames: 0 }
    ));
}

#[test]
fn test_open_failure_produces_no_frame() {
    let (frame_tx, frame_rx) = frame_queue();
    let source = FrameSource::new(Arc::new(FailingDecoder), frame_tx, CancellationToken::new());

    assert!(source.extract("missing.mp4").is_err());

    let messages = drain(frame_rx);
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        SourceMessage::Failed(SourceError::Open { source_id, .. }) => {
            assert_eq!(source_id, "missing.mp4");
        }
        other => panic!("Expected open failure, got {:?}", other),
    }
}

#[test]
fn test_read_failure_is_forwarded_after_good_frames() {
    let (frame_tx, frame_rx) = frame_queue();
    let source = FrameSource::new(
        Arc::new(SyntheticDecoder::new(10).failing_after(2)),
        frame_tx,
        CancellationToken::new(),
    );

    assert!(source.extract("synthetic").is_err());

    let messages = drain(frame_rx);
    assert_eq!(messages.len(), 3);
    assert!(matches!(messages[0], SourceMessage::Frame(_)));
    assert!(matches!(messages[1], SourceMessage::Frame(_)));
    assert!(matches!(
        messages[2],
        SourceMessage::Failed(SourceError::Read { .. })
    ));
}

#[test]
fn test_cancelled_source_sends_nothing() {
    let (frame_tx, frame_rx) = frame_queue();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let source = FrameSource::new(Arc::new(SyntheticDecoder::new(5)), frame_tx, cancel);

    assert_eq!(source.extract("synthetic").unwrap(), 0);
    assert!(drain(frame_rx).is_empty());
}

#[test]
fn test_closed_queue_stops_source() {
    let (frame_tx, frame_rx) = frame_queue();
    drop(frame_rx);

    let source = FrameSource::new(
        Arc::new(SyntheticDecoder::new(5)),
        frame_tx,
        CancellationToken::new(),
    );

    assert_eq!(source.extract("synthetic").unwrap(), 1);
}

#[test]
fn test_end_marker_to_closed_queue_still_finishes() {
    let (frame_tx, frame_rx) = frame_queue();
    drop(frame_rx);

    let source = FrameSource::new(
        Arc::new(SyntheticDecoder::new(0)),
        frame_tx,
        CancellationToken::new(),
    );

    assert_eq!(source.extract("empty").unwrap(), 0);
}

#[test]
fn test_read_failure_to_closed_queue_is_still_returned() {
    let (frame_tx, frame_rx) = frame_queue();
    drop(frame_rx);

    let source = FrameSource::new(
        Arc::new(SyntheticDecoder::new(5).failing_after(0)),
        frame_tx,
        CancellationToken::new(),
    );

    assert!(source.extract("synthetic").is_err());
}
