use super::*;
use crate::error::{AnalyzerError, FramewatchError};
use crate::frame::{FrameData, FrameFormat};
use crate::mock::FixedRegionDetector;
use crate::pipeline::analysis_channel;

use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const POLL: Duration = Duration::from_millis(10);
const GUARD: Duration = Duration::from_secs(5);

fn gray_frame(id: u64, width: u32, height: u32, shade: u8) -> FrameData {
    FrameData::new(
        id,
        SystemTime::now(),
        vec![shade; (width * height * 3) as usize],
        width,
        height,
        FrameFormat::Rgb24,
    )
}

fn fixed_detector() -> Arc<FixedRegionDetector> {
    Arc::new(FixedRegionDetector::new(vec![MotionRegion::new(10, 10, 20, 20)]))
}

#[tokio::test]
async fn test_first_request_only_seeds_retained_frame() {
    let detector = fixed_detector();
    let mut analyzer = MotionAnalyzer::new(detector.clone(), POLL, CancellationToken::new());
    assert!(!analyzer.has_retained_frame());

    let reply = analyzer.handle_request(gray_frame(1, 8, 8, 0)).await.unwrap();

    assert!(reply.is_none());
    assert!(analyzer.has_retained_frame());
    assert_eq!(detector.calls(), 0);
}

#[tokio::test]
async fn test_second_request_replies_with_original_frame() {
    let detector = fixed_detector();
    let mut analyzer = MotionAnalyzer::new(detector.clone(), POLL, CancellationToken::new());

    analyzer.handle_request(gray_frame(1, 8, 8, 0)).await.unwrap();
    let reply = analyzer
        .handle_request(gray_frame(2, 8, 8, 200))
        .await
        .unwrap()
        .expect("second request must be answered");

    assert_eq!(reply.frame.id, 2);
    assert_eq!(reply.frame.format, FrameFormat::Rgb24);
    assert_eq!(reply.frame.data[0], 200);
    assert_eq!(reply.regions, vec![MotionRegion::new(10, 10, 20, 20)]);
    assert_eq!(detector.calls(), 1);
}

#[tokio::test]
async fn test_retained_frame_is_overwritten_after_each_reply() {
    let detector = Arc::new(FrameDiffDetector::new(25, 0));
    let mut analyzer = MotionAnalyzer::new(detector, POLL, CancellationToken::new());

    analyzer.handle_request(gray_frame(1, 8, 8, 0)).await.unwrap();

    // Against the black seed frame, a white frame is all motion
    let changed = analyzer
        .handle_request(gray_frame(2, 8, 8, 255))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(changed.regions, vec![MotionRegion::new(0, 0, 8, 8)]);

    // Retained frame is now white, so an identical frame shows nothing
    let unchanged = analyzer
        .handle_request(gray_frame(3, 8, 8, 255))
        .await
        .unwrap()
        .unwrap();
    assert!(unchanged.regions.is_empty());
}

#[tokio::test]
async fn test_dimension_change_is_an_error() {
    let mut analyzer = MotionAnalyzer::new(
        Arc::new(FrameDiffDetector::default()),
        POLL,
        CancellationToken::new(),
    );

    analyzer.handle_request(gray_frame(1, 8, 8, 0)).await.unwrap();
    let result = analyzer.handle_request(gray_frame(2, 4, 4, 0)).await;

    assert!(matches!(
        result,
        Err(FramewatchError::Analyzer(AnalyzerError::DimensionMismatch { .. }))
    ));
}

#[tokio::test]
async fn test_run_loop_serves_handshake() {
    let detector = fixed_detector();
    let analyzer = MotionAnalyzer::new(detector.clone(), POLL, CancellationToken::new());
    let (mut link, endpoint) = analysis_channel();
    let handle = tokio::spawn(analyzer.run_loop(endpoint));

    let warmup = timeout(GUARD, link.exchange(gray_frame(1, 8, 8, 0), false))
        .await
        .unwrap()
        .unwrap();
    assert!(warmup.is_none());

    for id in 2..=4 {
        let reply = timeout(GUARD, link.exchange(gray_frame(id, 8, 8, 0), true))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(reply.frame.id, id);
    }

    drop(link);
    let metrics = timeout(GUARD, handle).await.unwrap().unwrap().unwrap();
    assert_eq!(metrics.requests_received, 4);
    assert_eq!(metrics.replies_sent, 3);
    assert_eq!(metrics.regions_detected, 3);
    assert_eq!(detector.calls(), 3);
}

#[tokio::test]
async fn test_run_loop_stops_on_cancel_when_idle() {
    let cancel = CancellationToken::new();
    let analyzer = MotionAnalyzer::new(fixed_detector(), POLL, cancel.clone());
    let (_link, endpoint) = analysis_channel();
    let handle = tokio::spawn(analyzer.run_loop(endpoint));

    cancel.cancel();

    let metrics = timeout(GUARD, handle).await.unwrap().unwrap().unwrap();
    assert_eq!(metrics.requests_received, 0);
}

#[tokio::test]
async fn test_run_loop_fails_when_detection_fails() {
    let detector = Arc::new(
        FixedRegionDetector::new(vec![MotionRegion::new(0, 0, 4, 4)]).failing_after(0),
    );
    let analyzer = MotionAnalyzer::new(detector, POLL, CancellationToken::new());
    let (mut link, endpoint) = analysis_channel();
    let handle = tokio::spawn(analyzer.run_loop(endpoint));

    link.exchange(gray_frame(1, 8, 8, 0), false).await.unwrap();
    let outcome = timeout(GUARD, link.exchange(gray_frame(2, 8, 8, 0), true))
        .await
        .unwrap();
    assert!(outcome.is_err());

    let result = timeout(GUARD, handle).await.unwrap().unwrap();
    assert!(matches!(
        result,
        Err(FramewatchError::Analyzer(AnalyzerError::Detection { .. }))
    ));
}
