use super::*;
use crate::analyzer::MotionRegion;
use crate::error::{FramewatchError, RenderError};
use crate::frame::{FrameData, FrameFormat};
use crate::mock::{FailingSink, RecordingSink};
use crate::pipeline::{render_queue, RenderMessage};

use image::Rgb;
use std::time::{Duration, SystemTime};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const POLL: Duration = Duration::from_millis(10);
const GUARD: Duration = Duration::from_secs(5);

fn frame(id: u64) -> FrameData {
    FrameData::new(
        id,
        SystemTime::now(),
        vec![0u8; 64 * 48 * 3],
        64,
        48,
        FrameFormat::Rgb24,
    )
}

fn overlay(min_region_area: u64) -> RegionOverlay {
    RegionOverlay::new(min_region_area, Rgb([0, 255, 0]), 1)
}

fn present(id: u64, regions: Vec<MotionRegion>) -> RenderMessage {
    RenderMessage::Present {
        frame: frame(id),
        regions,
    }
}

#[tokio::test]
async fn test_presents_in_queue_order_until_end_of_stream() {
    let sink = RecordingSink::new();
    let handle = sink.handle();
    let presenter = Presenter::new(Box::new(sink), overlay(0), POLL, CancellationToken::new());
    let (render_tx, render_rx) = render_queue();

    for id in [2u64, 3, 4, 5] {
        render_tx.send(present(id, vec![])).unwrap();
    }
    render_tx.send(RenderMessage::EndOfStream).unwrap();

    let presented = timeout(GUARD, presenter.run_loop(render_rx))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(presented, 4);
    assert_eq!(handle.frame_ids(), vec![2, 3, 4, 5]);
    assert!(handle.is_closed());
}

#[tokio::test]
async fn test_small_regions_never_reach_the_sink() {
    let sink = RecordingSink::new();
    let handle = sink.handle();
    let presenter = Presenter::new(Box::new(sink), overlay(100), POLL, CancellationToken::new());
    let (render_tx, render_rx) = render_queue();

    render_tx
        .send(present(
            2,
            vec![
                MotionRegion::new(0, 0, 10, 10),
                MotionRegion::new(20, 20, 11, 10),
            ],
        ))
        .unwrap();
    drop(render_tx);

    timeout(GUARD, presenter.run_loop(render_rx))
        .await
        .unwrap()
        .unwrap();

    let presented = handle.presented();
    assert_eq!(presented.len(), 1);
    assert_eq!(presented[0].regions, vec![MotionRegion::new(20, 20, 11, 10)]);
}

#[tokio::test]
async fn test_regions_clipped_below_minimum_never_reach_the_sink() {
    let sink = RecordingSink::new();
    let handle = sink.handle();
    let presenter = Presenter::new(Box::new(sink), overlay(500), POLL, CancellationToken::new());
    let (render_tx, render_rx) = render_queue();

    // 900 px before clipping, 32 px inside the 64x48 frame
    render_tx
        .send(present(2, vec![MotionRegion::new(60, 40, 30, 30)]))
        .unwrap();
    drop(render_tx);

    timeout(GUARD, presenter.run_loop(render_rx))
        .await
        .unwrap()
        .unwrap();

    let presented = handle.presented();
    assert_eq!(presented.len(), 1);
    assert!(presented[0].regions.is_empty());
}

#[tokio::test]
async fn test_queued_results_are_drained_after_stop() {
    let sink = RecordingSink::new();
    let handle = sink.handle();
    let cancel = CancellationToken::new();
    let presenter = Presenter::new(Box::new(sink), overlay(0), POLL, cancel.clone());
    let (render_tx, render_rx) = render_queue();

    render_tx.send(present(2, vec![])).unwrap();
    render_tx.send(present(3, vec![])).unwrap();
    cancel.cancel();

    let presented = timeout(GUARD, presenter.run_loop(render_rx))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(presented, 2);
    assert_eq!(handle.frame_ids(), vec![2, 3]);
    drop(render_tx);
}

#[tokio::test]
async fn test_stops_on_cancel_when_idle() {
    let cancel = CancellationToken::new();
    let presenter = Presenter::new(
        Box::new(RecordingSink::new()),
        overlay(0),
        POLL,
        cancel.clone(),
    );
    let (_render_tx, render_rx) = render_queue();
    let task = tokio::spawn(presenter.run_loop(render_rx));

    cancel.cancel();

    let presented = timeout(GUARD, task).await.unwrap().unwrap().unwrap();
    assert_eq!(presented, 0);
}

#[tokio::test]
async fn test_sink_failure_ends_loop_with_error() {
    let presenter = Presenter::new(
        Box::new(FailingSink::new(1)),
        overlay(0),
        POLL,
        CancellationToken::new(),
    );
    let (render_tx, render_rx) = render_queue();

    render_tx.send(present(2, vec![])).unwrap();
    render_tx.send(present(3, vec![])).unwrap();
    render_tx.send(present(4, vec![])).unwrap();

    let result = timeout(GUARD, presenter.run_loop(render_rx)).await.unwrap();
    assert!(matches!(
        result,
        Err(FramewatchError::Render(RenderError::Sink { .. }))
    ));
}
