use super::{PipelineState, ShutdownReason};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Counters kept by the orchestrator for one session
#[derive(Debug)]
pub(super) struct SessionStats {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub frames_received: u64,
    pub results_forwarded: u64,
    pub frames_presented: u64,
    first_frame_at: Option<Instant>,
    last_frame_at: Option<Instant>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            frames_received: 0,
            results_forwarded: 0,
            frames_presented: 0,
            first_frame_at: None,
            last_frame_at: None,
        }
    }

    /// Count a received frame; returns the instantaneous rate against the
    /// previous one
    pub fn record_frame(&mut self, now: Instant) -> Option<f64> {
        self.frames_received += 1;
        self.first_frame_at.get_or_insert(now);

        let fps = self
            .last_frame_at
            .map(|last| now.duration_since(last))
            .filter(|delta| !delta.is_zero())
            .map(|delta| 1.0 / delta.as_secs_f64());

        self.last_frame_at = Some(now);
        fps
    }

    pub fn average_fps(&self) -> f64 {
        match (self.first_frame_at, self.last_frame_at) {
            (Some(first), Some(last)) if self.frames_received > 1 => {
                let elapsed = last.duration_since(first);
                if elapsed > Duration::ZERO {
                    (self.frames_received - 1) as f64 / elapsed.as_secs_f64()
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    pub fn summary(
        &self,
        final_state: PipelineState,
        shutdown_reason: Option<&ShutdownReason>,
    ) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            started_at: self.started_at,
            frames_received: self.frames_received,
            results_forwarded: self.results_forwarded,
            frames_presented: self.frames_presented,
            average_fps: self.average_fps(),
            final_state,
            shutdown_reason: shutdown_reason.map(ToString::to_string),
        }
    }
}

/// Outcome of a session, printed by `--summary-json`
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub frames_received: u64,
    pub results_forwarded: u64,
    pub frames_presented: u64,
    pub average_fps: f64,
    pub final_state: PipelineState,
    pub shutdown_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_from_inter_frame_delta() {
        let mut stats = SessionStats::new();
        let start = Instant::now();

        assert!(stats.record_frame(start).is_none());
        let fps = stats.record_frame(start + Duration::from_millis(100)).unwrap();
        assert!((fps - 10.0).abs() < 1e-6);

        stats.record_frame(start + Duration::from_millis(200));
        assert_eq!(stats.frames_received, 3);
        assert!((stats.average_fps() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_summary_serializes() {
        let mut stats = SessionStats::new();
        stats.results_forwarded = 4;
        let summary = stats.summary(PipelineState::Terminated, Some(&ShutdownReason::EndOfStream));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["results_forwarded"], 4);
        assert_eq!(json["final_state"], "Terminated");
        assert_eq!(json["shutdown_reason"], "end of stream");
        assert_eq!(json["average_fps"], 0.0);
        assert_eq!(json["session_id"], stats.session_id.to_string());
    }
}
