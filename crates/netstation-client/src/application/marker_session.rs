//! MarkerSessionUseCase: drives a complete recording session with markers.
//!
//! ```text
//! begin_session(spec)
//! begin_recording
//! for i in 0..markers:
//!     attention
//!     synch(i)
//!     trigger(label(i), i, duration_ms)
//!     sleep(interval)
//! end_recording
//! end_session
//! ```
//!
//! Labels cycle through `A`..`Z`.  A failed marker command is logged and
//! counted; the session carries on with the next marker.  Failing to open
//! the session or to start recording ends the run early.

use std::thread;
use std::time::Duration;

use netstation_core::{EventCode, SystemSpec};
use tracing::{info, warn};

use crate::application::recorder::{CommandError, EventRecorder};

/// What a marker session should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerPlan {
    /// Token announced with the session-begin query.
    pub system_spec: SystemSpec,
    /// Number of attention/synch/trigger rounds.
    pub markers: u32,
    /// Pause after each round.
    pub interval: Duration,
    /// Duration stamped on every event marker.
    pub duration_ms: i32,
}

impl Default for MarkerPlan {
    fn default() -> Self {
        Self {
            system_spec: SystemSpec::native(),
            markers: 26,
            interval: Duration::from_secs(5),
            duration_ms: 50,
        }
    }
}

/// Outcome of a completed session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Triggers the device accepted.
    pub markers_sent: u32,
    /// Commands that failed without ending the session.
    pub failed_commands: u32,
}

/// The Marker Session use case.
pub struct MarkerSessionUseCase {
    plan: MarkerPlan,
}

impl MarkerSessionUseCase {
    /// Creates a use case that will execute `plan`.
    pub fn new(plan: MarkerPlan) -> Self {
        Self { plan }
    }

    /// Returns the plan this use case executes.
    pub fn plan(&self) -> &MarkerPlan {
        &self.plan
    }

    /// Event label for round `index`: `"A   "`, `"B   "`, … wrapping after `Z`.
    pub fn marker_label(index: u32) -> EventCode {
        // index % 26 < 26, so the cast cannot truncate.
        let letter = b'A' + (index % 26) as u8;
        EventCode::new([letter, b' ', b' ', b' '])
    }

    /// Number of rounds to run.  Timestamps are `i32`, so plans beyond
    /// `i32::MAX` markers are cut short instead of wrapping negative.
    fn rounds(&self) -> i32 {
        i32::try_from(self.plan.markers).unwrap_or_else(|_| {
            warn!(
                "{} markers requested; capping at {}",
                self.plan.markers,
                i32::MAX
            );
            i32::MAX
        })
    }

    /// Runs the session against `recorder`.
    ///
    /// # Errors
    ///
    /// Returns the [`CommandError`] that prevented the session from opening
    /// or recording from starting.  Later failures are only counted in the
    /// returned [`SessionReport`].
    pub fn run<R: EventRecorder + ?Sized>(
        &self,
        recorder: &mut R,
    ) -> Result<SessionReport, CommandError> {
        let mut report = SessionReport::default();

        recorder.begin_session(self.plan.system_spec)?;
        info!("session opened ({})", self.plan.system_spec);

        if let Err(e) = recorder.begin_recording() {
            warn!("could not start recording: {e}");
            if let Err(close_err) = recorder.end_session() {
                warn!("could not close session: {close_err}");
            }
            return Err(e);
        }

        // Marker rounds are counted, not timed; the round index doubles as the timestamp.
        for timestamp in 0..self.rounds() {
            let code = Self::marker_label(timestamp.unsigned_abs());

            let round = recorder
                .attention()
                .and_then(|()| recorder.synch(timestamp))
                .and_then(|()| recorder.trigger(code, timestamp, self.plan.duration_ms));
            match round {
                Ok(()) => report.markers_sent += 1,
                Err(e) => {
                    warn!("marker {timestamp} ({code:?}) failed: {e}");
                    report.failed_commands += 1;
                }
            }

            if !self.plan.interval.is_zero() {
                thread::sleep(self.plan.interval);
            }
        }

        if let Err(e) = recorder.end_recording() {
            warn!("could not stop recording: {e}");
            report.failed_commands += 1;
        }
        if let Err(e) = recorder.end_session() {
            warn!("could not close session: {e}");
            report.failed_commands += 1;
        }

        info!(
            "session finished: {} markers sent, {} failed commands",
            report.markers_sent, report.failed_commands
        );
        Ok(report)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use mockall::{predicate::eq, Sequence};

    use super::*;
    use crate::application::recorder::MockEventRecorder;

    fn quick_plan(markers: u32) -> MarkerPlan {
        MarkerPlan {
            system_spec: SystemSpec::LITTLE_ENDIAN,
            markers,
            interval: Duration::ZERO,
            duration_ms: 50,
        }
    }

    #[test]
    fn test_marker_plan_default_matches_demo_session() {
        let plan = MarkerPlan::default();
        assert_eq!(plan.markers, 26);
        assert_eq!(plan.interval, Duration::from_secs(5));
        assert_eq!(plan.duration_ms, 50);
        assert_eq!(plan.system_spec, SystemSpec::native());
    }

    #[test]
    fn test_marker_label_cycles_through_alphabet() {
        assert_eq!(MarkerSessionUseCase::marker_label(0).as_bytes(), b"A   ");
        assert_eq!(MarkerSessionUseCase::marker_label(25).as_bytes(), b"Z   ");
        assert_eq!(MarkerSessionUseCase::marker_label(26).as_bytes(), b"A   ");
    }

    #[test]
    fn test_rounds_never_exceed_timestamp_range() {
        assert_eq!(MarkerSessionUseCase::new(quick_plan(3)).rounds(), 3);
        assert_eq!(
            MarkerSessionUseCase::new(quick_plan(i32::MAX as u32)).rounds(),
            i32::MAX
        );
        assert_eq!(MarkerSessionUseCase::new(quick_plan(u32::MAX)).rounds(), i32::MAX);
    }

    #[test]
    fn test_run_issues_commands_in_protocol_order() {
        // Arrange
        let mut recorder = MockEventRecorder::new();
        let mut seq = Sequence::new();
        recorder
            .expect_begin_session()
            .with(eq(SystemSpec::LITTLE_ENDIAN))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        recorder
            .expect_begin_recording()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        for i in 0..2 {
            recorder
                .expect_attention()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|| Ok(()));
            recorder
                .expect_synch()
                .with(eq(i))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
            recorder
                .expect_trigger()
                .with(
                    eq(MarkerSessionUseCase::marker_label(i as u32)),
                    eq(i),
                    eq(50),
                )
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _, _| Ok(()));
        }
        recorder
            .expect_end_recording()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        recorder
            .expect_end_session()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        // Act
        let report = MarkerSessionUseCase::new(quick_plan(2))
            .run(&mut recorder)
            .expect("session");

        // Assert
        assert_eq!(
            report,
            SessionReport {
                markers_sent: 2,
                failed_commands: 0
            }
        );
    }

    #[test]
    fn test_run_counts_rejected_trigger_and_continues() {
        // Arrange: the device rejects the first trigger only.
        let mut recorder = MockEventRecorder::new();
        recorder.expect_begin_session().returning(|_| Ok(()));
        recorder.expect_begin_recording().returning(|| Ok(()));
        recorder.expect_attention().times(3).returning(|| Ok(()));
        recorder.expect_synch().times(3).returning(|_| Ok(()));
        recorder
            .expect_trigger()
            .times(3)
            .returning(|_, timestamp, _| {
                if timestamp == 0 {
                    Err(CommandError::DeviceFailure { code: 1 })
                } else {
                    Ok(())
                }
            });
        recorder.expect_end_recording().returning(|| Ok(()));
        recorder.expect_end_session().returning(|| Ok(()));

        // Act
        let report = MarkerSessionUseCase::new(quick_plan(3))
            .run(&mut recorder)
            .expect("session");

        // Assert
        assert_eq!(report.markers_sent, 2);
        assert_eq!(report.failed_commands, 1);
    }

    #[test]
    fn test_run_skips_synch_and_trigger_when_attention_fails() {
        let mut recorder = MockEventRecorder::new();
        recorder.expect_begin_session().returning(|_| Ok(()));
        recorder.expect_begin_recording().returning(|| Ok(()));
        recorder
            .expect_attention()
            .times(1)
            .returning(|| Err(CommandError::NotConnected));
        recorder.expect_synch().never();
        recorder.expect_trigger().never();
        recorder
            .expect_end_recording()
            .returning(|| Err(CommandError::NotConnected));
        recorder
            .expect_end_session()
            .returning(|| Err(CommandError::NotConnected));

        let report = MarkerSessionUseCase::new(quick_plan(1))
            .run(&mut recorder)
            .expect("session");

        assert_eq!(report.markers_sent, 0);
        assert_eq!(report.failed_commands, 3);
    }

    #[test]
    fn test_run_aborts_when_session_cannot_open() {
        // Arrange
        let mut recorder = MockEventRecorder::new();
        recorder
            .expect_begin_session()
            .times(1)
            .returning(|_| Err(CommandError::DeviceFailure { code: 2 }));
        recorder.expect_begin_recording().never();
        recorder.expect_end_session().never();

        // Act
        let result = MarkerSessionUseCase::new(quick_plan(5)).run(&mut recorder);

        // Assert
        assert!(matches!(result, Err(CommandError::DeviceFailure { code: 2 })));
    }

    #[test]
    fn test_run_closes_session_when_recording_cannot_start() {
        let mut recorder = MockEventRecorder::new();
        recorder.expect_begin_session().returning(|_| Ok(()));
        recorder
            .expect_begin_recording()
            .returning(|| Err(CommandError::ShortReceive {
                received: 0,
                expected: 1,
            }));
        recorder.expect_attention().never();
        recorder.expect_end_session().times(1).returning(|| Ok(()));

        let result = MarkerSessionUseCase::new(quick_plan(5)).run(&mut recorder);

        assert!(matches!(result, Err(CommandError::ShortReceive { .. })));
    }
}
