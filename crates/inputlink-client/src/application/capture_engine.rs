//! CaptureEngine: turns per-tick input samples into ordered protocol lines.
//!
//! One call to [`CaptureEngine::tick`] runs the whole pipeline:
//!
//! ```text
//! sample keys ─► DiffTracker ─► EventOrderingBuffer ─► KEY lines
//!                     │
//!                     └─► SequenceDetector ─────────► SEQ lines
//! sample mouse ─► MouseTracker ─────────────────────► MOUSE_BUTTON lines
//! ```
//!
//! Lines are handed to a [`LineSink`] one at a time.  A sink that cannot send
//! right now returns `false`; the line is dropped, never queued, so the tick
//! path cannot back up behind a dead connection.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use inputlink_core::{
    DiffTracker, EventOrderingBuffer, LineMessage, MouseTracker, SequenceDetector,
};

use crate::infrastructure::input_capture::{InputSource, KeyStateSampler};

/// The single "send one text line" capability the engine needs.
///
/// Implemented by the TCP line transport; tests substitute mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LineSink: Send + Sync {
    /// Sends `line` without a terminator.  Returns `false` if it was not sent.
    async fn send_line(&self, line: &str) -> bool;
}

/// Outcome counters for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Lines the sink accepted.
    pub sent: usize,
    /// Lines the sink refused.
    pub dropped: usize,
}

impl TickStats {
    pub fn emitted(&self) -> usize {
        self.sent + self.dropped
    }
}

/// Owns the capture flag and every piece of per-session capture state.
pub struct CaptureEngine<S> {
    sampler: KeyStateSampler<S>,
    keys: DiffTracker,
    sequences: SequenceDetector,
    ordering: EventOrderingBuffer,
    mouse: MouseTracker,
    sink: Arc<dyn LineSink>,
    capturing: bool,
}

impl<S: InputSource> CaptureEngine<S> {
    /// Creates a stopped engine.
    pub fn new(source: S, sink: Arc<dyn LineSink>, settle_ticks: u32) -> Self {
        Self {
            sampler: KeyStateSampler::new(source),
            keys: DiffTracker::new(),
            sequences: SequenceDetector::new(),
            ordering: EventOrderingBuffer::new(settle_ticks),
            mouse: MouseTracker::new(),
            sink,
            capturing: false,
        }
    }

    /// Enables capture.  Calling it while already capturing changes nothing.
    pub fn start(&mut self) {
        if !self.capturing {
            self.capturing = true;
            info!("capture started");
        }
    }

    /// Disables capture and forgets all held keys, buttons and combinations.
    pub fn stop(&mut self) {
        let was_capturing = self.capturing;
        self.capturing = false;
        self.reset();
        if was_capturing {
            info!("capture stopped");
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Flips capture on or off and returns the new state.
    pub fn toggle(&mut self) -> bool {
        if self.capturing {
            self.stop();
        } else {
            self.start();
        }
        self.capturing
    }

    pub fn source(&self) -> &S {
        self.sampler.source()
    }

    /// Runs one sampling pass.  Does nothing while stopped.
    pub async fn tick(&mut self) -> TickStats {
        let mut stats = TickStats::default();
        if !self.capturing {
            return stats;
        }

        let sample = self.sampler.sample_keys();
        let delta = self.keys.diff(&sample);
        for transition in delta.transitions {
            self.ordering.push(transition);
        }

        for transition in self.ordering.flush_if_ready() {
            let msg = LineMessage::Key {
                action: transition.action,
                key: transition.key,
            };
            self.emit(msg, &mut stats).await;
        }

        let sequence_events = self
            .sequences
            .update(self.keys.pressed(), self.keys.press_order());
        for event in sequence_events {
            self.emit(event.to_message(), &mut stats).await;
        }

        let buttons = self.sampler.sample_mouse();
        for (button, action) in self.mouse.diff(buttons) {
            self.emit(LineMessage::MouseButton { button, action }, &mut stats)
                .await;
        }

        stats
    }

    async fn emit(&self, msg: LineMessage, stats: &mut TickStats) {
        let event = msg.to_event();
        if self.sink.send_line(event.as_str()).await {
            debug!(line = %event, "sent");
            stats.sent += 1;
        } else {
            debug!(line = %event, "transport not ready, dropped");
            stats.dropped += 1;
        }
    }

    fn reset(&mut self) {
        self.keys.reset();
        self.sequences.reset();
        self.ordering.clear();
        self.mouse.reset();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use inputlink_core::{KeyCode, MouseButton};
    use mockall::predicate::eq;

    use super::*;
    use crate::infrastructure::input_capture::mock::MockInputSource;

    /// Sink that records every line and accepts or refuses all of them.
    struct RecordingSink {
        lines: Mutex<Vec<String>>,
        accept: bool,
    }

    impl RecordingSink {
        fn new(accept: bool) -> Arc<Self> {
            Arc::new(Self {
                lines: Mutex::new(Vec::new()),
                accept,
            })
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.lines.lock().unwrap())
        }
    }

    #[async_trait]
    impl LineSink for RecordingSink {
        async fn send_line(&self, line: &str) -> bool {
            self.lines.lock().unwrap().push(line.to_string());
            self.accept
        }
    }

    fn make_engine(
        settle: u32,
    ) -> (
        CaptureEngine<MockInputSource>,
        MockInputSource,
        Arc<RecordingSink>,
    ) {
        let source = MockInputSource::new();
        let sink = RecordingSink::new(true);
        let mut engine = CaptureEngine::new(source.clone(), sink.clone(), settle);
        engine.start();
        (engine, source, sink)
    }

    #[tokio::test]
    async fn test_tick_while_stopped_polls_nothing_and_emits_nothing() {
        // Arrange
        let mut mock = MockLineSink::new();
        mock.expect_send_line().never();
        let source = MockInputSource::new();
        source.press(KeyCode::A);
        let mut engine = CaptureEngine::new(source.clone(), Arc::new(mock), 3);

        // Act
        let stats = engine.tick().await;

        // Assert
        assert_eq!(stats, TickStats::default());
        assert_eq!(source.key_queries(), 0);
    }

    #[tokio::test]
    async fn test_single_key_press_emits_key_line() {
        // Arrange
        let mut mock = MockLineSink::new();
        mock.expect_send_line()
            .with(eq("KEY|PRESS|87|key.keyboard.w"))
            .times(1)
            .return_const(true);
        let source = MockInputSource::new();
        let mut engine = CaptureEngine::new(source.clone(), Arc::new(mock), 3);
        engine.start();
        source.press(KeyCode::W);

        // Act
        let stats = engine.tick().await;

        // Assert
        assert_eq!(stats.sent, 1);
    }

    #[tokio::test]
    async fn test_refused_lines_are_dropped_not_retried() {
        // Arrange
        let mut mock = MockLineSink::new();
        mock.expect_send_line().times(1).return_const(false);
        let source = MockInputSource::new();
        let mut engine = CaptureEngine::new(source.clone(), Arc::new(mock), 3);
        engine.start();
        source.press(KeyCode::W);

        // Act
        let first = engine.tick().await;
        let second = engine.tick().await;

        // Assert – the refused line is not resent on the next tick
        assert_eq!(first, TickStats { sent: 0, dropped: 1 });
        assert_eq!(second, TickStats::default());
    }

    #[tokio::test]
    async fn test_shift_and_k_same_tick_emit_shift_first_after_settle() {
        // Arrange
        let (mut engine, source, sink) = make_engine(3);
        source.hold_only(&[KeyCode::K, KeyCode::LeftShift]);

        // Act – first tick emits only the SEQ press, key lines are settling
        engine.tick().await;
        let first = sink.take();
        for _ in 0..3 {
            engine.tick().await;
        }
        let flushed = sink.take();

        // Assert
        assert_eq!(
            first,
            vec!["SEQ|PRESS|340+75|key.keyboard.left.shift+key.keyboard.k"]
        );
        assert_eq!(
            flushed,
            vec![
                "KEY|PRESS|340|key.keyboard.left.shift",
                "KEY|PRESS|75|key.keyboard.k",
            ]
        );
    }

    #[tokio::test]
    async fn test_modifier_added_after_key_is_still_emitted_first() {
        // Arrange – no settle delay, A goes down a tick before LeftShift
        let (mut engine, source, sink) = make_engine(0);
        source.hold_only(&[KeyCode::A]);
        engine.tick().await;
        sink.take();

        // Act
        source.hold_only(&[KeyCode::A, KeyCode::LeftShift]);
        engine.tick().await;

        // Assert
        let lines = sink.take();
        assert_eq!(lines[0], "KEY|PRESS|340|key.keyboard.left.shift");
        assert_eq!(lines[1], "SEQ|PRESS|65+340|key.keyboard.a+key.keyboard.left.shift");
    }

    #[tokio::test]
    async fn test_mouse_lines_bypass_ordering_buffer() {
        // Arrange
        let (mut engine, source, sink) = make_engine(3);
        source.press(KeyCode::LeftControl);
        source.press_button(MouseButton::Left);

        // Act
        engine.tick().await;

        // Assert – Ctrl is still settling, the click is not
        assert_eq!(sink.take(), vec!["MOUSE_BUTTON|LEFT|PRESS"]);
    }

    #[tokio::test]
    async fn test_chord_release_and_restore_lines() {
        // Arrange
        let (mut engine, source, sink) = make_engine(0);
        source.hold_only(&[KeyCode::LeftControl, KeyCode::C]);
        engine.tick().await;
        sink.take();

        // Act
        source.hold_only(&[KeyCode::LeftControl]);
        engine.tick().await;
        let released = sink.take();
        source.hold_only(&[KeyCode::LeftControl, KeyCode::C]);
        engine.tick().await;
        let restored = sink.take();

        // Assert
        assert_eq!(
            released,
            vec![
                "KEY|RELEASE|67|key.keyboard.c",
                "SEQ|RELEASE|341+67|key.keyboard.left.control+key.keyboard.c",
            ]
        );
        assert_eq!(
            restored,
            vec![
                "KEY|PRESS|67|key.keyboard.c",
                "SEQ|RESTORE|341+67|key.keyboard.left.control+key.keyboard.c",
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_then_start_forgets_previous_combinations() {
        // Arrange
        let (mut engine, source, sink) = make_engine(0);
        source.hold_only(&[KeyCode::A, KeyCode::B]);
        engine.tick().await;
        source.hold_only(&[KeyCode::A]);
        engine.tick().await;
        sink.take();

        // Act
        engine.stop();
        engine.start();
        source.hold_only(&[KeyCode::A, KeyCode::B]);
        engine.tick().await;

        // Assert – fresh presses and a fresh SEQ PRESS, never RESTORE
        let lines = sink.take();
        assert_eq!(
            lines,
            vec![
                "KEY|PRESS|65|key.keyboard.a",
                "KEY|PRESS|66|key.keyboard.b",
                "SEQ|PRESS|65+66|key.keyboard.a+key.keyboard.b",
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_discards_settling_key_events() {
        // Arrange
        let (mut engine, source, sink) = make_engine(3);
        source.press(KeyCode::LeftAlt);
        engine.tick().await;

        // Act
        engine.stop();
        source.release_all();
        engine.start();
        for _ in 0..5 {
            engine.tick().await;
        }

        // Assert
        assert!(sink.take().is_empty());
    }

    #[test]
    fn test_start_is_idempotent_and_toggle_flips_state() {
        let sink = RecordingSink::new(true);
        let mut engine = CaptureEngine::new(MockInputSource::new(), sink, 3);

        engine.start();
        engine.start();
        assert!(engine.is_capturing());

        assert!(!engine.toggle());
        assert!(engine.toggle());
    }

    #[test]
    fn test_tick_runs_on_plain_executor() {
        // Arrange
        let (mut engine, source, sink) = make_engine(0);
        source.press(KeyCode::Escape);

        // Act
        let stats = tokio_test::block_on(engine.tick());

        // Assert
        assert_eq!(stats.sent, 1);
        assert_eq!(sink.take(), vec!["KEY|PRESS|256|key.keyboard.escape"]);
    }
}
