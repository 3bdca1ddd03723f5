use crate::stream::{Binding, PayloadStream, Pull};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Lifecycle of a key's dynamic payload stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Registered, no stream started yet.
    #[default]
    Init,
    /// A live stream has been started and not yet exhausted.
    Running,
    /// The stream was exhausted or abandoned, or a raw entry completed its pass.
    Done,
}

/// Mutable progress of one key.
#[derive(Debug, Default)]
pub(crate) struct KeyFields {
    pub(crate) path_position: usize,
    pub(crate) raw_position: usize,
    /// `None` both before the first start and after exhaustion or timeout.
    pub(crate) stream: Option<PayloadStream>,
    pub(crate) latest_binding: Option<Binding>,
    pub(crate) phase: Phase,
}

/// Per-key state guarded by its own locks, nested under the coordinator map.
///
/// `fields` is only ever held for short field updates. `pull` is held for the
/// whole duration of a timed pull so that a key has at most one pull in flight
/// without blocking readers of its fields.
#[derive(Debug, Default)]
pub(crate) struct KeyState {
    fields: Mutex<KeyFields>,
    pull: Mutex<()>,
}

impl KeyState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fields(&self) -> MutexGuard<'_, KeyFields> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a stream with `start` unless one is already live.
    pub(crate) fn start_stream_with<F>(&self, key: &str, start: F)
    where
        F: FnOnce() -> PayloadStream,
    {
        let mut fields = self.fields();
        if fields.stream.is_none() {
            fields.stream = Some(start());
            fields.phase = Phase::Running;
            debug!(key = key, "Payload stream started");
        }
    }

    /// Pulls the next binding from the live stream, if any, and applies the
    /// outcome to this key's fields.
    pub(crate) fn pull_next(&self, key: &str, timeout: std::time::Duration) {
        let _in_flight = self.pull.lock().unwrap_or_else(PoisonError::into_inner);

        // The handle is cloned so the field lock is not held while waiting.
        // Only pulls (serialized above) ever clear `stream`, so it is still the
        // same live stream when the outcome is applied below.
        let stream = match self.fields().stream.clone() {
            Some(stream) => stream,
            None => return,
        };

        let outcome = stream.pull(timeout);
        let mut fields = self.fields();
        match outcome {
            Pull::Binding(binding) => {
                fields.latest_binding = Some(binding);
            }
            Pull::Exhausted => {
                fields.stream = None;
                fields.latest_binding = None;
                fields.phase = Phase::Done;
                debug!(key = key, "Payload stream exhausted");
            }
            Pull::TimedOut => {
                fields.stream = None;
                fields.phase = Phase::Done;
                warn!(
                    key = key,
                    timeout = ?timeout,
                    "Payload stream stalled, abandoning it"
                );
            }
        }
    }

    pub(crate) fn snapshot(&self) -> KeySnapshot {
        let fields = self.fields();
        KeySnapshot {
            path_position: fields.path_position,
            raw_position: fields.raw_position,
            phase: fields.phase,
            stream_live: fields.stream.is_some(),
            latest_binding: fields.latest_binding.clone(),
        }
    }
}

/// Point-in-time copy of a key's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySnapshot {
    pub path_position: usize,
    pub raw_position: usize,
    pub phase: Phase,
    pub stream_live: bool,
    pub latest_binding: Option<Binding>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn binding(value: &str) -> Binding {
        Binding::from([("var".to_string(), value.to_string())])
    }

    #[test]
    fn new_key_state_starts_in_init_without_stream() {
        let state = KeyState::new();
        let snapshot = state.snapshot();

        assert_eq!(snapshot.phase, Phase::Init);
        assert_eq!(snapshot.path_position, 0);
        assert_eq!(snapshot.raw_position, 0);
        assert!(!snapshot.stream_live);
        assert!(snapshot.latest_binding.is_none());
    }

    #[test]
    fn start_stream_with_is_idempotent_while_live() {
        let state = KeyState::new();
        let mut starts = 0;

        for _ in 0..3 {
            state.start_stream_with("k", || {
                starts += 1;
                PayloadStream::spawn(1, |sink| {
                    sink.emit(binding("x"));
                })
            });
        }

        assert_eq!(starts, 1, "Only one stream should be started while live");
        assert_eq!(state.snapshot().phase, Phase::Running);
    }

    #[test]
    fn pull_next_without_stream_leaves_state_untouched() {
        let state = KeyState::new();
        state.pull_next("k", Duration::from_millis(10));

        assert_eq!(state.snapshot().phase, Phase::Init);
    }

    #[test]
    fn timed_out_pull_keeps_last_binding() {
        let (sender, receiver) = crossbeam_channel::bounded::<Binding>(1);
        sender
            .send(binding("first"))
            .expect("Channel should accept the first binding");
        let state = KeyState::new();
        state.start_stream_with("k", || PayloadStream::from_receiver(receiver));

        state.pull_next("k", Duration::from_millis(20));
        state.pull_next("k", Duration::from_millis(20));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.phase, Phase::Done);
        assert!(!snapshot.stream_live, "Timed out stream should be dropped");
        assert_eq!(
            snapshot.latest_binding,
            Some(binding("first")),
            "Timeout must not clear the last seen binding"
        );
        drop(sender);
    }
}
