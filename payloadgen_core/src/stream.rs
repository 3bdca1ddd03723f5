use crate::attack::AttackType;
use crate::payloads::PayloadLists;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// One combination of payload values: variable name -> value.
pub type Binding = HashMap<String, String>;

/// Outcome of a single timed pull from a [`PayloadStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pull {
    /// The producer handed over the next binding.
    Binding(Binding),
    /// The producer closed the stream; no further bindings will arrive.
    Exhausted,
    /// Nothing arrived before the deadline.
    TimedOut,
}

/// Consumer half of a bounded handoff between a producer and one key.
///
/// Single-pass: every binding is delivered once. Dropping the stream
/// disconnects it, after which [`StreamSink::emit`] starts returning `false`.
#[derive(Debug, Clone)]
pub struct PayloadStream {
    receiver: Receiver<Binding>,
}

impl PayloadStream {
    /// Wraps the receiving end of an existing channel.
    pub fn from_receiver(receiver: Receiver<Binding>) -> Self {
        Self { receiver }
    }

    /// Runs `produce` on its own thread, feeding a channel that holds at most
    /// `capacity` unconsumed bindings. The stream closes once `produce` returns
    /// and the sink is dropped.
    ///
    /// If the producer thread cannot be spawned the failure is logged and the
    /// returned stream is already closed.
    pub fn spawn<F>(capacity: usize, produce: F) -> Self
    where
        F: FnOnce(StreamSink) + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let sink = StreamSink { sender };
        let spawned = thread::Builder::new()
            .name("payload-producer".to_string())
            .spawn(move || produce(sink));
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to spawn payload producer thread");
        }
        Self { receiver }
    }

    /// Waits for the next binding, giving up after `timeout`.
    pub fn pull(&self, timeout: Duration) -> Pull {
        match self.receiver.recv_timeout(timeout) {
            Ok(binding) => Pull::Binding(binding),
            Err(RecvTimeoutError::Disconnected) => Pull::Exhausted,
            Err(RecvTimeoutError::Timeout) => Pull::TimedOut,
        }
    }
}

/// Producer half handed to the closure given to [`PayloadStream::spawn`].
#[derive(Debug)]
pub struct StreamSink {
    sender: Sender<Binding>,
}

impl StreamSink {
    /// Blocks until the binding is accepted. Returns `false` once the consumer
    /// is gone; producers should stop generating at that point.
    pub fn emit(&self, binding: Binding) -> bool {
        self.sender.send(binding).is_ok()
    }
}

/// Produces a fresh, live stream of bindings for one key.
///
/// Invoked once per stream start with the coordinator's attack type and its
/// loaded value lists. Every call must return an independent stream; the
/// combination logic (sniper, pitchfork, clusterbomb) lives behind this trait.
pub trait StreamProducer: Send + Sync {
    fn produce(&self, attack: AttackType, lists: Arc<PayloadLists>) -> PayloadStream;
}

impl<F> StreamProducer for F
where
    F: Fn(AttackType, Arc<PayloadLists>) -> PayloadStream + Send + Sync,
{
    fn produce(&self, attack: AttackType, lists: Arc<PayloadLists>) -> PayloadStream {
        self(attack, lists)
    }
}
