use crate::attack::AttackType;
use crate::config::GeneratorConfig;
use crate::payloads::{PayloadError, PayloadLists, PayloadLoader, PayloadSpecs};
use crate::state::{KeySnapshot, KeyState, Phase};
use crate::stream::{Binding, StreamProducer};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Upper bound on how long [`GeneratorCoordinator::read_one`] waits for a
/// producer before abandoning the key's stream.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Payload loading failed: {0}")]
    Payload(#[from] PayloadError),
}

/// Drives independent payload-generation sessions, one per key.
///
/// Each key walks the shared static `paths` and `raws` lists with its own
/// counters and, when payloads are configured, consumes its own dynamic stream
/// of bindings obtained from the configured [`StreamProducer`].
///
/// Unknown keys never produce errors: queries return their empty value and
/// mutators do nothing.
///
/// # Locking
/// The key map sits behind a coordinator-wide `RwLock`. `add`, `delete`,
/// `reset` and `increment` take it exclusively; every other operation takes it
/// shared just long enough to find the key, then works under that key's own
/// lock. `read_one` is the only blocking call and is bounded by the read
/// timeout.
pub struct GeneratorCoordinator {
    attack: AttackType,
    paths: Vec<String>,
    raws: Vec<String>,
    payloads: Arc<PayloadLists>,
    producer: Option<Arc<dyn StreamProducer>>,
    read_timeout: Duration,
    keys: RwLock<HashMap<String, Arc<KeyState>>>,
}

impl std::fmt::Debug for GeneratorCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorCoordinator")
            .field("attack", &self.attack)
            .field("paths", &self.paths.len())
            .field("raws", &self.raws.len())
            .field("payloads", &self.payloads.keys().collect::<Vec<_>>())
            .field("read_timeout", &self.read_timeout)
            .field("keys", &self.len())
            .finish()
    }
}

impl GeneratorCoordinator {
    /// Creates a coordinator over static lists only. Use
    /// [`with_payloads`](Self::with_payloads) to add dynamic payloads.
    pub fn new(attack: AttackType, paths: Vec<String>, raws: Vec<String>) -> Self {
        Self {
            attack,
            paths,
            raws,
            payloads: Arc::new(PayloadLists::new()),
            producer: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Loads the declared payloads once and remembers `producer` for starting
    /// per-key streams. Empty `specs` leave the coordinator payload-free.
    pub fn with_payloads(
        mut self,
        specs: &PayloadSpecs,
        loader: &dyn PayloadLoader,
        producer: Arc<dyn StreamProducer>,
    ) -> Result<Self, GeneratorError> {
        if specs.is_empty() {
            return Ok(self);
        }
        let lists = loader.load(specs)?;
        debug!(
            attack = %self.attack,
            variables = lists.len(),
            "Payload lists loaded"
        );
        self.payloads = Arc::new(lists);
        self.producer = Some(producer);
        Ok(self)
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Builds a coordinator from a parsed [`GeneratorConfig`].
    pub fn from_config(
        config: &GeneratorConfig,
        loader: &dyn PayloadLoader,
        producer: Arc<dyn StreamProducer>,
    ) -> Result<Self, GeneratorError> {
        Self::new(config.attack, config.paths.clone(), config.raws.clone())
            .with_read_timeout(config.read_timeout())
            .with_payloads(&config.payloads, loader, producer)
    }

    pub fn attack_type(&self) -> AttackType {
        self.attack
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn raws(&self) -> &[String] {
        &self.raws
    }

    pub fn payload_lists(&self) -> &PayloadLists {
        &self.payloads
    }

    pub fn has_payloads(&self) -> bool {
        !self.payloads.is_empty()
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn read_keys(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<KeyState>>> {
        self.keys.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_keys(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<KeyState>>> {
        self.keys.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, key: &str) -> Option<Arc<KeyState>> {
        self.read_keys().get(key).cloned()
    }

    /// Registers `key`. Re-adding a known key keeps its progress.
    pub fn add(&self, key: &str) {
        self.write_keys()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(KeyState::new()));
    }

    pub fn has(&self, key: &str) -> bool {
        self.read_keys().contains_key(key)
    }

    /// Forgets `key`. A live stream is dropped without draining it; its
    /// producer sees the disconnect on its next emit.
    pub fn delete(&self, key: &str) {
        self.write_keys().remove(key);
    }

    /// Rewinds both static counters of `key`, registering it first if needed.
    ///
    /// The phase and any live stream are left alone, so a key reset mid-stream
    /// walks the static lists again while continuing the same dynamic stream.
    pub fn reset(&self, key: &str) {
        let mut keys = self.write_keys();
        let state = keys
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(KeyState::new()));
        let mut fields = state.fields();
        fields.path_position = 0;
        fields.raw_position = 0;
    }

    /// Starts a dynamic stream for `key` if payloads are configured and the key
    /// has no live stream. Never runs two streams for one key.
    pub fn init_or_skip(&self, key: &str) {
        let producer = match &self.producer {
            Some(producer) if self.has_payloads() => producer,
            _ => return,
        };
        let Some(state) = self.entry(key) else {
            return;
        };
        state.start_stream_with(key, || {
            producer.produce(self.attack, Arc::clone(&self.payloads))
        });
    }

    /// Pulls the next binding for `key`, waiting at most the read timeout.
    ///
    /// On a binding it becomes the key's [`value`](Self::value). On exhaustion
    /// the stream and value are cleared and the key is `Done`. On timeout the
    /// stream is abandoned and the key is `Done`, but the last value is kept.
    /// Returns immediately for unknown keys and keys without a live stream.
    pub fn read_one(&self, key: &str) {
        let Some(state) = self.entry(key) else {
            return;
        };
        state.pull_next(key, self.read_timeout);
    }

    /// Most recently pulled binding for `key`.
    pub fn value(&self, key: &str) -> Option<Binding> {
        self.entry(key)?.fields().latest_binding.clone()
    }

    /// Whether `key` has work left.
    pub fn next(&self, key: &str) -> bool {
        let Some(state) = self.entry(key) else {
            return false;
        };
        let fields = state.fields();
        if self.has_payloads() && fields.phase == Phase::Done {
            return false;
        }
        fields.path_position + fields.raw_position < self.total()
    }

    pub fn position(&self, key: &str) -> usize {
        self.entry(key).map_or(0, |state| {
            let fields = state.fields();
            fields.path_position + fields.raw_position
        })
    }

    /// The static literal `key` currently points at: the path entry while the
    /// path walk is in range, otherwise the raw entry. Empty for unknown keys
    /// and for positions past both lists.
    pub fn current(&self, key: &str) -> &str {
        let Some(state) = self.entry(key) else {
            return "";
        };
        let fields = state.fields();
        if !self.paths.is_empty() && fields.path_position < self.paths.len() {
            return &self.paths[fields.path_position];
        }
        self.raws
            .get(fields.raw_position)
            .map_or("", String::as_str)
    }

    /// Number of static entries, shared by every key.
    pub fn total(&self) -> usize {
        self.paths.len() + self.raws.len()
    }

    /// Advances `key` by one static entry.
    ///
    /// Paths are walked first. Raw entries only advance once the key has no
    /// live stream, and each raw advance marks the key `Done`.
    pub fn increment(&self, key: &str) {
        let keys = self.write_keys();
        let Some(state) = keys.get(key) else {
            return;
        };
        let mut fields = state.fields();

        if !self.paths.is_empty() && fields.path_position < self.paths.len() {
            fields.path_position += 1;
            return;
        }

        if !self.raws.is_empty() && fields.raw_position < self.raws.len() && fields.stream.is_none()
        {
            fields.phase = Phase::Done;
            fields.raw_position += 1;
        }
    }

    pub fn phase(&self, key: &str) -> Option<Phase> {
        Some(self.entry(key)?.fields().phase)
    }

    pub fn snapshot(&self, key: &str) -> Option<KeySnapshot> {
        Some(self.entry(key)?.snapshot())
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read_keys().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.read_keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
