//! Ordered table of registered blocks.
//!
//! Registration order is output order. Each entry keeps its latest
//! snapshot in an [`ArcSwap`], so the block task replaces it atomically
//! and the render pass never sees a half-written entry.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use arc_swap::ArcSwap;
use uuid::Uuid;

use crate::block::{Block, Hooks, Schedule};
use crate::error::{BlockFailure, RegistryError};
use crate::signals::Signal;
use crate::state::{Color, Snapshot, State};

/// Lifecycle of a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockStatus {
    /// Registered, task not started.
    Pending = 0,
    Active = 1,
    /// A hook failed; the entry shows an error snapshot from now on.
    Errored = 2,
    /// The block aborted itself.
    Finished = 3,
}

impl BlockStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => BlockStatus::Active,
            2 => BlockStatus::Errored,
            3 => BlockStatus::Finished,
            _ => BlockStatus::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BlockStatus::Errored | BlockStatus::Finished)
    }
}

pub struct Entry {
    index: usize,
    block: Arc<dyn Block>,
    name: String,
    instance: String,
    signals: BTreeSet<Signal>,
    defaults: State,
    hooks: Hooks,
    schedule: Schedule,
    snapshot: ArcSwap<Snapshot>,
    status: AtomicU8,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("instance", &self.instance)
            .field("signals", &self.signals)
            .field("status", &self.status())
            .finish()
    }
}

impl Entry {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn block(&self) -> &Arc<dyn Block> {
        &self.block
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn signals(&self) -> &BTreeSet<Signal> {
        &self.signals
    }

    pub fn is_subscribed(&self, signal: Signal) -> bool {
        self.signals.contains(&signal)
    }

    pub fn hooks(&self) -> Hooks {
        self.hooks
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn defaults(&self) -> &State {
        &self.defaults
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    pub fn status(&self) -> BlockStatus {
        BlockStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: BlockStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Build the next snapshot: `partial` over the defaults, with this
    /// entry's identity stamped on regardless of what the block set.
    pub fn compose(&self, partial: State) -> Snapshot {
        Snapshot::new(
            self.name.clone(),
            self.instance.clone(),
            partial.merged_over(&self.defaults),
        )
    }

    pub(crate) fn publish(&self, snapshot: Snapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }

    pub(crate) fn error_snapshot(&self, failure: &BlockFailure) -> Snapshot {
        self.compose(
            State::text(format!("Exception in {}: {}", self.name, failure))
                .with_urgent(true)
                .with_color(Color::URGENT),
        )
    }
}

#[derive(Default)]
pub struct Registry {
    entries: Vec<Arc<Entry>>,
    by_instance: HashMap<String, usize>,
    // Arc data pointer -> index, to catch the same block registered twice.
    identities: HashMap<usize, usize>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `block`, returning its freshly allocated instance id.
    pub fn register(
        &mut self,
        block: Arc<dyn Block>,
        signals: impl IntoIterator<Item = Signal>,
    ) -> Result<String, RegistryError> {
        let name = block.name().to_string();
        let identity = Arc::as_ptr(&block) as *const () as usize;

        if let Some(&existing) = self.identities.get(&identity) {
            return Err(RegistryError::DuplicateRegistration {
                name,
                instance: self.entries[existing].instance.clone(),
            });
        }

        let signals: BTreeSet<Signal> = signals.into_iter().collect();
        if let Some(&signal) = signals.iter().find(|s| s.is_termination()) {
            return Err(RegistryError::ReservedSignal { name, signal });
        }

        let mut instance = Uuid::new_v4().simple().to_string();
        while self.by_instance.contains_key(&instance) {
            instance = Uuid::new_v4().simple().to_string();
        }

        // Defaults never carry text: `full_text` stays empty until the first run.
        let defaults = State {
            full_text: String::new(),
            ..block.default_state()
        };
        let initial = Snapshot::new(name.clone(), instance.clone(), defaults.clone());
        let index = self.entries.len();

        let entry = Arc::new(Entry {
            index,
            hooks: block.hooks(),
            schedule: block.schedule(),
            block,
            name,
            instance: instance.clone(),
            signals,
            defaults,
            snapshot: ArcSwap::from_pointee(initial),
            status: AtomicU8::new(BlockStatus::Pending as u8),
        });

        self.entries.push(entry);
        self.by_instance.insert(instance.clone(), index);
        self.identities.insert(identity, index);

        Ok(instance)
    }

    /// Every current snapshot, in registration order.
    pub fn snapshots(&self) -> Vec<Arc<Snapshot>> {
        self.entries.iter().map(|e| e.snapshot()).collect()
    }

    pub fn resolve(&self, instance: &str) -> Result<&Arc<Entry>, RegistryError> {
        self.by_instance
            .get(instance)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| RegistryError::NotFound(instance.to_string()))
    }

    /// Entries subscribed to `signal`, in registration order.
    pub fn subscribers(&self, signal: Signal) -> Vec<Arc<Entry>> {
        self.entries
            .iter()
            .filter(|e| e.is_subscribed(signal))
            .cloned()
            .collect()
    }

    /// Union of every subscribed signal.
    pub fn signals(&self) -> BTreeSet<Signal> {
        self.entries
            .iter()
            .flat_map(|e| e.signals.iter().copied())
            .collect()
    }

    pub fn entries(&self) -> &[Arc<Entry>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
