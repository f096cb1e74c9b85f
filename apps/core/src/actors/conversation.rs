//! Per-conversation turn history.
//!
//! Each conversation id owns a `tokio::sync::Mutex`; holding its owned guard
//! is the only way to read-modify-write the history, so utterances for the
//! same id are serialized while different ids never wait on each other.

use crate::actors::traits::ConversationStore;
use crate::config::{DEFAULT_CONVERSATION_IDLE_SECS, DEFAULT_MAX_CONVERSATIONS, PipelineConfig};
use crate::models::ConversationTurn;
use async_trait::async_trait;
use lru::LruCache;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Memory notes kept per conversation; older ones are dropped first.
pub const MAX_MEMORY_NOTES: usize = 8;

/// Exclusive access to one conversation, held for a whole utterance.
pub type ConversationGuard = OwnedMutexGuard<ConversationState>;

/// Ordered turn history plus the memory notes compiled for it.
#[derive(Debug, Clone)]
pub struct ConversationState {
    id: String,
    turns: Vec<ConversationTurn>,
    memory: VecDeque<String>,
}

impl ConversationState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            turns: Vec::new(),
            memory: VecDeque::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stored turns, oldest first.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Drops the oldest turns until at most `max_len` remain. Turns are
    /// removed two at a time so user/assistant pairs stay intact. Returns
    /// the number of turns dropped.
    pub fn trim(&mut self, max_len: usize) -> usize {
        if self.turns.len() <= max_len {
            return 0;
        }
        let excess = self.turns.len() - max_len;
        let drop = (excess + excess % 2).min(self.turns.len());
        self.turns.drain(..drop);
        drop
    }

    /// The last `n` turns, oldest first.
    pub fn context_window(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn memory_notes(&self) -> Vec<String> {
        self.memory.iter().cloned().collect()
    }

    /// Keeps a non-empty memory note for later turns.
    pub fn remember(&mut self, note: impl Into<String>) {
        let note = note.into();
        if note.trim().is_empty() {
            return;
        }
        if self.memory.len() == MAX_MEMORY_NOTES {
            self.memory.pop_front();
        }
        self.memory.push_back(note);
    }
}

struct Slot {
    state: Arc<Mutex<ConversationState>>,
    last_used: Instant,
}

impl Slot {
    /// A guard or a waiter holds another reference to the state.
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.state) > 1
    }
}

/// Process-local conversation store with LRU and idle-time eviction.
pub struct InMemoryConversationStore {
    slots: StdMutex<LruCache<String, Slot>>,
    idle_ttl: Duration,
    max_conversations: usize,
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_CONVERSATION_IDLE_SECS),
            DEFAULT_MAX_CONVERSATIONS,
        )
    }
}

impl InMemoryConversationStore {
    pub fn new(idle_ttl: Duration, max_conversations: usize) -> Self {
        Self {
            slots: StdMutex::new(LruCache::unbounded()),
            idle_ttl,
            max_conversations,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.conversation_idle_ttl(), config.max_conversations)
    }

    fn slots(&self) -> StdMutexGuard<'_, LruCache<String, Slot>> {
        // A panic while holding this lock cannot leave the cache half-updated.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drops idle entries, then the least recently used idle entries beyond
    /// capacity. Entries in use are never touched.
    fn sweep(&self, slots: &mut LruCache<String, Slot>) -> usize {
        let now = Instant::now();
        let mut overflow = slots.len().saturating_sub(self.max_conversations);
        let mut doomed = Vec::new();

        // Least recently used first; last_used grows along this order.
        for (id, slot) in slots.iter().rev() {
            let expired = now.duration_since(slot.last_used) >= self.idle_ttl;
            if !expired && overflow == 0 {
                break;
            }
            if slot.in_use() {
                continue;
            }
            doomed.push(id.clone());
            overflow = overflow.saturating_sub(1);
        }

        for id in &doomed {
            slots.pop(id);
        }
        if !doomed.is_empty() {
            debug!(evicted = doomed.len(), remaining = slots.len(), "Evicted conversations");
        }
        doomed.len()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn acquire(&self, conversation_id: &str) -> ConversationGuard {
        let state = {
            let mut slots = self.slots();
            let state = match slots.get_mut(conversation_id) {
                Some(slot) => {
                    slot.last_used = Instant::now();
                    Arc::clone(&slot.state)
                }
                None => {
                    info!(conversation_id, "Opening conversation");
                    let state = Arc::new(Mutex::new(ConversationState::new(conversation_id)));
                    slots.put(
                        conversation_id.to_string(),
                        Slot {
                            state: Arc::clone(&state),
                            last_used: Instant::now(),
                        },
                    );
                    state
                }
            };
            self.sweep(&mut slots);
            state
        };

        state.lock_owned().await
    }

    async fn snapshot(&self, conversation_id: &str) -> Vec<ConversationTurn> {
        let state = {
            let slots = self.slots();
            match slots.peek(conversation_id) {
                Some(slot) => Arc::clone(&slot.state),
                None => return Vec::new(),
            }
        };
        let guard = state.lock().await;
        guard.turns().to_vec()
    }

    fn conversation_count(&self) -> usize {
        self.slots().len()
    }

    fn evict_idle(&self) -> usize {
        let mut slots = self.slots();
        self.sweep(&mut slots)
    }
}
