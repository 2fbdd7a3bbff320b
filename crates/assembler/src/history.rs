//! Conversation history management.
//!
//! A [`ConversationHistory`] keeps the most recent turns of one session and
//! never holds more than `max_turns` of them after any call. Old turns are
//! evicted from the front in pairs, so a user message and the reply to it
//! leave together.
//!
//! [`SessionHistories`] maps session ids to histories and caps how many
//! sessions stay in memory.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use ragbridge_core::message::{ConversationTurn, SessionId};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// The bounded turn log of one session.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
}

impl ConversationHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns + 1),
            max_turns,
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a user turn, then evict.
    pub fn record_user(&mut self, message: impl Into<String>) {
        self.turns.push_back(ConversationTurn::user(message));
        self.evict();
    }

    /// Append an assistant turn, then evict.
    pub fn record_assistant(&mut self, reply: impl Into<String>) {
        self.turns.push_back(ConversationTurn::assistant(reply));
        self.evict();
    }

    /// The most recent `last_n` turns, oldest first.
    pub fn view(&self, last_n: usize) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(last_n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    fn evict(&mut self) {
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
            self.turns.pop_front();
        }
    }
}

struct SessionSlot {
    history: Arc<Mutex<ConversationHistory>>,
    last_used: u64,
}

struct SessionTable {
    slots: HashMap<SessionId, SessionSlot>,
    tick: u64,
}

/// Per-session histories with least-recently-used eviction.
///
/// The table lock is held only to look a session up; each history has its
/// own lock, so different sessions never wait on each other.
#[derive(Clone)]
pub struct SessionHistories {
    table: Arc<Mutex<SessionTable>>,
    max_turns: usize,
    max_sessions: usize,
}

impl SessionHistories {
    pub fn new(max_turns: usize, max_sessions: usize) -> Self {
        Self {
            table: Arc::new(Mutex::new(SessionTable {
                slots: HashMap::new(),
                tick: 0,
            })),
            max_turns,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Lock the history for `session`, creating it if needed.
    ///
    /// Hold the guard for the whole read-generate-record cycle so concurrent
    /// requests on one session see each other's exchanges in order.
    pub async fn lock(&self, session: &SessionId) -> OwnedMutexGuard<ConversationHistory> {
        let history = {
            let mut table = self.table.lock().await;
            table.tick += 1;
            let tick = table.tick;

            if !table.slots.contains_key(session) && table.slots.len() >= self.max_sessions {
                let oldest = table
                    .slots
                    .iter()
                    .min_by_key(|(_, slot)| slot.last_used)
                    .map(|(id, _)| id.clone());
                if let Some(oldest) = oldest {
                    debug!(session = %oldest, "Evicting least recently used session");
                    table.slots.remove(&oldest);
                }
            }

            let max_turns = self.max_turns;
            let slot = table.slots.entry(session.clone()).or_insert_with(|| SessionSlot {
                history: Arc::new(Mutex::new(ConversationHistory::new(max_turns))),
                last_used: tick,
            });
            slot.last_used = tick;
            slot.history.clone()
        };

        history.lock_owned().await
    }

    /// Snapshot of a session's turns without creating it.
    pub async fn snapshot(&self, session: &SessionId) -> Vec<ConversationTurn> {
        let history = {
            let table = self.table.lock().await;
            table.slots.get(session).map(|slot| slot.history.clone())
        };
        match history {
            Some(h) => h.lock().await.view(usize::MAX),
            None => Vec::new(),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.table.lock().await.slots.len()
    }
}
