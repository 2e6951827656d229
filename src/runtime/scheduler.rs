use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use super::context::{ContextId, Handle};

/// What a blocked context is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    Join(Handle),
    Lock(String),
    Slot { buffer: String, index: i64 },
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitCondition::Join(handle) => write!(f, "join on {handle}"),
            WaitCondition::Lock(name) => write!(f, "lock '{name}'"),
            WaitCondition::Slot { buffer, index } => write!(f, "write to {buffer}[{index}]"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Blocked {
    pub id: ContextId,
    pub priority: i64,
    pub condition: WaitCondition,
    /// Variable receiving the wait's result.
    pub bind: Option<String>,
    /// Turn the context blocked on.
    pub since: u64,
    /// Turn at which the wait times out.
    pub deadline: Option<u64>,
    pub line: usize,
    pub column: usize,
}

/// Cooperative run queues.
///
/// The clock counts dispatches. Ready contexts are ordered by
/// `(priority, enqueue sequence)`, timers by `(wake turn, priority,
/// sequence)`, and blocked contexts are kept in the order they blocked.
#[derive(Debug, Default)]
pub struct Scheduler {
    clock: u64,
    sequence: u64,
    ready: BTreeMap<(i64, u64), ContextId>,
    timers: BTreeMap<(u64, i64, u64), ContextId>,
    blocked: Vec<Blocked>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn enqueue(&mut self, id: ContextId, priority: i64) {
        let sequence = self.next_sequence();
        self.ready.insert((priority, sequence), id);
    }

    /// Parks `id` until `turns` more dispatches have happened.
    pub fn sleep(&mut self, id: ContextId, priority: i64, turns: u64) {
        if turns == 0 {
            self.enqueue(id, priority);
            return;
        }
        let wake = self.clock.saturating_add(turns);
        let sequence = self.next_sequence();
        self.timers.insert((wake, priority, sequence), id);
    }

    pub fn block(&mut self, blocked: Blocked) {
        self.blocked.push(blocked);
    }

    /// Moves every timer that is due onto the ready queue.
    pub fn release_timers(&mut self) {
        while let Some(entry) = self.timers.first_entry() {
            let (wake, priority, _) = *entry.key();
            if wake > self.clock {
                break;
            }
            let id = entry.remove();
            debug!(context = %id, turn = self.clock, "timer fired");
            self.enqueue(id, priority);
        }
    }

    /// Takes the blocked list, oldest first, so the caller can re-check each
    /// condition and `block` again whatever stays blocked.
    pub fn drain_blocked(&mut self) -> Vec<Blocked> {
        std::mem::take(&mut self.blocked)
    }

    /// Pops the next ready context and counts the dispatch.
    pub fn dispatch(&mut self) -> Option<(ContextId, u64)> {
        let (_, id) = self.ready.pop_first()?;
        self.clock += 1;
        Some((id, self.clock))
    }

    /// With nothing ready, jumps the clock to the earliest timer or wait
    /// deadline. Returns whether anything is pending in time.
    pub fn fast_forward(&mut self) -> bool {
        if !self.ready.is_empty() {
            return true;
        }
        let next_timer = self.timers.keys().next().map(|(wake, _, _)| *wake);
        let next_deadline = self.blocked.iter().filter_map(|b| b.deadline).min();
        let Some(target) = next_timer.into_iter().chain(next_deadline).min() else {
            return false;
        };
        if target > self.clock {
            debug!(from = self.clock, to = target, "clock fast-forward");
            self.clock = target;
        }
        true
    }

    /// Removes the context that has been blocked longest.
    pub fn pop_oldest_blocked(&mut self) -> Option<Blocked> {
        if self.blocked.is_empty() {
            None
        } else {
            Some(self.blocked.remove(0))
        }
    }

    /// Drops `id` from every queue.
    pub fn remove(&mut self, id: ContextId) {
        self.ready.retain(|_, queued| *queued != id);
        self.timers.retain(|_, queued| *queued != id);
        self.blocked.retain(|blocked| blocked.id != id);
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}
