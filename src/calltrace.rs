//! Control-flow trace buffers
//!
//! The interpreter reports every taken control-flow instruction here. Events
//! land in a hot ring that deduplicates repeats of the same branch (same M1
//! address, same kind, same target) by bumping a loop counter; when the hot
//! ring is full, the entry not seen for the longest time is demoted into the
//! cold ring. Debugger queries always receive copies, never live references.

use crate::memory::PageKind;
use crate::memory::PageRef;
use crate::profiler::SessionState;

/// Hot ring capacity (deduplicated entries).
pub const HOT_CAPACITY: usize = 64;
/// Cold ring capacity (plain chronological records).
pub const COLD_CAPACITY: usize = 8192;

/// Control-flow instruction classes fed into the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Jp,
    Jr,
    Call,
    Rst,
    Ret,
    Reti,
    Djnz,
}

impl FlowKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Jp => "JP",
            Self::Jr => "JR",
            Self::Call => "CALL",
            Self::Rst => "RST",
            Self::Ret => "RET",
            Self::Reti => "RETI",
            Self::Djnz => "DJNZ",
        }
    }
}

/// Per-bank mapping snapshot captured with each event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BankSnapshot {
    pub is_rom: bool,
    pub page: u8,
}

impl From<PageRef> for BankSnapshot {
    fn from(page: PageRef) -> Self {
        Self { is_rom: page.kind == PageKind::Rom, page: page.index }
    }
}

/// One control-flow record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTraceEvent {
    /// Address of the instruction's M1 fetch
    pub m1_pc: u16,
    pub kind: FlowKind,
    /// Branch target (for RET family: the popped return address)
    pub target: u16,
    /// F register at the instruction
    pub flags: u8,
    pub sp: u16,
    /// Raw opcode bytes, `opcode_len` of them valid
    pub opcode: [u8; 4],
    pub opcode_len: u8,
    /// Bank mapping at the time of the event
    pub banks: [BankSnapshot; 4],
    /// Up to three 16-bit words from the top of the stack
    pub stack_top: [u16; 3],
    /// Times this exact branch repeated while hot
    pub loop_count: u32,
    /// Set when the event was ever promoted to the hot ring
    pub was_hot: bool,
}

/// Hot-ring entry: a trace event plus recency bookkeeping.
#[derive(Debug, Clone)]
pub struct HotEvent {
    pub event: CallTraceEvent,
    pub last_seen_frame: u64,
}

/// Aggregate statistics for the `calltrace stats` query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallTraceStats {
    pub total_events: u64,
    pub hot_hits: u64,
    pub hot_entries: usize,
    pub cold_entries: usize,
}

/// Bounded hot/cold control-flow buffers.
pub struct CallTraceBuffer {
    hot: Vec<HotEvent>,
    cold: Vec<CallTraceEvent>,
    cold_write: usize,
    cold_count: usize,
    total_events: u64,
    hot_hits: u64,
    session: SessionState,
}

impl CallTraceBuffer {
    pub fn new() -> Self {
        Self {
            hot: Vec::with_capacity(HOT_CAPACITY),
            cold: Vec::with_capacity(COLD_CAPACITY),
            cold_write: 0,
            cold_count: 0,
            total_events: 0,
            hot_hits: 0,
            session: SessionState::new(),
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    /// Record one control-flow event. No-op unless the session is capturing.
    pub fn push(&mut self, mut event: CallTraceEvent, frame: u64) {
        if !self.session.is_capturing() {
            return;
        }
        self.total_events += 1;

        if let Some(entry) = self.hot.iter_mut().find(|entry| {
            entry.event.m1_pc == event.m1_pc
                && entry.event.kind == event.kind
                && entry.event.target == event.target
        }) {
            entry.event.loop_count = entry.event.loop_count.wrapping_add(1);
            entry.event.was_hot = true;
            entry.last_seen_frame = frame;
            self.hot_hits += 1;
            return;
        }

        event.loop_count = 1;
        if self.hot.len() == HOT_CAPACITY {
            // Demote the stalest hot entry to make room.
            let stalest = self
                .hot
                .iter()
                .enumerate()
                .min_by_key(|(_, entry)| entry.last_seen_frame)
                .map(|(idx, _)| idx)
                .unwrap_or(0);
            let demoted = self.hot.swap_remove(stalest);
            self.push_cold(demoted.event);
        }
        self.hot.push(HotEvent { event, last_seen_frame: frame });
    }

    fn push_cold(&mut self, event: CallTraceEvent) {
        if self.cold.len() < COLD_CAPACITY {
            self.cold.push(event);
        } else {
            self.cold[self.cold_write] = event;
        }
        self.cold_write = (self.cold_write + 1) % COLD_CAPACITY;
        self.cold_count = (self.cold_count + 1).min(COLD_CAPACITY);
    }

    /// Copy of up to `limit` most recent cold events, newest last.
    pub fn latest(&self, limit: usize) -> Vec<CallTraceEvent> {
        let take = limit.min(self.cold_count);
        let mut events = Vec::with_capacity(take);
        for i in 0..take {
            let idx = (self.cold_write + COLD_CAPACITY - take + i) % COLD_CAPACITY;
            events.push(self.cold[idx].clone());
        }
        events
    }

    /// Copy of the hot ring, most recently seen first.
    pub fn hot_snapshot(&self) -> Vec<HotEvent> {
        let mut entries = self.hot.clone();
        entries.sort_by(|a, b| b.last_seen_frame.cmp(&a.last_seen_frame));
        entries
    }

    pub fn stats(&self) -> CallTraceStats {
        CallTraceStats {
            total_events: self.total_events,
            hot_hits: self.hot_hits,
            hot_entries: self.hot.len(),
            cold_entries: self.cold_count,
        }
    }

    /// Drop all buffered events; session state is untouched.
    pub fn clear(&mut self) {
        self.hot.clear();
        self.cold.clear();
        self.cold_write = 0;
        self.cold_count = 0;
        self.total_events = 0;
        self.hot_hits = 0;
    }

    /// Text report of the hot ring, one event per line.
    pub fn save_text(&self) -> String {
        let mut out = String::new();
        for entry in self.hot_snapshot() {
            let e = &entry.event;
            out.push_str(&format!(
                "{} ${:04X} -> ${:04X} loops={} frame={} sp=${:04X}\n",
                e.kind.name(),
                e.m1_pc,
                e.target,
                e.loop_count,
                entry.last_seen_frame,
                e.sp,
            ));
        }
        out
    }
}

impl Default for CallTraceBuffer {
    fn default() -> Self {
        Self::new()
    }
}
