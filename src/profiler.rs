//! Opcode profiler
//!
//! Two components driven inline by the interpreter while the session is
//! capturing:
//!
//! 1. a histogram keyed by `(prefix class, opcode)` - 7 x 256 counters
//! 2. a bounded recent-trace ring recording one entry per executed
//!    instruction, overwriting the oldest entry on overflow
//!
//! The session state machine (`SessionState`) is shared with the memory
//! tracker and the call trace: Stopped -> Capturing <-> Paused -> Stopped.
//! `Clear` drops buffered data without changing state.

use crate::disasm;

/// Capacity of the recent-trace ring.
pub const TRACE_CAPACITY: usize = 4096;

/// Prefix class of a fully decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PrefixClass {
    None = 0,
    Cb = 1,
    Ed = 2,
    Dd = 3,
    Fd = 4,
    Ddcb = 5,
    Fdcb = 6,
}

/// Number of prefix classes (histogram rows).
pub const PREFIX_CLASSES: usize = 7;

impl PrefixClass {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Cb => "CB",
            Self::Ed => "ED",
            Self::Dd => "DD",
            Self::Fd => "FD",
            Self::Ddcb => "DDCB",
            Self::Fdcb => "FDCB",
        }
    }
}

/// Three-state capture session: Stopped -> Capturing <-> Paused -> Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Stopped,
    Capturing,
    Paused,
}

/// Session state machine shared by the profilers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionState {
    phase: SessionPhase,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[inline]
    pub fn is_capturing(&self) -> bool {
        self.phase == SessionPhase::Capturing
    }

    /// Begin capturing. Returns true when this was a fresh start (the
    /// caller clears its buffers on a fresh start, not on resume).
    pub fn start(&mut self) -> bool {
        let fresh = self.phase == SessionPhase::Stopped;
        self.phase = SessionPhase::Capturing;
        fresh
    }

    /// Halt ingestion, retaining data. No-op unless capturing.
    pub fn pause(&mut self) {
        if self.phase == SessionPhase::Capturing {
            self.phase = SessionPhase::Paused;
        }
    }

    /// Return to capturing without clearing. No-op unless paused.
    pub fn resume(&mut self) {
        if self.phase == SessionPhase::Paused {
            self.phase = SessionPhase::Capturing;
        }
    }

    /// Halt ingestion and retain data for later query.
    pub fn stop(&mut self) {
        self.phase = SessionPhase::Stopped;
    }
}

/// One recent-trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEntry {
    pub pc: u16,
    pub prefix: PrefixClass,
    pub opcode: u8,
    pub flags: u8,
    pub a: u8,
    pub frame: u64,
    pub t_state: u32,
}

/// Histogram row returned by `top_opcodes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeCount {
    pub prefix: PrefixClass,
    pub opcode: u8,
    pub count: u64,
    pub mnemonic: String,
}

/// Per-opcode histogram plus bounded recent trace.
pub struct OpcodeProfiler {
    histogram: Vec<u64>,
    trace: Vec<TraceEntry>,
    trace_write: usize,
    session: SessionState,
}

impl OpcodeProfiler {
    pub fn new() -> Self {
        Self {
            histogram: vec![0; PREFIX_CLASSES * 256],
            trace: Vec::with_capacity(TRACE_CAPACITY),
            trace_write: 0,
            session: SessionState::new(),
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Start clears both buffers; resume from pause does not.
    pub fn start(&mut self) {
        if self.session.start() {
            self.clear();
        }
    }

    pub fn pause(&mut self) {
        self.session.pause();
    }

    pub fn resume(&mut self) {
        self.session.resume();
    }

    pub fn stop(&mut self) {
        self.session.stop();
    }

    /// Drop buffered data; the session phase is untouched.
    pub fn clear(&mut self) {
        self.histogram.iter_mut().for_each(|c| *c = 0);
        self.trace.clear();
        self.trace_write = 0;
    }

    /// Record one executed instruction. No-op unless capturing.
    #[inline]
    pub fn record(
        &mut self,
        prefix: PrefixClass,
        opcode: u8,
        pc: u16,
        flags: u8,
        a: u8,
        frame: u64,
        t_state: u32,
    ) {
        if !self.session.is_capturing() {
            return;
        }
        self.histogram[(prefix as usize) * 256 + opcode as usize] += 1;

        let entry = TraceEntry { pc, prefix, opcode, flags, a, frame, t_state };
        if self.trace.len() < TRACE_CAPACITY {
            self.trace.push(entry);
        } else {
            self.trace[self.trace_write] = entry;
        }
        self.trace_write = (self.trace_write + 1) % TRACE_CAPACITY;
    }

    /// Histogram count for one `(prefix, opcode)` cell.
    pub fn count(&self, prefix: PrefixClass, opcode: u8) -> u64 {
        self.histogram[(prefix as usize) * 256 + opcode as usize]
    }

    /// Total instructions recorded in the histogram.
    pub fn total(&self) -> u64 {
        self.histogram.iter().sum()
    }

    /// Up to `limit` most frequent opcodes, count descending, with their
    /// mnemonics resolved from the static decode table.
    pub fn top_opcodes(&self, limit: usize) -> Vec<OpcodeCount> {
        let mut rows: Vec<OpcodeCount> = self
            .histogram
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(idx, &count)| {
                let prefix = match idx / 256 {
                    0 => PrefixClass::None,
                    1 => PrefixClass::Cb,
                    2 => PrefixClass::Ed,
                    3 => PrefixClass::Dd,
                    4 => PrefixClass::Fd,
                    5 => PrefixClass::Ddcb,
                    _ => PrefixClass::Fdcb,
                };
                let opcode = (idx % 256) as u8;
                OpcodeCount {
                    prefix,
                    opcode,
                    count,
                    mnemonic: disasm::mnemonic(prefix, opcode),
                }
            })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then(a.opcode.cmp(&b.opcode)));
        rows.truncate(limit);
        rows
    }

    /// Copy of up to `limit` most recent trace entries, newest last.
    pub fn recent(&self, limit: usize) -> Vec<TraceEntry> {
        let take = limit.min(self.trace.len());
        let mut entries = Vec::with_capacity(take);
        for i in 0..take {
            let idx = (self.trace_write + TRACE_CAPACITY - take + i) % TRACE_CAPACITY;
            entries.push(self.trace[idx]);
        }
        entries
    }

    /// Number of entries currently in the recent trace.
    pub fn trace_len(&self) -> usize {
        self.trace.len()
    }
}

impl Default for OpcodeProfiler {
    fn default() -> Self {
        Self::new()
    }
}
