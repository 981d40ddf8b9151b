//! System bus
//!
//! Routes every CPU access through one of two interfaces:
//!
//! - **Fast**: straight to the paged memory, nothing else.
//! - **Debug**: every access additionally feeds the access tracker, the
//!   analyzer dispatch, and the breakpoint match test.
//!
//! The active interface is swapped only at frame boundaries (the scheduler
//! consults the feature manager); swapping mid-instruction would
//! desynchronize an in-flight prefix decode, so nothing else may call
//! `set_interface`.
//!
//! The bus also owns the port surface: the ULA port 0xFE (border), the
//! 128K paging ports 0x7FFD/0x1FFD, and the Beta Disk WD1793 ports that
//! feed the TR-DOS analyzer.

use crate::analyzers::AnalyzerManager;
use crate::breakpoints::{AccessKind, BreakpointManager, MemAccess, PortAccess};
use crate::calltrace::{BankSnapshot, CallTraceEvent, FlowKind};
use crate::memory::Memory;
use crate::profiler::{OpcodeProfiler, PrefixClass};
use crate::timing::{MachineModel, MachineTiming};
use crate::tracker::AccessTracker;

/// Which access path the CPU currently runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryInterface {
    #[default]
    Fast,
    Debug,
}

/// A breakpoint match raised during the current instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakHit {
    pub address: u16,
    pub breakpoint: u16,
    pub access: AccessKind,
}

/// WD1793 floppy controller events observed by analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdcEvent {
    CommandStarted(u8),
    CommandCompleted(u8),
}

/// Minimal WD1793 register file: enough surface for command observation.
/// The disk-image codec behind it is an external collaborator.
#[derive(Debug, Default)]
pub struct Wd1793 {
    pub command: u8,
    pub track: u8,
    pub sector: u8,
    pub data: u8,
    status: u8,
    busy_countdown: u32,
}

/// T-states a command stays busy before completion is signalled.
const FDC_COMMAND_T: u32 = 64;

impl Wd1793 {
    fn write_command(&mut self, value: u8) {
        self.command = value;
        self.status |= 0x01; // BUSY
        self.busy_countdown = FDC_COMMAND_T;
    }

    /// Advance the controller clock; returns true when the pending command
    /// completed on this tick.
    fn tick(&mut self, t_states: u32) -> bool {
        if self.busy_countdown == 0 {
            return false;
        }
        self.busy_countdown = self.busy_countdown.saturating_sub(t_states);
        if self.busy_countdown == 0 {
            self.status &= !0x01;
            return true;
        }
        false
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The bus: paged memory plus every instrumentation consumer of accesses.
pub struct Bus {
    pub memory: Memory,
    pub timing: MachineTiming,
    pub tracker: AccessTracker,
    pub breakpoints: BreakpointManager,
    pub analyzers: AnalyzerManager,
    pub profiler: OpcodeProfiler,
    pub fdc: Wd1793,

    /// Border color latched by OUT (0xFE)
    pub border: u8,
    /// Frame counter mirror, stamped into trace entries
    pub frame: u64,

    iface: MemoryInterface,
    pending_break: Option<BreakHit>,
    fdc_events: Vec<FdcEvent>,
    calltrace_enabled: bool,
}

impl Bus {
    pub fn new(timing: MachineTiming) -> Self {
        let memory = Memory::new(&timing);
        let tracker = AccessTracker::new(timing.ram_pages, timing.rom_pages);
        Self {
            memory,
            timing,
            tracker,
            breakpoints: BreakpointManager::new(),
            analyzers: AnalyzerManager::new(),
            profiler: OpcodeProfiler::new(),
            fdc: Wd1793::default(),
            border: 0,
            frame: 0,
            iface: MemoryInterface::Fast,
            pending_break: None,
            fdc_events: Vec::new(),
            calltrace_enabled: false,
        }
    }

    pub fn reset(&mut self) {
        self.memory.reset();
        self.fdc.reset();
        self.border = 0;
        self.pending_break = None;
        self.fdc_events.clear();
    }

    // ========== Interface selection ==========

    /// Swap the access path. Called from the frame boundary only.
    pub fn set_interface(&mut self, iface: MemoryInterface) {
        self.iface = iface;
    }

    pub fn interface(&self) -> MemoryInterface {
        self.iface
    }

    /// Refresh the call-trace feature cache (frame boundary only).
    pub fn set_calltrace_enabled(&mut self, enabled: bool) {
        self.calltrace_enabled = enabled;
    }

    // ========== Contention ==========

    /// Extra wait t-states for an access at frame t-state `t`.
    #[inline]
    pub fn contention(&self, t: u32, address: u16) -> u32 {
        if !self.memory.is_contended(address) {
            return 0;
        }
        self.timing.contention_delay(t)
    }

    // ========== CPU-facing access ==========

    /// Data read at a Z80 address through the active interface.
    #[inline]
    pub fn read(&mut self, address: u16) -> u8 {
        match self.iface {
            MemoryInterface::Fast => self.memory.read(address),
            MemoryInterface::Debug => self.read_debug(address),
        }
    }

    fn read_debug(&mut self, address: u16) -> u8 {
        let value = self.memory.read(address);
        let banks = self.memory.banks();
        let bank = Memory::bank_of(address);
        self.tracker.on_read(bank, banks[bank]);
        self.analyzers.dispatch_memory_read(address, value);
        if let Some(id) = self.breakpoints.check_memory(address, MemAccess::READ, &banks) {
            self.note_break(address, id, AccessKind::Read);
        }
        value
    }

    /// Data write at a Z80 address through the active interface. Writes to
    /// protected ROM are dropped by the memory layer; breakpoints still
    /// match the attempt.
    #[inline]
    pub fn write(&mut self, address: u16, value: u8) {
        match self.iface {
            MemoryInterface::Fast => {
                self.memory.write(address, value);
            }
            MemoryInterface::Debug => self.write_debug(address, value),
        }
    }

    fn write_debug(&mut self, address: u16, value: u8) {
        let banks = self.memory.banks();
        let bank = Memory::bank_of(address);
        self.tracker.on_write(bank, banks[bank]);
        if let Some(id) = self.breakpoints.check_memory(address, MemAccess::WRITE, &banks) {
            self.note_break(address, id, AccessKind::Write);
        }
        self.memory.write(address, value);
        self.analyzers.dispatch_memory_write(address, value);
    }

    /// M1 opcode fetch. Handles the Beta Disk ROM overlay magic and, on
    /// the debug interface, execute accounting and execution breakpoints.
    #[inline]
    pub fn fetch_opcode(&mut self, address: u16) -> u8 {
        self.update_trdos_overlay(address);
        match self.iface {
            MemoryInterface::Fast => self.memory.read(address),
            MemoryInterface::Debug => {
                let banks = self.memory.banks();
                let bank = Memory::bank_of(address);
                self.tracker.on_execute(bank, banks[bank]);
                if let Some(id) = self.breakpoints.check_execution(address, &banks) {
                    self.note_break(address, id, AccessKind::Execute);
                }
                if let Some(id) =
                    self.breakpoints.check_memory(address, MemAccess::EXECUTE, &banks)
                {
                    self.note_break(address, id, AccessKind::Execute);
                }
                self.memory.fetch_cached(address)
            }
        }
    }

    /// Beta Disk hardware maps the TR-DOS ROM when execution enters
    /// 0x3Dxx with the 48K BASIC ROM selected, and unmaps it as soon as
    /// execution leaves ROM space.
    fn update_trdos_overlay(&mut self, address: u16) {
        if self.memory.model() != MachineModel::Pentagon128 {
            return;
        }
        if !self.memory.trdos_active() {
            if address & 0xFF00 == 0x3D00 && self.memory.port_7ffd & 0x10 != 0 {
                self.memory.set_trdos(true);
            }
        } else if address >= 0x4000 {
            self.memory.set_trdos(false);
        }
    }

    // ========== Ports ==========

    /// IN: returns 0xFF for every unmapped port.
    pub fn port_in(&mut self, port: u16) -> u8 {
        if self.iface == MemoryInterface::Debug {
            if let Some(id) = self.breakpoints.check_port(port, PortAccess::IN) {
                self.note_break(port, id, AccessKind::PortIn);
            }
        }
        if self.memory.trdos_active() {
            match port & 0x00FF {
                0x1F => return self.fdc.status(),
                0x3F => return self.fdc.track,
                0x5F => return self.fdc.sector,
                0x7F => return self.fdc.data,
                0xFF => {
                    // System register: INTRQ set when idle
                    return if self.fdc.status() & 0x01 == 0 { 0x80 } else { 0x00 };
                }
                _ => {}
            }
        }
        if port & 0x0001 == 0 {
            // ULA port: keyboard idle, EAR high
            return 0xFF;
        }
        0xFF
    }

    /// OUT: border latch, paging registers, WD1793 registers.
    pub fn port_out(&mut self, port: u16, value: u8) {
        if self.iface == MemoryInterface::Debug {
            if let Some(id) = self.breakpoints.check_port(port, PortAccess::OUT) {
                self.note_break(port, id, AccessKind::PortOut);
            }
        }
        if self.memory.trdos_active() {
            match port & 0x00FF {
                0x1F => {
                    self.fdc.write_command(value);
                    self.fdc_events.push(FdcEvent::CommandStarted(value));
                    return;
                }
                0x3F => {
                    self.fdc.track = value;
                    return;
                }
                0x5F => {
                    self.fdc.sector = value;
                    return;
                }
                0x7F => {
                    self.fdc.data = value;
                    return;
                }
                0xFF => return, // drive select / side register
                _ => {}
            }
        }
        if port & 0x0001 == 0 {
            self.border = value & 0x07;
            return;
        }
        if port & 0x8002 == 0 {
            self.memory.write_7ffd(value);
            return;
        }
        if port & 0xF002 == 0x1000 {
            self.memory.write_1ffd(value);
        }
    }

    /// IM 2 vector byte: pull-ups on an open bus.
    pub fn int_vec(&self) -> u8 {
        0xFF
    }

    // ========== Device ticking ==========

    /// Advance bus-side devices by the t-states one instruction consumed.
    pub fn tick_devices(&mut self, t_states: u32) {
        if self.fdc.tick(t_states) {
            self.fdc_events.push(FdcEvent::CommandCompleted(self.fdc.command));
        }
    }

    /// Drain FDC events queued since the last call.
    pub fn take_fdc_events(&mut self) -> Vec<FdcEvent> {
        std::mem::take(&mut self.fdc_events)
    }

    // ========== Debug events ==========

    fn note_break(&mut self, address: u16, breakpoint: u16, access: AccessKind) {
        // First hit of the instruction wins; the rest still update the
        // registry's last-triggered record.
        if self.pending_break.is_none() {
            self.pending_break = Some(BreakHit { address, breakpoint, access });
        }
    }

    /// Take the breakpoint hit raised during the current instruction.
    pub fn take_break(&mut self) -> Option<BreakHit> {
        self.pending_break.take()
    }

    // ========== Instrumentation feeds ==========

    /// Called once per fully decoded instruction.
    #[inline]
    pub fn note_instruction(
        &mut self,
        prefix: PrefixClass,
        opcode: u8,
        pc: u16,
        flags: u8,
        a: u8,
        t_state: u32,
    ) {
        self.profiler.record(prefix, opcode, pc, flags, a, self.frame, t_state);
    }

    /// Record a taken control-flow instruction into the call trace.
    pub fn record_flow(&mut self, kind: FlowKind, m1_pc: u16, target: u16, flags: u8, sp: u16) {
        if !self.calltrace_enabled {
            return;
        }
        let mut opcode = [0u8; 4];
        for (i, slot) in opcode.iter_mut().enumerate() {
            *slot = self.memory.direct_read(m1_pc.wrapping_add(i as u16));
        }
        let opcode_len = Self::opcode_len(&opcode);

        let mapping = self.memory.banks();
        let mut banks = [BankSnapshot::default(); 4];
        for (snapshot, page) in banks.iter_mut().zip(mapping.iter()) {
            *snapshot = BankSnapshot::from(*page);
        }

        let mut stack_top = [0u16; 3];
        for (i, word) in stack_top.iter_mut().enumerate() {
            let addr = sp.wrapping_add((i * 2) as u16);
            *word = u16::from_le_bytes([
                self.memory.direct_read(addr),
                self.memory.direct_read(addr.wrapping_add(1)),
            ]);
        }

        let event = CallTraceEvent {
            m1_pc,
            kind,
            target,
            flags,
            sp,
            opcode,
            opcode_len: opcode_len as u8,
            banks,
            stack_top,
            loop_count: 0,
            was_hot: false,
        };
        self.tracker.calltrace.push(event, self.frame);
    }

    /// Encoded length of the instruction starting with `bytes[0]`,
    /// considering prefixes only (enough for trace labelling).
    fn opcode_len(bytes: &[u8; 4]) -> usize {
        match bytes[0] {
            0xCB | 0xED => 2,
            0xDD | 0xFD => {
                if bytes[1] == 0xCB {
                    4
                } else {
                    2
                }
            }
            _ => 1,
        }
    }
}
