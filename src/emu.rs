//! Emulator orchestrator
//!
//! Owns the CPU and the bus, drives the frame loop, and exposes the atomic
//! stepping operations the debugger is built on.
//!
//! Frame discipline: the feature manager is consulted only when a frame
//! begins - that is the single place the memory interface may be swapped
//! and the instrumentation caches refreshed. Analyzer frame hooks run
//! before the first and after the last instruction of every frame, and the
//! frame interrupt is held active for the model's `int_length` t-states.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bus::{Bus, BreakHit, FdcEvent, MemoryInterface};
use crate::cpu::Cpu;
use crate::disasm;
use crate::features::{Feature, FeatureManager};
use crate::memory::MemoryError;
use crate::snapshot::{Snapshot, SnapshotError};
use crate::timing::{MachineModel, MachineTiming};

/// Environment variable naming the directory that holds the ROM images.
pub const ROMS_PATH_ENV: &str = "SPECTRUM_ROMS_PATH";

/// Configuration errors: the machine keeps its pre-request state.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ROM set path not configured ({ROMS_PATH_ENV} is unset)")]
    RomPathUnset,
    #[error("failed to read ROM image {path}")]
    RomRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Safety margin for "whole instructions only" loops: no Z80 instruction
/// (including contention) runs longer than this many t-states.
pub const LONGEST_INSTRUCTION_T: u32 = 64;

/// Default safety limit for open-ended stepping operations, in t-states.
const DEFAULT_SAFETY_T: u32 = 10 * 1_000_000;

/// Reason a stepping operation returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The operation's condition was met
    ConditionMet,
    /// The safety limit ran out first
    SafetyLimit,
    /// An external stop request arrived at a frame boundary
    StopRequested,
}

/// One ZX Spectrum machine instance.
pub struct Emulator {
    pub cpu: Cpu,
    pub bus: Bus,
    pub features: FeatureManager,

    frame_counter: u64,
    frame_started: bool,
    next_video_line: u32,
    stop_flag: Arc<AtomicBool>,
    last_break: Option<BreakHit>,
}

impl Emulator {
    pub fn new(model: MachineModel) -> Self {
        let timing = MachineTiming::new(model);
        let mut bus = Bus::new(timing);
        bus.analyzers
            .register_analyzer(Box::new(crate::analyzers::TrdosAnalyzer::new()));
        bus.analyzers
            .register_analyzer(Box::new(crate::analyzers::RomPrintDetector::new()));
        Self {
            cpu: Cpu::new(),
            bus,
            features: FeatureManager::new(),
            frame_counter: 0,
            frame_started: false,
            next_video_line: 0,
            stop_flag: Arc::new(AtomicBool::new(false)),
            last_break: None,
        }
    }

    pub fn model(&self) -> MachineModel {
        self.bus.memory.model()
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Shareable stop flag: set it from another thread, the frame loop
    /// honors it at the next frame boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    fn stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    /// Reset the machine: CPU reset line, banking registers, devices.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
        self.frame_counter = 0;
        self.frame_started = false;
        self.next_video_line = 0;
        self.bus.frame = 0;
        self.last_break = None;
        self.stop_flag.store(false, Ordering::Relaxed);
    }

    // ========== Feature shortcuts ==========

    /// Turn the debug-instrumented memory interface on for the next frame.
    pub fn debug_on(&mut self) {
        self.features.set_enabled(Feature::DebugMode, true);
    }

    pub fn debug_off(&mut self) {
        self.features.set_enabled(Feature::DebugMode, false);
    }

    // ========== Frame loop ==========

    /// Frame-boundary work: consult features, swap the interface, refresh
    /// instrumentation caches, run analyzer frame-start hooks, raise the
    /// frame interrupt.
    fn begin_frame(&mut self) {
        let debug = self.features.is_enabled(Feature::DebugMode);
        self.bus.set_interface(if debug {
            MemoryInterface::Debug
        } else {
            MemoryInterface::Fast
        });
        self.bus
            .tracker
            .set_enabled(self.features.is_enabled(Feature::MemoryTracking));
        self.bus
            .analyzers
            .set_enabled(self.features.is_enabled(Feature::Analyzers));

        // The call-trace and opcode-profiler features drive their capture
        // sessions from the frame boundary.
        let calltrace_on = self.features.is_enabled(Feature::CallTrace);
        let calltrace_session = self.bus.tracker.calltrace.session_mut();
        if calltrace_on && !calltrace_session.is_capturing() {
            calltrace_session.start();
        } else if !calltrace_on && calltrace_session.is_capturing() {
            calltrace_session.stop();
        }
        self.bus
            .set_calltrace_enabled(self.bus.tracker.calltrace.session().is_capturing());

        if self.features.is_enabled(Feature::OpcodeProfiler)
            && !self.bus.profiler.session().is_capturing()
        {
            self.bus.profiler.start();
        }

        self.bus.frame = self.frame_counter;
        self.next_video_line = 0;
        self.bus.analyzers.dispatch_frame_start(self.frame_counter);
        self.frame_started = true;
    }

    fn finish_frame(&mut self) {
        self.bus.analyzers.dispatch_frame_end(self.frame_counter);
        self.cpu.end_frame(self.bus.timing.frame);
        self.frame_counter += 1;
        self.bus.frame = self.frame_counter;
        self.frame_started = false;
    }

    /// Execute exactly one whole instruction (prefix chains included) and
    /// run all per-instruction instrumentation. Returns t-states consumed.
    pub fn step_instruction(&mut self) -> u32 {
        if !self.frame_started {
            self.begin_frame();
        }

        // The frame interrupt is level-active for int_length t-states.
        self.cpu.int_pend = self.cpu.t() < self.bus.timing.int_length;

        let pc = self.cpu.pc;
        self.bus.analyzers.dispatch_cpu_step(&self.cpu, pc);

        let t_used = self.cpu.step(&mut self.bus);
        self.bus.tick_devices(t_used);

        for event in self.bus.take_fdc_events() {
            match event {
                FdcEvent::CommandStarted(cmd) => self.bus.analyzers.dispatch_fdc_command(cmd),
                FdcEvent::CommandCompleted(cmd) => {
                    self.bus.analyzers.dispatch_fdc_command_complete(cmd)
                }
            }
        }

        if let Some(hit) = self.bus.take_break() {
            self.bus
                .analyzers
                .dispatch_breakpoint_hit(hit.address, hit.breakpoint, &self.cpu);
            self.last_break = Some(hit);
        }

        // Video line events for every scanline boundary this instruction
        // crossed.
        let line_now = self.bus.timing.line_of(self.cpu.t().min(self.bus.timing.frame - 1));
        while self.next_video_line <= line_now {
            let line = self.next_video_line;
            self.bus.analyzers.dispatch_video_line(line as u16);
            self.next_video_line += 1;
        }

        if self.cpu.t() >= self.bus.timing.frame {
            self.finish_frame();
        }
        t_used
    }

    /// Most recent breakpoint hit, if any. Cleared by `take_last_break`.
    pub fn last_break(&self) -> Option<BreakHit> {
        self.last_break
    }

    pub fn take_last_break(&mut self) -> Option<BreakHit> {
        self.last_break.take()
    }

    // ========== Stepping API ==========
    //
    // Every operation executes whole instructions only and leaves the
    // machine fully consistent: no prefix half-decoded, frame and t-state
    // counters in agreement.

    /// Run at least `n` frame t-states (may overshoot by less than the
    /// longest instruction).
    pub fn run_tstates(&mut self, n: u32) -> StopReason {
        let mut remaining = n as i64;
        while remaining > 0 {
            if !self.frame_started && self.stop_requested() {
                return StopReason::StopRequested;
            }
            let before = self.cpu.t();
            self.step_instruction();
            let after = self.cpu.t();
            let delta = if after >= before {
                after - before
            } else {
                // Frame wrapped during this instruction
                after + self.bus.timing.frame - before
            };
            remaining -= delta as i64;
        }
        StopReason::ConditionMet
    }

    /// Run one whole frame: returns with `frame_counter` incremented by
    /// exactly one and `t` holding the residual.
    pub fn run_frame(&mut self) -> StopReason {
        let target = self.frame_counter + 1;
        while self.frame_counter < target {
            if !self.frame_started && self.stop_requested() {
                return StopReason::StopRequested;
            }
            self.step_instruction();
        }
        StopReason::ConditionMet
    }

    /// Run until the beginning of scanline `line`. If the current position
    /// is already at or past it, runs into the next frame.
    pub fn run_until_scanline(&mut self, line: u32) -> StopReason {
        let line = line % self.bus.timing.lines;
        let target_t = line * self.bus.timing.t_line;
        if self.cpu.t() >= target_t {
            let reason = self.run_frame();
            if reason != StopReason::ConditionMet {
                return reason;
            }
        }
        while self.cpu.t() < target_t {
            self.step_instruction();
        }
        StopReason::ConditionMet
    }

    /// Run approximately `n` scanlines worth of t-states.
    pub fn run_n_scanlines(&mut self, n: u32) -> StopReason {
        self.run_tstates(n * self.bus.timing.t_line)
    }

    /// Run until `t` falls inside the paper area, advancing at least one
    /// instruction; wraps to the next frame when already past it.
    pub fn run_until_next_screen_pixel(&mut self) -> StopReason {
        let mut budget = (2 * self.bus.timing.frame + LONGEST_INSTRUCTION_T) as i64;
        loop {
            let before = self.cpu.t();
            self.step_instruction();
            if self.bus.timing.in_paper_area(self.cpu.t()) {
                return StopReason::ConditionMet;
            }
            let after = self.cpu.t();
            let delta = if after >= before {
                after - before
            } else {
                after + self.bus.timing.frame - before
            };
            budget -= delta as i64;
            if budget <= 0 {
                return StopReason::SafetyLimit;
            }
        }
    }

    /// Run until a maskable interrupt acceptance has fully completed
    /// (PC at the handler, IFF1 cleared).
    pub fn run_until_interrupt(&mut self) -> StopReason {
        let accepted = self.cpu.interrupts_accepted;
        let mut budget = DEFAULT_SAFETY_T as i64;
        while self.cpu.interrupts_accepted == accepted {
            let used = self.step_instruction();
            budget -= used as i64;
            if budget <= 0 {
                return StopReason::SafetyLimit;
            }
        }
        StopReason::ConditionMet
    }

    /// Run whole instructions until `predicate` holds or `safety_t_limit`
    /// t-states have elapsed. On exhaustion the machine simply stays where
    /// it got to - that is not an error.
    pub fn run_until_condition(
        &mut self,
        mut predicate: impl FnMut(&Cpu) -> bool,
        safety_t_limit: u32,
    ) -> StopReason {
        let mut budget = safety_t_limit as i64;
        while !predicate(&self.cpu) {
            if budget <= 0 {
                return StopReason::SafetyLimit;
            }
            let used = self.step_instruction();
            budget -= used as i64;
        }
        StopReason::ConditionMet
    }

    /// Run exactly `n` whole instructions, `n >= 1`.
    pub fn run_n_instructions(&mut self, n: u32) -> StopReason {
        for _ in 0..n.max(1) {
            self.step_instruction();
        }
        StopReason::ConditionMet
    }

    // ========== ROM set ==========

    /// ROM image file names for this model, in page order.
    fn rom_file_names(&self) -> &'static [&'static str] {
        match self.model() {
            MachineModel::Spectrum48 => &["48.rom"],
            MachineModel::Spectrum128 => &["128-0.rom", "128-1.rom"],
            MachineModel::Plus3 => &["plus3-0.rom", "plus3-1.rom", "plus3-2.rom", "plus3-3.rom"],
            MachineModel::Pentagon128 => &["128-0.rom", "128-1.rom", "trdos.rom"],
        }
    }

    /// Load the model's ROM set from a directory.
    pub fn load_rom_set(&mut self, dir: &Path) -> Result<(), ConfigError> {
        for (page, name) in self.rom_file_names().iter().enumerate() {
            let path = dir.join(name);
            let data = std::fs::read(&path).map_err(|source| ConfigError::RomRead {
                path: path.display().to_string(),
                source,
            })?;
            self.bus.memory.load_rom_page(page, &data)?;
        }
        Ok(())
    }

    /// Load the ROM set from the directory named by `SPECTRUM_ROMS_PATH`.
    pub fn load_rom_set_from_env(&mut self) -> Result<(), ConfigError> {
        let dir = std::env::var_os(ROMS_PATH_ENV).ok_or(ConfigError::RomPathUnset)?;
        self.load_rom_set(Path::new(&dir))
    }

    // ========== Snapshots ==========

    pub fn save_snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.cpu, &self.bus.memory, self.bus.border)
    }

    pub fn save_sna(&self) -> Result<Vec<u8>, SnapshotError> {
        self.save_snapshot().to_sna()
    }

    /// Apply a snapshot. The machine keeps its pre-request state when the
    /// snapshot is incompatible.
    pub fn load_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        snapshot.apply(&mut self.cpu, &mut self.bus.memory, &mut self.bus.border)?;
        self.cpu.set_t(0);
        self.frame_started = false;
        Ok(())
    }

    pub fn load_sna(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let snapshot = Snapshot::from_sna(bytes)?;
        self.load_snapshot(&snapshot)
    }

    pub fn load_z80(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let snapshot = Snapshot::from_z80(bytes)?;
        self.load_snapshot(&snapshot)
    }

    // ========== Debugger surface ==========

    /// Peek one byte without any side effects.
    pub fn peek_byte(&self, address: u16) -> u8 {
        self.bus.memory.direct_read(address)
    }

    /// Direct write for the debugger (bypasses ROM protection).
    pub fn poke_byte(&mut self, address: u16, value: u8) {
        self.bus.memory.direct_write(address, value);
    }

    /// Disassemble `count` instructions starting at `address`.
    pub fn disassemble(&self, address: u16, count: usize) -> String {
        let mut out = String::new();
        let mut pc = address;
        for _ in 0..count {
            let mut bytes = [0u8; 4];
            for (i, slot) in bytes.iter_mut().enumerate() {
                *slot = self.peek_byte(pc.wrapping_add(i as u16));
            }
            let decoded = disasm::disassemble(&bytes, pc);
            let raw: String = bytes[..decoded.length.min(4)]
                .iter()
                .map(|b| format!("{b:02X} "))
                .collect();
            out.push_str(&format!("{pc:04X}  {raw:<12} {}\n", decoded.text));
            pc = pc.wrapping_add(decoded.length as u16);
        }
        out
    }

    /// Register dump for the debugger.
    pub fn dump_registers(&self) -> String {
        format!(
            "AF={:04X} BC={:04X} DE={:04X} HL={:04X}\n\
             AF'={:04X} BC'={:04X} DE'={:04X} HL'={:04X}\n\
             IX={:04X} IY={:04X} SP={:04X} PC={:04X}\n\
             I={:02X} R={:02X} IM={:?} IFF1={} IFF2={} HALT={}\n\
             T={} frame={}",
            self.cpu.af(),
            self.cpu.bc,
            self.cpu.de,
            self.cpu.hl,
            self.cpu.af_alt(),
            self.cpu.bc_alt,
            self.cpu.de_alt,
            self.cpu.hl_alt,
            self.cpu.ix,
            self.cpu.iy,
            self.cpu.sp,
            self.cpu.pc,
            self.cpu.i,
            self.cpu.r(),
            self.cpu.im,
            self.cpu.iff1,
            self.cpu.iff2,
            self.cpu.halted,
            self.cpu.t(),
            self.frame_counter,
        )
    }
}
