//! TR-DOS activity analyzer
//!
//! Watches the TR-DOS ROM entry points with page-qualified execution
//! breakpoints (they fire only while the TR-DOS ROM page is mapped at
//! bank 0) and observes WD1793 command traffic. Produces a bounded stream
//! of semantic events with monotonically increasing timestamps.

use std::any::Any;

use super::{ActivationContext, Analyzer};
use crate::cpu::Cpu;
use crate::memory::PageRef;

/// TR-DOS entry point at 0x3D03 (warm entry from BASIC).
pub const TRDOS_ENTRY: u16 = 0x3D03;
/// TR-DOS command dispatch routine.
pub const TRDOS_COMMAND_DISPATCH: u16 = 0x3D2F;
/// TR-DOS exit back to BASIC ROM.
pub const TRDOS_EXIT: u16 = 0x3E0B;

/// Capacity of the semantic event ring.
pub const EVENT_CAPACITY: usize = 1024;

/// Analyzer registration id.
pub const TRDOS_ANALYZER_ID: &str = "trdos";

/// Where in the TR-DOS flow the machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrdosPhase {
    #[default]
    Idle,
    InTrdos,
    InCommand,
    InSectorOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrdosEventKind {
    EnterTrdos,
    CommandDispatch,
    FdcCommand(u8),
    FdcCommandComplete(u8),
    ExitTrdos,
}

/// One semantic event. Timestamps increase monotonically per analyzer
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrdosEvent {
    pub timestamp: u64,
    pub kind: TrdosEventKind,
    /// PC at the triggering breakpoint, or 0 for FDC-driven events
    pub pc: u16,
}

/// Disk-controller activity analyzer for TR-DOS (Beta Disk) systems.
pub struct TrdosAnalyzer {
    phase: TrdosPhase,
    events: Vec<TrdosEvent>,
    write_idx: usize,
    next_timestamp: u64,
}

impl TrdosAnalyzer {
    pub fn new() -> Self {
        Self {
            phase: TrdosPhase::Idle,
            events: Vec::with_capacity(EVENT_CAPACITY),
            write_idx: 0,
            next_timestamp: 0,
        }
    }

    pub fn phase(&self) -> TrdosPhase {
        self.phase
    }

    fn push_event(&mut self, kind: TrdosEventKind, pc: u16) {
        let event = TrdosEvent { timestamp: self.next_timestamp, kind, pc };
        self.next_timestamp += 1;
        if self.events.len() < EVENT_CAPACITY {
            self.events.push(event);
        } else {
            self.events[self.write_idx] = event;
        }
        self.write_idx = (self.write_idx + 1) % EVENT_CAPACITY;
    }

    /// Snapshot of buffered events, oldest first.
    pub fn events(&self) -> Vec<TrdosEvent> {
        let mut events = self.events.clone();
        events.sort_by_key(|event| event.timestamp);
        events
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.write_idx = 0;
        self.phase = TrdosPhase::Idle;
    }

    /// Sector-transfer commands of the WD1793 (type II/III).
    fn is_sector_command(command: u8) -> bool {
        matches!(command & 0xE0, 0x80 | 0xA0 | 0xC0 | 0xE0)
    }
}

impl Default for TrdosAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for TrdosAnalyzer {
    fn id(&self) -> &str {
        TRDOS_ANALYZER_ID
    }

    fn on_activate(&mut self, ctx: &mut ActivationContext<'_>) {
        let trdos_page = PageRef::rom(ctx.memory().trdos_rom_page());
        ctx.request_execution_breakpoint_in_page(TRDOS_ENTRY, trdos_page, 0);
        ctx.request_execution_breakpoint_in_page(TRDOS_COMMAND_DISPATCH, trdos_page, 0);
        ctx.request_execution_breakpoint_in_page(TRDOS_EXIT, trdos_page, 0);
        self.phase = TrdosPhase::Idle;
    }

    fn on_deactivate(&mut self) {
        self.phase = TrdosPhase::Idle;
    }

    fn on_breakpoint_hit(&mut self, address: u16, _breakpoint: u16, _cpu: &Cpu) {
        match address {
            TRDOS_ENTRY => {
                self.phase = TrdosPhase::InTrdos;
                self.push_event(TrdosEventKind::EnterTrdos, address);
            }
            TRDOS_COMMAND_DISPATCH => {
                if self.phase != TrdosPhase::Idle {
                    self.phase = TrdosPhase::InCommand;
                    self.push_event(TrdosEventKind::CommandDispatch, address);
                }
            }
            TRDOS_EXIT => {
                if self.phase != TrdosPhase::Idle {
                    self.phase = TrdosPhase::Idle;
                    self.push_event(TrdosEventKind::ExitTrdos, address);
                }
            }
            _ => {}
        }
    }

    fn on_fdc_command(&mut self, command: u8) {
        if self.phase == TrdosPhase::Idle {
            return;
        }
        if Self::is_sector_command(command) {
            self.phase = TrdosPhase::InSectorOp;
        }
        self.push_event(TrdosEventKind::FdcCommand(command), 0);
    }

    fn on_fdc_command_complete(&mut self, command: u8) {
        if self.phase == TrdosPhase::Idle {
            return;
        }
        if self.phase == TrdosPhase::InSectorOp {
            self.phase = TrdosPhase::InCommand;
        }
        self.push_event(TrdosEventKind::FdcCommandComplete(command), 0);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoints::BreakpointManager;
    use crate::timing::{MachineModel, MachineTiming};
    use crate::memory::Memory;

    fn hit(analyzer: &mut TrdosAnalyzer, address: u16) {
        let cpu = Cpu::new();
        analyzer.on_breakpoint_hit(address, 0, &cpu);
    }

    #[test]
    fn test_state_machine_walk() {
        let mut analyzer = TrdosAnalyzer::new();
        assert_eq!(analyzer.phase(), TrdosPhase::Idle);

        hit(&mut analyzer, TRDOS_ENTRY);
        assert_eq!(analyzer.phase(), TrdosPhase::InTrdos);

        hit(&mut analyzer, TRDOS_COMMAND_DISPATCH);
        assert_eq!(analyzer.phase(), TrdosPhase::InCommand);

        analyzer.on_fdc_command(0x80); // read sector
        assert_eq!(analyzer.phase(), TrdosPhase::InSectorOp);

        analyzer.on_fdc_command_complete(0x80);
        assert_eq!(analyzer.phase(), TrdosPhase::InCommand);

        hit(&mut analyzer, TRDOS_EXIT);
        assert_eq!(analyzer.phase(), TrdosPhase::Idle);
    }

    #[test]
    fn test_fdc_events_ignored_outside_trdos() {
        let mut analyzer = TrdosAnalyzer::new();
        analyzer.on_fdc_command(0x80);
        assert_eq!(analyzer.phase(), TrdosPhase::Idle);
        assert!(analyzer.events().is_empty());
    }

    #[test]
    fn test_seek_commands_do_not_enter_sector_op() {
        let mut analyzer = TrdosAnalyzer::new();
        hit(&mut analyzer, TRDOS_ENTRY);
        analyzer.on_fdc_command(0x10); // seek (type I)
        assert_eq!(analyzer.phase(), TrdosPhase::InTrdos);
    }

    #[test]
    fn test_timestamps_are_monotonic() {
        let mut analyzer = TrdosAnalyzer::new();
        hit(&mut analyzer, TRDOS_ENTRY);
        hit(&mut analyzer, TRDOS_COMMAND_DISPATCH);
        analyzer.on_fdc_command(0x80);
        let events = analyzer.events();
        assert_eq!(events.len(), 3);
        for pair in events.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn test_ring_bounded() {
        let mut analyzer = TrdosAnalyzer::new();
        hit(&mut analyzer, TRDOS_ENTRY);
        for _ in 0..(EVENT_CAPACITY + 100) {
            analyzer.on_fdc_command(0x10);
        }
        assert_eq!(analyzer.events().len(), EVENT_CAPACITY);
    }

    #[test]
    fn test_activation_requests_page_qualified_breakpoints() {
        let mut manager = crate::analyzers::AnalyzerManager::new();
        manager.set_enabled(true);
        manager.register_analyzer(Box::new(TrdosAnalyzer::new()));
        let mut breakpoints = BreakpointManager::new();
        let memory = Memory::new(&MachineTiming::new(MachineModel::Pentagon128));
        manager.activate(TRDOS_ANALYZER_ID, &mut breakpoints, &memory);

        assert_eq!(breakpoints.count(), 3);
        let owned = manager.analyzer_breakpoints(TRDOS_ANALYZER_ID);
        let trdos_page = PageRef::rom(memory.trdos_rom_page());
        for &id in owned {
            let bp = breakpoints.get(id).unwrap();
            assert_eq!(bp.page, Some((trdos_page, 0)));
        }
    }
}
