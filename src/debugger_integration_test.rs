//! Debugger-facing integration scenarios: breakpoints across banking,
//! analyzer lifecycles, access tracking, and the call trace.

use crate::analyzers::{RomPrintDetector, TrdosAnalyzer, TrdosPhase};
use crate::breakpoints::{AccessKind, BreakpointClass, BreakpointKind, MemAccess};
use crate::calltrace::FlowKind;
use crate::emu::Emulator;
use crate::features::Feature;
use crate::memory::{PageKind, PageRef};
use crate::timing::MachineModel;

fn pentagon_with_program(program: &[u8]) -> Emulator {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut emulator = Emulator::new(MachineModel::Pentagon128);
    for (i, &byte) in program.iter().enumerate() {
        emulator.poke_byte(0x8000 + i as u16, byte);
    }
    emulator.cpu.pc = 0x8000;
    emulator.cpu.sp = 0x7FF0;
    emulator.debug_on();
    emulator
}

#[test]
fn test_execution_breakpoint_on_page_mapped_rom() {
    // Page-qualified breakpoint at the TR-DOS entry: it must stay silent
    // while the BASIC ROM is mapped at bank 0 and fire once the TR-DOS
    // page is mapped there.
    let mut emulator = pentagon_with_program(&[0x18, 0xFE]); // JR self
    let trdos_page = PageRef::rom(emulator.bus.memory.trdos_rom_page());
    let id = emulator
        .bus
        .breakpoints
        .add_execution_breakpoint_in_page(0x3D03, trdos_page, 0);

    emulator.run_frame();
    assert!(emulator.take_last_break().is_none());

    // Select the 48K BASIC ROM, plant a RET in the TR-DOS page, and call
    // into the entry point; the Beta Disk overlay maps the page on fetch.
    emulator.bus.port_out(0x7FFD, 0x10);
    emulator
        .bus
        .memory
        .write_page(PageKind::Rom, trdos_page.index as usize, 0x1D03, 0xC9)
        .unwrap();
    emulator.poke_byte(0x8000, 0xCD); // CALL 0x3D03
    emulator.poke_byte(0x8001, 0x03);
    emulator.poke_byte(0x8002, 0x3D);
    emulator.cpu.pc = 0x8000;

    emulator.run_n_instructions(2); // CALL + the RET at 0x3D03
    let hit = emulator.take_last_break().expect("breakpoint should fire");
    assert_eq!(hit.breakpoint, id);
    assert_eq!(hit.address, 0x3D03);

    let info = emulator.bus.breakpoints.last_triggered_info().unwrap();
    assert_eq!(info.id, id);
    assert_eq!(info.kind, BreakpointKind::Execution);
    assert_eq!(info.access, AccessKind::Execute);
}

#[test]
fn test_analyzer_auto_cleanup() {
    let mut emulator = pentagon_with_program(&[0x18, 0xFE]);
    {
        let crate::bus::Bus { analyzers, breakpoints, memory, .. } = &mut emulator.bus;
        analyzers.activate("trdos", breakpoints, memory);
    }
    let with_analyzer = emulator.bus.breakpoints.count();
    assert_eq!(with_analyzer, 3);
    assert_eq!(emulator.bus.analyzers.analyzer_breakpoints("trdos").len(), 3);

    {
        let crate::bus::Bus { analyzers, breakpoints, .. } = &mut emulator.bus;
        analyzers.deactivate("trdos", breakpoints);
    }
    assert_eq!(emulator.bus.breakpoints.count(), 0);
    assert!(emulator.bus.analyzers.analyzer_breakpoints("trdos").is_empty());
    assert!(emulator.bus.analyzers.analyzer_subscriptions("trdos").is_empty());
}

#[test]
fn test_trdos_analyzer_end_to_end() {
    let mut emulator = pentagon_with_program(&[]);
    emulator.features.set_enabled(Feature::Analyzers, true);
    {
        let crate::bus::Bus { analyzers, breakpoints, memory, .. } = &mut emulator.bus;
        analyzers.activate("trdos", breakpoints, memory);
    }
    let trdos_page = emulator.bus.memory.trdos_rom_page() as usize;
    // TR-DOS entry routine: issue an FDC read-sector command, then RET
    let routine = [
        0x3E, 0x80, // LD A,0x80
        0xD3, 0x1F, // OUT (0x1F),A - WD1793 command register
        0xC9, // RET
    ];
    for (i, &byte) in routine.iter().enumerate() {
        emulator
            .bus
            .memory
            .write_page(PageKind::Rom, trdos_page, 0x1D03 + i, byte)
            .unwrap();
    }

    // Select the BASIC ROM and call the TR-DOS entry
    emulator.bus.port_out(0x7FFD, 0x10);
    emulator.poke_byte(0x8000, 0xCD);
    emulator.poke_byte(0x8001, 0x03);
    emulator.poke_byte(0x8002, 0x3D);
    emulator.poke_byte(0x8003, 0x18); // JR self afterwards
    emulator.poke_byte(0x8004, 0xFE);
    emulator.cpu.pc = 0x8000;

    emulator.run_n_instructions(8);

    let analyzer = emulator
        .bus
        .analyzers
        .get_analyzer::<TrdosAnalyzer>("trdos")
        .unwrap();
    let events = analyzer.events();
    assert!(!events.is_empty());
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, crate::analyzers::TrdosEventKind::EnterTrdos)));
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, crate::analyzers::TrdosEventKind::FdcCommand(0x80))));
    assert_eq!(analyzer.phase(), TrdosPhase::InSectorOp);
}

#[test]
fn test_memory_write_breakpoint_on_protected_rom() {
    let mut emulator = pentagon_with_program(&[
        0x3E, 0x99, // LD A,0x99
        0x32, 0x01, 0x00, // LD (0x0001),A
    ]);
    let id = emulator.bus.breakpoints.add_mem_write_breakpoint(0x0001);
    let before = emulator.peek_byte(0x0001);

    emulator.run_n_instructions(2);

    let hit = emulator.take_last_break().expect("write watchpoint should fire");
    assert_eq!(hit.breakpoint, id);
    assert_eq!(hit.access, AccessKind::Write);
    // Write protection dropped the store
    assert_eq!(emulator.peek_byte(0x0001), before);

    let info = emulator.bus.breakpoints.last_triggered_info().unwrap();
    assert_eq!(info.address, 0x0001);
    assert!(info.was_active);
}

#[test]
fn test_rom_print_detector_end_to_end() {
    let mut emulator = pentagon_with_program(&[]);
    emulator.features.set_enabled(Feature::Analyzers, true);
    {
        let crate::bus::Bus { analyzers, breakpoints, memory, .. } = &mut emulator.bus;
        analyzers.activate("romprint", breakpoints, memory);
    }
    // Plant RET at the RST 10h hook so the call returns immediately
    emulator
        .bus
        .memory
        .write_page(PageKind::Rom, 0, 0x0010, 0xC9)
        .unwrap();

    // Print "HI\r" by calling the hook once per character
    let program = [
        0x3E, b'H', 0xCD, 0x10, 0x00, // LD A,'H'; CALL 0x0010
        0x3E, b'I', 0xCD, 0x10, 0x00,
        0x3E, 0x0D, 0xCD, 0x10, 0x00,
        0x18, 0xFE,
    ];
    for (i, &byte) in program.iter().enumerate() {
        emulator.poke_byte(0x8000 + i as u16, byte);
    }
    emulator.cpu.pc = 0x8000;
    emulator.run_n_instructions(12);

    let detector = emulator
        .bus
        .analyzers
        .get_analyzer_mut::<RomPrintDetector>("romprint")
        .unwrap();
    assert_eq!(detector.new_lines(), vec!["HI".to_string()]);
    assert_eq!(detector.new_output(), "HI\n");
}

#[test]
fn test_breakpoint_list_round_trip() {
    let mut emulator = pentagon_with_program(&[]);
    let manager = &mut emulator.bus.breakpoints;
    let a = manager.add_execution_breakpoint(0x3D03);
    manager.set_note(a, "entry");
    let b = manager.add_combined_memory_breakpoint(0x5800, MemAccess::READ | MemAccess::WRITE);
    manager.set_breakpoint_group(b, "screen");
    let c = manager.add_port_out_breakpoint(0x7FFD);
    manager.deactivate_breakpoint(c);

    let first = manager.list_as_string("\n");

    // Re-add from the serialized form into a fresh registry
    let mut fresh = crate::breakpoints::BreakpointManager::new();
    for line in first.lines() {
        let address =
            u16::from_str_radix(line.split('$').nth(1).unwrap().split(' ').next().unwrap(), 16)
                .unwrap();
        let id = if line.contains("[exec]") {
            fresh.add_execution_breakpoint(address)
        } else if line.contains("[mem]") {
            let mut mask = MemAccess::empty();
            let kinds = line.split('[').nth(2).unwrap();
            if kinds.contains('r') {
                mask |= MemAccess::READ;
            }
            if kinds.contains('w') {
                mask |= MemAccess::WRITE;
            }
            fresh.add_combined_memory_breakpoint(address, mask)
        } else {
            fresh.add_port_out_breakpoint(address)
        };
        if let Some(rest) = line.split("note=").nth(1) {
            fresh.set_note(id, rest.split(" inactive").next().unwrap());
        }
        if let Some(rest) = line.split("group=").nth(1) {
            fresh.set_breakpoint_group(id, rest.split(' ').next().unwrap());
        }
        if line.ends_with("inactive") {
            fresh.deactivate_breakpoint(id);
        }
    }

    assert_eq!(fresh.list_as_string("\n"), first);
}

#[test]
fn test_calltrace_detects_hot_loop() {
    let mut emulator = pentagon_with_program(&[
        0x06, 0x20, // LD B,0x20
        0x10, 0xFE, // DJNZ self
        0x18, 0xFE, // JR self
    ]);
    emulator.features.set_enabled(Feature::CallTrace, true);
    emulator.run_n_instructions(0x20 + 10);

    let stats = emulator.bus.tracker.calltrace.stats();
    assert!(stats.total_events > 0);
    assert!(stats.hot_hits > 0);

    let hot = emulator.bus.tracker.calltrace.hot_snapshot();
    let djnz = hot
        .iter()
        .find(|entry| entry.event.kind == FlowKind::Djnz)
        .expect("DJNZ loop should be hot");
    // DJNZ taken 0x1F times: all but the final fall-through
    assert_eq!(djnz.event.loop_count, 0x1F);
    assert_eq!(djnz.event.m1_pc, 0x8002);
    assert_eq!(djnz.event.target, 0x8002);
    assert!(djnz.event.banks[0].is_rom);
}

#[test]
fn test_access_tracker_counts_and_report() {
    let mut emulator = pentagon_with_program(&[
        0x21, 0x00, 0x90, // LD HL,0x9000
        0x36, 0x55, // LD (HL),0x55
        0x7E, // LD A,(HL)
        0x18, 0xFE, // JR self
    ]);
    emulator.features.set_enabled(Feature::MemoryTracking, true);
    emulator.bus.tracker.session_mut().start();
    emulator.run_n_instructions(4);

    // Bank 2 saw the data write and read; bank 2 executes everything
    assert!(emulator.bus.tracker.bank_counters(2).writes >= 1);
    assert!(emulator.bus.tracker.bank_counters(2).reads >= 1);
    assert!(emulator.bus.tracker.bank_counters(2).executes >= 4);

    // Pentagon maps RAM page 2 at bank 2
    let page = emulator.bus.tracker.page_counters(PageRef::ram(2));
    assert!(page.writes >= 1);

    let report = emulator.bus.tracker.report(None);
    assert!(report.contains("ram2"));

    emulator.bus.tracker.reset_counters();
    assert_eq!(emulator.bus.tracker.bank_counters(2).writes, 0);
}

#[test]
fn test_remove_breakpoints_by_scope_end_to_end() {
    let mut emulator = pentagon_with_program(&[]);
    let manager = &mut emulator.bus.breakpoints;
    manager.add_execution_breakpoint(0x1000);
    manager.add_mem_read_breakpoint(0x2000);
    manager.add_port_in_breakpoint(0x00FE);
    assert_eq!(manager.count(), 3);
    assert_eq!(manager.remove_breakpoints_by_type(BreakpointClass::Execution), 1);
    assert_eq!(manager.remove_breakpoints_by_type(BreakpointClass::Port), 1);
    assert_eq!(manager.count(), 1);
}

#[test]
fn test_disassembly_of_running_program() {
    let emulator = pentagon_with_program(&[0xDD, 0xCB, 0x02, 0x46, 0xED, 0xB0]);
    let listing = emulator.disassemble(0x8000, 2);
    assert!(listing.contains("BIT 0,(IX+$02)"));
    assert!(listing.contains("LDIR"));
}
