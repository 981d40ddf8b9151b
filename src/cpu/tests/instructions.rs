//! Unprefixed instruction tests: loads, ALU flags, control flow, timing,
//! MEMPTR behavior.

use super::super::flags::{CF, F3, F5, HF, NF, PV, SF, ZF};
use super::*;

#[test]
fn test_nop_timing_and_pc() {
    let (mut cpu, mut bus) = fixture(&[0x00]);
    let t = cpu.step(&mut bus);
    assert_eq!(t, 4);
    assert_eq!(cpu.pc, ORG + 1);
    assert_eq!(cpu.r_low, 1);
}

#[test]
fn test_ld_r_n() {
    let (mut cpu, mut bus) = fixture(&[0x3E, 0x42, 0x06, 0x13]); // LD A,42; LD B,13
    let t = cpu.step(&mut bus);
    assert_eq!(t, 7);
    assert_eq!(cpu.a, 0x42);
    cpu.step(&mut bus);
    assert_eq!(cpu.b(), 0x13);
}

#[test]
fn test_ld_rp_nn() {
    let (mut cpu, mut bus) = fixture(&[0x01, 0x34, 0x12, 0x31, 0x00, 0xC0]);
    let t = cpu.step(&mut bus);
    assert_eq!(t, 10);
    assert_eq!(cpu.bc, 0x1234);
    cpu.step(&mut bus);
    assert_eq!(cpu.sp, 0xC000);
}

#[test]
fn test_ld_r_r_and_memory_forms() {
    // LD B,A; LD HL,nn; LD (HL),B; LD C,(HL)
    let (mut cpu, mut bus) = fixture(&[0x47, 0x21, 0x00, 0x90, 0x70, 0x4E]);
    cpu.a = 0x5A;
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.b(), 0x5A);
    assert_eq!(bus.memory.read(0x9000), 0x5A);
    assert_eq!(cpu.c(), 0x5A);
}

#[test]
fn test_add_flags_match_tables() {
    let (mut cpu, mut bus) = fixture(&[0xC6, 0x7F]); // ADD A,0x7F
    cpu.a = 0x01;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x80);
    // 0x01 + 0x7F overflows into the sign bit
    assert_ne!(cpu.f & SF, 0);
    assert_ne!(cpu.f & PV, 0);
    assert_ne!(cpu.f & HF, 0);
    assert_eq!(cpu.f & CF, 0);
    assert_eq!(cpu.f & NF, 0);
}

#[test]
fn test_sub_and_cp_flags() {
    let (mut cpu, mut bus) = fixture(&[0xD6, 0x20, 0xFE, 0x01]); // SUB 0x20; CP 0x01
    cpu.a = 0x10;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0xF0);
    assert_ne!(cpu.f & CF, 0);
    assert_ne!(cpu.f & NF, 0);
    // CP keeps A and takes F3/F5 from the operand
    cpu.a = 0xFF;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0xFF);
    assert_eq!(cpu.f & (F3 | F5), 0x01 & (F3 | F5));
}

#[test]
fn test_adc_sbc_carry_chains() {
    let (mut cpu, mut bus) = fixture(&[0xCE, 0x00, 0xDE, 0x00]); // ADC A,0; SBC A,0
    cpu.a = 0xFF;
    cpu.f = CF;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00); // 0xFF + 0 + carry
    assert_ne!(cpu.f & ZF, 0);
    assert_ne!(cpu.f & CF, 0);
    cpu.f = CF;
    cpu.a = 0x01;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x00); // 1 - 0 - carry
    assert_ne!(cpu.f & ZF, 0);
}

#[test]
fn test_logic_ops() {
    let (mut cpu, mut bus) = fixture(&[0xE6, 0x0F, 0xF6, 0xF0, 0xEE, 0xFF]);
    cpu.a = 0x3C;
    cpu.step(&mut bus); // AND 0x0F
    assert_eq!(cpu.a, 0x0C);
    assert_ne!(cpu.f & HF, 0);
    cpu.step(&mut bus); // OR 0xF0
    assert_eq!(cpu.a, 0xFC);
    assert_eq!(cpu.f & HF, 0);
    cpu.step(&mut bus); // XOR 0xFF
    assert_eq!(cpu.a, 0x03);
    assert_ne!(cpu.f & PV, 0); // two bits: even parity
}

#[test]
fn test_inc_dec_preserve_carry() {
    let (mut cpu, mut bus) = fixture(&[0x3C, 0x3D]); // INC A; DEC A
    cpu.a = 0x7F;
    cpu.f = CF;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x80);
    assert_ne!(cpu.f & PV, 0);
    assert_ne!(cpu.f & CF, 0); // preserved
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x7F);
    assert_ne!(cpu.f & CF, 0);
    assert_ne!(cpu.f & NF, 0);
}

#[test]
fn test_daa_bcd_addition() {
    let (mut cpu, mut bus) = fixture(&[0xC6, 0x27, 0x27]); // ADD A,0x27; DAA
    cpu.a = 0x15;
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.a, 0x42); // 15 + 27 = 42 in BCD
    assert_eq!(cpu.f & CF, 0);
}

#[test]
fn test_rlca_rra() {
    let (mut cpu, mut bus) = fixture(&[0x07, 0x1F]); // RLCA; RRA
    cpu.a = 0x81;
    cpu.f = 0;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x03);
    assert_ne!(cpu.f & CF, 0);
    cpu.step(&mut bus); // RRA shifts the carry into bit 7
    assert_eq!(cpu.a, 0x81);
    assert_ne!(cpu.f & CF, 0);
}

#[test]
fn test_scf_ccf() {
    let (mut cpu, mut bus) = fixture(&[0x37, 0x3F]); // SCF; CCF
    cpu.a = 0x28;
    cpu.step(&mut bus);
    assert_ne!(cpu.f & CF, 0);
    assert_eq!(cpu.f & (F3 | F5), 0x28 & (F3 | F5));
    cpu.step(&mut bus);
    assert_eq!(cpu.f & CF, 0);
    assert_ne!(cpu.f & HF, 0); // CCF moves the old carry into HF
}

#[test]
fn test_add_hl_rp() {
    let (mut cpu, mut bus) = fixture(&[0x09]); // ADD HL,BC
    cpu.hl = 0x0FFF;
    cpu.bc = 0x0001;
    let t = cpu.step(&mut bus);
    assert_eq!(t, 11);
    assert_eq!(cpu.hl, 0x1000);
    assert_ne!(cpu.f & HF, 0);
    assert_eq!(cpu.f & CF, 0);
    assert_eq!(cpu.memptr, 0x1000); // pre-add HL + 1
}

#[test]
fn test_push_pop_ex_sp() {
    // PUSH BC; POP DE; PUSH BC; EX (SP),HL
    let (mut cpu, mut bus) = fixture(&[0xC5, 0xD1, 0xC5, 0xE3]);
    cpu.bc = 0xBEEF;
    cpu.hl = 0x1234;
    let t = cpu.step(&mut bus);
    assert_eq!(t, 11);
    cpu.step(&mut bus);
    assert_eq!(cpu.de, 0xBEEF);
    cpu.step(&mut bus);
    let t = cpu.step(&mut bus);
    assert_eq!(t, 19);
    assert_eq!(cpu.hl, 0xBEEF);
    assert_eq!(cpu.memptr, 0xBEEF);
    // The old HL is now on the stack
    assert_eq!(bus.memory.read(cpu.sp), 0x34);
}

#[test]
fn test_exchange_instructions() {
    let (mut cpu, mut bus) = fixture(&[0x08, 0xEB, 0xD9]); // EX AF,AF'; EX DE,HL; EXX
    cpu.set_af(0x1122);
    cpu.a_alt = 0x33;
    cpu.f_alt = 0x44;
    cpu.step(&mut bus);
    assert_eq!(cpu.af(), 0x3344);
    assert_eq!(cpu.af_alt(), 0x1122);

    cpu.de = 0xAAAA;
    cpu.hl = 0xBBBB;
    cpu.step(&mut bus);
    assert_eq!(cpu.de, 0xBBBB);
    assert_eq!(cpu.hl, 0xAAAA);

    cpu.bc = 0x1111;
    cpu.bc_alt = 0x2222;
    cpu.step(&mut bus);
    assert_eq!(cpu.bc, 0x2222);
    assert_eq!(cpu.bc_alt, 0x1111);
}

#[test]
fn test_jp_and_memptr() {
    let (mut cpu, mut bus) = fixture(&[0xC3, 0x00, 0x90]); // JP 0x9000
    let t = cpu.step(&mut bus);
    assert_eq!(t, 10);
    assert_eq!(cpu.pc, 0x9000);
    assert_eq!(cpu.memptr, 0x9000);
    assert_eq!(cpu.last_branch, 0x9000);
}

#[test]
fn test_jp_cc_not_taken_still_sets_memptr() {
    let (mut cpu, mut bus) = fixture(&[0xCA, 0x00, 0x90]); // JP Z,0x9000
    cpu.f = 0; // Z clear
    let t = cpu.step(&mut bus);
    assert_eq!(t, 10);
    assert_eq!(cpu.pc, ORG + 3);
    assert_eq!(cpu.memptr, 0x9000);
}

#[test]
fn test_jr_timing() {
    let (mut cpu, mut bus) = fixture(&[0x28, 0x10, 0x20, 0x10]); // JR Z,+16; JR NZ,+16
    cpu.f = 0;
    let t = cpu.step(&mut bus); // Z clear: not taken
    assert_eq!(t, 7);
    assert_eq!(cpu.pc, ORG + 2);
    let t = cpu.step(&mut bus); // NZ: taken
    assert_eq!(t, 12);
    assert_eq!(cpu.pc, ORG + 4 + 0x10);
}

#[test]
fn test_djnz() {
    let (mut cpu, mut bus) = fixture(&[0x10, 0xFE]); // DJNZ self
    cpu.set_b(2);
    let t = cpu.step(&mut bus);
    assert_eq!(t, 13);
    assert_eq!(cpu.pc, ORG);
    assert_eq!(cpu.b(), 1);
    let t = cpu.step(&mut bus); // B hits zero: falls through
    assert_eq!(t, 8);
    assert_eq!(cpu.pc, ORG + 2);
}

#[test]
fn test_call_ret() {
    let mut program = vec![0xCD, 0x10, 0x80]; // CALL 0x8010
    program.resize(0x10, 0x00);
    program.push(0xC9); // RET at 0x8010
    let (mut cpu, mut bus) = fixture(&program);
    let sp0 = cpu.sp;
    let t = cpu.step(&mut bus);
    assert_eq!(t, 17);
    assert_eq!(cpu.pc, 0x8010);
    assert_eq!(cpu.sp, sp0.wrapping_sub(2));
    let t = cpu.step(&mut bus);
    assert_eq!(t, 10);
    assert_eq!(cpu.pc, ORG + 3);
    assert_eq!(cpu.sp, sp0);
    assert_eq!(cpu.memptr, ORG + 3);
}

#[test]
fn test_ret_cc_timing() {
    let (mut cpu, mut bus) = fixture(&[0xC0]); // RET NZ
    cpu.f = ZF; // condition false
    let t = cpu.step(&mut bus);
    assert_eq!(t, 5);
    assert_eq!(cpu.pc, ORG + 1);
}

#[test]
fn test_rst() {
    let (mut cpu, mut bus) = fixture(&[0xFF]); // RST 38H
    let t = cpu.step(&mut bus);
    assert_eq!(t, 11);
    assert_eq!(cpu.pc, 0x0038);
    assert_eq!(cpu.memptr, 0x0038);
    let ret = u16::from_le_bytes([bus.memory.read(cpu.sp), bus.memory.read(cpu.sp + 1)]);
    assert_eq!(ret, ORG + 1);
}

#[test]
fn test_ld_a_nn_memptr() {
    let (mut cpu, mut bus) = fixture(&[0x3A, 0x34, 0x12]); // LD A,(0x1234)
    bus.memory.direct_write(0x1234, 0x77);
    let t = cpu.step(&mut bus);
    assert_eq!(t, 13);
    assert_eq!(cpu.a, 0x77);
    assert_eq!(cpu.memptr, 0x1235);
}

#[test]
fn test_ld_bc_indirect_memptr() {
    let (mut cpu, mut bus) = fixture(&[0x02]); // LD (BC),A
    cpu.bc = 0x9000;
    cpu.a = 0xAB;
    cpu.step(&mut bus);
    assert_eq!(bus.memory.read(0x9000), 0xAB);
    // MEMPTR: low byte of BC+1, high byte from A
    assert_eq!(cpu.memptr, 0xAB01);
}

#[test]
fn test_ld_nn_hl_roundtrip() {
    let (mut cpu, mut bus) = fixture(&[0x22, 0x00, 0x90, 0x2A, 0x00, 0x90]);
    cpu.hl = 0xCAFE;
    let t = cpu.step(&mut bus); // LD (0x9000),HL
    assert_eq!(t, 16);
    cpu.hl = 0;
    cpu.step(&mut bus); // LD HL,(0x9000)
    assert_eq!(cpu.hl, 0xCAFE);
    assert_eq!(cpu.memptr, 0x9001);
}

#[test]
fn test_halt_backs_pc_up() {
    let (mut cpu, mut bus) = fixture(&[0x76, 0x00]); // HALT
    cpu.step(&mut bus);
    assert!(cpu.halted);
    assert_eq!(cpu.pc, ORG);
    // Halted steps spin without advancing PC
    let t = cpu.step(&mut bus);
    assert_eq!(t, 4);
    assert_eq!(cpu.pc, ORG);
}

#[test]
fn test_r_low_stays_seven_bit() {
    let (mut cpu, mut bus) = fixture(&[0x18, 0xFE]); // JR self
    cpu.r_low = 0x7E;
    cpu.r_hi = 0x80;
    run(&mut cpu, &mut bus, 3);
    assert!(cpu.r_low <= 0x7F);
    assert_eq!(cpu.r() & 0x80, 0x80);
}

#[test]
fn test_pc_advance_matches_encoded_length() {
    // One of each length class: 1, 2, 3 bytes
    let (mut cpu, mut bus) = fixture(&[0x00, 0x3E, 0x05, 0x01, 0x34, 0x12]);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc, ORG + 1);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc, ORG + 3);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc, ORG + 6);
}

#[test]
fn test_out_in_ports() {
    let (mut cpu, mut bus) = fixture(&[0xD3, 0xFE, 0xDB, 0xFE]); // OUT (FE),A; IN A,(FE)
    cpu.a = 0x05;
    let t = cpu.step(&mut bus);
    assert_eq!(t, 11);
    assert_eq!(bus.border, 0x05);
    assert_eq!(cpu.memptr, 0x05FF);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0xFF); // keyboard idle
}
