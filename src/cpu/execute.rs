//! Z80 instruction execution
//!
//! Instruction decode uses the x-y-z-p-q decomposition of each opcode byte:
//! x = bits 7-6, y = bits 5-3, z = bits 2-0, p = y >> 1, q = y & 1.
//! One function per page:
//! - `execute_unprefixed`: the main 256-opcode page (index-aware for DD/FD)
//! - `execute_cb`: rotate/shift/bit page
//! - `execute_ddcb`: displaced rotate/shift/bit page (DD CB d op)
//! - `execute_ed`: extended page, including the block instructions
//!
//! T-state accounting beyond the fetch/memory primitives is done with
//! explicit `tact` calls per arm, following the hardware cycle diagrams.
//!
//! # References
//! - Zilog Z80 CPU User Manual (UM0080)
//! - "The Undocumented Z80 Documented" (Sean Young)

use super::flags::{CF, F3, F5, HF, NF, PV, SF, ZF};
use super::tables::{parity, TABLES};
use super::{Cpu, IndexMode, InterruptMode};
use crate::bus::Bus;
use crate::calltrace::FlowKind;
use crate::profiler::PrefixClass;

impl Cpu {
    /// Record a taken control-flow event.
    #[inline]
    fn flow(&mut self, bus: &mut Bus, kind: FlowKind, m1_pc: u16, target: u16) {
        self.last_branch = target;
        bus.record_flow(kind, m1_pc, target, self.f, self.sp);
    }

    /// Dispatch a fully prefixed-resolved opcode. `m1_pc` is the address of
    /// the first byte of the instruction (the first prefix, if any).
    pub(crate) fn dispatch(&mut self, bus: &mut Bus, opcode: u8, m1_pc: u16) {
        match opcode {
            0xCB if self.index_mode != IndexMode::Hl => {
                // DDCB/FDCB: displacement is fetched before the real opcode,
                // and neither trailing byte bumps R.
                let d = self.fetch_byte(bus) as i8;
                let addr = self.index_reg().wrapping_add(d as u16);
                self.memptr = addr;
                let sub = self.fetch_byte(bus);
                self.tact(2);
                let prefix = if self.index_mode == IndexMode::Ix {
                    PrefixClass::Ddcb
                } else {
                    PrefixClass::Fdcb
                };
                bus.note_instruction(prefix, sub, m1_pc, self.f, self.a, self.t());
                self.execute_ddcb(bus, sub, addr);
            }
            0xCB => {
                let sub = self.m1(bus);
                bus.note_instruction(PrefixClass::Cb, sub, m1_pc, self.f, self.a, self.t());
                self.execute_cb(bus, sub);
            }
            0xED => {
                // ED cancels any DD/FD prefix.
                self.index_mode = IndexMode::Hl;
                let sub = self.m1(bus);
                bus.note_instruction(PrefixClass::Ed, sub, m1_pc, self.f, self.a, self.t());
                self.execute_ed(bus, sub, m1_pc);
            }
            _ => {
                let prefix = match self.index_mode {
                    IndexMode::Hl => PrefixClass::None,
                    IndexMode::Ix => PrefixClass::Dd,
                    IndexMode::Iy => PrefixClass::Fd,
                };
                bus.note_instruction(prefix, opcode, m1_pc, self.f, self.a, self.t());
                self.execute_unprefixed(bus, opcode, m1_pc);
            }
        }
    }

    fn execute_unprefixed(&mut self, bus: &mut Bus, opcode: u8, m1_pc: u16) {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;
        let p = y >> 1;
        let q = y & 0x01;

        match x {
            0 => self.execute_x0(bus, y, z, p, q, m1_pc),
            1 => {
                if y == 6 && z == 6 {
                    // HALT: spin on the HALT address until an interrupt.
                    self.halted = true;
                    self.pc = self.pc.wrapping_sub(1);
                } else if y == 6 {
                    // LD (HL/IX+d),r - the source is always the plain file
                    let addr = self.operand_addr(bus);
                    let val = self.reg8_plain(z);
                    self.wr(bus, addr, val);
                } else if z == 6 {
                    // LD r,(HL/IX+d)
                    let addr = self.operand_addr(bus);
                    let val = self.rd(bus, addr);
                    self.set_reg8_plain(y, val);
                } else {
                    let val = self.reg8(z);
                    self.set_reg8(y, val);
                }
            }
            2 => {
                // ALU A,r
                let val = if z == 6 {
                    let addr = self.operand_addr(bus);
                    self.rd(bus, addr)
                } else {
                    self.reg8(z)
                };
                self.alu(y, val);
            }
            _ => self.execute_x3(bus, y, z, p, q, m1_pc),
        }
    }

    fn execute_x0(&mut self, bus: &mut Bus, y: u8, z: u8, p: u8, q: u8, m1_pc: u16) {
        match z {
            0 => match y {
                0 => {} // NOP
                1 => self.ex_af(),
                2 => {
                    // DJNZ d
                    self.tact(1);
                    let d = self.fetch_byte(bus) as i8;
                    self.set_b(self.b().wrapping_sub(1));
                    if self.b() != 0 {
                        self.tact(5);
                        let target = self.pc.wrapping_add(d as u16);
                        self.memptr = target;
                        self.pc = target;
                        self.flow(bus, FlowKind::Djnz, m1_pc, target);
                    }
                }
                3 => {
                    // JR d
                    let d = self.fetch_byte(bus) as i8;
                    self.tact(5);
                    let target = self.pc.wrapping_add(d as u16);
                    self.memptr = target;
                    self.pc = target;
                    self.flow(bus, FlowKind::Jr, m1_pc, target);
                }
                _ => {
                    // JR cc,d
                    let d = self.fetch_byte(bus) as i8;
                    if self.condition(y - 4) {
                        self.tact(5);
                        let target = self.pc.wrapping_add(d as u16);
                        self.memptr = target;
                        self.pc = target;
                        self.flow(bus, FlowKind::Jr, m1_pc, target);
                    }
                }
            },
            1 => {
                if q == 0 {
                    // LD rp,nn
                    let nn = self.fetch_word(bus);
                    self.set_rp(p, nn);
                } else {
                    // ADD HL,rp
                    self.tact(7);
                    let dst = self.index_reg();
                    let src = self.rp(p);
                    let result = self.add16(dst, src);
                    self.set_index_reg(result);
                }
            }
            2 => match (q, p) {
                (0, 0) => {
                    // LD (BC),A
                    let addr = self.bc;
                    let a = self.a;
                    self.memptr =
                        ((a as u16) << 8) | (addr.wrapping_add(1) & 0x00FF);
                    self.wr(bus, addr, a);
                }
                (0, 1) => {
                    // LD (DE),A
                    let addr = self.de;
                    let a = self.a;
                    self.memptr =
                        ((a as u16) << 8) | (addr.wrapping_add(1) & 0x00FF);
                    self.wr(bus, addr, a);
                }
                (0, 2) => {
                    // LD (nn),HL
                    let nn = self.fetch_word(bus);
                    self.memptr = nn.wrapping_add(1);
                    let val = self.index_reg();
                    self.wr16(bus, nn, val);
                }
                (0, _) => {
                    // LD (nn),A
                    let nn = self.fetch_word(bus);
                    let a = self.a;
                    self.memptr = ((a as u16) << 8) | (nn.wrapping_add(1) & 0x00FF);
                    self.wr(bus, nn, a);
                }
                (1, 0) => {
                    // LD A,(BC)
                    let addr = self.bc;
                    self.memptr = addr.wrapping_add(1);
                    self.a = self.rd(bus, addr);
                }
                (1, 1) => {
                    // LD A,(DE)
                    let addr = self.de;
                    self.memptr = addr.wrapping_add(1);
                    self.a = self.rd(bus, addr);
                }
                (1, 2) => {
                    // LD HL,(nn)
                    let nn = self.fetch_word(bus);
                    self.memptr = nn.wrapping_add(1);
                    let val = self.rd16(bus, nn);
                    self.set_index_reg(val);
                }
                _ => {
                    // LD A,(nn)
                    let nn = self.fetch_word(bus);
                    self.memptr = nn.wrapping_add(1);
                    self.a = self.rd(bus, nn);
                }
            },
            3 => {
                self.tact(2);
                let val = self.rp(p);
                if q == 0 {
                    self.set_rp(p, val.wrapping_add(1));
                } else {
                    self.set_rp(p, val.wrapping_sub(1));
                }
            }
            4 => {
                // INC r
                if y == 6 {
                    let addr = self.operand_addr(bus);
                    let val = self.rd(bus, addr);
                    self.tact(1);
                    let result = self.inc8(val);
                    self.wr(bus, addr, result);
                } else {
                    let val = self.reg8(y);
                    let result = self.inc8(val);
                    self.set_reg8(y, result);
                }
            }
            5 => {
                // DEC r
                if y == 6 {
                    let addr = self.operand_addr(bus);
                    let val = self.rd(bus, addr);
                    self.tact(1);
                    let result = self.dec8(val);
                    self.wr(bus, addr, result);
                } else {
                    let val = self.reg8(y);
                    let result = self.dec8(val);
                    self.set_reg8(y, result);
                }
            }
            6 => {
                // LD r,n
                if y == 6 {
                    let addr = self.operand_addr_short(bus);
                    let n = self.fetch_byte(bus);
                    if self.index_mode != IndexMode::Hl {
                        self.tact(2);
                    }
                    self.wr(bus, addr, n);
                } else {
                    let n = self.fetch_byte(bus);
                    self.set_reg8(y, n);
                }
            }
            _ => match y {
                0 => {
                    // RLCA
                    self.f = (self.f & (SF | ZF | PV)) | TABLES.rlca_flags[self.a as usize];
                    self.a = TABLES.rol[self.a as usize];
                }
                1 => {
                    // RRCA
                    self.f = (self.f & (SF | ZF | PV)) | TABLES.rrca_flags[self.a as usize];
                    self.a = TABLES.ror[self.a as usize];
                }
                2 => {
                    // RLA
                    let result = if self.f & CF != 0 {
                        TABLES.rl1[self.a as usize]
                    } else {
                        TABLES.rl0[self.a as usize]
                    };
                    self.f = (self.f & (SF | ZF | PV))
                        | (result & (F5 | F3))
                        | (self.a >> 7);
                    self.a = result;
                }
                3 => {
                    // RRA
                    let result = if self.f & CF != 0 {
                        TABLES.rr1[self.a as usize]
                    } else {
                        TABLES.rr0[self.a as usize]
                    };
                    self.f = (self.f & (SF | ZF | PV))
                        | (result & (F5 | F3))
                        | (self.a & 0x01);
                    self.a = result;
                }
                4 => self.daa(),
                5 => {
                    // CPL
                    self.a = !self.a;
                    self.f = (self.f & (SF | ZF | PV | CF))
                        | HF
                        | NF
                        | (self.a & (F5 | F3));
                }
                6 => {
                    // SCF
                    self.f = (self.f & (SF | ZF | PV)) | CF | (self.a & (F5 | F3));
                }
                _ => {
                    // CCF
                    let carry = self.f & CF;
                    self.f = ((self.f & (SF | ZF | PV)) | (carry << 4) | (self.a & (F5 | F3)))
                        | (carry ^ CF);
                }
            },
        }
    }

    fn execute_x3(&mut self, bus: &mut Bus, y: u8, z: u8, p: u8, q: u8, m1_pc: u16) {
        match z {
            0 => {
                // RET cc
                self.tact(1);
                if self.condition(y) {
                    let target = self.pop16(bus);
                    self.memptr = target;
                    self.pc = target;
                    self.flow(bus, FlowKind::Ret, m1_pc, target);
                }
            }
            1 => match (q, p) {
                (0, _) => {
                    // POP rp2
                    let val = self.pop16(bus);
                    if p == 3 {
                        self.set_af(val);
                    } else if p == 2 {
                        self.set_index_reg(val);
                    } else {
                        self.set_rp(p, val);
                    }
                }
                (1, 0) => {
                    // RET
                    let target = self.pop16(bus);
                    self.memptr = target;
                    self.pc = target;
                    self.flow(bus, FlowKind::Ret, m1_pc, target);
                }
                (1, 1) => self.exx(),
                (1, 2) => {
                    // JP (HL)
                    let target = self.index_reg();
                    self.pc = target;
                    self.flow(bus, FlowKind::Jp, m1_pc, target);
                }
                _ => {
                    // LD SP,HL
                    self.tact(2);
                    self.sp = self.index_reg();
                }
            },
            2 => {
                // JP cc,nn
                let nn = self.fetch_word(bus);
                self.memptr = nn;
                if self.condition(y) {
                    self.pc = nn;
                    self.flow(bus, FlowKind::Jp, m1_pc, nn);
                }
            }
            3 => match y {
                0 => {
                    // JP nn
                    let nn = self.fetch_word(bus);
                    self.memptr = nn;
                    self.pc = nn;
                    self.flow(bus, FlowKind::Jp, m1_pc, nn);
                }
                1 => unreachable!("CB prefix handled in dispatch"),
                2 => {
                    // OUT (n),A
                    let n = self.fetch_byte(bus);
                    let a = self.a;
                    let port = ((a as u16) << 8) | n as u16;
                    self.memptr =
                        ((a as u16) << 8) | (n.wrapping_add(1) as u16);
                    self.port_write(bus, port, a);
                }
                3 => {
                    // IN A,(n)
                    let n = self.fetch_byte(bus);
                    let port = ((self.a as u16) << 8) | n as u16;
                    self.memptr = port.wrapping_add(1);
                    self.a = self.port_read(bus, port);
                }
                4 => {
                    // EX (SP),HL
                    let sp = self.sp;
                    let lo = self.rd(bus, sp);
                    let hi = self.rd(bus, sp.wrapping_add(1));
                    self.tact(1);
                    let old = self.index_reg();
                    self.wr(bus, sp.wrapping_add(1), (old >> 8) as u8);
                    self.wr(bus, sp, old as u8);
                    self.tact(2);
                    let new = u16::from_le_bytes([lo, hi]);
                    self.set_index_reg(new);
                    self.memptr = new;
                }
                5 => {
                    // EX DE,HL - never redirected by DD/FD
                    core::mem::swap(&mut self.de, &mut self.hl);
                }
                6 => {
                    // DI
                    self.iff1 = false;
                    self.iff2 = false;
                }
                _ => {
                    // EI - interrupts are accepted only after the next
                    // instruction completes.
                    self.iff1 = true;
                    self.iff2 = true;
                    self.ei_shield = true;
                }
            },
            4 => {
                // CALL cc,nn
                let nn = self.fetch_word(bus);
                self.memptr = nn;
                if self.condition(y) {
                    self.tact(1);
                    let ret = self.pc;
                    self.push16(bus, ret);
                    self.pc = nn;
                    self.flow(bus, FlowKind::Call, m1_pc, nn);
                }
            }
            5 => match (q, p) {
                (0, _) => {
                    // PUSH rp2
                    self.tact(1);
                    let val = if p == 3 {
                        self.af()
                    } else if p == 2 {
                        self.index_reg()
                    } else {
                        self.rp(p)
                    };
                    self.push16(bus, val);
                }
                (1, 0) => {
                    // CALL nn
                    let nn = self.fetch_word(bus);
                    self.memptr = nn;
                    self.tact(1);
                    let ret = self.pc;
                    self.push16(bus, ret);
                    self.pc = nn;
                    self.flow(bus, FlowKind::Call, m1_pc, nn);
                }
                _ => unreachable!("DD/ED/FD prefixes handled in dispatch"),
            },
            6 => {
                // ALU A,n
                let n = self.fetch_byte(bus);
                self.alu(y, n);
            }
            _ => {
                // RST y*8
                self.tact(1);
                let ret = self.pc;
                self.push16(bus, ret);
                let target = (y as u16) * 8;
                self.memptr = target;
                self.pc = target;
                self.flow(bus, FlowKind::Rst, m1_pc, target);
            }
        }
    }

    /// Apply a CB-page rotate/shift operation, setting flags.
    fn rotate(&mut self, op: u8, val: u8) -> u8 {
        match op {
            0 => {
                // RLC
                self.f = TABLES.rlc_flags[val as usize];
                TABLES.rol[val as usize]
            }
            1 => {
                // RRC
                self.f = TABLES.rrc_flags[val as usize];
                TABLES.ror[val as usize]
            }
            2 => {
                // RL
                let result = if self.f & CF != 0 {
                    TABLES.rl1[val as usize]
                } else {
                    TABLES.rl0[val as usize]
                };
                self.f = TABLES.logic_flags[result as usize] | (val >> 7);
                result
            }
            3 => {
                // RR
                let result = if self.f & CF != 0 {
                    TABLES.rr1[val as usize]
                } else {
                    TABLES.rr0[val as usize]
                };
                self.f = TABLES.logic_flags[result as usize] | (val & 0x01);
                result
            }
            4 => {
                // SLA
                let result = TABLES.rl0[val as usize];
                self.f = TABLES.logic_flags[result as usize] | (val >> 7);
                result
            }
            5 => {
                // SRA
                self.f = TABLES.sra_flags[val as usize];
                (val >> 1) | (val & 0x80)
            }
            6 => {
                // SLL (undocumented: shifts in a 1)
                let result = TABLES.rl1[val as usize];
                self.f = TABLES.logic_flags[result as usize] | (val >> 7);
                result
            }
            _ => {
                // SRL
                let result = TABLES.rr0[val as usize];
                self.f = TABLES.logic_flags[result as usize] | (val & 0x01);
                result
            }
        }
    }

    /// BIT test flags. The F3/F5 source differs between the register,
    /// (HL) and indexed forms, so the caller passes it in.
    fn bit_flags(&mut self, val: u8, bit: u8, f53_source: u8) {
        self.f = TABLES.logic_flags[(val & (1 << bit)) as usize] | HF | (self.f & CF);
        self.f = (self.f & !(F3 | F5)) | (f53_source & (F3 | F5));
    }

    fn execute_cb(&mut self, bus: &mut Bus, opcode: u8) {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;

        match x {
            0 => {
                if z == 6 {
                    let addr = self.hl;
                    let val = self.rd(bus, addr);
                    self.tact(1);
                    let result = self.rotate(y, val);
                    self.wr(bus, addr, result);
                } else {
                    let val = self.reg8_plain(z);
                    let result = self.rotate(y, val);
                    self.set_reg8_plain(z, result);
                }
            }
            1 => {
                // BIT y,r / BIT y,(HL)
                if z == 6 {
                    let addr = self.hl;
                    let val = self.rd(bus, addr);
                    self.tact(1);
                    let memh = (self.memptr >> 8) as u8;
                    self.bit_flags(val, y, memh);
                } else {
                    let val = self.reg8_plain(z);
                    self.bit_flags(val, y, val);
                }
            }
            2 => {
                // RES y,r
                if z == 6 {
                    let addr = self.hl;
                    let val = self.rd(bus, addr);
                    self.tact(1);
                    self.wr(bus, addr, val & !(1 << y));
                } else {
                    let val = self.reg8_plain(z);
                    self.set_reg8_plain(z, val & !(1 << y));
                }
            }
            _ => {
                // SET y,r
                if z == 6 {
                    let addr = self.hl;
                    let val = self.rd(bus, addr);
                    self.tact(1);
                    self.wr(bus, addr, val | (1 << y));
                } else {
                    let val = self.reg8_plain(z);
                    self.set_reg8_plain(z, val | (1 << y));
                }
            }
        }
    }

    /// DDCB/FDCB page: the operand always comes from `(IX/IY + d)`; the
    /// undocumented non-(HL) forms copy the result into a register too.
    fn execute_ddcb(&mut self, bus: &mut Bus, opcode: u8, addr: u16) {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;

        let val = self.rd(bus, addr);
        self.tact(1);
        match x {
            1 => {
                // BIT y,(IX+d): F3/F5 from the effective address high byte
                let memh = (addr >> 8) as u8;
                self.bit_flags(val, y, memh);
                return;
            }
            0 => {
                let result = self.rotate(y, val);
                self.wr(bus, addr, result);
                if z != 6 {
                    self.set_reg8_plain(z, result);
                }
            }
            2 => {
                let result = val & !(1 << y);
                self.wr(bus, addr, result);
                if z != 6 {
                    self.set_reg8_plain(z, result);
                }
            }
            _ => {
                let result = val | (1 << y);
                self.wr(bus, addr, result);
                if z != 6 {
                    self.set_reg8_plain(z, result);
                }
            }
        }
    }

    fn execute_ed(&mut self, bus: &mut Bus, opcode: u8, m1_pc: u16) {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;
        let p = y >> 1;
        let q = y & 0x01;

        if x == 2 && z <= 3 && y >= 4 {
            self.execute_block(bus, y, z);
            return;
        }
        if x != 1 {
            // Every unassigned ED opcode is a plain NOP.
            return;
        }

        match z {
            0 => {
                // IN r,(C) - y == 6 is the flags-only undocumented IN (C)
                let port = self.bc;
                self.memptr = port.wrapping_add(1);
                let val = self.port_read(bus, port);
                if y != 6 {
                    self.set_reg8_plain(y, val);
                }
                self.f = TABLES.logic_flags[val as usize] | (self.f & CF);
            }
            1 => {
                // OUT (C),r - y == 6 is the undocumented OUT (C),0
                let port = self.bc;
                self.memptr = port.wrapping_add(1);
                let val = if y == 6 { 0 } else { self.reg8_plain(y) };
                self.port_write(bus, port, val);
            }
            2 => {
                self.tact(7);
                let src = self.rp(p);
                if q == 0 {
                    self.sbc16(src);
                } else {
                    self.adc16(src);
                }
            }
            3 => {
                // LD (nn),rp / LD rp,(nn)
                let nn = self.fetch_word(bus);
                self.memptr = nn.wrapping_add(1);
                if q == 0 {
                    let val = self.rp(p);
                    self.wr16(bus, nn, val);
                } else {
                    let val = self.rd16(bus, nn);
                    self.set_rp(p, val);
                }
            }
            4 => {
                // NEG (all eight encodings)
                let a = self.a;
                self.f = TABLES.sub_flags[a as usize];
                self.a = 0u8.wrapping_sub(a);
            }
            5 => {
                // RETN / RETI: both copy IFF2 back into IFF1
                let target = self.pop16(bus);
                self.memptr = target;
                self.pc = target;
                self.iff1 = self.iff2;
                if y == 1 {
                    self.flow(bus, FlowKind::Reti, m1_pc, target);
                } else {
                    self.nmi_in_progress = false;
                    self.flow(bus, FlowKind::Reti, m1_pc, target);
                }
            }
            6 => {
                self.im = match y & 0x03 {
                    0 | 1 => InterruptMode::Mode0,
                    2 => InterruptMode::Mode1,
                    _ => InterruptMode::Mode2,
                };
            }
            _ => match y {
                0 => {
                    // LD I,A
                    self.tact(1);
                    self.i = self.a;
                }
                1 => {
                    // LD R,A
                    self.tact(1);
                    let a = self.a;
                    self.set_r(a);
                }
                2 => {
                    // LD A,I
                    self.tact(1);
                    self.a = self.i;
                    self.f = (TABLES.logic_flags[self.a as usize] & !PV)
                        | (self.f & CF)
                        | if self.iff2 { PV } else { 0 };
                }
                3 => {
                    // LD A,R
                    self.tact(1);
                    self.a = self.r();
                    self.f = (TABLES.logic_flags[self.a as usize] & !PV)
                        | (self.f & CF)
                        | if self.iff2 { PV } else { 0 };
                }
                4 => {
                    // RRD
                    let addr = self.hl;
                    self.memptr = addr.wrapping_add(1);
                    let val = self.rd(bus, addr);
                    self.tact(4);
                    let new_val = (self.a << 4) | (val >> 4);
                    self.a = (self.a & 0xF0) | (val & 0x0F);
                    self.wr(bus, addr, new_val);
                    self.f = TABLES.logic_flags[self.a as usize] | (self.f & CF);
                }
                5 => {
                    // RLD
                    let addr = self.hl;
                    self.memptr = addr.wrapping_add(1);
                    let val = self.rd(bus, addr);
                    self.tact(4);
                    let new_val = (val << 4) | (self.a & 0x0F);
                    self.a = (self.a & 0xF0) | (val >> 4);
                    self.wr(bus, addr, new_val);
                    self.f = TABLES.logic_flags[self.a as usize] | (self.f & CF);
                }
                _ => {} // NOP
            },
        }
    }

    /// Block instructions: LDI/CPI/INI/OUTI and their decrementing and
    /// repeating variants.
    fn execute_block(&mut self, bus: &mut Bus, y: u8, z: u8) {
        let decrement = y & 0x01 != 0;
        let repeat = y & 0x02 != 0;
        let step = if decrement { 0xFFFFu16 } else { 0x0001 };

        match z {
            0 => {
                // LDI/LDD/LDIR/LDDR
                let hl = self.hl;
                let de = self.de;
                let val = self.rd(bus, hl);
                self.wr(bus, de, val);
                self.tact(2);
                self.hl = hl.wrapping_add(step);
                self.de = de.wrapping_add(step);
                self.bc = self.bc.wrapping_sub(1);

                let n = val.wrapping_add(self.a);
                let mut f = self.f & (SF | ZF | CF);
                f |= n & F3;
                if n & 0x02 != 0 {
                    f |= F5;
                }
                if self.bc != 0 {
                    f |= PV;
                }
                self.f = f;

                if repeat && self.bc != 0 {
                    self.tact(5);
                    self.pc = self.pc.wrapping_sub(2);
                    self.memptr = self.pc.wrapping_add(1);
                }
            }
            1 => {
                // CPI/CPD/CPIR/CPDR
                let hl = self.hl;
                let val = self.rd(bus, hl);
                self.tact(5);
                self.hl = hl.wrapping_add(step);
                self.bc = self.bc.wrapping_sub(1);
                self.memptr = self.memptr.wrapping_add(step);

                let mut f =
                    TABLES.cpf8b[((self.a as usize) << 8) + val as usize] | (self.f & CF);
                if self.bc != 0 {
                    f |= PV;
                }
                self.f = f;

                if repeat && self.bc != 0 && self.f & ZF == 0 {
                    self.tact(5);
                    self.pc = self.pc.wrapping_sub(2);
                    self.memptr = self.pc.wrapping_add(1);
                }
            }
            2 => {
                // INI/IND/INIR/INDR
                self.tact(1);
                let port = self.bc;
                self.memptr = port.wrapping_add(step);
                let val = self.port_read(bus, port);
                let hl = self.hl;
                self.wr(bus, hl, val);
                self.hl = hl.wrapping_add(step);
                self.set_b(self.b().wrapping_sub(1));

                let b = self.b();
                let k = val as u16 + (self.c().wrapping_add(if decrement { 0xFF } else { 1 })) as u16;
                let mut f = TABLES.logic_flags[b as usize] & (SF | ZF | F5 | F3);
                if val & 0x80 != 0 {
                    f |= NF;
                }
                if k > 0xFF {
                    f |= HF | CF;
                }
                if parity(((k & 0x07) as u8) ^ b) {
                    f |= PV;
                }
                self.f = f;

                if repeat && b != 0 {
                    self.tact(5);
                    self.pc = self.pc.wrapping_sub(2);
                }
            }
            _ => {
                // OUTI/OUTD/OTIR/OTDR
                self.tact(1);
                let hl = self.hl;
                let val = self.rd(bus, hl);
                self.set_b(self.b().wrapping_sub(1));
                let port = self.bc;
                self.memptr = port.wrapping_add(step);
                self.port_write(bus, port, val);
                self.hl = hl.wrapping_add(step);

                let b = self.b();
                let k = val as u16 + (self.hl & 0xFF);
                let mut f = TABLES.logic_flags[b as usize] & (SF | ZF | F5 | F3);
                if val & 0x80 != 0 {
                    f |= NF;
                }
                if k > 0xFF {
                    f |= HF | CF;
                }
                if parity(((k & 0x07) as u8) ^ b) {
                    f |= PV;
                }
                self.f = f;

                if repeat && b != 0 {
                    self.tact(5);
                    self.pc = self.pc.wrapping_sub(2);
                }
            }
        }
    }
}
