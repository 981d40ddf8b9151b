//! Z80 CPU helper functions
//!
//! This module contains the micro-operations the instruction handlers are
//! built from:
//! - Register accessors (b, c, d, e, h, l and the IXH/IYL halves)
//! - Timed memory primitives (m1, rd, wr, fetch_byte, fetch_word)
//! - Stack operations (push16, pop16)
//! - Timed port primitives (port_read, port_write)
//! - ALU operations resolved through the precomputed flag tables
//! - Index-aware operand resolution for DD/FD-prefixed instructions
//!
//! Every memory primitive accounts its t-states (scaled by `rate` and the
//! contention schedule) before touching the bus, so instruction length is
//! whatever the primitives accumulate - there is no per-opcode constant.

use super::flags::{CF, F3, F5, HF, NF, PV, SF, ZF};
use super::tables::TABLES;
use super::{Cpu, IndexMode};
use crate::bus::Bus;

impl Cpu {
    // ========== Register Accessors ==========

    /// Get B register (high byte of BC)
    #[inline]
    pub fn b(&self) -> u8 {
        (self.bc >> 8) as u8
    }

    /// Set B register
    #[inline]
    pub fn set_b(&mut self, val: u8) {
        self.bc = (self.bc & 0x00FF) | ((val as u16) << 8);
    }

    /// Get C register (low byte of BC)
    #[inline]
    pub fn c(&self) -> u8 {
        self.bc as u8
    }

    /// Set C register
    #[inline]
    pub fn set_c(&mut self, val: u8) {
        self.bc = (self.bc & 0xFF00) | (val as u16);
    }

    /// Get D register
    #[inline]
    pub fn d(&self) -> u8 {
        (self.de >> 8) as u8
    }

    /// Set D register
    #[inline]
    pub fn set_d(&mut self, val: u8) {
        self.de = (self.de & 0x00FF) | ((val as u16) << 8);
    }

    /// Get E register
    #[inline]
    pub fn e(&self) -> u8 {
        self.de as u8
    }

    /// Set E register
    #[inline]
    pub fn set_e(&mut self, val: u8) {
        self.de = (self.de & 0xFF00) | (val as u16);
    }

    /// Get H register
    #[inline]
    pub fn h(&self) -> u8 {
        (self.hl >> 8) as u8
    }

    /// Set H register
    #[inline]
    pub fn set_h(&mut self, val: u8) {
        self.hl = (self.hl & 0x00FF) | ((val as u16) << 8);
    }

    /// Get L register
    #[inline]
    pub fn l(&self) -> u8 {
        self.hl as u8
    }

    /// Set L register
    #[inline]
    pub fn set_l(&mut self, val: u8) {
        self.hl = (self.hl & 0xFF00) | (val as u16);
    }

    /// HL, IX or IY depending on the active index prefix
    #[inline]
    pub(crate) fn index_reg(&self) -> u16 {
        match self.index_mode {
            IndexMode::Hl => self.hl,
            IndexMode::Ix => self.ix,
            IndexMode::Iy => self.iy,
        }
    }

    #[inline]
    pub(crate) fn set_index_reg(&mut self, val: u16) {
        match self.index_mode {
            IndexMode::Hl => self.hl = val,
            IndexMode::Ix => self.ix = val,
            IndexMode::Iy => self.iy = val,
        }
    }

    /// High half of the active index register (H, IXH or IYH)
    #[inline]
    pub(crate) fn index_high(&self) -> u8 {
        (self.index_reg() >> 8) as u8
    }

    #[inline]
    pub(crate) fn set_index_high(&mut self, val: u8) {
        let reg = (self.index_reg() & 0x00FF) | ((val as u16) << 8);
        self.set_index_reg(reg);
    }

    /// Low half of the active index register (L, IXL or IYL)
    #[inline]
    pub(crate) fn index_low(&self) -> u8 {
        self.index_reg() as u8
    }

    #[inline]
    pub(crate) fn set_index_low(&mut self, val: u8) {
        let reg = (self.index_reg() & 0xFF00) | (val as u16);
        self.set_index_reg(reg);
    }

    // ========== Timed memory primitives ==========

    /// M1 opcode fetch: 4 t-states plus contention, R increment, and the
    /// instrumented opcode read.
    #[inline]
    pub(crate) fn m1(&mut self, bus: &mut Bus) -> u8 {
        let pc = self.pc;
        let wait = bus.contention(self.t(), pc);
        self.tact(4 + wait);
        self.r_low = (self.r_low + 1) & 0x7F;
        let opcode = bus.fetch_opcode(pc);
        self.pc = self.pc.wrapping_add(1);
        opcode
    }

    /// Timed data read: 3 t-states plus contention.
    #[inline]
    pub(crate) fn rd(&mut self, bus: &mut Bus, addr: u16) -> u8 {
        let wait = bus.contention(self.t(), addr);
        self.tact(3 + wait);
        bus.read(addr)
    }

    /// Timed data write: 3 t-states plus contention.
    #[inline]
    pub(crate) fn wr(&mut self, bus: &mut Bus, addr: u16, val: u8) {
        let wait = bus.contention(self.t(), addr);
        self.tact(3 + wait);
        bus.write(addr, val);
    }

    /// Fetch an immediate operand byte at PC.
    #[inline]
    pub(crate) fn fetch_byte(&mut self, bus: &mut Bus) -> u8 {
        let pc = self.pc;
        let val = self.rd(bus, pc);
        self.pc = self.pc.wrapping_add(1);
        val
    }

    /// Fetch an immediate operand word at PC, little-endian.
    #[inline]
    pub(crate) fn fetch_word(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.fetch_byte(bus);
        let hi = self.fetch_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Read a 16-bit word from memory, little-endian.
    #[inline]
    pub(crate) fn rd16(&mut self, bus: &mut Bus, addr: u16) -> u16 {
        let lo = self.rd(bus, addr);
        let hi = self.rd(bus, addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    /// Write a 16-bit word to memory, little-endian.
    #[inline]
    pub(crate) fn wr16(&mut self, bus: &mut Bus, addr: u16, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.wr(bus, addr, lo);
        self.wr(bus, addr.wrapping_add(1), hi);
    }

    // ========== Stack ==========

    /// Push a word: high byte first, as the hardware does.
    #[inline]
    pub(crate) fn push16(&mut self, bus: &mut Bus, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.sp = self.sp.wrapping_sub(1);
        let sp = self.sp;
        self.wr(bus, sp, hi);
        self.sp = self.sp.wrapping_sub(1);
        let sp = self.sp;
        self.wr(bus, sp, lo);
    }

    /// Pop a word: low byte first.
    #[inline]
    pub(crate) fn pop16(&mut self, bus: &mut Bus) -> u16 {
        let sp = self.sp;
        let lo = self.rd(bus, sp);
        self.sp = self.sp.wrapping_add(1);
        let sp = self.sp;
        let hi = self.rd(bus, sp);
        self.sp = self.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    // ========== Ports ==========

    /// Timed port read: 4 t-states for the IO cycle.
    #[inline]
    pub(crate) fn port_read(&mut self, bus: &mut Bus, port: u16) -> u8 {
        self.tact(4);
        bus.port_in(port)
    }

    /// Timed port write.
    #[inline]
    pub(crate) fn port_write(&mut self, bus: &mut Bus, port: u16, val: u8) {
        self.tact(4);
        bus.port_out(port, val);
    }

    // ========== Index-aware operand resolution ==========

    /// Effective address of the memory operand: HL, or IX/IY plus a fetched
    /// signed displacement. Indexed forms cost 3 t-states for the
    /// displacement fetch plus 5 internal, and set MEMPTR to the effective
    /// address.
    #[inline]
    pub(crate) fn operand_addr(&mut self, bus: &mut Bus) -> u16 {
        match self.index_mode {
            IndexMode::Hl => self.hl,
            _ => {
                let d = self.fetch_byte(bus) as i8;
                self.tact(5);
                let addr = self.index_reg().wrapping_add(d as u16);
                self.memptr = addr;
                addr
            }
        }
    }

    /// Like `operand_addr`, but with the 2 t-state internal delay used by
    /// the `LD (IX+d),n` form where the immediate follows the displacement.
    #[inline]
    pub(crate) fn operand_addr_short(&mut self, bus: &mut Bus) -> u16 {
        match self.index_mode {
            IndexMode::Hl => self.hl,
            _ => {
                let d = self.fetch_byte(bus) as i8;
                let addr = self.index_reg().wrapping_add(d as u16);
                self.memptr = addr;
                addr
            }
        }
    }

    /// Register-file read by operand code, honoring the index prefix for
    /// codes 4/5 (H/L halves). Code 6 must be resolved via `operand_addr`.
    #[inline]
    pub(crate) fn reg8(&self, code: u8) -> u8 {
        match code {
            0 => self.b(),
            1 => self.c(),
            2 => self.d(),
            3 => self.e(),
            4 => self.index_high(),
            5 => self.index_low(),
            7 => self.a,
            _ => 0,
        }
    }

    #[inline]
    pub(crate) fn set_reg8(&mut self, code: u8, val: u8) {
        match code {
            0 => self.set_b(val),
            1 => self.set_c(val),
            2 => self.set_d(val),
            3 => self.set_e(val),
            4 => self.set_index_high(val),
            5 => self.set_index_low(val),
            7 => self.a = val,
            _ => {}
        }
    }

    /// Plain register-file read ignoring the index prefix (used by the
    /// CB page and by LD forms with a memory operand).
    #[inline]
    pub(crate) fn reg8_plain(&self, code: u8) -> u8 {
        match code {
            0 => self.b(),
            1 => self.c(),
            2 => self.d(),
            3 => self.e(),
            4 => self.h(),
            5 => self.l(),
            7 => self.a,
            _ => 0,
        }
    }

    #[inline]
    pub(crate) fn set_reg8_plain(&mut self, code: u8, val: u8) {
        match code {
            0 => self.set_b(val),
            1 => self.set_c(val),
            2 => self.set_d(val),
            3 => self.set_e(val),
            4 => self.set_h(val),
            5 => self.set_l(val),
            7 => self.a = val,
            _ => {}
        }
    }

    /// 16-bit register pair by code (BC, DE, HL/IX/IY, SP).
    #[inline]
    pub(crate) fn rp(&self, code: u8) -> u16 {
        match code {
            0 => self.bc,
            1 => self.de,
            2 => self.index_reg(),
            _ => self.sp,
        }
    }

    #[inline]
    pub(crate) fn set_rp(&mut self, code: u8, val: u16) {
        match code {
            0 => self.bc = val,
            1 => self.de = val,
            2 => self.set_index_reg(val),
            _ => self.sp = val,
        }
    }

    /// Condition code test: NZ, Z, NC, C, PO, PE, P, M.
    #[inline]
    pub(crate) fn condition(&self, code: u8) -> bool {
        match code {
            0 => self.f & ZF == 0,
            1 => self.f & ZF != 0,
            2 => self.f & CF == 0,
            3 => self.f & CF != 0,
            4 => self.f & PV == 0,
            5 => self.f & PV != 0,
            6 => self.f & SF == 0,
            _ => self.f & SF != 0,
        }
    }

    // ========== Register exchange ==========

    pub(crate) fn ex_af(&mut self) {
        core::mem::swap(&mut self.a, &mut self.a_alt);
        core::mem::swap(&mut self.f, &mut self.f_alt);
    }

    pub(crate) fn exx(&mut self) {
        core::mem::swap(&mut self.bc, &mut self.bc_alt);
        core::mem::swap(&mut self.de, &mut self.de_alt);
        core::mem::swap(&mut self.hl, &mut self.hl_alt);
    }

    // ========== ALU (table-driven) ==========

    #[inline]
    pub(crate) fn add8(&mut self, src: u8) {
        self.f = TABLES.add_flags[self.a as usize + ((src as usize) << 8)];
        self.a = self.a.wrapping_add(src);
    }

    #[inline]
    pub(crate) fn adc8(&mut self, src: u8) {
        let carry = (self.f & CF) as usize;
        self.f = TABLES.add_flags[self.a as usize + ((src as usize) << 8) + (carry << 16)];
        self.a = self.a.wrapping_add(src).wrapping_add(carry as u8);
    }

    #[inline]
    pub(crate) fn sub8(&mut self, src: u8) {
        self.f = TABLES.sub_flags[((self.a as usize) << 8) + src as usize];
        self.a = self.a.wrapping_sub(src);
    }

    #[inline]
    pub(crate) fn sbc8(&mut self, src: u8) {
        let carry = (self.f & CF) as usize;
        self.f = TABLES.sub_flags[((self.a as usize) << 8) + src as usize + (carry << 16)];
        self.a = self.a.wrapping_sub(src).wrapping_sub(carry as u8);
    }

    #[inline]
    pub(crate) fn and8(&mut self, src: u8) {
        self.a &= src;
        self.f = TABLES.logic_flags[self.a as usize] | HF;
    }

    #[inline]
    pub(crate) fn or8(&mut self, src: u8) {
        self.a |= src;
        self.f = TABLES.logic_flags[self.a as usize];
    }

    #[inline]
    pub(crate) fn xor8(&mut self, src: u8) {
        self.a ^= src;
        self.f = TABLES.logic_flags[self.a as usize];
    }

    #[inline]
    pub(crate) fn cp8(&mut self, src: u8) {
        self.f = TABLES.cp_flags[((self.a as usize) << 8) + src as usize];
    }

    /// ALU dispatch by operation code y: ADD/ADC/SUB/SBC/AND/XOR/OR/CP.
    #[inline]
    pub(crate) fn alu(&mut self, op: u8, src: u8) {
        match op {
            0 => self.add8(src),
            1 => self.adc8(src),
            2 => self.sub8(src),
            3 => self.sbc8(src),
            4 => self.and8(src),
            5 => self.xor8(src),
            6 => self.or8(src),
            _ => self.cp8(src),
        }
    }

    /// INC: table flags with CF preserved.
    #[inline]
    pub(crate) fn inc8(&mut self, val: u8) -> u8 {
        self.f = TABLES.inc_flags[val as usize] | (self.f & CF);
        val.wrapping_add(1)
    }

    /// DEC: table flags with CF preserved.
    #[inline]
    pub(crate) fn dec8(&mut self, val: u8) -> u8 {
        self.f = TABLES.dec_flags[val as usize] | (self.f & CF);
        val.wrapping_sub(1)
    }

    /// ADD HL,rp (or IX/IY): HF from bit 11, CF, F5/F3 from the high byte;
    /// SF/ZF/PV preserved. MEMPTR tracks the pre-add value plus one.
    pub(crate) fn add16(&mut self, dst: u16, src: u16) -> u16 {
        self.memptr = dst.wrapping_add(1);
        let wide = dst as u32 + src as u32;
        let result = wide as u16;
        let mut f = self.f & (SF | ZF | PV);
        if wide > 0xFFFF {
            f |= CF;
        }
        if (dst & 0x0FFF) + (src & 0x0FFF) > 0x0FFF {
            f |= HF;
        }
        f |= ((result >> 8) as u8) & (F5 | F3);
        self.f = f;
        result
    }

    /// ADC HL,rp: full 16-bit flags.
    pub(crate) fn adc16(&mut self, src: u16) {
        self.memptr = self.hl.wrapping_add(1);
        let carry = (self.f & CF) as u32;
        let dst = self.hl;
        let wide = dst as u32 + src as u32 + carry;
        let result = wide as u16;
        let mut f = ((result >> 8) as u8) & (SF | F5 | F3);
        if result == 0 {
            f |= ZF;
        }
        if wide > 0xFFFF {
            f |= CF;
        }
        if (dst & 0x0FFF) + (src & 0x0FFF) + carry as u16 > 0x0FFF {
            f |= HF;
        }
        if (dst ^ src) & 0x8000 == 0 && (dst ^ result) & 0x8000 != 0 {
            f |= PV;
        }
        self.f = f;
        self.hl = result;
    }

    /// SBC HL,rp: full 16-bit flags.
    pub(crate) fn sbc16(&mut self, src: u16) {
        self.memptr = self.hl.wrapping_add(1);
        let carry = (self.f & CF) as u32;
        let dst = self.hl;
        let wide = (dst as u32).wrapping_sub(src as u32).wrapping_sub(carry);
        let result = wide as u16;
        let mut f = NF | (((result >> 8) as u8) & (SF | F5 | F3));
        if result == 0 {
            f |= ZF;
        }
        if (dst as u32) < src as u32 + carry {
            f |= CF;
        }
        if (dst & 0x0FFF) < (src & 0x0FFF) + carry as u16 {
            f |= HF;
        }
        if (dst ^ src) & 0x8000 != 0 && (dst ^ result) & 0x8000 != 0 {
            f |= PV;
        }
        self.f = f;
        self.hl = result;
    }

    /// DAA: decimal adjust after BCD arithmetic.
    pub(crate) fn daa(&mut self) {
        let mut correction = 0u8;
        let mut carry = self.f & CF != 0;
        if self.f & HF != 0 || self.a & 0x0F > 0x09 {
            correction |= 0x06;
        }
        if carry || self.a > 0x99 {
            correction |= 0x60;
            carry = true;
        }
        let before = self.a;
        if self.f & NF != 0 {
            let half = self.f & HF != 0 && before & 0x0F < 0x06;
            self.a = self.a.wrapping_sub(correction);
            self.f = (self.f & NF)
                | TABLES.logic_flags[self.a as usize]
                | if half { HF } else { 0 }
                | if carry { CF } else { 0 };
        } else {
            let half = before & 0x0F > 0x09;
            self.a = self.a.wrapping_add(correction);
            self.f = TABLES.logic_flags[self.a as usize]
                | if half { HF } else { 0 }
                | if carry { CF } else { 0 };
        }
    }
}
