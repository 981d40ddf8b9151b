//! Precomputed Z80 flag and rotate tables
//!
//! Every ALU instruction resolves its flag byte with a single table index
//! instead of a chain of bit operations. The tables are built once, on first
//! use, and shared by every emulator instance in the process.
//!
//! Indexing conventions (fixed, relied on by `cpu::helpers`):
//! - `add_flags[a + (b << 8) + (carry << 16)]`
//! - `sub_flags[(a << 8) + b + (carry << 16)]`
//! - `cp_flags[(a << 8) + b]`
//! - `cpf8b[(a << 8) + b]` - CPI/CPD variant, F3/F5 taken from `A - b - HF`
//! - single-operand tables are indexed by the operand value *before* the
//!   operation (`inc_flags[x]` is the flag byte after `x + 1`)

use once_cell::sync::Lazy;

use super::flags::{CF, F3, F5, HF, NF, PV, SF, ZF};

/// All precomputed CPU tables, built once at startup.
pub struct FlagTables {
    /// SF | ZF | F5 | F3 | parity for AND/OR/XOR results (HF/NF/CF clear)
    pub logic_flags: [u8; 0x100],
    /// Flags after `x + 1`, indexed by `x`; CF preserved by caller
    pub inc_flags: [u8; 0x100],
    /// Flags after `x - 1`, indexed by `x`; CF preserved by caller
    pub dec_flags: [u8; 0x100],
    /// Full flags for ADD/ADC
    pub add_flags: Box<[u8; 0x20000]>,
    /// Full flags for SUB/SBC
    pub sub_flags: Box<[u8; 0x20000]>,
    /// Full flags for CP (F3/F5 come from the operand, not the result)
    pub cp_flags: Box<[u8; 0x10000]>,
    /// CPI/CPD flags: F3/F5 from `A - operand - HF`, CF left to the caller
    pub cpf8b: Box<[u8; 0x10000]>,
    /// Flags after RLC, indexed by the pre-rotate value
    pub rlc_flags: [u8; 0x100],
    /// Flags after RRC, indexed by the pre-rotate value
    pub rrc_flags: [u8; 0x100],
    /// F5/F3/HF/NF/CF contribution of RLCA (SF/ZF/PV preserved by caller)
    pub rlca_flags: [u8; 0x100],
    /// F5/F3/HF/NF/CF contribution of RRCA
    pub rrca_flags: [u8; 0x100],
    /// Flags after SRA, indexed by the pre-shift value
    pub sra_flags: [u8; 0x100],
    /// Rotate-left result: `(x << 1) | (x >> 7)`
    pub rol: [u8; 0x100],
    /// Rotate-right result: `(x >> 1) | (x << 7)`
    pub ror: [u8; 0x100],
    /// Shift-left result with carry-in 0 (RL/SLA)
    pub rl0: [u8; 0x100],
    /// Shift-left result with carry-in 1 (RL/SLL)
    pub rl1: [u8; 0x100],
    /// Shift-right result with carry-in 0 (RR/SRL)
    pub rr0: [u8; 0x100],
    /// Shift-right result with carry-in 1 (RR)
    pub rr1: [u8; 0x100],
}

/// Process-wide table instance.
pub static TABLES: Lazy<FlagTables> = Lazy::new(FlagTables::build);

/// Parity of a byte: true when the number of set bits is even.
#[inline]
pub fn parity(value: u8) -> bool {
    value.count_ones() % 2 == 0
}

#[inline]
fn szf53(result: u8) -> u8 {
    let mut f = result & (F5 | F3);
    if result == 0 {
        f |= ZF;
    }
    f | (result & SF)
}

impl FlagTables {
    fn build() -> Self {
        let mut logic_flags = [0u8; 0x100];
        let mut inc_flags = [0u8; 0x100];
        let mut dec_flags = [0u8; 0x100];
        let mut rlc_flags = [0u8; 0x100];
        let mut rrc_flags = [0u8; 0x100];
        let mut rlca_flags = [0u8; 0x100];
        let mut rrca_flags = [0u8; 0x100];
        let mut sra_flags = [0u8; 0x100];
        let mut rol = [0u8; 0x100];
        let mut ror = [0u8; 0x100];
        let mut rl0 = [0u8; 0x100];
        let mut rl1 = [0u8; 0x100];
        let mut rr0 = [0u8; 0x100];
        let mut rr1 = [0u8; 0x100];

        for x in 0..0x100usize {
            let v = x as u8;

            let mut lf = szf53(v);
            if parity(v) {
                lf |= PV;
            }
            logic_flags[x] = lf;

            let inc = v.wrapping_add(1);
            let mut f = szf53(inc);
            if v & 0x0F == 0x0F {
                f |= HF;
            }
            if v == 0x7F {
                f |= PV;
            }
            inc_flags[x] = f;

            let dec = v.wrapping_sub(1);
            let mut f = szf53(dec) | NF;
            if v & 0x0F == 0 {
                f |= HF;
            }
            if v == 0x80 {
                f |= PV;
            }
            dec_flags[x] = f;

            rol[x] = v.rotate_left(1);
            ror[x] = v.rotate_right(1);
            rl0[x] = v << 1;
            rl1[x] = (v << 1) | 0x01;
            rr0[x] = v >> 1;
            rr1[x] = (v >> 1) | 0x80;
        }

        // The rotate flag tables reuse logic_flags of the rotated result,
        // with CF taken from the bit shifted out.
        for x in 0..0x100usize {
            let v = x as u8;
            rlc_flags[x] = logic_flags[rol[x] as usize] | (v >> 7);
            rrc_flags[x] = logic_flags[ror[x] as usize] | (v & 0x01);
            rlca_flags[x] = (rol[x] & (F5 | F3)) | (v >> 7);
            rrca_flags[x] = (ror[x] & (F5 | F3)) | (v & 0x01);
            let sra = (v >> 1) | (v & 0x80);
            sra_flags[x] = logic_flags[sra as usize] | (v & 0x01);
        }

        let mut add_flags = vec![0u8; 0x20000];
        let mut sub_flags = vec![0u8; 0x20000];
        for carry in 0..2usize {
            for a in 0..0x100usize {
                for b in 0..0x100usize {
                    let wide = a + b + carry;
                    let res = (wide & 0xFF) as u8;
                    let mut f = szf53(res);
                    if wide > 0xFF {
                        f |= CF;
                    }
                    if (a & 0x0F) + (b & 0x0F) + carry > 0x0F {
                        f |= HF;
                    }
                    // Overflow: operands share a sign the result does not.
                    if (a ^ b) & 0x80 == 0 && (a ^ res as usize) & 0x80 != 0 {
                        f |= PV;
                    }
                    add_flags[a + (b << 8) + (carry << 16)] = f;

                    let wide = a.wrapping_sub(b).wrapping_sub(carry);
                    let res = (wide & 0xFF) as u8;
                    let mut f = szf53(res) | NF;
                    if a < b + carry {
                        f |= CF;
                    }
                    if a & 0x0F < (b & 0x0F) + carry {
                        f |= HF;
                    }
                    if (a ^ b) & 0x80 != 0 && (a ^ res as usize) & 0x80 != 0 {
                        f |= PV;
                    }
                    sub_flags[(a << 8) + b + (carry << 16)] = f;
                }
            }
        }

        let mut cp_flags = vec![0u8; 0x10000];
        let mut cpf8b = vec![0u8; 0x10000];
        for a in 0..0x100usize {
            for b in 0..0x100usize {
                // CP keeps the subtraction flags but exposes the operand's
                // bits 3 and 5.
                let base = sub_flags[(a << 8) + b];
                cp_flags[(a << 8) + b] = (base & !(F3 | F5)) | (b as u8 & (F3 | F5));

                // CPI/CPD: F3/F5 come from A - operand - HF, CF is untouched
                // by the instruction and PV is replaced with BC != 0 by the
                // caller.
                let half = base & HF != 0;
                let n = (a as u8)
                    .wrapping_sub(b as u8)
                    .wrapping_sub(half as u8);
                let mut f = (base & (SF | ZF | HF)) | NF;
                f |= n & F3;
                if n & 0x02 != 0 {
                    f |= F5;
                }
                cpf8b[(a << 8) + b] = f;
            }
        }

        Self {
            logic_flags,
            inc_flags,
            dec_flags,
            add_flags: add_flags.into_boxed_slice().try_into().unwrap_or_else(|_| unreachable!()),
            sub_flags: sub_flags.into_boxed_slice().try_into().unwrap_or_else(|_| unreachable!()),
            cp_flags: cp_flags.into_boxed_slice().try_into().unwrap_or_else(|_| unreachable!()),
            cpf8b: cpf8b.into_boxed_slice().try_into().unwrap_or_else(|_| unreachable!()),
            rlc_flags,
            rrc_flags,
            rlca_flags,
            rrca_flags,
            sra_flags,
            rol,
            ror,
            rl0,
            rl1,
            rr0,
            rr1,
        }
    }
}
