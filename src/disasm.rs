//! Z80 disassembler
//!
//! Table-driven decode of the full Z80 instruction set, including the
//! undocumented IX/IY halves and the DDCB/FDCB displacement forms. Two
//! surfaces:
//!
//! - [`mnemonic`] resolves a `(prefix class, opcode)` pair to its generic
//!   mnemonic with `n`/`nn`/`d` placeholders - used by the opcode profiler.
//! - [`disassemble`] decodes a byte slice into concrete text plus the
//!   instruction length - used by the debugger.
//!
//! Generic mnemonics are uppercase except the lowercase operand
//! placeholders; the substitution pass relies on that.

use crate::profiler::PrefixClass;

const R8: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const RP: [&str; 4] = ["BC", "DE", "HL", "SP"];
const RP2: [&str; 4] = ["BC", "DE", "HL", "AF"];
const CC: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];
const ALU: [&str; 8] = ["ADD A,", "ADC A,", "SUB ", "SBC A,", "AND ", "XOR ", "OR ", "CP "];
const ROT: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SLL", "SRL"];

#[derive(Clone, Copy, PartialEq, Eq)]
enum Index {
    Hl,
    Ix,
    Iy,
}

impl Index {
    fn rp(&self) -> &'static str {
        match self {
            Self::Hl => "HL",
            Self::Ix => "IX",
            Self::Iy => "IY",
        }
    }

    fn high(&self) -> &'static str {
        match self {
            Self::Hl => "H",
            Self::Ix => "IXH",
            Self::Iy => "IYH",
        }
    }

    fn low(&self) -> &'static str {
        match self {
            Self::Hl => "L",
            Self::Ix => "IXL",
            Self::Iy => "IYL",
        }
    }

    fn indirect(&self) -> String {
        match self {
            Self::Hl => "(HL)".to_string(),
            Self::Ix => "(IX+d)".to_string(),
            Self::Iy => "(IY+d)".to_string(),
        }
    }
}

/// 8-bit register name under an index prefix. The memory operand picks up
/// the displacement; H/L become IXH/IXL and friends.
fn reg8(index: Index, code: u8) -> String {
    match code {
        4 => index.high().to_string(),
        5 => index.low().to_string(),
        6 => index.indirect(),
        _ => R8[code as usize].to_string(),
    }
}

fn rp_name(index: Index, code: u8) -> &'static str {
    if code == 2 {
        index.rp()
    } else {
        RP[code as usize]
    }
}

fn rp2_name(index: Index, code: u8) -> &'static str {
    if code == 2 {
        index.rp()
    } else {
        RP2[code as usize]
    }
}

/// Generic mnemonic of an unprefixed (or DD/FD-prefixed) opcode.
fn main_mnemonic(opcode: u8, index: Index) -> String {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let p = y >> 1;
    let q = y & 0x01;

    match x {
        0 => match z {
            0 => match y {
                0 => "NOP".to_string(),
                1 => "EX AF,AF'".to_string(),
                2 => "DJNZ d".to_string(),
                3 => "JR d".to_string(),
                _ => format!("JR {},d", CC[(y - 4) as usize]),
            },
            1 => {
                if q == 0 {
                    format!("LD {},nn", rp_name(index, p))
                } else {
                    format!("ADD {},{}", index.rp(), rp_name(index, p))
                }
            }
            2 => match (q, p) {
                (0, 0) => "LD (BC),A".to_string(),
                (0, 1) => "LD (DE),A".to_string(),
                (0, 2) => format!("LD (nn),{}", index.rp()),
                (0, _) => "LD (nn),A".to_string(),
                (1, 0) => "LD A,(BC)".to_string(),
                (1, 1) => "LD A,(DE)".to_string(),
                (1, 2) => format!("LD {},(nn)", index.rp()),
                _ => "LD A,(nn)".to_string(),
            },
            3 => {
                if q == 0 {
                    format!("INC {}", rp_name(index, p))
                } else {
                    format!("DEC {}", rp_name(index, p))
                }
            }
            4 => format!("INC {}", reg8(index, y)),
            5 => format!("DEC {}", reg8(index, y)),
            6 => format!("LD {},n", reg8(index, y)),
            _ => ["RLCA", "RRCA", "RLA", "RRA", "DAA", "CPL", "SCF", "CCF"][y as usize].to_string(),
        },
        1 => {
            if y == 6 && z == 6 {
                "HALT".to_string()
            } else if y == 6 || z == 6 {
                // The memory operand forces plain H/L on the other side.
                let dst = if y == 6 { index.indirect() } else { R8[y as usize].to_string() };
                let src = if z == 6 { index.indirect() } else { R8[z as usize].to_string() };
                format!("LD {dst},{src}")
            } else {
                format!("LD {},{}", reg8(index, y), reg8(index, z))
            }
        }
        2 => format!("{}{}", ALU[y as usize], reg8(index, z)),
        _ => match z {
            0 => format!("RET {}", CC[y as usize]),
            1 => match (q, p) {
                (0, _) => format!("POP {}", rp2_name(index, p)),
                (1, 0) => "RET".to_string(),
                (1, 1) => "EXX".to_string(),
                (1, 2) => format!("JP ({})", index.rp()),
                _ => format!("LD SP,{}", index.rp()),
            },
            2 => format!("JP {},nn", CC[y as usize]),
            3 => match y {
                0 => "JP nn".to_string(),
                1 => "CB prefix".to_string(),
                2 => "OUT (n),A".to_string(),
                3 => "IN A,(n)".to_string(),
                4 => format!("EX (SP),{}", index.rp()),
                5 => "EX DE,HL".to_string(),
                6 => "DI".to_string(),
                _ => "EI".to_string(),
            },
            4 => format!("CALL {},nn", CC[y as usize]),
            5 => match (q, p) {
                (0, _) => format!("PUSH {}", rp2_name(index, p)),
                (1, 0) => "CALL nn".to_string(),
                (1, 1) => "DD prefix".to_string(),
                (1, 2) => "ED prefix".to_string(),
                _ => "FD prefix".to_string(),
            },
            6 => format!("{}n", ALU[y as usize]),
            _ => format!("RST {:02X}H", y * 8),
        },
    }
}

/// Generic mnemonic of a CB-page opcode. For DDCB/FDCB forms the operand
/// is the displaced memory cell; the undocumented register copies append
/// the target register.
fn cb_mnemonic(opcode: u8, index: Index) -> String {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;

    let operand = if index == Index::Hl {
        R8[z as usize].to_string()
    } else {
        index.indirect()
    };
    let copy = if index != Index::Hl && z != 6 {
        format!(",{}", R8[z as usize])
    } else {
        String::new()
    };

    match x {
        0 => format!("{} {operand}{copy}", ROT[y as usize]),
        1 => format!("BIT {y},{operand}"),
        2 => format!("RES {y},{operand}{copy}"),
        _ => format!("SET {y},{operand}{copy}"),
    }
}

/// Generic mnemonic of an ED-page opcode.
fn ed_mnemonic(opcode: u8) -> String {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let p = y >> 1;
    let q = y & 0x01;

    if x == 1 {
        return match z {
            0 => {
                if y == 6 {
                    "IN (C)".to_string()
                } else {
                    format!("IN {},(C)", R8[y as usize])
                }
            }
            1 => {
                if y == 6 {
                    "OUT (C),0".to_string()
                } else {
                    format!("OUT (C),{}", R8[y as usize])
                }
            }
            2 => {
                if q == 0 {
                    format!("SBC HL,{}", RP[p as usize])
                } else {
                    format!("ADC HL,{}", RP[p as usize])
                }
            }
            3 => {
                if q == 0 {
                    format!("LD (nn),{}", RP[p as usize])
                } else {
                    format!("LD {},(nn)", RP[p as usize])
                }
            }
            4 => "NEG".to_string(),
            5 => {
                if y == 1 {
                    "RETI".to_string()
                } else {
                    "RETN".to_string()
                }
            }
            6 => match y & 0x03 {
                0 | 1 => "IM 0".to_string(),
                2 => "IM 1".to_string(),
                _ => "IM 2".to_string(),
            },
            _ => ["LD I,A", "LD R,A", "LD A,I", "LD A,R", "RRD", "RLD", "NOP", "NOP"]
                [y as usize]
                .to_string(),
        };
    }
    if x == 2 && z <= 3 && y >= 4 {
        const BLOCK: [[&str; 4]; 4] = [
            ["LDI", "CPI", "INI", "OUTI"],
            ["LDD", "CPD", "IND", "OUTD"],
            ["LDIR", "CPIR", "INIR", "OTIR"],
            ["LDDR", "CPDR", "INDR", "OTDR"],
        ];
        return BLOCK[(y - 4) as usize][z as usize].to_string();
    }
    // Every remaining ED opcode behaves as a NOP.
    "NOP".to_string()
}

/// Resolve the generic mnemonic for a profiler histogram cell.
pub fn mnemonic(prefix: PrefixClass, opcode: u8) -> String {
    match prefix {
        PrefixClass::None => main_mnemonic(opcode, Index::Hl),
        PrefixClass::Cb => cb_mnemonic(opcode, Index::Hl),
        PrefixClass::Ed => ed_mnemonic(opcode),
        PrefixClass::Dd => main_mnemonic(opcode, Index::Ix),
        PrefixClass::Fd => main_mnemonic(opcode, Index::Iy),
        PrefixClass::Ddcb => cb_mnemonic(opcode, Index::Ix),
        PrefixClass::Fdcb => cb_mnemonic(opcode, Index::Iy),
    }
}

/// One disassembled instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembled {
    pub text: String,
    pub length: usize,
}

/// Fill the lowercase operand placeholders (`nn`, `n`, `d`) with concrete
/// values read from `bytes`, starting at offset `used`.
fn substitute(text: &str, bytes: &[u8], addr: u16, used: usize) -> (String, usize) {
    let mut length = used;
    let mut out = text.to_string();
    if out.contains("nn") {
        let lo = bytes.get(length).copied().unwrap_or(0);
        let hi = bytes.get(length + 1).copied().unwrap_or(0);
        length += 2;
        out = out.replace("nn", &format!("${:04X}", u16::from_le_bytes([lo, hi])));
    } else if out.contains('n') {
        let n = bytes.get(length).copied().unwrap_or(0);
        length += 1;
        out = out.replacen('n', &format!("${n:02X}"), 1);
    } else if out.contains('d') {
        let d = bytes.get(length).copied().unwrap_or(0) as i8;
        length += 1;
        let target = addr.wrapping_add(length as u16).wrapping_add(d as u16);
        out = out.replacen('d', &format!("${target:04X}"), 1);
    }
    (out, length)
}

fn format_displacement(d: i8) -> String {
    if d < 0 {
        format!("-${:02X}", -(d as i16))
    } else {
        format!("+${d:02X}")
    }
}

/// Disassemble one instruction starting at `bytes[0]`, assumed to live at
/// `addr`. Returns the concrete text and the encoded length.
pub fn disassemble(bytes: &[u8], addr: u16) -> Disassembled {
    let Some(&first) = bytes.first() else {
        return Disassembled { text: "??".to_string(), length: 1 };
    };
    match first {
        0xCB => {
            let opcode = bytes.get(1).copied().unwrap_or(0);
            Disassembled { text: cb_mnemonic(opcode, Index::Hl), length: 2 }
        }
        0xED => {
            let opcode = bytes.get(1).copied().unwrap_or(0);
            let generic = ed_mnemonic(opcode);
            let (text, length) = substitute(&generic, bytes, addr, 2);
            Disassembled { text, length }
        }
        0xDD | 0xFD => {
            let index = if first == 0xDD { Index::Ix } else { Index::Iy };
            let second = bytes.get(1).copied().unwrap_or(0);
            match second {
                // A stacked prefix acts as a NONI; show the first byte alone.
                0xDD | 0xFD | 0xED => Disassembled { text: "NOP*".to_string(), length: 1 },
                0xCB => {
                    let d = bytes.get(2).copied().unwrap_or(0) as i8;
                    let opcode = bytes.get(3).copied().unwrap_or(0);
                    let generic = cb_mnemonic(opcode, index);
                    let text = generic.replace("+d", &format_displacement(d));
                    Disassembled { text, length: 4 }
                }
                _ => {
                    let generic = main_mnemonic(second, index);
                    let mut used = 2;
                    let mut text = generic;
                    if text.contains("+d") {
                        let d = bytes.get(used).copied().unwrap_or(0) as i8;
                        used += 1;
                        text = text.replace("+d", &format_displacement(d));
                    }
                    let (text, length) = substitute(&text, bytes, addr, used);
                    Disassembled { text, length }
                }
            }
        }
        _ => {
            let generic = main_mnemonic(first, Index::Hl);
            let (text, length) = substitute(&generic, bytes, addr, 1);
            Disassembled { text, length }
        }
    }
}
