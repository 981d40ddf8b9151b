//! Snapshot import/export
//!
//! Two formats are read: `.sna` (48K raw and 128K extended) and `.z80`
//! (v1/v2/v3 with per-page RLE compression). Export always writes `.sna`.
//!
//! 48K `SNA` layout (LSB first):
//!
//! | offset | size  | description                              |
//! |--------|-------|------------------------------------------|
//! |      0 |     1 | register: I                              |
//! |      1 |     6 | registers: HL', DE', BC'                 |
//! |      7 |     2 | registers: AF'                           |
//! |      9 |     6 | registers: HL, DE, BC                    |
//! |     15 |     4 | registers: IY, IX                        |
//! |     19 |     1 | interrupt flags: bit 2 = IFF2            |
//! |     20 |     1 | register: R                              |
//! |     21 |     2 | registers: AF                            |
//! |     23 |     2 | register: SP                             |
//! |     25 |     1 | interrupt mode: 0/1/2                    |
//! |     26 |     1 | border color: 0..=7                      |
//! |     27 | 49152 | RAM 0x4000..=0xFFFF (PC is on the stack) |
//!
//! The 128K extension appends PC, the last OUT to 0x7FFD, a TR-DOS flag,
//! and the remaining RAM pages.
//!
//! ROM identity is carried as a page hash rather than contents; apply()
//! refuses a snapshot whose hash does not match the loaded ROM.

use log::warn;

use crate::cpu::{Cpu, InterruptMode};
use crate::memory::{Memory, MemoryError, PAGE_SIZE};
use crate::timing::MachineModel;

/// Size of a 48K .sna image.
pub const SNA_48_LEN: usize = 27 + 3 * PAGE_SIZE;
/// Size of a 128K .sna image when the paged-in bank is distinct from 5/2.
pub const SNA_128_SHORT_LEN: usize = SNA_48_LEN + 4 + 5 * PAGE_SIZE;
/// Size of a 128K .sna image when the paged-in bank duplicates 5 or 2
/// (that page appears twice in the image).
pub const SNA_128_LONG_LEN: usize = SNA_48_LEN + 4 + 6 * PAGE_SIZE;

/// Snapshot codec errors.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot data is truncated")]
    Truncated,
    #[error("unrecognized snapshot length {0}")]
    BadLength(usize),
    #[error("unsupported .z80 hardware mode {0}")]
    UnsupportedHardware(u8),
    #[error("snapshot was taken with a different ROM set")]
    RomMismatch,
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// RAM payload of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotRam {
    /// 48K image: banks 1..=3 in address order
    Banks(Vec<Vec<u8>>),
    /// 128K image: explicit (page, contents) pairs
    Pages(Vec<(u8, Vec<u8>)>),
}

/// A machine snapshot: full Z80 state, border, banking registers, RAM.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub af: u16,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub af_alt: u16,
    pub bc_alt: u16,
    pub de_alt: u16,
    pub hl_alt: u16,
    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub i: u8,
    pub r: u8,
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,
    pub border: u8,
    pub port_7ffd: u8,
    pub port_1ffd: u8,
    pub trdos_active: bool,
    /// 48K images keep PC pushed on the stack instead of in `pc`
    pub pc_on_stack: bool,
    pub ram: SnapshotRam,
    /// FNV-1a hash of ROM page 0, captured on save
    pub rom_hash: Option<u64>,
}

fn word(bytes: &[u8], offset: usize) -> Result<u16, SnapshotError> {
    let lo = *bytes.get(offset).ok_or(SnapshotError::Truncated)?;
    let hi = *bytes.get(offset + 1).ok_or(SnapshotError::Truncated)?;
    Ok(u16::from_le_bytes([lo, hi]))
}

fn byte(bytes: &[u8], offset: usize) -> Result<u8, SnapshotError> {
    bytes.get(offset).copied().ok_or(SnapshotError::Truncated)
}

impl Snapshot {
    // ========== Capture / apply ==========

    /// Capture the current machine state.
    pub fn capture(cpu: &Cpu, memory: &Memory, border: u8) -> Self {
        let is_128 = memory.model() != MachineModel::Spectrum48;
        let ram = if is_128 {
            let mut pages = Vec::with_capacity(memory.ram_page_count());
            for page in 0..memory.ram_page_count() {
                // page_slice cannot fail for pages below the count
                if let Ok(slice) = memory.page_slice(crate::memory::PageKind::Ram, page) {
                    pages.push((page as u8, slice.to_vec()));
                }
            }
            SnapshotRam::Pages(pages)
        } else {
            let mut banks = Vec::with_capacity(3);
            for bank in 1..4usize {
                let page = memory.page_at_bank(bank);
                let slice = memory
                    .page_slice(page.kind, page.index as usize)
                    .map(|s| s.to_vec())
                    .unwrap_or_else(|_| vec![0; PAGE_SIZE]);
                banks.push(slice);
            }
            SnapshotRam::Banks(banks)
        };

        Self {
            af: cpu.af(),
            bc: cpu.bc,
            de: cpu.de,
            hl: cpu.hl,
            af_alt: u16::from_le_bytes([cpu.f_alt, cpu.a_alt]),
            bc_alt: cpu.bc_alt,
            de_alt: cpu.de_alt,
            hl_alt: cpu.hl_alt,
            ix: cpu.ix,
            iy: cpu.iy,
            sp: cpu.sp,
            pc: cpu.pc,
            i: cpu.i,
            r: cpu.r(),
            iff1: cpu.iff1,
            iff2: cpu.iff2,
            im: match cpu.im {
                InterruptMode::Mode0 => 0,
                InterruptMode::Mode1 => 1,
                InterruptMode::Mode2 => 2,
            },
            border,
            port_7ffd: memory.port_7ffd,
            port_1ffd: memory.port_1ffd,
            trdos_active: memory.trdos_active(),
            pc_on_stack: false,
            ram,
            rom_hash: memory.rom_page_hash(0).ok(),
        }
    }

    /// Apply this snapshot to a machine. The target keeps its pre-request
    /// state when the ROM identity does not match.
    pub fn apply(
        &self,
        cpu: &mut Cpu,
        memory: &mut Memory,
        border: &mut u8,
    ) -> Result<(), SnapshotError> {
        if let Some(expected) = self.rom_hash {
            let actual = memory.rom_page_hash(0)?;
            if actual != expected {
                warn!("snapshot ROM hash {expected:#018X} does not match loaded ROM");
                return Err(SnapshotError::RomMismatch);
            }
        }

        memory.reset();
        // Unlock before replaying the paging registers.
        memory.port_7ffd = 0;
        memory.write_7ffd(self.port_7ffd & !0x20);
        memory.write_1ffd(self.port_1ffd);
        memory.write_7ffd(self.port_7ffd);
        memory.set_trdos(self.trdos_active);

        match &self.ram {
            SnapshotRam::Pages(pages) => {
                for (page, data) in pages {
                    memory.load_ram_page(*page as usize, data)?;
                }
            }
            SnapshotRam::Banks(banks) => {
                for (bank, data) in banks.iter().enumerate() {
                    let page = memory.page_at_bank(bank + 1);
                    memory.load_ram_page(page.index as usize, data)?;
                }
            }
        }

        cpu.set_af(self.af);
        cpu.bc = self.bc;
        cpu.de = self.de;
        cpu.hl = self.hl;
        let [f_alt, a_alt] = self.af_alt.to_le_bytes();
        cpu.a_alt = a_alt;
        cpu.f_alt = f_alt;
        cpu.bc_alt = self.bc_alt;
        cpu.de_alt = self.de_alt;
        cpu.hl_alt = self.hl_alt;
        cpu.ix = self.ix;
        cpu.iy = self.iy;
        cpu.sp = self.sp;
        cpu.pc = self.pc;
        cpu.i = self.i;
        cpu.set_r(self.r);
        cpu.iff1 = self.iff1;
        cpu.iff2 = self.iff2;
        cpu.im = match self.im {
            0 => InterruptMode::Mode0,
            1 => InterruptMode::Mode1,
            _ => InterruptMode::Mode2,
        };
        cpu.halted = false;
        cpu.nmi_in_progress = false;

        if self.pc_on_stack {
            // 48K .sna keeps PC on the stack; pop it the way the ROM's
            // RETN would.
            let lo = memory.read(cpu.sp);
            let hi = memory.read(cpu.sp.wrapping_add(1));
            cpu.pc = u16::from_le_bytes([lo, hi]);
            cpu.sp = cpu.sp.wrapping_add(2);
        }

        *border = self.border & 0x07;
        Ok(())
    }

    // ========== .sna ==========

    fn sna_header(&self, out: &mut Vec<u8>) {
        out.push(self.i);
        out.extend_from_slice(&self.hl_alt.to_le_bytes());
        out.extend_from_slice(&self.de_alt.to_le_bytes());
        out.extend_from_slice(&self.bc_alt.to_le_bytes());
        out.extend_from_slice(&self.af_alt.to_le_bytes());
        out.extend_from_slice(&self.hl.to_le_bytes());
        out.extend_from_slice(&self.de.to_le_bytes());
        out.extend_from_slice(&self.bc.to_le_bytes());
        out.extend_from_slice(&self.iy.to_le_bytes());
        out.extend_from_slice(&self.ix.to_le_bytes());
        out.push(if self.iff2 { 0x04 } else { 0x00 });
        out.push(self.r);
        out.extend_from_slice(&self.af.to_le_bytes());
        out.extend_from_slice(&self.sp.to_le_bytes());
        out.push(self.im);
        out.push(self.border);
    }

    /// Serialize as .sna. 48K images push PC onto the in-image stack.
    pub fn to_sna(&self) -> Result<Vec<u8>, SnapshotError> {
        match &self.ram {
            SnapshotRam::Banks(banks) => {
                if banks.len() != 3 {
                    return Err(SnapshotError::BadLength(banks.len()));
                }
                let mut image = self.clone();
                let mut memory: Vec<u8> = banks.concat();
                // Push PC where the stack lives inside the image.
                let sp = self.sp.wrapping_sub(2);
                let [lo, hi] = self.pc.to_le_bytes();
                let base = 0x4000u16;
                if sp >= base {
                    let offset = (sp - base) as usize;
                    if offset + 1 < memory.len() {
                        memory[offset] = lo;
                        memory[offset + 1] = hi;
                    }
                }
                image.sp = sp;

                let mut out = Vec::with_capacity(SNA_48_LEN);
                image.sna_header(&mut out);
                out.extend_from_slice(&memory);
                Ok(out)
            }
            SnapshotRam::Pages(pages) => {
                let page = |idx: u8| -> Result<&[u8], SnapshotError> {
                    pages
                        .iter()
                        .find(|(p, _)| *p == idx)
                        .map(|(_, data)| data.as_slice())
                        .ok_or(SnapshotError::Truncated)
                };
                let paged_in = self.port_7ffd & 0x07;

                let mut out = Vec::with_capacity(SNA_128_LONG_LEN);
                self.sna_header(&mut out);
                out.extend_from_slice(page(5)?);
                out.extend_from_slice(page(2)?);
                out.extend_from_slice(page(paged_in)?);
                out.extend_from_slice(&self.pc.to_le_bytes());
                out.push(self.port_7ffd);
                out.push(self.trdos_active as u8);
                for idx in 0..8u8 {
                    if idx == 5 || idx == 2 || idx == paged_in {
                        continue;
                    }
                    out.extend_from_slice(page(idx)?);
                }
                Ok(out)
            }
        }
    }

    /// Parse a .sna image; the variant is determined by length.
    pub fn from_sna(bytes: &[u8]) -> Result<Self, SnapshotError> {
        match bytes.len() {
            SNA_48_LEN => Self::from_sna_48(bytes),
            SNA_128_SHORT_LEN | SNA_128_LONG_LEN => Self::from_sna_128(bytes),
            other => Err(SnapshotError::BadLength(other)),
        }
    }

    fn parse_sna_header(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(Self {
            i: byte(bytes, 0)?,
            hl_alt: word(bytes, 1)?,
            de_alt: word(bytes, 3)?,
            bc_alt: word(bytes, 5)?,
            af_alt: word(bytes, 7)?,
            hl: word(bytes, 9)?,
            de: word(bytes, 11)?,
            bc: word(bytes, 13)?,
            iy: word(bytes, 15)?,
            ix: word(bytes, 17)?,
            iff1: byte(bytes, 19)? & 0x04 != 0,
            iff2: byte(bytes, 19)? & 0x04 != 0,
            r: byte(bytes, 20)?,
            af: word(bytes, 21)?,
            sp: word(bytes, 23)?,
            im: byte(bytes, 25)? & 0x03,
            border: byte(bytes, 26)? & 0x07,
            pc: 0,
            port_7ffd: 0,
            port_1ffd: 0,
            trdos_active: false,
            pc_on_stack: false,
            ram: SnapshotRam::Banks(Vec::new()),
            rom_hash: None,
        })
    }

    fn from_sna_48(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let mut snapshot = Self::parse_sna_header(bytes)?;
        let memory = &bytes[27..];
        snapshot.ram = SnapshotRam::Banks(vec![
            memory[..PAGE_SIZE].to_vec(),
            memory[PAGE_SIZE..2 * PAGE_SIZE].to_vec(),
            memory[2 * PAGE_SIZE..3 * PAGE_SIZE].to_vec(),
        ]);
        snapshot.pc_on_stack = true;
        Ok(snapshot)
    }

    fn from_sna_128(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let mut snapshot = Self::parse_sna_header(bytes)?;
        let tail = SNA_48_LEN;
        snapshot.pc = word(bytes, tail)?;
        snapshot.port_7ffd = byte(bytes, tail + 2)?;
        snapshot.trdos_active = byte(bytes, tail + 3)? != 0;
        let paged_in = snapshot.port_7ffd & 0x07;

        let mut pages: Vec<(u8, Vec<u8>)> = Vec::with_capacity(8);
        pages.push((5, bytes[27..27 + PAGE_SIZE].to_vec()));
        pages.push((2, bytes[27 + PAGE_SIZE..27 + 2 * PAGE_SIZE].to_vec()));
        if paged_in != 5 && paged_in != 2 {
            pages.push((paged_in, bytes[27 + 2 * PAGE_SIZE..27 + 3 * PAGE_SIZE].to_vec()));
        }

        let mut offset = tail + 4;
        for idx in 0..8u8 {
            if pages.iter().any(|(p, _)| *p == idx) {
                continue;
            }
            let end = offset + PAGE_SIZE;
            if end > bytes.len() {
                return Err(SnapshotError::Truncated);
            }
            pages.push((idx, bytes[offset..end].to_vec()));
            offset = end;
        }
        snapshot.ram = SnapshotRam::Pages(pages);
        Ok(snapshot)
    }

    // ========== .z80 ==========

    /// Parse a .z80 image (v1, v2 or v3).
    pub fn from_z80(bytes: &[u8]) -> Result<Self, SnapshotError> {
        if bytes.len() < 30 {
            return Err(SnapshotError::Truncated);
        }
        let mut snapshot = Self {
            af: u16::from_le_bytes([byte(bytes, 1)?, byte(bytes, 0)?]),
            bc: word(bytes, 2)?,
            hl: word(bytes, 4)?,
            pc: word(bytes, 6)?,
            sp: word(bytes, 8)?,
            i: byte(bytes, 10)?,
            r: 0,
            de: word(bytes, 13)?,
            bc_alt: word(bytes, 15)?,
            de_alt: word(bytes, 17)?,
            hl_alt: word(bytes, 19)?,
            af_alt: u16::from_le_bytes([byte(bytes, 22)?, byte(bytes, 21)?]),
            iy: word(bytes, 23)?,
            ix: word(bytes, 25)?,
            iff1: byte(bytes, 27)? != 0,
            iff2: byte(bytes, 28)? != 0,
            im: byte(bytes, 29)? & 0x03,
            border: 0,
            port_7ffd: 0,
            port_1ffd: 0,
            trdos_active: false,
            pc_on_stack: false,
            ram: SnapshotRam::Banks(Vec::new()),
            rom_hash: None,
        };
        // flags1 0xFF is treated as 0x01 for ancient images
        let flags1 = match byte(bytes, 12)? {
            0xFF => 0x01,
            value => value,
        };
        snapshot.r = (byte(bytes, 11)? & 0x7F) | ((flags1 & 0x01) << 7);
        snapshot.border = (flags1 >> 1) & 0x07;

        if snapshot.pc != 0 {
            // Version 1: a single 48K block, optionally compressed.
            let compressed = flags1 & 0x20 != 0;
            let data = &bytes[30..];
            let memory = if compressed {
                decompress_z80_v1(data)?
            } else {
                data.to_vec()
            };
            if memory.len() < 3 * PAGE_SIZE {
                return Err(SnapshotError::Truncated);
            }
            snapshot.ram = SnapshotRam::Banks(vec![
                memory[..PAGE_SIZE].to_vec(),
                memory[PAGE_SIZE..2 * PAGE_SIZE].to_vec(),
                memory[2 * PAGE_SIZE..3 * PAGE_SIZE].to_vec(),
            ]);
            return Ok(snapshot);
        }

        // Version 2/3: extended header.
        let ext_len = word(bytes, 30)? as usize;
        snapshot.pc = word(bytes, 32)?;
        let hardware = byte(bytes, 34)?;
        let is_v3 = ext_len >= 54;
        let is_128 = match (is_v3, hardware) {
            (_, 0) | (_, 1) => false,
            (false, 3) | (false, 4) => true,
            (true, 4) | (true, 5) | (true, 6) => true,
            _ => return Err(SnapshotError::UnsupportedHardware(hardware)),
        };
        if is_128 {
            snapshot.port_7ffd = byte(bytes, 35)?;
        }

        let mut offset = 32 + ext_len;
        let mut pages: Vec<(u8, Vec<u8>)> = Vec::new();
        let mut banks48: Vec<(u8, Vec<u8>)> = Vec::new();
        while offset + 3 <= bytes.len() {
            let len = word(bytes, offset)? as usize;
            let page_id = byte(bytes, offset + 2)?;
            offset += 3;
            let data = if len == 0xFFFF {
                let end = offset + PAGE_SIZE;
                if end > bytes.len() {
                    return Err(SnapshotError::Truncated);
                }
                let block = bytes[offset..end].to_vec();
                offset = end;
                block
            } else {
                let end = offset + len;
                if end > bytes.len() {
                    return Err(SnapshotError::Truncated);
                }
                let block = decompress_z80_block(&bytes[offset..end])?;
                offset = end;
                block
            };
            if is_128 {
                // 128K numbering: page id 3..=10 maps to RAM page 0..=7
                if (3..=10).contains(&page_id) {
                    pages.push((page_id - 3, data));
                }
            } else {
                // 48K numbering: 8 -> bank 1, 4 -> bank 2, 5 -> bank 3
                banks48.push((page_id, data));
            }
        }

        if is_128 {
            snapshot.ram = SnapshotRam::Pages(pages);
        } else {
            let take = |id: u8| -> Result<Vec<u8>, SnapshotError> {
                banks48
                    .iter()
                    .find(|(p, _)| *p == id)
                    .map(|(_, d)| d.clone())
                    .ok_or(SnapshotError::Truncated)
            };
            snapshot.ram = SnapshotRam::Banks(vec![take(8)?, take(4)?, take(5)?]);
        }
        Ok(snapshot)
    }
}

/// Decompress a v1 .z80 memory image (terminated by 00 ED ED 00).
fn decompress_z80_v1(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let end = data
        .windows(4)
        .position(|w| w == [0x00, 0xED, 0xED, 0x00])
        .unwrap_or(data.len());
    decompress_z80_block(&data[..end])
}

/// Decompress one ED ED count value run-length block.
fn decompress_z80_block(data: &[u8]) -> Result<Vec<u8>, SnapshotError> {
    let mut out = Vec::with_capacity(PAGE_SIZE);
    let mut i = 0;
    while i < data.len() {
        if i + 3 < data.len() && data[i] == 0xED && data[i + 1] == 0xED {
            let count = data[i + 2] as usize;
            let value = data[i + 3];
            out.extend(std::iter::repeat(value).take(count));
            i += 4;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    Ok(out)
}
