//! Paged memory subsystem
//!
//! Physical storage is partitioned into four regions by role: RAM pages,
//! ROM pages, cache pages and miscellaneous pages, each page exactly 16 KiB.
//! The Z80's 64 KiB address space is divided into four banks of 16 KiB; a
//! banking register file selects which physical page backs each bank:
//!
//! | Bank | Address range   | Standard mapping                     |
//! |------|-----------------|--------------------------------------|
//! | 0    | 0x0000 - 0x3FFF | ROM (48K/128K/TR-DOS per registers)  |
//! | 1    | 0x4000 - 0x7FFF | RAM page 5 (screen)                  |
//! | 2    | 0x8000 - 0xBFFF | RAM page 2                           |
//! | 3    | 0xC000 - 0xFFFF | RAM page selected by port 0x7FFD     |
//!
//! Shadow-screen banking re-routes bank 3 to RAM page 7 when port 0x7FFD
//! bit 3 is set on 128K-family models.

use crate::timing::{MachineModel, MachineTiming, BANK_SIZE};

/// Size of one physical page in bytes.
pub const PAGE_SIZE: usize = BANK_SIZE;

/// Region capacity limits.
pub const MAX_RAM_PAGES: usize = 256;
pub const MAX_ROM_PAGES: usize = 64;
pub const MAX_CACHE_PAGES: usize = 16;
pub const MAX_MISC_PAGES: usize = 16;

/// Number of entries in the M1 fetch cache.
pub const TSCACHE_SIZE: usize = 256;

/// Physical page role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Ram,
    Rom,
    Cache,
    Misc,
}

impl PageKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ram => "ram",
            Self::Rom => "rom",
            Self::Cache => "cache",
            Self::Misc => "misc",
        }
    }
}

/// Reference to one physical page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub kind: PageKind,
    pub index: u8,
}

impl PageRef {
    pub const fn ram(index: u8) -> Self {
        Self { kind: PageKind::Ram, index }
    }

    pub const fn rom(index: u8) -> Self {
        Self { kind: PageKind::Rom, index }
    }
}

/// Memory access errors surfaced by the debugger-facing page operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("page {page} does not exist in the {kind} region")]
    NoSuchPage { kind: &'static str, page: usize },
    #[error("offset {offset:#06X} exceeds the 16 KiB page size")]
    OffsetOutOfRange { offset: usize },
}

/// The paged address space of one emulator instance.
pub struct Memory {
    ram: Vec<u8>,
    rom: Vec<u8>,
    cache: Vec<u8>,
    misc: Vec<u8>,
    ram_pages: usize,
    rom_pages: usize,
    cache_pages: usize,
    misc_pages: usize,

    banks: [PageRef; 4],

    /// Last value written to port 0x7FFD
    pub port_7ffd: u8,
    /// Last value written to port 0x1FFD (+3 only)
    pub port_1ffd: u8,
    /// TR-DOS ROM overlay currently mapped at bank 0
    trdos_active: bool,
    /// Writes to ROM-backed banks are dropped while set
    pub rom_write_protected: bool,

    model: MachineModel,
    /// ROM page indices resolved at configuration load
    rom_48: u8,
    rom_128: u8,
    rom_trdos: u8,

    // M1 fetch cache: physical id -> cached opcode byte. A write to the
    // matching physical address invalidates the entry.
    tscache_id: [u32; TSCACHE_SIZE],
    tscache_data: [u8; TSCACHE_SIZE],
}

impl Memory {
    pub fn new(timing: &MachineTiming) -> Self {
        let model = timing.model;
        let (rom_48, rom_128, rom_trdos) = match model {
            // Single-ROM 48K: every selector resolves to page 0.
            MachineModel::Spectrum48 => (0, 0, 0),
            // 128K layout: page 0 = 128K editor, page 1 = 48K BASIC.
            MachineModel::Spectrum128 => (1, 0, 1),
            MachineModel::Plus3 => (3, 0, 3),
            // Pentagon ships a third ROM page holding TR-DOS.
            MachineModel::Pentagon128 => (1, 0, 2),
        };
        let mut memory = Self {
            ram: vec![0; timing.ram_pages * PAGE_SIZE],
            rom: vec![0; timing.rom_pages * PAGE_SIZE],
            cache: Vec::new(),
            misc: Vec::new(),
            ram_pages: timing.ram_pages,
            rom_pages: timing.rom_pages,
            cache_pages: 0,
            misc_pages: 0,
            banks: [PageRef::rom(0), PageRef::ram(0), PageRef::ram(0), PageRef::ram(0)],
            port_7ffd: 0,
            port_1ffd: 0,
            trdos_active: false,
            rom_write_protected: true,
            model,
            rom_48,
            rom_128,
            rom_trdos,
            tscache_id: [u32::MAX; TSCACHE_SIZE],
            tscache_data: [0; TSCACHE_SIZE],
        };
        memory.remap();
        memory
    }

    /// Reset banking registers to power-on state.
    pub fn reset(&mut self) {
        self.port_7ffd = 0;
        self.port_1ffd = 0;
        self.trdos_active = false;
        self.flush_tscache();
        self.remap();
    }

    pub fn model(&self) -> MachineModel {
        self.model
    }

    pub fn ram_page_count(&self) -> usize {
        self.ram_pages
    }

    pub fn rom_page_count(&self) -> usize {
        self.rom_pages
    }

    pub fn cache_page_count(&self) -> usize {
        self.cache_pages
    }

    pub fn misc_page_count(&self) -> usize {
        self.misc_pages
    }

    fn page_count(&self, kind: PageKind) -> usize {
        match kind {
            PageKind::Ram => self.ram_pages,
            PageKind::Rom => self.rom_pages,
            PageKind::Cache => self.cache_pages,
            PageKind::Misc => self.misc_pages,
        }
    }

    /// Allocate cache/misc pages; configurations that use them call this
    /// once at load time.
    pub fn allocate_aux_pages(&mut self, cache_pages: usize, misc_pages: usize) {
        self.cache_pages = cache_pages.min(MAX_CACHE_PAGES);
        self.misc_pages = misc_pages.min(MAX_MISC_PAGES);
        self.cache = vec![0; self.cache_pages * PAGE_SIZE];
        self.misc = vec![0; self.misc_pages * PAGE_SIZE];
    }

    // ========== Banking ==========

    /// Recompute the bank mapping from the current register state.
    fn remap(&mut self) {
        let rom_page = if self.trdos_active {
            self.rom_trdos
        } else {
            self.resolve_basic_rom()
        };
        self.banks[0] = PageRef::rom(rom_page.min(self.rom_pages.saturating_sub(1) as u8));

        match self.model {
            MachineModel::Spectrum48 => {
                // Fixed 48K layout: pages 0..2 at banks 1..3.
                self.banks[1] = PageRef::ram(0);
                self.banks[2] = PageRef::ram(1);
                self.banks[3] = PageRef::ram(2);
            }
            _ => {
                self.banks[1] = PageRef::ram(5);
                self.banks[2] = PageRef::ram(2);
                self.banks[3] = PageRef::ram(self.port_7ffd & 0x07);
            }
        }
    }

    fn resolve_basic_rom(&self) -> u8 {
        match self.model {
            MachineModel::Spectrum48 => 0,
            MachineModel::Spectrum128 | MachineModel::Pentagon128 => {
                if self.port_7ffd & 0x10 != 0 {
                    self.rom_48
                } else {
                    self.rom_128
                }
            }
            MachineModel::Plus3 => {
                let low = (self.port_7ffd >> 4) & 0x01;
                let high = (self.port_1ffd >> 1) & 0x02;
                high | low
            }
        }
    }

    /// Whether paging is locked by port 0x7FFD bit 5.
    pub fn paging_locked(&self) -> bool {
        self.port_7ffd & 0x20 != 0
    }

    /// OUT to port 0x7FFD. Ignored on 48K and once the lock bit is set.
    pub fn write_7ffd(&mut self, value: u8) {
        if self.model == MachineModel::Spectrum48 || self.paging_locked() {
            return;
        }
        self.port_7ffd = value;
        self.remap();
    }

    /// OUT to port 0x1FFD (+3 paging extensions).
    pub fn write_1ffd(&mut self, value: u8) {
        if self.model != MachineModel::Plus3 || self.paging_locked() {
            return;
        }
        self.port_1ffd = value;
        self.remap();
    }

    /// Map or unmap the TR-DOS ROM overlay at bank 0.
    pub fn set_trdos(&mut self, active: bool) {
        if self.trdos_active != active {
            self.trdos_active = active;
            self.remap();
        }
    }

    pub fn trdos_active(&self) -> bool {
        self.trdos_active
    }

    /// The ROM page the TR-DOS overlay maps at bank 0.
    pub fn trdos_rom_page(&self) -> u8 {
        self.rom_trdos
    }

    /// RAM page holding the currently displayed screen.
    pub fn screen_page(&self) -> u8 {
        if self.model == MachineModel::Spectrum48 {
            0
        } else if self.port_7ffd & 0x08 != 0 {
            7
        } else {
            5
        }
    }

    /// Current bank mapping snapshot.
    #[inline]
    pub fn banks(&self) -> [PageRef; 4] {
        self.banks
    }

    /// Physical page currently mapped at `bank` (0..=3).
    #[inline]
    pub fn page_at_bank(&self, bank: usize) -> PageRef {
        self.banks[bank & 3]
    }

    // ========== Address resolution ==========

    /// Z80 bank index of an address.
    #[inline]
    pub fn bank_of(address: u16) -> usize {
        (address >> 14) as usize
    }

    /// Stable physical identifier of the byte backing `address` under the
    /// current mapping. Used as tscache and tracker key.
    #[inline]
    pub fn physical_id(&self, address: u16) -> u32 {
        let page = self.banks[Self::bank_of(address)];
        let kind = match page.kind {
            PageKind::Ram => 0u32,
            PageKind::Rom => 1,
            PageKind::Cache => 2,
            PageKind::Misc => 3,
        };
        (kind << 22) | ((page.index as u32) << 14) | (address as u32 & 0x3FFF)
    }

    #[inline]
    fn region(&self, kind: PageKind) -> &[u8] {
        match kind {
            PageKind::Ram => &self.ram,
            PageKind::Rom => &self.rom,
            PageKind::Cache => &self.cache,
            PageKind::Misc => &self.misc,
        }
    }

    #[inline]
    fn region_mut(&mut self, kind: PageKind) -> &mut [u8] {
        match kind {
            PageKind::Ram => &mut self.ram,
            PageKind::Rom => &mut self.rom,
            PageKind::Cache => &mut self.cache,
            PageKind::Misc => &mut self.misc,
        }
    }

    /// Read a byte at a Z80 address under the current mapping.
    #[inline]
    pub fn read(&self, address: u16) -> u8 {
        let page = self.banks[Self::bank_of(address)];
        let offset = (page.index as usize) * PAGE_SIZE + (address as usize & 0x3FFF);
        self.region(page.kind)[offset]
    }

    /// Write a byte at a Z80 address. Returns false when the write was
    /// dropped because the bank is ROM-backed and protection is on.
    #[inline]
    pub fn write(&mut self, address: u16, value: u8) -> bool {
        let page = self.banks[Self::bank_of(address)];
        if page.kind == PageKind::Rom && self.rom_write_protected {
            return false;
        }
        let offset = (page.index as usize) * PAGE_SIZE + (address as usize & 0x3FFF);
        self.invalidate_tscache(self.physical_id(address));
        self.region_mut(page.kind)[offset] = value;
        true
    }

    // ========== Direct (debugger) access ==========

    /// Direct read for the debugger: no contention, no instrumentation.
    #[inline]
    pub fn direct_read(&self, address: u16) -> u8 {
        self.read(address)
    }

    /// Direct write for the debugger: bypasses ROM protection but still
    /// invalidates the M1 cache entry for the target.
    pub fn direct_write(&mut self, address: u16, value: u8) {
        let page = self.banks[Self::bank_of(address)];
        let offset = (page.index as usize) * PAGE_SIZE + (address as usize & 0x3FFF);
        self.invalidate_tscache(self.physical_id(address));
        self.region_mut(page.kind)[offset] = value;
    }

    /// Read a byte from a physical page regardless of the current mapping.
    pub fn read_page(&self, kind: PageKind, page: usize, offset: usize) -> Result<u8, MemoryError> {
        if page >= self.page_count(kind) {
            return Err(MemoryError::NoSuchPage { kind: kind.name(), page });
        }
        if offset >= PAGE_SIZE {
            return Err(MemoryError::OffsetOutOfRange { offset });
        }
        Ok(self.region(kind)[page * PAGE_SIZE + offset])
    }

    /// Write a byte into a physical page regardless of the current mapping.
    pub fn write_page(
        &mut self,
        kind: PageKind,
        page: usize,
        offset: usize,
        value: u8,
    ) -> Result<(), MemoryError> {
        if page >= self.page_count(kind) {
            return Err(MemoryError::NoSuchPage { kind: kind.name(), page });
        }
        if offset >= PAGE_SIZE {
            return Err(MemoryError::OffsetOutOfRange { offset });
        }
        let kind_bits = match kind {
            PageKind::Ram => 0u32,
            PageKind::Rom => 1,
            PageKind::Cache => 2,
            PageKind::Misc => 3,
        };
        self.invalidate_tscache((kind_bits << 22) | ((page as u32) << 14) | offset as u32);
        self.region_mut(kind)[page * PAGE_SIZE + offset] = value;
        Ok(())
    }

    /// Borrow a whole physical page.
    pub fn page_slice(&self, kind: PageKind, page: usize) -> Result<&[u8], MemoryError> {
        if page >= self.page_count(kind) {
            return Err(MemoryError::NoSuchPage { kind: kind.name(), page });
        }
        Ok(&self.region(kind)[page * PAGE_SIZE..(page + 1) * PAGE_SIZE])
    }

    /// Load a ROM image into one ROM page.
    pub fn load_rom_page(&mut self, page: usize, data: &[u8]) -> Result<(), MemoryError> {
        if page >= self.rom_pages {
            return Err(MemoryError::NoSuchPage { kind: "rom", page });
        }
        let dest = &mut self.rom[page * PAGE_SIZE..(page + 1) * PAGE_SIZE];
        let len = data.len().min(PAGE_SIZE);
        dest[..len].copy_from_slice(&data[..len]);
        self.flush_tscache();
        Ok(())
    }

    /// Copy `data` into a RAM page (snapshot restore).
    pub fn load_ram_page(&mut self, page: usize, data: &[u8]) -> Result<(), MemoryError> {
        if page >= self.ram_pages {
            return Err(MemoryError::NoSuchPage { kind: "ram", page });
        }
        let dest = &mut self.ram[page * PAGE_SIZE..(page + 1) * PAGE_SIZE];
        let len = data.len().min(PAGE_SIZE);
        dest[..len].copy_from_slice(&data[..len]);
        self.flush_tscache();
        Ok(())
    }

    /// Whether an access to `address` is subject to ULA contention under
    /// the current mapping. Bank 1 always holds the screen page; on
    /// 128K-family models odd RAM pages share the contended chips.
    #[inline]
    pub fn is_contended(&self, address: u16) -> bool {
        let bank = Self::bank_of(address);
        let page = self.banks[bank];
        match page.kind {
            PageKind::Ram => match self.model {
                MachineModel::Spectrum48 => bank == 1,
                _ => page.index & 0x01 != 0,
            },
            _ => false,
        }
    }

    // ========== M1 fetch cache ==========

    /// Look up the M1 cache; on miss, read memory and fill the entry.
    #[inline]
    pub fn fetch_cached(&mut self, address: u16) -> u8 {
        let id = self.physical_id(address);
        let slot = (id as usize) & (TSCACHE_SIZE - 1);
        if self.tscache_id[slot] == id {
            return self.tscache_data[slot];
        }
        let value = self.read(address);
        self.tscache_id[slot] = id;
        self.tscache_data[slot] = value;
        value
    }

    #[inline]
    fn invalidate_tscache(&mut self, id: u32) {
        let slot = (id as usize) & (TSCACHE_SIZE - 1);
        if self.tscache_id[slot] == id {
            self.tscache_id[slot] = u32::MAX;
        }
    }

    fn flush_tscache(&mut self) {
        self.tscache_id = [u32::MAX; TSCACHE_SIZE];
    }

    /// FNV-1a hash of a ROM page, used as the snapshot ROM identity.
    pub fn rom_page_hash(&self, page: usize) -> Result<u64, MemoryError> {
        let slice = self.page_slice(PageKind::Rom, page)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for &byte in slice {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        Ok(hash)
    }
}
