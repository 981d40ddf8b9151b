//! Per-model machine timing
//!
//! Frame geometry and CPU timing differ between ZX Spectrum family models.
//! All model-dependent constants are resolved here, once, when a machine
//! configuration is selected; hot paths only ever read the resolved values.

/// One Z80 bank is 16 KiB of the 64 KiB address space.
pub const BANK_SIZE: usize = 0x4000;

/// Supported machine models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MachineModel {
    /// 48K Spectrum: single ROM, 3 RAM pages, no paging
    Spectrum48,
    /// 128K Spectrum / +2: two ROMs, 8 RAM pages, port 0x7FFD paging
    #[default]
    Spectrum128,
    /// Spectrum +3: four ROMs, port 0x1FFD special paging
    Plus3,
    /// Pentagon 128: no ULA contention, TR-DOS ROM
    Pentagon128,
}

impl MachineModel {
    /// Parse a model name the way the configuration surface accepts it.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "48K" | "SPECTRUM48" => Some(Self::Spectrum48),
            "128K" | "SPECTRUM128" => Some(Self::Spectrum128),
            "PLUS3" | "+3" => Some(Self::Plus3),
            "PENTAGON" | "PENTAGON128" => Some(Self::Pentagon128),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Spectrum48 => "SPECTRUM48",
            Self::Spectrum128 => "SPECTRUM128",
            Self::Plus3 => "PLUS3",
            Self::Pentagon128 => "PENTAGON128",
        }
    }
}

/// Resolved timing and geometry for one machine model.
///
/// `frame` is always `t_line * lines`; stepping operations rely on that
/// identity when converting between scanlines and t-states.
#[derive(Debug, Clone)]
pub struct MachineTiming {
    pub model: MachineModel,
    /// T-states per scanline
    pub t_line: u32,
    /// Total scanlines per frame (including blanking)
    pub lines: u32,
    /// T-states per frame
    pub frame: u32,
    /// T-states after frame start during which /INT is held active
    pub int_length: u32,
    /// First scanline of the paper (pixel) area
    pub paper_top_line: u32,
    /// Number of paper scanlines
    pub paper_lines: u32,
    /// T-state offset within a scanline where the paper area starts
    pub paper_left_t: u32,
    /// Width of the paper area in t-states (2 pixels per t-state)
    pub paper_width_t: u32,
    /// Number of 16 KiB ROM pages for this model
    pub rom_pages: usize,
    /// Number of 16 KiB RAM pages for this model
    pub ram_pages: usize,
    /// Whether the ULA contends CPU access to the screen bank
    pub contended: bool,
}

impl MachineTiming {
    pub fn new(model: MachineModel) -> Self {
        match model {
            MachineModel::Spectrum48 => Self {
                model,
                t_line: 224,
                lines: 312,
                frame: 224 * 312,
                int_length: 32,
                paper_top_line: 64,
                paper_lines: 192,
                paper_left_t: 48,
                paper_width_t: 128,
                rom_pages: 1,
                ram_pages: 3,
                contended: true,
            },
            MachineModel::Spectrum128 => Self {
                model,
                t_line: 228,
                lines: 311,
                frame: 228 * 311,
                int_length: 36,
                paper_top_line: 63,
                paper_lines: 192,
                paper_left_t: 48,
                paper_width_t: 128,
                rom_pages: 2,
                ram_pages: 8,
                contended: true,
            },
            MachineModel::Plus3 => Self {
                model,
                t_line: 228,
                lines: 311,
                frame: 228 * 311,
                int_length: 32,
                paper_top_line: 63,
                paper_lines: 192,
                paper_left_t: 48,
                paper_width_t: 128,
                rom_pages: 4,
                ram_pages: 8,
                contended: true,
            },
            MachineModel::Pentagon128 => Self {
                model,
                t_line: 224,
                lines: 320,
                frame: 224 * 320,
                int_length: 32,
                paper_top_line: 80,
                paper_lines: 192,
                paper_left_t: 68,
                paper_width_t: 128,
                rom_pages: 3,
                ram_pages: 8,
                contended: false,
            },
        }
    }

    /// Scanline containing frame t-state `t`.
    #[inline]
    pub fn line_of(&self, t: u32) -> u32 {
        (t % self.frame) / self.t_line
    }

    /// T-state offset within the scanline for frame t-state `t`.
    #[inline]
    pub fn line_offset(&self, t: u32) -> u32 {
        (t % self.frame) % self.t_line
    }

    /// Whether frame t-state `t` falls inside the paper (pixel) area.
    pub fn in_paper_area(&self, t: u32) -> bool {
        let line = self.line_of(t);
        if line < self.paper_top_line || line >= self.paper_top_line + self.paper_lines {
            return false;
        }
        let x = self.line_offset(t);
        x >= self.paper_left_t && x < self.paper_left_t + self.paper_width_t
    }

    /// Extra t-states the ULA inserts for an access to contended memory at
    /// frame t-state `t`. The classic 6-5-4-3-2-1-0-0 pattern repeats every
    /// 8 t-states across the paper area of each display line.
    pub fn contention_delay(&self, t: u32) -> u32 {
        if !self.contended || !self.in_paper_area(t) {
            return 0;
        }
        let phase = (self.line_offset(t) - self.paper_left_t) % 8;
        6u32.saturating_sub(phase)
    }
}

impl Default for MachineTiming {
    fn default() -> Self {
        Self::new(MachineModel::default())
    }
}
