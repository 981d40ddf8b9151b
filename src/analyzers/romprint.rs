//! ROM print-routine capture
//!
//! Hooks the 48K BASIC ROM character-output routines with execution
//! breakpoints; on each hit the A register carries the character being
//! printed. Characters are decoded (ASCII plus Sinclair BASIC keyword
//! tokens) into a running text history, segmented into lines on CR.
//! Consumers read the unread portion through per-detector cursors.

use std::any::Any;

use super::{ActivationContext, Analyzer};
use crate::cpu::Cpu;

/// RST 10h: the ROM print-a-character entry.
pub const RST_10: u16 = 0x0010;
/// PRINT_OUT: channel output dispatch inside the 48K ROM.
pub const PRINT_OUT: u16 = 0x09F4;
/// PRINT_A_2: the character printer after control-code handling.
pub const PRINT_A_2: u16 = 0x0B52;

/// Analyzer registration id.
pub const ROM_PRINT_ANALYZER_ID: &str = "romprint";

/// Sinclair BASIC keyword tokens, codes 0xA5 ("RND") through 0xFF ("COPY").
const BASIC_KEYWORDS: [&str; 91] = [
    "RND", "INKEY$", "PI", "FN", "POINT", "SCREEN$", "ATTR", "AT", "TAB",
    "VAL$", "CODE", "VAL", "LEN", "SIN", "COS", "TAN", "ASN", "ACS", "ATN",
    "LN", "EXP", "INT", "SQR", "SGN", "ABS", "PEEK", "IN", "USR", "STR$",
    "CHR$", "NOT", "BIN", "OR", "AND", "<=", ">=", "<>", "LINE", "THEN",
    "TO", "STEP", "DEF FN", "CAT", "FORMAT", "MOVE", "ERASE", "OPEN #",
    "CLOSE #", "MERGE", "VERIFY", "BEEP", "CIRCLE", "INK", "PAPER", "FLASH",
    "BRIGHT", "INVERSE", "OVER", "OUT", "LPRINT", "LLIST", "STOP", "READ",
    "DATA", "RESTORE", "NEW", "BORDER", "CONTINUE", "DIM", "REM", "FOR",
    "GO TO", "GO SUB", "INPUT", "LOAD", "LIST", "LET", "PAUSE", "NEXT",
    "POKE", "PRINT", "PLOT", "RUN", "SAVE", "RANDOMIZE", "IF", "CLS",
    "DRAW", "CLEAR", "RETURN", "COPY",
];

/// Decode one character code printed through the ROM.
pub fn decode_character(code: u8) -> String {
    if (0x20..0x7F).contains(&code) {
        return (code as char).to_string();
    }
    if code == 0x0D {
        return "\n".to_string();
    }
    if code >= 0xA5 {
        return BASIC_KEYWORDS[(code - 0xA5) as usize].to_string();
    }
    format!("[0x{code:02X}]")
}

/// Captures the character stream written through the ROM print routines.
pub struct RomPrintDetector {
    full_history: String,
    current_line: String,
    lines: Vec<String>,
    read_position: usize,
    line_cursor: usize,
}

impl RomPrintDetector {
    pub fn new() -> Self {
        Self {
            full_history: String::new(),
            current_line: String::new(),
            lines: Vec::new(),
            read_position: 0,
            line_cursor: 0,
        }
    }

    fn capture(&mut self, code: u8) {
        let decoded = decode_character(code);
        self.full_history.push_str(&decoded);

        if code == 0x0D {
            self.lines.push(std::mem::take(&mut self.current_line));
        } else if code >= 0x20 {
            self.current_line.push_str(&decoded);
        }
        // Remaining control codes only enter the raw history.
    }

    /// Text accumulated since the previous `new_output` call.
    pub fn new_output(&mut self) -> String {
        if self.read_position >= self.full_history.len() {
            return String::new();
        }
        let output = self.full_history[self.read_position..].to_string();
        self.read_position = self.full_history.len();
        output
    }

    /// Completed lines accumulated since the previous `new_lines` call.
    pub fn new_lines(&mut self) -> Vec<String> {
        let lines = self.lines[self.line_cursor..].to_vec();
        self.line_cursor = self.lines.len();
        lines
    }

    /// Full capture history (no cursor movement).
    pub fn history(&self) -> &str {
        &self.full_history
    }

    pub fn clear(&mut self) {
        self.full_history.clear();
        self.current_line.clear();
        self.lines.clear();
        self.read_position = 0;
        self.line_cursor = 0;
    }
}

impl Default for RomPrintDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for RomPrintDetector {
    fn id(&self) -> &str {
        ROM_PRINT_ANALYZER_ID
    }

    fn on_activate(&mut self, ctx: &mut ActivationContext<'_>) {
        ctx.request_execution_breakpoint(RST_10);
        ctx.request_execution_breakpoint(PRINT_OUT);
        ctx.request_execution_breakpoint(PRINT_A_2);
    }

    fn on_breakpoint_hit(&mut self, _address: u16, _breakpoint: u16, cpu: &Cpu) {
        self.capture(cpu.a);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
