//! Memory access tracker
//!
//! Every instrumented access bumps a per-bank counter; while the memory
//! profiler session is capturing, per-physical-page counters are kept as
//! well. The tracker also owns the control-flow trace buffer, which the
//! interpreter feeds at M1 time for branch opcodes.
//!
//! The per-access entry points are called millions of times per emulated
//! second, so they are plain array increments behind one enabled check; the
//! enabled flag is a cache of the feature state, refreshed only at frame
//! boundaries.

use std::fs;
use std::io;
use std::path::Path;

use crate::calltrace::CallTraceBuffer;
use crate::memory::{PageKind, PageRef};
use crate::profiler::SessionState;

/// Per-page read/write/execute counters for one region.
#[derive(Debug, Default)]
struct RegionCounters {
    reads: Vec<u64>,
    writes: Vec<u64>,
    executes: Vec<u64>,
}

impl RegionCounters {
    fn new(pages: usize) -> Self {
        Self { reads: vec![0; pages], writes: vec![0; pages], executes: vec![0; pages] }
    }

    fn reset(&mut self) {
        self.reads.iter_mut().for_each(|c| *c = 0);
        self.writes.iter_mut().for_each(|c| *c = 0);
        self.executes.iter_mut().for_each(|c| *c = 0);
    }
}

/// Counter snapshot for one physical page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCounters {
    pub page: PageRef,
    pub reads: u64,
    pub writes: u64,
    pub executes: u64,
}

/// Aggregated counters for one Z80 bank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BankCounters {
    pub reads: u64,
    pub writes: u64,
    pub executes: u64,
}

/// Per-page and per-bank access accounting.
pub struct AccessTracker {
    banks: [BankCounters; 4],
    ram: RegionCounters,
    rom: RegionCounters,
    cache: RegionCounters,
    misc: RegionCounters,

    /// Feature cache: when false the entry points return immediately.
    enabled: bool,
    /// Memory profiler session gating the per-page counters.
    session: SessionState,

    /// Control-flow trace fed by the interpreter.
    pub calltrace: CallTraceBuffer,
}

impl AccessTracker {
    pub fn new(ram_pages: usize, rom_pages: usize) -> Self {
        Self {
            banks: [BankCounters::default(); 4],
            ram: RegionCounters::new(ram_pages),
            rom: RegionCounters::new(rom_pages),
            cache: RegionCounters::default(),
            misc: RegionCounters::default(),
            enabled: false,
            session: SessionState::new(),
            calltrace: CallTraceBuffer::new(),
        }
    }

    /// Resize the aux-region counter arrays after page allocation.
    pub fn resize_aux(&mut self, cache_pages: usize, misc_pages: usize) {
        self.cache = RegionCounters::new(cache_pages);
        self.misc = RegionCounters::new(misc_pages);
    }

    /// Refresh the feature cache. Called at frame boundaries only.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    #[inline]
    fn region_mut(&mut self, kind: PageKind) -> &mut RegionCounters {
        match kind {
            PageKind::Ram => &mut self.ram,
            PageKind::Rom => &mut self.rom,
            PageKind::Cache => &mut self.cache,
            PageKind::Misc => &mut self.misc,
        }
    }

    fn region(&self, kind: PageKind) -> &RegionCounters {
        match kind {
            PageKind::Ram => &self.ram,
            PageKind::Rom => &self.rom,
            PageKind::Cache => &self.cache,
            PageKind::Misc => &self.misc,
        }
    }

    // ========== Hot-path entry points ==========

    #[inline]
    pub fn on_read(&mut self, bank: usize, page: PageRef) {
        if !self.enabled {
            return;
        }
        self.banks[bank & 3].reads += 1;
        if self.session.is_capturing() {
            let index = page.index as usize;
            let region = self.region_mut(page.kind);
            if let Some(counter) = region.reads.get_mut(index) {
                *counter += 1;
            }
        }
    }

    #[inline]
    pub fn on_write(&mut self, bank: usize, page: PageRef) {
        if !self.enabled {
            return;
        }
        self.banks[bank & 3].writes += 1;
        if self.session.is_capturing() {
            let index = page.index as usize;
            let region = self.region_mut(page.kind);
            if let Some(counter) = region.writes.get_mut(index) {
                *counter += 1;
            }
        }
    }

    #[inline]
    pub fn on_execute(&mut self, bank: usize, page: PageRef) {
        if !self.enabled {
            return;
        }
        self.banks[bank & 3].executes += 1;
        if self.session.is_capturing() {
            let index = page.index as usize;
            let region = self.region_mut(page.kind);
            if let Some(counter) = region.executes.get_mut(index) {
                *counter += 1;
            }
        }
    }

    // ========== Queries ==========

    pub fn bank_counters(&self, bank: usize) -> BankCounters {
        self.banks[bank & 3]
    }

    pub fn page_counters(&self, page: PageRef) -> PageCounters {
        let region = self.region(page.kind);
        let index = page.index as usize;
        PageCounters {
            page,
            reads: region.reads.get(index).copied().unwrap_or(0),
            writes: region.writes.get(index).copied().unwrap_or(0),
            executes: region.executes.get(index).copied().unwrap_or(0),
        }
    }

    fn touched_pages(&self) -> Vec<PageCounters> {
        let mut pages = Vec::new();
        for (kind, region) in [
            (PageKind::Rom, &self.rom),
            (PageKind::Ram, &self.ram),
            (PageKind::Cache, &self.cache),
            (PageKind::Misc, &self.misc),
        ] {
            for index in 0..region.reads.len() {
                let counters = PageCounters {
                    page: PageRef { kind, index: index as u8 },
                    reads: region.reads[index],
                    writes: region.writes[index],
                    executes: region.executes[index],
                };
                if counters.reads | counters.writes | counters.executes != 0 {
                    pages.push(counters);
                }
            }
        }
        pages
    }

    /// Text report of all counters. Filter restricts per-page lines to the
    /// named page (for example `ram5` or `rom0`). Never mutates counters.
    pub fn report(&self, filter: Option<&str>) -> String {
        let mut out = String::from("bank reads writes executes\n");
        for (bank, counters) in self.banks.iter().enumerate() {
            out.push_str(&format!(
                "{bank} {} {} {}\n",
                counters.reads, counters.writes, counters.executes
            ));
        }
        out.push_str("page reads writes executes\n");
        for counters in self.touched_pages() {
            let name = format!("{}{}", counters.page.kind.name(), counters.page.index);
            if filter.is_some_and(|f| f != name) {
                continue;
            }
            out.push_str(&format!(
                "{name} {} {} {}\n",
                counters.reads, counters.writes, counters.executes
            ));
        }
        out
    }

    /// Serialize the counter report to disk. `single_file` writes one file
    /// at `path`; otherwise `path` is a directory with one file per page.
    pub fn save(&self, path: &Path, single_file: bool, filter: Option<&str>) -> io::Result<()> {
        if single_file {
            return fs::write(path, self.report(filter));
        }
        fs::create_dir_all(path)?;
        for counters in self.touched_pages() {
            let name = format!("{}{}", counters.page.kind.name(), counters.page.index);
            if filter.is_some_and(|f| f != name) {
                continue;
            }
            let body = format!(
                "reads {}\nwrites {}\nexecutes {}\n",
                counters.reads, counters.writes, counters.executes
            );
            fs::write(path.join(format!("{name}.txt")), body)?;
        }
        Ok(())
    }

    /// Zero all counters. Buffered call-trace data is unaffected.
    pub fn reset_counters(&mut self) {
        self.banks = [BankCounters::default(); 4];
        self.ram.reset();
        self.rom.reset();
        self.cache.reset();
        self.misc.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_tracker() -> AccessTracker {
        let mut tracker = AccessTracker::new(8, 2);
        tracker.set_enabled(true);
        tracker
    }

    #[test]
    fn test_disabled_tracker_counts_nothing() {
        let mut tracker = AccessTracker::new(8, 2);
        tracker.on_read(1, PageRef::ram(5));
        tracker.on_write(1, PageRef::ram(5));
        tracker.on_execute(0, PageRef::rom(0));
        assert_eq!(tracker.bank_counters(1), BankCounters::default());
    }

    #[test]
    fn test_bank_counters_without_session() {
        let mut tracker = enabled_tracker();
        tracker.on_read(1, PageRef::ram(5));
        tracker.on_read(1, PageRef::ram(5));
        tracker.on_write(3, PageRef::ram(0));
        tracker.on_execute(0, PageRef::rom(0));
        assert_eq!(tracker.bank_counters(1).reads, 2);
        assert_eq!(tracker.bank_counters(3).writes, 1);
        assert_eq!(tracker.bank_counters(0).executes, 1);
        // Per-page counters stay zero while the session is stopped
        assert_eq!(tracker.page_counters(PageRef::ram(5)).reads, 0);
    }

    #[test]
    fn test_page_counters_while_capturing() {
        let mut tracker = enabled_tracker();
        tracker.session_mut().start();
        tracker.on_read(1, PageRef::ram(5));
        tracker.on_write(1, PageRef::ram(5));
        tracker.on_execute(0, PageRef::rom(1));
        let page = tracker.page_counters(PageRef::ram(5));
        assert_eq!((page.reads, page.writes, page.executes), (1, 1, 0));
        assert_eq!(tracker.page_counters(PageRef::rom(1)).executes, 1);
    }

    #[test]
    fn test_session_pause_gates_page_counters() {
        let mut tracker = enabled_tracker();
        tracker.session_mut().start();
        tracker.on_read(1, PageRef::ram(5));
        tracker.session_mut().pause();
        tracker.on_read(1, PageRef::ram(5));
        assert_eq!(tracker.page_counters(PageRef::ram(5)).reads, 1);
        // Bank counters keep counting regardless of the session
        assert_eq!(tracker.bank_counters(1).reads, 2);
    }

    #[test]
    fn test_report_groups_and_filters() {
        let mut tracker = enabled_tracker();
        tracker.session_mut().start();
        tracker.on_read(1, PageRef::ram(5));
        tracker.on_execute(0, PageRef::rom(0));
        let report = tracker.report(None);
        assert!(report.contains("ram5 1 0 0"));
        assert!(report.contains("rom0 0 0 1"));
        let filtered = tracker.report(Some("ram5"));
        assert!(filtered.contains("ram5"));
        assert!(!filtered.contains("rom0"));
    }

    #[test]
    fn test_report_never_mutates() {
        let mut tracker = enabled_tracker();
        tracker.on_read(1, PageRef::ram(5));
        let first = tracker.report(None);
        let second = tracker.report(None);
        assert_eq!(first, second);
        assert_eq!(tracker.bank_counters(1).reads, 1);
    }

    #[test]
    fn test_reset_zeroes_counters() {
        let mut tracker = enabled_tracker();
        tracker.session_mut().start();
        tracker.on_read(1, PageRef::ram(5));
        tracker.reset_counters();
        assert_eq!(tracker.bank_counters(1), BankCounters::default());
        assert_eq!(tracker.page_counters(PageRef::ram(5)).reads, 0);
    }

    #[test]
    fn test_save_single_file() {
        let mut tracker = enabled_tracker();
        tracker.on_read(1, PageRef::ram(5));
        let dir = std::env::temp_dir().join("spectrum-core-tracker-test");
        let _ = fs::create_dir_all(&dir);
        let path = dir.join("counters.txt");
        tracker.save(&path, true, None).unwrap();
        let body = fs::read_to_string(&path).unwrap();
        assert!(body.contains("bank reads writes executes"));
        let _ = fs::remove_file(&path);
    }
}
