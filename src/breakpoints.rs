//! Breakpoint registry
//!
//! Breakpoints are kept in an id-keyed map with address- and port-indexed
//! buckets so the per-access match test stays O(1) in the number of
//! registered breakpoints. Ids are 16-bit; removed ids return to a FIFO
//! freelist and are recycled before the counter advances. Counter wrap is
//! treated as registry exhaustion.

use std::collections::VecDeque;

use bitflags::bitflags;
use log::warn;
use rustc_hash::FxHashMap;

use crate::memory::PageRef;

/// Reserved invalid breakpoint id, returned when the registry is exhausted.
pub const BRK_INVALID: u16 = 0xFFFF;

/// Group assigned to breakpoints created without an explicit group.
pub const DEFAULT_GROUP: &str = "default";

bitflags! {
    /// Memory access kinds a breakpoint can trigger on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemAccess: u8 {
        const READ = 0x01;
        const WRITE = 0x02;
        const EXECUTE = 0x04;
    }
}

bitflags! {
    /// Port access kinds a breakpoint can trigger on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PortAccess: u8 {
        const IN = 0x01;
        const OUT = 0x02;
    }
}

/// What a breakpoint watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointKind {
    /// M1 opcode fetch at the address
    Execution,
    /// Data access at the address, filtered by kind mask
    Memory(MemAccess),
    /// IN/OUT at the port, filtered by kind mask
    Port(PortAccess),
}

/// Coarse class used by the type-scoped removal/activation operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointClass {
    Execution,
    Memory,
    Port,
}

impl BreakpointKind {
    pub fn class(&self) -> BreakpointClass {
        match self {
            Self::Execution => BreakpointClass::Execution,
            Self::Memory(_) => BreakpointClass::Memory,
            Self::Port(_) => BreakpointClass::Port,
        }
    }

    fn type_name(&self) -> &'static str {
        match self.class() {
            BreakpointClass::Execution => "exec",
            BreakpointClass::Memory => "mem",
            BreakpointClass::Port => "port",
        }
    }

    fn kind_suffix(&self) -> String {
        match self {
            Self::Execution => String::new(),
            Self::Memory(mask) => {
                let mut s = String::new();
                if mask.contains(MemAccess::READ) {
                    s.push('r');
                }
                if mask.contains(MemAccess::WRITE) {
                    s.push('w');
                }
                if mask.contains(MemAccess::EXECUTE) {
                    s.push('x');
                }
                s
            }
            Self::Port(mask) => {
                let mut s = String::new();
                if mask.contains(PortAccess::IN) {
                    s.push('i');
                }
                if mask.contains(PortAccess::OUT) {
                    s.push('o');
                }
                s
            }
        }
    }
}

/// The access that actually triggered a breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Execute,
    Read,
    Write,
    PortIn,
    PortOut,
}

impl AccessKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Read => "read",
            Self::Write => "write",
            Self::PortIn => "in",
            Self::PortOut => "out",
        }
    }
}

/// One registered breakpoint.
#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub id: u16,
    pub address: u16,
    pub kind: BreakpointKind,
    /// Activates only while this physical page is mapped at this bank
    pub page: Option<(PageRef, u8)>,
    pub active: bool,
    pub group: String,
    pub note: Option<String>,
}

impl Breakpoint {
    fn to_line(&self) -> String {
        let mut line = format!("#{} [{}] ${:04X}", self.id, self.kind.type_name(), self.address);
        let suffix = self.kind.kind_suffix();
        if !suffix.is_empty() {
            line.push_str(&format!(" [{suffix}]"));
        }
        if self.group != DEFAULT_GROUP {
            line.push_str(&format!(" group={}", self.group));
        }
        if let Some(note) = &self.note {
            line.push_str(&format!(" note={note}"));
        }
        if !self.active {
            line.push_str(" inactive");
        }
        line
    }
}

/// Record of the most recently matched breakpoint, polled by debuggers
/// once the emulator pauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredBreakpoint {
    pub id: u16,
    pub kind: BreakpointKind,
    pub address: u16,
    pub access: AccessKind,
    pub was_active: bool,
    pub note: Option<String>,
    pub group: String,
}

/// Registry of execution/memory/port breakpoints with group management.
pub struct BreakpointManager {
    by_id: FxHashMap<u16, Breakpoint>,
    by_addr: FxHashMap<u16, Vec<u16>>,
    by_port: FxHashMap<u16, Vec<u16>>,
    freelist: VecDeque<u16>,
    next_id: u16,
    exhausted: bool,
    last_triggered: Option<TriggeredBreakpoint>,
    // Per-class counts so disabled classes short-circuit the hot path.
    exec_count: usize,
    memory_count: usize,
    port_count: usize,
}

impl BreakpointManager {
    pub fn new() -> Self {
        Self {
            by_id: FxHashMap::default(),
            by_addr: FxHashMap::default(),
            by_port: FxHashMap::default(),
            freelist: VecDeque::new(),
            next_id: 0,
            exhausted: false,
            last_triggered: None,
            exec_count: 0,
            memory_count: 0,
            port_count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: u16) -> Option<&Breakpoint> {
        self.by_id.get(&id)
    }

    fn alloc_id(&mut self) -> u16 {
        if let Some(id) = self.freelist.pop_front() {
            return id;
        }
        if self.exhausted {
            return BRK_INVALID;
        }
        let id = self.next_id;
        if self.next_id == BRK_INVALID - 1 {
            self.exhausted = true;
        } else {
            self.next_id += 1;
        }
        id
    }

    fn insert(&mut self, mut breakpoint: Breakpoint) -> u16 {
        let id = self.alloc_id();
        if id == BRK_INVALID {
            warn!("breakpoint registry exhausted, request dropped");
            return BRK_INVALID;
        }
        breakpoint.id = id;
        match breakpoint.kind.class() {
            BreakpointClass::Execution => {
                self.exec_count += 1;
                self.by_addr.entry(breakpoint.address).or_default().push(id);
            }
            BreakpointClass::Memory => {
                self.memory_count += 1;
                self.by_addr.entry(breakpoint.address).or_default().push(id);
            }
            BreakpointClass::Port => {
                self.port_count += 1;
                self.by_port.entry(breakpoint.address).or_default().push(id);
            }
        }
        self.by_id.insert(id, breakpoint);
        id
    }

    fn new_breakpoint(address: u16, kind: BreakpointKind, note: Option<String>) -> Breakpoint {
        Breakpoint {
            id: BRK_INVALID,
            address,
            kind,
            page: None,
            active: true,
            group: DEFAULT_GROUP.to_string(),
            note,
        }
    }

    // ========== Add operations ==========

    pub fn add_execution_breakpoint(&mut self, address: u16) -> u16 {
        self.insert(Self::new_breakpoint(address, BreakpointKind::Execution, None))
    }

    /// Execution breakpoint that only fires while `page` is mapped at `bank`.
    pub fn add_execution_breakpoint_in_page(&mut self, address: u16, page: PageRef, bank: u8) -> u16 {
        let mut breakpoint = Self::new_breakpoint(address, BreakpointKind::Execution, None);
        breakpoint.page = Some((page, bank & 3));
        self.insert(breakpoint)
    }

    pub fn add_mem_read_breakpoint(&mut self, address: u16) -> u16 {
        self.insert(Self::new_breakpoint(address, BreakpointKind::Memory(MemAccess::READ), None))
    }

    pub fn add_mem_write_breakpoint(&mut self, address: u16) -> u16 {
        self.insert(Self::new_breakpoint(address, BreakpointKind::Memory(MemAccess::WRITE), None))
    }

    pub fn add_combined_memory_breakpoint(&mut self, address: u16, kinds: MemAccess) -> u16 {
        if kinds.is_empty() {
            return BRK_INVALID;
        }
        self.insert(Self::new_breakpoint(address, BreakpointKind::Memory(kinds), None))
    }

    pub fn add_port_in_breakpoint(&mut self, port: u16) -> u16 {
        self.insert(Self::new_breakpoint(port, BreakpointKind::Port(PortAccess::IN), None))
    }

    pub fn add_port_out_breakpoint(&mut self, port: u16) -> u16 {
        self.insert(Self::new_breakpoint(port, BreakpointKind::Port(PortAccess::OUT), None))
    }

    pub fn add_combined_port_breakpoint(&mut self, port: u16, kinds: PortAccess) -> u16 {
        if kinds.is_empty() {
            return BRK_INVALID;
        }
        self.insert(Self::new_breakpoint(port, BreakpointKind::Port(kinds), None))
    }

    /// Attach a free-form note to an existing breakpoint.
    pub fn set_note(&mut self, id: u16, note: &str) -> bool {
        match self.by_id.get_mut(&id) {
            Some(breakpoint) => {
                breakpoint.note = Some(note.to_string());
                true
            }
            None => false,
        }
    }

    // ========== Remove operations ==========

    /// Remove one breakpoint. Returns false (no side effects) for an
    /// unknown id.
    pub fn remove_breakpoint_by_id(&mut self, id: u16) -> bool {
        let Some(breakpoint) = self.by_id.remove(&id) else {
            return false;
        };
        let bucket = match breakpoint.kind.class() {
            BreakpointClass::Execution => {
                self.exec_count -= 1;
                self.by_addr.get_mut(&breakpoint.address)
            }
            BreakpointClass::Memory => {
                self.memory_count -= 1;
                self.by_addr.get_mut(&breakpoint.address)
            }
            BreakpointClass::Port => {
                self.port_count -= 1;
                self.by_port.get_mut(&breakpoint.address)
            }
        };
        if let Some(bucket) = bucket {
            bucket.retain(|&entry| entry != id);
        }
        self.freelist.push_back(id);
        true
    }

    fn remove_matching(&mut self, predicate: impl Fn(&Breakpoint) -> bool) -> usize {
        let ids: Vec<u16> =
            self.by_id.values().filter(|bp| predicate(bp)).map(|bp| bp.id).collect();
        for id in &ids {
            self.remove_breakpoint_by_id(*id);
        }
        ids.len()
    }

    /// Remove all execution/memory breakpoints at an address.
    pub fn remove_breakpoint_by_address(&mut self, address: u16) -> usize {
        self.remove_matching(|bp| {
            bp.address == address && bp.kind.class() != BreakpointClass::Port
        })
    }

    /// Remove all port breakpoints at a port.
    pub fn remove_breakpoint_by_port(&mut self, port: u16) -> usize {
        self.remove_matching(|bp| bp.address == port && bp.kind.class() == BreakpointClass::Port)
    }

    pub fn remove_breakpoints_by_type(&mut self, class: BreakpointClass) -> usize {
        self.remove_matching(|bp| bp.kind.class() == class)
    }

    /// Remove memory breakpoints whose kind mask intersects `kinds`.
    pub fn remove_memory_breakpoints_by_type(&mut self, kinds: MemAccess) -> usize {
        self.remove_matching(|bp| matches!(bp.kind, BreakpointKind::Memory(mask) if mask.intersects(kinds)))
    }

    /// Remove port breakpoints whose kind mask intersects `kinds`.
    pub fn remove_port_breakpoints_by_type(&mut self, kinds: PortAccess) -> usize {
        self.remove_matching(|bp| matches!(bp.kind, BreakpointKind::Port(mask) if mask.intersects(kinds)))
    }

    pub fn remove_all(&mut self) -> usize {
        self.remove_matching(|_| true)
    }

    // ========== Activation ==========

    fn set_active(&mut self, id: u16, active: bool) -> bool {
        match self.by_id.get_mut(&id) {
            Some(breakpoint) => {
                breakpoint.active = active;
                true
            }
            None => false,
        }
    }

    pub fn activate_breakpoint(&mut self, id: u16) -> bool {
        self.set_active(id, true)
    }

    pub fn deactivate_breakpoint(&mut self, id: u16) -> bool {
        self.set_active(id, false)
    }

    fn set_active_matching(&mut self, active: bool, predicate: impl Fn(&Breakpoint) -> bool) -> usize {
        let mut affected = 0;
        for breakpoint in self.by_id.values_mut() {
            if predicate(breakpoint) {
                breakpoint.active = active;
                affected += 1;
            }
        }
        affected
    }

    pub fn activate_breakpoints_by_type(&mut self, class: BreakpointClass) -> usize {
        self.set_active_matching(true, |bp| bp.kind.class() == class)
    }

    pub fn deactivate_breakpoints_by_type(&mut self, class: BreakpointClass) -> usize {
        self.set_active_matching(false, |bp| bp.kind.class() == class)
    }

    /// Activate memory breakpoints whose kind mask intersects `kinds`.
    pub fn activate_memory_breakpoints_by_type(&mut self, kinds: MemAccess) -> usize {
        self.set_active_matching(
            true,
            |bp| matches!(bp.kind, BreakpointKind::Memory(mask) if mask.intersects(kinds)),
        )
    }

    pub fn deactivate_memory_breakpoints_by_type(&mut self, kinds: MemAccess) -> usize {
        self.set_active_matching(
            false,
            |bp| matches!(bp.kind, BreakpointKind::Memory(mask) if mask.intersects(kinds)),
        )
    }

    /// Activate port breakpoints whose kind mask intersects `kinds`.
    pub fn activate_port_breakpoints_by_type(&mut self, kinds: PortAccess) -> usize {
        self.set_active_matching(
            true,
            |bp| matches!(bp.kind, BreakpointKind::Port(mask) if mask.intersects(kinds)),
        )
    }

    pub fn deactivate_port_breakpoints_by_type(&mut self, kinds: PortAccess) -> usize {
        self.set_active_matching(
            false,
            |bp| matches!(bp.kind, BreakpointKind::Port(mask) if mask.intersects(kinds)),
        )
    }

    pub fn activate_all(&mut self) -> usize {
        self.set_active_matching(true, |_| true)
    }

    pub fn deactivate_all(&mut self) -> usize {
        self.set_active_matching(false, |_| true)
    }

    // ========== Groups ==========

    /// Move a breakpoint into a group. Returns false for an unknown id.
    pub fn set_breakpoint_group(&mut self, id: u16, group: &str) -> bool {
        match self.by_id.get_mut(&id) {
            Some(breakpoint) => {
                breakpoint.group = group.to_string();
                true
            }
            None => false,
        }
    }

    /// Return a breakpoint to the default group.
    pub fn remove_breakpoint_from_group(&mut self, id: u16) -> bool {
        self.set_breakpoint_group(id, DEFAULT_GROUP)
    }

    pub fn activate_breakpoint_group(&mut self, group: &str) -> usize {
        self.set_active_matching(true, |bp| bp.group == group)
    }

    pub fn deactivate_breakpoint_group(&mut self, group: &str) -> usize {
        self.set_active_matching(false, |bp| bp.group == group)
    }

    /// Delete every breakpoint in a group.
    pub fn remove_breakpoint_group(&mut self, group: &str) -> usize {
        self.remove_matching(|bp| bp.group == group)
    }

    /// Names of all groups in use, sorted.
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_id.values().map(|bp| bp.group.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    // ========== Match protocol ==========

    #[inline]
    fn page_matches(breakpoint: &Breakpoint, banks: &[PageRef; 4]) -> bool {
        match breakpoint.page {
            Some((page, bank)) => banks[bank as usize] == page,
            None => true,
        }
    }

    fn record_hit(&mut self, id: u16, access: AccessKind) {
        if let Some(breakpoint) = self.by_id.get(&id) {
            self.last_triggered = Some(TriggeredBreakpoint {
                id,
                kind: breakpoint.kind,
                address: breakpoint.address,
                access,
                was_active: breakpoint.active,
                note: breakpoint.note.clone(),
                group: breakpoint.group.clone(),
            });
        }
    }

    /// Match an M1 fetch against execution breakpoints.
    #[inline]
    pub fn check_execution(&mut self, address: u16, banks: &[PageRef; 4]) -> Option<u16> {
        if self.exec_count == 0 {
            return None;
        }
        let id = self.by_addr.get(&address)?.iter().copied().find(|id| {
            self.by_id.get(id).is_some_and(|bp| {
                bp.active
                    && matches!(bp.kind, BreakpointKind::Execution)
                    && Self::page_matches(bp, banks)
            })
        })?;
        self.record_hit(id, AccessKind::Execute);
        Some(id)
    }

    /// Match a data access against memory breakpoints.
    #[inline]
    pub fn check_memory(
        &mut self,
        address: u16,
        access: MemAccess,
        banks: &[PageRef; 4],
    ) -> Option<u16> {
        if self.memory_count == 0 {
            return None;
        }
        let id = self.by_addr.get(&address)?.iter().copied().find(|id| {
            self.by_id.get(id).is_some_and(|bp| {
                bp.active
                    && matches!(bp.kind, BreakpointKind::Memory(mask) if mask.intersects(access))
                    && Self::page_matches(bp, banks)
            })
        })?;
        let kind = if access.contains(MemAccess::WRITE) {
            AccessKind::Write
        } else if access.contains(MemAccess::EXECUTE) {
            AccessKind::Execute
        } else {
            AccessKind::Read
        };
        self.record_hit(id, kind);
        Some(id)
    }

    /// Match an IN/OUT against port breakpoints.
    #[inline]
    pub fn check_port(&mut self, port: u16, access: PortAccess) -> Option<u16> {
        if self.port_count == 0 {
            return None;
        }
        let id = self.by_port.get(&port)?.iter().copied().find(|id| {
            self.by_id.get(id).is_some_and(|bp| {
                bp.active
                    && matches!(bp.kind, BreakpointKind::Port(mask) if mask.intersects(access))
            })
        })?;
        let kind = if access.contains(PortAccess::OUT) {
            AccessKind::PortOut
        } else {
            AccessKind::PortIn
        };
        self.record_hit(id, kind);
        Some(id)
    }

    pub fn last_triggered_info(&self) -> Option<&TriggeredBreakpoint> {
        self.last_triggered.as_ref()
    }

    // ========== Serialization ==========

    /// Text serialization, one breakpoint per line, ordered by id.
    pub fn list_as_string(&self, separator: &str) -> String {
        let mut breakpoints: Vec<&Breakpoint> = self.by_id.values().collect();
        breakpoints.sort_by_key(|bp| bp.id);
        breakpoints
            .iter()
            .map(|bp| bp.to_line())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Like `list_as_string`, restricted to one group.
    pub fn list_as_string_by_group(&self, group: &str) -> String {
        let mut breakpoints: Vec<&Breakpoint> =
            self.by_id.values().filter(|bp| bp.group == group).collect();
        breakpoints.sort_by_key(|bp| bp.id);
        breakpoints
            .iter()
            .map(|bp| bp.to_line())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for BreakpointManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::PageKind;

    fn default_banks() -> [PageRef; 4] {
        [PageRef::rom(0), PageRef::ram(5), PageRef::ram(2), PageRef::ram(0)]
    }

    #[test]
    fn test_id_allocation_is_sequential() {
        let mut manager = BreakpointManager::new();
        assert_eq!(manager.add_execution_breakpoint(0x8000), 0);
        assert_eq!(manager.add_execution_breakpoint(0x8001), 1);
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn test_freelist_recycling_is_fifo() {
        let mut manager = BreakpointManager::new();
        let a = manager.add_execution_breakpoint(0x8000);
        let b = manager.add_execution_breakpoint(0x8001);
        let c = manager.add_execution_breakpoint(0x8002);
        assert!(manager.remove_breakpoint_by_id(b));
        assert!(manager.remove_breakpoint_by_id(a));
        // FIFO: b was freed first, so it is reused first
        assert_eq!(manager.add_execution_breakpoint(0x9000), b);
        assert_eq!(manager.add_execution_breakpoint(0x9001), a);
        let _ = c;
    }

    #[test]
    fn test_no_duplicate_live_ids() {
        let mut manager = BreakpointManager::new();
        let mut live = std::collections::HashSet::new();
        for i in 0..100u16 {
            let id = manager.add_execution_breakpoint(i);
            assert!(live.insert(id), "id {id} issued twice");
        }
        for id in 0..50u16 {
            manager.remove_breakpoint_by_id(id);
            live.remove(&id);
        }
        for i in 0..50u16 {
            let id = manager.add_mem_write_breakpoint(i);
            assert!(live.insert(id), "id {id} issued twice");
        }
    }

    #[test]
    fn test_remove_unknown_id_is_a_clean_failure() {
        let mut manager = BreakpointManager::new();
        assert!(!manager.remove_breakpoint_by_id(42));
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn test_execution_match() {
        let mut manager = BreakpointManager::new();
        let id = manager.add_execution_breakpoint(0x3D03);
        let banks = default_banks();
        assert_eq!(manager.check_execution(0x3D03, &banks), Some(id));
        assert_eq!(manager.check_execution(0x3D04, &banks), None);
        // Memory accesses do not match execution breakpoints
        assert_eq!(manager.check_memory(0x3D03, MemAccess::READ, &banks), None);
    }

    #[test]
    fn test_page_qualified_match() {
        let mut manager = BreakpointManager::new();
        let trdos = PageRef::rom(2);
        let id = manager.add_execution_breakpoint_in_page(0x3D03, trdos, 0);
        let mut banks = default_banks();
        // 48K BASIC ROM mapped: no match
        assert_eq!(manager.check_execution(0x3D03, &banks), None);
        banks[0] = trdos;
        assert_eq!(manager.check_execution(0x3D03, &banks), Some(id));
    }

    #[test]
    fn test_memory_kind_mask() {
        let mut manager = BreakpointManager::new();
        let id = manager.add_combined_memory_breakpoint(0x4000, MemAccess::READ | MemAccess::WRITE);
        let banks = default_banks();
        assert_eq!(manager.check_memory(0x4000, MemAccess::READ, &banks), Some(id));
        assert_eq!(manager.check_memory(0x4000, MemAccess::WRITE, &banks), Some(id));
        let write_only = manager.add_mem_write_breakpoint(0x5000);
        assert_eq!(manager.check_memory(0x5000, MemAccess::READ, &banks), None);
        assert_eq!(manager.check_memory(0x5000, MemAccess::WRITE, &banks), Some(write_only));
    }

    #[test]
    fn test_inactive_breakpoints_do_not_match() {
        let mut manager = BreakpointManager::new();
        let id = manager.add_execution_breakpoint(0x8000);
        manager.deactivate_breakpoint(id);
        assert_eq!(manager.check_execution(0x8000, &default_banks()), None);
        manager.activate_breakpoint(id);
        assert_eq!(manager.check_execution(0x8000, &default_banks()), Some(id));
    }

    #[test]
    fn test_port_match() {
        let mut manager = BreakpointManager::new();
        let id = manager.add_combined_port_breakpoint(0x7FFD, PortAccess::OUT);
        assert_eq!(manager.check_port(0x7FFD, PortAccess::OUT), Some(id));
        assert_eq!(manager.check_port(0x7FFD, PortAccess::IN), None);
    }

    #[test]
    fn test_last_triggered_info() {
        let mut manager = BreakpointManager::new();
        let id = manager.add_mem_write_breakpoint(0x0001);
        manager.set_note(id, "rom write probe");
        assert!(manager.last_triggered_info().is_none());
        manager.check_memory(0x0001, MemAccess::WRITE, &default_banks());
        let info = manager.last_triggered_info().unwrap();
        assert_eq!(info.id, id);
        assert_eq!(info.address, 0x0001);
        assert_eq!(info.access, AccessKind::Write);
        assert!(info.was_active);
        assert_eq!(info.note.as_deref(), Some("rom write probe"));
        assert_eq!(info.group, DEFAULT_GROUP);
    }

    #[test]
    fn test_group_operations() {
        let mut manager = BreakpointManager::new();
        let a = manager.add_execution_breakpoint(0x1000);
        let b = manager.add_execution_breakpoint(0x2000);
        let c = manager.add_execution_breakpoint(0x3000);
        assert!(manager.set_breakpoint_group(a, "trdos"));
        assert!(manager.set_breakpoint_group(b, "trdos"));
        assert!(!manager.set_breakpoint_group(999, "trdos"));

        assert_eq!(manager.deactivate_breakpoint_group("trdos"), 2);
        assert!(!manager.get(a).unwrap().active);
        assert!(manager.get(c).unwrap().active);

        assert_eq!(manager.activate_breakpoint_group("trdos"), 2);
        assert!(manager.remove_breakpoint_from_group(a));
        assert_eq!(manager.get(a).unwrap().group, DEFAULT_GROUP);

        assert_eq!(manager.remove_breakpoint_group("trdos"), 1);
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn test_kind_scoped_activation() {
        let mut manager = BreakpointManager::new();
        let read = manager.add_mem_read_breakpoint(0x1000);
        let write = manager.add_mem_write_breakpoint(0x2000);
        let port = manager.add_port_in_breakpoint(0x00FE);
        assert_eq!(manager.deactivate_memory_breakpoints_by_type(MemAccess::WRITE), 1);
        assert!(manager.get(read).unwrap().active);
        assert!(!manager.get(write).unwrap().active);
        assert_eq!(manager.activate_memory_breakpoints_by_type(MemAccess::WRITE), 1);
        assert!(manager.get(write).unwrap().active);
        assert_eq!(manager.deactivate_port_breakpoints_by_type(PortAccess::IN), 1);
        assert!(!manager.get(port).unwrap().active);
        assert_eq!(manager.activate_port_breakpoints_by_type(PortAccess::IN), 1);
    }

    #[test]
    fn test_remove_by_scope() {
        let mut manager = BreakpointManager::new();
        manager.add_execution_breakpoint(0x1000);
        manager.add_mem_read_breakpoint(0x1000);
        manager.add_mem_write_breakpoint(0x2000);
        manager.add_port_in_breakpoint(0x00FE);
        manager.add_port_out_breakpoint(0x00FE);

        assert_eq!(manager.remove_breakpoint_by_address(0x1000), 2);
        assert_eq!(manager.remove_port_breakpoints_by_type(PortAccess::IN), 1);
        assert_eq!(manager.remove_breakpoints_by_type(BreakpointClass::Memory), 1);
        assert_eq!(manager.count(), 1);
        assert_eq!(manager.remove_all(), 1);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_list_serialization() {
        let mut manager = BreakpointManager::new();
        let a = manager.add_execution_breakpoint(0x3D03);
        let b = manager.add_combined_memory_breakpoint(0x4000, MemAccess::READ | MemAccess::WRITE);
        manager.set_breakpoint_group(b, "watch");
        manager.set_note(a, "entry");
        manager.deactivate_breakpoint(a);

        let listing = manager.list_as_string("\n");
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "#0 [exec] $3D03 note=entry inactive");
        assert_eq!(lines[1], "#1 [mem] $4000 [rw] group=watch");

        assert_eq!(manager.list_as_string_by_group("watch"), "#1 [mem] $4000 [rw] group=watch");
    }

    #[test]
    fn test_page_ref_kinds_compare() {
        assert_ne!(PageRef::rom(0), PageRef { kind: PageKind::Ram, index: 0 });
    }
}
