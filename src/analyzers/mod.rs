//! Analyzer framework
//!
//! Analyzers are pluggable observers of CPU and memory activity. The
//! manager routes events through three tiers:
//!
//! - hot path (CPU step, memory read/write): flat subscription vectors
//!   holding the owning analyzer's slot index - dispatch is an array walk
//!   with direct calls, no hashing and no allocation;
//! - warm path (video line, audio sample): same mechanism, lower rates;
//! - cold path (frame start/end, breakpoint hit, FDC events): direct trait
//!   calls on the analyzer objects.
//!
//! Analyzers own the breakpoints and subscriptions they request during
//! activation; deactivation drains both ownership tables, so a deactivated
//! analyzer leaves no state behind. A master enable flag short-circuits
//! every dispatch method when analyzers are not in use.

mod romprint;
mod trdos;

pub use romprint::RomPrintDetector;
pub use trdos::{TrdosAnalyzer, TrdosEvent, TrdosEventKind, TrdosPhase};

use std::any::Any;

use log::warn;
use rustc_hash::FxHashMap;

use crate::breakpoints::{BreakpointManager, MemAccess, BRK_INVALID};
use crate::cpu::Cpu;
use crate::memory::{Memory, PageRef};

/// Subscription handle, unique per manager.
pub type CallbackId = u64;

/// Event classes an analyzer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CpuStep,
    MemoryRead,
    MemoryWrite,
    VideoLine,
    AudioSample,
}

/// Behavioral contract every analyzer implements. Event methods default to
/// no-ops so analyzers only override what they subscribe to.
pub trait Analyzer {
    /// Stable identifier; must match the registration id.
    fn id(&self) -> &str;

    /// Called on activation. The analyzer requests its subscriptions and
    /// breakpoints through the context; everything it requests is owned by
    /// it and released on deactivation.
    fn on_activate(&mut self, ctx: &mut ActivationContext<'_>);

    fn on_deactivate(&mut self) {}

    fn on_frame_start(&mut self, _frame: u64) {}
    fn on_frame_end(&mut self, _frame: u64) {}

    /// Called only for breakpoints this analyzer owns.
    fn on_breakpoint_hit(&mut self, _address: u16, _breakpoint: u16, _cpu: &Cpu) {}

    fn on_cpu_step(&mut self, _cpu: &Cpu, _pc: u16) {}
    fn on_memory_read(&mut self, _address: u16, _value: u8) {}
    fn on_memory_write(&mut self, _address: u16, _value: u8) {}
    fn on_video_line(&mut self, _line: u16) {}
    fn on_audio_sample(&mut self, _left: i16, _right: i16) {}

    /// WD1793 observer hooks (broadcast to all active analyzers).
    fn on_fdc_command(&mut self, _command: u8) {}
    fn on_fdc_command_complete(&mut self, _command: u8) {}

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Passed to `on_activate`; collects subscription and breakpoint requests
/// so the manager can commit them with ownership tags afterwards.
pub struct ActivationContext<'a> {
    breakpoints: &'a mut BreakpointManager,
    memory: &'a Memory,
    next_callback: CallbackId,
    subscriptions: Vec<(CallbackId, EventKind)>,
    owned_breakpoints: Vec<u16>,
}

impl ActivationContext<'_> {
    fn subscribe(&mut self, kind: EventKind) -> CallbackId {
        let id = self.next_callback;
        self.next_callback += 1;
        self.subscriptions.push((id, kind));
        id
    }

    pub fn subscribe_cpu_step(&mut self) -> CallbackId {
        self.subscribe(EventKind::CpuStep)
    }

    pub fn subscribe_memory_read(&mut self) -> CallbackId {
        self.subscribe(EventKind::MemoryRead)
    }

    pub fn subscribe_memory_write(&mut self) -> CallbackId {
        self.subscribe(EventKind::MemoryWrite)
    }

    pub fn subscribe_video_line(&mut self) -> CallbackId {
        self.subscribe(EventKind::VideoLine)
    }

    pub fn subscribe_audio_sample(&mut self) -> CallbackId {
        self.subscribe(EventKind::AudioSample)
    }

    /// Request an owned execution breakpoint.
    pub fn request_execution_breakpoint(&mut self, address: u16) -> u16 {
        let id = self.breakpoints.add_execution_breakpoint(address);
        if id != BRK_INVALID {
            self.owned_breakpoints.push(id);
        }
        id
    }

    /// Request an owned execution breakpoint qualified by physical page.
    pub fn request_execution_breakpoint_in_page(
        &mut self,
        address: u16,
        page: PageRef,
        bank: u8,
    ) -> u16 {
        let id = self.breakpoints.add_execution_breakpoint_in_page(address, page, bank);
        if id != BRK_INVALID {
            self.owned_breakpoints.push(id);
        }
        id
    }

    /// Request an owned memory watchpoint.
    pub fn request_memory_breakpoint(&mut self, address: u16, on_read: bool, on_write: bool) -> u16 {
        let mut mask = MemAccess::empty();
        if on_read {
            mask |= MemAccess::READ;
        }
        if on_write {
            mask |= MemAccess::WRITE;
        }
        let id = self.breakpoints.add_combined_memory_breakpoint(address, mask);
        if id != BRK_INVALID {
            self.owned_breakpoints.push(id);
        }
        id
    }

    /// Read-only view of the memory configuration (page layout, model).
    pub fn memory(&self) -> &Memory {
        self.memory
    }
}

struct AnalyzerSlot {
    id: String,
    analyzer: Box<dyn Analyzer>,
    active: bool,
}

#[derive(Clone, Copy)]
struct Subscription {
    callback_id: CallbackId,
    slot: usize,
}

/// Routes CPU/memory/video/frame/breakpoint events to registered analyzers
/// and tracks per-analyzer resource ownership.
pub struct AnalyzerManager {
    slots: Vec<AnalyzerSlot>,
    index_by_id: FxHashMap<String, usize>,

    cpu_step_subs: Vec<Subscription>,
    memory_read_subs: Vec<Subscription>,
    memory_write_subs: Vec<Subscription>,
    video_line_subs: Vec<Subscription>,
    audio_sample_subs: Vec<Subscription>,

    breakpoint_owners: FxHashMap<u16, usize>,
    analyzer_breakpoints: FxHashMap<String, Vec<u16>>,
    subscription_owners: FxHashMap<CallbackId, usize>,
    analyzer_subscriptions: FxHashMap<String, Vec<CallbackId>>,

    enabled: bool,
    next_callback_id: CallbackId,
}

impl AnalyzerManager {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index_by_id: FxHashMap::default(),
            cpu_step_subs: Vec::new(),
            memory_read_subs: Vec::new(),
            memory_write_subs: Vec::new(),
            video_line_subs: Vec::new(),
            audio_sample_subs: Vec::new(),
            breakpoint_owners: FxHashMap::default(),
            analyzer_breakpoints: FxHashMap::default(),
            subscription_owners: FxHashMap::default(),
            analyzer_subscriptions: FxHashMap::default(),
            enabled: false,
            next_callback_id: 1,
        }
    }

    // ========== Lifecycle ==========

    /// Register an analyzer, taking ownership. A duplicate id is an
    /// internal error: logged, request dropped.
    pub fn register_analyzer(&mut self, analyzer: Box<dyn Analyzer>) {
        let id = analyzer.id().to_string();
        if self.index_by_id.contains_key(&id) {
            warn!("analyzer '{id}' already registered, ignoring");
            return;
        }
        self.index_by_id.insert(id.clone(), self.slots.len());
        self.slots.push(AnalyzerSlot { id, analyzer, active: false });
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.index_by_id.contains_key(id)
    }

    /// Unregister an analyzer, deactivating it first. Slot indices held by
    /// the remaining subscription and ownership tables are fixed up.
    pub fn unregister_analyzer(&mut self, id: &str, breakpoints: &mut BreakpointManager) -> bool {
        let Some(&index) = self.index_by_id.get(id) else {
            return false;
        };
        self.deactivate(id, breakpoints);
        self.index_by_id.remove(id);
        let last = self.slots.len() - 1;
        self.slots.swap_remove(index);
        if index != last {
            let moved_id = self.slots[index].id.clone();
            self.index_by_id.insert(moved_id, index);
            let repoint = |sub: &mut Subscription| {
                if sub.slot == last {
                    sub.slot = index;
                }
            };
            self.cpu_step_subs.iter_mut().for_each(repoint);
            self.memory_read_subs.iter_mut().for_each(repoint);
            self.memory_write_subs.iter_mut().for_each(repoint);
            self.video_line_subs.iter_mut().for_each(repoint);
            self.audio_sample_subs.iter_mut().for_each(repoint);
            for owner in self.breakpoint_owners.values_mut() {
                if *owner == last {
                    *owner = index;
                }
            }
            for owner in self.subscription_owners.values_mut() {
                if *owner == last {
                    *owner = index;
                }
            }
        }
        true
    }

    pub fn registered_analyzers(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.id.clone()).collect()
    }

    pub fn active_analyzers(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|slot| slot.active)
            .map(|slot| slot.id.clone())
            .collect()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.index_by_id
            .get(id)
            .is_some_and(|&slot| self.slots[slot].active)
    }

    /// Typed access to a registered analyzer.
    pub fn get_analyzer<T: Analyzer + 'static>(&self, id: &str) -> Option<&T> {
        let &slot = self.index_by_id.get(id)?;
        self.slots[slot].analyzer.as_any().downcast_ref::<T>()
    }

    /// Typed mutable access to a registered analyzer.
    pub fn get_analyzer_mut<T: Analyzer + 'static>(&mut self, id: &str) -> Option<&mut T> {
        let &slot = self.index_by_id.get(id)?;
        self.slots[slot].analyzer.as_any_mut().downcast_mut::<T>()
    }

    /// Activate an analyzer: run `on_activate`, commit the subscriptions
    /// and breakpoints it requested under its ownership.
    pub fn activate(&mut self, id: &str, breakpoints: &mut BreakpointManager, memory: &Memory) -> bool {
        let Some(&slot_index) = self.index_by_id.get(id) else {
            warn!("activate: unknown analyzer '{id}'");
            return false;
        };
        if self.slots[slot_index].active {
            return true;
        }

        let mut ctx = ActivationContext {
            breakpoints,
            memory,
            next_callback: self.next_callback_id,
            subscriptions: Vec::new(),
            owned_breakpoints: Vec::new(),
        };
        self.slots[slot_index].analyzer.on_activate(&mut ctx);
        self.next_callback_id = ctx.next_callback;

        let subscriptions = ctx.subscriptions;
        let owned_breakpoints = ctx.owned_breakpoints;
        for (callback_id, kind) in subscriptions {
            let sub = Subscription { callback_id, slot: slot_index };
            match kind {
                EventKind::CpuStep => self.cpu_step_subs.push(sub),
                EventKind::MemoryRead => self.memory_read_subs.push(sub),
                EventKind::MemoryWrite => self.memory_write_subs.push(sub),
                EventKind::VideoLine => self.video_line_subs.push(sub),
                EventKind::AudioSample => self.audio_sample_subs.push(sub),
            }
            self.subscription_owners.insert(callback_id, slot_index);
            self.analyzer_subscriptions
                .entry(id.to_string())
                .or_default()
                .push(callback_id);
        }
        for breakpoint_id in owned_breakpoints {
            self.breakpoint_owners.insert(breakpoint_id, slot_index);
            self.analyzer_breakpoints
                .entry(id.to_string())
                .or_default()
                .push(breakpoint_id);
        }

        self.slots[slot_index].active = true;
        true
    }

    /// Deactivate an analyzer and release everything it owns.
    pub fn deactivate(&mut self, id: &str, breakpoints: &mut BreakpointManager) -> bool {
        let Some(&slot_index) = self.index_by_id.get(id) else {
            return false;
        };
        if !self.slots[slot_index].active {
            return true;
        }

        for callback_id in self.analyzer_subscriptions.remove(id).unwrap_or_default() {
            self.subscription_owners.remove(&callback_id);
            self.remove_subscription(callback_id);
        }
        for breakpoint_id in self.analyzer_breakpoints.remove(id).unwrap_or_default() {
            self.breakpoint_owners.remove(&breakpoint_id);
            breakpoints.remove_breakpoint_by_id(breakpoint_id);
        }

        self.slots[slot_index].analyzer.on_deactivate();
        self.slots[slot_index].active = false;
        true
    }

    pub fn activate_all(&mut self, breakpoints: &mut BreakpointManager, memory: &Memory) {
        for id in self.registered_analyzers() {
            self.activate(&id, breakpoints, memory);
        }
    }

    pub fn deactivate_all(&mut self, breakpoints: &mut BreakpointManager) {
        for id in self.active_analyzers() {
            self.deactivate(&id, breakpoints);
        }
    }

    fn remove_subscription(&mut self, callback_id: CallbackId) {
        let keep = |sub: &Subscription| sub.callback_id != callback_id;
        self.cpu_step_subs.retain(keep);
        self.memory_read_subs.retain(keep);
        self.memory_write_subs.retain(keep);
        self.video_line_subs.retain(keep);
        self.audio_sample_subs.retain(keep);
    }

    /// Drop one subscription by id (normally automatic on deactivation).
    pub fn unsubscribe(&mut self, callback_id: CallbackId) {
        if let Some(slot) = self.subscription_owners.remove(&callback_id) {
            let id = self.slots[slot].id.clone();
            if let Some(owned) = self.analyzer_subscriptions.get_mut(&id) {
                owned.retain(|&entry| entry != callback_id);
            }
        }
        self.remove_subscription(callback_id);
    }

    /// Release one owned breakpoint early (normally automatic).
    pub fn release_breakpoint(&mut self, breakpoint_id: u16, breakpoints: &mut BreakpointManager) {
        if let Some(slot) = self.breakpoint_owners.remove(&breakpoint_id) {
            let id = self.slots[slot].id.clone();
            if let Some(owned) = self.analyzer_breakpoints.get_mut(&id) {
                owned.retain(|&entry| entry != breakpoint_id);
            }
        }
        breakpoints.remove_breakpoint_by_id(breakpoint_id);
    }

    /// Breakpoint ids currently owned by an analyzer (empty after
    /// deactivation).
    pub fn analyzer_breakpoints(&self, id: &str) -> &[u16] {
        self.analyzer_breakpoints
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Subscription ids currently owned by an analyzer.
    pub fn analyzer_subscriptions(&self, id: &str) -> &[CallbackId] {
        self.analyzer_subscriptions
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    // ========== Master toggle ==========

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    // ========== Dispatch ==========

    #[inline]
    pub fn dispatch_cpu_step(&mut self, cpu: &Cpu, pc: u16) {
        if !self.enabled || self.cpu_step_subs.is_empty() {
            return;
        }
        let slots = &mut self.slots;
        for sub in &self.cpu_step_subs {
            slots[sub.slot].analyzer.on_cpu_step(cpu, pc);
        }
    }

    #[inline]
    pub fn dispatch_memory_read(&mut self, address: u16, value: u8) {
        if !self.enabled || self.memory_read_subs.is_empty() {
            return;
        }
        let slots = &mut self.slots;
        for sub in &self.memory_read_subs {
            slots[sub.slot].analyzer.on_memory_read(address, value);
        }
    }

    #[inline]
    pub fn dispatch_memory_write(&mut self, address: u16, value: u8) {
        if !self.enabled || self.memory_write_subs.is_empty() {
            return;
        }
        let slots = &mut self.slots;
        for sub in &self.memory_write_subs {
            slots[sub.slot].analyzer.on_memory_write(address, value);
        }
    }

    pub fn dispatch_video_line(&mut self, line: u16) {
        if !self.enabled || self.video_line_subs.is_empty() {
            return;
        }
        let slots = &mut self.slots;
        for sub in &self.video_line_subs {
            slots[sub.slot].analyzer.on_video_line(line);
        }
    }

    pub fn dispatch_audio_sample(&mut self, left: i16, right: i16) {
        if !self.enabled || self.audio_sample_subs.is_empty() {
            return;
        }
        let slots = &mut self.slots;
        for sub in &self.audio_sample_subs {
            slots[sub.slot].analyzer.on_audio_sample(left, right);
        }
    }

    pub fn dispatch_frame_start(&mut self, frame: u64) {
        if !self.enabled {
            return;
        }
        for slot in self.slots.iter_mut().filter(|slot| slot.active) {
            slot.analyzer.on_frame_start(frame);
        }
    }

    pub fn dispatch_frame_end(&mut self, frame: u64) {
        if !self.enabled {
            return;
        }
        for slot in self.slots.iter_mut().filter(|slot| slot.active) {
            slot.analyzer.on_frame_end(frame);
        }
    }

    /// Route a breakpoint hit to the owning analyzer only.
    pub fn dispatch_breakpoint_hit(&mut self, address: u16, breakpoint_id: u16, cpu: &Cpu) {
        if !self.enabled {
            return;
        }
        if let Some(&slot) = self.breakpoint_owners.get(&breakpoint_id) {
            self.slots[slot].analyzer.on_breakpoint_hit(address, breakpoint_id, cpu);
        }
    }

    pub fn dispatch_fdc_command(&mut self, command: u8) {
        if !self.enabled {
            return;
        }
        for slot in self.slots.iter_mut().filter(|slot| slot.active) {
            slot.analyzer.on_fdc_command(command);
        }
    }

    pub fn dispatch_fdc_command_complete(&mut self, command: u8) {
        if !self.enabled {
            return;
        }
        for slot in self.slots.iter_mut().filter(|slot| slot.active) {
            slot.analyzer.on_fdc_command_complete(command);
        }
    }
}

impl Default for AnalyzerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{MachineModel, MachineTiming};

    /// Minimal analyzer counting the events it receives.
    struct CountingAnalyzer {
        id: String,
        steps: u64,
        writes: u64,
        hits: Vec<u16>,
        deactivated: bool,
    }

    impl CountingAnalyzer {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                steps: 0,
                writes: 0,
                hits: Vec::new(),
                deactivated: false,
            }
        }
    }

    impl Analyzer for CountingAnalyzer {
        fn id(&self) -> &str {
            &self.id
        }

        fn on_activate(&mut self, ctx: &mut ActivationContext<'_>) {
            ctx.subscribe_cpu_step();
            ctx.subscribe_memory_write();
            ctx.request_execution_breakpoint(0x3D03);
            ctx.request_memory_breakpoint(0x5800, false, true);
        }

        fn on_deactivate(&mut self) {
            self.deactivated = true;
        }

        fn on_cpu_step(&mut self, _cpu: &Cpu, _pc: u16) {
            self.steps += 1;
        }

        fn on_memory_write(&mut self, _address: u16, _value: u8) {
            self.writes += 1;
        }

        fn on_breakpoint_hit(&mut self, address: u16, _breakpoint: u16, _cpu: &Cpu) {
            self.hits.push(address);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn fixture() -> (AnalyzerManager, BreakpointManager, Memory) {
        let mut manager = AnalyzerManager::new();
        manager.set_enabled(true);
        manager.register_analyzer(Box::new(CountingAnalyzer::new("counter")));
        let breakpoints = BreakpointManager::new();
        let memory = Memory::new(&MachineTiming::new(MachineModel::Spectrum128));
        (manager, breakpoints, memory)
    }

    #[test]
    fn test_activation_commits_ownership() {
        let (mut manager, mut breakpoints, memory) = fixture();
        assert!(manager.activate("counter", &mut breakpoints, &memory));
        assert_eq!(breakpoints.count(), 2);
        assert_eq!(manager.analyzer_breakpoints("counter").len(), 2);
        assert_eq!(manager.analyzer_subscriptions("counter").len(), 2);
        assert!(manager.is_active("counter"));
    }

    #[test]
    fn test_deactivation_releases_everything() {
        let (mut manager, mut breakpoints, memory) = fixture();
        manager.activate("counter", &mut breakpoints, &memory);
        let count_before = breakpoints.count();
        assert!(manager.deactivate("counter", &mut breakpoints));
        assert_eq!(breakpoints.count(), count_before - 2);
        assert!(manager.analyzer_breakpoints("counter").is_empty());
        assert!(manager.analyzer_subscriptions("counter").is_empty());
        let analyzer = manager.get_analyzer::<CountingAnalyzer>("counter").unwrap();
        assert!(analyzer.deactivated);
    }

    #[test]
    fn test_dispatch_reaches_subscribers() {
        let (mut manager, mut breakpoints, memory) = fixture();
        manager.activate("counter", &mut breakpoints, &memory);
        let cpu = Cpu::new();
        manager.dispatch_cpu_step(&cpu, 0x8000);
        manager.dispatch_memory_write(0x4000, 0xFF);
        manager.dispatch_memory_read(0x4000, 0xFF); // not subscribed
        let analyzer = manager.get_analyzer::<CountingAnalyzer>("counter").unwrap();
        assert_eq!(analyzer.steps, 1);
        assert_eq!(analyzer.writes, 1);
    }

    #[test]
    fn test_master_toggle_short_circuits() {
        let (mut manager, mut breakpoints, memory) = fixture();
        manager.activate("counter", &mut breakpoints, &memory);
        manager.set_enabled(false);
        let cpu = Cpu::new();
        manager.dispatch_cpu_step(&cpu, 0x8000);
        let analyzer = manager.get_analyzer::<CountingAnalyzer>("counter").unwrap();
        assert_eq!(analyzer.steps, 0);
    }

    #[test]
    fn test_breakpoint_hit_routed_to_owner_only() {
        let (mut manager, mut breakpoints, memory) = fixture();
        manager.register_analyzer(Box::new(CountingAnalyzer::new("other")));
        manager.activate("counter", &mut breakpoints, &memory);
        manager.activate("other", &mut breakpoints, &memory);

        let owned = manager.analyzer_breakpoints("counter")[0];
        let cpu = Cpu::new();
        manager.dispatch_breakpoint_hit(0x3D03, owned, &cpu);

        assert_eq!(
            manager.get_analyzer::<CountingAnalyzer>("counter").unwrap().hits,
            vec![0x3D03]
        );
        assert!(manager.get_analyzer::<CountingAnalyzer>("other").unwrap().hits.is_empty());
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let (mut manager, _, _) = fixture();
        manager.register_analyzer(Box::new(CountingAnalyzer::new("counter")));
        assert_eq!(manager.registered_analyzers().len(), 1);
    }

    #[test]
    fn test_unregister_fixes_slot_indices() {
        let (mut manager, mut breakpoints, memory) = fixture();
        manager.register_analyzer(Box::new(CountingAnalyzer::new("other")));
        manager.activate("counter", &mut breakpoints, &memory);
        manager.activate("other", &mut breakpoints, &memory);

        assert!(manager.unregister_analyzer("counter", &mut breakpoints));
        assert!(!manager.is_registered("counter"));
        // "counter" released its breakpoints; "other" keeps its own
        assert_eq!(breakpoints.count(), 2);

        // The surviving analyzer still receives its events after the swap
        let cpu = Cpu::new();
        manager.dispatch_cpu_step(&cpu, 0x1234);
        assert_eq!(manager.get_analyzer::<CountingAnalyzer>("other").unwrap().steps, 1);

        let owned = manager.analyzer_breakpoints("other")[0];
        manager.dispatch_breakpoint_hit(0x3D03, owned, &cpu);
        assert_eq!(manager.get_analyzer::<CountingAnalyzer>("other").unwrap().hits.len(), 1);

        assert!(!manager.unregister_analyzer("counter", &mut breakpoints));
    }

    #[test]
    fn test_reactivation_after_deactivation() {
        let (mut manager, mut breakpoints, memory) = fixture();
        manager.activate("counter", &mut breakpoints, &memory);
        manager.deactivate("counter", &mut breakpoints);
        assert!(manager.activate("counter", &mut breakpoints, &memory));
        assert_eq!(breakpoints.count(), 2);
        assert_eq!(manager.analyzer_breakpoints("counter").len(), 2);
    }
}
