//! Named feature toggles
//!
//! The scheduler consults the feature manager once per frame boundary to
//! decide which memory interface to run the next frame with and which
//! instrumentation caches to enable. Features are never consulted from hot
//! paths; the per-frame consultation copies their state into flat caches.

/// Features the core consults on frame boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Debug-instrumented memory interface (breakpoints, tracking hooks)
    DebugMode,
    /// Per-bank/per-page access counting
    MemoryTracking,
    /// Control-flow trace capture
    CallTrace,
    /// Per-opcode histograms and recent trace
    OpcodeProfiler,
    /// Analyzer event dispatch
    Analyzers,
}

/// All features, in presentation order.
pub const ALL_FEATURES: [Feature; 5] = [
    Feature::DebugMode,
    Feature::MemoryTracking,
    Feature::CallTrace,
    Feature::OpcodeProfiler,
    Feature::Analyzers,
];

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DebugMode => "debugmode",
            Self::MemoryTracking => "memorytracking",
            Self::CallTrace => "calltrace",
            Self::OpcodeProfiler => "opcodeprofiler",
            Self::Analyzers => "analyzers",
        }
    }

    /// Parse a feature name as the settings surface accepts it.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "debugmode" => Some(Self::DebugMode),
            "memorytracking" => Some(Self::MemoryTracking),
            "calltrace" => Some(Self::CallTrace),
            "opcodeprofiler" => Some(Self::OpcodeProfiler),
            "analyzers" => Some(Self::Analyzers),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct FeatureEntry {
    enabled: bool,
    mode: Option<String>,
}

/// Registry of named feature toggles with optional mode strings.
#[derive(Debug, Clone, Default)]
pub struct FeatureManager {
    entries: [FeatureEntry; ALL_FEATURES.len()],
}

impl FeatureManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(feature: Feature) -> usize {
        ALL_FEATURES
            .iter()
            .position(|&f| f == feature)
            .unwrap_or_default()
    }

    #[inline]
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.entries[Self::index(feature)].enabled
    }

    pub fn set_enabled(&mut self, feature: Feature, enabled: bool) {
        self.entries[Self::index(feature)].enabled = enabled;
    }

    /// Toggle a feature by name. Returns false for an unknown name,
    /// leaving all state untouched.
    pub fn set_by_name(&mut self, name: &str, enabled: bool) -> bool {
        match Feature::from_name(name) {
            Some(feature) => {
                self.set_enabled(feature, enabled);
                true
            }
            None => false,
        }
    }

    pub fn mode(&self, feature: Feature) -> Option<&str> {
        self.entries[Self::index(feature)].mode.as_deref()
    }

    pub fn set_mode(&mut self, feature: Feature, mode: &str) {
        self.entries[Self::index(feature)].mode = Some(mode.to_string());
    }

    /// One feature per line: `<name> on|off [mode]`.
    pub fn list(&self) -> String {
        ALL_FEATURES
            .iter()
            .map(|&feature| {
                let entry = &self.entries[Self::index(feature)];
                let state = if entry.enabled { "on" } else { "off" };
                match &entry.mode {
                    Some(mode) => format!("{} {state} {mode}", feature.name()),
                    None => format!("{} {state}", feature.name()),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_off() {
        let features = FeatureManager::new();
        for feature in ALL_FEATURES {
            assert!(!features.is_enabled(feature));
        }
    }

    #[test]
    fn test_set_by_name() {
        let mut features = FeatureManager::new();
        assert!(features.set_by_name("debugmode", true));
        assert!(features.is_enabled(Feature::DebugMode));
        assert!(features.set_by_name("DEBUGMODE", false));
        assert!(!features.is_enabled(Feature::DebugMode));
        assert!(!features.set_by_name("warpdrive", true));
    }

    #[test]
    fn test_modes() {
        let mut features = FeatureManager::new();
        assert_eq!(features.mode(Feature::CallTrace), None);
        features.set_mode(Feature::CallTrace, "hot-only");
        assert_eq!(features.mode(Feature::CallTrace), Some("hot-only"));
    }

    #[test]
    fn test_list_format() {
        let mut features = FeatureManager::new();
        features.set_enabled(Feature::DebugMode, true);
        let listing = features.list();
        assert!(listing.contains("debugmode on"));
        assert!(listing.contains("analyzers off"));
    }
}
