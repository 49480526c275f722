use serde::{Deserialize, Serialize};

/// Largest group threshold that decodes safely in every supported engine.
///
/// Limited by the free stack at evaluation time, whose layout is not stable,
/// so the value is measured rather than derived. The lowest recorded safe
/// value is 1844 (Android Browser 4.2.2 on an Intel Atom emulator).
pub const MAX_GROUP_THRESHOLD: usize = 1800;

/// Configuration for output assembly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Maximum number of solutions joined in one flat `+` chain
    pub group_threshold: usize,

    /// Maximum nesting of parenthesized groups in the output
    pub max_group_depth: u32,

    /// Search for shorter group boundaries (slower)
    pub optimize: bool,

    /// Number of split points tried on each side of the midpoint when optimizing
    pub optimize_window: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            group_threshold: MAX_GROUP_THRESHOLD,
            max_group_depth: 16,
            optimize: false,
            optimize_window: 8,
        }
    }
}

impl EncoderConfig {
    /// Create config favouring the shortest output
    pub fn compact() -> Self {
        Self {
            optimize: true,
            optimize_window: 32,
            ..Default::default()
        }
    }

    /// Create config favouring encoding speed
    pub fn fast() -> Self {
        Self {
            optimize: false,
            ..Default::default()
        }
    }

    /// Maximum number of solutions a buffer accepts
    pub fn capacity(&self) -> usize {
        let groups = 1usize
            .checked_shl(self.max_group_depth)
            .unwrap_or(usize::MAX);
        self.group_threshold.saturating_mul(groups)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.group_threshold < 2 {
            return Err(format!(
                "group_threshold ({}) must be at least 2",
                self.group_threshold
            ));
        }

        if self.group_threshold > MAX_GROUP_THRESHOLD {
            return Err(format!(
                "group_threshold ({}) cannot exceed {MAX_GROUP_THRESHOLD}",
                self.group_threshold
            ));
        }

        if self.max_group_depth > 32 {
            return Err(format!(
                "max_group_depth ({}) cannot exceed 32",
                self.max_group_depth
            ));
        }

        Ok(())
    }
}
