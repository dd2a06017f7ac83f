//! Split conditions.

/// Split condition for a decision node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitCondition {
    /// Encoded column to split on
    pub feature_index: u32,
    /// Go left if value < threshold
    pub threshold: f32,
    /// Direction for NaN (true = left)
    pub default_left: bool,
}

impl SplitCondition {
    pub fn new(feature_index: u32, threshold: f32, default_left: bool) -> Self {
        Self {
            feature_index,
            threshold,
            default_left,
        }
    }

    /// Returns true for left, false for right.
    #[inline]
    pub fn go_left(&self, feature_value: f32) -> bool {
        if feature_value.is_nan() {
            self.default_left
        } else {
            feature_value < self.threshold
        }
    }
}
