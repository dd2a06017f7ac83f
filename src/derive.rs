//! Derived features computed from raw inputs.
//!
//! The trained model was fit on two engineered columns that callers are
//! not expected to send:
//!
//! - `Age = max(0, current_year - Year)`
//! - `Mileage_log = ln(1 + max(0, Mileage))`
//!
//! A rule only fires when its source is present and numeric and its target
//! was not supplied. Caller-supplied targets are never overwritten, even
//! when they disagree with the derivation.
//!
//! `current_year` comes from a [`Clock`] evaluated per request, so identical
//! inputs can produce different ages across a year boundary.

use chrono::Datelike;
use log::{debug, warn};

use crate::input::RawInput;
use crate::value::FeatureValue;

// =============================================================================
// Clock
// =============================================================================

/// Source of the current calendar year.
pub trait Clock: Send + Sync {
    fn current_year(&self) -> i32;
}

/// Wall-clock year in local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn current_year(&self) -> i32 {
        chrono::Local::now().year()
    }
}

/// Pinned year, for tests and reproducible scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i32);

impl Clock for FixedClock {
    fn current_year(&self) -> i32 {
        self.0
    }
}

// =============================================================================
// Rules
// =============================================================================

/// A single derivation from one source column to one target column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivationRule {
    /// `target = max(0, current_year - source)`
    AgeFromYear { source: String, target: String },
    /// `target = ln(1 + max(0, source))`
    LogOnePlus { source: String, target: String },
}

/// What a rule did for one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Derived,
    /// Target supplied by the caller; left untouched.
    TargetSupplied,
    /// Source absent or missing; nothing to derive from.
    SourceAbsent,
    /// Source present but not numeric; skipped.
    SourceNotNumeric,
}

impl DerivationRule {
    pub fn age_from_year(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::AgeFromYear {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn log_one_plus(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::LogOnePlus {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Self::AgeFromYear { source, .. } | Self::LogOnePlus { source, .. } => source,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Self::AgeFromYear { target, .. } | Self::LogOnePlus { target, .. } => target,
        }
    }

    /// Apply the rule to `input` in place.
    pub fn apply(&self, input: &mut RawInput, clock: &dyn Clock) -> RuleOutcome {
        if input.is_supplied(self.target()) {
            return RuleOutcome::TargetSupplied;
        }
        let source = match input.supplied(self.source()) {
            Some(value) => value,
            None => return RuleOutcome::SourceAbsent,
        };
        let Some(x) = source.as_f64() else {
            warn!(
                "cannot derive '{}': source '{}' is {} ({source})",
                self.target(),
                self.source(),
                source.kind_label()
            );
            return RuleOutcome::SourceNotNumeric;
        };

        let derived = match self {
            Self::AgeFromYear { .. } => (f64::from(clock.current_year()) - x).max(0.0),
            Self::LogOnePlus { .. } => x.max(0.0).ln_1p(),
        };
        debug!("derived {} = {derived} from {} = {x}", self.target(), self.source());
        input.insert(self.target(), FeatureValue::float(derived));
        RuleOutcome::Derived
    }
}

// =============================================================================
// FeatureDeriver
// =============================================================================

/// Applies a fixed rule set in order.
pub struct FeatureDeriver {
    rules: Vec<DerivationRule>,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for FeatureDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureDeriver")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl FeatureDeriver {
    pub fn new(rules: Vec<DerivationRule>) -> Self {
        Self {
            rules,
            clock: Box::new(SystemClock),
        }
    }

    /// The rules the car-price model was trained with.
    pub fn standard() -> Self {
        Self::new(standard_rules())
    }

    /// No derivations.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn rules(&self) -> &[DerivationRule] {
        &self.rules
    }

    /// Augment `input` in place and report each rule's outcome.
    pub fn derive(&self, input: &mut RawInput) -> Vec<RuleOutcome> {
        self.rules
            .iter()
            .map(|rule| rule.apply(input, self.clock.as_ref()))
            .collect()
    }
}

impl Default for FeatureDeriver {
    fn default() -> Self {
        Self::standard()
    }
}

/// `Year → Age` and `Mileage → Mileage_log`.
pub fn standard_rules() -> Vec<DerivationRule> {
    vec![
        DerivationRule::age_from_year("Year", "Age"),
        DerivationRule::log_one_plus("Mileage", "Mileage_log"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn input(entries: &[(&str, FeatureValue)]) -> RawInput {
        entries.iter().cloned().collect()
    }

    fn deriver() -> FeatureDeriver {
        FeatureDeriver::standard().with_clock(FixedClock(2024))
    }

    #[rstest]
    #[case(2018, 6)]
    #[case(2024, 0)]
    #[case(2030, 0)]
    #[case(1990, 34)]
    fn age_is_clamped_at_zero(#[case] year: i64, #[case] age: i64) {
        let mut raw = input(&[("Year", FeatureValue::int(year))]);
        deriver().derive(&mut raw);
        assert_eq!(raw.get("Age"), Some(&FeatureValue::int(age)));
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(-500.0, 0.0)]
    #[case(60000.0, 60001f64.ln())]
    fn log_mileage(#[case] mileage: f64, #[case] expected: f64) {
        let mut raw = input(&[("Mileage", FeatureValue::float(mileage))]);
        deriver().derive(&mut raw);
        let got = raw.get("Mileage_log").and_then(FeatureValue::as_f64).unwrap();
        assert_abs_diff_eq!(got, expected, epsilon = 1e-12);
    }

    #[test]
    fn supplied_targets_are_untouched() {
        let mut raw = input(&[
            ("Year", FeatureValue::int(2018)),
            ("Age", FeatureValue::int(99)),
            ("Mileage", FeatureValue::int(1000)),
            ("Mileage_log", FeatureValue::float(1.5)),
        ]);
        let outcomes = deriver().derive(&mut raw);
        assert_eq!(
            outcomes,
            vec![RuleOutcome::TargetSupplied, RuleOutcome::TargetSupplied]
        );
        assert_eq!(raw.get("Age"), Some(&FeatureValue::int(99)));
        assert_eq!(raw.get("Mileage_log"), Some(&FeatureValue::float(1.5)));
    }

    #[test]
    fn missing_target_is_derived() {
        let mut raw = input(&[("Year", FeatureValue::int(2020)), ("Age", FeatureValue::Missing)]);
        deriver().derive(&mut raw);
        assert_eq!(raw.get("Age"), Some(&FeatureValue::int(4)));
    }

    #[test]
    fn absent_and_non_numeric_sources_are_skipped() {
        let mut raw = input(&[
            ("Year", FeatureValue::categorical("last year")),
            ("Brand", FeatureValue::categorical("Ford")),
        ]);
        let outcomes = deriver().derive(&mut raw);
        assert_eq!(
            outcomes,
            vec![RuleOutcome::SourceNotNumeric, RuleOutcome::SourceAbsent]
        );
        assert!(raw.get("Age").is_none());
        assert!(raw.get("Mileage_log").is_none());
        assert_eq!(raw.len(), 2);
    }

    #[test]
    fn empty_rule_set_is_identity() {
        let mut raw = input(&[("Year", FeatureValue::int(2018))]);
        let before = raw.clone();
        FeatureDeriver::none().derive(&mut raw);
        assert_eq!(raw, before);
    }

    #[test]
    fn fractional_year_gives_fractional_age() {
        let mut raw = input(&[("Year", FeatureValue::float(2018.5))]);
        deriver().derive(&mut raw);
        assert_eq!(raw.get("Age"), Some(&FeatureValue::float(5.5)));
    }
}
