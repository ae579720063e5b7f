//! Sentinel markers used in Local Climatological Data exports
//!
//! LCD cells carry either a number or one of a handful of single-character
//! flags. Every cell is mapped onto `Option<f64>`: a finite value or missing.

/// Value substituted for a trace amount ("T"), too small to measure
pub const TRACE_AMOUNT: f64 = 0.0025;

/// Recognized non-numeric cell markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// "T": trace precipitation or snow depth
    Trace,
    /// "s": suspect value
    Suspect,
    /// "M": missing value
    Missing,
    /// "*" or blank: amount included in a following measurement / unreported
    Unreported,
}

impl Sentinel {
    /// Match a trimmed cell against the marker vocabulary
    pub fn from_marker(raw: &str) -> Option<Self> {
        match raw {
            "T" => Some(Sentinel::Trace),
            "s" => Some(Sentinel::Suspect),
            "M" => Some(Sentinel::Missing),
            "*" | "" => Some(Sentinel::Unreported),
            _ => None,
        }
    }

    /// Numeric meaning of the marker
    pub fn value(self) -> Option<f64> {
        match self {
            Sentinel::Trace => Some(TRACE_AMOUNT),
            Sentinel::Suspect | Sentinel::Missing | Sentinel::Unreported => None,
        }
    }
}

/// Normalize one raw cell to a finite float or missing.
///
/// Never fails: anything that is neither a marker nor a finite number
/// becomes `None`.
pub fn normalize_cell(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    match Sentinel::from_marker(raw) {
        Some(sentinel) => sentinel.value(),
        None => raw.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

/// Normalize a whole column of raw cells.
pub fn normalize_column<S: AsRef<str>>(raw: &[S]) -> Vec<Option<f64>> {
    raw.iter().map(|cell| normalize_cell(cell.as_ref())).collect()
}
