//! Field-selection control strings.
//!
//! A reader narrows future snapshots by writing a comma-separated list of
//! selectors to the control path:
//!
//! ```text
//! vmstats.state[0],vmstats.state[1],events.count[4]
//! ```
//!
//! No filter means "all fields". The provider accepts at most
//! [`MAX_SELECTORS`] selectors on a line of at most [`MAX_LINE_LEN`] bytes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Simultaneous selectors accepted by the provider.
pub const MAX_SELECTORS: usize = 16;
/// Longest control line accepted by the provider.
pub const MAX_LINE_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// An empty filter cannot be applied; omit it to read all fields.
    Empty,
    TooManySelectors { count: usize, max: usize },
    SelectorTooLong { len: usize, max: usize },
    InvalidSelector { selector: String, reason: &'static str },
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Empty => write!(f, "filter has no selectors"),
            FilterError::TooManySelectors { count, max } => {
                write!(f, "{} selectors requested, provider accepts {}", count, max)
            }
            FilterError::SelectorTooLong { len, max } => write!(
                f,
                "filter line is {} bytes, control interface accepts {}",
                len, max
            ),
            FilterError::InvalidSelector { selector, reason } => {
                write!(f, "invalid selector '{}': {}", selector, reason)
            }
        }
    }
}

impl std::error::Error for FilterError {}

/// Provider-declared bounds on a filter line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterLimits {
    pub max_selectors: usize,
    pub max_line_len: usize,
}

impl Default for FilterLimits {
    fn default() -> Self {
        Self {
            max_selectors: MAX_SELECTORS,
            max_line_len: MAX_LINE_LEN,
        }
    }
}

/// One `category.field[index]` term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
    pub category: String,
    pub field: String,
    pub index: u32,
}

impl Selector {
    pub fn new(category: impl Into<String>, field: impl Into<String>, index: u32) -> Self {
        Self {
            category: category.into(),
            field: field.into(),
            index,
        }
    }

    fn validate(&self) -> Result<(), FilterError> {
        for (part, what) in [
            (&self.category, "category must be [A-Za-z0-9_]+"),
            (&self.field, "field must be [A-Za-z0-9_]+"),
        ] {
            if !is_identifier(part) {
                return Err(FilterError::InvalidSelector {
                    selector: self.to_string(),
                    reason: what,
                });
            }
        }
        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}[{}]", self.category, self.field, self.index)
    }
}

impl FromStr for Selector {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: &'static str| FilterError::InvalidSelector {
            selector: s.to_string(),
            reason,
        };

        let (category, rest) = s.split_once('.').ok_or_else(|| invalid("missing '.'"))?;
        let rest = rest
            .strip_suffix(']')
            .ok_or_else(|| invalid("missing closing ']'"))?;
        let (field, index) = rest.split_once('[').ok_or_else(|| invalid("missing '['"))?;
        let index = index
            .parse::<u32>()
            .map_err(|_| invalid("index must be a non-negative integer"))?;

        let selector = Selector::new(category, field, index);
        selector.validate()?;
        Ok(selector)
    }
}

/// Builds the control line for `selectors` under the default limits.
pub fn build_filter(selectors: &[Selector]) -> Result<String, FilterError> {
    build_filter_with(selectors, FilterLimits::default())
}

/// Builds the control line for `selectors` under explicit limits.
pub fn build_filter_with(
    selectors: &[Selector],
    limits: FilterLimits,
) -> Result<String, FilterError> {
    if selectors.is_empty() {
        return Err(FilterError::Empty);
    }
    if selectors.len() > limits.max_selectors {
        return Err(FilterError::TooManySelectors {
            count: selectors.len(),
            max: limits.max_selectors,
        });
    }
    for selector in selectors {
        selector.validate()?;
    }

    let line = selectors
        .iter()
        .map(Selector::to_string)
        .collect::<Vec<_>>()
        .join(",");
    if line.len() > limits.max_line_len {
        return Err(FilterError::SelectorTooLong {
            len: line.len(),
            max: limits.max_line_len,
        });
    }
    Ok(line)
}

/// Ordered set of selectors; empty means "all fields".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    selectors: Vec<Selector>,
}

impl FilterSpec {
    pub fn new(selectors: Vec<Selector>) -> Self {
        Self { selectors }
    }

    /// No narrowing.
    pub fn all() -> Self {
        Self::default()
    }

    /// `category.field[0]` through `category.field[count - 1]`.
    pub fn state_range(category: &str, field: &str, count: u32) -> Self {
        (0..count).map(|i| Selector::new(category, field, i)).collect()
    }

    /// Parses a control line back into selectors. An empty line is [`FilterSpec::all`].
    pub fn parse(line: &str) -> Result<Self, FilterError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::all());
        }
        line.split(',').map(str::parse::<Selector>).collect()
    }

    pub fn is_all(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Renders the control line; fails for [`FilterSpec::all`].
    pub fn to_control_line(&self, limits: FilterLimits) -> Result<String, FilterError> {
        build_filter_with(&self.selectors, limits)
    }
}

impl FromIterator<Selector> for FilterSpec {
    fn from_iter<I: IntoIterator<Item = Selector>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_display() {
        assert_eq!(
            Selector::new("vmstats", "state", 3).to_string(),
            "vmstats.state[3]"
        );
    }

    #[test]
    fn test_sixteen_selectors_succeed() {
        let spec = FilterSpec::state_range("vmstats", "state", 16);
        let line = build_filter(spec.selectors()).unwrap();
        assert_eq!(line.split(',').count(), 16);
        assert!(line.starts_with("vmstats.state[0],vmstats.state[1],"));
        assert!(line.ends_with(",vmstats.state[15]"));
    }

    #[test]
    fn test_fewer_selectors_preserve_count() {
        for n in 1..=16 {
            let spec = FilterSpec::state_range("vmstats", "state", n);
            let line = build_filter(spec.selectors()).unwrap();
            assert_eq!(line.split(',').count(), n as usize);
        }
    }

    #[test]
    fn test_seventeen_selectors_rejected() {
        let spec = FilterSpec::state_range("vmstats", "state", 17);
        assert_eq!(
            build_filter(spec.selectors()),
            Err(FilterError::TooManySelectors { count: 17, max: 16 })
        );
    }

    #[test]
    fn test_empty_filter_rejected() {
        assert_eq!(build_filter(&[]), Err(FilterError::Empty));
        assert_eq!(
            FilterSpec::all().to_control_line(FilterLimits::default()),
            Err(FilterError::Empty)
        );
    }

    #[test]
    fn test_line_length_limit() {
        let long = Selector::new("c".repeat(600), "f".repeat(600), 0);
        assert_eq!(
            build_filter(&[long]),
            Err(FilterError::SelectorTooLong {
                len: 1204,
                max: 1024
            })
        );

        let limits = FilterLimits {
            max_selectors: 16,
            max_line_len: 20,
        };
        let spec = FilterSpec::state_range("vmstats", "state", 2);
        assert!(matches!(
            spec.to_control_line(limits),
            Err(FilterError::SelectorTooLong { len: 33, max: 20 })
        ));
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let bad = Selector::new("vm stats", "state", 0);
        assert!(matches!(
            build_filter(&[bad]),
            Err(FilterError::InvalidSelector { .. })
        ));
        let bad = Selector::new("vmstats", "", 0);
        assert!(matches!(
            build_filter(&[bad]),
            Err(FilterError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_parse_selector() {
        let sel: Selector = " numa.active_anon[2] ".parse().unwrap();
        assert_eq!(sel, Selector::new("numa", "active_anon", 2));

        for bad in ["vmstats", "vmstats.state", "vmstats.state[x]", "vmstats.state[-1]", ".state[1]"] {
            assert!(bad.parse::<Selector>().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_parse_control_line_roundtrip() {
        let spec = FilterSpec::new(vec![
            Selector::new("vmstats", "state", 0),
            Selector::new("vmstats", "events", 7),
            Selector::new("numa", "state", 1),
        ]);
        let line = spec.to_control_line(FilterLimits::default()).unwrap();
        assert_eq!(FilterSpec::parse(&line).unwrap(), spec);
        assert!(FilterSpec::parse("  ").unwrap().is_all());
        assert!(FilterSpec::parse("vmstats.state[0],,numa.state[1]").is_err());
    }
}
