use std::fmt::{Display, Formatter};

use log::warn;
use thiserror::Error;

use super::{compare_versions, is_snapshot};

/// A parsed version constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSpec {
    /// A plain version, matched by string equality.
    Soft(String),
    /// A union of ranges. `[1.0]` is the exact range of `1.0`.
    Range(Vec<VersionRange>),
    Dynamic(DynamicVersion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicVersion {
    /// Any version, snapshots included.
    Latest,
    /// Any non-snapshot version.
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub lower: Option<String>,
    pub lower_inclusive: bool,
    pub upper: Option<String>,
    pub upper_inclusive: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeSyntaxError {
    #[error("Expected `[` or `(` at offset {1} of version range `{0}`")]
    MissingOpeningBracket(String, usize),
    #[error("Exact version `{0}` must be enclosed in `[` and `]`")]
    ExclusiveExactVersion(String),
    #[error("Version range `{0}` has more than two bounds")]
    TooManyBounds(String),
    #[error("Version range `{0}` has a lower bound above its upper bound")]
    InvertedBounds(String),
}

impl VersionRange {
    pub fn matches(&self, version: &str) -> bool {
        let above_lower = self.lower.as_deref().map_or(true, |lower| {
            let ordering = compare_versions(version, lower);
            ordering.is_gt() || (self.lower_inclusive && ordering.is_eq())
        });
        let below_upper = self.upper.as_deref().map_or(true, |upper| {
            let ordering = compare_versions(version, upper);
            ordering.is_lt() || (self.upper_inclusive && ordering.is_eq())
        });
        above_lower && below_upper
    }

    fn parse(text: &str, lower_inclusive: bool, upper_inclusive: bool) -> Result<Self, RangeSyntaxError> {
        let bound = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_owned())
        };
        let parts = text.split(',').collect::<Vec<_>>();
        match parts.as_slice() {
            [exact] => {
                if !lower_inclusive || !upper_inclusive {
                    return Err(RangeSyntaxError::ExclusiveExactVersion(text.to_owned()));
                }
                let exact = bound(exact);
                Ok(Self {
                    lower: exact.clone(),
                    lower_inclusive: true,
                    upper: exact,
                    upper_inclusive: true,
                })
            }
            [lower, upper] => {
                let range = Self {
                    lower: bound(lower),
                    lower_inclusive,
                    upper: bound(upper),
                    upper_inclusive,
                };
                if let (Some(lower), Some(upper)) = (&range.lower, &range.upper) {
                    if compare_versions(lower, upper).is_gt() {
                        return Err(RangeSyntaxError::InvertedBounds(text.to_owned()));
                    }
                }
                Ok(range)
            }
            _ => Err(RangeSyntaxError::TooManyBounds(text.to_owned())),
        }
    }
}

impl VersionSpec {
    /// Parses a requested version, logging malformed range parts.
    pub fn parse(requested: &str) -> VersionSpec {
        Self::parse_with(requested, |error| warn!("{}", error))
    }

    /// Parses a requested version. Malformed range parts are reported to `on_error` and
    /// left out of the union.
    pub fn parse_with(requested: &str, mut on_error: impl FnMut(RangeSyntaxError)) -> VersionSpec {
        let requested = requested.trim();
        match requested {
            "LATEST" => return VersionSpec::Dynamic(DynamicVersion::Latest),
            "RELEASE" => return VersionSpec::Dynamic(DynamicVersion::Release),
            _ => {}
        }
        if !requested.contains(['[', '(']) {
            return VersionSpec::Soft(requested.to_owned());
        }

        let mut text = requested.to_owned();
        if !text.ends_with([']', ')']) {
            text.push(']');
        }

        let mut ranges = Vec::new();
        let mut rest = text.as_str();
        while !rest.is_empty() {
            let trimmed = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
            if trimmed.is_empty() {
                break;
            }
            let offset = text.len() - trimmed.len();
            let lower_inclusive = match trimmed.chars().next() {
                Some('[') => true,
                Some('(') => false,
                _ => {
                    on_error(RangeSyntaxError::MissingOpeningBracket(text.clone(), offset));
                    match trimmed.find(['[', '(']) {
                        Some(next) => {
                            rest = &trimmed[next..];
                            continue;
                        }
                        None => break,
                    }
                }
            };
            let Some(close) = trimmed.find([']', ')']) else {
                break;
            };
            let upper_inclusive = trimmed[close..].starts_with(']');
            match VersionRange::parse(&trimmed[1..close], lower_inclusive, upper_inclusive) {
                Ok(range) => ranges.push(range),
                Err(error) => on_error(error),
            }
            rest = &trimmed[close + 1..];
        }
        VersionSpec::Range(ranges)
    }

    /// Ranges and dynamic versions need the list of available versions to be decided.
    pub fn is_hard(&self) -> bool {
        !matches!(self, VersionSpec::Soft(_))
    }

    pub fn matches(&self, version: &str) -> bool {
        match self {
            VersionSpec::Soft(soft) => soft == version,
            VersionSpec::Range(ranges) => ranges.iter().any(|range| range.matches(version)),
            VersionSpec::Dynamic(DynamicVersion::Latest) => true,
            VersionSpec::Dynamic(DynamicVersion::Release) => !is_snapshot(version),
        }
    }

    /// Highest available version satisfying this spec.
    pub fn select<'a>(&self, available: impl IntoIterator<Item = &'a String>) -> Option<String> {
        available
            .into_iter()
            .filter(|version| self.matches(version))
            .max_by(|a, b| compare_versions(a, b))
            .cloned()
    }
}

impl Display for VersionSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionSpec::Soft(version) => f.write_str(version),
            VersionSpec::Dynamic(DynamicVersion::Latest) => f.write_str("LATEST"),
            VersionSpec::Dynamic(DynamicVersion::Release) => f.write_str("RELEASE"),
            VersionSpec::Range(ranges) => {
                for (index, range) in ranges.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    let exact = range.lower.is_some() && range.lower == range.upper;
                    f.write_str(if range.lower_inclusive { "[" } else { "(" })?;
                    if exact {
                        f.write_str(range.lower.as_deref().unwrap_or_default())?;
                    } else {
                        write!(
                            f,
                            "{},{}",
                            range.lower.as_deref().unwrap_or_default(),
                            range.upper.as_deref().unwrap_or_default()
                        )?;
                    }
                    f.write_str(if range.upper_inclusive { "]" } else { ")" })?;
                }
                Ok(())
            }
        }
    }
}
