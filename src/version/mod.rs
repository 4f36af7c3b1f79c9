//! Maven version ordering and version requirements.

use std::cmp::Ordering;

mod requirement;
mod spec;

pub use requirement::{ResolutionStrategy, VersionRequirement};
pub use spec::{DynamicVersion, RangeSyntaxError, VersionRange, VersionSpec};

/// Compares two Maven version strings.
///
/// Numeric items compare numerically, qualifiers order as
/// `alpha < beta < milestone < rc < snapshot < (release) < sp` with unknown qualifiers
/// after all known ones, and trailing zero items are insignificant.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    ComparableVersion::parse(a).cmp(&ComparableVersion::parse(b))
}

pub fn is_snapshot(version: &str) -> bool {
    version.ends_with("-SNAPSHOT")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparableVersion {
    items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    /// Digits without leading zeros.
    Int(String),
    /// Qualifier with aliases applied. Release qualifiers are empty.
    Str(String),
    List(Vec<Item>),
}

const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];

impl Item {
    fn int(digits: &str) -> Item {
        let trimmed = digits.trim_start_matches('0');
        Item::Int(if trimmed.is_empty() { "0" } else { trimmed }.to_owned())
    }

    fn string(value: &str, followed_by_digit: bool) -> Item {
        let value = match value {
            "a" if followed_by_digit => "alpha",
            "b" if followed_by_digit => "beta",
            "m" if followed_by_digit => "milestone",
            "ga" | "final" | "release" => "",
            "cr" => "rc",
            other => other,
        };
        Item::Str(value.to_owned())
    }

    fn parse(value: &str, is_digit: bool) -> Item {
        if is_digit {
            Item::int(value)
        } else {
            Item::string(value, false)
        }
    }

    fn is_null(&self) -> bool {
        match self {
            Item::Int(digits) => digits == "0",
            Item::Str(qualifier) => qualifier.is_empty(),
            Item::List(items) => items.is_empty(),
        }
    }

    /// Compares against another item, `None` standing for a missing item.
    fn compare(&self, other: Option<&Item>) -> Ordering {
        match (self, other) {
            (Item::Int(_), None) => {
                if self.is_null() {
                    Ordering::Equal
                } else {
                    Ordering::Greater
                }
            }
            (Item::Str(qualifier), None) => compare_qualifiers(qualifier, ""),
            (Item::List(items), None) => items
                .first()
                .map_or(Ordering::Equal, |first| first.compare(None)),
            (Item::Int(a), Some(Item::Int(b))) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Item::Int(_), Some(_)) => Ordering::Greater,
            (Item::Str(_), Some(Item::Int(_))) => Ordering::Less,
            (Item::Str(a), Some(Item::Str(b))) => compare_qualifiers(a, b),
            (Item::Str(_), Some(Item::List(_))) => Ordering::Less,
            (Item::List(_), Some(Item::Int(_))) => Ordering::Less,
            (Item::List(_), Some(Item::Str(_))) => Ordering::Greater,
            (Item::List(a), Some(Item::List(b))) => compare_lists(a, b),
        }
    }
}

fn compare_qualifiers(a: &str, b: &str) -> Ordering {
    fn rank(qualifier: &str) -> (usize, &str) {
        match QUALIFIERS.iter().position(|known| *known == qualifier) {
            Some(index) => (index, ""),
            None => (QUALIFIERS.len(), qualifier),
        }
    }
    rank(a).cmp(&rank(b))
}

fn compare_lists(a: &[Item], b: &[Item]) -> Ordering {
    for index in 0..a.len().max(b.len()) {
        let ordering = match (a.get(index), b.get(index)) {
            (Some(left), right) => left.compare(right),
            (None, Some(right)) => right.compare(None).reverse(),
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

impl ComparableVersion {
    pub fn parse(version: &str) -> Self {
        let version = version.trim().to_lowercase();
        let mut parents: Vec<Vec<Item>> = Vec::new();
        let mut current: Vec<Item> = Vec::new();
        let mut is_digit = false;
        let mut start = 0;

        for (index, character) in version.char_indices() {
            match character {
                '.' | '-' => {
                    if index == start {
                        current.push(Item::Int("0".to_owned()));
                    } else {
                        current.push(Item::parse(&version[start..index], is_digit));
                    }
                    start = index + 1;
                    if character == '-' {
                        parents.push(std::mem::take(&mut current));
                    }
                }
                digit if digit.is_ascii_digit() => {
                    if !is_digit && index > start {
                        current.push(Item::string(&version[start..index], true));
                        start = index;
                        parents.push(std::mem::take(&mut current));
                    }
                    is_digit = true;
                }
                _ => {
                    if is_digit && index > start {
                        current.push(Item::int(&version[start..index]));
                        start = index;
                        parents.push(std::mem::take(&mut current));
                    }
                    is_digit = false;
                }
            }
        }
        if version.len() > start {
            current.push(Item::parse(&version[start..], is_digit));
        }

        trim_trailing(&mut current);
        while let Some(mut parent) = parents.pop() {
            if !current.is_empty() {
                parent.push(Item::List(current));
            }
            trim_trailing(&mut parent);
            current = parent;
        }
        Self { items: current }
    }
}

/// Drops trailing null items, looking past nested lists like Maven does.
fn trim_trailing(items: &mut Vec<Item>) {
    let mut index = items.len();
    while index > 0 {
        index -= 1;
        if items[index].is_null() {
            items.remove(index);
        } else if !matches!(items[index], Item::List(_)) {
            break;
        }
    }
}

impl Ord for ComparableVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_lists(&self.items, &other.items)
    }
}

impl PartialOrd for ComparableVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn assert_ascending(versions: &[&str]) {
        for pair in versions.windows(2) {
            assert_eq!(
                compare_versions(pair[0], pair[1]),
                Ordering::Less,
                "{} < {}",
                pair[0],
                pair[1]
            );
            assert_eq!(compare_versions(pair[1], pair[0]), Ordering::Greater);
        }
    }

    #[test]
    fn numeric_ordering() {
        assert_ascending(&["1", "1.1", "1.2", "1.9", "1.10", "2.0", "10.0"]);
        assert_ascending(&["1.0.0", "1.0.1", "1.1.0"]);
        assert_eq!(
            compare_versions("123456789012345678901234567890", "123456789012345678901234567891"),
            Ordering::Less
        );
    }

    #[test]
    fn qualifier_ordering() {
        assert_ascending(&[
            "1.0-alpha1",
            "1.0-beta1",
            "1.0-M1",
            "1.0-rc1",
            "1.0-SNAPSHOT",
            "1.0",
            "1.0-sp1",
            "1.0-unknown",
            "1.0.1",
        ]);
        assert_ascending(&["1.0-alpha1", "1.0-alpha2", "1.0-alpha10"]);
    }

    #[test]
    fn equivalent_versions() {
        assert_eq!(compare_versions("1", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0", "1-ga"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.Final", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0-RELEASE", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0-cr1", "1.0-rc1"), Ordering::Equal);
        assert_eq!(compare_versions("1.0-a1", "1.0-alpha-1"), Ordering::Equal);
        assert_eq!(compare_versions("01.002", "1.2"), Ordering::Equal);
    }

    #[test]
    fn snapshot_detection() {
        assert!(is_snapshot("1.0-SNAPSHOT"));
        assert!(!is_snapshot("1.0"));
    }
}
