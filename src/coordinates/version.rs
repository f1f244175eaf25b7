//! Maven version ordering and Gradle version requirements
//!
//! Versions are compared structurally the way Maven does it: numeric segments numerically,
//! known qualifiers by their release order (`alpha < beta < milestone < rc < snapshot < "" < sp`)
//! and unknown qualifiers lexically after all known ones.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

const QUALIFIERS: &[&str] = &["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];

/// Index of the empty (release) qualifier in [`QUALIFIERS`]
const RELEASE_VERSION_INDEX: &str = "5";

#[derive(Debug, Clone)]
enum Item {
    /// Decimal digits without leading zeros; zero is the empty string
    Int(String),
    Str(String),
    List(Vec<Item>),
}

impl Item {
    fn int(digits: &str) -> Item {
        Item::Int(digits.trim_start_matches('0').to_string())
    }

    fn string(value: &str, followed_by_digit: bool) -> Item {
        let value = if followed_by_digit && value.len() == 1 {
            match value {
                "a" => "alpha",
                "b" => "beta",
                "m" => "milestone",
                other => other,
            }
        } else {
            value
        };
        let value = match value {
            "ga" | "final" | "release" => "",
            "cr" => "rc",
            other => other,
        };
        Item::Str(value.to_string())
    }

    fn is_null(&self) -> bool {
        match self {
            Item::Int(digits) => digits.is_empty(),
            Item::Str(value) => value.is_empty(),
            Item::List(items) => items.is_empty(),
        }
    }

    /// Compare with another item; `None` stands for a missing trailing segment
    fn compare_to(&self, other: Option<&Item>) -> Ordering {
        match (self, other) {
            (Item::Int(digits), None) => {
                if digits.is_empty() {
                    Ordering::Equal
                } else {
                    Ordering::Greater
                }
            }
            (Item::Int(a), Some(Item::Int(b))) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Item::Int(_), Some(_)) => Ordering::Greater,

            (Item::Str(value), None) => comparable_qualifier(value).as_str().cmp(RELEASE_VERSION_INDEX),
            (Item::Str(a), Some(Item::Str(b))) => {
                comparable_qualifier(a).cmp(&comparable_qualifier(b))
            }
            (Item::Str(_), Some(_)) => Ordering::Less,

            (Item::List(items), None) => items
                .first()
                .map_or(Ordering::Equal, |first| first.compare_to(None)),
            (Item::List(_), Some(Item::Int(_))) => Ordering::Less,
            (Item::List(_), Some(Item::Str(_))) => Ordering::Greater,
            (Item::List(a), Some(Item::List(b))) => compare_lists(a, b),
        }
    }
}

fn comparable_qualifier(qualifier: &str) -> String {
    match QUALIFIERS.iter().position(|q| *q == qualifier) {
        Some(index) => index.to_string(),
        None => format!("{}-{}", QUALIFIERS.len(), qualifier),
    }
}

fn compare_lists(left: &[Item], right: &[Item]) -> Ordering {
    for i in 0..left.len().max(right.len()) {
        let result = match (left.get(i), right.get(i)) {
            (Some(l), r) => l.compare_to(r),
            (None, Some(r)) => r.compare_to(None).reverse(),
            (None, None) => Ordering::Equal,
        };
        if result != Ordering::Equal {
            return result;
        }
    }
    Ordering::Equal
}

/// Drop trailing null items, stopping at the first non-null non-list item
fn normalize(items: &mut Vec<Item>) {
    let mut i = items.len();
    while i > 0 {
        i -= 1;
        if items[i].is_null() {
            items.remove(i);
        } else if !matches!(items[i], Item::List(_)) {
            break;
        }
    }
}

/// Builds the nested item list. Each `-` or digit/letter transition opens a sub-list.
struct Parser {
    stack: Vec<Vec<Item>>,
}

impl Parser {
    fn push(&mut self, item: Item) {
        if let Some(list) = self.stack.last_mut() {
            list.push(item);
        }
    }

    fn open_list(&mut self) {
        self.stack.push(Vec::new());
    }

    fn finish(mut self) -> Vec<Item> {
        while self.stack.len() > 1 {
            let mut list = self.stack.pop().unwrap_or_default();
            normalize(&mut list);
            self.push(Item::List(list));
        }
        let mut root = self.stack.pop().unwrap_or_default();
        normalize(&mut root);
        root
    }
}

fn parse_item(is_digit: bool, buf: &str) -> Item {
    if is_digit {
        Item::int(buf)
    } else {
        Item::string(buf, false)
    }
}

/// A Maven version with structural ordering
///
/// Equality follows the ordering, so `1.0` equals `1` and `1.0-ga` equals `1.0`.
#[derive(Debug, Clone)]
pub struct MavenVersion {
    original: String,
    items: Vec<Item>,
}

impl MavenVersion {
    pub fn parse(version: &str) -> Self {
        let lower = version.to_lowercase();
        let chars: Vec<char> = lower.chars().collect();
        let mut parser = Parser {
            stack: vec![Vec::new()],
        };

        let mut is_digit = false;
        let mut start = 0;
        let substring = |from: usize, to: usize| chars[from..to].iter().collect::<String>();

        for (i, &c) in chars.iter().enumerate() {
            if c == '.' {
                if i == start {
                    parser.push(Item::int("0"));
                } else {
                    parser.push(parse_item(is_digit, &substring(start, i)));
                }
                start = i + 1;
            } else if c == '-' {
                if i == start {
                    parser.push(Item::int("0"));
                } else {
                    parser.push(parse_item(is_digit, &substring(start, i)));
                }
                start = i + 1;
                parser.open_list();
            } else if c.is_ascii_digit() {
                if !is_digit && i > start {
                    parser.push(Item::string(&substring(start, i), true));
                    start = i;
                    parser.open_list();
                }
                is_digit = true;
            } else {
                if is_digit && i > start {
                    parser.push(parse_item(true, &substring(start, i)));
                    start = i;
                    parser.open_list();
                }
                is_digit = false;
            }
        }

        if chars.len() > start {
            parser.push(parse_item(is_digit, &substring(start, chars.len())));
        }

        Self {
            original: version.to_string(),
            items: parser.finish(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl PartialEq for MavenVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MavenVersion {}

impl PartialOrd for MavenVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MavenVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_lists(&self.items, &other.items)
    }
}

impl fmt::Display for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// Whether a version string is a Maven/Gradle range such as `[1.0,2.0)`
pub fn is_version_range(version: &str) -> bool {
    let version = version.trim();
    version.starts_with('[') || version.starts_with(']') || version.starts_with('(')
}

/// The `version` block of a Gradle module metadata dependency
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRequirement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strictly: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefers: Option<String>,
}

impl VersionRequirement {
    pub fn requires(version: impl Into<String>) -> Self {
        Self {
            requires: Some(version.into()),
            ..Default::default()
        }
    }

    /// The concrete version to use: `strictly`, then `requires`, then `prefers`.
    /// Ranges are never picked.
    pub fn resolve(&self) -> Option<&str> {
        [&self.strictly, &self.requires, &self.prefers]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|v| !is_version_range(v))
    }

    /// The first declared range, when no concrete version is declared
    pub fn unresolved_range(&self) -> Option<&str> {
        if self.resolve().is_some() {
            return None;
        }
        [&self.strictly, &self.requires, &self.prefers]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|v| is_version_range(v))
    }
}
