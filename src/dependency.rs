// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Dependency relations between packages.

A relation names another package, optionally constrained to a version range
through a *sense* bitmask. Relations are grouped into the six categories rpm
understands (provides, requires, obsoletes, suggests, recommends,
conflicts), each emitted as three parallel header arrays.
*/

use {
    crate::{
        error::{Result, RpmPackagingError},
        header::Header,
    },
    once_cell::sync::Lazy,
    regex::Regex,
    std::{
        fmt::{Display, Formatter},
        ops::{BitOr, BitOrAssign},
    },
};

/// Regular expression splitting a relation expression into name, operator
/// and version. Operator characters are captured greedily and validated
/// afterwards, which is what rejects forms like `==` and `=>`.
static RE_RELATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^=<>\s]*)\s*([=<>]*)\s*(.*?)\s*$").unwrap());

/// Bitmask expressing how a relation's version is compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RpmSense(u32);

impl RpmSense {
    /// No version comparison.
    pub const ANY: Self = Self(0);
    pub const LESS: Self = Self(1 << 1);
    pub const GREATER: Self = Self(1 << 2);
    pub const EQUAL: Self = Self(1 << 3);

    // Context bits used by rpm's dependency machinery. The relation parser
    // never produces these; they exist for callers assembling flag values
    // manually.
    pub const POSTTRANS: Self = Self(1 << 5);
    pub const PREREQ: Self = Self(1 << 6);
    pub const PRETRANS: Self = Self(1 << 7);
    pub const INTERP: Self = Self(1 << 8);
    pub const SCRIPT_PRE: Self = Self(1 << 9);
    pub const SCRIPT_POST: Self = Self(1 << 10);
    pub const SCRIPT_PREUN: Self = Self(1 << 11);
    pub const SCRIPT_POSTUN: Self = Self(1 << 12);
    pub const SCRIPT_VERIFY: Self = Self(1 << 13);
    pub const FIND_REQUIRES: Self = Self(1 << 14);
    pub const FIND_PROVIDES: Self = Self(1 << 15);
    pub const RPMLIB: Self = Self(1 << 24);

    /// Raw value stored in the flags header arrays.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    fn operator(self) -> Option<&'static str> {
        if self == Self::ANY {
            Some("")
        } else if self == Self::LESS {
            Some("<")
        } else if self == Self::GREATER {
            Some(">")
        } else if self == Self::EQUAL {
            Some("=")
        } else if self == (Self::LESS | Self::EQUAL) {
            Some("<=")
        } else if self == (Self::GREATER | Self::EQUAL) {
            Some(">=")
        } else {
            None
        }
    }
}

impl BitOr for RpmSense {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RpmSense {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Display for RpmSense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.operator().unwrap_or("UNKNOWN"))
    }
}

fn sense_from_operator(operator: &str) -> Option<RpmSense> {
    match operator {
        "" => Some(RpmSense::ANY),
        "<" => Some(RpmSense::LESS),
        ">" => Some(RpmSense::GREATER),
        "=" => Some(RpmSense::EQUAL),
        "<=" => Some(RpmSense::LESS | RpmSense::EQUAL),
        ">=" => Some(RpmSense::GREATER | RpmSense::EQUAL),
        _ => None,
    }
}

/// A named dependency relation with an optional version constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    pub version: String,
    pub sense: RpmSense,
}

impl Relation {
    /// Parse a textual relation such as `python >= 3.7`.
    ///
    /// Accepted operators are `<`, `>`, `=`, `<=` and `>=`; a bare name
    /// means any version. Anything else (`==`, `=>`, `<>`, ...) is rejected.
    pub fn new(text: &str) -> Result<Self> {
        let malformed = || RpmPackagingError::MalformedRelation(text.to_string());
        let caps = RE_RELATION.captures(text).ok_or_else(malformed)?;
        let sense = sense_from_operator(&caps[2]).ok_or_else(malformed)?;

        Ok(Self {
            name: caps[1].to_string(),
            version: caps[3].to_string(),
            sense,
        })
    }
}

impl Display for Relation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.name, self.sense, self.version)
    }
}

/// An insertion-ordered set of relations.
#[derive(Clone, Debug, Default)]
pub struct Relations(Vec<Relation>);

impl Relations {
    /// Append a relation unless an identical one is already present.
    pub fn add(&mut self, relation: Relation) {
        if !self.0.iter().any(|existing| *existing == relation) {
            self.0.push(relation);
        }
    }

    /// Parse `text` and [add](Self::add) the resulting relation.
    pub fn add_text(&mut self, text: &str) -> Result<()> {
        self.add(Relation::new(text)?);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Relation> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Relation> {
        self.0.iter_mut()
    }

    /// Drop duplicates, keeping each relation's first occurrence.
    pub(crate) fn dedup(&mut self) {
        let mut seen: Vec<Relation> = Vec::with_capacity(self.0.len());
        self.0.retain(|relation| {
            if seen.contains(relation) {
                false
            } else {
                seen.push(relation.clone());
                true
            }
        });
    }

    /// Emit the three parallel arrays for this set. An empty set emits no
    /// tags at all.
    pub(crate) fn apply_to_header(&self, header: &mut Header, name_tag: i32, version_tag: i32, flags_tag: i32) {
        if self.0.is_empty() {
            return;
        }

        let names: Vec<String> = self.0.iter().map(|r| r.name.clone()).collect();
        let versions: Vec<String> = self.0.iter().map(|r| r.version.clone()).collect();
        let flags: Vec<u32> = self.0.iter().map(|r| r.sense.bits()).collect();

        header.add(name_tag, names);
        header.add(version_tag, versions);
        header.add(flags_tag, flags);
    }
}

impl<'a> IntoIterator for &'a Relations {
    type Item = &'a Relation;
    type IntoIter = std::slice::Iter<'a, Relation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
