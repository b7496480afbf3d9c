use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::ParseError;

/// Unanchored version grammar, embedded by the filename matchers.
///
/// Always used inside a case-insensitive pattern.
pub(crate) const VERSION_GRAMMAR: &str = r"v?[0-9]+\.[0-9]+(?:\.[0-9]+)?(?:[ab][0-9]+)?";

const MAJOR_WEIGHT: i128 = 1_000_000_000;
const MINOR_WEIGHT: i128 = 1_000_000;
const PATCH_WEIGHT: i128 = 1_000;

const ALPHA_PENALTY: i128 = 200;
const BETA_PENALTY: i128 = 100;

/// Pre-release suffix of a [`Version`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PreRelease {
    Alpha(u64),
    Beta(u64),
}

impl PreRelease {
    pub fn label(self) -> &'static str {
        match self {
            PreRelease::Alpha(_) => "a",
            PreRelease::Beta(_) => "b",
        }
    }

    pub fn number(self) -> u64 {
        match self {
            PreRelease::Alpha(n) | PreRelease::Beta(n) => n,
        }
    }

    fn penalty(self) -> i128 {
        match self {
            PreRelease::Alpha(_) => ALPHA_PENALTY,
            PreRelease::Beta(_) => BETA_PENALTY,
        }
    }
}

/// A parsed package version.
///
/// Accepted grammar: optional `v`, `MAJOR.MINOR`, optional `.PATCH`, optional
/// `a<N>` / `b<N>` pre-release suffix (all case-insensitive). The canonical
/// form always has three numeric components: `1.2` renders as `1.2.0`, `V1.2B3`
/// as `1.2.0b3`.
///
/// Ordering is defined by [`Version::magnitude`] only; see
/// [`Version::compare`]. `Version` does not implement `Ord` because distinct
/// versions can share a magnitude (`1.1000.0` and `2.0.0`, or `1.0.0a300` and
/// `1.0.0b200`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Option<PreRelease>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    pub fn with_pre_release(mut self, pre: PreRelease) -> Self {
        self.pre = Some(pre);
        self
    }

    /// Parse a raw version string.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        static VERSION_RE: OnceLock<regex::Regex> = OnceLock::new();
        let re = VERSION_RE.get_or_init(|| {
            regex::Regex::new(r"(?i-u)^v?([0-9]+)\.([0-9]+)(?:\.([0-9]+))?(?:([ab])([0-9]+))?$")
                .expect("version regex should compile")
        });

        let invalid = || ParseError::InvalidVersion(raw.to_owned());
        let caps = re.captures(raw).ok_or_else(invalid)?;

        // Digit runs only fail to parse when they overflow `u64`.
        let component = |idx: usize| -> Result<u64, ParseError> {
            match caps.get(idx) {
                Some(m) => m.as_str().parse::<u64>().map_err(|_| invalid()),
                None => Ok(0),
            }
        };

        let major = component(1)?;
        let minor = component(2)?;
        let patch = component(3)?;
        let pre = match caps.get(4) {
            Some(label) => {
                let number = component(5)?;
                if label.as_str().eq_ignore_ascii_case("a") {
                    Some(PreRelease::Alpha(number))
                } else {
                    Some(PreRelease::Beta(number))
                }
            }
            None => None,
        };

        Ok(Self {
            major,
            minor,
            patch,
            pre,
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn pre_release(&self) -> Option<PreRelease> {
        self.pre
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre.is_some()
    }

    /// Canonical rendering, `MAJOR.MINOR.PATCH[LABELNUMBER]`.
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Integer encoding used for ordering.
    ///
    /// `major*1e9 + minor*1e6 + patch*1e3`; a pre-release subtracts 200 (alpha)
    /// or 100 (beta) and adds its number. The encoding is only order-preserving
    /// while minor/patch stay below 1000 and pre-release numbers stay below
    /// the penalty of their label.
    pub fn magnitude(&self) -> i128 {
        let mut magnitude = i128::from(self.major) * MAJOR_WEIGHT
            + i128::from(self.minor) * MINOR_WEIGHT
            + i128::from(self.patch) * PATCH_WEIGHT;
        if let Some(pre) = self.pre {
            magnitude -= pre.penalty();
            magnitude += i128::from(pre.number());
        }
        magnitude
    }

    pub fn compare(&self, other: &Version) -> Ordering {
        self.magnitude().cmp(&other.magnitude())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = self.pre {
            write!(f, "{}{}", pre.label(), pre.number())?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}
