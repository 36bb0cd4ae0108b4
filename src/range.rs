use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ScanError;

/// Lowest scannable TCP port.
pub const MIN_PORT: u32 = 1;
/// Highest scannable TCP port.
pub const MAX_PORT: u32 = 65_535;

/// An inclusive range of TCP ports, `start..=end`.
///
/// Both bounds are inclusive and must satisfy `1 <= start <= end <= 65535`.
/// A single port is the range `p..=p`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: u16,
    end: u16,
}

// A validated range always holds at least one port, so there is no `is_empty`.
#[allow(clippy::len_without_is_empty)]
impl PortRange {
    /// Validate caller-supplied bounds. Values are taken as `u32` so out-of-range
    /// input such as `70000` is rejected here rather than silently truncated.
    pub fn new(start: u32, end: u32) -> Result<Self, ScanError> {
        if start < MIN_PORT || end > MAX_PORT || start > end {
            return Err(ScanError::InvalidRange { start, end });
        }
        Ok(Self {
            start: start as u16,
            end: end as u16,
        })
    }

    pub fn single(port: u16) -> Result<Self, ScanError> {
        Self::new(port as u32, port as u32)
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports covered, `end - start + 1`.
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }

    pub fn iter(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }
}

impl IntoIterator for PortRange {
    type Item = u16;
    type IntoIter = RangeInclusive<u16>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Parses `80` or `1-1024`; surrounding whitespace is ignored.
impl FromStr for PortRange {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('-') {
            Some((a, b)) => {
                let start = parse_bound(a, s)?;
                let end = parse_bound(b, s)?;
                Self::new(start, end)
            }
            None => {
                let port = parse_bound(s, s)?;
                Self::new(port, port)
            }
        }
    }
}

fn parse_bound(raw: &str, whole: &str) -> Result<u32, ScanError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ScanError::MalformedRange(whole.to_string()))
}
