// Timestamp
// Strict parser for the fixed-width UTC millisecond format `YYYY-MM-DDTHH:MM:SS.mmmZ`

use chrono::{DateTime, NaiveDate, SubsecRound, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Exact byte length of a well-formed timestamp
const TIMESTAMP_LEN: usize = 24;

/// Output pattern, mirroring what `Timestamp::parse` accepts
const DISPLAY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Separator bytes and the offsets they must appear at
const SEPARATORS: [(usize, u8); 7] = [
    (4, b'-'),
    (7, b'-'),
    (10, b'T'),
    (13, b':'),
    (16, b':'),
    (19, b'.'),
    (23, b'Z'),
];

/// The raw value did not match the fixed timestamp format
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed timestamp {value:?}, expected YYYY-MM-DDTHH:MM:SS.mmmZ")]
pub struct ParseTimestampError {
    pub value: String,
}

/// A point in time with UTC millisecond resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Parse a timestamp, rejecting anything outside the fixed-width format.
    ///
    /// Offsets other than `Z`, missing or extra fractional digits, and dates
    /// that do not exist on the calendar are all errors.
    pub fn parse(raw: &str) -> Result<Self, ParseTimestampError> {
        let malformed = || ParseTimestampError { value: raw.to_string() };
        let bytes = raw.as_bytes();

        if bytes.len() != TIMESTAMP_LEN {
            return Err(malformed());
        }

        for (i, b) in bytes.iter().enumerate() {
            let expected_separator = SEPARATORS.iter().find(|(pos, _)| *pos == i);
            let ok = match expected_separator {
                Some((_, sep)) => b == sep,
                None => b.is_ascii_digit(),
            };
            if !ok {
                return Err(malformed());
            }
        }

        let year = digits(&bytes[0..4]);
        let month = digits(&bytes[5..7]);
        let day = digits(&bytes[8..10]);
        let hour = digits(&bytes[11..13]);
        let minute = digits(&bytes[14..16]);
        let second = digits(&bytes[17..19]);
        let millis = digits(&bytes[20..23]);

        let naive = NaiveDate::from_ymd_opt(year as i32, month, day)
            .and_then(|date| date.and_hms_milli_opt(hour, minute, second, millis))
            .ok_or_else(malformed)?;

        Ok(Self(Utc.from_utc_datetime(&naive)))
    }

    /// Current time, truncated to millisecond resolution
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.trunc_subsecs(3))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Milliseconds since the Unix epoch
    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// The instant one millisecond earlier; `None` at the start of the calendar
    pub fn previous_millisecond(&self) -> Option<Self> {
        self.0.checked_sub_signed(TimeDelta::milliseconds(1)).map(Self)
    }
}

/// Decode a run of ASCII digits already validated by the caller
fn digits(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DISPLAY_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = ParseTimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
