// Temporal-Precedence Comparator
// Decides whether one version of a record is strictly newer than another

use super::error::{ComparatorError, Side};
use super::record::FieldSource;
use super::timestamp::Timestamp;
use crate::constants::LAST_MODIFIED_DATE;

/// Report whether `record_a` was modified strictly after `record_b`.
///
/// Both records must be present and carry a `LastModifiedDate` in the
/// fixed `YYYY-MM-DDTHH:MM:SS.mmmZ` format. Equal timestamps are not
/// "after", so an unchanged record never looks stale.
pub fn is_after<R: FieldSource + ?Sized>(
    record_a: Option<&R>,
    record_b: Option<&R>,
) -> Result<bool, ComparatorError> {
    LastModifiedComparator::default().is_after(record_a, record_b)
}

/// Last-write-wins comparator over a configurable timestamp field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastModifiedComparator {
    field: String,
}

impl Default for LastModifiedComparator {
    fn default() -> Self {
        Self { field: LAST_MODIFIED_DATE.to_string() }
    }
}

impl LastModifiedComparator {
    /// Compare on a different timestamp field than `LastModifiedDate`
    pub fn with_field(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Side A is validated completely before side B is looked at.
    pub fn is_after<R: FieldSource + ?Sized>(
        &self,
        record_a: Option<&R>,
        record_b: Option<&R>,
    ) -> Result<bool, ComparatorError> {
        let record_a = record_a.ok_or_else(|| ComparatorError::absent(Side::A))?;
        let a = self.timestamp_of(record_a, Side::A)?;

        let record_b = record_b.ok_or_else(|| ComparatorError::absent(Side::B))?;
        let b = self.timestamp_of(record_b, Side::B)?;

        Ok(a > b)
    }

    /// `is_after` for records the caller already holds
    pub fn compare_present<R: FieldSource + ?Sized>(
        &self,
        record_a: &R,
        record_b: &R,
    ) -> Result<bool, ComparatorError> {
        self.is_after(Some(record_a), Some(record_b))
    }

    /// Parse the timestamp field of a record, attributing failures to `side`
    pub fn timestamp_of<R: FieldSource + ?Sized>(
        &self,
        record: &R,
        side: Side,
    ) -> Result<Timestamp, ComparatorError> {
        let raw = record
            .field(&self.field)
            .ok_or_else(|| ComparatorError::missing_field(side, self.field.as_str()))?;

        Timestamp::parse(raw).map_err(|_| ComparatorError::malformed(side, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ErrorKind, InvalidReason};
    use crate::core::record::Record;
    use std::collections::HashMap;

    fn lead(id: &str, modified: &str) -> Record {
        Record::new()
            .with("Id", id)
            .with("LastModifiedDate", modified)
    }

    #[test]
    fn test_a_after_b() {
        let a = lead("I0000323AE754F", "2013-12-10T22:15:33.001Z");
        let b = lead("I000032300ESE", "2013-12-09T22:15:33.001Z");

        assert_eq!(is_after(Some(&a), Some(&b)), Ok(true));
    }

    #[test]
    fn test_a_before_b() {
        let a = lead("I0000323AE754F", "2013-12-08T22:15:33.001Z");
        let b = lead("I000032300ESE", "2013-12-09T22:15:33.001Z");

        assert_eq!(is_after(Some(&a), Some(&b)), Ok(false));
    }

    #[test]
    fn test_equal_timestamps_are_not_after() {
        let a = lead("I0000323AE754F", "2013-12-09T22:15:33.001Z");
        let b = lead("I000032300ESE", "2013-12-09T22:15:33.001Z");

        assert_eq!(is_after(Some(&a), Some(&b)), Ok(false));
        assert_eq!(is_after(Some(&a), Some(&a)), Ok(false));
    }

    #[test]
    fn test_antisymmetric_for_distinct_timestamps() {
        let stamps = [
            "1999-12-31T23:59:59.999Z",
            "2000-01-01T00:00:00.000Z",
            "2013-12-09T22:15:33.001Z",
            "2013-12-09T22:15:33.002Z",
        ];
        for x in stamps {
            for y in stamps {
                let a = lead("a", x);
                let b = lead("b", y);
                let ab = is_after(Some(&a), Some(&b)).unwrap();
                let ba = is_after(Some(&b), Some(&a)).unwrap();
                if x == y {
                    assert!(!ab && !ba);
                } else {
                    assert!(ab != ba, "{x} vs {y}");
                    assert_eq!(ab, Timestamp::parse(x).unwrap() > Timestamp::parse(y).unwrap());
                }
            }
        }
    }

    #[test]
    fn test_absent_record_a() {
        let b = lead("I000032300ESE", "2013-12-09T22:15:33.001Z");

        let err = is_after(None, Some(&b)).unwrap_err();
        assert_eq!(err, ComparatorError::absent(Side::A));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_absent_record_b() {
        let a = lead("I0000323AE754F", "2013-12-09T22:15:33.001Z");

        let err = is_after(Some(&a), None).unwrap_err();
        assert_eq!(err, ComparatorError::absent(Side::B));
    }

    #[test]
    fn test_missing_field_on_a() {
        let a = Record::new().with("Id", "I0000323AE754F");
        let b = lead("I000032300ESE", "2013-12-09T22:15:33.001Z");

        let err = is_after(Some(&a), Some(&b)).unwrap_err();
        assert_eq!(
            err,
            ComparatorError::InvalidArgument {
                side: Side::A,
                reason: InvalidReason::MissingField("LastModifiedDate".to_string()),
            }
        );
        assert!(err.to_string().contains("LastModifiedDate"));
    }

    #[test]
    fn test_missing_field_on_b() {
        let a = lead("I0000323AE754F", "2013-12-09T22:15:33.001Z");
        let b = Record::new().with("Id", "I000032300ESE");

        let err = is_after(Some(&a), Some(&b)).unwrap_err();
        assert_eq!(err, ComparatorError::missing_field(Side::B, "LastModifiedDate"));
    }

    #[test]
    fn test_malformed_timestamp_names_value() {
        let a = lead("I0000323AE754F", "not-a-date");
        let b = lead("I000032300ESE", "2013-12-09T22:15:33.001Z");

        let err = is_after(Some(&a), Some(&b)).unwrap_err();
        assert_eq!(err, ComparatorError::malformed(Side::A, "not-a-date"));
        assert_eq!(err.kind(), ErrorKind::MalformedTimestamp);

        let err = is_after(Some(&b), Some(&a)).unwrap_err();
        assert_eq!(err, ComparatorError::malformed(Side::B, "not-a-date"));
    }

    #[test]
    fn test_side_a_reported_first_when_both_invalid() {
        let a = Record::new();
        let b = lead("b", "garbage");

        let err = is_after(Some(&a), Some(&b)).unwrap_err();
        assert_eq!(err.side(), Side::A);
    }

    #[test]
    fn test_custom_field_over_plain_map() {
        let comparator = LastModifiedComparator::with_field("SystemModstamp");
        let mut a = HashMap::new();
        a.insert("SystemModstamp".to_string(), "2020-01-01T00:00:00.001Z".to_string());
        let mut b = HashMap::new();
        b.insert("SystemModstamp".to_string(), "2020-01-01T00:00:00.000Z".to_string());

        assert_eq!(comparator.compare_present(&a, &b), Ok(true));

        b.remove("SystemModstamp");
        assert_eq!(
            comparator.compare_present(&a, &b),
            Err(ComparatorError::missing_field(Side::B, "SystemModstamp"))
        );
    }

    #[test]
    fn test_concurrent_callers_agree() {
        let a = lead("a", "2013-12-10T22:15:33.001Z");
        let b = lead("b", "2013-12-09T22:15:33.001Z");

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| is_after(Some(&a), Some(&b))))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), Ok(true));
            }
        });
    }
}
