//! Custom serializer/deserializer for NaiveDate
//!
//! chrono is pulled in without its `serde` feature, so dates that appear in serialized
//! output are written as `YYYY-MM-DD` strings through these helpers.

use chrono::NaiveDate;
use serde::{Deserialize, Serializer};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn naive_date_serializer<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
}

#[allow(dead_code)]
pub fn naive_date_deserializer<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Dated {
        #[serde(
            serialize_with = "naive_date_serializer",
            deserialize_with = "naive_date_deserializer"
        )]
        date: NaiveDate,
    }

    #[test]
    fn test_date_is_written_as_iso_string() {
        let dated = Dated { date: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap() };
        let json = serde_json::to_string(&dated).unwrap();
        assert_eq!(json, r#"{"date":"2024-03-07"}"#);

        let parsed: Dated = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, dated);
    }

    #[test]
    fn test_malformed_date_is_rejected() {
        let parsed = serde_json::from_str::<Dated>(r#"{"date":"07/03/2024"}"#);
        assert!(parsed.is_err());
    }
}
