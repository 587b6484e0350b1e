use chrono::{DateTime, Utc};
use std::io::{self, Write};

use crate::feed::parse_drop_list;
use crate::storage::IndicatorRecord;

/// Builds one record per indicator, all stamped with the same `now`.
pub fn build_records<I>(indicators: I, source: &str, now: DateTime<Utc>) -> Vec<IndicatorRecord>
where
    I: IntoIterator<Item = String>,
{
    indicators
        .into_iter()
        .map(|indicator| IndicatorRecord {
            source: source.to_string(),
            indicator,
            ingested_at: now,
        })
        .collect()
}

/// Parses raw feed text and builds the run's records.
pub fn transform(raw: &str, source: &str, now: DateTime<Utc>) -> Vec<IndicatorRecord> {
    build_records(parse_drop_list(raw), source, now)
}

/// Writes records as JSON lines, one object per record.
pub fn write_json_lines<W: Write>(mut out: W, records: &[IndicatorRecord]) -> io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_one_record_per_indicator_in_order() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let records = build_records(
            vec!["1.2.3.0/24".to_string(), "5.6.7.0/8".to_string()],
            "spamhaus_drop",
            now,
        );

        assert_eq!(
            records,
            vec![
                IndicatorRecord {
                    source: "spamhaus_drop".to_string(),
                    indicator: "1.2.3.0/24".to_string(),
                    ingested_at: now,
                },
                IndicatorRecord {
                    source: "spamhaus_drop".to_string(),
                    indicator: "5.6.7.0/8".to_string(),
                    ingested_at: now,
                },
            ]
        );
    }

    #[test]
    fn test_timestamp_shared_across_batch() {
        let indicators: Vec<String> = (0..250).map(|i| format!("10.{}.0.0/16", i)).collect();
        let records = build_records(indicators, "spamhaus_drop", Utc::now());

        assert_eq!(records.len(), 250);
        let first = records[0].ingested_at;
        assert!(records.iter().all(|r| r.ingested_at == first));
    }

    #[test]
    fn test_duplicates_not_filtered() {
        let records = build_records(
            vec!["9.9.9.0/24".to_string(), "9.9.9.0/24".to_string()],
            "spamhaus_drop",
            Utc::now(),
        );
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_transform_feed_text() {
        let raw = "; Spamhaus DROP List 2024/03/01\n\
                   # Last-Modified: Fri, 01 Mar 2024 10:00:00 GMT\n\
                   1.10.16.0/20 ; SBL256894\n\
                   \n\
                   1.19.0.0/16 ; SBL434604\n";
        let now = Utc::now();
        let records = transform(raw, "spamhaus_drop", now);

        let indicators: Vec<&str> = records.iter().map(|r| r.indicator.as_str()).collect();
        assert_eq!(indicators, vec!["", "1.10.16.0/20", "1.19.0.0/16"]);
        assert!(records.iter().all(|r| r.ingested_at == now));
    }

    #[test]
    fn test_record_serializes_with_iso_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let records = build_records(vec!["1.2.3.0/24".to_string()], "spamhaus_drop", now);
        let json = serde_json::to_value(&records[0]).unwrap();

        assert_eq!(json["source"], "spamhaus_drop");
        assert_eq!(json["indicator"], "1.2.3.0/24");
        assert_eq!(json["ingested_at"], "2024-03-01T12:00:00Z");
    }

    #[test]
    fn test_json_lines_one_object_per_record() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let records = build_records(
            vec!["1.2.3.0/24".to_string(), "5.6.7.0/8".to_string()],
            "spamhaus_drop",
            now,
        );

        let mut out = Vec::new();
        write_json_lines(&mut out, &records).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "{\"source\":\"spamhaus_drop\",\"indicator\":\"1.2.3.0/24\",\"ingested_at\":\"2024-03-01T12:00:00Z\"}\n\
             {\"source\":\"spamhaus_drop\",\"indicator\":\"5.6.7.0/8\",\"ingested_at\":\"2024-03-01T12:00:00Z\"}\n"
        );
    }

    #[test]
    fn test_json_lines_empty_batch_writes_nothing() {
        let mut out = Vec::new();
        write_json_lines(&mut out, &[]).unwrap();
        assert!(out.is_empty());
    }
}
