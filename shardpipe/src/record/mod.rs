// Record I/O - newline-delimited JSON encoding for shard files

use crate::error::{Result, ShardPipeError};
use serde_json::{Map, Value};

/// A single record: an arbitrary JSON object supplied by the caller in batches.
pub type Record = Map<String, Value>;

/// Encode records as newline-delimited JSON: one object per line, UTF-8,
/// `\n`-terminated. Embedded newlines in values are covered by standard JSON
/// string escaping, so every line stays independently deserializable.
///
/// The single owner of the shard wire format; every shard write goes
/// through here.
pub fn encode_records<'a, I>(records: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut out = Vec::new();
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Decode a shard file body back into records. A trailing newline is
/// tolerated; any line that fails to parse fails the whole read.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<Record>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ShardPipeError::Other(format!("shard file is not UTF-8: {e}")))?;

    let mut records = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(line)?;
        records.push(record);
    }
    Ok(records)
}

/// Extract the shard-routing value for `split_key` from a record.
/// Strings pass through unchanged; numbers and booleans use their display
/// form. Absent keys and non-scalar values are defined failure conditions,
/// never silently skipped.
pub fn split_value(record: &Record, split_key: &str) -> Result<String> {
    let value = record
        .get(split_key)
        .ok_or_else(|| ShardPipeError::MissingSplitKey {
            key: split_key.to_string(),
        })?;

    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => {
            Err(ShardPipeError::NonScalarSplitValue {
                key: split_key.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(json: &str) -> Record {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let records = vec![
            record(r#"{"region":"east","amt":5}"#),
            record(r#"{"region":"west","amt":7,"note":"line\nbreak"}"#),
            record(r#"{"region":"east","amt":2}"#),
        ];

        let bytes = encode_records(&records).unwrap();
        let decoded = decode_records(&bytes).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_encoded_lines_parse_independently() {
        let records = vec![
            record(r#"{"a":1}"#),
            record(r#"{"b":"two"}"#),
        ];
        let bytes = encode_records(&records).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.ends_with('\n'));
        for line in text.lines() {
            let _: Record = serde_json::from_str(line).unwrap();
        }
    }

    #[test]
    fn test_decode_rejects_bad_line() {
        let result = decode_records(b"{\"a\":1}\nnot json\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_split_value_string() {
        let r = record(r#"{"region":"east"}"#);
        assert_eq!(split_value(&r, "region").unwrap(), "east");
    }

    #[test]
    fn test_split_value_number_and_bool() {
        let r = record(r#"{"bucket":42,"flag":true}"#);
        assert_eq!(split_value(&r, "bucket").unwrap(), "42");
        assert_eq!(split_value(&r, "flag").unwrap(), "true");
    }

    #[test]
    fn test_split_value_missing() {
        let r = record(r#"{"amt":5}"#);
        let err = split_value(&r, "region").unwrap_err();
        assert!(matches!(err, ShardPipeError::MissingSplitKey { .. }));
    }

    #[test]
    fn test_split_value_non_scalar() {
        let r = record(r#"{"region":{"nested":true}}"#);
        let err = split_value(&r, "region").unwrap_err();
        assert!(matches!(err, ShardPipeError::NonScalarSplitValue { .. }));
    }
}
