// Trigger payload handling
//
// The loader is invoked with an S3 "object created" notification. Only the
// bucket name and object key of each record are used; everything else in the
// notification is ignored.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{LoaderError, Result};

/// One entry of the trigger payload's `Records` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub bucket: String,
    /// Object key exactly as delivered (percent-encoded, `+` for spaces)
    pub raw_key: String,
}

impl NotificationRecord {
    /// Object key with URL encoding undone.
    pub fn decoded_key(&self) -> Result<String> {
        decode_object_key(&self.raw_key)
    }
}

#[derive(Deserialize)]
struct RawRecord {
    s3: RawEntity,
}

#[derive(Deserialize)]
struct RawEntity {
    bucket: RawBucket,
    object: RawObject,
}

#[derive(Deserialize)]
struct RawBucket {
    name: String,
}

#[derive(Deserialize)]
struct RawObject {
    key: String,
}

/// Validate a trigger payload and extract its notification records.
///
/// A `null` payload, a payload without `Records`, a `Records` value that is
/// not a list, or a record lacking `s3.bucket.name`/`s3.object.key` is
/// malformed. An empty list is valid and yields no records.
pub fn parse_trigger(payload: &Value) -> Result<Vec<NotificationRecord>> {
    let records = match payload.get("Records") {
        Some(Value::Array(records)) => records,
        Some(_) => return Err(LoaderError::malformed("'Records' is not a list")),
        None => return Err(LoaderError::malformed("'Records' is missing")),
    };

    records
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            let raw = RawRecord::deserialize(record)
                .map_err(|e| LoaderError::malformed(format!("record {}: {}", idx, e)))?;
            Ok(NotificationRecord {
                bucket: raw.s3.bucket.name,
                raw_key: raw.s3.object.key,
            })
        })
        .collect()
}

/// Undo the form encoding S3 applies to keys in notifications.
///
/// `+` stands for a space and must be translated before percent-decoding, so
/// that an encoded plus (`%2B`) survives as a literal `+`.
pub fn decode_object_key(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|key| key.into_owned())
        .map_err(|e| LoaderError::InvalidKey {
            key: raw.to_string(),
            message: e.to_string(),
        })
}

/// File name for the scratch copy of an object.
///
/// Slashes are dropped so the file lands directly in the scratch directory,
/// and a random prefix keeps concurrent or repeated downloads apart.
pub fn scratch_file_name(key: &str) -> String {
    format!("{}{}", Uuid::new_v4(), key.replace('/', ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notification(bucket: &str, key: &str) -> Value {
        json!({
            "eventVersion": "2.1",
            "eventSource": "aws:s3",
            "eventName": "ObjectCreated:Put",
            "s3": {
                "s3SchemaVersion": "1.0",
                "bucket": { "name": bucket, "arn": format!("arn:aws:s3:::{}", bucket) },
                "object": { "key": key, "size": 24 }
            }
        })
    }

    #[test]
    fn test_parse_trigger_extracts_records() {
        let payload = json!({
            "Records": [notification("uploads", "a.csv"), notification("uploads", "dir/b.csv")]
        });

        let records = parse_trigger(&payload).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].bucket, "uploads");
        assert_eq!(records[0].raw_key, "a.csv");
        assert_eq!(records[1].raw_key, "dir/b.csv");
    }

    #[test]
    fn test_parse_trigger_rejects_malformed_payloads() {
        for payload in [
            Value::Null,
            json!({}),
            json!({ "Records": "not-a-list" }),
            json!({ "Records": { "s3": {} } }),
            json!({ "Records": [{ "s3": { "bucket": { "name": "b" } } }] }),
        ] {
            let err = parse_trigger(&payload).unwrap_err();
            assert!(err.is_malformed_event(), "payload {} accepted", payload);
        }
    }

    #[test]
    fn test_parse_trigger_accepts_empty_list() {
        let records = parse_trigger(&json!({ "Records": [] })).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_decode_object_key() {
        assert_eq!(decode_object_key("a%2Bb.csv").unwrap(), "a+b.csv");
        assert_eq!(decode_object_key("my+file.csv").unwrap(), "my file.csv");
        assert_eq!(
            decode_object_key("reports/2024%2F01.csv").unwrap(),
            "reports/2024/01.csv"
        );
        assert_eq!(decode_object_key("plain.csv").unwrap(), "plain.csv");
    }

    #[test]
    fn test_decode_object_key_rejects_invalid_utf8() {
        let err = decode_object_key("bad%FF.csv").unwrap_err();
        assert!(matches!(err, LoaderError::InvalidKey { .. }));
    }

    #[test]
    fn test_scratch_file_name_strips_slashes() {
        let name = scratch_file_name("nested/dir/data.csv");
        assert!(name.ends_with("nesteddirdata.csv"));
        assert!(!name.contains('/'));
        assert_ne!(name, scratch_file_name("nested/dir/data.csv"));
    }
}
