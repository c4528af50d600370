//! Upload-notification parsing.
//!
//! Two wire shapes are accepted:
//!
//! - the queue-notification wrapper: `Records[0].eventSource == "aws:s3"`
//!   with nested `s3.bucket.name` / `s3.object.key` / `s3.object.size`;
//! - the event-bridge shape: `detail-type == "Object Created"`,
//!   `source == "aws.s3"`, with `detail.bucket.name` / `detail.object.*`.
//!
//! Shape detection is structural, so both are always enabled. Parsing is
//! all-or-nothing: any validation failure yields an error and no partial
//! event. Field extraction is explicit `serde_json::Value` navigation —
//! unknown fields are simply never looked at.

use chrono::{DateTime, Duration, Utc};
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::config::defaults::{
    EVENT_MAX_AGE_DAYS, EVENT_MAX_SKEW_DAYS, MAX_BUCKET_LEN, MAX_EVENT_OBJECT_SIZE, MAX_KEY_LEN,
    UNKNOWN_STREAM,
};
use crate::error::EventParseError;
use crate::types::UploadEvent;

/// DNS-safe bucket names: lowercase alphanumerics, dots and dashes, no
/// leading/trailing separator.
fn bucket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9](?:[a-z0-9.-]*[a-z0-9])?$").unwrap_or_else(|e| {
            // A literal pattern that fails to compile is a build defect.
            unreachable!("bucket pattern failed to compile: {e}")
        })
    })
}

/// Parse and validate one notification body.
pub fn parse_upload_event(body: &str) -> Result<UploadEvent, EventParseError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| EventParseError::Syntax(e.to_string()))?;

    if let Some(records) = value.get("Records").and_then(Value::as_array) {
        let first = records.first().ok_or(EventParseError::UnknownShape)?;
        if first.get("eventSource").and_then(Value::as_str) != Some("aws:s3") {
            return Err(EventParseError::UnknownShape);
        }
        return parse_notification_record(first);
    }

    if value.get("detail-type").and_then(Value::as_str) == Some("Object Created")
        && value.get("source").and_then(Value::as_str) == Some("aws.s3")
    {
        return parse_event_bridge(&value);
    }

    Err(EventParseError::UnknownShape)
}

/// Shape (a): first record of a queue-notification wrapper.
fn parse_notification_record(record: &Value) -> Result<UploadEvent, EventParseError> {
    let time = required_str(record, "eventTime")?;
    let region = required_str(record, "awsRegion")?.to_string();
    let s3 = record.get("s3").ok_or(EventParseError::MissingField("s3"))?;
    let bucket = s3
        .get("bucket")
        .and_then(|b| b.get("name"))
        .and_then(Value::as_str)
        .ok_or(EventParseError::MissingField("s3.bucket.name"))?;
    let object = s3
        .get("object")
        .ok_or(EventParseError::MissingField("s3.object"))?;
    let key = object
        .get("key")
        .and_then(Value::as_str)
        .ok_or(EventParseError::MissingField("s3.object.key"))?;
    let size = object
        .get("size")
        .and_then(Value::as_u64)
        .ok_or(EventParseError::MissingField("s3.object.size"))?;
    let etag = object
        .get("eTag")
        .and_then(Value::as_str)
        .map(str::to_string);
    let sequencer = object
        .get("sequencer")
        .and_then(Value::as_str)
        .map(str::to_string);

    let time = validate_time(time)?;
    let (bucket, key) = validate_object_ref(bucket, key, size)?;
    let id = sequencer
        .clone()
        .unwrap_or_else(|| format!("{bucket}/{key}@{size}"));
    let stream_name = extract_stream_name(&key);

    Ok(UploadEvent {
        id,
        time,
        region,
        bucket,
        key,
        size,
        etag,
        sequencer,
        stream_name,
    })
}

/// Shape (b): event-bridge `Object Created` detail.
fn parse_event_bridge(value: &Value) -> Result<UploadEvent, EventParseError> {
    let id = required_str(value, "id")?.to_string();
    let time = required_str(value, "time")?;
    let region = required_str(value, "region")?.to_string();
    let detail = value
        .get("detail")
        .ok_or(EventParseError::MissingField("detail"))?;
    let bucket = detail
        .get("bucket")
        .and_then(|b| b.get("name"))
        .and_then(Value::as_str)
        .ok_or(EventParseError::MissingField("detail.bucket.name"))?;
    let object = detail
        .get("object")
        .ok_or(EventParseError::MissingField("detail.object"))?;
    let key = object
        .get("key")
        .and_then(Value::as_str)
        .ok_or(EventParseError::MissingField("detail.object.key"))?;
    let size = object
        .get("size")
        .and_then(Value::as_u64)
        .ok_or(EventParseError::MissingField("detail.object.size"))?;
    let etag = object
        .get("etag")
        .and_then(Value::as_str)
        .map(str::to_string);

    let time = validate_time(time)?;
    let (bucket, key) = validate_object_ref(bucket, key, size)?;
    let stream_name = extract_stream_name(&key);

    Ok(UploadEvent {
        id,
        time,
        region,
        bucket,
        key,
        size,
        etag,
        sequencer: None,
        stream_name,
    })
}

fn required_str<'a>(value: &'a Value, field: &'static str) -> Result<&'a str, EventParseError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or(EventParseError::MissingField(field))
}

/// RFC-3339, within `[now − 1 year, now + 1 day]`.
fn validate_time(raw: &str) -> Result<DateTime<Utc>, EventParseError> {
    let time = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| EventParseError::InvalidField {
            field: "time",
            reason: e.to_string(),
        })?
        .with_timezone(&Utc);

    let now = Utc::now();
    let oldest = now - Duration::days(EVENT_MAX_AGE_DAYS);
    let newest = now + Duration::days(EVENT_MAX_SKEW_DAYS);
    if time < oldest || time > newest {
        return Err(EventParseError::TimeOutOfWindow(raw.to_string()));
    }
    Ok(time)
}

/// Bucket/key/size invariants. Returns the validated bucket and the
/// URL-decoded key.
fn validate_object_ref(
    bucket: &str,
    key: &str,
    size: u64,
) -> Result<(String, String), EventParseError> {
    if bucket.is_empty() || bucket.len() > MAX_BUCKET_LEN {
        return Err(EventParseError::InvalidField {
            field: "bucket",
            reason: format!("length {} outside 1..{MAX_BUCKET_LEN}", bucket.len()),
        });
    }
    if !bucket_pattern().is_match(bucket) {
        return Err(EventParseError::InvalidField {
            field: "bucket",
            reason: format!("'{bucket}' is not DNS-safe"),
        });
    }

    // Form-style encoding: '+' is a space; a literal plus arrives as %2B,
    // so the replacement must happen before percent decoding.
    let key = key.replace('+', " ");
    let key = percent_decode_str(&key)
        .decode_utf8()
        .map_err(|e| EventParseError::InvalidField {
            field: "key",
            reason: e.to_string(),
        })?
        .into_owned();
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(EventParseError::InvalidField {
            field: "key",
            reason: format!("length {} outside 1..{MAX_KEY_LEN}", key.len()),
        });
    }
    if key.contains("..") || key.contains("//") {
        return Err(EventParseError::InvalidField {
            field: "key",
            reason: "path traversal or empty component".to_string(),
        });
    }

    if size > MAX_EVENT_OBJECT_SIZE {
        return Err(EventParseError::InvalidField {
            field: "size",
            reason: format!("{size} exceeds {MAX_EVENT_OBJECT_SIZE}"),
        });
    }

    Ok((bucket.to_string(), key))
}

/// Stream name: the path component immediately preceding the filename of
/// an already-decoded key, `"unknown"` otherwise.
pub fn extract_stream_name(decoded_key: &str) -> String {
    let components: Vec<&str> = decoded_key.split('/').collect();
    if components.len() >= 2 {
        let candidate = components[components.len() - 2];
        if !candidate.is_empty() {
            return candidate.to_string();
        }
    }
    UNKNOWN_STREAM.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification_body(key: &str, size: u64) -> String {
        format!(
            r#"{{"Records":[{{"eventSource":"aws:s3","eventTime":"{}","awsRegion":"us-west-2",
                "s3":{{"bucket":{{"name":"measurement-uploads"}},
                       "object":{{"key":"{key}","size":{size},"eTag":"abc123","sequencer":"0055AED6DCD90281E5"}}}}}}]}}"#,
            Utc::now().to_rfc3339()
        )
    }

    fn event_bridge_body(key: &str) -> String {
        format!(
            r#"{{"detail-type":"Object Created","source":"aws.s3","id":"17793124-05d4-b198","time":"{}",
                "region":"us-west-2","resources":["arn:aws:s3:::measurement-uploads"],
                "detail":{{"bucket":{{"name":"measurement-uploads"}},
                           "object":{{"key":"{key}","size":1024,"etag":"d41d8cd9"}}}}}}"#,
            Utc::now().to_rfc3339()
        )
    }

    #[test]
    fn parses_notification_shape() {
        let event =
            parse_upload_event(&notification_body("feeds/scan-feed/2024/part-0001.jsonl", 2048))
                .unwrap();
        assert_eq!(event.bucket, "measurement-uploads");
        assert_eq!(event.key, "feeds/scan-feed/2024/part-0001.jsonl");
        assert_eq!(event.size, 2048);
        assert_eq!(event.stream_name, "2024");
        assert_eq!(event.sequencer.as_deref(), Some("0055AED6DCD90281E5"));
    }

    #[test]
    fn parses_event_bridge_shape() {
        let event = parse_upload_event(&event_bridge_body("uploads/scan-feed/part-9.jsonl")).unwrap();
        assert_eq!(event.id, "17793124-05d4-b198");
        assert_eq!(event.stream_name, "scan-feed");
        assert_eq!(event.etag.as_deref(), Some("d41d8cd9"));
    }

    #[test]
    fn decodes_url_encoded_keys() {
        let event =
            parse_upload_event(&notification_body("uploads/scan%2Dfeed/part%201.jsonl", 10)).unwrap();
        assert_eq!(event.key, "uploads/scan-feed/part 1.jsonl");
        assert_eq!(event.stream_name, "scan-feed");
    }

    #[test]
    fn stream_name_extraction_is_idempotent_on_decoded_input() {
        let decoded = "uploads/scan-feed/part 1.jsonl";
        let once = extract_stream_name(decoded);
        let again = extract_stream_name(&once);
        // A decoded name without a slash has no directory component.
        assert_eq!(once, "scan-feed");
        assert_eq!(again, UNKNOWN_STREAM);
        // Re-decoding the already-decoded key changes nothing.
        let redecoded = percent_decode_str(decoded).decode_utf8().unwrap();
        assert_eq!(extract_stream_name(&redecoded), once);
    }

    #[test]
    fn bare_filename_streams_as_unknown() {
        assert_eq!(extract_stream_name("part-0001.jsonl"), UNKNOWN_STREAM);
    }

    #[test]
    fn rejects_traversal_keys() {
        let err = parse_upload_event(&notification_body("feeds/../secrets", 10)).unwrap_err();
        assert!(matches!(err, EventParseError::InvalidField { field: "key", .. }));
    }

    #[test]
    fn rejects_stale_timestamps() {
        let body = r#"{"Records":[{"eventSource":"aws:s3","eventTime":"2019-01-01T00:00:00Z","awsRegion":"us-west-2",
            "s3":{"bucket":{"name":"b"},"object":{"key":"a/b.jsonl","size":1}}}]}"#;
        assert!(matches!(
            parse_upload_event(body).unwrap_err(),
            EventParseError::TimeOutOfWindow(_)
        ));
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert!(matches!(
            parse_upload_event(r#"{"hello":"world"}"#).unwrap_err(),
            EventParseError::UnknownShape
        ));
        assert!(matches!(
            parse_upload_event("not json at all").unwrap_err(),
            EventParseError::Syntax(_)
        ));
    }

    #[test]
    fn rejects_oversize_bucket_names() {
        let long_bucket = "b".repeat(64);
        let body = format!(
            r#"{{"Records":[{{"eventSource":"aws:s3","eventTime":"{}","awsRegion":"r",
                "s3":{{"bucket":{{"name":"{long_bucket}"}},"object":{{"key":"a/b","size":1}}}}}}]}}"#,
            Utc::now().to_rfc3339()
        );
        assert!(matches!(
            parse_upload_event(&body).unwrap_err(),
            EventParseError::InvalidField { field: "bucket", .. }
        ));
    }
}
