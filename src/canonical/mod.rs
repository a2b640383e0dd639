//! Byte-deterministic JSON serialization.
//!
//! Compiled artifacts and registry snapshots are content-addressed by the
//! checksum of their canonical bytes, so two structurally equal values must
//! serialize to identical output: object keys sorted lexicographically by
//! UTF-8 code units at every depth, array order preserved, minimal string
//! escaping, no insignificant whitespace.

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Whether non-integer numbers are acceptable in the value tree.
///
/// Rule payloads are integer-only; registry snapshots and pointer files
/// may carry floats in the shortest round-trip decimal form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatPolicy {
    Reject,
    ShortestRoundTrip,
}

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("non-integer number {value} at {path}")]
    FloatRejected { path: String, value: f64 },

    #[error("non-finite number at {path}")]
    NonFiniteNumber { path: String },
}

/// Serialize a value tree to canonical UTF-8 bytes.
pub fn to_canonical_bytes(value: &Value, floats: FloatPolicy) -> Result<Vec<u8>, CanonicalError> {
    let mut out = Vec::with_capacity(256);
    write_value(value, floats, &mut out, &mut String::from("$"))?;
    Ok(out)
}

/// Checksum of a byte sequence in the locked `sha256:<hex>` format
/// (71 characters, lowercase hex).
pub fn checksum(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("sha256:{}", hex::encode(digest))
}

fn write_value(
    value: &Value,
    floats: FloatPolicy,
    out: &mut Vec<u8>,
    path: &mut String,
) -> Result<(), CanonicalError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.extend_from_slice(i.to_string().as_bytes());
            } else if let Some(u) = n.as_u64() {
                out.extend_from_slice(u.to_string().as_bytes());
            } else {
                let f = n.as_f64().ok_or_else(|| CanonicalError::NonFiniteNumber {
                    path: path.clone(),
                })?;
                if !f.is_finite() {
                    return Err(CanonicalError::NonFiniteNumber { path: path.clone() });
                }
                if floats == FloatPolicy::Reject {
                    return Err(CanonicalError::FloatRejected {
                        path: path.clone(),
                        value: f,
                    });
                }
                // serde_json emits the shortest decimal that round-trips.
                out.extend_from_slice(n.to_string().as_bytes());
            }
        }
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                let len = path.len();
                path.push_str(&format!("[{i}]"));
                write_value(item, floats, out, path)?;
                path.truncate(len);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                let len = path.len();
                path.push('.');
                path.push_str(key);
                write_value(&map[key.as_str()], floats, out, path)?;
                path.truncate(len);
            }
            out.push(b'}');
        }
    }
    Ok(())
}

/// Minimal JSON string escaping: quote, backslash, and control characters.
fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            '\u{08}' => out.extend_from_slice(b"\\b"),
            '\u{0C}' => out.extend_from_slice(b"\\f"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canon(v: &Value) -> String {
        String::from_utf8(to_canonical_bytes(v, FloatPolicy::Reject).unwrap()).unwrap()
    }

    #[test]
    fn test_keys_sorted_recursively() {
        let v = json!({"z": 1, "a": {"c": 2, "b": 3}, "m": [{"y": 1, "x": 2}]});
        assert_eq!(canon(&v), r#"{"a":{"b":3,"c":2},"m":[{"x":2,"y":1}],"z":1}"#);
    }

    #[test]
    fn test_arrays_preserve_order() {
        let v = json!({"ids": [3, 1, 2]});
        assert_eq!(canon(&v), r#"{"ids":[3,1,2]}"#);
    }

    #[test]
    fn test_no_whitespace_and_integer_form() {
        let v = json!({"amount": 3000, "negative": -5});
        assert_eq!(canon(&v), r#"{"amount":3000,"negative":-5}"#);
    }

    #[test]
    fn test_string_escaping() {
        let v = json!({"s": "a\"b\\c\nd"});
        assert_eq!(canon(&v), r#"{"s":"a\"b\\c\nd"}"#);

        let v = json!({"ctrl": "\u{01}"});
        assert_eq!(canon(&v), "{\"ctrl\":\"\\u0001\"}");
    }

    #[test]
    fn test_unicode_passes_through_as_utf8() {
        let v = json!({"name": "café"});
        assert_eq!(canon(&v), "{\"name\":\"café\"}");
    }

    #[test]
    fn test_floats_rejected_in_rule_payloads() {
        let v = json!({"amount": 30.5});
        let err = to_canonical_bytes(&v, FloatPolicy::Reject).unwrap_err();
        assert!(err.to_string().contains("$.amount"));
    }

    #[test]
    fn test_floats_allowed_elsewhere() {
        let v = json!({"ratio": 0.25});
        let bytes = to_canonical_bytes(&v, FloatPolicy::ShortestRoundTrip).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"ratio":0.25}"#);
    }

    #[test]
    fn test_deterministic_for_equal_values() {
        let a = json!({"b": [1, 2], "a": {"y": true, "x": null}});
        let b = json!({"a": {"x": null, "y": true}, "b": [1, 2]});

        let ba = to_canonical_bytes(&a, FloatPolicy::Reject).unwrap();
        let bb = to_canonical_bytes(&b, FloatPolicy::Reject).unwrap();
        assert_eq!(ba, bb);
        assert_eq!(checksum(&ba), checksum(&bb));
    }

    #[test]
    fn test_checksum_format() {
        let c = checksum(b"{}");
        assert_eq!(c.len(), 71);
        assert!(c.starts_with("sha256:"));
        assert!(c[7..].chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
    }

    #[test]
    fn test_known_checksum() {
        // sha256 of the empty string
        assert_eq!(
            checksum(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
