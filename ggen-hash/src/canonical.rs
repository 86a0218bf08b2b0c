//! Canonical JSON serialization
//!
//! Produces the byte form used for hashing: UTF-8, keys sorted
//! lexicographically at every object level, no insignificant whitespace,
//! numbers without exponent or trailing `.0`, lowercase literals.

use serde_json::Value;

/// Serialize a JSON value to its canonical text form.
///
/// Two values that differ only in object key order canonicalize to the
/// same string, so `hash_json(v) == hash_json(shuffle_keys(v))`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&format_number(n)),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sort explicitly rather than relying on map iteration order,
            // so canonical form survives a preserve_order build of serde_json.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                if let Some(v) = map.get(*key) {
                    write_value(out, v);
                }
            }
            out.push('}');
        }
    }
}

/// Format a number without exponent and without a trailing `.0`.
///
/// Rust's `Display` for `f64` already avoids scientific notation and drops
/// the fractional part of whole floats, which matches the canonical rules.
fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else if let Some(f) = n.as_f64() {
        format!("{}", f)
    } else {
        // serde_json numbers are always one of the above
        "0".to_string()
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sorted_keys_at_every_level() {
        let value = json!({"z": {"b": 1, "a": 2}, "a": "first"});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":"first","z":{"a":2,"b":1}}"#
        );
    }

    #[test]
    fn test_whole_float_has_no_trailing_zero() {
        let value = json!({"n": 2.0});
        assert_eq!(canonical_json(&value), r#"{"n":2}"#);
    }

    #[test]
    fn test_fractional_float_preserved() {
        let value = json!([1.5, -0.25]);
        assert_eq!(canonical_json(&value), "[1.5,-0.25]");
    }

    #[test]
    fn test_literals_lowercase() {
        let value = json!([true, false, null]);
        assert_eq!(canonical_json(&value), "[true,false,null]");
    }

    #[test]
    fn test_string_escaping() {
        let value = json!({"s": "a\"b\\c\nd"});
        assert_eq!(canonical_json(&value), r#"{"s":"a\"b\\c\nd"}"#);
    }

    #[test]
    fn test_control_character_escaped() {
        let value = json!("\u{0001}");
        assert_eq!(canonical_json(&value), "\"\\u0001\"");
    }

    #[test]
    fn test_round_trips_through_serde() {
        let value = json!({"a": [1, {"c": null, "b": true}], "b": "x"});
        let canonical = canonical_json(&value);
        let reparsed: serde_json::Value =
            serde_json::from_str(&canonical).expect("canonical form must be valid JSON");
        assert_eq!(reparsed, value);
    }
}
