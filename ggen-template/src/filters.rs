//! Fixed filter and function set for the deterministic profile
//!
//! Everything here is a pure function of its arguments. Host-dependent
//! builtins are overridden with failing stubs so that even a dynamically
//! constructed call cannot reach them.

use ggen_hash::{canonical_json, hash_bytes, short_hash};
use serde_json::Value;
use std::collections::HashMap;
use tera::{Result as TeraResult, Tera, Value as TeraValue};

/// Names rejected at scan time and stubbed at registration time
pub const FORBIDDEN_NAMES: &[&str] = &["now", "get_random", "get_env", "random", "uuid", "shuffle"];

/// Register the deterministic filter/function set on a Tera instance.
///
/// `build_env` supplies the only ambient values templates may read; it comes
/// from the generation plan, never from the host.
pub fn register(tera: &mut Tera, build_env: &HashMap<String, Value>) {
    tera.register_filter("dump", dump_filter);
    tera.register_filter("sort_keys", sort_keys_filter);
    tera.register_filter("hash", hash_filter);
    tera.register_filter("content_id", content_id_filter);

    tera.register_function("hash", hash_function);
    tera.register_function("content_id", content_id_function);

    let env = build_env.clone();
    tera.register_function(
        "build_env",
        move |args: &HashMap<String, TeraValue>| -> TeraResult<TeraValue> {
            let key = args
                .get("key")
                .and_then(|v| v.as_str())
                .ok_or_else(|| tera::Error::msg("build_env requires a string 'key' argument"))?;
            Ok(env.get(key).cloned().unwrap_or(TeraValue::Null))
        },
    );

    // Failing stubs for every denylisted name, shadowing Tera builtins.
    for name in FORBIDDEN_NAMES {
        let fn_name = *name;
        tera.register_function(
            fn_name,
            move |_args: &HashMap<String, TeraValue>| -> TeraResult<TeraValue> {
                Err(tera::Error::msg(format!(
                    "forbidden non-deterministic function '{}'",
                    fn_name
                )))
            },
        );
        let filter_name = *name;
        tera.register_filter(
            filter_name,
            move |_value: &TeraValue, _args: &HashMap<String, TeraValue>| -> TeraResult<TeraValue> {
                Err(tera::Error::msg(format!(
                    "forbidden non-deterministic filter '{}'",
                    filter_name
                )))
            },
        );
    }
}

/// `| dump`: canonical JSON of the value (sorted keys, fixed numbers)
fn dump_filter(value: &TeraValue, _args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
    Ok(TeraValue::String(canonical_json(value)))
}

/// `| sort_keys`: value with every nested object rebuilt in sorted key order
fn sort_keys_filter(value: &TeraValue, _args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
    Ok(sort_keys(value))
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_keys(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// SHA-256 of the value: strings hash their bytes, everything else hashes
/// its canonical JSON form.
fn hash_value(value: &Value) -> String {
    match value {
        Value::String(s) => hash_bytes(s.as_bytes()),
        other => hash_bytes(canonical_json(other).as_bytes()),
    }
}

fn hash_filter(value: &TeraValue, _args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
    Ok(TeraValue::String(hash_value(value)))
}

fn content_id_filter(value: &TeraValue, _args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
    let id = match value {
        Value::String(s) => short_hash(s.as_bytes()),
        other => short_hash(canonical_json(other).as_bytes()),
    };
    Ok(TeraValue::String(id))
}

fn hash_function(args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
    let value = args
        .get("value")
        .ok_or_else(|| tera::Error::msg("hash requires a 'value' argument"))?;
    Ok(TeraValue::String(hash_value(value)))
}

fn content_id_function(args: &HashMap<String, TeraValue>) -> TeraResult<TeraValue> {
    let value = args
        .get("value")
        .ok_or_else(|| tera::Error::msg("content_id requires a 'value' argument"))?;
    let id = match value {
        Value::String(s) => short_hash(s.as_bytes()),
        other => short_hash(canonical_json(other).as_bytes()),
    };
    Ok(TeraValue::String(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_keys_recursive() {
        let value = json!({"z": {"b": 1, "a": 2}, "a": [{"d": 1, "c": 2}]});
        let sorted = sort_keys(&value);
        let text = serde_json::to_string(&sorted).unwrap();
        let a = text.find("\"a\"").unwrap();
        let z = text.find("\"z\"").unwrap();
        assert!(a < z);
    }

    #[test]
    fn test_hash_value_string_matches_bytes() {
        assert_eq!(
            hash_value(&json!("Hello World!")),
            "7f83b1657ff1fc53b92dc18148a1d65dfc2d4b1fa3d677284addd200126d9069"
        );
    }

    #[test]
    fn test_hash_value_object_key_order_independent() {
        let a = hash_value(&json!({"x": 1, "y": 2}));
        let b = hash_value(&json!({"y": 2, "x": 1}));
        assert_eq!(a, b);
    }
}
