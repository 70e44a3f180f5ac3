//! Conversion of JSON data into script values, for hosts that hold their
//! state as `serde_json::Value` and for `JSON.parse`.

use serde_json::Value as Json;

use crate::error::{Result, ScriptError};
use crate::model::Value;

/// Parse JSON text into a fresh script value.
pub fn parse_json(text: &str) -> Result<Value> {
    let json: Json = serde_json::from_str(text)
        .map_err(|e| ScriptError::host(format!("JSON.parse: {e}")))?;
    Ok(load_from_json(&json))
}

/// Build the script value mirroring `json`. Booleans become the integers
/// `1` and `0`, the same as script `true` and `false`.
pub fn load_from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::null(),
        Json::Bool(b) => Value::bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::int(i),
            None => Value::double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::string(s.as_str()),
        Json::Array(items) => {
            let arr = Value::array();
            for (idx, item) in items.iter().enumerate() {
                arr.add_child(&idx.to_string(), load_from_json(item));
            }
            arr
        }
        Json::Object(members) => {
            let obj = Value::object();
            for (name, member) in members {
                obj.add_child_no_dup(name, load_from_json(member));
            }
            obj
        }
    }
}
