//! JSON rendering.
//!
//! Objects print one member per line, nested containers indent by two
//! spaces. Functions are not JSON but still render as their source
//! (`function (a,b) { ... }`) so a dump shows what a member holds.

use crate::model::{PROTOTYPE, Value};

/// Render `value` as JSON text. Arrays stop after `max_array_len` elements.
pub fn to_json(value: &Value, max_array_len: usize) -> String {
    let mut out = String::new();
    let mut ancestors = Vec::new();
    write_value(&mut out, value, "", max_array_len, &mut ancestors);
    out
}

fn write_value(
    out: &mut String,
    value: &Value,
    prefix: &str,
    max_array_len: usize,
    ancestors: &mut Vec<Value>,
) {
    if ancestors.iter().any(|v| v.ptr_eq(value)) {
        // cycle
        out.push_str("null");
        return;
    }

    if value.is_object() {
        ancestors.push(value.clone());
        write_object(out, value, prefix, max_array_len, ancestors);
        ancestors.pop();
    } else if value.is_array() {
        ancestors.push(value.clone());
        write_array(out, value, prefix, max_array_len, ancestors);
        ancestors.pop();
    } else {
        out.push_str(&value.parsable_string());
    }
}

fn write_object(
    out: &mut String,
    value: &Value,
    prefix: &str,
    max_array_len: usize,
    ancestors: &mut Vec<Value>,
) {
    let members: Vec<_> = value
        .children()
        .into_iter()
        .filter(|link| !link.has_name(PROTOTYPE))
        .collect();
    if members.is_empty() {
        out.push_str("{}");
        return;
    }

    let indented = format!("{prefix}  ");
    out.push_str("{\n");
    for (idx, link) in members.iter().enumerate() {
        if idx > 0 {
            out.push_str(",\n");
        }
        out.push_str(&indented);
        out.push_str(&crate::model::value::quote(&link.name()));
        out.push_str(" : ");
        write_value(out, &link.value(), &indented, max_array_len, ancestors);
    }
    out.push('\n');
    out.push_str(prefix);
    out.push('}');
}

fn write_array(
    out: &mut String,
    value: &Value,
    prefix: &str,
    max_array_len: usize,
    ancestors: &mut Vec<Value>,
) {
    let len = (value.array_len().max(0) as usize).min(max_array_len);
    if len == 0 {
        out.push_str("[]");
        return;
    }

    let indented = format!("{prefix}  ");
    out.push_str("[\n");
    for idx in 0..len {
        if idx > 0 {
            out.push_str(",\n");
        }
        out.push_str(&indented);
        write_value(out, &value.array_get(idx as i64), &indented, max_array_len, ancestors);
    }
    out.push('\n');
    out.push_str(prefix);
    out.push(']');
}
