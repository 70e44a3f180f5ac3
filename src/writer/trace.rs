//! Debug tree dump: one `'name' = 'value' FLAGS` line per value, children
//! indented one space below their parent.

use crate::model::Value;

pub fn trace(value: &Value, name: &str) -> String {
    let mut out = String::new();
    let mut ancestors = Vec::new();
    write_node(&mut out, value, name, "", &mut ancestors);
    out
}

fn write_node(
    out: &mut String,
    value: &Value,
    name: &str,
    indent: &str,
    ancestors: &mut Vec<Value>,
) {
    out.push_str(&format!(
        "{indent}'{name}' = '{}' {}\n",
        value.as_string(),
        value.flags_string()
    ));
    if ancestors.iter().any(|v| v.ptr_eq(value)) {
        return;
    }

    ancestors.push(value.clone());
    let child_indent = format!("{indent} ");
    for link in value.children() {
        write_node(out, &link.value(), &link.name(), &child_indent, ancestors);
    }
    ancestors.pop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree() {
        let obj = Value::object();
        obj.add_child("n", Value::int(7));
        let inner = Value::object();
        inner.add_child("s", Value::string("hi"));
        obj.add_child("inner", inner);

        let expected = "'root' = '' OBJECT \n \
                        'n' = '7' INTEGER \n \
                        'inner' = '' OBJECT \n  \
                        's' = 'hi' STRING \n";
        assert_eq!(trace(&obj, "root"), expected);
    }

    #[test]
    fn test_cycle_is_printed_once() {
        let obj = Value::object();
        obj.add_child("self", obj.clone());
        let text = trace(&obj, "o");
        assert_eq!(text.lines().count(), 2);
        obj.remove_all_children();
    }
}
