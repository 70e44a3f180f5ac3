//! General helpers: re-entrant `exec`/`eval`, debug dumps, string and array
//! methods reached through the `String`/`Array`/`Object` stand-ins, and
//! `JSON`.

use log::info;

use crate::context::Context;
use crate::error::{Exception, Result};
use crate::model::Value;
use crate::parser::parse_json;
use crate::processor::lexer::string_to_integer;
use crate::writer::{to_json, trace};

pub(crate) fn register(ctx: &mut Context) -> Result<()> {
    ctx.register_native("function exec(jsCode)", |ctx, scope| {
        let code = scope.get_parameter("jsCode").as_string();
        ctx.execute(&code).map_err(Exception::into_error)
    })?;
    ctx.register_native("function eval(jsCode)", |ctx, scope| {
        let code = scope.get_parameter("jsCode").as_string();
        let result = ctx.evaluate_complex(&code).map_err(Exception::into_error)?;
        scope.set_return_value(result.value());
        Ok(())
    })?;
    ctx.register_native("function trace()", |ctx, _| {
        info!("\n{}", trace(ctx.root(), "root"));
        Ok(())
    })?;

    ctx.register_native("function Object.dump()", |_, scope| {
        info!("\n{}", trace(&scope.get_parameter("this"), "> "));
        Ok(())
    })?;
    ctx.register_native("function Object.clone()", |_, scope| {
        let copy = Value::undefined();
        copy.copy_value(&scope.get_parameter("this"));
        scope.set_return_value(copy);
        Ok(())
    })?;

    ctx.register_native("function charToInt(ch)", |_, scope| {
        let s = scope.get_parameter("ch").as_string();
        scope.set_return_value(Value::int(s.chars().next().map_or(0, char_code)));
        Ok(())
    })?;

    register_string(ctx)?;
    register_array(ctx)?;

    ctx.register_native("function Integer.parseInt(str)", |_, scope| {
        let s = scope.get_parameter("str").as_string();
        scope.set_return_value(Value::int(string_to_integer(&s)));
        Ok(())
    })?;
    ctx.register_native("function Integer.valueOf(str)", |_, scope| {
        let s = scope.get_parameter("str").as_string();
        let mut chars = s.chars();
        let code = match (chars.next(), chars.next()) {
            (Some(only), None) => char_code(only),
            _ => 0,
        };
        scope.set_return_value(Value::int(code));
        Ok(())
    })?;

    // replacer is accepted but not applied
    ctx.register_native("function JSON.stringify(obj, replacer)", |ctx, scope| {
        let text = to_json(&scope.get_parameter("obj"), ctx.config().max_json_array_len);
        scope.set_return_value(Value::string(text));
        Ok(())
    })?;
    ctx.register_native("function JSON.parse(text)", |_, scope| {
        let value = parse_json(&scope.get_parameter("text").as_string())?;
        scope.set_return_value(value);
        Ok(())
    })?;
    Ok(())
}

fn register_string(ctx: &mut Context) -> Result<()> {
    ctx.register_native("function String.indexOf(search)", |_, scope| {
        let s = scope.get_parameter("this").as_string();
        let search = scope.get_parameter("search").as_string();
        let found = s.find(&search).map_or(-1, |pos| s[..pos].chars().count() as i64);
        scope.set_return_value(Value::int(found));
        Ok(())
    })?;
    ctx.register_native("function String.substring(lo,hi)", |_, scope| {
        let s = scope.get_parameter("this").as_string();
        let lo = scope.get_parameter("lo").as_int();
        let hi = scope.get_parameter("hi").as_int();
        let part: String = if lo >= 0 && hi > lo && hi <= s.chars().count() as i64 {
            s.chars().skip(lo as usize).take((hi - lo) as usize).collect()
        } else {
            String::new()
        };
        scope.set_return_value(Value::string(part));
        Ok(())
    })?;
    ctx.register_native("function String.charAt(pos)", |_, scope| {
        let s = scope.get_parameter("this").as_string();
        let pos = scope.get_parameter("pos").as_int();
        let ch = char_at(&s, pos).map(String::from).unwrap_or_default();
        scope.set_return_value(Value::string(ch));
        Ok(())
    })?;
    ctx.register_native("function String.charCodeAt(pos)", |_, scope| {
        let s = scope.get_parameter("this").as_string();
        let pos = scope.get_parameter("pos").as_int();
        scope.set_return_value(Value::int(char_at(&s, pos).map_or(0, char_code)));
        Ok(())
    })?;
    ctx.register_native("function String.fromCharCode(char)", |_, scope| {
        let code = scope.get_parameter("char").as_int();
        let ch = u32::try_from(code).ok().and_then(char::from_u32).unwrap_or('\0');
        scope.set_return_value(Value::string(ch.to_string()));
        Ok(())
    })?;
    ctx.register_native("function String.split(separator)", |_, scope| {
        let s = scope.get_parameter("this").as_string();
        let sep = scope.get_parameter("separator").as_string();
        let result = Value::array();
        for (idx, piece) in split(&s, &sep).into_iter().enumerate() {
            result.array_set(idx as i64, Value::string(piece));
        }
        scope.set_return_value(result);
        Ok(())
    })?;
    Ok(())
}

fn register_array(ctx: &mut Context) -> Result<()> {
    ctx.register_native("function Array.contains(obj)", |_, scope| {
        let needle = scope.get_parameter("obj");
        let mut found = false;
        for link in scope.get_parameter("this").children() {
            if link.value().equals(&needle)? {
                found = true;
                break;
            }
        }
        scope.set_return_value(Value::bool(found));
        Ok(())
    })?;
    ctx.register_native("function Array.remove(obj)", |_, scope| {
        let needle = scope.get_parameter("obj");
        let arr = scope.get_parameter("this");
        let mut removed = Vec::new();
        for link in arr.children() {
            if link.value().equals(&needle)? {
                removed.push(link.int_name());
                arr.remove_link(&link);
            }
        }
        for link in arr.children() {
            let idx = link.int_name();
            let shift = removed.iter().filter(|&&r| idx > r).count() as i64;
            if shift > 0 {
                link.set_int_name(idx - shift);
            }
        }
        Ok(())
    })?;
    ctx.register_native("function Array.join(separator)", |_, scope| {
        let sep = scope.get_parameter("separator").as_string();
        let arr = scope.get_parameter("this");
        let parts: Vec<String> = (0..arr.array_len())
            .map(|idx| arr.array_get(idx).as_string())
            .collect();
        scope.set_return_value(Value::string(parts.join(&sep)));
        Ok(())
    })?;
    Ok(())
}

/// Strings are indexed by character, the same unit `length` counts.
fn char_at(s: &str, pos: i64) -> Option<char> {
    usize::try_from(pos).ok().and_then(|p| s.chars().nth(p))
}

fn char_code(ch: char) -> i64 {
    i64::from(u32::from(ch))
}

/// Pieces of `s` between occurrences of `sep`; a trailing empty piece is
/// dropped and an empty separator splits into characters.
fn split<'a>(s: &'a str, sep: &str) -> Vec<&'a str> {
    if sep.is_empty() {
        return s
            .char_indices()
            .map(|(idx, ch)| &s[idx..idx + ch.len_utf8()])
            .collect();
    }
    let mut pieces: Vec<&str> = s.split(sep).collect();
    if pieces.last().is_some_and(|last| last.is_empty()) {
        pieces.pop();
    }
    pieces
}
