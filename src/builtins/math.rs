//! The `Math` namespace. Integer arguments stay integers where the
//! operation allows it (`abs`, `round`, `min`, `max`, `range`, `sign`).

use crate::context::Context;
use crate::error::Result;
use crate::model::Value;

const UNARY: &[(&str, fn(f64) -> f64)] = &[
    ("toDegrees", f64::to_degrees),
    ("toRadians", f64::to_radians),
    ("sin", f64::sin),
    ("asin", f64::asin),
    ("cos", f64::cos),
    ("acos", f64::acos),
    ("tan", f64::tan),
    ("atan", f64::atan),
    ("sinh", f64::sinh),
    ("asinh", f64::asinh),
    ("cosh", f64::cosh),
    ("acosh", f64::acosh),
    ("tanh", f64::tanh),
    ("atanh", f64::atanh),
    ("log", f64::ln),
    ("log10", f64::log10),
    ("exp", f64::exp),
    ("sqrt", f64::sqrt),
];

pub(crate) fn register(ctx: &mut Context) -> Result<()> {
    ctx.register_native("function Math.rand()", |ctx, scope| {
        scope.set_return_value(Value::double(ctx.next_random()));
        Ok(())
    })?;
    ctx.register_native("function Math.randInt(min, max)", |ctx, scope| {
        let min = scope.get_parameter("min").as_int();
        let max = scope.get_parameter("max").as_int();
        let span = max.wrapping_sub(min).wrapping_add(1).max(1) as f64;
        let offset = (ctx.next_random() * span) as i64;
        scope.set_return_value(Value::int(min.wrapping_add(offset)));
        Ok(())
    })?;

    ctx.register_native("function Math.abs(a)", |_, scope| {
        let a = scope.get_parameter("a");
        if a.is_int() {
            scope.set_return_value(Value::int(a.as_int().wrapping_abs()));
        } else if a.is_double() {
            scope.set_return_value(Value::double(a.as_double().abs()));
        }
        Ok(())
    })?;
    ctx.register_native("function Math.round(a)", |_, scope| {
        let a = scope.get_parameter("a");
        if a.is_int() {
            scope.set_return_value(Value::int(a.as_int()));
        } else if a.is_double() {
            scope.set_return_value(Value::double(round_half_away(a.as_double())));
        }
        Ok(())
    })?;
    ctx.register_native("function Math.sign(a)", |_, scope| {
        let a = scope.get_parameter("a");
        if a.is_int() {
            scope.set_return_value(Value::int(a.as_int().signum()));
        } else if a.is_double() {
            let x = a.as_double();
            let sign = if x > 0.0 { 1.0 } else if x < 0.0 { -1.0 } else { 0.0 };
            scope.set_return_value(Value::double(sign));
        }
        Ok(())
    })?;
    ctx.register_native("function Math.min(a,b)", |_, scope| {
        let (a, b) = (scope.get_parameter("a"), scope.get_parameter("b"));
        scope.set_return_value(if a.is_int() && b.is_int() {
            Value::int(a.as_int().min(b.as_int()))
        } else {
            Value::double(a.as_double().min(b.as_double()))
        });
        Ok(())
    })?;
    ctx.register_native("function Math.max(a,b)", |_, scope| {
        let (a, b) = (scope.get_parameter("a"), scope.get_parameter("b"));
        scope.set_return_value(if a.is_int() && b.is_int() {
            Value::int(a.as_int().max(b.as_int()))
        } else {
            Value::double(a.as_double().max(b.as_double()))
        });
        Ok(())
    })?;
    ctx.register_native("function Math.range(x,a,b)", |_, scope| {
        let x = scope.get_parameter("x");
        let (a, b) = (scope.get_parameter("a"), scope.get_parameter("b"));
        scope.set_return_value(if x.is_int() && a.is_int() && b.is_int() {
            Value::int(clamp(x.as_int(), a.as_int(), b.as_int()))
        } else {
            Value::double(clamp(x.as_double(), a.as_double(), b.as_double()))
        });
        Ok(())
    })?;

    ctx.register_native("function Math.PI()", |_, scope| {
        scope.set_return_value(Value::double(std::f64::consts::PI));
        Ok(())
    })?;
    ctx.register_native("function Math.E()", |_, scope| {
        scope.set_return_value(Value::double(std::f64::consts::E));
        Ok(())
    })?;
    ctx.register_native("function Math.pow(a,b)", |_, scope| {
        let a = scope.get_parameter("a").as_double();
        let b = scope.get_parameter("b").as_double();
        scope.set_return_value(Value::double(a.powf(b)));
        Ok(())
    })?;
    ctx.register_native("function Math.sqr(a)", |_, scope| {
        let a = scope.get_parameter("a").as_double();
        scope.set_return_value(Value::double(a * a));
        Ok(())
    })?;

    for &(name, f) in UNARY {
        ctx.register_native(&format!("function Math.{name}(a)"), move |_, scope| {
            let a = scope.get_parameter("a").as_double();
            scope.set_return_value(Value::double(f(a)));
            Ok(())
        })?;
    }
    Ok(())
}

/// Round half away from zero.
fn round_half_away(x: f64) -> f64 {
    if x > 0.0 { (x + 0.5).trunc() } else { (x - 0.5).trunc() }
}

/// `x` limited to `[lo, hi]`; unlike `Ord::clamp` this never panics on
/// `lo > hi`.
fn clamp<T: PartialOrd>(x: T, lo: T, hi: T) -> T {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn number(ctx: &mut Context, src: &str) -> f64 {
        ctx.evaluate_complex(src).unwrap().value().as_double()
    }

    fn context() -> Context {
        let config = EngineConfig {
            rng_seed: Some(42),
            ..EngineConfig::default()
        };
        Context::with_config(config).unwrap()
    }

    #[test]
    fn test_integer_preserving() {
        let cases = vec![
            ("Math.abs(-3)", "3"),
            ("Math.abs(-2.5)", "2.5"),
            ("Math.round(2.5)", "3"),
            ("Math.round(-2.5)", "-3"),
            ("Math.round(2.4)", "2"),
            ("Math.min(3, 7)", "3"),
            ("Math.max(3, 7.5)", "7.5"),
            ("Math.range(12, 0, 10)", "10"),
            ("Math.range(-1, 0, 10)", "0"),
            ("Math.range(0.5, 0, 1)", "0.5"),
            ("Math.sign(-9)", "-1"),
            ("Math.sign(0)", "0"),
            ("Math.sign(0.25)", "1"),
        ];
        let mut ctx = context();
        for (src, expected) in cases {
            assert_eq!(ctx.evaluate(src).unwrap(), expected, "{src}");
        }
    }

    #[test]
    fn test_floating_point() {
        let cases = vec![
            ("Math.PI()", std::f64::consts::PI),
            ("Math.E()", std::f64::consts::E),
            ("Math.sqrt(16)", 4.0),
            ("Math.sqr(1.5)", 2.25),
            ("Math.pow(2, 10)", 1024.0),
            ("Math.toDegrees(Math.PI())", 180.0),
            ("Math.log(Math.E())", 1.0),
            ("Math.log10(1000)", 3.0),
            ("Math.atanh(0)", 0.0),
            ("Math.cos(0)", 1.0),
        ];
        let mut ctx = context();
        for (src, expected) in cases {
            let got = number(&mut ctx, src);
            assert!((got - expected).abs() < 1e-9, "{src}: {got}");
        }
    }

    #[test]
    fn test_random_ranges() {
        let mut ctx = context();
        for _ in 0..200 {
            let r = number(&mut ctx, "Math.rand()");
            assert!((0.0..1.0).contains(&r));
            let n = number(&mut ctx, "Math.randInt(3, 5)");
            assert!((3.0..=5.0).contains(&n), "{n}");
        }
    }

    #[test]
    fn test_seed_makes_sequence_repeatable() {
        let first: Vec<String> = {
            let mut ctx = context();
            (0..5).map(|_| ctx.evaluate("Math.randInt(0, 1000)").unwrap()).collect()
        };
        let mut ctx = context();
        let second: Vec<String> = (0..5)
            .map(|_| ctx.evaluate("Math.randInt(0, 1000)").unwrap())
            .collect();
        assert_eq!(first, second);
    }
}
