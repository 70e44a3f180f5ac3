//! An embeddable interpreter for a small JavaScript-like language.
//!
//! Scripts are parsed and executed in a single pass over the source text;
//! host code installs native functions and exchanges values with the
//! script through a [`Context`].
//!
//! ```
//! use viewscript_rust::{Context, EngineConfig, Value};
//!
//! let mut ctx = Context::with_config(EngineConfig::default()).unwrap();
//! ctx.register_native("function add(a,b)", |_, scope| {
//!     let sum = scope.get_parameter("a").as_int() + scope.get_parameter("b").as_int();
//!     scope.set_return_value(Value::int(sum));
//!     Ok(())
//! })
//! .unwrap();
//! assert_eq!(ctx.evaluate("add(2,3)").unwrap(), "5");
//! ```

pub mod builtins;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod parser;
pub mod processor;
pub mod writer;

pub use config::EngineConfig;
pub use context::Context;
pub use error::{Exception, Position, ScriptError};
pub use model::{Binding, Kind, Value};

use anyhow::Context as _;
use clap::Parser;
use log::info;

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    cli::init_logging(args.log_level());

    // 1. ── Configure ──────────────────────────────────────────────────
    let config = match &args.config {
        Some(path) => config::load(path)?,
        None => EngineConfig::default(),
    };
    let mut ctx = Context::with_config(config)
        .with_context(|| "Creating script context")?;

    // 2. ── Execute ────────────────────────────────────────────────────
    for path in &args.scripts {
        let code = std::fs::read_to_string(path)
            .with_context(|| format!("Reading {}", path.display()))?;
        info!("executing {}", path.display());
        ctx.execute(&code)
            .with_context(|| format!("Executing {}", path.display()))?;
    }

    // 3. ── Report ─────────────────────────────────────────────────────
    for expr in &args.eval {
        let result = ctx
            .evaluate(expr)
            .with_context(|| format!("Evaluating `{expr}`"))?;
        println!("{result}");
    }
    if args.dump {
        println!("{}", writer::to_json(ctx.root(), ctx.config().max_json_array_len));
    }

    Ok(())
}
