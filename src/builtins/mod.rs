//! The built-in library installed by [`Context::with_config`] when
//! `builtins` is enabled. Everything goes through
//! [`Context::register_native`], so hosts can install the same set on a
//! bare [`Context::new`] by calling [`register_all`].

mod functions;
mod math;

use log::debug;

use crate::context::Context;
use crate::error::Result;

pub fn register_all(ctx: &mut Context) -> Result<()> {
    functions::register(ctx)?;
    math::register(ctx)?;
    debug!("built-in library installed");
    Ok(())
}
