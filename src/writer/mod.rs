//! Text renderings of script values: JSON for `JSON.stringify` and `--dump`,
//! and the indented debug tree printed by `trace()`.

pub mod json;
pub mod trace;

pub use json::to_json;
pub use trace::trace;
