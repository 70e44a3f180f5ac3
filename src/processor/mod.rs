//! The interpreter core: tokenizer and the evaluating parser that runs on
//! top of it.

pub mod evaluator;
pub mod lexer;
