//! SQL generation module.
//!
//! - [`compiler`] - QuerySpec to SQL text
//! - [`token`] - Token types for SQL generation

pub mod compiler;
pub mod token;

pub use compiler::{compile, CompileError, CompileResult, Compiler, DEFAULT_MAX_DEPTH};
pub use token::{Token, TokenStream};
