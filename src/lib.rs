//! A single-pass compiler for Patito, a tiny imperative language with
//! globals, functions, `int`/`float` arithmetic, relational expressions,
//! `if`/`else`, `while`/`do`, `print`, and `return`.
//!
//! Compilation lowers source text directly to a flat quadruple intermediate
//! representation — no AST is materialized. A [`CompileContext`] holds every
//! table/stack/allocator for one compilation; [`crate::parser::Parser`]
//! drives it token by token.
//!
//! ```no_run
//! let source = "program p; var x:int; main { x = 1 + 2; } end";
//! let quads = patitoc::compile_source(source).unwrap();
//! for q in &quads {
//!     println!("{q}");
//! }
//! ```

pub mod address;
pub mod constants;
pub mod context;
pub mod cube;
pub mod errors;
pub mod lexer;
pub mod parser;
pub mod position;
pub mod quadruples;
pub mod serializer;
pub mod stacks;
pub mod symbols;
pub mod token;
pub mod types;

use std::fs;
use std::io::Write;
use std::path::Path;

pub use context::CompileContext;
pub use errors::CompileError;
pub use quadruples::Quadruple;
pub use types::Type;

/// Compiles Patito source text and returns its emitted quadruples.
pub fn compile_source(source: &str) -> Result<Vec<Quadruple>, CompileError> {
    let ctx = compile_to_context(source)?;
    Ok(ctx.quads.iter().cloned().collect())
}

/// Compiles Patito source text into a full [`CompileContext`], for callers
/// that need more than the quadruple list (e.g. to serialize `.patitoc`).
pub fn compile_to_context(source: &str) -> Result<CompileContext, CompileError> {
    let tokens = lexer::Lexer::new(source).tokenize()?;
    parser::Parser::new(tokens).parse()
}

/// Reads `path`, compiles it, and returns its emitted quadruples.
pub fn compile_file(path: &Path) -> Result<Vec<Quadruple>, CompileError> {
    let source = fs::read_to_string(path).map_err(|e| {
        CompileError::Serialize(errors::SerializeError::Io(e))
    })?;
    compile_source(&source)
}

/// Compiles `source` and writes its `.patitoc` object file to `writer`.
pub fn compile_and_write(source: &str, writer: &mut impl Write) -> Result<CompileContext, CompileError> {
    let ctx = compile_to_context(source)?;
    serializer::write_patitoc(&ctx, writer)?;
    Ok(ctx)
}
