//! phpaot — core ahead-of-time PHP compiler library.
//!
//! This crate implements the middle and back end of a PHP ahead-of-time
//! compiler: it takes a pre-parsed PHP AST (the front end is a separate,
//! out-of-scope collaborator) and drives it through symbol resolution, type
//! inference, IR generation, optimization, textual code emission, and
//! finally a native back-end (`zig build-exe`) to produce an executable.
//!
//! The pipeline is a straight sequence, not a query graph — there is no
//! incremental recomputation here, by design. Every phase takes its inputs
//! explicitly (diagnostic engine, symbol table, string interner) rather than
//! reaching into global state, which keeps the compiler re-entrant and easy
//! to unit test one phase at a time:
//!
//! - Symbol table: [`symbols::SymbolTable`]
//! - Type model: [`types::InferredType`]
//! - IR data model: [`ir`]
//! - IR generation: [`ir::gen::generate`]
//! - IR optimization: [`ir::opt::optimize`]
//! - Textual emission: [`emit::emit`]
//! - Back-end invocation: [`driver`]
//!
//! A [`session::CompileSession`] owns the diagnostics, symbol table, source
//! map, and temporary directory for one invocation and tears all of it down
//! on drop, whatever the outcome.
//!
//! Quick start
//! -----------
//! Lower an already-parsed, empty program through the pipeline down to Zig
//! source text:
//!
//! ```rust
//! use phpaot::{files::SourceMap, session::CompileSession};
//! use phpaot_syntax::ast::{Ast, AstNodeKind};
//! use phpaot_syntax::Span;
//!
//! let mut session = CompileSession::new().unwrap();
//! let file = session.files.add("empty.php", "<?php");
//!
//! let mut ast = Ast::new();
//! let root = ast.push(AstNodeKind::Root { items: vec![] }, Span::DUMMY);
//! ast.set_root(root);
//!
//! let module = phpaot::ir::gen::generate(
//!     &mut ast,
//!     &mut session.symbols,
//!     &mut session.diagnostics,
//!     file,
//!     "empty",
//! );
//!
//! let text = phpaot::emit::emit(&module, &ast.interner);
//! assert!(text.contains("pub fn main"));
//! ```

pub mod diagnostics;
pub mod driver;
pub mod emit;
pub mod files;
pub mod infer;
pub mod ir;
pub mod runtime_abi;
pub mod session;
pub mod symbols;
mod text;
pub mod target;
pub mod types;

pub use crate::text::Text;
