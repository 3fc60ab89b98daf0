//! phpaot compiler driver
//!
//! This crate provides the command-line interface and orchestration for the
//! `phpaot` compiler. It wires together the core stages from the `phpaot`
//! crate — symbol declaration, type inference, IR generation, optimization,
//! textual emission, and back-end invocation — manages the compile session's
//! temporary directory, and exposes a small callback API for tooling and
//! testing.
//!
//! What this crate offers
//! ----------------------
//! - A `main()` entrypoint for the `phpaot` binary: [`cli::main`]
//! - A stage runner with callbacks: [`run`] and the [`Callbacks`] trait
//! - A configuration object for compilation invocations: [`Config`]
//! - An outcome type capturing success, error, or early return: [`Outcome`]
//!
//! Running the pipeline with callbacks
//! -----------------------------------
//! The [`run`] function executes the full pipeline: symbol declaration →
//! type inference → IR generation → optimization → emission → back-end.
//!
//! You can implement [`Callbacks`] to observe intermediate artifacts, collect
//! diagnostics, or stop the pipeline early — see `crates/phpaot-driver/src/cli.rs`
//! for the default implementation used by the binary.
//!
//! CLI entrypoint
//! --------------
//! The binary uses [`cli::main`] to parse flags (target triple, optimization
//! level, output path, `--emit-ir`, verbosity, etc.), set up tracing, and
//! delegate to [`run`].

mod callbacks;
mod cli;

pub use crate::{
    callbacks::{Callbacks, Config, DriverError, Outcome, run},
    cli::main,
};
