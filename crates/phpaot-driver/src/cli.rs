use std::{ops::ControlFlow, path::PathBuf, str::FromStr};

use anyhow::Context;
use clap::Parser;
use phpaot::{
    ir::opt::OptimizeLevel,
    session::CompileSession,
    target::{SUPPORTED_TARGETS, Target},
};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use crate::{Callbacks, Config, DriverError, Outcome};

/// A `main()` function that parses the command line arguments and runs the
/// compiler.
#[doc(hidden)]
pub fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.list_targets {
        println!("Supported target platforms:");
        for target in SUPPORTED_TARGETS {
            println!("  {}", target.to_triple());
        }
        println!("Select one with --target=<triple>.");
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.verbosity.tracing_level_filter().to_string()));

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    match cli.run() {
        Ok(()) => Ok(()),
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e}");
            std::process::exit(code);
        }
    }
}

/// Map a failed run to the exit code the spec assigns its cause: `1` for a
/// rejected program, `3` for a back-end/linker failure. `main` never reaches
/// exit code `2` this way — invalid arguments are rejected by [`Cli::parse`]
/// itself, which exits with that code before [`Cli::run`] is ever called.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DriverError>() {
        Some(e) if e.is_backend_failure() => 3,
        _ => 1,
    }
}

/// Compile a pre-parsed PHP program (a JSON-serialized [`phpaot_syntax::ast::Ast`])
/// ahead of time.
#[derive(Debug, clap::Parser)]
#[command(name = "phpaot", about = "Ahead-of-time PHP compiler")]
struct Cli {
    /// Print the supported target platforms and exit.
    #[clap(long)]
    list_targets: bool,
    /// Target triple to compile for (defaults to the host).
    #[clap(long, value_parser = parse_target)]
    target: Option<Target>,
    /// Optimization level.
    #[clap(short = 'O', long = "optimize", value_enum, default_value = "release-safe")]
    optimize: OptArg,
    /// The output file to write the compiled executable to.
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// Strip symbols from the emitted executable.
    #[clap(long)]
    strip: bool,
    /// Print the generated IR instead of invoking the back-end.
    #[clap(long)]
    emit_ir: bool,
    #[clap(flatten)]
    verbosity: clap_verbosity_flag::Verbosity,
    /// Path to a JSON-serialized AST produced by the PHP front end.
    ///
    /// Required unless `--list-targets` is given.
    #[clap(required_unless_present = "list_targets")]
    input: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
enum OptArg {
    Debug,
    ReleaseSafe,
    ReleaseFast,
    ReleaseSmall,
}

impl From<OptArg> for OptimizeLevel {
    fn from(value: OptArg) -> Self {
        match value {
            OptArg::Debug => OptimizeLevel::None,
            OptArg::ReleaseSafe => OptimizeLevel::Basic,
            OptArg::ReleaseFast => OptimizeLevel::Aggressive,
            OptArg::ReleaseSmall => OptimizeLevel::Size,
        }
    }
}

impl Cli {
    #[tracing::instrument(level = "info", skip_all)]
    pub fn run(self) -> anyhow::Result<()> {
        let input = self
            .input
            .clone()
            .expect("clap guarantees `input` unless --list-targets, handled earlier");

        let contents = std::fs::read_to_string(&input)
            .with_context(|| format!("failed to read {}", input.display()))?;
        let ast = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse AST from {}", input.display()))?;

        let cfg = Config {
            target: self.target,
            opt_level: self.optimize.into(),
            strip_symbols: self.strip,
            static_link: false,
            output: self.output.clone(),
            emit_ir: self.emit_ir,
            input_path: input,
            ast,
        };

        let mut cb = DefaultCallbacks::new(self.emit_ir, self.output.clone());

        match crate::callbacks::run(&mut cb, cfg) {
            Outcome::Ok => Ok(()),
            Outcome::Err(e) => Err(e.into()),
            Outcome::EarlyReturn(result) => result.map_err(anyhow::Error::from),
        }
    }
}

#[derive(Debug, Clone)]
struct DefaultCallbacks {
    emit_ir: bool,
    output: Option<PathBuf>,
}

impl DefaultCallbacks {
    fn new(emit_ir: bool, output: Option<PathBuf>) -> Self {
        DefaultCallbacks { emit_ir, output }
    }
}

impl Callbacks for DefaultCallbacks {
    type Output = Result<(), DriverError>;

    fn after_emit(
        &mut self,
        _session: &CompileSession,
        source: &str,
    ) -> ControlFlow<Self::Output> {
        // With `--emit-ir`, `source` is the IR dump and this is the last
        // stage the pipeline runs; otherwise it's the Zig translation unit
        // and the pipeline still has emission-to-disk and the back-end ahead
        // of it, so there's nothing to do here.
        if self.emit_ir {
            match &self.output {
                Some(path) => {
                    if let Err(e) = std::fs::write(path, source) {
                        eprintln!("error: failed to write IR dump to {}: {e}", path.display());
                    }
                }
                None => eprint!("{source}"),
            }
        }
        ControlFlow::Continue(())
    }
}

fn parse_target(s: &str) -> anyhow::Result<Target> {
    Target::from_str(s).map_err(|e| anyhow::anyhow!("{}", e))
}
