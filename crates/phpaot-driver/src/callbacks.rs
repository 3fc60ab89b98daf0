use std::{ops::ControlFlow, path::PathBuf};

use phpaot::{
    diagnostics::DiagnosticEngine,
    ir::{self, opt::OptimizeLevel},
    session::CompileSession,
    target::Target,
};
use phpaot_syntax::ast::Ast;

/// Everything one compile invocation needs up front.
#[derive(Debug, Clone)]
pub struct Config {
    pub target: Option<Target>,
    pub opt_level: OptimizeLevel,
    pub strip_symbols: bool,
    pub static_link: bool,
    pub output: Option<PathBuf>,
    pub emit_ir: bool,
    pub input_path: PathBuf,
    pub ast: Ast,
}

/// Distinguishes a rejected program from a back-end/infrastructure failure,
/// since the CLI maps the two to different exit codes (1 vs. 3).
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The program was rejected by the front half of the pipeline: the
    /// message is the rendered diagnostic log.
    #[error("{0}")]
    CompileFailed(String),
    #[error("failed to initialize compile session: {0}")]
    SessionInit(#[from] phpaot::session::SessionInitError),
    #[error("internal IR invariant violated: {0}")]
    InternalIr(#[from] phpaot::ir::InternalIRInvariant),
    #[error("failed to write intermediate Zig source: {0}")]
    Io(#[from] std::io::Error),
    #[error("back-end invocation failed: {0}")]
    BackendFailed(#[from] phpaot::driver::BackendInvocationFailed),
}

impl DriverError {
    /// Whether this failure belongs to the back-end (exit code 3) rather
    /// than to program rejection (exit code 1).
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, DriverError::BackendFailed(_))
    }
}

#[derive(Debug)]
pub enum Outcome<Ret> {
    /// The compilation succeeded.
    Ok,
    /// The compilation failed.
    Err(DriverError),
    /// The compilation returned early.
    EarlyReturn(Ret),
}

impl<Ret> Outcome<Ret> {
    pub fn to_result_with(
        self,
        f: impl FnOnce(Ret) -> Result<(), DriverError>,
    ) -> Result<(), DriverError> {
        match self {
            Self::Ok => Ok(()),
            Self::Err(e) => Err(e),
            Self::EarlyReturn(ret) => f(ret),
        }
    }
}

impl<Ret> From<DriverError> for Outcome<Ret> {
    fn from(err: DriverError) -> Self {
        Self::Err(err)
    }
}

/// Callbacks fired at various stages of compilation.
///
/// The callbacks are called in the following order:
///
/// 1. `after_symbols`
/// 2. `after_infer`
/// 3. `after_generate`
/// 4. `after_optimize`
/// 5. `after_emit`
/// 6. `after_compile`
///
/// If a callback returns `ControlFlow::Break`, the compiler stops and
/// returns early.
pub trait Callbacks {
    type Output;

    /// Called after functions have been declared in the symbol table, before
    /// type inference runs.
    fn after_symbols(
        &mut self,
        _session: &CompileSession,
    ) -> ControlFlow<Self::Output> {
        ControlFlow::Continue(())
    }

    /// Called after type inference has populated the symbol table's function
    /// return types.
    fn after_infer(&mut self, _session: &CompileSession) -> ControlFlow<Self::Output> {
        ControlFlow::Continue(())
    }

    /// Called after IR generation, before optimization.
    fn after_generate(
        &mut self,
        _session: &CompileSession,
        _module: &ir::Module,
    ) -> ControlFlow<Self::Output> {
        ControlFlow::Continue(())
    }

    /// Called after the optimizer has run.
    fn after_optimize(
        &mut self,
        _session: &CompileSession,
        _module: &ir::Module,
        _stats: ir::opt::Stats,
    ) -> ControlFlow<Self::Output> {
        ControlFlow::Continue(())
    }

    /// Called after the module has been lowered to Zig source text.
    fn after_emit(
        &mut self,
        _session: &CompileSession,
        _source: &str,
    ) -> ControlFlow<Self::Output> {
        ControlFlow::Continue(())
    }

    fn after_compile(
        &mut self,
        _session: &CompileSession,
        _binary: PathBuf,
    ) -> ControlFlow<Self::Output> {
        ControlFlow::Continue(())
    }
}

/// Run the compiler.
///
/// Drives one [`Ast`] through symbol declaration, type inference, IR
/// generation, optimization, textual emission, and the back-end, reporting
/// through `session.diagnostics` at every stage and calling `cb` between
/// them.
#[tracing::instrument(level = "info", skip_all)]
pub fn run<C: Callbacks>(cb: &mut C, cfg: Config) -> Outcome<C::Output> {
    let Config {
        target,
        opt_level,
        strip_symbols,
        static_link,
        output,
        emit_ir,
        input_path,
        mut ast,
    } = cfg;

    let mut session = match CompileSession::new() {
        Ok(session) => session,
        Err(e) => return Outcome::Err(e.into()),
    };

    let file = session
        .files
        .add(input_path.display().to_string(), String::new());

    phpaot::symbols::declare_functions(&ast, &mut session.symbols, &mut session.diagnostics, file);
    if let ControlFlow::Break(ret) = cb.after_symbols(&session) {
        return Outcome::EarlyReturn(ret);
    }
    if let Some(e) = bail_on_errors(&session.diagnostics, &session.files) {
        return Outcome::Err(e);
    }

    phpaot::infer::infer(&ast, &mut session.symbols, &mut session.diagnostics, file);
    if let ControlFlow::Break(ret) = cb.after_infer(&session) {
        return Outcome::EarlyReturn(ret);
    }
    if let Some(e) = bail_on_errors(&session.diagnostics, &session.files) {
        return Outcome::Err(e);
    }

    let module_name = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("module")
        .to_string();

    let mut module = phpaot::ir::gen::generate(
        &mut ast,
        &mut session.symbols,
        &mut session.diagnostics,
        file,
        module_name,
    );
    if let ControlFlow::Break(ret) = cb.after_generate(&session, &module) {
        return Outcome::EarlyReturn(ret);
    }
    if let Some(e) = bail_on_errors(&session.diagnostics, &session.files) {
        return Outcome::Err(e);
    }

    if let Err(e) = ir::check_invariants(&module) {
        return Outcome::Err(e.into());
    }

    let stats = ir::opt::optimize(&mut module, opt_level);
    if let ControlFlow::Break(ret) = cb.after_optimize(&session, &module, stats) {
        return Outcome::EarlyReturn(ret);
    }

    if emit_ir {
        let dump = ir::dump::dump(&module, &ast.interner);
        if let ControlFlow::Break(ret) = cb.after_emit(&session, &dump) {
            return Outcome::EarlyReturn(ret);
        }
        return Outcome::Ok;
    }

    let source = phpaot::emit::emit(&module, &ast.interner);
    if let ControlFlow::Break(ret) = cb.after_emit(&session, &source) {
        return Outcome::EarlyReturn(ret);
    }

    let source_path = session.temp_dir().join("module.zig");
    if let Err(e) = std::fs::write(&source_path, &source) {
        return Outcome::Err(e.into());
    }

    let driver_config = phpaot::driver::Config::from_config(
        target,
        opt_level,
        strip_symbols,
        static_link,
    );
    let output_path = driver_config.generate_output_path(&input_path, output.as_deref());

    if let Err(e) = phpaot::driver::invoke(&driver_config, &source_path, &output_path) {
        return Outcome::Err(e.into());
    }

    if let ControlFlow::Break(ret) = cb.after_compile(&session, output_path) {
        return Outcome::EarlyReturn(ret);
    }

    Outcome::Ok
}

/// Stop the pipeline with an error if the diagnostics collected so far
/// include at least one `Error`-severity entry.
fn bail_on_errors(
    diagnostics: &DiagnosticEngine,
    files: &phpaot::files::SourceMap,
) -> Option<DriverError> {
    if diagnostics.has_errors() {
        Some(DriverError::CompileFailed(diagnostics.render_plain(files)))
    } else {
        None
    }
}
