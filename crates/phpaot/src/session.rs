//! The compilation session (component C13): the scoped owner of one
//! invocation's diagnostic engine, symbol table, source map, and temporary
//! directory. Every one of those is torn down on `Drop`, regardless of
//! whether the session ended in success, a reported error, or an early
//! cancellation — there is no separate "cleanup" path to forget to call.

use std::path::Path;

use tempfile::TempDir;

use crate::diagnostics::DiagnosticEngine;
use crate::files::SourceMap;
use crate::symbols::SymbolTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("failed to create a temporary directory for the compile session")]
pub struct SessionInitError;

/// Owns everything a single compiler invocation needs and nothing it
/// doesn't: no process-wide globals are read or written anywhere in this
/// crate, so two sessions can run in the same process without interfering.
pub struct CompileSession {
    pub diagnostics: DiagnosticEngine,
    pub symbols: SymbolTable,
    pub files: SourceMap,
    temp_dir: TempDir,
}

impl CompileSession {
    pub fn new() -> Result<Self, SessionInitError> {
        let temp_dir = tempfile::Builder::new()
            .prefix("phpaot-")
            .tempdir()
            .map_err(|_| SessionInitError)?;

        Ok(CompileSession {
            diagnostics: DiagnosticEngine::new(),
            symbols: SymbolTable::new(),
            files: SourceMap::new(),
            temp_dir,
        })
    }

    /// The session's private scratch directory, holding the emitted
    /// back-end translation unit and any other intermediate artifacts.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

impl Drop for CompileSession {
    fn drop(&mut self) {
        tracing::debug!(dir = %self.temp_dir.path().display(), "tearing down compile session");
        // `self.temp_dir`'s own `Drop` removes the directory tree; nothing
        // else here owns resources that outlive the session.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_dir_is_removed_once_the_session_drops() {
        let session = CompileSession::new().unwrap();
        let path = session.temp_dir().to_path_buf();
        assert!(path.exists());
        drop(session);
        assert!(!path.exists());
    }

    #[test]
    fn fresh_session_has_no_diagnostics() {
        let session = CompileSession::new().unwrap();
        assert!(!session.has_errors());
    }
}
