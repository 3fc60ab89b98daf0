//! Diagnostic collection (component C1).
//!
//! Every phase of the pipeline is handed a `&mut DiagnosticEngine` and
//! reports into it instead of returning early; nothing in the core panics on
//! a malformed program. [`DiagnosticEngine::has_errors`] is the only thing
//! phases downstream of the first one check before proceeding.

use codespan_reporting::diagnostic::{Label, Severity as CodespanSeverity};

use crate::files::{FileId, SourceMap};
use phpaot_syntax::Span;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

/// A single diagnostic message, optionally anchored to a source location.
///
/// Serializable one-way only: `code` is a `&'static str` naming a compiled-in
/// constant, which can't round-trip back out of an arbitrary deserializer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<(FileId, Span)>,
    /// A short machine-readable code (e.g. `"E-DUP-SYM"`). Informative only.
    pub code: Option<&'static str>,
}

impl Diagnostic {
    pub fn to_codespan(&self) -> codespan_reporting::diagnostic::Diagnostic<FileId> {
        let severity = match self.severity {
            Severity::Error => CodespanSeverity::Error,
            Severity::Warning => CodespanSeverity::Warning,
            Severity::Note => CodespanSeverity::Note,
        };

        let mut diag =
            codespan_reporting::diagnostic::Diagnostic::new(severity).with_message(&self.message);

        if let Some(code) = self.code {
            diag = diag.with_code(code);
        }

        if let Some((file, span)) = self.location {
            diag = diag.with_labels(vec![Label::primary(file, span)]);
        }

        diag
    }
}

/// An append-only, severity-tagged log of everything the pipeline reported.
///
/// Insertion order is preserved and never deduplicated — two identical
/// diagnostics reported twice show up twice, because they usually indicate
/// the pass visited the offending node twice (a bug worth seeing).
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        location: Option<(FileId, Span)>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            message: message.into(),
            location,
            code: None,
        });
    }

    pub fn report_with_code(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        location: Option<(FileId, Span)>,
        code: &'static str,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            message: message.into(),
            location,
            code: Some(code),
        });
    }

    pub fn error(&mut self, message: impl Into<String>, location: Option<(FileId, Span)>) {
        self.report(Severity::Error, message, location);
    }

    pub fn warning(&mut self, message: impl Into<String>, location: Option<(FileId, Span)>) {
        self.report(Severity::Warning, message, location);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }

    /// Render every diagnostic as `<file>:<line>:<col>: <severity>: <message>`.
    pub fn render_plain(&self, files: &SourceMap) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        for diag in &self.diagnostics {
            let severity = match diag.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Note => "note",
            };
            match diag.location {
                Some((file, span)) => {
                    let path = files.path(file);
                    let _ = writeln!(
                        out,
                        "{}:{}:{}: {}: {}",
                        path, span.line, span.column, severity, diag.message
                    );
                }
                None => {
                    let _ = writeln!(out, "<unknown>: {}: {}", severity, diag.message);
                }
            }
        }

        let _ = writeln!(
            out,
            "{} error(s), {} warning(s)",
            self.error_count(),
            self.warning_count()
        );

        out
    }
}
