//! The symbol table (component C4).
//!
//! PHP variables have function scope, not block scope: an `if` or `while`
//! body does not introduce a new variable scope even though it does open a
//! new lexical region for diagnostics purposes. [`SymbolTable`] models this
//! by keeping two different things on the scope stack — lexical nesting for
//! lookups, and a separate "owning" function/global scope that variable
//! declarations are hoisted to.

use std::collections::{HashMap, HashSet};

use phpaot_syntax::ast::{Ast, AstNodeKind};
use phpaot_syntax::{interner::Symbol, Span};

use crate::diagnostics::{DiagnosticEngine, Severity};
use crate::files::FileId;
use crate::types::InferredType;

const MAIN_ALREADY_DECLARED: &str = "E-DUP-MAIN";
const DUPLICATE_SYMBOL: &str = "E-DUP-SYM";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Global,
    Function,
    /// A lexical region (if/while/for/block body) that does not own
    /// variables of its own; declarations made here are hoisted to the
    /// nearest enclosing `Function` or `Global` scope.
    Block,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Variable,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: Symbol,
    pub kind: SymbolKind,
    pub ty: InferredType,
    pub declared_at: (FileId, Span),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("symbol already declared in this scope")]
pub struct DuplicateSymbol;

struct Scope {
    kind: ScopeKind,
    /// The index of the nearest enclosing `Function`/`Global` scope that
    /// variable declarations made here are hoisted to — itself, if this
    /// scope is one of those kinds.
    owning_scope: usize,
    functions: HashMap<Symbol, SymbolInfo>,
    variables: HashMap<Symbol, SymbolInfo>,
}

impl Scope {
    fn new(kind: ScopeKind, owning_scope: usize) -> Self {
        Scope {
            kind,
            owning_scope,
            functions: HashMap::new(),
            variables: HashMap::new(),
        }
    }
}

/// A stack of lexical scopes, tracking variable/function declarations and
/// their inferred types.
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::new(ScopeKind::Global, 0)],
        }
    }

    pub fn enter_scope(&mut self, kind: ScopeKind) {
        let owning_scope = match kind {
            ScopeKind::Global | ScopeKind::Function => self.scopes.len(),
            ScopeKind::Block => self.current_owning_scope(),
        };
        self.scopes.push(Scope::new(kind, owning_scope));
    }

    pub fn leave_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot leave the global scope");
        self.scopes.pop();
    }

    fn current_owning_scope(&self) -> usize {
        self.scopes.last().expect("at least one scope").owning_scope
    }

    /// Declare `name` as a symbol of `kind` with a starting type, at the
    /// scope that owns declarations of that kind. Functions and variables
    /// live in disjoint namespaces, so `f` can name both a function and a
    /// variable without conflict. Declaring an already-declared name of the
    /// same kind in the same owning scope is a [`DuplicateSymbol`] error.
    pub fn declare(
        &mut self,
        name: Symbol,
        kind: SymbolKind,
        ty: InferredType,
        declared_at: (FileId, Span),
    ) -> Result<(), DuplicateSymbol> {
        let owning = match kind {
            SymbolKind::Variable => self.current_owning_scope(),
            // Functions are always declared at global scope: PHP AOT here
            // has no nested function declarations to worry about re-scoping.
            SymbolKind::Function => 0,
        };

        let table = match kind {
            SymbolKind::Variable => &mut self.scopes[owning].variables,
            SymbolKind::Function => &mut self.scopes[owning].functions,
        };

        if table.contains_key(&name) {
            return Err(DuplicateSymbol);
        }

        table.insert(
            name,
            SymbolInfo {
                name,
                kind,
                ty,
                declared_at,
            },
        );
        Ok(())
    }

    /// Walk outward from the current scope looking for `name` of `kind`,
    /// following each block scope up to its owning function/global scope
    /// and then to the global scope.
    pub fn lookup(&self, name: Symbol, kind: SymbolKind) -> Option<&SymbolInfo> {
        if kind == SymbolKind::Function {
            return self.scopes[0].functions.get(&name);
        }

        let mut owning = self.current_owning_scope();
        loop {
            if let Some(info) = self.scopes[owning].variables.get(&name) {
                return Some(info);
            }
            if owning == 0 {
                return None;
            }
            owning = self.scopes[owning].owning_scope;
        }
    }

    /// Look up `name` of `kind` in the current owning scope only, without
    /// walking outward.
    pub fn lookup_local(&self, name: Symbol, kind: SymbolKind) -> Option<&SymbolInfo> {
        match kind {
            SymbolKind::Function => self.scopes[0].functions.get(&name),
            SymbolKind::Variable => {
                let owning = self.current_owning_scope();
                self.scopes[owning].variables.get(&name)
            }
        }
    }

    /// Widen the inferred type of an already-declared symbol. Idempotent
    /// when `ty` equals the symbol's current type.
    pub fn update_type(&mut self, name: Symbol, kind: SymbolKind, ty: InferredType) {
        let owning = match kind {
            SymbolKind::Variable => self.current_owning_scope(),
            SymbolKind::Function => 0,
        };
        let table = match kind {
            SymbolKind::Variable => &mut self.scopes[owning].variables,
            SymbolKind::Function => &mut self.scopes[owning].functions,
        };
        if let Some(info) = table.get_mut(&name) {
            info.ty = info.ty.widen(&ty);
        }
    }

    pub fn current_scope_kind(&self) -> ScopeKind {
        self.scopes.last().expect("at least one scope").kind
    }
}

/// Declare every top-level `function_decl` at global scope, once, ahead of
/// type inference and IR generation. A user-defined `main` is rejected with
/// [`DuplicateSymbol`] (resolving the spec's ambiguity about synthesizing
/// `main` over a user-defined one in the same name); two declarations of any
/// other name are likewise rejected. Safe to call on a table that already
/// has some of these functions declared (a no-op for those names), so
/// standalone callers of [`crate::ir::gen::generate`] or
/// [`crate::infer::infer`] don't have to coordinate who calls this first.
pub fn declare_functions(
    ast: &Ast,
    symbols: &mut SymbolTable,
    diagnostics: &mut DiagnosticEngine,
    file: FileId,
) {
    let root = ast.root();
    let AstNodeKind::Root { items } = &ast[root].kind else {
        return;
    };

    let main_symbol = ast.interner.get("main");
    let mut seen_in_this_call = HashSet::new();

    for &item in items {
        let AstNodeKind::FunctionDecl { name, .. } = &ast[item].kind else {
            continue;
        };
        let name = *name;
        let span = ast[item].span;

        if Some(name) == main_symbol {
            diagnostics.report_with_code(
                Severity::Error,
                "a user-defined `main` function conflicts with the synthesized entry point",
                Some((file, span)),
                MAIN_ALREADY_DECLARED,
            );
            continue;
        }

        if !seen_in_this_call.insert(name) {
            diagnostics.report_with_code(
                Severity::Error,
                format!("function `{}` is already declared", ast.resolve(name)),
                Some((file, span)),
                DUPLICATE_SYMBOL,
            );
            continue;
        }

        if symbols.lookup_local(name, SymbolKind::Function).is_some() {
            continue;
        }

        let _ = symbols.declare(name, SymbolKind::Function, InferredType::Unknown, (file, span));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phpaot_syntax::interner::StringInterner;

    fn loc() -> (FileId, Span) {
        (FileId::default(), Span::DUMMY)
    }

    #[test]
    fn variables_declared_in_nested_blocks_resolve_to_the_function_scope() {
        let mut interner = StringInterner::new();
        let x = interner.intern("x");

        let mut table = SymbolTable::new();
        table.enter_scope(ScopeKind::Function);
        table.enter_scope(ScopeKind::Block); // if-body
        table.enter_scope(ScopeKind::Block); // nested while-body

        table
            .declare(x, SymbolKind::Variable, InferredType::Unknown, loc())
            .unwrap();

        assert!(table.lookup_local(x, SymbolKind::Variable).is_some());

        table.leave_scope();
        table.leave_scope();
        // Still visible from the function scope, because it was hoisted there.
        assert!(table.lookup(x, SymbolKind::Variable).is_some());
    }

    #[test]
    fn duplicate_function_declaration_is_rejected() {
        let mut interner = StringInterner::new();
        let main = interner.intern("main");

        let mut table = SymbolTable::new();
        table
            .declare(main, SymbolKind::Function, InferredType::Unknown, loc())
            .unwrap();
        let err = table
            .declare(main, SymbolKind::Function, InferredType::Unknown, loc())
            .unwrap_err();
        assert_eq!(err, DuplicateSymbol);
    }

    #[test]
    fn functions_and_variables_share_a_name_without_conflict() {
        let mut interner = StringInterner::new();
        let echo = interner.intern("echo");

        let mut table = SymbolTable::new();
        table
            .declare(echo, SymbolKind::Function, InferredType::Unknown, loc())
            .unwrap();
        table.enter_scope(ScopeKind::Function);
        table
            .declare(echo, SymbolKind::Variable, InferredType::Unknown, loc())
            .unwrap();
    }

    #[test]
    fn updating_a_symbols_type_widens_rather_than_overwrites() {
        use crate::types::ConcreteType;

        let mut interner = StringInterner::new();
        let x = interner.intern("x");

        let mut table = SymbolTable::new();
        table.enter_scope(ScopeKind::Function);
        table
            .declare(
                x,
                SymbolKind::Variable,
                InferredType::concrete(ConcreteType::Int),
                loc(),
            )
            .unwrap();

        table.update_type(
            x,
            SymbolKind::Variable,
            InferredType::concrete(ConcreteType::Int),
        );
        assert_eq!(
            table.lookup(x, SymbolKind::Variable).unwrap().ty,
            InferredType::concrete(ConcreteType::Int)
        );

        table.update_type(
            x,
            SymbolKind::Variable,
            InferredType::concrete(ConcreteType::String),
        );
        assert_eq!(
            table.lookup(x, SymbolKind::Variable).unwrap().ty,
            InferredType::concrete(ConcreteType::Int).widen(&InferredType::concrete(ConcreteType::String))
        );
    }
}
