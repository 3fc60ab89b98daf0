//! The type inferencer (component C5): a bottom-up walk over the AST that
//! assigns an [`InferredType`] to every expression node and propagates the
//! result back into the symbol table (so a variable's declared type widens
//! as each assignment to it is visited).
//!
//! This runs as a pass ahead of IR generation so [`crate::symbols::SymbolTable`]
//! entries already carry their inferred types by the time [`crate::ir::gen`]
//! needs them; IR generation still tracks its own IR-level operand types
//! independently, since those can differ from the AST-level type once
//! lowering inserts explicit `int -> float` conversions.

use std::collections::HashMap;

use phpaot_syntax::ast::{Ast, AstNodeKind, BinaryOp, NodeId};
use phpaot_syntax::interner::Symbol;

use crate::diagnostics::{DiagnosticEngine, Severity};
use crate::files::FileId;
use crate::symbols::{ScopeKind, SymbolKind, SymbolTable};
use crate::types::{ConcreteType, InferredType};

const UNDEFINED_FUNCTION: &str = "W-UNDEF-FN";
const BAD_COERCION: &str = "W-COERCE";

/// A side table mapping every expression node visited to its inferred type.
pub type NodeTypes = HashMap<NodeId, InferredType>;

pub struct TypeInferencer<'a> {
    ast: &'a Ast,
    symbols: &'a mut SymbolTable,
    diagnostics: &'a mut DiagnosticEngine,
    file: FileId,
    types: NodeTypes,
}

pub fn infer(
    ast: &Ast,
    symbols: &mut SymbolTable,
    diagnostics: &mut DiagnosticEngine,
    file: FileId,
) -> NodeTypes {
    let mut inferencer = TypeInferencer {
        ast,
        symbols,
        diagnostics,
        file,
        types: HashMap::new(),
    };
    inferencer.run();
    inferencer.types
}

impl<'a> TypeInferencer<'a> {
    fn run(&mut self) {
        let root = self.ast.root();
        let AstNodeKind::Root { items } = &self.ast[root].kind else {
            panic!("Ast::root() must be a Root node");
        };
        let items = items.clone();

        // Declare every function up front (idempotent against a prior pass
        // over this same table) so forward and mutually recursive calls
        // resolve, and so IR generation sharing this table afterwards sees
        // no new declarations to make.
        crate::symbols::declare_functions(self.ast, self.symbols, self.diagnostics, self.file);

        for &item in &items {
            match &self.ast[item].kind {
                AstNodeKind::FunctionDecl { .. } => self.visit_function(item),
                _ => {
                    self.visit_stmt(item);
                }
            }
        }
    }

    fn visit_function(&mut self, node: NodeId) {
        let AstNodeKind::FunctionDecl { params, body, .. } = self.ast[node].kind.clone() else {
            unreachable!()
        };

        self.symbols.enter_scope(ScopeKind::Function);
        for &param in &params {
            if let AstNodeKind::Param { name, .. } = self.ast[param].kind {
                let span = self.ast[param].span;
                let _ = self.symbols.declare(
                    name,
                    SymbolKind::Variable,
                    InferredType::Unknown,
                    (self.file, span),
                );
            }
        }

        let mut return_ty = InferredType::Unknown;
        self.visit_block_collecting_returns(body, &mut return_ty);
        self.symbols.leave_scope();

        let AstNodeKind::FunctionDecl { name, .. } = self.ast[node].kind else {
            unreachable!()
        };
        // The function symbol already exists (declared up front in `run`);
        // widen its type with the inferred return type rather than
        // re-declaring it.
        self.symbols
            .update_type(name, SymbolKind::Function, return_ty);
    }

    fn visit_block_collecting_returns(&mut self, node: NodeId, return_ty: &mut InferredType) {
        let AstNodeKind::Block { stmts } = self.ast[node].kind.clone() else {
            panic!("expected Block node")
        };
        for stmt in stmts {
            self.visit_stmt_collecting_returns(stmt, return_ty);
        }
    }

    fn visit_stmt_collecting_returns(&mut self, node: NodeId, return_ty: &mut InferredType) {
        match self.ast[node].kind.clone() {
            AstNodeKind::Return { value } => {
                let ty = match value {
                    Some(v) => self.visit_expr(v),
                    None => InferredType::concrete(ConcreteType::Void),
                };
                *return_ty = return_ty.widen(&ty);
            }
            AstNodeKind::Block { .. } => self.visit_block_collecting_returns(node, return_ty),
            AstNodeKind::If {
                then_branch,
                else_branch,
                cond,
                ..
            } => {
                self.visit_expr(cond);
                self.visit_stmt_collecting_returns(then_branch, return_ty);
                if let Some(else_branch) = else_branch {
                    self.visit_stmt_collecting_returns(else_branch, return_ty);
                }
            }
            AstNodeKind::While { cond, body } | AstNodeKind::DoWhile { body, cond } => {
                self.visit_expr(cond);
                self.visit_stmt_collecting_returns(body, return_ty);
            }
            AstNodeKind::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.visit_expr(init);
                }
                if let Some(cond) = cond {
                    self.visit_expr(cond);
                }
                if let Some(step) = step {
                    self.visit_expr(step);
                }
                self.visit_stmt_collecting_returns(body, return_ty);
            }
            _ => self.visit_stmt(node),
        }
    }

    fn visit_stmt(&mut self, node: NodeId) {
        match self.ast[node].kind.clone() {
            AstNodeKind::ExprStmt { expr } => {
                self.visit_expr(expr);
            }
            AstNodeKind::Echo { args } => {
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            AstNodeKind::Print { value } => {
                self.visit_expr(value);
            }
            AstNodeKind::Assign { .. } => {
                self.visit_expr(node);
            }
            AstNodeKind::Block { stmts } => {
                for stmt in stmts {
                    self.visit_stmt(stmt);
                }
            }
            AstNodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.visit_expr(cond);
                self.visit_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_stmt(else_branch);
                }
            }
            AstNodeKind::While { cond, body } | AstNodeKind::DoWhile { body, cond } => {
                self.visit_expr(cond);
                self.visit_stmt(body);
            }
            AstNodeKind::For {
                init,
                cond,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.visit_expr(init);
                }
                if let Some(cond) = cond {
                    self.visit_expr(cond);
                }
                if let Some(step) = step {
                    self.visit_expr(step);
                }
                self.visit_stmt(body);
            }
            AstNodeKind::Return { value } => {
                if let Some(value) = value {
                    self.visit_expr(value);
                }
            }
            other => panic!("node kind {other:?} is not a statement"),
        }
    }

    fn visit_expr(&mut self, node: NodeId) -> InferredType {
        let span = self.ast[node].span;
        let ty = match self.ast[node].kind.clone() {
            AstNodeKind::IntLiteral { .. } => InferredType::concrete(ConcreteType::Int),
            AstNodeKind::FloatLiteral { .. } => InferredType::concrete(ConcreteType::Float),
            AstNodeKind::StringLiteral { .. } => InferredType::concrete(ConcreteType::String),
            AstNodeKind::BoolLiteral { .. } => InferredType::concrete(ConcreteType::Bool),
            AstNodeKind::NullLiteral => InferredType::concrete(ConcreteType::Null),
            AstNodeKind::Variable { name } => self
                .symbols
                .lookup(name, SymbolKind::Variable)
                .map(|s| s.ty.clone())
                .unwrap_or(InferredType::Unknown),
            AstNodeKind::Assign { target, value } => {
                let value_ty = self.visit_expr(value);
                if let AstNodeKind::Variable { name } = self.ast[target].kind {
                    self.symbols
                        .update_type(name, SymbolKind::Variable, value_ty.clone());
                }
                value_ty
            }
            AstNodeKind::Unary { operand, .. } => self.visit_expr(operand),
            AstNodeKind::Binary { op, lhs, rhs } => self.visit_binary(op, lhs, rhs, span),
            AstNodeKind::Call { callee, args } => self.visit_call(callee, args, span),
            AstNodeKind::ArrayLiteral { items } => {
                for item in items {
                    self.visit_expr(item);
                }
                InferredType::concrete(ConcreteType::Array)
            }
            AstNodeKind::ArrayGet { array, index } => {
                self.visit_expr(array);
                self.visit_expr(index);
                InferredType::Unknown
            }
            AstNodeKind::ArraySet { array, index, value } => {
                self.visit_expr(array);
                self.visit_expr(index);
                self.visit_expr(value);
                InferredType::concrete(ConcreteType::Array)
            }
            other => panic!("node kind {other:?} is not an expression"),
        };

        self.types.insert(node, ty.clone());
        ty
    }

    fn visit_binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId, span: phpaot_syntax::Span) -> InferredType {
        let lhs_ty = self.visit_expr(lhs);
        let rhs_ty = self.visit_expr(rhs);

        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                self.arithmetic_result(&lhs_ty, &rhs_ty, span)
            }
            BinaryOp::Concat => InferredType::concrete(ConcreteType::String),
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::And
            | BinaryOp::Or => InferredType::concrete(ConcreteType::Bool),
        }
    }

    /// The PHP 8.x numeric-coercion rules pinning this component's behavior:
    /// a numeric string matching the integer grammar coerces to `int`; any
    /// other numeric-looking string coerces to `float`; a non-numeric string
    /// coerces to `int 0` with a warning; `null` coerces to `0`/`0.0`
    /// depending on the other operand.
    fn arithmetic_result(
        &mut self,
        lhs: &InferredType,
        rhs: &InferredType,
        span: phpaot_syntax::Span,
    ) -> InferredType {
        let lhs = self.coerce_for_arithmetic(lhs, span);
        let rhs = self.coerce_for_arithmetic(rhs, span);

        if lhs == ConcreteType::Float || rhs == ConcreteType::Float {
            InferredType::concrete(ConcreteType::Float)
        } else {
            InferredType::concrete(ConcreteType::Int)
        }
    }

    fn coerce_for_arithmetic(&mut self, ty: &InferredType, span: phpaot_syntax::Span) -> ConcreteType {
        match ty {
            InferredType::Concrete(ConcreteType::Int) => ConcreteType::Int,
            InferredType::Concrete(ConcreteType::Float) => ConcreteType::Float,
            InferredType::Concrete(ConcreteType::Null) => ConcreteType::Int,
            InferredType::Concrete(ConcreteType::Bool) => ConcreteType::Int,
            InferredType::Concrete(ConcreteType::String) => {
                // The lexical shape of the literal isn't available post-AST
                // here without re-reading source text; conservatively treat
                // untyped strings used in arithmetic as the non-numeric
                // case, matching the warning-plus-int-0 fallback.
                self.diagnostics.report_with_code(
                    Severity::Warning,
                    "non-numeric string coerced to 0 in arithmetic context",
                    Some((self.file, span)),
                    BAD_COERCION,
                );
                ConcreteType::Int
            }
            _ => ConcreteType::Int,
        }
    }

    fn visit_call(&mut self, callee: Symbol, args: Vec<NodeId>, span: phpaot_syntax::Span) -> InferredType {
        for &arg in &args {
            self.visit_expr(arg);
        }

        match self.symbols.lookup(callee, SymbolKind::Function) {
            Some(info) => info.ty.clone(),
            None => {
                self.diagnostics.report_with_code(
                    Severity::Warning,
                    format!(
                        "call to undeclared function `{}`",
                        self.ast.resolve(callee)
                    ),
                    Some((self.file, span)),
                    UNDEFINED_FUNCTION,
                );
                InferredType::any()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phpaot_syntax::Span;

    fn sample_ast() -> (Ast, NodeId) {
        let mut ast = Ast::new();
        let one = ast.push(AstNodeKind::IntLiteral { value: 1 }, Span::DUMMY);
        let two = ast.push(AstNodeKind::FloatLiteral { value: 2.0 }, Span::DUMMY);
        let sum = ast.push(
            AstNodeKind::Binary {
                op: BinaryOp::Add,
                lhs: one,
                rhs: two,
            },
            Span::DUMMY,
        );
        let stmt = ast.push(AstNodeKind::ExprStmt { expr: sum }, Span::DUMMY);
        let root = ast.push(AstNodeKind::Root { items: vec![stmt] }, Span::DUMMY);
        ast.set_root(root);
        (ast, sum)
    }

    #[test]
    fn mixed_int_float_arithmetic_widens_to_float() {
        let (ast, sum) = sample_ast();
        let mut symbols = SymbolTable::new();
        let mut diagnostics = DiagnosticEngine::new();
        let types = infer(&ast, &mut symbols, &mut diagnostics, FileId::default());
        assert_eq!(types[&sum], InferredType::concrete(ConcreteType::Float));
    }

    #[test]
    fn calling_an_undeclared_function_warns_and_yields_any() {
        let mut ast = Ast::new();
        let callee = ast.interner.intern("mystery");
        let call = ast.push(
            AstNodeKind::Call {
                callee,
                args: vec![],
            },
            Span::DUMMY,
        );
        let stmt = ast.push(AstNodeKind::ExprStmt { expr: call }, Span::DUMMY);
        let root = ast.push(AstNodeKind::Root { items: vec![stmt] }, Span::DUMMY);
        ast.set_root(root);

        let mut symbols = SymbolTable::new();
        let mut diagnostics = DiagnosticEngine::new();
        let types = infer(&ast, &mut symbols, &mut diagnostics, FileId::default());

        assert_eq!(types[&call], InferredType::any());
        assert_eq!(diagnostics.warning_count(), 1);
    }
}
