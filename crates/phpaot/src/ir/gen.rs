//! The IR generator (component C7): lowers a [`phpaot_syntax::ast::Ast`]
//! into a [`Module`].
//!
//! A first pass declares every top-level function (so forward calls resolve)
//! and synthesizes `main`; a second pass lowers each function body. Top-level
//! statements that aren't function declarations are collected into the
//! synthesized `main`.

use phpaot_syntax::ast::{Ast, AstNodeKind, BinaryOp, ConcreteTypeHint, NodeId, UnaryOp};
use phpaot_syntax::interner::Symbol;
use phpaot_syntax::Span;

use crate::diagnostics::DiagnosticEngine;
use crate::files::FileId;
use crate::symbols::{ScopeKind, SymbolKind, SymbolTable};
use crate::types::{ConcreteType, InferredType};

use super::{BasicBlock, BlockId, Function, Instruction, Module, Opcode, Operand, Parameter, Terminator};

const UNDEFINED_SYMBOL: &str = "E-UNDEF-SYM";
const ARITY_MISMATCH: &str = "E-ARITY";
const UNREACHABLE_CODE: &str = "W-UNREACHABLE";

pub struct IrGenerator<'a> {
    ast: &'a mut Ast,
    symbols: &'a mut SymbolTable,
    diagnostics: &'a mut DiagnosticEngine,
    file: FileId,
    module: Module,
    /// (function, entry block) of the function currently being lowered.
    current: Option<CurrentFunction>,
}

struct CurrentFunction {
    function: Function,
    block: BlockId,
    /// Once a block's terminator is set, further statements lowered into it
    /// are dead; we still lower them (for diagnostics) but discard the
    /// emitted instructions.
    terminated: bool,
}

/// Lower `ast` into a [`Module`] named `module_name`, synthesizing `main`
/// from top-level statements. Declares every function at global scope first
/// so later calls can resolve forward references.
pub fn generate(
    ast: &mut Ast,
    symbols: &mut SymbolTable,
    diagnostics: &mut DiagnosticEngine,
    file: FileId,
    module_name: impl Into<String>,
) -> Module {
    let mut generator = IrGenerator {
        ast,
        symbols,
        diagnostics,
        file,
        module: Module::new(module_name),
        current: None,
    };
    generator.run();
    generator.module
}

impl<'a> IrGenerator<'a> {
    fn run(&mut self) {
        let root = self.ast.root();
        let AstNodeKind::Root { items } = &self.ast[root].kind else {
            panic!("Ast::root() must be a Root node");
        };
        let items = items.clone();

        // Idempotent: a caller that already ran a prior phase (e.g. the type
        // inferencer) against this same symbol table has already declared
        // these functions, so this is a no-op for them and a first-time
        // declaration otherwise.
        crate::symbols::declare_functions(self.ast, self.symbols, self.diagnostics, self.file);

        let mut top_level = Vec::new();
        for &item in &items {
            match &self.ast[item].kind {
                AstNodeKind::FunctionDecl { .. } => self.lower_function_decl(item),
                _ => top_level.push(item),
            }
        }

        self.synthesize_main(&top_level);
    }

    fn lower_function_decl(&mut self, node: NodeId) {
        let AstNodeKind::FunctionDecl { name, params, body } = self.ast[node].kind.clone() else {
            unreachable!()
        };

        self.symbols.enter_scope(ScopeKind::Function);

        let mut parameters = Vec::new();
        for &param_node in &params {
            let AstNodeKind::Param { name: pname, type_hint } = self.ast[param_node].kind.clone()
            else {
                continue;
            };
            let ty = type_hint.map(concrete_of_hint).unwrap_or(ConcreteType::Void);
            let span = self.ast[param_node].span;
            let _ = self.symbols.declare(
                pname,
                SymbolKind::Variable,
                InferredType::concrete_or_unknown(ty),
                (self.file, span),
            );
            parameters.push(Parameter { name: pname, ty });
        }

        // The type inferencer already widened this function's symbol to the
        // union of all its `return` expressions (or left it `Unknown` if the
        // body never returns a value); look that back up rather than
        // hardcoding `Void`, so a value-returning function doesn't end up
        // with a Zig signature that can't hold what its body actually
        // returns.
        let return_ty = self
            .symbols
            .lookup(name, SymbolKind::Function)
            .map(|symbol| dominant_concrete_type(&symbol.ty))
            .unwrap_or(ConcreteType::Void);

        let function = Function::new(name, parameters, return_ty);
        let mut current = CurrentFunction {
            function,
            block: BlockId(0),
            terminated: false,
        };
        current.block = current.function.new_block();
        self.current = Some(current);

        self.lower_block(body);
        self.finish_current_function_body();

        let current = self.current.take().expect("current function set above");
        self.symbols.leave_scope();
        self.module.push_function(current.function);
    }

    fn synthesize_main(&mut self, top_level: &[NodeId]) {
        self.symbols.enter_scope(ScopeKind::Function);
        let main_symbol = self.ast.interner.intern("main");
        let function = Function::new(main_symbol, Vec::new(), ConcreteType::Int);
        let mut current = CurrentFunction {
            function,
            block: BlockId(0),
            terminated: false,
        };
        current.block = current.function.new_block();
        self.current = Some(current);

        for &stmt in top_level {
            self.lower_stmt(stmt);
        }
        self.finish_current_function_body();

        let current = self.current.take().expect("current function set above");
        self.symbols.leave_scope();
        self.module.push_function(current.function);
    }

    /// If the last lowered block never got an explicit terminator (fell off
    /// the end of the function body), terminate it with `ret null`.
    fn finish_current_function_body(&mut self) {
        let current = self.current.as_mut().expect("current function set");
        if current.function.block(current.block).terminator.is_none() {
            current.function.block_mut(current.block).terminator = Some(Terminator::Ret(None));
        }
    }

    fn lower_block(&mut self, node: NodeId) {
        let AstNodeKind::Block { stmts } = self.ast[node].kind.clone() else {
            panic!("expected Block node");
        };
        for stmt in stmts {
            self.lower_stmt(stmt);
        }
    }

    fn lower_stmt(&mut self, node: NodeId) {
        let span = self.ast[node].span;
        let cur = self.current.as_ref().expect("inside a function");
        if cur.terminated {
            self.diagnostics.report_with_code(
                crate::diagnostics::Severity::Warning,
                "unreachable statement after a terminating statement",
                Some((self.file, span)),
                UNREACHABLE_CODE,
            );
        }

        match self.ast[node].kind.clone() {
            AstNodeKind::ExprStmt { expr } => {
                self.lower_expr(expr);
            }
            AstNodeKind::Echo { args } => {
                for arg in args {
                    let operand = self.lower_expr(arg);
                    self.emit(Opcode::Echo(operand), ConcreteType::Void);
                }
            }
            AstNodeKind::Print { value } => {
                let operand = self.lower_expr(value);
                self.emit(Opcode::Print(operand), ConcreteType::Int);
            }
            AstNodeKind::Assign { target, value } => {
                self.lower_assign(target, value);
            }
            AstNodeKind::Return { value } => {
                let operand = value.map(|v| self.lower_expr(v));
                self.set_terminator(Terminator::Ret(operand));
            }
            AstNodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch),
            AstNodeKind::While { cond, body } => self.lower_while(cond, body),
            AstNodeKind::DoWhile { body, cond } => self.lower_do_while(body, cond),
            AstNodeKind::For {
                init,
                cond,
                step,
                body,
            } => self.lower_for(init, cond, step, body),
            AstNodeKind::Block { .. } => self.lower_block(node),
            other => panic!("node kind {other:?} is not a statement"),
        }
    }

    fn lower_assign(&mut self, target: NodeId, value: NodeId) {
        let AstNodeKind::Variable { name } = self.ast[target].kind else {
            match &self.ast[target].kind {
                AstNodeKind::ArrayGet { array, index } => {
                    let (array, index) = (*array, *index);
                    let arr = self.lower_expr(array);
                    let idx = self.lower_expr(index);
                    let val = self.lower_expr(value);
                    self.emit(Opcode::ArraySet(arr, idx, val), ConcreteType::Void);
                    return;
                }
                other => panic!("assignment target {other:?} unsupported"),
            }
        };
        let value_operand = self.lower_expr(value);
        let ty = self.operand_type(&value_operand);
        self.symbols
            .update_type(name, SymbolKind::Variable, InferredType::concrete(ty));
        self.emit(Opcode::StoreVar(name, value_operand), ConcreteType::Void);
    }

    fn lower_if(&mut self, cond: NodeId, then_branch: NodeId, else_branch: Option<NodeId>) {
        let cond_operand = self.lower_expr(cond);
        let then_block = self.new_block();
        let else_block = self.new_block();
        let join_block = self.new_block();

        self.set_terminator(Terminator::CondBr {
            cond: cond_operand,
            then_block,
            else_block,
        });

        self.switch_to(then_block);
        self.lower_stmt_or_block(then_branch);
        self.set_terminator_if_missing(Terminator::Br(join_block));

        self.switch_to(else_block);
        if let Some(else_branch) = else_branch {
            self.lower_stmt_or_block(else_branch);
        }
        self.set_terminator_if_missing(Terminator::Br(join_block));

        self.switch_to(join_block);
    }

    fn lower_while(&mut self, cond: NodeId, body: NodeId) {
        let header = self.new_block();
        let body_block = self.new_block();
        let exit = self.new_block();

        self.set_terminator_if_missing(Terminator::Br(header));
        self.switch_to(header);
        let cond_operand = self.lower_expr(cond);
        self.set_terminator(Terminator::CondBr {
            cond: cond_operand,
            then_block: body_block,
            else_block: exit,
        });

        self.switch_to(body_block);
        self.lower_stmt_or_block(body);
        self.set_terminator_if_missing(Terminator::Br(header));

        self.switch_to(exit);
    }

    fn lower_do_while(&mut self, body: NodeId, cond: NodeId) {
        let body_block = self.new_block();
        let latch = self.new_block();
        let exit = self.new_block();

        self.set_terminator_if_missing(Terminator::Br(body_block));
        self.switch_to(body_block);
        self.lower_stmt_or_block(body);
        self.set_terminator_if_missing(Terminator::Br(latch));

        self.switch_to(latch);
        let cond_operand = self.lower_expr(cond);
        self.set_terminator(Terminator::CondBr {
            cond: cond_operand,
            then_block: body_block,
            else_block: exit,
        });

        self.switch_to(exit);
    }

    fn lower_for(
        &mut self,
        init: Option<NodeId>,
        cond: Option<NodeId>,
        step: Option<NodeId>,
        body: NodeId,
    ) {
        if let Some(init) = init {
            self.lower_stmt_or_expr_stmt(init);
        }

        let header = self.new_block();
        let body_block = self.new_block();
        let latch = self.new_block();
        let exit = self.new_block();

        self.set_terminator_if_missing(Terminator::Br(header));
        self.switch_to(header);
        let cond_operand = match cond {
            Some(cond) => self.lower_expr(cond),
            None => Operand::ConstBool(true),
        };
        self.set_terminator(Terminator::CondBr {
            cond: cond_operand,
            then_block: body_block,
            else_block: exit,
        });

        self.switch_to(body_block);
        self.lower_stmt_or_block(body);
        self.set_terminator_if_missing(Terminator::Br(latch));

        self.switch_to(latch);
        if let Some(step) = step {
            self.lower_expr(step);
        }
        self.set_terminator_if_missing(Terminator::Br(header));

        self.switch_to(exit);
    }

    fn lower_stmt_or_block(&mut self, node: NodeId) {
        match &self.ast[node].kind {
            AstNodeKind::Block { .. } => self.lower_block(node),
            _ => self.lower_stmt(node),
        }
    }

    fn lower_stmt_or_expr_stmt(&mut self, node: NodeId) {
        match &self.ast[node].kind {
            AstNodeKind::Assign { .. } => self.lower_stmt(node),
            _ => {
                self.lower_expr(node);
            }
        }
    }

    fn lower_expr(&mut self, node: NodeId) -> Operand {
        let span = self.ast[node].span;
        match self.ast[node].kind.clone() {
            AstNodeKind::IntLiteral { value } => Operand::ConstInt(value),
            AstNodeKind::FloatLiteral { value } => Operand::ConstFloat(value),
            AstNodeKind::StringLiteral { value } => Operand::ConstStr(value),
            AstNodeKind::BoolLiteral { value } => Operand::ConstBool(value),
            AstNodeKind::NullLiteral => Operand::ConstNull,
            AstNodeKind::Variable { name } => {
                if self.symbols.lookup(name, SymbolKind::Variable).is_none() {
                    self.diagnostics.report_with_code(
                        crate::diagnostics::Severity::Warning,
                        format!("variable `${}` is read before being assigned", self.ast.resolve(name)),
                        Some((self.file, span)),
                        UNDEFINED_SYMBOL,
                    );
                }
                let ty = self
                    .symbols
                    .lookup(name, SymbolKind::Variable)
                    .map(|s| s.ty.clone())
                    .unwrap_or(InferredType::Unknown);
                let concrete = dominant_concrete_type(&ty);
                Operand::Register(self.emit(Opcode::LoadVar(name), concrete))
            }
            AstNodeKind::Unary { op, operand } => {
                let operand = self.lower_expr(operand);
                let ty = self.operand_type(&operand);
                let opcode = match op {
                    UnaryOp::Neg => Opcode::Neg(operand),
                    UnaryOp::Not => Opcode::Not(operand),
                    UnaryOp::BitNot => Opcode::Neg(operand),
                };
                Operand::Register(self.emit(opcode, ty))
            }
            AstNodeKind::Binary { op, lhs, rhs } => self.lower_binary(op, lhs, rhs),
            AstNodeKind::Call { callee, args } => self.lower_call(callee, args, span),
            AstNodeKind::ArrayLiteral { items } => {
                let array = self.emit(Opcode::AllocArray, ConcreteType::Array);
                for item in items {
                    let value = self.lower_expr(item);
                    self.emit(
                        Opcode::ArraySet(Operand::Register(array), Operand::ConstNull, value),
                        ConcreteType::Void,
                    );
                }
                Operand::Register(array)
            }
            AstNodeKind::ArrayGet { array, index } => {
                let array = self.lower_expr(array);
                let index = self.lower_expr(index);
                Operand::Register(self.emit(Opcode::ArrayGet(array, index), ConcreteType::Void))
            }
            other => panic!("node kind {other:?} is not an expression"),
        }
    }

    fn lower_binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Operand {
        let mut lhs_operand = self.lower_expr(lhs);
        let mut rhs_operand = self.lower_expr(rhs);
        let lhs_ty = self.operand_type(&lhs_operand);
        let rhs_ty = self.operand_type(&rhs_operand);

        let is_arith = matches!(
            op,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        );

        let result_ty = if is_arith {
            if lhs_ty == ConcreteType::Float || rhs_ty == ConcreteType::Float {
                if lhs_ty == ConcreteType::Int {
                    lhs_operand = Operand::Register(self.emit(
                        Opcode::IntToFloat(lhs_operand),
                        ConcreteType::Float,
                    ));
                }
                if rhs_ty == ConcreteType::Int {
                    rhs_operand = Operand::Register(self.emit(
                        Opcode::IntToFloat(rhs_operand),
                        ConcreteType::Float,
                    ));
                }
                ConcreteType::Float
            } else {
                ConcreteType::Int
            }
        } else if matches!(op, BinaryOp::Concat) {
            ConcreteType::String
        } else {
            ConcreteType::Bool
        };

        let opcode = match op {
            BinaryOp::Add => Opcode::Add(lhs_operand, rhs_operand),
            BinaryOp::Sub => Opcode::Sub(lhs_operand, rhs_operand),
            BinaryOp::Mul => Opcode::Mul(lhs_operand, rhs_operand),
            BinaryOp::Div => Opcode::Div(lhs_operand, rhs_operand),
            BinaryOp::Mod => Opcode::Mod(lhs_operand, rhs_operand),
            BinaryOp::Concat => Opcode::Concat(lhs_operand, rhs_operand),
            BinaryOp::Eq => Opcode::Eq(lhs_operand, rhs_operand),
            BinaryOp::NotEq => Opcode::Ne(lhs_operand, rhs_operand),
            BinaryOp::Lt => Opcode::Lt(lhs_operand, rhs_operand),
            BinaryOp::Le => Opcode::Le(lhs_operand, rhs_operand),
            BinaryOp::Gt => Opcode::Gt(lhs_operand, rhs_operand),
            BinaryOp::Ge => Opcode::Ge(lhs_operand, rhs_operand),
            BinaryOp::And => Opcode::And(lhs_operand, rhs_operand),
            BinaryOp::Or => Opcode::Or(lhs_operand, rhs_operand),
        };

        Operand::Register(self.emit(opcode, result_ty))
    }

    fn lower_call(&mut self, callee: Symbol, args: Vec<NodeId>, span: Span) -> Operand {
        let callee_info = self.symbols.lookup(callee, SymbolKind::Function).cloned();
        if callee_info.is_none() {
            self.diagnostics.report_with_code(
                crate::diagnostics::Severity::Warning,
                format!(
                    "call to undeclared function `{}`; assuming a conservative return type",
                    self.ast.resolve(callee)
                ),
                Some((self.file, span)),
                UNDEFINED_SYMBOL,
            );
        }

        let operands: Vec<Operand> = args.into_iter().map(|a| self.lower_expr(a)).collect();

        if let Some(runtime) = crate::runtime_abi::lookup(self.ast.resolve(callee)) {
            if runtime.param_count != operands.len() {
                self.diagnostics.report_with_code(
                    crate::diagnostics::Severity::Error,
                    format!(
                        "`{}` expects {} argument(s), got {}",
                        runtime.name,
                        runtime.param_count,
                        operands.len()
                    ),
                    Some((self.file, span)),
                    ARITY_MISMATCH,
                );
            }
        }

        let result_ty = ConcreteType::Void;
        Operand::Register(self.emit(
            Opcode::Call {
                callee,
                args: operands,
            },
            result_ty,
        ))
    }

    fn operand_type(&self, operand: &Operand) -> ConcreteType {
        match operand {
            Operand::ConstNull => ConcreteType::Null,
            Operand::ConstBool(_) => ConcreteType::Bool,
            Operand::ConstInt(_) => ConcreteType::Int,
            Operand::ConstFloat(_) => ConcreteType::Float,
            Operand::ConstStr(_) => ConcreteType::String,
            Operand::Register(reg) => {
                let cur = self.current.as_ref().expect("inside a function");
                cur.function
                    .block(cur.block)
                    .instructions
                    .iter()
                    .find(|inst| inst.result == Some(*reg))
                    .map(|inst| inst.ty)
                    .unwrap_or(ConcreteType::Void)
            }
        }
    }

    fn emit(&mut self, opcode: Opcode, ty: ConcreteType) -> super::Register {
        let current = self.current.as_mut().expect("inside a function");
        let register = current.function.new_register();
        let instruction = Instruction {
            result: Some(register),
            opcode,
            ty,
        };
        if !current.terminated {
            current.function.block_mut(current.block).push(instruction);
        }
        register
    }

    fn new_block(&mut self) -> BlockId {
        let current = self.current.as_mut().expect("inside a function");
        current.function.new_block()
    }

    fn switch_to(&mut self, block: BlockId) {
        let current = self.current.as_mut().expect("inside a function");
        current.block = block;
        current.terminated = false;
    }

    fn set_terminator(&mut self, terminator: Terminator) {
        let current = self.current.as_mut().expect("inside a function");
        current.function.block_mut(current.block).terminator = Some(terminator);
        current.terminated = true;
    }

    fn set_terminator_if_missing(&mut self, terminator: Terminator) {
        let current = self.current.as_mut().expect("inside a function");
        if current.function.block(current.block).terminator.is_none() {
            current.function.block_mut(current.block).terminator = Some(terminator);
        }
        current.terminated = true;
    }
}

fn concrete_of_hint(hint: ConcreteTypeHint) -> ConcreteType {
    match hint {
        ConcreteTypeHint::Null => ConcreteType::Null,
        ConcreteTypeHint::Bool => ConcreteType::Bool,
        ConcreteTypeHint::Int => ConcreteType::Int,
        ConcreteTypeHint::Float => ConcreteType::Float,
        ConcreteTypeHint::String => ConcreteType::String,
        ConcreteTypeHint::Array => ConcreteType::Array,
        ConcreteTypeHint::Object => ConcreteType::Object,
        ConcreteTypeHint::Callable => ConcreteType::Callable,
    }
}

fn dominant_concrete_type(ty: &InferredType) -> ConcreteType {
    match ty {
        InferredType::Unknown => ConcreteType::Void,
        InferredType::Concrete(c) => *c,
        InferredType::Union(set) => set.iter().next().copied().unwrap_or(ConcreteType::Void),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticEngine;
    use crate::symbols::SymbolTable;
    use phpaot_syntax::ast::{AstNodeKind, BinaryOp};
    use phpaot_syntax::Span;

    fn generate_module(ast: &mut Ast) -> (Module, DiagnosticEngine) {
        let mut symbols = SymbolTable::new();
        let mut diagnostics = DiagnosticEngine::new();
        let module = generate(
            ast,
            &mut symbols,
            &mut diagnostics,
            FileId::default(),
            "scenario",
        );
        (module, diagnostics)
    }

    /// Scenario 1: an empty program synthesizes a `main` whose only block
    /// terminates with `ret null`, with no diagnostics at all.
    #[test]
    fn empty_program_synthesizes_a_ret_null_main() {
        let mut ast = Ast::new();
        let root = ast.push(AstNodeKind::Root { items: vec![] }, Span::DUMMY);
        ast.set_root(root);

        let (module, diagnostics) = generate_module(&mut ast);

        assert_eq!(module.functions.len(), 1);
        let main = &module.functions[0];
        assert_eq!(ast.resolve(main.name), "main");
        assert_eq!(main.blocks.len(), 1);
        assert_eq!(main.blocks[0].terminator, Some(Terminator::Ret(None)));
        assert_eq!(diagnostics.iter().count(), 0);
    }

    /// Scenario 2: `function greet() { echo "Hello"; }` produces a `greet`
    /// function alongside `main`, with an `Echo` on the string constant
    /// followed by its terminator.
    #[test]
    fn simple_function_with_echo() {
        let mut ast = Ast::new();
        let greet = ast.interner.intern("greet");
        let hello = ast.interner.intern("Hello");

        let msg = ast.push(AstNodeKind::StringLiteral { value: hello }, Span::DUMMY);
        let echo = ast.push(AstNodeKind::Echo { args: vec![msg] }, Span::DUMMY);
        let body = ast.push(AstNodeKind::Block { stmts: vec![echo] }, Span::DUMMY);
        let decl = ast.push(
            AstNodeKind::FunctionDecl {
                name: greet,
                params: vec![],
                body,
            },
            Span::DUMMY,
        );
        let root = ast.push(AstNodeKind::Root { items: vec![decl] }, Span::DUMMY);
        ast.set_root(root);

        let (module, _diagnostics) = generate_module(&mut ast);

        let names: Vec<&str> = module
            .functions
            .iter()
            .map(|f| ast.resolve(f.name))
            .collect();
        assert!(names.contains(&"main"));
        assert!(names.contains(&"greet"));

        let greet_fn = module
            .functions
            .iter()
            .find(|f| ast.resolve(f.name) == "greet")
            .unwrap();
        assert_eq!(greet_fn.blocks.len(), 1);
        let block = &greet_fn.blocks[0];
        assert!(block
            .instructions
            .iter()
            .any(|inst| matches!(&inst.opcode, Opcode::Echo(Operand::ConstStr(s)) if *s == hello)));
        assert!(matches!(block.terminator, Some(Terminator::Ret(None))));
    }

    /// Scenario 3: `function add($a, $b) { return $a + $b; }` has exactly two
    /// parameters, one block, an `Add` over two `LoadVar`s, and a `ret r`
    /// terminator.
    #[test]
    fn function_with_parameters_and_return() {
        let mut ast = Ast::new();
        let add = ast.interner.intern("add");
        let a = ast.interner.intern("a");
        let b = ast.interner.intern("b");

        let param_a = ast.push(
            AstNodeKind::Param {
                name: a,
                type_hint: None,
            },
            Span::DUMMY,
        );
        let param_b = ast.push(
            AstNodeKind::Param {
                name: b,
                type_hint: None,
            },
            Span::DUMMY,
        );
        let var_a = ast.push(AstNodeKind::Variable { name: a }, Span::DUMMY);
        let var_b = ast.push(AstNodeKind::Variable { name: b }, Span::DUMMY);
        let sum = ast.push(
            AstNodeKind::Binary {
                op: BinaryOp::Add,
                lhs: var_a,
                rhs: var_b,
            },
            Span::DUMMY,
        );
        let ret = ast.push(AstNodeKind::Return { value: Some(sum) }, Span::DUMMY);
        let body = ast.push(AstNodeKind::Block { stmts: vec![ret] }, Span::DUMMY);
        let decl = ast.push(
            AstNodeKind::FunctionDecl {
                name: add,
                params: vec![param_a, param_b],
                body,
            },
            Span::DUMMY,
        );
        let root = ast.push(AstNodeKind::Root { items: vec![decl] }, Span::DUMMY);
        ast.set_root(root);

        let (module, _diagnostics) = generate_module(&mut ast);

        let add_fn = module
            .functions
            .iter()
            .find(|f| ast.resolve(f.name) == "add")
            .unwrap();
        assert_eq!(add_fn.params.len(), 2);
        assert_eq!(add_fn.blocks.len(), 1);

        let block = &add_fn.blocks[0];
        assert!(block
            .instructions
            .iter()
            .any(|inst| matches!(&inst.opcode, Opcode::Add(Operand::Register(_), Operand::Register(_)))));
        match block.terminator {
            Some(Terminator::Ret(Some(Operand::Register(_)))) => {}
            other => panic!("expected ret r, got {other:?}"),
        }
    }

    /// Scenario 4: `$result = myFunc(10);` at top level lowers into `main`
    /// as a `call` to `myFunc` with a single integer-constant argument.
    #[test]
    fn call_site_at_top_level() {
        let mut ast = Ast::new();
        let my_func = ast.interner.intern("myFunc");
        let result = ast.interner.intern("result");

        let ten = ast.push(AstNodeKind::IntLiteral { value: 10 }, Span::DUMMY);
        let call = ast.push(
            AstNodeKind::Call {
                callee: my_func,
                args: vec![ten],
            },
            Span::DUMMY,
        );
        let target = ast.push(AstNodeKind::Variable { name: result }, Span::DUMMY);
        let assign = ast.push(
            AstNodeKind::Assign {
                target,
                value: call,
            },
            Span::DUMMY,
        );
        let stmt = ast.push(AstNodeKind::ExprStmt { expr: assign }, Span::DUMMY);
        let root = ast.push(AstNodeKind::Root { items: vec![stmt] }, Span::DUMMY);
        ast.set_root(root);

        let (module, _diagnostics) = generate_module(&mut ast);

        let main = module
            .functions
            .iter()
            .find(|f| ast.resolve(f.name) == "main")
            .unwrap();
        let found = main.blocks.iter().flat_map(|b| &b.instructions).any(|inst| {
            matches!(&inst.opcode, Opcode::Call { callee, args }
                if *callee == my_func && args == &[Operand::ConstInt(10)])
        });
        assert!(found, "expected a call to myFunc(10) in main");
    }

    /// A user-defined `main` conflicts with the synthesized entry point and
    /// is rejected, per the spec's resolution of its own open question.
    #[test]
    fn user_defined_main_is_rejected() {
        let mut ast = Ast::new();
        let main_name = ast.interner.intern("main");
        let body = ast.push(AstNodeKind::Block { stmts: vec![] }, Span::DUMMY);
        let decl = ast.push(
            AstNodeKind::FunctionDecl {
                name: main_name,
                params: vec![],
                body,
            },
            Span::DUMMY,
        );
        let root = ast.push(AstNodeKind::Root { items: vec![decl] }, Span::DUMMY);
        ast.set_root(root);

        let (_module, diagnostics) = generate_module(&mut ast);
        assert!(diagnostics.has_errors());
    }

    /// Composing the type inferencer ahead of IR generation against the same
    /// symbol table must not raise spurious duplicate-function errors.
    #[test]
    fn infer_then_generate_share_a_symbol_table_without_duplicate_errors() {
        let mut ast = Ast::new();
        let greet = ast.interner.intern("greet");
        let body = ast.push(AstNodeKind::Block { stmts: vec![] }, Span::DUMMY);
        let decl = ast.push(
            AstNodeKind::FunctionDecl {
                name: greet,
                params: vec![],
                body,
            },
            Span::DUMMY,
        );
        let root = ast.push(AstNodeKind::Root { items: vec![decl] }, Span::DUMMY);
        ast.set_root(root);

        let mut symbols = SymbolTable::new();
        let mut diagnostics = DiagnosticEngine::new();
        let file = FileId::default();

        crate::infer::infer(&ast, &mut symbols, &mut diagnostics, file);
        assert!(!diagnostics.has_errors());

        let _module = generate(&mut ast, &mut symbols, &mut diagnostics, file, "shared");
        assert!(!diagnostics.has_errors());
    }

    /// A function returning an int must carry that return type onto the
    /// generated `Function`, not the hardcoded `Void` its signature would
    /// otherwise get — a `ret <value>` terminator inside a `void` Zig
    /// function is invalid.
    #[test]
    fn function_return_type_is_looked_up_from_the_inferred_symbol() {
        let mut ast = Ast::new();
        let answer = ast.interner.intern("answer");
        let forty_two = ast.push(AstNodeKind::IntLiteral { value: 42 }, Span::DUMMY);
        let ret = ast.push(AstNodeKind::Return { value: Some(forty_two) }, Span::DUMMY);
        let body = ast.push(AstNodeKind::Block { stmts: vec![ret] }, Span::DUMMY);
        let decl = ast.push(
            AstNodeKind::FunctionDecl {
                name: answer,
                params: vec![],
                body,
            },
            Span::DUMMY,
        );
        let root = ast.push(AstNodeKind::Root { items: vec![decl] }, Span::DUMMY);
        ast.set_root(root);

        let mut symbols = SymbolTable::new();
        let mut diagnostics = DiagnosticEngine::new();
        let file = FileId::default();

        crate::infer::infer(&ast, &mut symbols, &mut diagnostics, file);
        let module = generate(&mut ast, &mut symbols, &mut diagnostics, file, "answer");

        let answer_fn = module
            .functions
            .iter()
            .find(|f| ast.resolve(f.name) == "answer")
            .unwrap();
        assert_eq!(answer_fn.return_ty, ConcreteType::Int);
    }
}
