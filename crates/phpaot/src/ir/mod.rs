//! The IR data model (component C6): a module of functions, each a
//! control-flow graph of basic blocks holding typed, register-addressed
//! instructions. Everything here is a flat, index-addressed structure per
//! the arena discipline used throughout this crate — no pointer graphs.

pub mod dump;
pub mod gen;
pub mod opt;

use std::fmt;

use phpaot_syntax::interner::Symbol;

use crate::types::ConcreteType;

/// A dense register id, unique within its owning function.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Register(pub u32);

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A dense index into a [`Function`]'s block array.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A dense index into a [`Module`]'s function array.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub u32);

/// An operand to an instruction or terminator: a prior instruction's result,
/// or an immediate constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Register(Register),
    ConstNull,
    ConstBool(bool),
    ConstInt(i64),
    ConstFloat(f64),
    ConstStr(Symbol),
}

/// The opcode catalog from the IR data model (minimum set).
#[derive(Debug, Clone, PartialEq)]
pub enum Opcode {
    ConstNull,
    ConstBool(bool),
    ConstInt(i64),
    ConstFloat(f64),
    ConstStr(Symbol),
    LoadVar(Symbol),
    StoreVar(Symbol, Operand),
    Add(Operand, Operand),
    Sub(Operand, Operand),
    Mul(Operand, Operand),
    Div(Operand, Operand),
    Mod(Operand, Operand),
    Neg(Operand),
    Concat(Operand, Operand),
    Eq(Operand, Operand),
    Ne(Operand, Operand),
    Lt(Operand, Operand),
    Le(Operand, Operand),
    Gt(Operand, Operand),
    Ge(Operand, Operand),
    And(Operand, Operand),
    Or(Operand, Operand),
    Not(Operand),
    /// `int -> float` promotion, inserted by the generator whenever a binary
    /// op mixes an int operand with a float one.
    IntToFloat(Operand),
    /// Call by symbolic callee name (never by register) — callees are always
    /// statically known function or runtime-ABI names.
    Call { callee: Symbol, args: Vec<Operand> },
    AllocArray,
    ArrayGet(Operand, Operand),
    ArraySet(Operand, Operand, Operand),
    Echo(Operand),
    Print(Operand),
}

/// A single instruction: an opcode plus the register it defines, if any.
/// Every instruction here produces at most one result.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub result: Option<Register>,
    pub opcode: Opcode,
    pub ty: ConcreteType,
}

/// The instruction that ends a basic block and transfers control.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Ret(Option<Operand>),
    Br(BlockId),
    CondBr {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Unreachable,
}

/// A maximal straight-line sequence of instructions with one entry (its
/// label/[`BlockId`]) and one exit (its terminator).
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
    /// `None` only transiently while the generator is still building the
    /// block; every block committed to a [`Function`] must have one.
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        BasicBlock {
            id,
            instructions: Vec::new(),
            terminator: None,
        }
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: Symbol,
    pub ty: ConcreteType,
}

/// A function: a name, parameter list, return type, and control-flow graph
/// of basic blocks in insertion order. The entry block is always `blocks[0]`
/// and, by construction, has no predecessors.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Symbol,
    pub params: Vec<Parameter>,
    pub return_ty: ConcreteType,
    pub blocks: Vec<BasicBlock>,
    next_register: u32,
}

impl Function {
    pub fn new(name: Symbol, params: Vec<Parameter>, return_ty: ConcreteType) -> Self {
        Function {
            name,
            params,
            return_ty,
            blocks: Vec::new(),
            next_register: 0,
        }
    }

    pub fn new_register(&mut self) -> Register {
        let id = Register(self.next_register);
        self.next_register += 1;
        id
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id));
        id
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0 as usize]
    }

    pub fn entry_block(&self) -> BlockId {
        BlockId(0)
    }
}

/// A compilation unit: every function declared or synthesized for one
/// source file, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    pub fn push_function(&mut self, function: Function) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(function);
        id
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.0 as usize]
    }

    pub fn find_function(&self, name: Symbol) -> Option<FunctionId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| FunctionId(i as u32))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternalIRInvariant {
    #[error("block {block} in function {function} has no terminator")]
    MissingTerminator { function: String, block: BlockId },
    #[error("register {register} is defined more than once in function {function}")]
    DuplicateRegister { function: String, register: Register },
    #[error("branch in function {function} targets nonexistent block {target}")]
    DanglingBranch { function: String, target: BlockId },
}

/// Verify the three quantified invariants every committed `Module` must
/// satisfy: one terminator per block, unique register ids per function, and
/// every branch target resolving within the same function.
pub fn check_invariants(module: &Module) -> Result<(), InternalIRInvariant> {
    for function in &module.functions {
        let mut seen_registers = std::collections::HashSet::new();

        for block in &function.blocks {
            if block.terminator.is_none() {
                return Err(InternalIRInvariant::MissingTerminator {
                    function: format!("{:?}", function.name),
                    block: block.id,
                });
            }

            for inst in &block.instructions {
                if let Some(reg) = inst.result {
                    if !seen_registers.insert(reg) {
                        return Err(InternalIRInvariant::DuplicateRegister {
                            function: format!("{:?}", function.name),
                            register: reg,
                        });
                    }
                }
            }

            let targets: Vec<BlockId> = match &block.terminator {
                Some(Terminator::Br(target)) => vec![*target],
                Some(Terminator::CondBr {
                    then_block,
                    else_block,
                    ..
                }) => vec![*then_block, *else_block],
                _ => vec![],
            };

            for target in targets {
                if target.0 as usize >= function.blocks.len() {
                    return Err(InternalIRInvariant::DanglingBranch {
                        function: format!("{:?}", function.name),
                        target,
                    });
                }
            }
        }
    }

    Ok(())
}
