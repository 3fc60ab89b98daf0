//! A human-readable, one-way textual dump of a [`Module`] (`--emit-ir`).
//!
//! This is debugging output, not a wire format: nothing here promises to be
//! re-parseable, and the exact spelling is free to change. It still has to
//! be deterministic, so the same caution from the Zig emitter applies —
//! insertion order only, no hashmap iteration.

use std::fmt::Write as _;

use phpaot_syntax::interner::StringInterner;

use super::{BasicBlock, Function, Module, Opcode, Operand, Terminator};

/// Render `module` as an ordered listing of its functions, blocks, and
/// instructions, for `--emit-ir`.
pub fn dump(module: &Module, interner: &StringInterner) -> String {
    let mut out = String::new();
    writeln!(out, "module {:?}", module.name).unwrap();

    for function in &module.functions {
        dump_function(&mut out, function, interner);
    }

    out
}

fn dump_function(out: &mut String, function: &Function, interner: &StringInterner) {
    let params: Vec<String> = function
        .params
        .iter()
        .map(|p| format!("{}: {}", interner.resolve(p.name), p.ty))
        .collect();

    writeln!(
        out,
        "\nfunction {}({}) -> {} {{",
        interner.resolve(function.name),
        params.join(", "),
        function.return_ty
    )
    .unwrap();

    for block in &function.blocks {
        dump_block(out, block, interner);
    }

    writeln!(out, "}}").unwrap();
}

fn dump_block(out: &mut String, block: &BasicBlock, interner: &StringInterner) {
    writeln!(out, "  {}:", block.id).unwrap();

    for inst in &block.instructions {
        let rhs = dump_opcode(&inst.opcode, interner);
        match inst.result {
            Some(reg) => writeln!(out, "    {} = {} : {}", reg, rhs, inst.ty).unwrap(),
            None => writeln!(out, "    {} : {}", rhs, inst.ty).unwrap(),
        }
    }

    match &block.terminator {
        Some(Terminator::Ret(Some(operand))) => {
            writeln!(out, "    ret {}", dump_operand(operand, interner)).unwrap();
        }
        Some(Terminator::Ret(None)) => {
            writeln!(out, "    ret").unwrap();
        }
        Some(Terminator::Br(target)) => {
            writeln!(out, "    br {target}").unwrap();
        }
        Some(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        }) => {
            writeln!(
                out,
                "    cond_br {}, {}, {}",
                dump_operand(cond, interner),
                then_block,
                else_block
            )
            .unwrap();
        }
        Some(Terminator::Unreachable) | None => {
            writeln!(out, "    unreachable").unwrap();
        }
    }
}

fn dump_operand(operand: &Operand, interner: &StringInterner) -> String {
    match operand {
        Operand::Register(reg) => reg.to_string(),
        Operand::ConstNull => "null".to_string(),
        Operand::ConstBool(b) => b.to_string(),
        Operand::ConstInt(i) => i.to_string(),
        Operand::ConstFloat(f) => format!("{f:?}"),
        Operand::ConstStr(s) => format!("{:?}", interner.resolve(*s)),
    }
}

fn dump_opcode(opcode: &Opcode, interner: &StringInterner) -> String {
    let op = |o: &Operand| dump_operand(o, interner);
    match opcode {
        Opcode::ConstNull => "const_null".to_string(),
        Opcode::ConstBool(b) => format!("const_bool {b}"),
        Opcode::ConstInt(i) => format!("const_int {i}"),
        Opcode::ConstFloat(f) => format!("const_float {f:?}"),
        Opcode::ConstStr(s) => format!("const_str {:?}", interner.resolve(*s)),
        Opcode::LoadVar(name) => format!("load_var ${}", interner.resolve(*name)),
        Opcode::StoreVar(name, value) => {
            format!("store_var ${}, {}", interner.resolve(*name), op(value))
        }
        Opcode::Add(a, b) => format!("add {}, {}", op(a), op(b)),
        Opcode::Sub(a, b) => format!("sub {}, {}", op(a), op(b)),
        Opcode::Mul(a, b) => format!("mul {}, {}", op(a), op(b)),
        Opcode::Div(a, b) => format!("div {}, {}", op(a), op(b)),
        Opcode::Mod(a, b) => format!("mod {}, {}", op(a), op(b)),
        Opcode::Neg(a) => format!("neg {}", op(a)),
        Opcode::Concat(a, b) => format!("concat {}, {}", op(a), op(b)),
        Opcode::Eq(a, b) => format!("eq {}, {}", op(a), op(b)),
        Opcode::Ne(a, b) => format!("ne {}, {}", op(a), op(b)),
        Opcode::Lt(a, b) => format!("lt {}, {}", op(a), op(b)),
        Opcode::Le(a, b) => format!("le {}, {}", op(a), op(b)),
        Opcode::Gt(a, b) => format!("gt {}, {}", op(a), op(b)),
        Opcode::Ge(a, b) => format!("ge {}, {}", op(a), op(b)),
        Opcode::And(a, b) => format!("and {}, {}", op(a), op(b)),
        Opcode::Or(a, b) => format!("or {}, {}", op(a), op(b)),
        Opcode::Not(a) => format!("not {}", op(a)),
        Opcode::IntToFloat(a) => format!("int_to_float {}", op(a)),
        Opcode::Call { callee, args } => {
            let args: Vec<String> = args.iter().map(op).collect();
            format!("call {}({})", interner.resolve(*callee), args.join(", "))
        }
        Opcode::AllocArray => "alloc_array".to_string(),
        Opcode::ArrayGet(array, index) => format!("array_get {}, {}", op(array), op(index)),
        Opcode::ArraySet(array, index, value) => {
            format!("array_set {}, {}, {}", op(array), op(index), op(value))
        }
        Opcode::Echo(value) => format!("echo {}", op(value)),
        Opcode::Print(value) => format!("print {}", op(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConcreteType;
    use phpaot_syntax::interner::StringInterner;

    #[test]
    fn dumps_functions_and_blocks_in_insertion_order() {
        let mut interner = StringInterner::new();
        let main = interner.intern("main");
        let mut module = Module::new("demo");
        let mut function = Function::new(main, Vec::new(), ConcreteType::Int);
        let block = function.new_block();
        function.block_mut(block).terminator = Some(Terminator::Ret(Some(Operand::ConstInt(0))));
        module.push_function(function);

        let text = dump(&module, &interner);
        assert!(text.contains("module \"demo\""));
        assert!(text.contains("function main"));
        assert!(text.contains("ret 0"));
    }

    #[test]
    fn dump_is_deterministic() {
        let mut interner = StringInterner::new();
        let main = interner.intern("main");
        let mut module = Module::new("demo");
        let mut function = Function::new(main, Vec::new(), ConcreteType::Int);
        let block = function.new_block();
        function.block_mut(block).terminator = Some(Terminator::Ret(None));
        module.push_function(function);

        assert_eq!(dump(&module, &interner), dump(&module, &interner));
    }
}
