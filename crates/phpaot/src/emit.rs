//! The deterministic textual code emitter (component C9).
//!
//! Lowers a [`crate::ir::Module`] to a single Zig translation unit: `extern
//! fn` declarations for every runtime symbol the module actually calls,
//! one Zig function per IR function, and an exported `pub fn main()` that
//! forwards to the IR module's own `main` and adapts its return value to a
//! process exit code. Emission never consults the system clock, RNG, or
//! filesystem order — identical IR, target, and optimization level always
//! produce identical bytes.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use phpaot_syntax::interner::StringInterner;

use crate::ir::{BasicBlock, BlockId, Function, Module, Opcode, Operand, Terminator};
use crate::runtime_abi::{self, RuntimeFunction};
use crate::types::ConcreteType;

/// Lower a concrete type to its Zig spelling per the fixed type-lowering
/// table: `int -> i64`, `float -> f64`, `bool -> bool`,
/// `string -> *const PHPString`, everything else -> `*mut PHPValue`.
fn zig_type(ty: ConcreteType) -> &'static str {
    match ty {
        ConcreteType::Int => "i64",
        ConcreteType::Float => "f64",
        ConcreteType::Bool => "bool",
        ConcreteType::String => "*const PHPString",
        ConcreteType::Void => "void",
        ConcreteType::Null
        | ConcreteType::Array
        | ConcreteType::Object
        | ConcreteType::Callable
        | ConcreteType::Resource => "*mut PHPValue",
    }
}

/// Emit `module` as a complete `.zig` translation unit.
pub fn emit(module: &Module, interner: &StringInterner) -> String {
    let mut out = String::new();

    writeln!(out, "// Generated by phpaot. Do not edit by hand.").unwrap();
    writeln!(out, "const std = @import(\"std\");").unwrap();
    writeln!(out).unwrap();

    emit_extern_decls(&mut out, module, interner);
    writeln!(out).unwrap();

    for function in &module.functions {
        emit_function(&mut out, function, interner);
        writeln!(out).unwrap();
    }

    emit_entry_point(&mut out, module, interner);

    out
}

fn emit_extern_decls(out: &mut String, module: &Module, interner: &StringInterner) {
    let mut referenced: BTreeSet<&'static str> = BTreeSet::new();
    for function in &module.functions {
        for block in &function.blocks {
            for inst in &block.instructions {
                match &inst.opcode {
                    Opcode::Echo(_) => {
                        referenced.insert(runtime_abi::PHP_ECHO.name);
                    }
                    Opcode::Print(_) => {
                        referenced.insert(runtime_abi::PHP_PRINT.name);
                    }
                    Opcode::Call { callee, .. } => {
                        if let Some(runtime) = runtime_abi::lookup(interner.resolve(*callee)) {
                            referenced.insert(runtime.name);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    writeln!(out, "const PHPValue = opaque {{}};").unwrap();
    writeln!(out, "const PHPString = opaque {{}};").unwrap();
    writeln!(out).unwrap();

    for runtime in runtime_abi::ALL {
        if !referenced.contains(runtime.name) {
            continue;
        }
        let params = match runtime.name {
            "php_value_create_null" | "php_value_create_array" => String::new(),
            "php_value_create_bool" => "value: bool".to_string(),
            "php_value_create_int" => "value: i64".to_string(),
            "php_value_create_float" => "value: f64".to_string(),
            "php_value_create_string" => "value: *const PHPString".to_string(),
            "php_value_create_object" | "php_gc_retain" | "php_gc_release" | "php_echo"
            | "php_print" => "value: *mut PHPValue".to_string(),
            _ => (0..runtime.param_count)
                .map(|i| format!("arg{i}: *mut PHPValue"))
                .collect::<Vec<_>>()
                .join(", "),
        };
        let ret = if runtime.name.starts_with("php_value_create") {
            "*mut PHPValue"
        } else {
            "void"
        };
        writeln!(out, "extern fn {}({}) {};", runtime.name, params, ret).unwrap();
    }
}

fn emit_function(out: &mut String, function: &Function, interner: &StringInterner) {
    let name = interner.resolve(function.name);
    let params: Vec<String> = function
        .params
        .iter()
        .map(|p| format!("{}: {}", interner.resolve(p.name), zig_type(p.ty)))
        .collect();

    writeln!(
        out,
        "fn {}({}) {} {{",
        zig_ident(name),
        params.join(", "),
        zig_type(function.return_ty)
    )
    .unwrap();

    for block in &function.blocks {
        emit_block(out, block, interner);
    }

    writeln!(out, "}}").unwrap();
}

fn emit_block(out: &mut String, block: &BasicBlock, interner: &StringInterner) {
    writeln!(out, "{}:", block.id).unwrap();

    for inst in &block.instructions {
        let rhs = emit_opcode(&inst.opcode, interner);
        match inst.result {
            Some(reg) => writeln!(out, "    const {} = {};", reg, rhs).unwrap(),
            None => writeln!(out, "    {};", rhs).unwrap(),
        }
    }

    match &block.terminator {
        Some(Terminator::Ret(Some(operand))) => {
            writeln!(out, "    return {};", emit_operand(operand, interner)).unwrap();
        }
        Some(Terminator::Ret(None)) => {
            writeln!(out, "    return;").unwrap();
        }
        Some(Terminator::Br(target)) => {
            writeln!(out, "    goto {target};").unwrap();
        }
        Some(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        }) => {
            writeln!(
                out,
                "    if ({}) goto {} else goto {};",
                emit_operand(cond, interner),
                then_block,
                else_block
            )
            .unwrap();
        }
        Some(Terminator::Unreachable) | None => {
            writeln!(out, "    unreachable;").unwrap();
        }
    }
}

fn emit_operand(operand: &Operand, interner: &StringInterner) -> String {
    match operand {
        Operand::Register(reg) => reg.to_string(),
        Operand::ConstNull => "null".to_string(),
        Operand::ConstBool(b) => b.to_string(),
        Operand::ConstInt(i) => i.to_string(),
        Operand::ConstFloat(f) => format!("{f:?}"),
        Operand::ConstStr(s) => format!("{:?}", interner.resolve(*s)),
    }
}

fn emit_opcode(opcode: &Opcode, interner: &StringInterner) -> String {
    let op = |o: &Operand| emit_operand(o, interner);
    match opcode {
        Opcode::ConstNull => "null".to_string(),
        Opcode::ConstBool(b) => b.to_string(),
        Opcode::ConstInt(i) => i.to_string(),
        Opcode::ConstFloat(f) => format!("{f:?}"),
        Opcode::ConstStr(s) => format!("{:?}", interner.resolve(*s)),
        Opcode::LoadVar(name) => format!("var_{}", zig_ident(interner.resolve(*name))),
        Opcode::StoreVar(name, value) => {
            format!("var_{} = {}", zig_ident(interner.resolve(*name)), op(value))
        }
        Opcode::Add(a, b) => format!("{} + {}", op(a), op(b)),
        Opcode::Sub(a, b) => format!("{} - {}", op(a), op(b)),
        Opcode::Mul(a, b) => format!("{} * {}", op(a), op(b)),
        Opcode::Div(a, b) => format!("{} / {}", op(a), op(b)),
        Opcode::Mod(a, b) => format!("{} % {}", op(a), op(b)),
        Opcode::Neg(a) => format!("-{}", op(a)),
        Opcode::Concat(a, b) => format!("php_concat({}, {})", op(a), op(b)),
        Opcode::Eq(a, b) => format!("{} == {}", op(a), op(b)),
        Opcode::Ne(a, b) => format!("{} != {}", op(a), op(b)),
        Opcode::Lt(a, b) => format!("{} < {}", op(a), op(b)),
        Opcode::Le(a, b) => format!("{} <= {}", op(a), op(b)),
        Opcode::Gt(a, b) => format!("{} > {}", op(a), op(b)),
        Opcode::Ge(a, b) => format!("{} >= {}", op(a), op(b)),
        Opcode::And(a, b) => format!("{} and {}", op(a), op(b)),
        Opcode::Or(a, b) => format!("{} or {}", op(a), op(b)),
        Opcode::Not(a) => format!("!{}", op(a)),
        Opcode::IntToFloat(a) => format!("@as(f64, @floatFromInt({}))", op(a)),
        Opcode::Call { callee, args } => {
            let args: Vec<String> = args.iter().map(op).collect();
            format!("{}({})", zig_ident(interner.resolve(*callee)), args.join(", "))
        }
        Opcode::AllocArray => "php_value_create_array()".to_string(),
        Opcode::ArrayGet(array, index) => format!("php_array_get({}, {})", op(array), op(index)),
        Opcode::ArraySet(array, index, value) => {
            format!("php_array_set({}, {}, {})", op(array), op(index), op(value))
        }
        Opcode::Echo(value) => format!("php_echo({})", op(value)),
        Opcode::Print(value) => format!("php_print({})", op(value)),
    }
}

fn emit_entry_point(out: &mut String, module: &Module, interner: &StringInterner) {
    let main_name = module
        .functions
        .iter()
        .find(|f| interner.resolve(f.name) == "main")
        .map(|f| interner.resolve(f.name))
        .unwrap_or("main");

    writeln!(out, "pub fn main() u8 {{").unwrap();
    writeln!(out, "    const result = {}();", zig_ident(main_name)).unwrap();
    writeln!(out, "    return @intCast(result);").unwrap();
    writeln!(out, "}}").unwrap();
}

/// Zig identifiers share PHP's naming rules closely enough that no mangling
/// is required beyond the names the front-end already interned.
fn zig_ident(name: &str) -> &str {
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, Module};
    use crate::types::ConcreteType;
    use phpaot_syntax::interner::StringInterner;

    #[test]
    fn emits_a_return_null_entry_point_for_an_empty_program() {
        let mut interner = StringInterner::new();
        let main = interner.intern("main");
        let mut module = Module::new("empty");
        let mut function = Function::new(main, Vec::new(), ConcreteType::Int);
        let block = function.new_block();
        function.block_mut(block).terminator = Some(Terminator::Ret(None));
        module.push_function(function);

        let text = emit(&module, &interner);
        assert!(text.contains("pub fn main() u8"));
        assert!(text.contains("return;"));
    }

    #[test]
    fn emission_is_deterministic_across_runs() {
        let mut interner = StringInterner::new();
        let main = interner.intern("main");
        let mut module = Module::new("det");
        let mut function = Function::new(main, Vec::new(), ConcreteType::Int);
        let block = function.new_block();
        function.block_mut(block).terminator = Some(Terminator::Ret(Some(Operand::ConstInt(0))));
        module.push_function(function);

        let first = emit(&module, &interner);
        let second = emit(&module, &interner);
        assert_eq!(first, second);
    }
}
