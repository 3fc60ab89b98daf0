//! The runtime ABI descriptor (component C3).
//!
//! Names the extern functions the emitted program binds against. The core
//! never sees how `PHPValue` is laid out in memory — that's the PHP runtime
//! library's business — it only needs the symbol names and arities so C7 and
//! C9 can emit correctly-shaped `call`s and `extern fn` declarations.

/// The tag of the opaque `PHPValue` boundary type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PHPValueKind {
    Null,
    Bool,
    Int,
    Float,
    String,
    Array,
    Object,
    Callable,
}

/// An extern function the runtime library exposes, named and arity-only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeFunction {
    pub name: &'static str,
    pub param_count: usize,
}

macro_rules! runtime_functions {
    ($($ident:ident => ($name:literal, $arity:literal)),* $(,)?) => {
        $(
            pub const $ident: RuntimeFunction = RuntimeFunction {
                name: $name,
                param_count: $arity,
            };
        )*

        /// Every runtime function this ABI names, in declaration order.
        pub const ALL: &[RuntimeFunction] = &[$($ident),*];
    };
}

runtime_functions! {
    PHP_VALUE_CREATE_NULL => ("php_value_create_null", 0),
    PHP_VALUE_CREATE_BOOL => ("php_value_create_bool", 1),
    PHP_VALUE_CREATE_INT => ("php_value_create_int", 1),
    PHP_VALUE_CREATE_FLOAT => ("php_value_create_float", 1),
    PHP_VALUE_CREATE_STRING => ("php_value_create_string", 1),
    PHP_VALUE_CREATE_ARRAY => ("php_value_create_array", 0),
    PHP_VALUE_CREATE_OBJECT => ("php_value_create_object", 1),
    PHP_GC_RETAIN => ("php_gc_retain", 1),
    PHP_GC_RELEASE => ("php_gc_release", 1),
    PHP_ECHO => ("php_echo", 1),
    PHP_PRINT => ("php_print", 1),
}

/// Look up a runtime function by name.
pub fn lookup(name: &str) -> Option<RuntimeFunction> {
    ALL.iter().copied().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_is_unique() {
        let mut names: Vec<&str> = ALL.iter().map(|f| f.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ALL.len());
    }

    #[test]
    fn lookup_finds_known_functions() {
        assert_eq!(lookup("php_echo"), Some(PHP_ECHO));
        assert_eq!(lookup("not_a_runtime_function"), None);
    }
}
