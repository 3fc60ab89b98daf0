//! The type lattice shared by the symbol table (C4) and the type inferencer
//! (C5): a concrete type, a union of concrete types, or `unknown` pending
//! inference.

use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConcreteType {
    Null,
    Bool,
    Int,
    Float,
    String,
    Array,
    Object,
    Callable,
    Resource,
    Void,
}

impl fmt::Display for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConcreteType::Null => "null",
            ConcreteType::Bool => "bool",
            ConcreteType::Int => "int",
            ConcreteType::Float => "float",
            ConcreteType::String => "string",
            ConcreteType::Array => "array",
            ConcreteType::Object => "object",
            ConcreteType::Callable => "callable",
            ConcreteType::Resource => "resource",
            ConcreteType::Void => "void",
        };
        f.write_str(name)
    }
}

/// The type of an expression or symbol: a single concrete type, a
/// (canonicalized, non-empty) union of them, or `Unknown` before inference
/// has visited the node. `Unknown` must never survive into committed IR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferredType {
    Unknown,
    Concrete(ConcreteType),
    Union(BTreeSet<ConcreteType>),
}

impl InferredType {
    pub fn concrete(ty: ConcreteType) -> Self {
        InferredType::Concrete(ty)
    }

    /// A type-hinted parameter's starting type: concrete if hinted,
    /// `Unknown` if the hint was absent (modeled here as `ConcreteType::Void`
    /// by callers that have no hint to offer).
    pub fn concrete_or_unknown(ty: ConcreteType) -> Self {
        if ty == ConcreteType::Void {
            InferredType::Unknown
        } else {
            InferredType::Concrete(ty)
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, InferredType::Unknown)
    }

    /// All concrete types this value might hold (a single-element set for a
    /// concrete type, the full set for a union, empty for `Unknown`).
    pub fn concrete_types(&self) -> BTreeSet<ConcreteType> {
        match self {
            InferredType::Unknown => BTreeSet::new(),
            InferredType::Concrete(ty) => BTreeSet::from([*ty]),
            InferredType::Union(set) => set.clone(),
        }
    }

    /// Union `self` with `other`, canonicalizing back down to a concrete
    /// type when the result has exactly one member. Widening with `Unknown`
    /// is absorbing in the direction of the known type; `Unknown ∪ Unknown`
    /// stays `Unknown`.
    pub fn widen(&self, other: &InferredType) -> InferredType {
        match (self, other) {
            (InferredType::Unknown, other) => other.clone(),
            (this, InferredType::Unknown) => this.clone(),
            (this, other) if this == other => this.clone(),
            (this, other) => {
                let mut set = this.concrete_types();
                set.extend(other.concrete_types());
                InferredType::from_set(set)
            }
        }
    }

    pub fn from_set(set: BTreeSet<ConcreteType>) -> Self {
        let mut iter = set.iter();
        match (iter.next(), iter.next()) {
            (None, _) => InferredType::Unknown,
            (Some(&only), None) => InferredType::Concrete(only),
            _ => InferredType::Union(set),
        }
    }

    /// The conservative "could be anything" type used for calls to unknown
    /// callees.
    pub fn any() -> Self {
        InferredType::Union(BTreeSet::from([
            ConcreteType::Null,
            ConcreteType::Bool,
            ConcreteType::Int,
            ConcreteType::Float,
            ConcreteType::String,
            ConcreteType::Array,
            ConcreteType::Object,
            ConcreteType::Callable,
            ConcreteType::Resource,
        ]))
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferredType::Unknown => write!(f, "unknown"),
            InferredType::Concrete(ty) => write!(f, "{ty}"),
            InferredType::Union(set) => {
                let parts: Vec<String> = set.iter().map(|ty| ty.to_string()).collect();
                write!(f, "{}", parts.join("|"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_same_concrete_type_is_idempotent() {
        let int = InferredType::concrete(ConcreteType::Int);
        assert_eq!(int.widen(&int), int);
    }

    #[test]
    fn widening_distinct_types_produces_union() {
        let int = InferredType::concrete(ConcreteType::Int);
        let string = InferredType::concrete(ConcreteType::String);
        let widened = int.widen(&string);
        assert_eq!(
            widened,
            InferredType::Union(BTreeSet::from([ConcreteType::Int, ConcreteType::String]))
        );
    }

    #[test]
    fn unknown_is_absorbed_by_widening() {
        let int = InferredType::concrete(ConcreteType::Int);
        assert_eq!(InferredType::Unknown.widen(&int), int);
        assert_eq!(int.widen(&InferredType::Unknown), int);
    }
}
