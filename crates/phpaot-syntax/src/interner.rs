use std::collections::HashMap;

/// An interned string: a dense index into a [`StringInterner`].
///
/// Comparing two identifiers (e.g. two uses of the same variable name) is
/// then a single integer comparison instead of a string compare.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Symbol(u32);

/// Deduplicates identifier and literal text shared between the PHP front-end
/// and the phpaot core.
///
/// The front-end populates this table while lexing; the core only ever reads
/// from it via [`StringInterner::resolve`].
///
/// Serialized as a plain JSON array of its string table (the `lookup` index
/// is rebuilt on deserialization), so a front-end can hand the core a flat
/// list of strings alongside the AST that indexes into it by position.
#[derive(Debug, Default, Clone)]
pub struct StringInterner {
    strings: Vec<String>,
    lookup: HashMap<String, Symbol>,
}

impl serde::Serialize for StringInterner {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.strings.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for StringInterner {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let strings = Vec::<String>::deserialize(deserializer)?;
        let lookup = strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), Symbol(i as u32)))
            .collect();
        Ok(StringInterner { strings, lookup })
    }
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: impl Into<String>) -> Symbol {
        let s = s.into();
        if let Some(&sym) = self.lookup.get(&s) {
            return sym;
        }

        let id = Symbol(self.strings.len() as u32);
        self.lookup.insert(s.clone(), id);
        self.strings.push(s);
        id
    }

    pub fn resolve(&self, symbol: Symbol) -> &str {
        &self.strings[symbol.0 as usize]
    }

    /// Look up `s`, without interning it if it isn't already present.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.lookup.get(s).copied()
    }
}

impl std::ops::Index<Symbol> for StringInterner {
    type Output = str;

    fn index(&self, index: Symbol) -> &Self::Output {
        self.resolve(index)
    }
}
