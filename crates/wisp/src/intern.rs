//! String interning: every identifier, field name, and string literal flows
//! through here so the rest of the pipeline compares `u32`s instead of
//! `str`s.

use ahash::AHashMap;

/// Index into the string interner's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(u32);

impl StringId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owns the canonical string table. One `Interner` is built per compile and
/// threaded through the lexer, parser, binder, and compiler, so a name is
/// interned exactly once no matter how many times it's spelled out in source.
#[derive(Debug, Default)]
pub struct Interner {
    strings: Vec<Box<str>>,
    lookup: AHashMap<Box<str>, StringId>,
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `text`, returning its existing id if already seen.
    pub fn intern(&mut self, text: &str) -> StringId {
        if let Some(&id) = self.lookup.get(text) {
            return id;
        }
        let id = StringId(self.strings.len() as u32);
        let boxed: Box<str> = text.into();
        self.strings.push(boxed.clone());
        self.lookup.insert(boxed, id);
        id
    }

    #[must_use]
    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_interns_share_an_id() {
        let mut interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("foo");
        assert_eq!(a, b);
        assert_eq!(interner.resolve(a), "foo");
    }

    #[test]
    fn distinct_strings_get_distinct_ids() {
        let mut interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("bar");
        assert_ne!(a, b);
        assert_eq!(interner.len(), 2);
    }
}
