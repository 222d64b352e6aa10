use std::collections::HashMap;

use crate::error::{Error, Result};

/// Storage kind of a variable; decides the VM segment it lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Static,
    Field,
    Argument,
    Local,
}

impl Kind {
    fn is_class_scoped(self) -> bool {
        matches!(self, Kind::Static | Kind::Field)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

impl SubroutineKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "constructor" => Some(SubroutineKind::Constructor),
            "function" => Some(SubroutineKind::Function),
            "method" => Some(SubroutineKind::Method),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub ty: String,
    pub kind: Kind,
    pub index: u16,
}

/// Name of the implicit receiver argument of a method.
pub const RECEIVER: &str = "this";

#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    class_scope: HashMap<String, Symbol>,
    subroutine_scope: HashMap<String, Symbol>,
    counts: HashMap<Kind, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the arguments and locals of the previous subroutine. A method
    /// gets its receiver registered as argument 0.
    pub fn start_subroutine(&mut self, class_name: &str, kind: SubroutineKind) {
        self.subroutine_scope.clear();
        self.counts.remove(&Kind::Argument);
        self.counts.remove(&Kind::Local);

        if kind == SubroutineKind::Method {
            self.subroutine_scope.insert(
                RECEIVER.to_string(),
                Symbol {
                    ty: class_name.to_string(),
                    kind: Kind::Argument,
                    index: 0,
                },
            );
            self.counts.insert(Kind::Argument, 1);
        }
    }

    pub fn define(&mut self, name: &str, ty: &str, kind: Kind) -> Result<()> {
        let index = self.count(kind)?;
        let scope = if kind.is_class_scoped() {
            &mut self.class_scope
        } else {
            &mut self.subroutine_scope
        };

        if scope.contains_key(name) {
            return Err(Error::DuplicateSymbol {
                name: name.to_string(),
            });
        }

        scope.insert(
            name.to_string(),
            Symbol {
                ty: ty.to_string(),
                kind,
                index,
            },
        );
        *self.counts.entry(kind).or_default() += 1;
        Ok(())
    }

    /// Number of variables of `kind` in the scope that owns that kind.
    /// Fails once the count no longer fits a segment index.
    pub fn count(&self, kind: Kind) -> Result<u16> {
        let count = self.counts.get(&kind).copied().unwrap_or(0);
        u16::try_from(count).map_err(|_| Error::OutOfRange {
            what: format!("number of {kind:?} variables ({count})"),
        })
    }

    /// Looks a name up in the subroutine scope, then in the class scope.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.subroutine_scope
            .get(name)
            .or_else(|| self.class_scope.get(name))
    }

    pub fn resolve(&self, name: &str) -> Result<&Symbol> {
        self.get(name).ok_or_else(|| Error::UnresolvedSymbol {
            name: name.to_string(),
        })
    }

    pub fn kind_of(&self, name: &str) -> Result<Kind> {
        self.resolve(name).map(|s| s.kind)
    }

    pub fn type_of(&self, name: &str) -> Result<&str> {
        self.resolve(name).map(|s| s.ty.as_str())
    }

    pub fn index_of(&self, name: &str) -> Result<u16> {
        self.resolve(name).map(|s| s.index)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn indices_are_dense_per_kind() {
        let mut table = SymbolTable::new();
        table.define("a", "int", Kind::Field).unwrap();
        table.define("s", "int", Kind::Static).unwrap();
        table.define("b", "int", Kind::Field).unwrap();
        table.define("t", "Array", Kind::Static).unwrap();
        table.define("c", "boolean", Kind::Field).unwrap();

        assert_eq!(table.index_of("a").unwrap(), 0);
        assert_eq!(table.index_of("b").unwrap(), 1);
        assert_eq!(table.index_of("c").unwrap(), 2);
        assert_eq!(table.index_of("s").unwrap(), 0);
        assert_eq!(table.index_of("t").unwrap(), 1);
        assert_eq!(table.count(Kind::Field).unwrap(), 3);
        assert_eq!(table.count(Kind::Static).unwrap(), 2);
        assert_eq!(table.type_of("t").unwrap(), "Array");
    }

    #[test]
    fn start_subroutine_clears_locals() {
        let mut table = SymbolTable::new();
        table.start_subroutine("Main", SubroutineKind::Function);
        table.define("x", "int", Kind::Local).unwrap();
        assert_eq!(table.kind_of("x").unwrap(), Kind::Local);

        table.start_subroutine("Main", SubroutineKind::Function);
        assert_matches!(table.kind_of("x"), Err(Error::UnresolvedSymbol { name }) if name == "x");
        assert_eq!(table.count(Kind::Local).unwrap(), 0);
    }

    #[test]
    fn class_scope_survives_subroutines() {
        let mut table = SymbolTable::new();
        table.define("size", "int", Kind::Field).unwrap();
        table.start_subroutine("Point", SubroutineKind::Method);
        table.start_subroutine("Point", SubroutineKind::Function);
        assert_eq!(table.kind_of("size").unwrap(), Kind::Field);
        assert_eq!(table.count(Kind::Field).unwrap(), 1);
    }

    #[test]
    fn method_reserves_argument_zero() {
        let mut table = SymbolTable::new();
        table.start_subroutine("Point", SubroutineKind::Method);
        table.define("dx", "int", Kind::Argument).unwrap();

        assert_eq!(table.type_of(RECEIVER).unwrap(), "Point");
        assert_eq!(table.index_of(RECEIVER).unwrap(), 0);
        assert_eq!(table.index_of("dx").unwrap(), 1);
        assert_eq!(table.count(Kind::Argument).unwrap(), 2);
    }

    #[test]
    fn functions_and_constructors_have_no_receiver() {
        for kind in [SubroutineKind::Function, SubroutineKind::Constructor] {
            let mut table = SymbolTable::new();
            table.start_subroutine("Point", kind);
            table.define("x", "int", Kind::Argument).unwrap();
            assert_eq!(table.index_of("x").unwrap(), 0);
            assert!(table.get(RECEIVER).is_none());
        }
    }

    #[test]
    fn duplicate_in_same_scope_fails() {
        let mut table = SymbolTable::new();
        table.define("x", "int", Kind::Field).unwrap();
        assert_matches!(
            table.define("x", "char", Kind::Static),
            Err(Error::DuplicateSymbol { name }) if name == "x"
        );

        table.start_subroutine("Main", SubroutineKind::Function);
        table.define("y", "int", Kind::Argument).unwrap();
        assert_matches!(
            table.define("y", "int", Kind::Local),
            Err(Error::DuplicateSymbol { .. })
        );
    }

    #[test]
    fn subroutine_scope_shadows_class_scope() {
        let mut table = SymbolTable::new();
        table.define("x", "int", Kind::Field).unwrap();
        table.start_subroutine("Main", SubroutineKind::Function);
        table.define("x", "boolean", Kind::Local).unwrap();

        let symbol = table.resolve("x").unwrap();
        assert_eq!(symbol.kind, Kind::Local);
        assert_eq!(symbol.ty, "boolean");
        assert_eq!(symbol.index, 0);
    }

    #[test]
    fn slot_indices_stop_at_the_word_size() {
        let mut table = SymbolTable::new();
        table.start_subroutine("Main", SubroutineKind::Function);
        for i in 0..=u16::MAX {
            table.define(&format!("v{i}"), "int", Kind::Local).unwrap();
        }
        assert_eq!(table.index_of("v65535").unwrap(), u16::MAX);
        assert_matches!(table.count(Kind::Local), Err(Error::OutOfRange { .. }));
        assert_matches!(
            table.define("one_more", "int", Kind::Local),
            Err(Error::OutOfRange { .. })
        );
        assert_eq!(table.count(Kind::Field).unwrap(), 0);
    }
}
