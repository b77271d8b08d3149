//! The symbol record: one declared entity and its edge sets.
//!
//! Symbols never hold references to each other, only [`SymbolId`] handles;
//! the graph is cyclic and an arena of handles keeps that cheap.

use common::{method_short_name, Access, AssemblyId, SymbolId, SymbolKind, TypeKind};
use std::collections::HashSet;

/// Kind-specific payload, dispatched on [`SymbolKind`] at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolDetail {
    None,
    Type(TypeDetail),
    Method(MethodDetail),
}

/// Payload of a `Type` symbol: hierarchy bookkeeping and the constant flag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeDetail {
    pub type_kind: TypeKind,
    pub members: HashSet<SymbolId>,
    pub base_types: HashSet<SymbolId>,
    pub interfaces_implemented: HashSet<SymbolId>,
    /// Every transitively derived type seen anywhere in the input set.
    pub derived_types: HashSet<SymbolId>,
    /// IL bakes constant values into call sites, so a type that exists only
    /// to publish constants has no inbound edges. This flag keeps it alive.
    pub declares_constants: bool,
}

/// Payload of a `Method` symbol.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodDetail {
    pub is_virtual_or_override_or_abstract: bool,
    pub is_override: bool,
    pub is_test_method: bool,
    pub parameter_count: usize,
    /// Signatures of method references whose declaring type had no parent
    /// module at merge time. Repaired or dropped during completion.
    pub unhomed_references: Vec<String>,
}

/// One declared entity. `(assembly, name, kind)` is the identity; everything
/// else is state accumulated by the merge pass and completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub assembly: AssemblyId,
    /// Canonical textual key. Methods carry a parenthesized parameter-type
    /// suffix so overloads intern separately.
    pub name: String,
    pub kind: SymbolKind,
    pub declaring_type: Option<SymbolId>,
    pub access: Access,
    /// Compiler-generated or special; excluded from user-visible reports.
    pub hide: bool,
    /// Effective accessibility is `Public` or `Protected`.
    pub is_public: bool,
    /// Reachability seed.
    pub root: bool,
    /// Conservatively kept alive for runtime reflection access.
    pub reflection_target: bool,
    /// Transient reachability flag; written once, never cleared.
    pub marked: bool,
    pub referenced_symbols: HashSet<SymbolId>,
    pub referencers: HashSet<SymbolId>,
    pub detail: SymbolDetail,
}

impl Symbol {
    pub fn new(assembly: AssemblyId, name: String, kind: SymbolKind) -> Self {
        let detail = match kind {
            SymbolKind::Type => SymbolDetail::Type(TypeDetail::default()),
            SymbolKind::Method => SymbolDetail::Method(MethodDetail::default()),
            _ => SymbolDetail::None,
        };
        Symbol {
            assembly,
            name,
            kind,
            declaring_type: None,
            access: Access::Private,
            hide: false,
            is_public: false,
            root: false,
            reflection_target: false,
            marked: false,
            referenced_symbols: HashSet::new(),
            referencers: HashSet::new(),
            detail,
        }
    }

    /// Blank `Misc` symbol used to overwrite a slot whose occupant was
    /// redirected away during unhomed-reference resolution.
    pub fn retired(assembly: AssemblyId) -> Self {
        let mut sym = Symbol::new(assembly, String::new(), SymbolKind::Misc);
        sym.hide = true;
        sym
    }

    pub fn type_detail(&self) -> Option<&TypeDetail> {
        match &self.detail {
            SymbolDetail::Type(d) => Some(d),
            _ => None,
        }
    }

    pub fn type_detail_mut(&mut self) -> Option<&mut TypeDetail> {
        match &mut self.detail {
            SymbolDetail::Type(d) => Some(d),
            _ => None,
        }
    }

    pub fn method_detail(&self) -> Option<&MethodDetail> {
        match &self.detail {
            SymbolDetail::Method(d) => Some(d),
            _ => None,
        }
    }

    pub fn method_detail_mut(&mut self) -> Option<&mut MethodDetail> {
        match &mut self.detail {
            SymbolDetail::Method(d) => Some(d),
            _ => None,
        }
    }

    /// Short name used by the "similar signature" test.
    pub fn short_name(&self) -> &str {
        method_short_name(&self.name)
    }

    /// The report-facing kind string: the type flavor for types, the symbol
    /// kind for everything else.
    pub fn kind_label(&self) -> String {
        match self.type_detail() {
            Some(d) => d.type_kind.to_string(),
            None => self.kind.to_string(),
        }
    }

    /// Releases over-reserved capacity in the owned collections.
    pub fn trim_excess(&mut self) {
        self.referenced_symbols.shrink_to_fit();
        self.referencers.shrink_to_fit();
        match &mut self.detail {
            SymbolDetail::Type(d) => {
                d.members.shrink_to_fit();
                d.base_types.shrink_to_fit();
                d.interfaces_implemented.shrink_to_fit();
                d.derived_types.shrink_to_fit();
            }
            SymbolDetail::Method(d) => d.unhomed_references.shrink_to_fit(),
            SymbolDetail::None => {}
        }
    }
}
