//! Per-assembly symbol index.
//!
//! The registry owns one record per assembly name ever seen — loaded from a
//! binary, referenced from another assembly's metadata, or named by an
//! `InternalsVisibleTo` attribute. Its `(name, kind)` index is what makes
//! merge-pass interning O(1).

use common::{AssemblyId, SymbolId, SymbolKind};
use std::collections::{HashMap, HashSet};

/// A later sighting of an already-merged assembly name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSighting {
    pub path: String,
    pub version: Option<String>,
}

/// One assembly record.
#[derive(Debug)]
pub struct Assembly {
    pub name: String,
    pub version: Option<String>,
    /// True once the reader finished and the merge pass consumed the binary.
    pub loaded: bool,
    /// Flagged by the driver; public surface of root assemblies is rooted.
    pub is_root: bool,
    pub symbols: HashSet<SymbolId>,
    pub internals_visible_to: HashSet<AssemblyId>,
    /// First merged copy wins; the rest land here.
    pub duplicates: Vec<DuplicateSighting>,
    /// `(canonical name, kind) → symbol`, stored as a small per-name list
    /// because a name rarely exists at more than two kinds.
    index: HashMap<String, Vec<(SymbolKind, SymbolId)>>,
}

impl Assembly {
    fn new(name: String) -> Self {
        Assembly {
            name,
            version: None,
            loaded: false,
            is_root: false,
            symbols: HashSet::new(),
            internals_visible_to: HashSet::new(),
            duplicates: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Well-known runtime and framework assemblies.
    pub fn is_system(&self) -> bool {
        matches!(
            self.name.as_str(),
            "mscorlib" | "System" | "netstandard" | "WindowsBase"
        ) || self.name.starts_with("System.")
            || self.name.starts_with("Microsoft.")
    }

    pub fn lookup(&self, name: &str, kind: SymbolKind) -> Option<SymbolId> {
        self.index
            .get(name)?
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
    }

    pub(crate) fn insert(&mut self, name: String, kind: SymbolKind, id: SymbolId) {
        self.index.entry(name).or_default().push((kind, id));
        self.symbols.insert(id);
    }

    pub(crate) fn clear_symbols(&mut self) {
        self.symbols.clear();
        self.index.clear();
    }

    pub fn trim_excess(&mut self) {
        self.symbols.shrink_to_fit();
        self.index.shrink_to_fit();
        self.duplicates.shrink_to_fit();
    }
}

/// `name → Assembly` map with dense handles.
#[derive(Debug, Default)]
pub struct AssemblyRegistry {
    assemblies: Vec<Assembly>,
    by_name: HashMap<String, AssemblyId>,
}

impl AssemblyRegistry {
    pub fn new() -> Self {
        AssemblyRegistry::default()
    }

    /// Returns the assembly with this name, creating an unloaded record on
    /// first sight.
    pub fn get_or_create(&mut self, name: &str) -> AssemblyId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = AssemblyId(self.assemblies.len() as u32);
        self.assemblies.push(Assembly::new(name.to_string()));
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<AssemblyId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: AssemblyId) -> &Assembly {
        &self.assemblies[id.index()]
    }

    pub fn get_mut(&mut self, id: AssemblyId) -> &mut Assembly {
        &mut self.assemblies[id.index()]
    }

    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssemblyId, &Assembly)> {
        self.assemblies
            .iter()
            .enumerate()
            .map(|(i, a)| (AssemblyId(i as u32), a))
    }

    /// Assembly ids sorted by assembly name, for deterministic walks.
    pub fn ids_by_name(&self) -> Vec<AssemblyId> {
        let mut ids: Vec<AssemblyId> = (0..self.assemblies.len() as u32).map(AssemblyId).collect();
        ids.sort_by(|a, b| self.get(*a).name.cmp(&self.get(*b).name));
        ids
    }

    /// Records an `InternalsVisibleTo` grant. The raw attribute argument may
    /// carry a `, PublicKey=…` suffix; everything after the first comma is
    /// stripped. The target assembly is created on demand, unloaded.
    pub fn record_internals_visible_to(&mut self, grantor: AssemblyId, raw_target: &str) {
        let target_name = raw_target
            .split(',')
            .next()
            .unwrap_or(raw_target)
            .trim();
        if target_name.is_empty() {
            return;
        }
        let target = self.get_or_create(target_name);
        if target != grantor {
            self.get_mut(grantor).internals_visible_to.insert(target);
        }
    }

    pub fn add_duplicate(&mut self, id: AssemblyId, path: String, version: Option<String>) {
        self.get_mut(id)
            .duplicates
            .push(DuplicateSighting { path, version });
    }

    /// Empties an assembly record and removes its name binding. Used to
    /// discard the unhomed pseudo-assembly after resolution.
    pub fn retire(&mut self, id: AssemblyId) {
        let name = self.get(id).name.clone();
        self.by_name.remove(&name);
        let a = self.get_mut(id);
        a.clear_symbols();
        a.loaded = false;
    }

    pub fn trim_excess(&mut self) {
        for a in &mut self.assemblies {
            a.trim_excess();
        }
        self.assemblies.shrink_to_fit();
        self.by_name.shrink_to_fit();
    }
}
