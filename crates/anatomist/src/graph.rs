//! The `AssemblyGraph` builder: configuration, interning, and the
//! merge/complete lifecycle.
//!
//! The graph is the single explicit state container of the whole analysis.
//! The driver constructs one, records configuration, feeds it binaries one
//! at a time, then calls [`AssemblyGraph::done`] exactly once. After that
//! the population is frozen and only the reporting side may touch it.

use crate::arena::SymbolArena;
use crate::registry::AssemblyRegistry;
use cadaver::AssemblyBinary;
use common::{AssemblyId, SymbolId, SymbolKind};
use std::collections::HashSet;

/// Pseudo-assembly holding placeholder symbols for method references whose
/// declaring type had no resolvable parent module.
pub const UNHOMED_ASSEMBLY: &str = "$$UNHOMED$$";

/// Merge runs `trim_excess` after this many assemblies to reclaim
/// over-reserved capacity.
const TRIM_INTERVAL: usize = 256;

/// Totals over the current graph population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub symbol_count: usize,
    pub edge_count: usize,
    pub loaded_assemblies: usize,
    pub unloaded_assemblies: usize,
}

/// Errors surfaced by the builder.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Builder mutation after `done()`.
    #[error("graph is finalized; roots, hints, and merges are no longer accepted")]
    Finalized,

    /// An entity of one kind was defined into a slot holding another kind.
    #[error("symbol `{name}` in `{assembly}` is a {actual}, cannot define it as a {expected}")]
    KindMismatch {
        assembly: String,
        name: String,
        actual: SymbolKind,
        expected: SymbolKind,
    },
}

/// The in-memory reference graph over every symbol of every seen assembly.
pub struct AssemblyGraph {
    pub(crate) arena: SymbolArena,
    pub(crate) registry: AssemblyRegistry,
    pub(crate) root_assemblies: HashSet<String>,
    pub(crate) test_method_attributes: HashSet<String>,
    pub(crate) reflection_marker_attributes: HashSet<String>,
    pub(crate) reflection_symbols: Vec<(String, String)>,
    /// Assembly-level `(dependent, dependency)` pairs, snapshotted during
    /// completion before derived links introduce downward edges.
    pub(crate) dependency_snapshot: Vec<(AssemblyId, AssemblyId)>,
    merged_since_trim: usize,
    completed: bool,
}

impl AssemblyGraph {
    pub fn new() -> Self {
        AssemblyGraph {
            arena: SymbolArena::new(),
            registry: AssemblyRegistry::new(),
            root_assemblies: HashSet::new(),
            test_method_attributes: HashSet::new(),
            reflection_marker_attributes: HashSet::new(),
            reflection_symbols: Vec::new(),
            dependency_snapshot: Vec::new(),
            merged_since_trim: 0,
            completed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), GraphError> {
        if self.completed {
            return Err(GraphError::Finalized);
        }
        Ok(())
    }

    /// Flags an assembly as a root: its public and protected symbols become
    /// reachability seeds.
    pub fn record_root_assembly(&mut self, name: &str) -> Result<(), GraphError> {
        self.ensure_open()?;
        self.root_assemblies.insert(name.to_string());
        // The assembly may already be merged; re-root its public surface so
        // recording order does not change the outcome.
        if let Some(id) = self.registry.lookup(name) {
            self.registry.get_mut(id).is_root = true;
            let symbols: Vec<SymbolId> =
                self.registry.get(id).symbols.iter().copied().collect();
            for sid in symbols {
                let sym = self.arena.get_mut(sid);
                if sym.is_public {
                    sym.root = true;
                }
            }
        }
        Ok(())
    }

    /// Registers an attribute full name that marks test methods.
    pub fn record_test_method_attribute(&mut self, full_name: &str) -> Result<(), GraphError> {
        self.ensure_open()?;
        self.test_method_attributes.insert(full_name.to_string());
        Ok(())
    }

    /// Registers an attribute full name that marks reflection-accessed
    /// declarations.
    pub fn record_reflection_marker_attribute(
        &mut self,
        full_name: &str,
    ) -> Result<(), GraphError> {
        self.ensure_open()?;
        self.reflection_marker_attributes
            .insert(full_name.to_string());
        Ok(())
    }

    /// Pins one named symbol of one assembly as reflection-reachable.
    pub fn record_reflection_symbol(
        &mut self,
        assembly_name: &str,
        symbol_name: &str,
    ) -> Result<(), GraphError> {
        self.ensure_open()?;
        self.reflection_symbols
            .push((assembly_name.to_string(), symbol_name.to_string()));
        Ok(())
    }

    /// Consumes one binary. Returns `true` on the first sighting of the
    /// assembly name; later sightings record a duplicate and change nothing.
    pub fn merge_assembly(&mut self, binary: &AssemblyBinary) -> Result<bool, GraphError> {
        self.ensure_open()?;
        let fresh = self.merge(binary)?;
        if fresh {
            self.merged_since_trim += 1;
            if self.merged_since_trim >= TRIM_INTERVAL {
                self.merged_since_trim = 0;
                self.trim_excess();
            }
        }
        Ok(fresh)
    }

    /// Runs graph completion: seeding, dependency snapshot, unhomed repair,
    /// derived-link synthesis, reflection propagation, marking, constant
    /// preservation. Idempotent; the first call freezes the population.
    pub fn done<F: FnMut(&str)>(&mut self, mut log: F) -> Result<(), GraphError> {
        if self.completed {
            return Ok(());
        }
        self.completed = true;
        self.complete(&mut log);
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn arena(&self) -> &SymbolArena {
        &self.arena
    }

    pub fn registry(&self) -> &AssemblyRegistry {
        &self.registry
    }

    /// Assembly dependency pairs `(dependent, dependency)` as they stood
    /// before derived-link synthesis. Empty until completion.
    pub fn dependency_snapshot(&self) -> &[(AssemblyId, AssemblyId)] {
        &self.dependency_snapshot
    }

    /// Current population totals. Edges are counted on the outgoing side.
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            symbol_count: self.arena.len(),
            ..GraphStats::default()
        };
        for (_, sym) in self.arena.iter() {
            stats.edge_count += sym.referenced_symbols.len();
        }
        for (_, info) in self.registry.iter() {
            if info.loaded {
                stats.loaded_assemblies += 1;
            } else if !info.symbols.is_empty() {
                stats.unloaded_assemblies += 1;
            }
        }
        stats
    }

    /// Interns `(name, kind)` inside an assembly, allocating on first use.
    pub(crate) fn intern(
        &mut self,
        assembly: AssemblyId,
        name: &str,
        kind: SymbolKind,
    ) -> SymbolId {
        if let Some(id) = self.registry.get(assembly).lookup(name, kind) {
            return id;
        }
        let id = self.arena.add(assembly, name.to_string(), kind);
        self.registry.get_mut(assembly).insert(name.to_string(), kind, id);
        id
    }

    pub(crate) fn check_kind(
        &self,
        id: SymbolId,
        expected: SymbolKind,
    ) -> Result<(), GraphError> {
        let sym = self.arena.get(id);
        if sym.kind != expected {
            return Err(GraphError::KindMismatch {
                assembly: self.registry.get(sym.assembly).name.clone(),
                name: sym.name.clone(),
                actual: sym.kind,
                expected,
            });
        }
        Ok(())
    }

    pub(crate) fn trim_excess(&mut self) {
        self.arena.trim_excess();
        self.registry.trim_excess();
    }
}

impl Default for AssemblyGraph {
    fn default() -> Self {
        AssemblyGraph::new()
    }
}
