//! Graph completion: the cross-assembly fix-ups a linear merge cannot do.
//!
//! Runs exactly once, from [`AssemblyGraph::done`]. Order matters:
//! the assembly dependency snapshot must be taken before derived-link
//! synthesis, because override and implementation edges deliberately point
//! downward (base member → derived member) and would manufacture
//! assembly-level cycles that destroy the layering.

use crate::arena::SymbolArena;
use crate::graph::{AssemblyGraph, UNHOMED_ASSEMBLY};
use crate::symbol::Symbol;
use common::{Access, AssemblyId, SymbolId, SymbolKind, TypeKind};
use std::collections::BTreeSet;

/// Members the runtime invokes on well-known unloaded system types. The
/// reader never delivers their definitions, so they are materialized here;
/// without them, state machines and enumerators would look dead.
/// Entries are `(type full name, is interface, member name + parameter list)`.
const SEEDED_SYSTEM_MEMBERS: &[(&str, bool, &[&str])] = &[
    (
        "System.Runtime.CompilerServices.IAsyncStateMachine",
        true,
        &[
            "MoveNext()",
            "SetStateMachine(System.Runtime.CompilerServices.IAsyncStateMachine)",
        ],
    ),
    ("System.IDisposable", true, &["Dispose()"]),
    ("System.Collections.IEnumerable", true, &["GetEnumerator()"]),
    (
        "System.Collections.Generic.IEnumerable`1",
        true,
        &["GetEnumerator()"],
    ),
    (
        "System.Collections.ICollection",
        true,
        &["CopyTo(System.Array, System.Int32)", "get_Count()"],
    ),
    (
        "System.Object",
        false,
        &["ToString()", "GetHashCode()", "Equals(System.Object)"],
    ),
];

/// Same short name, same parameter count. Parameter types are deliberately
/// not compared — which can over-connect overloads, but unloaded ancestors
/// leave nothing better to compare against.
fn similar_signature(arena: &SymbolArena, a: SymbolId, b: SymbolId) -> bool {
    let sa = arena.get(a);
    let sb = arena.get(b);
    match (sa.method_detail(), sb.method_detail()) {
        (Some(da), Some(db)) => {
            da.parameter_count == db.parameter_count && sa.short_name() == sb.short_name()
        }
        _ => false,
    }
}

fn parameter_count_of(suffix: &str) -> usize {
    let Some(open) = suffix.find('(') else {
        return 0;
    };
    let inner = suffix[open + 1..].trim_end_matches(')');
    if inner.trim().is_empty() {
        0
    } else {
        inner.matches(',').count() + 1
    }
}

impl AssemblyGraph {
    pub(crate) fn complete(&mut self, log: &mut dyn FnMut(&str)) {
        self.trim_excess();
        log("compacted symbol storage");

        self.seed_system_members();
        log("seeded well-known runtime members");

        self.snapshot_dependencies();
        log("captured assembly dependency snapshot");

        self.resolve_unhomed_references();
        log("resolved unhomed references");

        self.synthesize_derived_links();
        log("synthesized virtual dispatch and implementation links");

        self.propagate_reflection_targets();
        log("propagated reflection targets");

        self.mark_reachable();
        log("marked reachable symbols");

        self.preserve_constant_holders();
        log("preserved constant holders");
    }

    fn seed_system_members(&mut self) {
        let candidates: Vec<AssemblyId> = self
            .registry
            .iter()
            .filter(|(_, a)| !a.loaded && a.is_system())
            .map(|(id, _)| id)
            .collect();

        for asm_id in candidates {
            for (type_name, is_interface, members) in SEEDED_SYSTEM_MEMBERS {
                let Some(type_id) = self.registry.get(asm_id).lookup(type_name, SymbolKind::Type)
                else {
                    continue;
                };
                if let Some(detail) = self.arena.get_mut(type_id).type_detail_mut() {
                    if *is_interface {
                        detail.type_kind = TypeKind::Interface;
                    }
                }
                for member in *members {
                    let canonical = format!("{type_name}.{member}");
                    let member_id = self.intern(asm_id, &canonical, SymbolKind::Method);
                    let sym = self.arena.get_mut(member_id);
                    sym.access = Access::Public;
                    sym.is_public = true;
                    sym.declaring_type = Some(type_id);
                    if let Some(detail) = sym.method_detail_mut() {
                        detail.parameter_count = parameter_count_of(member);
                        detail.is_virtual_or_override_or_abstract = true;
                    }
                    if let Some(detail) = self.arena.get_mut(type_id).type_detail_mut() {
                        detail.members.insert(member_id);
                    }
                }
            }
        }
    }

    fn snapshot_dependencies(&mut self) {
        let mut edges: BTreeSet<(AssemblyId, AssemblyId)> = BTreeSet::new();
        for (_, sym) in self.arena.iter() {
            for &target in &sym.referenced_symbols {
                let target_assembly = self.arena.get(target).assembly;
                if target_assembly != sym.assembly {
                    edges.insert((sym.assembly, target_assembly));
                }
            }
        }
        self.dependency_snapshot = edges.into_iter().collect();
    }

    /// Placeholder methods in the pseudo-assembly are matched against every
    /// loaded assembly by canonical name. Matched edges are rewired onto the
    /// real symbol; unmatched edges are dropped. Either way the pseudo-
    /// assembly ends empty and is discarded.
    fn resolve_unhomed_references(&mut self) {
        let Some(unhomed_id) = self.registry.lookup(UNHOMED_ASSEMBLY) else {
            return;
        };

        let mut placeholders: Vec<SymbolId> = self
            .registry
            .get(unhomed_id)
            .symbols
            .iter()
            .copied()
            .collect();
        placeholders.sort();

        let loaded: Vec<AssemblyId> = self
            .registry
            .ids_by_name()
            .into_iter()
            .filter(|&id| self.registry.get(id).loaded)
            .collect();

        for placeholder in placeholders {
            let signature = self.arena.get(placeholder).name.clone();
            let target = loaded.iter().find_map(|&asm_id| {
                self.registry
                    .get(asm_id)
                    .lookup(&signature, SymbolKind::Method)
            });

            let referencers: Vec<SymbolId> =
                self.arena.get(placeholder).referencers.iter().copied().collect();
            for referencer in referencers {
                self.arena.remove_reference(referencer, placeholder);
                if let Some(real) = target {
                    self.arena.record_reference(referencer, real);
                }
            }
            self.arena.redirect(placeholder, Symbol::retired(unhomed_id));
        }

        self.registry.retire(unhomed_id);
    }

    /// Adds the downward edges that model virtual dispatch and interface
    /// implementation across the whole graph.
    fn synthesize_derived_links(&mut self) {
        let type_ids: Vec<SymbolId> = self
            .arena
            .iter()
            .filter(|(_, s)| s.kind == SymbolKind::Type)
            .map(|(id, _)| id)
            .collect();

        let mut new_edges: Vec<(SymbolId, SymbolId)> = Vec::new();

        for type_id in type_ids {
            let sym = self.arena.get(type_id);
            let Some(detail) = sym.type_detail() else {
                continue;
            };
            if detail.derived_types.is_empty() {
                continue;
            }
            let loaded = self.registry.get(sym.assembly).loaded;
            let is_interface = detail.type_kind == TypeKind::Interface;

            let base_members: Vec<SymbolId> = detail
                .members
                .iter()
                .copied()
                .filter(|&m| {
                    let member = self.arena.get(m);
                    if member.kind != SymbolKind::Method {
                        return false;
                    }
                    is_interface
                        || member
                            .method_detail()
                            .is_some_and(|d| d.is_virtual_or_override_or_abstract)
                })
                .collect();
            if base_members.is_empty() {
                continue;
            }

            for &derived in &detail.derived_types {
                let Some(derived_detail) = self.arena.get(derived).type_detail() else {
                    continue;
                };
                for &derived_member in &derived_detail.members {
                    let member = self.arena.get(derived_member);
                    if member.kind != SymbolKind::Method {
                        continue;
                    }
                    if !is_interface
                        && !member.method_detail().is_some_and(|d| d.is_override)
                    {
                        continue;
                    }
                    for &base_member in &base_members {
                        if similar_signature(&self.arena, base_member, derived_member) {
                            // Loaded hierarchies link member to member; for
                            // unloaded ones only the type symbol is a
                            // trustworthy anchor.
                            let source = if loaded { base_member } else { type_id };
                            new_edges.push((source, derived_member));
                        }
                    }
                }
            }
        }

        for (from, to) in new_edges {
            self.arena.record_reference(from, to);
        }
    }

    fn propagate_reflection_targets(&mut self) {
        // Explicitly configured symbols first; a configured type then fans
        // out to its members like any other flagged type.
        let configured = self.reflection_symbols.clone();
        for (assembly_name, symbol_name) in configured {
            let Some(asm_id) = self.registry.lookup(&assembly_name) else {
                continue;
            };
            for kind in [
                SymbolKind::Type,
                SymbolKind::Method,
                SymbolKind::Field,
                SymbolKind::Property,
                SymbolKind::Event,
                SymbolKind::Misc,
            ] {
                if let Some(id) = self.registry.get(asm_id).lookup(&symbol_name, kind) {
                    self.arena.get_mut(id).reflection_target = true;
                }
            }
        }

        let flagged_types: Vec<SymbolId> = self
            .arena
            .iter()
            .filter(|(_, s)| s.kind == SymbolKind::Type && s.reflection_target)
            .map(|(id, _)| id)
            .collect();
        for type_id in flagged_types {
            let members: Vec<SymbolId> = match self.arena.get(type_id).type_detail() {
                Some(d) => d.members.iter().copied().collect(),
                None => continue,
            };
            for member in members {
                self.arena.get_mut(member).reflection_target = true;
            }
        }
    }

    fn mark_reachable(&mut self) {
        let mut seeds: Vec<SymbolId> = Vec::new();
        for (_, info) in self.registry.iter() {
            if !info.loaded {
                continue;
            }
            for &id in &info.symbols {
                let sym = self.arena.get(id);
                if sym.root || sym.reflection_target {
                    seeds.push(id);
                }
            }
        }
        seeds.sort();
        for seed in seeds {
            self.arena.mark(seed);
        }
    }

    fn preserve_constant_holders(&mut self) {
        let mut holders: Vec<SymbolId> = Vec::new();
        for (_, info) in self.registry.iter() {
            if !info.loaded {
                continue;
            }
            for &id in &info.symbols {
                let sym = self.arena.get(id);
                if sym.kind == SymbolKind::Type
                    && !sym.marked
                    && sym.type_detail().is_some_and(|d| d.declares_constants)
                {
                    holders.push(id);
                }
            }
        }
        holders.sort();
        for holder in holders {
            self.arena.mark(holder);
        }
    }
}
