//! Dense symbol storage addressed by 32-bit indices.
//!
//! Handles instead of pointers keep the cyclic reference graph free of
//! lifetime knots and hold per-symbol overhead to a few machine words, which
//! is what lets the graph carry tens of millions of symbols.

use crate::symbol::Symbol;
use common::{AssemblyId, SymbolId, SymbolKind};

/// Process-wide table of symbols. Grows monotonically during merging;
/// slots are only ever rewritten through [`SymbolArena::redirect`].
#[derive(Debug, Default)]
pub struct SymbolArena {
    symbols: Vec<Symbol>,
}

impl SymbolArena {
    pub fn new() -> Self {
        SymbolArena::default()
    }

    /// Allocates a new symbol and returns its handle. Construction is
    /// dispatched on `kind` (types and methods carry payloads).
    pub fn add(&mut self, assembly: AssemblyId, name: String, kind: SymbolKind) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol::new(assembly, name, kind));
        id
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    /// Replaces the occupant of a slot. Only unhomed-reference resolution
    /// does this; the caller must have rewired the occupant's edges first.
    pub fn redirect(&mut self, id: SymbolId, symbol: Symbol) {
        self.symbols[id.index()] = symbol;
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId(i as u32), s))
    }

    /// Records the edge `from → to` in both directions. Self-edges are
    /// silently refused.
    pub fn record_reference(&mut self, from: SymbolId, to: SymbolId) {
        if from == to {
            return;
        }
        self.symbols[from.index()].referenced_symbols.insert(to);
        self.symbols[to.index()].referencers.insert(from);
    }

    /// Removes the edge `from → to` from both sides.
    pub fn remove_reference(&mut self, from: SymbolId, to: SymbolId) {
        self.symbols[from.index()].referenced_symbols.remove(&to);
        self.symbols[to.index()].referencers.remove(&from);
    }

    /// Marks `start` and everything transitively referenced from it.
    /// Idempotent; iterative so deep chains cannot blow the stack.
    pub fn mark(&mut self, start: SymbolId) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let sym = &mut self.symbols[id.index()];
            if sym.marked {
                continue;
            }
            sym.marked = true;
            stack.extend(sym.referenced_symbols.iter().copied());
        }
    }

    /// Compacts every symbol's owned collections and the table itself.
    pub fn trim_excess(&mut self) {
        for sym in &mut self.symbols {
            sym.trim_excess();
        }
        self.symbols.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_with(n: usize) -> (SymbolArena, Vec<SymbolId>) {
        let mut arena = SymbolArena::new();
        let ids = (0..n)
            .map(|i| arena.add(AssemblyId(0), format!("Ns.S{i}"), SymbolKind::Type))
            .collect();
        (arena, ids)
    }

    #[test]
    fn test_add_and_get() {
        let mut arena = SymbolArena::new();
        let id = arena.add(AssemblyId(1), "Ns.Widget".into(), SymbolKind::Type);
        assert_eq!(arena.get(id).name, "Ns.Widget");
        assert_eq!(arena.get(id).assembly, AssemblyId(1));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_edge_symmetry() {
        let (mut arena, ids) = arena_with(2);
        arena.record_reference(ids[0], ids[1]);
        assert!(arena.get(ids[0]).referenced_symbols.contains(&ids[1]));
        assert!(arena.get(ids[1]).referencers.contains(&ids[0]));

        arena.remove_reference(ids[0], ids[1]);
        assert!(arena.get(ids[0]).referenced_symbols.is_empty());
        assert!(arena.get(ids[1]).referencers.is_empty());
    }

    #[test]
    fn test_self_edges_refused() {
        let (mut arena, ids) = arena_with(1);
        arena.record_reference(ids[0], ids[0]);
        assert!(arena.get(ids[0]).referenced_symbols.is_empty());
        assert!(arena.get(ids[0]).referencers.is_empty());
    }

    #[test]
    fn test_mark_closure() {
        // 0 → 1 → 2, and 3 isolated.
        let (mut arena, ids) = arena_with(4);
        arena.record_reference(ids[0], ids[1]);
        arena.record_reference(ids[1], ids[2]);
        arena.mark(ids[0]);

        assert!(arena.get(ids[0]).marked);
        assert!(arena.get(ids[1]).marked);
        assert!(arena.get(ids[2]).marked);
        assert!(!arena.get(ids[3]).marked);

        // Closure: everything referenced by a marked symbol is marked.
        for (_, sym) in arena.iter() {
            if sym.marked {
                for &t in &sym.referenced_symbols {
                    assert!(arena.get(t).marked);
                }
            }
        }
    }

    #[test]
    fn test_mark_survives_cycles() {
        let (mut arena, ids) = arena_with(3);
        arena.record_reference(ids[0], ids[1]);
        arena.record_reference(ids[1], ids[2]);
        arena.record_reference(ids[2], ids[0]);
        arena.mark(ids[0]);
        assert!(ids.iter().all(|&id| arena.get(id).marked));
    }

    #[test]
    fn test_mark_idempotent() {
        let (mut arena, ids) = arena_with(2);
        arena.record_reference(ids[0], ids[1]);
        arena.mark(ids[0]);
        arena.mark(ids[0]);
        assert!(arena.get(ids[1]).marked);
    }

    #[test]
    fn test_redirect_replaces_slot() {
        let (mut arena, ids) = arena_with(1);
        arena.redirect(ids[0], Symbol::retired(AssemblyId(9)));
        assert_eq!(arena.get(ids[0]).kind, SymbolKind::Misc);
        assert_eq!(arena.get(ids[0]).assembly, AssemblyId(9));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_trim_keeps_contents() {
        let (mut arena, ids) = arena_with(3);
        arena.record_reference(ids[0], ids[1]);
        arena.trim_excess();
        assert_eq!(arena.len(), 3);
        assert!(arena.get(ids[0]).referenced_symbols.contains(&ids[1]));
    }
}
