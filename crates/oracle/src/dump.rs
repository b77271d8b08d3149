//! Debugging dump of the entire finalized graph.

use anatomist::AssemblyGraph;
use common::SymbolId;
use std::io::{self, Write};

pub(crate) fn dump<W: Write>(graph: &AssemblyGraph, writer: &mut W) -> io::Result<()> {
    let arena = graph.arena();
    let registry = graph.registry();

    for asm_id in registry.ids_by_name() {
        let info = registry.get(asm_id);
        writeln!(
            writer,
            "Assembly {} {}",
            info.name,
            if info.loaded { "(loaded)" } else { "(not loaded)" }
        )?;

        let mut ids: Vec<SymbolId> = info.symbols.iter().copied().collect();
        ids.sort_by(|a, b| arena.get(*a).name.cmp(&arena.get(*b).name));

        for id in ids {
            let sym = arena.get(id);
            writeln!(
                writer,
                "  {} [{} {} {} {}]",
                sym.name,
                if sym.marked { "ALIVE" } else { "DEAD" },
                if sym.hide { "HIDE" } else { "!HIDE" },
                if sym.root { "ROOT" } else { "!ROOT" },
                if sym.reflection_target {
                    "REFLECTION_TARGET"
                } else {
                    "!REFLECTION_TARGET"
                },
            )?;

            let mut names: Vec<&str> = sym
                .referenced_symbols
                .iter()
                .map(|&t| arena.get(t).name.as_str())
                .collect();
            names.sort_unstable();
            if !names.is_empty() {
                writeln!(writer, "    directly references: {}", names.join(", "))?;
            }

            let mut names: Vec<&str> = sym
                .referencers
                .iter()
                .map(|&t| arena.get(t).name.as_str())
                .collect();
            names.sort_unstable();
            if !names.is_empty() {
                writeln!(writer, "    referenced by: {}", names.join(", "))?;
            }
        }
    }
    Ok(())
}
