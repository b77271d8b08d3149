//! Mermaid dependency diagram over the loaded assemblies.

use anatomist::AssemblyGraph;
use std::collections::BTreeSet;

pub(crate) fn dependency_diagram(graph: &AssemblyGraph) -> String {
    let registry = graph.registry();

    // Alphabetical edge set for stable output; Mermaid identifiers cannot
    // carry dashes, so they become underscores.
    let edges: BTreeSet<(String, String)> = graph
        .dependency_snapshot()
        .iter()
        .filter(|(from, to)| registry.get(*from).loaded && registry.get(*to).loaded)
        .map(|&(from, to)| {
            (
                registry.get(from).name.replace('-', "_"),
                registry.get(to).name.replace('-', "_"),
            )
        })
        .collect();

    let mut out = String::from("stateDiagram-v2\n");
    for (from, to) in edges {
        out.push_str("    ");
        out.push_str(&from);
        out.push_str(" --> ");
        out.push_str(&to);
        out.push('\n');
    }
    out
}
