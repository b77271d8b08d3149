//! Assembly layer cake: a reverse-topological partition of the loaded
//! assemblies such that every cross-assembly reference points from a
//! higher-indexed layer into a strictly lower-indexed one.
//!
//! Works over the dependency snapshot captured during completion, which
//! predates the synthesized downward links — those are intentional backward
//! edges for reachability and would destroy the partial order here.

use anatomist::AssemblyGraph;
use common::AssemblyId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

pub(crate) fn assembly_layer_cake(graph: &AssemblyGraph) -> Vec<Vec<String>> {
    let registry = graph.registry();

    // Nodes: every loaded assembly plus everything touched by an edge.
    // Unloaded assemblies participate in the peel (their edges propagate)
    // but are dropped from the emitted layers.
    let mut dependency_graph: DiGraph<AssemblyId, ()> = DiGraph::new();
    let mut nodes: HashMap<AssemblyId, NodeIndex> = HashMap::new();
    let mut node_of = |g: &mut DiGraph<AssemblyId, ()>, id: AssemblyId| {
        *nodes.entry(id).or_insert_with(|| g.add_node(id))
    };

    for (id, info) in registry.iter() {
        if info.loaded {
            node_of(&mut dependency_graph, id);
        }
    }
    for &(dependent, dependency) in graph.dependency_snapshot() {
        let from = node_of(&mut dependency_graph, dependent);
        let to = node_of(&mut dependency_graph, dependency);
        dependency_graph.update_edge(from, to, ());
    }

    // An edge `A → B` reads "A depends on B", so the dependents of B are
    // its in-neighbors. Peel waves of assemblies nothing depends on.
    let mut dependents_left: HashMap<NodeIndex, usize> = dependency_graph
        .node_indices()
        .map(|n| {
            (
                n,
                dependency_graph
                    .neighbors_directed(n, Direction::Incoming)
                    .count(),
            )
        })
        .collect();

    let mut waves: Vec<Vec<NodeIndex>> = Vec::new();
    let mut remaining: usize = dependents_left.len();

    while remaining > 0 {
        let mut wave: Vec<NodeIndex> = dependents_left
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&n, _)| n)
            .collect();

        if wave.is_empty() {
            // A dependency cycle among the inputs; emit the remainder as
            // one final wave rather than looping forever.
            wave = dependents_left.keys().copied().collect();
            dependents_left.clear();
            remaining = 0;
        } else {
            for &n in &wave {
                dependents_left.remove(&n);
                remaining -= 1;
                for dependency in dependency_graph.neighbors_directed(n, Direction::Outgoing) {
                    if let Some(count) = dependents_left.get_mut(&dependency) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }
        waves.push(wave);
    }

    // Waves come out top-first (applications peel before their libraries);
    // reverse so layer 0 is the foundation.
    waves.reverse();

    let mut layers: Vec<Vec<String>> = Vec::new();
    for wave in waves {
        let mut names: Vec<String> = wave
            .into_iter()
            .map(|n| dependency_graph[n])
            .filter(|&id| registry.get(id).loaded)
            .map(|id| registry.get(id).name.clone())
            .collect();
        if names.is_empty() {
            continue;
        }
        names.sort();
        layers.push(names);
    }
    layers
}
