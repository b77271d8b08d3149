//! # The Anatomist: assembly dissection & reference graph construction
//!
//! **Role**: turns a stream of binary metadata ([`cadaver::AssemblyBinary`])
//! into the whole-program symbol reference graph, then completes it with the
//! cross-assembly fix-ups no single binary can supply.
//!
//! **Core types**:
//! - [`AssemblyGraph`]: the one explicit state container. Record
//!   configuration, merge binaries serially, call [`AssemblyGraph::done`]
//!   once, then hand it to the reporting side.
//! - [`SymbolArena`]: dense handle-indexed symbol storage.
//! - [`AssemblyRegistry`]: per-assembly `(name, kind)` interning index.
//!
//! **Lifecycle**: merge is append-only and order-independent — the final
//! graph is identical up to arena index assignment for any permutation of
//! the same binaries. `done()` is a one-shot barrier; afterwards every
//! builder method fails with [`GraphError::Finalized`].

pub mod arena;
pub mod complete;
pub mod graph;
pub mod merge;
pub mod registry;
pub mod symbol;

pub use arena::SymbolArena;
pub use graph::{AssemblyGraph, GraphError, GraphStats, UNHOMED_ASSEMBLY};
pub use registry::{Assembly, AssemblyRegistry, DuplicateSighting};
pub use symbol::{MethodDetail, Symbol, SymbolDetail, TypeDetail};
