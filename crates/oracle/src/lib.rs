//! # The Oracle: verdicts over the finalized assembly graph
//!
//! **Role**: pure projections. The [`Reporter`] borrows a completed
//! [`AssemblyGraph`] and materializes the report shapes the driver emits:
//! dead symbols, alive symbols, symbols alive only through tests, public
//! symbols that could be internal, unreferenced and unanalyzed assemblies,
//! duplicate assemblies, needless `InternalsVisibleTo` grants, the assembly
//! layer cake, and the Mermaid dependency diagram.
//!
//! Every emitted list is sorted bytewise by its declared key, so report
//! output is identical for any merge order of the same inputs.

mod diagram;
mod dump;
mod layer;

use anatomist::{Assembly, AssemblyGraph};
use common::{AssemblyId, SymbolId, SymbolKind};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{self, Write};

/// Errors surfaced by the reporting side.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The builder was never finalized; reports would be meaningless.
    #[error("graph completion has not run; call done() before reporting")]
    GraphNotCompleted,
}

/// A dead type or member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadSymbol {
    pub name: String,
    /// Type flavor for types (`Class`, `Interface`, …), symbol kind for
    /// members (`Method`, `Field`, …).
    pub kind: String,
    pub access: String,
}

/// Dead symbols of one assembly: unmarked types, and unmarked members of
/// otherwise-alive types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadSymbolsEntry {
    pub assembly: String,
    pub dead_types: Vec<DeadSymbol>,
    pub dead_members: Vec<DeadSymbol>,
}

/// An alive symbol with the marked referencers keeping it that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliveSymbol {
    pub name: String,
    pub dependents: Vec<String>,
}

/// Alive symbols of one assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliveSymbolsEntry {
    pub assembly: String,
    pub symbols: Vec<AliveSymbol>,
}

/// Public symbols of one assembly that no other assembly references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeedlesslyPublicEntry {
    pub assembly: String,
    pub types: Vec<String>,
    pub members: Vec<String>,
}

/// One extra sighting of an already-merged assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateSighting {
    pub path: String,
    pub version: Option<String>,
}

/// Duplicate sightings of one assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateAssembliesEntry {
    pub assembly: String,
    pub duplicates: Vec<DuplicateSighting>,
}

/// An `InternalsVisibleTo` grant whose beneficiary touches no internals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeedlessInternalsVisibleTo {
    pub assembly: String,
    pub target: String,
}

/// Report projections over a completed [`AssemblyGraph`].
pub struct Reporter<'g> {
    graph: &'g AssemblyGraph,
}

impl<'g> Reporter<'g> {
    pub fn new(graph: &'g AssemblyGraph) -> Result<Self, OracleError> {
        if !graph.is_completed() {
            return Err(OracleError::GraphNotCompleted);
        }
        Ok(Reporter { graph })
    }

    /// Loaded, non-system assemblies in name order: the population every
    /// per-assembly report iterates.
    fn reportable_assemblies(&self) -> Vec<(AssemblyId, &'g Assembly)> {
        self.graph
            .registry()
            .ids_by_name()
            .into_iter()
            .map(|id| (id, self.graph.registry().get(id)))
            .filter(|(_, info)| info.loaded && !info.is_system())
            .collect()
    }

    pub fn collect_dead_symbols(&self) -> Vec<DeadSymbolsEntry> {
        let arena = self.graph.arena();
        let mut entries = Vec::new();

        for (_, info) in self.reportable_assemblies() {
            let mut dead_types = Vec::new();
            let mut dead_members = Vec::new();

            for &id in &info.symbols {
                let sym = arena.get(id);
                if sym.kind != SymbolKind::Type || sym.hide {
                    continue;
                }
                if !sym.marked {
                    dead_types.push(DeadSymbol {
                        name: sym.name.clone(),
                        kind: sym.kind_label(),
                        access: sym.access.to_string(),
                    });
                    continue;
                }
                // Alive type: its unmarked members are the dead ones.
                let Some(detail) = sym.type_detail() else {
                    continue;
                };
                for &member_id in &detail.members {
                    let member = arena.get(member_id);
                    if member.kind == SymbolKind::Type || member.hide || member.marked {
                        continue;
                    }
                    dead_members.push(DeadSymbol {
                        name: member.name.clone(),
                        kind: member.kind_label(),
                        access: member.access.to_string(),
                    });
                }
            }

            if dead_types.is_empty() && dead_members.is_empty() {
                continue;
            }
            dead_types.sort_by(|a, b| a.name.cmp(&b.name));
            dead_members.sort_by(|a, b| a.name.cmp(&b.name));
            entries.push(DeadSymbolsEntry {
                assembly: info.name.clone(),
                dead_types,
                dead_members,
            });
        }
        entries
    }

    /// Alive symbols of one assembly; `test_dependents_only` restricts the
    /// dependents to marked test methods.
    fn alive_symbols_of(&self, info: &Assembly, test_dependents_only: bool) -> Vec<AliveSymbol> {
        let arena = self.graph.arena();
        let mut symbols = Vec::new();

        let collect = |id: SymbolId| {
            let sym = arena.get(id);
            let mut dependents: BTreeSet<String> = BTreeSet::new();
            for &referencer_id in &sym.referencers {
                let referencer = arena.get(referencer_id);
                if !referencer.marked {
                    continue;
                }
                if test_dependents_only
                    && !(referencer.kind == SymbolKind::Method
                        && referencer
                            .method_detail()
                            .is_some_and(|d| d.is_test_method))
                {
                    continue;
                }
                dependents.insert(referencer.name.clone());
            }
            if test_dependents_only && dependents.is_empty() {
                return None;
            }
            Some(AliveSymbol {
                name: sym.name.clone(),
                dependents: dependents.into_iter().collect(),
            })
        };

        for &id in &info.symbols {
            let sym = arena.get(id);
            if sym.kind != SymbolKind::Type || sym.hide || !sym.marked {
                continue;
            }
            symbols.extend(collect(id));
            let Some(detail) = sym.type_detail() else {
                continue;
            };
            for &member_id in &detail.members {
                let member = arena.get(member_id);
                if member.kind == SymbolKind::Type || member.hide || !member.marked {
                    continue;
                }
                symbols.extend(collect(member_id));
            }
        }

        symbols.sort_by(|a, b| a.name.cmp(&b.name));
        symbols
    }

    pub fn collect_alive_symbols(&self) -> Vec<AliveSymbolsEntry> {
        self.reportable_assemblies()
            .into_iter()
            .map(|(_, info)| AliveSymbolsEntry {
                assembly: info.name.clone(),
                symbols: self.alive_symbols_of(info, false),
            })
            .collect()
    }

    pub fn collect_alive_by_test_symbols(&self) -> Vec<AliveSymbolsEntry> {
        self.reportable_assemblies()
            .into_iter()
            .filter_map(|(_, info)| {
                let symbols = self.alive_symbols_of(info, true);
                if symbols.is_empty() {
                    return None;
                }
                Some(AliveSymbolsEntry {
                    assembly: info.name.clone(),
                    symbols,
                })
            })
            .collect()
    }

    pub fn collect_needlessly_public_symbols(&self) -> Vec<NeedlesslyPublicEntry> {
        let arena = self.graph.arena();
        let mut entries = Vec::new();

        for (asm_id, info) in self.reportable_assemblies() {
            let mut types = Vec::new();
            let mut members = Vec::new();

            for &id in &info.symbols {
                let sym = arena.get(id);
                if sym.hide || sym.root || !sym.is_public {
                    continue;
                }
                let local_only = sym
                    .referencers
                    .iter()
                    .all(|&r| arena.get(r).assembly == asm_id);
                if !local_only {
                    continue;
                }
                if sym.kind == SymbolKind::Type {
                    types.push(sym.name.clone());
                } else {
                    members.push(sym.name.clone());
                }
            }

            if types.is_empty() && members.is_empty() {
                continue;
            }
            types.sort();
            members.sort();
            entries.push(NeedlesslyPublicEntry {
                assembly: info.name.clone(),
                types,
                members,
            });
        }
        entries
    }

    /// Loaded assemblies nothing alive lives in.
    pub fn collect_unreferenced_assemblies(&self) -> Vec<String> {
        self.reportable_assemblies()
            .into_iter()
            .filter(|(_, info)| self.alive_symbols_of(info, false).is_empty())
            .map(|(_, info)| info.name.clone())
            .collect()
    }

    /// Assemblies that were referenced but never delivered by the reader,
    /// system assemblies and empty placeholder records excluded.
    pub fn collect_unanalyzed_assemblies(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .graph
            .registry()
            .iter()
            .filter(|(_, info)| !info.loaded && !info.is_system() && !info.symbols.is_empty())
            .map(|(_, info)| info.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn collect_duplicate_assemblies(&self) -> Vec<DuplicateAssembliesEntry> {
        let mut entries: Vec<DuplicateAssembliesEntry> = self
            .graph
            .registry()
            .iter()
            .filter(|(_, info)| info.loaded && !info.duplicates.is_empty())
            .map(|(_, info)| DuplicateAssembliesEntry {
                assembly: info.name.clone(),
                duplicates: info
                    .duplicates
                    .iter()
                    .map(|d| DuplicateSighting {
                        path: d.path.clone(),
                        version: d.version.clone(),
                    })
                    .collect(),
            })
            .collect();
        entries.sort_by(|a, b| a.assembly.cmp(&b.assembly));
        entries
    }

    /// `InternalsVisibleTo` grants whose beneficiary is loaded yet touches
    /// only public symbols of the grantor.
    pub fn collect_needless_internals_visible_to(&self) -> Vec<NeedlessInternalsVisibleTo> {
        let arena = self.graph.arena();
        let registry = self.graph.registry();
        let mut entries = Vec::new();

        for (asm_id, info) in self.reportable_assemblies() {
            let mut targets: Vec<AssemblyId> = info.internals_visible_to.iter().copied().collect();
            targets.sort_by(|a, b| registry.get(*a).name.cmp(&registry.get(*b).name));

            for target_id in targets {
                let target = registry.get(target_id);
                if !target.loaded {
                    continue;
                }
                let uses_internals = target.symbols.iter().any(|&id| {
                    arena.get(id).referenced_symbols.iter().any(|&referenced| {
                        let r = arena.get(referenced);
                        r.assembly == asm_id && !r.is_public
                    })
                });
                if !uses_internals {
                    entries.push(NeedlessInternalsVisibleTo {
                        assembly: info.name.clone(),
                        target: target.name.clone(),
                    });
                }
            }
        }

        entries.sort_by(|a, b| (&a.assembly, &a.target).cmp(&(&b.assembly, &b.target)));
        entries
    }

    /// Layers of loaded assemblies; each layer references only layers below.
    pub fn create_assembly_layer_cake(&self) -> Vec<Vec<String>> {
        layer::assembly_layer_cake(self.graph)
    }

    /// Mermaid `stateDiagram-v2` of the loaded-assembly dependencies.
    pub fn create_dependency_diagram(&self) -> String {
        diagram::dependency_diagram(self.graph)
    }

    /// Writes the per-symbol flag dump of the whole graph.
    pub fn dump<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        dump::dump(self.graph, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadaver::{
        AncestorRef, AssemblyBinary, AttributeRef, FieldEntity, Instruction, MethodBody,
        MethodEntity, MethodRef, TypeEntity, TypeRef,
    };
    use common::{Access, MethodFlags, TypeKind};

    const TEST_ATTR: &str = "Microsoft.VisualStudio.TestTools.UnitTesting.TestMethodAttribute";
    const IVT_ATTR: &str = "System.Runtime.CompilerServices.InternalsVisibleToAttribute";

    fn public_class(full_name: &str) -> TypeEntity {
        let mut t = TypeEntity::new(full_name, TypeKind::Class);
        t.access = Access::Public;
        t
    }

    fn static_main_calling(targets: &[(&str, &str, &str)]) -> MethodEntity {
        let mut main = MethodEntity::new("Main");
        main.flags = MethodFlags::STATIC;
        main.body = Some(MethodBody {
            instructions: targets
                .iter()
                .map(|(assembly, type_name, method)| {
                    Instruction::calls(MethodRef {
                        declaring_type: TypeRef::named(assembly, type_name),
                        name: method.to_string(),
                        parameter_types: vec![],
                    })
                })
                .collect(),
            locals: vec![],
            catch_types: vec![],
        });
        main
    }

    fn completed(binaries: &[&AssemblyBinary]) -> AssemblyGraph {
        let mut graph = AssemblyGraph::new();
        for binary in binaries {
            graph.merge_assembly(binary).unwrap();
        }
        graph.done(|_| {}).unwrap();
        graph
    }

    #[test]
    fn test_reporter_requires_completion() {
        let graph = AssemblyGraph::new();
        assert!(matches!(
            Reporter::new(&graph),
            Err(OracleError::GraphNotCompleted)
        ));
    }

    #[test]
    fn test_dead_class_reported_alive_main_not() {
        // An executable whose Main only writes a literal, next to a library
        // with an unused public class.
        let mut exe = AssemblyBinary::new("Exe");
        let mut program = public_class("Exe.Program");
        program.methods.push(static_main_calling(&[]));
        exe.types.push(program);

        let mut lib = AssemblyBinary::new("Lib");
        lib.types.push(public_class("Lib.DeadClass"));

        let graph = completed(&[&exe, &lib]);
        let reporter = Reporter::new(&graph).unwrap();

        let dead = reporter.collect_dead_symbols();
        let lib_entry = dead.iter().find(|e| e.assembly == "Lib").expect("Lib entry");
        assert_eq!(
            lib_entry.dead_types,
            vec![DeadSymbol {
                name: "Lib.DeadClass".into(),
                kind: "Class".into(),
                access: "Public".into(),
            }]
        );

        let alive = reporter.collect_alive_symbols();
        let exe_entry = alive.iter().find(|e| e.assembly == "Exe").expect("Exe entry");
        assert!(exe_entry
            .symbols
            .iter()
            .any(|s| s.name == "Exe.Program.Main()"));
        // Lib is not a root assembly, so nothing pins DeadClass.
        let lib_alive = alive.iter().find(|e| e.assembly == "Lib").unwrap();
        assert!(lib_alive.symbols.is_empty());
    }

    #[test]
    fn test_dead_members_of_alive_type() {
        let mut exe = AssemblyBinary::new("Exe");
        let mut program = public_class("Exe.Program");
        program.methods.push(static_main_calling(&[("Lib", "Lib.Widget", "Used")]));
        exe.types.push(program);

        let mut lib = AssemblyBinary::new("Lib");
        let mut widget = public_class("Lib.Widget");
        widget.methods.push(MethodEntity::new("Used"));
        let mut unused = MethodEntity::new("Unused");
        unused.access = Access::Internal;
        widget.methods.push(unused);
        lib.types.push(widget);

        let graph = completed(&[&exe, &lib]);
        let reporter = Reporter::new(&graph).unwrap();

        let dead = reporter.collect_dead_symbols();
        let lib_entry = dead.iter().find(|e| e.assembly == "Lib").expect("Lib entry");
        assert!(lib_entry.dead_types.is_empty());
        assert_eq!(
            lib_entry.dead_members,
            vec![DeadSymbol {
                name: "Lib.Widget.Unused()".into(),
                kind: "Method".into(),
                access: "Internal".into(),
            }]
        );
    }

    #[test]
    fn test_alive_by_test_report() {
        // A class instantiated only from a test method: alive, but only by
        // the grace of the test suite.
        let mut lib = AssemblyBinary::new("Lib");
        let mut fixture = public_class("Lib.AliveByTestClass");
        let mut test = MethodEntity::new("T");
        test.custom_attributes
            .push(AttributeRef::named("Microsoft.VisualStudio.TestPlatform", TEST_ATTR));
        test.body = Some(MethodBody {
            instructions: vec![Instruction::calls(MethodRef {
                declaring_type: TypeRef::named("Lib", "Lib.OnlyUsedInATest"),
                name: ".ctor".into(),
                parameter_types: vec![],
            })],
            locals: vec![],
            catch_types: vec![],
        });
        fixture.methods.push(test);
        lib.types.push(fixture);

        let mut only_used = public_class("Lib.OnlyUsedInATest");
        only_used.methods.push(MethodEntity::new(".ctor"));
        lib.types.push(only_used);

        let mut graph = AssemblyGraph::new();
        graph.record_test_method_attribute(TEST_ATTR).unwrap();
        graph.merge_assembly(&lib).unwrap();
        graph.done(|_| {}).unwrap();
        let reporter = Reporter::new(&graph).unwrap();

        // Both types are alive.
        let alive = reporter.collect_alive_symbols();
        let lib_alive = alive.iter().find(|e| e.assembly == "Lib").unwrap();
        for name in ["Lib.AliveByTestClass", "Lib.OnlyUsedInATest"] {
            assert!(lib_alive.symbols.iter().any(|s| s.name == name));
        }

        // And the test-only view names the test method as the dependent.
        let by_test = reporter.collect_alive_by_test_symbols();
        let entry = by_test.iter().find(|e| e.assembly == "Lib").expect("Lib entry");
        let ctor = entry
            .symbols
            .iter()
            .find(|s| s.name == "Lib.OnlyUsedInATest..ctor()")
            .expect("ctor kept alive by test");
        assert_eq!(ctor.dependents, vec!["Lib.AliveByTestClass.T()".to_string()]);
        assert!(entry
            .symbols
            .iter()
            .any(|s| s.name == "Lib.AliveByTestClass"));
        assert!(entry
            .symbols
            .iter()
            .all(|s| !s.dependents.is_empty()));
    }

    #[test]
    fn test_needless_internals_visible_to() {
        // LibA grants internals to LibB, but LibB only calls public API.
        let mut lib_a = AssemblyBinary::new("LibA");
        lib_a.types.push(TypeEntity::new("<Module>", TypeKind::Class));
        lib_a
            .assembly_attributes
            .push(AttributeRef::named("mscorlib", IVT_ATTR).with_argument("LibB"));
        let mut service = public_class("LibA.Service");
        service.methods.push(MethodEntity::new("Serve"));
        lib_a.types.push(service);

        let mut lib_b = AssemblyBinary::new("LibB");
        let mut user = public_class("LibB.User");
        let mut call = MethodEntity::new("Use");
        call.body = Some(MethodBody {
            instructions: vec![Instruction::calls(MethodRef {
                declaring_type: TypeRef::named("LibA", "LibA.Service"),
                name: "Serve".into(),
                parameter_types: vec![],
            })],
            locals: vec![],
            catch_types: vec![],
        });
        user.methods.push(call);
        lib_b.types.push(user);

        let graph = completed(&[&lib_a, &lib_b]);
        let reporter = Reporter::new(&graph).unwrap();

        assert_eq!(
            reporter.collect_needless_internals_visible_to(),
            vec![NeedlessInternalsVisibleTo {
                assembly: "LibA".into(),
                target: "LibB".into(),
            }]
        );
    }

    #[test]
    fn test_internals_visible_to_actually_used() {
        let mut lib_a = AssemblyBinary::new("LibA");
        lib_a.types.push(TypeEntity::new("<Module>", TypeKind::Class));
        lib_a
            .assembly_attributes
            .push(AttributeRef::named("mscorlib", IVT_ATTR).with_argument("LibB"));
        let mut internal_service = TypeEntity::new("LibA.InternalService", TypeKind::Class);
        internal_service.access = Access::Internal;
        internal_service.methods.push(MethodEntity::new("Serve"));
        lib_a.types.push(internal_service);

        let mut lib_b = AssemblyBinary::new("LibB");
        let mut user = public_class("LibB.User");
        let mut call = MethodEntity::new("Use");
        call.body = Some(MethodBody {
            instructions: vec![Instruction::calls(MethodRef {
                declaring_type: TypeRef::named("LibA", "LibA.InternalService"),
                name: "Serve".into(),
                parameter_types: vec![],
            })],
            locals: vec![],
            catch_types: vec![],
        });
        user.methods.push(call);
        lib_b.types.push(user);

        let graph = completed(&[&lib_a, &lib_b]);
        let reporter = Reporter::new(&graph).unwrap();
        assert!(reporter.collect_needless_internals_visible_to().is_empty());
    }

    #[test]
    fn test_constant_holder_not_dead() {
        let mut lib = AssemblyBinary::new("Lib");
        let mut holder = public_class("Lib.K");
        holder.fields.push(FieldEntity {
            name: "N".into(),
            access: Access::Public,
            is_compiler_generated: false,
            field_type: TypeRef::named("System", "System.Int32"),
            is_constant: true,
            custom_attributes: vec![],
        });
        lib.types.push(holder);

        let graph = completed(&[&lib]);
        let reporter = Reporter::new(&graph).unwrap();

        let dead = reporter.collect_dead_symbols();
        assert!(
            dead.iter().all(|e| e.dead_types.iter().all(|t| t.name != "Lib.K")),
            "constant holders must never be reported dead"
        );
    }

    #[test]
    fn test_duplicate_assemblies_report() {
        let mut first = AssemblyBinary::new("Plugin");
        first.version = Some("1.0.0.0".into());
        first.path = Some("/in/a/Plugin.dll".into());

        let mut second = AssemblyBinary::new("Plugin");
        second.version = Some("2.0.0.0".into());
        second.path = Some("/in/b/Plugin.dll".into());

        let graph = completed(&[&first, &second]);
        let reporter = Reporter::new(&graph).unwrap();

        assert_eq!(
            reporter.collect_duplicate_assemblies(),
            vec![DuplicateAssembliesEntry {
                assembly: "Plugin".into(),
                duplicates: vec![DuplicateSighting {
                    path: "/in/b/Plugin.dll".into(),
                    version: Some("2.0.0.0".into()),
                }],
            }]
        );
    }

    #[test]
    fn test_needlessly_public_symbols() {
        // Lib.Internal is public but only referenced from inside Lib;
        // Lib.Shared is referenced from Exe and must not be listed.
        let mut lib = AssemblyBinary::new("Lib");
        let mut shared = public_class("Lib.Shared");
        shared.methods.push(MethodEntity::new("Entry"));
        lib.types.push(shared);
        let mut local = public_class("Lib.LocalOnly");
        let mut helper = MethodEntity::new("Help");
        helper.access = Access::Public;
        local.methods.push(helper);
        lib.types.push(local);
        // Local use of Lib.LocalOnly from inside Lib.
        if let Some(first) = lib.types.first_mut() {
            let mut user = MethodEntity::new("UseLocal");
            user.body = Some(MethodBody {
                instructions: vec![Instruction::calls(MethodRef {
                    declaring_type: TypeRef::named("Lib", "Lib.LocalOnly"),
                    name: "Help".into(),
                    parameter_types: vec![],
                })],
                locals: vec![],
                catch_types: vec![],
            });
            first.methods.push(user);
        }

        let mut exe = AssemblyBinary::new("Exe");
        let mut program = public_class("Exe.Program");
        program.methods.push(static_main_calling(&[("Lib", "Lib.Shared", "Entry")]));
        exe.types.push(program);

        let graph = completed(&[&lib, &exe]);
        let reporter = Reporter::new(&graph).unwrap();

        let entries = reporter.collect_needlessly_public_symbols();
        let lib_entry = entries.iter().find(|e| e.assembly == "Lib").expect("Lib entry");
        assert!(lib_entry.types.contains(&"Lib.LocalOnly".to_string()));
        assert!(lib_entry.members.contains(&"Lib.LocalOnly.Help()".to_string()));
        assert!(!lib_entry.types.contains(&"Lib.Shared".to_string()));
        assert!(!lib_entry.members.contains(&"Lib.Shared.Entry()".to_string()));
    }

    #[test]
    fn test_needlessly_public_excludes_roots() {
        let mut api = AssemblyBinary::new("Api");
        api.types.push(public_class("Api.Surface"));

        let mut graph = AssemblyGraph::new();
        graph.record_root_assembly("Api").unwrap();
        graph.merge_assembly(&api).unwrap();
        graph.done(|_| {}).unwrap();
        let reporter = Reporter::new(&graph).unwrap();

        assert!(reporter.collect_needlessly_public_symbols().is_empty());
    }

    #[test]
    fn test_unreferenced_and_unanalyzed_assemblies() {
        let mut exe = AssemblyBinary::new("Exe");
        let mut program = public_class("Exe.Program");
        program
            .methods
            .push(static_main_calling(&[("Missing", "Missing.Widget", "Render")]));
        exe.types.push(program);

        // Idle is loaded but nothing in it is alive.
        let mut idle = AssemblyBinary::new("Idle");
        idle.types.push(public_class("Idle.Nothing"));

        let graph = completed(&[&exe, &idle]);
        let reporter = Reporter::new(&graph).unwrap();

        assert_eq!(reporter.collect_unreferenced_assemblies(), vec!["Idle".to_string()]);
        // Missing was referenced, has symbols, never loaded, not system.
        assert_eq!(reporter.collect_unanalyzed_assemblies(), vec!["Missing".to_string()]);
    }

    #[test]
    fn test_unanalyzed_excludes_system_and_empty() {
        let mut lib = AssemblyBinary::new("Lib");
        lib.types.push(TypeEntity::new("<Module>", TypeKind::Class));
        // Grant to a never-seen assembly: record exists but has no symbols.
        lib.assembly_attributes
            .push(AttributeRef::named("mscorlib", IVT_ATTR).with_argument("GhostFriend"));
        let mut widget = public_class("Lib.Widget");
        widget.base_types.push(TypeRef::named("mscorlib", "System.Object"));
        lib.types.push(widget);

        let graph = completed(&[&lib]);
        let reporter = Reporter::new(&graph).unwrap();
        assert!(reporter.collect_unanalyzed_assemblies().is_empty());
    }

    #[test]
    fn test_layer_cake_orders_foundation_first() {
        // App → Mid → Base: three loaded assemblies, one straight chain.
        let mut base = AssemblyBinary::new("Base");
        let mut stone = public_class("Base.Stone");
        stone.methods.push(MethodEntity::new("Sit"));
        base.types.push(stone);

        let mut mid = AssemblyBinary::new("Mid");
        let mut pillar = public_class("Mid.Pillar");
        let mut hold = MethodEntity::new("Hold");
        hold.body = Some(MethodBody {
            instructions: vec![Instruction::calls(MethodRef {
                declaring_type: TypeRef::named("Base", "Base.Stone"),
                name: "Sit".into(),
                parameter_types: vec![],
            })],
            locals: vec![],
            catch_types: vec![],
        });
        pillar.methods.push(hold);
        mid.types.push(pillar);

        let mut app = AssemblyBinary::new("App");
        let mut program = public_class("App.Program");
        program.methods.push(static_main_calling(&[("Mid", "Mid.Pillar", "Hold")]));
        app.types.push(program);

        let graph = completed(&[&app, &base, &mid]);
        let reporter = Reporter::new(&graph).unwrap();

        assert_eq!(
            reporter.create_assembly_layer_cake(),
            vec![
                vec!["Base".to_string()],
                vec!["Mid".to_string()],
                vec!["App".to_string()],
            ]
        );
    }

    #[test]
    fn test_layer_cake_drops_unloaded_but_keeps_their_ordering_effect() {
        // App references Ghost, which never loads. Ghost peels in its own
        // wave below App but is dropped from the emitted layers.
        let mut app = AssemblyBinary::new("App");
        let mut program = public_class("App.Program");
        program
            .methods
            .push(static_main_calling(&[("Ghost", "Ghost.Proxy", "Call")]));
        app.types.push(program);

        let mut aside = AssemblyBinary::new("Aside");
        aside.types.push(public_class("Aside.Nothing"));

        let graph = completed(&[&app, &aside]);
        let reporter = Reporter::new(&graph).unwrap();

        let layers = reporter.create_assembly_layer_cake();
        for layer in &layers {
            assert!(!layer.contains(&"Ghost".to_string()));
        }
        // Ghost's wave is below App's; once it is filtered out, App and the
        // isolated Aside are all that remain.
        assert_eq!(layers, vec![vec!["App".to_string(), "Aside".to_string()]]);
    }

    #[test]
    fn test_layer_cake_cycle_collapses_into_one_layer() {
        // Two assemblies referencing each other cannot be ordered; they are
        // emitted together rather than dropped.
        let mut ping = AssemblyBinary::new("Ping");
        let mut ping_type = public_class("Ping.A");
        let mut ping_call = MethodEntity::new("CallPong");
        ping_call.body = Some(MethodBody {
            instructions: vec![Instruction::calls(MethodRef {
                declaring_type: TypeRef::named("Pong", "Pong.B"),
                name: "CallPing".into(),
                parameter_types: vec![],
            })],
            locals: vec![],
            catch_types: vec![],
        });
        ping_type.methods.push(ping_call);
        ping.types.push(ping_type);

        let mut pong = AssemblyBinary::new("Pong");
        let mut pong_type = public_class("Pong.B");
        let mut pong_call = MethodEntity::new("CallPing");
        pong_call.body = Some(MethodBody {
            instructions: vec![Instruction::calls(MethodRef {
                declaring_type: TypeRef::named("Ping", "Ping.A"),
                name: "CallPong".into(),
                parameter_types: vec![],
            })],
            locals: vec![],
            catch_types: vec![],
        });
        pong_type.methods.push(pong_call);
        pong.types.push(pong_type);

        let graph = completed(&[&ping, &pong]);
        let reporter = Reporter::new(&graph).unwrap();

        assert_eq!(
            reporter.create_assembly_layer_cake(),
            vec![vec!["Ping".to_string(), "Pong".to_string()]]
        );
    }

    #[test]
    fn test_dependency_diagram_output() {
        let mut lib = AssemblyBinary::new("Contoso-Core");
        let mut helper = public_class("Contoso.Helper");
        helper.methods.push(MethodEntity::new("Assist"));
        lib.types.push(helper);

        let mut app = AssemblyBinary::new("Contoso-App");
        let mut program = public_class("App.Program");
        program
            .methods
            .push(static_main_calling(&[("Contoso-Core", "Contoso.Helper", "Assist")]));
        app.types.push(program);

        let graph = completed(&[&lib, &app]);
        let reporter = Reporter::new(&graph).unwrap();

        assert_eq!(
            reporter.create_dependency_diagram(),
            "stateDiagram-v2\n    Contoso_App --> Contoso_Core\n"
        );
    }

    #[test]
    fn test_reports_identical_across_merge_orders() {
        let build_inputs = || {
            let mut lib_i = AssemblyBinary::new("LibI");
            let mut ix = TypeEntity::new("LibI.IX", TypeKind::Interface);
            ix.access = Access::Public;
            ix.methods.push(MethodEntity::new("F"));
            lib_i.types.push(ix);

            let mut lib_a = AssemblyBinary::new("LibA");
            let mut xa = public_class("LibA.XA");
            xa.all_base_type_definitions
                .push(AncestorRef::interface("LibI", "LibI.IX"));
            xa.methods.push(MethodEntity::new("F"));
            lib_a.types.push(xa);
            lib_a.types.push(public_class("LibA.Dead"));

            let mut exe = AssemblyBinary::new("Exe");
            let mut program = public_class("Exe.Program");
            program.methods.push(static_main_calling(&[("LibI", "LibI.IX", "F")]));
            exe.types.push(program);

            vec![lib_i, lib_a, exe]
        };

        let inputs = build_inputs();
        let forward = completed(&[&inputs[0], &inputs[1], &inputs[2]]);
        let backward = completed(&[&inputs[2], &inputs[1], &inputs[0]]);

        let a = Reporter::new(&forward).unwrap();
        let b = Reporter::new(&backward).unwrap();

        assert_eq!(a.collect_dead_symbols(), b.collect_dead_symbols());
        assert_eq!(a.collect_alive_symbols(), b.collect_alive_symbols());
        assert_eq!(
            a.collect_alive_by_test_symbols(),
            b.collect_alive_by_test_symbols()
        );
        assert_eq!(
            a.collect_needlessly_public_symbols(),
            b.collect_needlessly_public_symbols()
        );
        assert_eq!(
            a.collect_unreferenced_assemblies(),
            b.collect_unreferenced_assemblies()
        );
        assert_eq!(
            a.collect_unanalyzed_assemblies(),
            b.collect_unanalyzed_assemblies()
        );
        assert_eq!(
            a.collect_duplicate_assemblies(),
            b.collect_duplicate_assemblies()
        );
        assert_eq!(
            a.collect_needless_internals_visible_to(),
            b.collect_needless_internals_visible_to()
        );
        assert_eq!(a.create_assembly_layer_cake(), b.create_assembly_layer_cake());
        assert_eq!(a.create_dependency_diagram(), b.create_dependency_diagram());
    }

    #[test]
    fn test_async_state_machine_kept_alive_through_seeding() {
        // The compiler-generated async state machine implements
        // IAsyncStateMachine from an assembly that never loads; only the
        // seeded members keep its MoveNext from looking dead.
        let mut exe = AssemblyBinary::new("Exe");
        let mut program = public_class("Exe.Program");
        let mut main = MethodEntity::new("Main");
        main.flags = MethodFlags::STATIC;
        main.body = Some(MethodBody {
            instructions: vec![Instruction::mentions_type(TypeRef::named(
                "Exe",
                "Exe.Program+<Run>d__0",
            ))],
            locals: vec![],
            catch_types: vec![],
        });
        program.methods.push(main);
        exe.types.push(program);

        let mut machine = TypeEntity::new("Exe.Program+<Run>d__0", TypeKind::Struct);
        machine.is_compiler_generated = true;
        machine.base_types.push(TypeRef::named(
            "System.Runtime",
            "System.Runtime.CompilerServices.IAsyncStateMachine",
        ));
        machine.all_base_type_definitions.push(AncestorRef::interface(
            "System.Runtime",
            "System.Runtime.CompilerServices.IAsyncStateMachine",
        ));
        machine.methods.push(MethodEntity::new("MoveNext"));
        exe.types.push(machine);

        let graph = completed(&[&exe]);

        let asm = graph.registry().lookup("Exe").unwrap();
        let move_next = graph
            .registry()
            .get(asm)
            .lookup("Exe.Program+<Run>d__0.MoveNext()", SymbolKind::Method)
            .expect("state machine MoveNext interned");
        assert!(
            graph.arena().get(move_next).marked,
            "the runtime invokes MoveNext; it must stay reachable"
        );

        let reporter = Reporter::new(&graph).unwrap();
        let dead = reporter.collect_dead_symbols();
        assert!(dead.iter().all(|e| e
            .dead_members
            .iter()
            .all(|m| !m.name.contains("MoveNext"))));
    }

    #[test]
    fn test_unused_event_and_property_members_reported_dead() {
        let mut exe = AssemblyBinary::new("Exe");
        let mut program = public_class("Exe.Program");
        program.methods.push(static_main_calling(&[("Lib", "Lib.Widget", "Poke")]));
        exe.types.push(program);

        let mut lib = AssemblyBinary::new("Lib");
        let mut widget = public_class("Lib.Widget");
        widget.methods.push(MethodEntity::new("Poke"));
        widget.events.push(cadaver::EventEntity {
            name: "Changed".into(),
            access: Access::Public,
            is_compiler_generated: false,
            add_method: Some(MethodEntity::new("add_Changed")),
            remove_method: Some(MethodEntity::new("remove_Changed")),
            custom_attributes: vec![],
        });
        widget.properties.push(cadaver::PropertyEntity {
            name: "Count".into(),
            access: Access::Public,
            is_compiler_generated: false,
            getter: Some(MethodEntity::new("get_Count")),
            setter: None,
            custom_attributes: vec![],
        });
        lib.types.push(widget);

        let graph = completed(&[&exe, &lib]);
        let reporter = Reporter::new(&graph).unwrap();

        let dead = reporter.collect_dead_symbols();
        let lib_entry = dead.iter().find(|e| e.assembly == "Lib").expect("Lib entry");
        let kinds: Vec<(&str, &str)> = lib_entry
            .dead_members
            .iter()
            .map(|m| (m.name.as_str(), m.kind.as_str()))
            .collect();
        assert!(kinds.contains(&("Lib.Widget.Changed", "Event")));
        assert!(kinds.contains(&("Lib.Widget.Count", "Property")));
        assert!(kinds.contains(&("Lib.Widget.add_Changed()", "Method")));
        assert!(kinds.contains(&("Lib.Widget.get_Count()", "Method")));
    }

    #[test]
    fn test_dump_identical_across_merge_orders() {
        let build = || {
            let mut lib = AssemblyBinary::new("Lib");
            let mut helper = public_class("Lib.Helper");
            helper.methods.push(MethodEntity::new("Assist"));
            lib.types.push(helper);

            let mut exe = AssemblyBinary::new("Exe");
            let mut program = public_class("Exe.Program");
            program.methods.push(static_main_calling(&[("Lib", "Lib.Helper", "Assist")]));
            exe.types.push(program);
            (lib, exe)
        };

        let (lib, exe) = build();
        let forward = completed(&[&lib, &exe]);
        let backward = completed(&[&exe, &lib]);

        let render = |graph: &AssemblyGraph| {
            let mut out = Vec::new();
            Reporter::new(graph).unwrap().dump(&mut out).unwrap();
            String::from_utf8(out).unwrap()
        };
        assert_eq!(render(&forward), render(&backward));
    }

    #[test]
    fn test_dump_lists_flags_and_edges() {
        let mut exe = AssemblyBinary::new("Exe");
        let mut program = public_class("Exe.Program");
        program.methods.push(static_main_calling(&[]));
        exe.types.push(program);

        let graph = completed(&[&exe]);
        let reporter = Reporter::new(&graph).unwrap();

        let mut out = Vec::new();
        reporter.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Assembly Exe (loaded)"));
        assert!(text.contains("Exe.Program.Main() [ALIVE !HIDE ROOT !REFLECTION_TARGET]"));
        assert!(text.contains("directly references: Exe.Program"));
        assert!(text.contains("referenced by: Exe.Program.Main()"));
    }

    #[test]
    fn test_reports_serialize_to_json() {
        let mut lib = AssemblyBinary::new("Lib");
        lib.types.push(public_class("Lib.Dead"));
        let graph = completed(&[&lib]);
        let reporter = Reporter::new(&graph).unwrap();

        let json = serde_json::to_string_pretty(&reporter.collect_dead_symbols()).unwrap();
        assert!(json.contains("\"Lib.Dead\""));
        assert!(json.contains("\"Class\""));
    }
}
