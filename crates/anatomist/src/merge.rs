//! The merge pass: one binary in, symbols and edges out.
//!
//! Merging is strictly serial and append-only. Every reference goes through
//! the canonical-name handshake — "the symbol of kind K named N in assembly
//! A" — so it does not matter whether the target's defining binary has been
//! seen yet: referencing interns a placeholder that the later definition
//! fills in, and the final graph is the same for any input order.

use crate::graph::{AssemblyGraph, GraphError, UNHOMED_ASSEMBLY};
use cadaver::{
    member_name, AssemblyBinary, AttributeRef, EventEntity, FieldEntity, MethodEntity, Operand,
    PropertyEntity, TypeEntity, TypeRef,
};
use common::{AssemblyId, MethodFlags, SymbolId, SymbolKind, TypeKind};

const INTERNALS_VISIBLE_TO: &str = "System.Runtime.CompilerServices.InternalsVisibleToAttribute";

impl AssemblyGraph {
    pub(crate) fn merge(&mut self, binary: &AssemblyBinary) -> Result<bool, GraphError> {
        let asm_id = self.registry.get_or_create(&binary.name);
        if self.registry.get(asm_id).loaded {
            let path = binary.path.clone().unwrap_or_default();
            self.registry.add_duplicate(asm_id, path, binary.version.clone());
            return Ok(false);
        }

        let info = self.registry.get_mut(asm_id);
        if info.version.is_none() {
            info.version = binary.version.clone();
        }
        if self.root_assemblies.contains(&binary.name) {
            self.registry.get_mut(asm_id).is_root = true;
        }

        for ty in &binary.types {
            self.merge_type(asm_id, binary, ty)?;
        }

        self.registry.get_mut(asm_id).loaded = true;
        Ok(true)
    }

    fn merge_type(
        &mut self,
        asm_id: AssemblyId,
        binary: &AssemblyBinary,
        ty: &TypeEntity,
    ) -> Result<(), GraphError> {
        let type_id = self.intern(asm_id, &ty.full_name, SymbolKind::Type);
        self.check_kind(type_id, SymbolKind::Type)?;

        let is_root_assembly = self.registry.get(asm_id).is_root;
        let is_reflection_marked = ty
            .custom_attributes
            .iter()
            .any(|a| self.reflection_marker_attributes.contains(a.full_name()));
        let declares_constants = ty.fields.iter().any(|f| f.is_constant);

        let sym = self.arena.get_mut(type_id);
        sym.access = ty.access;
        sym.is_public = ty.access.is_public_enough();
        sym.hide = ty.is_compiler_generated || ty.simple_name().contains('<');
        if is_root_assembly && sym.is_public {
            sym.root = true;
        }
        if is_reflection_marked {
            sym.reflection_target = true;
        }
        if let Some(detail) = sym.type_detail_mut() {
            detail.type_kind = ty.kind;
            if declares_constants {
                detail.declares_constants = true;
            }
        }

        if let Some(declaring) = &ty.declaring_type {
            self.add_type_reference(type_id, declaring);
        }
        for base in &ty.base_types {
            self.add_type_reference(type_id, base);
        }
        for arg in &ty.type_arguments {
            self.add_type_reference(type_id, arg);
        }
        for tp in &ty.type_parameters {
            for constraint in &tp.constraints {
                self.add_type_reference(type_id, constraint);
            }
            self.add_attribute_references(type_id, &tp.custom_attributes);
        }
        self.add_attribute_references(type_id, &ty.custom_attributes);

        self.link_ancestors(type_id, ty);

        if ty.full_name == "<Module>" {
            self.absorb_module_attributes(asm_id, type_id, binary);
        }

        for method in &ty.methods {
            self.merge_method(asm_id, type_id, ty, method, None)?;
        }
        for property in &ty.properties {
            self.merge_property(asm_id, type_id, ty, property)?;
        }
        for event in &ty.events {
            self.merge_event(asm_id, type_id, ty, event)?;
        }
        for field in &ty.fields {
            self.merge_field(asm_id, type_id, ty, field)?;
        }

        Ok(())
    }

    /// Classifies every hierarchy ancestor into `base_types` or
    /// `interfaces_implemented` and registers this type as derived on each.
    fn link_ancestors(&mut self, type_id: SymbolId, ty: &TypeEntity) {
        for ancestor in &ty.all_base_type_definitions {
            let Some(ancestor_assembly) = &ancestor.type_ref.assembly else {
                continue;
            };
            let anc_asm = self.registry.get_or_create(ancestor_assembly);
            let anc_loaded = self.registry.get(anc_asm).loaded;
            let anc_id = self.intern(anc_asm, &ancestor.type_ref.full_name, SymbolKind::Type);
            if anc_id == type_id {
                continue;
            }

            if let Some(detail) = self.arena.get_mut(type_id).type_detail_mut() {
                if ancestor.is_interface {
                    detail.interfaces_implemented.insert(anc_id);
                } else {
                    detail.base_types.insert(anc_id);
                }
            }
            if let Some(anc_detail) = self.arena.get_mut(anc_id).type_detail_mut() {
                anc_detail.derived_types.insert(type_id);
                // An unloaded ancestor's flavor is only knowable from how
                // derived types use it; loaded ancestors keep their own.
                if ancestor.is_interface && !anc_loaded {
                    anc_detail.type_kind = TypeKind::Interface;
                }
            }
        }
    }

    /// `<Module>` carries the assembly- and module-level attributes,
    /// including the `InternalsVisibleTo` grants.
    fn absorb_module_attributes(
        &mut self,
        asm_id: AssemblyId,
        module_id: SymbolId,
        binary: &AssemblyBinary,
    ) {
        for attr in binary
            .assembly_attributes
            .iter()
            .chain(binary.module_attributes.iter())
        {
            if attr.full_name() == INTERNALS_VISIBLE_TO {
                if let Some(argument) = &attr.ctor_argument {
                    self.registry.record_internals_visible_to(asm_id, argument);
                }
            }
            self.add_type_reference(module_id, &attr.attribute_type);
        }
    }

    fn merge_method(
        &mut self,
        asm_id: AssemblyId,
        declaring_type_id: SymbolId,
        ty: &TypeEntity,
        method: &MethodEntity,
        accessor_owner: Option<SymbolId>,
    ) -> Result<(), GraphError> {
        let canonical = method.canonical_name(&ty.full_name);
        let method_id = self.intern(asm_id, &canonical, SymbolKind::Method);
        self.check_kind(method_id, SymbolKind::Method)?;

        let is_root_assembly = self.registry.get(asm_id).is_root;
        let is_test = method
            .custom_attributes
            .iter()
            .any(|a| self.test_method_attributes.contains(a.full_name()));
        let is_reflection_marked = method
            .custom_attributes
            .iter()
            .any(|a| self.reflection_marker_attributes.contains(a.full_name()));

        // Accessors are first-class in reports even when compiler-generated;
        // delegate Begin/EndInvoke pairs are runtime plumbing.
        let mut hide = method.is_compiler_generated || method.name.contains('<');
        if accessor_owner.is_some() {
            hide = false;
        }
        if ty.kind == TypeKind::Delegate
            && (method.name == "BeginInvoke" || method.name == "EndInvoke")
        {
            hide = true;
        }

        let mut root = is_root_assembly && method.access.is_public_enough();
        if method.flags.contains(MethodFlags::STATIC) && method.name == "Main" {
            root = true;
        }
        if is_test {
            root = true;
        }

        let sym = self.arena.get_mut(method_id);
        sym.access = method.access;
        sym.is_public = method.access.is_public_enough();
        sym.hide = hide;
        sym.declaring_type = Some(declaring_type_id);
        if root {
            sym.root = true;
        }
        if is_reflection_marked {
            sym.reflection_target = true;
        }
        if let Some(detail) = sym.method_detail_mut() {
            detail.parameter_count = method.parameters.len();
            detail.is_virtual_or_override_or_abstract =
                method.flags.is_virtual_or_override_or_abstract();
            detail.is_override = method.flags.contains(MethodFlags::OVERRIDE);
            if is_test {
                detail.is_test_method = true;
            }
        }
        if let Some(detail) = self.arena.get_mut(declaring_type_id).type_detail_mut() {
            detail.members.insert(method_id);
        }

        self.arena.record_reference(method_id, declaring_type_id);
        for arg in &method.type_arguments {
            self.add_type_reference(method_id, arg);
        }
        for tp in &method.type_parameters {
            for constraint in &tp.constraints {
                self.add_type_reference(method_id, constraint);
            }
            self.add_attribute_references(method_id, &tp.custom_attributes);
        }
        for parameter in &method.parameters {
            self.add_type_reference(method_id, &parameter.parameter_type);
            self.add_attribute_references(method_id, &parameter.custom_attributes);
        }
        if let Some(return_type) = &method.return_type {
            self.add_type_reference(method_id, return_type);
        }
        self.add_attribute_references(method_id, &method.return_attributes);
        self.add_attribute_references(method_id, &method.custom_attributes);
        if let Some(owner) = accessor_owner {
            self.arena.record_reference(method_id, owner);
        }

        self.link_supertype_members(method_id, ty, method);
        self.scan_body(method_id, method);

        Ok(())
    }

    /// Records member references from an override to the base declarations
    /// it overrides, and from any method to the same-signature members of
    /// interface ancestors it implements.
    fn link_supertype_members(
        &mut self,
        method_id: SymbolId,
        ty: &TypeEntity,
        method: &MethodEntity,
    ) {
        let parameter_types: Vec<TypeRef> = method
            .parameters
            .iter()
            .map(|p| p.parameter_type.clone())
            .collect();
        let suffix = format!(
            "{}({})",
            method.name,
            cadaver::parameter_suffix(&parameter_types)
        );
        let is_override = method.flags.contains(MethodFlags::OVERRIDE);

        for ancestor in &ty.all_base_type_definitions {
            if !ancestor.is_interface && !is_override {
                continue;
            }
            let Some(ancestor_assembly) = &ancestor.type_ref.assembly else {
                continue;
            };
            let anc_asm = self.registry.get_or_create(ancestor_assembly);
            let candidate = format!("{}.{}", ancestor.type_ref.full_name, suffix);
            let target = self.intern(anc_asm, &candidate, SymbolKind::Method);
            self.arena.record_reference(method_id, target);
        }
    }

    /// Walks the decoded IL operand stream plus the out-of-band type
    /// mentions (locals, catch types).
    fn scan_body(&mut self, method_id: SymbolId, method: &MethodEntity) {
        let Some(body) = &method.body else {
            return;
        };

        for instruction in &body.instructions {
            match &instruction.operand {
                Some(Operand::Type { type_ref }) => {
                    self.add_type_reference(method_id, type_ref);
                }
                Some(Operand::Field { field_ref }) => {
                    if let Some(assembly) = &field_ref.declaring_type.assembly {
                        let target_asm = self.registry.get_or_create(assembly);
                        let target = self.intern(
                            target_asm,
                            &field_ref.canonical_name(),
                            SymbolKind::Field,
                        );
                        self.arena.record_reference(method_id, target);
                    }
                    // Resolving a member ref touches its parent type too.
                    self.add_type_reference(method_id, &field_ref.declaring_type);
                }
                Some(Operand::Method { method_ref }) => {
                    match &method_ref.declaring_type.assembly {
                        Some(assembly) => {
                            let target_asm = self.registry.get_or_create(assembly);
                            let target = self.intern(
                                target_asm,
                                &method_ref.canonical_name(),
                                SymbolKind::Method,
                            );
                            self.arena.record_reference(method_id, target);
                        }
                        None => self.record_unhomed_reference(method_id, method_ref),
                    }
                    self.add_type_reference(method_id, &method_ref.declaring_type);
                }
                None => {}
            }
        }
        for local in &body.locals {
            self.add_type_reference(method_id, local);
        }
        for catch_type in &body.catch_types {
            self.add_type_reference(method_id, catch_type);
        }
    }

    /// A method reference whose declaring type has no parent module: keep
    /// the signature on the referencing symbol and route the edge through a
    /// placeholder in the pseudo-assembly so completion can repair it.
    fn record_unhomed_reference(&mut self, method_id: SymbolId, method_ref: &cadaver::MethodRef) {
        let signature = method_ref.canonical_name();
        if let Some(detail) = self.arena.get_mut(method_id).method_detail_mut() {
            detail.unhomed_references.push(signature.clone());
        }
        let unhomed = self.registry.get_or_create(UNHOMED_ASSEMBLY);
        let placeholder = self.intern(unhomed, &signature, SymbolKind::Method);
        self.arena.record_reference(method_id, placeholder);
    }

    fn merge_property(
        &mut self,
        asm_id: AssemblyId,
        declaring_type_id: SymbolId,
        ty: &TypeEntity,
        property: &PropertyEntity,
    ) -> Result<(), GraphError> {
        let canonical = member_name(&ty.full_name, &property.name);
        let property_id = self.intern(asm_id, &canonical, SymbolKind::Property);
        self.check_kind(property_id, SymbolKind::Property)?;

        self.define_plain_member(
            asm_id,
            property_id,
            declaring_type_id,
            property.access,
            property.is_compiler_generated || property.name.contains('<'),
        );
        self.add_attribute_references(property_id, &property.custom_attributes);

        if let Some(getter) = &property.getter {
            self.merge_method(asm_id, declaring_type_id, ty, getter, Some(property_id))?;
        }
        if let Some(setter) = &property.setter {
            self.merge_method(asm_id, declaring_type_id, ty, setter, Some(property_id))?;
        }
        Ok(())
    }

    fn merge_event(
        &mut self,
        asm_id: AssemblyId,
        declaring_type_id: SymbolId,
        ty: &TypeEntity,
        event: &EventEntity,
    ) -> Result<(), GraphError> {
        let canonical = member_name(&ty.full_name, &event.name);
        let event_id = self.intern(asm_id, &canonical, SymbolKind::Event);
        self.check_kind(event_id, SymbolKind::Event)?;

        self.define_plain_member(
            asm_id,
            event_id,
            declaring_type_id,
            event.access,
            event.is_compiler_generated || event.name.contains('<'),
        );
        self.add_attribute_references(event_id, &event.custom_attributes);

        if let Some(add_method) = &event.add_method {
            self.merge_method(asm_id, declaring_type_id, ty, add_method, Some(event_id))?;
        }
        if let Some(remove_method) = &event.remove_method {
            self.merge_method(asm_id, declaring_type_id, ty, remove_method, Some(event_id))?;
        }
        Ok(())
    }

    fn merge_field(
        &mut self,
        asm_id: AssemblyId,
        declaring_type_id: SymbolId,
        ty: &TypeEntity,
        field: &FieldEntity,
    ) -> Result<(), GraphError> {
        // Constant values are baked into call sites; a constant field is
        // never a symbol of its own. The declaring type's
        // `declares_constants` flag is what keeps the holder alive.
        if field.is_constant {
            return Ok(());
        }

        let canonical = member_name(&ty.full_name, &field.name);
        let field_id = self.intern(asm_id, &canonical, SymbolKind::Field);
        self.check_kind(field_id, SymbolKind::Field)?;

        self.define_plain_member(
            asm_id,
            field_id,
            declaring_type_id,
            field.access,
            field.is_compiler_generated || field.name.contains('<'),
        );
        self.add_type_reference(field_id, &field.field_type);
        self.add_attribute_references(field_id, &field.custom_attributes);
        Ok(())
    }

    /// Shared definition path of fields, properties, and events.
    fn define_plain_member(
        &mut self,
        asm_id: AssemblyId,
        member_id: SymbolId,
        declaring_type_id: SymbolId,
        access: common::Access,
        hide: bool,
    ) {
        let is_root_assembly = self.registry.get(asm_id).is_root;
        let sym = self.arena.get_mut(member_id);
        sym.access = access;
        sym.is_public = access.is_public_enough();
        sym.hide = hide;
        sym.declaring_type = Some(declaring_type_id);
        if is_root_assembly && sym.is_public {
            sym.root = true;
        }
        if let Some(detail) = self.arena.get_mut(declaring_type_id).type_detail_mut() {
            detail.members.insert(member_id);
        }
        self.arena.record_reference(member_id, declaring_type_id);
    }

    /// Records an edge to a type reference and, recursively, to every
    /// transitive generic type argument.
    pub(crate) fn add_type_reference(&mut self, from: SymbolId, type_ref: &TypeRef) {
        if let Some(assembly) = &type_ref.assembly {
            let target_asm = self.registry.get_or_create(assembly);
            let target = self.intern(target_asm, &type_ref.full_name, SymbolKind::Type);
            self.arena.record_reference(from, target);
        }
        for argument in &type_ref.type_arguments {
            self.add_type_reference(from, argument);
        }
    }

    fn add_attribute_references(&mut self, from: SymbolId, attributes: &[AttributeRef]) {
        for attribute in attributes {
            self.add_type_reference(from, &attribute.attribute_type);
        }
    }
}
