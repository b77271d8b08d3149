//! # The Cadaver: one loaded binary, laid out for dissection
//!
//! **Role**: the yield shape of the binary reader. A reader front-end opens a
//! managed executable, walks its metadata tables and IL streams, and hands
//! the merge pass exactly one [`AssemblyBinary`] per file.
//!
//! **Design**:
//! - Plain data, no behavior beyond canonical-name construction. The graph
//!   core never touches files; it consumes these structs.
//! - Everything derives `Serialize`/`Deserialize`, so a conforming reader can
//!   run out of process and ship JSON snapshots.
//! - Type references carry their declaring assembly as `Option<String>`:
//!   `None` marks a reference whose declaring type has no resolvable parent
//!   module ("unhomed"); the graph repairs those after all binaries merge.

use common::{Access, MethodFlags, TypeKind};
use serde::{Deserialize, Serialize};

/// A reference to a type, possibly in another assembly, possibly generic.
///
/// `type_arguments` recurse: `Dictionary<string, List<Widget>>` carries the
/// full instantiation tree, and the merge pass records an edge to every
/// transitive argument.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeRef {
    /// Declaring assembly name. `None` when the reader could not resolve the
    /// parent module of the declaring type.
    #[serde(default)]
    pub assembly: Option<String>,
    /// Full reflection name, e.g. `Ns.Outer+Inner` or `` Ns.List`1 ``.
    pub full_name: String,
    #[serde(default)]
    pub type_arguments: Vec<TypeRef>,
}

impl TypeRef {
    pub fn named(assembly: &str, full_name: &str) -> Self {
        TypeRef {
            assembly: Some(assembly.to_string()),
            full_name: full_name.to_string(),
            type_arguments: Vec::new(),
        }
    }

    /// A reference whose declaring type has no resolvable parent module.
    pub fn unhomed(full_name: &str) -> Self {
        TypeRef {
            assembly: None,
            full_name: full_name.to_string(),
            type_arguments: Vec::new(),
        }
    }

    pub fn with_arguments(mut self, args: Vec<TypeRef>) -> Self {
        self.type_arguments = args;
        self
    }
}

/// A custom attribute application.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeRef {
    pub attribute_type: TypeRef,
    /// First constructor argument when it is a string literal. Carries the
    /// target assembly name of `InternalsVisibleToAttribute`.
    #[serde(default)]
    pub ctor_argument: Option<String>,
}

impl AttributeRef {
    pub fn named(assembly: &str, full_name: &str) -> Self {
        AttributeRef {
            attribute_type: TypeRef::named(assembly, full_name),
            ctor_argument: None,
        }
    }

    pub fn with_argument(mut self, argument: &str) -> Self {
        self.ctor_argument = Some(argument.to_string());
        self
    }

    pub fn full_name(&self) -> &str {
        &self.attribute_type.full_name
    }
}

/// A generic type parameter with its constraints and attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeParameter {
    pub name: String,
    #[serde(default)]
    pub constraints: Vec<TypeRef>,
    #[serde(default)]
    pub custom_attributes: Vec<AttributeRef>,
}

/// One entry of `all_base_type_definitions`: an ancestor anywhere up the
/// hierarchy, tagged with whether it is an interface.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AncestorRef {
    pub type_ref: TypeRef,
    #[serde(default)]
    pub is_interface: bool,
}

impl AncestorRef {
    pub fn class(assembly: &str, full_name: &str) -> Self {
        AncestorRef {
            type_ref: TypeRef::named(assembly, full_name),
            is_interface: false,
        }
    }

    pub fn interface(assembly: &str, full_name: &str) -> Self {
        AncestorRef {
            type_ref: TypeRef::named(assembly, full_name),
            is_interface: true,
        }
    }
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub name: Option<String>,
    pub parameter_type: TypeRef,
    #[serde(default)]
    pub custom_attributes: Vec<AttributeRef>,
}

impl Parameter {
    pub fn of(parameter_type: TypeRef) -> Self {
        Parameter {
            name: None,
            parameter_type,
            custom_attributes: Vec::new(),
        }
    }
}

/// A method reference found in an IL operand.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MethodRef {
    pub declaring_type: TypeRef,
    pub name: String,
    #[serde(default)]
    pub parameter_types: Vec<TypeRef>,
}

impl MethodRef {
    /// Canonical key of the referenced method:
    /// `Declaring.Type.Name(Param.One, Param.Two)`.
    pub fn canonical_name(&self) -> String {
        format!(
            "{}.{}({})",
            self.declaring_type.full_name,
            self.name,
            parameter_suffix(&self.parameter_types)
        )
    }
}

/// A field reference found in an IL operand.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldRef {
    pub declaring_type: TypeRef,
    pub name: String,
}

impl FieldRef {
    pub fn canonical_name(&self) -> String {
        member_name(&self.declaring_type.full_name, &self.name)
    }
}

/// The entity an IL operand resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operand {
    Type { type_ref: TypeRef },
    Field { field_ref: FieldRef },
    Method { method_ref: MethodRef },
}

/// One decoded IL instruction: the opcode mnemonic and its resolved operand,
/// when the operand designates an entity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: String,
    #[serde(default)]
    pub operand: Option<Operand>,
}

impl Instruction {
    pub fn calls(method_ref: MethodRef) -> Self {
        Instruction {
            opcode: "call".to_string(),
            operand: Some(Operand::Method { method_ref }),
        }
    }

    pub fn loads_field(field_ref: FieldRef) -> Self {
        Instruction {
            opcode: "ldfld".to_string(),
            operand: Some(Operand::Field { field_ref }),
        }
    }

    pub fn mentions_type(type_ref: TypeRef) -> Self {
        Instruction {
            opcode: "ldtoken".to_string(),
            operand: Some(Operand::Type { type_ref }),
        }
    }
}

/// Decoded method body: operand stream plus the out-of-band type mentions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MethodBody {
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    /// Local-variable signature types.
    #[serde(default)]
    pub locals: Vec<TypeRef>,
    /// Exception-handler catch types.
    #[serde(default)]
    pub catch_types: Vec<TypeRef>,
}

/// A method definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MethodEntity {
    /// Simple name: `Render`, `get_Count`, `.ctor`.
    pub name: String,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub is_compiler_generated: bool,
    #[serde(default)]
    pub flags: MethodFlags,
    #[serde(default)]
    pub metadata_token: u32,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    #[serde(default)]
    pub return_attributes: Vec<AttributeRef>,
    #[serde(default)]
    pub type_arguments: Vec<TypeRef>,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameter>,
    #[serde(default)]
    pub custom_attributes: Vec<AttributeRef>,
    #[serde(default)]
    pub body: Option<MethodBody>,
}

impl MethodEntity {
    pub fn new(name: &str) -> Self {
        MethodEntity {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Canonical key of this definition under its declaring type:
    /// `Declaring.Type.Name(Param.One, Param.Two)`.
    pub fn canonical_name(&self, declaring_full_name: &str) -> String {
        format!(
            "{}.{}({})",
            declaring_full_name,
            self.name,
            parameter_suffix(
                &self
                    .parameters
                    .iter()
                    .map(|p| p.parameter_type.clone())
                    .collect::<Vec<_>>()
            )
        )
    }
}

/// A field definition. Constant fields are carried so the merge pass can see
/// `is_constant`, but they never become symbols of their own.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldEntity {
    pub name: String,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub is_compiler_generated: bool,
    pub field_type: TypeRef,
    #[serde(default)]
    pub is_constant: bool,
    #[serde(default)]
    pub custom_attributes: Vec<AttributeRef>,
}

/// A property definition with its accessor methods.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropertyEntity {
    pub name: String,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub is_compiler_generated: bool,
    #[serde(default)]
    pub getter: Option<MethodEntity>,
    #[serde(default)]
    pub setter: Option<MethodEntity>,
    #[serde(default)]
    pub custom_attributes: Vec<AttributeRef>,
}

/// An event definition with its add/remove accessors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventEntity {
    pub name: String,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub is_compiler_generated: bool,
    #[serde(default)]
    pub add_method: Option<MethodEntity>,
    #[serde(default)]
    pub remove_method: Option<MethodEntity>,
    #[serde(default)]
    pub custom_attributes: Vec<AttributeRef>,
}

/// A type definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeEntity {
    /// Full reflection name. The module pseudo-type is named `<Module>`.
    pub full_name: String,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub is_compiler_generated: bool,
    #[serde(default)]
    pub declaring_type: Option<TypeRef>,
    /// Direct base types (class and directly-declared interfaces).
    #[serde(default)]
    pub base_types: Vec<TypeRef>,
    /// Every ancestor definition up the hierarchy, interfaces included.
    #[serde(default)]
    pub all_base_type_definitions: Vec<AncestorRef>,
    #[serde(default)]
    pub type_arguments: Vec<TypeRef>,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameter>,
    #[serde(default)]
    pub custom_attributes: Vec<AttributeRef>,
    #[serde(default)]
    pub methods: Vec<MethodEntity>,
    #[serde(default)]
    pub properties: Vec<PropertyEntity>,
    #[serde(default)]
    pub events: Vec<EventEntity>,
    #[serde(default)]
    pub fields: Vec<FieldEntity>,
}

impl TypeEntity {
    pub fn new(full_name: &str, kind: TypeKind) -> Self {
        TypeEntity {
            full_name: full_name.to_string(),
            kind,
            ..Default::default()
        }
    }

    /// Simple name: the segment after the last namespace/nesting separator.
    pub fn simple_name(&self) -> &str {
        self.full_name
            .rsplit(['.', '+'])
            .next()
            .unwrap_or(&self.full_name)
    }
}

/// One fully-read binary, as delivered by the reader.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssemblyBinary {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Path the reader loaded this binary from; recorded on duplicates.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub assembly_attributes: Vec<AttributeRef>,
    #[serde(default)]
    pub module_attributes: Vec<AttributeRef>,
    #[serde(default)]
    pub types: Vec<TypeEntity>,
}

impl AssemblyBinary {
    pub fn new(name: &str) -> Self {
        AssemblyBinary {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Canonical key of a non-method member: `Declaring.Type.Name`.
pub fn member_name(declaring_full_name: &str, name: &str) -> String {
    format!("{declaring_full_name}.{name}")
}

/// Comma-joined reflection names of a parameter list.
pub fn parameter_suffix(parameter_types: &[TypeRef]) -> String {
    parameter_types
        .iter()
        .map(|t| t.full_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_canonical_name() {
        let mut m = MethodEntity::new("Render");
        m.parameters = vec![
            Parameter::of(TypeRef::named("System", "System.Int32")),
            Parameter::of(TypeRef::named("System", "System.String")),
        ];
        assert_eq!(
            m.canonical_name("Ns.Widget"),
            "Ns.Widget.Render(System.Int32, System.String)"
        );
    }

    #[test]
    fn test_method_canonical_name_no_parameters() {
        let m = MethodEntity::new("Dispose");
        assert_eq!(m.canonical_name("Ns.Widget"), "Ns.Widget.Dispose()");
    }

    #[test]
    fn test_method_ref_matches_definition_key() {
        let mut m = MethodEntity::new("Load");
        m.parameters = vec![Parameter::of(TypeRef::named("System", "System.String"))];

        let r = MethodRef {
            declaring_type: TypeRef::named("Lib", "Lib.Store"),
            name: "Load".to_string(),
            parameter_types: vec![TypeRef::named("System", "System.String")],
        };

        assert_eq!(m.canonical_name("Lib.Store"), r.canonical_name());
    }

    #[test]
    fn test_member_name() {
        assert_eq!(member_name("Ns.Widget", "Count"), "Ns.Widget.Count");
    }

    #[test]
    fn test_simple_name_of_nested_type() {
        let t = TypeEntity::new("Ns.Outer+Inner", TypeKind::Class);
        assert_eq!(t.simple_name(), "Inner");
        let t = TypeEntity::new("Ns.Widget", TypeKind::Class);
        assert_eq!(t.simple_name(), "Widget");
        let t = TypeEntity::new("<Module>", TypeKind::Class);
        assert_eq!(t.simple_name(), "<Module>");
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let mut binary = AssemblyBinary::new("Lib");
        binary.version = Some("1.2.3.0".to_string());
        let mut ty = TypeEntity::new("Lib.Widget", TypeKind::Class);
        let mut m = MethodEntity::new("Run");
        m.body = Some(MethodBody {
            instructions: vec![Instruction::calls(MethodRef {
                declaring_type: TypeRef::named("Lib", "Lib.Helper"),
                name: "Assist".to_string(),
                parameter_types: vec![],
            })],
            locals: vec![TypeRef::named("System", "System.Int32")],
            catch_types: vec![],
        });
        ty.methods.push(m);
        binary.types.push(ty);

        let json = serde_json::to_string(&binary).unwrap();
        let back: AssemblyBinary = serde_json::from_str(&json).unwrap();
        assert_eq!(binary, back);
    }

    #[test]
    fn test_snapshot_defaults_are_optional_in_json() {
        let json = r#"{
            "name": "Tiny",
            "types": [
                { "full_name": "Tiny.T", "kind": "Class" }
            ]
        }"#;
        let binary: AssemblyBinary = serde_json::from_str(json).unwrap();
        assert_eq!(binary.name, "Tiny");
        assert_eq!(binary.types.len(), 1);
        assert!(binary.types[0].methods.is_empty());
        assert_eq!(binary.types[0].access, Access::Private);
    }

    #[test]
    fn test_unhomed_type_ref() {
        let r = TypeRef::unhomed("Lost.Widget");
        assert!(r.assembly.is_none());
        let json = serde_json::to_string(&r).unwrap();
        let back: TypeRef = serde_json::from_str(&json).unwrap();
        assert!(back.assembly.is_none());
    }
}
