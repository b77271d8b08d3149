//! Shared vocabulary for the assembly graph: dense handles, symbol and type
//! kinds, accessibility, and method flag words.
//!
//! Every other crate speaks these types. They are deliberately small, `Copy`
//! where possible, and `serde`-enabled so that both snapshot ingestion and
//! report emission reuse the same definitions.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense handle of a symbol: an index into the symbol arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense handle of an assembly: an index into the assembly registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AssemblyId(pub u32);

impl AssemblyId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a symbol is. `(assembly, canonical name, kind)` uniquely identifies
/// a symbol; the same textual name at two kinds yields two symbols.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum SymbolKind {
    Type = 0,
    Method = 1,
    Field = 2,
    Property = 3,
    Event = 4,
    Misc = 5,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolKind::Type => "Type",
            SymbolKind::Method => "Method",
            SymbolKind::Field => "Field",
            SymbolKind::Property => "Property",
            SymbolKind::Event => "Event",
            SymbolKind::Misc => "Misc",
        };
        f.write_str(s)
    }
}

/// The flavor of a type definition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum TypeKind {
    #[default]
    Class = 0,
    Struct = 1,
    Interface = 2,
    Enum = 3,
    Delegate = 4,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeKind::Class => "Class",
            TypeKind::Struct => "Struct",
            TypeKind::Interface => "Interface",
            TypeKind::Enum => "Enum",
            TypeKind::Delegate => "Delegate",
        };
        f.write_str(s)
    }
}

/// Effective accessibility of a declared entity, captured at definition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Access {
    Public = 0,
    Protected = 1,
    Internal = 2,
    ProtectedInternal = 3,
    PrivateProtected = 4,
    #[default]
    Private = 5,
}

impl Access {
    /// `Public` and `Protected` count as "public enough": both are visible
    /// outside the assembly, so both qualify as root-assembly API surface.
    pub fn is_public_enough(self) -> bool {
        matches!(self, Access::Public | Access::Protected)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Access::Public => "Public",
            Access::Protected => "Protected",
            Access::Internal => "Internal",
            Access::ProtectedInternal => "ProtectedInternal",
            Access::PrivateProtected => "PrivateProtected",
            Access::Private => "Private",
        };
        f.write_str(s)
    }
}

bitflags! {
    /// Method definition flags carried by the metadata reader.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MethodFlags: u8 {
        const STATIC = 0b0001;
        const VIRTUAL = 0b0010;
        const OVERRIDE = 0b0100;
        const ABSTRACT = 0b1000;
    }
}

impl Default for MethodFlags {
    fn default() -> Self {
        MethodFlags::empty()
    }
}

impl MethodFlags {
    /// Any flavor of virtual dispatch participation.
    pub fn is_virtual_or_override_or_abstract(self) -> bool {
        self.intersects(MethodFlags::VIRTUAL | MethodFlags::OVERRIDE | MethodFlags::ABSTRACT)
    }
}

/// Short method name of a canonical symbol name: the segment after the last
/// `.` of the part before the parameter list.
///
/// `"Ns.Widget.Render(System.Int32)"` → `"Render"`. Non-method names pass
/// through the same rule, which makes them their last name segment.
pub fn method_short_name(canonical: &str) -> &str {
    let head = canonical.split('(').next().unwrap_or(canonical);
    head.rsplit('.').next().unwrap_or(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_enough_policy() {
        assert!(Access::Public.is_public_enough());
        assert!(Access::Protected.is_public_enough());
        assert!(!Access::Internal.is_public_enough());
        assert!(!Access::ProtectedInternal.is_public_enough());
        assert!(!Access::PrivateProtected.is_public_enough());
        assert!(!Access::Private.is_public_enough());
    }

    #[test]
    fn test_method_flags_virtual_family() {
        assert!(MethodFlags::VIRTUAL.is_virtual_or_override_or_abstract());
        assert!(MethodFlags::OVERRIDE.is_virtual_or_override_or_abstract());
        assert!(MethodFlags::ABSTRACT.is_virtual_or_override_or_abstract());
        assert!(!MethodFlags::STATIC.is_virtual_or_override_or_abstract());
        assert!(!MethodFlags::empty().is_virtual_or_override_or_abstract());
    }

    #[test]
    fn test_short_name_of_method() {
        assert_eq!(
            method_short_name("Ns.Widget.Render(System.Int32, System.String)"),
            "Render"
        );
        assert_eq!(method_short_name("Ns.Widget.Render()"), "Render");
    }

    #[test]
    fn test_short_name_ignores_dots_in_parameters() {
        assert_eq!(
            method_short_name("Ns.Widget.Equals(System.Object)"),
            "Equals"
        );
    }

    #[test]
    fn test_short_name_of_plain_type() {
        assert_eq!(method_short_name("Ns.Widget"), "Widget");
        assert_eq!(method_short_name("Widget"), "Widget");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(SymbolKind::Property.to_string(), "Property");
        assert_eq!(TypeKind::Delegate.to_string(), "Delegate");
        assert_eq!(Access::ProtectedInternal.to_string(), "ProtectedInternal");
    }

    #[test]
    fn test_enum_sizes() {
        assert_eq!(std::mem::size_of::<SymbolKind>(), 1);
        assert_eq!(std::mem::size_of::<TypeKind>(), 1);
        assert_eq!(std::mem::size_of::<Access>(), 1);
    }
}
