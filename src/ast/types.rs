//! Source-level types.
//!
//! Every expression in the AST carries one of these, resolved by the analysis
//! phase before code generation runs.

use std::fmt;

/// A resolved source type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    /// Fixed-length array of `len` elements.
    Array(Box<Type>, u32),
}

impl Type {
    /// The vector type with `lanes` lanes, if one exists.
    pub fn vector(lanes: usize) -> Option<Type> {
        match lanes {
            2 => Some(Type::Vec2),
            3 => Some(Type::Vec3),
            4 => Some(Type::Vec4),
            _ => None,
        }
    }

    pub fn array(elem: Type, len: u32) -> Type {
        Type::Array(Box::new(elem), len)
    }

    /// Number of lanes for vector types.
    pub fn lanes(&self) -> Option<u8> {
        match self {
            Type::Vec2 => Some(2),
            Type::Vec3 => Some(3),
            Type::Vec4 => Some(4),
            _ => None,
        }
    }

    pub fn is_vector(&self) -> bool {
        self.lanes().is_some()
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Scalars and vectors: the types that fit in a single backend value.
    pub fn is_first_class(&self) -> bool {
        matches!(
            self,
            Type::Bool | Type::Int | Type::Float | Type::Vec2 | Type::Vec3 | Type::Vec4
        )
    }

    /// Size of the storage cell in bytes. Every vector occupies a full 128-bit cell.
    pub fn storage_size(&self) -> u32 {
        match self {
            Type::Void => 0,
            Type::Bool => 1,
            Type::Int | Type::Float => 4,
            Type::Vec2 | Type::Vec3 | Type::Vec4 => 16,
            Type::Array(elem, len) => elem.storage_size() * len,
        }
    }

    /// Alignment of the storage cell as a power-of-two shift.
    pub fn align_shift(&self) -> u8 {
        match self {
            Type::Void | Type::Bool => 0,
            Type::Int | Type::Float => 2,
            Type::Vec2 | Type::Vec3 | Type::Vec4 => 4,
            Type::Array(elem, _) => elem.align_shift(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Vec2 => write!(f, "vec2"),
            Type::Vec3 => write!(f, "vec3"),
            Type::Vec4 => write!(f, "vec4"),
            Type::Array(elem, len) => write!(f, "{}[{}]", elem, len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_lanes() {
        assert_eq!(Type::vector(3), Some(Type::Vec3));
        assert_eq!(Type::vector(1), None);
        assert_eq!(Type::Vec4.lanes(), Some(4));
        assert_eq!(Type::Float.lanes(), None);
    }

    #[test]
    fn test_storage_size() {
        assert_eq!(Type::Bool.storage_size(), 1);
        assert_eq!(Type::Vec2.storage_size(), 16);
        assert_eq!(Type::array(Type::Int, 5).storage_size(), 20);
        assert_eq!(Type::array(Type::Vec3, 2).storage_size(), 32);
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::array(Type::Float, 3).to_string(), "float[3]");
        assert_eq!(Type::Vec2.to_string(), "vec2");
    }
}
