use std::fmt;

/// One of the ten scalar numeric types the stack machine operates on.
///
/// The names returned by [`TypeDescriptor::name`] are the spellings used in
/// expression text (`CONST float32 ...`, `CAST uint8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Float64,
    Float32,
    UInt64,
    Int64,
    UInt32,
    Int32,
    UInt16,
    Int16,
    UInt8,
    Int8,
}

impl TypeDescriptor {
    pub const ALL: [TypeDescriptor; 10] = [
        TypeDescriptor::Float64,
        TypeDescriptor::Float32,
        TypeDescriptor::UInt64,
        TypeDescriptor::Int64,
        TypeDescriptor::UInt32,
        TypeDescriptor::Int32,
        TypeDescriptor::UInt16,
        TypeDescriptor::Int16,
        TypeDescriptor::UInt8,
        TypeDescriptor::Int8,
    ];

    /// Storage width in bytes, which is also the exact footprint of a value
    /// of this type on the data stack.
    pub fn storage_size(self) -> usize {
        match self {
            TypeDescriptor::Float64 | TypeDescriptor::UInt64 | TypeDescriptor::Int64 => 8,
            TypeDescriptor::Float32 | TypeDescriptor::UInt32 | TypeDescriptor::Int32 => 4,
            TypeDescriptor::UInt16 | TypeDescriptor::Int16 => 2,
            TypeDescriptor::UInt8 | TypeDescriptor::Int8 => 1,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, TypeDescriptor::Float64 | TypeDescriptor::Float32)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            TypeDescriptor::Float64
                | TypeDescriptor::Float32
                | TypeDescriptor::Int64
                | TypeDescriptor::Int32
                | TypeDescriptor::Int16
                | TypeDescriptor::Int8
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeDescriptor::Float64 => "float64",
            TypeDescriptor::Float32 => "float32",
            TypeDescriptor::UInt64 => "uint64",
            TypeDescriptor::Int64 => "int64",
            TypeDescriptor::UInt32 => "uint32",
            TypeDescriptor::Int32 => "int32",
            TypeDescriptor::UInt16 => "uint16",
            TypeDescriptor::Int16 => "int16",
            TypeDescriptor::UInt8 => "uint8",
            TypeDescriptor::Int8 => "int8",
        }
    }

    /// Parse an expression-text type name.
    pub fn from_name(name: &str) -> Option<TypeDescriptor> {
        TypeDescriptor::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row/column extents of a matrix variable. Shapes are fixed at compile
/// time; a mismatch between operands is a compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixSize {
    pub rows: usize,
    pub cols: usize,
}

impl MatrixSize {
    pub fn new(rows: usize, cols: usize) -> MatrixSize {
        MatrixSize { rows, cols }
    }

    pub fn elements(self) -> usize {
        self.rows * self.cols
    }
}

impl fmt::Display for MatrixSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// A scalar type plus its modifier string.
///
/// An empty modifier is a plain scalar. `"M"` marks a matrix; the lowercase
/// `"m"` marks a matrix bound to external read-only memory. Any other
/// modifier shape is not supported and never matches a registered matrix
/// operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDescriptor {
    pub type_descriptor: TypeDescriptor,
    pub modifiers: String,
}

impl VariableDescriptor {
    pub fn scalar(type_descriptor: TypeDescriptor) -> VariableDescriptor {
        VariableDescriptor {
            type_descriptor,
            modifiers: String::new(),
        }
    }

    pub fn matrix(type_descriptor: TypeDescriptor) -> VariableDescriptor {
        VariableDescriptor {
            type_descriptor,
            modifiers: "M".to_string(),
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// A supported matrix: modifier exactly `M` or `m` and a floating-point
    /// element type. Everything else is rejected before being treated as a
    /// matrix.
    pub fn is_valid_matrix(&self) -> bool {
        (self.modifiers == "M" || self.modifiers == "m") && self.type_descriptor.is_float()
    }

    /// Structural compatibility: same element type, same matrix-ness.
    /// `M` and `m` are compatible; the case only records the ownership of
    /// the backing memory.
    pub fn same_as(&self, other: &VariableDescriptor) -> bool {
        if self.type_descriptor != other.type_descriptor {
            return false;
        }
        match (self.is_scalar(), other.is_scalar()) {
            (true, true) => true,
            (false, false) => self.is_valid_matrix() && other.is_valid_matrix(),
            _ => false,
        }
    }
}

impl fmt::Display for VariableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.is_empty() {
            f.write_str(self.type_descriptor.name())
        } else {
            write!(f, "{}[{}]", self.type_descriptor.name(), self.modifiers)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_sizes() {
        assert_eq!(TypeDescriptor::Float64.storage_size(), 8);
        assert_eq!(TypeDescriptor::UInt32.storage_size(), 4);
        assert_eq!(TypeDescriptor::Int16.storage_size(), 2);
        assert_eq!(TypeDescriptor::UInt8.storage_size(), 1);
    }

    #[test]
    fn name_round_trip() {
        for t in TypeDescriptor::ALL {
            assert_eq!(TypeDescriptor::from_name(t.name()), Some(t));
        }
        assert_eq!(TypeDescriptor::from_name("float16"), None);
    }

    #[test]
    fn matrix_recognition() {
        assert!(VariableDescriptor::matrix(TypeDescriptor::Float32).is_valid_matrix());
        assert!(!VariableDescriptor::matrix(TypeDescriptor::Int32).is_valid_matrix());
        let odd = VariableDescriptor {
            type_descriptor: TypeDescriptor::Float32,
            modifiers: "MM".to_string(),
        };
        assert!(!odd.is_valid_matrix());
    }

    #[test]
    fn compatibility() {
        let a = VariableDescriptor::scalar(TypeDescriptor::UInt32);
        let b = VariableDescriptor::scalar(TypeDescriptor::UInt32);
        let c = VariableDescriptor::scalar(TypeDescriptor::Int32);
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));

        let m = VariableDescriptor::matrix(TypeDescriptor::Float64);
        let ext = VariableDescriptor {
            type_descriptor: TypeDescriptor::Float64,
            modifiers: "m".to_string(),
        };
        assert!(m.same_as(&ext));
        assert!(!m.same_as(&a));
    }
}
