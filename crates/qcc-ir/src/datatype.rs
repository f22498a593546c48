//! Data types and physical objects (§3.2, §3.3).

use serde::{Deserialize, Serialize};

/// A data type recognized by the platform.
///
/// Two types are equal iff their constructors and parameters match (derived
/// `PartialEq` gives exactly this for a field-less/field-bearing enum).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    /// A single qubit.
    Qubit,
    /// A single classical bit.
    Bit,
    /// A fixed-width integer.
    Int {
        /// Whether the integer is signed (two's complement) or unsigned.
        signed: bool,
        /// Bit width.
        bits: u32,
    },
    /// A double-precision real number.
    Real,
    /// A double-precision complex number.
    Complex,
    /// A matrix of reals or complexes with a fixed shape.
    Matrix {
        /// Element type: must itself be `Real` or `Complex`.
        element: Box<DataType>,
        /// Row/column shape.
        shape: (u32, u32),
    },
    /// A string-valued enum type with a fixed set of allowed values.
    String {
        /// Allowed values, in declaration order.
        variants: Vec<String>,
    },
}

impl DataType {
    /// Short textual name used in diagnostics and cQASM-style type names.
    pub fn type_name(&self) -> String {
        match self {
            DataType::Qubit => "qubit".to_string(),
            DataType::Bit => "bit".to_string(),
            DataType::Int { signed, bits } => {
                format!("{}{bits}", if *signed { "int" } else { "uint" })
            }
            DataType::Real => "real".to_string(),
            DataType::Complex => "complex".to_string(),
            DataType::Matrix { element, shape } => {
                format!("matrix<{}, {}x{}>", element.type_name(), shape.0, shape.1)
            }
            DataType::String { .. } => "string".to_string(),
        }
    }
}

/// A physical object: a register array of a given data type and shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalObject {
    /// Unique identifier within the platform's object registry.
    pub name: String,
    /// Element data type.
    pub data_type: DataType,
    /// Shape: a vector of positive dimensions (empty shape = scalar object).
    pub shape: Vec<u32>,
}

impl PhysicalObject {
    /// Create a new physical object. Does not validate the name; use
    /// `Platform::add_physical_object` for a validated insert.
    pub fn new(name: impl Into<String>, data_type: DataType, shape: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            data_type,
            shape,
        }
    }

    /// Total number of elements (product of the shape's dimensions; scalar
    /// objects have exactly one element).
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().map(|&d| u64::from(d)).product::<u64>().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_equality() {
        assert_eq!(DataType::Qubit, DataType::Qubit);
        assert_ne!(
            DataType::Int { signed: true, bits: 8 },
            DataType::Int { signed: false, bits: 8 }
        );
        assert_eq!(
            DataType::Int { signed: true, bits: 8 },
            DataType::Int { signed: true, bits: 8 }
        );
    }

    #[test]
    fn object_num_elements() {
        let obj = PhysicalObject::new("q", DataType::Qubit, vec![5]);
        assert_eq!(obj.num_elements(), 5);
        let scalar = PhysicalObject::new("flag", DataType::Bit, vec![]);
        assert_eq!(scalar.num_elements(), 1);
    }
}
