//! Schema catalog DTOs
//!
//! Wire representation of the handler signatures announced to the remote
//! side. Every variant carries its tag in a `type` field next to a field
//! named after the tag, e.g. `{ "type": "primitiveType", "primitiveType": "BOOL" }`.

use serde::{Deserialize, Serialize};

/// One handler signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCatalogEntry {
    pub name: String,
    pub input_type: StructType,
    pub output_type: DataType,
}

/// Ordered list of named fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructType {
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DataType {
    PrimitiveType {
        #[serde(rename = "primitiveType")]
        primitive_type: PrimitiveType,
    },
    ComplexType {
        #[serde(rename = "complexType")]
        complex_type: ComplexType,
    },
    UnknownType {
        #[serde(rename = "unknownType")]
        unknown_type: UnknownType,
    },
}

impl DataType {
    pub fn primitive(primitive_type: PrimitiveType) -> Self {
        DataType::PrimitiveType { primitive_type }
    }

    pub fn structure(fields: Vec<Field>) -> Self {
        DataType::ComplexType {
            complex_type: ComplexType::StructType {
                struct_type: StructType { fields },
            },
        }
    }

    pub fn list(element_type: DataType) -> Self {
        DataType::ComplexType {
            complex_type: ComplexType::ListType {
                element_type: Box::new(element_type),
            },
        }
    }

    pub fn unknown() -> Self {
        DataType::UnknownType {
            unknown_type: UnknownType {},
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrimitiveType {
    Bool,
    Int,
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ComplexType {
    StructType {
        #[serde(rename = "structType")]
        struct_type: StructType,
    },
    ListType {
        #[serde(rename = "elementType")]
        element_type: Box<DataType>,
    },
}

/// Catch-all for type descriptions that have no catalog equivalent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownType {}
