use crate::error::ModelError;
use serde::{Deserialize, Serialize};

// ─── SlotTy ─────────────────────────────────────────────────────────────────

/// Cell encoding of a slot. Type references are opaque and only echoed by
/// the generator, but the runtime still has to pick a wire form per cell, so a
/// handful of well-known names map onto native encodings and everything else
/// (structs, handles, function types like `"(Int) -> Bool"`) travels as an
/// opaque pointer-sized bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotTy {
    I64,
    U64,
    F64,
    Bool,
    Opaque,
}

impl SlotTy {
    pub fn classify(type_ref: &str) -> SlotTy {
        match type_ref {
            "Int" | "Int64" | "i64" => SlotTy::I64,
            "UInt" | "UInt64" | "u64" => SlotTy::U64,
            "Double" | "Float64" | "f64" => SlotTy::F64,
            "Bool" | "bool" => SlotTy::Bool,
            _ => SlotTy::Opaque,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SlotTy::I64 => "Int64",
            SlotTy::U64 => "UInt64",
            SlotTy::F64 => "Float64",
            SlotTy::Bool => "Bool",
            SlotTy::Opaque => "opaque bits",
        }
    }
}

impl std::fmt::Display for SlotTy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── SlotValue ──────────────────────────────────────────────────────────────

/// A value moving into or out of one 8-byte cell.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SlotValue {
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    /// Raw bit pattern for opaquely-typed members.
    Bits(u64),
}

impl std::fmt::Debug for SlotValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotValue::I64(i) => write!(f, "I64({})", i),
            SlotValue::U64(u) => write!(f, "U64({})", u),
            SlotValue::F64(v) => write!(f, "F64({})", v),
            SlotValue::Bool(b) => write!(f, "Bool({})", b),
            SlotValue::Bits(b) => write!(f, "Bits({:#x})", b),
        }
    }
}

impl SlotValue {
    pub fn ty(&self) -> SlotTy {
        match self {
            SlotValue::I64(_) => SlotTy::I64,
            SlotValue::U64(_) => SlotTy::U64,
            SlotValue::F64(_) => SlotTy::F64,
            SlotValue::Bool(_) => SlotTy::Bool,
            SlotValue::Bits(_) => SlotTy::Opaque,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SlotValue::I64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SlotValue::U64(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SlotValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SlotValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bits(&self) -> Option<u64> {
        match self {
            SlotValue::Bits(b) => Some(*b),
            _ => None,
        }
    }

    /// Encode into a cell, checking the value against the slot's declared
    /// encoding first.
    pub(crate) fn encode(&self, expected: SlotTy) -> Result<u64, ModelError> {
        let actual = self.ty();
        if actual != expected {
            return Err(ModelError::TypeMismatch { expected, actual });
        }
        Ok(match *self {
            SlotValue::I64(i) => i as u64,
            SlotValue::U64(u) => u,
            SlotValue::F64(v) => v.to_bits(),
            SlotValue::Bool(b) => b as u64,
            SlotValue::Bits(b) => b,
        })
    }

    /// Decode a cell under the slot's declared encoding.
    pub(crate) fn decode(bits: u64, ty: SlotTy) -> SlotValue {
        match ty {
            SlotTy::I64 => SlotValue::I64(bits as i64),
            SlotTy::U64 => SlotValue::U64(bits),
            SlotTy::F64 => SlotValue::F64(f64::from_bits(bits)),
            SlotTy::Bool => SlotValue::Bool(bits != 0),
            SlotTy::Opaque => SlotValue::Bits(bits),
        }
    }
}

// ─── From impls ─────────────────────────────────────────────────────────────

impl From<i64> for SlotValue {
    fn from(i: i64) -> Self {
        SlotValue::I64(i)
    }
}

impl From<u64> for SlotValue {
    fn from(u: u64) -> Self {
        SlotValue::U64(u)
    }
}

impl From<f64> for SlotValue {
    fn from(v: f64) -> Self {
        SlotValue::F64(v)
    }
}

impl From<bool> for SlotValue {
    fn from(b: bool) -> Self {
        SlotValue::Bool(b)
    }
}
