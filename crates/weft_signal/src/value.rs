//! Values held by signal cells, their kinds, and coercion of assigned data.
//!
//! A cell's [`ValueKind`] is fixed by its initial value. Every later write is
//! a [`Drive`] that is coerced into that kind: integers into bounded vectors
//! with a bounds check, binary literals and concatenations packed into bits,
//! codes into enum items, and so on. Anything else is rejected before the
//! cell's pending value is touched.

use std::any::{Any, TypeId};
use std::fmt;

use weft_common::{EnumItem, EnumType, IntBv, MAX_WIDTH};

use crate::signal::SignalId;

/// A user-defined value carried by a signal without interpretation.
///
/// Implemented for every `'static` type that is `Clone + PartialEq + Debug`.
/// Opaque values are copied with [`clone_box`](Self::clone_box) whenever they
/// move between pending and current, so a mutable object never leaks between
/// the two slots.
pub trait OpaqueValue: Any + fmt::Debug {
    /// Deep-copies the value.
    fn clone_box(&self) -> Box<dyn OpaqueValue>;

    /// Compares with another opaque value of possibly different type.
    fn eq_value(&self, other: &dyn OpaqueValue) -> bool;

    /// Upcasts for downcasting and type checks.
    fn as_any(&self) -> &dyn Any;

    /// Returns the Rust type name, used in error messages.
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Clone + PartialEq + fmt::Debug> OpaqueValue for T {
    fn clone_box(&self) -> Box<dyn OpaqueValue> {
        Box::new(self.clone())
    }

    fn eq_value(&self, other: &dyn OpaqueValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|o| o == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A value held in a signal's current or pending slot.
#[derive(Debug)]
pub enum Value {
    /// A single boolean bit.
    Bool(bool),
    /// An unbounded integer.
    Int(i128),
    /// A bounded integer / bit-vector.
    Bits(IntBv),
    /// An item of an enumerated type.
    Enum(EnumItem),
    /// An uninterpreted user value.
    Opaque(Box<dyn OpaqueValue>),
    /// The high-impedance "nobody is driving" value of tristate signals.
    Undriven,
}

impl Value {
    /// Wraps a user value.
    pub fn opaque<T: OpaqueValue>(value: T) -> Self {
        Value::Opaque(Box::new(value))
    }

    /// Returns the kind this value establishes when used as an initial value.
    ///
    /// `Undriven` has no kind of its own.
    pub fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Bits(bv) => ValueKind::Bits {
                min: bv.min(),
                max: bv.max(),
                width: bv.width(),
            },
            Value::Enum(item) => ValueKind::Enum(item.enum_type().clone()),
            Value::Opaque(v) => ValueKind::Opaque {
                type_id: v.as_any().type_id(),
                type_name: v.type_name(),
            },
            Value::Undriven => return None,
        })
    }

    /// Truthiness used for edge detection.
    ///
    /// Numbers are true when non-zero. Enum items and opaque values are
    /// always true; `Undriven` is false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Bits(bv) => bv.value() != 0,
            Value::Enum(_) | Value::Opaque(_) => true,
            Value::Undriven => false,
        }
    }

    /// Number of bits, or `0` when the value has no fixed width.
    pub fn bit_width(&self) -> u32 {
        match self {
            Value::Bool(_) => 1,
            Value::Bits(bv) => bv.width(),
            Value::Enum(item) => item.enum_type().width(),
            Value::Int(_) | Value::Opaque(_) | Value::Undriven => 0,
        }
    }

    /// Returns `true` for the high-impedance value.
    pub fn is_undriven(&self) -> bool {
        matches!(self, Value::Undriven)
    }

    /// The numeric interpretation of bools, integers, and vectors.
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Bool(b) => Some(i128::from(*b)),
            Value::Int(v) => Some(*v),
            Value::Bits(bv) => Some(bv.value()),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the vector if this is a `Bits`.
    pub fn as_bits(&self) -> Option<&IntBv> {
        match self {
            Value::Bits(bv) => Some(bv),
            _ => None,
        }
    }

    /// Returns the item if this is an `Enum`.
    pub fn as_enum(&self) -> Option<&EnumItem> {
        match self {
            Value::Enum(item) => Some(item),
            _ => None,
        }
    }

    /// Downcasts an opaque value.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(v) => v.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Short description used in coercion errors.
    fn describe(&self) -> String {
        match self {
            Value::Bool(b) => format!("boolean {b}"),
            Value::Int(v) => format!("integer {v}"),
            Value::Bits(bv) if bv.width() > 0 => format!("{}-bit vector {}", bv.width(), bv.value()),
            Value::Bits(bv) => format!("unsized vector {}", bv.value()),
            Value::Enum(item) => format!("enum item {item:?}"),
            Value::Opaque(v) => format!("value of type {}", v.type_name()),
            Value::Undriven => "undriven value".to_string(),
        }
    }
}

impl Value {
    /// Copies the value; opaque values are deep-copied through [`OpaqueValue::clone_box`].
    pub fn clone_value(&self) -> Value {
        match self {
            Value::Bool(b) => Value::Bool(*b),
            Value::Int(v) => Value::Int(*v),
            Value::Bits(bv) => Value::Bits(bv.clone()),
            Value::Enum(item) => Value::Enum(item.clone()),
            Value::Opaque(v) => Value::Opaque(v.as_ref().clone_box()),
            Value::Undriven => Value::Undriven,
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        self.clone_value()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bits(a), Value::Bits(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a.eq_value(b.as_ref()),
            (Value::Undriven, Value::Undriven) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", u8::from(*b)),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bits(bv) => write!(f, "{bv}"),
            Value::Enum(item) => write!(f, "{item}"),
            Value::Opaque(v) => write!(f, "{v:?}"),
            Value::Undriven => f.write_str("Z"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<IntBv> for Value {
    fn from(bv: IntBv) -> Self {
        Value::Bits(bv)
    }
}

impl From<EnumItem> for Value {
    fn from(item: EnumItem) -> Self {
        Value::Enum(item)
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i128::from(v))
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

/// The type and shape a cell is locked to by its initial value.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    /// Single bit.
    Bool,
    /// Unbounded integer.
    Int,
    /// Bit-vector with the bounds of the initial value.
    Bits {
        /// Inclusive lower bound.
        min: Option<i128>,
        /// Exclusive upper bound.
        max: Option<i128>,
        /// Bit width, `0` when unsized.
        width: u32,
    },
    /// An item of the given enumerated type.
    Enum(EnumType),
    /// A user value of one concrete Rust type.
    Opaque {
        /// Type of the initial value.
        type_id: TypeId,
        /// Type name for error messages.
        type_name: &'static str,
    },
}

impl ValueKind {
    /// Unsigned vector kind of the given width.
    pub fn unsigned(width: u32) -> Self {
        ValueKind::Bits {
            min: Some(0),
            max: Some(1i128 << width),
            width,
        }
    }

    /// Two's-complement vector kind of the given width.
    pub fn signed(width: u32) -> Self {
        let half = 1i128 << (width - 1);
        ValueKind::Bits {
            min: Some(-half),
            max: Some(half),
            width,
        }
    }

    /// Number of bits, or `0` when the kind has no fixed width.
    pub fn bit_width(&self) -> u32 {
        match self {
            ValueKind::Bool => 1,
            ValueKind::Bits { width, .. } => *width,
            ValueKind::Enum(ty) => ty.width(),
            ValueKind::Int | ValueKind::Opaque { .. } => 0,
        }
    }

    /// Returns `true` for kinds with a fixed bit layout.
    pub fn is_sized_bits(&self) -> bool {
        match self {
            ValueKind::Bool => true,
            ValueKind::Bits { width, .. } => *width > 0,
            _ => false,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            ValueKind::Bool => "boolean".to_string(),
            ValueKind::Int => "integer".to_string(),
            ValueKind::Bits { width: 0, .. } => "unsized vector".to_string(),
            ValueKind::Bits { width, .. } => format!("{width}-bit vector"),
            ValueKind::Enum(ty) => format!("enum {}", ty.name()),
            ValueKind::Opaque { type_name, .. } => format!("value of type {type_name}"),
        }
    }
}

/// Data written to a signal with [`SimContext::set_pending`](crate::SimContext::set_pending).
#[derive(Clone, Debug)]
pub enum Drive {
    /// A plain value.
    Value(Value),
    /// A binary literal such as `"1010"`.
    Binary(String),
    /// Fields packed MSB first into one vector.
    Concat(Vec<Drive>),
    /// The current value of another signal.
    Signal(SignalId),
}

impl Drive {
    /// Releases a tristate driver.
    pub fn undriven() -> Self {
        Drive::Value(Value::Undriven)
    }
}

impl From<Value> for Drive {
    fn from(v: Value) -> Self {
        Drive::Value(v)
    }
}

macro_rules! drive_from_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Drive {
            fn from(v: $t) -> Self {
                Drive::Value(Value::from(v))
            }
        })*
    };
}

drive_from_value!(bool, IntBv, EnumItem, i8, i16, i32, i64, i128, u8, u16, u32, u64);

impl From<&str> for Drive {
    fn from(s: &str) -> Self {
        Drive::Binary(s.to_string())
    }
}

impl From<SignalId> for Drive {
    fn from(id: SignalId) -> Self {
        Drive::Signal(id)
    }
}

/// Converts a drive into a value of `kind`.
///
/// `Drive::Signal` references must already have been replaced by the
/// referenced signal's current value. `Undriven` is only accepted when
/// `allow_undriven` is set.
pub(crate) fn coerce(kind: &ValueKind, drive: Drive, allow_undriven: bool) -> Result<Value, String> {
    if matches!(drive, Drive::Value(Value::Undriven)) {
        return if allow_undriven {
            Ok(Value::Undriven)
        } else {
            Err("only tristate signals can be undriven".to_string())
        };
    }

    match kind {
        ValueKind::Bool => match drive {
            Drive::Value(Value::Bool(b)) => Ok(Value::Bool(b)),
            Drive::Value(v) => match v.as_int() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(format!("expected boolean, got {}", v.describe())),
            },
            other => Err(format!("expected boolean, got {}", describe_drive(&other))),
        },
        ValueKind::Int => match drive {
            Drive::Value(v) => v
                .as_int()
                .map(Value::Int)
                .ok_or_else(|| format!("expected integer, got {}", v.describe())),
            other => Err(format!("expected integer, got {}", describe_drive(&other))),
        },
        ValueKind::Bits { min, max, .. } => {
            let raw = bits_source(drive)?;
            IntBv::bounded(raw, *min, *max)
                .map(Value::Bits)
                .map_err(|e| e.to_string())
        }
        ValueKind::Enum(ty) => match drive {
            Drive::Value(Value::Enum(item)) if item.enum_type().same_type(ty) => Ok(Value::Enum(item)),
            Drive::Value(Value::Enum(item)) => Err(format!(
                "expected enum {}, got item of enum {}",
                ty.name(),
                item.enum_type().name()
            )),
            Drive::Value(v @ (Value::Int(_) | Value::Bits(_))) => {
                let code = v.as_int().unwrap_or(-1);
                u64::try_from(code)
                    .ok()
                    .and_then(|c| ty.item_from_code(c))
                    .map(Value::Enum)
                    .ok_or_else(|| format!("{code} is not a code of enum {}", ty.name()))
            }
            other => Err(format!("expected enum {}, got {}", ty.name(), describe_drive(&other))),
        },
        ValueKind::Opaque { type_id, type_name } => match drive {
            Drive::Value(Value::Opaque(v)) if v.as_any().type_id() == *type_id => Ok(Value::Opaque(v)),
            other => Err(format!("expected {type_name}, got {}", describe_drive(&other))),
        },
    }
}

fn describe_drive(drive: &Drive) -> String {
    match drive {
        Drive::Value(v) => v.describe(),
        Drive::Binary(s) => format!("binary literal '{s}'"),
        Drive::Concat(parts) => format!("concatenation of {} fields", parts.len()),
        Drive::Signal(id) => format!("unresolved reference to {id}"),
    }
}

/// Numeric value of anything that can feed a bit-vector.
fn bits_source(drive: Drive) -> Result<i128, String> {
    match drive {
        Drive::Value(Value::Enum(item)) => Ok(i128::from(item.code())),
        Drive::Value(v) => v
            .as_int()
            .ok_or_else(|| format!("expected bit-vector, got {}", v.describe())),
        Drive::Binary(s) => IntBv::from_binary_str(&s)
            .map(|bv| bv.value())
            .map_err(|e| e.to_string()),
        Drive::Concat(parts) => pack(parts),
        other @ Drive::Signal(_) => Err(format!("expected bit-vector, got {}", describe_drive(&other))),
    }
}

/// Packs concatenation fields MSB first.
fn pack(parts: Vec<Drive>) -> Result<i128, String> {
    if parts.is_empty() {
        return Err("concatenation needs at least one field".to_string());
    }
    let mut acc: u128 = 0;
    let mut total: u32 = 0;
    for (index, part) in parts.into_iter().enumerate() {
        let (width, bits) = match part {
            Drive::Value(Value::Bool(b)) => (1, u128::from(b)),
            Drive::Value(Value::Int(v @ (0 | 1))) => (1, v as u128),
            Drive::Value(Value::Bits(bv)) if bv.width() > 0 => (bv.width(), bv.bits()),
            Drive::Binary(s) => {
                let bv = IntBv::from_binary_str(&s).map_err(|e| e.to_string())?;
                (bv.width(), bv.bits())
            }
            other => {
                return Err(format!(
                    "field {index} has no bit width: {}",
                    describe_drive(&other)
                ))
            }
        };
        total += width;
        if total > MAX_WIDTH {
            return Err(format!("concatenation is wider than {MAX_WIDTH} bits"));
        }
        acc = (acc << width) | bits;
    }
    Ok(acc as i128)
}
