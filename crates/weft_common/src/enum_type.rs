//! Enumerated types for state-machine style signals.
//!
//! An [`EnumType`] is created once with its item names and an [`Encoding`];
//! every call to [`EnumType::new`] produces a distinct type, and items of
//! different types never compare equal even if their names match.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How enum items are mapped to bit patterns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Item `i` is encoded as the binary number `i`.
    #[default]
    Binary,
    /// Item `i` sets only bit `i`.
    OneHot,
    /// Item `i` clears only bit `i`.
    OneCold,
}

/// Errors produced when declaring an enumerated type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnumError {
    /// No item names were given.
    #[error("enum type '{0}' has no items")]
    Empty(String),

    /// The same item name appeared twice.
    #[error("duplicate enum item '{0}'")]
    DuplicateItem(String),

    /// The encoding needs more than 64 bits.
    #[error("enum type '{name}' has {count} items, too many for {encoding:?} encoding")]
    TooManyItems {
        /// Name of the enum type.
        name: String,
        /// Number of declared items.
        count: usize,
        /// The requested encoding.
        encoding: Encoding,
    },
}

#[derive(Debug)]
struct EnumDef {
    name: String,
    items: Vec<String>,
    codes: Vec<u64>,
    width: u32,
    encoding: Encoding,
}

/// A declared enumerated type. Cheap to clone; clones share identity.
#[derive(Clone)]
pub struct EnumType(Arc<EnumDef>);

impl EnumType {
    /// Declares a new enumerated type.
    pub fn new(name: &str, items: &[&str], encoding: Encoding) -> Result<Self, EnumError> {
        if items.is_empty() {
            return Err(EnumError::Empty(name.to_string()));
        }
        for (i, item) in items.iter().enumerate() {
            if items[..i].contains(item) {
                return Err(EnumError::DuplicateItem(item.to_string()));
            }
        }

        let count = items.len();
        let width = match encoding {
            Encoding::Binary => (u64::BITS - ((count - 1) as u64).leading_zeros()).max(1),
            Encoding::OneHot | Encoding::OneCold => count as u32,
        };
        if width > 64 {
            return Err(EnumError::TooManyItems {
                name: name.to_string(),
                count,
                encoding,
            });
        }
        let all_ones = if width == 64 {
            u64::MAX
        } else {
            (1u64 << width) - 1
        };
        let codes = (0..count)
            .map(|i| match encoding {
                Encoding::Binary => i as u64,
                Encoding::OneHot => 1u64 << i,
                Encoding::OneCold => !(1u64 << i) & all_ones,
            })
            .collect();

        Ok(Self(Arc::new(EnumDef {
            name: name.to_string(),
            items: items.iter().map(|s| s.to_string()).collect(),
            codes,
            width,
            encoding,
        })))
    }

    /// Returns the type name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.0.items.len()
    }

    /// Always `false`; declaring an empty enum fails.
    pub fn is_empty(&self) -> bool {
        self.0.items.is_empty()
    }

    /// Returns the number of bits an encoded item occupies.
    pub fn width(&self) -> u32 {
        self.0.width
    }

    /// Returns the encoding.
    pub fn encoding(&self) -> Encoding {
        self.0.encoding
    }

    /// Looks up an item by name.
    pub fn item(&self, name: &str) -> Option<EnumItem> {
        self.0
            .items
            .iter()
            .position(|n| n == name)
            .map(|index| self.item_at(index))
    }

    /// Returns the item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn item_at(&self, index: usize) -> EnumItem {
        assert!(index < self.len(), "enum index {index} out of range");
        EnumItem {
            ty: self.clone(),
            index,
        }
    }

    /// Finds the item whose encoded value equals `code`.
    pub fn item_from_code(&self, code: u64) -> Option<EnumItem> {
        self.0
            .codes
            .iter()
            .position(|&c| c == code)
            .map(|index| self.item_at(index))
    }

    /// Iterates over all items in declaration order.
    pub fn items(&self) -> impl Iterator<Item = EnumItem> + '_ {
        (0..self.len()).map(move |i| self.item_at(i))
    }

    /// Returns `true` if both handles refer to the same declaration.
    pub fn same_type(&self, other: &EnumType) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.same_type(other)
    }
}

impl Eq for EnumType {}

impl fmt::Debug for EnumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Enum {}: {}>", self.0.name, self.0.items.join(", "))
    }
}

/// A single item of an [`EnumType`].
#[derive(Clone)]
pub struct EnumItem {
    ty: EnumType,
    index: usize,
}

impl EnumItem {
    /// Returns the item name.
    pub fn name(&self) -> &str {
        &self.ty.0.items[self.index]
    }

    /// Returns the declaration index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the encoded bit pattern.
    pub fn code(&self) -> u64 {
        self.ty.0.codes[self.index]
    }

    /// Returns the type this item belongs to.
    pub fn enum_type(&self) -> &EnumType {
        &self.ty
    }
}

impl PartialEq for EnumItem {
    fn eq(&self, other: &Self) -> bool {
        self.ty.same_type(&other.ty) && self.index == other.index
    }
}

impl Eq for EnumItem {}

impl fmt::Display for EnumItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for EnumItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.ty.name(), self.name())
    }
}
