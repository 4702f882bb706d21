//! Shared foundational types used across the weft signal engine.
//!
//! This crate provides the bounded-integer bit-vector type, enumerated types
//! with configurable encodings, and the dense ID-indexed arena used to store
//! simulation entities.

#![warn(missing_docs)]

pub mod arena;
pub mod enum_type;
pub mod intbv;

pub use arena::{Arena, ArenaId};
pub use enum_type::{EnumError, EnumItem, EnumType, Encoding};
pub use intbv::{BitsError, IntBv, MAX_WIDTH};
