//! Read-only signals computed from other signals.
//!
//! A derived signal is an ordinary cell whose pending value is written only
//! by its [`DerivedObserver`]. The observer sits on its sources' change
//! lists, so a source change commits in one delta cycle and the derived
//! value follows in the next.

use weft_common::{IntBv, MAX_WIDTH};

use crate::context::SimContext;
use crate::error::SignalError;
use crate::observer::{Observer, ObserverCtx};
use crate::signal::{DriveKind, SignalId, SignalRole, SignalState, SignalTable};
use crate::value::{Value, ValueKind};

/// How a derived signal is computed from its sources.
#[derive(Clone, Debug, PartialEq)]
pub enum Derivation {
    /// Bits `[high-1 .. low]` of a vector.
    Slice {
        /// Source vector.
        source: SignalId,
        /// Exclusive upper bit.
        high: u32,
        /// Inclusive lower bit.
        low: u32,
        /// Reinterpret the slice as two's complement.
        signed: bool,
    },
    /// One bit of a vector.
    Index {
        /// Source vector.
        source: SignalId,
        /// Bit position.
        bit: u32,
    },
    /// The whole source value.
    Clone {
        /// Source signal.
        source: SignalId,
    },
    /// The source bits in reverse order.
    Reverse {
        /// Source vector.
        source: SignalId,
    },
    /// Several fields packed MSB first.
    Concat(ConcatLayout),
}

impl Derivation {
    /// The signals this derivation reads.
    pub fn sources(&self) -> Vec<SignalId> {
        match self {
            Derivation::Slice { source, .. }
            | Derivation::Index { source, .. }
            | Derivation::Clone { source }
            | Derivation::Reverse { source } => vec![*source],
            Derivation::Concat(layout) => layout
                .slots
                .iter()
                .filter_map(|slot| match slot.source {
                    SlotSource::Signal(id) => Some(id),
                    SlotSource::Const(_) => None,
                })
                .collect(),
        }
    }

    /// Computes the derived value from the sources' current values.
    ///
    /// An undriven source yields an undriven result.
    pub fn evaluate(&self, table: &SignalTable) -> Result<Value, SignalError> {
        match self {
            Derivation::Slice {
                source,
                high,
                low,
                signed,
            } => match table.current(*source) {
                Value::Undriven => Ok(Value::Undriven),
                Value::Bits(bv) => {
                    let sliced = if *signed {
                        bv.signed_slice(*high, *low)
                    } else {
                        bv.slice(*high, *low)
                    };
                    sliced.map(Value::Bits).map_err(|e| SignalError::InvalidSlice {
                        signal: table.label(*source),
                        high: *high,
                        low: *low,
                        reason: e.to_string(),
                    })
                }
                _ => Err(SignalError::InvalidSlice {
                    signal: table.label(*source),
                    high: *high,
                    low: *low,
                    reason: "source is not a bit-vector".into(),
                }),
            },
            Derivation::Index { source, bit } => match table.current(*source) {
                Value::Undriven => Ok(Value::Undriven),
                Value::Bits(bv) => Ok(Value::Bool(bv.bit(*bit))),
                _ => Err(SignalError::InvalidIndex {
                    signal: table.label(*source),
                    bit: *bit,
                    reason: "source is not a bit-vector".into(),
                }),
            },
            Derivation::Clone { source } => Ok(table.current(*source).clone()),
            Derivation::Reverse { source } => match table.current(*source) {
                Value::Undriven => Ok(Value::Undriven),
                Value::Bits(bv) => bv.reversed().map(Value::Bits).map_err(|e| {
                    SignalError::InvalidSlice {
                        signal: table.label(*source),
                        high: bv.width(),
                        low: 0,
                        reason: e.to_string(),
                    }
                }),
                _ => Err(SignalError::InvalidSlice {
                    signal: table.label(*source),
                    high: 0,
                    low: 0,
                    reason: "source is not a bit-vector".into(),
                }),
            },
            Derivation::Concat(layout) => layout.pack(table),
        }
    }
}

/// One field of a concatenation, in declaration order (MSB first).
#[derive(Clone, Debug, PartialEq)]
pub enum ConcatField {
    /// A boolean or sized vector signal.
    Signal(SignalId),
    /// A constant bit.
    Bool(bool),
    /// A constant binary literal; its width is its digit count.
    Binary(String),
    /// A constant sized vector.
    Bits(IntBv),
}

impl From<SignalId> for ConcatField {
    fn from(id: SignalId) -> Self {
        ConcatField::Signal(id)
    }
}

impl From<bool> for ConcatField {
    fn from(b: bool) -> Self {
        ConcatField::Bool(b)
    }
}

impl From<&str> for ConcatField {
    fn from(s: &str) -> Self {
        ConcatField::Binary(s.to_string())
    }
}

impl From<IntBv> for ConcatField {
    fn from(bv: IntBv) -> Self {
        ConcatField::Bits(bv)
    }
}

/// What feeds one slot of a laid-out concatenation.
#[derive(Clone, Debug, PartialEq)]
pub enum SlotSource {
    /// The current value of a boolean or sized vector signal.
    Signal(SignalId),
    /// A constant; booleans and binary literals are stored as sized vectors.
    Const(IntBv),
}

/// A field placed at bits `[high-1 .. low]` of the result.
#[derive(Clone, Debug, PartialEq)]
pub struct ConcatSlot {
    /// The field's source.
    pub source: SlotSource,
    /// Exclusive upper bit.
    pub high: u32,
    /// Inclusive lower bit.
    pub low: u32,
}

/// Bit placement of every field of a concatenation.
#[derive(Clone, Debug, PartialEq)]
pub struct ConcatLayout {
    /// Slots in declaration order.
    pub slots: Vec<ConcatSlot>,
    /// Total width.
    pub width: u32,
}

impl ConcatLayout {
    /// Lays out `fields` MSB first against the kinds in `table`.
    pub fn new(fields: Vec<ConcatField>, table: &SignalTable) -> Result<Self, SignalError> {
        if fields.is_empty() {
            return Err(SignalError::EmptyConcat);
        }
        let unsupported = |index: usize, reason: String| SignalError::UnsupportedFieldType { index, reason };

        let mut sized = Vec::with_capacity(fields.len());
        let mut width: u32 = 0;
        for (index, field) in fields.into_iter().enumerate() {
            let (source, w) = match field {
                ConcatField::Signal(id) => {
                    let kind = &table.try_get(id)?.kind;
                    match kind {
                        ValueKind::Bool => (SlotSource::Signal(id), 1),
                        ValueKind::Bits { width, .. } if *width > 0 => (SlotSource::Signal(id), *width),
                        other => {
                            return Err(unsupported(
                                index,
                                format!("{} of kind {} has no bit width", table.label(id), other.describe()),
                            ))
                        }
                    }
                }
                ConcatField::Bool(b) => (SlotSource::Const(IntBv::from_bool(b)), 1),
                ConcatField::Binary(s) => {
                    let bv = IntBv::from_binary_str(&s).map_err(|e| unsupported(index, e.to_string()))?;
                    let w = bv.width();
                    (SlotSource::Const(bv), w)
                }
                ConcatField::Bits(bv) if bv.width() > 0 => {
                    let w = bv.width();
                    (SlotSource::Const(bv), w)
                }
                ConcatField::Bits(_) => {
                    return Err(unsupported(index, "unsized vector has no bit width".into()))
                }
            };
            width += w;
            if width > MAX_WIDTH {
                return Err(unsupported(
                    index,
                    format!("concatenation is wider than {MAX_WIDTH} bits"),
                ));
            }
            sized.push((source, w));
        }

        let mut high = width;
        let slots = sized
            .into_iter()
            .map(|(source, w)| {
                let slot = ConcatSlot {
                    source,
                    high,
                    low: high - w,
                };
                high -= w;
                slot
            })
            .collect();
        Ok(Self { slots, width })
    }

    /// Packs the fields' current values into one unsigned vector.
    pub fn pack(&self, table: &SignalTable) -> Result<Value, SignalError> {
        let mut acc: u128 = 0;
        for (index, slot) in self.slots.iter().enumerate() {
            let w = slot.high - slot.low;
            let bits = match &slot.source {
                SlotSource::Signal(id) => match table.current(*id) {
                    Value::Undriven => return Ok(Value::Undriven),
                    Value::Bool(b) => u128::from(*b),
                    Value::Bits(bv) => bv.bits(),
                    other => {
                        return Err(SignalError::UnsupportedFieldType {
                            index,
                            reason: format!("{} holds {other}, which has no bit layout", table.label(*id)),
                        })
                    }
                },
                SlotSource::Const(bv) => bv.bits(),
            };
            acc |= (bits & ((1u128 << w) - 1)) << slot.low;
        }
        IntBv::unsigned(acc as i128, self.width)
            .map(Value::Bits)
            .map_err(|e| SignalError::UnsupportedFieldType {
                index: self.slots.len().saturating_sub(1),
                reason: e.to_string(),
            })
    }
}

/// Keeps one derived signal in step with its sources.
#[derive(Debug)]
pub(crate) struct DerivedObserver {
    pub(crate) target: SignalId,
    pub(crate) derivation: Derivation,
}

impl Observer for DerivedObserver {
    fn target(&self) -> SignalId {
        self.target
    }

    fn sources(&self, _signals: &SignalTable) -> Vec<SignalId> {
        self.derivation.sources()
    }

    fn on_source_changed(&mut self, ctx: &mut ObserverCtx<'_>) -> Result<(), SignalError> {
        let value = self.derivation.evaluate(ctx.table())?;
        ctx.drive(self.target, value);
        Ok(())
    }

    fn on_reset(&mut self, ctx: &mut ObserverCtx<'_>) -> Result<(), SignalError> {
        let value = self.derivation.evaluate(ctx.table())?;
        ctx.table.get_mut(self.target).reseed(value);
        Ok(())
    }
}

impl SimContext {
    /// Unsigned slice `source[high:low]`: bits `high-1` down to `low`, width `high - low`.
    pub fn slice(&mut self, source: SignalId, high: u32, low: u32) -> Result<SignalId, SignalError> {
        self.make_slice(source, high, low, false)
    }

    /// Like [`slice`](Self::slice), but the result is two's complement.
    pub fn slice_signed(&mut self, source: SignalId, high: u32, low: u32) -> Result<SignalId, SignalError> {
        self.make_slice(source, high, low, true)
    }

    fn make_slice(&mut self, source: SignalId, high: u32, low: u32, signed: bool) -> Result<SignalId, SignalError> {
        let state = self.table.try_get(source)?;
        let invalid = |reason: String| SignalError::InvalidSlice {
            signal: self.table.label(source),
            high,
            low,
            reason,
        };
        let ValueKind::Bits { width, .. } = state.kind else {
            return Err(invalid("source is not a bit-vector".into()));
        };
        let limit = if width == 0 { 127 } else { width };
        if high <= low {
            return Err(invalid("range is empty or reversed".into()));
        }
        if high > limit {
            return Err(invalid(format!("source is {limit} bits wide")));
        }
        if high - low > MAX_WIDTH {
            return Err(invalid(format!("slice is wider than {MAX_WIDTH} bits")));
        }
        let w = high - low;
        let kind = if signed {
            ValueKind::signed(w)
        } else {
            ValueKind::unsigned(w)
        };
        self.derive(
            kind,
            Derivation::Slice {
                source,
                high,
                low,
                signed,
            },
            None,
        )
    }

    /// Single bit `source[bit]` as a boolean signal.
    pub fn index(&mut self, source: SignalId, bit: u32) -> Result<SignalId, SignalError> {
        let state = self.table.try_get(source)?;
        let invalid = |reason: String| SignalError::InvalidIndex {
            signal: self.table.label(source),
            bit,
            reason,
        };
        let ValueKind::Bits { width, .. } = state.kind else {
            return Err(invalid("source is not a bit-vector".into()));
        };
        if width > 0 && bit >= width {
            return Err(invalid(format!("source is {width} bits wide")));
        }
        if width == 0 && bit >= 127 {
            return Err(invalid("index is beyond the widest supported vector".into()));
        }
        self.derive(ValueKind::Bool, Derivation::Index { source, bit }, None)
    }

    /// A read-only alias that always equals `source`.
    pub fn clone_signal(&mut self, source: SignalId) -> Result<SignalId, SignalError> {
        let kind = self.table.try_get(source)?.kind.clone();
        self.derive(kind, Derivation::Clone { source }, Some(DriveKind::Wire))
    }

    /// A read-only alias holding the bits of a sized vector in reverse order.
    pub fn reverse(&mut self, source: SignalId) -> Result<SignalId, SignalError> {
        let width = match self.table.try_get(source)?.kind {
            ValueKind::Bits { width, .. } => width,
            _ => 0,
        };
        if width == 0 {
            return Err(SignalError::InvalidSlice {
                signal: self.table.label(source),
                high: 0,
                low: 0,
                reason: "only sized vectors can be reversed".into(),
            });
        }
        self.derive(ValueKind::unsigned(width), Derivation::Reverse { source }, None)
    }

    /// A read-only unsigned vector packing `fields` MSB first.
    ///
    /// Field signals are marked read.
    pub fn concat(&mut self, fields: Vec<ConcatField>) -> Result<SignalId, SignalError> {
        let layout = ConcatLayout::new(fields, &self.table)?;
        let kind = ValueKind::unsigned(layout.width);
        let derivation = Derivation::Concat(layout);
        for src in derivation.sources() {
            self.mark_read(src)?;
        }
        self.derive(kind, derivation, Some(DriveKind::Wire))
    }

    fn derive(
        &mut self,
        kind: ValueKind,
        derivation: Derivation,
        driven: Option<DriveKind>,
    ) -> Result<SignalId, SignalError> {
        let init = derivation.evaluate(&self.table)?;
        let mut state = SignalState::new(kind, init, SignalRole::Derived(derivation.clone()));
        state.driven = driven;
        state.structural_driven = driven;
        let target = self.table.alloc(state);
        self.add_observer(Box::new(DerivedObserver { target, derivation }));
        Ok(target)
    }
}
