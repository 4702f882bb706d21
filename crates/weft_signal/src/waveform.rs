//! Waveform recording of committed signal changes.
//!
//! The [`WaveformRecorder`] trait abstracts the output format. [`VcdRecorder`]
//! writes IEEE 1364 Value Change Dump text: single bits as `0`/`1`/`z`,
//! sized vectors as `b...`, and everything without a fixed bit layout as a
//! string value (`s...`).

use std::io::Write;

use weft_common::ArenaId;

use crate::error::SimError;
use crate::signal::SignalId;
use crate::value::{Value, ValueKind};

/// Sink for value changes of traced signals.
pub trait WaveformRecorder {
    /// Declares a signal before any change of it is recorded.
    fn register_signal(&mut self, id: SignalId, name: &str, kind: &ValueKind) -> Result<(), SimError>;

    /// Opens a hierarchy level.
    fn begin_scope(&mut self, name: &str) -> Result<(), SimError>;

    /// Closes the innermost open hierarchy level.
    fn end_scope(&mut self) -> Result<(), SimError>;

    /// Records a committed value at `time` ticks.
    fn record_change(&mut self, time: u64, id: SignalId, value: &Value) -> Result<(), SimError>;

    /// Flushes buffered output.
    fn finalize(&mut self) -> Result<(), SimError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VarFormat {
    Scalar,
    Vector(u32),
    Text,
}

impl VarFormat {
    fn for_kind(kind: &ValueKind) -> Self {
        match kind.bit_width() {
            _ if matches!(kind, ValueKind::Enum(_)) => VarFormat::Text,
            0 => VarFormat::Text,
            1 => VarFormat::Scalar,
            w => VarFormat::Vector(w),
        }
    }
}

#[derive(Debug)]
struct TraceVar {
    id: SignalId,
    code: String,
    format: VarFormat,
}

/// VCD writer.
///
/// Definitions are emitted as signals register; the first recorded change
/// closes any open scopes and ends the definition section.
pub struct VcdRecorder<W: Write> {
    writer: W,
    timescale: String,
    vars: Vec<TraceVar>,
    header_written: bool,
    open_scopes: usize,
    current_time: Option<u64>,
}

impl<W: Write> VcdRecorder<W> {
    /// Creates a recorder with a `1ns` timescale.
    pub fn new(writer: W) -> Self {
        Self::with_timescale(writer, "1ns")
    }

    /// Creates a recorder declaring the given timescale, e.g. `"10ps"`.
    pub fn with_timescale(writer: W, timescale: impl Into<String>) -> Self {
        Self {
            writer,
            timescale: timescale.into(),
            vars: Vec::new(),
            header_written: false,
            open_scopes: 0,
            current_time: None,
        }
    }

    /// Consumes the recorder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn ensure_header(&mut self) -> Result<(), SimError> {
        if self.header_written {
            return Ok(());
        }
        writeln!(self.writer, "$date")?;
        writeln!(self.writer, "  Simulation date")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$version")?;
        writeln!(self.writer, "  weft signal engine")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$timescale")?;
        writeln!(self.writer, "  {}", self.timescale)?;
        writeln!(self.writer, "$end")?;
        self.header_written = true;
        Ok(())
    }

    fn end_definitions(&mut self) -> Result<(), SimError> {
        self.ensure_header()?;
        while self.open_scopes > 0 {
            self.end_scope()?;
        }
        writeln!(self.writer, "$enddefinitions $end")?;
        Ok(())
    }

    /// Identifier codes from printable ASCII starting at `!`, growing past 94 entries.
    fn make_id_code(index: u32) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            let c = (b'!' + (idx % 94) as u8) as char;
            result.push(c);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    fn format_value(value: &Value, format: VarFormat) -> String {
        match (format, value) {
            (VarFormat::Scalar, Value::Undriven) => "z".into(),
            (VarFormat::Scalar, v) => if v.is_truthy() { "1" } else { "0" }.into(),
            (VarFormat::Vector(w), Value::Undriven) => format!("b{}", "z".repeat(w as usize)),
            (VarFormat::Vector(w), Value::Bits(bv)) if bv.width() == w => {
                format!("b{}", bv.to_binary_string())
            }
            (VarFormat::Vector(w), Value::Bits(bv)) => {
                format!("b{:0w$b}", bv.bits(), w = w as usize)
            }
            (VarFormat::Vector(w), Value::Enum(item)) => {
                format!("b{:0w$b}", item.code(), w = w as usize)
            }
            (VarFormat::Vector(_), v) => format!("b{:b}", v.as_int().unwrap_or(0)),
            (VarFormat::Text, Value::Bits(bv)) => format!("s{}", hex(bv.value())),
            (VarFormat::Text, Value::Int(v)) => format!("s{}", hex(*v)),
            (VarFormat::Text, v) => format!("s{}", v.to_string().replace(char::is_whitespace, "_")),
        }
    }
}

fn hex(v: i128) -> String {
    if v < 0 {
        format!("-0x{:x}", v.unsigned_abs())
    } else {
        format!("0x{v:x}")
    }
}

impl<W: Write> WaveformRecorder for VcdRecorder<W> {
    fn register_signal(&mut self, id: SignalId, name: &str, kind: &ValueKind) -> Result<(), SimError> {
        self.ensure_header()?;
        let code = Self::make_id_code(self.vars.len() as u32);
        let format = VarFormat::for_kind(kind);
        match format {
            VarFormat::Scalar => writeln!(self.writer, "$var wire 1 {code} {name} $end")?,
            VarFormat::Vector(w) => writeln!(self.writer, "$var wire {w} {code} {name} $end")?,
            VarFormat::Text => writeln!(self.writer, "$var string 1 {code} {name} $end")?,
        }
        self.vars.push(TraceVar { id, code, format });
        Ok(())
    }

    fn begin_scope(&mut self, name: &str) -> Result<(), SimError> {
        self.ensure_header()?;
        writeln!(self.writer, "$scope module {name} $end")?;
        self.open_scopes += 1;
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), SimError> {
        if self.open_scopes > 0 {
            writeln!(self.writer, "$upscope $end")?;
            self.open_scopes -= 1;
        }
        Ok(())
    }

    fn record_change(&mut self, time: u64, id: SignalId, value: &Value) -> Result<(), SimError> {
        if self.current_time != Some(time) {
            if self.current_time.is_none() {
                self.end_definitions()?;
            }
            writeln!(self.writer, "#{time}")?;
            self.current_time = Some(time);
        }

        let var = self
            .vars
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| SimError::UnregisteredTrace(format!("s{}", id.as_raw())))?;

        let val_str = Self::format_value(value, var.format);
        if var.format == VarFormat::Scalar {
            writeln!(self.writer, "{val_str}{}", var.code)?;
        } else {
            writeln!(self.writer, "{val_str} {}", var.code)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SimError> {
        if self.current_time.is_none() {
            self.end_definitions()?;
            self.current_time = Some(0);
        }
        self.writer.flush()?;
        Ok(())
    }
}
