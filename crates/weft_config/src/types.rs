//! Configuration types deserialized from `weft.toml`.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default guard against combinational loops.
pub const DEFAULT_MAX_DELTAS: u32 = 10_000;

/// The top-level configuration parsed from `weft.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Delta-cycle and run-time limits.
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Waveform tracing.
    #[serde(default)]
    pub trace: TraceSettings,
}

/// Limits applied to the delta-cycle loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationSettings {
    /// Maximum delta cycles at one time step before the run is aborted.
    #[serde(default = "default_max_deltas")]
    pub max_deltas_per_step: u32,
    /// Stop once simulated time would pass this value.
    #[serde(default)]
    pub time_limit: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            max_deltas_per_step: DEFAULT_MAX_DELTAS,
            time_limit: None,
        }
    }
}

fn default_max_deltas() -> u32 {
    DEFAULT_MAX_DELTAS
}

/// Waveform tracing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TraceSettings {
    /// Whether committed changes are written to a VCD file.
    #[serde(default)]
    pub enabled: bool,
    /// Output path; required when tracing is enabled.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Real time represented by one simulation time unit.
    #[serde(default)]
    pub timescale: Timescale,
}

/// Time units allowed in a VCD `$timescale` declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    /// Seconds.
    S,
    /// Milliseconds.
    Ms,
    /// Microseconds.
    Us,
    /// Nanoseconds (default).
    #[default]
    Ns,
    /// Picoseconds.
    Ps,
    /// Femtoseconds.
    Fs,
}

impl TimeUnit {
    fn suffix(self) -> &'static str {
        match self {
            TimeUnit::S => "s",
            TimeUnit::Ms => "ms",
            TimeUnit::Us => "us",
            TimeUnit::Ns => "ns",
            TimeUnit::Ps => "ps",
            TimeUnit::Fs => "fs",
        }
    }
}

/// A VCD timescale such as `1ns` or `100ps`.
///
/// The magnitude must be 1, 10 or 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Timescale {
    /// 1, 10 or 100.
    pub magnitude: u32,
    /// The unit.
    pub unit: TimeUnit,
}

impl Default for Timescale {
    fn default() -> Self {
        Self {
            magnitude: 1,
            unit: TimeUnit::Ns,
        }
    }
}

impl FromStr for Timescale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("timescale '{s}' has no unit"))?;
        let (digits, unit) = s.split_at(split);
        let magnitude: u32 = digits
            .parse()
            .map_err(|_| format!("timescale '{s}' has no magnitude"))?;
        if !matches!(magnitude, 1 | 10 | 100) {
            return Err(format!(
                "timescale magnitude must be 1, 10 or 100, got {magnitude}"
            ));
        }
        let unit = match unit.trim() {
            "s" => TimeUnit::S,
            "ms" => TimeUnit::Ms,
            "us" => TimeUnit::Us,
            "ns" => TimeUnit::Ns,
            "ps" => TimeUnit::Ps,
            "fs" => TimeUnit::Fs,
            other => return Err(format!("unknown time unit '{other}'")),
        };
        Ok(Self { magnitude, unit })
    }
}

impl TryFrom<String> for Timescale {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Timescale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.suffix())
    }
}
