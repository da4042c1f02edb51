//! Calibrated activation quantizers
//!
//! A calibrated quantizer first observes a fixed number of batches, passing
//! them through untouched while it tracks the smallest scale factor any batch
//! asked for. Once the counter runs out the scale factor is frozen and every
//! later call applies the fixed-point (or log-domain) kernel with it.
//!
//! ```text
//! Observing { remaining > 0 } --forward--> Observing { remaining - 1 }
//!                                     \--> Frozen { sf }  (when remaining hits 0)
//! Frozen { sf } --forward--> quantize(input, sf)
//! ```

use super::integral::integral_part_of;
use super::linear::linear_quantize;
use super::log_linear::{log_linear_quantize_with_sf, log_scale_factor};
use super::ops::{check_bits, check_overflow_rate};
use crate::{Error, Result, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kernel a calibrated quantizer applies once frozen
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibratedKind {
    /// Signed fixed-point on the raw values
    Linear,
    /// Fixed-point on `ln|x|`
    Log,
}

impl CalibratedKind {
    /// Display name used in quantizer reprs
    pub fn type_name(&self) -> &'static str {
        match self {
            CalibratedKind::Linear => "LinearQuant",
            CalibratedKind::Log => "LogQuant",
        }
    }
}

/// Calibration state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationState {
    /// Passing batches through while estimating the scale factor
    Observing {
        /// Calibration batches left
        remaining: usize,
        /// Running minimum of the per-batch scale factors
        sf: Option<i32>,
    },
    /// Scale factor fixed, quantizing every call
    Frozen {
        /// Frozen scale factor
        sf: i32,
    },
}

/// Activation quantizer that calibrates its scale factor on the first batches
#[derive(Clone, Debug)]
pub struct CalibratedQuant {
    name: String,
    kind: CalibratedKind,
    bits: u32,
    overflow_rate: f32,
    state: CalibrationState,
}

impl CalibratedQuant {
    /// Create a quantizer that observes `counter` batches before freezing
    ///
    /// # Errors
    /// `InvalidBits` outside `1..=32`, `InvalidOverflowRate` outside [0, 1).
    pub fn new(
        kind: CalibratedKind,
        name: impl Into<String>,
        bits: u32,
        overflow_rate: f32,
        counter: usize,
    ) -> Result<Self> {
        check_bits(bits)?;
        check_overflow_rate(overflow_rate)?;
        Ok(Self {
            name: name.into(),
            kind,
            bits,
            overflow_rate,
            state: CalibrationState::Observing {
                remaining: counter,
                sf: None,
            },
        })
    }

    /// Fixed-point quantizer on raw activations
    pub fn linear(
        name: impl Into<String>,
        bits: u32,
        overflow_rate: f32,
        counter: usize,
    ) -> Result<Self> {
        Self::new(CalibratedKind::Linear, name, bits, overflow_rate, counter)
    }

    /// Fixed-point quantizer on log-magnitudes
    pub fn log(name: impl Into<String>, bits: u32, overflow_rate: f32, counter: usize) -> Result<Self> {
        Self::new(CalibratedKind::Log, name, bits, overflow_rate, counter)
    }

    /// Seed the scale factor
    ///
    /// With calibration batches left the seed joins the running minimum;
    /// with none left the quantizer is frozen at `sf` right away.
    pub fn with_sf(mut self, sf: i32) -> Self {
        self.state = match self.state {
            CalibrationState::Observing { remaining, .. } if remaining > 0 => {
                CalibrationState::Observing {
                    remaining,
                    sf: Some(sf),
                }
            }
            _ => CalibrationState::Frozen { sf },
        };
        self
    }

    /// Forward pass
    ///
    /// While observing, returns `input` unchanged and updates the scale
    /// factor. Once frozen, returns the quantized tensor.
    ///
    /// # Errors
    /// `NotCalibrated` if calibration ended without a single usable batch (or
    /// the quantizer was built with a zero counter and no seed).
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        match self.state {
            CalibrationState::Observing { remaining, sf } if remaining > 0 => {
                let sf = match (sf, self.candidate_sf(input)?) {
                    (Some(current), Some(candidate)) => Some(current.min(candidate)),
                    (current, candidate) => current.or(candidate),
                };
                let remaining = remaining - 1;

                self.state = match (remaining, sf) {
                    (0, Some(sf)) => {
                        tracing::debug!(quantizer = %self.name, sf, "calibration finished");
                        CalibrationState::Frozen { sf }
                    }
                    _ => CalibrationState::Observing { remaining, sf },
                };
                Ok(input.clone())
            }
            CalibrationState::Observing { .. } => Err(Error::NotCalibrated(format!(
                "{} has no scale factor after calibration",
                self.name
            ))),
            CalibrationState::Frozen { sf } => self.quantize(input, sf),
        }
    }

    /// Scale factor this batch asks for, `None` if the batch carries no range
    fn candidate_sf(&self, input: &Tensor) -> Result<Option<i32>> {
        match self.kind {
            CalibratedKind::Linear => {
                if input.is_empty() {
                    return Ok(None);
                }
                let magnitudes = input.data().iter().map(|x| x.abs()).collect();
                let integral = integral_part_of(magnitudes, self.overflow_rate)?;
                Ok(Some(self.bits as i32 - 1 - integral))
            }
            CalibratedKind::Log => log_scale_factor(input, self.overflow_rate, self.bits),
        }
    }

    fn quantize(&self, input: &Tensor, sf: i32) -> Result<Tensor> {
        match self.kind {
            CalibratedKind::Linear => linear_quantize(input, sf, self.bits),
            CalibratedKind::Log => log_linear_quantize_with_sf(input, sf, self.bits),
        }
    }

    /// Quantizer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kernel applied once frozen
    pub fn kind(&self) -> CalibratedKind {
        self.kind
    }

    /// Bit width
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Fraction of largest magnitudes allowed to clip
    pub fn overflow_rate(&self) -> f32 {
        self.overflow_rate
    }

    /// Calibration batches left
    pub fn counter(&self) -> usize {
        match self.state {
            CalibrationState::Observing { remaining, .. } => remaining,
            CalibrationState::Frozen { .. } => 0,
        }
    }

    /// Current (or frozen) scale factor
    pub fn sf(&self) -> Option<i32> {
        match self.state {
            CalibrationState::Observing { sf, .. } => sf,
            CalibrationState::Frozen { sf } => Some(sf),
        }
    }

    /// Whether the next call still calibrates
    pub fn is_calibrating(&self) -> bool {
        matches!(self.state, CalibrationState::Observing { remaining, .. } if remaining > 0)
    }

    /// Current state
    pub fn state(&self) -> CalibrationState {
        self.state
    }
}

impl fmt::Display for CalibratedQuant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sf = self
            .sf()
            .map_or_else(|| "None".to_string(), |sf| sf.to_string());
        write!(
            f,
            "{}(sf={}, bits={}, overflow_rate={:.3}, counter={})",
            self.kind.type_name(),
            sf,
            self.bits,
            self.overflow_rate,
            self.counter()
        )
    }
}
