//! Quantization scheme selection

use super::calibrated::CalibratedQuant;
use super::quantizer::Quantizer;
use super::stateless::{NormalQuant, StatelessKernel};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quantization scheme
///
/// `Log` builds a stateless log min-max quantizer, matching the behavior the
/// workflow has always shipped with. The calibrated log-domain fixed-point
/// quantizer is selected with `LogLinear`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QuantScheme {
    /// Calibrated signed fixed-point
    #[default]
    #[serde(rename = "linear")]
    Linear,
    /// Stateless min-max
    #[serde(rename = "minmax")]
    MinMax,
    /// Stateless log min-max
    #[serde(rename = "log")]
    Log,
    /// Stateless tanh
    #[serde(rename = "tanh")]
    Tanh,
    /// Stateless log min-max
    #[serde(rename = "minmax_log")]
    MinMaxLog,
    /// Calibrated log-domain fixed-point
    #[serde(rename = "log_linear")]
    LogLinear,
}

impl QuantScheme {
    pub const ALL: [QuantScheme; 6] = [
        QuantScheme::Linear,
        QuantScheme::MinMax,
        QuantScheme::Log,
        QuantScheme::Tanh,
        QuantScheme::MinMaxLog,
        QuantScheme::LogLinear,
    ];

    /// Scheme name as used in configs and layer names
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantScheme::Linear => "linear",
            QuantScheme::MinMax => "minmax",
            QuantScheme::Log => "log",
            QuantScheme::Tanh => "tanh",
            QuantScheme::MinMaxLog => "minmax_log",
            QuantScheme::LogLinear => "log_linear",
        }
    }

    /// Whether the scheme builds a calibrated quantizer
    pub fn is_calibrated(&self) -> bool {
        matches!(self, QuantScheme::Linear | QuantScheme::LogLinear)
    }

    /// Build the activation quantizer this scheme calls for
    ///
    /// `overflow_rate` and `counter` only matter for calibrated schemes.
    pub fn build_quantizer(
        &self,
        name: impl Into<String>,
        bits: u32,
        overflow_rate: f32,
        counter: usize,
    ) -> Result<Quantizer> {
        let quantizer = match self {
            QuantScheme::Linear => {
                Quantizer::Calibrated(CalibratedQuant::linear(name, bits, overflow_rate, counter)?)
            }
            QuantScheme::LogLinear => {
                Quantizer::Calibrated(CalibratedQuant::log(name, bits, overflow_rate, counter)?)
            }
            QuantScheme::MinMax => {
                Quantizer::Stateless(NormalQuant::new(name, bits, StatelessKernel::MinMax)?)
            }
            QuantScheme::Log | QuantScheme::MinMaxLog => {
                Quantizer::Stateless(NormalQuant::new(name, bits, StatelessKernel::LogMinMax)?)
            }
            QuantScheme::Tanh => {
                Quantizer::Stateless(NormalQuant::new(name, bits, StatelessKernel::Tanh)?)
            }
        };
        Ok(quantizer)
    }
}

impl fmt::Display for QuantScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuantScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.to_lowercase();
        QuantScheme::ALL
            .into_iter()
            .find(|scheme| scheme.as_str() == name)
            .ok_or_else(|| Error::UnknownScheme(s.to_string()))
    }
}
