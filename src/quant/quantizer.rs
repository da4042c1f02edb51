//! Activation quantizer as inserted into a layer tree

use super::calibrated::CalibratedQuant;
use super::ops::{check_bits, check_overflow_rate};
use super::scheme::QuantScheme;
use super::stateless::NormalQuant;
use crate::{Result, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Any activation quantizer
#[derive(Clone, Debug)]
pub enum Quantizer {
    Calibrated(CalibratedQuant),
    Stateless(NormalQuant),
}

impl Quantizer {
    /// Forward pass (may advance calibration)
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        match self {
            Quantizer::Calibrated(q) => q.forward(input),
            Quantizer::Stateless(q) => q.forward(input),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Quantizer::Calibrated(q) => q.name(),
            Quantizer::Stateless(q) => q.name(),
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            Quantizer::Calibrated(q) => q.bits(),
            Quantizer::Stateless(q) => q.bits(),
        }
    }

    /// Whether the next call still passes its input through for calibration
    pub fn is_calibrating(&self) -> bool {
        match self {
            Quantizer::Calibrated(q) => q.is_calibrating(),
            Quantizer::Stateless(_) => false,
        }
    }
}

impl fmt::Display for Quantizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantizer::Calibrated(q) => q.fmt(f),
            Quantizer::Stateless(q) => q.fmt(f),
        }
    }
}

impl From<CalibratedQuant> for Quantizer {
    fn from(q: CalibratedQuant) -> Self {
        Quantizer::Calibrated(q)
    }
}

impl From<NormalQuant> for Quantizer {
    fn from(q: NormalQuant) -> Self {
        Quantizer::Stateless(q)
    }
}

/// Settings for the quantizers inserted after each recognized layer
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivationQuantConfig {
    /// Activation bit width
    pub bits: u32,
    /// Fraction of largest magnitudes allowed to clip
    pub overflow_rate: f32,
    /// Calibration batches for calibrated schemes
    pub counter: usize,
    /// Scheme to build
    pub scheme: QuantScheme,
}

impl ActivationQuantConfig {
    pub fn new(bits: u32, overflow_rate: f32, counter: usize, scheme: QuantScheme) -> Self {
        Self {
            bits,
            overflow_rate,
            counter,
            scheme,
        }
    }

    /// Check bit width and overflow rate
    pub fn validate(&self) -> Result<()> {
        check_bits(self.bits)?;
        check_overflow_rate(self.overflow_rate)
    }

    /// Build one quantizer from these settings
    pub fn build(&self, name: impl Into<String>) -> Result<Quantizer> {
        self.scheme
            .build_quantizer(name, self.bits, self.overflow_rate, self.counter)
    }
}

impl Default for ActivationQuantConfig {
    fn default() -> Self {
        Self::new(8, 0.0, 20, QuantScheme::Linear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quant::StatelessKernel;
    use crate::Error;

    #[test]
    fn test_enum_dispatch() {
        let mut q: Quantizer = CalibratedQuant::linear("a", 8, 0.0, 1).unwrap().into();
        assert!(q.is_calibrating());
        let x = Tensor::from_vec(vec![0.7]);
        assert_eq!(q.forward(&x).unwrap(), x);
        assert!(!q.is_calibrating());
        assert_eq!(q.name(), "a");

        let s: Quantizer = NormalQuant::new("b", 4, StatelessKernel::MinMax).unwrap().into();
        assert!(!s.is_calibrating());
        assert_eq!(s.bits(), 4);
        assert_eq!(s.to_string(), "NormalQuant(bits=4)");
    }

    #[test]
    fn test_config_validation() {
        assert!(ActivationQuantConfig::default().validate().is_ok());
        let bad_bits = ActivationQuantConfig::new(0, 0.0, 1, QuantScheme::Tanh);
        assert!(matches!(bad_bits.validate(), Err(Error::InvalidBits(0))));
        let bad_rate = ActivationQuantConfig::new(8, 1.0, 1, QuantScheme::Linear);
        assert!(matches!(bad_rate.validate(), Err(Error::InvalidOverflowRate(_))));
    }

    #[test]
    fn test_config_build() {
        let cfg = ActivationQuantConfig::new(6, 0.01, 3, QuantScheme::Linear);
        let q = cfg.build("fc_quant").unwrap();
        assert_eq!(
            q.to_string(),
            "LinearQuant(sf=None, bits=6, overflow_rate=0.010, counter=3)"
        );
    }
}
