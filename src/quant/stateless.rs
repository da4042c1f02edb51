//! Stateless quantizer wrapper around the per-call kernels

use super::min_max::{log_min_max_quantize, min_max_quantize};
use super::ops::check_bits;
use super::tanh::tanh_quantize;
use crate::{Result, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kernels that need no calibration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatelessKernel {
    MinMax,
    LogMinMax,
    Tanh,
}

impl StatelessKernel {
    /// Apply the kernel
    pub fn apply(&self, input: &Tensor, bits: u32) -> Result<Tensor> {
        match self {
            StatelessKernel::MinMax => min_max_quantize(input, bits),
            StatelessKernel::LogMinMax => log_min_max_quantize(input, bits),
            StatelessKernel::Tanh => tanh_quantize(input, bits),
        }
    }
}

/// Quantizer that applies its kernel on every call
#[derive(Clone, Debug, PartialEq)]
pub struct NormalQuant {
    name: String,
    bits: u32,
    kernel: StatelessKernel,
}

impl NormalQuant {
    /// Create a stateless quantizer
    pub fn new(name: impl Into<String>, bits: u32, kernel: StatelessKernel) -> Result<Self> {
        check_bits(bits)?;
        Ok(Self {
            name: name.into(),
            bits,
            kernel,
        })
    }

    /// Forward pass: always quantizes
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.kernel.apply(input, self.bits)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn kernel(&self) -> StatelessKernel {
        self.kernel
    }
}

impl fmt::Display for NormalQuant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NormalQuant(bits={})", self.bits)
    }
}
