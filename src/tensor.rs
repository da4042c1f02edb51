//! Dense n-dimensional tensor used by the kernels and layers

use crate::{Error, Result};
use ndarray::{Array1, ArrayD, IxDyn};

/// Owned `f32` tensor of arbitrary rank
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    data: ArrayD<f32>,
}

impl Tensor {
    /// Create a new tensor from an ndarray
    pub fn new(data: ArrayD<f32>) -> Self {
        Self { data }
    }

    /// Create a 1-D tensor from a vector
    pub fn from_vec(data: Vec<f32>) -> Self {
        Self::new(Array1::from(data).into_dyn())
    }

    /// Create a tensor with the given shape from row-major data
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Self::new(ArrayD::from_shape_vec(IxDyn(shape), data)?))
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: &[usize]) -> Self {
        Self::new(ArrayD::zeros(IxDyn(shape)))
    }

    /// Create a tensor filled with `value`
    pub fn full(shape: &[usize], value: f32) -> Self {
        Self::new(ArrayD::from_elem(IxDyn(shape), value))
    }

    /// Get reference to data
    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    /// Get mutable reference to data
    pub fn data_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.data
    }

    /// Consume the tensor and return the underlying array
    pub fn into_data(self) -> ArrayD<f32> {
        self.data
    }

    /// Tensor shape
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Apply `f` elementwise, keeping the shape
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        Tensor::new(self.data.mapv(f))
    }

    /// Elements in logical row-major order
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    /// Smallest element, `None` for an empty tensor
    pub fn min(&self) -> Option<f32> {
        self.data.iter().copied().reduce(f32::min)
    }

    /// Largest element, `None` for an empty tensor
    pub fn max(&self) -> Option<f32> {
        self.data.iter().copied().reduce(f32::max)
    }

    /// Elementwise absolute value
    pub fn abs(&self) -> Tensor {
        self.map(f32::abs)
    }

    /// Elementwise sign with sign(0) = 0
    pub fn sign(&self) -> Tensor {
        self.map(sign)
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(data: ArrayD<f32>) -> Self {
        Self::new(data)
    }
}

/// Sign of `x` in {-1, 0, 1}; NaN stays NaN
///
/// `f32::signum` maps +0.0 to 1.0, which is not what quantization wants.
pub fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        x * 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_is_1d() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(t.shape(), &[3]);
        assert_eq!(t.ndim(), 1);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_from_shape_vec() {
        let t = Tensor::from_shape_vec(&[2, 3], vec![0.0; 6]).unwrap();
        assert_eq!(t.shape(), &[2, 3]);

        let err = Tensor::from_shape_vec(&[2, 2], vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_min_max() {
        let t = Tensor::from_vec(vec![3.0, -1.0, 2.0]);
        assert_eq!(t.min(), Some(-1.0));
        assert_eq!(t.max(), Some(3.0));

        let empty = Tensor::from_vec(vec![]);
        assert!(empty.is_empty());
        assert_eq!(empty.min(), None);
    }

    #[test]
    fn test_sign_of_zero_is_zero() {
        let t = Tensor::from_vec(vec![-2.5, 0.0, -0.0, 4.0]);
        assert_eq!(t.sign().to_vec(), vec![-1.0, 0.0, 0.0, 1.0]);
        assert!(sign(f32::NAN).is_nan());
    }

    #[test]
    fn test_map_keeps_shape() {
        let t = Tensor::full(&[2, 2], -1.5);
        let m = t.abs();
        assert_eq!(m.shape(), &[2, 2]);
        assert!(m.to_vec().iter().all(|&v| v == 1.5));
    }
}
