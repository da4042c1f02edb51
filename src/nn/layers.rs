//! Leaf layers (inference mode only)
//!
//! Convolution and pooling take NCHW input. Batch norm normalizes along axis 1
//! with the stored running statistics.

use crate::{Error, Result, Tensor};
use ndarray::{Array2, Array4, ArrayView4, Axis, Ix1, Ix2, Ix4};
use std::fmt;

fn view4<'a>(input: &'a Tensor, layer: &str) -> Result<ArrayView4<'a, f32>> {
    if input.ndim() != 4 {
        return Err(Error::InvalidInput(format!(
            "{layer} expects a 4-D [N, C, H, W] input, got shape {:?}",
            input.shape()
        )));
    }
    Ok(input.data().view().into_dimensionality::<Ix4>()?)
}

fn check_vector(t: &Tensor, len: usize) -> Result<()> {
    if t.shape() != [len].as_slice() {
        return Err(Error::ShapeMismatch {
            expected: vec![len],
            got: t.shape().to_vec(),
        });
    }
    Ok(())
}

/// 2-D convolution with square stride and zero padding
#[derive(Clone, Debug, PartialEq)]
pub struct Conv2d {
    /// `[out_channels, in_channels, kh, kw]`
    weight: Tensor,
    bias: Option<Tensor>,
    stride: usize,
    padding: usize,
}

impl Conv2d {
    pub fn new(weight: Tensor, bias: Option<Tensor>, stride: usize, padding: usize) -> Result<Self> {
        if weight.ndim() != 4 {
            return Err(Error::InvalidInput(format!(
                "Conv2d weight must be 4-D, got shape {:?}",
                weight.shape()
            )));
        }
        if stride == 0 {
            return Err(Error::InvalidInput("Conv2d stride must be >= 1".to_string()));
        }
        if let Some(b) = &bias {
            check_vector(b, weight.shape()[0])?;
        }
        Ok(Self {
            weight,
            bias,
            stride,
            padding,
        })
    }

    /// Zero-initialized convolution with bias
    pub fn zeros(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        Self::new(
            Tensor::zeros(&[out_channels, in_channels, kernel_size, kernel_size]),
            Some(Tensor::zeros(&[out_channels])),
            stride,
            padding,
        )
    }

    pub fn in_channels(&self) -> usize {
        self.weight.shape()[1]
    }

    pub fn out_channels(&self) -> usize {
        self.weight.shape()[0]
    }

    /// `(kh, kw)`
    pub fn kernel_size(&self) -> (usize, usize) {
        (self.weight.shape()[2], self.weight.shape()[3])
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let x = view4(input, "Conv2d")?;
        let w = self.weight.data().view().into_dimensionality::<Ix4>()?;
        let (n, c, h, width) = x.dim();
        let (out_c, in_c, kh, kw) = w.dim();
        if c != in_c {
            return Err(Error::ShapeMismatch {
                expected: vec![n, in_c, h, width],
                got: input.shape().to_vec(),
            });
        }
        let (hp, wp) = (h + 2 * self.padding, width + 2 * self.padding);
        if hp < kh || wp < kw {
            return Err(Error::InvalidInput(format!(
                "Conv2d kernel {kh}x{kw} larger than padded input {hp}x{wp}"
            )));
        }
        let oh = (hp - kh) / self.stride + 1;
        let ow = (wp - kw) / self.stride + 1;
        let pad = self.padding as isize;

        let mut out = Array4::<f32>::zeros((n, out_c, oh, ow));
        for b in 0..n {
            for o in 0..out_c {
                let bias = self.bias.as_ref().map_or(0.0, |t| t.data()[[o]]);
                for i in 0..oh {
                    for j in 0..ow {
                        let mut acc = bias;
                        for ci in 0..in_c {
                            for ki in 0..kh {
                                let y = (i * self.stride + ki) as isize - pad;
                                if y < 0 || y >= h as isize {
                                    continue;
                                }
                                for kj in 0..kw {
                                    let xx = (j * self.stride + kj) as isize - pad;
                                    if xx < 0 || xx >= width as isize {
                                        continue;
                                    }
                                    acc += x[[b, ci, y as usize, xx as usize]] * w[[o, ci, ki, kj]];
                                }
                            }
                        }
                        out[[b, o, i, j]] = acc;
                    }
                }
            }
        }
        Ok(Tensor::new(out.into_dyn()))
    }
}

/// Fully-connected layer: `y = x W^T + b`
#[derive(Clone, Debug, PartialEq)]
pub struct Linear {
    /// `[out_features, in_features]`
    weight: Tensor,
    bias: Option<Tensor>,
}

impl Linear {
    pub fn new(weight: Tensor, bias: Option<Tensor>) -> Result<Self> {
        if weight.ndim() != 2 {
            return Err(Error::InvalidInput(format!(
                "Linear weight must be 2-D, got shape {:?}",
                weight.shape()
            )));
        }
        if let Some(b) = &bias {
            check_vector(b, weight.shape()[0])?;
        }
        Ok(Self { weight, bias })
    }

    /// Zero-initialized layer with bias
    pub fn zeros(in_features: usize, out_features: usize) -> Result<Self> {
        Self::new(
            Tensor::zeros(&[out_features, in_features]),
            Some(Tensor::zeros(&[out_features])),
        )
    }

    pub fn in_features(&self) -> usize {
        self.weight.shape()[1]
    }

    pub fn out_features(&self) -> usize {
        self.weight.shape()[0]
    }

    /// Accepts `[in]` or `[batch, in]`
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let w = self.weight.data().view().into_dimensionality::<Ix2>()?;
        let x = match input.ndim() {
            1 => input
                .data()
                .view()
                .into_dimensionality::<Ix1>()?
                .insert_axis(Axis(0)),
            2 => input.data().view().into_dimensionality::<Ix2>()?,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Linear expects [in] or [batch, in], got shape {:?}",
                    input.shape()
                )))
            }
        };
        if x.ncols() != self.in_features() {
            let mut expected = input.shape().to_vec();
            if let Some(last) = expected.last_mut() {
                *last = self.in_features();
            }
            return Err(Error::ShapeMismatch {
                expected,
                got: input.shape().to_vec(),
            });
        }

        let mut out: Array2<f32> = x.dot(&w.t());
        if let Some(b) = &self.bias {
            out += &b.data().view().into_dimensionality::<Ix1>()?;
        }
        if input.ndim() == 1 {
            Ok(Tensor::new(out.index_axis_move(Axis(0), 0).into_dyn()))
        } else {
            Ok(Tensor::new(out.into_dyn()))
        }
    }
}

/// Batch normalization with frozen running statistics
#[derive(Clone, Debug, PartialEq)]
pub struct BatchNorm {
    weight: Tensor,
    bias: Tensor,
    running_mean: Tensor,
    running_var: Tensor,
    eps: f32,
}

impl BatchNorm {
    pub fn new(
        weight: Tensor,
        bias: Tensor,
        running_mean: Tensor,
        running_var: Tensor,
        eps: f32,
    ) -> Result<Self> {
        let c = weight.len();
        for t in [&weight, &bias, &running_mean, &running_var] {
            check_vector(t, c)?;
        }
        Ok(Self {
            weight,
            bias,
            running_mean,
            running_var,
            eps,
        })
    }

    /// Identity statistics: gamma 1, beta 0, mean 0, var 1
    pub fn identity(num_features: usize) -> Self {
        Self {
            weight: Tensor::full(&[num_features], 1.0),
            bias: Tensor::zeros(&[num_features]),
            running_mean: Tensor::zeros(&[num_features]),
            running_var: Tensor::full(&[num_features], 1.0),
            eps: 1e-5,
        }
    }

    pub fn num_features(&self) -> usize {
        self.weight.len()
    }

    pub fn eps(&self) -> f32 {
        self.eps
    }

    fn forward(&self, input: &Tensor, layer: &str, ranks: &[usize]) -> Result<Tensor> {
        if !ranks.contains(&input.ndim()) {
            return Err(Error::InvalidInput(format!(
                "{layer} expects rank {ranks:?}, got shape {:?}",
                input.shape()
            )));
        }
        let c = self.num_features();
        if input.shape()[1] != c {
            let mut expected = input.shape().to_vec();
            expected[1] = c;
            return Err(Error::ShapeMismatch {
                expected,
                got: input.shape().to_vec(),
            });
        }

        let mut out = input.data().clone();
        let stats = self
            .weight
            .data()
            .iter()
            .zip(self.bias.data().iter())
            .zip(self.running_mean.data().iter())
            .zip(self.running_var.data().iter());
        for (mut lane, (((&gamma, &beta), &mean), &var)) in out.axis_iter_mut(Axis(1)).zip(stats) {
            let scale = gamma / (var + self.eps).sqrt();
            let shift = beta - mean * scale;
            lane.mapv_inplace(|v| v * scale + shift);
        }
        Ok(Tensor::new(out))
    }
}

/// Pooling window (no padding)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pool2d {
    pub kernel_size: usize,
    pub stride: usize,
}

impl Pool2d {
    /// Window with stride equal to its size
    pub fn new(kernel_size: usize) -> Self {
        Self {
            kernel_size,
            stride: kernel_size,
        }
    }

    pub fn with_stride(kernel_size: usize, stride: usize) -> Self {
        Self { kernel_size, stride }
    }

    fn forward(&self, input: &Tensor, layer: &str, reduce: impl Fn(&[f32]) -> f32) -> Result<Tensor> {
        let x = view4(input, layer)?;
        let (n, c, h, w) = x.dim();
        let (k, s) = (self.kernel_size, self.stride);
        if k == 0 || s == 0 || h < k || w < k {
            return Err(Error::InvalidInput(format!(
                "{layer} window {k} (stride {s}) does not fit input {h}x{w}"
            )));
        }
        let (oh, ow) = ((h - k) / s + 1, (w - k) / s + 1);
        let mut out = Array4::<f32>::zeros((n, c, oh, ow));
        let mut window = Vec::with_capacity(k * k);
        for ((b, ch, i, j), v) in out.indexed_iter_mut() {
            window.clear();
            for ki in 0..k {
                for kj in 0..k {
                    window.push(x[[b, ch, i * s + ki, j * s + kj]]);
                }
            }
            *v = reduce(&window);
        }
        Ok(Tensor::new(out.into_dyn()))
    }
}

/// Leaf computational layer
#[derive(Clone, Debug, PartialEq)]
pub enum Layer {
    Conv2d(Conv2d),
    Linear(Linear),
    BatchNorm1d(BatchNorm),
    BatchNorm2d(BatchNorm),
    AvgPool2d(Pool2d),
    MaxPool2d(Pool2d),
    ReLU,
    Flatten,
    /// Identity at inference; keeps its drop probability for display
    Dropout(f32),
}

impl Layer {
    pub fn type_name(&self) -> &'static str {
        match self {
            Layer::Conv2d(_) => "Conv2d",
            Layer::Linear(_) => "Linear",
            Layer::BatchNorm1d(_) => "BatchNorm1d",
            Layer::BatchNorm2d(_) => "BatchNorm2d",
            Layer::AvgPool2d(_) => "AvgPool2d",
            Layer::MaxPool2d(_) => "MaxPool2d",
            Layer::ReLU => "ReLU",
            Layer::Flatten => "Flatten",
            Layer::Dropout(_) => "Dropout",
        }
    }

    /// Layers whose outputs get an activation quantizer
    pub fn is_recognized(&self) -> bool {
        matches!(
            self,
            Layer::Conv2d(_)
                | Layer::Linear(_)
                | Layer::BatchNorm1d(_)
                | Layer::BatchNorm2d(_)
                | Layer::AvgPool2d(_)
        )
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        match self {
            Layer::Conv2d(l) => l.forward(input),
            Layer::Linear(l) => l.forward(input),
            Layer::BatchNorm1d(bn) => bn.forward(input, "BatchNorm1d", &[2, 3]),
            Layer::BatchNorm2d(bn) => bn.forward(input, "BatchNorm2d", &[4]),
            Layer::AvgPool2d(p) => p.forward(input, "AvgPool2d", |w| {
                w.iter().sum::<f32>() / w.len() as f32
            }),
            Layer::MaxPool2d(p) => p.forward(input, "MaxPool2d", |w| {
                w.iter().copied().fold(f32::NEG_INFINITY, f32::max)
            }),
            Layer::ReLU => Ok(input.map(|x| x.max(0.0))),
            Layer::Flatten => {
                if input.ndim() <= 1 {
                    return Ok(input.clone());
                }
                let batch = input.shape()[0];
                let rest = input.len().checked_div(batch).unwrap_or(0);
                Tensor::from_shape_vec(&[batch, rest], input.to_vec())
            }
            Layer::Dropout(_) => Ok(input.clone()),
        }
    }

    /// Named parameters in declaration order
    pub fn parameters(&self) -> Vec<(&'static str, &Tensor)> {
        match self {
            Layer::Conv2d(Conv2d { weight, bias, .. }) | Layer::Linear(Linear { weight, bias }) => {
                let mut params = vec![("weight", weight)];
                if let Some(b) = bias {
                    params.push(("bias", b));
                }
                params
            }
            Layer::BatchNorm1d(bn) | Layer::BatchNorm2d(bn) => vec![
                ("weight", &bn.weight),
                ("bias", &bn.bias),
                ("running_mean", &bn.running_mean),
                ("running_var", &bn.running_var),
            ],
            _ => Vec::new(),
        }
    }

    pub fn parameters_mut(&mut self) -> Vec<(&'static str, &mut Tensor)> {
        match self {
            Layer::Conv2d(Conv2d { weight, bias, .. }) | Layer::Linear(Linear { weight, bias }) => {
                let mut params = vec![("weight", weight)];
                if let Some(b) = bias {
                    params.push(("bias", b));
                }
                params
            }
            Layer::BatchNorm1d(bn) | Layer::BatchNorm2d(bn) => vec![
                ("weight", &mut bn.weight),
                ("bias", &mut bn.bias),
                ("running_mean", &mut bn.running_mean),
                ("running_var", &mut bn.running_var),
            ],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Conv2d(c) => {
                let (kh, kw) = c.kernel_size();
                write!(
                    f,
                    "Conv2d({}, {}, kernel_size=({kh}, {kw}), stride={}, padding={})",
                    c.in_channels(),
                    c.out_channels(),
                    c.stride,
                    c.padding
                )
            }
            Layer::Linear(l) => write!(
                f,
                "Linear(in_features={}, out_features={}, bias={})",
                l.in_features(),
                l.out_features(),
                l.bias.is_some()
            ),
            Layer::BatchNorm1d(bn) | Layer::BatchNorm2d(bn) => {
                write!(f, "{}({}, eps={})", self.type_name(), bn.num_features(), bn.eps)
            }
            Layer::AvgPool2d(p) | Layer::MaxPool2d(p) => write!(
                f,
                "{}(kernel_size={}, stride={})",
                self.type_name(),
                p.kernel_size,
                p.stride
            ),
            Layer::Dropout(p) => write!(f, "Dropout(p={p})"),
            Layer::ReLU | Layer::Flatten => write!(f, "{}()", self.type_name()),
        }
    }
}

impl From<Conv2d> for Layer {
    fn from(l: Conv2d) -> Self {
        Layer::Conv2d(l)
    }
}

impl From<Linear> for Layer {
    fn from(l: Linear) -> Self {
        Layer::Linear(l)
    }
}
