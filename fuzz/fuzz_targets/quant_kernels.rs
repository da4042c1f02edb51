#![no_main]

use arbitrary::Arbitrary;
use cuantizar::quant::{
    compute_integral_part, linear_quantize, log_linear_quantize, log_min_max_quantize,
    min_max_quantize, tanh_quantize, CalibratedQuant,
};
use cuantizar::Tensor;
use libfuzzer_sys::fuzz_target;

/// Fuzz target for the quantization kernels
///
/// Kernels must never panic on arbitrary input and must keep the input shape.
/// Finite input to the linear kernel must give finite output.

#[derive(Arbitrary, Debug)]
struct KernelFuzzInput {
    values: Vec<f32>,
    bits: u8,
    sf: i8,
    overflow_rate: u8,
    kernel: u8,
    counter: u8,
}

fuzz_target!(|input: KernelFuzzInput| {
    if input.values.len() > 256 {
        return;
    }
    let tensor = Tensor::from_vec(input.values.clone());
    let bits = u32::from(input.bits % 34);
    let sf = i32::from(input.sf);
    let rate = f32::from(input.overflow_rate) / 256.0;

    let result = match input.kernel % 6 {
        0 => linear_quantize(&tensor, sf, bits),
        1 => min_max_quantize(&tensor, bits),
        2 => log_min_max_quantize(&tensor, bits),
        3 => tanh_quantize(&tensor, bits),
        4 => log_linear_quantize(&tensor, rate, bits),
        _ => compute_integral_part(&tensor, rate).map(|_| tensor.clone()),
    };

    // Invariant 1: bits == 0 is always rejected
    if bits == 0 {
        assert!(result.is_err());
        return;
    }

    // Invariant 2: successful results keep the shape
    if let Ok(out) = &result {
        assert_eq!(out.shape(), tensor.shape());

        // Invariant 3: linear kernel on finite input stays finite
        if input.kernel % 6 == 0 && bits < 32 && sf.abs() < 100 {
            let all_finite = input.values.iter().all(|v| v.is_finite());
            if all_finite {
                assert!(out.data().iter().all(|v| v.is_finite()));
            }
        }
    }

    // Invariant 4: calibration lifecycle never panics
    if let Ok(mut q) = CalibratedQuant::linear("fuzz", bits, rate, usize::from(input.counter % 4)) {
        for _ in 0..5 {
            let _ = q.forward(&tensor);
        }
    }
});
