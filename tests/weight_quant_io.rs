//! Weight quantization through checkpoint files

use approx::assert_abs_diff_eq;
use cuantizar::io::{
    load_checkpoint, load_safetensors, save_checkpoint, save_safetensors, Checkpoint, ModelFormat,
    SaveConfig,
};
use cuantizar::quant::{quantize_state_dict, QuantErrorStats, QuantScheme, WeightQuantConfig};
use cuantizar::Tensor;
use std::collections::BTreeSet;
use tempfile::TempDir;

fn state() -> Vec<(String, Tensor)> {
    let weight: Vec<f32> = (0..48).map(|i| (i as f32 * 0.37).sin() * 0.8).collect();
    vec![
        ("bn.running_mean".to_string(), Tensor::from_vec(vec![0.123, -0.456])),
        ("bn.running_var".to_string(), Tensor::from_vec(vec![0.9, 1.1])),
        (
            "conv.weight".to_string(),
            Tensor::from_shape_vec(&[4, 3, 2, 2], weight).unwrap(),
        ),
        ("fc.bias".to_string(), Tensor::from_vec(vec![0.01, -0.02, 0.3])),
    ]
}

fn distinct(t: &Tensor) -> usize {
    t.data().iter().map(|x| x.to_bits()).collect::<BTreeSet<_>>().len()
}

#[test]
fn test_minmax_checkpoint_pipeline() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("model.safetensors");
    save_safetensors(&src, &state(), None).unwrap();

    let original = load_checkpoint(&src).unwrap();
    assert_eq!(original.parameters, state());

    let config = WeightQuantConfig {
        param_bits: 4,
        scheme: QuantScheme::MinMax,
        ..WeightQuantConfig::default()
    };
    let quantized = quantize_state_dict(&original.parameters, &config).unwrap();

    let conv = &quantized[2].1;
    assert_eq!(conv.shape(), &[4, 3, 2, 2]);
    // 2^(4-1) - 1 = 7 steps span the range, so 8 levels at most
    assert!(distinct(conv) <= 8);
    // running statistics keep full precision under the default bn_bits
    assert_eq!(quantized[0], original.parameters[0]);
    assert_eq!(quantized[1], original.parameters[1]);

    let stats = QuantErrorStats::between(&original.parameters[2].1, conv).unwrap();
    assert!(stats.mse > 0.0);
    assert!(stats.sqnr_db > 10.0, "sqnr too low: {stats}");

    for (file, format) in [
        ("q.json", ModelFormat::Json),
        ("q.yaml", ModelFormat::Yaml),
        ("q.safetensors", ModelFormat::SafeTensors),
    ] {
        let path = dir.path().join(file);
        let ckpt = Checkpoint::new(quantized.clone()).with_metadata("quant.param_bits", "4");
        save_checkpoint(&ckpt, &path, &SaveConfig::new(format)).unwrap();

        let reloaded = load_checkpoint(&path).unwrap();
        assert_eq!(reloaded.parameters, quantized, "{file} changed the tensors");
        assert_eq!(
            reloaded.metadata.get("quant.param_bits").map(String::as_str),
            Some("4")
        );
    }
}

#[test]
fn test_linear_bits_per_parameter() {
    let config = WeightQuantConfig {
        param_bits: 3,
        bn_bits: 8,
        ..WeightQuantConfig::default()
    };
    let quantized = quantize_state_dict(&state(), &config).unwrap();

    // running_mean max 0.456 -> ip = -1, sf = 8 - 1 + 1 = 8
    let mean = quantized[0].1.to_vec();
    assert_abs_diff_eq!(mean[0], 31.0 / 256.0);
    assert_abs_diff_eq!(mean[1], -117.0 / 256.0);

    // fc.bias max 0.3 -> ip = -1, sf = 3 - 1 + 1 = 3
    assert_eq!(quantized[3].1.to_vec(), vec![0.0, 0.0, 0.25]);
}

#[test]
fn test_full_precision_is_passthrough() {
    let config = WeightQuantConfig {
        param_bits: 32,
        ..WeightQuantConfig::default()
    };
    assert_eq!(quantize_state_dict(&state(), &config).unwrap(), state());
}

#[test]
fn test_safetensors_sorted_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("unsorted.safetensors");
    let mut tensors = state();
    tensors.reverse();
    save_safetensors(&path, &tensors, None).unwrap();
    let names: Vec<String> = load_safetensors(&path)
        .unwrap()
        .into_iter()
        .map(|(n, _)| n)
        .collect();
    assert_eq!(
        names,
        vec!["bn.running_mean", "bn.running_var", "conv.weight", "fc.bias"]
    );
}
