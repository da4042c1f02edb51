//! Property tests for the YAML schema
//!
//! Round-trip serialization and validation boundaries.

#[cfg(test)]
mod tests {
    use crate::config::schema::QuantSpec;
    use crate::config::validate::{validate_config, ValidationError};
    use crate::quant::QuantScheme;
    use proptest::prelude::*;

    fn arb_scheme() -> impl Strategy<Value = QuantScheme> {
        prop::sample::select(QuantScheme::ALL.to_vec())
    }

    fn arb_spec() -> impl Strategy<Value = QuantSpec> {
        (
            arb_scheme(),
            1u32..33,
            1u32..33,
            1u32..17,
            0.0f32..0.5,
            1usize..100,
        )
            .prop_map(
                |(scheme, param_bits, bn_bits, fwd_bits, overflow_rate, calibration_batches)| {
                    QuantSpec {
                        scheme,
                        param_bits,
                        bn_bits,
                        fwd_bits,
                        overflow_rate,
                        calibration_batches,
                    }
                },
            )
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(200))]

        #[test]
        fn prop_yaml_round_trip(spec in arb_spec()) {
            let yaml = serde_yaml::to_string(&spec).unwrap();
            let back: QuantSpec = serde_yaml::from_str(&yaml).unwrap();
            prop_assert_eq!(back, spec);
        }

        #[test]
        fn prop_json_round_trip(spec in arb_spec()) {
            let json = serde_json::to_string(&spec).unwrap();
            let back: QuantSpec = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, spec);
        }

        #[test]
        fn prop_generated_specs_validate(spec in arb_spec()) {
            prop_assert!(validate_config(&spec).is_ok());
        }

        #[test]
        fn prop_overflow_rate_outside_range_rejected(rate in prop_oneof![-10.0f32..-1e-6, 1.0f32..10.0]) {
            let spec = QuantSpec { overflow_rate: rate, ..Default::default() };
            prop_assert_eq!(validate_config(&spec), Err(ValidationError::InvalidOverflowRate(rate)));
        }

        #[test]
        fn prop_derived_configs_mirror_spec(spec in arb_spec()) {
            let w = spec.weight_config();
            prop_assert_eq!(w.param_bits, spec.param_bits);
            prop_assert_eq!(w.scheme, spec.scheme);
            let a = spec.activation_config();
            prop_assert_eq!(a.bits, spec.fwd_bits);
            prop_assert_eq!(a.counter, spec.calibration_batches);
            prop_assert!(a.validate().is_ok());
        }
    }
}
