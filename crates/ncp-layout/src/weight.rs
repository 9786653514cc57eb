//! 8-bit synaptic weight quantization
//!
//! Positive weights occupy `[0, 127]` scaled by `63.5`; negative weights are
//! folded into `[128, 255]` by the same scale. The runtime decode is a single
//! uniform function (`dequantize`) used regardless of which branch produced
//! the byte -- this matches the emulator's engine, which never special-cases
//! the sign-encoded half when reading a synapse weight back out.

const SCALE: f32 = 63.5;

/// Quantize a signed weight in roughly `[-2.0, 2.0]` into a single byte.
///
/// Positive values round to `[0, 127]`; negative values round to `[128, 255]`.
pub fn quantize_signed(weight: f32) -> u8 {
    if weight >= 0.0 {
        let scaled = (weight * SCALE).round();
        scaled.clamp(0.0, 127.0) as u8
    } else {
        let scaled = 128.0 + (weight.abs() * SCALE).round();
        scaled.clamp(128.0, 255.0) as u8
    }
}

/// Quantize a weight already clamped to `[0.0, 1.0]` into the full unsigned
/// byte range, used for fully-connected layer synthesis.
pub fn quantize_unsigned(weight: f32) -> u8 {
    let clamped = weight.clamp(0.0, 1.0);
    (clamped * 255.0).round() as u8
}

/// Quantize a positive-only weight into the lower half of the byte range,
/// used for sparse/random connection synthesis.
pub fn quantize_positive(weight: f32) -> u8 {
    let clamped = weight.max(0.0);
    (clamped * SCALE).round().min(127.0) as u8
}

/// Decode a quantized byte back into a float weight, as the SNN engine does
/// at load time: a plain `byte / 255.0`, independent of which quantizer wrote it.
pub fn dequantize(byte: u8) -> f32 {
    byte as f32 / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn positive_round_trips_through_full_scale() {
        assert_eq!(quantize_unsigned(1.0), 255);
        assert_eq!(quantize_unsigned(0.0), 0);
    }

    #[test]
    fn positive_half_scale_caps_at_127() {
        assert_eq!(quantize_positive(5.0), 127);
        assert_eq!(quantize_positive(0.0), 0);
    }

    #[test]
    fn signed_negative_lands_in_upper_half() {
        let byte = quantize_signed(-1.0);
        assert!(byte >= 128);
    }

    #[test]
    fn signed_positive_lands_in_lower_half() {
        let byte = quantize_signed(0.5);
        assert!(byte <= 127);
    }

    #[test]
    fn dequantize_is_uniform_linear_decode() {
        assert_eq!(dequantize(255), 1.0);
        assert_eq!(dequantize(0), 0.0);
    }

    proptest! {
        #[test]
        fn dequantize_stays_in_unit_range(byte in any::<u8>()) {
            let weight = dequantize(byte);
            prop_assert!((0.0..=1.0).contains(&weight));
        }

        #[test]
        fn quantize_unsigned_round_trips_within_one_step(weight in 0.0f32..=1.0) {
            let decoded = dequantize(quantize_unsigned(weight));
            prop_assert!((decoded - weight).abs() <= 1.0 / 255.0);
        }
    }
}
