//! Connection synthesis: expands [`ConnectionDef`] rules into individual synapses

use crate::error::{CompileError, Result};
use crate::types::{ConnectionDef, ConnectionType, LayerDef, WeightInit};
use rand::rngs::StdRng;
use rand::Rng;

/// A single synthesized synapse before quantization: global source/target ids
/// and a float weight, plus which quantization scale it should use.
#[derive(Debug, Clone, Copy)]
pub struct RawSynapse {
    /// Global id of the presynaptic neuron
    pub source: u32,
    /// Global id of the postsynaptic neuron
    pub target: u32,
    /// Float weight before quantization
    pub weight: f32,
    /// Which quantization scale this synapse's weight should use
    pub quantization: Quantization,
}

/// Which byte-quantization scale a synapse's weight should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantization {
    /// Full unsigned range, used by fully-connected synthesis
    Unsigned,
    /// Half range, positive-only, used by sparse/random synthesis
    Positive,
    /// Signed half-range encoding, used by explicit connections
    Signed,
}

fn layer_span(layers: &[LayerDef], layer_id: u32) -> Result<(u32, u32)> {
    layers
        .iter()
        .find(|l| l.layer_id == layer_id)
        .map(|l| l.neuron_ids)
        .ok_or(CompileError::UnknownLayer { layer_id })
}

fn sample_weight(init: Option<&WeightInit>, rng: &mut StdRng) -> f32 {
    match init {
        Some(WeightInit::RandomNormal {
            weight_mean,
            weight_stddev,
        }) => {
            // Box-Muller, matching the corpus's preference for `rand`'s
            // uniform sampling over pulling in a distributions crate for one use.
            let u1: f32 = rng.gen_range(1e-6..1.0);
            let u2: f32 = rng.gen_range(0.0..1.0);
            let z = (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos();
            (weight_mean + z * weight_stddev).clamp(0.0, 1.0)
        }
        Some(WeightInit::RandomUniform {
            weight_min,
            weight_max,
        }) => rng.gen_range(*weight_min..=*weight_max),
        Some(WeightInit::Constant { weight }) => *weight,
        None => 1.0,
    }
}

/// Expand every connection rule in `connections` into raw synapses
pub fn synthesize(
    connections: &[ConnectionDef],
    layers: &[LayerDef],
    rng: &mut StdRng,
) -> Result<Vec<RawSynapse>> {
    let mut out = Vec::new();
    for conn in connections {
        match conn.connection_type {
            ConnectionType::FullyConnected => synth_fully_connected(conn, layers, rng, &mut out)?,
            ConnectionType::SparseRandom | ConnectionType::Random => {
                synth_sparse_random(conn, layers, rng, &mut out)?
            }
            ConnectionType::Explicit => synth_explicit(conn, &mut out)?,
        }
    }
    Ok(out)
}

fn synth_fully_connected(
    conn: &ConnectionDef,
    layers: &[LayerDef],
    rng: &mut StdRng,
    out: &mut Vec<RawSynapse>,
) -> Result<()> {
    let (s0, s1) = layer_span(layers, conn.source_layer.ok_or(CompileError::UnknownLayer {
        layer_id: 0,
    })?)?;
    let (t0, t1) = layer_span(layers, conn.target_layer.ok_or(CompileError::UnknownLayer {
        layer_id: 0,
    })?)?;

    for source in s0..=s1 {
        for target in t0..=t1 {
            let weight = sample_weight(conn.weight_init.as_ref(), rng);
            out.push(RawSynapse {
                source,
                target,
                weight,
                quantization: Quantization::Unsigned,
            });
        }
    }
    Ok(())
}

fn synth_sparse_random(
    conn: &ConnectionDef,
    layers: &[LayerDef],
    rng: &mut StdRng,
    out: &mut Vec<RawSynapse>,
) -> Result<()> {
    let (s0, s1) = layer_span(layers, conn.source_layer.ok_or(CompileError::UnknownLayer {
        layer_id: 0,
    })?)?;
    let (t0, t1) = layer_span(layers, conn.target_layer.ok_or(CompileError::UnknownLayer {
        layer_id: 0,
    })?)?;
    let probability = conn.connection_probability.unwrap_or(0.1);

    for source in s0..=s1 {
        for target in t0..=t1 {
            if rng.gen_range(0.0..1.0) > probability {
                continue;
            }
            let weight = if let Some((min, max)) = conn.weight_range {
                rng.gen_range(min..=max)
            } else {
                sample_weight(conn.weight_init.as_ref(), rng)
            };
            out.push(RawSynapse {
                source,
                target,
                weight,
                quantization: Quantization::Positive,
            });
        }
    }
    Ok(())
}

fn synth_explicit(conn: &ConnectionDef, out: &mut Vec<RawSynapse>) -> Result<()> {
    let source = conn.source_neuron.ok_or(CompileError::UnknownNeuron { neuron_id: 0 })?;
    let target = conn.target_neuron.ok_or(CompileError::UnknownNeuron { neuron_id: 0 })?;
    let weight = conn.weight.unwrap_or(1.0);
    out.push(RawSynapse {
        source,
        target,
        weight,
        quantization: Quantization::Signed,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LayerType;
    use rand::SeedableRng;

    fn layer(id: u32, start: u32, end: u32) -> LayerDef {
        LayerDef {
            layer_id: id,
            layer_type: LayerType::Hidden,
            neuron_ids: (start, end),
            threshold: None,
            leak_rate: None,
            refractory_period_us: None,
        }
    }

    #[test]
    fn fully_connected_produces_cartesian_product() {
        let layers = vec![layer(0, 0, 1), layer(1, 2, 3)];
        let conn = ConnectionDef {
            source_layer: Some(0),
            target_layer: Some(1),
            source_neuron: None,
            target_neuron: None,
            weight: None,
            connection_type: ConnectionType::FullyConnected,
            weight_init: None,
            weight_range: None,
            connection_probability: None,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let synapses = synthesize(&[conn], &layers, &mut rng).unwrap();
        assert_eq!(synapses.len(), 4);
        assert!(synapses.iter().all(|s| s.quantization == Quantization::Unsigned));
    }

    #[test]
    fn fully_connected_ignores_flat_weight_override() {
        let layers = vec![layer(0, 0, 0), layer(1, 1, 1)];
        let conn = ConnectionDef {
            source_layer: Some(0),
            target_layer: Some(1),
            source_neuron: None,
            target_neuron: None,
            weight: Some(0.5),
            connection_type: ConnectionType::FullyConnected,
            weight_init: Some(WeightInit::Constant { weight: 0.9 }),
            weight_range: None,
            connection_probability: None,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let synapses = synthesize(&[conn], &layers, &mut rng).unwrap();
        assert_eq!(synapses.len(), 1);
        assert_eq!(synapses[0].weight, 0.9);
    }

    #[test]
    fn explicit_connection_is_signed() {
        let conn = ConnectionDef {
            source_layer: None,
            target_layer: None,
            source_neuron: Some(0),
            target_neuron: Some(1),
            weight: Some(-0.5),
            connection_type: ConnectionType::Explicit,
            weight_init: None,
            weight_range: None,
            connection_probability: None,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let synapses = synthesize(&[conn], &[], &mut rng).unwrap();
        assert_eq!(synapses.len(), 1);
        assert_eq!(synapses[0].quantization, Quantization::Signed);
    }

    #[test]
    fn determinism_with_fixed_seed() {
        let layers = vec![layer(0, 0, 3), layer(1, 4, 7)];
        let conn = ConnectionDef {
            source_layer: Some(0),
            target_layer: Some(1),
            source_neuron: None,
            target_neuron: None,
            weight: None,
            connection_type: ConnectionType::SparseRandom,
            weight_init: None,
            weight_range: Some((0.1, 0.9)),
            connection_probability: Some(0.5),
        };
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let a = synthesize(&[conn.clone()], &layers, &mut rng_a).unwrap();
        let b = synthesize(&[conn], &layers, &mut rng_b).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.source, y.source);
            assert_eq!(x.target, y.target);
            assert_eq!(x.weight, y.weight);
        }
    }
}
