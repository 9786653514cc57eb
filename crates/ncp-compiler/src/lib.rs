//! Compiles an SNN topology document into a per-node [`DeploymentPlan`].
//!
//! The pipeline is synchronous and pure: given the same topology, cluster
//! descriptor, and RNG seed, it produces byte-identical tables every time.
//! Compilation fails loud -- a malformed topology never produces a partial
//! plan.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod assign;
pub mod error;
pub mod plan;
pub mod synth;
pub mod types;

use std::collections::HashMap;

use ncp_layout::neuron_entry::{encode_table, NeuronEntry, SynapseWord, MAX_SYNAPSES};
use ncp_layout::{GlobalNeuronId, NeuronFlags};
use rand::SeedableRng;
use rand::rngs::StdRng;

pub use error::{CompileError, Result};
pub use plan::{DeploymentPlan, PhysicalNeuron};
pub use types::{ClusterDescriptor, TopologyDoc};

use assign::{assign_neurons, resolve_available_nodes};
use synth::{synthesize, Quantization, RawSynapse};
use types::LayerType;

const DEFAULT_THRESHOLD: f32 = 1.0;
const DEFAULT_LEAK_RATE: f32 = 0.95;
const DEFAULT_REFRACTORY_US: u32 = 1000;

/// Compile a topology document into a deployment plan.
///
/// `cluster` supplies the available physical nodes; when absent, the
/// topology's own `node_assignment.nodes`/`backplane` fields (or an
/// all-16-node default) are used instead.
pub fn compile(topology: &TopologyDoc, cluster: Option<&ClusterDescriptor>) -> Result<DeploymentPlan> {
    let nodes = resolve_available_nodes(&topology.node_assignment, cluster)?;
    let assignments = assign_neurons(
        &topology.layers,
        &nodes,
        topology.node_assignment.strategy,
    )?;

    // local_id is the neuron's position within its node's assignment list.
    let mut local_counters: HashMap<(String, u8), u16> = HashMap::new();
    let mut neuron_map: HashMap<u32, PhysicalNeuron> = HashMap::new();
    let mut neurons_per_node: HashMap<(String, u8), Vec<u32>> = HashMap::new();

    for assignment in &assignments {
        let key = (assignment.node.backplane.clone(), assignment.node.id.raw());
        let local_id = {
            let counter = local_counters.entry(key.clone()).or_insert(0);
            let id = *counter;
            *counter += 1;
            id
        };
        neuron_map.insert(
            assignment.global_id,
            PhysicalNeuron {
                backplane: assignment.node.backplane.clone(),
                node: assignment.node.id,
                local_id,
            },
        );
        neurons_per_node
            .entry(key)
            .or_default()
            .push(assignment.global_id);
    }

    let seed = topology.node_assignment.seed.unwrap_or(0);
    let mut rng = StdRng::seed_from_u64(seed);
    let raw_synapses = synthesize(&topology.connections, &topology.layers, &mut rng)?;

    let mut synapses_by_target: HashMap<u32, Vec<&RawSynapse>> = HashMap::new();
    for syn in &raw_synapses {
        synapses_by_target.entry(syn.target).or_default().push(syn);
    }

    let mut tables: HashMap<(String, u8), Vec<u8>> = HashMap::new();
    let mut backplane_nodes: HashMap<String, Vec<u8>> = HashMap::new();
    let mut total_synapses = 0usize;

    for (key, mut global_ids) in neurons_per_node {
        global_ids.sort_unstable_by_key(|g| neuron_map[g].local_id);

        let mut entries = Vec::with_capacity(global_ids.len());
        for global_id in &global_ids {
            let entry = build_entry(*global_id, &topology.layers, &neuron_map, &synapses_by_target)?;
            total_synapses += entry.synapses.len();
            entries.push(entry);
        }

        let bytes = encode_table(&entries).map_err(|source| CompileError::Layout {
            global_id: global_ids.first().copied().unwrap_or(0),
            source,
        })?;
        tables.insert(key.clone(), bytes);
        backplane_nodes.entry(key.0).or_default().push(key.1);
    }

    for nodes in backplane_nodes.values_mut() {
        nodes.sort_unstable();
    }

    Ok(DeploymentPlan {
        neuron_count: neuron_map.len(),
        synapse_count: total_synapses,
        tables,
        neuron_map,
        backplane_nodes,
    })
}

fn find_layer<'a>(layers: &'a [types::LayerDef], global_id: u32) -> Option<&'a types::LayerDef> {
    layers
        .iter()
        .find(|l| global_id >= l.neuron_ids.0 && global_id <= l.neuron_ids.1)
}

fn build_entry(
    global_id: u32,
    layers: &[types::LayerDef],
    neuron_map: &HashMap<u32, PhysicalNeuron>,
    synapses_by_target: &HashMap<u32, Vec<&RawSynapse>>,
) -> Result<NeuronEntry> {
    let physical = neuron_map
        .get(&global_id)
        .cloned()
        .ok_or(CompileError::UnmappedNeuron { global_id })?;
    let layer = find_layer(layers, global_id);

    let mut flags = NeuronFlags::ACTIVE;
    if let Some(layer) = layer {
        match layer.layer_type {
            LayerType::Input => flags = flags | NeuronFlags::INPUT,
            LayerType::Output => flags = flags | NeuronFlags::OUTPUT,
            LayerType::Hidden => {}
        }
    }

    let threshold = layer.and_then(|l| l.threshold).unwrap_or(DEFAULT_THRESHOLD);
    let leak_rate = layer.and_then(|l| l.leak_rate).unwrap_or(DEFAULT_LEAK_RATE);
    let refractory_period_us = layer
        .and_then(|l| l.refractory_period_us)
        .unwrap_or(DEFAULT_REFRACTORY_US);

    let mut synapses = Vec::new();
    if let Some(raw) = synapses_by_target.get(&global_id) {
        for syn in raw {
            if synapses.len() >= MAX_SYNAPSES {
                tracing::warn!(
                    neuron = global_id,
                    "synapse capacity reached, dropping remaining synapses"
                );
                break;
            }
            let source_physical = neuron_map.get(&syn.source).ok_or(
                CompileError::UnresolvedSynapseSource { source_id: syn.source },
            )?;
            if source_physical.backplane != physical.backplane {
                return Err(CompileError::UnresolvedSynapseSource { source_id: syn.source });
            }
            let source_encoded =
                GlobalNeuronId::encode(source_physical.node, source_physical.local_id).raw();
            let weight = match syn.quantization {
                Quantization::Unsigned => ncp_layout::weight::quantize_unsigned(syn.weight),
                Quantization::Positive => ncp_layout::weight::quantize_positive(syn.weight),
                Quantization::Signed => ncp_layout::weight::quantize_signed(syn.weight),
            };
            synapses.push(SynapseWord {
                source_encoded,
                weight,
            });
        }
    }

    Ok(NeuronEntry {
        local_id: physical.local_id,
        flags,
        membrane_potential: 0.0,
        threshold,
        last_spike_time_us: 0,
        leak_rate,
        refractory_period_us,
        synapses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::*;

    fn minimal_topology() -> TopologyDoc {
        TopologyDoc {
            network_name: "xor".into(),
            neuron_count: 4,
            layers: vec![
                LayerDef {
                    layer_id: 0,
                    layer_type: LayerType::Input,
                    neuron_ids: (0, 1),
                    threshold: None,
                    leak_rate: None,
                    refractory_period_us: None,
                },
                LayerDef {
                    layer_id: 1,
                    layer_type: LayerType::Hidden,
                    neuron_ids: (2, 2),
                    threshold: Some(1.0),
                    leak_rate: None,
                    refractory_period_us: None,
                },
                LayerDef {
                    layer_id: 2,
                    layer_type: LayerType::Output,
                    neuron_ids: (3, 3),
                    threshold: None,
                    leak_rate: None,
                    refractory_period_us: None,
                },
            ],
            connections: vec![
                ConnectionDef {
                    source_layer: None,
                    target_layer: None,
                    source_neuron: Some(0),
                    target_neuron: Some(2),
                    weight: Some(0.7),
                    connection_type: ConnectionType::Explicit,
                    weight_init: None,
                    weight_range: None,
                    connection_probability: None,
                },
                ConnectionDef {
                    source_layer: None,
                    target_layer: None,
                    source_neuron: Some(1),
                    target_neuron: Some(2),
                    weight: Some(0.7),
                    connection_type: ConnectionType::Explicit,
                    weight_init: None,
                    weight_range: None,
                    connection_probability: None,
                },
                ConnectionDef {
                    source_layer: None,
                    target_layer: None,
                    source_neuron: Some(2),
                    target_neuron: Some(3),
                    weight: Some(1.0),
                    connection_type: ConnectionType::Explicit,
                    weight_init: None,
                    weight_range: None,
                    connection_probability: None,
                },
            ],
            node_assignment: NodeAssignmentDef {
                strategy: AssignmentStrategy::Balanced,
                nodes: Some(vec![0, 1]),
                backplane: Some("bp0".into()),
                seed: Some(7),
            },
        }
    }

    #[test]
    fn xor_minimal_compile_assigns_two_nodes() {
        let plan = compile(&minimal_topology(), None).unwrap();
        assert_eq!(plan.neuron_count, 4);
        assert_eq!(plan.tables.len(), 2);
        for bytes in plan.tables.values() {
            assert_eq!(bytes.len(), 256 * 3); // 2 neurons + end marker
        }
    }

    #[test]
    fn empty_topology_compiles_to_marker_only_tables() {
        let topology = TopologyDoc {
            network_name: "empty".into(),
            neuron_count: 0,
            layers: vec![],
            connections: vec![],
            node_assignment: NodeAssignmentDef {
                strategy: AssignmentStrategy::Balanced,
                nodes: Some(vec![0]),
                backplane: Some("bp0".into()),
                seed: None,
            },
        };
        let plan = compile(&topology, None).unwrap();
        assert_eq!(plan.neuron_count, 0);
        assert_eq!(plan.tables[&("bp0".to_string(), 0)].len(), 256);
    }

    #[test]
    fn determinism_same_seed_same_bytes() {
        let plan_a = compile(&minimal_topology(), None).unwrap();
        let plan_b = compile(&minimal_topology(), None).unwrap();
        for key in plan_a.tables.keys() {
            assert_eq!(plan_a.tables[key], plan_b.tables[key]);
        }
    }

    #[test]
    fn synapse_list_of_61_drops_the_last_one_silently() {
        let mut topology = minimal_topology();
        topology.connections.clear();
        topology.layers = vec![
            LayerDef {
                layer_id: 0,
                layer_type: LayerType::Input,
                neuron_ids: (0, 61),
                threshold: None,
                leak_rate: None,
                refractory_period_us: None,
            },
            LayerDef {
                layer_id: 1,
                layer_type: LayerType::Output,
                neuron_ids: (62, 62),
                threshold: None,
                leak_rate: None,
                refractory_period_us: None,
            },
        ];
        topology.neuron_count = 63;
        topology.node_assignment.nodes = Some(vec![0]);
        for source in 0..61 {
            topology.connections.push(ConnectionDef {
                source_layer: None,
                target_layer: None,
                source_neuron: Some(source),
                target_neuron: Some(62),
                weight: Some(0.5),
                connection_type: ConnectionType::Explicit,
                weight_init: None,
                weight_range: None,
                connection_probability: None,
            });
        }
        let plan = compile(&topology, None).unwrap();
        let key = ("bp0".to_string(), 0u8);
        let bytes = &plan.tables[&key];
        let entries = ncp_layout::neuron_entry::decode_table(bytes).unwrap();
        let target = entries.iter().find(|e| e.local_id == 61).unwrap();
        assert_eq!(target.synapses.len(), MAX_SYNAPSES);
    }

    #[test]
    fn unresolved_synapse_source_is_hard_error() {
        let mut topology = minimal_topology();
        topology.connections = vec![ConnectionDef {
            source_layer: None,
            target_layer: None,
            source_neuron: Some(999),
            target_neuron: Some(2),
            weight: Some(0.5),
            connection_type: ConnectionType::Explicit,
            weight_init: None,
            weight_range: None,
            connection_probability: None,
        }];
        assert!(matches!(
            compile(&topology, None),
            Err(CompileError::UnresolvedSynapseSource { .. })
        ));
    }
}
