//! Round-trip and determinism properties for the topology compiler, run as
//! crate-level integration tests rather than unit tests since they exercise
//! the full `compile` pipeline end to end.

use ncp_compiler::{compile, ClusterDescriptor, TopologyDoc};
use ncp_layout::neuron_entry::decode_table;

fn explicit_topology(seed: u64) -> TopologyDoc {
    serde_json::from_value(serde_json::json!({
        "network_name": "explicit-only",
        "neuron_count": 3,
        "layers": [
            { "layer_id": 0, "layer_type": "input", "neuron_ids": [0, 2] }
        ],
        "connections": [
            { "source_neuron": 0, "target_neuron": 2, "connection_type": "explicit", "weight": 0.5 },
            { "source_neuron": 1, "target_neuron": 2, "connection_type": "explicit", "weight": -0.25 }
        ],
        "node_assignment": { "strategy": "balanced", "nodes": [0], "backplane": "bp0", "seed": seed }
    }))
    .unwrap()
}

#[test]
fn compiling_the_same_topology_twice_is_byte_identical() {
    let topology = explicit_topology(7);
    let plan_a = compile(&topology, None).unwrap();
    let plan_b = compile(&topology, None).unwrap();
    assert_eq!(plan_a.tables, plan_b.tables);
}

#[test]
fn explicit_synapses_round_trip_through_the_wire_table() {
    let topology = explicit_topology(1);
    let plan = compile(&topology, None).unwrap();
    let table = plan.table_for("bp0", 0).unwrap();
    let entries = decode_table(table).unwrap();

    let target = entries.iter().find(|e| e.local_id == 2).unwrap();
    assert_eq!(target.synapses.len(), 2);
}

#[test]
fn cluster_descriptor_caps_nodes_per_backplane() {
    let topology = explicit_topology(1);
    let cluster = ClusterDescriptor {
        backplanes: vec![ncp_compiler::types::BackplaneDescriptor {
            name: "bp0".to_string(),
            node_count: 20,
        }],
    };
    let result = compile(&topology, Some(&cluster));
    assert!(result.is_err());
}

#[test]
fn every_table_ends_with_the_end_marker() {
    let topology = explicit_topology(1);
    let plan = compile(&topology, None).unwrap();
    for bytes in plan.tables.values() {
        assert_eq!(bytes.len() % ncp_layout::neuron_entry::ENTRY_SIZE, 0);
        let last_block = &bytes[bytes.len() - ncp_layout::neuron_entry::ENTRY_SIZE..];
        let marker = u16::from_le_bytes([last_block[0], last_block[1]]);
        assert_eq!(marker, 0xFFFF);
    }
}
