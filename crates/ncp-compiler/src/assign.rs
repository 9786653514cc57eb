//! Neuron-to-node partitioning strategies

use crate::error::{CompileError, Result};
use crate::types::{AssignmentStrategy, ClusterDescriptor, LayerDef, NodeAssignmentDef};
use ncp_layout::NodeId;

/// One physical node available for assignment
#[derive(Debug, Clone)]
pub struct PhysicalNode {
    /// Owning backplane name
    pub backplane: String,
    /// Node id within the backplane
    pub id: NodeId,
}

/// Resolve the list of physical nodes available for this deployment, from
/// either an explicit cluster descriptor or the assignment document's own
/// `nodes`/`backplane` fields, defaulting to a single-backplane assignment.
pub fn resolve_available_nodes(
    assignment: &NodeAssignmentDef,
    cluster: Option<&ClusterDescriptor>,
) -> Result<Vec<PhysicalNode>> {
    if let Some(cluster) = cluster {
        let mut nodes = Vec::new();
        for bp in &cluster.backplanes {
            if bp.node_count > NodeId::MAX_PER_BACKPLANE as u32 {
                return Err(CompileError::TooManyNodes {
                    name: bp.name.clone(),
                    requested: bp.node_count,
                    limit: NodeId::MAX_PER_BACKPLANE as u32,
                });
            }
            for id in 0..bp.node_count {
                nodes.push(PhysicalNode {
                    backplane: bp.name.clone(),
                    id: NodeId::new(id as u8),
                });
            }
        }
        if nodes.is_empty() {
            return Err(CompileError::NoAvailableNodes);
        }
        return Ok(nodes);
    }

    let backplane = assignment
        .backplane
        .clone()
        .unwrap_or_else(|| "backplane0".to_string());
    let ids: Vec<u32> = assignment
        .nodes
        .clone()
        .unwrap_or_else(|| (0..NodeId::MAX_PER_BACKPLANE as u32).collect());
    if ids.is_empty() {
        return Err(CompileError::NoAvailableNodes);
    }
    Ok(ids
        .into_iter()
        .map(|id| PhysicalNode {
            backplane: backplane.clone(),
            id: NodeId::new(id as u8),
        })
        .collect())
}

/// A neuron's assignment: its physical location and which node-local slot it
/// will occupy (assigned sequentially as neurons are placed).
#[derive(Debug, Clone)]
pub struct Assignment {
    /// Global neuron id
    pub global_id: u32,
    /// Physical node it lands on
    pub node: PhysicalNode,
}

/// Partition every neuron referenced by `layers` across `nodes` per `strategy`.
///
/// Returns assignments in ascending global-id order; the caller derives each
/// neuron's `local_id` from its position within its node's assignment list.
pub fn assign_neurons(
    layers: &[LayerDef],
    nodes: &[PhysicalNode],
    strategy: AssignmentStrategy,
) -> Result<Vec<Assignment>> {
    if nodes.is_empty() {
        return Err(CompileError::NoAvailableNodes);
    }

    validate_layer_spans(layers)?;

    match strategy {
        AssignmentStrategy::Balanced => assign_balanced(layers, nodes),
        AssignmentStrategy::LayerBased => assign_layer_based(layers, nodes),
    }
}

fn validate_layer_spans(layers: &[LayerDef]) -> Result<()> {
    let mut spans: Vec<(u32, u32)> = layers.iter().map(|l| l.neuron_ids).collect();
    spans.sort_unstable();
    let mut expected_start = 0u32;
    for (start, end) in &spans {
        if *start != expected_start {
            return Err(CompileError::non_contiguous(format!(
                "expected layer span to start at {expected_start}, found {start}"
            )));
        }
        if end < start {
            return Err(CompileError::non_contiguous(format!(
                "layer span end {end} precedes start {start}"
            )));
        }
        expected_start = end + 1;
    }
    Ok(())
}

fn assign_balanced(layers: &[LayerDef], nodes: &[PhysicalNode]) -> Result<Vec<Assignment>> {
    let total_neurons: u32 = layers
        .iter()
        .map(|l| l.neuron_ids.1 - l.neuron_ids.0 + 1)
        .sum();
    let k = nodes.len() as u32;
    let base = total_neurons / k;
    let remainder = total_neurons % k;

    // Node `i` gets `base` neurons, plus one more if `i < remainder`.
    let mut per_node_capacity: Vec<u32> = (0..k)
        .map(|i| base + if i < remainder { 1 } else { 0 })
        .collect();

    let mut assignments = Vec::with_capacity(total_neurons as usize);
    let mut node_idx = 0usize;
    for layer in layers {
        for global_id in layer.neuron_ids.0..=layer.neuron_ids.1 {
            while per_node_capacity[node_idx] == 0 {
                node_idx += 1;
            }
            per_node_capacity[node_idx] -= 1;
            assignments.push(Assignment {
                global_id,
                node: nodes[node_idx].clone(),
            });
        }
    }
    Ok(assignments)
}

fn assign_layer_based(layers: &[LayerDef], nodes: &[PhysicalNode]) -> Result<Vec<Assignment>> {
    let mut assignments = Vec::new();
    for (i, layer) in layers.iter().enumerate() {
        let node = &nodes[i % nodes.len()];
        for global_id in layer.neuron_ids.0..=layer.neuron_ids.1 {
            assignments.push(Assignment {
                global_id,
                node: node.clone(),
            });
        }
    }
    Ok(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LayerType;

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

    fn nodes(n: usize) -> Vec<PhysicalNode> {
        (0..n)
            .map(|i| PhysicalNode {
                backplane: "bp".into(),
                id: NodeId::new(i as u8),
            })
            .collect()
    }

    #[test]
    fn balanced_splits_evenly_with_remainder_round_robin() {
        let layers = vec![layer(0, 0, 9)];
        let nodes = nodes(3);
        let assignments = assign_neurons(&layers, &nodes, AssignmentStrategy::Balanced).unwrap();
        let mut counts = [0u32; 3];
        for a in &assignments {
            counts[a.node.id.raw() as usize] += 1;
        }
        assert_eq!(counts, [4, 3, 3]);
    }

    #[test]
    fn layer_based_round_robins_whole_layers() {
        let layers = vec![layer(0, 0, 1), layer(1, 2, 3), layer(2, 4, 5)];
        let nodes = nodes(2);
        let assignments =
            assign_neurons(&layers, &nodes, AssignmentStrategy::LayerBased).unwrap();
        assert_eq!(assignments[0].node.id, NodeId::new(0));
        assert_eq!(assignments[2].node.id, NodeId::new(1));
        assert_eq!(assignments[4].node.id, NodeId::new(0));
    }

    #[test]
    fn non_contiguous_layers_rejected() {
        let layers = vec![layer(0, 0, 1), layer(1, 3, 4)];
        let nodes = nodes(1);
        assert!(matches!(
            assign_neurons(&layers, &nodes, AssignmentStrategy::Balanced),
            Err(CompileError::NonContiguousLayers { .. })
        ));
    }

    proptest::proptest! {
        #[test]
        fn balanced_assigns_every_neuron_exactly_once_within_one_of_floor(
            neuron_count in 1u32..500,
            node_count in 1usize..17,
        ) {
            let layers = vec![layer(0, 0, neuron_count - 1)];
            let nodes = nodes(node_count);
            let assignments =
                assign_neurons(&layers, &nodes, AssignmentStrategy::Balanced).unwrap();

            proptest::prop_assert_eq!(assignments.len() as u32, neuron_count);

            let mut seen: Vec<bool> = vec![false; neuron_count as usize];
            let mut counts = vec![0u32; node_count];
            for a in &assignments {
                proptest::prop_assert!(!seen[a.global_id as usize], "neuron assigned twice");
                seen[a.global_id as usize] = true;
                counts[a.node.id.raw() as usize] += 1;
            }

            let base = neuron_count / node_count as u32;
            for count in counts {
                proptest::prop_assert!(count == base || count == base + 1);
            }
        }
    }
}
