//! A backplane: up to 16 nodes sharing a latency-modeled bus

use std::time::Instant;

use crate::error::{EmulatorError, Result};
use crate::node::Node;

/// Broadcast target sentinel, matching the bus protocol's reserved address
pub const BROADCAST_TARGET: u8 = 255;

/// A message in flight on the bus, aged until `latency` has elapsed
struct PendingMessage {
    source: u8,
    target: u8,
    command: u8,
    data: Vec<u8>,
    sent_at: Instant,
}

/// A single backplane: its nodes and the shared bus queue between them
pub struct Backplane {
    /// Backplane name
    pub name: String,
    nodes: Vec<Node>,
    pending: Vec<PendingMessage>,
    bus_latency_us: u64,
}

impl Backplane {
    /// Create a backplane with `node_count` freshly-booted nodes
    pub fn new(name: impl Into<String>, node_count: u8, bus_latency_us: u64) -> Self {
        let name = name.into();
        let nodes = (0..node_count).map(|id| Node::new(id, name.clone())).collect();
        Self {
            name,
            nodes,
            pending: Vec::new(),
            bus_latency_us,
        }
    }

    /// Number of nodes on this backplane
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes, in id order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Mutable access to all nodes
    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// A single node by id
    pub fn node(&self, id: u8) -> Result<&Node> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| EmulatorError::NodeNotFound {
                backplane: self.name.clone(),
                node_id: id,
            })
    }

    /// Mutable access to a single node by id
    pub fn node_mut(&mut self, id: u8) -> Result<&mut Node> {
        let name = self.name.clone();
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(EmulatorError::NodeNotFound {
                backplane: name,
                node_id: id,
            })
    }

    /// Queue a bus message from `source` to `target` (or [`BROADCAST_TARGET`])
    pub fn send(&mut self, source: u8, target: u8, command: u8, data: Vec<u8>) -> Result<()> {
        self.node_mut(source)?.record_message_sent();
        self.pending.push(PendingMessage {
            source,
            target,
            command,
            data,
            sent_at: Instant::now(),
        });
        Ok(())
    }

    /// Deliver every pending message that has aged past the bus latency.
    /// Messages that have not yet aged out keep their queue position.
    pub fn tick(&mut self) {
        let latency = self.bus_latency_us;
        let (ready, still_pending): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|m| m.sent_at.elapsed().as_micros() as u64 >= latency);
        self.pending = still_pending;

        for msg in ready {
            if msg.target == BROADCAST_TARGET {
                for node in self.nodes.iter_mut().filter(|n| n.id != msg.source) {
                    node.receive_message(msg.command, msg.data.clone());
                }
            } else if let Ok(node) = self.node_mut(msg.target) {
                node.receive_message(msg.command, msg.data);
            }
        }
    }

    /// Reset every node on this backplane
    pub fn reset_all(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
        self.pending.clear();
    }
}
