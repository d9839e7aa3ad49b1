//! Unit-delay static timing analysis.
//!
//! Forward propagation computes arrival times (longest path from any input,
//! every gate contributing one unit), backward propagation relaxes required
//! times down from the output deadline, and `slack = required - arrival`
//! marks the critical subgraph at zero.
//!
//! Nodes that do not reach any primary output keep an unconstrained required
//! time and therefore never look critical, no matter how deep their dangling
//! cone is.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{NodeId, Ntk, Result};

/// Arrival, required and slack of one node, in gate units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInfo {
    pub arrival: u32,
    pub required: u32,
    pub slack: u32,
}

/// Timing info for every input and gate of a netlist.
pub type SlackMap = HashMap<NodeId, TimeInfo>;

/// Required time of a node no output depends on.
const UNCONSTRAINED: u32 = u32::MAX;

/// One input-to-output path along the critical subgraph.
#[derive(Debug, Clone)]
pub struct CriticalPath {
    /// Node ids from a primary input to an output driver.
    pub nodes: Vec<NodeId>,
    /// The worst topological delay of the netlist the path was taken from.
    pub max_delay: u32,
}

fn arrival_times(ntk: &Ntk) -> Result<HashMap<NodeId, u32>> {
    let mut arrival: HashMap<NodeId, u32> = HashMap::with_capacity(ntk.node_count());
    arrival.insert(0, 0);
    for node in ntk.topo_sort_pi_node()? {
        let node = node.borrow();
        let at = if node.is_input() {
            0
        } else {
            1 + node
                .get_fanins()
                .iter()
                .map(|e| arrival[&e.get_node_id()])
                .max()
                .unwrap_or(0)
        };
        arrival.insert(node.get_id(), at);
    }
    Ok(arrival)
}

fn output_deadline(ntk: &Ntk, arrival: &HashMap<NodeId, u32>) -> u32 {
    ntk.get_outputs()
        .iter()
        .map(|o| arrival[&o.borrow().get_fanins()[0].get_node_id()])
        .max()
        .unwrap_or(0)
}

/// Worst topological delay over the primary outputs.
pub fn depth(ntk: &Ntk) -> Result<u32> {
    let arrival = arrival_times(ntk)?;
    Ok(output_deadline(ntk, &arrival))
}

/// Compute arrival, required and slack for every input and gate.
pub fn compute_slack(ntk: &Ntk) -> Result<SlackMap> {
    let topo = ntk.topo_sort_pi_node()?;
    let arrival = arrival_times(ntk)?;
    let deadline = output_deadline(ntk, &arrival);

    let mut required: HashMap<NodeId, u32> =
        topo.iter().map(|n| (n.borrow().get_id(), UNCONSTRAINED)).collect();
    for output in ntk.get_outputs() {
        let driver = output.borrow().get_fanins()[0].get_node_id();
        if let Some(r) = required.get_mut(&driver) {
            *r = (*r).min(deadline);
        }
    }
    for node in topo.iter().rev() {
        let node = node.borrow();
        if !node.is_gate() {
            continue;
        }
        let r = required[&node.get_id()];
        if r == UNCONSTRAINED {
            continue;
        }
        for fanin in node.get_fanins() {
            let fid = fanin.get_node_id();
            if let Some(fr) = required.get_mut(&fid) {
                *fr = (*fr).min(r - 1);
            }
        }
    }

    Ok(topo
        .iter()
        .map(|n| {
            let id = n.borrow().get_id();
            let (at, rt) = (arrival[&id], required[&id]);
            (
                id,
                TimeInfo {
                    arrival: at,
                    required: rt,
                    slack: rt.saturating_sub(at),
                },
            )
        })
        .collect())
}

/// Adjacency of the zero-slack subgraph: for every critical input or gate,
/// its critical gate fanouts. Keys follow topological order and neighbor
/// lists are in ascending id order, so iteration is deterministic.
pub fn critical_graph(ntk: &Ntk, slack: &SlackMap) -> Result<IndexMap<NodeId, Vec<NodeId>>> {
    let mut graph = IndexMap::new();
    for node in ntk.topo_sort_pi_node()? {
        let id = node.borrow().get_id();
        if slack[&id].slack != 0 {
            continue;
        }
        let vs: Vec<NodeId> = ntk
            .fanouts(id)
            .iter()
            .filter(|f| f.borrow().is_gate())
            .map(|f| f.borrow().get_id())
            .filter(|fid| slack[fid].slack == 0)
            .collect();
        graph.insert(id, vs);
    }
    Ok(graph)
}

/// Up to `k` critical input-to-output paths, for reporting.
pub fn critical_paths(ntk: &Ntk, k: usize) -> Result<Vec<CriticalPath>> {
    let slack = compute_slack(ntk)?;
    let max_delay = depth(ntk)?;
    let mut paths = Vec::new();

    // Backtrack from each critical output driver, following the fanins that
    // realize the arrival time.
    let mut drivers: Vec<NodeId> = ntk
        .get_outputs()
        .iter()
        .map(|o| o.borrow().get_fanins()[0].get_node_id())
        .filter(|id| slack.get(id).map(|t| t.slack) == Some(0))
        .collect();
    drivers.dedup();

    for driver in drivers {
        if paths.len() >= k {
            break;
        }
        let mut stack = vec![(driver, vec![driver])];
        while let Some((id, path)) = stack.pop() {
            if paths.len() >= k {
                break;
            }
            let node = ntk.get_node(id).expect("critical node is live");
            let node = node.borrow();
            if node.is_input() {
                let mut nodes = path.clone();
                nodes.reverse();
                paths.push(CriticalPath { nodes, max_delay });
                continue;
            }
            let at = slack[&id].arrival;
            for fanin in node.get_fanins() {
                let fid = fanin.get_node_id();
                if let Some(t) = slack.get(&fid) {
                    if t.slack == 0 && t.arrival + 1 == at {
                        let mut next = path.clone();
                        next.push(fid);
                        stack.push((fid, next));
                    }
                }
            }
        }
    }
    Ok(paths)
}
