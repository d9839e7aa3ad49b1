//! Dinic max-flow and min-cut over a network with `f64` capacities.
//!
//! Capacities use two sentinels: `f64::INFINITY` for structural edges that
//! must never be cut, and `f64::MIN_POSITIVE` for edges that are free to cut
//! but must stay cuttable. Infinity is absorbing under the residual updates
//! (`inf - finite = inf`), and an augmenting path made only of infinite edges
//! is reported as an error instead of being pushed.
//!
//! Neighbor lists keep insertion order and the blocking-flow scan walks them
//! in that order, so equal-capacity tie-breaks are deterministic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Some source-sink path crosses only infinite capacities, so no finite
    /// cut separates the two.
    #[error("no finite-capacity cut separates source from sink")]
    InfiniteCut,
}

#[derive(Debug, Clone, Copy)]
struct FlowEdge {
    to: usize,
    cap: f64,
}

/// A flow network. Edges are stored as interleaved forward/backward pairs,
/// so edge `e` and its reverse `e ^ 1` always travel together.
#[derive(Debug)]
pub struct Dinic {
    adj: Vec<Vec<usize>>,
    edges: Vec<FlowEdge>,
}

impl Dinic {
    pub fn new(num_nodes: usize) -> Self {
        Dinic {
            adj: vec![Vec::new(); num_nodes],
            edges: Vec::new(),
        }
    }

    /// Add a directed edge. Capacity must be positive (`f64::INFINITY` for
    /// uncuttable edges, `f64::MIN_POSITIVE` for cuttable zero-cost edges).
    pub fn add_edge(&mut self, from: usize, to: usize, cap: f64) {
        assert!(cap > 0.0, "edge capacity must be positive");
        let id = self.edges.len();
        self.edges.push(FlowEdge { to, cap });
        self.edges.push(FlowEdge { to: from, cap: 0.0 });
        self.adj[from].push(id);
        self.adj[to].push(id + 1);
    }

    /// BFS level graph over residual edges.
    fn levels(&self, source: usize, sink: usize) -> Option<Vec<u32>> {
        let mut level = vec![u32::MAX; self.adj.len()];
        let mut queue = std::collections::VecDeque::new();
        level[source] = 0;
        queue.push_back(source);
        while let Some(u) = queue.pop_front() {
            for &eid in &self.adj[u] {
                let edge = self.edges[eid];
                if edge.cap > 0.0 && level[edge.to] == u32::MAX {
                    level[edge.to] = level[u] + 1;
                    queue.push_back(edge.to);
                }
            }
        }
        (level[sink] != u32::MAX).then_some(level)
    }

    /// One augmenting step of the blocking flow.
    fn augment(
        &mut self,
        u: usize,
        sink: usize,
        pushed: f64,
        level: &[u32],
        iter: &mut [usize],
    ) -> f64 {
        if u == sink {
            return pushed;
        }
        while iter[u] < self.adj[u].len() {
            let eid = self.adj[u][iter[u]];
            let FlowEdge { to, cap } = self.edges[eid];
            if cap > 0.0 && level[to] == level[u] + 1 {
                let flow = self.augment(to, sink, pushed.min(cap), level, iter);
                if flow > 0.0 {
                    self.edges[eid].cap -= flow;
                    self.edges[eid ^ 1].cap += flow;
                    return flow;
                }
            }
            iter[u] += 1;
        }
        0.0
    }

    /// Run Dinic to completion and return the max-flow value.
    pub fn max_flow(&mut self, source: usize, sink: usize) -> Result<f64, FlowError> {
        let mut total = 0.0;
        while let Some(level) = self.levels(source, sink) {
            let mut iter = vec![0; self.adj.len()];
            loop {
                let flow = self.augment(source, sink, f64::INFINITY, &level, &mut iter);
                if flow == 0.0 {
                    break;
                }
                if flow.is_infinite() {
                    return Err(FlowError::InfiniteCut);
                }
                total += flow;
            }
        }
        Ok(total)
    }

    /// Compute the min source-sink cut: the saturated edges whose tail stays
    /// reachable from the source in the residual graph while their head does
    /// not. Only finite-capacity edges can show up here. Returned in edge
    /// insertion order as `(tail, head)` pairs.
    pub fn min_cut(&mut self, source: usize, sink: usize) -> Result<Vec<(usize, usize)>, FlowError> {
        self.max_flow(source, sink)?;

        let mut reachable = vec![false; self.adj.len()];
        let mut stack = vec![source];
        reachable[source] = true;
        while let Some(u) = stack.pop() {
            for &eid in &self.adj[u] {
                let edge = self.edges[eid];
                if edge.cap > 0.0 && !reachable[edge.to] {
                    reachable[edge.to] = true;
                    stack.push(edge.to);
                }
            }
        }

        let mut cut = Vec::new();
        for eid in (0..self.edges.len()).step_by(2) {
            let tail = self.edges[eid ^ 1].to;
            let head = self.edges[eid].to;
            if reachable[tail] && !reachable[head] {
                cut.push((tail, head));
            }
        }
        Ok(cut)
    }
}
