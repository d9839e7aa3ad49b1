//! A step-at-a-time depth-first walk over fanin cones.
//!
//! [`Dfs::from_node`] walks the cone of a single node; [`Dfs::from_outputs`]
//! chains the cones of every output driver, skipping whatever an earlier cone
//! already covered, so together they enumerate exactly the observed part of
//! the netlist.
//!
//! Between calls to [`Dfs::next`] the walker owns nothing but plain node ids,
//! so the caller can inspect the netlist freely while iterating.

use std::collections::HashSet;

use crate::{NodeId, Ntk, NtkNode, NtkNodeRef};

pub struct Dfs {
    /// Ids waiting to be yielded. An id is recorded in `seen` the moment it
    /// is pushed, so nothing can enter the stack twice.
    stack: Vec<NodeId>,
    /// Everything ever pushed, yielded or not.
    seen: HashSet<NodeId>,
    /// Cone roots not started yet, consumed back to front. A root swallowed
    /// by an earlier cone is dropped instead of starting a new walk.
    starts: Vec<NodeId>,
}

impl Dfs {
    /// Walk the fanin cone of `start` and nothing else.
    pub fn from_node(start: &NtkNode) -> Self {
        let start_id = start.get_id();
        Dfs {
            stack: vec![start_id],
            seen: HashSet::from([start_id]),
            starts: Vec::new(),
        }
    }

    /// Walk every node observed by at least one primary output, one output
    /// cone at a time.
    pub fn from_outputs(ntk: &Ntk) -> Self {
        let mut ids: Vec<NodeId> = ntk
            .get_outputs()
            .iter()
            .map(|o| o.borrow().get_fanins()[0].get_node_id())
            .collect();
        ids.reverse();

        let mut dfs = Dfs {
            stack: Vec::new(),
            seen: HashSet::new(),
            starts: ids,
        };
        dfs.new_start();
        dfs
    }

    /// Seed the stack with the next unvisited cone root. False means every
    /// root is exhausted. Only legal while the stack is empty.
    fn new_start(&mut self) -> bool {
        assert!(self.stack.is_empty());

        while let Some(id) = self.starts.pop() {
            if self.seen.insert(id) {
                self.stack.push(id);
                return true;
            }
        }
        false
    }

    /// The next node of the walk, or None once everything reachable has been
    /// yielded. Built with [`Dfs::from_outputs`], this silently rolls over to
    /// the next output cone when the current one runs out.
    pub fn next(&mut self, ntk: &Ntk) -> Option<NtkNodeRef> {
        loop {
            while let Some(id) = self.stack.pop() {
                let node = ntk.get_node(id)?;
                for fanin in node.borrow().get_fanins() {
                    let fanin_id = fanin.get_node_id();
                    if self.seen.insert(fanin_id) {
                        self.stack.push(fanin_id);
                    }
                }
                return Some(node);
            }

            if !self.new_start() {
                return None;
            }
        }
    }
}
