//! The mutable combinational netlist: [`Ntk`] and its building blocks
//! [`NtkNode`] and [`NtkEdge`].
//!
//! A netlist is a DAG of AND gates and inverter nodes over complemented
//! edges, with named inputs and output terminals. It is the substrate the
//! optimization engine in [`crate::dals`] rewrites; see [`crate::alc`] for
//! the do/undo mutation unit.

mod clone;
pub mod edge;
pub mod error;
mod integrity;
pub mod node;
mod parser;

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    rc::Rc,
};

pub use edge::NtkEdge;
pub use error::{NtkError, ParserError, Result};
pub(crate) use node::NtkNodeWeak;
pub use node::{NodeId, NtkNode, NtkNodeRef};

/// A whole netlist.
///
/// The netlist owns its nodes: a node stays in the table until [`Ntk::delete`]
/// removes it, even when nothing references it anymore. This is deliberate. An
/// undone rewrite must be able to point back at a node that temporarily lost
/// all its fanouts, so there is no automatic garbage collection here.
///
/// Fanin edges hold strong references child-ward and fanouts are weak
/// back-edges, so the reference graph of an acyclic netlist never leaks.
///
/// Note that [`Ntk::clone`] is not provided; use [`Ntk::deep_clone`] to copy a
/// netlist (new cells, same ids, names and orderings).
#[derive(Debug)]
pub struct Ntk {
    name: String,
    /// All live nodes, including the constant at id 0 and output terminals.
    nodes: BTreeMap<NodeId, NtkNodeRef>,
    /// Primary inputs in file order.
    inputs: Vec<NtkNodeRef>,
    /// Primary output terminals in file order.
    outputs: Vec<NtkNodeRef>,
    // Keep the constant node handy.
    node_const0: NtkNodeRef,

    /// Structural hashing
    /// ------------------
    /// `new_and` folds the trivial cases (x·0, x·1, x·x, x·!x) and reuses an
    /// existing gate when one with the same normalized fanin pair is live.
    /// The map is only consulted while a netlist is being built; mutation
    /// through `replace`/`set_fanins` leaves stale keys behind, which is fine
    /// because dead weak entries never resolve.
    strash: HashMap<(NodeId, bool, NodeId, bool), NtkNodeWeak>,
    next_id: NodeId,
}

impl Ntk {
    /// An empty netlist holding nothing but [`NtkNode::Const0`].
    pub fn new() -> Self {
        Self::with_name("top")
    }

    /// Same as [`Ntk::new`], with a model name for the BLIF writer.
    pub fn with_name(name: impl Into<String>) -> Self {
        let node_const0 = Rc::new(RefCell::new(NtkNode::Const0));
        let nodes = BTreeMap::from([(0, node_const0.clone())]);
        Ntk {
            name: name.into(),
            nodes,
            inputs: Vec::new(),
            outputs: Vec::new(),
            node_const0,
            strash: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Look up a live node by id.
    pub fn get_node(&self, id: NodeId) -> Option<NtkNodeRef> {
        self.nodes.get(&id).cloned()
    }

    /// The constant-0 node as an edge (complement it for constant 1).
    pub fn const_edge(&self) -> NtkEdge {
        NtkEdge::new(self.node_const0.clone(), false)
    }

    /// The primary inputs, in creation (file) order.
    pub fn get_inputs(&self) -> Vec<NtkNodeRef> {
        self.inputs.clone()
    }

    /// The primary input ids, in creation (file) order.
    pub fn get_input_ids(&self) -> Vec<NodeId> {
        self.inputs.iter().map(|n| n.borrow().get_id()).collect()
    }

    /// The output terminals, in creation (file) order.
    pub fn get_outputs(&self) -> Vec<NtkNodeRef> {
        self.outputs.clone()
    }

    /// The largest live node id.
    pub fn max_id(&self) -> NodeId {
        self.nodes.keys().next_back().copied().unwrap_or(0)
    }

    /// Number of live nodes, constant and output terminals included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns a fresh unused id.
    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The live fanouts of a node, in ascending id order.
    pub fn fanouts(&self, id: NodeId) -> Vec<NtkNodeRef> {
        self.get_node(id)
            .map(|n| {
                n.borrow()
                    .get_fanouts()
                    .values()
                    .filter_map(|weak| weak.upgrade())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True iff one of the node's fanouts is a primary output terminal.
    pub fn drives_output(&self, id: NodeId) -> bool {
        self.fanouts(id).iter().any(|f| f.borrow().is_output())
    }

    /// Create a new node within the netlist.
    ///
    /// This will fail if a node with the same id already exists, if a fanin
    /// refers to an unknown node, or if a node other than the constant uses
    /// id 0. Fanout back-edges of the fanins are registered here.
    ///
    /// ```rust
    /// use dals::{Ntk, NtkEdge, NtkNode};
    /// let mut ntk = Ntk::new();
    /// let a = ntk.add_input("a").unwrap();
    /// let b = ntk.add_input("b").unwrap();
    /// let g = ntk
    ///     .add_node(NtkNode::and(
    ///         3,
    ///         "g",
    ///         NtkEdge::new(a.clone(), false),
    ///         NtkEdge::new(b.clone(), true),
    ///     ))
    ///     .unwrap();
    /// assert_eq!(g.borrow().get_id(), 3);
    /// // Id 3 is taken now.
    /// assert!(ntk.add_node(NtkNode::input(3, "c")).is_err());
    /// ```
    pub fn add_node(&mut self, node: NtkNode) -> Result<NtkNodeRef> {
        if node.is_const() {
            return Ok(self.node_const0.clone());
        }
        let id = node.get_id();
        if id == 0 {
            return Err(NtkError::IdZeroButNotConst);
        }
        if self.nodes.contains_key(&id) {
            return Err(NtkError::DuplicateId(id));
        }
        for fanin in node.get_fanins() {
            let fid = fanin.get_node_id();
            if !self.nodes.contains_key(&fid) {
                return Err(NtkError::NodeDoesNotExist(fid));
            }
        }

        let n = Rc::new(RefCell::new(node));
        let weak = Rc::downgrade(&n);
        let mut registered = BTreeSet::new();
        for fanin in n.borrow().get_fanins() {
            if registered.insert(fanin.get_node_id()) {
                fanin.get_node().borrow_mut().add_fanout(id, weak.clone());
            }
        }
        match &*n.borrow() {
            NtkNode::Input { .. } => self.inputs.push(n.clone()),
            NtkNode::Output { .. } => self.outputs.push(n.clone()),
            _ => (),
        }
        self.nodes.insert(id, n.clone());
        self.next_id = self.next_id.max(id + 1);
        Ok(n)
    }

    /// Create a new primary input with a fresh id.
    pub fn add_input(&mut self, name: impl Into<String>) -> Result<NtkNodeRef> {
        let id = self.fresh_id();
        self.add_node(NtkNode::input(id, name))
    }

    /// Mark a signal as a primary output (creates the output terminal node).
    pub fn add_output(&mut self, name: impl Into<String>, fanin: NtkEdge) -> Result<NtkNodeRef> {
        let id = self.fresh_id();
        self.add_node(NtkNode::output(id, name, fanin))
    }

    fn strash_key(fanin0: &NtkEdge, fanin1: &NtkEdge) -> (NodeId, bool, NodeId, bool) {
        let a = (fanin0.get_node_id(), fanin0.get_complement());
        let b = (fanin1.get_node_id(), fanin1.get_complement());
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        (lo.0, lo.1, hi.0, hi.1)
    }

    /// Create a new AND gate, or fold/reuse an equivalent signal.
    ///
    /// Returns an *edge* rather than a node: trivial cases (x·0 = 0, x·1 = x,
    /// x·x = x, x·!x = 0) resolve to an existing signal, and a gate with the
    /// same normalized fanin pair is shared. The `name` hint is used only when
    /// a fresh gate is actually created.
    pub fn new_and(
        &mut self,
        name: Option<&str>,
        fanin0: NtkEdge,
        fanin1: NtkEdge,
    ) -> Result<NtkEdge> {
        for fanin in [&fanin0, &fanin1] {
            let fid = fanin.get_node_id();
            if !self.nodes.contains_key(&fid) {
                return Err(NtkError::NodeDoesNotExist(fid));
            }
        }

        if fanin0.is_const() {
            return Ok(if fanin0.get_complement() {
                fanin1
            } else {
                self.const_edge()
            });
        }
        if fanin1.is_const() {
            return Ok(if fanin1.get_complement() {
                fanin0
            } else {
                self.const_edge()
            });
        }
        if fanin0.get_node_id() == fanin1.get_node_id() {
            return Ok(if fanin0.get_complement() == fanin1.get_complement() {
                fanin0
            } else {
                self.const_edge()
            });
        }

        let key = Self::strash_key(&fanin0, &fanin1);
        if let Some(existing) = self.strash.get(&key).and_then(|weak| weak.upgrade()) {
            return Ok(NtkEdge::new(existing, false));
        }

        let id = self.fresh_id();
        let name = name
            .map(str::to_owned)
            .unwrap_or_else(|| format!("n{}", id));
        let node = self.add_node(NtkNode::and(id, name, fanin0, fanin1))?;
        self.strash.insert(key, Rc::downgrade(&node));
        Ok(NtkEdge::new(node, false))
    }

    /// Materialize an inverter node over the given signal.
    pub fn create_inverter(&mut self, of: NodeId) -> Result<NtkNodeRef> {
        let src = self.get_node(of).ok_or(NtkError::NodeDoesNotExist(of))?;
        if !(src.borrow().is_gate() || src.borrow().is_input()) {
            return Err(NtkError::InvalidState(format!(
                "cannot build an inverter over node {}",
                of
            )));
        }
        let id = self.fresh_id();
        let name = format!("inv{}", id);
        self.add_node(NtkNode::inv(id, name, NtkEdge::new(src, false)))
    }

    /// Redirect every fanout of `old` (gates and output terminals alike) to
    /// take `new` in its place, keeping the polarity of each redirected edge.
    ///
    /// The old node is left in the netlist; it may become dangling. Fanout
    /// maps of both nodes are kept coherent.
    pub fn replace(&mut self, old_id: NodeId, new_id: NodeId) -> Result<()> {
        if old_id == new_id {
            return Err(NtkError::InvalidState(format!(
                "cannot replace node {} by itself",
                old_id
            )));
        }
        let old = self
            .get_node(old_id)
            .ok_or(NtkError::NodeDoesNotExist(old_id))?;
        let new = self
            .get_node(new_id)
            .ok_or(NtkError::NodeDoesNotExist(new_id))?;
        if !old.borrow().is_gate() {
            return Err(NtkError::InvalidState(format!(
                "replace target {} must be a gate",
                old_id
            )));
        }
        if !(new.borrow().is_gate() || new.borrow().is_input()) {
            return Err(NtkError::InvalidState(format!(
                "replacement {} must be a gate or an input",
                new_id
            )));
        }

        let fanouts: Vec<(NodeId, NtkNodeRef)> = old
            .borrow()
            .get_fanouts()
            .iter()
            .filter_map(|(&fid, weak)| Some((fid, weak.upgrade()?)))
            .collect();
        for (fid, fanout) in fanouts {
            let patched = fanout.borrow_mut().redirect_fanin(old_id, &new);
            if patched == 0 {
                return Err(NtkError::InvalidState(format!(
                    "fanout {} of node {} does not list it as a fanin",
                    fid, old_id
                )));
            }
            new.borrow_mut().add_fanout(fid, Rc::downgrade(&fanout));
        }
        old.borrow_mut().clear_fanouts();
        Ok(())
    }

    /// Atomically clear and reinstall the full ordered fanin list of a node,
    /// updating the fanout maps on both sides. Only gates and output
    /// terminals have fanins to reinstall; the list length must match the
    /// node's arity.
    pub fn set_fanins(&mut self, id: NodeId, fanins: &[NtkEdge]) -> Result<()> {
        let node = self.get_node(id).ok_or(NtkError::NodeDoesNotExist(id))?;
        if !(node.borrow().is_gate() || node.borrow().is_output()) {
            return Err(NtkError::InvalidState(format!(
                "node {} has no fanins to set",
                id
            )));
        }
        let old = node.borrow().get_fanins();
        if fanins.len() != old.len() {
            return Err(NtkError::FaninArity {
                node: id,
                expected: old.len(),
                got: fanins.len(),
            });
        }
        for fanin in fanins {
            let fid = fanin.get_node_id();
            if !self.nodes.contains_key(&fid) {
                return Err(NtkError::NodeDoesNotExist(fid));
            }
        }

        let mut detached = BTreeSet::new();
        for fanin in &old {
            if detached.insert(fanin.get_node_id()) {
                fanin.get_node().borrow_mut().remove_fanout(id)?;
            }
        }
        node.borrow_mut().set_fanin_list(fanins)?;
        let weak = Rc::downgrade(&node);
        let mut attached = BTreeSet::new();
        for fanin in fanins {
            if attached.insert(fanin.get_node_id()) {
                fanin.get_node().borrow_mut().add_fanout(id, weak.clone());
            }
        }
        Ok(())
    }

    /// Remove a gate from the netlist. Fails if a live fanout still lists it
    /// as a fanin (redirect or reinstall those first).
    pub fn delete(&mut self, id: NodeId) -> Result<()> {
        let node = self.get_node(id).ok_or(NtkError::NodeDoesNotExist(id))?;
        if !node.borrow().is_gate() {
            return Err(NtkError::InvalidState(format!(
                "only gates can be deleted, not node {}",
                id
            )));
        }
        for (fid, weak) in node.borrow().get_fanouts() {
            if let Some(fanout) = weak.upgrade() {
                if fanout
                    .borrow()
                    .get_fanins()
                    .iter()
                    .any(|e| e.get_node_id() == id)
                {
                    return Err(NtkError::InvalidState(format!(
                        "cannot delete node {}: still a fanin of {}",
                        id, fid
                    )));
                }
            }
        }

        let fanins = node.borrow().get_fanins();
        if let NtkNode::And { fanin0, fanin1, .. } = &*node.borrow() {
            self.strash.remove(&Self::strash_key(fanin0, fanin1));
        }
        let mut detached = BTreeSet::new();
        for fanin in &fanins {
            if detached.insert(fanin.get_node_id()) {
                fanin.get_node().borrow_mut().remove_fanout(id)?;
            }
        }
        node.borrow_mut().clear_fanouts();
        self.nodes.remove(&id);
        Ok(())
    }

    /// Returns a topological sort over {inputs ∪ gates}, fanins first.
    /// Output terminals and the constant are excluded; dangling cones are
    /// included. Errors if a cycle is detected.
    ///
    /// The order is deterministic: roots are visited in ascending id order.
    pub fn topo_sort_pi_node(&self) -> Result<Vec<NtkNodeRef>> {
        let mut sort = Vec::new();
        let mut seen = HashSet::new();
        let mut done = HashSet::new();

        for (&root_id, root) in &self.nodes {
            {
                let r = root.borrow();
                if r.is_const() || r.is_output() {
                    continue;
                }
            }
            if done.contains(&root_id) {
                continue;
            }

            let mut stack: Vec<(NtkNodeRef, bool)> = vec![(root.clone(), false)];
            while let Some((node, fanins_done)) = stack.pop() {
                let id = node.borrow().get_id();

                // second visit: every fanin is emitted, the node follows
                if fanins_done {
                    done.insert(id);
                    sort.push(node);
                    continue;
                }

                if done.contains(&id) {
                    continue;
                } else if seen.contains(&id) {
                    // reached again while still on the stack
                    return Err(NtkError::InvalidState(
                        "combinational cycle detected".to_string(),
                    ));
                }

                seen.insert(id);
                stack.push((node.clone(), true));

                for fanin in node.borrow().get_fanins() {
                    let fanin_node = fanin.get_node();
                    let fb = fanin_node.borrow();
                    if fb.is_const() || done.contains(&fb.get_id()) {
                        continue;
                    }
                    drop(fb);
                    stack.push((fanin_node, false));
                }
            }
        }
        Ok(sort)
    }
}

impl Default for Ntk {
    fn default() -> Self {
        Ntk::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn edge(node: &NtkNodeRef) -> NtkEdge {
        NtkEdge::new(node.clone(), false)
    }

    #[test]
    fn add_node_checks() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        assert_eq!(a.borrow().get_id(), 1);

        // Duplicate id
        assert!(ntk.add_node(NtkNode::input(1, "b")).is_err());

        // Unknown fanin
        let ghost = Rc::new(RefCell::new(NtkNode::input(42, "ghost")));
        assert!(ntk
            .add_node(NtkNode::and(5, "g", edge(&ghost), edge(&a)))
            .is_err());

        // Legal gate, fanouts registered
        let b = ntk.add_input("b").unwrap();
        let g = ntk
            .add_node(NtkNode::and(5, "g", edge(&a), edge(&b)))
            .unwrap();
        assert_eq!(ntk.fanouts(1)[0].borrow().get_id(), 5);
        assert_eq!(ntk.fanouts(2)[0].borrow().get_id(), 5);
        assert_eq!(ntk.max_id(), 5);

        let o = ntk.add_output("f", edge(&g)).unwrap();
        assert!(o.borrow().is_output());
        assert!(ntk.drives_output(5));
        assert!(!ntk.drives_output(1));
    }

    #[test]
    fn new_and_folding() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let c0 = ntk.const_edge();

        // x·0 = 0, x·1 = x
        assert!(ntk.new_and(None, edge(&a), c0.clone()).unwrap().is_const());
        assert_eq!(ntk.new_and(None, !c0.clone(), edge(&a)).unwrap(), edge(&a));
        // x·x = x, x·!x = 0
        assert_eq!(ntk.new_and(None, edge(&a), edge(&a)).unwrap(), edge(&a));
        assert!(ntk.new_and(None, edge(&a), !edge(&a)).unwrap().is_const());
        // No gate was created by any of the above.
        assert_eq!(ntk.node_count(), 3);

        // Sharing, commuted included
        let g1 = ntk.new_and(Some("g"), edge(&a), !edge(&b)).unwrap();
        let g2 = ntk.new_and(None, !edge(&b), edge(&a)).unwrap();
        assert_eq!(g1, g2);
        assert_eq!(ntk.node_count(), 4);
        assert_eq!(g1.get_node().borrow().get_name(), "g");
    }

    #[test]
    fn replace_redirects_all_fanouts() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let s = ntk.new_and(Some("s"), edge(&a), edge(&b)).unwrap();
        let t = ntk
            .add_node(NtkNode::and(9, "t", edge(&a), !edge(&b)))
            .unwrap();
        let f = ntk
            .add_node(NtkNode::and(10, "f", !edge(&t), edge(&s.get_node())))
            .unwrap();
        ntk.add_output("o", edge(&t)).unwrap();

        ntk.replace(9, s.get_node_id()).unwrap();

        // f now reads s on both slots, polarity preserved
        let fanins = f.borrow().get_fanins();
        assert_eq!(fanins[0], !s.clone());
        assert_eq!(fanins[1], s.clone());
        // the output was redirected too
        let o = &ntk.get_outputs()[0];
        assert_eq!(o.borrow().get_fanins()[0], s.clone());
        // target is dangling now
        assert!(ntk.fanouts(9).is_empty());
        assert_eq!(ntk.fanouts(s.get_node_id()).len(), 2);
        // not deleted though
        assert!(ntk.get_node(9).is_some());
    }

    #[test]
    fn replace_rejects_non_gates() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let g = ntk.new_and(None, edge(&a), edge(&b)).unwrap();
        assert!(ntk.replace(1, 2).is_err());
        assert!(ntk.replace(g.get_node_id(), g.get_node_id()).is_err());
        assert!(ntk.replace(g.get_node_id(), 77).is_err());
    }

    #[test]
    fn inverter_create_and_delete() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let inv = ntk.create_inverter(1).unwrap();
        assert!(inv.borrow().is_inv());
        assert_eq!(inv.borrow().get_fanins()[0], edge(&a));
        assert_eq!(ntk.fanouts(1).len(), 1);

        let inv_id = inv.borrow().get_id();
        ntk.delete(inv_id).unwrap();
        assert!(ntk.get_node(inv_id).is_none());
        assert!(ntk.fanouts(1).is_empty());

        // inputs cannot be deleted
        assert!(ntk.delete(1).is_err());
    }

    #[test]
    fn delete_refuses_referenced_gate() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let g = ntk.new_and(None, edge(&a), edge(&b)).unwrap();
        let h = ntk.new_and(None, g.clone(), !edge(&a)).unwrap();
        assert!(ntk.delete(g.get_node_id()).is_err());
        ntk.delete(h.get_node_id()).unwrap();
        ntk.delete(g.get_node_id()).unwrap();
        assert_eq!(ntk.node_count(), 3);
    }

    #[test]
    fn set_fanins_keeps_fanouts_coherent() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let c = ntk.add_input("c").unwrap();
        let g = ntk
            .add_node(NtkNode::and(4, "g", edge(&a), edge(&b)))
            .unwrap();

        ntk.set_fanins(4, &[!edge(&c), edge(&c)]).unwrap();
        assert!(ntk.fanouts(1).is_empty());
        assert!(ntk.fanouts(2).is_empty());
        assert_eq!(ntk.fanouts(3).len(), 1);
        assert_eq!(g.borrow().get_fanins(), vec![!edge(&c), edge(&c)]);

        // arity is checked before anything is touched
        assert!(ntk.set_fanins(4, &[edge(&a)]).is_err());
        assert_eq!(ntk.fanouts(3).len(), 1);
    }

    #[test]
    fn topo_sort_is_fanin_first() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let g = ntk.new_and(None, edge(&a), edge(&b)).unwrap();
        let h = ntk.new_and(None, g.clone(), !edge(&b)).unwrap();
        ntk.add_output("o", h.clone()).unwrap();

        let order: Vec<NodeId> = ntk
            .topo_sort_pi_node()
            .unwrap()
            .iter()
            .map(|n| n.borrow().get_id())
            .collect();
        assert_eq!(order.len(), 4);
        let pos =
            |id: NodeId| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(1) < pos(g.get_node_id()));
        assert!(pos(2) < pos(g.get_node_id()));
        assert!(pos(g.get_node_id()) < pos(h.get_node_id()));
    }

    #[test]
    fn topo_sort_detects_cycle() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let g = ntk
            .add_node(NtkNode::and(2, "g", edge(&a), edge(&a)))
            .unwrap();
        let h = ntk
            .add_node(NtkNode::and(3, "h", NtkEdge::new(g.clone(), false), edge(&a)))
            .unwrap();
        // wire g back onto h: cycle
        ntk.set_fanins(2, &[NtkEdge::new(h.clone(), false), edge(&a)])
            .unwrap();
        assert!(ntk.topo_sort_pi_node().is_err());
    }
}
