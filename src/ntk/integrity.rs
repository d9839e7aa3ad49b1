use crate::{Ntk, NtkEdge, NtkError, NtkNodeRef, Result};

impl Ntk {
    /// Verify the cross-referencing invariants of the whole netlist: every
    /// node sits in the table under its own id, fanin edges and fanout
    /// back-edges agree with each other, inputs and output terminals are
    /// registered, and the graph is acyclic.
    ///
    /// Mutating operations keep all of this true on their own; the check is a
    /// debugging aid and a gate on freshly parsed files.
    pub fn check_integrity(&self) -> Result<()> {
        for (&id, node) in &self.nodes {
            if node.borrow().get_id() != id {
                return Err(NtkError::InvalidState(format!(
                    "node filed under id {} calls itself {}",
                    id,
                    node.borrow().get_id()
                )));
            }
            self.check_node_integrity(node)?;
        }

        // Inputs and output terminals must be registered as nodes
        for input in &self.inputs {
            let id = input.borrow().get_id();
            if self.get_node(id).is_none() {
                return Err(NtkError::InvalidState(format!(
                    "input {} is not a node of the netlist",
                    id
                )));
            }
        }
        for output in &self.outputs {
            let id = output.borrow().get_id();
            if self.get_node(id).is_none() {
                return Err(NtkError::InvalidState(format!(
                    "output {} is not a node of the netlist",
                    id
                )));
            }
        }

        // Checks for acyclicity
        self.topo_sort_pi_node()?;

        Ok(())
    }

    /// Per-node invariants: id 0 is the constant and nothing else, each fanin
    /// points into this netlist and is mirrored by a fanout entry on the
    /// driver, and each live fanout entry names a node that really reads
    /// this one.
    fn check_node_integrity(&self, node: &NtkNodeRef) -> Result<()> {
        let id = node.borrow().get_id();
        if id == 0 && !node.borrow().is_const() {
            return Err(NtkError::IdZeroButNotConst);
        }

        for fanin in node.borrow().get_fanins() {
            self.check_edge_integrity(&fanin)?;
            let fanin_node = fanin.get_node();
            let fb = fanin_node.borrow();
            if !fb.is_const() && !fb.get_fanouts().contains_key(&id) {
                return Err(NtkError::InvalidState(format!(
                    "node {} reads {} but is missing from its fanouts",
                    id,
                    fb.get_id()
                )));
            }
        }

        for (fanout_id, fanout_weak) in node.borrow().get_fanouts() {
            if let Some(fanout) = fanout_weak.upgrade() {
                let real_id = fanout.borrow().get_id();
                if fanout_id != real_id {
                    return Err(NtkError::InvalidState(format!(
                        "fanout entry {} resolves to node {}",
                        fanout_id, real_id
                    )));
                }
                if self.get_node(real_id).is_none() {
                    return Err(NtkError::InvalidState(format!(
                        "fanout {} is no longer in the netlist",
                        real_id
                    )));
                }
                if !fanout
                    .borrow()
                    .get_fanins()
                    .iter()
                    .any(|e| e.get_node_id() == id)
                {
                    return Err(NtkError::InvalidState(format!(
                        "fanout {} of node {} does not read it",
                        real_id, id
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_edge_integrity(&self, fanin: &NtkEdge) -> Result<()> {
        let id = fanin.get_node_id();
        self.get_node(id).ok_or(NtkError::InvalidState(format!(
            "edge targets node {}, which left the netlist",
            id
        )))?;
        Ok(())
    }

    /// Structural equality: same inputs in the same order, same outputs in the
    /// same order, and node-for-node identical kinds, names and ordered fanin
    /// lists (polarities included). Fanout maps are derived data and are not
    /// compared.
    pub fn structural_eq(&self, other: &Ntk) -> bool {
        if self.get_input_ids() != other.get_input_ids() {
            return false;
        }
        let out_key = |o: &NtkNodeRef| {
            let o = o.borrow();
            let fanins = o.get_fanins();
            (
                o.get_id(),
                o.get_name().to_owned(),
                fanins[0].get_node_id(),
                fanins[0].get_complement(),
            )
        };
        if self.outputs.len() != other.outputs.len()
            || self
                .outputs
                .iter()
                .zip(&other.outputs)
                .any(|(a, b)| out_key(a) != out_key(b))
        {
            return false;
        }
        if self.nodes.len() != other.nodes.len() {
            return false;
        }
        self.nodes.iter().all(|(id, node)| {
            other
                .get_node(*id)
                .is_some_and(|other_node| *node.borrow() == *other_node.borrow())
        })
    }
}

#[cfg(test)]
mod test {
    use crate::{Ntk, NtkEdge, NtkNode};

    #[test]
    fn integrity_of_built_netlist() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let g = ntk
            .new_and(None, NtkEdge::new(a, false), NtkEdge::new(b, true))
            .unwrap();
        ntk.add_output("o", g).unwrap();
        assert!(ntk.check_integrity().is_ok());
    }

    #[test]
    fn integrity_survives_mutation() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let s = ntk
            .new_and(Some("s"), NtkEdge::new(a.clone(), false), NtkEdge::new(b.clone(), false))
            .unwrap();
        let t = ntk
            .add_node(NtkNode::and(
                7,
                "t",
                NtkEdge::new(a.clone(), true),
                NtkEdge::new(b.clone(), false),
            ))
            .unwrap();
        ntk.add_output("o", NtkEdge::new(t.clone(), false)).unwrap();

        ntk.replace(7, s.get_node_id()).unwrap();
        assert!(ntk.check_integrity().is_ok());

        let inv = ntk.create_inverter(s.get_node_id()).unwrap();
        assert!(ntk.check_integrity().is_ok());
        let inv_id = inv.borrow().get_id();
        drop(inv);
        ntk.delete(inv_id).unwrap();
        assert!(ntk.check_integrity().is_ok());
    }

    #[test]
    fn structural_eq_is_order_sensitive() {
        let build = |swap: bool| {
            let mut ntk = Ntk::new();
            let a = ntk.add_input("a").unwrap();
            let b = ntk.add_input("b").unwrap();
            let (f0, f1) = if swap {
                (NtkEdge::new(b.clone(), false), NtkEdge::new(a.clone(), false))
            } else {
                (NtkEdge::new(a.clone(), false), NtkEdge::new(b.clone(), false))
            };
            let g = ntk.add_node(NtkNode::and(3, "g", f0, f1)).unwrap();
            ntk.add_output("o", NtkEdge::new(g, false)).unwrap();
            ntk
        };
        let x = build(false);
        let y = build(false);
        let z = build(true);
        assert!(x.structural_eq(&y));
        assert!(!x.structural_eq(&z));
    }
}
