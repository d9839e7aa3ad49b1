use std::ops::Deref;

use crate::{Ntk, NtkEdge, NtkError, NtkNode, Result};

impl Ntk {
    /// Rebuild the netlist cell by cell into an independent copy.
    ///
    /// Nothing is shared with the original: every node gets a fresh `Rc`
    /// cell, while ids, names, input/output order and edge polarities carry
    /// over unchanged, so the copy satisfies [`Ntk::structural_eq`] with its
    /// source and mutating one never disturbs the other.
    ///
    /// Built inputs first, then gates in topological order (each fanin
    /// already exists by the time a gate needs it), then output terminals.
    /// Dangling cones come along too.
    pub fn deep_clone(&self) -> Result<Self> {
        self.check_integrity()?;

        let mut ntk = Ntk::with_name(self.name.clone());

        for input in &self.inputs {
            if let NtkNode::Input { id, name, .. } = input.borrow().deref() {
                ntk.add_node(NtkNode::input(*id, name.clone()))?;
            } else {
                return Err(NtkError::InvalidState(format!(
                    "expected an input, got node {}",
                    input.borrow().get_id()
                )));
            }
        }

        for node in self.topo_sort_pi_node()? {
            let node = node.borrow();
            match node.deref() {
                NtkNode::And {
                    id,
                    name,
                    fanin0,
                    fanin1,
                    ..
                } => {
                    let new_fanin0 = ntk.clone_edge(fanin0)?;
                    let new_fanin1 = ntk.clone_edge(fanin1)?;
                    ntk.add_node(NtkNode::and(*id, name.clone(), new_fanin0, new_fanin1))?;
                }
                NtkNode::Inv {
                    id, name, fanin, ..
                } => {
                    let new_fanin = ntk.clone_edge(fanin)?;
                    ntk.add_node(NtkNode::inv(*id, name.clone(), new_fanin))?;
                }
                _ => (),
            }
        }

        for output in &self.outputs {
            if let NtkNode::Output { id, name, fanin } = output.borrow().deref() {
                let new_fanin = ntk.clone_edge(fanin)?;
                ntk.add_node(NtkNode::output(*id, name.clone(), new_fanin))?;
            }
        }

        ntk.next_id = self.next_id;
        ntk.check_integrity()?;
        Ok(ntk)
    }

    /// Rebuild an edge of another netlist against this netlist's cells.
    fn clone_edge(&self, edge: &NtkEdge) -> Result<NtkEdge> {
        let id = edge.get_node_id();
        let node = self.get_node(id).ok_or(NtkError::NodeDoesNotExist(id))?;
        Ok(NtkEdge::new(node, edge.get_complement()))
    }
}

#[cfg(test)]
mod test {
    use crate::{Ntk, NtkEdge, NtkNode};

    #[test]
    fn deep_clone_matches_original() {
        let mut ntk = Ntk::with_name("tiny");
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let g = ntk
            .new_and(Some("g"), NtkEdge::new(a.clone(), false), NtkEdge::new(b.clone(), true))
            .unwrap();
        let h = ntk.new_and(Some("h"), g.clone(), !NtkEdge::new(a, false)).unwrap();
        ntk.add_output("o1", h).unwrap();
        ntk.add_output("o2", !g).unwrap();

        let copy = ntk.deep_clone().unwrap();
        assert!(ntk.structural_eq(&copy));
        assert!(copy.structural_eq(&ntk));
        assert!(copy.check_integrity().is_ok());
    }

    #[test]
    fn deep_clone_is_independent() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let s = ntk
            .new_and(Some("s"), NtkEdge::new(a.clone(), false), NtkEdge::new(b.clone(), false))
            .unwrap();
        let t = ntk
            .add_node(NtkNode::and(
                8,
                "t",
                NtkEdge::new(a, true),
                NtkEdge::new(b, true),
            ))
            .unwrap();
        ntk.add_output("o", NtkEdge::new(t, false)).unwrap();

        let copy = ntk.deep_clone().unwrap();
        ntk.replace(8, s.get_node_id()).unwrap();
        // the copy did not move
        assert!(!ntk.structural_eq(&copy));
        let t_copy = copy.get_node(8).unwrap();
        assert_eq!(t_copy.borrow().get_fanins().len(), 2);
        assert_eq!(copy.fanouts(8).len(), 1);
    }

    #[test]
    fn deep_clone_keeps_dangling_cones() {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let g = ntk
            .new_and(None, NtkEdge::new(a.clone(), false), NtkEdge::new(b, false))
            .unwrap();
        ntk.add_output("o", NtkEdge::new(a, false)).unwrap();
        // g drives nothing, but survives the copy
        let copy = ntk.deep_clone().unwrap();
        assert!(copy.get_node(g.get_node_id()).is_some());
        assert!(ntk.structural_eq(&copy));
    }
}
