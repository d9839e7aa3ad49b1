//! Approximate local change: one candidate substitution of a netlist node by
//! an earlier-arriving signal, possibly through a fresh inverter.
//!
//! An [`Alc`] is built read-only against the current netlist, snapshotting
//! the full ordered fanin list of every fanout of its target. [`Alc::apply`]
//! redirects those fanouts to the substitute (materializing the inverter for
//! a complemented change) and [`Alc::revert`] reinstalls the snapshots
//! verbatim, inverter deleted.
//!
//! Reinstalling whole fanin lists is the only safe undo: patching edges one
//! by one goes wrong as soon as a fanout already read the substitute as an
//! independent fanin before the change, because the patch cannot tell the
//! pre-existing edge from the redirected one.

use thiserror::Error;

use crate::{Ntk, NtkEdge, NtkError, NtkNodeRef};

/// Lifecycle of a local change.
///
/// Fresh -> Applied via [`Alc::apply`], Applied -> Reverted via
/// [`Alc::revert`], and Reverted -> Applied is allowed again. Anything else
/// is a state error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlcState {
    Fresh,
    Applied,
    Reverted,
}

/// Error returned when driving a local change against the wrong state.
#[derive(Debug, Error)]
pub enum AlcError {
    #[error("change must be fresh or reverted to be applied, was {0:?}")]
    Apply(AlcState),

    #[error("change must be applied to be reverted, was {0:?}")]
    Revert(AlcState),

    /// Just forwarding a [`NtkError`].
    #[error("{0}")]
    Ntk(#[from] NtkError),
}

/// One (target -> substitute) local change with do/undo semantics.
///
/// The change stays valid while the target and its snapshotted fanouts are
/// live in the netlist it was built against.
#[derive(Debug, Clone)]
pub struct Alc {
    target: NtkNodeRef,
    substitute: NtkNodeRef,
    complemented: bool,
    error: f64,
    /// The materialized inverter while the change is applied.
    inv: Option<NtkNodeRef>,
    /// For every fanout of the target at construction time, its full ordered
    /// fanin list. This is the unit of undo.
    saved_fanouts: Vec<(NtkNodeRef, Vec<NtkEdge>)>,
    state: AlcState,
}

impl Alc {
    /// Build a change, snapshotting the fanouts of `target` as they are now.
    pub fn new(target: &NtkNodeRef, substitute: &NtkNodeRef, complemented: bool, error: f64) -> Self {
        let saved_fanouts = target
            .borrow()
            .get_fanouts()
            .values()
            .filter_map(|weak| {
                let fanout = weak.upgrade()?;
                let fanins = fanout.borrow().get_fanins();
                Some((fanout, fanins))
            })
            .collect();
        Alc {
            target: target.clone(),
            substitute: substitute.clone(),
            complemented,
            error,
            inv: None,
            saved_fanouts,
            state: AlcState::Fresh,
        }
    }

    pub fn get_target(&self) -> NtkNodeRef {
        self.target.clone()
    }

    pub fn get_substitute(&self) -> NtkNodeRef {
        self.substitute.clone()
    }

    pub fn is_complemented(&self) -> bool {
        self.complemented
    }

    pub fn get_error(&self) -> f64 {
        self.error
    }

    /// Overwrite the error estimate, typically with an exactly simulated one.
    pub fn set_error(&mut self, error: f64) {
        self.error = error;
    }

    pub fn get_state(&self) -> AlcState {
        self.state
    }

    /// Redirect every fanout of the target to the substitute (through a fresh
    /// inverter when the change is complemented). The target itself is left
    /// in place and may dangle.
    pub fn apply(&mut self, ntk: &mut Ntk) -> Result<(), AlcError> {
        if self.state == AlcState::Applied {
            return Err(AlcError::Apply(self.state));
        }
        let target_id = self.target.borrow().get_id();
        let substitute_id = self.substitute.borrow().get_id();
        if self.complemented {
            let inv = ntk.create_inverter(substitute_id)?;
            let inv_id = inv.borrow().get_id();
            self.inv = Some(inv);
            ntk.replace(target_id, inv_id)?;
        } else {
            ntk.replace(target_id, substitute_id)?;
        }
        self.state = AlcState::Applied;
        Ok(())
    }

    /// Reinstall the snapshotted fanin list of every saved fanout, then
    /// delete the inverter if one was materialized. After this the netlist is
    /// structurally identical to what it was before [`Alc::apply`].
    pub fn revert(&mut self, ntk: &mut Ntk) -> Result<(), AlcError> {
        if self.state != AlcState::Applied {
            return Err(AlcError::Revert(self.state));
        }
        for (fanout, fanins) in &self.saved_fanouts {
            let fanout_id = fanout.borrow().get_id();
            ntk.set_fanins(fanout_id, fanins)?;
        }
        if let Some(inv) = self.inv.take() {
            let inv_id = inv.borrow().get_id();
            drop(inv);
            ntk.delete(inv_id)?;
        }
        self.state = AlcState::Reverted;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{NtkNode, sim::simulate};

    fn edge(node: &NtkNodeRef) -> NtkEdge {
        NtkEdge::new(node.clone(), false)
    }

    /// target `t` with three fanouts, one of which already reads the
    /// substitute `s` as an independent fanin.
    fn tricky_netlist() -> (Ntk, NtkNodeRef, NtkNodeRef) {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let s = ntk
            .add_node(NtkNode::and(3, "s", edge(&a), edge(&b)))
            .unwrap();
        let t = ntk
            .add_node(NtkNode::and(4, "t", edge(&a), !edge(&b)))
            .unwrap();
        let f1 = ntk
            .add_node(NtkNode::and(5, "f1", edge(&t), edge(&s)))
            .unwrap();
        let f2 = ntk
            .add_node(NtkNode::and(6, "f2", !edge(&t), edge(&a)))
            .unwrap();
        ntk.add_output("o1", edge(&f1)).unwrap();
        ntk.add_output("o2", edge(&f2)).unwrap();
        ntk.add_output("o3", !edge(&t)).unwrap();
        (ntk, t, s)
    }

    #[test]
    fn apply_then_revert_is_identity() {
        let (mut ntk, t, s) = tricky_netlist();
        let before = ntk.deep_clone().unwrap();

        let mut alc = Alc::new(&t, &s, false, 0.25);
        assert_eq!(alc.get_state(), AlcState::Fresh);

        alc.apply(&mut ntk).unwrap();
        assert_eq!(alc.get_state(), AlcState::Applied);
        assert!(!ntk.structural_eq(&before));
        // all three fanouts now read s, polarities kept
        assert!(ntk.fanouts(4).is_empty());
        assert_eq!(ntk.fanouts(3).len(), 3);
        assert!(ntk.check_integrity().is_ok());

        alc.revert(&mut ntk).unwrap();
        assert_eq!(alc.get_state(), AlcState::Reverted);
        assert!(ntk.structural_eq(&before));
        assert!(ntk.check_integrity().is_ok());
    }

    #[test]
    fn duplicate_edge_fanout_survives_undo() {
        let (mut ntk, t, s) = tricky_netlist();
        // f1 = t & s becomes s & s after apply; undo must give t & s back,
        // not merge or duplicate the edges.
        let mut alc = Alc::new(&t, &s, false, 0.0);
        alc.apply(&mut ntk).unwrap();
        let f1 = ntk.get_node(5).unwrap();
        assert_eq!(f1.borrow().get_fanins(), vec![edge(&s), edge(&s)]);

        alc.revert(&mut ntk).unwrap();
        assert_eq!(f1.borrow().get_fanins(), vec![edge(&t), edge(&s)]);
    }

    #[test]
    fn complemented_apply_materializes_inverter() {
        let (mut ntk, t, s) = tricky_netlist();
        let before = ntk.deep_clone().unwrap();
        let nodes_before = ntk.node_count();

        let mut alc = Alc::new(&t, &s, true, 0.0);
        alc.apply(&mut ntk).unwrap();
        assert_eq!(ntk.node_count(), nodes_before + 1);
        // fanouts of t moved onto the inverter, which reads s
        let s_fanouts = ntk.fanouts(3);
        let inv = s_fanouts.last().unwrap();
        assert!(inv.borrow().is_inv());
        assert!(ntk.check_integrity().is_ok());
        // behaviorally: every old reader of t now sees !s
        let outs = simulate(&ntk, &[true, true]).unwrap();
        // s = a&b = 1, so !s = 0: f1 = 0&1 = 0, f2 = !0 & a = 1, o3 = !(!s) = 1
        assert_eq!(outs, vec![false, true, true]);

        alc.revert(&mut ntk).unwrap();
        assert_eq!(ntk.node_count(), nodes_before);
        assert!(ntk.structural_eq(&before));
    }

    #[test]
    fn state_machine_is_enforced() {
        let (mut ntk, t, s) = tricky_netlist();
        let mut alc = Alc::new(&t, &s, false, 0.0);

        assert!(alc.revert(&mut ntk).is_err());
        alc.apply(&mut ntk).unwrap();
        assert!(alc.apply(&mut ntk).is_err());
        alc.revert(&mut ntk).unwrap();
        assert!(alc.revert(&mut ntk).is_err());

        // Reverted -> Applied is a legal re-do
        alc.apply(&mut ntk).unwrap();
        assert_eq!(alc.get_state(), AlcState::Applied);
        alc.revert(&mut ntk).unwrap();
    }

    #[test]
    fn re_apply_recreates_the_inverter() {
        let (mut ntk, t, s) = tricky_netlist();
        let before = ntk.deep_clone().unwrap();
        let mut alc = Alc::new(&t, &s, true, 0.0);

        for _ in 0..3 {
            alc.apply(&mut ntk).unwrap();
            alc.revert(&mut ntk).unwrap();
            assert!(ntk.structural_eq(&before));
        }
    }
}
