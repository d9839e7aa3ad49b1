use std::ops::Not;

use super::NtkNodeRef;

/// A signal: a driver node plus a polarity bit.
///
/// Fanins are edges rather than bare nodes, so an AND gate over complemented
/// edges can express NAND/NOR/... without materializing inverter nodes. The
/// `!` operator flips the polarity:
///
/// ```rust
/// use dals::{Ntk, NtkEdge};
/// let mut ntk = Ntk::new();
/// let a = ntk.add_input("a").unwrap();
/// let signal = NtkEdge::new(a, false);
/// let negated = !signal.clone();
/// assert!(negated.get_complement());
/// // double negation is the original signal again
/// assert_eq!(!negated, signal);
/// ```
#[derive(Clone, Debug, Eq)]
pub struct NtkEdge {
    /// Shared handle on the driver; any number of edges may target one node.
    pub(super) node: NtkNodeRef,
    /// When set, consumers of the edge see the driver inverted.
    pub(super) complement: bool,
}

impl Not for NtkEdge {
    type Output = Self;

    fn not(mut self) -> Self::Output {
        self.complement = !self.complement;
        self
    }
}

impl PartialEq for NtkEdge {
    fn eq(&self, other: &Self) -> bool {
        self.complement == other.complement
            && self.node.borrow().get_id() == other.node.borrow().get_id()
    }
}

impl NtkEdge {
    pub fn new(node: NtkNodeRef, complement: bool) -> Self {
        NtkEdge { node, complement }
    }

    pub fn get_node(&self) -> NtkNodeRef {
        self.node.clone()
    }

    pub fn get_node_id(&self) -> super::NodeId {
        self.node.borrow().get_id()
    }

    pub fn get_complement(&self) -> bool {
        self.complement
    }

    /// True iff the edge points at the constant node (in either polarity).
    pub fn is_const(&self) -> bool {
        self.node.borrow().is_const()
    }
}
