//! Bit-parallel truth-vector simulation and the simulated error rate.
//!
//! Every node gets a signature of `words` 64-bit machine words, so a single
//! pass evaluates 64·words pseudo-random patterns. Input signatures are a
//! pure function of (input id, seed): two netlists with the same inputs see
//! the exact same stimulus, which is what makes [`sim_error_rate`] meaningful.
//!
//! Simulation never mutates the netlist and can be re-run after any rewrite.

use std::collections::HashMap;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use thiserror::Error;

use crate::{NodeId, Ntk, NtkNode, Result};

/// The bit-parallel signature of one node.
pub type TruthVec = Vec<u64>;

/// Error returned when a simulation cannot run or two netlists do not line up.
#[derive(Debug, Error)]
pub enum SimError {
    /// The two netlists must have identical primary inputs in the same order.
    #[error("netlists have different primary inputs")]
    MismatchedInputs,

    /// The two netlists must expose the same number of primary outputs.
    #[error("netlists have different output counts: {0} vs {1}")]
    MismatchedOutputs(usize, usize),

    /// Just forwarding a [`NtkError`].
    ///
    /// [`NtkError`]: crate::NtkError
    #[error("{0}")]
    Ntk(#[from] crate::NtkError),
}

fn pol(complement: bool) -> u64 {
    if complement {
        !0
    } else {
        0
    }
}

fn input_signature(id: NodeId, words: usize, seed: u64) -> TruthVec {
    let mut rng = ChaCha20Rng::seed_from_u64(seed.wrapping_add(id));
    (0..words).map(|_| rng.next_u64()).collect()
}

/// Simulate the netlist under the pseudo-random stimulus derived from `seed`,
/// producing a signature of `words` 64-bit words per input and gate (the
/// constant is included at id 0).
pub fn sim_truth_vec(ntk: &Ntk, words: usize, seed: u64) -> Result<HashMap<NodeId, TruthVec>> {
    let mut tv: HashMap<NodeId, TruthVec> = HashMap::with_capacity(ntk.node_count());
    tv.insert(0, vec![0; words]);

    for node in ntk.topo_sort_pi_node()? {
        let node = node.borrow();
        let id = node.get_id();
        let value = match &*node {
            NtkNode::Input { .. } => input_signature(id, words, seed),
            NtkNode::And { fanin0, fanin1, .. } => {
                let v0 = &tv[&fanin0.get_node_id()];
                let v1 = &tv[&fanin1.get_node_id()];
                let (m0, m1) = (pol(fanin0.get_complement()), pol(fanin1.get_complement()));
                (0..words).map(|w| (v0[w] ^ m0) & (v1[w] ^ m1)).collect()
            }
            NtkNode::Inv { fanin, .. } => {
                let v = &tv[&fanin.get_node_id()];
                let m = pol(fanin.get_complement());
                (0..words).map(|w| !(v[w] ^ m)).collect()
            }
            _ => continue,
        };
        tv.insert(id, value);
    }
    Ok(tv)
}

/// Per-output signatures, with output-edge complements folded in.
pub fn po_signatures(
    ntk: &Ntk,
    tv: &HashMap<NodeId, TruthVec>,
    words: usize,
) -> Vec<TruthVec> {
    ntk.get_outputs()
        .iter()
        .map(|o| {
            let fanins = o.borrow().get_fanins();
            let v = &tv[&fanins[0].get_node_id()];
            let m = pol(fanins[0].get_complement());
            (0..words).map(|w| v[w] ^ m).collect()
        })
        .collect()
}

/// Number of bit positions where the two signatures disagree.
pub fn hamming(a: &TruthVec, b: &TruthVec) -> u64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x ^ y).count_ones() as u64)
        .sum()
}

/// Fraction of the 64·words simulated patterns for which *any* primary output
/// of the two netlists disagrees. Both netlists see the same stimulus, so the
/// comparison is symmetric in its arguments.
pub fn sim_error_rate(
    reference: &Ntk,
    approx: &Ntk,
    words: usize,
    seed: u64,
) -> std::result::Result<f64, SimError> {
    if reference.get_input_ids() != approx.get_input_ids() {
        return Err(SimError::MismatchedInputs.into());
    }
    let outs_ref = reference.get_outputs().len();
    let outs_approx = approx.get_outputs().len();
    if outs_ref != outs_approx {
        return Err(SimError::MismatchedOutputs(outs_ref, outs_approx).into());
    }

    let tv_ref = sim_truth_vec(reference, words, seed)?;
    let tv_approx = sim_truth_vec(approx, words, seed)?;
    let sig_ref = po_signatures(reference, &tv_ref, words);
    let sig_approx = po_signatures(approx, &tv_approx, words);

    let mut mismatches = 0u64;
    for w in 0..words {
        let mut diff = 0u64;
        for (a, b) in sig_ref.iter().zip(sig_approx.iter()) {
            diff |= a[w] ^ b[w];
        }
        mismatches += diff.count_ones() as u64;
    }
    Ok(mismatches as f64 / (64 * words) as f64)
}

/// Evaluate the netlist on one explicit input pattern, positional over
/// [`Ntk::get_inputs`] order. Returns one value per primary output.
pub fn simulate(ntk: &Ntk, input_values: &[bool]) -> Result<Vec<bool>> {
    let inputs = ntk.get_inputs();
    assert_eq!(
        input_values.len(),
        inputs.len(),
        "one value per primary input expected"
    );
    let mut tv: HashMap<NodeId, TruthVec> = HashMap::new();
    tv.insert(0, vec![0]);
    for (input, &value) in inputs.iter().zip(input_values) {
        tv.insert(input.borrow().get_id(), vec![pol(value)]);
    }
    for node in ntk.topo_sort_pi_node()? {
        let node = node.borrow();
        let value = match &*node {
            NtkNode::And { fanin0, fanin1, .. } => {
                (tv[&fanin0.get_node_id()][0] ^ pol(fanin0.get_complement()))
                    & (tv[&fanin1.get_node_id()][0] ^ pol(fanin1.get_complement()))
            }
            NtkNode::Inv { fanin, .. } => {
                !(tv[&fanin.get_node_id()][0] ^ pol(fanin.get_complement()))
            }
            _ => continue,
        };
        tv.insert(node.get_id(), vec![value]);
    }
    Ok(po_signatures(ntk, &tv, 1)
        .iter()
        .map(|sig| sig[0] != 0)
        .collect())
}
