//! Delay-driven approximate logic synthesis.
//!
//! [`Dals`] keeps two netlists: the frozen reference and the approximation it
//! rewrites. Each round it runs timing analysis on the approximation,
//! proposes substitutions for every timing-critical gate (scored first by
//! signature Hamming distance, then by exact simulation against the
//! reference), selects a cheapest non-conflicting subset through a min-cut
//! over the critical subgraph, and commits it. Rounds repeat until the
//! simulated error rate reaches the constraint or the depth stops improving.
//!
//! The selection step is a minimum source-sink cut: split every critical gate
//! into an in/out pair joined by an edge priced at its best substitution
//! error, wire the critical subgraph with infinite edges around those pairs,
//! and any finite cut is exactly a set of substitutions covering every
//! critical input-to-output path.

use indexmap::IndexMap;
use thiserror::Error;

use crate::{
    alc::{Alc, AlcError},
    dinic::{Dinic, FlowError},
    sim::{self, SimError},
    sta, NodeId, Ntk, NtkError,
};

/// Default number of 64-bit stimulus words per node signature.
pub const DEFAULT_SIM_WORDS: usize = 16;
const DEFAULT_SEED: u64 = 8026727;
/// Candidates kept per target for exact rescoring.
const TOP_K: usize = 3;
const DIVIDER: &str =
    "---------------------------------------------------------------------------";

/// Error returned when the optimization engine cannot proceed.
#[derive(Debug, Error)]
pub enum DalsError {
    /// A netlist without outputs has nothing to approximate.
    #[error("netlist has no primary outputs")]
    NoOutputs,

    #[error("{0}")]
    Ntk(#[from] NtkError),

    #[error("{0}")]
    Sim(#[from] SimError),

    #[error("{0}")]
    Alc(#[from] AlcError),

    #[error("{0}")]
    Flow(#[from] FlowError),
}

/// What a [`Dals::run`] did, in numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Rounds executed (a round may commit zero substitutions).
    pub rounds: usize,
    /// Total substitutions committed over the run.
    pub substitutions: usize,
    /// The simulated error rate after the last round.
    pub error_rate: f64,
    pub reference_depth: u32,
    pub approx_depth: u32,
}

/// The optimization engine. Construct, configure, run, then take the
/// approximation.
///
/// ```no_run
/// use dals::{Dals, Ntk};
///
/// let ntk = Ntk::read_bench("benchmark/c17.bench").unwrap();
/// let mut engine = Dals::new(&ntk).unwrap();
/// engine.set_sim_words(16);
/// let summary = engine.run(0.1).unwrap();
/// assert!(summary.approx_depth <= summary.reference_depth);
/// engine.get_approx().write_blif("c17_approx.blif").unwrap();
/// ```
pub struct Dals {
    reference: Ntk,
    approx: Ntk,
    sim_words: usize,
    seed: u64,
    /// Per target, its surviving candidates sorted by error.
    cand_alcs: IndexMap<NodeId, Vec<Alc>>,
    /// Per target, the single change selected this round.
    opt_alc: IndexMap<NodeId, Alc>,
}

impl Dals {
    /// Validate the input and snapshot it: the engine keeps a frozen
    /// reference copy and an approximation copy it is free to rewrite.
    pub fn new(ntk: &Ntk) -> Result<Self, DalsError> {
        ntk.check_integrity()?;
        if ntk.get_outputs().is_empty() {
            return Err(DalsError::NoOutputs);
        }
        let reference = ntk.deep_clone()?;
        let approx = reference.deep_clone()?;
        Ok(Dals {
            reference,
            approx,
            sim_words: DEFAULT_SIM_WORDS,
            seed: DEFAULT_SEED,
            cand_alcs: IndexMap::new(),
            opt_alc: IndexMap::new(),
        })
    }

    /// Stimulus width: 64·words patterns per simulation. Clamped to at
    /// least one word.
    pub fn set_sim_words(&mut self, words: usize) {
        self.sim_words = words.max(1);
    }

    /// Seed of the pseudo-random stimulus. Runs with equal inputs, seed and
    /// width are fully reproducible.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    pub fn get_reference(&self) -> &Ntk {
        &self.reference
    }

    pub fn get_approx(&self) -> &Ntk {
        &self.approx
    }

    /// Give up the engine and keep the approximation.
    pub fn take_approx(self) -> Ntk {
        self.approx
    }

    /// Estimated substitution error between two signatures.
    fn est_pair_error(tv_t: &sim::TruthVec, tv_s: &sim::TruthVec, words: usize) -> f64 {
        sim::hamming(tv_t, tv_s) as f64 / (64 * words) as f64
    }

    /// Fill the candidate table for the given targets and select the best
    /// change per target by exact rescoring (apply, simulate, revert).
    fn calc_alcs(&mut self, targets: &[NodeId], top_k: usize) -> Result<(), DalsError> {
        self.cand_alcs.clear();
        self.opt_alc.clear();
        let words = self.sim_words;
        let seed = self.seed;
        let tv = sim::sim_truth_vec(&self.approx, words, seed)?;
        let slack = sta::compute_slack(&self.approx)?;
        let s_nodes = self.approx.topo_sort_pi_node()?;
        log::debug!(
            "signatures over {} patterns ready for {} substitution targets",
            64 * words,
            targets.len()
        );

        for &t_id in targets {
            let target = self
                .approx
                .get_node(t_id)
                .ok_or(NtkError::NodeDoesNotExist(t_id))?;
            let t_arrival = slack[&t_id].arrival;
            let mut alcs: Vec<Alc> = Vec::new();
            for s_node in &s_nodes {
                let s_id = s_node.borrow().get_id();
                if s_id == t_id {
                    continue;
                }
                let s_arrival = slack[&s_id].arrival;
                if s_arrival >= t_arrival {
                    continue;
                }
                let est = Self::est_pair_error(&tv[&t_id], &tv[&s_id], words);
                // An inverter costs one level: complementation only pays off
                // when the substitute arrives at least two levels earlier.
                if s_arrival + 1 < t_arrival {
                    alcs.push(Alc::new(&target, s_node, est > 0.5, est.min(1.0 - est)));
                } else {
                    alcs.push(Alc::new(&target, s_node, false, est));
                }
            }
            alcs.sort_by(|x, y| x.get_error().total_cmp(&y.get_error()));
            alcs.truncate(top_k);
            self.cand_alcs.insert(t_id, alcs);
        }

        // Exact rescoring: measure each retained candidate against the
        // reference with the change transiently applied.
        let reference = &self.reference;
        let approx = &mut self.approx;
        for (_, alcs) in self.cand_alcs.iter_mut() {
            for alc in alcs.iter_mut() {
                #[cfg(debug_assertions)]
                let before = approx.deep_clone()?;
                alc.apply(approx)?;
                let exact = sim::sim_error_rate(reference, approx, words, seed)?;
                alc.revert(approx)?;
                alc.set_error(exact);
                #[cfg(debug_assertions)]
                assert!(
                    approx.structural_eq(&before),
                    "revert left the netlist modified"
                );
            }
        }

        for (t_id, alcs) in &self.cand_alcs {
            let mut best: Option<usize> = None;
            for (i, alc) in alcs.iter().enumerate() {
                if best.is_none_or(|b| alc.get_error() < alcs[b].get_error()) {
                    best = Some(i);
                }
            }
            if let Some(i) = best {
                self.opt_alc.insert(*t_id, alcs[i].clone());
            }
        }
        Ok(())
    }

    /// Run optimization rounds until the simulated error rate reaches the
    /// constraint, or the depth stops improving. The round that breaches the
    /// constraint is kept; there is no rollback.
    pub fn run(&mut self, err_constraint: f64) -> Result<RunSummary, DalsError> {
        let reference_depth = sta::depth(&self.reference)?;
        let mut err = 0.0;
        let mut round = 0;
        let mut substitutions = 0;
        let mut last_depth = sta::depth(&self.approx)?;
        let mut stalled = 0;

        while err < err_constraint {
            round += 1;
            let slack = sta::compute_slack(&self.approx)?;

            // Critical inputs and gates, in topological order.
            let mut critical: Vec<(NodeId, bool)> = Vec::new();
            let mut targets: Vec<NodeId> = Vec::new();
            for node in self.approx.topo_sort_pi_node()? {
                let node = node.borrow();
                let id = node.get_id();
                if slack[&id].slack != 0 {
                    continue;
                }
                critical.push((id, node.is_input()));
                if node.is_gate() {
                    targets.push(id);
                }
            }

            self.calc_alcs(&targets, TOP_K)?;

            // Split-node flow network: gate u becomes u -> u + n priced at
            // its best substitution error; everything structural is infinite.
            let n = self.approx.max_id() as usize + 2;
            let (source, sink) = (0, n - 1);
            let mut dinic = Dinic::new(2 * n);
            for &(id, is_input) in &critical {
                let u = id as usize;
                if is_input {
                    dinic.add_edge(source, u, f64::INFINITY);
                } else {
                    let cap = match self.opt_alc.get(&id) {
                        Some(alc) if alc.get_error() > 0.0 => alc.get_error(),
                        // zero-error changes stay cuttable
                        Some(_) => f64::MIN_POSITIVE,
                        // no candidate: this gate cannot be substituted
                        None => f64::INFINITY,
                    };
                    dinic.add_edge(u, u + n, cap);
                    if self.approx.drives_output(id) {
                        dinic.add_edge(u + n, sink, f64::INFINITY);
                    }
                }
            }
            for (u, vs) in &sta::critical_graph(&self.approx, &slack)? {
                let u_is_input = self
                    .approx
                    .get_node(*u)
                    .is_some_and(|node| node.borrow().is_input());
                let from = if u_is_input {
                    *u as usize
                } else {
                    *u as usize + n
                };
                for v in vs {
                    dinic.add_edge(from, *v as usize, f64::INFINITY);
                }
            }

            println!("{}", DIVIDER);
            println!("> Round {}", round);
            println!("{}", DIVIDER);
            println!("MinCut:");
            let mut committed = 0;
            for (u, v) in dinic.min_cut(source, sink)? {
                if v != u + n {
                    continue;
                }
                let id = u as NodeId;
                let alc = self.opt_alc.get_mut(&id).ok_or_else(|| {
                    NtkError::InvalidState(format!("cut node {} has no selected change", id))
                })?;
                println!(
                    "{} ---> {} : {} : {}",
                    alc.get_target().borrow().get_name(),
                    alc.get_substitute().borrow().get_name(),
                    alc.is_complemented(),
                    alc.get_error()
                );
                alc.apply(&mut self.approx)?;
                committed += 1;
            }
            substitutions += committed;
            log::info!("round {}: committed {} substitutions", round, committed);

            err = sim::sim_error_rate(&self.reference, &self.approx, self.sim_words, self.seed)?;
            println!("Error Rate: {}", err);
            let depth = sta::depth(&self.approx)?;
            println!("Delay: {}--->{}", reference_depth, depth);

            if depth < last_depth {
                last_depth = depth;
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= 2 {
                    log::info!("depth stuck at {} for {} rounds, stopping", depth, stalled);
                    break;
                }
            }
        }

        Ok(RunSummary {
            rounds: round,
            substitutions,
            error_rate: err,
            reference_depth,
            approx_depth: sta::depth(&self.approx)?,
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::{NtkEdge, NtkNode};

    fn edge(node: &crate::NtkNodeRef) -> NtkEdge {
        NtkEdge::new(node.clone(), false)
    }

    /// `t` recomputes `s` one level later; a perfect zero-error substitution.
    fn redundant_chain() -> Ntk {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let s = ntk
            .add_node(NtkNode::and(3, "s", edge(&a), edge(&b)))
            .unwrap();
        let t = ntk
            .add_node(NtkNode::and(4, "t", edge(&s), edge(&s)))
            .unwrap();
        ntk.add_output("o", edge(&t)).unwrap();
        ntk
    }

    /// `t` recomputes `!s` two levels later: the ideal inverter opportunity.
    fn inverter_chain() -> Ntk {
        let mut ntk = Ntk::new();
        let a = ntk.add_input("a").unwrap();
        let b = ntk.add_input("b").unwrap();
        let s = ntk
            .add_node(NtkNode::and(3, "s", edge(&a), edge(&b)))
            .unwrap();
        let m = ntk
            .add_node(NtkNode::and(4, "m", !edge(&s), !edge(&s)))
            .unwrap();
        let t = ntk
            .add_node(NtkNode::and(5, "t", edge(&m), edge(&m)))
            .unwrap();
        ntk.add_output("o", edge(&t)).unwrap();
        ntk
    }

    #[test]
    fn zero_constraint_runs_zero_rounds() {
        let ntk = redundant_chain();
        let mut engine = Dals::new(&ntk).unwrap();
        let summary = engine.run(0.0).unwrap();
        assert_eq!(summary.rounds, 0);
        assert_eq!(summary.substitutions, 0);
        assert_eq!(summary.error_rate, 0.0);
        assert!(engine.get_approx().structural_eq(&ntk));
    }

    #[test]
    fn no_outputs_is_rejected() {
        let mut ntk = Ntk::new();
        ntk.add_input("a").unwrap();
        assert!(matches!(Dals::new(&ntk), Err(DalsError::NoOutputs)));
    }

    #[test]
    fn identity_substitution_reduces_depth_for_free() {
        let ntk = redundant_chain();
        let mut engine = Dals::new(&ntk).unwrap();
        engine.set_sim_words(16);
        let summary = engine.run(0.1).unwrap();

        assert_eq!(summary.reference_depth, 2);
        assert!(summary.approx_depth < summary.reference_depth);
        assert!(summary.rounds >= 1);
        assert!(summary.substitutions >= 1);
        // the run only stops on a real breach or a stall
        assert!(engine.get_approx().check_integrity().is_ok());
        assert_eq!(
            engine.get_approx().get_input_ids(),
            engine.get_reference().get_input_ids()
        );
    }

    #[test]
    fn candidate_table_respects_arrival_and_error_bounds() {
        let ntk = inverter_chain();
        let mut engine = Dals::new(&ntk).unwrap();
        engine.set_sim_words(16);

        let slack = sta::compute_slack(engine.get_approx()).unwrap();
        engine.calc_alcs(&[3, 4, 5], TOP_K).unwrap();
        for (t_id, alcs) in &engine.cand_alcs {
            assert!(alcs.len() <= TOP_K);
            for alc in alcs {
                let s_id = alc.get_substitute().borrow().get_id();
                assert!(slack[&s_id].arrival < slack[t_id].arrival);
                assert!(alc.get_error() >= 0.0);
            }
        }
        // `t` has two perfect candidates; ties keep the earliest-seen one
        let best = &engine.opt_alc[&5];
        assert_eq!(best.get_error(), 0.0);
        assert_eq!(best.get_substitute().borrow().get_name(), "s");
        assert!(best.is_complemented());
    }

    #[test]
    fn inverter_commit_then_breach() {
        let ntk = inverter_chain();
        let mut engine = Dals::new(&ntk).unwrap();
        engine.set_sim_words(16);
        let summary = engine.run(0.1).unwrap();

        // round 1 rewires `t` to an inverter over `s` at zero error; round 2
        // has only lossy candidates left and breaches the constraint
        assert_eq!(summary.reference_depth, 3);
        assert_eq!(summary.rounds, 2);
        assert!(summary.substitutions >= 2);
        assert!(summary.approx_depth < summary.reference_depth);
        assert!(summary.error_rate > 0.1 && summary.error_rate < 0.5);
        let approx = engine.get_approx();
        assert!(approx.check_integrity().is_ok());
        let has_inverter = (0..=approx.max_id())
            .filter_map(|id| approx.get_node(id))
            .any(|node| node.borrow().is_inv());
        assert!(has_inverter);
    }

    #[test]
    fn runs_are_deterministic() {
        let ntk = inverter_chain();
        let mut first = Dals::new(&ntk).unwrap();
        let mut second = Dals::new(&ntk).unwrap();
        first.set_sim_words(8);
        second.set_sim_words(8);
        let s1 = first.run(0.2).unwrap();
        let s2 = second.run(0.2).unwrap();
        assert_eq!(s1, s2);
        assert!(first.get_approx().structural_eq(second.get_approx()));
    }

    #[test]
    fn c17_end_to_end() {
        let c17 = "\
INPUT(1)
INPUT(2)
INPUT(3)
INPUT(6)
INPUT(7)
OUTPUT(22)
OUTPUT(23)
10 = NAND(1, 3)
11 = NAND(3, 6)
16 = NAND(2, 11)
19 = NAND(11, 7)
22 = NAND(10, 16)
23 = NAND(16, 19)
";
        let ntk = Ntk::from_bench(Cursor::new(c17.as_bytes())).unwrap();
        let mut engine = Dals::new(&ntk).unwrap();
        engine.set_sim_words(16);
        let summary = engine.run(0.1).unwrap();

        assert_eq!(summary.reference_depth, 3);
        assert!(summary.rounds >= 1);
        assert!(summary.substitutions >= 1);
        assert!(summary.approx_depth <= summary.reference_depth);
        assert!((0.0..=1.0).contains(&summary.error_rate));
        assert!(engine.get_approx().check_integrity().is_ok());
        // the reference never moves
        assert!(engine.get_reference().structural_eq(&ntk));
    }
}
