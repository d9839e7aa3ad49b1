//! Delay-driven approximate logic synthesis.
//!
//! This crate trades a bounded amount of functional error for a shorter
//! critical path in a combinational netlist. The engine repeatedly replaces
//! timing-critical gates by earlier-arriving signals (possibly inverted),
//! keeping the simulated error rate against the original circuit below a
//! user-supplied constraint.
//!
//! The moving parts:
//! - [`Ntk`]: a mutable AND/inverter netlist with complemented edges,
//!   BENCH/BLIF I/O and structural hashing ([`ntk`])
//! - [`sim`]: bit-parallel truth-vector simulation and the simulated error
//!   rate between two netlists
//! - [`sta`]: unit-delay timing analysis and the critical subgraph
//! - [`alc`]: one substitution with do/undo semantics
//! - [`dinic`]: the max-flow/min-cut solver selecting a non-conflicting set
//!   of substitutions per round
//! - [`Dals`]: the optimization loop tying it all together ([`dals`])
//!
//! ```rust
//! use std::io::Cursor;
//! use dals::{Dals, Ntk};
//!
//! let src = "\
//! INPUT(a)
//! INPUT(b)
//! INPUT(c)
//! OUTPUT(f)
//! g = AND(a, b)
//! f = NAND(g, c)
//! ";
//! let ntk = Ntk::from_bench(Cursor::new(src.as_bytes())).unwrap();
//! let mut engine = Dals::new(&ntk).unwrap();
//! engine.set_sim_words(4);
//! let summary = engine.run(0.5).unwrap();
//! assert!(summary.approx_depth <= summary.reference_depth);
//! ```

pub mod alc;
pub mod dals;
pub mod dfs;
pub mod dinic;
pub mod dot;
pub mod ntk;
pub mod sim;
pub mod sta;

pub use alc::{Alc, AlcError, AlcState};
pub use dals::{Dals, DalsError, RunSummary};
pub use ntk::{NodeId, Ntk, NtkEdge, NtkError, NtkNode, NtkNodeRef, ParserError, Result};
