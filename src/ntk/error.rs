use thiserror::Error;

use super::NodeId;

/// Shorthand for netlist operations, which all fail with [`NtkError`].
pub type Result<T> = std::result::Result<T, NtkError>;

/// How a netlist operation can go wrong.
#[derive(Debug, Error)]
pub enum NtkError {
    /// The requested id is already taken by another node.
    #[error("id {0} is already taken by a different node")]
    DuplicateId(NodeId),

    /// Only the constant may sit at id 0.
    #[error("id=0 is reserved for the constant node")]
    IdZeroButNotConst,

    /// Lookup of an id with no live node behind it.
    #[error("no node with id={0}")]
    NodeDoesNotExist(NodeId),

    /// A fanin list of the wrong length was supplied for a node kind.
    #[error("node {node} takes {expected} fanins, got {got}")]
    FaninArity {
        node: NodeId,
        expected: usize,
        got: usize,
    },

    /// A structural invariant was broken, which points at a bug in the
    /// mutation code rather than at the caller.
    #[error("netlist invariant broken: {0}")]
    InvalidState(String),

    /// Just forwarding a [`ParserError`].
    #[error("{0}")]
    Parser(#[from] ParserError),
}

/// How reading or writing a netlist file can go wrong. Lives here so it can
/// be public while the `parser` module stays private.
#[derive(Debug, Error)]
pub enum ParserError {
    /// The file uses something outside the combinational BENCH/BLIF subsets.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A line did not have the shape the format calls for.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// A gate or output references a signal that is never defined.
    #[error("undefined signal: {0}")]
    UndefinedSignal(String),

    /// The underlying file could not be opened, read or written.
    #[error("io error: {0}")]
    Io(String),
}
