//! Error types of the fragmentation core.
//!
//! Every concern has its own enum; [`Error`] aggregates them for callers that
//! do not care which stage failed.

use thiserror::Error;

/// Problems with chemical formula or adduct notation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("unknown element: {0}")]
    UnknownElement(String),

    #[error("unexpected character '{0}' in formula")]
    UnexpectedCharacter(char),

    #[error("invalid element count: {0}")]
    InvalidCount(String),

    #[error("negative count {count} for element {element}")]
    NegativeCount { element: String, count: i32 },

    #[error("invalid ionization notation: {0}")]
    InvalidIonization(String),
}

/// Setup errors, raised before any graph is built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("scorer {scorer} has a non-finite multiplier ({multiplier})")]
    NonFiniteMultiplier { scorer: String, multiplier: f64 },

    #[error("scorer {0} is registered twice")]
    DuplicateScorer(String),

    #[error("invalid measurement profile: {0}")]
    InvalidProfile(String),

    #[error("invalid scoring setting: {0}")]
    InvalidSetting(String),

    #[error(transparent)]
    Formula(#[from] FormulaError),
}

/// Rejected peak lists.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("peak index {0} is used more than once")]
    DuplicatePeak(usize),

    #[error("peak {index} is invalid: {reason}")]
    InvalidPeak { index: usize, reason: String },

    #[error("peak {peak} is marked as isotope of unknown or isotopic peak {parent}")]
    UnknownIsotopeParent { peak: usize, parent: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Structural violations of a fragmentation graph.
///
/// These are programming errors: a graph produced by the builder never
/// triggers them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("fragment {0} is not part of the graph")]
    UnknownFragment(usize),

    #[error("loss {source_id} -> {target} points into the root")]
    LossIntoRoot { source_id: usize, target: usize },

    #[error("loss {source_id} -> {target} violates the topological fragment order")]
    NotTopological { source_id: usize, target: usize },

    #[error("fragment {target} is not a proper sub-formula of fragment {source_id}")]
    NotASubFormula { source_id: usize, target: usize },

    #[error("loss {source_id} -> {target} has non-finite weight {weight}")]
    NonFiniteWeight { source_id: usize, target: usize, weight: f64 },

    #[error("selected losses contain no edge leaving the root")]
    MissingRootEdge,

    #[error("selected loss {loss} hangs off fragment {source_id} which is not in the tree")]
    DetachedLoss { loss: usize, source_id: usize },

    #[error("isotope loss {loss} has no non-isotope ancestor in the tree")]
    DetachedIsotope { loss: usize },
}

/// Failures while encoding or decoding a tree.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error(transparent)]
    Encode(#[from] bincode::error::EncodeError),

    #[error(transparent)]
    Decode(#[from] bincode::error::DecodeError),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, Error>;
