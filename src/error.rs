//! Error taxonomy for catalog construction and chain resolution

use thiserror::Error;

/// Everything that can go wrong while building a catalog or resolving a chain.
///
/// A resolution either produces a complete report or fails with exactly one
/// of these; nothing is defaulted or retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("unknown item '{item}'")]
    UnknownItem { item: String },

    #[error("duplicate recipe '{recipe}'")]
    DuplicateRecipe { recipe: String },

    #[error("duplicate item '{item}'")]
    DuplicateItem { item: String },

    #[error("recipe '{recipe}' references undeclared item '{item}'")]
    DanglingIngredient { recipe: String, item: String },

    #[error("invalid recipe '{recipe}': {reason}")]
    InvalidRecipe { recipe: String, reason: String },

    #[error("item '{item}' is not raw but no recipe produces it")]
    NoProducer { item: String },

    #[error("item '{item}' has several recipes ({}); pick one with an override", candidates.join(", "))]
    AmbiguousRecipe {
        item: String,
        candidates: Vec<String>,
    },

    #[error("override for '{item}' names recipe '{recipe}', which does not produce it")]
    InvalidOverride { item: String, recipe: String },

    #[error("cannot balance cycle [{}]: {reason}", items.join(", "))]
    UnsolvableCycle { items: Vec<String>, reason: String },

    #[error("invalid rate {rate} for '{item}'")]
    InvalidRate { item: String, rate: f64 },
}

pub type Result<T, E = CalcError> = std::result::Result<T, E>;
