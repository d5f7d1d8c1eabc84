//! Factorio production chain calculator
//!
//! Expands a target item and rate into the recipes, machines and raw
//! resources needed to sustain it, solving recipe cycles as linear systems.

pub mod aggregate;
pub mod calculator;
pub mod catalog;
pub mod config;
pub mod cycle;
pub mod db;
pub mod error;
pub mod facility;
pub mod graph;
pub mod import;
pub mod input;
pub mod logging;
pub mod models;
pub mod selector;

pub use calculator::{calculate_production_chain, ResolveOptions, Resolver};
pub use catalog::RecipeCatalog;
pub use error::{CalcError, Result};
pub use models::{DemandRequest, Item, NodeReport, Recipe, Report};
pub use selector::{DefaultSelector, MostOutputPerInput, RecipeSelector};
