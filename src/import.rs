//! YAML recipe table import
//!
//! A table maps item names to entries:
//!
//! ```yaml
//! CopperCable:
//!   ingredients: {CopperPlate: 1}
//!   time: 0.5
//!   output: 2
//! CopperOre:
//!   production: Raw
//! ```
//!
//! `production: Raw` marks a raw material. An entry with no ingredients, no
//! time and no breakdown only declares an item that other entries produce as
//! a breakdown co-output. Every other entry becomes a recipe named after its
//! item, producing `output` of it plus everything in `breakdown`. With
//! `output: 0` and a breakdown the entry is a process (oil refining, say)
//! and no item of that name exists.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::catalog::RecipeCatalog;
use crate::error::CalcError;
use crate::models::{Item, Recipe};

pub const RAW_PRODUCTION: &str = "Raw";
pub const DEFAULT_FACILITY: &str = "AssemblingMachine";

/// Vanilla recipe table bundled with the binary.
pub const SAMPLE_RECIPES: &str = include_str!("../data/recipes.yml");

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecipeEntry {
    pub ingredients: BTreeMap<String, f64>,
    pub time: f64,
    pub production: Option<String>,
    pub output: f64,
    pub breakdown: BTreeMap<String, f64>,
    pub fluid: bool,
}

impl Default for RecipeEntry {
    fn default() -> Self {
        Self {
            ingredients: BTreeMap::new(),
            time: 0.0,
            production: None,
            output: 1.0,
            breakdown: BTreeMap::new(),
            fluid: false,
        }
    }
}

impl RecipeEntry {
    pub fn is_raw(&self) -> bool {
        self.production.as_deref() == Some(RAW_PRODUCTION)
    }

    /// Declares an item without giving it a recipe of its own.
    pub fn is_declaration(&self) -> bool {
        !self.is_raw()
            && self.ingredients.is_empty()
            && self.breakdown.is_empty()
            && self.time == 0.0
    }

    /// Produces only its breakdown, not an item of its own name.
    pub fn is_process(&self) -> bool {
        !self.is_raw() && self.output == 0.0 && !self.breakdown.is_empty()
    }
}

pub type RecipeTable = BTreeMap<String, RecipeEntry>;

/// Top-level goals that are not craftable items in the game data.
const META_RECIPES: &[(&str, &str, &[(&str, f64)])] = &[
    ("Rocket", "RocketSilo", &[("RocketPart", 100.0), ("Satellite", 1.0)]),
    (
        "Research",
        "Lab",
        &[
            ("AutomationSciencePack", 1.0),
            ("LogisticSciencePack", 1.0),
            ("MilitarySciencePack", 1.0),
            ("ChemicalSciencePack", 1.0),
            ("ProductionSciencePack", 1.0),
            ("UtilitySciencePack", 1.0),
        ],
    ),
];

/// Counts from one import.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportStats {
    pub files: usize,
    pub items: usize,
    pub raw: usize,
    pub recipes: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} items ({} raw) and {} recipes from {} file(s)",
            self.items, self.raw, self.recipes, self.files
        )
    }
}

pub fn parse_table(yaml: &str) -> Result<RecipeTable> {
    serde_yaml::from_str(yaml).context("invalid recipe table")
}

pub fn read_table(path: &Path) -> Result<RecipeTable> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_table(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Find all YAML recipe tables under `dir`, in path order.
pub fn find_recipe_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yml" || ext == "yaml");
        if entry.file_type().is_file() && is_yaml {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Read a single table, or every table in a directory merged into one.
///
/// An item defined in two files is an error.
pub fn read_tables(path: &Path) -> Result<(RecipeTable, usize)> {
    let files = if path.is_dir() {
        find_recipe_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut merged = RecipeTable::new();
    for file in &files {
        for (name, entry) in read_table(file)? {
            if merged.contains_key(&name) {
                return Err(CalcError::DuplicateItem { item: name })
                    .with_context(|| format!("while merging {}", file.display()));
            }
            merged.insert(name, entry);
        }
    }
    Ok((merged, files.len()))
}

/// Turn a recipe table into a validated catalog.
pub fn build_catalog(table: &RecipeTable) -> Result<RecipeCatalog, CalcError> {
    let mut items = Vec::with_capacity(table.len() + META_RECIPES.len());
    let mut recipes = Vec::new();

    for (name, entry) in table {
        if !entry.is_process() {
            items.push(Item {
                id: name.clone(),
                is_raw: entry.is_raw(),
                is_fluid: entry.fluid,
            });
        }

        if entry.is_raw() {
            if !entry.ingredients.is_empty() || !entry.breakdown.is_empty() {
                return Err(CalcError::InvalidRecipe {
                    recipe: name.clone(),
                    reason: "raw items cannot have ingredients or a breakdown".into(),
                });
            }
            continue;
        }
        if entry.is_declaration() {
            continue;
        }

        let facility = entry.production.as_deref().unwrap_or(DEFAULT_FACILITY);
        let mut recipe = Recipe::new(name.clone(), entry.time).with_facility(facility);
        if !entry.is_process() {
            recipe = recipe.with_output(name.clone(), entry.output);
        }
        for (co_output, amount) in &entry.breakdown {
            recipe = recipe.with_output(co_output.clone(), *amount);
        }
        for (ingredient, amount) in &entry.ingredients {
            recipe = recipe.with_ingredient(ingredient.clone(), *amount);
        }
        recipes.push(recipe);
    }

    for (name, facility, ingredients) in META_RECIPES {
        let available = ingredients.iter().all(|(i, _)| table.contains_key(*i));
        if table.contains_key(*name) || !available {
            continue;
        }
        items.push(Item::intermediate(*name));
        let mut recipe = Recipe::new(*name, 1.0)
            .with_facility(*facility)
            .with_output(*name, 1.0);
        for (ingredient, amount) in *ingredients {
            recipe = recipe.with_ingredient(*ingredient, *amount);
        }
        recipes.push(recipe);
    }

    RecipeCatalog::new(items, recipes)
}

/// Read a table file or directory into a catalog.
pub fn load_catalog(path: &Path) -> Result<(RecipeCatalog, ImportStats)> {
    let (table, files) = read_tables(path)?;
    let catalog = build_catalog(&table)
        .with_context(|| format!("Invalid recipe data in {}", path.display()))?;

    let stats = ImportStats {
        files,
        items: catalog.item_count(),
        raw: catalog.items().filter(|i| i.is_raw).count(),
        recipes: catalog.recipe_count(),
    };
    info!(path = %path.display(), %stats, "recipes imported");
    Ok((catalog, stats))
}

/// The bundled vanilla catalog.
pub fn sample_catalog() -> Result<RecipeCatalog> {
    let table = parse_table(SAMPLE_RECIPES)?;
    Ok(build_catalog(&table)?)
}
