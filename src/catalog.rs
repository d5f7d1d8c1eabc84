//! Immutable recipe catalog

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::{CalcError, Result};
use crate::models::{Item, Recipe};

/// Read-only view over items and the recipes that produce them.
///
/// Validated once on construction and never mutated afterwards, so a single
/// catalog can back any number of concurrent resolutions.
#[derive(Debug, Clone)]
pub struct RecipeCatalog {
    items: BTreeMap<String, Item>,
    recipes: Vec<Recipe>,
    recipe_index: HashMap<String, usize>,
    producers: HashMap<String, Vec<usize>>,
}

impl RecipeCatalog {
    /// Build a catalog, rejecting anything that is not self-contained.
    pub fn new(
        items: impl IntoIterator<Item = Item>,
        recipes: impl IntoIterator<Item = Recipe>,
    ) -> Result<Self> {
        let mut item_map = BTreeMap::new();
        for item in items {
            if item_map.contains_key(&item.id) {
                return Err(CalcError::DuplicateItem { item: item.id });
            }
            item_map.insert(item.id.clone(), item);
        }

        let mut catalog = Self {
            items: item_map,
            recipes: Vec::new(),
            recipe_index: HashMap::new(),
            producers: HashMap::new(),
        };

        for recipe in recipes {
            catalog.validate_recipe(&recipe)?;
            let idx = catalog.recipes.len();
            for (item, _) in &recipe.outputs {
                // Raw items stay leaves even if something happens to emit them.
                if !catalog.items[item].is_raw {
                    catalog.producers.entry(item.clone()).or_default().push(idx);
                }
            }
            catalog.recipe_index.insert(recipe.id.clone(), idx);
            catalog.recipes.push(recipe);
        }

        for item in catalog.items.values() {
            if !item.is_raw && !catalog.producers.contains_key(&item.id) {
                return Err(CalcError::NoProducer {
                    item: item.id.clone(),
                });
            }
        }

        debug!(
            items = catalog.items.len(),
            recipes = catalog.recipes.len(),
            "catalog built"
        );
        Ok(catalog)
    }

    fn validate_recipe(&self, recipe: &Recipe) -> Result<()> {
        let invalid = |reason: &str| CalcError::InvalidRecipe {
            recipe: recipe.id.clone(),
            reason: reason.to_string(),
        };

        if self.recipe_index.contains_key(&recipe.id) {
            return Err(CalcError::DuplicateRecipe {
                recipe: recipe.id.clone(),
            });
        }
        if self.items.get(&recipe.id).is_some_and(|item| item.is_raw) {
            return Err(invalid("shares its identifier with a raw item"));
        }
        if !(recipe.craft_time.is_finite() && recipe.craft_time > 0.0) {
            return Err(invalid("craft time must be positive"));
        }
        if recipe.outputs.is_empty() {
            return Err(invalid("has no outputs"));
        }

        for (item, amount) in &recipe.outputs {
            if !(amount.is_finite() && *amount > 0.0) {
                return Err(invalid(&format!("output {item} must be positive")));
            }
            self.check_declared(recipe, item)?;
        }
        for (item, amount) in &recipe.ingredients {
            if !(amount.is_finite() && *amount >= 0.0) {
                return Err(invalid(&format!("ingredient {item} must not be negative")));
            }
            self.check_declared(recipe, item)?;
        }
        Ok(())
    }

    fn check_declared(&self, recipe: &Recipe, item: &str) -> Result<()> {
        if self.items.contains_key(item) {
            Ok(())
        } else {
            Err(CalcError::DanglingIngredient {
                recipe: recipe.id.clone(),
                item: item.to_string(),
            })
        }
    }

    /// Recipes able to produce `item`, in catalog order. Empty for raw and
    /// unknown items.
    pub fn recipes_producing(&self, item: &str) -> Vec<&Recipe> {
        self.producers
            .get(item)
            .map(|ids| ids.iter().map(|&idx| &self.recipes[idx]).collect())
            .unwrap_or_default()
    }

    pub fn is_raw(&self, item: &str) -> bool {
        self.items.get(item).is_some_and(|i| i.is_raw)
    }

    pub fn is_fluid(&self, item: &str) -> bool {
        self.items.get(item).is_some_and(|i| i.is_fluid)
    }

    pub fn contains(&self, item: &str) -> bool {
        self.items.contains_key(item)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipe_index.get(id).map(|&idx| &self.recipes[idx])
    }

    /// All items, sorted by identifier.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// All recipes, in the order they were supplied.
    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }
}
