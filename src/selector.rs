//! Recipe selection when an item has more than one producer

use std::collections::BTreeMap;

use crate::error::{CalcError, Result};
use crate::models::Recipe;

/// Caller-supplied item -> recipe identifier choices.
pub type Overrides = BTreeMap<String, String>;

/// Picks the one recipe used to make an item during graph expansion.
///
/// Implementations must be pure: the same inputs always yield the same
/// recipe, so that repeated resolutions agree.
pub trait RecipeSelector {
    fn select<'c>(
        &self,
        item: &str,
        candidates: &[&'c Recipe],
        overrides: &Overrides,
    ) -> Result<&'c Recipe>;
}

/// Override, then sole candidate, then the recipe named after the item.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSelector;

impl RecipeSelector for DefaultSelector {
    fn select<'c>(
        &self,
        item: &str,
        candidates: &[&'c Recipe],
        overrides: &Overrides,
    ) -> Result<&'c Recipe> {
        select(item, candidates, overrides)
    }
}

/// The default selection policy as a plain function.
pub fn select<'c>(
    item: &str,
    candidates: &[&'c Recipe],
    overrides: &Overrides,
) -> Result<&'c Recipe> {
    if let Some(chosen) = apply_override(item, candidates, overrides)? {
        return Ok(chosen);
    }

    match candidates {
        [] => Err(CalcError::NoProducer {
            item: item.to_string(),
        }),
        [only] => Ok(*only),
        _ => candidates
            .iter()
            .copied()
            .find(|r| r.id == item)
            .ok_or_else(|| ambiguous(item, candidates)),
    }
}

fn apply_override<'c>(
    item: &str,
    candidates: &[&'c Recipe],
    overrides: &Overrides,
) -> Result<Option<&'c Recipe>> {
    let Some(wanted) = overrides.get(item) else {
        return Ok(None);
    };
    candidates
        .iter()
        .copied()
        .find(|r| &r.id == wanted)
        .map(Some)
        .ok_or_else(|| CalcError::InvalidOverride {
            item: item.to_string(),
            recipe: wanted.clone(),
        })
}

fn ambiguous(item: &str, candidates: &[&Recipe]) -> CalcError {
    CalcError::AmbiguousRecipe {
        item: item.to_string(),
        candidates: candidates.iter().map(|r| r.id.clone()).collect(),
    }
}

/// Prefers the candidate yielding the most of the item per unit of
/// ingredients consumed. Overrides still win; exact ties fall back to the
/// earlier candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostOutputPerInput;

impl MostOutputPerInput {
    fn yield_of(recipe: &Recipe, item: &str) -> f64 {
        let out = recipe.output_of(item).unwrap_or(0.0);
        let input: f64 = recipe.ingredients.iter().map(|(_, amount)| amount).sum();
        if input > 0.0 { out / input } else { f64::INFINITY }
    }
}

impl RecipeSelector for MostOutputPerInput {
    fn select<'c>(
        &self,
        item: &str,
        candidates: &[&'c Recipe],
        overrides: &Overrides,
    ) -> Result<&'c Recipe> {
        if let Some(chosen) = apply_override(item, candidates, overrides)? {
            return Ok(chosen);
        }

        let mut best: Option<(&'c Recipe, f64)> = None;
        for &candidate in candidates {
            let score = Self::yield_of(candidate, item);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((candidate, score)),
            }
        }
        best.map(|(recipe, _)| recipe)
            .ok_or_else(|| CalcError::NoProducer {
                item: item.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oil_recipes() -> Vec<Recipe> {
        vec![
            Recipe::new("BasicOilProcessing", 5.0)
                .with_output("BasicOilProcessing", 1.0)
                .with_output("PetroleumGas", 45.0)
                .with_ingredient("CrudeOil", 100.0),
            Recipe::new("AdvancedOilProcessing", 5.0)
                .with_output("AdvancedOilProcessing", 1.0)
                .with_output("PetroleumGas", 55.0)
                .with_ingredient("CrudeOil", 100.0)
                .with_ingredient("Water", 50.0),
        ]
    }

    #[test]
    fn single_candidate_is_taken() {
        let recipes = oil_recipes();
        let candidates = vec![&recipes[0]];
        let chosen = select("PetroleumGas", &candidates, &Overrides::new()).unwrap();
        assert_eq!(chosen.id, "BasicOilProcessing");
    }

    #[test]
    fn same_name_wins_among_many() {
        let mut recipes = oil_recipes();
        recipes.push(
            Recipe::new("PetroleumGas", 2.0)
                .with_output("PetroleumGas", 20.0)
                .with_ingredient("LightOil", 30.0),
        );
        let candidates: Vec<_> = recipes.iter().collect();
        let chosen = select("PetroleumGas", &candidates, &Overrides::new()).unwrap();
        assert_eq!(chosen.id, "PetroleumGas");
    }

    #[test]
    fn ambiguity_is_an_error() {
        let recipes = oil_recipes();
        let candidates: Vec<_> = recipes.iter().collect();
        let err = select("PetroleumGas", &candidates, &Overrides::new()).unwrap_err();
        assert_eq!(
            err,
            CalcError::AmbiguousRecipe {
                item: "PetroleumGas".into(),
                candidates: vec!["BasicOilProcessing".into(), "AdvancedOilProcessing".into()],
            }
        );
    }

    #[test]
    fn override_resolves_ambiguity() {
        let recipes = oil_recipes();
        let candidates: Vec<_> = recipes.iter().collect();
        let overrides =
            Overrides::from([("PetroleumGas".to_string(), "AdvancedOilProcessing".to_string())]);
        let chosen = DefaultSelector
            .select("PetroleumGas", &candidates, &overrides)
            .unwrap();
        assert_eq!(chosen.id, "AdvancedOilProcessing");
    }

    #[test]
    fn override_must_name_a_candidate() {
        let recipes = oil_recipes();
        let candidates: Vec<_> = recipes.iter().collect();
        let overrides = Overrides::from([("PetroleumGas".to_string(), "Fracking".to_string())]);
        assert!(matches!(
            select("PetroleumGas", &candidates, &overrides),
            Err(CalcError::InvalidOverride { .. })
        ));
    }

    #[test]
    fn yield_policy_prefers_efficient_recipe() {
        let recipes = oil_recipes();
        let candidates: Vec<_> = recipes.iter().collect();
        // 45/100 beats 55/150
        let chosen = MostOutputPerInput
            .select("PetroleumGas", &candidates, &Overrides::new())
            .unwrap();
        assert_eq!(chosen.id, "BasicOilProcessing");
    }
}
