//! Production chain calculator logic

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use tracing::info;

use crate::aggregate;
use crate::catalog::RecipeCatalog;
use crate::error::{CalcError, Result};
use crate::graph::{build_graph, ProductionGraph};
use crate::models::{DemandRequest, NodeReport, Report};
use crate::selector::{DefaultSelector, Overrides, RecipeSelector};

/// Caller choices that steer a resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOptions {
    /// Item -> recipe to use for it.
    pub overrides: Overrides,
    /// Recipes to keep running when a cycle leaves a choice, most wanted first.
    pub cycle_preference: Vec<String>,
}

impl ResolveOptions {
    pub fn with_override(mut self, item: impl Into<String>, recipe: impl Into<String>) -> Self {
        self.overrides.insert(item.into(), recipe.into());
        self
    }

    pub fn prefer(mut self, recipe: impl Into<String>) -> Self {
        self.cycle_preference.push(recipe.into());
        self
    }
}

/// Resolves demands against one catalog with a fixed selection policy.
///
/// Holds nothing mutable; one resolver can serve any number of calls.
#[derive(Debug, Clone)]
pub struct Resolver<'c, S = DefaultSelector> {
    catalog: &'c RecipeCatalog,
    selector: S,
}

impl<'c> Resolver<'c> {
    pub fn new(catalog: &'c RecipeCatalog) -> Self {
        Self {
            catalog,
            selector: DefaultSelector,
        }
    }
}

impl<'c, S: RecipeSelector> Resolver<'c, S> {
    pub fn with_selector<T: RecipeSelector>(self, selector: T) -> Resolver<'c, T> {
        Resolver {
            catalog: self.catalog,
            selector,
        }
    }

    pub fn catalog(&self) -> &'c RecipeCatalog {
        self.catalog
    }

    /// Expand, balance and total the chain needed for `demand`.
    pub fn resolve(&self, demand: &DemandRequest, options: &ResolveOptions) -> Result<Report> {
        if !(demand.rate.is_finite() && demand.rate > 0.0) {
            return Err(CalcError::InvalidRate {
                item: demand.item.clone(),
                rate: demand.rate,
            });
        }

        let mut graph = build_graph(
            self.catalog,
            &self.selector,
            &options.overrides,
            &demand.item,
        )?;
        let recipe_rates =
            aggregate::propagate(&mut graph, demand.rate, &options.cycle_preference)?;
        aggregate::count_machines(&mut graph, &recipe_rates);

        let raw_totals = collect_raw_totals(&graph);
        let report = build_report(&graph, demand, recipe_rates, raw_totals);

        info!(
            item = %demand.item,
            rate = demand.rate,
            nodes = report.nodes.len(),
            machines = report.total_practical_machines(),
            "chain resolved"
        );
        Ok(report)
    }
}

/// Calculate the production chain for a target item at a given rate
/// with the default selection policy.
pub fn calculate_production_chain(
    catalog: &RecipeCatalog,
    target_item: &str,
    rate: f64,
    options: &ResolveOptions,
) -> Result<Report> {
    Resolver::new(catalog).resolve(&DemandRequest::new(target_item, rate), options)
}

/// Sum the rate of every raw node.
pub fn collect_raw_totals(graph: &ProductionGraph<'_>) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for node in &graph.nodes {
        if node.item.is_raw && node.required_rate > 0.0 {
            *totals.entry(node.item.id.clone()).or_insert(0.0) += node.required_rate;
        }
    }
    totals
}

fn build_report(
    graph: &ProductionGraph<'_>,
    demand: &DemandRequest,
    recipe_rates: BTreeMap<String, f64>,
    raw_totals: BTreeMap<String, f64>,
) -> Report {
    let mut nodes = Vec::with_capacity(graph.len());

    for component in &graph.components {
        for &idx in &component.nodes {
            let node = graph.node(idx);
            // Left idle by a cycle balance
            if node.required_rate <= 0.0 {
                continue;
            }

            let ingredients = match (node.recipe, node.machine_owner) {
                (Some(recipe), None) => {
                    let crafts = recipe_rates.get(&recipe.id).copied().unwrap_or(0.0);
                    recipe
                        .ingredients
                        .iter()
                        .filter(|(_, amount)| *amount > 0.0 && crafts > 0.0)
                        .map(|(item, amount)| (item.clone(), crafts * amount))
                        .collect()
                }
                _ => Vec::new(),
            };

            nodes.push(NodeReport {
                item: node.item.id.clone(),
                recipe: node.recipe.map(|r| r.id.clone()),
                facility: node.recipe.and_then(|r| r.facility.clone()),
                is_fluid: node.item.is_fluid,
                required_rate: node.required_rate,
                ideal_machines: node.ideal_machines,
                practical_machines: node.practical_machines,
                shares_machines_with: node
                    .machine_owner
                    .map(|owner| graph.node(owner).item.id.clone()),
                ingredients,
            });
        }
    }

    Report {
        target: demand.item.clone(),
        rate: demand.rate,
        nodes,
        recipe_rates,
        raw_totals,
    }
}

/// Format a production chain as an indented tree, target at the root.
///
/// Items already shown elsewhere are referenced instead of repeated.
pub fn format_production_chain(report: &Report) -> String {
    let mut output = String::new();
    let mut printed = HashSet::new();
    let mut path = Vec::new();
    format_node(report, &report.target, 0, &mut path, &mut printed, &mut output);
    output
}

fn format_node<'r>(
    report: &'r Report,
    item: &'r str,
    indent: usize,
    path: &mut Vec<&'r str>,
    printed: &mut HashSet<&'r str>,
    output: &mut String,
) {
    let prefix = "  ".repeat(indent);
    let Some(node) = report.node(item) else {
        return;
    };

    if node.is_raw() {
        output.push_str(&format!(
            "{}→ {} @ {:.3}/s (raw input)\n",
            prefix, node.item, node.required_rate
        ));
        return;
    }
    if path.contains(&item) {
        output.push_str(&format!("{}↺ {} (cycle)\n", prefix, node.item));
        return;
    }
    if !printed.insert(item) {
        output.push_str(&format!(
            "{}{} @ {:.3}/s (see above)\n",
            prefix, node.item, node.required_rate
        ));
        return;
    }

    let recipe = node.recipe.as_deref().unwrap_or("?");
    match &node.shares_machines_with {
        Some(owner) => output.push_str(&format!(
            "{}{} @ {:.3}/s (made by {} machines for {})\n",
            prefix, node.item, node.required_rate, recipe, owner
        )),
        None => output.push_str(&format!(
            "{}{:.2}x {} for {} @ {:.3}/s\n",
            prefix, node.ideal_machines, recipe, node.item, node.required_rate
        )),
    }

    path.push(item);
    for (ingredient, rate) in &node.ingredients {
        output.push_str(&format!("{}  needs {} @ {:.3}/s\n", prefix, ingredient, rate));
        format_node(report, ingredient, indent + 2, path, printed, output);
    }
    path.pop();
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Production Summary ===")?;
        writeln!(f, "Target: {} @ {:.3}/s", self.target, self.rate)?;
        writeln!(f)?;

        writeln!(f, "Production steps:")?;
        writeln!(
            f,
            "  {:<28} {:<24} {:>10} {:>9} {:>6}",
            "Item", "Recipe", "Rate/s", "Machines", "Built"
        )?;
        for node in self.nodes.iter().filter(|n| !n.is_raw()) {
            let recipe = node.recipe.as_deref().unwrap_or("");
            let name = if node.is_fluid {
                format!("{} (fluid)", node.item)
            } else {
                node.item.clone()
            };
            match &node.shares_machines_with {
                Some(owner) => writeln!(
                    f,
                    "  {:<28} {:<24} {:>10.3} {:>16}",
                    name,
                    recipe,
                    node.required_rate,
                    format!("see {owner}")
                )?,
                None => writeln!(
                    f,
                    "  {:<28} {:<24} {:>10.3} {:>9.2} {:>6}",
                    name, recipe, node.required_rate, node.ideal_machines, node.practical_machines
                )?,
            }
        }
        writeln!(f)?;

        writeln!(f, "Raw inputs required:")?;
        let mut raw: Vec<_> = self.raw_totals.iter().collect();
        raw.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (item, rate) in raw {
            writeln!(f, "  {} @ {:.3}/s", item, rate)?;
        }
        writeln!(f)?;

        writeln!(f, "Machines: {} in total", self.total_practical_machines())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, Recipe};

    fn circuits() -> RecipeCatalog {
        let items = vec![
            Item::raw("IronOre"),
            Item::raw("CopperOre"),
            Item::intermediate("IronPlate"),
            Item::intermediate("CopperPlate"),
            Item::intermediate("CopperCable"),
            Item::intermediate("ElectronicCircuit"),
        ];
        let recipes = vec![
            Recipe::new("IronPlate", 3.2)
                .with_output("IronPlate", 1.0)
                .with_ingredient("IronOre", 1.0)
                .with_facility("Furnace"),
            Recipe::new("CopperPlate", 3.2)
                .with_output("CopperPlate", 1.0)
                .with_ingredient("CopperOre", 1.0)
                .with_facility("Furnace"),
            Recipe::new("CopperCable", 0.5)
                .with_output("CopperCable", 2.0)
                .with_ingredient("CopperPlate", 1.0),
            Recipe::new("ElectronicCircuit", 0.5)
                .with_output("ElectronicCircuit", 1.0)
                .with_ingredient("CopperCable", 3.0)
                .with_ingredient("IronPlate", 1.0),
        ];
        RecipeCatalog::new(items, recipes).unwrap()
    }

    #[test]
    fn rejects_non_positive_rates() {
        let catalog = circuits();
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = calculate_production_chain(
                &catalog,
                "ElectronicCircuit",
                rate,
                &ResolveOptions::default(),
            )
            .unwrap_err();
            assert!(matches!(err, CalcError::InvalidRate { .. }));
        }
    }

    #[test]
    fn report_lists_target_first() {
        let catalog = circuits();
        let report =
            calculate_production_chain(&catalog, "ElectronicCircuit", 10.0, &ResolveOptions::default())
                .unwrap();

        assert_eq!(report.nodes[0].item, "ElectronicCircuit");
        assert_eq!(report.nodes.len(), 6);
        assert_eq!(report.recipe_rates["CopperCable"], 15.0);
        assert_eq!(
            report.node("ElectronicCircuit").unwrap().ingredients,
            vec![("CopperCable".to_string(), 30.0), ("IronPlate".to_string(), 10.0)]
        );
    }

    #[test]
    fn tree_and_summary_render() {
        let catalog = circuits();
        let report =
            calculate_production_chain(&catalog, "ElectronicCircuit", 10.0, &ResolveOptions::default())
                .unwrap();

        let tree = format_production_chain(&report);
        assert!(tree.starts_with("5.00x ElectronicCircuit for ElectronicCircuit @ 10.000/s"));
        assert!(tree.contains("needs CopperCable @ 30.000/s"));
        assert!(tree.contains("→ CopperOre @ 15.000/s (raw input)"));

        let summary = report.to_string();
        assert!(summary.contains("Target: ElectronicCircuit @ 10.000/s"));
        assert!(summary.contains("CopperOre @ 15.000/s"));
        assert!(summary.contains("IronOre @ 10.000/s"));
    }
}
