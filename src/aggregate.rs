//! Demand propagation and machine counts
//!
//! Components are visited consumers-first, so by the time a component is
//! reached every demand placed on it from outside is final. Acyclic nodes
//! turn their accumulated demand straight into crafts; cyclic components are
//! handed to the cycle solver and folded back as ordinary recipe rates.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::cycle::{self, EPSILON};
use crate::error::{CalcError, Result};
use crate::graph::{NodeIndex, ProductionGraph};

/// Push `rate` of the target through the graph.
///
/// Fills in every node's `required_rate` and returns crafts per second for
/// every recipe that runs.
pub fn propagate(
    graph: &mut ProductionGraph<'_>,
    rate: f64,
    cycle_preference: &[String],
) -> Result<BTreeMap<String, f64>> {
    let mut external = vec![0.0; graph.len()];
    external[graph.target] = rate;
    let mut recipe_rates = BTreeMap::new();

    let components = graph.components.clone();
    for component in &components {
        if !component.cyclic {
            let idx = component.nodes[0];
            let demand = checked(graph, idx, external[idx])?;
            let node = &mut graph.nodes[idx];
            node.required_rate = demand;
            if demand == 0.0 {
                continue;
            }
            let (Some(recipe), Some(out)) = (node.recipe, node.output_per_craft()) else {
                continue;
            };
            recipe_rates.insert(recipe.id.clone(), demand / out);
            for edge in &node.ingredients {
                external[edge.ingredient] += demand * edge.weight;
            }
            continue;
        }

        let rates = cycle::solve_component(graph, component, &external, cycle_preference)?;

        for &idx in &component.nodes {
            let item = graph.nodes[idx].item;
            let produced: f64 = rates
                .iter()
                .map(|(recipe, x)| x * recipe.output_of(&item.id).unwrap_or(0.0))
                .sum();
            graph.nodes[idx].required_rate = checked(graph, idx, produced)?;
        }

        for (recipe, x) in &rates {
            // Idle recipes stay out of the report
            if *x == 0.0 {
                continue;
            }
            recipe_rates.insert(recipe.id.clone(), *x);
            for (ingredient, per_craft) in &recipe.ingredients {
                let Some(target) = graph.node_of(ingredient) else {
                    continue;
                };
                if !component.nodes.contains(&target) {
                    external[target] += x * per_craft;
                }
            }
        }
    }

    debug!(recipes = recipe_rates.len(), "demand propagated");
    Ok(recipe_rates)
}

fn checked(graph: &ProductionGraph<'_>, idx: NodeIndex, rate: f64) -> Result<f64> {
    if !rate.is_finite() || rate < -EPSILON {
        return Err(CalcError::InvalidRate {
            item: graph.node(idx).item.id.clone(),
            rate,
        });
    }
    Ok(if rate.abs() <= EPSILON { 0.0 } else { rate })
}

/// Assign ideal and practical machine counts.
///
/// A recipe's machines are counted once, on the first node (in component
/// order) that chose it; later nodes sharing the recipe point at that owner.
pub fn count_machines(graph: &mut ProductionGraph<'_>, recipe_rates: &BTreeMap<String, f64>) {
    let order: Vec<NodeIndex> = graph
        .components
        .iter()
        .flat_map(|c| c.nodes.iter().copied())
        .collect();

    let mut owners: HashMap<String, NodeIndex> = HashMap::new();
    for idx in order {
        let Some(recipe) = graph.nodes[idx].recipe else {
            continue;
        };
        if let Some(&owner) = owners.get(&recipe.id) {
            graph.nodes[idx].machine_owner = Some(owner);
            continue;
        }
        owners.insert(recipe.id.clone(), idx);

        let crafts = recipe_rates.get(&recipe.id).copied().unwrap_or(0.0);
        // crafts * time == rate * time / output for the node's own item
        let ideal = crafts * recipe.craft_time;
        let node = &mut graph.nodes[idx];
        node.ideal_machines = ideal;
        node.practical_machines = practical(ideal);
    }
}

/// Round a fractional machine count up, ignoring float noise.
pub fn practical(ideal: f64) -> u64 {
    let rounded = (ideal - EPSILON).ceil();
    if rounded > 0.0 { rounded as u64 } else { 0 }
}
