//! Rate balancing for cyclic components
//!
//! Every distinct recipe in a component gets one unknown: its crafts per
//! second. Every member item gets one equation: what the component's
//! recipes make of it, minus what they consume of it, must equal the demand
//! arriving from outside the component. The system is solved by Gauss-Jordan
//! elimination. When it has more recipes than independent equations, every
//! choice of running recipes is tried and the best non-negative solution
//! wins: preferred recipes running first, then the least raw material drawn.

use std::cmp::Ordering;

use tracing::debug;

use crate::error::{CalcError, Result};
use crate::graph::{Component, ProductionGraph};
use crate::models::Recipe;

pub(crate) const EPSILON: f64 = 1e-9;

/// Outcome of [`solve_balance`].
#[derive(Debug, Clone, PartialEq)]
pub enum Balance {
    /// One value per column; free columns are zero.
    Solved { values: Vec<f64>, free: usize },
    /// Equation `row` cannot be met; `residual` is what is left over.
    Inconsistent { row: usize, residual: f64 },
    /// Consistent, but every solution runs some column backwards.
    Negative { column: usize, value: f64 },
}

/// Above this many candidate bases only the ordered solve is checked.
const MAX_BASES: usize = 20_000;

fn tolerance(matrix: &[Vec<f64>], rhs: &[f64]) -> f64 {
    let scale = matrix
        .iter()
        .flatten()
        .chain(rhs)
        .fold(1.0_f64, |acc, v| acc.max(v.abs()));
    EPSILON * scale
}

/// Solve `matrix * x = rhs`, pivoting columns in `column_order`.
///
/// `matrix` is row-major with one row per equation. Columns missing from
/// `column_order` are treated as free.
pub fn solve_balance(matrix: &[Vec<f64>], rhs: &[f64], column_order: &[usize]) -> Balance {
    let rows = matrix.len();
    let cols = matrix.first().map_or(0, Vec::len);

    let tolerance = tolerance(matrix, rhs);

    let mut a: Vec<Vec<f64>> = matrix
        .iter()
        .zip(rhs)
        .map(|(row, b)| {
            let mut augmented = row.clone();
            augmented.push(*b);
            augmented
        })
        .collect();
    let mut origin: Vec<usize> = (0..rows).collect();
    let mut pivots: Vec<(usize, usize)> = Vec::new();

    let mut next_row = 0;
    for &col in column_order {
        if next_row == rows {
            break;
        }
        let Some(best) = (next_row..rows).max_by(|&x, &y| {
            a[x][col]
                .abs()
                .partial_cmp(&a[y][col].abs())
                .unwrap_or(Ordering::Equal)
        }) else {
            break;
        };
        if a[best][col].abs() <= tolerance {
            continue;
        }

        a.swap(next_row, best);
        origin.swap(next_row, best);

        let pivot = a[next_row][col];
        for v in a[next_row].iter_mut() {
            *v /= pivot;
        }
        for r in 0..rows {
            if r == next_row {
                continue;
            }
            let factor = a[r][col];
            if factor == 0.0 {
                continue;
            }
            for c in 0..=cols {
                let delta = factor * a[next_row][c];
                a[r][c] -= delta;
            }
        }

        pivots.push((next_row, col));
        next_row += 1;
    }

    for r in next_row..rows {
        if a[r][cols].abs() > tolerance {
            return Balance::Inconsistent {
                row: origin[r],
                residual: a[r][cols],
            };
        }
    }

    let mut values = vec![0.0; cols];
    for &(row, col) in &pivots {
        values[col] = a[row][cols];
    }
    Balance::Solved {
        values,
        free: cols - pivots.len(),
    }
}

/// Non-negative solution of `matrix * x = rhs`.
///
/// Every set of `rank` columns, taken in `column_order`, is tried as the set
/// of running columns. Feasible solutions are ranked by which `preferred`
/// columns run (earlier entries matter more), then by `cost . x`, then by
/// enumeration order. Values within tolerance of zero are returned as zero.
pub fn solve_nonnegative(
    matrix: &[Vec<f64>],
    rhs: &[f64],
    column_order: &[usize],
    preferred: &[usize],
    cost: &[f64],
) -> Balance {
    let tolerance = tolerance(matrix, rhs);
    let cols = matrix.first().map_or(0, Vec::len);

    let ordered = match solve_balance(matrix, rhs, column_order) {
        Balance::Solved { values, free } => (values, free),
        other => return other,
    };
    let rank = cols - ordered.1;

    let mut best: Option<(Vec<bool>, f64, Vec<f64>)> = None;
    let mut consider = |values: Vec<f64>| {
        if values.iter().any(|v| *v < -tolerance || !v.is_finite()) {
            return;
        }
        let values: Vec<f64> = values
            .into_iter()
            .map(|v| if v <= tolerance { 0.0 } else { v })
            .collect();
        let idle: Vec<bool> = preferred.iter().map(|&c| values[c] == 0.0).collect();
        let total: f64 = values.iter().zip(cost).map(|(x, c)| x * c).sum();
        let better = match &best {
            None => true,
            Some((best_idle, best_total, _)) => match idle.cmp(best_idle) {
                Ordering::Less => true,
                Ordering::Equal => *best_total - total > tolerance,
                Ordering::Greater => false,
            },
        };
        if better {
            best = Some((idle, total, values));
        }
    };

    if ordered.1 == 0 || binomial(column_order.len(), rank) > MAX_BASES {
        consider(ordered.0.clone());
    } else {
        let mut picks: Vec<usize> = (0..rank).collect();
        loop {
            let basis: Vec<usize> = picks.iter().map(|&p| column_order[p]).collect();
            if let Balance::Solved { values, .. } = solve_balance(matrix, rhs, &basis) {
                consider(values);
            }
            if !next_combination(&mut picks, column_order.len()) {
                break;
            }
        }
    }

    match best {
        Some((_, _, values)) => Balance::Solved {
            values,
            free: ordered.1,
        },
        None => {
            let (column, value) = ordered
                .0
                .iter()
                .copied()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap_or((0, f64::NAN));
            Balance::Negative { column, value }
        }
    }
}

fn binomial(n: usize, k: usize) -> usize {
    let k = k.min(n.saturating_sub(k));
    (0..k).fold(1usize, |acc, i| acc.saturating_mul(n - i) / (i + 1))
}

/// Advance `picks` to the next k-subset of `0..n` in lexicographic order.
fn next_combination(picks: &mut [usize], n: usize) -> bool {
    let k = picks.len();
    for i in (0..k).rev() {
        if picks[i] < n - k + i {
            picks[i] += 1;
            for j in i + 1..k {
                picks[j] = picks[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

/// Crafts per second for each recipe of a cyclic component.
///
/// `external` holds, per node, the demand placed on it by consumers outside
/// the component (including the request itself for the target).
pub fn solve_component<'c>(
    graph: &ProductionGraph<'c>,
    component: &Component,
    external: &[f64],
    preference: &[String],
) -> Result<Vec<(&'c Recipe, f64)>> {
    let members = &component.nodes;
    let items: Vec<String> = members
        .iter()
        .map(|&idx| graph.node(idx).item.id.clone())
        .collect();

    let mut recipes: Vec<&'c Recipe> = Vec::new();
    for &idx in members {
        if let Some(recipe) = graph.node(idx).recipe {
            if !recipes.iter().any(|r| r.id == recipe.id) {
                recipes.push(recipe);
            }
        }
    }

    let matrix: Vec<Vec<f64>> = items
        .iter()
        .map(|item| recipes.iter().map(|r| r.net_of(item)).collect())
        .collect();
    let rhs: Vec<f64> = members.iter().map(|&idx| external[idx]).collect();
    let order = column_order(graph, &recipes, preference);
    let preferred: Vec<usize> = preference
        .iter()
        .filter_map(|p| recipes.iter().position(|r| r.id == *p))
        .collect();
    let cost: Vec<f64> = recipes.iter().map(|r| raw_draw(graph, r)).collect();

    let values = match solve_nonnegative(&matrix, &rhs, &order, &preferred, &cost) {
        Balance::Solved { values, free } => {
            if free > 0 {
                debug!(?items, free, "underdetermined cycle, idling free recipes");
            }
            values
        }
        Balance::Inconsistent { row, residual } => {
            return Err(CalcError::UnsolvableCycle {
                reason: format!(
                    "{} cannot be balanced ({residual:+.4}/s unaccounted for)",
                    items[row]
                ),
                items,
            });
        }
        Balance::Negative { column, value } => {
            return Err(CalcError::UnsolvableCycle {
                reason: format!(
                    "no non-negative balance; recipe {} would have to run at {value:.4} crafts/s",
                    recipes[column].id
                ),
                items,
            });
        }
    };

    let rates: Vec<(&'c Recipe, f64)> = recipes.into_iter().zip(values).collect();

    debug!(
        ?items,
        rates = ?rates.iter().map(|(r, x)| (r.id.as_str(), *x)).collect::<Vec<_>>(),
        "cycle balanced"
    );
    Ok(rates)
}

/// Raw material drawn by one craft.
fn raw_draw(graph: &ProductionGraph<'_>, recipe: &Recipe) -> f64 {
    recipe
        .ingredients
        .iter()
        .filter(|(item, _)| {
            graph
                .node_of(item)
                .is_some_and(|idx| graph.node(idx).item.is_raw)
        })
        .map(|(_, amount)| amount)
        .sum()
}

/// Preferred recipes first, then those drawing the least raw material per
/// unit of output, then discovery order.
fn column_order(graph: &ProductionGraph<'_>, recipes: &[&Recipe], preference: &[String]) -> Vec<usize> {
    let rank = |recipe: &Recipe| {
        preference
            .iter()
            .position(|p| *p == recipe.id)
            .unwrap_or(preference.len())
    };
    let per_output = |recipe: &Recipe| {
        let out: f64 = recipe.outputs.iter().map(|(_, amount)| amount).sum();
        raw_draw(graph, recipe) / out
    };

    let mut order: Vec<usize> = (0..recipes.len()).collect();
    order.sort_by(|&x, &y| {
        rank(recipes[x])
            .cmp(&rank(recipes[y]))
            .then_with(|| per_output(recipes[x]).total_cmp(&per_output(recipes[y])))
            .then_with(|| x.cmp(&y))
    });
    order
}
