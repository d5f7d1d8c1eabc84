//! Data models for Factorio items, recipes and calculation results

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub is_raw: bool,
    pub is_fluid: bool,
}

impl Item {
    /// An item mined or pumped directly; it never has a recipe.
    pub fn raw(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_raw: true,
            is_fluid: false,
        }
    }

    pub fn intermediate(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_raw: false,
            is_fluid: false,
        }
    }

    pub fn fluid(mut self) -> Self {
        self.is_fluid = true;
        self
    }
}

/// A crafting transformation.
///
/// `outputs` holds the primary output first, followed by any breakdown
/// co-outputs. An item appears at most once in each list.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: String,
    pub outputs: Vec<(String, f64)>,
    pub ingredients: Vec<(String, f64)>,
    pub craft_time: f64,
    pub facility: Option<String>,
}

impl Recipe {
    pub fn new(id: impl Into<String>, craft_time: f64) -> Self {
        Self {
            id: id.into(),
            outputs: Vec::new(),
            ingredients: Vec::new(),
            craft_time,
            facility: None,
        }
    }

    /// Add an output. Repeating an item adds to its quantity.
    pub fn with_output(mut self, item: impl Into<String>, amount: f64) -> Self {
        merge_into(&mut self.outputs, item.into(), amount);
        self
    }

    pub fn with_ingredient(mut self, item: impl Into<String>, amount: f64) -> Self {
        merge_into(&mut self.ingredients, item.into(), amount);
        self
    }

    pub fn with_facility(mut self, facility: impl Into<String>) -> Self {
        self.facility = Some(facility.into());
        self
    }

    /// Quantity of `item` produced per craft.
    pub fn output_of(&self, item: &str) -> Option<f64> {
        self.outputs
            .iter()
            .find(|(id, _)| id == item)
            .map(|(_, amount)| *amount)
    }

    /// Quantity of `item` consumed per craft.
    pub fn ingredient_of(&self, item: &str) -> Option<f64> {
        self.ingredients
            .iter()
            .find(|(id, _)| id == item)
            .map(|(_, amount)| *amount)
    }

    pub fn primary_output(&self) -> Option<&(String, f64)> {
        self.outputs.first()
    }

    /// Net change of `item` per craft (outputs minus ingredients).
    pub fn net_of(&self, item: &str) -> f64 {
        self.output_of(item).unwrap_or(0.0) - self.ingredient_of(item).unwrap_or(0.0)
    }
}

fn merge_into(list: &mut Vec<(String, f64)>, item: String, amount: f64) {
    match list.iter_mut().find(|(id, _)| *id == item) {
        Some((_, existing)) => *existing += amount,
        None => list.push((item, amount)),
    }
}

/// A request for a net output rate of one item, in units per second.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandRequest {
    pub item: String,
    pub rate: f64,
}

impl DemandRequest {
    pub fn new(item: impl Into<String>, rate: f64) -> Self {
        Self {
            item: item.into(),
            rate,
        }
    }
}

/// One line of a production report.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReport {
    pub item: String,
    /// `None` for raw materials.
    pub recipe: Option<String>,
    pub facility: Option<String>,
    pub is_fluid: bool,
    /// Units per second this node must supply.
    pub required_rate: f64,
    pub ideal_machines: f64,
    pub practical_machines: u64,
    /// Set when another node runs the same recipe and owns its machines.
    pub shares_machines_with: Option<String>,
    /// Ingredient rates drawn by the machines this node owns.
    pub ingredients: Vec<(String, f64)>,
}

impl NodeReport {
    pub fn is_raw(&self) -> bool {
        self.recipe.is_none()
    }
}

/// Result of a production chain calculation
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub target: String,
    pub rate: f64,
    /// Target first, then every dependency in topological order.
    pub nodes: Vec<NodeReport>,
    /// Crafts per second for every recipe in use.
    pub recipe_rates: BTreeMap<String, f64>,
    pub raw_totals: BTreeMap<String, f64>,
}

impl Report {
    pub fn node(&self, item: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.item == item)
    }

    pub fn total_practical_machines(&self) -> u64 {
        self.nodes.iter().map(|n| n.practical_machines).sum()
    }
}
