//! Facility tiers and transport logistics
//!
//! A report's machine counts assume crafting speed 1. Real buildings come in
//! tiers with different speeds, and every item has to be moved on belts or,
//! for fluids, through pipes. This module turns a report into per-facility
//! and per-carrier counts.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::aggregate::practical;
use crate::models::Report;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tier {
    pub name: String,
    pub speed: f64,
}

impl Tier {
    pub fn new(name: impl Into<String>, speed: f64) -> Self {
        Self {
            name: name.into(),
            speed,
        }
    }
}

/// Buildings able to run recipes assigned to one facility.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FacilityTiers {
    pub tiers: Vec<Tier>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Belt {
    pub name: String,
    pub items_per_second: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Logistics {
    pub belts: Vec<Belt>,
    /// Fluid units per second one pipe carries.
    pub pipe_throughput: f64,
}

impl Default for Logistics {
    fn default() -> Self {
        let belt = |name: &str, items_per_second| Belt {
            name: name.to_string(),
            items_per_second,
        };
        Self {
            belts: vec![belt("Yellow", 15.0), belt("Red", 30.0), belt("Blue", 45.0)],
            pipe_throughput: 12000.0,
        }
    }
}

/// Vanilla facility speeds.
pub fn default_facilities() -> BTreeMap<String, FacilityTiers> {
    let am1 = Tier::new("AssemblingMachine1", 0.5);
    let am2 = Tier::new("AssemblingMachine2", 0.75);
    let am3 = Tier::new("AssemblingMachine3", 1.25);
    let group = |tiers: Vec<Tier>| FacilityTiers { tiers };

    BTreeMap::from([
        (
            "AssemblingMachine".to_string(),
            group(vec![am1, am2.clone(), am3.clone()]),
        ),
        (
            "AssemblingMachine2".to_string(),
            group(vec![am2, am3.clone()]),
        ),
        ("AssemblingMachine3".to_string(), group(vec![am3])),
        (
            "Furnace".to_string(),
            group(vec![
                Tier::new("StoneFurnace", 0.5),
                Tier::new("SteelFurnace", 1.0),
            ]),
        ),
        (
            "ChemicalPlant".to_string(),
            group(vec![Tier::new("ChemicalPlant", 1.0)]),
        ),
    ])
}

/// One item's count per tier or carrier.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRow {
    pub item: String,
    pub counts: Vec<f64>,
}

/// A titled block of rows sharing the same columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSection {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<PlanRow>,
}

impl PlanSection {
    /// Per-column sums of rounded-up counts.
    pub fn totals(&self) -> Vec<u64> {
        (0..self.columns.len())
            .map(|c| self.rows.iter().map(|r| practical(r.counts[c])).sum())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacilityPlan {
    pub sections: Vec<PlanSection>,
}

impl FacilityPlan {
    pub fn section(&self, title: &str) -> Option<&PlanSection> {
        self.sections.iter().find(|s| s.title == title)
    }
}

/// Break a report down into buildings per tier, belts and pipes.
///
/// Facilities missing from `facilities` are listed with one tier of the same
/// name at speed 1.
pub fn plan(
    report: &Report,
    facilities: &BTreeMap<String, FacilityTiers>,
    logistics: &Logistics,
) -> FacilityPlan {
    let mut by_facility: BTreeMap<String, PlanSection> = BTreeMap::new();
    let mut raw = PlanSection {
        title: "Raw Materials".to_string(),
        columns: vec!["Rate".to_string()],
        rows: Vec::new(),
    };
    let mut belts = PlanSection {
        title: "Belts".to_string(),
        columns: logistics.belts.iter().map(|b| b.name.clone()).collect(),
        rows: Vec::new(),
    };
    let mut pipes = PlanSection {
        title: "Pipes".to_string(),
        columns: vec!["Pipes".to_string()],
        rows: Vec::new(),
    };

    for node in &report.nodes {
        if node.is_raw() {
            raw.rows.push(PlanRow {
                item: node.item.clone(),
                counts: vec![node.required_rate],
            });
        } else if node.shares_machines_with.is_none() {
            let facility = node.facility.as_deref().unwrap_or("Unassigned");
            let tiers = facilities
                .get(facility)
                .map(|f| f.tiers.clone())
                .unwrap_or_else(|| vec![Tier::new(facility, 1.0)]);
            let section = by_facility
                .entry(facility.to_string())
                .or_insert_with(|| PlanSection {
                    title: facility.to_string(),
                    columns: tiers.iter().map(|t| t.name.clone()).collect(),
                    rows: Vec::new(),
                });
            section.rows.push(PlanRow {
                item: node.item.clone(),
                counts: tiers.iter().map(|t| node.ideal_machines / t.speed).collect(),
            });
        }

        if node.is_fluid {
            pipes.rows.push(PlanRow {
                item: node.item.clone(),
                counts: vec![node.required_rate / logistics.pipe_throughput],
            });
        } else {
            belts.rows.push(PlanRow {
                item: node.item.clone(),
                counts: logistics
                    .belts
                    .iter()
                    .map(|b| node.required_rate / b.items_per_second)
                    .collect(),
            });
        }
    }

    let mut sections = vec![raw];
    sections.extend(by_facility.into_values());
    sections.push(pipes);
    sections.push(belts);

    for section in &mut sections {
        // Largest last column first
        section.rows.sort_by(|a, b| {
            let last = |r: &PlanRow| r.counts.last().copied().unwrap_or(0.0);
            last(b).total_cmp(&last(a)).then_with(|| a.item.cmp(&b.item))
        });
    }
    sections.retain(|s| !s.rows.is_empty());

    FacilityPlan { sections }
}

impl fmt::Display for FacilityPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            write!(f, "{:<26}", section.title)?;
            for column in &section.columns {
                write!(f, "{:>20}", column)?;
            }
            writeln!(f)?;
            writeln!(f, "{}", "=".repeat(section.title.len()))?;

            for row in &section.rows {
                write!(f, "{:<26}", row.item)?;
                for count in &row.counts {
                    write!(f, "{:>20.2}", count)?;
                }
                writeln!(f)?;
            }

            write!(f, "{:<26}", "Total")?;
            for total in section.totals() {
                write!(f, "{:>20}", total)?;
            }
            writeln!(f)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeReport;

    fn node(item: &str, recipe: Option<&str>, facility: Option<&str>, rate: f64, ideal: f64) -> NodeReport {
        NodeReport {
            item: item.to_string(),
            recipe: recipe.map(str::to_string),
            facility: facility.map(str::to_string),
            is_fluid: false,
            required_rate: rate,
            ideal_machines: ideal,
            practical_machines: practical(ideal),
            shares_machines_with: None,
            ingredients: Vec::new(),
        }
    }

    fn report() -> Report {
        let mut gas = node("PetroleumGas", Some("PetroleumGas"), Some("ChemicalPlant"), 6000.0, 3.0);
        gas.is_fluid = true;
        Report {
            target: "ElectronicCircuit".into(),
            rate: 10.0,
            nodes: vec![
                node("ElectronicCircuit", Some("ElectronicCircuit"), Some("AssemblingMachine"), 10.0, 5.0),
                node("IronPlate", Some("IronPlate"), Some("Furnace"), 10.0, 32.0),
                node("IronOre", None, None, 10.0, 0.0),
                gas,
            ],
            recipe_rates: BTreeMap::new(),
            raw_totals: BTreeMap::from([("IronOre".to_string(), 10.0)]),
        }
    }

    #[test]
    fn assemblers_scale_by_tier_speed() {
        let plan = plan(&report(), &default_facilities(), &Logistics::default());
        let assemblers = plan.section("AssemblingMachine").unwrap();
        assert_eq!(assemblers.columns.len(), 3);
        assert_eq!(assemblers.rows[0].counts, vec![10.0, 5.0 / 0.75, 4.0]);
        assert_eq!(assemblers.totals(), vec![10, 7, 4]);

        let furnaces = plan.section("Furnace").unwrap();
        assert_eq!(furnaces.rows[0].counts, vec![64.0, 32.0]);
    }

    #[test]
    fn fluids_go_through_pipes() {
        let plan = plan(&report(), &default_facilities(), &Logistics::default());
        let pipes = plan.section("Pipes").unwrap();
        assert_eq!(pipes.rows.len(), 1);
        assert_eq!(pipes.rows[0].counts, vec![0.5]);

        let belts = plan.section("Belts").unwrap();
        assert!(belts.rows.iter().all(|r| r.item != "PetroleumGas"));
        let ore = belts.rows.iter().find(|r| r.item == "IronOre").unwrap();
        assert_eq!(ore.counts[0], 10.0 / 15.0);
    }

    #[test]
    fn unknown_facility_runs_at_speed_one() {
        let mut report = report();
        report.nodes.push(node("RocketPart", Some("RocketPart"), Some("RocketSilo"), 1.0, 3.0));
        let plan = plan(&report, &default_facilities(), &Logistics::default());
        let silo = plan.section("RocketSilo").unwrap();
        assert_eq!(silo.columns, vec!["RocketSilo".to_string()]);
        assert_eq!(silo.rows[0].counts, vec![3.0]);
    }

    #[test]
    fn renders_sections_with_totals() {
        let text = plan(&report(), &default_facilities(), &Logistics::default()).to_string();
        assert!(text.contains("Raw Materials"));
        assert!(text.contains("AssemblingMachine3"));
        assert!(text.contains("Total"));
    }
}
