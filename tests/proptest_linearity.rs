use proptest::prelude::*;

use factorio_calculator::import::sample_catalog;
use factorio_calculator::{calculate_production_chain, ResolveOptions};

const TARGETS: &[&str] = &[
    "ElectronicCircuit",
    "AdvancedCircuit",
    "AutomationSciencePack",
    "LogisticSciencePack",
    "ChemicalSciencePack",
    "EngineUnit",
    "Satellite",
];

fn options() -> ResolveOptions {
    ResolveOptions::default().with_override("HeavyOil", "AdvancedOilProcessing")
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

proptest! {
    #[test]
    fn scaling_the_rate_scales_every_node(
        target in prop::sample::select(TARGETS),
        rate in 0.01f64..100.0,
        factor in 0.1f64..50.0,
    ) {
        let catalog = sample_catalog().unwrap();
        let base = calculate_production_chain(&catalog, target, rate, &options()).unwrap();
        let scaled = calculate_production_chain(&catalog, target, rate * factor, &options()).unwrap();

        prop_assert_eq!(base.nodes.len(), scaled.nodes.len());
        for (a, b) in base.nodes.iter().zip(&scaled.nodes) {
            prop_assert_eq!(&a.item, &b.item);
            prop_assert!(close(a.required_rate * factor, b.required_rate));
            prop_assert!(close(a.ideal_machines * factor, b.ideal_machines));
        }
        for (item, amount) in &base.raw_totals {
            prop_assert!(close(amount * factor, scaled.raw_totals[item]));
        }
    }

    #[test]
    fn practical_counts_cover_ideal(
        target in prop::sample::select(TARGETS),
        rate in 0.01f64..100.0,
    ) {
        let catalog = sample_catalog().unwrap();
        let report = calculate_production_chain(&catalog, target, rate, &options()).unwrap();

        for node in &report.nodes {
            let practical = node.practical_machines as f64;
            prop_assert!(practical + 1e-6 >= node.ideal_machines);
            prop_assert!(practical < node.ideal_machines + 1.0);
        }
    }
}
