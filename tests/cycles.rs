use factorio_calculator::aggregate;
use factorio_calculator::graph::build_graph;
use factorio_calculator::import::sample_catalog;
use factorio_calculator::{
    calculate_production_chain, logging, CalcError, DefaultSelector, Item, Recipe, RecipeCatalog,
    ResolveOptions,
};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9 * b.abs().max(1.0)
}

/// Two intermediates that each need the other, with a pair of recipes
/// that can each cover both.
fn tangled() -> RecipeCatalog {
    let items = vec![
        Item::raw("X"),
        Item::raw("Y"),
        Item::intermediate("A"),
        Item::intermediate("B"),
        Item::intermediate("T"),
    ];
    let recipes = vec![
        Recipe::new("A", 1.0)
            .with_output("A", 2.0)
            .with_output("B", 2.0)
            .with_ingredient("B", 1.0)
            .with_ingredient("X", 1.0),
        Recipe::new("B", 1.0)
            .with_output("B", 2.0)
            .with_output("A", 5.0)
            .with_ingredient("A", 1.0)
            .with_ingredient("Y", 1.0),
        Recipe::new("T", 1.0)
            .with_output("T", 1.0)
            .with_ingredient("A", 2.0)
            .with_ingredient("B", 1.0),
    ];
    RecipeCatalog::new(items, recipes).unwrap()
}

fn liquefaction() -> ResolveOptions {
    ResolveOptions::default().with_override("HeavyOil", "CoalLiquefaction")
}

#[test]
fn liquefaction_feeds_itself() {
    logging::init_test();
    let catalog = sample_catalog().unwrap();
    let report = calculate_production_chain(&catalog, "LightOil", 30.0, &liquefaction()).unwrap();

    // 90 out, 25 back in, 40 to cracking per light oil craft
    let crafts = 40.0 / 65.0;
    assert!(close(report.recipe_rates["CoalLiquefaction"], crafts));
    assert!(close(report.node("HeavyOil").unwrap().required_rate, 90.0 * crafts));
    assert!(close(report.raw_totals["Coal"], 10.0 * crafts));
    assert!(close(report.raw_totals["Steam"], 50.0 * crafts));
    assert!(close(report.raw_totals["Water"], 30.0));
}

#[test]
fn cycle_members_balance_exactly() {
    let catalog = sample_catalog().unwrap();
    let options = liquefaction();
    for (target, rate) in [("LightOil", 30.0), ("Lubricant", 7.0), ("RocketFuel", 0.25)] {
        let mut graph =
            build_graph(&catalog, &DefaultSelector, &options.overrides, target).unwrap();
        assert!(graph.cycles().count() > 0, "{target} should contain a cycle");

        let recipe_rates = aggregate::propagate(&mut graph, rate, &[]).unwrap();

        for component in graph.cycles() {
            for &idx in &component.nodes {
                let item = &graph.node(idx).item.id;
                let net: f64 = recipe_rates
                    .iter()
                    .map(|(id, x)| x * catalog.recipe(id).unwrap().net_of(item))
                    .sum();
                let expected = if idx == graph.target { rate } else { 0.0 };
                assert!(
                    (net - expected).abs() < 1e-6,
                    "{item} nets {net} for {target}, expected {expected}"
                );
            }
        }
    }
}

#[test]
fn underdetermined_cycle_leaves_one_recipe_idle() {
    let catalog = tangled();
    let report =
        calculate_production_chain(&catalog, "T", 1.0, &ResolveOptions::default()).unwrap();

    assert!(close(report.recipe_rates["B"], 0.5));
    assert!(!report.recipe_rates.contains_key("A"));
    assert!(report.raw_totals.contains_key("Y"));
    assert!(!report.raw_totals.contains_key("X"));
}

#[test]
fn preference_picks_the_running_recipe() {
    let catalog = tangled();
    let options = ResolveOptions::default().prefer("A");
    let report = calculate_production_chain(&catalog, "T", 1.0, &options).unwrap();

    assert!(close(report.recipe_rates["A"], 1.0));
    assert!(!report.recipe_rates.contains_key("B"));
    assert!(close(report.raw_totals["X"], 1.0));
    assert!(!report.raw_totals.contains_key("Y"));
}

#[test]
fn shared_recipe_machines_are_counted_once() {
    let items = vec![
        Item::raw("Ore"),
        Item::intermediate("P"),
        Item::intermediate("Q"),
        Item::intermediate("Kit"),
    ];
    let recipes = vec![
        Recipe::new("Split", 2.0)
            .with_output("P", 1.0)
            .with_output("Q", 1.0)
            .with_ingredient("Ore", 1.0),
        Recipe::new("Kit", 1.0)
            .with_output("Kit", 1.0)
            .with_ingredient("P", 1.0)
            .with_ingredient("Q", 1.0),
    ];
    let catalog = RecipeCatalog::new(items, recipes).unwrap();
    let report =
        calculate_production_chain(&catalog, "Kit", 3.0, &ResolveOptions::default()).unwrap();

    assert!(close(report.recipe_rates["Split"], 3.0));
    assert!(close(report.raw_totals["Ore"], 3.0));

    let p = report.node("P").unwrap();
    let q = report.node("Q").unwrap();
    assert_eq!(p.shares_machines_with, None);
    assert_eq!(p.practical_machines, 6);
    assert_eq!(q.shares_machines_with.as_deref(), Some("P"));
    assert_eq!(report.total_practical_machines(), 6 + 3);
}

/// Three items feeding each other where only one of the three recipes can
/// run forwards.
fn three_way() -> RecipeCatalog {
    let items = vec![
        Item::raw("X"),
        Item::intermediate("A"),
        Item::intermediate("B"),
        Item::intermediate("C"),
        Item::intermediate("T"),
    ];
    let recipes = vec![
        // net (A, B, C) = (1, 0, 1)
        Recipe::new("A", 1.0)
            .with_output("A", 1.0)
            .with_output("B", 1.0)
            .with_output("C", 2.0)
            .with_ingredient("B", 1.0)
            .with_ingredient("C", 1.0)
            .with_ingredient("X", 1.0),
        // net (1, 1, 2)
        Recipe::new("B", 1.0)
            .with_output("B", 1.0)
            .with_output("A", 2.0)
            .with_output("C", 2.0)
            .with_ingredient("A", 1.0),
        // net (0, 1, 1)
        Recipe::new("C", 1.0)
            .with_output("C", 1.0)
            .with_output("B", 2.0)
            .with_ingredient("B", 1.0),
        Recipe::new("T", 1.0)
            .with_output("T", 1.0)
            .with_ingredient("A", 1.0)
            .with_ingredient("C", 1.0),
    ];
    RecipeCatalog::new(items, recipes).unwrap()
}

#[test]
fn cycle_finds_the_only_forward_balance() {
    let catalog = three_way();
    let report =
        calculate_production_chain(&catalog, "T", 1.0, &ResolveOptions::default()).unwrap();

    assert!(close(report.recipe_rates["A"], 1.0));
    assert!(!report.recipe_rates.contains_key("B"));
    assert!(!report.recipe_rates.contains_key("C"));
    assert!(close(report.raw_totals["X"], 1.0));
    assert!(report.recipe_rates.values().all(|x| x.is_sign_positive()));
}

#[test]
fn preferring_an_infeasible_recipe_still_balances() {
    let catalog = three_way();
    let options = ResolveOptions::default().prefer("C");
    let report = calculate_production_chain(&catalog, "T", 1.0, &options).unwrap();

    assert!(close(report.recipe_rates["A"], 1.0));
    assert!(!report.recipe_rates.contains_key("C"));
}

#[test]
fn cycle_with_no_forward_balance_fails() {
    // Every A eats three C and every C eats one A
    let items = vec![
        Item::intermediate("A"),
        Item::intermediate("C"),
        Item::intermediate("T"),
    ];
    let recipes = vec![
        Recipe::new("A", 1.0)
            .with_output("A", 1.0)
            .with_ingredient("C", 3.0),
        Recipe::new("C", 1.0)
            .with_output("C", 1.0)
            .with_ingredient("A", 1.0),
        Recipe::new("T", 1.0)
            .with_output("T", 1.0)
            .with_ingredient("A", 1.0)
            .with_ingredient("C", 1.0),
    ];
    let catalog = RecipeCatalog::new(items, recipes).unwrap();
    let err =
        calculate_production_chain(&catalog, "T", 1.0, &ResolveOptions::default()).unwrap_err();
    assert!(matches!(err, CalcError::UnsolvableCycle { .. }));
}
