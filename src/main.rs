//! Factorio Production Calculator
//!
//! A production chain calculator for Factorio.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use factorio_calculator::calculator::{self, Resolver};
use factorio_calculator::config::CalculatorConfig;
use factorio_calculator::models::DemandRequest;
use factorio_calculator::{db, facility, import, input, logging, RecipeCatalog};

#[derive(Parser)]
#[command(name = "factorio-calculator")]
#[command(about = "Production chain calculator for Factorio")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "factorio_data.db")]
    database: PathBuf,

    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "calculator.toml")]
    config: PathBuf,

    /// Log resolution details to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a YAML recipe table, or a directory of them
    Import {
        /// Path to a recipe file or directory
        path: PathBuf,

        /// Clear existing data before importing
        #[arg(long)]
        clear: bool,
    },

    /// Calculate production chain for a target item
    Calc {
        /// Target item to produce (e.g., "Electronic Circuit", "PlasticBar")
        item: String,

        /// Target rate: 10, 10/s, 600/min, 2/h or 1/3
        #[arg(default_value = "1")]
        rate: String,

        /// Recipe to use for an item, as Item=Recipe
        #[arg(long = "use", value_name = "ITEM=RECIPE")]
        overrides: Vec<String>,

        /// Recipe to keep running when a cycle leaves a choice
        #[arg(long, value_name = "RECIPE")]
        prefer: Vec<String>,

        /// Read recipes from a YAML file instead of the database
        #[arg(long)]
        recipes: Option<PathBuf>,

        /// Show detailed production tree
        #[arg(short, long)]
        verbose: bool,

        /// Show buildings per tier, belts and pipes
        #[arg(short, long)]
        facilities: bool,
    },

    /// List all items in the database
    ListItems,

    /// List all recipes in the database
    ListRecipes,

    /// Show details for a specific recipe
    Recipe {
        /// Recipe ID
        id: String,
    },

    /// Initialize empty database with schema
    Init,

    /// Load the bundled vanilla recipes
    LoadSample,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Import { path, clear } => {
            if clear {
                println!("Clearing existing data...");
                db::clear_catalog(&conn)?;
            }

            let (catalog, stats) = import::load_catalog(&path)?;
            db::store_catalog(&conn, &catalog)?;
            println!("{}", stats);
        }

        Commands::Calc {
            item,
            rate,
            overrides,
            prefer,
            recipes,
            verbose,
            facilities,
        } => {
            let catalog = match recipes {
                Some(path) => import::load_catalog(&path)?.0,
                None => {
                    if db::list_recipes(&conn)?.is_empty() {
                        println!("No recipes in database. Run 'import' or 'load-sample' first.");
                        return Ok(());
                    }
                    db::load_catalog(&conn)?
                }
            };
            let config = CalculatorConfig::load_or_default(&cli.config)
                .with_context(|| format!("Failed to load {}", cli.config.display()))?;

            let overrides = overrides
                .iter()
                .map(|o| input::parse_override(o))
                .collect::<Result<Vec<_>>>()?;
            let prefer = prefer.iter().map(|r| input::normalize_item_name(r));
            let options = config.resolve_options(overrides, prefer);

            let demand = DemandRequest::new(input::normalize_item_name(&item), input::parse_rate(&rate)?);
            let report = resolve(&catalog, &demand, &options)?;

            if verbose {
                println!("Production chain:\n");
                println!("{}", calculator::format_production_chain(&report));
            }

            println!("{}", report);

            if facilities {
                let plan = facility::plan(&report, &config.facility_table(), &config.logistics);
                println!("{}", plan);
            }
        }

        Commands::ListItems => {
            let items = db::list_items(&conn)?;
            if items.is_empty() {
                println!("No items in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<30} {:>6} {:>6}", "Item", "Raw", "Fluid");
                println!("{}", "-".repeat(44));
                for i in items {
                    let mark = |flag: bool| if flag { "yes" } else { "" };
                    println!("{:<30} {:>6} {:>6}", i.id, mark(i.is_raw), mark(i.is_fluid));
                }
            }
        }

        Commands::ListRecipes => {
            let recipes = db::list_recipes(&conn)?;
            if recipes.is_empty() {
                println!("No recipes in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("Recipes:");
                for r in recipes {
                    println!("  {}", r);
                }
            }
        }

        Commands::Recipe { id } => {
            let id = input::normalize_item_name(&id);
            match db::get_recipe(&conn, &id)? {
                Some(r) => {
                    println!("Recipe: {}", r.id);
                    println!("  Time: {}s", r.craft_time);
                    println!("  Facility: {}", r.facility.as_deref().unwrap_or("-"));

                    if !r.ingredients.is_empty() {
                        println!("  Ingredients:");
                        for (item, amount) in &r.ingredients {
                            println!("    {} x{}", item, amount);
                        }
                    }
                    println!("  Outputs:");
                    for (item, amount) in &r.outputs {
                        println!("    {} x{}", item, amount);
                    }

                    let producers = db::get_producers(&conn, &id)?;
                    let others: Vec<_> = producers.iter().filter(|(p, _)| *p != id).collect();
                    if !others.is_empty() {
                        println!("  Also made by:");
                        for (producer, amount) in others {
                            println!("    {} (x{})", producer, amount);
                        }
                    }
                }
                None => println!("Recipe '{}' not found", id),
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            let catalog = import::sample_catalog()?;
            db::store_catalog(&conn, &catalog)?;
            println!(
                "Loaded {} items and {} recipes",
                catalog.item_count(),
                catalog.recipe_count()
            );
        }
    }

    Ok(())
}

fn resolve(
    catalog: &RecipeCatalog,
    demand: &DemandRequest,
    options: &calculator::ResolveOptions,
) -> Result<factorio_calculator::Report> {
    Resolver::new(catalog)
        .resolve(demand, options)
        .with_context(|| format!("Cannot produce {} @ {}/s", demand.item, demand.rate))
}
