//! Database schema and operations

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::catalog::RecipeCatalog;
use crate::models::{Item, Recipe};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            is_raw INTEGER NOT NULL,
            is_fluid INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recipes (
            id TEXT PRIMARY KEY,
            craft_time REAL NOT NULL,
            facility TEXT
        );

        -- ordinal 0 is the primary output
        CREATE TABLE IF NOT EXISTS recipe_outputs (
            recipe_id TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            item_id TEXT NOT NULL,
            amount REAL NOT NULL,
            PRIMARY KEY (recipe_id, item_id)
        );

        CREATE TABLE IF NOT EXISTS recipe_ingredients (
            recipe_id TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            item_id TEXT NOT NULL,
            amount REAL NOT NULL,
            PRIMARY KEY (recipe_id, item_id)
        );

        CREATE INDEX IF NOT EXISTS idx_recipe_outputs_item ON recipe_outputs(item_id);
        CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_item ON recipe_ingredients(item_id);
        "#,
    )?;
    Ok(())
}

/// Remove every stored item and recipe
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_ingredients;
        DELETE FROM recipe_outputs;
        DELETE FROM recipes;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

pub fn upsert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items (id, is_raw, is_fluid) VALUES (?1, ?2, ?3)",
        (&item.id, item.is_raw, item.is_fluid),
    )?;
    Ok(())
}

/// Insert or replace a recipe along with its outputs and ingredients
pub fn upsert_recipe(conn: &Connection, recipe: &Recipe) -> Result<()> {
    conn.execute(
        "DELETE FROM recipe_outputs WHERE recipe_id = ?1",
        [&recipe.id],
    )?;
    conn.execute(
        "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
        [&recipe.id],
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO recipes (id, craft_time, facility) VALUES (?1, ?2, ?3)",
        (&recipe.id, recipe.craft_time, &recipe.facility),
    )?;

    for (ordinal, (item, amount)) in recipe.outputs.iter().enumerate() {
        conn.execute(
            "INSERT INTO recipe_outputs (recipe_id, ordinal, item_id, amount)
             VALUES (?1, ?2, ?3, ?4)",
            (&recipe.id, ordinal as i64, item, amount),
        )?;
    }
    for (ordinal, (item, amount)) in recipe.ingredients.iter().enumerate() {
        conn.execute(
            "INSERT INTO recipe_ingredients (recipe_id, ordinal, item_id, amount)
             VALUES (?1, ?2, ?3, ?4)",
            (&recipe.id, ordinal as i64, item, amount),
        )?;
    }
    Ok(())
}

/// Replace the stored catalog with `catalog`
pub fn store_catalog(conn: &Connection, catalog: &RecipeCatalog) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    clear_catalog(&tx)?;
    for item in catalog.items() {
        upsert_item(&tx, item)?;
    }
    for recipe in catalog.recipes() {
        upsert_recipe(&tx, recipe)?;
    }
    tx.commit()?;

    info!(
        items = catalog.item_count(),
        recipes = catalog.recipe_count(),
        "catalog stored"
    );
    Ok(())
}

/// Rebuild a validated catalog from the stored rows
pub fn load_catalog(conn: &Connection) -> Result<RecipeCatalog> {
    let items = list_items(conn)?;

    let mut recipes = Vec::new();
    for id in list_recipes(conn)? {
        if let Some(recipe) = get_recipe(conn, &id)? {
            recipes.push(recipe);
        }
    }

    RecipeCatalog::new(items, recipes).context("Stored recipe data is inconsistent")
}

/// List all items in the database
pub fn list_items(conn: &Connection) -> Result<Vec<Item>> {
    let mut stmt = conn.prepare("SELECT id, is_raw, is_fluid FROM items ORDER BY id")?;

    let rows = stmt.query_map([], |row| {
        Ok(Item {
            id: row.get(0)?,
            is_raw: row.get(1)?,
            is_fluid: row.get(2)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// List all non-raw items some recipe outputs
pub fn list_producible_items(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT o.item_id
         FROM recipe_outputs o
         JOIN items i ON i.id = o.item_id
         WHERE i.is_raw = 0
         ORDER BY o.item_id",
    )?;

    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn list_recipes(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM recipes ORDER BY id")?;

    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Get a recipe with its outputs and ingredients in stored order
pub fn get_recipe(conn: &Connection, id: &str) -> Result<Option<Recipe>> {
    let header = conn
        .query_row(
            "SELECT id, craft_time, facility FROM recipes WHERE id = ?1",
            [id],
            |row| {
                Ok(Recipe {
                    id: row.get(0)?,
                    outputs: Vec::new(),
                    ingredients: Vec::new(),
                    craft_time: row.get(1)?,
                    facility: row.get(2)?,
                })
            },
        )
        .optional()?;

    let Some(mut recipe) = header else {
        return Ok(None);
    };
    recipe.outputs = get_quantities(conn, "recipe_outputs", id)?;
    recipe.ingredients = get_quantities(conn, "recipe_ingredients", id)?;
    Ok(Some(recipe))
}

fn get_quantities(conn: &Connection, table: &str, recipe_id: &str) -> Result<Vec<(String, f64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT item_id, amount FROM {table} WHERE recipe_id = ?1 ORDER BY ordinal"
    ))?;

    let rows = stmt.query_map([recipe_id], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Get all recipes that produce a given item, with the amount per craft
pub fn get_producers(conn: &Connection, item_id: &str) -> Result<Vec<(String, f64)>> {
    let mut stmt = conn.prepare(
        "SELECT recipe_id, amount FROM recipe_outputs WHERE item_id = ?1 ORDER BY recipe_id",
    )?;

    let rows = stmt.query_map([item_id], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = open();
        init_schema(&conn).unwrap();
        assert!(list_items(&conn).unwrap().is_empty());
    }

    #[test]
    fn catalog_survives_a_round_trip() {
        let conn = open();
        let catalog = import::sample_catalog().unwrap();
        store_catalog(&conn, &catalog).unwrap();

        let loaded = load_catalog(&conn).unwrap();
        assert_eq!(loaded.item_count(), catalog.item_count());
        assert_eq!(loaded.recipe_count(), catalog.recipe_count());
        for recipe in catalog.recipes() {
            assert_eq!(loaded.recipe(&recipe.id), Some(recipe));
        }
    }

    #[test]
    fn output_order_is_preserved() {
        let conn = open();
        let recipe = Recipe::new("CoalLiquefaction", 5.0)
            .with_facility("OilRefinery")
            .with_output("HeavyOil", 90.0)
            .with_output("LightOil", 20.0)
            .with_output("PetroleumGas", 10.0)
            .with_ingredient("Steam", 50.0)
            .with_ingredient("Coal", 10.0);
        upsert_recipe(&conn, &recipe).unwrap();

        assert_eq!(get_recipe(&conn, "CoalLiquefaction").unwrap(), Some(recipe));
        assert_eq!(get_recipe(&conn, "Missing").unwrap(), None);
        assert_eq!(
            get_producers(&conn, "LightOil").unwrap(),
            vec![("CoalLiquefaction".to_string(), 20.0)]
        );
    }

    #[test]
    fn producible_items_exclude_raw() {
        let conn = open();
        let catalog = import::sample_catalog().unwrap();
        store_catalog(&conn, &catalog).unwrap();

        let producible = list_producible_items(&conn).unwrap();
        assert!(producible.contains(&"ElectronicCircuit".to_string()));
        assert!(producible.contains(&"HeavyOil".to_string()));
        assert!(!producible.contains(&"IronOre".to_string()));
    }

    #[test]
    fn storing_replaces_previous_contents() {
        let conn = open();
        upsert_item(&conn, &Item::raw("Wood")).unwrap();
        store_catalog(&conn, &import::sample_catalog().unwrap()).unwrap();

        let items = list_items(&conn).unwrap();
        assert!(items.iter().all(|i| i.id != "Wood"));
        clear_catalog(&conn).unwrap();
        assert!(list_recipes(&conn).unwrap().is_empty());
    }
}
