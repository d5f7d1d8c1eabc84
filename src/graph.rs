//! Dependency graph expansion
//!
//! A target item is expanded depth-first into one [`ProductionNode`] per
//! distinct item. Nodes are memoized by item identifier, so an ingredient
//! shared by several consumers is expanded once and its demand accumulates.
//! Reaching an item that is still on the expansion path closes a cycle; the
//! edge is recorded and expansion stops there.
//!
//! Once expanded, nodes are grouped into components with Tarjan's algorithm.
//! Items whose chosen recipe is the same recipe are linked both ways before
//! grouping: they share one production rate and must be balanced together.

use std::collections::HashMap;

use tracing::debug;

use crate::catalog::RecipeCatalog;
use crate::error::{CalcError, Result};
use crate::models::{Item, Recipe};
use crate::selector::{Overrides, RecipeSelector};

pub type NodeIndex = usize;

/// Consumer -> ingredient link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub ingredient: NodeIndex,
    /// Ingredient consumed per craft of the consumer's recipe.
    pub per_craft: f64,
    /// Ingredient rate required per unit of the consumer's output rate.
    pub weight: f64,
}

/// One item in a resolution, owned by the graph that created it.
#[derive(Debug, Clone)]
pub struct ProductionNode<'c> {
    pub item: &'c Item,
    /// `None` for raw materials.
    pub recipe: Option<&'c Recipe>,
    pub ingredients: Vec<Edge>,
    pub required_rate: f64,
    pub ideal_machines: f64,
    pub practical_machines: u64,
    /// Node owning the machines of a recipe this node shares.
    pub machine_owner: Option<NodeIndex>,
}

impl<'c> ProductionNode<'c> {
    fn new(item: &'c Item, recipe: Option<&'c Recipe>) -> Self {
        Self {
            item,
            recipe,
            ingredients: Vec::new(),
            required_rate: 0.0,
            ideal_machines: 0.0,
            practical_machines: 0,
            machine_owner: None,
        }
    }

    /// How many of this node's item one craft of its recipe yields.
    pub fn output_per_craft(&self) -> Option<f64> {
        self.recipe.and_then(|r| r.output_of(&self.item.id))
    }
}

/// A group of nodes that is resolved as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Members in discovery order.
    pub nodes: Vec<NodeIndex>,
    /// True when the members feed each other, or share a recipe, and so need
    /// a simultaneous balance.
    pub cyclic: bool,
}

#[derive(Debug, Clone)]
pub struct ProductionGraph<'c> {
    pub nodes: Vec<ProductionNode<'c>>,
    index: HashMap<&'c str, NodeIndex>,
    pub target: NodeIndex,
    /// Consumers before their ingredients; the target's component comes first.
    pub components: Vec<Component>,
    /// Edges that closed a cycle during expansion.
    pub cycle_edges: Vec<(NodeIndex, NodeIndex)>,
}

impl<'c> ProductionGraph<'c> {
    pub fn node_of(&self, item: &str) -> Option<NodeIndex> {
        self.index.get(item).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &ProductionNode<'c> {
        &self.nodes[idx]
    }

    pub fn cycles(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(|c| c.cyclic)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Expand `target` into a production graph.
pub fn build_graph<'c, S>(
    catalog: &'c RecipeCatalog,
    selector: &S,
    overrides: &Overrides,
    target: &str,
) -> Result<ProductionGraph<'c>>
where
    S: RecipeSelector + ?Sized,
{
    let mut builder = GraphBuilder {
        catalog,
        selector,
        overrides,
        nodes: Vec::new(),
        index: HashMap::new(),
        on_path: Vec::new(),
        cycle_edges: Vec::new(),
    };
    let target_idx = builder.expand(target)?;

    let components = find_components(&builder.nodes);
    debug!(
        item = target,
        nodes = builder.nodes.len(),
        components = components.len(),
        cycles = components.iter().filter(|c| c.cyclic).count(),
        "graph expanded"
    );

    Ok(ProductionGraph {
        nodes: builder.nodes,
        index: builder.index,
        target: target_idx,
        components,
        cycle_edges: builder.cycle_edges,
    })
}

struct GraphBuilder<'c, 'a, S: ?Sized> {
    catalog: &'c RecipeCatalog,
    selector: &'a S,
    overrides: &'a Overrides,
    nodes: Vec<ProductionNode<'c>>,
    index: HashMap<&'c str, NodeIndex>,
    on_path: Vec<bool>,
    cycle_edges: Vec<(NodeIndex, NodeIndex)>,
}

impl<'c, S: RecipeSelector + ?Sized> GraphBuilder<'c, '_, S> {
    /// Returns the node for `item`, expanding it on first sight.
    fn expand(&mut self, item: &str) -> Result<NodeIndex> {
        if let Some(&idx) = self.index.get(item) {
            return Ok(idx);
        }

        let entry = self
            .catalog
            .item(item)
            .ok_or_else(|| CalcError::UnknownItem {
                item: item.to_string(),
            })?;

        let recipe = if entry.is_raw {
            None
        } else {
            let candidates = self.catalog.recipes_producing(item);
            Some(self.selector.select(item, &candidates, self.overrides)?)
        };

        let idx = self.nodes.len();
        self.nodes.push(ProductionNode::new(entry, recipe));
        self.index.insert(entry.id.as_str(), idx);
        self.on_path.push(true);

        if let Some(recipe) = recipe {
            let out = recipe
                .output_of(item)
                .ok_or_else(|| CalcError::InvalidRecipe {
                    recipe: recipe.id.clone(),
                    reason: format!("selected for {item} but does not produce it"),
                })?;
            debug!(item, recipe = %recipe.id, "expanding");

            for (ingredient, per_craft) in &recipe.ingredients {
                if *per_craft <= 0.0 {
                    continue;
                }
                let child = self.expand(ingredient)?;
                if self.on_path[child] {
                    debug!(from = item, to = %ingredient, "cycle closed");
                    self.cycle_edges.push((idx, child));
                }
                self.nodes[idx].ingredients.push(Edge {
                    ingredient: child,
                    per_craft: *per_craft,
                    weight: per_craft / out,
                });
            }
        }

        self.on_path[idx] = false;
        Ok(idx)
    }
}

/// Group nodes into components, ordered consumers-first.
fn find_components(nodes: &[ProductionNode<'_>]) -> Vec<Component> {
    let mut by_recipe: HashMap<&str, Vec<NodeIndex>> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        if let Some(recipe) = node.recipe {
            by_recipe.entry(recipe.id.as_str()).or_default().push(idx);
        }
    }

    let successors: Vec<Vec<NodeIndex>> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| {
            let mut next: Vec<NodeIndex> = node.ingredients.iter().map(|e| e.ingredient).collect();
            if let Some(recipe) = node.recipe {
                next.extend(
                    by_recipe[recipe.id.as_str()]
                        .iter()
                        .copied()
                        .filter(|&other| other != idx),
                );
            }
            next
        })
        .collect();

    let mut tarjan = Tarjan {
        successors: &successors,
        index: vec![None; nodes.len()],
        lowlink: vec![0; nodes.len()],
        on_stack: vec![false; nodes.len()],
        stack: Vec::new(),
        counter: 0,
        components: Vec::new(),
    };
    for v in 0..nodes.len() {
        if tarjan.index[v].is_none() {
            tarjan.strongconnect(v);
        }
    }

    // Tarjan emits ingredients before their consumers.
    tarjan
        .components
        .into_iter()
        .rev()
        .map(|mut members| {
            members.sort_unstable();
            let cyclic = members.len() > 1
                || nodes[members[0]]
                    .ingredients
                    .iter()
                    .any(|e| e.ingredient == members[0]);
            Component {
                nodes: members,
                cyclic,
            }
        })
        .collect()
}

struct Tarjan<'g> {
    successors: &'g [Vec<NodeIndex>],
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<NodeIndex>,
    counter: usize,
    components: Vec<Vec<NodeIndex>>,
}

impl Tarjan<'_> {
    fn strongconnect(&mut self, v: NodeIndex) {
        self.index[v] = Some(self.counter);
        self.lowlink[v] = self.counter;
        self.counter += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        let successors = self.successors;
        for &w in &successors[v] {
            match self.index[w] {
                None => {
                    self.strongconnect(w);
                    self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                }
                Some(w_index) if self.on_stack[w] => {
                    self.lowlink[v] = self.lowlink[v].min(w_index);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlink[v]) == self.index[v] {
            let mut members = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                members.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(members);
        }
    }
}
