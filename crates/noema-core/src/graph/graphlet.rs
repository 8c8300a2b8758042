//! Graphlet - A small ordered collection of specific nodes
//!
//! Used both as a match pattern and as an accumulator while building a
//! structure. The first element is the "main" node; helpers reorder the
//! list so a property becomes main when the current main is a naked object.
//! Nodes themselves continue to exist until garbage collected.

use crate::graph::bindings::Bindings;
use crate::graph::node::NodeId;
use crate::graph::pool::NodeList;
use crate::graph::GraphError;

/// Maximum number of items in a graphlet.
pub const GRAPHLET_MAX: usize = 50;

/// Ordered, deduplicated set of node references.
#[derive(Clone, Debug, Default)]
pub struct Graphlet {
    desc: Vec<NodeId>,
}

impl Graphlet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.desc.clear();
    }

    pub fn num_items(&self) -> usize {
        self.desc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.desc.is_empty()
    }

    pub fn item(&self, i: usize) -> Option<NodeId> {
        self.desc.get(i).copied()
    }

    /// Iterate item ids in order.
    pub fn items(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.desc.iter().copied()
    }

    /// The most important node of the description.
    pub fn main(&self) -> Option<NodeId> {
        self.desc.first().copied()
    }

    /// Whether the node itself is part of this description.
    pub fn in_desc(&self, item: NodeId) -> bool {
        self.desc.contains(&item)
    }

    // ------------------------------------------------------------------
    // configuration
    // ------------------------------------------------------------------

    /// Copy some other description.
    pub fn copy_from(&mut self, reference: &Graphlet) {
        self.desc.clone_from(&reference.desc);
    }

    /// Add some other description to this one (no duplicates).
    pub fn append(&mut self, reference: &Graphlet) {
        for id in &reference.desc {
            let _ = self.add_item(*id);
        }
    }

    /// Copy some other description but use node substitutions from the
    /// bindings. Fails when a reference node has no binding.
    pub fn copy_bind(&mut self, reference: &Graphlet, sub: &Bindings) -> Result<(), GraphError> {
        self.desc.clear();
        for id in &reference.desc {
            match sub.lookup(*id) {
                Some(alt) => self.desc.push(alt),
                None => return Err(GraphError::MissingBinding),
            }
        }
        Ok(())
    }

    /// Add a node to the description. Idempotent on duplicates.
    pub fn add_item(&mut self, item: NodeId) -> Result<NodeId, GraphError> {
        if self.desc.contains(&item) {
            return Ok(item);
        }
        if self.desc.len() >= GRAPHLET_MAX {
            return Err(GraphError::GraphletFull);
        }
        self.desc.push(item);
        Ok(item)
    }

    /// Swap one node for another in place, preserving position (and so
    /// the main designation). Falls back to removal when the replacement
    /// is already present.
    pub fn replace_item(&mut self, old: NodeId, new: NodeId) -> bool {
        if self.desc.contains(&new) {
            return self.rem_item(old);
        }
        if let Some(pos) = self.desc.iter().position(|n| *n == old) {
            self.desc[pos] = new;
            return true;
        }
        false
    }

    /// Remove a node from the description (if present).
    pub fn rem_item(&mut self, item: NodeId) -> bool {
        if let Some(pos) = self.desc.iter().position(|n| *n == item) {
            self.desc.remove(pos);
            return true;
        }
        false
    }

    /// Make sure no nodes from the reference appear here.
    /// Returns the number of items remaining.
    pub fn rem_all(&mut self, reference: &Graphlet) -> usize {
        self.desc.retain(|n| !reference.desc.contains(n));
        self.desc.len()
    }

    /// Remove final items starting at `start` and hand them back.
    pub fn cut_tail(&mut self, start: usize) -> Graphlet {
        let tail = Graphlet {
            desc: self.desc.split_off(start.min(self.desc.len())),
        };
        tail
    }

    /// Designate which node is the most important (added if missing).
    pub fn set_main(&mut self, main: NodeId) -> Result<NodeId, GraphError> {
        if let Some(pos) = self.desc.iter().position(|n| *n == main) {
            self.desc.swap(0, pos);
            return Ok(main);
        }
        self.add_item(main)?;
        let last = self.desc.len() - 1;
        self.desc.swap(0, last);
        Ok(main)
    }

    /// Make the last node added be the main node.
    pub fn main_last(&mut self) -> Option<NodeId> {
        let last = self.desc.last().copied()?;
        self.set_main(last).ok()
    }

    /// Make sure the main node is not a naked object: when it has no
    /// arguments and no verb tag, promote the first item that does.
    pub fn main_prop(&mut self, store: &dyn NodeList) -> Option<NodeId> {
        let main = self.main()?;
        let bare = store
            .get(main)
            .map(|n| !n.verb_tag() && n.num_args() == 0)
            .unwrap_or(false);
        if bare {
            let promote = self.desc.iter().copied().find(|id| {
                store
                    .get(*id)
                    .map(|n| n.verb_tag() || n.num_args() > 0)
                    .unwrap_or(false)
            });
            if let Some(p) = promote {
                return self.set_main(p).ok();
            }
        }
        Some(main)
    }

    /// Main node interpreted as an action (skips leading naked objects).
    pub fn main_act(&self, store: &dyn NodeList) -> Option<NodeId> {
        self.desc
            .iter()
            .copied()
            .find(|id| store.get(*id).map(|n| n.num_args() > 0).unwrap_or(false))
            .or_else(|| self.main())
    }

    // ------------------------------------------------------------------
    // structure queries
    // ------------------------------------------------------------------

    /// Whether any argument of the given node falls outside the description.
    pub fn arg_out(&self, store: &dyn NodeList, item: NodeId) -> bool {
        let Some(n) = store.get(item) else {
            return false;
        };
        (0..n.num_args()).any(|i| {
            n.arg(i)
                .map(|a| !self.in_desc(a))
                .unwrap_or(false)
        })
    }

    /// Whether any property of the given node falls outside the description.
    pub fn prop_out(&self, store: &dyn NodeList, item: NodeId) -> bool {
        let Some(n) = store.get(item) else {
            return false;
        };
        (0..n.num_props()).any(|i| {
            n.prop(i)
                .map(|p| !self.in_desc(p))
                .unwrap_or(false)
        })
    }

    /// Minimum default belief over all nodes (zero when empty).
    pub fn min_belief(&self, store: &dyn NodeList) -> f64 {
        let mut lo: Option<f64> = None;
        for id in &self.desc {
            if let Some(n) = store.get(*id) {
                let b = n.default_belief();
                lo = Some(lo.map_or(b, |v: f64| v.min(b)));
            }
        }
        lo.unwrap_or(0.0)
    }

    /// Whether any item in the description has been overridden.
    pub fn moot(&self, store: &dyn NodeList) -> bool {
        self.desc
            .iter()
            .filter_map(|id| store.get(*id))
            .any(|n| n.belief() <= 0.0)
    }
}

/// A graphlet viewed against its backing store, so it can serve as a fact
/// source for the matcher (e.g. an operator trigger matched against a
/// directive's key description).
pub struct GraphletView<'a> {
    pub items: &'a Graphlet,
    pub store: &'a dyn NodeList,
}

impl<'a> GraphletView<'a> {
    pub fn new(items: &'a Graphlet, store: &'a dyn NodeList) -> Self {
        Self { items, store }
    }
}

impl NodeList for GraphletView<'_> {
    fn get(&self, id: NodeId) -> Option<&crate::graph::node::Node> {
        self.store.get(id)
    }

    fn next_node(&self, prev: Option<NodeId>, _bin: Option<usize>) -> Option<NodeId> {
        match prev {
            None => self.items.main(),
            Some(p) => {
                let pos = self.items.desc.iter().position(|n| *n == p)?;
                self.items.item(pos + 1)
            }
        }
    }

    fn length(&self) -> usize {
        self.items.num_items()
    }

    fn in_list(&self, id: NodeId) -> bool {
        self.items.in_desc(id)
    }

    fn same_bin(&self, _focus: &crate::graph::node::Node, _b: Option<&Bindings>) -> usize {
        self.items.num_items()
    }
}

// ============================================================================
// TESTS
// ============================================================================
