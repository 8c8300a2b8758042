//! Graph Substrate
//!
//! Typed nodes with labeled arguments and a reverse property index, grouped
//! into pools, plus the two small aggregates the matcher works with:
//! graphlets (ordered node sets) and bindings (key -> substitution lists).

pub mod bindings;
pub mod graphlet;
pub mod node;
pub mod pool;

pub use bindings::{Bindings, BIND_MAX};
pub use graphlet::{Graphlet, GraphletView, GRAPHLET_MAX};
pub use node::{
    ArgEntry, HaloSource, Node, NodeId, PropEntry, ARG_MAX, PROP_MAX, TAG_NOUN, TAG_STR, TAG_VERB,
};
pub use pool::{lex_hash, NodeList, NodePool, NBINS};

/// Structural failures: fixed capacities and index errors are rejected,
/// never grown past or panicked on.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    #[error("more than {ARG_MAX} arguments on {0}")]
    ArgsFull(String),

    #[error("more than {PROP_MAX} properties on {0}")]
    PropsFull(String),

    #[error("more than {GRAPHLET_MAX} items in graphlet")]
    GraphletFull,

    #[error("more than {BIND_MAX} binding pairs")]
    BindingsFull,

    #[error("duplicate binding key")]
    DuplicateKey,

    #[error("node {0} already exists")]
    DuplicateNode(i32),

    #[error("node {0} not found")]
    MissingNode(i32),

    #[error("reference node had no binding")]
    MissingBinding,
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Relation queries that need to resolve neighbor nodes through a store.
/// All of these honor the moor/buoy tether: a surface node with a moor
/// reads its static structure from the deep cognate.
pub mod query {
    use super::bindings::Bindings;
    use super::node::{Node, NodeId};
    use super::pool::NodeList;

    /// Surface side of a tethered pair (the buoy when one exists).
    pub fn surf(f: &dyn NodeList, id: NodeId) -> NodeId {
        f.get(id).and_then(|n| n.buoy()).unwrap_or(id)
    }

    /// Deep side of a tethered pair (the moor when one exists).
    pub fn deep(f: &dyn NodeList, id: NodeId) -> NodeId {
        f.get(id).and_then(|n| n.moor()).unwrap_or(id)
    }

    fn deep_node<'a>(f: &'a dyn NodeList, n: &'a Node) -> &'a Node {
        match n.moor().and_then(|m| f.get(m)) {
            Some(m) => m,
            None => n,
        }
    }

    /// Argument count, reading through the moor for un-fleshed surfaces.
    pub fn num_args(f: &dyn NodeList, n: &Node) -> usize {
        deep_node(f, n).num_args()
    }

    pub fn arg(f: &dyn NodeList, n: &Node, i: usize) -> Option<NodeId> {
        deep_node(f, n).arg(i)
    }

    pub fn arg_surf(f: &dyn NodeList, n: &Node, i: usize) -> Option<NodeId> {
        arg(f, n, i).map(|a| surf(f, a))
    }

    pub fn slot<'a>(f: &'a dyn NodeList, n: &'a Node, i: usize) -> Option<&'a str> {
        let d = deep_node(f, n);
        d.slot(i)
    }

    /// Combined property count for both members of a tethered pair.
    pub fn num_props(f: &dyn NodeList, n: &Node) -> usize {
        match n.moor().and_then(|m| f.get(m)) {
            Some(m) => m.num_props() + n.num_props(),
            None => n.num_props(),
        }
    }

    /// Property by index: the deep cognate's entries come first.
    pub fn prop(f: &dyn NodeList, n: &Node, i: usize) -> Option<NodeId> {
        match n.moor().and_then(|m| f.get(m)) {
            Some(m) => {
                if i < m.num_props() {
                    m.prop(i)
                } else {
                    n.prop(i - m.num_props())
                }
            }
            None => n.prop(i),
        }
    }

    pub fn prop_surf(f: &dyn NodeList, n: &Node, i: usize) -> Option<NodeId> {
        prop(f, n, i).map(|p| surf(f, p))
    }

    /// Link name that goes with the selected property.
    pub fn role<'a>(f: &'a dyn NodeList, n: &'a Node, i: usize) -> Option<&'a str> {
        let (head, anum) = match n.moor().and_then(|m| f.get(m)) {
            Some(m) => {
                if i < m.num_props() {
                    (m.prop(i)?, m.prop_anum(i)?)
                } else {
                    (n.prop(i - m.num_props())?, n.prop_anum(i - m.num_props())?)
                }
            }
            None => (n.prop(i)?, n.prop_anum(i)?),
        };
        f.get(head)?.slot(anum)
    }

    pub fn role_match(f: &dyn NodeList, n: &Node, i: usize, link: &str) -> bool {
        role(f, n, i) == Some(link)
    }

    /// Whether the node participates in the triple `n -slot-> val`,
    /// accepting either member of val's tethered pair.
    pub fn has_val(f: &dyn NodeList, n: &Node, slot: &str, val: NodeId) -> bool {
        let (vb, vm) = f
            .get(val)
            .map(|v| (v.buoy(), v.moor()))
            .unwrap_or((None, None));
        let d = deep_node(f, n);
        (0..d.num_args()).any(|i| {
            d.slot(i) == Some(slot)
                && d.arg(i)
                    .map(|a| a == val || Some(a) == vb || Some(a) == vm)
                    .unwrap_or(false)
        })
    }

    /// Whether the triple `fact -role-> subject` exists.
    pub fn has_fact(f: &dyn NodeList, fact: NodeId, role: &str, subject: NodeId) -> bool {
        f.get(fact)
            .map(|head| has_val(f, head, role, subject))
            .unwrap_or(false)
    }

    /// Two nodes share exactly the same set of arguments.
    pub fn same_args(f: &dyn NodeList, n: &Node, reference: &Node) -> bool {
        let cnt = num_args(f, n);
        if num_args(f, reference) != cnt {
            return false;
        }
        (0..cnt).all(|i| {
            match (slot(f, n, i), arg(f, n, i)) {
                (Some(s), Some(a)) => has_val(f, reference, s, a),
                _ => false,
            }
        })
    }

    /// Like [`same_args`] but remaps this node's arguments through the
    /// bindings before comparing.
    pub fn same_args_bound(
        f: &dyn NodeList,
        n: &Node,
        reference: &Node,
        b: &Bindings,
    ) -> bool {
        let cnt = num_args(f, n);
        if num_args(f, reference) != cnt {
            return false;
        }
        (0..cnt).all(|i| match (slot(f, n, i), arg(f, n, i)) {
            (Some(s), Some(a)) => {
                let a = b.lookup(a).unwrap_or(a);
                has_val(f, reference, s, a)
            }
            _ => false,
        })
    }

    /// Property node with the given role, word, negation, and belief.
    pub fn find_prop(
        f: &dyn NodeList,
        n: &Node,
        role_name: &str,
        word: &str,
        neg: i32,
        bth: f64,
    ) -> Option<NodeId> {
        let cnt = num_props(f, n);
        for i in 0..cnt {
            let pid = prop(f, n, i)?;
            let p = f.get(pid)?;
            if p.neg() == neg
                && p.belief() >= bth
                && role_match(f, n, i, role_name)
                && p.lex_match(word)
            {
                return Some(pid);
            }
        }
        None
    }

    /// Argument node with the given slot, word, negation, and belief.
    pub fn find_arg(
        f: &dyn NodeList,
        n: &Node,
        slot_name: &str,
        word: &str,
        neg: i32,
        bth: f64,
    ) -> Option<NodeId> {
        let cnt = num_args(f, n);
        for i in 0..cnt {
            let aid = arg(f, n, i)?;
            let a = f.get(aid)?;
            if a.neg() == neg && a.belief() >= bth && slot(f, n, i) == Some(slot_name) && a.lex_match(word)
            {
                return Some(aid);
            }
        }
        None
    }

    /// Count of facts having this node as a filler for the given role.
    pub fn num_facts(f: &dyn NodeList, n: &Node, role_name: &str) -> usize {
        let cnt = num_props(f, n);
        (0..cnt)
            .filter(|i| role_match(f, n, *i, role_name))
            .count()
    }

    /// The idx'th fact with the given role, most recently added first.
    pub fn fact(f: &dyn NodeList, n: &Node, role_name: &str, idx: usize) -> Option<NodeId> {
        let cnt = num_props(f, n);
        let mut seen = 0;
        for i in (0..cnt).rev() {
            if role_match(f, n, i, role_name) {
                if seen == idx {
                    return prop(f, n, i);
                }
                seen += 1;
            }
        }
        None
    }

    /// A specific name out of all the names associated with an item,
    /// most recently added first. With `bth > 0` only non-negated names
    /// over the threshold count.
    pub fn name<'a>(f: &'a dyn NodeList, n: &'a Node, idx: usize, bth: f64) -> Option<&'a str> {
        let cnt = num_props(f, n);
        let mut seen = 0;
        for i in (0..cnt).rev() {
            if role_match(f, n, i, "name") {
                let p = f.get(prop(f, n, i)?)?;
                if bth <= 0.0 || (p.neg() <= 0 && p.belief() >= bth) {
                    if seen == idx {
                        return p.lex();
                    }
                    seen += 1;
                }
            }
        }
        None
    }

    /// Whether a particular name is one of the references for this item
    /// (case-insensitive). With `tru_only` a negated name does not count.
    pub fn has_name(f: &dyn NodeList, n: &Node, word: &str, tru_only: bool) -> bool {
        let cnt = num_props(f, n);
        for i in 0..cnt {
            if role_match(f, n, i, "name") {
                if let Some(p) = prop(f, n, i).and_then(|id| f.get(id)) {
                    if p.lex_str().eq_ignore_ascii_case(word) {
                        return !tru_only || p.neg() <= 0;
                    }
                }
            }
        }
        false
    }

    /// Whether this node or any argument (recursively) is hypothetical.
    pub fn hyp_any(f: &dyn NodeList, id: NodeId) -> bool {
        let Some(n) = f.get(id) else {
            return false;
        };
        if n.hyp() {
            return true;
        }
        (0..num_args(f, n)).any(|i| arg(f, n, i).map(|a| hyp_any(f, a)).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_read_through_the_moor() {
        let mut p = NodePool::new();
        let deep = p.make_node("obj", Some("dog"), 0, 1.0);
        let fact = p.make_node("ako", Some("animal"), 0, 1.0);
        p.add_arg(fact, "ako", deep).unwrap();

        let surf = p.make_node("obj", None, 0, 1.0);
        p.moor_to(surf, Some(deep));

        let s = p.node(surf).unwrap();
        // surface has no props of its own but inherits the deep fact
        assert_eq!(s.num_props(), 0);
        assert_eq!(query::num_props(&p, s), 1);
        assert_eq!(query::role(&p, s, 0), Some("ako"));

        // triple check accepts the tethered cognate as the same node
        let f = p.node(fact).unwrap();
        assert!(query::has_val(&p, f, "ako", surf));
        assert!(query::has_val(&p, f, "ako", deep));
    }

    #[test]
    fn same_args_through_bindings() {
        let mut p = NodePool::new();
        let a = p.make_node("obj", None, 0, 1.0);
        let b = p.make_node("obj", None, 0, 1.0);
        let f1 = p.make_node("hq", Some("red"), 0, 1.0);
        let f2 = p.make_node("hq", Some("red"), 0, 1.0);
        p.add_arg(f1, "hq", a).unwrap();
        p.add_arg(f2, "hq", b).unwrap();

        let mut bind = Bindings::new();
        bind.bind(a, b).unwrap();
        let n1 = p.node(f1).unwrap().clone();
        let n2 = p.node(f2).unwrap();
        assert!(!query::same_args(&p, &n1, n2));
        assert!(query::same_args_bound(&p, &n1, n2, &bind));
    }
}
