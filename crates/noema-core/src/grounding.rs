//! Grounding Interface - The stable surface for external adapters
//!
//! Sensor and actuator adapters do not touch the graph directly: they
//! post atomic assertions through the NOTE builder, keep stable identities
//! for tracked items through the external link table, and expose named
//! functions the FCN directive can call. The engine owns the graph; an
//! adapter supplies values at cycle boundaries.

use crate::core::Core;
use crate::graph::{Graphlet, GraphError, NodeId, NodeList};
use crate::matcher::Situation;
use crate::memory::WorkingMemory;

// ============================================================================
// KERNEL TRAIT
// ============================================================================

/// A bundle of named grounding functions (arm moves, speech output, memory
/// formation, introspection, ...). Dispatch is by recognition: a kernel
/// returns -2 from `start`/`status` for functions it does not implement
/// and the core moves on to the next kernel.
pub trait GroundingKernel {
    /// Short name for diagnostics.
    fn name(&self) -> &str;

    /// Begin the named function (the description's main node carries the
    /// function term as its lexical item). Returns a positive instance
    /// number, -1 for a malformed request, or -2 when unknown.
    fn start(&mut self, wmem: &mut WorkingMemory, desc: NodeId, bid: i32) -> i32;

    /// Poll an outstanding instance: 1 done, 0 working, -1 failed,
    /// -2 when unknown.
    fn status(&mut self, wmem: &mut WorkingMemory, desc: NodeId, inst: i32) -> i32;

    /// The instance is no longer needed (cancel any physical action).
    fn stop(&mut self, _wmem: &mut WorkingMemory, _desc: NodeId, _inst: i32) {}
}

// ============================================================================
// NOTE BUILDER AND WELL-KNOWN NODES
// ============================================================================

impl Core {
    /// Open a potential top-level NOTE for construction. Subsequent node
    /// building accumulates until [`Self::finish_note`].
    pub fn start_note(&mut self) {
        self.wmem.pool_mut().build_in();
    }

    /// Create a bare node of some kind (part of the NOTE being built).
    pub fn new_node(&mut self, kind: &str, word: Option<&str>) -> NodeId {
        self.wmem.make_node(kind, word, 0, -1.0)
    }

    pub fn new_node_neg(&mut self, kind: &str, word: Option<&str>, neg: i32, blf: f64) -> NodeId {
        self.wmem.make_node(kind, word, neg, -blf.abs())
    }

    /// Attach a property fact `prop -role-> head` with the given word.
    pub fn new_prop(
        &mut self,
        head: NodeId,
        role: &str,
        word: &str,
        neg: i32,
        blf: f64,
    ) -> Result<NodeId, GraphError> {
        self.wmem.add_prop(head, role, word, neg, -blf.abs(), false)
    }

    /// Attach a graded property ("very smart").
    pub fn new_deg(
        &mut self,
        head: NodeId,
        role: &str,
        word: &str,
        amt: &str,
    ) -> Result<NodeId, GraphError> {
        self.wmem.add_deg(head, role, word, amt, 0, -1.0)
    }

    /// Add a labeled argument arrow between built (or known) nodes.
    pub fn add_arg(&mut self, head: NodeId, slot: &str, val: NodeId) -> Result<(), GraphError> {
        self.wmem.add_arg(head, slot, val)
    }

    /// Attach (or replace) the lexical term of a built node.
    pub fn new_lex(&mut self, head: NodeId, word: &str) {
        self.wmem.set_lex(head, word);
    }

    /// Post the accumulated description as a NOTE focus. With `fail` the
    /// description is also recorded as the current focus's error message.
    /// Returns the focus index, or None when nothing was built.
    pub fn finish_note(&mut self, fail: Option<NodeId>) -> Option<usize> {
        let mut key = self.wmem.pool_mut().take_accum()?;
        if key.is_empty() {
            return None;
        }
        key.main_prop(&self.wmem);
        if fail.is_some() {
            self.note_failure(&key);
        }
        let d = crate::act::Directive::with_key(crate::act::DirKind::Note, key);
        let ch = crate::act::ChainGraph::solo(d);
        let now = self.now();
        self.atree.add_focus(ch, 1.0, now)
    }

    /// Convenience NOTE around a single pre-built node.
    pub fn note_solo(&mut self, n: NodeId) {
        self.start_note();
        if let Some(acc) = self.wmem.pool_mut().take_accum() {
            let mut key = acc;
            let _ = key.add_item(n);
            let d = crate::act::Directive::with_key(crate::act::DirKind::Note, key);
            let ch = crate::act::ChainGraph::solo(d);
            let now = self.now();
            self.atree.add_focus(ch, 1.0, now);
        }
    }

    /// Find the working-memory equivalent of the description built so
    /// far. On a match the construction is discarded and the equivalent
    /// of `focus` returned; otherwise `focus` itself comes back and the
    /// builder keeps going.
    pub fn resolve(&mut self, focus: NodeId) -> NodeId {
        let Some(acc) = self.wmem.pool_mut().accum().cloned() else {
            return focus;
        };
        if acc.is_empty() {
            return focus;
        }
        self.wmem.max_band(0);
        let mut sit = Situation::new();
        sit.cond = acc.clone();
        sit.bth = self.wmem.min_blf();
        match sit.find_ref(&self.wmem, focus, &self.wmem) {
            Some(hit) => {
                // an equivalent already exists: drop the construction
                self.wmem.pool_mut().take_accum();
                for id in acc.items() {
                    self.wmem.pool_mut().remove(id);
                }
                hit
            }
            None => focus,
        }
    }

    /// Make a volunteered node visible and believed, stamped as fresh so
    /// FIND prefers it.
    pub fn new_found(&mut self, obj: NodeId) {
        self.wmem.mark_belief(obj, 1.0);
        if let Some(n) = self.wmem.node_mut(obj) {
            n.reveal();
        }
        let ver = self.wmem.pool().version();
        self.wmem.set_gen(obj, ver);
    }

    // ------------------------------------------------------------------
    // well-known node accessors
    // ------------------------------------------------------------------

    /// The agent's own node.
    pub fn self_node(&self) -> Option<NodeId> {
        self.wmem.robot()
    }

    /// The current conversation partner.
    pub fn user_node(&self) -> Option<NodeId> {
        self.wmem.human()
    }

    /// Node for a named person, creating one when unknown.
    pub fn person(&mut self, name: &str) -> NodeId {
        if let Some(n) = self.wmem.find_name(name) {
            return n;
        }
        let dude = self.wmem.make_node("dude", None, 0, -1.0);
        self.wmem.add_name(dude, name, 0);
        if let Some(n) = self.wmem.node_mut(dude) {
            n.reveal();
        }
        dude
    }

    // ------------------------------------------------------------------
    // external identity pass-through
    // ------------------------------------------------------------------

    /// Link a tracker id to a node (None unlinks). Kind 0 = object,
    /// 1 = agent, 2 = surface.
    pub fn ext_link(&mut self, rnum: i32, node: Option<NodeId>, kind: i32) -> bool {
        self.wmem.ext_link(rnum, node, kind)
    }

    pub fn ext_ref(&self, rnum: i32, kind: i32) -> Option<NodeId> {
        self.wmem.ext_ref(rnum, kind)
    }

    pub fn ext_enum(&self, last: i32, kind: i32) -> i32 {
        self.wmem.ext_enum(last, kind)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::query;

    #[test]
    fn note_builder_posts_focus_and_reveals() {
        let mut core = Core::new();
        core.start_note();
        let obj = core.new_node("obj", None);
        let red = core.new_prop(obj, "hq", "red", 0, 1.0).unwrap();
        let idx = core.finish_note(None).unwrap();

        // note posted, description realized once serviced
        assert_eq!(core.atree.num_foci(), idx + 1);
        core.cycle(false);
        let n = core.wmem.get(red).unwrap();
        assert!(n.visible());
        assert_eq!(n.belief(), 1.0);
        let o = core.wmem.get(obj).unwrap();
        assert!(query::num_props(&core.wmem, o) >= 1);
    }

    #[test]
    fn person_finds_or_creates() {
        let mut core = Core::new();
        let jon = core.person("Jon Connell");
        // realize the pending name facts the way a NOTE would
        let ids = core.wmem.pool().ids();
        for id in ids {
            if let Some(n) = core.wmem.node_mut(id) {
                n.reveal();
                let _ = n.actualize(1);
            }
        }
        assert_eq!(core.person("Jon Connell"), jon);
        assert_eq!(core.person("Jon"), jon);
        let other = core.person("Ken");
        assert_ne!(other, jon);
    }

    struct EchoKernel {
        ticks: i32,
    }

    impl GroundingKernel for EchoKernel {
        fn name(&self) -> &str {
            "echo"
        }

        fn start(&mut self, wmem: &mut WorkingMemory, desc: NodeId, _bid: i32) -> i32 {
            let known = wmem
                .get(desc)
                .map(|n| n.lex_match("echo"))
                .unwrap_or(false);
            if known { 1 } else { -2 }
        }

        fn status(&mut self, _wmem: &mut WorkingMemory, _desc: NodeId, _inst: i32) -> i32 {
            self.ticks += 1;
            if self.ticks >= 2 { 1 } else { 0 }
        }
    }

    #[test]
    fn fcn_dispatch_reaches_kernel() {
        let mut core = Core::new();
        core.add_kernel(Box::new(EchoKernel { ticks: 0 }));
        let act = core.wmem.make_node("act", Some("echo"), 0, 1.0);
        let mut key = Graphlet::new();
        key.add_item(act).unwrap();
        assert_eq!(core.kernel_start(&key), 1);
        assert_eq!(core.kernel_status(&key, 1), 0); // still working
        assert_eq!(core.kernel_status(&key, 1), 1); // done
    }
}
