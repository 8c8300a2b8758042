//! Journey: NOTE operators fire only on newly posted information. A
//! trigger satisfied solely by stale facts stays quiet.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use noema_core::{
    ChainGraph, Core, DirKind, Directive, Graphlet, GroundingKernel, NodeId, Operator, Payload,
    WorkingMemory,
};

/// Kernel counting invocations of "react".
struct Counter {
    hits: Arc<AtomicUsize>,
}

impl GroundingKernel for Counter {
    fn name(&self) -> &str {
        "counter"
    }

    fn start(&mut self, wmem: &mut WorkingMemory, desc: NodeId, _bid: i32) -> i32 {
        let known = wmem
            .get_node(desc)
            .map(|n| n.lex_match("react"))
            .unwrap_or(false);
        if !known {
            return -2;
        }
        self.hits.fetch_add(1, Ordering::SeqCst);
        1
    }

    fn status(&mut self, _wmem: &mut WorkingMemory, _desc: NodeId, _inst: i32) -> i32 {
        1
    }
}

/// NOTE operator: when something red shows up, react.
fn red_alert_op() -> Operator {
    let mut op = Operator::new(DirKind::Note);
    let x = op.pool.make_node("obj", None, 0, 1.0);
    let red = op.pool.make_node("hq", Some("red"), 0, 1.0);
    op.pool.add_arg(red, "hq", x).unwrap();
    op.sit.cond.add_item(red).unwrap();
    op.sit.cond.add_item(x).unwrap();

    let mut g = Graphlet::new();
    let act = op.pool.make_node("act", Some("react"), 0, 1.0);
    g.add_item(act).unwrap();
    let mut meth = ChainGraph::new();
    meth.push(Payload::Dir(Box::new(Directive::with_key(DirKind::Fcn, g))));
    op.meth = Some(meth);
    op
}

#[test]
fn fresh_note_fires_matching_operator() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut core = Core::new();
    core.add_kernel(Box::new(Counter { hits: hits.clone() }));
    core.pmem.add_operator(red_alert_op());

    // a sensor posts "something red appeared"
    core.start_note();
    let obj = core.new_node("obj", None);
    core.new_prop(obj, "hq", "red", 0, 1.0).unwrap();
    core.finish_note(None);

    for _ in 0..6 {
        core.cycle(false);
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn stale_facts_do_not_trigger_note_operators() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut core = Core::new();
    core.add_kernel(Box::new(Counter { hits: hits.clone() }));
    core.pmem.add_operator(red_alert_op());

    // a red fact exists from before, believed but not newly posted
    let obj = core.wmem.make_node("obj", None, 0, 1.0);
    let red = core.wmem.add_prop(obj, "hq", "red", 0, 1.0, false).unwrap();
    for id in [obj, red] {
        let n = core.wmem.node_mut(id).unwrap();
        n.reveal();
        n.set_belief(1.0);
    }

    // an unrelated announcement arrives
    core.start_note();
    let other = core.new_node("obj", None);
    core.new_prop(other, "ako", "dog", 0, 1.0).unwrap();
    core.finish_note(None);

    for _ in 0..6 {
        core.cycle(false);
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
