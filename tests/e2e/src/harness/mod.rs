//! Test harness: canned facts, rules, and operators for journey tests.

use noema_core::{
    ChainGraph, Core, DirKind, Directive, Graphlet, NodeId, Operator, Payload, Rule,
};

/// Post a believed `kind-of` fact: returns (object, fact).
pub fn seed_kind(core: &mut Core, word: &str) -> (NodeId, NodeId) {
    let obj = core.wmem.make_node("obj", None, 0, 1.0);
    let fact = core.wmem.add_prop(obj, "ako", word, 0, 1.0, false).unwrap();
    for id in [obj, fact] {
        let n = core.wmem.node_mut(id).unwrap();
        n.reveal();
        n.set_belief(1.0);
    }
    (obj, fact)
}

/// Post a believed quality on an existing object.
pub fn seed_quality(core: &mut Core, obj: NodeId, word: &str, neg: i32, blf: f64) -> NodeId {
    let fact = core.wmem.add_prop(obj, "hq", word, neg, blf, false).unwrap();
    let n = core.wmem.node_mut(fact).unwrap();
    n.reveal();
    n.set_belief(blf);
    fact
}

/// `if X is a <ante> then X is a <cons>` at the given confidence.
pub fn class_rule(ante: &str, cons: &str, conf: f64) -> Rule {
    let mut r = Rule::new();
    let x = r.pool.make_node("obj", None, 0, 1.0);
    let a = r.pool.make_node("ako", Some(ante), 0, 1.0);
    r.pool.add_arg(a, "ako", x).unwrap();
    r.sit.cond.add_item(a).unwrap();
    r.sit.cond.add_item(x).unwrap();
    let c = r.pool.make_node("ako", Some(cons), 0, 1.0);
    r.pool.add_arg(c, "ako", x).unwrap();
    r.result.add_item(c).unwrap();
    r.conf = conf;
    r.pool.force_belief(&r.result, conf);
    r.pool.node_mut(c).unwrap().set_default(conf);
    r
}

/// DO operator for `<verb>(obj)` whose method is a single FCN call on the
/// matched act (the function name is the act's own term).
pub fn do_operator(verb: &str, pref: f64) -> Operator {
    let mut op = Operator::new(DirKind::Do);
    let x = op.pool.make_node("obj", None, 0, 1.0);
    let act = op.pool.make_node("act", Some(verb), 0, 1.0);
    op.pool.add_arg(act, "obj", x).unwrap();
    op.sit.cond.add_item(act).unwrap();
    op.sit.cond.add_item(x).unwrap();
    op.pref = pref;

    let mut g = Graphlet::new();
    g.add_item(act).unwrap();
    let mut meth = ChainGraph::new();
    meth.push(Payload::Dir(Box::new(Directive::with_key(DirKind::Fcn, g))));
    op.meth = Some(meth);
    op
}

/// Focus around a DO request `<verb>(obj)` in working memory. The real
/// object stays outside the key description (an external literal).
pub fn do_focus(core: &mut Core, verb: &str, obj: NodeId) -> usize {
    let act = core.wmem.make_node("act", Some(verb), 0, -1.0);
    core.wmem.add_arg(act, "obj", obj).unwrap();
    let mut key = Graphlet::new();
    key.add_item(act).unwrap();
    let ch = ChainGraph::solo(Directive::with_key(DirKind::Do, key));
    let now = core.now();
    core.atree.add_focus(ch, 1.0, now).unwrap()
}
