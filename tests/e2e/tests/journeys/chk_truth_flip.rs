//! Journey: a CHK matches a negated fact (polarity ignored during the
//! search) and routes control down the alternate branch.

use noema_core::{ChainGraph, Core, DirKind, Directive, Graphlet, Payload};
use noema_e2e_tests::harness::{seed_kind, seed_quality};

/// Chain: CHK "is obj red?" with distinct NOTE markers on each branch.
fn chk_chain(core: &mut Core, obj: noema_core::NodeId) -> ChainGraph {
    // description: hq(red) over obj, positive sense, hypothetical;
    // the real object stays external to the description
    let probe = core.wmem.make_node("hq", Some("red"), 0, -1.0);
    core.wmem.add_arg(probe, "hq", obj).unwrap();
    let mut key = Graphlet::new();
    key.add_item(probe).unwrap();

    let mut ch = ChainGraph::new();
    let chk = ch.push(Payload::Dir(Box::new(Directive::with_key(
        DirKind::Chk,
        key,
    ))));

    // cont marker: "yes" note, alt marker: "no" note
    let yes = core.wmem.make_node("act", Some("affirm"), 0, -1.0);
    let mut gy = Graphlet::new();
    gy.add_item(yes).unwrap();
    let y = ch.push(Payload::Dir(Box::new(Directive::with_key(
        DirKind::Note,
        gy,
    ))));
    let no = core.wmem.make_node("act", Some("deny"), 0, -1.0);
    let mut gn = Graphlet::new();
    gn.add_item(no).unwrap();
    let n = ch.push(Payload::Dir(Box::new(Directive::with_key(
        DirKind::Note,
        gn,
    ))));
    ch.step_mut(chk).cont = Some(y);
    ch.step_mut(chk).alt = Some(n);
    ch
}

fn run_chk(core: &mut Core, idx: usize) -> i32 {
    for _ in 0..8 {
        core.cycle(false);
        let f = core.atree.focus(idx).unwrap();
        if f.done {
            break;
        }
    }
    core.atree.focus(idx).unwrap().chain.verdict()
}

#[test]
fn negated_fact_takes_alternate_branch() {
    let mut core = Core::new();
    let (obj, _) = seed_kind(&mut core, "block");
    // the only matching fact says obj is NOT red
    let fact = seed_quality(&mut core, obj, "red", 1, 0.9);

    let ch = chk_chain(&mut core, obj);
    let now = core.now();
    let idx = core.atree.add_focus(ch, 1.0, now).unwrap();
    run_chk(&mut core, idx);

    // CHK took the alternate edge (answer: false)
    let f = core.atree.focus(idx).unwrap();
    assert_eq!(f.chain.step(0).done, 2);
    assert!(core.wmem.get_node(fact).unwrap().belief() > 0.0);
}

#[test]
fn positive_fact_takes_continuation() {
    let mut core = Core::new();
    let (obj, _) = seed_kind(&mut core, "block");
    seed_quality(&mut core, obj, "red", 0, 0.9);

    let ch = chk_chain(&mut core, obj);
    let now = core.now();
    let idx = core.atree.add_focus(ch, 1.0, now).unwrap();
    run_chk(&mut core, idx);

    let f = core.atree.focus(idx).unwrap();
    assert_eq!(f.chain.step(0).done, 1);
}

#[test]
fn unknown_truth_fails_without_advice() {
    let mut core = Core::new();
    let (obj, _) = seed_kind(&mut core, "block");
    // no color fact at all and no CHK operators to gather one

    let ch = chk_chain(&mut core, obj);
    let now = core.now();
    let idx = core.atree.add_focus(ch, 1.0, now).unwrap();
    let v = run_chk(&mut core, idx);
    assert_eq!(v, -2);
}
