//! Journey: mark-sweep collection removes everything a retired focus was
//! holding alive, including tracker identities, while participants and
//! seeded structure survive.

use chrono::Duration;
use noema_core::{query, Core, EXT_OBJ};

#[test]
fn retired_focus_releases_its_whole_cluster() {
    let mut core = Core::new();
    let t0 = core.now();
    core.set_now(t0);

    // NOTE cluster: grab(A, B) where B is red, B tracked externally
    core.start_note();
    let a = core.new_node("obj", None);
    let b = core.new_node("obj", None);
    let act = core.new_node("act", Some("grab"));
    core.add_arg(act, "agt", a).unwrap();
    core.add_arg(act, "obj", b).unwrap();
    let c = core.new_prop(b, "hq", "red", 0, 1.0).unwrap();
    core.finish_note(None).unwrap();
    core.ext_link(17, Some(b), EXT_OBJ);

    // service until the NOTE finishes (no operators: one pass)
    core.cycle(true);
    core.cycle(true);
    assert!(core.wmem.get_node(act).is_some());

    // well past the retirement window the focus goes away, and with it
    // every node of the cluster
    core.set_now(t0 + Duration::seconds(120));
    core.cycle(true);
    assert!(core.wmem.get_node(a).is_none());
    assert!(core.wmem.get_node(b).is_none());
    assert!(core.wmem.get_node(act).is_none());
    assert!(core.wmem.get_node(c).is_none());
    assert_eq!(core.ext_ref(17, EXT_OBJ), None);

    // conversation participants are never collected
    let me = core.self_node().unwrap();
    let you = core.user_node().unwrap();
    assert!(core.wmem.get_node(me).is_some());
    assert!(core.wmem.get_node(you).is_some());
    let me_node = core.wmem.get_node(me).unwrap();
    assert!(query::num_props(&core.wmem, me_node) >= 1); // kind fact kept
}

#[test]
fn live_focus_keeps_its_nodes_through_gc() {
    let mut core = Core::new();
    core.start_note();
    let obj = core.new_node("obj", None);
    let red = core.new_prop(obj, "hq", "red", 0, 1.0).unwrap();
    core.finish_note(None).unwrap();

    core.cycle(true);
    core.cycle(true);
    assert!(core.wmem.get_node(obj).is_some());
    assert!(core.wmem.get_node(red).is_some());
}

#[test]
fn unreferenced_orphans_vanish_after_their_grace_round() {
    let mut core = Core::new();
    // an orphan structure nothing points at
    let x = core.wmem.make_node("obj", None, 0, 1.0);
    let y = core.wmem.add_prop(x, "hq", "blue", 0, 1.0, false).unwrap();
    for id in [x, y] {
        let n = core.wmem.node_mut(id).unwrap();
        n.reveal();
        n.set_belief(1.0);
    }

    // fresh nodes survive exactly one collection round
    core.cycle(true);
    assert!(core.wmem.get_node(x).is_some());
    core.cycle(true);
    assert!(core.wmem.get_node(x).is_none());
    assert!(core.wmem.get_node(y).is_none());
}
