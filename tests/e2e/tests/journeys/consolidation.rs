//! Journey: a two-rule inference chain collapses into one combined rule
//! whose confidence is the weakest link; duplicates and tautologies are
//! turned away.

use noema_core::{Bindings, Core, NodeId, Rule};
use noema_e2e_tests::harness::{class_rule, seed_kind};

fn two_step_setup(core: &mut Core) -> NodeId {
    let (obj, _) = seed_kind(core, "dog");
    core.amem.add_rule(class_rule("dog", "mammal", 0.9), false);
    core.amem.add_rule(class_rule("mammal", "breather", 0.8), false);
    core.amem.refresh_halo(&mut core.wmem);
    obj
}

/// The band-3 conclusion node (breather) of the two-step chain.
fn two_step_fact(core: &Core) -> NodeId {
    let halo = core.wmem.halo_pool();
    halo.ids()
        .into_iter()
        .find(|id| core.wmem.in_band(*id, 3))
        .expect("two-step inference present")
}

#[test]
fn combined_rule_takes_min_confidence() {
    let mut core = Core::new();
    let obj = two_step_setup(&mut core);
    assert_eq!(core.wmem.halo_size(), 2);

    let deep = two_step_fact(&core);
    let mut b = Bindings::new();
    b.bind(obj, deep).unwrap();

    assert_eq!(core.amem.consolidate(&b, &core.wmem), 1);
    assert_eq!(core.amem.len(), 3);

    let combo = core.amem.rules().last().unwrap();
    assert!((combo.conf - 0.8).abs() < 1e-9);
    // condition speaks of dogs, result of breathing
    let cond_words: Vec<_> = combo
        .sit
        .cond
        .items()
        .filter_map(|id| combo.pool.node(id).and_then(|n| n.lex().map(String::from)))
        .collect();
    assert!(cond_words.contains(&"dog".to_string()));
    let res_words: Vec<_> = combo
        .result
        .items()
        .filter_map(|id| combo.pool.node(id).and_then(|n| n.lex().map(String::from)))
        .collect();
    assert_eq!(res_words, vec!["breather".to_string()]);
}

#[test]
fn duplicate_consolidation_rejected() {
    let mut core = Core::new();
    let obj = two_step_setup(&mut core);
    let deep = two_step_fact(&core);
    let mut b = Bindings::new();
    b.bind(obj, deep).unwrap();

    assert_eq!(core.amem.consolidate(&b, &core.wmem), 1);
    assert_eq!(core.amem.consolidate(&b, &core.wmem), 0);
    assert_eq!(core.amem.len(), 3);
}

#[test]
fn combined_rule_fires_in_one_step_next_cycle() {
    let mut core = Core::new();
    let obj = two_step_setup(&mut core);
    let deep = two_step_fact(&core);
    let mut b = Bindings::new();
    b.bind(obj, deep).unwrap();
    core.amem.consolidate(&b, &core.wmem);

    // next refresh: the dog -> breather shortcut is now a single step
    core.amem.refresh_halo(&mut core.wmem);
    let halo = core.wmem.halo_pool();
    let one_step_breather = halo.ids().into_iter().any(|id| {
        core.wmem.in_band(id, 2)
            && halo
                .node(id)
                .map(|n| n.lex_match("breather"))
                .unwrap_or(false)
    });
    assert!(one_step_breather);
}

#[test]
fn tautological_rule_rejected_outright() {
    let mut core = Core::new();
    let mut r = Rule::new();
    let x = r.pool.make_node("obj", None, 0, 1.0);
    let d = r.pool.make_node("ako", Some("dog"), 0, 1.0);
    r.pool.add_arg(d, "ako", x).unwrap();
    r.sit.cond.add_item(d).unwrap();
    r.sit.cond.add_item(x).unwrap();
    r.result.add_item(d).unwrap();
    assert!(!core.amem.add_rule(r, false));
    assert_eq!(core.amem.len(), 0);
}
