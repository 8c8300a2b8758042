//! Journey: one-step inference appears in the halo, a contradictory
//! assertion lowers the source rule's confidence.

use noema_core::{query, Core, NodeList};
use noema_e2e_tests::harness::{class_rule, seed_kind};

#[test]
fn inference_lands_in_halo_with_provenance() {
    let mut core = Core::new();
    let (obj, _) = seed_kind(&mut core, "dog");
    core.amem.add_rule(class_rule("dog", "animal", 0.9), false);

    core.amem.refresh_halo(&mut core.wmem);
    assert_eq!(core.wmem.halo_size(), 1);

    // the halo carries ako(animal) over obj at the rule's confidence
    let halo = core.wmem.halo_pool();
    let inf = halo.ids()[0];
    let n = halo.node(inf).unwrap();
    assert_eq!(n.lex(), Some("animal"));
    assert!((n.belief() - 0.9).abs() < 1e-9);
    assert_eq!(n.halo_src.map(|s| s.rule), Some(1));
    assert!(query::has_val(&core.wmem, n, "ako", obj));
}

#[test]
fn contradiction_lowers_rule_confidence() {
    let mut core = Core::new();
    let (obj, _) = seed_kind(&mut core, "dog");
    core.amem.add_rule(class_rule("dog", "animal", 0.9), false);
    core.amem.refresh_halo(&mut core.wmem);

    // post "obj is not an animal" as a NOTE
    core.start_note();
    let not_animal = core.wmem.add_prop(obj, "ako", "animal", 1, -1.0, false).unwrap();
    core.finish_note(None);
    core.cycle(false);

    // the belief landed and the responsible rule was discredited
    assert!(core.wmem.get(not_animal).unwrap().belief() > 0.0);
    let conf = core.amem.rule(1).unwrap().conf;
    assert!((conf - 0.8).abs() < 1e-9, "conf should drop by cdec, got {conf}");
    assert!(core.mood.rule_adj < 0.0);
}

#[test]
fn agreement_raises_weak_rule_confidence() {
    let mut core = Core::new();
    let (obj, _) = seed_kind(&mut core, "dog");
    core.amem.add_rule(class_rule("dog", "animal", 0.3), false);
    core.amem.refresh_halo(&mut core.wmem);

    // confirming assertion: the weak prediction was right after all
    core.start_note();
    let _yes = core.wmem.add_prop(obj, "ako", "animal", 0, -1.0, false).unwrap();
    core.finish_note(None);
    core.cycle(false);

    let conf = core.amem.rule(1).unwrap().conf;
    assert!((conf - 0.4).abs() < 1e-9, "conf should rise by cinc, got {conf}");
}

#[test]
fn confidence_stays_within_bounds() {
    let mut core = Core::new();
    let (obj, _) = seed_kind(&mut core, "dog");
    core.amem.add_rule(class_rule("dog", "animal", 0.9), false);

    // repeated contradictions bottom out at 0.1
    for _ in 0..12 {
        core.amem.refresh_halo(&mut core.wmem);
        core.start_note();
        let f = core.wmem.add_prop(obj, "ako", "animal", 1, -1.0, false).unwrap();
        core.finish_note(None);
        core.cycle(false);
        // retract so the next round predicts afresh
        core.wmem.node_mut(f).unwrap().suppress();
    }
    assert!(core.amem.rule(1).unwrap().conf >= 0.1);
}
