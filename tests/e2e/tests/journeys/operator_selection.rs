//! Journey: a DO request tries operators by preference, excludes the
//! failed one on the next round, and fails when advice runs out.

use noema_core::{Core, DirKind, GroundingKernel, NodeId, WorkingMemory};
use noema_e2e_tests::harness::{do_focus, do_operator, seed_kind};

/// Kernel that recognizes "pickup" but always reports failure.
struct BrokenArm {
    starts: usize,
}

impl GroundingKernel for BrokenArm {
    fn name(&self) -> &str {
        "broken-arm"
    }

    fn start(&mut self, wmem: &mut WorkingMemory, desc: NodeId, _bid: i32) -> i32 {
        let known = wmem
            .get_node(desc)
            .map(|n| n.lex_match("pickup"))
            .unwrap_or(false);
        if !known {
            return -2;
        }
        self.starts += 1;
        self.starts as i32
    }

    fn status(&mut self, _wmem: &mut WorkingMemory, _desc: NodeId, _inst: i32) -> i32 {
        -1 // physical failure every time
    }
}

#[test]
fn failed_methods_rotate_through_operators_then_fail() {
    let mut core = Core::new();
    core.add_kernel(Box::new(BrokenArm { starts: 0 }));
    let (obj, _) = seed_kind(&mut core, "block");

    let first = core.pmem.add_operator(do_operator("pickup", 0.8));
    let second = core.pmem.add_operator(do_operator("pickup", 0.6));
    let idx = do_focus(&mut core, "pickup", obj);

    // run until the focus settles
    let mut verdict = 0;
    for _ in 0..12 {
        core.cycle(false);
        let f = core.atree.focus(idx).unwrap();
        verdict = f.chain.verdict();
        if f.done {
            break;
        }
    }

    // both operators were tried (high preference first) and the DO failed
    assert_eq!(verdict, -2);
    assert!(core.atree.focus(idx).unwrap().done);

    // failure dinged both preferences, better one first
    let p1 = core.pmem.op(first).unwrap().pref;
    let p2 = core.pmem.op(second).unwrap().pref;
    assert!((p1 - 0.7).abs() < 1e-9, "first op should drop to 0.7, got {p1}");
    assert!((p2 - 0.5).abs() < 1e-9, "second op should drop to 0.5, got {p2}");
}

#[test]
fn success_of_first_method_wins_immediately() {
    /// Kernel that succeeds on the second poll.
    struct SlowArm;
    impl GroundingKernel for SlowArm {
        fn name(&self) -> &str {
            "slow-arm"
        }
        fn start(&mut self, wmem: &mut WorkingMemory, desc: NodeId, _bid: i32) -> i32 {
            let known = wmem
                .get_node(desc)
                .map(|n| n.lex_match("pickup"))
                .unwrap_or(false);
            if known { 1 } else { -2 }
        }
        fn status(&mut self, _wmem: &mut WorkingMemory, _desc: NodeId, _inst: i32) -> i32 {
            1
        }
    }

    let mut core = Core::new();
    core.add_kernel(Box::new(SlowArm));
    let (obj, _) = seed_kind(&mut core, "block");
    core.pmem.add_operator(do_operator("pickup", 0.8));
    core.pmem.add_operator(do_operator("pickup", 0.6));
    let idx = do_focus(&mut core, "pickup", obj);

    let mut verdict = 0;
    for _ in 0..8 {
        core.cycle(false);
        let f = core.atree.focus(idx).unwrap();
        verdict = f.chain.verdict();
        if f.done {
            break;
        }
    }
    assert_eq!(verdict, 1);

    // no preference was punished on the successful path
    assert!((core.pmem.op(1).unwrap().pref - 0.8).abs() < 1e-9);
}

#[test]
fn below_threshold_operators_are_ignored() {
    let mut core = Core::new();
    let (obj, _) = seed_kind(&mut core, "block");
    core.pmem.add_operator(do_operator("pickup", 0.3)); // under pth0
    let idx = do_focus(&mut core, "pickup", obj);

    let mut verdict = 0;
    for _ in 0..4 {
        core.cycle(false);
        let f = core.atree.focus(idx).unwrap();
        verdict = f.chain.verdict();
        if f.done {
            break;
        }
    }
    assert_eq!(verdict, -2, "no eligible advice means the DO fails");
    assert_eq!(core.pmem.op(1).unwrap().pref, 0.3);
}

#[test]
fn directive_kind_gates_operator_family() {
    let mut core = Core::new();
    let (obj, _) = seed_kind(&mut core, "block");
    // a CHK-kind operator must not answer a DO request
    let mut op = do_operator("pickup", 0.9);
    op.kind = DirKind::Chk;
    core.pmem.add_operator(op);
    let idx = do_focus(&mut core, "pickup", obj);

    let mut verdict = 0;
    for _ in 0..4 {
        core.cycle(false);
        let f = core.atree.focus(idx).unwrap();
        verdict = f.chain.verdict();
        if f.done {
            break;
        }
    }
    assert_eq!(verdict, -2);
}
