//! Journey: knowledge files survive save -> load -> save byte-for-byte
//! (modulo id renumbering), and chain jump topology is preserved.

use noema_core::{
    ChainGraph, DirKind, Directive, Graphlet, LineReader, NodePool, Operator, Payload, Rule,
    RuleMemory, TransTable,
};

fn fancy_rule() -> Rule {
    let mut r = Rule::new();
    let x = r.pool.make_node("obj", None, 0, 1.0);
    let dog = r.pool.make_node("ako", Some("dog"), 0, 1.0);
    r.pool.add_arg(dog, "ako", x).unwrap();
    let big = r.pool.make_node("hq", Some("big"), 0, 1.0);
    r.pool.add_arg(big, "hq", x).unwrap();
    r.sit.cond.add_item(dog).unwrap();
    r.sit.cond.add_item(x).unwrap();
    r.sit.cond.add_item(big).unwrap();

    // unless: x is gentle
    let mut u = Graphlet::new();
    let gentle = r.pool.make_node("hq", Some("gentle"), 0, 1.0);
    r.pool.add_arg(gentle, "hq", x).unwrap();
    u.add_item(gentle).unwrap();
    r.sit.unless.push(u);

    let scary = r.pool.make_node("hq", Some("scary"), 0, 1.0);
    r.pool.add_arg(scary, "hq", x).unwrap();
    r.result.add_item(scary).unwrap();
    r.conf = 0.75;
    r.pool.force_belief(&r.result, 0.75);
    r.pool.node_mut(scary).unwrap().set_default(0.75);
    r.gist = "Big dogs are scary".to_string();
    r.id = 1;
    r
}

#[test]
fn rule_save_load_save_is_stable() {
    let r = fancy_rule();
    let mut first = String::new();
    r.save(&mut first, 2).unwrap();
    first.push('\n');

    let mut input = LineReader::new(first.as_bytes());
    let mut r2 = Rule::new();
    assert!(r2.load(&mut input).unwrap());
    r2.id = 1;
    assert_eq!(r2.conf, 0.75);
    assert_eq!(r2.sit.unless.len(), 1);
    assert_eq!(r2.gist, "Big dogs are scary");

    // ids renumber on the first load; generations 2 and 3 are identical
    let mut second = String::new();
    r2.save(&mut second, 2).unwrap();
    second.push('\n');
    let mut input3 = LineReader::new(second.as_bytes());
    let mut r3 = Rule::new();
    assert!(r3.load(&mut input3).unwrap());
    r3.id = 1;
    let mut third = String::new();
    r3.save(&mut third, 2).unwrap();
    third.push('\n');
    assert_eq!(second, third);
}

#[test]
fn rule_file_round_trip_via_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kb.rules");

    let mut am = RuleMemory::new();
    am.add_rule(fancy_rule(), false);
    assert_eq!(am.save(&path, 0).unwrap(), 1);

    let mut am2 = RuleMemory::new();
    assert_eq!(am2.load(&path, false, 0).unwrap(), 1);
    let r2 = am2.rules().next().unwrap();
    assert_eq!(r2.conf, 0.75);
    assert_eq!(r2.sit.cond.num_items(), 3);

    // stability check across a second store generation
    let path2 = dir.path().join("kb2.rules");
    am2.save(&path2, 0).unwrap();
    let mut am3 = RuleMemory::new();
    assert_eq!(am3.load(&path2, false, 0).unwrap(), 1);
    let path3 = dir.path().join("kb3.rules");
    am3.save(&path3, 0).unwrap();
    let b = std::fs::read_to_string(&path2).unwrap();
    let c = std::fs::read_to_string(&path3).unwrap();
    assert_eq!(b, c);
}

fn chk_operator() -> Operator {
    let mut op = Operator::new(DirKind::Chk);
    let x = op.pool.make_node("obj", None, 0, 1.0);
    let red = op.pool.make_node("hq", Some("red"), 0, 1.0);
    op.pool.add_arg(red, "hq", x).unwrap();
    op.sit.cond.add_item(red).unwrap();
    op.sit.cond.add_item(x).unwrap();
    op.pref = 0.9;

    // method: look at it, then report
    let mut meth = ChainGraph::new();
    let mut g1 = Graphlet::new();
    let look = op.pool.make_node("act", Some("look"), 0, 1.0);
    op.pool.add_arg(look, "obj", x).unwrap();
    g1.add_item(look).unwrap();
    let s1 = meth.push(Payload::Dir(Box::new(Directive::with_key(
        DirKind::Fcn,
        g1,
    ))));
    let mut g2 = Graphlet::new();
    let rep = op.pool.make_node("act", Some("report"), 0, 1.0);
    g2.add_item(rep).unwrap();
    let s2 = meth.push(Payload::Dir(Box::new(Directive::with_key(
        DirKind::Fcn,
        g2,
    ))));
    meth.step_mut(s1).cont = Some(s2);
    op.meth = Some(meth);
    op.id = 1;
    op
}

#[test]
fn operator_save_load_save_is_stable() {
    let op = chk_operator();
    let mut first = String::new();
    op.save(&mut first).unwrap();
    first.push('\n');

    let mut input = LineReader::new(first.as_bytes());
    let mut op2 = Operator::new(DirKind::Do);
    assert!(op2.load(&mut input).unwrap());
    op2.id = 1;
    assert_eq!(op2.kind, DirKind::Chk);
    assert_eq!(op2.pref, 0.9);
    assert_eq!(op2.sit.cond.num_items(), 2);
    assert!(op2.meth.is_some());

    // ids renumber on the first load; generations 2 and 3 are identical
    let mut second = String::new();
    op2.save(&mut second).unwrap();
    second.push('\n');
    let mut input3 = LineReader::new(second.as_bytes());
    let mut op3 = Operator::new(DirKind::Do);
    assert!(op3.load(&mut input3).unwrap());
    op3.id = 1;
    let mut third = String::new();
    op3.save(&mut third).unwrap();
    third.push('\n');
    assert_eq!(second, third);
}

#[test]
fn chain_with_loop_label_keeps_topology() {
    // step1 -> step2, step2 alt jumps back to step1 (a retry loop)
    let text = "\
 ~~~ 1\n\
 CHK[ hq-1 -lex- ready ]\n\
   % 2\n\
 FCN[ act-2 -lex- wait ]\n\
   @ 1\n\
 ~~~ 2\n\
 FCN[ act-3 -lex- go ]\n\
 ...\n\
\n";
    let mut pool = NodePool::new();
    let mut trans = TransTable::new();
    let mut input = LineReader::new(text.as_bytes());
    let g = ChainGraph::load(&mut pool, &mut trans, &mut input).unwrap();

    // CHK's alternate lands on "go", its continuation loops through "wait"
    let chk = g.start;
    let alt = g.step(chk).alt.expect("alt jump resolved");
    match &g.step(alt).payload {
        Payload::Dir(d) => {
            let n = pool.node(d.key.main().unwrap()).unwrap();
            assert_eq!(n.lex(), Some("go"));
        }
        _ => panic!("expected directive"),
    }
    let wait = g.step(chk).cont.expect("continuation present");
    assert_eq!(g.step(wait).cont, Some(chk), "loop jump back to the label");

    // regurgitated text parses to the same shape
    let mut out = String::new();
    g.save(&pool, &mut out, 0).unwrap();
    out.push('\n');
    let mut pool2 = NodePool::new();
    let mut trans2 = TransTable::new();
    let mut in2 = LineReader::new(out.as_bytes());
    let g2 = ChainGraph::load(&mut pool2, &mut trans2, &mut in2).unwrap();
    let chk2 = g2.start;
    assert!(g2.step(chk2).alt.is_some());
    let wait2 = g2.step(chk2).cont.unwrap();
    assert_eq!(g2.step(wait2).cont, Some(chk2));
}

#[test]
fn play_round_trip() {
    let text = "\
 >>>\n\
   FCN[ act-1 -lex- reach ]\n\
 +++\n\
   FCN[ act-2 -lex- gaze ]\n\
 ===\n\
   KEEP[ hq-3 -lex- steady ]\n\
 <<<\n\
 ...\n\
\n";
    let mut pool = NodePool::new();
    let mut trans = TransTable::new();
    let mut input = LineReader::new(text.as_bytes());
    let g = ChainGraph::load(&mut pool, &mut trans, &mut input).unwrap();

    let play = match &g.step(g.start).payload {
        Payload::Play(p) => p,
        _ => panic!("expected play"),
    };
    assert_eq!(play.req.len(), 2);
    assert_eq!(play.simul.len(), 1);

    let mut out = String::new();
    g.save(&pool, &mut out, 0).unwrap();
    out.push('\n');
    let mut pool2 = NodePool::new();
    let mut trans2 = TransTable::new();
    let mut in2 = LineReader::new(out.as_bytes());
    let g2 = ChainGraph::load(&mut pool2, &mut trans2, &mut in2).unwrap();
    match &g2.step(g2.start).payload {
        Payload::Play(p) => {
            assert_eq!(p.req.len(), 2);
            assert_eq!(p.simul.len(), 1);
        }
        _ => panic!("expected play after round trip"),
    }
}
