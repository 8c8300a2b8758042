//! Matcher benchmarks: anchored expansion versus bare enumeration over a
//! populated working memory, and a full halo refresh.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use noema_core::{Bindings, CaptureSink, Core, Graphlet, NodePool, Situation, WorkingMemory};

/// Working memory with `n` objects, each carrying a color and a kind.
fn populate(n: usize) -> WorkingMemory {
    let colors = ["red", "blue", "green", "yellow"];
    let kinds = ["block", "ball", "box", "cup"];
    let mut wm = WorkingMemory::new();
    for i in 0..n {
        let obj = wm.make_node("obj", None, 0, 1.0);
        let hq = wm
            .add_prop(obj, "hq", colors[i % colors.len()], 0, 1.0, false)
            .unwrap();
        let ako = wm
            .add_prop(obj, "ako", kinds[i % kinds.len()], 0, 1.0, false)
            .unwrap();
        for id in [obj, hq, ako] {
            let node = wm.node_mut(id).unwrap();
            node.reveal();
            node.set_belief(1.0);
        }
    }
    wm
}

/// Pattern: some object that is a red block.
fn red_block_pattern() -> (NodePool, Graphlet) {
    let mut p = NodePool::new();
    let x = p.make_node("obj", None, 0, 1.0);
    let red = p.make_node("hq", Some("red"), 0, 1.0);
    p.add_arg(red, "hq", x).unwrap();
    let block = p.make_node("ako", Some("block"), 0, 1.0);
    p.add_arg(block, "ako", x).unwrap();
    let mut g = Graphlet::new();
    for id in [x, red, block] {
        g.add_item(id).unwrap();
    }
    (p, g)
}

fn bench_match(c: &mut Criterion) {
    let wm = populate(200);
    let (pool, pat) = red_block_pattern();
    let mut sit = Situation::new();
    sit.cond = pat.clone();

    c.bench_function("match_red_block_200", |b| {
        b.iter(|| {
            let mut sink = CaptureSink::default();
            let mut m = [Bindings::new()];
            m[0].expect = pat.num_items();
            let mut mc = 1usize;
            black_box(sit.match_graph(&pool, &mut sink, &mut m, &mut mc, &pat, &wm, None))
        })
    });
}

fn bench_halo(c: &mut Criterion) {
    c.bench_function("halo_refresh_100", |b| {
        let mut core = Core::new();
        for i in 0..100 {
            core.start_note();
            let obj = core.new_node("obj", None);
            core.new_prop(obj, "ako", if i % 2 == 0 { "dog" } else { "cat" }, 0, 1.0)
                .unwrap();
            core.finish_note(None);
        }
        let mut r = noema_core::Rule::new();
        let x = r.pool.make_node("obj", None, 0, 1.0);
        let dog = r.pool.make_node("ako", Some("dog"), 0, 1.0);
        r.pool.add_arg(dog, "ako", x).unwrap();
        r.sit.cond.add_item(dog).unwrap();
        r.sit.cond.add_item(x).unwrap();
        let animal = r.pool.make_node("ako", Some("animal"), 0, 1.0);
        r.pool.add_arg(animal, "ako", x).unwrap();
        r.result.add_item(animal).unwrap();
        r.conf = 0.9;
        core.amem.add_rule(r, false);
        core.cycle(false); // realize the notes

        b.iter(|| {
            black_box(core.amem.refresh_halo(&mut core.wmem));
        })
    });
}

criterion_group!(benches, bench_match, bench_halo);
criterion_main!(benches);
