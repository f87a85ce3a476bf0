//! Benchmark test for restart planning.
//!
//! Measures how long it takes to plan clusters of increasing size.
//! Run: cargo test -p ndbroll-core --test bench_scheduler -- --nocapture

use std::time::Instant;

use ndbroll_core::scheduler::schedule;
use ndbroll_core::types::{GroupId, Node, NodeId};

/// Nodes spread over `groups` groups, listed in a scrambled order.
fn generate_nodes(count: usize, groups: usize) -> Vec<Node> {
    use rand::SeedableRng;
    use rand::seq::SliceRandom;
    let mut rng = rand::rngs::StdRng::seed_from_u64(0xdead_beef);
    let mut nodes: Vec<Node> = (0..count)
        .map(|i| Node::new(i as NodeId + 1, (i % groups) as GroupId))
        .collect();
    nodes.shuffle(&mut rng);
    nodes
}

#[test]
fn bench_schedule() {
    let layouts = [(48, 24), (1_000, 250), (10_000, 2_500), (10_000, 2)];
    println!("\n=== Restart planning ===");
    for (count, groups) in layouts {
        let nodes = generate_nodes(count, groups);
        let iterations = 20;
        let start = Instant::now();
        for _ in 0..iterations {
            let plan = schedule(nodes.clone()).unwrap();
            assert_eq!(plan.len(), count);
        }
        let elapsed = start.elapsed();
        println!(
            "  {count:>6} nodes / {groups:>5} groups × {iterations}: {:.3} ms per plan",
            elapsed.as_secs_f64() * 1000.0 / iterations as f64
        );
    }
}

#[test]
fn bench_large_plan_is_fair() {
    let plan = schedule(generate_nodes(10_000, 2_500)).unwrap();
    assert!(plan.is_group_fair());
}
