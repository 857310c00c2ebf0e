use pretty_assertions::assert_eq;

use creative_maps::graph::{cluster, optimize};
use creative_maps::{Edge, EngineState, LayoutEngine, LayoutOptions, LayoutStrategy, Node};

fn sample_graph() -> (Vec<Node>, Vec<Edge>) {
    let nodes = (1..=24).map(Node::new).collect::<Vec<_>>();
    let mut edges = Vec::new();
    for group in [1..=6, 7..=14, 15..=18] {
        let ids = group.collect::<Vec<i64>>();
        for (index, &from) in ids.iter().enumerate() {
            for &to in &ids[index + 1..] {
                edges.push(Edge::new(from, to, 0.5 + ((from + to) % 5) as f64 / 10.0));
            }
        }
    }
    (nodes, edges)
}

fn engine_for(strategy: LayoutStrategy) -> LayoutEngine {
    let (mut nodes, edges) = sample_graph();
    let clusters = cluster(&mut nodes, &edges);
    let edges = optimize(&nodes, &edges, 0.1).expect("valid fraction");

    let mut engine = LayoutEngine::new(LayoutOptions::default().with_seed(7));
    engine.initialize(nodes, edges, clusters, strategy);
    engine
}

#[test]
fn default_layout_settles() {
    let mut engine = engine_for(LayoutStrategy::Default);

    let mut energies = Vec::new();
    while let Some(tick) = engine.step() {
        energies.push(tick.kinetic_energy);
        if !tick.active {
            break;
        }
        assert!(energies.len() < 5_000, "layout never cooled");
    }

    let window = energies.len() / 4;
    assert!(window > 0);
    let early_peak = energies[..window].iter().copied().fold(0.0, f32::max);
    let late_peak = energies[energies.len() - window..].iter().copied().fold(0.0, f32::max);
    assert!(late_peak <= early_peak + 1e-3, "late {late_peak} vs early {early_peak}");
    assert!(energies.last().copied().unwrap_or(f32::MAX) < 0.05);
    assert!(engine.nodes().iter().all(|node| {
        node.position().is_some_and(|(x, y)| x.is_finite() && y.is_finite())
    }));
}

#[test]
fn virtual_links_never_leak_into_edges() {
    let (mut nodes, edges) = sample_graph();
    let clusters = cluster(&mut nodes, &edges);
    let real = optimize(&nodes, &edges, 0.0).expect("valid fraction");

    let mut engine = LayoutEngine::new(LayoutOptions::default().with_seed(3));
    engine.initialize(nodes, real.clone(), clusters, LayoutStrategy::Experimental);
    assert!(engine.virtual_link_count() > 0);

    engine.run(50);
    engine.relayout();
    engine.run(50);

    assert_eq!(engine.edges(), real.as_slice());
    let (_, edges, _) = engine.into_parts();
    assert_eq!(edges, real);
}

#[test]
fn seeded_layouts_are_reproducible() {
    let mut first = engine_for(LayoutStrategy::Experimental);
    let mut second = engine_for(LayoutStrategy::Experimental);
    first.run(100);
    second.run(100);

    assert_eq!(first.nodes(), second.nodes());
}

#[test]
fn experimental_clusters_stay_near_their_centers() {
    let mut engine = engine_for(LayoutStrategy::Experimental);
    engine.run(300);

    let spread = |cluster: &str| {
        let members = engine
            .nodes()
            .iter()
            .filter(|node| node.cluster.as_deref() == Some(cluster))
            .filter_map(Node::position)
            .collect::<Vec<_>>();
        let count = members.len() as f32;
        let (cx, cy) = members
            .iter()
            .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x / count, sy + y / count));
        members
            .iter()
            .map(|(x, y)| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt())
            .fold(0.0, f32::max)
    };

    assert!(spread("1") < 200.0);
    assert!(spread("2") < 200.0);
}

#[test]
fn drag_then_restore_keeps_engine_running() {
    let mut engine = engine_for(LayoutStrategy::Default);
    engine.run(20);

    assert!(engine.begin_drag(7));
    for offset in 0..10 {
        engine.drag_to(7, 100.0 + offset as f32, 50.0);
        engine.step();
    }
    assert!(engine.end_drag(7));
    engine.restore_default_forces();

    assert_eq!(engine.state(), EngineState::Running);
    assert_eq!(engine.alpha(), Some(0.1));
    let dragged = engine.nodes().iter().find(|node| node.id == 7).and_then(Node::position);
    assert_eq!(dragged, Some((109.0, 50.0)));
}
