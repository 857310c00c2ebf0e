//! Long-lived force layout over a clustered similarity graph.
//!
//! The engine owns the node, edge and cluster arena it was initialized with and
//! advances one integration step per [`LayoutEngine::step`] call. Node `x`/`y`
//! are written back after every step; everything else about the simulation,
//! including the virtual links of the experimental strategy, stays private.

mod physics;
mod preposition;
mod strategy;

use std::collections::HashMap;
use std::fmt;

use emath::{Vec2, vec2};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{debug, trace};

use crate::graph::{ClusterInfo, Edge, Node};
use physics::{CenterForce, LinkForce, SimLink, SimNode, Simulation};
use preposition::{VirtualLink, preposition_default, preposition_grid};
pub use strategy::LayoutStrategy;
use strategy::{DRAG_ALPHA_TARGET, NUDGE_ALPHA, RELAYOUT_ALPHA, SETTLE_PROFILE};

pub type CollisionRadius = Box<dyn Fn(&Node) -> f32>;
pub type TickObserver = Box<dyn FnMut(&[Node], &Tick)>;

pub struct LayoutOptions {
    pub width: f32,
    pub height: f32,
    /// Collision radius of a node; defaults to `size * 5`.
    pub collision_radius: CollisionRadius,
    /// Seed for the random parts of prepositioning; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            collision_radius: Box::new(|node: &Node| node.size * 5.0),
            seed: None,
        }
    }
}

impl LayoutOptions {
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_collision_radius(mut self, radius: impl Fn(&Node) -> f32 + 'static) -> Self {
        self.collision_radius = Box::new(radius);
        self
    }
}

impl fmt::Debug for LayoutOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutOptions")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Running,
    Paused,
    Destroyed,
}

/// Outcome of one [`LayoutEngine::step`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    pub alpha: f32,
    pub kinetic_energy: f32,
    /// False once the simulation has cooled below its minimum energy.
    pub active: bool,
}

struct GraphArena {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    clusters: Vec<ClusterInfo>,
    index_by_id: HashMap<i64, usize>,
}

struct SimulationState {
    simulation: Simulation,
    strategy: LayoutStrategy,
    cluster_centers: HashMap<String, Vec2>,
    virtual_links: Vec<VirtualLink>,
}

pub struct LayoutEngine {
    state: EngineState,
    strategy: LayoutStrategy,
    size: Vec2,
    collision_radius: CollisionRadius,
    rng: SmallRng,
    graph: Option<GraphArena>,
    sim: Option<SimulationState>,
    observer: Option<TickObserver>,
}

impl fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("state", &self.state)
            .field("strategy", &self.strategy)
            .field("size", &self.size)
            .field("nodes", &self.nodes().len())
            .finish_non_exhaustive()
    }
}

impl LayoutEngine {
    pub fn new(options: LayoutOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        Self {
            state: EngineState::Uninitialized,
            strategy: LayoutStrategy::Default,
            size: vec2(options.width, options.height),
            collision_radius: options.collision_radius,
            rng,
            graph: None,
            sim: None,
            observer: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Strategy used by the next `initialize` or `relayout`.
    pub fn strategy(&self) -> LayoutStrategy {
        self.strategy
    }

    pub fn nodes(&self) -> &[Node] {
        self.graph.as_ref().map(|graph| graph.nodes.as_slice()).unwrap_or_default()
    }

    /// The real edges the engine was initialized with; virtual links never
    /// appear here.
    pub fn edges(&self) -> &[Edge] {
        self.graph.as_ref().map(|graph| graph.edges.as_slice()).unwrap_or_default()
    }

    pub fn clusters(&self) -> &[ClusterInfo] {
        self.graph.as_ref().map(|graph| graph.clusters.as_slice()).unwrap_or_default()
    }

    pub fn alpha(&self) -> Option<f32> {
        self.sim.as_ref().map(|sim| sim.simulation.alpha)
    }

    pub fn kinetic_energy(&self) -> Option<f32> {
        self.sim.as_ref().map(|sim| sim.simulation.kinetic_energy())
    }

    /// Virtual links bound into the running link force.
    pub fn virtual_link_count(&self) -> usize {
        self.sim
            .as_ref()
            .and_then(|sim| sim.simulation.forces.link.as_ref())
            .map_or(0, |force| force.links.iter().filter(|link| link.is_virtual).count())
    }

    pub fn cluster_center(&self, cluster: &str) -> Option<(f32, f32)> {
        let sim = self.sim.as_ref()?;
        let center = sim.cluster_centers.get(cluster)?;
        Some((center.x, center.y))
    }

    /// Hands the arena back, e.g. to re-cluster after a data change.
    pub fn into_parts(self) -> (Vec<Node>, Vec<Edge>, Vec<ClusterInfo>) {
        match self.graph {
            Some(graph) => (graph.nodes, graph.edges, graph.clusters),
            None => (Vec::new(), Vec::new(), Vec::new()),
        }
    }

    pub fn on_tick(&mut self, observer: impl FnMut(&[Node], &Tick) + 'static) {
        if self.state == EngineState::Destroyed {
            trace!("ignoring tick observer on destroyed layout engine");
            return;
        }
        self.observer = Some(Box::new(observer));
    }

    /// Binds the engine to a graph, prepositions it and starts the
    /// simulation. Returns false when the engine was already destroyed.
    pub fn initialize(
        &mut self,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        clusters: Vec<ClusterInfo>,
        strategy: LayoutStrategy,
    ) -> bool {
        if self.state == EngineState::Destroyed {
            trace!("ignoring initialize on destroyed layout engine");
            return false;
        }

        self.sim = None;
        self.strategy = strategy;

        let mut index_by_id = HashMap::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            index_by_id.entry(node.id).or_insert(index);
        }
        self.graph = Some(GraphArena {
            nodes,
            edges,
            clusters,
            index_by_id,
        });

        self.start(None);
        debug!(
            strategy = %self.strategy,
            nodes = self.nodes().len(),
            edges = self.edges().len(),
            virtual_links = self.virtual_link_count(),
            "layout initialized"
        );
        true
    }

    /// Takes effect on the next `initialize` or `relayout`.
    pub fn set_strategy(&mut self, strategy: LayoutStrategy) {
        if self.state == EngineState::Destroyed {
            trace!("ignoring strategy change on destroyed layout engine");
            return;
        }
        self.strategy = strategy;
    }

    pub fn pause(&mut self) {
        if self.state == EngineState::Running {
            self.state = EngineState::Paused;
        } else {
            trace!(state = ?self.state, "ignoring pause");
        }
    }

    /// Continues integration with moderate energy; not a restart.
    pub fn resume(&mut self) {
        match (self.state, self.sim.as_mut()) {
            (EngineState::Running | EngineState::Paused, Some(sim)) => {
                sim.simulation.alpha = NUDGE_ALPHA;
                self.state = EngineState::Running;
            }
            _ => trace!(state = ?self.state, "ignoring resume"),
        }
    }

    /// Re-prepositions with the current strategy and restarts at full energy.
    pub fn relayout(&mut self) {
        if !self.is_live() {
            trace!(state = ?self.state, "ignoring relayout");
            return;
        }
        self.start(Some(RELAYOUT_ALPHA));
        debug!(strategy = %self.strategy, "layout restarted");
    }

    /// Hands control back to steady-state physics after a drag, damped so
    /// the layout settles instead of flying apart.
    pub fn restore_default_forces(&mut self) {
        if !self.is_live() {
            trace!(state = ?self.state, "ignoring force restore");
            return;
        }
        let target = self.size * 0.5;
        let (Some(graph), Some(sim)) = (self.graph.as_mut(), self.sim.as_mut()) else {
            return;
        };

        let profile = sim.strategy.profile();
        let links = build_links(graph, sim);
        let simulation = &mut sim.simulation;
        simulation.forces.link = Some(LinkForce::new(links, simulation.nodes.len()));
        simulation.forces.collide = Some(profile.collide);
        simulation.forces.charge = Some(SETTLE_PROFILE.charge);
        simulation.forces.center = Some(CenterForce {
            target,
            strength: SETTLE_PROFILE.center_strength,
        });
        simulation.velocity_decay = SETTLE_PROFILE.velocity_decay;
        simulation.alpha_decay = SETTLE_PROFILE.alpha_decay;
        simulation.alpha_min = SETTLE_PROFILE.alpha_min;
        simulation.alpha = SETTLE_PROFILE.alpha;
    }

    /// Re-targets the centering force and nudges the energy so nodes drift
    /// into the new bounds.
    pub fn update_dimensions(&mut self, width: f32, height: f32) {
        debug_assert!(
            width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0,
            "layout dimensions must be positive, got {width}x{height}"
        );
        if self.state == EngineState::Destroyed {
            trace!("ignoring resize on destroyed layout engine");
            return;
        }

        self.size = vec2(width, height);
        let Some(sim) = self.sim.as_mut() else {
            return;
        };
        if let Some(center) = sim.simulation.forces.center.as_mut() {
            center.target = self.size * 0.5;
        }
        sim.simulation.alpha = NUDGE_ALPHA;
    }

    /// Recomputes every collision radius with the caller's function and
    /// reapplies the collision force; other forces are untouched.
    pub fn update_collision_radius(&mut self) {
        if !self.is_live() {
            trace!(state = ?self.state, "ignoring collision radius update");
            return;
        }
        let (Some(graph), Some(sim)) = (self.graph.as_ref(), self.sim.as_mut()) else {
            return;
        };

        for (sim_node, node) in sim.simulation.nodes.iter_mut().zip(&graph.nodes) {
            sim_node.radius = (self.collision_radius)(node);
        }
        sim.simulation.forces.collide = Some(sim.strategy.profile().collide);
        sim.simulation.alpha = NUDGE_ALPHA;
    }

    /// Pins a node for an interactive drag and keeps the simulation warm.
    pub fn begin_drag(&mut self, id: i64) -> bool {
        let Some((index, sim)) = self.live_node(id) else {
            return false;
        };
        let node = &mut sim.simulation.nodes[index];
        node.pinned = Some(node.pos);
        sim.simulation.alpha_target = DRAG_ALPHA_TARGET;
        true
    }

    pub fn drag_to(&mut self, id: i64, x: f32, y: f32) -> bool {
        let Some((index, sim)) = self.live_node(id) else {
            return false;
        };
        let node = &mut sim.simulation.nodes[index];
        if node.pinned.is_none() {
            return false;
        }
        node.pinned = Some(vec2(x, y));

        if let Some(node) = self.graph.as_mut().and_then(|graph| graph.nodes.get_mut(index)) {
            node.x = Some(x);
            node.y = Some(y);
        }
        true
    }

    /// Releases a dragged node; follow with `restore_default_forces`.
    pub fn end_drag(&mut self, id: i64) -> bool {
        let Some((index, sim)) = self.live_node(id) else {
            return false;
        };
        sim.simulation.nodes[index].pinned = None;
        if sim.simulation.nodes.iter().all(|node| node.pinned.is_none()) {
            sim.simulation.alpha_target = 0.0;
        }
        true
    }

    /// Stops the simulation and drops every force, virtual link and
    /// observer. Safe to call repeatedly and from any state.
    pub fn destroy(&mut self) {
        if self.state != EngineState::Destroyed {
            debug!("layout engine destroyed");
        }
        self.sim = None;
        self.observer = None;
        self.state = EngineState::Destroyed;
    }

    /// Advances the simulation by one step while running.
    ///
    /// Returns `None` when the engine is not running. Once the energy has
    /// decayed below its floor the tick reports `active: false` and no
    /// further integration happens until something adds energy again.
    pub fn step(&mut self) -> Option<Tick> {
        if self.state != EngineState::Running {
            return None;
        }
        let sim = self.sim.as_mut()?;
        let graph = self.graph.as_mut()?;

        if sim.simulation.is_cooled() {
            return Some(Tick {
                alpha: sim.simulation.alpha,
                kinetic_energy: sim.simulation.kinetic_energy(),
                active: false,
            });
        }

        sim.simulation.tick();
        write_positions(&sim.simulation, &mut graph.nodes);

        let tick = Tick {
            alpha: sim.simulation.alpha,
            kinetic_energy: sim.simulation.kinetic_energy(),
            active: !sim.simulation.is_cooled(),
        };
        if let Some(observer) = self.observer.as_mut() {
            observer(&graph.nodes, &tick);
        }
        Some(tick)
    }

    /// Steps until the simulation cools or `max_steps` is reached; returns the
    /// number of `step` calls made.
    pub fn run(&mut self, max_steps: usize) -> usize {
        let mut steps = 0;
        while steps < max_steps {
            let Some(tick) = self.step() else {
                break;
            };
            steps += 1;
            if !tick.active {
                break;
            }
        }
        steps
    }

    fn is_live(&self) -> bool {
        matches!(self.state, EngineState::Running | EngineState::Paused) && self.sim.is_some()
    }

    fn live_node(&mut self, id: i64) -> Option<(usize, &mut SimulationState)> {
        if !matches!(self.state, EngineState::Running | EngineState::Paused) {
            trace!(state = ?self.state, id, "ignoring drag");
            return None;
        }
        let index = *self.graph.as_ref()?.index_by_id.get(&id)?;
        let sim = self.sim.as_mut()?;
        (index < sim.simulation.nodes.len()).then_some((index, sim))
    }

    /// Prepositions with the current strategy and (re)builds the simulation.
    fn start(&mut self, alpha: Option<f32>) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };

        let strategy = self.strategy;
        let (cluster_centers, virtual_links) = match strategy {
            LayoutStrategy::Default => {
                preposition_default(
                    &mut graph.nodes,
                    &graph.edges,
                    &graph.clusters,
                    self.size,
                    &mut self.rng,
                );
                (HashMap::new(), Vec::new())
            }
            LayoutStrategy::Experimental => {
                let placement = preposition_grid(&mut graph.nodes, self.size, &mut self.rng);
                (placement.centers, placement.virtual_links)
            }
        };

        let sim_nodes = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| SimNode::new(index, node.position(), (self.collision_radius)(node)))
            .collect();
        let mut sim = SimulationState {
            simulation: Simulation::new(sim_nodes),
            strategy,
            cluster_centers,
            virtual_links,
        };

        build_forces(graph, &mut sim, self.size, &mut self.rng);
        if let Some(alpha) = alpha {
            sim.simulation.alpha = alpha;
        }
        write_positions(&sim.simulation, &mut graph.nodes);

        self.sim = Some(sim);
        self.state = EngineState::Running;
    }
}

fn write_positions(simulation: &Simulation, nodes: &mut [Node]) {
    for (node, sim_node) in nodes.iter_mut().zip(&simulation.nodes) {
        node.x = Some(sim_node.pos.x);
        node.y = Some(sim_node.pos.y);
    }
}

/// Real edges with known endpoints, plus the virtual links when the
/// strategy uses them.
fn build_links(graph: &GraphArena, sim: &SimulationState) -> Vec<SimLink> {
    let profile = sim.strategy.profile();
    let mut links = Vec::with_capacity(graph.edges.len() + sim.virtual_links.len());

    for edge in &graph.edges {
        let (Some(&source), Some(&target)) = (
            graph.index_by_id.get(&edge.from),
            graph.index_by_id.get(&edge.to),
        ) else {
            continue;
        };
        if source == target {
            continue;
        }

        let same_cluster = graph.nodes[source].cluster.is_some()
            && graph.nodes[source].cluster == graph.nodes[target].cluster;
        let distance = if same_cluster {
            profile.real_links.intra_cluster_distance
        } else {
            profile.real_links.inter_cluster_distance
        };
        links.push(SimLink {
            source,
            target,
            strength: profile.real_links.strength,
            distance,
            is_virtual: false,
        });
    }

    if let Some(virtual_profile) = profile.virtual_links {
        links.extend(sim.virtual_links.iter().map(|link| SimLink {
            source: link.source,
            target: link.target,
            strength: virtual_profile.strength,
            distance: virtual_profile.intra_cluster_distance,
            is_virtual: true,
        }));
    }

    links
}

fn build_forces(graph: &mut GraphArena, sim: &mut SimulationState, size: Vec2, rng: &mut SmallRng) {
    let profile = sim.strategy.profile();

    if sim.strategy == LayoutStrategy::Experimental && sim.cluster_centers.is_empty() {
        let placement = preposition_grid(&mut graph.nodes, size, rng);
        sim.cluster_centers = placement.centers;
        sim.virtual_links = placement.virtual_links;
    }

    let links = build_links(graph, sim);
    let simulation = &mut sim.simulation;
    simulation.forces.link = Some(LinkForce::new(links, simulation.nodes.len()));
    simulation.forces.charge = Some(profile.charge);
    simulation.forces.center = Some(CenterForce {
        target: size * 0.5,
        strength: profile.center_strength,
    });
    simulation.forces.collide = Some(profile.collide);
    simulation.alpha = profile.alpha;
    simulation.alpha_decay = profile.alpha_decay;
    simulation.alpha_min = profile.alpha_min;
    simulation.velocity_decay = profile.velocity_decay;
}
