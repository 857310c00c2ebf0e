use emath::{Vec2, vec2};

use super::SimNode;
use super::quadtree::Quadtree;

/// Barnes-Hut opening criterion, squared (theta = 0.9).
const THETA_SQ: f32 = 0.81;
const CHARGE_DISTANCE_MIN_SQ: f32 = 1.0;

/// Deterministic stand-in direction for coincident points.
fn jiggle(from: usize, to: usize) -> Vec2 {
    let angle = ((from as f32) * 0.618_034 + (to as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin()) * 1e-3
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SimLink {
    pub(crate) source: usize,
    pub(crate) target: usize,
    pub(crate) strength: f32,
    pub(crate) distance: f32,
    pub(crate) is_virtual: bool,
}

/// Spring force along links; each endpoint moves in inverse proportion to
/// its degree.
#[derive(Clone, Debug)]
pub(crate) struct LinkForce {
    pub(crate) links: Vec<SimLink>,
    bias: Vec<f32>,
}

impl LinkForce {
    pub(crate) fn new(links: Vec<SimLink>, node_count: usize) -> Self {
        let mut degree = vec![0usize; node_count];
        for link in &links {
            if link.source < node_count && link.target < node_count {
                degree[link.source] += 1;
                degree[link.target] += 1;
            }
        }

        let bias = links
            .iter()
            .map(|link| {
                let source = degree.get(link.source).copied().unwrap_or(0) as f32;
                let target = degree.get(link.target).copied().unwrap_or(0) as f32;
                if source + target > 0.0 {
                    source / (source + target)
                } else {
                    0.5
                }
            })
            .collect();

        Self { links, bias }
    }

    pub(crate) fn apply(&self, nodes: &mut [SimNode], alpha: f32) {
        let node_count = nodes.len();
        for (link, &bias) in self.links.iter().zip(&self.bias) {
            let (source, target) = (link.source, link.target);
            if source >= node_count || target >= node_count || source == target {
                continue;
            }

            let mut delta = (nodes[target].pos + nodes[target].vel)
                - (nodes[source].pos + nodes[source].vel);
            if delta.length_sq() <= f32::EPSILON {
                delta = jiggle(source, target);
            }
            let distance = delta.length();
            let correction =
                delta * ((distance - link.distance) / distance * alpha * link.strength);

            nodes[target].vel -= correction * bias;
            nodes[source].vel += correction * (1.0 - bias);
        }
    }
}

/// Barnes-Hut many-body force; negative strength repels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ChargeForce {
    pub(crate) strength: f32,
    pub(crate) distance_max: f32,
}

impl ChargeForce {
    pub(super) fn apply(&self, tree: &Quadtree, positions: &[Vec2], nodes: &mut [SimNode], alpha: f32) {
        let field = ChargeField {
            tree,
            positions,
            strength: self.strength * alpha,
            reach_sq: self.distance_max * self.distance_max,
        };
        let mut pending = Vec::new();
        for (index, node) in nodes.iter_mut().enumerate() {
            node.vel += field.pull_on(index, &mut pending);
        }
    }
}

struct ChargeField<'a> {
    tree: &'a Quadtree,
    positions: &'a [Vec2],
    strength: f32,
    reach_sq: f32,
}

impl<'a> ChargeField<'a> {
    /// Velocity change of node `index`; `pending` is reused traversal storage.
    fn pull_on(&self, index: usize, pending: &mut Vec<&'a Quadtree>) -> Vec2 {
        let point = self.positions[index];
        let mut total = Vec2::ZERO;

        pending.clear();
        pending.push(self.tree);
        while let Some(cell) = pending.pop() {
            if cell.weight <= 0.0 {
                continue;
            }

            if cell.is_leaf() {
                for &other in cell.points.iter().filter(|&&other| other != index) {
                    let mut delta = self.positions[other] - point;
                    let distance_sq = delta.length_sq();
                    if distance_sq >= self.reach_sq {
                        continue;
                    }
                    if distance_sq <= f32::EPSILON {
                        delta = jiggle(index, other);
                    }
                    total += inverse_square(delta, self.strength);
                }
                continue;
            }

            let delta = cell.centroid - point;
            let distance_sq = delta.length_sq();
            let side = cell.square.side_length();
            if !cell.square.contains(point) && side * side < THETA_SQ * distance_sq {
                if distance_sq < self.reach_sq {
                    total += inverse_square(delta, self.strength * cell.weight);
                }
            } else {
                pending.extend(cell.children());
            }
        }

        total
    }
}

/// `delta * weight / |delta|^2`, softened below unit distance.
fn inverse_square(delta: Vec2, weight: f32) -> Vec2 {
    let mut distance_sq = delta.length_sq();
    if distance_sq < CHARGE_DISTANCE_MIN_SQ {
        distance_sq = (CHARGE_DISTANCE_MIN_SQ * distance_sq).sqrt();
    }
    delta * (weight / distance_sq)
}

/// Pulls the mean position toward `target` by moving positions directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CenterForce {
    pub(crate) target: Vec2,
    pub(crate) strength: f32,
}

impl CenterForce {
    pub(crate) fn apply(&self, nodes: &mut [SimNode]) {
        if nodes.is_empty() {
            return;
        }

        let mean = nodes.iter().fold(Vec2::ZERO, |sum, node| sum + node.pos) / nodes.len() as f32;
        let shift = (mean - self.target) * self.strength;
        if shift == Vec2::ZERO {
            return;
        }
        nodes.iter_mut().for_each(|node| node.pos -= shift);
    }
}

/// Pushes apart nodes whose velocity-predicted circles overlap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CollideForce {
    pub(crate) strength: f32,
    pub(crate) iterations: usize,
}

impl CollideForce {
    /// `predicted`, `radii` and `deltas` are scratch buffers owned by the
    /// simulation so repeated ticks do not reallocate.
    pub(crate) fn apply(
        &self,
        nodes: &mut [SimNode],
        predicted: &mut Vec<Vec2>,
        radii: &mut Vec<f32>,
        deltas: &mut Vec<Vec2>,
    ) {
        radii.clear();
        radii.extend(nodes.iter().map(|node| node.radius.max(0.0)));
        let widest = radii.iter().copied().fold(0.0_f32, f32::max);
        if widest <= 0.0 {
            return;
        }

        for _ in 0..self.iterations {
            predicted.clear();
            predicted.extend(nodes.iter().map(|node| node.pos + node.vel));
            deltas.clear();
            deltas.resize(nodes.len(), Vec2::ZERO);

            let Some(tree) = Quadtree::build(predicted) else {
                return;
            };
            let contact = Contact {
                positions: predicted.as_slice(),
                radii: radii.as_slice(),
                strength: self.strength,
                reach_sq: (2.0 * widest).powi(2),
            };
            contact.resolve(&tree, deltas);

            for (node, delta) in nodes.iter_mut().zip(deltas.iter()) {
                node.vel += *delta;
            }
        }
    }
}

struct Contact<'a> {
    positions: &'a [Vec2],
    radii: &'a [f32],
    strength: f32,
    reach_sq: f32,
}

impl Contact<'_> {
    /// Visits every pair of cells that could hold touching circles, starting
    /// from the tree paired with itself, and records the separating nudges.
    fn resolve(&self, tree: &Quadtree, deltas: &mut [Vec2]) {
        let mut pairs = vec![(tree, tree)];
        while let Some((a, b)) = pairs.pop() {
            if a.square.distance_sq_to(b.square) > self.reach_sq {
                continue;
            }

            let same = std::ptr::eq(a, b);
            match (a.is_leaf(), b.is_leaf()) {
                (true, true) if same => {
                    for (offset, &from) in a.points.iter().enumerate() {
                        for &to in &a.points[offset + 1..] {
                            self.separate(from, to, deltas);
                        }
                    }
                }
                (true, true) => {
                    for &from in &a.points {
                        for &to in &b.points {
                            self.separate(from, to, deltas);
                        }
                    }
                }
                _ if same => {
                    let children = a.children().collect::<Vec<_>>();
                    for (offset, &first) in children.iter().enumerate() {
                        pairs.extend(children[offset..].iter().map(|&second| (first, second)));
                    }
                }
                (false, true) => pairs.extend(a.children().map(|child| (child, b))),
                (true, false) => pairs.extend(b.children().map(|child| (a, child))),
                (false, false) if a.square.half >= b.square.half => {
                    pairs.extend(a.children().map(|child| (child, b)));
                }
                (false, false) => pairs.extend(b.children().map(|child| (a, child))),
            }
        }
    }

    /// Splits the overlap of two circles, the smaller one moving further.
    fn separate(&self, from: usize, to: usize, deltas: &mut [Vec2]) {
        let reach = self.radii[from] + self.radii[to];
        let mut delta = self.positions[from] - self.positions[to];
        if delta.length_sq() >= reach * reach {
            return;
        }
        if delta.length_sq() <= f32::EPSILON {
            delta = jiggle(from, to);
        }

        let distance = delta.length();
        let push = delta * ((reach - distance) / distance * self.strength);
        let (from_area, to_area) = (self.radii[from].powi(2), self.radii[to].powi(2));
        let share = if from_area + to_area > 0.0 {
            to_area / (from_area + to_area)
        } else {
            0.5
        };

        deltas[from] += push * share;
        deltas[to] -= push * (1.0 - share);
    }
}
