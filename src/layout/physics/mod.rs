mod forces;
mod quadtree;

use emath::{Vec2, vec2};

pub(crate) use forces::{CenterForce, ChargeForce, CollideForce, LinkForce, SimLink};
use quadtree::Quadtree;

const INITIAL_RADIUS: f32 = 10.0;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SimNode {
    pub(crate) pos: Vec2,
    pub(crate) vel: Vec2,
    pub(crate) pinned: Option<Vec2>,
    pub(crate) radius: f32,
}

impl SimNode {
    /// Places nodes without a position on a phyllotaxis spiral so that no two
    /// start on top of each other.
    pub(crate) fn new(index: usize, position: Option<(f32, f32)>, radius: f32) -> Self {
        let pos = match position {
            Some((x, y)) if x.is_finite() && y.is_finite() => vec2(x, y),
            _ => {
                let spiral_radius = INITIAL_RADIUS * (0.5 + index as f32).sqrt();
                let angle = index as f32 * std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
                vec2(angle.cos(), angle.sin()) * spiral_radius
            }
        };

        Self {
            pos,
            vel: Vec2::ZERO,
            pinned: None,
            radius,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ForceSet {
    pub(crate) link: Option<LinkForce>,
    pub(crate) charge: Option<ChargeForce>,
    pub(crate) center: Option<CenterForce>,
    pub(crate) collide: Option<CollideForce>,
}

#[derive(Clone, Debug, Default)]
struct PhysicsScratch {
    positions: Vec<Vec2>,
    predicted: Vec<Vec2>,
    radii: Vec<f32>,
    deltas: Vec<Vec2>,
}

/// Alpha-cooled velocity simulation over a flat node arena.
#[derive(Clone, Debug)]
pub(crate) struct Simulation {
    pub(crate) nodes: Vec<SimNode>,
    pub(crate) forces: ForceSet,
    pub(crate) alpha: f32,
    pub(crate) alpha_min: f32,
    pub(crate) alpha_decay: f32,
    pub(crate) alpha_target: f32,
    pub(crate) velocity_decay: f32,
    scratch: PhysicsScratch,
}

impl Simulation {
    pub(crate) fn new(nodes: Vec<SimNode>) -> Self {
        Self {
            nodes,
            forces: ForceSet::default(),
            alpha: 1.0,
            alpha_min: 0.001,
            alpha_decay: 1.0 - 0.001_f32.powf(1.0 / 300.0),
            alpha_target: 0.0,
            velocity_decay: 0.4,
            scratch: PhysicsScratch::default(),
        }
    }

    /// Cooled once alpha is below its floor and nothing holds it up; a raised
    /// target keeps the simulation warming.
    pub(crate) fn is_cooled(&self) -> bool {
        self.alpha < self.alpha_min && self.alpha_target < self.alpha_min
    }

    pub(crate) fn kinetic_energy(&self) -> f32 {
        self.nodes.iter().map(|node| node.vel.length_sq()).sum()
    }

    /// Advances one integration step.
    pub(crate) fn tick(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;
        let alpha = self.alpha;

        if let Some(link) = &self.forces.link {
            link.apply(&mut self.nodes, alpha);
        }

        if let Some(charge) = self.forces.charge {
            let scratch = &mut self.scratch;
            scratch.positions.clear();
            scratch.positions.extend(self.nodes.iter().map(|node| node.pos));
            if let Some(tree) = Quadtree::build(&scratch.positions) {
                charge.apply(&tree, &scratch.positions, &mut self.nodes, alpha);
            }
        }

        if let Some(center) = self.forces.center {
            center.apply(&mut self.nodes);
        }

        if let Some(collide) = self.forces.collide {
            let scratch = &mut self.scratch;
            collide.apply(
                &mut self.nodes,
                &mut scratch.predicted,
                &mut scratch.radii,
                &mut scratch.deltas,
            );
        }

        let retain = 1.0 - self.velocity_decay;
        for node in &mut self.nodes {
            match node.pinned {
                Some(pin) => {
                    node.pos = pin;
                    node.vel = Vec2::ZERO;
                }
                None => {
                    node.vel *= retain;
                    node.pos += node.vel;
                }
            }
        }
    }
}
