use emath::{Rect, Vec2, vec2};

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 12;

/// Axis-aligned square cell of the tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Square {
    pub(super) center: Vec2,
    pub(super) half: f32,
}

impl Square {
    /// Smallest padded square around `points`; `None` if any coordinate is
    /// not finite or there are no points.
    fn enclosing(points: &[Vec2]) -> Option<Self> {
        if points.is_empty() || !points.iter().all(|point| point.is_finite()) {
            return None;
        }
        let rect = points.iter().fold(Rect::NOTHING, |rect, point| {
            rect.union(Rect::from_min_max(point.to_pos2(), point.to_pos2()))
        });

        Some(Self {
            center: rect.center().to_vec2(),
            half: rect.size().max_elem().max(1.0) * 0.5 + 1.0,
        })
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        let offset = (point - self.center).abs();
        offset.x <= self.half && offset.y <= self.half
    }

    pub(super) fn side_length(self) -> f32 {
        2.0 * self.half
    }

    /// Squared gap between two cells; zero when they touch or overlap.
    pub(super) fn distance_sq_to(self, other: Self) -> f32 {
        let gap = ((self.center - other.center).abs() - Vec2::splat(self.half + other.half))
            .max(Vec2::ZERO);
        gap.length_sq()
    }

    /// Quadrant index: bit 0 set right of center, bit 1 set below it.
    fn quadrant_of(self, point: Vec2) -> usize {
        usize::from(point.x >= self.center.x) | (usize::from(point.y >= self.center.y) << 1)
    }

    fn quadrant(self, index: usize) -> Self {
        let half = self.half * 0.5;
        let sign = |bit: usize| if index & bit == 0 { -half } else { half };
        Self {
            center: self.center + vec2(sign(1), sign(2)),
            half,
        }
    }
}

/// Point-region quadtree over node positions. Leaves list their node indices;
/// every cell carries the centroid and weight of everything below it.
pub(super) struct Quadtree {
    pub(super) square: Square,
    pub(super) centroid: Vec2,
    pub(super) weight: f32,
    pub(super) points: Vec<usize>,
    pub(super) quadrants: [Option<Box<Quadtree>>; 4],
}

impl Quadtree {
    pub(super) fn build(positions: &[Vec2]) -> Option<Self> {
        let square = Square::enclosing(positions)?;
        Some(Self::subdivide(square, (0..positions.len()).collect(), positions, 0))
    }

    fn subdivide(square: Square, points: Vec<usize>, positions: &[Vec2], depth: usize) -> Self {
        let weight = points.len() as f32;
        let centroid = if points.is_empty() {
            square.center
        } else {
            points.iter().fold(Vec2::ZERO, |sum, &index| sum + positions[index]) / weight
        };

        let mut cell = Self {
            square,
            centroid,
            weight,
            points,
            quadrants: Default::default(),
        };
        if cell.points.len() <= LEAF_CAPACITY || depth >= MAX_DEPTH {
            return cell;
        }

        let mut split: [Vec<usize>; 4] = Default::default();
        for &index in &cell.points {
            split[square.quadrant_of(positions[index])].push(index);
        }
        // Coincident points never separate; keep them in one leaf.
        if split.iter().any(|part| part.len() == cell.points.len()) {
            return cell;
        }

        for (index, part) in split.into_iter().enumerate() {
            if !part.is_empty() {
                cell.quadrants[index] = Some(Box::new(Self::subdivide(
                    square.quadrant(index),
                    part,
                    positions,
                    depth + 1,
                )));
            }
        }
        cell.points = Vec::new();
        cell
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.quadrants.iter().all(Option::is_none)
    }

    pub(super) fn children(&self) -> impl Iterator<Item = &Quadtree> {
        self.quadrants.iter().flatten().map(Box::as_ref)
    }
}
