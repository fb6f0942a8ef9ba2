//! Point index for radius and nearest-neighbour queries.
//!
//! Backed by an R-tree. Indices are built once per point set and per query
//! phase of a correspondence run and dropped with it.

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::observation::Position;

/// A point tagged with the row it came from.
#[derive(Clone, Copy, Debug)]
struct IndexedPoint {
    coords: [f64; 2],
    index: usize,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coords)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.coords[0] - point[0];
        let dy = self.coords[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Spatial index over a subset of a table's rows.
///
/// Query results are row indices of the original table, so an index built over
/// a filtered subset still answers in terms of the full table.
pub struct SpatialIndex {
    tree: RTree<IndexedPoint>,
}

impl SpatialIndex {
    /// Index every `(row, position)` pair yielded by `points`.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (usize, Position)>,
    {
        let indexed = points
            .into_iter()
            .map(|(index, position)| IndexedPoint {
                coords: [position.x, position.y],
                index,
            })
            .collect::<Vec<IndexedPoint>>();

        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Rows within `radius` of `point` (inclusive), in ascending row order.
    ///
    /// A negative or non-finite radius only reaches coincident points.
    pub fn query_radius(&self, point: Position, radius: f64) -> Vec<usize> {
        let radius = if radius.is_finite() { radius.max(0.0) } else { 0.0 };
        let mut rows = self
            .tree
            .locate_within_distance([point.x, point.y], radius * radius)
            .map(|indexed| indexed.index)
            .collect::<Vec<usize>>();
        rows.sort_unstable();
        rows
    }

    /// Nearest row to `point` and its distance, or `None` for an empty index.
    pub fn nearest(&self, point: Position) -> Option<(usize, f64)> {
        let query = [point.x, point.y];
        self.tree
            .nearest_neighbor(&query)
            .map(|indexed| (indexed.index, indexed.distance_2(&query).sqrt()))
    }
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("size", &self.tree.size())
            .finish()
    }
}
