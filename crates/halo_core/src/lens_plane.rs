use serde::{Deserialize, Serialize};

/// Redshift edges partitioning a line of sight into lens planes.
/// Edges are strictly increasing; plane `i` spans `[edges[i], edges[i+1]]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LensPlaneSet {
    edges: Vec<f64>,
    /// Deepest shell redshift the partition was built to
    pub max_redshift: f64,
    /// Comoving distance to `max_redshift`, Mpc
    pub depth_mpc: f64,
}

impl LensPlaneSet {
    /// Callers must pass strictly increasing edges
    pub fn new(edges: Vec<f64>, max_redshift: f64, depth_mpc: f64) -> Self {
        debug_assert!(edges.windows(2).all(|w| w[0] < w[1]));
        Self {
            edges,
            max_redshift,
            depth_mpc,
        }
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Zero when fewer than two edges survive
    pub fn num_planes(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    pub fn is_degenerate(&self) -> bool {
        self.num_planes() == 0
    }

    /// (lower, upper) redshift bounds of each plane
    pub fn planes(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.edges.windows(2).map(|w| (w[0], w[1]))
    }

    /// Index of the plane containing redshift `z`
    pub fn plane_of(&self, z: f64) -> Option<usize> {
        self.planes().position(|(lo, hi)| z >= lo && z <= hi)
    }
}
