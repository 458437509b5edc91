use halo_core::{HaloError, HaloResult, LensPlaneSet};
use tracing::{debug, warn};

use crate::cosmology::{Background, CosmologyContext};

/// Knobs of the multi-plane line-of-sight partition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionParams {
    /// Upper redshift bound on the shells used
    pub max_depth: Option<f64>,
    /// Target comoving thickness of a lens plane, Mpc
    pub mean_lens_width: f64,
    /// No edge may sit within this comoving distance of the halo, Mpc
    pub safe_zone: f64,
    /// Edges below this redshift are dropped
    pub min_depth: f64,
}

impl Default for PartitionParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            mean_lens_width: 70.0,
            safe_zone: 20.0,
            min_depth: 0.0,
        }
    }
}

/// Whether a shell at `z` falls inside the requested depth
pub fn within_depth(z: f64, max_depth: Option<f64>) -> bool {
    max_depth.is_none_or(|max| z <= max)
}

/// Split the line of sight to the deepest usable shell into lens planes.
///
/// Edges are spaced uniformly in redshift, not comoving distance, so planes
/// are thinner in comoving Mpc at low redshift. A partition left with fewer
/// than two edges has zero planes; that is valid and only logged.
pub fn partition_lens_planes<B: Background>(
    ctx: &CosmologyContext<B>,
    halo_redshift: f64,
    shell_redshifts: &[f64],
    params: &PartitionParams,
) -> HaloResult<LensPlaneSet> {
    if !(params.mean_lens_width > 0.0) {
        return Err(HaloError::invalid(format!(
            "mean lens width must be positive, got {}",
            params.mean_lens_width
        )));
    }
    if !(params.safe_zone >= 0.0) {
        return Err(HaloError::invalid(format!(
            "safe zone must be non-negative, got {}",
            params.safe_zone
        )));
    }

    let max_redshift = shell_redshifts
        .iter()
        .copied()
        .filter(|&z| within_depth(z, params.max_depth))
        .fold(None, |acc: Option<f64>, z| Some(acc.map_or(z, |m| m.max(z))))
        .ok_or_else(|| {
            HaloError::domain(format!(
                "no lightcone shell within max depth {:?}",
                params.max_depth
            ))
        })?;
    let depth_mpc = ctx.comoving_distance(max_redshift);

    let num_planes = (depth_mpc / params.mean_lens_width).floor().max(0.0) as usize;
    let mut edges: Vec<f64> = if num_planes == 0 {
        vec![0.0]
    } else {
        let dz = max_redshift / num_planes as f64;
        (0..=num_planes).map(|i| dz * i as f64).collect()
    };

    let d_halo = ctx.comoving_distance(halo_redshift);
    edges.retain(|&z| (d_halo - ctx.comoving_distance(z)).abs() > params.safe_zone);
    edges.retain(|&z| z >= params.min_depth);

    let set = LensPlaneSet::new(edges, max_redshift, depth_mpc);
    debug!(
        "Lens planes to z={:.4} ({:.1} Mpc): {} planes, edges {:?}",
        max_redshift,
        depth_mpc,
        set.num_planes(),
        set.edges()
    );
    if set.is_degenerate() {
        warn!(
            "Lens-plane partition left {} edges; no planes beyond the single-plane case",
            set.edges().len()
        );
    }
    Ok(set)
}
