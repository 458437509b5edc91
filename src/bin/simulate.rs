//! Point-mass lenses and a multi-plane partition of their line of sight.
//! Writes one directory per lens variant and prints a summary table.

use halo_core::{HaloResult, PaddingConfig};
use halo_physics::{
    CosmologyContext, PartitionParams, SourceDensityCase, SourceSystematic,
    chang2014_source_density, partition_lens_planes,
};
use halo_sim::{HaloRealization, PaddedPointMass, PointMass};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const LENS_MASS: f64 = 1e12;
const LENS_REDSHIFT: f64 = 0.5;
const FOV_SIZE: f64 = 3.0;

fn main() -> HaloResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./point_mass_realizations"));
    let ctx = CosmologyContext::outer_rim();

    let mut bare = PointMass::new(&ctx, LENS_MASS, LENS_REDSHIFT)?;
    bare.populate(FOV_SIZE)?;
    bare.output_particles(&root.join("point_mass"))?;

    let mut padded = PaddedPointMass::new(&ctx, LENS_MASS, LENS_REDSHIFT, PaddingConfig::default())?;
    padded.populate(FOV_SIZE)?;
    padded.output_particles(&root.join("padded_point_mass"))?;

    let sigma_crit = ctx.critical_surface_density(LENS_REDSHIFT, 1.0)?;
    println!();
    println!("LENS: M = {LENS_MASS:.1e} Msun at z = {LENS_REDSHIFT}");
    println!("  comoving distance      {:>12.3} Mpc", ctx.comoving_distance(LENS_REDSHIFT));
    println!("  angular diameter dist. {:>12.3} Mpc", ctx.angular_diameter_distance(LENS_REDSHIFT));
    println!("  comoving Mpc/arcsec    {:>12.6e}", ctx.comoving_mpc_per_arcsec(LENS_REDSHIFT));
    println!("  Sigma_crit (zs = 1)    {:>12.4e} Msun/Mpc^2", sigma_crit);
    if let Some(layout) = padded.layout() {
        println!(
            "  padding                {} centre + {} tracers, mpp {:.3e} Msun",
            layout.n_center, layout.n_tracers, layout.mpp
        );
    }

    let shells: Vec<f64> = (1..=10).map(|i| 0.1 * i as f64).collect();
    let planes = partition_lens_planes(&ctx, LENS_REDSHIFT, &shells, &PartitionParams::default())?;
    println!();
    println!(
        "LENS PLANES to z = {:.2} ({:.1} Mpc): {}",
        planes.max_redshift,
        planes.depth_mpc,
        planes.num_planes()
    );

    let density = chang2014_source_density(
        planes.edges(),
        SourceDensityCase::Fiducial,
        SourceSystematic::Blending,
    )?;
    println!("  {:>8} {:>8} {:>12} {:>14}", "z_lo", "z_hi", "width [Mpc]", "n_eff [1/am2]");
    for ((z_lo, z_hi), n_eff) in planes.planes().zip(&density) {
        println!(
            "  {:>8.4} {:>8.4} {:>12.2} {:>14.4}",
            z_lo,
            z_hi,
            ctx.comoving_distance_between(z_lo, z_hi),
            n_eff
        );
    }
    Ok(())
}
