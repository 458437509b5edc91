use halo_core::{HaloResult, PopulationConfig};
use halo_physics::CosmologyContext;
use halo_sim::{HaloRealization, NfwHalo};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> HaloResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./nfw_particle_realization"));

    let ctx = CosmologyContext::outer_rim();
    let mut halo = NfwHalo::builder(&ctx, 0.3).mass(1e14).seed(42).build()?;
    halo.populate(&PopulationConfig {
        n_particles: 10_000,
        rfrac: 5.0,
        rfrac_los: None,
    })?;
    halo.output_particles(&output_dir)?;
    Ok(())
}
