use halo_core::{HaloParticles, HaloResult};
use rand::Rng;
use tracing::warn;

/// Uniform points on the sphere: phi ~ U(0, 2pi), theta = arccos(2v - 1)
/// with v ~ U(0, 1). Drawing theta uniformly instead would crowd the poles.
/// Returns (theta, phi).
pub fn sample_angles(n: usize, rng: &mut impl Rng) -> (Vec<f64>, Vec<f64>) {
    let theta: Vec<f64> = (0..n)
        .map(|_| {
            let v: f64 = rng.gen_range(0.0..1.0);
            (2.0 * v - 1.0).clamp(-1.0, 1.0).acos()
        })
        .collect();
    let phi: Vec<f64> = (0..n)
        .map(|_| rng.gen_range(0.0..std::f64::consts::TAU))
        .collect();
    (theta, phi)
}

/// Remove particles whose line-of-sight offset exceeds `rfrac_los * r200`
/// (both comoving). The mass per particle is NOT rescaled afterwards, so the
/// clipped halo is no longer normalized to its enclosed mass.
/// Returns the number of particles removed.
pub fn clip_line_of_sight(
    particles: &mut HaloParticles,
    r200: f64,
    rfrac_los: f64,
) -> HaloResult<usize> {
    let [x, _, _] = particles.cartesian();
    let mask: Vec<bool> = x.iter().map(|&xi| xi.abs() / r200 <= rfrac_los).collect();
    let removed = particles.retain_mask(&mask)?;
    warn!(
        "Line-of-sight clipping at {} r200 removed {} particles; mass per particle left unnormalized",
        rfrac_los, removed
    );
    Ok(removed)
}
