use halo_core::{DELTA_200C, HaloError, HaloResult};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// NFW mass shape g(x) = ln(1+x) - x/(1+x), with x = r / r_s
pub fn nfw_mass_shape(x: f64) -> f64 {
    (1.0 + x).ln() - x / (1.0 + x)
}

/// r200c in proper Mpc for mass `m200c` (Msun), given the proper critical
/// density at the halo redshift (Msun/Mpc^3)
pub fn r200_from_mass(m200c: f64, rho_crit: f64) -> f64 {
    (3.0 * m200c / (4.0 * std::f64::consts::PI * DELTA_200C * rho_crit)).cbrt()
}

/// Inverse of [`r200_from_mass`]
pub fn mass_from_r200(r200c: f64, rho_crit: f64) -> f64 {
    4.0 / 3.0 * std::f64::consts::PI * DELTA_200C * rho_crit * r200c.powi(3)
}

/// Closed-form enclosed mass of an NFW profile normalized to M200c
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnclosedMassModel {
    m200c: f64,
    r200c: f64,
    concentration: f64,
}

impl EnclosedMassModel {
    pub fn new(m200c: f64, r200c: f64, concentration: f64) -> HaloResult<Self> {
        if !(concentration > 0.0) {
            return Err(HaloError::invalid(format!(
                "concentration must be positive, got {concentration}"
            )));
        }
        if !(m200c > 0.0 && r200c > 0.0) {
            return Err(HaloError::invalid(format!(
                "halo mass and radius must be positive, got M={m200c}, r={r200c}"
            )));
        }
        Ok(Self {
            m200c,
            r200c,
            concentration,
        })
    }

    pub fn scale_radius(&self) -> f64 {
        self.r200c / self.concentration
    }

    /// Mass inside `rfrac * r200c`
    pub fn enclosed_mass(&self, rfrac: f64) -> HaloResult<f64> {
        let r_max = rfrac * self.r200c;
        if !(r_max > 0.0) {
            return Err(HaloError::invalid(format!("cutoff radius must be positive, got {r_max}")));
        }
        let rs = self.scale_radius();
        let numerator = ((rs + r_max) / rs).ln() - r_max / (r_max + rs);
        Ok(self.m200c * numerator / nfw_mass_shape(self.concentration))
    }

    /// Mass of each of `n` particles sampling the profile out to `rfrac * r200c`
    pub fn mass_per_particle(&self, rfrac: f64, n: usize) -> HaloResult<f64> {
        if n == 0 {
            return Err(HaloError::invalid("mass per particle of an empty population"));
        }
        Ok(self.enclosed_mass(rfrac)? / n as f64)
    }
}

/// Monte-Carlo draw of radii following the cumulative NFW mass profile,
/// truncated at `halo_radius`, with `halo_radius / concentration` as the
/// scale radius. Must honor `seed` and return exactly `n` radii.
pub trait RadialSampler: std::fmt::Debug {
    fn sample_radii(&self, n: usize, concentration: f64, halo_radius: f64, seed: u64) -> Vec<f64>;
}

/// Inverse-CDF sampler: for u ~ U(0,1), solves g(c s) / g(c) = u by bisection
#[derive(Debug, Clone, Copy)]
pub struct InverseCdfNfwSampler {
    pub iterations: usize,
}

impl Default for InverseCdfNfwSampler {
    fn default() -> Self {
        Self { iterations: 60 }
    }
}

impl InverseCdfNfwSampler {
    /// Fractional radius s in [0, 1] at cumulative mass fraction `u`
    fn invert_cdf(&self, u: f64, concentration: f64) -> f64 {
        let total = nfw_mass_shape(concentration);
        let (mut lo, mut hi) = (0.0, 1.0);
        for _ in 0..self.iterations {
            let mid = 0.5 * (lo + hi);
            if nfw_mass_shape(concentration * mid) / total < u {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}

impl RadialSampler for InverseCdfNfwSampler {
    fn sample_radii(&self, n: usize, concentration: f64, halo_radius: f64, seed: u64) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let u: f64 = rng.gen_range(0.0..1.0);
                halo_radius * self.invert_cdf(u, concentration)
            })
            .collect()
    }
}

/// Radii for a halo realization out to `rfrac * r200c`. The sampler gets
/// concentration `rfrac * c` and radius `rfrac * r200c`, which keeps the
/// scale radius at `r200c / c`.
pub fn sample_population_radii(
    sampler: &dyn RadialSampler,
    n: usize,
    concentration: f64,
    r200c: f64,
    rfrac: f64,
    seed: u64,
) -> HaloResult<Vec<f64>> {
    let radii = sampler.sample_radii(n, rfrac * concentration, rfrac * r200c, seed);
    if radii.len() != n {
        return Err(HaloError::SamplerContract {
            expected: n,
            got: radii.len(),
        });
    }
    Ok(radii)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_enclosed_mass_at_r200_is_m200() {
        for c in [1.0, 4.2, 9.0, 20.0] {
            let model = EnclosedMassModel::new(1e14, 0.95, c).unwrap();
            assert_relative_eq!(model.enclosed_mass(1.0).unwrap(), 1e14, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_enclosed_mass_grows_with_radius() {
        let model = EnclosedMassModel::new(1e14, 0.95, 5.0).unwrap();
        let m1 = model.enclosed_mass(0.5).unwrap();
        let m2 = model.enclosed_mass(1.0).unwrap();
        let m5 = model.enclosed_mass(5.0).unwrap();
        assert!(m1 < m2 && m2 < m5);
        assert_relative_eq!(
            model.mass_per_particle(5.0, 10_000).unwrap(),
            m5 / 10_000.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_unphysical_inputs_rejected() {
        assert!(EnclosedMassModel::new(1e14, 0.95, 0.0).is_err());
        assert!(EnclosedMassModel::new(1e14, 0.95, -3.0).is_err());
        let model = EnclosedMassModel::new(1e14, 0.95, 5.0).unwrap();
        assert!(model.enclosed_mass(0.0).is_err());
        assert!(model.enclosed_mass(-1.0).is_err());
    }

    #[test]
    fn test_r200_mass_relation_round_trip() {
        let rho = 1.9e11;
        let r = r200_from_mass(1e14, rho);
        assert_relative_eq!(mass_from_r200(r, rho), 1e14, max_relative = 1e-12);
    }

    #[test]
    fn test_sampler_deterministic_and_bounded() {
        let sampler = InverseCdfNfwSampler::default();
        let a = sampler.sample_radii(500, 5.0, 2.0, 42);
        let b = sampler.sample_radii(500, 5.0, 2.0, 42);
        assert_eq!(a, b);
        assert!(a.iter().all(|&r| (0.0..=2.0).contains(&r)));
    }

    #[test]
    fn test_sampler_median_matches_profile() {
        // half the mass sits inside s where g(c s) = g(c) / 2
        let c = 5.0;
        let sampler = InverseCdfNfwSampler::default();
        let mut radii = sampler.sample_radii(20_000, c, 1.0, 7);
        radii.sort_by(|a, b| a.total_cmp(b));
        let median = radii[radii.len() / 2];
        let frac = nfw_mass_shape(c * median) / nfw_mass_shape(c);
        assert!((frac - 0.5).abs() < 0.02, "mass fraction at median = {frac}");
    }

    #[derive(Debug)]
    struct ShortSampler;

    impl RadialSampler for ShortSampler {
        fn sample_radii(&self, n: usize, _: f64, r: f64, _: u64) -> Vec<f64> {
            vec![r; n.saturating_sub(1)]
        }
    }

    #[test]
    fn test_sampler_contract_checked() {
        let err = sample_population_radii(&ShortSampler, 10, 5.0, 1.0, 1.0, 0).unwrap_err();
        assert!(matches!(err, HaloError::SamplerContract { expected: 10, got: 9 }));
    }
}
