use halo_core::{C_KM_S, G_MPC, HaloError, HaloResult};

/// Deflection angles (radians) on a square lens-plane grid, row-major with
/// `alpha1[i * nnn + j]` at (x = grid[j], y = grid[i])
#[derive(Debug, Clone, PartialEq)]
pub struct DeflectionField {
    pub alpha1: Vec<f64>,
    pub alpha2: Vec<f64>,
    pub nnn: usize,
}

impl DeflectionField {
    pub fn at(&self, i: usize, j: usize) -> Option<(f64, f64)> {
        if i >= self.nnn || j >= self.nnn {
            return None;
        }
        let k = i * self.nnn + j;
        Some((self.alpha1[k], self.alpha2[k]))
    }
}

/// Point-mass deflection alpha = 4GM/c^2 * xi/|xi|^2 over a `fov_size` (proper
/// Mpc) wide grid of `nnn` points per side. The exact origin gets zero.
pub fn schwarzschild_deflection(mass: f64, fov_size: f64, nnn: usize) -> HaloResult<DeflectionField> {
    if !(mass > 0.0 && fov_size > 0.0) {
        return Err(HaloError::invalid(format!(
            "deflection needs positive mass and field of view, got M={mass}, fov={fov_size}"
        )));
    }
    if nnn < 2 {
        return Err(HaloError::invalid(format!("deflection grid needs at least 2 points, got {nnn}")));
    }
    let step = fov_size / (nnn - 1) as f64;
    let grid: Vec<f64> = (0..nnn).map(|k| -fov_size / 2.0 + step * k as f64).collect();
    let strength = 4.0 * G_MPC * mass / (C_KM_S * C_KM_S);

    let mut alpha1 = Vec::with_capacity(nnn * nnn);
    let mut alpha2 = Vec::with_capacity(nnn * nnn);
    for &xi2 in &grid {
        for &xi1 in &grid {
            let xi_sq = xi1 * xi1 + xi2 * xi2;
            if xi_sq == 0.0 {
                alpha1.push(0.0);
                alpha2.push(0.0);
            } else {
                alpha1.push(strength * xi1 / xi_sq);
                alpha2.push(strength * xi2 / xi_sq);
            }
        }
    }
    Ok(DeflectionField { alpha1, alpha2, nnn })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDensityCase {
    Fiducial,
    Optimistic,
    Conservative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSystematic {
    Raw,
    Blending,
    Masking,
}

/// P(z) = z^a exp(-(z/z0)^B) and total n_eff (arcmin^-2) of one Chang et al.
/// (2014) LSST forecast
#[derive(Debug, Clone, Copy, PartialEq)]
struct SourceRedshiftModel {
    a: f64,
    z0: f64,
    b: f64,
    neff: f64,
}

impl SourceRedshiftModel {
    fn new(case: SourceDensityCase, sys: SourceSystematic) -> Self {
        let (a, z0, b, neff) = match case {
            SourceDensityCase::Fiducial => (1.24, 0.51, 1.01, [37.0, 31.0, 26.0]),
            SourceDensityCase::Optimistic => (1.23, 0.59, 1.05, [48.0, 36.0, 31.0]),
            SourceDensityCase::Conservative => (1.28, 0.41, 0.97, [24.0, 22.0, 18.0]),
        };
        let neff = match sys {
            SourceSystematic::Raw => neff[0],
            SourceSystematic::Blending => neff[1],
            SourceSystematic::Masking => neff[2],
        };
        Self { a, z0, b, neff }
    }

    fn pz(&self, z: f64) -> f64 {
        z.powf(self.a) * (-(z / self.z0).powf(self.b)).exp()
    }

    fn integrate(&self, lo: f64, hi: f64) -> f64 {
        trapezoid(|z| self.pz(z), lo, hi, SOURCE_SAMPLES)
    }
}

const SOURCE_SAMPLES: usize = 10_000;
const SOURCE_MAX_REDSHIFT: f64 = 4.0;

fn trapezoid(f: impl Fn(f64) -> f64, lo: f64, hi: f64, samples: usize) -> f64 {
    let dz = (hi - lo) / (samples - 1) as f64;
    let interior: f64 = (1..samples - 1).map(|k| f(lo + dz * k as f64)).sum();
    dz * (interior + 0.5 * (f(lo) + f(hi)))
}

/// LSST lensing source density n_eff (arcmin^-2) in each bin of `z_bin_edges`,
/// normalizing P(z) over [0, 4]
pub fn chang2014_source_density(
    z_bin_edges: &[f64],
    case: SourceDensityCase,
    sys: SourceSystematic,
) -> HaloResult<Vec<f64>> {
    if z_bin_edges.windows(2).any(|w| !(w[1] > w[0])) || z_bin_edges.iter().any(|&z| z < 0.0) {
        return Err(HaloError::invalid(format!(
            "source bin edges must be non-negative and increasing, got {z_bin_edges:?}"
        )));
    }
    let model = SourceRedshiftModel::new(case, sys);
    let total = model.integrate(0.0, SOURCE_MAX_REDSHIFT);
    Ok(z_bin_edges
        .windows(2)
        .map(|w| model.integrate(w[0], w[1]) / total * model.neff)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_deflection_falls_off_as_inverse_distance() {
        let field = schwarzschild_deflection(1e12, 2.0, 5).unwrap();
        // grid: -1, -0.5, 0, 0.5, 1
        assert_eq!(field.at(2, 2), Some((0.0, 0.0)));
        let (a_near, _) = field.at(2, 3).unwrap();
        let (a_far, _) = field.at(2, 4).unwrap();
        assert_relative_eq!(a_near, 2.0 * a_far, max_relative = 1e-12);
        let strength = 4.0 * G_MPC * 1e12 / (C_KM_S * C_KM_S);
        assert_relative_eq!(a_far, strength, max_relative = 1e-12);
    }

    #[test]
    fn test_deflection_is_antisymmetric() {
        let field = schwarzschild_deflection(1e12, 3.0, 4).unwrap();
        let (a1, a2) = field.at(0, 1).unwrap();
        let (b1, b2) = field.at(3, 2).unwrap();
        assert_relative_eq!(a1, -b1, max_relative = 1e-12);
        assert_relative_eq!(a2, -b2, max_relative = 1e-12);
        assert_eq!(field.at(4, 0), None);
    }

    #[test]
    fn test_bad_deflection_inputs() {
        assert!(schwarzschild_deflection(0.0, 1.0, 8).is_err());
        assert!(schwarzschild_deflection(1e12, 1.0, 1).is_err());
    }

    #[test]
    fn test_source_density_sums_to_total() {
        let bins = chang2014_source_density(
            &[0.0, 0.5, 1.0, 2.0, 4.0],
            SourceDensityCase::Fiducial,
            SourceSystematic::Blending,
        )
        .unwrap();
        assert_eq!(bins.len(), 4);
        assert_relative_eq!(bins.iter().sum::<f64>(), 31.0, max_relative = 1e-6);
        assert!(bins.iter().all(|&n| n > 0.0));
    }

    #[test]
    fn test_source_density_cases_ordered() {
        let edges = [0.0, 4.0];
        let total = |case, sys| chang2014_source_density(&edges, case, sys).unwrap()[0];
        assert_relative_eq!(
            total(SourceDensityCase::Optimistic, SourceSystematic::Raw),
            48.0,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            total(SourceDensityCase::Conservative, SourceSystematic::Masking),
            18.0,
            max_relative = 1e-9
        );
        assert!(chang2014_source_density(&[1.0, 0.5], SourceDensityCase::Fiducial, SourceSystematic::Raw).is_err());
    }
}
