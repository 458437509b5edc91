use serde::{Deserialize, Serialize};

use crate::error::{HaloError, HaloResult};

/// Halo-centric particle positions in spherical coordinates.
/// Radii in Mpc (comoving once populated), angles in radians.
/// All three columns always share one length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HaloParticles {
    r: Vec<f64>,
    theta: Vec<f64>,
    phi: Vec<f64>,
}

impl HaloParticles {
    pub fn new(r: Vec<f64>, theta: Vec<f64>, phi: Vec<f64>) -> HaloResult<Self> {
        if r.len() != theta.len() || r.len() != phi.len() {
            return Err(HaloError::invalid(format!(
                "particle columns differ in length: r={}, theta={}, phi={}",
                r.len(),
                theta.len(),
                phi.len()
            )));
        }
        Ok(Self { r, theta, phi })
    }

    pub fn len(&self) -> usize {
        self.r.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    pub fn r(&self) -> &[f64] {
        &self.r
    }

    pub fn theta(&self) -> &[f64] {
        &self.theta
    }

    pub fn phi(&self) -> &[f64] {
        &self.phi
    }

    /// Largest radius, 0 for an empty set
    pub fn max_radius(&self) -> f64 {
        self.r.iter().copied().fold(0.0, f64::max)
    }

    pub fn scale_radii(&mut self, factor: f64) {
        self.r.iter_mut().for_each(|r| *r *= factor);
    }

    /// Cartesian offsets from the halo centre, x along the line of sight
    pub fn cartesian(&self) -> [Vec<f64>; 3] {
        let mut x = Vec::with_capacity(self.len());
        let mut y = Vec::with_capacity(self.len());
        let mut z = Vec::with_capacity(self.len());
        for ((&r, &theta), &phi) in self.r.iter().zip(&self.theta).zip(&self.phi) {
            let (sin_t, cos_t) = theta.sin_cos();
            let (sin_p, cos_p) = phi.sin_cos();
            x.push(r * sin_t * cos_p);
            y.push(r * sin_t * sin_p);
            z.push(r * cos_t);
        }
        [x, y, z]
    }

    /// Keep the particles whose mask entry is true, in one pass over all
    /// columns. Returns the number removed.
    pub fn retain_mask(&mut self, mask: &[bool]) -> HaloResult<usize> {
        if mask.len() != self.len() {
            return Err(HaloError::invalid(format!(
                "mask of length {} applied to {} particles",
                mask.len(),
                self.len()
            )));
        }
        let before = self.len();
        let keep = |col: &mut Vec<f64>| {
            let mut it = mask.iter();
            col.retain(|_| *it.next().unwrap_or(&false));
        };
        keep(&mut self.r);
        keep(&mut self.theta);
        keep(&mut self.phi);
        Ok(before - self.len())
    }
}

/// Observer-frame particle columns as written for the ray tracer.
/// `x, y, z` in comoving Mpc with the observer at the origin and the line
/// of sight along x; `theta, phi` in arcseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkyParticles {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    theta: Vec<f64>,
    phi: Vec<f64>,
    redshift: Vec<f64>,
}

impl SkyParticles {
    /// File stems of the six columns, in output order
    pub const COLUMNS: [&'static str; 6] = ["x", "y", "z", "theta", "phi", "redshift"];

    pub fn from_columns(columns: [Vec<f64>; 6]) -> HaloResult<Self> {
        let n = columns[0].len();
        if let Some((i, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != n) {
            return Err(HaloError::invalid(format!(
                "column `{}` has {} values, expected {n}",
                Self::COLUMNS[i],
                col.len()
            )));
        }
        let [x, y, z, theta, phi, redshift] = columns;
        Ok(Self { x, y, z, theta, phi, redshift })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }

    pub fn theta(&self) -> &[f64] {
        &self.theta
    }

    pub fn phi(&self) -> &[f64] {
        &self.phi
    }

    pub fn redshift(&self) -> &[f64] {
        &self.redshift
    }

    /// Columns paired with their file stems
    pub fn columns(&self) -> [(&'static str, &[f64]); 6] {
        [
            ("x", &self.x),
            ("y", &self.y),
            ("z", &self.z),
            ("theta", &self.theta),
            ("phi", &self.phi),
            ("redshift", &self.redshift),
        ]
    }

    /// Append another set, column by column
    pub fn extend(&mut self, other: &SkyParticles) {
        self.x.extend_from_slice(&other.x);
        self.y.extend_from_slice(&other.y);
        self.z.extend_from_slice(&other.z);
        self.theta.extend_from_slice(&other.theta);
        self.phi.extend_from_slice(&other.phi);
        self.redshift.extend_from_slice(&other.redshift);
    }
}

/// Halo concentration c = r200c / r_s
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Concentration {
    pub value: f64,
    /// Gaussian scatter the value was drawn with, 0 when taken on the relation
    pub scatter: f64,
}

impl Concentration {
    pub fn fixed(value: f64) -> Self {
        Self { value, scatter: 0.0 }
    }

    pub fn has_scatter(&self) -> bool {
        self.scatter > 0.0
    }
}

/// Lifecycle of a halo realization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RealizationState {
    /// Parameters fixed, no particles drawn
    Constructed,
    /// Particle set generated
    Populated,
    /// Particles and properties written out
    Emitted,
}

impl RealizationState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constructed => "constructed",
            Self::Populated => "populated",
            Self::Emitted => "emitted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mismatched_columns_rejected() {
        assert!(HaloParticles::new(vec![1.0], vec![0.5], vec![]).is_err());
        let cols = [vec![1.0], vec![0.0], vec![0.0], vec![1.0], vec![0.0], vec![]];
        assert!(SkyParticles::from_columns(cols).is_err());
    }

    #[test]
    fn test_retain_mask_filters_all_columns() {
        let mut p = HaloParticles::new(
            vec![1.0, 2.0, 3.0],
            vec![0.1, 0.2, 0.3],
            vec![1.1, 1.2, 1.3],
        )
        .unwrap();
        let removed = p.retain_mask(&[true, false, true]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(p.r(), &[1.0, 3.0]);
        assert_eq!(p.theta(), &[0.1, 0.3]);
        assert_eq!(p.phi(), &[1.1, 1.3]);
        assert!(p.retain_mask(&[true]).is_err());
    }

    #[test]
    fn test_cartesian_axes() {
        let half_pi = std::f64::consts::FRAC_PI_2;
        let p = HaloParticles::new(vec![2.0, 3.0], vec![half_pi, 0.0], vec![0.0, 0.0]).unwrap();
        let [x, y, z] = p.cartesian();
        assert_abs_diff_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(y[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[1], 3.0, epsilon = 1e-12);
        assert_eq!(p.max_radius(), 3.0);
    }
}
