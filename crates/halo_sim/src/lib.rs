pub mod halo;
pub mod inputs;
pub mod point_mass;
pub mod realization;

pub use halo::{HaloSize, NfwHalo, NfwHaloBuilder};
pub use inputs::{FovGrid, HaloInputs, InputsConfig, MultiPlaneParams, PlaneLayout, PlaneMode};
pub use point_mass::{PaddedPointMass, PaddingLayout, PointMass};
pub use realization::{HaloRealization, Stage};
