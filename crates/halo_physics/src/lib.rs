pub mod concentration;
pub mod cosmology;
pub mod lens_planes;
pub mod lensing;
pub mod nfw;
pub mod particle;
pub mod projection;

pub use concentration::{Child18, ConcentrationModel, ConcentrationSampler};
pub use cosmology::{Background, CosmologyContext, FlatLambdaCdm, RedshiftInverter};
pub use lens_planes::{PartitionParams, partition_lens_planes, within_depth};
pub use lensing::{
    DeflectionField, SourceDensityCase, SourceSystematic, chang2014_source_density,
    schwarzschild_deflection,
};
pub use nfw::{
    EnclosedMassModel, InverseCdfNfwSampler, RadialSampler, mass_from_r200, nfw_mass_shape,
    r200_from_mass, sample_population_radii,
};
pub use particle::{clip_line_of_sight, sample_angles};
pub use projection::ProjectionEngine;
