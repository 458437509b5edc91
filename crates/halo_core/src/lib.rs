pub mod config;
pub mod constants;
pub mod error;
pub mod lens_plane;
pub mod properties;
pub mod types;

pub use config::{
    CosmologyParams, PaddingConfig, PopulationConfig, SimulationConfig, SimulationUpdate, calc_mpp,
};
pub use constants::*;
pub use error::{HaloError, HaloResult};
pub use lens_plane::LensPlaneSet;
pub use properties::{HaloProperties, PropertiesSchema, PropertyRecord, PropertyValue};
pub use types::*;
