use serde::{Deserialize, Serialize};

use crate::error::{HaloError, HaloResult};
use crate::types::Concentration;

/// Column layout of a `properties.csv` record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertiesSchema {
    Nfw,
    /// NFW halo with its lightcone shell index, for multi-plane inputs
    NfwLightcone,
    PointMass,
}

impl PropertiesSchema {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Nfw => &[
                "halo_redshift",
                "sod_halo_mass",
                "sod_halo_radius",
                "sod_halo_cdelta",
                "sod_halo_cdelta_error",
                "halo_lc_x",
                "halo_lc_y",
                "halo_lc_z",
                "boxRadius_Mpc",
                "boxRadius_arcsec",
                "mpp",
            ],
            Self::NfwLightcone => &[
                "halo_redshift",
                "halo_lc_shell",
                "sod_halo_mass",
                "sod_halo_radius",
                "sod_halo_cdelta",
                "sod_halo_cdelta_error",
                "halo_lc_x",
                "halo_lc_y",
                "halo_lc_z",
                "boxRadius_Mpc",
                "boxRadius_arcsec",
                "mpp",
            ],
            Self::PointMass => &[
                "halo_redshift",
                "sod_halo_mass",
                "halo_lc_x",
                "halo_lc_y",
                "halo_lc_z",
                "boxRadius_Mpc",
                "boxRadius_arcsec",
                "mpp",
            ],
        }
    }
}

/// Metadata of one emitted realization. Built once the particle set is
/// final; the transverse position is always the field centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaloProperties {
    pub redshift: f64,
    pub mass: f64,
    /// r200c in proper Mpc, NFW halos only
    pub radius: Option<f64>,
    /// NFW halos only
    pub concentration: Option<Concentration>,
    pub lightcone_shell: Option<usize>,
    /// Half-width of the square field of view, comoving Mpc
    pub box_radius_mpc: f64,
    /// Half-width of the square field of view, arcsec
    pub box_radius_arcsec: f64,
    /// Mass per particle in Msun
    pub mpp: f64,
}

impl HaloProperties {
    pub fn schema(&self) -> PropertiesSchema {
        match (self.concentration, self.lightcone_shell) {
            (None, _) => PropertiesSchema::PointMass,
            (Some(_), None) => PropertiesSchema::Nfw,
            (Some(_), Some(_)) => PropertiesSchema::NfwLightcone,
        }
    }

    /// Values in schema column order
    pub fn row(&self) -> Vec<PropertyValue> {
        let schema = self.schema();
        schema
            .columns()
            .iter()
            .map(|&name| match name {
                "halo_redshift" => PropertyValue::Float(self.redshift),
                "halo_lc_shell" => PropertyValue::Int(self.lightcone_shell.unwrap_or(0) as i64),
                "sod_halo_mass" => PropertyValue::Float(self.mass),
                "sod_halo_radius" => PropertyValue::Float(self.radius.unwrap_or(0.0)),
                "sod_halo_cdelta" => {
                    PropertyValue::Float(self.concentration.map_or(0.0, |c| c.value))
                }
                "sod_halo_cdelta_error" => {
                    PropertyValue::Float(self.concentration.map_or(0.0, |c| c.scatter))
                }
                "boxRadius_Mpc" => PropertyValue::Float(self.box_radius_mpc),
                "boxRadius_arcsec" => PropertyValue::Float(self.box_radius_arcsec),
                "mpp" => PropertyValue::Float(self.mpp),
                // halo_lc_x, halo_lc_y, halo_lc_z
                _ => PropertyValue::Float(0.0),
            })
            .collect()
    }
}

/// One cell of a properties row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Float(f64),
    Int(i64),
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v:.6}"),
            Self::Int(v) => write!(f, "{v}"),
        }
    }
}

/// A properties record read back from disk, column names kept as found
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Where the record came from, for error messages
    pub origin: String,
    pub fields: Vec<(String, f64)>,
}

impl PropertyRecord {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Field value, or a schema mismatch naming the missing column
    pub fn require(&self, name: &str) -> HaloResult<f64> {
        self.get(name)
            .ok_or_else(|| HaloError::missing_field(name, &self.origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nfw_props() -> HaloProperties {
        HaloProperties {
            redshift: 0.3,
            mass: 1e14,
            radius: Some(0.9),
            concentration: Some(Concentration { value: 4.2, scatter: 1.4 }),
            lightcone_shell: None,
            box_radius_mpc: 3.0,
            box_radius_arcsec: 700.0,
            mpp: 1e10,
        }
    }

    #[test]
    fn test_schema_follows_variant() {
        let mut props = nfw_props();
        assert_eq!(props.schema(), PropertiesSchema::Nfw);
        props.lightcone_shell = Some(374);
        assert_eq!(props.schema(), PropertiesSchema::NfwLightcone);
        props.concentration = None;
        assert_eq!(props.schema(), PropertiesSchema::PointMass);
    }

    #[test]
    fn test_row_matches_columns() {
        let mut props = nfw_props();
        props.lightcone_shell = Some(374);
        let row = props.row();
        let cols = props.schema().columns();
        assert_eq!(row.len(), cols.len());
        assert_eq!(row[1], PropertyValue::Int(374));
        assert_eq!(row[5], PropertyValue::Float(1.4));
        // transverse position placeholder
        assert_eq!(row[6], PropertyValue::Float(0.0));
        assert_eq!(row[1].to_string(), "374");
        assert_eq!(row[0].to_string(), "0.300000");
    }

    #[test]
    fn test_require_reports_missing_field() {
        let rec = PropertyRecord {
            origin: "halo_1/properties.csv".into(),
            fields: vec![("halo_redshift".into(), 0.3)],
        };
        assert_eq!(rec.require("halo_redshift").unwrap(), 0.3);
        match rec.require("mpp") {
            Err(HaloError::SchemaMismatch { field, .. }) => assert_eq!(field, "mpp"),
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }
}
