use halo_core::{
    DEFAULT_GRID_SIZE, DEFAULT_NPAD, DEFAULT_SOURCE_REDSHIFT, HaloError, HaloResult,
    LensPlaneSet, PropertyRecord, SimulationConfig, SimulationUpdate,
};
use halo_physics::{Background, CosmologyContext, PartitionParams, partition_lens_planes, within_depth};
use halo_storage::{PROPERTIES_FILE, copy_properties_if_missing, discover_cutout_shells, read_properties};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Multi-plane settings: how to partition the line of sight, and which
/// lightcone shells take part (discovered from `*Cutout<id>` entries when
/// not given)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiPlaneParams {
    pub partition: PartitionParams,
    pub shell_ids: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PlaneMode {
    #[default]
    SinglePlane,
    MultiPlane(MultiPlaneParams),
}

/// Where a halo cutout lives and where its lensing products go
#[derive(Debug, Clone, PartialEq)]
pub struct InputsConfig {
    pub cutout_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Defaults to `<output_dir>/dtfe_dens`
    pub dtfe_dir: Option<PathBuf>,
    /// Defaults to `<output_dir>/xj`
    pub xj_dir: Option<PathBuf>,
    /// Defaults to the part of the cutout directory name after `halo_`
    pub halo_id: Option<String>,
    pub sim: Option<SimulationUpdate>,
    /// Pixels per side of the lensing grid
    pub nnn: usize,
    pub mode: PlaneMode,
}

impl InputsConfig {
    pub fn new(cutout_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            cutout_dir: cutout_dir.into(),
            output_dir: output_dir.into(),
            dtfe_dir: None,
            xj_dir: None,
            halo_id: None,
            sim: None,
            nnn: DEFAULT_GRID_SIZE,
            mode: PlaneMode::SinglePlane,
        }
    }

    pub fn multi_plane(mut self, params: MultiPlaneParams) -> Self {
        self.mode = PlaneMode::MultiPlane(params);
        self
    }
}

/// Square lensing grid over the cutout's field of view
#[derive(Debug, Clone, PartialEq)]
pub struct FovGrid {
    pub nnn: usize,
    /// Full side, degrees
    pub box_size_deg: f64,
    /// Full side, comoving Mpc
    pub box_size_mpc: f64,
    /// Pixel side, degrees
    pub pixel_deg: f64,
    centres_arcsec: Vec<f64>,
}

impl FovGrid {
    pub fn new(box_radius_arcsec: f64, box_radius_mpc: f64, nnn: usize) -> HaloResult<Self> {
        if nnn == 0 {
            return Err(HaloError::invalid("lensing grid needs at least one pixel"));
        }
        if !(box_radius_arcsec > 0.0 && box_radius_mpc > 0.0) {
            return Err(HaloError::invalid(format!(
                "field of view must be positive, got {box_radius_arcsec} arcsec, {box_radius_mpc} Mpc"
            )));
        }
        let box_size_deg = 2.0 * box_radius_arcsec / 3600.0;
        let pixel_deg = box_size_deg / nnn as f64;
        let (side, pixel) = (box_size_deg * 3600.0, pixel_deg * 3600.0);
        let centres_arcsec = (0..nnn)
            .map(|k| pixel * k as f64 - side / 2.0 + pixel / 2.0)
            .collect();
        Ok(Self {
            nnn,
            box_size_deg,
            box_size_mpc: 2.0 * box_radius_mpc,
            pixel_deg,
            centres_arcsec,
        })
    }

    pub fn box_size_arcsec(&self) -> f64 {
        self.box_size_deg * 3600.0
    }

    pub fn pixel_arcsec(&self) -> f64 {
        self.pixel_deg * 3600.0
    }

    /// Pixel centres along one axis, arcsec from the field centre
    pub fn centres_arcsec(&self) -> &[f64] {
        &self.centres_arcsec
    }

    /// (x1, x2) of pixel row `i`, column `j`
    pub fn point(&self, i: usize, j: usize) -> Option<(f64, f64)> {
        Some((*self.centres_arcsec.get(j)?, *self.centres_arcsec.get(i)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaneLayout {
    SinglePlane,
    MultiPlane {
        halo_shell: usize,
        /// (shell id, snapshot redshift) of every shell within depth
        shells: Vec<(usize, f64)>,
        planes: LensPlaneSet,
    },
}

/// Everything the lensing stage needs to know about one halo cutout
#[derive(Debug, Clone)]
pub struct HaloInputs {
    pub halo_id: String,
    pub properties_file: PathBuf,
    pub record: PropertyRecord,
    pub sim: SimulationConfig,
    pub halo_redshift: f64,
    pub halo_mass: f64,
    pub mpp: f64,
    pub grid: FovGrid,
    pub source_redshift: f64,
    pub npad: usize,
    pub output_dir: PathBuf,
    pub dtfe_dir: PathBuf,
    pub xj_dir: PathBuf,
    pub layout: PlaneLayout,
}

impl HaloInputs {
    /// Read a cutout's properties, partition its line of sight in
    /// multi-plane mode, then prepare the output tree. Nothing is created
    /// when reading or partitioning fails. `ctx` is left as is; simulation
    /// overrides land on the returned record only.
    pub fn load<B: Background>(ctx: &CosmologyContext<B>, config: &InputsConfig) -> HaloResult<Self> {
        let properties_file = config.cutout_dir.join(PROPERTIES_FILE);
        let record = read_properties(&properties_file)?;
        let halo_redshift = record.require("halo_redshift")?;
        let halo_mass = record.require("sod_halo_mass")?;
        let box_radius_mpc = record.require("boxRadius_Mpc")?;
        let box_radius_arcsec = record.require("boxRadius_arcsec")?;

        let mut sim = ctx.sim().clone();
        if let Some(update) = &config.sim {
            sim.merge(update);
        }
        if let Some(mpp) = record.get("mpp") {
            sim.merge(&SimulationUpdate::mpp(mpp));
        }

        let grid = FovGrid::new(box_radius_arcsec, box_radius_mpc, config.nnn)?;
        let layout = match &config.mode {
            PlaneMode::SinglePlane => PlaneLayout::SinglePlane,
            PlaneMode::MultiPlane(params) => {
                multi_plane_layout(ctx, &sim, &record, &config.cutout_dir, halo_redshift, params)?
            }
        };
        let halo_id = config
            .halo_id
            .clone()
            .unwrap_or_else(|| halo_id_from_dir(&config.cutout_dir));

        let output_dir = config.output_dir.clone();
        let dtfe_dir = config
            .dtfe_dir
            .clone()
            .unwrap_or_else(|| output_dir.join("dtfe_dens"));
        let xj_dir = config.xj_dir.clone().unwrap_or_else(|| output_dir.join("xj"));
        for dir in [&output_dir, &dtfe_dir, &xj_dir] {
            fs::create_dir_all(dir)?;
        }
        if copy_properties_if_missing(&properties_file, &output_dir)? {
            debug!("Copied {} into {}", properties_file.display(), output_dir.display());
        }


        let inputs = Self {
            halo_id,
            properties_file,
            record,
            mpp: sim.mpp,
            sim,
            halo_redshift,
            halo_mass,
            grid,
            source_redshift: DEFAULT_SOURCE_REDSHIFT,
            npad: DEFAULT_NPAD,
            output_dir,
            dtfe_dir,
            xj_dir,
            layout,
        };
        info!(
            "Loaded halo {} at z={} with {} lens planes",
            inputs.halo_id,
            inputs.halo_redshift,
            inputs.num_lens_planes()
        );
        Ok(inputs)
    }

    pub fn num_lens_planes(&self) -> usize {
        match &self.layout {
            PlaneLayout::SinglePlane => 1,
            PlaneLayout::MultiPlane { planes, .. } => planes.num_planes(),
        }
    }
}

fn halo_id_from_dir(dir: &Path) -> String {
    let name = dir.to_string_lossy();
    let name = name.trim_end_matches('/');
    match name.rsplit_once("halo_") {
        Some((_, id)) => id.to_string(),
        None => name.to_string(),
    }
}

fn multi_plane_layout<B: Background>(
    ctx: &CosmologyContext<B>,
    sim: &SimulationConfig,
    record: &PropertyRecord,
    cutout_dir: &Path,
    halo_redshift: f64,
    params: &MultiPlaneParams,
) -> HaloResult<PlaneLayout> {
    let shell = record.require("halo_lc_shell")?;
    if !(shell >= 0.0 && shell.fract() == 0.0) {
        return Err(HaloError::invalid(format!(
            "{}: halo_lc_shell must be a non-negative integer, got {shell}",
            record.origin
        )));
    }

    let ids = match &params.shell_ids {
        Some(ids) => ids.clone(),
        None => discover_cutout_shells(cutout_dir)?,
    };
    let mut shells = Vec::with_capacity(ids.len());
    for id in ids {
        let z = sim.shell_redshift(id)?;
        if within_depth(z, params.partition.max_depth) {
            shells.push((id, z));
        }
    }
    let redshifts: Vec<f64> = shells.iter().map(|&(_, z)| z).collect();
    let planes = partition_lens_planes(ctx, halo_redshift, &redshifts, &params.partition)?;
    Ok(PlaneLayout::MultiPlane {
        halo_shell: shell as usize,
        shells,
        planes,
    })
}
