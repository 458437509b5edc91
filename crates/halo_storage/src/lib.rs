use halo_core::{HaloError, HaloProperties, HaloResult, PropertyRecord, SkyParticles};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PROPERTIES_FILE: &str = "properties.csv";

/// File for one particle column, `x.bin` or `x.{shell}.bin`
pub fn column_path(dir: &Path, stem: &str, shell: Option<usize>) -> PathBuf {
    match shell {
        Some(shell) => dir.join(format!("{stem}.{shell}.bin")),
        None => dir.join(format!("{stem}.bin")),
    }
}

/// Write the six particle columns as raw native-endian f32, no header.
/// Returns the written paths in column order.
pub fn write_particles(
    dir: &Path,
    particles: &SkyParticles,
    shell: Option<usize>,
) -> HaloResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(SkyParticles::COLUMNS.len());
    for (stem, values) in particles.columns() {
        let narrowed: Vec<f32> = values.iter().map(|&v| v as f32).collect();
        let path = column_path(dir, stem, shell);
        fs::write(&path, bytemuck::cast_slice::<f32, u8>(&narrowed))?;
        paths.push(path);
    }
    debug!("Wrote {} particles to {}", particles.len(), dir.display());
    Ok(paths)
}

/// Read back one raw f32 column
pub fn read_particle_column(path: &Path) -> HaloResult<Vec<f32>> {
    let bytes = fs::read(path)?;
    if bytes.len() % size_of::<f32>() != 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} holds {} bytes, not a whole number of f32", path.display(), bytes.len()),
        )
        .into());
    }
    Ok(bytes
        .chunks_exact(size_of::<f32>())
        .map(bytemuck::pod_read_unaligned::<f32>)
        .collect())
}

/// Read back all six columns written by [`write_particles`]
pub fn read_particles(dir: &Path, shell: Option<usize>) -> HaloResult<SkyParticles> {
    let mut columns: [Vec<f64>; 6] = Default::default();
    for (column, stem) in columns.iter_mut().zip(SkyParticles::COLUMNS) {
        *column = read_particle_column(&column_path(dir, stem, shell))?
            .into_iter()
            .map(f64::from)
            .collect();
    }
    SkyParticles::from_columns(columns)
}

/// Write `properties.csv`: a commented header line and one data row
pub fn write_properties(dir: &Path, properties: &HaloProperties) -> HaloResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(PROPERTIES_FILE);
    let header = format!("# {}\n", properties.schema().columns().join(", "));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(header.into_bytes());
    writer.write_record(properties.row().iter().map(|v| v.to_string()))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    fs::write(&path, bytes)?;
    Ok(path)
}

/// Write the particle columns and `properties.csv` into `dir` as one set.
/// Files are staged in a scratch directory under `dir` and moved into place
/// only after all of them are written. On failure none of the set is left
/// in `dir`.
pub fn write_output(
    dir: &Path,
    particles: &SkyParticles,
    properties: &HaloProperties,
) -> HaloResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(dir)?;
    let mut staged = write_particles(staging.path(), particles, properties.lightcone_shell)?;
    staged.push(write_properties(staging.path(), properties)?);

    let targets = staged
        .iter()
        .map(|from| {
            from.strip_prefix(staging.path())
                .map(|name| dir.join(name))
                .map_err(|e| std::io::Error::other(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(blocked) = targets.iter().find(|target| target.is_dir()) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} is a directory", blocked.display()),
        )
        .into());
    }

    for (placed, (from, to)) in staged.iter().zip(&targets).enumerate() {
        if let Err(e) = fs::rename(from, to) {
            warn!("Moving {} into place failed, removing {placed} emitted files", to.display());
            for done in &targets[..placed] {
                let _ = fs::remove_file(done);
            }
            return Err(e.into());
        }
    }
    Ok(targets)
}

/// Read a `properties.csv` record. Column names come from the first
/// commented line, values from the first data row.
pub fn read_properties(path: &Path) -> HaloResult<PropertyRecord> {
    let origin = path.display().to_string();
    let text = fs::read_to_string(path)?;
    let names: Vec<String> = text
        .lines()
        .find_map(|line| line.trim_start().strip_prefix('#'))
        .ok_or_else(|| HaloError::missing_field("header", &origin))?
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let row = reader
        .records()
        .next()
        .ok_or_else(|| HaloError::missing_field("data row", &origin))??;
    if row.len() != names.len() {
        return Err(HaloError::invalid(format!(
            "{origin}: header names {} columns, row has {}",
            names.len(),
            row.len()
        )));
    }

    let fields = names
        .into_iter()
        .zip(row.iter())
        .map(|(name, raw)| {
            raw.parse::<f64>()
                .map(|value| (name.clone(), value))
                .map_err(|e| HaloError::invalid(format!("{origin}: column {name} = {raw:?}: {e}")))
        })
        .collect::<HaloResult<Vec<_>>>()?;
    Ok(PropertyRecord { origin, fields })
}

/// Copy a properties file into `dir` unless one is already there.
/// Returns whether a copy was made.
pub fn copy_properties_if_missing(source: &Path, dir: &Path) -> HaloResult<bool> {
    let target = dir.join(PROPERTIES_FILE);
    if target.exists() {
        return Ok(false);
    }
    fs::create_dir_all(dir)?;
    fs::copy(source, &target)?;
    Ok(true)
}

/// Shell ids of the `*Cutout<id>` entries under a halo cutout directory,
/// ascending
pub fn discover_cutout_shells(dir: &Path) -> HaloResult<Vec<usize>> {
    let mut shells = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        let Some((_, id)) = name.rsplit_once("Cutout") else {
            continue;
        };
        match id.parse::<usize>() {
            Ok(id) => shells.push(id),
            Err(_) => warn!("Skipping cutout entry with unparsable shell id: {name}"),
        }
    }
    shells.sort_unstable();
    shells.dedup();
    Ok(shells)
}

/// A finished realization kept for later reuse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizationSnapshot {
    pub properties: HaloProperties,
    pub particles: SkyParticles,
}

/// Save a snapshot to disk as bincode
pub fn save_snapshot(snapshot: &RealizationSnapshot, path: &Path) -> HaloResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = bincode::serialize(snapshot)?;
    fs::write(path, data)?;
    Ok(())
}

/// Load a snapshot from disk
pub fn load_snapshot(path: &Path) -> HaloResult<RealizationSnapshot> {
    let data = fs::read(path)?;
    Ok(bincode::deserialize(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use halo_core::Concentration;

    fn sample_particles() -> SkyParticles {
        SkyParticles::from_columns([
            vec![1198.8, 1199.1],
            vec![0.1, -0.2],
            vec![0.0, 0.3],
            vec![324000.0, 323950.0],
            vec![17.2, -34.4],
            vec![0.3, 0.3001],
        ])
        .unwrap()
    }

    fn sample_particles_f32() -> SkyParticles {
        let narrowed = sample_particles()
            .columns()
            .map(|(_, values)| values.iter().map(|&v| f64::from(v as f32)).collect::<Vec<_>>());
        SkyParticles::from_columns(narrowed).unwrap()
    }

    fn nfw_properties(shell: Option<usize>) -> HaloProperties {
        HaloProperties {
            redshift: 0.3,
            mass: 1e14,
            radius: Some(0.95),
            concentration: Some(Concentration {
                value: 4.5,
                scatter: 1.5,
            }),
            lightcone_shell: shell,
            box_radius_mpc: 3.2,
            box_radius_arcsec: 550.0,
            mpp: 1.6e10,
        }
    }

    #[test]
    fn test_particle_columns_round_trip_as_f32() {
        let dir = tempfile::tempdir().unwrap();
        let particles = sample_particles();
        let paths = write_particles(dir.path(), &particles, None).unwrap();
        assert_eq!(paths.len(), 6);
        assert!(dir.path().join("redshift.bin").exists());
        assert_eq!(fs::metadata(&paths[0]).unwrap().len(), 8);

        let back = read_particles(dir.path(), None).unwrap();
        assert_eq!(back.len(), 2);
        assert_relative_eq!(back.x()[1], 1199.1, max_relative = 1e-6);
        assert_relative_eq!(back.theta()[0], 324000.0, max_relative = 1e-6);
    }

    #[test]
    fn test_shell_suffixed_files() {
        let dir = tempfile::tempdir().unwrap();
        write_particles(dir.path(), &sample_particles(), Some(421)).unwrap();
        assert!(dir.path().join("x.421.bin").exists());
        assert!(!dir.path().join("x.bin").exists());
        assert_eq!(read_particles(dir.path(), Some(421)).unwrap().len(), 2);
    }

    #[test]
    fn test_truncated_column_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");
        fs::write(&path, [0u8; 6]).unwrap();
        assert!(matches!(read_particle_column(&path), Err(HaloError::Io(_))));
    }

    #[test]
    fn test_column_decodes_native_f32() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");
        let bytes: Vec<u8> = [1.5f32, -2.25, 1e-3]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        fs::write(&path, bytes).unwrap();
        assert_eq!(read_particle_column(&path).unwrap(), vec![1.5, -2.25, 1e-3]);
    }

    #[test]
    fn test_output_set_moved_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_output(dir.path(), &sample_particles(), &nfw_properties(Some(421))).unwrap();
        assert_eq!(paths.len(), 7);
        assert!(paths.iter().all(|p| p.parent() == Some(dir.path())));
        assert!(dir.path().join("redshift.421.bin").exists());
        // scratch directory is gone
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 7);
        assert_eq!(read_particles(dir.path(), Some(421)).unwrap(), sample_particles_f32());
    }

    #[test]
    fn test_failed_output_leaves_no_partial_set() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("redshift.bin")).unwrap();
        let result = write_output(dir.path(), &sample_particles(), &nfw_properties(None));
        assert!(matches!(result, Err(HaloError::Io(_))));

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["redshift.bin".to_string()]);
    }

    #[test]
    fn test_properties_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_properties(dir.path(), &nfw_properties(None)).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "# halo_redshift, sod_halo_mass, sod_halo_radius, sod_halo_cdelta, \
             sod_halo_cdelta_error, halo_lc_x, halo_lc_y, halo_lc_z, boxRadius_Mpc, \
             boxRadius_arcsec, mpp"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("0.300000,100000000000000.000000,0.950000,4.500000,1.500000,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_properties_round_trip_with_shell() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_properties(dir.path(), &nfw_properties(Some(421))).unwrap();
        let record = read_properties(&path).unwrap();
        assert_eq!(record.fields.len(), 12);
        assert_eq!(record.fields[1].0, "halo_lc_shell");
        assert_eq!(record.require("halo_lc_shell").unwrap(), 421.0);
        assert_relative_eq!(record.require("sod_halo_mass").unwrap(), 1e14);
        assert!(matches!(
            record.require("halo_vel"),
            Err(HaloError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_properties_without_header_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROPERTIES_FILE);
        fs::write(&path, "0.3,1e14\n").unwrap();
        assert!(matches!(
            read_properties(&path),
            Err(HaloError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_copy_properties_only_once() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let path = write_properties(src.path(), &nfw_properties(None)).unwrap();
        assert!(copy_properties_if_missing(&path, out.path()).unwrap());
        assert!(!copy_properties_if_missing(&path, out.path()).unwrap());
        assert!(out.path().join(PROPERTIES_FILE).exists());
    }

    #[test]
    fn test_discover_cutout_shells() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["STEPCutout442", "STEPCutout300", "STEPCutoutxyz", "properties.csv"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        assert_eq!(discover_cutout_shells(dir.path()).unwrap(), vec![300, 442]);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots").join("halo.bin");
        let snapshot = RealizationSnapshot {
            properties: nfw_properties(None),
            particles: sample_particles(),
        };
        save_snapshot(&snapshot, &path).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), snapshot);
    }
}
