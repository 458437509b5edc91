use halo_core::{HaloError, HaloProperties, HaloResult, RealizationState, SkyParticles};
use halo_storage::{RealizationSnapshot, write_output};
use std::path::{Path, PathBuf};
use tracing::info;

/// Lifecycle slot of a realization holding whatever its population produced
#[derive(Debug, Clone)]
pub enum Stage<T> {
    Constructed,
    Populated(T),
    Emitted(T),
}

impl<T> Default for Stage<T> {
    fn default() -> Self {
        Self::Constructed
    }
}

impl<T> Stage<T> {
    pub fn state(&self) -> RealizationState {
        match self {
            Self::Constructed => RealizationState::Constructed,
            Self::Populated(_) => RealizationState::Populated,
            Self::Emitted(_) => RealizationState::Emitted,
        }
    }

    /// Population data, or InvalidState while nothing has been drawn
    pub fn populated(&self, operation: &'static str) -> HaloResult<&T> {
        match self {
            Self::Constructed => Err(HaloError::InvalidState {
                operation,
                state: RealizationState::Constructed.name(),
            }),
            Self::Populated(value) | Self::Emitted(value) => Ok(value),
        }
    }

    /// Repopulating an emitted realization makes it unemitted again
    pub fn populate(&mut self, value: T) {
        *self = Self::Populated(value);
    }

    pub fn mark_emitted(&mut self) {
        *self = match std::mem::take(self) {
            Self::Populated(value) => Self::Emitted(value),
            other => other,
        };
    }
}

/// A halo or point-mass lens that can be drawn and written out for ray tracing
pub trait HaloRealization {
    /// Short label for logs
    fn kind(&self) -> &'static str;

    fn state(&self) -> RealizationState;

    /// Observer-frame particles and properties of a populated realization
    fn finalize(&self) -> HaloResult<(SkyParticles, HaloProperties)>;

    fn mark_emitted(&mut self);

    /// Write the particle columns and `properties.csv` into `dir`.
    /// Nothing is written unless the realization has been populated, and a
    /// failed write leaves no partial set behind.
    fn output_particles(&mut self, dir: &Path) -> HaloResult<Vec<PathBuf>> {
        if self.state() == RealizationState::Constructed {
            return Err(HaloError::InvalidState {
                operation: "output particles",
                state: self.state().name(),
            });
        }
        let (particles, properties) = self.finalize()?;
        let paths = write_output(dir, &particles, &properties)?;
        self.mark_emitted();
        info!(
            "Emitted {} {} particles (z={}, mpp={:.4e}) to {}",
            particles.len(),
            self.kind(),
            properties.redshift,
            properties.mpp,
            dir.display()
        );
        Ok(paths)
    }

    fn snapshot(&self) -> HaloResult<RealizationSnapshot> {
        let (particles, properties) = self.finalize()?;
        Ok(RealizationSnapshot {
            properties,
            particles,
        })
    }
}
