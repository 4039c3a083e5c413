//! Snapshot matrices and per-core statistics.

use super::error::HardwareError;
use super::hardware::{AdcCore, CORE_COUNT};

/// Raw snapshot column feeding each physical core.
///
/// Snapshot memory interleaves the cores as 1, 3, 2, 4. The mapping is its
/// own inverse.
pub const RAW_COLUMN_FOR_CORE: [usize; CORE_COUNT] = [0, 2, 1, 3];

/// Snapshot rows in raw interleave order, one sample per core per row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawSnapshot {
    rows: Vec<[i8; CORE_COUNT]>,
}

impl RawSnapshot {
    pub fn from_rows(rows: Vec<[i8; CORE_COUNT]>) -> Self {
        Self { rows }
    }

    /// Reshape a byte dump of snapshot memory into rows of four samples.
    ///
    /// # Errors
    /// Returns [`HardwareError::MalformedSnapshot`] when the length is not a
    /// multiple of four.
    pub fn from_interleaved(bytes: &[u8]) -> Result<Self, HardwareError> {
        if bytes.len() % CORE_COUNT != 0 {
            return Err(HardwareError::MalformedSnapshot {
                reason: format!(
                    "{} bytes is not a whole number of {CORE_COUNT}-sample rows",
                    bytes.len()
                ),
            });
        }
        let rows = bytes
            .chunks_exact(CORE_COUNT)
            .map(|chunk| [chunk[0] as i8, chunk[1] as i8, chunk[2] as i8, chunk[3] as i8])
            .collect();
        Ok(Self { rows })
    }

    /// Append another burst, as when several groups are captured back to back.
    pub fn extend(&mut self, other: RawSnapshot) {
        self.rows.extend(other.rows);
    }

    pub fn rows(&self) -> &[[i8; CORE_COUNT]] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Snapshot samples split into one column per physical core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreMatrix {
    columns: [Vec<i8>; CORE_COUNT],
}

impl CoreMatrix {
    /// Apply the fixed raw-to-physical column reorder.
    ///
    /// # Errors
    /// Returns [`HardwareError::EmptySnapshot`] when there are no rows.
    pub fn from_raw(raw: &RawSnapshot) -> Result<Self, HardwareError> {
        if raw.is_empty() {
            return Err(HardwareError::EmptySnapshot);
        }
        let columns: [Vec<i8>; CORE_COUNT] = RAW_COLUMN_FOR_CORE
            .map(|raw_column| raw.rows().iter().map(|row| row[raw_column]).collect());
        Ok(Self { columns })
    }

    pub fn column(&self, core: AdcCore) -> &[i8] {
        &self.columns[core.index()]
    }

    pub fn rows(&self) -> usize {
        self.columns[0].len()
    }

    /// Mean and population standard deviation of every core.
    ///
    /// # Errors
    /// Returns [`HardwareError::MalformedSnapshot`] when a core shows no
    /// variation at all, which leaves the normalized metrics undefined.
    pub fn stats(&self) -> Result<[CoreStats; CORE_COUNT], HardwareError> {
        let mut stats = [CoreStats::default(); CORE_COUNT];
        for core in AdcCore::ALL {
            let core_stats = CoreStats::of(self.column(core));
            if !(core_stats.std > 0.0) {
                return Err(HardwareError::MalformedSnapshot {
                    reason: format!("{core} has zero standard deviation"),
                });
            }
            stats[core.index()] = core_stats;
        }
        Ok(stats)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CoreStats {
    pub mean: f64,
    pub std: f64,
}

impl CoreStats {
    pub fn of(samples: &[i8]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
        let variance = samples
            .iter()
            .map(|&s| {
                let d = s as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Self {
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Mean normalized by standard deviation, per core.
pub fn mean_over_std(stats: &[CoreStats; CORE_COUNT]) -> [f64; CORE_COUNT] {
    stats.map(|s| s.mean / s.std)
}

/// Standard deviation relative to core 1, per core.
pub fn std_ratio(stats: &[CoreStats; CORE_COUNT]) -> [f64; CORE_COUNT] {
    let reference = stats[AdcCore::Core1.index()].std;
    stats.map(|s| s.std / reference)
}
