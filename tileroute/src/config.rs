//! Device layout configuration.
//!
//! The grid dimensions and row-to-[`TileKind`] banding are external,
//! per-generation facts (spec §1 lists "device enumeration, per-generation
//! tile maps" as an out-of-scope collaborator); what this module owns is
//! just enough of that shape for [`crate::instance::init_routing`] to build
//! the tile table. A profile can be built in code or loaded from TOML.

use crate::error::{Error, Result};
use crate::location::TileKind;
use serde::{Deserialize, Serialize};

/// Inclusive row range `[start, end]`.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct RowBand {
    pub start: u16,
    pub end: u16,
}

impl RowBand {
    fn contains(&self, row: u16) -> bool {
        row >= self.start && row <= self.end
    }
}

/// Static description of a device's grid shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub num_cols: u16,
    pub num_rows: u16,
    /// Row occupied by shim-interface tiles. Always a single row (invariant
    /// 5, spec §3.2: the fabric does not extend below it).
    pub shim_row: u16,
    pub memory_row_band: RowBand,
    pub compute_row_band: RowBand,
}

impl DeviceProfile {
    /// Parses a profile from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::InvalidArgument(format!("invalid device profile: {e}")))
    }

    /// Serializes this profile to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidArgument(format!("cannot serialize device profile: {e}")))
    }

    /// The default 5-column by 6-row layout used in the end-to-end
    /// scenarios of spec §8: shim row 0, memory row 1, compute rows 2-4.
    pub fn reference_5x6() -> Self {
        Self {
            num_cols: 5,
            num_rows: 6,
            shim_row: 0,
            memory_row_band: RowBand { start: 1, end: 1 },
            compute_row_band: RowBand { start: 2, end: 4 },
        }
    }

    /// Resolves the [`TileKind`] for a given row.
    pub fn tile_kind(&self, row: u16) -> Result<TileKind> {
        if row == self.shim_row {
            Ok(TileKind::ShimInterface)
        } else if self.memory_row_band.contains(row) {
            Ok(TileKind::MemoryTile)
        } else if self.compute_row_band.contains(row) {
            Ok(TileKind::ComputeTile)
        } else {
            Err(Error::InvalidArgument(format!(
                "row {row} is not covered by any tile-kind band in this device profile"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_profile_bands_are_exclusive() {
        let p = DeviceProfile::reference_5x6();
        assert!(matches!(p.tile_kind(0), Ok(TileKind::ShimInterface)));
        assert!(matches!(p.tile_kind(1), Ok(TileKind::MemoryTile)));
        assert!(matches!(p.tile_kind(2), Ok(TileKind::ComputeTile)));
        assert!(matches!(p.tile_kind(4), Ok(TileKind::ComputeTile)));
    }

    #[test]
    fn toml_roundtrip() {
        let p = DeviceProfile::reference_5x6();
        let s = p.to_toml_string().unwrap();
        let p2 = DeviceProfile::from_toml_str(&s).unwrap();
        assert_eq!(p2.num_cols, p.num_cols);
        assert_eq!(p2.num_rows, p.num_rows);
    }
}
