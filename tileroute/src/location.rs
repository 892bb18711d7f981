//! Grid coordinates, tile kinds and fabric directions.

use serde::{Deserialize, Serialize};

/// A tile's position in the accelerator grid.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TileLocation {
    /// Column index.
    pub col: u16,
    /// Row index. Row 0 is the shim-interface row.
    pub row: u16,
}

impl TileLocation {
    /// Builds a new location.
    pub const fn new(col: u16, row: u16) -> Self {
        Self { col, row }
    }

    /// Returns the neighboring location in `dir`, if it stays within
    /// `(num_cols, num_rows)`.
    pub fn neighbor(&self, dir: CardinalDirection, num_cols: u16, num_rows: u16) -> Option<Self> {
        let (col, row) = match dir {
            CardinalDirection::North => (self.col, self.row.checked_add(1)?),
            CardinalDirection::South => (self.col, self.row.checked_sub(1)?),
            CardinalDirection::East => (self.col.checked_add(1)?, self.row),
            CardinalDirection::West => (self.col.checked_sub(1)?, self.row),
        };
        if col < num_cols && row < num_rows {
            Some(Self { col, row })
        } else {
            None
        }
    }
}

impl std::fmt::Display for TileLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// The kind of a tile, fixed at initialization from its row.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// Bridges the fabric to host memory over DMA. Always row 0.
    ShimInterface,
    /// A tile with a large local data memory, shared by neighboring compute tiles.
    MemoryTile,
    /// A general-purpose compute tile with a local core and data memory.
    ComputeTile,
}

/// The four fabric-facing directions a stream-switch port can face, plus
/// the tile-local DMA loopback direction.
///
/// Slave ports face inward from a direction (`SlaveNorth` receives from the
/// tile to the north); master ports face outward (`MasterNorth` sends to
/// the tile to the north). `DmaLocal` is not a fabric direction at all — it
/// represents the tile's own DMA engine, the first/last hop of every route
/// (invariant 7, spec §3.2).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
    DmaLocal,
}

/// The subset of [`Direction`] that denotes an edge between two tiles in
/// the grid (excludes [`Direction::DmaLocal`]).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CardinalDirection {
    North,
    South,
    East,
    West,
}

impl CardinalDirection {
    /// Enumeration order used by the path finder (spec §4.3): North, South,
    /// East, West. Fixed so that BFS tie-breaks are deterministic.
    pub const ENUMERATION_ORDER: [CardinalDirection; 4] = [
        CardinalDirection::North,
        CardinalDirection::South,
        CardinalDirection::East,
        CardinalDirection::West,
    ];

    /// The direction a neighbor in `self` sees looking back at us.
    pub const fn opposite(self) -> CardinalDirection {
        match self {
            CardinalDirection::North => CardinalDirection::South,
            CardinalDirection::South => CardinalDirection::North,
            CardinalDirection::East => CardinalDirection::West,
            CardinalDirection::West => CardinalDirection::East,
        }
    }
}

impl From<CardinalDirection> for Direction {
    fn from(d: CardinalDirection) -> Self {
        match d {
            CardinalDirection::North => Direction::North,
            CardinalDirection::South => Direction::South,
            CardinalDirection::East => Direction::East,
            CardinalDirection::West => Direction::West,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbor_respects_bounds() {
        let origin = TileLocation::new(0, 0);
        assert_eq!(origin.neighbor(CardinalDirection::West, 5, 6), None);
        assert_eq!(origin.neighbor(CardinalDirection::South, 5, 6), None);
        assert_eq!(
            origin.neighbor(CardinalDirection::East, 5, 6),
            Some(TileLocation::new(1, 0))
        );
        let corner = TileLocation::new(4, 5);
        assert_eq!(corner.neighbor(CardinalDirection::East, 5, 6), None);
        assert_eq!(corner.neighbor(CardinalDirection::North, 5, 6), None);
    }

    #[test]
    fn opposite_is_involutive() {
        for d in CardinalDirection::ENUMERATION_ORDER {
            assert_eq!(d.opposite().opposite(), d);
        }
    }
}
