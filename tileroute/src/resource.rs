//! The per-tile resource table (C1): port, DMA-channel and
//! buffer-descriptor free pools, plus the shim host-edge mapping.

use crate::location::{CardinalDirection, TileKind};
use crate::mask::{PortMask, WideMask};
use serde::{Deserialize, Serialize};

/// Master and slave port free-pools for all four cardinal directions of a
/// single tile.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct PortBitmap {
    north_slave: PortMask,
    north_master: PortMask,
    south_slave: PortMask,
    south_master: PortMask,
    east_slave: PortMask,
    east_master: PortMask,
    west_slave: PortMask,
    west_master: PortMask,
}

impl PortBitmap {
    /// Returns the slave-port mask facing `dir`.
    pub fn slave(&self, dir: CardinalDirection) -> &PortMask {
        match dir {
            CardinalDirection::North => &self.north_slave,
            CardinalDirection::South => &self.south_slave,
            CardinalDirection::East => &self.east_slave,
            CardinalDirection::West => &self.west_slave,
        }
    }

    /// Returns a mutable reference to the slave-port mask facing `dir`.
    pub fn slave_mut(&mut self, dir: CardinalDirection) -> &mut PortMask {
        match dir {
            CardinalDirection::North => &mut self.north_slave,
            CardinalDirection::South => &mut self.south_slave,
            CardinalDirection::East => &mut self.east_slave,
            CardinalDirection::West => &mut self.west_slave,
        }
    }

    /// Returns the master-port mask facing `dir`.
    pub fn master(&self, dir: CardinalDirection) -> &PortMask {
        match dir {
            CardinalDirection::North => &self.north_master,
            CardinalDirection::South => &self.south_master,
            CardinalDirection::East => &self.east_master,
            CardinalDirection::West => &self.west_master,
        }
    }

    /// Returns a mutable reference to the master-port mask facing `dir`.
    pub fn master_mut(&mut self, dir: CardinalDirection) -> &mut PortMask {
        match dir {
            CardinalDirection::North => &mut self.north_master,
            CardinalDirection::South => &mut self.south_master,
            CardinalDirection::East => &mut self.east_master,
            CardinalDirection::West => &mut self.west_master,
        }
    }
}

/// Free-pool of MM2S/S2MM DMA channels on a tile.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct DmaChannelBitmap {
    pub mm2s_free: PortMask,
    pub s2mm_free: PortMask,
}

/// One entry of a [`ShimPortChannelMapping`]: a fabric port paired with the
/// DMA channel it carries, and whether it's currently free.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct ShimPortChannel {
    pub port: u8,
    pub channel: u8,
    pub available: bool,
}

/// The host-edge port/channel mapping carried only by [`TileKind::ShimInterface`]
/// tiles (spec §3.1). Defaults match the upstream driver's hardcoded table
/// and can be replaced wholesale via `configure_host_edge_constraints`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShimPortChannelMapping {
    pub host_to_array: Vec<ShimPortChannel>,
    pub array_to_host: Vec<ShimPortChannel>,
}

impl Default for ShimPortChannelMapping {
    fn default() -> Self {
        Self {
            host_to_array: vec![
                ShimPortChannel { port: 3, channel: 0, available: true },
                ShimPortChannel { port: 7, channel: 1, available: true },
            ],
            array_to_host: vec![
                ShimPortChannel { port: 2, channel: 0, available: true },
                ShimPortChannel { port: 3, channel: 1, available: true },
            ],
        }
    }
}

impl ShimPortChannelMapping {
    fn table(&self, host_to_array: bool) -> &[ShimPortChannel] {
        if host_to_array {
            &self.host_to_array
        } else {
            &self.array_to_host
        }
    }

    fn table_mut(&mut self, host_to_array: bool) -> &mut Vec<ShimPortChannel> {
        if host_to_array {
            &mut self.host_to_array
        } else {
            &mut self.array_to_host
        }
    }

    /// Returns the first available `(port, channel)` entry in the
    /// requested direction's table.
    pub fn first_free(&self, host_to_array: bool) -> Option<(u8, u8)> {
        self.table(host_to_array)
            .iter()
            .find(|e| e.available)
            .map(|e| (e.port, e.channel))
    }

    /// Marks the entry for `port` as unavailable (reserved).
    pub fn mark_used(&mut self, host_to_array: bool, port: u8) -> bool {
        if let Some(e) = self.table_mut(host_to_array).iter_mut().find(|e| e.port == port) {
            e.available = false;
            true
        } else {
            false
        }
    }

    /// Marks the entry for `port` as available (released).
    pub fn mark_free(&mut self, host_to_array: bool, port: u8) -> bool {
        if let Some(e) = self.table_mut(host_to_array).iter_mut().find(|e| e.port == port) {
            e.available = true;
            true
        } else {
            false
        }
    }

    /// Returns the channel bound to `port` in the requested direction's table.
    pub fn channel_for_port(&self, host_to_array: bool, port: u8) -> Option<u8> {
        self.table(host_to_array)
            .iter()
            .find(|e| e.port == port)
            .map(|e| e.channel)
    }
}

/// Which side of a tile-local connection a port belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PortSide {
    Master,
    Slave,
}

/// The full per-tile resource record (spec §3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileResource {
    pub kind: TileKind,
    pub ports: PortBitmap,
    pub dma: DmaChannelBitmap,
    /// Free buffer-descriptor slots: bit set ⇒ free.
    pub bd_free: WideMask,
    pub shim: Option<ShimPortChannelMapping>,
    pub is_auto_configured: bool,
    pub is_executing: bool,
}

impl TileResource {
    /// Builds a tile resource record pre-seeded per spec §4.1's initial-state
    /// table for `kind`.
    pub fn new(kind: TileKind) -> Self {
        let (ports, dma, bd_bits) = match kind {
            TileKind::ShimInterface => (
                PortBitmap {
                    east_slave: PortMask::new(0xF),
                    west_slave: PortMask::new(0xF),
                    south_slave: PortMask::new(0x00),
                    north_slave: PortMask::new(0xF),
                    east_master: PortMask::new(0xF),
                    west_master: PortMask::new(0xF),
                    south_master: PortMask::new(0x00),
                    north_master: PortMask::new(0x3F),
                },
                DmaChannelBitmap {
                    mm2s_free: PortMask::new(0x3),
                    s2mm_free: PortMask::new(0x3),
                },
                16,
            ),
            TileKind::MemoryTile => (
                PortBitmap {
                    east_slave: PortMask::new(0x00),
                    west_slave: PortMask::new(0x00),
                    south_slave: PortMask::new(0x3F),
                    north_slave: PortMask::new(0xF),
                    east_master: PortMask::new(0x00),
                    west_master: PortMask::new(0x00),
                    south_master: PortMask::new(0xF),
                    north_master: PortMask::new(0x3F),
                },
                DmaChannelBitmap {
                    mm2s_free: PortMask::new(0x3F),
                    s2mm_free: PortMask::new(0x3F),
                },
                48,
            ),
            TileKind::ComputeTile => (
                PortBitmap {
                    east_slave: PortMask::new(0xF),
                    west_slave: PortMask::new(0xF),
                    south_slave: PortMask::new(0x3F),
                    north_slave: PortMask::new(0xF),
                    east_master: PortMask::new(0xF),
                    west_master: PortMask::new(0xF),
                    south_master: PortMask::new(0xF),
                    north_master: PortMask::new(0x3F),
                },
                DmaChannelBitmap {
                    mm2s_free: PortMask::new(0x3),
                    s2mm_free: PortMask::new(0x3),
                },
                16,
            ),
        };
        let shim = matches!(kind, TileKind::ShimInterface).then(ShimPortChannelMapping::default);
        Self {
            kind,
            ports,
            dma,
            bd_free: WideMask::filled(bd_bits),
            shim,
            is_auto_configured: false,
            is_executing: false,
        }
    }

    fn mask(&self, side: PortSide, dir: CardinalDirection) -> &PortMask {
        match side {
            PortSide::Master => self.ports.master(dir),
            PortSide::Slave => self.ports.slave(dir),
        }
    }

    fn mask_mut(&mut self, side: PortSide, dir: CardinalDirection) -> &mut PortMask {
        match side {
            PortSide::Master => self.ports.master_mut(dir),
            PortSide::Slave => self.ports.slave_mut(dir),
        }
    }

    /// Returns the lowest-index free port on `side`/`dir`.
    pub fn first_free_port(&self, side: PortSide, dir: CardinalDirection) -> Option<u8> {
        self.mask(side, dir).first_free()
    }

    /// Reserves port `port` on `side`/`dir`. Returns `false` if already reserved.
    pub fn reserve_port(&mut self, side: PortSide, dir: CardinalDirection, port: u8) -> bool {
        self.mask_mut(side, dir).reserve(port)
    }

    /// Releases port `port` on `side`/`dir` back to the free pool.
    pub fn release_port(&mut self, side: PortSide, dir: CardinalDirection, port: u8) {
        self.mask_mut(side, dir).release(port)
    }

    /// Allocates the lowest-index free buffer descriptor, if any.
    pub fn alloc_bd(&mut self) -> Option<u32> {
        let id = self.bd_free.first_free()?;
        self.bd_free.reserve(id);
        Some(id)
    }

    /// Returns a buffer descriptor to the free pool.
    pub fn free_bd(&mut self, id: u32) {
        self.bd_free.release(id);
    }
}

/// Returns the lowest port index free on both `tile_a`'s master port facing
/// `dir_from_a` and `tile_b`'s slave port facing the opposite direction.
///
/// The single routine behind both the path finder's optimistic edge check
/// and the path programmer's strict port threading (spec §9 design note:
/// "the original code duplicates the logic and drifts" — this crate does
/// not).
pub fn first_free_paired(
    tile_a: &TileResource,
    dir_from_a: CardinalDirection,
    tile_b: &TileResource,
) -> Option<u8> {
    tile_a
        .ports
        .master(dir_from_a)
        .first_free_paired(tile_b.ports.slave(dir_from_a.opposite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shim_south_ports_are_zero() {
        let t = TileResource::new(TileKind::ShimInterface);
        assert_eq!(t.ports.slave(CardinalDirection::South).0, 0);
        assert_eq!(t.ports.master(CardinalDirection::South).0, 0);
    }

    #[test]
    fn memory_tile_east_west_are_zero() {
        let t = TileResource::new(TileKind::MemoryTile);
        assert_eq!(t.ports.slave(CardinalDirection::East).0, 0);
        assert_eq!(t.ports.slave(CardinalDirection::West).0, 0);
        assert_eq!(t.ports.master(CardinalDirection::East).0, 0);
        assert_eq!(t.ports.master(CardinalDirection::West).0, 0);
    }

    #[test]
    fn bd_alloc_exhausts_and_frees() {
        let mut t = TileResource::new(TileKind::ComputeTile);
        let mut allocated = Vec::new();
        for _ in 0..16 {
            allocated.push(t.alloc_bd().expect("bd available"));
        }
        assert!(t.alloc_bd().is_none());
        t.free_bd(allocated[0]);
        assert_eq!(t.alloc_bd(), Some(allocated[0]));
    }

    #[test]
    fn shim_mapping_defaults_match_driver_constants() {
        let m = ShimPortChannelMapping::default();
        assert_eq!(m.first_free(true), Some((3, 0)));
        assert_eq!(m.first_free(false), Some((2, 0)));
    }
}
