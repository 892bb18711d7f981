//! In-memory [`Backend`] used by this crate's own tests and by downstream
//! integration tests that want the §8 end-to-end scenarios without real
//! hardware.
//!
//! Registers live in a `HashMap`; DMA is a real byte copy between buffers
//! registered with [`SimBackend::write_region`], routed through a one-slot
//! "wire" that the mm2s side fills and the s2mm side drains. Nothing here
//! is async — a channel's transfer completes synchronously inside
//! `dma_channel_enable`, so `dma_pending_bd_count` never has anything to
//! report by the time a caller checks it.

use super::{Backend, BackendError, Bd, Channel};
use crate::location::{Direction, TileLocation};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy)]
enum MemRef {
    Raw(u64),
    Handle { handle: u64, offset: u64 },
}

impl MemRef {
    fn key_offset(self) -> (u64, u64) {
        match self {
            MemRef::Raw(addr) => (addr, 0),
            MemRef::Handle { handle, offset } => (handle, offset),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DescProgram {
    mem: MemRef,
    len: usize,
}

/// A software-only [`Backend`] that models registers and DMA transfers
/// in-process, so routing scenarios can run as ordinary `#[test]`s.
#[derive(Debug, Default)]
pub struct SimBackend {
    registers: HashMap<u64, u32>,
    switch_conns: std::collections::HashSet<(TileLocation, Direction, u8, Direction, u8)>,
    shim_bridges: std::collections::HashSet<(TileLocation, u8)>,
    next_desc: Bd,
    descriptors: HashMap<Bd, DescProgram>,
    bd_slots: HashMap<(TileLocation, u32), Bd>,
    channel_queues: HashMap<(TileLocation, Channel, bool), VecDeque<u32>>,
    wire: VecDeque<Vec<u8>>,
    memory: HashMap<u64, Vec<u8>>,
    cores_running: std::collections::HashSet<TileLocation>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or overwrites) the bytes backing `key` (a raw address or
    /// a device-memory handle — this simulator doesn't distinguish them).
    pub fn write_region(&mut self, key: u64, data: Vec<u8>) {
        self.memory.insert(key, data);
    }

    /// Reads `len` bytes from `key` starting at `offset`, padding with
    /// zeroes if the backing buffer is shorter.
    pub fn read_region(&self, key: u64, offset: u64, len: usize) -> Vec<u8> {
        let buf = self.memory.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        let start = offset as usize;
        let mut out = vec![0u8; len];
        if start < buf.len() {
            let n = len.min(buf.len() - start);
            out[..n].copy_from_slice(&buf[start..start + n]);
        }
        out
    }

    /// Whether `tile`'s core is currently enabled and hasn't been waited on.
    pub fn core_is_running(&self, tile: TileLocation) -> bool {
        self.cores_running.contains(&tile)
    }

    fn region_mut(&mut self, key: u64, min_len: usize) -> &mut Vec<u8> {
        let buf = self.memory.entry(key).or_default();
        if buf.len() < min_len {
            buf.resize(min_len, 0);
        }
        buf
    }

    fn run_channel(&mut self, tile: TileLocation, channel: Channel, is_s2mm: bool) {
        let key = (tile, channel, is_s2mm);
        // Drain the queue into an owned list up front: the rest of this
        // method needs unrestricted `&mut self` (to touch `memory` and
        // `wire`), which a live borrow of `self.channel_queues` would rule out.
        let bd_ids: Vec<u32> = self
            .channel_queues
            .get_mut(&key)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default();

        for bd_id in bd_ids {
            let Some(&desc_id) = self.bd_slots.get(&(tile, bd_id)) else { continue };
            let Some(&prog) = self.descriptors.get(&desc_id) else { continue };
            let (mem_key, offset) = prog.mem.key_offset();
            let start = offset as usize;
            if is_s2mm {
                let bytes = self.wire.pop_front().unwrap_or_else(|| vec![0u8; prog.len]);
                let region = self.region_mut(mem_key, start + prog.len);
                let n = prog.len.min(bytes.len());
                region[start..start + n].copy_from_slice(&bytes[..n]);
            } else {
                let region = self.region_mut(mem_key, start + prog.len);
                let bytes = region[start..start + prog.len].to_vec();
                self.wire.push_back(bytes);
            }
        }
    }
}

impl Backend for SimBackend {
    fn read32(&mut self, addr: u64) -> Result<u32, BackendError> {
        Ok(*self.registers.get(&addr).unwrap_or(&0))
    }

    fn write32(&mut self, addr: u64, val: u32) -> Result<(), BackendError> {
        self.registers.insert(addr, val);
        Ok(())
    }

    fn block_read32(&mut self, addr: u64, n: usize) -> Result<Vec<u32>, BackendError> {
        (0..n as u64).map(|i| self.read32(addr + i * 4)).collect()
    }

    fn block_write32(&mut self, addr: u64, words: &[u32]) -> Result<(), BackendError> {
        for (i, w) in words.iter().enumerate() {
            self.write32(addr + i as u64 * 4, *w)?;
        }
        Ok(())
    }

    fn strm_switch_enable(
        &mut self,
        tile: TileLocation,
        slave_dir: Direction,
        slave_port: u8,
        master_dir: Direction,
        master_port: u8,
    ) -> Result<(), BackendError> {
        self.switch_conns
            .insert((tile, slave_dir, slave_port, master_dir, master_port));
        Ok(())
    }

    fn strm_switch_disable(
        &mut self,
        tile: TileLocation,
        slave_dir: Direction,
        slave_port: u8,
        master_dir: Direction,
        master_port: u8,
    ) -> Result<(), BackendError> {
        self.switch_conns
            .remove(&(tile, slave_dir, slave_port, master_dir, master_port));
        Ok(())
    }

    fn shim_dma_to_fabric_enable(&mut self, tile: TileLocation, port: u8) -> Result<(), BackendError> {
        self.shim_bridges.insert((tile, port));
        Ok(())
    }

    fn fabric_to_shim_dma_enable(&mut self, tile: TileLocation, port: u8) -> Result<(), BackendError> {
        self.shim_bridges.insert((tile, port));
        Ok(())
    }

    fn shim_dma_disable(&mut self, tile: TileLocation, port: u8) -> Result<(), BackendError> {
        self.shim_bridges.remove(&(tile, port));
        Ok(())
    }

    fn dma_desc_init(&mut self, _tile: TileLocation) -> Result<Bd, BackendError> {
        let id = self.next_desc;
        self.next_desc += 1;
        Ok(id)
    }

    fn dma_desc_set_addr_len(&mut self, desc: Bd, addr: u64, len: usize) -> Result<(), BackendError> {
        self.descriptors.insert(desc, DescProgram { mem: MemRef::Raw(addr), len });
        Ok(())
    }

    fn dma_desc_set_addr_offset_len(
        &mut self,
        desc: Bd,
        mem_handle: u64,
        offset: u64,
        len: usize,
    ) -> Result<(), BackendError> {
        self.descriptors
            .insert(desc, DescProgram { mem: MemRef::Handle { handle: mem_handle, offset }, len });
        Ok(())
    }

    fn dma_desc_enable(&mut self, _desc: Bd) -> Result<(), BackendError> {
        Ok(())
    }

    fn dma_write_bd(&mut self, tile: TileLocation, desc: Bd, bd_id: u32) -> Result<(), BackendError> {
        self.bd_slots.insert((tile, bd_id), desc);
        Ok(())
    }

    fn dma_channel_push_bd(
        &mut self,
        tile: TileLocation,
        channel: Channel,
        is_s2mm: bool,
        bd_id: u32,
    ) -> Result<(), BackendError> {
        self.channel_queues
            .entry((tile, channel, is_s2mm))
            .or_default()
            .push_back(bd_id);
        Ok(())
    }

    fn dma_channel_enable(
        &mut self,
        tile: TileLocation,
        channel: Channel,
        is_s2mm: bool,
    ) -> Result<(), BackendError> {
        self.run_channel(tile, channel, is_s2mm);
        Ok(())
    }

    fn dma_pending_bd_count(
        &mut self,
        tile: TileLocation,
        channel: Channel,
        is_s2mm: bool,
    ) -> Result<u32, BackendError> {
        Ok(self
            .channel_queues
            .get(&(tile, channel, is_s2mm))
            .map(|q| q.len() as u32)
            .unwrap_or(0))
    }

    fn core_enable(&mut self, tile: TileLocation) -> Result<(), BackendError> {
        self.cores_running.insert(tile);
        Ok(())
    }

    fn core_wait_done(
        &mut self,
        tile: TileLocation,
        _timeout: Option<std::time::Duration>,
    ) -> Result<(), BackendError> {
        self.cores_running.remove(&tile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dma_copies_bytes_between_regions() {
        let mut backend = SimBackend::new();
        backend.write_region(0x1000, vec![1, 2, 3, 4]);

        let src_desc = backend.dma_desc_init(TileLocation::new(0, 0)).unwrap();
        backend.dma_desc_set_addr_len(src_desc, 0x1000, 4).unwrap();
        backend.dma_write_bd(TileLocation::new(0, 0), src_desc, 0).unwrap();
        backend
            .dma_channel_push_bd(TileLocation::new(0, 0), 0, false, 0)
            .unwrap();
        backend.dma_channel_enable(TileLocation::new(0, 0), 0, false).unwrap();

        let dst_desc = backend.dma_desc_init(TileLocation::new(1, 0)).unwrap();
        backend.dma_desc_set_addr_len(dst_desc, 0x2000, 4).unwrap();
        backend.dma_write_bd(TileLocation::new(1, 0), dst_desc, 0).unwrap();
        backend
            .dma_channel_push_bd(TileLocation::new(1, 0), 0, true, 0)
            .unwrap();
        backend.dma_channel_enable(TileLocation::new(1, 0), 0, true).unwrap();

        assert_eq!(backend.read_region(0x2000, 0, 4), vec![1, 2, 3, 4]);
        assert_eq!(
            backend
                .dma_pending_bd_count(TileLocation::new(1, 0), 0, true)
                .unwrap(),
            0
        );
    }

    #[test]
    fn strm_switch_disable_is_idempotent() {
        let mut backend = SimBackend::new();
        let t = TileLocation::new(0, 0);
        backend
            .strm_switch_disable(t, Direction::North, 0, Direction::South, 0)
            .unwrap();
        backend
            .strm_switch_enable(t, Direction::North, 0, Direction::South, 0)
            .unwrap();
        backend
            .strm_switch_disable(t, Direction::North, 0, Direction::South, 0)
            .unwrap();
        backend
            .strm_switch_disable(t, Direction::North, 0, Direction::South, 0)
            .unwrap();
    }
}
