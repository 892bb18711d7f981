//! The pluggable hardware-I/O backend contract (spec §6.1).
//!
//! The routing core never talks to registers directly; every side effect
//! goes through a [`Backend`] implementation selected at [`init_routing`]
//! time (bare-metal, Linux userspace, socket simulator, ...). The core
//! branches only on tile kind (`is_shim`) and on the backend's own
//! [`BufferHandle`] convention — never on the backend's concrete type.
//!
//! [`init_routing`]: crate::instance::init_routing

use crate::location::{Direction, TileLocation};

/// An opaque failure from the register-level backend.
///
/// Kept as a boxed `dyn Error` rather than a backend-specific type so that
/// `tileroute::Error` doesn't need a generic parameter for every backend a
/// downstream crate might plug in.
#[derive(Debug, thiserror::Error)]
#[error("{context}: {source}")]
pub struct BackendError {
    /// What the routing core was trying to do when the backend failed.
    pub context: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl BackendError {
    /// Wraps an arbitrary backend error with the operation that triggered it.
    pub fn new(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// A source or destination buffer address, in whichever convention the
/// backend uses.
///
/// Preserves the original driver's `BAREMETAL || SOCKET ⇒ raw address,
/// else ⇒ opaque handle` branch (spec §9 design note), but localizes it to
/// this enum instead of scattering `#ifdef`-style checks through the
/// mover.
#[derive(Debug, Copy, Clone)]
pub enum BufferHandle {
    /// A raw physical address, used by bare-metal and socket-simulator backends.
    Raw(u64),
    /// An opaque device-memory handle plus byte offset, used by backends
    /// that provide coherent DMA memory (e.g. a Linux userspace backend).
    Handle { handle: u64, offset: u64 },
}

/// A buffer-descriptor handle, opaque to the routing core.
pub type Bd = u32;

/// A DMA channel index on a tile.
pub type Channel = u8;

/// The hardware-I/O backend contract (spec §6.1).
///
/// All operations are synchronous and may block the calling thread; the
/// routing core has no internal task runtime (spec §5).
pub trait Backend {
    /// Reads a 32-bit register.
    fn read32(&mut self, addr: u64) -> Result<u32, BackendError>;
    /// Writes a 32-bit register.
    fn write32(&mut self, addr: u64, val: u32) -> Result<(), BackendError>;
    /// Reads `n` contiguous 32-bit registers.
    fn block_read32(&mut self, addr: u64, n: usize) -> Result<Vec<u32>, BackendError>;
    /// Writes `words` as contiguous 32-bit registers.
    fn block_write32(&mut self, addr: u64, words: &[u32]) -> Result<(), BackendError>;

    /// Connects a slave port to a master port through `tile`'s stream switch.
    fn strm_switch_enable(
        &mut self,
        tile: TileLocation,
        slave_dir: Direction,
        slave_port: u8,
        master_dir: Direction,
        master_port: u8,
    ) -> Result<(), BackendError>;

    /// Disconnects a slave/master port pair. Idempotent: disabling an
    /// already-disabled connection is not an error.
    fn strm_switch_disable(
        &mut self,
        tile: TileLocation,
        slave_dir: Direction,
        slave_port: u8,
        master_dir: Direction,
        master_port: u8,
    ) -> Result<(), BackendError>;

    /// Enables the host-to-fabric bridge on a shim port.
    fn shim_dma_to_fabric_enable(&mut self, tile: TileLocation, port: u8)
        -> Result<(), BackendError>;
    /// Enables the fabric-to-host bridge on a shim port.
    fn fabric_to_shim_dma_enable(&mut self, tile: TileLocation, port: u8)
        -> Result<(), BackendError>;
    /// Disables a shim bridge port (either direction). Idempotent.
    fn shim_dma_disable(&mut self, tile: TileLocation, port: u8) -> Result<(), BackendError>;

    /// Initializes a fresh buffer descriptor on `tile`, returning its id.
    fn dma_desc_init(&mut self, tile: TileLocation) -> Result<Bd, BackendError>;
    /// Programs a descriptor with a raw address and length.
    fn dma_desc_set_addr_len(&mut self, desc: Bd, addr: u64, len: usize) -> Result<(), BackendError>;
    /// Programs a descriptor with a device-memory handle, offset and length.
    fn dma_desc_set_addr_offset_len(
        &mut self,
        desc: Bd,
        mem_handle: u64,
        offset: u64,
        len: usize,
    ) -> Result<(), BackendError>;
    /// Marks a descriptor enabled (ready to be pushed to a channel).
    fn dma_desc_enable(&mut self, desc: Bd) -> Result<(), BackendError>;
    /// Commits a programmed descriptor to `tile`'s descriptor table at slot `bd_id`.
    fn dma_write_bd(&mut self, tile: TileLocation, desc: Bd, bd_id: u32) -> Result<(), BackendError>;

    /// Pushes a buffer descriptor onto a channel's queue.
    fn dma_channel_push_bd(
        &mut self,
        tile: TileLocation,
        channel: Channel,
        is_s2mm: bool,
        bd_id: u32,
    ) -> Result<(), BackendError>;
    /// Enables (kicks off) a channel.
    fn dma_channel_enable(
        &mut self,
        tile: TileLocation,
        channel: Channel,
        is_s2mm: bool,
    ) -> Result<(), BackendError>;
    /// Returns the number of buffer descriptors still pending completion on
    /// a channel.
    fn dma_pending_bd_count(
        &mut self,
        tile: TileLocation,
        channel: Channel,
        is_s2mm: bool,
    ) -> Result<u32, BackendError>;

    /// Starts (or restarts) a compute tile's core.
    fn core_enable(&mut self, tile: TileLocation) -> Result<(), BackendError>;
    /// Blocks until `tile`'s core reports idle, or `timeout` elapses.
    ///
    /// `timeout = None` blocks indefinitely, matching the upstream driver's
    /// contract (spec §9 open question 1) — callers that want bounded
    /// waits must pass `Some(_)`.
    fn core_wait_done(
        &mut self,
        tile: TileLocation,
        timeout: Option<std::time::Duration>,
    ) -> Result<(), BackendError>;
}

#[cfg(any(test, feature = "sim"))]
pub mod sim;
