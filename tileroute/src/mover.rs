//! The data mover (C5): one-shot data movement along a programmed route.

use crate::backend::{Backend, BufferHandle};
use crate::catalog::RouteCatalog;
use crate::error::{Error, Result};
use crate::location::{TileKind, TileLocation};
use crate::resource::TileResource;

fn tile_mut<'a>(tiles: &'a mut [Vec<TileResource>], loc: TileLocation) -> &'a mut TileResource {
    &mut tiles[loc.col as usize][loc.row as usize]
}

fn program_descriptor<B: Backend>(
    backend: &mut B,
    tile: TileLocation,
    handle: BufferHandle,
    len: usize,
) -> std::result::Result<u32, crate::backend::BackendError> {
    let desc = backend.dma_desc_init(tile)?;
    match handle {
        BufferHandle::Raw(addr) => backend.dma_desc_set_addr_len(desc, addr, len)?,
        BufferHandle::Handle { handle, offset } => {
            backend.dma_desc_set_addr_offset_len(desc, handle, offset, len)?
        }
    }
    backend.dma_desc_enable(desc)?;
    Ok(desc)
}

/// Transfers `len` bytes from `src_buf` on `source` to `dst_buf` on
/// `destination`, along a previously programmed route (spec §4.5 steps
/// 1-6). Returns the `(source, destination)` BD ids it allocated — steps
/// 7-8 (poll, then free both BDs) happen in [`route_dma_wait`], since the
/// public API exposes the poll as its own call (spec §6.2).
#[tracing::instrument(skip(tiles, catalog, backend, src_buf, dst_buf))]
#[allow(clippy::too_many_arguments)]
pub fn move_data<B: Backend>(
    tiles: &mut [Vec<TileResource>],
    catalog: &RouteCatalog,
    backend: &mut B,
    source: TileLocation,
    src_buf: BufferHandle,
    len: usize,
    dst_buf: BufferHandle,
    destination: TileLocation,
) -> Result<(u32, u32)> {
    let route = catalog
        .find(source, destination)
        .ok_or(Error::NoProgrammedRoute { source, destination })?
        .clone();

    let src_tile = tile_mut(tiles, source);
    let src_bd_id = src_tile
        .alloc_bd()
        .ok_or(Error::NoFreeDescriptor { tile: source })?;

    let result = (|| -> Result<(u32, u32)> {
        let src_desc = program_descriptor(backend, source, src_buf, len)?;
        backend.dma_write_bd(source, src_desc, src_bd_id)?;

        let dst_tile = tile_mut(tiles, destination);
        let dst_bd_id = match dst_tile.alloc_bd() {
            Some(id) => id,
            None => {
                tile_mut(tiles, source).free_bd(src_bd_id);
                return Err(Error::NoFreeDescriptor { tile: destination });
            }
        };

        let dst_result = (|| -> Result<()> {
            let dst_desc = program_descriptor(backend, destination, dst_buf, len)?;
            backend.dma_write_bd(destination, dst_desc, dst_bd_id)?;

            let src_channel = source_channel(tiles, &route);
            backend.dma_channel_push_bd(source, src_channel, false, src_bd_id)?;
            backend.dma_channel_enable(source, src_channel, false)?;

            let dst_channel = destination_channel(tiles, &route);
            backend.dma_channel_push_bd(destination, dst_channel, true, dst_bd_id)?;
            backend.dma_channel_enable(destination, dst_channel, true)?;

            Ok(())
        })();

        if let Err(err) = dst_result {
            tile_mut(tiles, destination).free_bd(dst_bd_id);
            tile_mut(tiles, source).free_bd(src_bd_id);
            return Err(err);
        }
        Ok((src_bd_id, dst_bd_id))
    })();

    if result.is_err() {
        tile_mut(tiles, source).free_bd(src_bd_id);
    }
    result
}

pub(crate) fn source_channel(tiles: &[Vec<TileResource>], route: &crate::catalog::Route) -> u8 {
    let kind = tiles[route.source.col as usize][route.source.row as usize].kind;
    if kind == TileKind::ShimInterface {
        tiles[route.source.col as usize][route.source.row as usize]
            .shim
            .as_ref()
            .and_then(|m| m.channel_for_port(true, route.ingress_mm2s_channel))
            .unwrap_or(route.ingress_mm2s_channel)
    } else {
        route.ingress_mm2s_channel
    }
}

pub(crate) fn destination_channel(tiles: &[Vec<TileResource>], route: &crate::catalog::Route) -> u8 {
    let kind = tiles[route.destination.col as usize][route.destination.row as usize].kind;
    if kind == TileKind::ShimInterface {
        tiles[route.destination.col as usize][route.destination.row as usize]
            .shim
            .as_ref()
            .and_then(|m| m.channel_for_port(false, route.egress_s2mm_channel))
            .unwrap_or(route.egress_s2mm_channel)
    } else {
        route.egress_s2mm_channel
    }
}

/// Blocks until `tile`'s pending-BD count on `channel` drains to zero
/// (spec §4.5 step 7). Freeing the BDs back to C1 (step 8) is the caller's
/// job once this returns — it needs the ids [`move_data`] allocated, which
/// this function never sees.
///
/// The upstream driver this is ported from has no timeout at all (spec §9
/// open question 1): a mis-programmed fabric hangs the caller forever. We
/// resolve that open question by accepting an optional deadline —
/// `timeout = None` preserves the original unbounded-wait behavior exactly;
/// `Some(d)` returns `Error::BackendError` once `d` elapses without a
/// guessed-at default.
pub fn route_dma_wait<B: Backend>(
    backend: &mut B,
    tile: TileLocation,
    channel: u8,
    is_s2mm: bool,
    timeout: Option<std::time::Duration>,
) -> Result<()> {
    let deadline = timeout.map(|d| std::time::Instant::now() + d);
    loop {
        let pending = backend.dma_pending_bd_count(tile, channel, is_s2mm)?;
        if pending == 0 {
            return Ok(());
        }
        if let Some(deadline) = deadline {
            if std::time::Instant::now() >= deadline {
                return Err(Error::BackendError(crate::backend::BackendError::new(
                    "route_dma_wait",
                    std::io::Error::new(std::io::ErrorKind::TimedOut, "pending BD count never reached zero"),
                )));
            }
        }
        std::hint::spin_loop();
    }
}
