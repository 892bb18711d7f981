//! [`RoutingInstance`]: the root object binding a device profile, the
//! per-tile resource table, the route catalog and a [`Backend`] together
//! into the public API surface (spec §6.2).

use crate::backend::{Backend, BufferHandle};
use crate::catalog::RouteCatalog;
use crate::config::DeviceProfile;
use crate::error::{Error, Result};
use crate::location::{TileKind, TileLocation};
use crate::pathfind::RouteConstraints;
use crate::program;
use crate::resource::{ShimPortChannelMapping, TileResource};
use crate::{mover, resource};
use std::collections::HashMap;
use std::time::Duration;

/// Owns the tile grid, the route catalog and the backend for one device.
///
/// Built by [`RoutingInstance::init_routing`]; every other public entry
/// point in this crate is a method here.
pub struct RoutingInstance<B: Backend> {
    profile: DeviceProfile,
    tiles: Vec<Vec<TileResource>>,
    catalog: RouteCatalog,
    backend: B,
    /// BD ids `move_data` allocated for a `(source, destination)` transfer
    /// that hasn't been drained by `route_dma_wait` yet (spec §4.5 steps
    /// 7-8: the poll and the free happen in `route_dma_wait`, but the ids
    /// to free come from the earlier `move_data` call).
    pending_bds: HashMap<(TileLocation, TileLocation), (u32, u32)>,
}

impl<B: Backend> RoutingInstance<B> {
    /// Builds the per-tile table from `profile` and takes ownership of `backend`.
    #[tracing::instrument(skip(backend))]
    pub fn init_routing(profile: DeviceProfile, backend: B) -> Result<Self> {
        if profile.num_cols == 0 || profile.num_rows == 0 {
            return Err(Error::InvalidArgument(
                "device profile must have at least one column and one row".into(),
            ));
        }
        let mut tiles = Vec::with_capacity(profile.num_cols as usize);
        for _col in 0..profile.num_cols {
            let mut column = Vec::with_capacity(profile.num_rows as usize);
            for row in 0..profile.num_rows {
                column.push(TileResource::new(profile.tile_kind(row)?));
            }
            tiles.push(column);
        }
        tracing::debug!(cols = profile.num_cols, rows = profile.num_rows, "routing instance initialized");
        Ok(Self { profile, tiles, catalog: RouteCatalog::new(), backend, pending_bds: HashMap::new() })
    }

    /// Releases the instance, handing the backend back to the caller.
    pub fn free_routing(self) -> B {
        tracing::debug!("routing instance freed");
        self.backend
    }

    /// Returns a mutable reference to the underlying backend.
    ///
    /// Routing itself never needs this — every hardware side effect goes
    /// through the methods above — but callers occasionally need backend
    /// access directly (seeding a simulator's memory before `move_data`,
    /// reading registers a diagnostic tool cares about that this crate
    /// doesn't surface).
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn check_bounds(&self, loc: TileLocation) -> Result<()> {
        if loc.col >= self.profile.num_cols || loc.row >= self.profile.num_rows {
            return Err(Error::InvalidArgument(format!("{loc} out of bounds")));
        }
        Ok(())
    }

    fn tile(&self, loc: TileLocation) -> &TileResource {
        &self.tiles[loc.col as usize][loc.row as usize]
    }

    fn tile_mut(&mut self, loc: TileLocation) -> &mut TileResource {
        &mut self.tiles[loc.col as usize][loc.row as usize]
    }

    /// Plans a path from `source` to `destination` and programs it (spec §4.4).
    pub fn route(
        &mut self,
        source: TileLocation,
        destination: TileLocation,
        constraints: &RouteConstraints,
    ) -> Result<()> {
        program::route(
            &mut self.tiles,
            &self.profile,
            &mut self.catalog,
            &mut self.backend,
            source,
            destination,
            constraints,
        )
    }

    /// Inverts a previously programmed route (spec §4.6).
    pub fn deroute(
        &mut self,
        source: TileLocation,
        destination: TileLocation,
        clear_execute_flag: bool,
    ) -> Result<()> {
        program::deroute(&mut self.tiles, &mut self.catalog, &mut self.backend, source, destination, clear_execute_flag)
    }

    /// Transfers `len` bytes from `src_buf` to `dst_buf` along a programmed
    /// route (spec §4.5).
    #[allow(clippy::too_many_arguments)]
    pub fn move_data(
        &mut self,
        source: TileLocation,
        src_buf: BufferHandle,
        len: usize,
        dst_buf: BufferHandle,
        destination: TileLocation,
    ) -> Result<()> {
        let bd_ids = mover::move_data(
            &mut self.tiles,
            &self.catalog,
            &mut self.backend,
            source,
            src_buf,
            len,
            dst_buf,
            destination,
        )?;
        self.pending_bds.insert((source, destination), bd_ids);
        Ok(())
    }

    /// Blocks until the destination endpoint of `(source, destination)`'s
    /// pending-BD count drains to zero, then frees both BDs `move_data`
    /// allocated back to C1 (spec §4.5 steps 7-8).
    ///
    /// `timeout = None` preserves the upstream contract of blocking
    /// forever (spec §9 open question 1); `Some(_)` bounds the wait.
    pub fn route_dma_wait(
        &mut self,
        source: TileLocation,
        destination: TileLocation,
        is_s2mm: bool,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let route = self
            .catalog
            .find(source, destination)
            .ok_or(Error::NoProgrammedRoute { source, destination })?
            .clone();
        let channel = mover::destination_channel(&self.tiles, &route);
        mover::route_dma_wait(&mut self.backend, destination, channel, is_s2mm, timeout)?;

        if let Some((src_bd_id, dst_bd_id)) = self.pending_bds.remove(&(source, destination)) {
            self.tile_mut(source).free_bd(src_bd_id);
            self.tile_mut(destination).free_bd(dst_bd_id);
        }
        Ok(())
    }

    /// Blocks until `tile`'s core reports idle.
    pub fn core_wait(&mut self, tile: TileLocation, timeout: Option<Duration>) -> Result<()> {
        self.check_bounds(tile)?;
        self.backend.core_wait_done(tile, timeout)?;
        Ok(())
    }

    /// Marks (or unmarks) `tile` to be enabled by a later [`Self::run`].
    pub fn set_core_execute(&mut self, tile: TileLocation, execute: bool) -> Result<()> {
        self.check_bounds(tile)?;
        let t = self.tile_mut(tile);
        if t.kind != TileKind::ComputeTile {
            return Err(Error::InvalidArgument(format!("{tile} is not a compute tile")));
        }
        t.is_executing = execute;
        Ok(())
    }

    /// Enables every tile marked by [`Self::set_core_execute`] `iterations`
    /// times each.
    ///
    /// The upstream driver re-enables the same cores back-to-back with no
    /// intervening wait or reset (spec §9 open question 4); that ambiguity
    /// is preserved here rather than guessed away — callers that need a
    /// core to finish before the next enable should interleave their own
    /// [`Self::core_wait`] calls.
    pub fn run(&mut self, iterations: u32) -> Result<()> {
        let mut marked = Vec::new();
        for (col, column) in self.tiles.iter().enumerate() {
            for (row, t) in column.iter().enumerate() {
                if t.kind == TileKind::ComputeTile && t.is_executing {
                    marked.push(TileLocation::new(col as u16, row as u16));
                }
            }
        }
        for loc in marked {
            for _ in 0..iterations {
                self.backend.core_enable(loc)?;
            }
        }
        Ok(())
    }

    /// Replaces the shim host-edge port/channel mapping on every
    /// [`TileKind::ShimInterface`] tile with `mapping`.
    pub fn configure_host_edge_constraints(&mut self, mapping: ShimPortChannelMapping) {
        for column in &mut self.tiles {
            for t in column.iter_mut() {
                if t.kind == TileKind::ShimInterface {
                    t.shim = Some(mapping.clone());
                }
            }
        }
    }

    /// Restores the default shim host-edge mapping on every shim tile.
    pub fn reset_host_edge_constraints(&mut self) {
        for column in &mut self.tiles {
            for t in column.iter_mut() {
                if t.kind == TileKind::ShimInterface {
                    t.shim = Some(ShimPortChannelMapping::default());
                }
            }
        }
    }

    /// Brute-force-disables every reserved switch combination on
    /// non-auto-configured tiles in `tile_list` (spec §4.6).
    pub fn reset_switches(&mut self, tile_list: &[TileLocation]) {
        program::reset_switches(&mut self.tiles, &mut self.backend, tile_list);
    }

    /// Renders a one-line-per-step description of the route from `source`
    /// to `destination` (spec §8 invariant 1). Diagnostic only, never
    /// load-bearing (spec §7).
    pub fn routes_reveal(&self, source: TileLocation, destination: TileLocation) -> Result<String> {
        let route = self
            .catalog
            .find(source, destination)
            .ok_or(Error::NoProgrammedRoute { source, destination })?;
        let mut out = format!("route {source} -> {destination} ({} steps):", route.steps.len());
        for step in &route.steps {
            out += &format!(
                "\n  {}: {:?}[{}] -> {:?}[{}]",
                step.tile, step.slave_direction, step.slave_port, step.master_direction, step.master_port
            );
            tracing::info!(
                tile = %step.tile,
                slave = ?step.slave_direction,
                slave_port = step.slave_port,
                master = ?step.master_direction,
                master_port = step.master_port,
                "routes_reveal step"
            );
        }
        Ok(out)
    }

    /// Renders the port/DMA/BD state of each tile in `tiles` (spec §4.6,
    /// "bring hardware into a known clean state" diagnostics). Never fails.
    pub fn dump_switch_info(&self, tiles: &[TileLocation]) -> String {
        let mut out = String::new();
        for &loc in tiles {
            if loc.col >= self.profile.num_cols || loc.row >= self.profile.num_rows {
                out += &format!("{loc}: out of bounds\n");
                continue;
            }
            let t = self.tile(loc);
            out += &format!(
                "{loc} [{:?}] auto_configured={} executing={} bd_free={:#x}\n",
                t.kind, t.is_auto_configured, t.is_executing, t.bd_free.0
            );
            for dir in crate::location::CardinalDirection::ENUMERATION_ORDER {
                out += &format!(
                    "    {:?}: slave={:#04x} master={:#04x}\n",
                    dir,
                    t.ports.slave(dir).0,
                    t.ports.master(dir).0
                );
            }
            tracing::info!(
                tile = %loc,
                kind = ?t.kind,
                auto_configured = t.is_auto_configured,
                executing = t.is_executing,
                bd_free = t.bd_free.0,
                "dump_switch_info tile"
            );
        }
        out
    }
}

/// Returns the first free port index shared between `a`'s master port
/// facing `dir` and `b`'s slave port facing the opposite direction.
///
/// Re-exported at module scope so downstream callers can probe
/// reachability without going through [`RoutingInstance`] — primarily
/// useful for the `demos/tileroute-sim` CLI.
pub fn first_free_between(a: &TileResource, dir: crate::location::CardinalDirection, b: &TileResource) -> Option<u8> {
    resource::first_free_paired(a, dir, b)
}
