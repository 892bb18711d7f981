//! The path programmer (C4) and its inverse, teardown (C6).

use crate::backend::Backend;
use crate::catalog::{Route, RouteCatalog, RouteStep};
use crate::config::DeviceProfile;
use crate::error::{Error, Result};
use crate::location::{CardinalDirection, Direction, TileLocation, TileKind};
use crate::pathfind::{self, RouteConstraints};
use crate::resource::{self, PortSide, TileResource};

fn direction_between(a: TileLocation, b: TileLocation) -> CardinalDirection {
    if b.row > a.row {
        CardinalDirection::North
    } else if b.row < a.row {
        CardinalDirection::South
    } else if b.col > a.col {
        CardinalDirection::East
    } else {
        CardinalDirection::West
    }
}

/// A single resource grant made while programming a route, kept so a
/// failure partway through can release exactly what this call reserved
/// (spec §9 design note: "a correct implementation must scope reservations
/// to the full `route()` call").
enum Grant {
    Port { tile: TileLocation, side: PortSide, dir: CardinalDirection, bit: u8 },
    Mm2sChannel { tile: TileLocation, bit: u8 },
    S2mmChannel { tile: TileLocation, bit: u8 },
    ShimHostToArray { tile: TileLocation, port: u8 },
    ShimArrayToHost { tile: TileLocation, port: u8 },
}

fn tile_mut<'a>(tiles: &'a mut [Vec<TileResource>], loc: TileLocation) -> &'a mut TileResource {
    &mut tiles[loc.col as usize][loc.row as usize]
}

fn tile<'a>(tiles: &'a [Vec<TileResource>], loc: TileLocation) -> &'a TileResource {
    &tiles[loc.col as usize][loc.row as usize]
}

/// Binds the host/local-DMA ingress side of an endpoint tile. Returns
/// `(direction, port, channel)`.
fn bind_ingress(
    tiles: &mut [Vec<TileResource>],
    loc: TileLocation,
    grants: &mut Vec<Grant>,
) -> Result<(Direction, u8, u8)> {
    let t = tile_mut(tiles, loc);
    match t.kind {
        TileKind::ShimInterface => {
            let shim = t.shim.as_mut().expect("shim tile always carries a mapping");
            let (port, channel) = shim
                .first_free(true)
                .ok_or_else(|| Error::NoFreeDescriptor { tile: loc })?;
            shim.mark_used(true, port);
            grants.push(Grant::ShimHostToArray { tile: loc, port });
            Ok((Direction::South, port, channel))
        }
        TileKind::ComputeTile | TileKind::MemoryTile => {
            let bit = t
                .dma
                .mm2s_free
                .first_free()
                .ok_or_else(|| Error::NoFreeDescriptor { tile: loc })?;
            t.dma.mm2s_free.reserve(bit);
            grants.push(Grant::Mm2sChannel { tile: loc, bit });
            Ok((Direction::DmaLocal, bit, bit))
        }
    }
}

/// Binds the host/local-DMA egress side of an endpoint tile. Returns
/// `(direction, port, channel)`.
fn bind_egress(
    tiles: &mut [Vec<TileResource>],
    loc: TileLocation,
    grants: &mut Vec<Grant>,
) -> Result<(Direction, u8, u8)> {
    let t = tile_mut(tiles, loc);
    match t.kind {
        TileKind::ShimInterface => {
            let shim = t.shim.as_mut().expect("shim tile always carries a mapping");
            let (port, channel) = shim
                .first_free(false)
                .ok_or_else(|| Error::NoFreeDescriptor { tile: loc })?;
            shim.mark_used(false, port);
            grants.push(Grant::ShimArrayToHost { tile: loc, port });
            Ok((Direction::South, port, channel))
        }
        TileKind::ComputeTile | TileKind::MemoryTile => {
            let bit = t
                .dma
                .s2mm_free
                .first_free()
                .ok_or_else(|| Error::NoFreeDescriptor { tile: loc })?;
            t.dma.s2mm_free.reserve(bit);
            grants.push(Grant::S2mmChannel { tile: loc, bit });
            Ok((Direction::DmaLocal, bit, bit))
        }
    }
}

fn rollback(tiles: &mut [Vec<TileResource>], grants: Vec<Grant>) {
    for grant in grants.into_iter().rev() {
        match grant {
            Grant::Port { tile: loc, side, dir, bit } => {
                tile_mut(tiles, loc).release_port(side, dir, bit);
            }
            Grant::Mm2sChannel { tile: loc, bit } => {
                tile_mut(tiles, loc).dma.mm2s_free.release(bit);
            }
            Grant::S2mmChannel { tile: loc, bit } => {
                tile_mut(tiles, loc).dma.s2mm_free.release(bit);
            }
            Grant::ShimHostToArray { tile: loc, port } => {
                if let Some(shim) = tile_mut(tiles, loc).shim.as_mut() {
                    shim.mark_free(true, port);
                }
            }
            Grant::ShimArrayToHost { tile: loc, port } => {
                if let Some(shim) = tile_mut(tiles, loc).shim.as_mut() {
                    shim.mark_free(false, port);
                }
            }
        }
    }
}

fn disable_emitted<B: Backend>(backend: &mut B, steps: &[RouteStep], tiles: &[Vec<TileResource>]) {
    for step in steps.iter().rev() {
        if let Err(e) = backend.strm_switch_disable(
            step.tile,
            step.slave_direction,
            step.slave_port,
            step.master_direction,
            step.master_port,
        ) {
            tracing::warn!(tile = %step.tile, error = %e, "best-effort disable failed during rollback");
        }
        if tile(tiles, step.tile).kind == TileKind::ShimInterface {
            if step.slave_direction == Direction::South {
                let _ = backend.shim_dma_disable(step.tile, step.slave_port);
            }
            if step.master_direction == Direction::South {
                let _ = backend.shim_dma_disable(step.tile, step.master_port);
            }
        }
    }
}

/// Plans a path from `source` to `destination` and programs it onto the
/// fabric (spec §4.4). On success, the route is inserted into `catalog`.
#[tracing::instrument(skip(tiles, profile, catalog, backend, constraints))]
#[allow(clippy::too_many_arguments)]
pub fn route<B: Backend>(
    tiles: &mut [Vec<TileResource>],
    profile: &DeviceProfile,
    catalog: &mut RouteCatalog,
    backend: &mut B,
    source: TileLocation,
    destination: TileLocation,
    constraints: &RouteConstraints,
) -> Result<()> {
    if source.col >= profile.num_cols || source.row >= profile.num_rows {
        return Err(Error::InvalidArgument(format!("source {source} out of bounds")));
    }
    if destination.col >= profile.num_cols || destination.row >= profile.num_rows {
        return Err(Error::InvalidArgument(format!("destination {destination} out of bounds")));
    }
    if catalog.contains(source, destination) {
        return Err(Error::DuplicateRoute { source, destination });
    }

    let path = pathfind::find_path(
        tiles,
        profile.num_cols,
        profile.num_rows,
        source,
        destination,
        constraints,
    )?;

    let mut grants: Vec<Grant> = Vec::new();
    let mut steps: Vec<RouteStep> = Vec::with_capacity(path.len());
    let mut ingress_channel = 0u8;
    let mut egress_channel = 0u8;

    let last = path.len() - 1;
    let mut incoming: Option<(Direction, u8)> = None;

    for (i, &loc) in path.iter().enumerate() {
        let (slave_dir, slave_port) = if i == 0 {
            match bind_ingress(tiles, loc, &mut grants) {
                Ok((dir, port, _channel)) => {
                    // Recorded as the port, not the channel: for shim
                    // endpoints the channel is only resolvable by looking
                    // up this port in the host-edge mapping at move_data
                    // time (spec §4.5 step 4), and for compute/memory
                    // tiles port and channel are the same bit anyway.
                    ingress_channel = port;
                    (dir, port)
                }
                Err(e) => {
                    disable_emitted(backend, &steps, tiles);
                    rollback(tiles, grants);
                    return Err(e);
                }
            }
        } else {
            incoming.expect("incoming is set for every non-source tile")
        };

        let (master_dir, master_port) = if i == last {
            match bind_egress(tiles, loc, &mut grants) {
                Ok((dir, port, _channel)) => {
                    egress_channel = port;
                    (dir, port)
                }
                Err(e) => {
                    disable_emitted(backend, &steps, tiles);
                    rollback(tiles, grants);
                    return Err(e);
                }
            }
        } else {
            let next = path[i + 1];
            let dir = direction_between(loc, next);
            let port = match resource::first_free_paired(tile(tiles, loc), dir, tile(tiles, next)) {
                Some(p) => p,
                None => {
                    disable_emitted(backend, &steps, tiles);
                    rollback(tiles, grants);
                    return Err(Error::PortBusy {
                        tile: loc,
                        slave_dir: slave_dir,
                        master_dir: Direction::from(dir),
                    });
                }
            };
            tile_mut(tiles, loc).reserve_port(PortSide::Master, dir, port);
            grants.push(Grant::Port { tile: loc, side: PortSide::Master, dir, bit: port });
            tile_mut(tiles, next).reserve_port(PortSide::Slave, dir.opposite(), port);
            grants.push(Grant::Port { tile: next, side: PortSide::Slave, dir: dir.opposite(), bit: port });
            incoming = Some((Direction::from(dir.opposite()), port));
            (Direction::from(dir), port)
        };

        if let Err(e) =
            backend.strm_switch_enable(loc, slave_dir, slave_port, master_dir, master_port)
        {
            disable_emitted(backend, &steps, tiles);
            rollback(tiles, grants);
            return Err(e.into());
        }

        if tile(tiles, loc).kind == TileKind::ShimInterface {
            let shim_result = if slave_dir == Direction::South {
                backend.shim_dma_to_fabric_enable(loc, slave_port)
            } else if master_dir == Direction::South {
                backend.fabric_to_shim_dma_enable(loc, master_port)
            } else {
                Ok(())
            };
            if let Err(e) = shim_result {
                disable_emitted(backend, &steps, tiles);
                rollback(tiles, grants);
                return Err(e.into());
            }
        }

        tile_mut(tiles, loc).is_auto_configured = true;
        steps.push(RouteStep {
            tile: loc,
            slave_direction: slave_dir,
            slave_port,
            master_direction: master_dir,
            master_port,
        });
    }

    tracing::debug!(%source, %destination, steps = steps.len(), "route programmed");
    catalog.insert(Route {
        source,
        destination,
        ingress_mm2s_channel: ingress_channel,
        egress_s2mm_channel: egress_channel,
        steps,
    });
    Ok(())
}

/// Inverts [`route`]: disables every switch connection the route made and
/// returns its resources to the free pool (spec §4.6).
#[tracing::instrument(skip(tiles, catalog, backend))]
pub fn deroute<B: Backend>(
    tiles: &mut [Vec<TileResource>],
    catalog: &mut RouteCatalog,
    backend: &mut B,
    source: TileLocation,
    destination: TileLocation,
    clear_execute_flag: bool,
) -> Result<()> {
    let route = catalog
        .remove(source, destination)
        .ok_or(Error::NoProgrammedRoute { source, destination })?;

    for step in route.steps.iter().rev() {
        backend.strm_switch_disable(
            step.tile,
            step.slave_direction,
            step.slave_port,
            step.master_direction,
            step.master_port,
        )?;

        let kind = tile(tiles, step.tile).kind;
        if kind == TileKind::ShimInterface {
            if step.slave_direction == Direction::South {
                backend.shim_dma_disable(step.tile, step.slave_port)?;
            }
            if step.master_direction == Direction::South {
                backend.shim_dma_disable(step.tile, step.master_port)?;
            }
        }

        let t = tile_mut(tiles, step.tile);
        match step.slave_direction {
            Direction::DmaLocal => t.dma.mm2s_free.release(step.slave_port),
            Direction::South if kind == TileKind::ShimInterface => {
                t.shim.as_mut().unwrap().mark_free(true, step.slave_port);
            }
            cardinal => {
                if let Ok(d) = cardinal_of(cardinal) {
                    t.release_port(PortSide::Slave, d, step.slave_port);
                }
            }
        }
        match step.master_direction {
            Direction::DmaLocal => t.dma.s2mm_free.release(step.master_port),
            Direction::South if kind == TileKind::ShimInterface => {
                t.shim.as_mut().unwrap().mark_free(false, step.master_port);
            }
            cardinal => {
                if let Ok(d) = cardinal_of(cardinal) {
                    t.release_port(PortSide::Master, d, step.master_port);
                }
            }
        }

        if clear_execute_flag && kind == TileKind::ComputeTile && (step.tile == source || step.tile == destination) {
            t.is_executing = false;
        }
    }

    tracing::debug!(%source, %destination, "route torn down");
    Ok(())
}

fn cardinal_of(d: Direction) -> std::result::Result<CardinalDirection, ()> {
    match d {
        Direction::North => Ok(CardinalDirection::North),
        Direction::South => Ok(CardinalDirection::South),
        Direction::East => Ok(CardinalDirection::East),
        Direction::West => Ok(CardinalDirection::West),
        Direction::DmaLocal => Err(()),
    }
}

/// Brute-force-disables every reserved port combination on each tile in
/// `tile_list` that is **not** `is_auto_configured`, without consulting the
/// catalog (spec §4.6). Used to bring hardware into a known clean state at
/// test/session shutdown.
///
/// Invalid `(slave_dir, master_dir)` combinations are silently skipped; per
/// spec §9 open question 2, whether the backend itself rejects or
/// tolerates such combinations is left to the backend.
pub fn reset_switches<B: Backend>(tiles: &mut [Vec<TileResource>], backend: &mut B, tile_list: &[TileLocation]) {
    for &loc in tile_list {
        if tile(tiles, loc).is_auto_configured {
            continue;
        }
        let dirs = CardinalDirection::ENUMERATION_ORDER;
        for &slave_dir in &dirs {
            for &master_dir in &dirs {
                let t = tile(tiles, loc);
                let slave_mask = *t.ports.slave(slave_dir);
                let master_mask = *t.ports.master(master_dir);
                for slave_port in 0..8 {
                    if slave_mask.is_free(slave_port) {
                        continue;
                    }
                    for master_port in 0..8 {
                        if master_mask.is_free(master_port) {
                            continue;
                        }
                        let _ = backend.strm_switch_disable(
                            loc,
                            Direction::from(slave_dir),
                            slave_port,
                            Direction::from(master_dir),
                            master_port,
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sim::SimBackend;
    use crate::config::DeviceProfile;

    fn grid(profile: &DeviceProfile) -> Vec<Vec<TileResource>> {
        (0..profile.num_cols)
            .map(|_| (0..profile.num_rows).map(|row| TileResource::new(profile.tile_kind(row).unwrap())).collect())
            .collect()
    }

    #[test]
    fn deroute_clears_is_executing_only_on_endpoints() {
        let profile = DeviceProfile::reference_5x6();
        let mut tiles = grid(&profile);
        let mut catalog = RouteCatalog::new();
        let mut backend = SimBackend::new();
        let source = TileLocation::new(2, 3);
        let hop = TileLocation::new(3, 3);
        let destination = TileLocation::new(4, 3);

        route(&mut tiles, &profile, &mut catalog, &mut backend, source, destination, &RouteConstraints::default())
            .unwrap();

        tile_mut(&mut tiles, source).is_executing = true;
        tile_mut(&mut tiles, hop).is_executing = true;
        tile_mut(&mut tiles, destination).is_executing = true;

        deroute(&mut tiles, &mut catalog, &mut backend, source, destination, true).unwrap();

        assert!(!tile(&tiles, source).is_executing, "source endpoint flag should clear");
        assert!(!tile(&tiles, destination).is_executing, "destination endpoint flag should clear");
        assert!(tile(&tiles, hop).is_executing, "intermediate hop flag must survive an unrelated deroute");
    }
}
