//! The constrained path finder (C3): breadth-first search over the tile
//! grid, gated by paired port availability, blacklist and whitelist.

use crate::error::{Error, Result};
use crate::location::{CardinalDirection, TileLocation};
use crate::resource::TileResource;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Optional per-call routing constraints (spec §3.1).
#[derive(Debug, Clone, Default)]
pub struct RouteConstraints {
    /// Tiles the finder must never traverse.
    pub blacklist: FxHashSet<TileLocation>,
    /// If non-empty, every tile on the returned path must be in this set.
    ///
    /// This is the "every tile on the path is whitelisted" contract (spec
    /// §4.3), not "every whitelisted tile must appear on the path" — the
    /// two read similarly but are not the same constraint.
    pub whitelist: FxHashSet<TileLocation>,
}

impl RouteConstraints {
    fn path_is_whitelist_compatible(&self, path: &[TileLocation]) -> bool {
        self.whitelist.is_empty() || path.iter().all(|t| self.whitelist.contains(t))
    }
}

/// Returns `true` if there exists at least one port index free on both
/// `cur`'s master port facing `dir` and `nbr`'s slave port facing the
/// opposite direction.
///
/// This is the finder's *optimistic* edge check (spec §4.3 step 4): it
/// answers "can some wire carry this hop", not "which wire". The path
/// programmer (`crate::program`) reuses the same [`crate::resource::first_free_paired`]
/// routine to actually thread a concrete index, so the two never drift
/// apart (spec §9 design note).
fn edge_traversable(cur: &TileResource, nbr: &TileResource, dir: CardinalDirection) -> bool {
    crate::resource::first_free_paired(cur, dir, nbr).is_some()
}

/// Runs the constrained BFS described in spec §4.3 and returns the tile
/// sequence from `source` to `destination`, inclusive of both endpoints.
///
/// `source == destination` yields a single-element path (zero hops; spec
/// §4.3 edge case).
pub fn find_path(
    tiles: &[Vec<TileResource>],
    num_cols: u16,
    num_rows: u16,
    source: TileLocation,
    destination: TileLocation,
    constraints: &RouteConstraints,
) -> Result<Vec<TileLocation>> {
    if source == destination {
        return Ok(vec![source]);
    }

    let mut visited: FxHashSet<TileLocation> = FxHashSet::default();
    let mut parent: FxHashMap<TileLocation, TileLocation> = FxHashMap::default();
    let mut queue: VecDeque<TileLocation> = VecDeque::new();

    visited.insert(source);
    queue.push_back(source);

    while let Some(cur) = queue.pop_front() {
        if cur == destination {
            let path = reconstruct(&parent, source, destination);
            if constraints.path_is_whitelist_compatible(&path) {
                tracing::debug!(%source, %destination, hops = path.len() - 1, "path found");
                return Ok(path);
            }
            // Not whitelist-compatible: keep searching rather than
            // returning this particular discovery (spec §4.3).
            continue;
        }

        let cur_res = &tiles[cur.col as usize][cur.row as usize];
        for dir in CardinalDirection::ENUMERATION_ORDER {
            let Some(nbr) = cur.neighbor(dir, num_cols, num_rows) else {
                continue;
            };
            if constraints.blacklist.contains(&nbr) || visited.contains(&nbr) {
                continue;
            }
            let nbr_res = &tiles[nbr.col as usize][nbr.row as usize];
            if !edge_traversable(cur_res, nbr_res, dir) {
                continue;
            }
            visited.insert(nbr);
            parent.insert(nbr, cur);
            queue.push_back(nbr);
        }
    }

    tracing::warn!(%source, %destination, "no path satisfies constraints");
    Err(Error::NoPath { source, destination })
}

fn reconstruct(
    parent: &FxHashMap<TileLocation, TileLocation>,
    source: TileLocation,
    destination: TileLocation,
) -> Vec<TileLocation> {
    let mut path = vec![destination];
    let mut cur = destination;
    while cur != source {
        cur = parent[&cur];
        path.push(cur);
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceProfile;

    fn build_grid(profile: &DeviceProfile) -> Vec<Vec<TileResource>> {
        (0..profile.num_cols)
            .map(|col| {
                (0..profile.num_rows)
                    .map(|row| TileResource::new(profile.tile_kind(row).unwrap()))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn same_source_and_destination_is_zero_hop() {
        let profile = DeviceProfile::reference_5x6();
        let tiles = build_grid(&profile);
        let t = TileLocation::new(2, 3);
        let path = find_path(
            &tiles,
            profile.num_cols,
            profile.num_rows,
            t,
            t,
            &RouteConstraints::default(),
        )
        .unwrap();
        assert_eq!(path, vec![t]);
    }

    #[test]
    fn finds_shortest_direct_hop_between_compute_tiles() {
        let profile = DeviceProfile::reference_5x6();
        let tiles = build_grid(&profile);
        let src = TileLocation::new(2, 3);
        let dst = TileLocation::new(4, 3);
        let path = find_path(
            &tiles,
            profile.num_cols,
            profile.num_rows,
            src,
            dst,
            &RouteConstraints::default(),
        )
        .unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.first(), Some(&src));
        assert_eq!(path.last(), Some(&dst));
    }

    #[test]
    fn blacklist_forces_detour() {
        let profile = DeviceProfile::reference_5x6();
        let tiles = build_grid(&profile);
        let src = TileLocation::new(2, 3);
        let dst = TileLocation::new(4, 3);
        let mut constraints = RouteConstraints::default();
        constraints.blacklist.insert(TileLocation::new(3, 3));
        let path = find_path(&tiles, profile.num_cols, profile.num_rows, src, dst, &constraints)
            .unwrap();
        assert!(!path.contains(&TileLocation::new(3, 3)));
    }

    #[test]
    fn whitelist_that_excludes_every_path_yields_no_path() {
        let profile = DeviceProfile::reference_5x6();
        let tiles = build_grid(&profile);
        let src = TileLocation::new(2, 3);
        let dst = TileLocation::new(4, 3);
        let mut constraints = RouteConstraints::default();
        // Only whitelists the endpoints; any hop needs an intermediate tile.
        constraints.whitelist.insert(src);
        constraints.whitelist.insert(dst);
        let err = find_path(&tiles, profile.num_cols, profile.num_rows, src, dst, &constraints)
            .unwrap_err();
        assert!(matches!(err, Error::NoPath { .. }));
    }

    #[test]
    fn blacklisting_an_entire_column_severs_all_paths() {
        let profile = DeviceProfile::reference_5x6();
        let tiles = build_grid(&profile);
        let src = TileLocation::new(2, 3);
        let dst = TileLocation::new(4, 3);
        let mut constraints = RouteConstraints::default();
        for row in 0..profile.num_rows {
            constraints.blacklist.insert(TileLocation::new(3, row));
        }
        let err = find_path(&tiles, profile.num_cols, profile.num_rows, src, dst, &constraints)
            .unwrap_err();
        assert!(matches!(err, Error::NoPath { .. }));
    }
}
