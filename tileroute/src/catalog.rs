//! The route catalog (C2): the set of currently-programmed routes.

use crate::location::{Direction, TileLocation};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single tile-local stream-switch connection on a programmed route.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouteStep {
    pub tile: TileLocation,
    pub slave_direction: Direction,
    pub slave_port: u8,
    pub master_direction: Direction,
    pub master_port: u8,
}

/// A fully-programmed route from `source` to `destination` (spec §3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub source: TileLocation,
    pub destination: TileLocation,
    pub ingress_mm2s_channel: u8,
    pub egress_s2mm_channel: u8,
    pub steps: Vec<RouteStep>,
}

/// Ordered collection of currently-programmed routes, keyed by source tile
/// (spec §3.1, §4.2).
///
/// Modeled as a vector-of-routes per source rather than the original
/// driver's singly linked list of singly linked lists (spec §9 design
/// note): the `TileResource` refers back into this catalog by
/// `(source, destination)` lookup, so no intrusive pointers are needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteCatalog {
    by_source: IndexMap<TileLocation, Vec<Route>>,
}

impl RouteCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends `route` to its source tile's list.
    pub fn insert(&mut self, route: Route) {
        self.by_source.entry(route.source).or_default().insert(0, route);
    }

    /// Looks up the route from `source` to `destination`, if programmed.
    pub fn find(&self, source: TileLocation, destination: TileLocation) -> Option<&Route> {
        self.by_source
            .get(&source)?
            .iter()
            .find(|r| r.destination == destination)
    }

    /// Returns `true` if a route from `source` to `destination` is already programmed.
    pub fn contains(&self, source: TileLocation, destination: TileLocation) -> bool {
        self.find(source, destination).is_some()
    }

    /// Removes and returns the route from `source` to `destination`, if present.
    pub fn remove(&mut self, source: TileLocation, destination: TileLocation) -> Option<Route> {
        let routes = self.by_source.get_mut(&source)?;
        let idx = routes.iter().position(|r| r.destination == destination)?;
        Some(routes.remove(idx))
    }

    /// Iterates over every route originating at `source`.
    pub fn routes_from(&self, source: TileLocation) -> impl Iterator<Item = &Route> {
        self.by_source.get(&source).into_iter().flatten()
    }

    /// Iterates over every programmed route in the catalog.
    pub fn all(&self) -> impl Iterator<Item = &Route> {
        self.by_source.values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(src: TileLocation, dst: TileLocation) -> Route {
        Route {
            source: src,
            destination: dst,
            ingress_mm2s_channel: 0,
            egress_s2mm_channel: 0,
            steps: vec![],
        }
    }

    #[test]
    fn insert_find_remove_roundtrip() {
        let mut cat = RouteCatalog::new();
        let a = TileLocation::new(2, 3);
        let b = TileLocation::new(4, 3);
        assert!(cat.find(a, b).is_none());
        cat.insert(route(a, b));
        assert!(cat.contains(a, b));
        let removed = cat.remove(a, b).unwrap();
        assert_eq!(removed.source, a);
        assert!(cat.find(a, b).is_none());
    }

    #[test]
    fn distinct_destinations_from_same_source_coexist() {
        let mut cat = RouteCatalog::new();
        let a = TileLocation::new(2, 3);
        let b = TileLocation::new(3, 3);
        let c = TileLocation::new(4, 3);
        cat.insert(route(a, b));
        cat.insert(route(a, c));
        assert_eq!(cat.routes_from(a).count(), 2);
    }
}
