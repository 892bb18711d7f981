//! Compile-time resource planning and runtime programming for a
//! spatial-dataflow accelerator's stream-switch fabric.
//!
//! Given a logical "route a stream from tile S to tile D" request, this
//! crate finds a path through the grid that respects per-tile port
//! availability and caller-supplied blacklist/whitelist constraints,
//! reserves the ports and buffer descriptors the path consumes, programs
//! the stream switches and (for shim endpoints) the host-DMA bridges, and
//! supports symmetric teardown plus one-shot data movement along a
//! programmed route.
//!
//! The entry point is [`instance::RoutingInstance`]. Hardware access is
//! abstracted behind [`backend::Backend`]; this crate never talks to
//! registers directly.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod instance;
pub mod location;
pub mod mask;
pub mod mover;
pub mod pathfind;
pub mod program;
pub mod resource;

pub use backend::{Backend, BackendError, BufferHandle};
pub use catalog::{Route, RouteCatalog, RouteStep};
pub use config::{DeviceProfile, RowBand};
pub use error::{Error, Result};
pub use instance::RoutingInstance;
pub use location::{CardinalDirection, Direction, TileKind, TileLocation};
pub use pathfind::RouteConstraints;
pub use resource::{ShimPortChannelMapping, TileResource};
