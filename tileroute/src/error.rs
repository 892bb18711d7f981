//! Error types for the routing core.

use crate::location::TileLocation;

/// A result type returning [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for all `tileroute` public entry points.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A tile coordinate, handle, or tile-kind precondition was invalid for
    /// the requested operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The path finder exhausted its search without finding a
    /// constraint-satisfying path.
    #[error("no path from {source} to {destination} satisfies the given constraints")]
    NoPath {
        source: TileLocation,
        destination: TileLocation,
    },

    /// The path programmer could not thread a common port index across a
    /// junction despite the finder's optimistic edge check.
    #[error("no free port to thread the route through {tile} ({slave_dir:?} -> {master_dir:?})")]
    PortBusy {
        tile: TileLocation,
        slave_dir: crate::location::Direction,
        master_dir: crate::location::Direction,
    },

    /// A route already exists for this `(source, destination)` pair.
    #[error("a route from {source} to {destination} is already programmed")]
    DuplicateRoute {
        source: TileLocation,
        destination: TileLocation,
    },

    /// `move_data` was called with no matching catalog entry.
    #[error("no programmed route from {source} to {destination}")]
    NoProgrammedRoute {
        source: TileLocation,
        destination: TileLocation,
    },

    /// A buffer-descriptor pool was exhausted.
    #[error("no free buffer descriptor on tile {tile}")]
    NoFreeDescriptor { tile: TileLocation },

    /// The register-level I/O backend reported a failure.
    #[error("backend error: {0}")]
    BackendError(#[from] crate::backend::BackendError),
}
