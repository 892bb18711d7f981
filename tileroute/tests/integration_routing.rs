//! End-to-end scenarios over the in-memory simulator backend (spec §8).

use tileroute::backend::sim::SimBackend;
use tileroute::config::RowBand;
use tileroute::{BufferHandle, DeviceProfile, RouteConstraints, RoutingInstance, TileLocation};

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 37 + 11) % 256) as u8).collect()
}

#[test_log::test]
fn compute_to_compute_direct() {
    let mut ri = RoutingInstance::init_routing(DeviceProfile::reference_5x6(), SimBackend::new()).unwrap();
    let source = TileLocation::new(2, 3);
    let destination = TileLocation::new(4, 3);

    ri.route(source, destination, &RouteConstraints::default()).unwrap();

    let data = payload(128);
    let backend_handle = 0x2000u64;
    write_raw(&mut ri, backend_handle, data.clone());

    ri.move_data(
        source,
        BufferHandle::Raw(backend_handle),
        data.len(),
        BufferHandle::Raw(backend_handle),
        destination,
    )
    .unwrap();
    ri.route_dma_wait(source, destination, true, None).unwrap();

    assert_eq!(read_raw(&mut ri, backend_handle, data.len()), data);
}

#[test_log::test]
fn compute_to_compute_hop() {
    let mut ri = RoutingInstance::init_routing(DeviceProfile::reference_5x6(), SimBackend::new()).unwrap();
    let a = TileLocation::new(2, 3);
    let b = TileLocation::new(3, 3);
    let c = TileLocation::new(4, 3);
    let data = payload(128);

    write_raw(&mut ri, 0x2000, data.clone());
    ri.route(a, b, &RouteConstraints::default()).unwrap();
    ri.move_data(a, BufferHandle::Raw(0x2000), data.len(), BufferHandle::Raw(0x3000), b)
        .unwrap();
    ri.route_dma_wait(a, b, true, None).unwrap();

    ri.route(b, c, &RouteConstraints::default()).unwrap();
    ri.move_data(b, BufferHandle::Raw(0x3000), data.len(), BufferHandle::Raw(0x4000), c)
        .unwrap();
    ri.route_dma_wait(b, c, true, None).unwrap();

    assert_eq!(read_raw(&mut ri, 0x4000, data.len()), data);
}

#[test_log::test]
fn loopback_round_trip() {
    let mut ri = RoutingInstance::init_routing(DeviceProfile::reference_5x6(), SimBackend::new()).unwrap();
    let a = TileLocation::new(2, 3);
    let b = TileLocation::new(3, 3);
    let data = payload(128);

    write_raw(&mut ri, 0x2000, data.clone());
    ri.route(a, b, &RouteConstraints::default()).unwrap();
    ri.move_data(a, BufferHandle::Raw(0x2000), data.len(), BufferHandle::Raw(0x2000), b)
        .unwrap();
    ri.route_dma_wait(a, b, true, None).unwrap();

    ri.route(b, a, &RouteConstraints::default()).unwrap();
    ri.move_data(b, BufferHandle::Raw(0x2000), data.len(), BufferHandle::Raw(0x1000), a)
        .unwrap();
    ri.route_dma_wait(b, a, true, None).unwrap();

    assert_eq!(read_raw(&mut ri, 0x1000, data.len()), data);
}

#[test_log::test]
fn shim_to_compute() {
    let mut ri = RoutingInstance::init_routing(DeviceProfile::reference_5x6(), SimBackend::new()).unwrap();
    let source = TileLocation::new(2, 0);
    let destination = TileLocation::new(4, 4);
    let data = payload(128);

    write_raw(&mut ri, 0x9000, data.clone());
    ri.route(source, destination, &RouteConstraints::default()).unwrap();
    ri.move_data(source, BufferHandle::Raw(0x9000), data.len(), BufferHandle::Raw(0x2000), destination)
        .unwrap();
    ri.route_dma_wait(source, destination, true, None).unwrap();

    assert_eq!(read_raw(&mut ri, 0x2000, data.len()), data);
}

#[test_log::test]
fn compute_to_shim() {
    let profile = DeviceProfile {
        num_cols: 36,
        num_rows: 6,
        shim_row: 0,
        memory_row_band: RowBand { start: 1, end: 1 },
        compute_row_band: RowBand { start: 2, end: 4 },
    };
    let mut ri = RoutingInstance::init_routing(profile, SimBackend::new()).unwrap();
    let source = TileLocation::new(4, 4);
    let destination = TileLocation::new(35, 0);
    let data = payload(128);

    write_raw(&mut ri, 0x2000, data.clone());
    ri.route(source, destination, &RouteConstraints::default()).unwrap();
    ri.move_data(source, BufferHandle::Raw(0x2000), data.len(), BufferHandle::Raw(0x9000), destination)
        .unwrap();
    ri.route_dma_wait(source, destination, true, None).unwrap();

    assert_eq!(read_raw(&mut ri, 0x9000, data.len()), data);
}

#[test_log::test]
fn blacklist_enforcement_avoids_tile_or_fails() {
    let mut ri = RoutingInstance::init_routing(DeviceProfile::reference_5x6(), SimBackend::new()).unwrap();
    let source = TileLocation::new(2, 3);
    let destination = TileLocation::new(4, 3);
    let mut constraints = RouteConstraints::default();
    constraints.blacklist.insert(TileLocation::new(3, 3));

    match ri.route(source, destination, &constraints) {
        Ok(()) => {
            let revealed = ri.routes_reveal(source, destination).unwrap();
            assert!(!revealed.contains("(3, 3)"));
        }
        Err(tileroute::Error::NoPath { .. }) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test_log::test]
fn repeated_transfers_do_not_leak_buffer_descriptors() {
    let mut ri = RoutingInstance::init_routing(DeviceProfile::reference_5x6(), SimBackend::new()).unwrap();
    let source = TileLocation::new(2, 3);
    let destination = TileLocation::new(4, 3);
    let data = payload(64);

    ri.route(source, destination, &RouteConstraints::default()).unwrap();
    write_raw(&mut ri, 0x2000, data.clone());

    // A compute tile has 16 BD slots (spec §4.1). Running more transfers
    // than that through the same route would exhaust the pool if
    // `route_dma_wait` failed to free the BDs it polled on (spec §4.5 step 8).
    for _ in 0..32 {
        ri.move_data(source, BufferHandle::Raw(0x2000), data.len(), BufferHandle::Raw(0x3000), destination)
            .unwrap();
        ri.route_dma_wait(source, destination, true, None).unwrap();
    }

    assert_eq!(read_raw(&mut ri, 0x3000, data.len()), data);
}

#[test_log::test]
fn route_then_deroute_restores_duplicate_route_ability() {
    let mut ri = RoutingInstance::init_routing(DeviceProfile::reference_5x6(), SimBackend::new()).unwrap();
    let source = TileLocation::new(2, 3);
    let destination = TileLocation::new(4, 3);

    ri.route(source, destination, &RouteConstraints::default()).unwrap();
    assert!(matches!(
        ri.route(source, destination, &RouteConstraints::default()),
        Err(tileroute::Error::DuplicateRoute { .. })
    ));

    ri.deroute(source, destination, true).unwrap();
    ri.route(source, destination, &RouteConstraints::default()).unwrap();
}

/// Seeds `addr` in the simulator's memory ahead of a `move_data` call.
fn write_raw(ri: &mut RoutingInstance<SimBackend>, addr: u64, data: Vec<u8>) {
    ri.backend_mut().write_region(addr, data);
}

/// Reads back `len` bytes written by a `move_data` call.
fn read_raw(ri: &mut RoutingInstance<SimBackend>, addr: u64, len: usize) -> Vec<u8> {
    ri.backend_mut().read_region(addr, 0, len)
}
