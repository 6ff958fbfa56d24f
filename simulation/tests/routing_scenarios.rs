//! End-to-end routing scenarios driven through the public mesh API

use meshroute_simulation::{
    BuiltinMesh, FailureKind, Mesh, NodeId, PacketKind, SimConfig, ThroughputRun, scenarios,
};

const TRIANGLE: &str = r#"{"0":["1","2"],"1":["0","2"],"2":["0","1"]}"#;

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

fn ids(list: &[&str]) -> Vec<NodeId> {
    list.iter().map(|s| id(s)).collect()
}

fn mesh_from(json: &str, config: SimConfig) -> Mesh {
    meshroute_logging::init_testing();
    let mut mesh = Mesh::from_json(json, config).unwrap();
    mesh.generate_topology();
    mesh
}

#[test]
fn test_triangle_round_trip_without_failures() {
    let mut mesh = mesh_from(TRIANGLE, SimConfig::default().with_seed(1));
    assert!(mesh.generate_packet(&id("0"), &id("2"), None).unwrap());
    assert_eq!(mesh.node(&id("0")).unwrap().buffer()[0].route, ids(&["0", "2"]));

    // Tick 1: straight across the direct link
    mesh.run();
    let arrived = &mesh.node(&id("2")).unwrap().buffer()[0];
    assert_eq!(arrived.path(), &[id("0"), id("2")]);
    assert!(mesh.node(&id("0")).unwrap().buffer().is_empty());

    // Tick 2: delivered, acknowledgement queued at the destination
    mesh.run();
    assert_eq!(mesh.metrics().hops, vec![1]);
    let ack = &mesh.node(&id("2")).unwrap().buffer()[0];
    assert_eq!(ack.kind, PacketKind::Ack);
    assert_eq!(ack.route, ids(&["2", "0"]));

    // Tick 3: the ack reaches 0, which already ran this tick
    mesh.run();
    let source = mesh.node(&id("0")).unwrap();
    assert_eq!(source.buffer()[0].kind, PacketKind::Ack);
    assert!(source.just_received());

    // Tick 4 only clears the deferral, tick 5 completes the round trip
    mesh.run();
    assert_eq!(mesh.metrics().round_trips, 0);
    assert!(!mesh.node(&id("0")).unwrap().just_received());
    mesh.run();
    assert_eq!(mesh.metrics().round_trips, 1);
    assert_eq!(mesh.metrics().errors, 0);
    assert_eq!(mesh.average_buffer(), None);
}

#[test]
fn test_triangle_reroutes_around_dead_link() {
    let mut mesh = mesh_from(TRIANGLE, SimConfig::default().with_seed(1));
    mesh.toggle_link(&id("0"), &id("2"));
    mesh.generate_packet(&id("0"), &id("2"), None).unwrap();

    mesh.run();
    assert_eq!(mesh.metrics().errors, 1);
    let relayed = &mesh.node(&id("1")).unwrap().buffer()[0];
    assert_eq!(relayed.route, ids(&["0", "1", "2"]));

    mesh.run_ticks(2);
    assert_eq!(mesh.metrics().hops, vec![2]);

    // The ack also tries the dead link first before going around
    mesh.run_ticks(5);
    assert_eq!(mesh.metrics().round_trips, 1);
    assert_eq!(mesh.metrics().errors, 2);
    assert_eq!(mesh.metrics().unreached, 0);
}

#[test]
fn test_isolated_node_drops_packet_as_unreachable() {
    let mut mesh = mesh_from(r#"{"0":[],"1":["2"],"2":["1"]}"#, SimConfig::default());
    assert!(mesh.node(&id("0")).unwrap().topology().is_empty());

    mesh.generate_packet(&id("0"), &id("1"), None).unwrap();
    assert!(mesh.node(&id("0")).unwrap().buffer()[0].route.is_empty());

    mesh.generate_packet(&id("1"), &id("2"), None).unwrap();
    mesh.run();

    assert_eq!(mesh.metrics().unreached, 1);
    assert_eq!(mesh.metrics().errors, 0);
    assert!(mesh.node(&id("0")).unwrap().buffer().is_empty());
    // The connected pair is unaffected
    assert_eq!(mesh.node(&id("2")).unwrap().buffer().len(), 1);
}

#[test]
fn test_packet_addressed_to_its_source() {
    let mut mesh = mesh_from(TRIANGLE, SimConfig::default());
    mesh.generate_packet(&id("1"), &id("1"), Some("loopback".into())).unwrap();
    assert_eq!(mesh.node(&id("1")).unwrap().buffer()[0].route, ids(&["1"]));

    mesh.run();
    assert_eq!(mesh.metrics().hops, vec![0]);
    mesh.run();
    assert_eq!(mesh.metrics().round_trips, 1);
}

#[test]
fn test_down_destination_never_receives() {
    let mut mesh = mesh_from(TRIANGLE, SimConfig::default());
    mesh.toggle_node(&id("2")).unwrap();
    mesh.generate_packet(&id("0"), &id("2"), None).unwrap();

    mesh.run();
    // Direct attempt fails, then the detour carries it to 1
    assert_eq!(mesh.metrics().errors, 1);
    assert_eq!(mesh.node(&id("1")).unwrap().buffer().len(), 1);

    // 1 fails against 2 and every other route retraces through 0
    mesh.run_ticks(2);
    assert!(mesh.metrics().errors >= 2);
    assert!(mesh.node(&id("2")).unwrap().buffer().is_empty());
}

#[test]
fn test_buffered_packets_sit_at_the_end_of_their_path() {
    let config = SimConfig::default()
        .with_seed(11)
        .with_fail_chance(FailureKind::Link, 40)
        .with_fail_chance(FailureKind::Node, 10);
    let mut mesh = Mesh::new(scenarios::throughput().unwrap(), config).unwrap();
    mesh.generate_topology();

    for round in 0..60 {
        if round < 10 {
            mesh.generate_packet(&id("0"), &id("11"), None).unwrap();
            mesh.generate_packet(&id("1"), &id("11"), None).unwrap();
        }
        mesh.run();

        for node in mesh.nodes() {
            for packet in node.buffer() {
                assert_eq!(packet.path().first(), Some(&packet.source));
                assert_eq!(packet.path().last(), Some(node.id()));
            }
        }
    }
    assert_eq!(mesh.metrics().invariant_violations, 0);
    assert!(mesh.metrics().round_trips as usize <= mesh.metrics().delivered());
}

#[test]
fn test_link_toggle_involution_and_restore() {
    let mut mesh = mesh_from(TRIANGLE, SimConfig::default());
    mesh.run();
    let tick = mesh.tick();

    mesh.toggle_link(&id("1"), &id("2"));
    mesh.toggle_link(&id("2"), &id("1"));
    assert!(mesh.link_status(&id("1"), &id("2")));

    mesh.toggle_link(&id("0"), &id("1"));
    mesh.toggle_node(&id("2")).unwrap();
    mesh.restore();
    assert_eq!(mesh.dead_links().count(), 0);
    assert!(mesh.nodes().all(|node| node.is_up()));
    assert_eq!(mesh.tick(), tick);
}

#[test]
fn test_assignment_mesh_throughput() {
    let mut mesh = Mesh::new(scenarios::assignment().unwrap(), SimConfig::default().with_seed(2)).unwrap();
    mesh.generate_topology();

    let outcome = ThroughputRun::for_builtin(BuiltinMesh::Assignment)
        .with_packets(2)
        .run(&mut mesh)
        .unwrap();

    assert!(!outcome.timed_out);
    assert_eq!(outcome.report.delivered, 4);
    assert_eq!(outcome.report.round_trips, 4);
    assert_eq!(outcome.report.unreached, 0);
    assert!(outcome.report.average_hops > 1.0);
    assert!(outcome.report.to_string().contains("Total received acknowledgements: 4"));
}

#[test]
fn test_throughput_with_failures_terminates() {
    let config = SimConfig {
        seed: Some(17),
        max_generation_rounds: 500,
        ..SimConfig::default()
    };
    let mut mesh = Mesh::new(scenarios::throughput().unwrap(), config).unwrap();
    mesh.generate_topology();

    let outcome = ThroughputRun::for_builtin(BuiltinMesh::Throughput)
        .with_packets(5)
        .with_fail_chance(FailureKind::Link, 20)
        .run(&mut mesh)
        .unwrap();

    assert!(outcome.rounds <= 501);
    assert_eq!(outcome.report.link_fail_chance, 20);
    assert!(outcome.report.delivered <= 10);
    assert_eq!(outcome.report.invariant_violations, 0);
}
