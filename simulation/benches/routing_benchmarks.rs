//! Routing performance benchmarks
//!
//! Benchmarks for the expensive parts of the simulator:
//! - Simple-path enumeration (grows combinatorially with connectivity)
//! - Route selection against a full path set
//! - Whole-mesh ticks under load
//!
//! Run with: cargo bench -p meshroute-simulation

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use meshroute_simulation::{
    AvoidanceMemory, BuiltinMesh, Mesh, NodeId, Packet, PacketKind, PathSet, SimConfig,
    ThroughputRun, TopologySpec, select_route,
};

/// Fully linked mesh of `n` nodes; path counts explode quickly
fn full_mesh(n: usize) -> TopologySpec {
    let names: Vec<String> = (0..n).map(|i| i.to_string()).collect();
    let mut edges = Vec::new();
    for a in 0..n {
        for b in (a + 1)..n {
            edges.push((names[a].as_str(), names[b].as_str()));
        }
    }
    TopologySpec::from_edges(&edges).unwrap()
}

fn bench_enumeration(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumeration");

    for builtin in BuiltinMesh::ALL {
        let spec = builtin.spec().unwrap();
        group.bench_with_input(
            BenchmarkId::new("builtin", builtin),
            &spec,
            |b, spec| {
                b.iter(|| {
                    for id in spec.node_ids() {
                        black_box(PathSet::enumerate(id, spec, None));
                    }
                })
            },
        );
    }

    for n in [4, 5, 6, 7] {
        let spec = full_mesh(n);
        let origin = NodeId::from("0");
        group.bench_with_input(BenchmarkId::new("full_mesh", n), &spec, |b, spec| {
            b.iter(|| black_box(PathSet::enumerate(&origin, spec, None)))
        });
    }

    group.finish();
}

fn bench_route_selection(c: &mut Criterion) {
    let spec = BuiltinMesh::Assignment.spec().unwrap();
    let origin = NodeId::from("0");
    let paths = PathSet::enumerate(&origin, &spec, None);
    let avoid = AvoidanceMemory::new();

    let mut packet = Packet::new(PacketKind::Data, origin.clone(), NodeId::from("12"), None);
    packet.route = select_route(&origin, &paths, &avoid, &packet);

    c.bench_function("select_route_assignment_0_to_12", |b| {
        b.iter(|| black_box(select_route(&origin, &paths, &avoid, black_box(&packet))))
    });
}

fn bench_throughput_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput_run");
    group.sample_size(20);

    for builtin in [BuiltinMesh::Abridged, BuiltinMesh::Throughput] {
        group.bench_function(BenchmarkId::from_parameter(builtin), |b| {
            b.iter(|| {
                let mut mesh =
                    Mesh::new(builtin.spec().unwrap(), SimConfig::default().with_seed(1)).unwrap();
                mesh.generate_topology();
                let outcome = ThroughputRun::for_builtin(builtin)
                    .with_packets(10)
                    .run(&mut mesh)
                    .unwrap();
                black_box(outcome)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_enumeration,
    bench_route_selection,
    bench_throughput_run
);
criterion_main!(benches);
