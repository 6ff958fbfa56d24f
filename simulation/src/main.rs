//! meshroute - mesh packet routing simulator
//!
//! Thin command-line driver around the simulation library: load a mesh,
//! run the throughput scenario, inspect topology, or step through ticks
//! interactively.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use meshroute_logging::{LogConfig, MeshSubscriberBuilder};
use meshroute_simulation::{
    BuiltinMesh, FailureKind, Mesh, NodeId, SimConfig, ThroughputRun, TopologySpec,
};

#[derive(Parser)]
#[command(
    name = "meshroute",
    about = "Tick-based mesh routing simulator with local-only node knowledge",
    version
)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write JSONL logs into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the throughput scenario and print metrics
    Run {
        #[command(flatten)]
        source: MeshSource,

        /// Packets generated per origin node
        #[arg(short, long, default_value = "10")]
        packets: u64,

        /// Destination node (defaults to the built-in mesh's target)
        #[arg(short, long)]
        target: Option<String>,

        /// Node failure chance in percent
        #[arg(long)]
        node_fail: Option<u8>,

        /// Link failure chance in percent
        #[arg(long)]
        link_fail: Option<u8>,
    },

    /// Print the mesh, per-node path counts and unique links
    Topology {
        #[command(flatten)]
        source: MeshSource,
    },

    /// Step through the simulation from a line-oriented shell
    Interactive {
        #[command(flatten)]
        source: MeshSource,
    },
}

#[derive(Args)]
struct MeshSource {
    /// Built-in mesh: assignment, abridged, throughput or triangle
    #[arg(short, long, default_value = "throughput")]
    mesh: BuiltinMesh,

    /// Load the mesh from a JSON file instead of a built-in one
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Simulation config (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the failure RNG
    #[arg(short, long)]
    seed: Option<u64>,
}

impl MeshSource {
    fn load(&self) -> anyhow::Result<Mesh> {
        let spec = match &self.file {
            Some(path) => TopologySpec::from_path(path)
                .with_context(|| format!("loading topology from {}", path.display()))?,
            None => self.mesh.spec()?,
        };
        let mut config = match &self.config {
            Some(path) => SimConfig::from_path(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => SimConfig::default(),
        };
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }

        let mut mesh = Mesh::new(spec, config)?;
        mesh.generate_topology();
        Ok(mesh)
    }

    /// Target used by the throughput run when none is given
    fn default_target(&self) -> NodeId {
        match self.file {
            Some(_) => NodeId::from("2"),
            None => self.mesh.default_target(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::development()
    } else {
        LogConfig::interactive()
    };
    if let Some(dir) = &cli.log_dir {
        log_config = log_config.with_file(dir);
    }
    let _log_guard = MeshSubscriberBuilder::new()
        .with_config(log_config)
        .try_init()?;

    match cli.command {
        Commands::Run {
            source,
            packets,
            target,
            node_fail,
            link_fail,
        } => {
            let mut mesh = source.load()?;
            let target = target.map(NodeId::from).unwrap_or_else(|| source.default_target());
            let run = ThroughputRun::new(target)
                .with_packets(packets)
                .with_fail_chance(
                    FailureKind::Node,
                    node_fail.unwrap_or(mesh.fail_chance(FailureKind::Node)),
                )
                .with_fail_chance(
                    FailureKind::Link,
                    link_fail.unwrap_or(mesh.fail_chance(FailureKind::Link)),
                );

            let outcome = run.run(&mut mesh)?;
            if outcome.timed_out {
                println!("TIMEOUT!");
            }
            println!("{}", outcome.report);
        }
        Commands::Topology { source } => {
            let mesh = source.load()?;
            println!("{}", mesh.spec().visualize());
            for node in mesh.nodes() {
                println!("  Node {}: {} paths", node.id(), node.topology().len());
            }
            println!("The average topology size is: {}", mesh.average_topology_size());
            println!("Unique links: {}", mesh.get_links().len());
        }
        Commands::Interactive { source } => {
            let mesh = source.load()?;
            run_interactive(mesh)?;
        }
    }

    Ok(())
}

fn print_help() {
    println!("\nCommands:");
    println!("  send <from> <to> [data]   - Generate a data packet");
    println!("  step [n]                  - Run n ticks (default 1)");
    println!("  fail <node|link> [chance] - Roll one random failure (default 100%)");
    println!("  chance <node|link> <pct>  - Set the per-tick failure chance");
    println!("  node <id>                 - Toggle a node up or down");
    println!("  link <a> <b>              - Toggle a link");
    println!("  restore                   - Bring every node and link back up");
    println!("  status                    - Show status flags and this tick's events");
    println!("  buffers                   - Show every node's buffer");
    println!("  inspect <id>              - Show a node's links, buffer and path count");
    println!("  topology                  - Show the average topology size");
    println!("  metrics                   - Show accumulated metrics");
    println!("  quit                      - Exit");
    println!();
}

fn run_interactive(mut mesh: Mesh) -> anyhow::Result<()> {
    println!("{}", mesh.spec().visualize());
    print_help();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = parts.first() else {
            continue;
        };

        // Shell errors are reported and the loop carries on
        if let Err(err) = handle_command(&mut mesh, command, &parts[1..]) {
            println!("  Error: {err:#}");
        }
        if matches!(command, "quit" | "exit" | "q") {
            break;
        }
    }

    info!(tick = mesh.tick(), "Interactive session finished");
    Ok(())
}

fn handle_command(mesh: &mut Mesh, command: &str, args: &[&str]) -> anyhow::Result<()> {
    match command {
        "send" | "p" => {
            let [from, to, data @ ..] = args else {
                bail!("usage: send <from> <to> [data]");
            };
            let payload = (!data.is_empty()).then(|| data.join(" "));
            if mesh.generate_packet(&NodeId::from(*from), &NodeId::from(*to), payload)? {
                println!("  Queued packet {from} -> {to}");
            } else {
                println!("  Node {from} is down, packet lost");
            }
        }
        "step" | "n" => {
            let ticks: u64 = match args.first() {
                Some(n) => n.parse::<u64>().context("tick count must be an integer")?,
                None => 1,
            };
            mesh.run_ticks(ticks);
            println!("{}", mesh.status_summary());
        }
        "fail" | "r" => {
            let kind: FailureKind = args.first().copied().unwrap_or("node").parse()?;
            let chance: u8 = match args.get(1) {
                Some(pct) => pct.parse::<u8>().context("chance must be 0-100")?,
                None => 100,
            };
            if mesh.rand_fail(kind, chance, &[])? {
                println!("  Random {kind} failure toggled");
            } else {
                println!("  Nothing failed");
            }
        }
        "chance" | "c" => {
            let [kind, pct] = args else {
                bail!("usage: chance <node|link> <pct>");
            };
            let kind: FailureKind = kind.parse()?;
            mesh.set_fail_chance(kind, pct.parse::<u8>().context("chance must be 0-100")?)?;
            println!(
                "  Fail chances now node: {}, link: {}",
                mesh.fail_chance(FailureKind::Node),
                mesh.fail_chance(FailureKind::Link)
            );
        }
        "node" | "f" => {
            let [id] = args else {
                bail!("usage: node <id>");
            };
            let up = mesh.toggle_node(&NodeId::from(*id))?;
            println!("  Node {id} is now {}", if up { "up" } else { "down" });
        }
        "link" | "l" => {
            let [a, b] = args else {
                bail!("usage: link <a> <b>");
            };
            let up = mesh.toggle_link(&NodeId::from(*a), &NodeId::from(*b));
            println!("  Link ('{a}', '{b}') is now {}", if up { "up" } else { "down" });
        }
        "restore" | "t" => {
            mesh.restore();
            println!("  Restored all links and nodes");
        }
        "status" | "s" => println!("{}", mesh.status_summary()),
        "buffers" | "b" => {
            for node in mesh.nodes() {
                print_buffer(node);
            }
        }
        "inspect" | "i" => {
            let [id] = args else {
                bail!("usage: inspect <id>");
            };
            let id = NodeId::from(*id);
            let node = mesh
                .node(&id)
                .with_context(|| format!("node {id} not found"))?;
            println!("Node {} ({})", node.id(), if node.is_up() { "up" } else { "down" });
            println!("  Links: [{}]", meshroute_simulation::types::join_ids(node.links()));
            print_buffer(node);
            println!("  Topology: {} paths", node.topology().len());
            for path in node.topology().paths() {
                println!("    [{}]", meshroute_simulation::types::join_ids(path));
            }
        }
        "topology" | "a" => {
            println!("The average topology size is: {}", mesh.average_topology_size());
            println!("Unique links: {}", mesh.get_links().len());
        }
        "metrics" | "m" => println!("{}", mesh.report()),
        "help" | "h" | "?" => print_help(),
        "quit" | "exit" | "q" => println!("exiting..."),
        other => bail!("unknown command '{other}', try 'help'"),
    }
    Ok(())
}

fn print_buffer(node: &meshroute_simulation::Node) {
    if node.buffer().is_empty() {
        println!("Node {}: buffer empty", node.id());
        return;
    }
    println!("Node {} buffer:", node.id());
    for (index, packet) in node.buffer().iter().enumerate() {
        println!("    {index}-{packet}");
    }
}
