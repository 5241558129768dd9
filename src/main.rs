use clap::{ArgAction, Parser};
use hostprint::fingerprint::{load_fingerprints, load_packet_records, FingerprintProcessor, PacketReport};
use hostprint::import::cisco::{CiscoReader, CommandRegistry, SplitterOptions};
use hostprint::ui::output;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// hostprint classifies hosts from packet records and imports Cisco device dumps
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cisco terminal dump to import, may be repeated
    #[arg(short = 'c', long, value_parser)]
    cisco: Vec<PathBuf>,

    /// Fingerprint rule document (JSON)
    #[arg(short = 'r', long, value_parser)]
    rules: Option<PathBuf>,

    /// Packet records to classify (JSON array), requires --rules
    #[arg(short = 'p', long, value_parser, requires = "rules")]
    packets: Option<PathBuf>,

    /// Directory to write results and keep split command sections
    #[arg(short = 'o', long, value_parser)]
    output_dir: Option<PathBuf>,

    /// Display output as formatted JSON
    #[arg(short = 'j', long, action = ArgAction::SetTrue)]
    json: bool,

    /// Print the trait tree of each imported device
    #[arg(short = 't', long, action = ArgAction::SetTrue)]
    tree: bool,
}

fn main() -> ExitCode {
    if let Err(err) = simple_logger::init_with_env() {
        eprintln!("Logger setup failed: {err}");
    }

    let args = Args::parse();

    let out = match args.output_dir.as_deref() {
        Some(out_dir) => {
            log::info!("Output directory {}", out_dir.display());
            if let Err(err) = fs::create_dir_all(out_dir) {
                log::error!("Cannot create {}: {err}", out_dir.display());
                return ExitCode::FAILURE;
            }
            Some(out_dir)
        }
        None => {
            log::warn!("No output directory specified.");
            None
        }
    };

    if args.cisco.is_empty() && args.packets.is_none() {
        log::error!("Nothing to do, pass --cisco and/or --packets.");
        return ExitCode::FAILURE;
    }

    if !args.cisco.is_empty() && !import_devices(&args, out) {
        return ExitCode::FAILURE;
    }

    if let (Some(rules), Some(packets)) = (args.rules.as_deref(), args.packets.as_deref()) {
        if !classify_packets(rules, packets, &args, out) {
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn import_devices(args: &Args, out: Option<&Path>) -> bool {
    let registry = CommandRegistry::cisco();
    let options = SplitterOptions {
        output_dir: out.map(|dir| dir.join("sections")),
        keep_files: out.is_some(),
        ..Default::default()
    };
    if let Some(dir) = options.output_dir.as_deref() {
        if let Err(err) = fs::create_dir_all(dir) {
            log::error!("Cannot create {}: {err}", dir.display());
            return false;
        }
    }

    let reader = CiscoReader::with_options(&registry, options);
    let nodes = reader.import_all(&args.cisco);
    if nodes.is_empty() {
        log::error!("No device could be imported.");
        return false;
    }

    let mut trees = Vec::with_capacity(nodes.len());
    for node in &nodes {
        match node.to_trait_map() {
            Ok(tree) => {
                tree.check();
                trees.push(tree);
            }
            Err(err) => log::error!("Cannot build tree for {}: {err}", node.name),
        }
    }

    if args.json {
        let json = if args.tree {
            output::data_as_json(&trees)
        } else {
            output::data_as_json(&nodes)
        };
        match json {
            Ok(json) => emit(json, out, "devices.json"),
            Err(err) => log::error!("JSON serialization failed: {err}"),
        }
    } else {
        output::print_devices(&nodes);
        if args.tree {
            for (node, tree) in nodes.iter().zip(&trees) {
                output::print_tree(&node.name, tree);
            }
        }
    }
    true
}

fn classify_packets(rules: &Path, packets: &Path, args: &Args, out: Option<&Path>) -> bool {
    let processor = match load_fingerprints(rules).and_then(|fingerprints| FingerprintProcessor::new(&fingerprints)) {
        Ok(processor) => processor,
        Err(err) => {
            log::error!("Cannot load rules from {}: {err}", rules.display());
            return false;
        }
    };
    let records = match load_packet_records(packets) {
        Ok(records) => records,
        Err(err) => {
            log::error!("Cannot load packets from {}: {err}", packets.display());
            return false;
        }
    };

    let reports: Vec<PacketReport> = records
        .iter()
        .filter_map(|record| match processor.process_record(record) {
            Ok(report) => Some(report),
            Err(err) => {
                log::warn!("Skipping frame {}: {err}", record.frame);
                None
            }
        })
        .collect();

    if args.json {
        match output::data_as_json(&reports) {
            Ok(json) => emit(json, out, "fingerprints.json"),
            Err(err) => log::error!("JSON serialization failed: {err}"),
        }
    } else {
        output::print_reports(&reports);
    }
    true
}

/// Writes to `out/name` when an output directory is set, else to stdout.
fn emit(json: String, out: Option<&Path>, name: &str) {
    match out {
        Some(dir) => {
            if let Err(err) = output::data_to_file(json, &dir.join(name)) {
                log::error!("Cannot write {name}: {err}");
            }
        }
        None => println!("{json}"),
    }
}
