use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread::{spawn, JoinHandle};

use getopts::Options;
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use vehicle_link::document::LinkDocument;
use vehicle_link::telemetry_provider::TelemetryProvider;
use vehicle_link::transport::{ChannelTransport, OutboundMessage};
use vehicle_link::{LinkConfig, Snapshot, TelemetrySource, VehicleLink};


struct RunOptions {
    config: LinkConfig,
    document: Option<LinkDocument>,
    input: Option<String>,
}


fn main() {
    let options = match handle_opts() {
        Some(options) => options,
        None => return,
    };
    info!("Starting up");

    let (outbound_tx, outbound_rx) = channel::<OutboundMessage>();
    let outbound = spawn_outbound_logger(outbound_rx);

    let transport = Arc::new(ChannelTransport::new(outbound_tx));
    let mut link = match VehicleLink::connect(&options.config, transport, None) {
        Ok(link) => link,
        Err(e) => {
            error!("Unable to start vehicle link: {}", e);
            return;
        }
    };

    if let Some(document) = options.document.as_ref() {
        if let Err(e) = link.read(document) {
            error!("Unable to restore link document: {}", e);
        }
    }

    let reader: Box<dyn BufRead> = match options.input.as_deref() {
        None | Some("-") => Box::new(BufReader::new(io::stdin())),
        Some(path) => match File::open(path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                error!("Unable to open {}: {}", path, e);
                return;
            }
        },
    };

    let mut provider = TelemetryProvider::new(link.ingress());
    match provider.run(reader) {
        Ok(stats) => info!("Replayed {} messages, skipped {}", stats.delivered, stats.skipped),
        Err(e) => error!("Replay stopped: {}", e),
    }

    if let Err(e) = link.flush() {
        error!("Unable to flush link: {}", e);
    }
    for event in link.poll_events() {
        info!("Link event: {:?}", event);
    }
    log_snapshot(&link.snapshot());

    link.shutdown();
    drop(link);
    if outbound.join().is_err() {
        error!("Unable to join outbound thread, child thread panicked");
    }
    info!("Main thread shutting down");
}


fn spawn_outbound_logger(outbound_rx: std::sync::mpsc::Receiver<OutboundMessage>) -> JoinHandle<()> {
    spawn(move || {
        for message in outbound_rx {
            info!("Outbound: {:?}", message);
        }
    })
}


fn log_snapshot(snapshot: &Snapshot) {
    match snapshot.origin {
        Some(origin) => info!("Origin {}", origin),
        None => info!("No origin"),
    }
    for source in TelemetrySource::ALL {
        let channel = snapshot.channel(source);
        match (channel.location(), channel.local()) {
            (Some(location), Some(local)) => info!(
                "{:<9} {} ({:.1}, {:.1}) m, heading {:?}, {} fixes",
                source, location, local.x, local.y, channel.heading(), channel.history_len()),
            (Some(location), None) => info!("{:<9} {} (no local frame)", source, location),
            _ => info!("{:<9} no fix", source),
        }
    }
    for contact in &snapshot.contacts {
        info!("contact {} '{}' at {} heading {:.1}", contact.id, contact.name, contact.location, contact.heading);
    }
    info!("Link {}", if snapshot.connected() { "connected" } else { "disconnected" });
}


fn handle_opts() -> Option<RunOptions> {
    let mut opts = Options::new();
    opts.optflag("v", "verbose", "Prints extra logging.");
    opts.optflag("h", "help", "Print this help menu.");
    opts.optopt("c", "config", "Link configuration JSON file.", "FILE");
    opts.optopt("s", "saved", "Saved link document to restore.", "FILE");
    let args: Vec<String> = std::env::args().skip(1).collect();
    let matches = match opts.parse(&args) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Unable to parse options: {}", e);
            print_usage(&opts);
            return None;
        }
    };
    if matches.opt_present("h") {
        print_usage(&opts);
        return None;
    }

    let level = if matches.opt_present("v") {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
    if let Err(e) = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto) {
        eprintln!("Unable to initialize logger: {}", e);
        return None;
    }

    let config = match matches.opt_str("c") {
        Some(path) => match LinkConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("Unable to load config {}: {}", path, e);
                return None;
            }
        },
        None => LinkConfig::default(),
    };
    let document = match matches.opt_str("s") {
        Some(path) => match LinkDocument::load(&path) {
            Ok(document) => Some(document),
            Err(e) => {
                error!("Unable to load link document {}: {}", path, e);
                return None;
            }
        },
        None => None,
    };

    Some(RunOptions {
        config,
        document,
        input: matches.free.first().cloned(),
    })
}


fn print_usage(opts: &Options) {
    let brief = "Usage: vehicle-link [options] [REPLAY_FILE]";
    print!("{}", opts.usage(brief));
}
