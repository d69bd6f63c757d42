use args::parse_args;
use logger::init_logger;
use pullhook::{config::ProcessConfig, start::start};
use std::process;

mod args;
mod logger;

fn main() {
    let args = parse_args();

    if args.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    if let Err(err) = init_logger(&args) {
        eprintln!("{err}");
        process::exit(1);
    }

    // Setup configuration.
    let Some(path) = args.config else {
        eprintln!("You have to pass a configuration file with -c.");
        process::exit(1);
    };
    let config = match ProcessConfig::load(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    // Start the server.
    if let Err(err) = start(config) {
        eprintln!("{err}");
        process::exit(1);
    }
}
