mod args;
mod election;

use clap::Parser;
use log::{debug, warn};

use crate::args::{Args, Command};
use crate::election::*;

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
    debug!("args: {:?}", args);

    let res = match args.command {
        Command::Tally {
            config,
            out,
            reference,
        } => run_tally(&config, out, reference),
        Command::Replay {
            config,
            clicks,
            submit,
        } => run_replay(&config, &clicks, submit).map(|_| ()),
        Command::ToggleStatus { config, password } => {
            run_toggle_status(&config, &password).map(|_| ())
        }
        Command::Export {
            config,
            password,
            format,
            out,
        } => run_export(&config, &password, format, out),
    };

    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        std::process::exit(1);
    }
}
