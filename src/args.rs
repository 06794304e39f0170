use clap::{Parser, Subcommand};

/// This is a program to run and count council elections, in which each voter picks
/// the members of the council and designates the executive officers among them.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Counts the votes of a closed election.
    Tally {
        /// (file path) The file containing the election description, in JSON format.
        #[clap(short, long, value_parser)]
        config: String,

        /// (file path, 'stdout' or empty) If specified, the summary of the election will be written in JSON
        /// format to the given location.
        #[clap(short, long, value_parser)]
        out: Option<String>,

        /// (file path) A reference file containing the outcome of an election in JSON format. If provided,
        /// councilvote will check that the tabulated output matches the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Logs in as a demo voter and replays a sequence of clicks on the ballot.
    Replay {
        /// (file path) The file containing the election description, in JSON format.
        #[clap(short, long, value_parser)]
        config: String,

        /// (list of comma-separated candidate ids) The candidates clicked, in order.
        #[clap(long, value_parser, value_delimiter = ',')]
        clicks: Vec<u32>,

        /// If passed, the resulting selection is submitted as a vote.
        #[clap(long, takes_value = false)]
        submit: bool,
    },
    /// Opens a closed election, or closes an open one.
    ToggleStatus {
        /// (file path) The file containing the election description, in JSON format.
        #[clap(short, long, value_parser)]
        config: String,

        /// The administrator password.
        #[clap(short, long, value_parser)]
        password: String,
    },
    /// Exports the recorded votes.
    Export {
        /// (file path) The file containing the election description, in JSON format.
        #[clap(short, long, value_parser)]
        config: String,

        /// The administrator password.
        #[clap(short, long, value_parser)]
        password: String,

        /// (default csv) csv writes one row per ballot with the names of the candidates, json writes the
        /// votes as they are stored.
        #[clap(long, value_parser)]
        format: Option<String>,

        /// (file path, 'stdout' or empty) Where to write the export.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
}
