use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::Shell;
use gridform_io::Rating;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a source dataset directory into a CSV import folder
    Convert {
        /// Source dataset directory (holds bus.csv, branch.csv, gen.csv,
        /// timeseries_pointers.csv)
        #[arg(value_hint = ValueHint::DirPath)]
        source_dir: PathBuf,
        /// Output folder for the converted tables
        #[arg(short, long)]
        out: PathBuf,
        /// Number of hourly snapshots to keep (default: the whole year)
        #[arg(long)]
        snapshots: Option<usize>,
        /// First snapshot to keep, as an offset into the year
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Mark thermal units committable for unit-commitment studies
        #[arg(long)]
        unit_commitment: bool,
        /// Which branch thermal rating becomes s_nom
        #[arg(long, value_enum, default_value_t = RatingArg::Cont)]
        rating: RatingArg,
        /// Branch UID to leave out of the output (repeatable)
        #[arg(long = "skip-branch", value_name = "UID")]
        skip_branch: Vec<String>,
        /// Write the static tables only, skipping time-series reconstruction
        #[arg(long)]
        no_series: bool,
    },
    /// Summarize a source dataset directory without converting it
    Inspect {
        /// Source dataset directory
        #[arg(value_hint = ValueHint::DirPath)]
        source_dir: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a converted folder for consistency problems
    Validate {
        /// Converted CSV folder
        #[arg(value_hint = ValueHint::DirPath)]
        folder: PathBuf,
        /// Print findings as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum RatingArg {
    /// Continuous rating
    Cont,
    /// Long-term emergency rating
    Lte,
    /// Short-term emergency rating
    Ste,
}

impl From<RatingArg> for Rating {
    fn from(arg: RatingArg) -> Self {
        match arg {
            RatingArg::Cont => Rating::Cont,
            RatingArg::Lte => Rating::Lte,
            RatingArg::Ste => Rating::Ste,
        }
    }
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_convert() {
        let cli = Cli::try_parse_from([
            "gridform",
            "convert",
            "SourceData",
            "--out",
            "pypsa",
            "--snapshots",
            "24",
            "--unit-commitment",
            "--rating",
            "lte",
            "--skip-branch",
            "C35",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Convert {
                snapshots,
                unit_commitment,
                rating,
                skip_branch,
                no_series,
                ..
            }) => {
                assert_eq!(snapshots, Some(24));
                assert!(unit_commitment);
                assert!(matches!(rating, RatingArg::Lte));
                assert_eq!(skip_branch, vec!["C35"]);
                assert!(!no_series);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_command_builds() {
        build_cli_command().debug_assert();
    }
}
