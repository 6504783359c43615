//! Command-line interface

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// PRICAT feed to Elena import converter
#[derive(Parser, Debug)]
#[command(name = "pricat-import")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug logging to the console
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert one supplier feed and hand it to Elena
    Run(RunArgs),

    /// Create or refresh suppliers from the feed files on the source FTP
    Sync {
        /// Remote directory, relative to the source base path
        #[arg(long, default_value = "")]
        remote_dir: String,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the files on the source FTP
    ListRemote {
        #[arg(long, default_value = "")]
        remote_dir: String,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Supplier number; picks the newest matching feed on the source FTP
    #[arg(short, long, conflicts_with_all = ["remote_file", "local_file"])]
    pub supplier: Option<String>,

    /// Feed path on the source FTP
    #[arg(long, conflicts_with = "local_file")]
    pub remote_file: Option<String>,

    /// Feed already on disk
    #[arg(long)]
    pub local_file: Option<PathBuf>,

    #[arg(long)]
    pub no_images: bool,

    #[arg(long)]
    pub no_report: bool,

    #[arg(long)]
    pub no_upload: bool,

    #[arg(long)]
    pub no_trigger: bool,

    /// Keep master data in memory instead of the database
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run record as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "pricat-import",
            "run",
            "--local-file",
            "feed.csv",
            "--no-upload",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.local_file, Some(PathBuf::from("feed.csv")));
                assert!(args.no_upload);
                assert!(args.dry_run);
                assert!(!args.no_images);
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_sources_conflict() {
        let result = Cli::try_parse_from([
            "pricat-import",
            "run",
            "--local-file",
            "feed.csv",
            "--remote-file",
            "feed.csv",
        ]);
        assert!(result.is_err());
    }
}
