use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate every video in the library that has no French subtitle
    Run {
        /// Library folder to scan (repeatable, overrides the configured folders)
        #[arg(short, long = "folder")]
        folders: Vec<PathBuf>,

        /// Scan once and exit instead of watching; stops when credentials run out
        #[arg(long)]
        once: bool,
    },

    /// Translate a single subtitle file
    Translate {
        /// English subtitle (srt, ass, ssa or vtt)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file [default: <input base>.fr.srt]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a configuration file with default values
    InitConfig {
        #[arg(short, long, default_value = "subtrad.toml")]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_folders() {
        let args = Args::parse_from(["subtrad", "-v", "run", "--folder", "/films", "--folder", "/series", "--once"]);
        assert!(args.verbose);
        match args.command {
            Commands::Run { folders, once } => {
                assert_eq!(folders, vec![PathBuf::from("/films"), PathBuf::from("/series")]);
                assert!(once);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_translate_and_init_config() {
        let args = Args::parse_from(["subtrad", "-c", "my.toml", "translate", "-i", "movie.en.srt"]);
        assert_eq!(args.config, Some(PathBuf::from("my.toml")));
        assert!(matches!(args.command, Commands::Translate { output: None, .. }));

        let args = Args::parse_from(["subtrad", "init-config"]);
        match args.command {
            Commands::InitConfig { output } => assert_eq!(output, PathBuf::from("subtrad.toml")),
            _ => panic!("expected init-config"),
        }
    }
}
