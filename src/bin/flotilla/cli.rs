//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Flotilla - module federation for independently built containers
#[derive(Parser)]
#[command(name = "flotilla")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to Flotilla.toml
    #[arg(long, global = true, env = "FLOTILLA_MANIFEST_PATH")]
    pub manifest_path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the module ids each container's build registers
    Build(BuildArgs),

    /// Show the shared scope a build root resolves to
    Resolve(ResolveArgs),

    /// Evaluate a request from a build root
    Import(ImportArgs),

    /// Describe the remote container graph
    Graph(GraphArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Output format for reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Containers to build (defaults to all)
    pub containers: Vec<String>,

    /// Output format (defaults to the configured one)
    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Build root
    pub root: String,

    /// Only show this shared key
    #[arg(long)]
    pub key: Option<String>,

    /// Output format (defaults to the configured one)
    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Build root
    pub root: String,

    /// Request to evaluate: `./path`, `remote/exposed` or a shared key
    pub specifier: String,

    /// Output format (defaults to the configured one)
    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

#[derive(Args)]
pub struct GraphArgs {
    /// Output format (defaults to the configured one)
    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve_with_globals() {
        let cli = Cli::try_parse_from([
            "flotilla",
            "resolve",
            "main",
            "--key",
            "shared",
            "--manifest-path",
            "demo/Flotilla.toml",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.manifest_path, Some(PathBuf::from("demo/Flotilla.toml")));
        match cli.command {
            Commands::Resolve(args) => {
                assert_eq!(args.root, "main");
                assert_eq!(args.key.as_deref(), Some("shared"));
                assert_eq!(args.format, None);
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_parse_import_json() {
        let cli = Cli::try_parse_from([
            "flotilla",
            "import",
            "main",
            "container-no-shared/a",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.specifier, "container-no-shared/a");
                assert_eq!(args.format, Some(Format::Json));
            }
            _ => panic!("expected import"),
        }
    }
}
