use anyhow::Result;
use clap::Parser;
use hfwmm::cleanup;
use hfwmm::commands::{self, Config};
use hfwmm::config::LayoutOverrides;
use hfwmm::packaging::ProcessPackTool;
use hfwmm::staging::{CollisionPolicy, SortOrder};
use std::path::PathBuf;

/// hfwmm - Horizon Forbidden West mod manager
///
/// Keeps track of mod packages dropped into the game's mods folder, checks
/// them for conflicting files and packs the enabled ones with the external
/// packaging tool.
///
/// Examples:
///   hfwmm init "C:\Games\Horizon Forbidden West"
///   hfwmm scan
///   hfwmm pack "Cool Outfit" "Armor/Red"
#[derive(Parser, Debug)]
#[command(author, version = env!("HFWMM_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Game directory (overrides settings; also via HFWMM_GAME)
    #[arg(long = "game", short = 'g', env = "HFWMM_GAME", value_name = "PATH", global = true)]
    game_dir: Option<PathBuf>,

    /// Work directory for scratch, backups and the registry (also via HFWMM_WORK_DIR)
    #[arg(long = "work-dir", env = "HFWMM_WORK_DIR", value_name = "PATH", global = true)]
    work_dir: Option<PathBuf>,

    /// Settings file (defaults to <config dir>/hfwmm/settings.json; also via HFWMM_CONFIG)
    #[arg(long = "config", env = "HFWMM_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Set the game folder and back up the original files
    Init(InitArgs),

    /// Copy mod folders or archives into the mods folder
    Import(ImportArgs),

    /// Scan the mods folder, update the registry and list packages
    #[command(alias = "list")]
    Scan,

    /// Show packages that ship the same file names
    Conflicts(ConflictsArgs),

    /// Stage the selected packages and run the packaging tool
    Pack(PackArgs),

    /// Restore the original game files and remove packed archives
    Restore(RestoreArgs),

    /// Set a package's priority (0 highest, 5 lowest)
    Priority(PriorityArgs),
}

#[derive(clap::Args, Debug)]
struct InitArgs {
    /// The game installation folder
    #[arg(value_name = "GAME_DIR")]
    game_dir: PathBuf,

    /// Path to the packaging tool (defaults to <work dir>/Decima_pack.exe)
    #[arg(long, value_name = "PATH")]
    tool: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ImportArgs {
    /// Folders or archives (.zip, .tar.gz, .tgz) to copy
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ConflictsArgs {
    /// Selections to check (Key, Key/Variant, Key/*); all packages if omitted
    #[arg(value_name = "SELECTION")]
    selections: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct PackArgs {
    /// Selections in processing order (Key, Key/Variant, Key/*)
    #[arg(value_name = "SELECTION")]
    selections: Vec<String>,

    /// Pack every package (all variants of packages that have them)
    #[arg(long, conflicts_with = "selections")]
    all: bool,

    /// Reorder selections by priority before staging
    #[arg(long, value_enum, value_name = "ORDER")]
    order: Option<OrderArg>,

    /// Which copy wins when two packages ship the same file
    #[arg(long, value_enum, value_name = "POLICY")]
    collision: Option<CollisionArg>,
}

#[derive(clap::Args, Debug)]
struct RestoreArgs {
    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(clap::Args, Debug)]
struct PriorityArgs {
    /// Package name
    #[arg(value_name = "PACKAGE")]
    package: String,

    /// Integer from 0 (highest) to 5 (lowest)
    #[arg(value_name = "PRIORITY")]
    value: String,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OrderArg {
    /// Priority 0 first
    Asc,
    /// Priority 5 first
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Asc => SortOrder::Ascending,
            OrderArg::Desc => SortOrder::Descending,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CollisionArg {
    /// The file processed last wins
    Last,
    /// The package with the lowest priority number wins
    Priority,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(arg: CollisionArg) -> Self {
        match arg {
            CollisionArg::Last => CollisionPolicy::LastProcessed,
            CollisionArg::Priority => CollisionPolicy::HighestPriority,
        }
    }
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level(cli.verbose)))
        .init();

    let runtime = hfwmm::runtime::RealRuntime;
    let cleanup_ctx = cleanup::new_shared();
    let overrides = LayoutOverrides {
        game_dir: cli.game_dir,
        work_dir: cli.work_dir,
    };
    let config = Config::load(runtime, cli.config, overrides, cleanup_ctx.clone())?;

    let cleanup_on_interrupt = cleanup_ctx.clone();
    let ctrl_c_handler = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cleaning up...");
            cleanup::lock(&cleanup_on_interrupt).cleanup();
            std::process::exit(130); // Standard exit code for Ctrl-C
        }
    });

    let result = match cli.command {
        Commands::Init(args) => commands::init(config, args.game_dir, args.tool),
        Commands::Import(args) => commands::import(config, args.paths),
        Commands::Scan => commands::scan(config),
        Commands::Conflicts(args) => commands::conflicts(config, args.selections),
        Commands::Pack(args) => {
            commands::pack(
                config,
                &ProcessPackTool,
                args.selections,
                args.all,
                args.order.map(SortOrder::from).unwrap_or_default(),
                args.collision.map(CollisionPolicy::from),
            )
            .await
        }
        Commands::Restore(args) => commands::restore(config, args.yes),
        Commands::Priority(args) => commands::priority(config, &args.package, &args.value),
    };

    ctrl_c_handler.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_init_parsing() {
        let cli = Cli::try_parse_from(["hfwmm", "init", "/games/hfw", "--tool", "/t/pack.exe"])
            .unwrap();
        match cli.command {
            Commands::Init(args) => {
                assert_eq!(args.game_dir, PathBuf::from("/games/hfw"));
                assert_eq!(args.tool, Some(PathBuf::from("/t/pack.exe")));
            }
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn test_cli_list_alias() {
        let cli = Cli::try_parse_from(["hfwmm", "list"]).unwrap();
        assert!(matches!(cli.command, Commands::Scan));
    }

    #[test]
    fn test_cli_pack_parsing() {
        let cli = Cli::try_parse_from([
            "hfwmm",
            "pack",
            "Outfit/Red",
            "Hair",
            "--order",
            "desc",
            "--collision",
            "priority",
        ])
        .unwrap();
        match cli.command {
            Commands::Pack(args) => {
                assert_eq!(args.selections, vec!["Outfit/Red", "Hair"]);
                assert!(!args.all);
                assert_eq!(args.order, Some(OrderArg::Desc));
                assert_eq!(
                    args.collision.map(CollisionPolicy::from),
                    Some(CollisionPolicy::HighestPriority)
                );
            }
            _ => panic!("Expected Pack command"),
        }
    }

    #[test]
    fn test_cli_pack_all_conflicts_with_selections() {
        assert!(Cli::try_parse_from(["hfwmm", "pack", "--all", "Hair"]).is_err());
        assert!(Cli::try_parse_from(["hfwmm", "pack", "--all"]).is_ok());
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "hfwmm",
            "--game",
            "/g",
            "scan",
            "--work-dir",
            "/w",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.game_dir, Some(PathBuf::from("/g")));
        assert_eq!(cli.work_dir, Some(PathBuf::from("/w")));
        assert_eq!(cli.verbose, 2);
        assert_eq!(log_level(cli.verbose), "debug");
    }

    #[test]
    fn test_cli_priority_and_restore() {
        let cli = Cli::try_parse_from(["hfwmm", "priority", "Hair", "2"]).unwrap();
        match cli.command {
            Commands::Priority(args) => {
                assert_eq!(args.package, "Hair");
                assert_eq!(args.value, "2");
            }
            _ => panic!("Expected Priority command"),
        }
        let cli = Cli::try_parse_from(["hfwmm", "restore", "-y"]).unwrap();
        assert!(matches!(cli.command, Commands::Restore(RestoreArgs { yes: true })));
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["hfwmm"]).is_err());
    }
}
