use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use habit_app::app::{self, AppConfig, OutputFormat, Session};
use habit_core::config::GlobalSettings;
use habit_core::notice::CollectingNoticeSink;
use habit_core::window::MAX_DAYS_TO_SHOW;
use tracing::Level;

#[derive(Parser)]
#[command(name = "habitgrid", version, about = "Habit tracking grid for a markdown vault")]
struct Cli {
    /// Vault root (defaults to $HABITGRID_VAULT or the working directory)
    #[arg(long, global = true)]
    vault: Option<PathBuf>,
    /// Global settings file (defaults to <vault>/.habitgrid/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Log more (-v info, including the `debug` option dump; -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct BlockArgs {
    /// JSON options for this grid, e.g. '{"path": "Habits", "daysToShow": 14}'
    #[arg(long = "config", short = 'c')]
    block: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the habit grid
    Show {
        #[command(flatten)]
        block: BlockArgs,
        /// Emit the grid model as JSON
        #[arg(long)]
        json: bool,
        /// Treat this date as today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,
    },
    /// Tick or untick one day of a habit
    Toggle {
        /// Habit document path relative to the vault
        habit: String,
        /// Day to toggle: YYYY-MM-DD, `today` or `yesterday`
        date: Option<String>,
        #[command(flatten)]
        block: BlockArgs,
    },
    /// Create a new habit document
    New {
        name: String,
        #[command(flatten)]
        block: BlockArgs,
    },
    /// Re-render the grid whenever a habit changes
    Watch {
        #[command(flatten)]
        block: BlockArgs,
        #[arg(long)]
        json: bool,
    },
    /// Global settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings
    Show,
    /// Change one or more settings
    Set {
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        days_to_show: Option<usize>,
        #[arg(long)]
        debug: Option<bool>,
        #[arg(long)]
        match_line_length: Option<bool>,
    },
    /// Restore the defaults
    Reset,
}

fn format(json: bool) -> OutputFormat {
    if json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env()?
        .with_vault(cli.vault)
        .with_settings_path(cli.settings);
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Show { block, json, today } => {
            let session = Session::open(&config, block.block.as_deref())?;
            let today = app::parse_date(today.as_deref())?;
            let result = app::show(&session, today, format(json), &mut out);
            session.flush_notices(&mut io::stderr())?;
            result
        }
        Commands::Toggle { habit, date, block } => {
            let session = Session::open(&config, block.block.as_deref())?;
            let date = app::parse_date(date.as_deref())?;
            let result = app::toggle(&session, &habit, date, habit_core::DateId::today(), &mut out);
            session.flush_notices(&mut io::stderr())?;
            result
        }
        Commands::New { name, block } => {
            let session = Session::open(&config, block.block.as_deref())?;
            let result = app::new_habit(&session, &name, &mut out);
            session.flush_notices(&mut io::stderr())?;
            result
        }
        Commands::Watch { block, json } => {
            let session = Session::open(&config, block.block.as_deref())?;
            app::watch(&session, format(json), &mut out)
        }
        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                let notices = CollectingNoticeSink::new();
                let settings = config.load_settings(&notices);
                app::print_notices(&notices, &mut io::stderr())?;
                println!("{}", settings.to_json());
                Ok(())
            }
            SettingsAction::Set {
                path,
                days_to_show,
                debug,
                match_line_length,
            } => {
                let notices = CollectingNoticeSink::new();
                let mut settings = config.load_settings(&notices);
                app::print_notices(&notices, &mut io::stderr())?;
                if let Some(path) = path {
                    settings.path = path;
                }
                if let Some(days) = days_to_show {
                    anyhow::ensure!(
                        (1..=MAX_DAYS_TO_SHOW).contains(&days),
                        "days-to-show must be between 1 and {MAX_DAYS_TO_SHOW}"
                    );
                    settings.days_to_show = days;
                }
                if let Some(debug) = debug {
                    settings.debug = debug;
                }
                if let Some(match_line_length) = match_line_length {
                    settings.match_line_length = match_line_length;
                }
                config.save_settings(&settings)?;
                println!("{}", settings.to_json());
                Ok(())
            }
            SettingsAction::Reset => {
                let settings = GlobalSettings::default();
                config.save_settings(&settings)?;
                println!("{}", settings.to_json());
                Ok(())
            }
        },
    }
}

fn main() {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
