pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tripdesk_core::config::{ConfigOverrides, LlmProvider, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "tripdesk",
    about = "Travel desk assistant: flights and hotels over a chat loop",
    long_about = "Chat with the travel desk agents, or operate its checkpoint store and configuration.",
    after_help = "Examples:\n  tripdesk chat\n  tripdesk chat --thread 6f1c…\n  tripdesk doctor --json\n  tripdesk threads --limit 5"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Read configuration from this TOML file (must exist)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "Override logging.level")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Override llm.provider (heuristic|openai|anthropic|ollama)")]
    llm_provider: Option<LlmProvider>,
    #[arg(long, global = true, help = "Override llm.model")]
    llm_model: Option<String>,
    #[arg(long, global = true, help = "Override search.max_retries")]
    search_max_retries: Option<u32>,
}

impl GlobalArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                log_level: self.log_level.clone(),
                llm_provider: self.llm_provider,
                llm_model: self.llm_model.clone(),
                search_api_key: None,
                search_max_retries: self.search_max_retries,
            },
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start (or resume) a conversation on stdin/stdout")]
    Chat {
        #[arg(long, help = "Resume the checkpointed thread with this id")]
        thread: Option<String>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, search credentials, reasoning setup and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "List the most recently updated conversation threads")]
    Threads {
        #[arg(long, default_value_t = 10, help = "Maximum number of threads to list")]
        limit: u32,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.global.load_options();

    let result = match cli.command {
        Command::Chat { thread } => commands::chat::run(options, thread),
        Command::Migrate => commands::migrate::run(options),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(options, json) }
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(options) }
        }
        Command::Threads { limit } => commands::threads::run(options, limit),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
