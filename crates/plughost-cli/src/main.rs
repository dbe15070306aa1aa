mod builtin;
mod repl;

use clap::{Parser, Subcommand};

use plughost_plugin_sdk::HookName;

#[derive(Parser)]
#[command(name = "plughost", about = "Plugin host for a terminal chat client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session with plugins loaded
    Repl {
        /// Built-in plugin to load in addition to the configured autoload list
        #[arg(short, long)]
        plugin: Vec<String>,

        /// Address plain-text messages are sent to
        #[arg(short, long, default_value = "buddy@example.org")]
        recipient: String,
    },
    /// List every hook a plugin can implement
    Hooks,
    /// List built-in plugins
    Plugins,
    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Repl { plugin, recipient } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(repl::run_repl(plugin, recipient))?;
        }
        Commands::Hooks => {
            for hook in HookName::ALL {
                println!("{:<30} {:?}", hook.as_str(), hook.kind());
            }
        }
        Commands::Plugins => {
            for name in builtin::NAMES {
                println!("{name}");
            }
        }
        Commands::Config => {
            let config = plughost_config::load_config().unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
