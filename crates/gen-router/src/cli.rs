use clap::{Parser, Subcommand};
use gr_core::{OutputFormat, Policy};

#[derive(Parser)]
#[command(name = "gr")]
#[command(about = "Gen Router: resilient dispatch to generative backends")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the ordered endpoint chain for a policy
    Chain {
        /// Latency/quality tradeoff
        #[arg(long, value_enum, default_value = "quality-first")]
        policy: Policy,

        /// Project directory (defaults to CWD)
        #[arg(long)]
        cd: Option<String>,
    },

    /// Send one request through the endpoint chain
    Dispatch {
        #[arg(long, value_enum, default_value = "quality-first")]
        policy: Policy,

        /// Expected response shape, e.g. "reply:string,intent:string?"
        #[arg(long)]
        shape: String,

        /// Accept response fields not declared in --shape
        #[arg(long)]
        allow_extra: bool,

        /// JSON file with prior turns: [{"role":"user","content":"..."}]
        #[arg(long)]
        history: Option<String>,

        /// System instruction placed ahead of the conversation
        #[arg(long)]
        system: Option<String>,

        /// Project directory (defaults to CWD)
        #[arg(long)]
        cd: Option<String>,

        /// New user input; reads from stdin if omitted
        input: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show {
        #[arg(long)]
        cd: Option<String>,
    },
    /// Validate the effective configuration
    Validate {
        #[arg(long)]
        cd: Option<String>,
    },
    /// Write the default configuration to .gr/config.toml
    Init {
        #[arg(long)]
        cd: Option<String>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}
