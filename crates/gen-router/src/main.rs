use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

mod chain_cmd;
mod cli;
mod config_cmds;
mod dispatch_cmd;

use cli::{Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (output to stderr, initialize only once)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let output_format = cli.format.clone();

    match cli.command {
        Commands::Chain { policy, cd } => chain_cmd::handle_chain(policy, cd, output_format),
        Commands::Dispatch {
            policy,
            shape,
            allow_extra,
            history,
            system,
            cd,
            input,
        } => {
            let args = dispatch_cmd::DispatchArgs {
                policy,
                shape,
                allow_extra,
                history,
                system,
                cd,
                input,
            };
            dispatch_cmd::handle_dispatch(args, output_format).await
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show { cd } => config_cmds::handle_config_show(cd, output_format),
            ConfigCommands::Validate { cd } => config_cmds::handle_config_validate(cd),
            ConfigCommands::Init { cd, force } => config_cmds::handle_config_init(cd, force),
        },
    }
}

pub(crate) fn determine_project_root(cd: Option<&str>) -> Result<PathBuf> {
    let path = if let Some(cd_path) = cd {
        PathBuf::from(cd_path)
    } else {
        std::env::current_dir()?
    };

    Ok(path.canonicalize()?)
}
