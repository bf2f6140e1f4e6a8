use anyhow::{Result, bail};

use gr_config::{RouterConfig, validate_config};
use gr_core::OutputFormat;

pub(crate) fn handle_config_show(cd: Option<String>, format: OutputFormat) -> Result<()> {
    let project_root = crate::determine_project_root(cd.as_deref())?;
    let config = RouterConfig::load_or_default(&project_root)?;

    match format {
        OutputFormat::Json => {
            let json_str = serde_json::to_string_pretty(&config)?;
            println!("{}", json_str);
        }
        OutputFormat::Text => {
            let toml_str = toml::to_string_pretty(&config)?;
            print!("{}", toml_str);
        }
    }
    Ok(())
}

pub(crate) fn handle_config_validate(cd: Option<String>) -> Result<()> {
    let project_root = crate::determine_project_root(cd.as_deref())?;
    validate_config(&project_root)?;
    eprintln!("Configuration is valid.");
    Ok(())
}

pub(crate) fn handle_config_init(cd: Option<String>, force: bool) -> Result<()> {
    let project_root = crate::determine_project_root(cd.as_deref())?;
    let config_path = RouterConfig::config_path(&project_root);
    if config_path.exists() && !force {
        bail!(
            "Configuration already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    RouterConfig::default().save(&project_root)?;
    eprintln!("Initialized configuration at: {}", config_path.display());
    eprintln!("  Set the API key variables listed under [[credentials]] before dispatching.");
    Ok(())
}
