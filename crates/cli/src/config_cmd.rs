use crate::config::LoadedConfig;
use crate::output::{OutputFormat, print_json};
use anyhow::Result;

/// Run the `config` command: print the effective configuration.
pub fn run(loaded: &LoadedConfig, format: OutputFormat) -> Result<()> {
    let source = loaded
        .source
        .as_ref()
        .map(|path| path.display().to_string());

    match format {
        OutputFormat::Json => print_json(
            "config",
            serde_json::json!({
                "source": source,
                "config": loaded.config,
            }),
        ),
        OutputFormat::Text => {
            match &source {
                Some(path) => println!("# loaded from {path}"),
                None => println!("# defaults (no config file)"),
            }
            print!("{}", toml::to_string_pretty(&loaded.config)?);
            Ok(())
        }
    }
}
