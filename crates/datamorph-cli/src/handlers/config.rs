//! Settings command handlers

use crate::cli::{ConfigAction, ConfigArgs, ConfigFormat, ConfigInitArgs, ConfigShowArgs};
use crate::config::Config;
use crate::error::Result;
use crate::logging::redaction;
use crate::output::OutputWriter;

/// Handle the config command
pub async fn handle_config(
    args: ConfigArgs,
    config: &Config,
    output: &mut OutputWriter,
) -> Result<()> {
    match args.action {
        ConfigAction::Init(init_args) => handle_config_init(init_args, output),
        ConfigAction::Show(show_args) => handle_config_show(show_args, config, output),
    }
}

/// Write a default settings file
fn handle_config_init(args: ConfigInitArgs, output: &mut OutputWriter) -> Result<()> {
    if args.path.exists() && !args.force {
        output.warning(&format!(
            "Settings file already exists at {} (use --force to overwrite)",
            args.path.display()
        ))?;
        return Ok(());
    }

    Config::default().save(&args.path)?;
    output.success(&format!("✓ Created settings file at {}", args.path.display()))?;
    output.info("Edit it to configure source locations and the AI transform endpoint.")?;
    Ok(())
}

/// Print the effective settings
fn handle_config_show(args: ConfigShowArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let content = render_settings(config, args.format)?;
    output.writeln(content.trim_end())
}

fn render_settings(config: &Config, format: ConfigFormat) -> Result<String> {
    let mut shown = config.clone();
    shown.ai.endpoint = shown.ai.endpoint.as_deref().map(redaction::redact_sensitive);
    for location in shown.fetch.sources.values_mut() {
        *location = redaction::redact_sensitive(location);
    }

    Ok(match format {
        ConfigFormat::Toml => toml::to_string_pretty(&shown)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&shown)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&shown)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use tempfile::TempDir;

    fn silent() -> OutputWriter {
        OutputWriter::with_writer(OutputFormat::Human, false, true, Box::new(std::io::sink()))
    }

    #[test]
    fn test_init_respects_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".datamorph.yaml");
        std::fs::write(&path, "fetch:\n  timeout_ms: 10\n").unwrap();

        handle_config_init(ConfigInitArgs { path: path.clone(), force: false }, &mut silent()).unwrap();
        assert_eq!(Config::from_file(&path).unwrap().fetch.timeout_ms, 10);

        handle_config_init(ConfigInitArgs { path: path.clone(), force: true }, &mut silent()).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_show_in_every_format() {
        let mut config = Config::default();
        config.ai.endpoint = Some("https://ai.example.com/run?api_key=abcdefghijklmnop".to_string());

        let yaml = render_settings(&config, ConfigFormat::Yaml).unwrap();
        assert!(yaml.contains("timeout_ms: 30000"));
        assert!(yaml.contains("api_key=***"));
        assert!(!yaml.contains("abcdefghijklmnop"));

        let json = render_settings(&config, ConfigFormat::Json).unwrap();
        assert!(json.contains("\"api_key_env\": \"DATAMORPH_AI_KEY\""));

        let toml = render_settings(&config, ConfigFormat::Toml).unwrap();
        assert!(toml.contains("[fetch]"));
    }
}
