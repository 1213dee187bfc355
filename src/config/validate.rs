// src/config/validate.rs

use std::path::PathBuf;

use crate::config::model::{
    CommandOverride, ConfigFile, DEFAULT_DELAY, DEFAULT_KILL_TIMEOUT, RawConfigFile,
};
use crate::errors::{GowatchError, Result};
use crate::exec::resolver::CommandRule;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = GowatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_default_command(&raw)?;
        validate_root(&raw)?;
        let commands = collect_command_rules(&raw.command)?;

        Ok(ConfigFile::new_unchecked(
            PathBuf::from(raw.root.trim()),
            raw.cmd.trim().to_string(),
            raw.delay.map(|d| d.as_duration()).unwrap_or(DEFAULT_DELAY),
            raw.kill_timeout
                .map(|d| d.as_duration())
                .unwrap_or(DEFAULT_KILL_TIMEOUT),
            raw.watch,
            commands,
        ))
    }
}

fn validate_default_command(cfg: &RawConfigFile) -> Result<()> {
    if cfg.cmd.trim().is_empty() {
        return Err(GowatchError::ConfigError(
            "top-level `cmd` must be set to the command to run".to_string(),
        ));
    }
    Ok(())
}

fn validate_root(cfg: &RawConfigFile) -> Result<()> {
    if cfg.root.trim().is_empty() {
        return Err(GowatchError::ConfigError(
            "`root` must not be empty (use \".\" for the config directory)".to_string(),
        ));
    }
    Ok(())
}

/// Turn the `[command]` table into ordered rules.
///
/// The table keeps declaration order (`toml` is built with
/// `preserve_order`), and that order is the resolution order.
fn collect_command_rules(table: &toml::Table) -> Result<Vec<CommandRule>> {
    let mut rules = Vec::with_capacity(table.len());

    for (suffix, value) in table.iter() {
        if suffix.is_empty() {
            return Err(GowatchError::ConfigError(
                "[command] entries need a non-empty file suffix".to_string(),
            ));
        }

        let cmd = match value {
            toml::Value::String(s) => s.clone(),
            other => {
                let entry: CommandOverride = other.clone().try_into().map_err(|e| {
                    GowatchError::ConfigError(format!(
                        "[command.\"{}\"] must be a table with a `cmd` string: {}",
                        suffix, e
                    ))
                })?;
                entry.cmd
            }
        };

        if cmd.trim().is_empty() {
            return Err(GowatchError::ConfigError(format!(
                "[command.\"{}\"] has an empty `cmd`",
                suffix
            )));
        }

        rules.push(CommandRule::new(suffix.clone(), cmd.trim()));
    }

    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = parse(r#"cmd = "go run .""#).unwrap();
        assert_eq!(cfg.root, PathBuf::from("."));
        assert_eq!(cfg.cmd, "go run .");
        assert_eq!(cfg.delay, DEFAULT_DELAY);
        assert_eq!(cfg.kill_timeout, DEFAULT_KILL_TIMEOUT);
        assert!(cfg.commands.is_empty());
    }

    #[test]
    fn missing_cmd_is_rejected() {
        match parse(r#"root = "src""#) {
            Err(GowatchError::ConfigError(msg)) => assert!(msg.contains("cmd")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn command_overrides_keep_declaration_order() {
        let cfg = parse(
            r#"
cmd = "make"

[command.".scss"]
cmd = "sass"

[command.".css"]
cmd = "postcss"

[command.".js"]
cmd = "esbuild"
"#,
        )
        .unwrap();

        let suffixes: Vec<&str> = cfg.commands.iter().map(|r| r.suffix()).collect();
        assert_eq!(suffixes, vec![".scss", ".css", ".js"]);
    }

    #[test]
    fn bare_string_override_is_accepted() {
        let cfg = parse(
            r#"
cmd = "make"

[command]
".md" = "mdbook build"
"#,
        )
        .unwrap();
        assert_eq!(cfg.commands[0].command(), "mdbook build");
    }

    #[test]
    fn empty_override_command_is_rejected() {
        let err = parse(
            r#"
cmd = "make"

[command.".css"]
cmd = "  "
"#,
        )
        .unwrap_err();
        assert!(matches!(err, GowatchError::ConfigError(_)));
    }

    #[test]
    fn bad_delay_is_a_parse_error() {
        let err = parse(
            r#"
cmd = "make"
delay = "soon"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, GowatchError::TomlError(_)));
    }
}
