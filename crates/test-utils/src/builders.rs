#![allow(dead_code)]

use gowatch::config::{ConfigFile, RawConfigFile};
use gowatch::types::HumanDuration;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            config: RawConfigFile {
                cmd: cmd.to_string(),
                ..RawConfigFile::default()
            },
        }
    }

    pub fn root(mut self, root: &str) -> Self {
        self.config.root = root.to_string();
        self
    }

    pub fn delay(mut self, delay: &str) -> Self {
        self.config.delay = Some(parse_duration(delay));
        self
    }

    pub fn kill_timeout(mut self, timeout: &str) -> Self {
        self.config.kill_timeout = Some(parse_duration(timeout));
        self
    }

    pub fn include_file(mut self, suffix: &str) -> Self {
        self.config.watch.include_files.push(suffix.to_string());
        self
    }

    pub fn exclude_file(mut self, suffix: &str) -> Self {
        self.config.watch.exclude_files.push(suffix.to_string());
        self
    }

    pub fn include_dir(mut self, dir: &str) -> Self {
        self.config.watch.include_dirs.push(dir.to_string());
        self
    }

    pub fn exclude_dir(mut self, dir: &str) -> Self {
        self.config.watch.exclude_dirs.push(dir.to_string());
        self
    }

    /// Add a `[command."<suffix>"]` override in table form.
    pub fn command(mut self, suffix: &str, cmd: &str) -> Self {
        let mut table = toml::Table::new();
        table.insert("cmd".to_string(), toml::Value::String(cmd.to_string()));
        self.config
            .command
            .insert(suffix.to_string(), toml::Value::Table(table));
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

fn parse_duration(s: &str) -> HumanDuration {
    s.parse()
        .unwrap_or_else(|e| panic!("invalid duration {s:?} in test config: {e}"))
}
