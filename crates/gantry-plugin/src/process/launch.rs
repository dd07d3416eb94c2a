//! How a plugin process is started.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use gantry_config::HostConfig;

/// Command line, environment, and working directory for one plugin.
///
/// The engine's server address, when set, is always the last positional
/// argument. Environment variables from [`HostConfig::plugin_env`] are
/// applied first and entries set here override them; both are layered over
/// the inherited environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginLaunch {
    name: String,
    command: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
    server_addr: Option<String>,
}

impl PluginLaunch {
    /// Describes a plugin started by running `program`.
    ///
    /// The plugin is named after the command's file name.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let command = program.into();
        let name = command.file_name().map_or_else(
            || command.display().to_string(),
            |file| file.to_string_lossy().into_owned(),
        );
        Self {
            name,
            command,
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            server_addr: None,
        }
    }

    /// Overrides the name used in logs and errors.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends one flag or option.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several flags or options.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets one environment variable for the plugin.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Runs the plugin from `dir`.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Passes the engine's address as the final argument.
    #[must_use]
    pub fn server_addr(mut self, addr: impl Into<String>) -> Self {
        self.server_addr = Some(addr.into());
        self
    }

    /// Returns the plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the command run.
    #[must_use]
    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Returns the full argument list, server address last.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        self.args
            .iter()
            .cloned()
            .chain(self.server_addr.iter().cloned())
            .collect()
    }

    /// Returns the variables set over the inherited environment.
    #[must_use]
    pub fn environment(&self, config: &HostConfig) -> BTreeMap<String, String> {
        let mut merged = config.plugin_env.clone();
        merged.extend(self.env.iter().map(|(key, value)| (key.clone(), value.clone())));
        merged
    }

    pub(super) fn command_for(&self, config: &HostConfig) -> Command {
        let mut command = Command::new(&self.command);
        command
            .args(self.argv())
            .envs(self.environment(config))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}
