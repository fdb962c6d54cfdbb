//! # Platform-specific utilities
//!
//! Centralizes how the external optimizer executables are named on each
//! platform and where they are looked up: a tools directory named by
//! `BUILD_ASSETS_TOOLS_DIR` first, then the system `PATH`.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Environment variable naming a directory of bundled optimizer executables
pub const TOOLS_DIR_ENV: &str = "BUILD_ASSETS_TOOLS_DIR";

/// Platform-specific command manager with tool resolution
pub struct PlatformCommands {
    commands: HashMap<&'static str, &'static str>,
    tools_dir: Option<PathBuf>,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(|| Self::new(env::var_os(TOOLS_DIR_ENV).map(PathBuf::from)))
    }

    fn new(tools_dir: Option<PathBuf>) -> Self {
        let mut commands = HashMap::new();
        if cfg!(windows) {
            commands.insert("gifsicle", "gifsicle.exe");
            commands.insert("jpegtran", "jpegtran.exe");
            commands.insert("optipng", "optipng.exe");
            // svgo is a node script, installed as a .cmd shim
            commands.insert("svgo", "svgo.cmd");
        } else {
            commands.insert("gifsicle", "gifsicle");
            commands.insert("jpegtran", "jpegtran");
            commands.insert("optipng", "optipng");
            commands.insert("svgo", "svgo");
        }

        if let Some(ref dir) = tools_dir {
            debug!("Using tools directory {}", dir.display());
        }

        Self { commands, tools_dir }
    }

    /// Get the platform-specific command name
    pub fn get_command<'a>(&self, base_name: &'a str) -> &'a str {
        match self.commands.get(base_name) {
            Some(command) => *command,
            None => base_name,
        }
    }

    /// Resolve the path to a tool, bundled directory first, then `PATH`
    pub fn resolve_tool(&self, base_name: &str) -> Option<PathBuf> {
        let command = self.get_command(base_name);

        if let Some(ref dir) = self.tools_dir {
            let bundled = dir.join(command);
            if bundled.is_file() {
                debug!("Using bundled tool: {} -> {:?}", base_name, bundled);
                return Some(bundled);
            }
        }

        let found = find_in_path(command, env::var_os("PATH")?);
        match found {
            Some(ref path) => debug!("Using system tool: {} -> {:?}", base_name, path),
            None => debug!("Tool not found: {}", base_name),
        }
        found
    }
}

fn find_in_path(command: &str, path_var: std::ffi::OsString) -> Option<PathBuf> {
    env::split_paths(&path_var)
        .map(|dir| Path::new(&dir).join(command))
        .find(|candidate| candidate.is_file())
}
