use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use super::config::ServerConfig;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Could not determine a home directory; pass --dir")]
    NoHomeDir,
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to render default config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// `$HOME/.config/linkbucket`
pub fn default_working_dir() -> Result<PathBuf, SetupError> {
    let home = std::env::var_os("HOME").ok_or(SetupError::NoHomeDir)?;
    Ok(PathBuf::from(home).join(".config").join("linkbucket"))
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SetupError {
    let path = path.to_path_buf();
    move |source| SetupError::Io { path, source }
}

/// Creates the working directory (owner-only on unix) and writes a default
/// config file into it unless one is already there. Returns the config path.
pub fn run_setup(dir: &Path) -> Result<PathBuf, SetupError> {
    fs::create_dir_all(dir).map_err(io_err(dir))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(io_err(dir))?;
    }

    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        info!(path = ?config_path, "Config file already exists; leaving it untouched.");
        return Ok(config_path);
    }

    let contents = toml::to_string_pretty(&ServerConfig::default())?;
    fs::write(&config_path, contents).map_err(io_err(&config_path))?;
    info!(path = ?config_path, "Wrote default config.");
    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::{ConfigOverrides, PartialServerConfig};

    #[test]
    fn test_setup_writes_loadable_default_config() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("linkbucket");

        let path = run_setup(&dir).unwrap();
        assert_eq!(path, dir.join(CONFIG_FILE_NAME));

        let layer = PartialServerConfig::from_file(&path).unwrap();
        let config = ServerConfig::from_layers(
            layer,
            PartialServerConfig::default(),
            ConfigOverrides::default(),
        )
        .unwrap();
        assert_eq!(config, ServerConfig::default());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_setup_keeps_existing_config() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join(CONFIG_FILE_NAME), "key_namespace = \"mine\"\n").unwrap();

        let path = run_setup(root.path()).unwrap();
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "key_namespace = \"mine\"\n"
        );
    }
}
