use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "acme-twitter.toml";

/// Browse a 9P twitter feed from acme.
#[derive(Parser, Debug, Default)]
#[command(name = "acme-twitter", version)]
pub struct Args {
    /// Network of the feed service: tcp or unix.
    #[arg(long)]
    pub net: Option<String>,
    /// Address of the feed service.
    #[arg(long)]
    pub addr: Option<String>,
    /// Plan 9 namespace directory holding the acme socket.
    #[arg(long)]
    pub namespace: Option<PathBuf>,
    /// TOML settings file. Defaults to ./acme-twitter.toml when present.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub network: String,
    pub address: String,
    pub namespace: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network: "tcp".into(),
            address: "127.0.0.1:7731".into(),
            namespace: None,
            log_filter: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    network: Option<String>,
    address: Option<String>,
    namespace: Option<PathBuf>,
    log_filter: Option<String>,
}

impl Settings {
    /// Defaults, then the settings file, then the environment, then flags.
    pub fn load(args: &Args) -> Result<Self> {
        Self::resolve(args, Path::new(DEFAULT_CONFIG_FILE), |key| {
            std::env::var(key).ok().filter(|v| !v.is_empty())
        })
    }

    fn resolve(
        args: &Args,
        default_file: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut settings = Self::default();

        let file = match &args.config {
            Some(path) => Some(read_file(path)?),
            None if default_file.exists() => Some(read_file(default_file)?),
            None => None,
        };
        if let Some(file) = file {
            if let Some(v) = file.network {
                settings.network = v;
            }
            if let Some(v) = file.address {
                settings.address = v;
            }
            if let Some(v) = file.namespace {
                settings.namespace = Some(v);
            }
            if let Some(v) = file.log_filter {
                settings.log_filter = v;
            }
        }

        if let Some(v) = env("TWITTERFS_NET") {
            settings.network = v;
        }
        if let Some(v) = env("TWITTERFS_ADDR") {
            settings.address = v;
        }
        if let Some(v) = env("ACME_TWITTER_NAMESPACE") {
            settings.namespace = Some(PathBuf::from(v));
        }
        if let Some(v) = env("ACME_TWITTER_LOG") {
            settings.log_filter = v;
        }

        if let Some(v) = &args.net {
            settings.network = v.clone();
        }
        if let Some(v) = &args.addr {
            settings.address = v.clone();
        }
        if let Some(v) = &args.namespace {
            settings.namespace = Some(v.clone());
        }
        Ok(settings)
    }
}

fn read_file(path: &Path) -> Result<FileSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading settings file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing settings file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn missing_default() -> PathBuf {
        PathBuf::from("/nonexistent/acme-twitter.toml")
    }

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write toml");
        file
    }

    #[test]
    fn defaults_apply_without_sources() {
        let settings = Settings::resolve(&Args::default(), &missing_default(), no_env).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.address, "127.0.0.1:7731");
    }

    #[test]
    fn default_file_is_read_when_present() {
        let file = write_toml("address = \"feed:564\"\nlog_filter = \"debug\"\n");
        let settings = Settings::resolve(&Args::default(), file.path(), no_env).unwrap();
        assert_eq!(settings.address, "feed:564");
        assert_eq!(settings.log_filter, "debug");
        assert_eq!(settings.network, "tcp");
    }

    #[test]
    fn later_sources_win() {
        let file = write_toml(
            "network = \"unix\"\naddress = \"/tmp/file\"\nnamespace = \"/tmp/ns.file\"\n",
        );
        let env: HashMap<&str, &str> = [
            ("TWITTERFS_ADDR", "/tmp/env"),
            ("ACME_TWITTER_NAMESPACE", "/tmp/ns.env"),
            ("ACME_TWITTER_LOG", "warn"),
        ]
        .into();
        let args = Args {
            addr: Some("/tmp/flag".into()),
            config: Some(file.path().to_path_buf()),
            ..Args::default()
        };
        let settings = Settings::resolve(&args, &missing_default(), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();
        assert_eq!(settings.network, "unix");
        assert_eq!(settings.address, "/tmp/flag");
        assert_eq!(settings.namespace, Some(PathBuf::from("/tmp/ns.env")));
        assert_eq!(settings.log_filter, "warn");
    }

    #[test]
    fn explicit_config_must_exist() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/settings.toml")),
            ..Args::default()
        };
        let err = Settings::resolve(&args, &missing_default(), no_env).unwrap_err();
        assert!(format!("{err:#}").contains("reading settings file"));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let file = write_toml("adress = \"typo\"\n");
        let args = Args {
            config: Some(file.path().to_path_buf()),
            ..Args::default()
        };
        let err = Settings::resolve(&args, &missing_default(), no_env).unwrap_err();
        assert!(format!("{err:#}").contains("parsing settings file"));
    }

    #[test]
    fn flags_parse() {
        let args = Args::parse_from(["acme-twitter", "--net", "unix", "--addr", "/srv/twitter"]);
        assert_eq!(args.net.as_deref(), Some("unix"));
        assert_eq!(args.addr.as_deref(), Some("/srv/twitter"));
        assert!(args.config.is_none());
    }
}
