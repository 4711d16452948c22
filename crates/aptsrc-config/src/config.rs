use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, RwLock},
};

use aptsrc_utils::{
    fs::write_file,
    path::{resolve_path, xdg_config_home},
    system::{os_codename, OS_RELEASE_PATH},
};
use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    annotations::annotated_toml,
    error::{ConfigError, Result},
};

pub const DEFAULT_SOURCELIST: &str = "/etc/apt/sources.list";
pub const DEFAULT_SOURCEPARTS: &str = "/etc/apt/sources.list.d";
pub const DEFAULT_TEMPLATES: &str = "/usr/share/aptsrc/templates.toml";
pub const DEFAULT_SOURCE_TYPE: &str = "deb";
pub const FALLBACK_DISTRIBUTION: &str = "stable";

const SOURCE_TYPES: [&str; 4] = ["deb", "deb-src", "rpm", "rpm-src"];

/// aptsrc configuration.
///
/// Paths may use `~`, `$VAR` and `${VAR}`.
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Main sources list file.
    /// Default: /etc/apt/sources.list
    pub sourcelist: Option<String>,

    /// Directory scanned for additional `*.list` files.
    /// Default: /etc/apt/sources.list.d
    pub sourceparts: Option<String>,

    /// Repository template catalog used to classify entries.
    /// Default: /usr/share/aptsrc/templates.toml
    pub templates: Option<String>,

    /// Classify entries against the template catalog.
    /// Default: true
    pub use_templates: Option<bool>,

    /// Repository type for new entries that don't name one.
    /// Default: "deb"
    pub default_type: Option<String>,

    /// Distribution for new entries that don't name one.
    /// Default: VERSION_CODENAME from /etc/os-release, or "stable"
    pub default_distribution: Option<String>,
}

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("APTSRC_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("aptsrc").join("config.toml"),
    })
});

fn config_path() -> PathBuf {
    CONFIG_PATH
        .read()
        .map(|path| path.to_path_buf())
        .unwrap_or_else(|poisoned| poisoned.into_inner().to_path_buf())
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            sourcelist: Some(DEFAULT_SOURCELIST.to_string()),
            sourceparts: Some(DEFAULT_SOURCEPARTS.to_string()),
            templates: Some(DEFAULT_TEMPLATES.to_string()),
            use_templates: Some(true),
            default_type: Some(DEFAULT_SOURCE_TYPE.to_string()),
            default_distribution: None,
        }
    }

    /// Loads the configuration from [`CONFIG_PATH`].
    /// If the configuration file is not found, it uses the default configuration.
    pub fn new() -> Result<Self> {
        Self::from_path(config_path())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Self::default_config()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;

        Ok(config)
    }

    pub fn resolve(&mut self) -> Result<()> {
        let source_type = self
            .default_type
            .get_or_insert_with(|| DEFAULT_SOURCE_TYPE.to_string());
        if !SOURCE_TYPES.contains(&source_type.as_str()) {
            return Err(ConfigError::InvalidSourceType(source_type.clone()));
        }

        self.sourcelist
            .get_or_insert_with(|| DEFAULT_SOURCELIST.to_string());
        self.sourceparts
            .get_or_insert_with(|| DEFAULT_SOURCEPARTS.to_string());
        self.templates
            .get_or_insert_with(|| DEFAULT_TEMPLATES.to_string());
        self.use_templates.get_or_insert(true);

        Ok(())
    }

    pub fn get_sourcelist_path(&self) -> Result<PathBuf> {
        path_setting("APTSRC_SOURCELIST", &self.sourcelist, DEFAULT_SOURCELIST)
    }

    pub fn get_sourceparts_path(&self) -> Result<PathBuf> {
        path_setting("APTSRC_SOURCEPARTS", &self.sourceparts, DEFAULT_SOURCEPARTS)
    }

    pub fn get_templates_path(&self) -> Result<PathBuf> {
        path_setting("APTSRC_TEMPLATES", &self.templates, DEFAULT_TEMPLATES)
    }

    pub fn use_templates(&self) -> bool {
        self.use_templates.unwrap_or(true)
    }

    pub fn default_type(&self) -> &str {
        self.default_type.as_deref().unwrap_or(DEFAULT_SOURCE_TYPE)
    }

    pub fn default_distribution(&self) -> String {
        self.default_distribution
            .clone()
            .or_else(|| os_codename(OS_RELEASE_PATH))
            .unwrap_or_else(|| FALLBACK_DISTRIBUTION.to_string())
    }

    pub fn save(&self) -> Result<()> {
        let config_path = config_path();
        write_file(&config_path, &toml::to_string_pretty(self)?)?;
        info!("Configuration saved to {}", config_path.display());
        Ok(())
    }
}

fn path_setting(env_var: &str, value: &Option<String>, default: &str) -> Result<PathBuf> {
    if let Ok(env_path) = std::env::var(env_var) {
        return Ok(resolve_path(&env_path)?);
    }
    Ok(resolve_path(value.as_deref().unwrap_or(default))?)
}

pub fn generate_default_config() -> Result<()> {
    let config_path = config_path();

    if config_path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    let annotated = annotated_toml(&Config::default_config())?;
    write_file(&config_path, &annotated)?;
    info!(
        "Default configuration file generated with documentation at: {}",
        config_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.sourcelist.as_deref(), Some(DEFAULT_SOURCELIST));
        assert_eq!(config.sourceparts.as_deref(), Some(DEFAULT_SOURCEPARTS));
        assert_eq!(config.default_type(), "deb");
        assert!(config.use_templates());
    }

    #[test]
    fn test_resolve_sets_defaults() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve().unwrap();

        assert_eq!(config.sourcelist.as_deref(), Some(DEFAULT_SOURCELIST));
        assert_eq!(config.templates.as_deref(), Some(DEFAULT_TEMPLATES));
        assert_eq!(config.default_type.as_deref(), Some("deb"));
        assert_eq!(config.use_templates, Some(true));
    }

    #[test]
    fn test_resolve_rejects_unknown_type() {
        let mut config = Config::default_config();
        config.default_type = Some("apk".to_string());

        assert!(matches!(
            config.resolve(),
            Err(ConfigError::InvalidSourceType(t)) if t == "apk"
        ));
    }

    #[test]
    fn test_from_path_missing_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::from_path(dir.path().join("config.toml")).unwrap();
        assert_eq!(config.sourcelist.as_deref(), Some(DEFAULT_SOURCELIST));
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "sourcelist = \"/srv/apt/sources.list\"\ndefault_distribution = \"trixie\"\n",
        )
        .unwrap();

        let config = Config::from_path(&path).unwrap();
        assert_eq!(config.sourcelist.as_deref(), Some("/srv/apt/sources.list"));
        assert_eq!(config.default_distribution(), "trixie");
        assert_eq!(config.sourceparts.as_deref(), Some(DEFAULT_SOURCEPARTS));
    }

    #[test]
    fn test_from_path_bad_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "sourcelist = [").unwrap();

        assert!(matches!(
            Config::from_path(&path),
            Err(ConfigError::TomlDeError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_path_env_override() {
        std::env::set_var("APTSRC_SOURCELIST", "/custom/sources.list");
        let config = Config::default_config();
        assert_eq!(
            config.get_sourcelist_path().unwrap(),
            PathBuf::from("/custom/sources.list")
        );
        std::env::remove_var("APTSRC_SOURCELIST");

        assert_eq!(
            config.get_sourcelist_path().unwrap(),
            PathBuf::from(DEFAULT_SOURCELIST)
        );
    }

    #[test]
    #[serial]
    fn test_generate_default_config_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aptsrc").join("config.toml");
        *CONFIG_PATH.write().unwrap() = path.clone();

        generate_default_config().unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("# Main sources list file."));

        assert!(matches!(
            generate_default_config(),
            Err(ConfigError::ConfigAlreadyExists)
        ));
    }
}
