use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Chainable, Result};

/// The name of the configuration file looked for in a content root.
pub const CONFIG_FILE: &str = "nib.toml";

/// Expansion settings. Every field is optional in TOML.
///
/// ```
/// use quill::Settings;
///
/// let settings = Settings::from_toml(r#"
/// partials = "src/partials"
/// strict = true
/// "#).unwrap();
///
/// assert_eq!(settings.partials.to_str(), Some("src/partials"));
/// assert_eq!(settings.alias, "@partials/");
/// assert!(settings.strict);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// The partials directory, relative to the content root.
    pub partials: PathBuf,
    /// Import sources starting with this resolve into `partials`.
    pub alias: String,
    /// Extensions probed, in order, for extensionless import sources.
    pub extensions: Vec<String>,
    /// Where to write the page-to-headings map, if anywhere.
    pub headings: Option<PathBuf>,
    /// Fail on any diagnostic.
    pub strict: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            partials: PathBuf::from("partials"),
            alias: "@partials/".into(),
            extensions: vec!["mdx".into(), "md".into()],
            headings: None,
            strict: false,
        }
    }
}

impl Settings {
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .chain_with(|| error!("failed to read configuration", "path" => path.display()))?;

        Settings::from_toml(&source)
            .chain_with(|| error!("invalid configuration", "path" => path.display()))
    }

    /// Reads [`CONFIG_FILE`] from `root` if there is one.
    pub fn discover(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if path.is_file() {
            Settings::read(&path)
        } else {
            Ok(Settings::default())
        }
    }
}
