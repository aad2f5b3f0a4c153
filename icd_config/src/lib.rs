//! Fixed settings of the client and the `Name: Value` credentials file.
//!
//! The file sits beside the executable, with the executable's stem and the
//! `.cfg` extension:
//!
//! ```text
//! # credentials from https://icd.who.int/icdapi
//! ClientId: 0123abcd...
//! ClientSecret: s3cr3t...
//! Language: en
//! ```
//!
//! Names are case-insensitive; blank lines and `#` comments are ignored.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Name shown in usage lines.
pub const PROGRAM: &str = "icd11";

/// Exit status of every fatal error.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Extension of the configuration file next to the executable.
pub const CONFIG_EXTENSION: &str = "cfg";

// remote API
pub const API_BASE: &str = "https://id.who.int";
pub const TOKEN_ENDPOINT: &str = "https://icdaccessmanagement.who.int/connect/token";
pub const TOKEN_SCOPE: &str = "icdapi_access";
pub const API_VERSION: &str = "v2";
pub const DEFAULT_LANGUAGE: &str = "en";
/// Replaced by the current release id in every request path.
pub const RELEASE_PLACEHOLDER: &str = "{release}";
/// Lists the MMS releases; its `latestRelease` names the current one.
pub const RELEASE_INDEX_PATH: &str = "/icd/release/11/mms";

// cross-mapping data files (WHO ICD-10/ICD-11 mapping tables)
pub const MAP_ONE_CATEGORY_FILE: &str = "10To11MapToOneCategory.txt";
pub const MAP_MULTIPLE_CATEGORIES_FILE: &str = "10To11MapToMultipleCategories.txt";
pub const ICD11_TERMS_FILE: &str = "11To10MapToOneCategory.txt";
/// Relation kind kept from the first column of the mapping files.
pub const CATEGORY_SELECTOR: &str = "category";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} not found", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration field '{0}' is missing or empty")]
    MissingField(&'static str),

    #[error("line {line} is not a 'Name: Value' pair: {text}")]
    Malformed { line: usize, text: String },

    #[error("cannot locate the executable: {0}")]
    NoExecutable(#[source] io::Error),
}

/// Client credentials plus optional overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,

    /// `Accept-Language` of API requests.
    pub language: Option<String>,

    /// Pinned release id; resolved from the API when absent.
    pub release: Option<String>,

    /// Directory holding the mapping files; the executable's directory when absent.
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            language: None,
            release: None,
            data_dir: None,
        }
    }

    /// Parse the text of a configuration file.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut client_id = None;
        let mut client_secret = None;
        let mut language = None;
        let mut release = None;
        let mut data_dir = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| ConfigError::Malformed {
                line: idx + 1,
                text: line.to_string(),
            })?;
            let value = value.trim().to_string();

            match name.trim().to_ascii_lowercase().as_str() {
                "clientid" => client_id = Some(value),
                "clientsecret" => client_secret = Some(value),
                "language" => language = non_empty(value),
                "release" => release = non_empty(value),
                "datadir" => data_dir = non_empty(value).map(PathBuf::from),
                other => warn!(name = other, line = idx + 1, "ignoring unknown configuration name"),
            }
        }

        Ok(Self {
            client_id: client_id
                .and_then(non_empty)
                .ok_or(ConfigError::MissingField("ClientId"))?,
            client_secret: client_secret
                .and_then(non_empty)
                .ok_or(ConfigError::MissingField("ClientSecret"))?,
            language,
            release,
            data_dir,
        })
    }

    /// Read and parse `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ConfigError::NotFound { path: path.to_path_buf() }
            } else {
                ConfigError::Io { path: path.to_path_buf(), source }
            }
        })?;
        debug!(path = %path.display(), "loaded configuration");
        Self::parse(&text)
    }

    /// Write the configuration in the format [`Config::parse`] reads.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, self.to_string()).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ClientId: {}", self.client_id)?;
        writeln!(f, "ClientSecret: {}", self.client_secret)?;
        if let Some(language) = &self.language {
            writeln!(f, "Language: {}", language)?;
        }
        if let Some(release) = &self.release {
            writeln!(f, "Release: {}", release)?;
        }
        if let Some(dir) = &self.data_dir {
            writeln!(f, "DataDir: {}", dir.display())?;
        }
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// `<executable stem>.cfg` next to the running executable.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe().map_err(ConfigError::NoExecutable)?;
    Ok(exe.with_extension(CONFIG_EXTENSION))
}

/// Directory of the running executable; where the mapping files live by default.
pub fn executable_dir() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe().map_err(ConfigError::NoExecutable)?;
    Ok(exe.parent().map(Path::to_path_buf).unwrap_or_default())
}

/// What to tell the user when the configuration cannot be used.
pub fn remediation(path: &Path) -> String {
    format!(
        "The ICD API needs client credentials.\n\
         1. Register at https://icd.who.int/icdapi and open 'View API access key(s)'.\n\
         2. Create {} containing:\n\
         \n    ClientId: <your client id>\n    ClientSecret: <your client secret>\n\
         \n   or run: {} writeconfig <client id> <client secret>",
        path.display(),
        PROGRAM
    )
}
