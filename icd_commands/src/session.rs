use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use icd_api::{ApiClient, ApiError, HttpTransport, Transport};
use icd_config::{Config, ConfigError, executable_dir};

type Connect<T> = fn(&Config) -> Result<ApiClient<T>, ApiError>;

/// State shared by the handlers of one invocation.
///
/// The configuration file and the API client are only touched by commands
/// that need them, so the mapping commands work without credentials.
pub struct Session<T = HttpTransport> {
    config_path: PathBuf,
    config: Option<Config>,
    api: Option<ApiClient<T>>,
    connect: Option<Connect<T>>,
    data_dir: Option<PathBuf>,
    out: Box<dyn Write>,
}

impl Session<HttpTransport> {
    /// Session reading credentials from `config_path` and printing to stdout.
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            config: None,
            api: None,
            connect: Some(ApiClient::from_config),
            data_dir: None,
            out: Box::new(io::stdout()),
        }
    }
}

impl<T: Transport> Session<T> {
    /// Session around an already built client.
    pub fn with_client(api: ApiClient<T>, out: Box<dyn Write>) -> Self {
        Self {
            config_path: PathBuf::new(),
            config: None,
            api: Some(api),
            connect: None,
            data_dir: None,
            out,
        }
    }

    /// Read mapping files from `dir` instead of the configured location.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The configuration, loaded on first use.
    pub fn config(&mut self) -> Result<&Config, ConfigError> {
        let config = match self.config.take() {
            Some(config) => config,
            None => Config::load(&self.config_path)?,
        };
        Ok(self.config.insert(config))
    }

    /// The API client, connected on first use.
    pub fn api(&mut self) -> Result<&mut ApiClient<T>> {
        let api = match self.api.take() {
            Some(api) => api,
            None => {
                let connect = self.connect.context("no API connection available")?;
                let config = self.config()?.clone();
                connect(&config)?
            }
        };
        Ok(self.api.insert(api))
    }

    /// Where the mapping files are read from: the explicit directory, else
    /// `DataDir` of the configuration, else the executable's directory.
    pub fn data_dir(&mut self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        match self.config() {
            Ok(Config { data_dir: Some(dir), .. }) => return Ok(dir.clone()),
            Ok(_) => {}
            Err(err @ ConfigError::NotFound { .. }) => {
                debug!(error = %err, "no configuration, mapping data from the executable's directory")
            }
            Err(err) => warn!(error = %err, "configuration unusable, ignoring its DataDir"),
        }
        Ok(executable_dir()?)
    }

    pub fn out(&mut self) -> &mut dyn Write {
        self.out.as_mut()
    }
}
