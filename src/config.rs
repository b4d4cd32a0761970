//! Connection settings for the completion endpoint.
//!
//! [`DialConfig`] is what the client is constructed from.  [`ConfigFile`] is the layered,
//! partially-filled form it is resolved from: a YAML file, the environment, and command-line
//! overrides are each read into a `ConfigFile` and merged, later layers winning.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Base URL used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://ai-proxy.lab.epam.com";

/// Deployment used when none is configured.
pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o";

/// Longest wait for a connection, for a whole reply, or between two reads of a streamed reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "DIAL_API_KEY";

/// Environment variable holding the base endpoint.
pub const ENDPOINT_ENV: &str = "DIAL_ENDPOINT";

/// Environment variable holding the deployment name.
pub const DEPLOYMENT_ENV: &str = "DIAL_DEPLOYMENT";

/// Environment variable holding the request timeout in seconds.
pub const TIMEOUT_ENV: &str = "DIAL_TIMEOUT_SECS";

/// Settings the completion client is constructed from.
#[derive(Clone, PartialEq, Eq)]
pub struct DialConfig {
    /// The deployment that receives requests.
    pub deployment: String,

    /// Base URL of the service, without the deployment path.
    pub endpoint: String,

    /// Value of the `api-key` header.
    pub api_key: String,

    /// Bounds connecting, waiting for a whole reply, and each gap in a streamed reply.
    pub timeout: Duration,
}

impl DialConfig {
    /// Creates a configuration with the default endpoint, deployment, and timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            deployment: DEFAULT_DEPLOYMENT.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the deployment.
    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = deployment.into();
        self
    }

    /// Sets the base endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns `{endpoint}/openai/deployments/{deployment}/chat/completions`.
    ///
    /// The deployment is percent-encoded as a single path segment.
    pub fn completions_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                Error::url(
                    format!("endpoint cannot be used as a base URL: {}", self.endpoint),
                    None,
                )
            })?;
            segments.pop_if_empty().extend([
                "openai",
                "deployments",
                self.deployment.as_str(),
                "chat",
                "completions",
            ]);
        }
        Ok(url)
    }
}

impl fmt::Debug for DialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialConfig")
            .field("deployment", &self.deployment)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// One layer of connection settings; any field may be absent.
///
/// # Example
///
/// ```yaml
/// deployment: gpt-4o
/// endpoint: https://ai-proxy.lab.epam.com
/// timeout_secs: 120
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// The deployment that receives requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,

    /// Base URL of the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Value of the `api-key` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Reads a layer from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::io(format!("failed to read config file {}", path.display()), err)
        })?;
        Self::from_yaml(&content)
    }

    /// Parses a layer from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads a layer from the `DIAL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads a layer through `lookup`, which maps an environment variable name to its value.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let timeout_secs = match get(TIMEOUT_ENV) {
            Some(value) => Some(value.trim().parse::<u64>().map_err(|_| {
                Error::configuration(format!(
                    "{TIMEOUT_ENV} must be a whole number of seconds, got {value:?}"
                ))
            })?),
            None => None,
        };
        Ok(Self {
            deployment: get(DEPLOYMENT_ENV),
            endpoint: get(ENDPOINT_ENV),
            api_key: get(API_KEY_ENV),
            timeout_secs,
        })
    }

    /// Returns this layer with every field that `other` sets replaced by `other`'s value.
    pub fn merge(self, other: ConfigFile) -> Self {
        Self {
            deployment: other.deployment.or(self.deployment),
            endpoint: other.endpoint.or(self.endpoint),
            api_key: other.api_key.or(self.api_key),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
        }
    }

    /// Fills in defaults and validates the result.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no API key is set or the timeout is zero, and a URL
    /// error when the endpoint does not parse.
    pub fn into_dial_config(self) -> Result<DialConfig> {
        let api_key = self.api_key.ok_or_else(|| {
            Error::configuration(format!(
                "API key not provided and {API_KEY_ENV} environment variable not set"
            ))
        })?;
        let mut config = DialConfig::new(api_key);
        if let Some(deployment) = self.deployment {
            config = config.with_deployment(deployment);
        }
        if let Some(endpoint) = self.endpoint {
            config = config.with_endpoint(endpoint);
        }
        match self.timeout_secs {
            Some(0) => return Err(Error::configuration("timeout must be at least one second")),
            Some(secs) => config = config.with_timeout(Duration::from_secs(secs)),
            None => {}
        }
        config.completions_url()?;
        Ok(config)
    }
}
