use std::fmt;
use std::time::Duration;

/// Default ComfyDeploy run endpoint. Generally left unchanged.
pub const DEFAULT_API_ENDPOINT: &str = "https://www.comfydeploy.com/api/run";

/// Default number of extra runs queued beyond the one executing.
pub const DEFAULT_OVERQUEUE: usize = 2;

/// ComfyDeploy backend settings loaded from environment variables.
///
/// Shared read-only (behind an `Arc`) by every concurrent job.
#[derive(Clone)]
pub struct DeploySettings {
    /// API token, without the `Bearer` prefix.
    pub auth_token: String,
    /// Workflow ID provided by ComfyDeploy. The workflow must accept a
    /// generic `workflow_api` JSON input.
    pub workflow_id: String,
    /// Machine ID provided by ComfyDeploy.
    pub machine_id: String,
    /// Run endpoint used for both submission and status polling.
    pub api_endpoint: String,
    /// Max concurrent calls beyond the first.
    pub overqueue: usize,
    /// Upper bound on how long a run may be polled. `None` polls forever.
    pub max_poll_duration: Option<Duration>,
    /// Run the connectivity validator during `init`.
    pub validate_on_init: bool,
    /// Ask the validator whether a model exists before binding it.
    pub validate_models: bool,
}

/// Errors from loading [`DeploySettings`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

impl DeploySettings {
    /// Settings with the given credentials and every other field at its
    /// default.
    pub fn new(
        auth_token: impl Into<String>,
        workflow_id: impl Into<String>,
        machine_id: impl Into<String>,
    ) -> Self {
        Self {
            auth_token: auth_token.into(),
            workflow_id: workflow_id.into(),
            machine_id: machine_id.into(),
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            overqueue: DEFAULT_OVERQUEUE,
            max_poll_duration: None,
            validate_on_init: false,
            validate_models: false,
        }
    }

    /// Load settings from the process environment.
    ///
    /// | Env Var                        | Default                              |
    /// |--------------------------------|--------------------------------------|
    /// | `COMFYDEPLOY_AUTH_TOKEN`       | required                             |
    /// | `COMFYDEPLOY_WORKFLOW_ID`      | required                             |
    /// | `COMFYDEPLOY_MACHINE_ID`       | required                             |
    /// | `COMFYDEPLOY_API_ENDPOINT`     | `https://www.comfydeploy.com/api/run`|
    /// | `COMFYDEPLOY_OVERQUEUE`        | `2`                                  |
    /// | `COMFYDEPLOY_MAX_POLL_SECS`    | unset (poll forever)                 |
    /// | `COMFYDEPLOY_VALIDATE_ON_INIT` | `false`                              |
    /// | `COMFYDEPLOY_VALIDATE_MODELS`  | `false`                              |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let auth_token = required("COMFYDEPLOY_AUTH_TOKEN")?;
        let workflow_id = required("COMFYDEPLOY_WORKFLOW_ID")?;
        let machine_id = required("COMFYDEPLOY_MACHINE_ID")?;

        let api_endpoint = lookup("COMFYDEPLOY_API_ENDPOINT")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_ENDPOINT.into());

        let overqueue = match lookup("COMFYDEPLOY_OVERQUEUE") {
            Some(v) => parse_var("COMFYDEPLOY_OVERQUEUE", &v)?,
            None => DEFAULT_OVERQUEUE,
        };

        let max_poll_duration = match lookup("COMFYDEPLOY_MAX_POLL_SECS") {
            Some(v) if !v.trim().is_empty() => Some(Duration::from_secs(parse_var(
                "COMFYDEPLOY_MAX_POLL_SECS",
                &v,
            )?)),
            _ => None,
        };

        let validate_on_init = match lookup("COMFYDEPLOY_VALIDATE_ON_INIT") {
            Some(v) => parse_var("COMFYDEPLOY_VALIDATE_ON_INIT", &v)?,
            None => false,
        };

        let validate_models = match lookup("COMFYDEPLOY_VALIDATE_MODELS") {
            Some(v) => parse_var("COMFYDEPLOY_VALIDATE_MODELS", &v)?,
            None => false,
        };

        Ok(Self {
            auth_token,
            workflow_id,
            machine_id,
            api_endpoint,
            overqueue,
            max_poll_duration,
            validate_on_init,
            validate_models,
        })
    }

    /// Advisory number of concurrent runs the host may route here.
    pub fn max_usages(&self) -> usize {
        self.overqueue.saturating_add(1)
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}

// The token never appears in logs.
impl fmt::Debug for DeploySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploySettings")
            .field("auth_token", &"<redacted>")
            .field("workflow_id", &self.workflow_id)
            .field("machine_id", &self.machine_id)
            .field("api_endpoint", &self.api_endpoint)
            .field("overqueue", &self.overqueue)
            .field("max_poll_duration", &self.max_poll_duration)
            .field("validate_on_init", &self.validate_on_init)
            .field("validate_models", &self.validate_models)
            .finish()
    }
}
