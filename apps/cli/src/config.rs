use std::time::Duration;

use clap::Args;
use url::Url;

use rolesync_application::{ExecutorOptions, RetryPolicy};
use rolesync_core::{ApiToken, AppError, AppResult};

/// Remote connection and retry arguments shared by `plan` and `sync`.
#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Base URL of the remote role authority API
    #[arg(long, env = "ROLESYNC_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token for the remote API
    #[arg(long, env = "ROLESYNC_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Retries after the first attempt of a failing remote call
    #[arg(long, env = "ROLESYNC_MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds; doubles per retry
    #[arg(long, env = "ROLESYNC_RETRY_BASE_DELAY_MS", default_value = "500")]
    pub retry_base_delay_ms: u64,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "ROLESYNC_REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Overall deadline for the run in seconds
    #[arg(long, env = "ROLESYNC_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Reconcile against an empty in-memory store instead of the remote API
    #[arg(long, conflicts_with_all = ["api_url", "api_token"])]
    pub in_memory: bool,
}

/// Where remote role state lives.
#[derive(Debug, Clone)]
pub enum RemoteTarget {
    /// Remote authority HTTP API.
    Http {
        /// API base URL.
        api_url: Url,
        /// Bearer credential.
        token: ApiToken,
        /// Per-request timeout.
        request_timeout: Duration,
    },
    /// Process-local store that starts empty.
    InMemory,
}

/// Validated configuration for one reconciliation run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote role state.
    pub remote: RemoteTarget,
    /// Retry behavior of remote calls.
    pub retry_policy: RetryPolicy,
    /// Plan execution switches.
    pub executor: ExecutorOptions,
    /// Overall run deadline.
    pub timeout: Option<Duration>,
}

impl SyncConfig {
    /// Validates connection arguments into a run configuration.
    pub fn load(args: &ConnectionArgs, executor: ExecutorOptions) -> AppResult<Self> {
        if args.retry_base_delay_ms == 0 {
            return Err(AppError::Validation(
                "ROLESYNC_RETRY_BASE_DELAY_MS must be greater than zero".to_owned(),
            ));
        }

        if args.request_timeout_secs == 0 {
            return Err(AppError::Validation(
                "ROLESYNC_REQUEST_TIMEOUT_SECS must be greater than zero".to_owned(),
            ));
        }

        if args.timeout_secs == Some(0) {
            return Err(AppError::Validation(
                "ROLESYNC_TIMEOUT_SECS must be greater than zero".to_owned(),
            ));
        }

        let remote = if args.in_memory {
            RemoteTarget::InMemory
        } else {
            RemoteTarget::Http {
                api_url: parse_api_url(required(args.api_url.as_deref(), "ROLESYNC_API_URL")?)?,
                token: ApiToken::new(required(args.api_token.as_deref(), "ROLESYNC_API_TOKEN")?)?,
                request_timeout: Duration::from_secs(args.request_timeout_secs),
            }
        };

        Ok(Self {
            remote,
            retry_policy: RetryPolicy::new(
                args.max_retries,
                Duration::from_millis(args.retry_base_delay_ms),
            ),
            executor,
            timeout: args.timeout_secs.map(Duration::from_secs),
        })
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> AppResult<&'a str> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse_api_url(value: &str) -> AppResult<Url> {
    let url = Url::parse(value).map_err(|error| {
        AppError::Validation(format!("invalid ROLESYNC_API_URL value '{value}': {error}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!(
            "ROLESYNC_API_URL must use http or https, got '{}'",
            url.scheme()
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rolesync_application::ExecutorOptions;
    use rolesync_core::AppError;

    use super::{ConnectionArgs, RemoteTarget, SyncConfig};

    fn args() -> ConnectionArgs {
        ConnectionArgs {
            api_url: Some("https://roles.example.com/api/".to_owned()),
            api_token: Some("token".to_owned()),
            max_retries: 3,
            retry_base_delay_ms: 500,
            request_timeout_secs: 30,
            timeout_secs: None,
            in_memory: false,
        }
    }

    #[test]
    fn valid_arguments_build_http_target() {
        let config = SyncConfig::load(&args(), ExecutorOptions::default());

        let Ok(config) = config else {
            panic!("config should load");
        };
        assert_eq!(config.retry_policy.max_attempts(), 4);
        assert_eq!(config.retry_policy.base_delay, Duration::from_millis(500));
        assert!(matches!(
            config.remote,
            RemoteTarget::Http { ref api_url, .. } if api_url.host_str() == Some("roles.example.com")
        ));
    }

    #[test]
    fn missing_token_is_rejected() {
        let config = SyncConfig::load(
            &ConnectionArgs {
                api_token: Some("  ".to_owned()),
                ..args()
            },
            ExecutorOptions::default(),
        );

        assert!(matches!(config, Err(AppError::Validation(message)) if message.contains("ROLESYNC_API_TOKEN")));
    }

    #[test]
    fn non_http_url_is_rejected() {
        let config = SyncConfig::load(
            &ConnectionArgs {
                api_url: Some("ftp://roles.example.com".to_owned()),
                ..args()
            },
            ExecutorOptions::default(),
        );

        assert!(matches!(config, Err(AppError::Validation(_))));
    }

    #[test]
    fn zero_base_delay_is_rejected() {
        let config = SyncConfig::load(
            &ConnectionArgs {
                retry_base_delay_ms: 0,
                ..args()
            },
            ExecutorOptions::default(),
        );

        assert!(matches!(config, Err(AppError::Validation(_))));
    }

    #[test]
    fn in_memory_target_needs_no_credentials() {
        let config = SyncConfig::load(
            &ConnectionArgs {
                api_url: None,
                api_token: None,
                in_memory: true,
                timeout_secs: Some(5),
                ..args()
            },
            ExecutorOptions::default(),
        );

        assert!(matches!(
            config,
            Ok(SyncConfig { remote: RemoteTarget::InMemory, timeout: Some(timeout), .. })
                if timeout == Duration::from_secs(5)
        ));
    }
}
