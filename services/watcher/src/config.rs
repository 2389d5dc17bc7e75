//! Command line and environment configuration.
//!
//! Required values are optional at the clap level so that missing ones are
//! reported with a plain message instead of clap's usage dump.

use std::time::Duration;

use clap::Parser;
use rgen_rancher::{Credentials, Endpoint};
use thiserror::Error;

use crate::render::TemplateJob;
use crate::scope::Scope;

/// Configuration errors, reported before any watch activity starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing host parameter")]
    MissingHost,

    #[error("Missing Rancher access key parameter")]
    MissingAccessKey,

    #[error("Missing Rancher secret key parameter")]
    MissingSecretKey,

    #[error("Missing Rancher project id parameter")]
    MissingProjectId,

    #[error("Missing at least one template and destination parameter")]
    MissingTemplate,

    #[error("Invalid template pair '{0}': expected SRC:DEST")]
    InvalidTemplate(String),

    #[error("Template '{0}' has no destination")]
    MissingDestination(String),

    #[error("--service requires --stack")]
    ServiceWithoutStack,

    #[error("--max-concurrent-renders must be at least 1")]
    ZeroConcurrency,
}

/// rancher-gen - generate files from Rancher metadata.
#[derive(Debug, Parser)]
#[command(name = "rancher-gen")]
#[command(version, about = "Generate files from Rancher metadata", long_about = None)]
pub struct Cli {
    /// Rancher host.
    #[arg(long, env = "RANCHER_HOST")]
    pub host: Option<String>,

    /// Rancher port (defaults to 80, or 443 with --ssl).
    #[arg(long, env = "RANCHER_PORT")]
    pub port: Option<u16>,

    /// Use secure connections (https / wss).
    #[arg(long, env = "RANCHER_SSL")]
    pub ssl: bool,

    /// The Rancher access key.
    #[arg(long, env = "RANCHER_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// The Rancher secret key.
    #[arg(long, env = "RANCHER_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Rancher's project id.
    #[arg(long, env = "RANCHER_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Template to render and its destination (e.g. /from/template:/to/file).
    #[arg(long = "template", value_name = "SRC:DEST")]
    pub templates: Vec<String>,

    /// The name of the Rancher stack.
    #[arg(long, env = "RANCHER_STACK")]
    pub stack: Option<String>,

    /// The name of a Rancher service within --stack (repeatable).
    #[arg(long = "service", value_name = "SERVICE")]
    pub services: Vec<String>,

    /// Command to run after templates are generated (e.g. "nginx -s reload").
    #[arg(long)]
    pub notify: Option<String>,

    /// Log level (RUST_LOG takes precedence when set).
    #[arg(
        long,
        env = "RANCHER_GEN_LOG_LEVEL",
        default_value = "info",
        ignore_case = true,
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// Timeout for each Rancher API request, in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Upper bound on concurrently running event handlers.
    #[arg(long)]
    pub max_concurrent_renders: Option<usize>,

    /// Skip rendering when no instances match instead of rendering empty output.
    #[arg(long)]
    pub skip_empty: bool,

    /// Render once and exit without watching for events.
    #[arg(long)]
    pub once: bool,

    /// Path to template to generate (deprecated, use --template).
    #[arg(value_name = "TEMPLATE")]
    pub template: Option<String>,

    /// Output path for generated file (deprecated, use --template).
    #[arg(value_name = "DEST")]
    pub dest: Option<String>,
}

impl Cli {
    /// True when the deprecated positional template/dest pair is used.
    pub fn uses_deprecated_positional(&self) -> bool {
        present(&self.template).is_some() && present(&self.dest).is_some()
    }

    /// Validate and build the runtime configuration.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let host = present(&self.host).ok_or(ConfigError::MissingHost)?;
        let access_key = present(&self.access_key).ok_or(ConfigError::MissingAccessKey)?;
        let secret_key = present(&self.secret_key).ok_or(ConfigError::MissingSecretKey)?;
        let project_id = present(&self.project_id).ok_or(ConfigError::MissingProjectId)?;

        let mut jobs = self
            .templates
            .iter()
            .map(|pair| pair.parse::<TemplateJob>())
            .collect::<Result<Vec<_>, _>>()?;

        match (present(&self.template), present(&self.dest)) {
            (Some(template), Some(dest)) => jobs.push(TemplateJob::new(template, dest)),
            (Some(template), None) => {
                return Err(ConfigError::MissingDestination(template.to_string()))
            }
            _ => {}
        }

        if jobs.is_empty() {
            return Err(ConfigError::MissingTemplate);
        }

        let stack = present(&self.stack).map(str::to_string);
        let services = self
            .services
            .iter()
            .filter_map(|s| present_str(s))
            .map(str::to_string)
            .collect();
        let scope = Scope::from_filters(stack, services).ok_or(ConfigError::ServiceWithoutStack)?;

        if self.max_concurrent_renders == Some(0) {
            return Err(ConfigError::ZeroConcurrency);
        }

        let port = self.port.unwrap_or_else(|| Endpoint::default_port(self.ssl));

        Ok(Config {
            endpoint: Endpoint::new(host, port, self.ssl, project_id),
            credentials: Credentials::new(access_key, secret_key),
            scope,
            jobs,
            notify: present(&self.notify).map(str::to_string),
            log_level: self.log_level.to_lowercase(),
            request_timeout: Duration::from_secs(self.timeout_secs.max(1)),
            max_concurrent_renders: self.max_concurrent_renders,
            skip_empty: self.skip_empty,
            once: self.once,
        })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().and_then(present_str)
}

fn present_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the Rancher project API lives.
    pub endpoint: Endpoint,

    /// API key pair (the secret is redacted in debug output).
    pub credentials: Credentials,

    /// Which instances the templates see.
    pub scope: Scope,

    /// Template/destination pairs, rendered in order.
    pub jobs: Vec<TemplateJob>,

    /// Shell command run once after each render pass.
    pub notify: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Per-request API timeout.
    pub request_timeout: Duration,

    /// Bound on in-flight event handlers; unbounded when `None`.
    pub max_concurrent_renders: Option<usize>,

    /// Skip render and notify when a resolution returns no instances.
    pub skip_empty: bool,

    /// Exit after the initial render.
    pub once: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Result<Config, ConfigError> {
        let mut argv = vec!["rancher-gen"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().into_config()
    }

    const REQUIRED: &[&str] = &[
        "--host",
        "192.168.0.15",
        "--port",
        "8080",
        "--access-key",
        "1234567890",
        "--secret-key",
        "1234567890abcd",
        "--project-id",
        "1a5",
    ];

    fn without(flag: &str) -> Vec<&'static str> {
        let mut args = Vec::new();
        let mut iter = REQUIRED.iter();
        while let Some(arg) = iter.next() {
            if *arg == flag {
                iter.next();
                continue;
            }
            args.push(*arg);
        }
        args.extend_from_slice(&["/tmp/in.j2", "/tmp/out.txt"]);
        args
    }

    #[test]
    fn test_missing_required_parameters() {
        assert_eq!(parse(&without("--host")).unwrap_err(), ConfigError::MissingHost);
        assert_eq!(
            parse(&without("--access-key")).unwrap_err(),
            ConfigError::MissingAccessKey
        );
        assert_eq!(
            parse(&without("--secret-key")).unwrap_err(),
            ConfigError::MissingSecretKey
        );
        assert_eq!(
            parse(&without("--project-id")).unwrap_err(),
            ConfigError::MissingProjectId
        );
        assert_eq!(
            ConfigError::MissingHost.to_string(),
            "Missing host parameter"
        );
    }

    #[test]
    fn test_missing_template() {
        assert_eq!(parse(REQUIRED).unwrap_err(), ConfigError::MissingTemplate);

    }

    #[test]
    fn test_positional_template_needs_destination() {
        let lone = ConfigError::MissingDestination("/tmp/in.j2".to_string());

        let mut args = REQUIRED.to_vec();
        args.push("/tmp/in.j2");
        assert_eq!(parse(&args).unwrap_err(), lone);

        // Not dropped in favour of a valid --template pair.
        let mut args = REQUIRED.to_vec();
        args.extend_from_slice(&["--template", "/t/a.j2:/out/a", "/tmp/in.j2"]);
        assert_eq!(parse(&args).unwrap_err(), lone);
    }

    #[test]
    fn test_succeeds_with_required_parameters() {
        let config = parse(&without("--none")).unwrap();
        assert_eq!(config.endpoint.host, "192.168.0.15");
        assert_eq!(config.endpoint.port, 8080);
        assert!(!config.endpoint.ssl);
        assert_eq!(config.endpoint.project_id, "1a5");
        assert_eq!(config.credentials.access_key, "1234567890");
        assert_eq!(config.scope, Scope::AllInstances);
        assert_eq!(
            config.jobs,
            vec![TemplateJob {
                source: PathBuf::from("/tmp/in.j2"),
                destination: PathBuf::from("/tmp/out.txt"),
            }]
        );
        assert_eq!(config.notify, None);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_template_flags_come_before_positional_pair() {
        let mut args = REQUIRED.to_vec();
        args.extend_from_slice(&[
            "--template",
            "/t/a.j2:/out/a",
            "--template",
            "/t/b.j2:/out/b",
            "/t/legacy.j2",
            "/out/legacy",
        ]);
        let config = parse(&args).unwrap();
        let destinations: Vec<_> = config
            .jobs
            .iter()
            .map(|j| j.destination.to_string_lossy().into_owned())
            .collect();
        assert_eq!(destinations, vec!["/out/a", "/out/b", "/out/legacy"]);
    }

    #[test]
    fn test_invalid_template_pair() {
        let mut args = REQUIRED.to_vec();
        args.extend_from_slice(&["--template", "/t/a.j2"]);
        assert_eq!(
            parse(&args).unwrap_err(),
            ConfigError::InvalidTemplate("/t/a.j2".to_string())
        );
    }

    #[test]
    fn test_default_port_follows_ssl() {
        let base = [
            "--host", "h", "--access-key", "a", "--secret-key", "s", "--project-id", "p",
            "--template", "a:b",
        ];
        assert_eq!(parse(&base).unwrap().endpoint.port, 80);

        let mut tls = base.to_vec();
        tls.push("--ssl");
        let config = parse(&tls).unwrap();
        assert_eq!(config.endpoint.port, 443);
        assert!(config.endpoint.ssl);
    }

    #[test]
    fn test_scope_and_options() {
        let mut args = without("--none");
        args.extend_from_slice(&[
            "--stack",
            "web",
            "--service",
            "app",
            "--service",
            "worker",
            "--notify",
            "nginx -s reload",
            "--log-level",
            "DEBUG",
            "--max-concurrent-renders",
            "4",
            "--skip-empty",
            "--once",
        ]);
        let config = parse(&args).unwrap();
        assert_eq!(
            config.scope,
            Scope::StackServices {
                stack: "web".into(),
                services: vec!["app".into(), "worker".into()],
            }
        );
        assert_eq!(config.notify.as_deref(), Some("nginx -s reload"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_concurrent_renders, Some(4));
        assert!(config.skip_empty);
        assert!(config.once);
    }

    #[test]
    fn test_service_requires_stack() {
        let mut args = without("--none");
        args.extend_from_slice(&["--service", "app"]);
        assert_eq!(parse(&args).unwrap_err(), ConfigError::ServiceWithoutStack);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let mut args = without("--none");
        args.extend_from_slice(&["--max-concurrent-renders", "0"]);
        assert_eq!(parse(&args).unwrap_err(), ConfigError::ZeroConcurrency);
    }

    #[test]
    fn test_secret_key_is_not_in_debug_output() {
        let config = parse(&without("--none")).unwrap();
        assert!(!format!("{config:?}").contains("1234567890abcd"));
    }
}
