//! `ci-clone`: bring a CI workspace to an exact revision of a remote repository.
//!
//! Every flag can also be supplied through the pipeline's environment. Values
//! given explicitly win over the optional TOML settings file, which wins over
//! built-in defaults.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use ci_clone::clone::Engine;
use ci_clone::core::classifier::classify_event;
use ci_clone::core::types::{BuildContext, CloneConfig, EventKind};
use ci_clone::exit_codes;
use ci_clone::io::config::{CloneSettings, load_settings};
use ci_clone::io::credentials::{Credentials, Netrc, home_dir};
use ci_clone::io::executor::GitExecutor;
use ci_clone::logging;

#[derive(Debug, Parser)]
#[command(
    name = "ci-clone",
    version,
    about = "Materialize a CI workspace at an exact repository revision"
)]
struct Cli {
    /// Remote repository URL.
    #[arg(long, env = "CI_REMOTE_URL")]
    remote: String,
    /// Workspace directory (defaults to the current directory).
    #[arg(long, env = "CI_WORKSPACE")]
    path: Option<PathBuf>,
    /// Commit the workspace must end up at (required for ordinary events).
    #[arg(long, env = "CI_COMMIT_SHA", default_value = "")]
    sha: String,
    #[arg(long = "ref", env = "CI_COMMIT_REF", default_value = "refs/heads/master")]
    git_ref: String,
    /// Build event label (`push`, `pull_request`, `tag`, ...).
    #[arg(long, env = "CI_BUILD_EVENT", default_value = "push")]
    event: String,
    #[arg(long, env = "CI_COMMIT_BRANCH")]
    branch: Option<String>,
    #[arg(long, env = "CI_BUILD_NUMBER")]
    number: Option<u64>,

    #[arg(long, env = "CI_NETRC_MACHINE")]
    netrc_machine: Option<String>,
    #[arg(long, env = "CI_NETRC_USERNAME")]
    netrc_username: Option<String>,
    #[arg(long, env = "CI_NETRC_PASSWORD", hide_env_values = true)]
    netrc_password: Option<String>,
    /// Private key written to `~/.ssh/id_rsa`.
    #[arg(long, env = "PLUGIN_SSH_KEY", hide_env_values = true)]
    ssh_key: Option<String>,

    /// Shallow fetch depth; 0 fetches full history.
    #[arg(long, env = "PLUGIN_DEPTH")]
    depth: Option<u32>,
    /// Initialize and update submodules after checkout.
    #[arg(long, env = "PLUGIN_RECURSIVE", num_args = 0..=1, default_missing_value = "true")]
    recursive: Option<bool>,
    /// Fetch tags along with the ref.
    #[arg(long, env = "PLUGIN_TAGS", num_args = 0..=1, default_missing_value = "true")]
    tags: Option<bool>,
    /// Disable TLS certificate verification for the remote.
    #[arg(long, env = "PLUGIN_SKIP_VERIFY", num_args = 0..=1, default_missing_value = "true")]
    skip_verify: Option<bool>,
    /// Update submodules to their remote-tracking branch.
    #[arg(
        long,
        env = "PLUGIN_SUBMODULE_UPDATE_REMOTE",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    submodule_update_remote: Option<bool>,
    /// JSON object mapping submodule names to replacement URLs.
    #[arg(long, env = "PLUGIN_SUBMODULE_OVERRIDE", value_parser = parse_overrides)]
    submodule_override: Option<BTreeMap<String, String>>,

    /// Full clone attempts, each on a freshly deleted workspace.
    #[arg(long, env = "PLUGIN_ATTEMPTS")]
    attempts: Option<u32>,
    /// Delay before retrying a transiently failing operation (e.g. `5s`).
    #[arg(long, env = "PLUGIN_BACKOFF", value_parser = humantime::parse_duration)]
    backoff: Option<Duration>,
    /// Retries of a transiently failing operation.
    #[arg(long, env = "PLUGIN_BACKOFF_ATTEMPTS")]
    backoff_attempts: Option<u32>,

    /// Optional TOML settings file.
    #[arg(long, env = "PLUGIN_CONFIG")]
    config: Option<PathBuf>,
}

/// Fully resolved inputs for one engine run.
#[derive(Debug)]
struct Request {
    root: PathBuf,
    ctx: BuildContext,
    config: CloneConfig,
    credentials: Credentials,
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let request = match cli.into_request() {
        Ok(request) => request,
        Err(err) => {
            eprintln!("{:#}", err);
            process::exit(exit_codes::INVALID);
        }
    };
    if let Err(err) = run(&request) {
        eprintln!("{:#}", err);
        process::exit(exit_codes::FAILED);
    }
}

fn run(request: &Request) -> Result<()> {
    info!(
        remote = %request.ctx.remote_url,
        branch = request.ctx.branch.as_deref().unwrap_or(""),
        number = ?request.ctx.number,
        "starting clone"
    );
    // A CI step has no terminal to answer credential prompts.
    let engine = Engine::new(GitExecutor::new().with_env("GIT_TERMINAL_PROMPT", "0"));
    let outcome = engine
        .run(
            &request.root,
            &request.ctx,
            &request.config,
            &request.credentials,
        )
        .with_context(|| {
            format!(
                "clone {} into {}",
                request.ctx.remote_url,
                request.root.display()
            )
        })?;
    info!(attempts = outcome.attempts, event = ?outcome.event, "workspace ready");
    Ok(())
}

impl Cli {
    fn into_request(self) -> Result<Request> {
        let settings = match &self.config {
            Some(path) => load_settings(path)?,
            None => CloneSettings::default(),
        };
        let config = self.overlay(settings.into_config());

        let root = match &self.path {
            Some(path) => path.clone(),
            None => env::current_dir().context("resolve current directory")?,
        };
        let ctx = BuildContext {
            remote_url: self.remote,
            event: self.event,
            git_ref: self.git_ref,
            commit: self.sha,
            branch: self.branch.filter(|branch| !branch.is_empty()),
            number: self.number,
        };
        validate(&ctx, &config)?;

        let netrc = self.netrc_machine.map(|machine| Netrc {
            machine,
            login: self.netrc_username.unwrap_or_default(),
            password: self.netrc_password.unwrap_or_default(),
        });
        let credentials = Credentials {
            home: home_dir(),
            netrc,
            ssh_key: self.ssh_key,
        };

        Ok(Request {
            root,
            ctx,
            config,
            credentials,
        })
    }

    /// Apply explicitly supplied values on top of `base`.
    fn overlay(&self, base: CloneConfig) -> CloneConfig {
        CloneConfig {
            depth: self.depth.unwrap_or(base.depth),
            tags: self.tags.unwrap_or(base.tags),
            skip_verify: self.skip_verify.unwrap_or(base.skip_verify),
            recursive: self.recursive.unwrap_or(base.recursive),
            submodule_remote: self
                .submodule_update_remote
                .unwrap_or(base.submodule_remote),
            submodule_overrides: self
                .submodule_override
                .clone()
                .unwrap_or(base.submodule_overrides),
            outer_attempts: self.attempts.unwrap_or(base.outer_attempts),
            backoff: self.backoff.unwrap_or(base.backoff),
            backoff_attempts: self.backoff_attempts.unwrap_or(base.backoff_attempts),
        }
    }
}

fn validate(ctx: &BuildContext, config: &CloneConfig) -> Result<()> {
    if ctx.remote_url.trim().is_empty() {
        bail!("remote url must be non-empty");
    }
    if ctx.git_ref.trim().is_empty() {
        bail!("ref must be non-empty");
    }
    if classify_event(&ctx.event, &ctx.git_ref) == EventKind::Ordinary
        && ctx.commit.trim().is_empty()
    {
        bail!(
            "commit sha is required for `{}` events on {}",
            ctx.event,
            ctx.git_ref
        );
    }
    if config
        .submodule_overrides
        .keys()
        .any(|name| name.trim().is_empty())
    {
        bail!("submodule override names must be non-empty");
    }
    if let Some((name, _)) = config
        .submodule_overrides
        .iter()
        .find(|(_, url)| url.trim().is_empty())
    {
        bail!("submodule override url for `{name}` must be non-empty");
    }
    Ok(())
}

fn parse_overrides(raw: &str) -> Result<BTreeMap<String, String>, String> {
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(raw).map_err(|err| format!("expected a JSON object of strings: {err}"))
}
