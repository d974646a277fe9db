use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{expand_command_abbrev, known_command_names};
use crate::config::Config;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

/// A `--rc key=value` flag.
#[derive(Debug, Clone)]
pub struct RcOverride {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for RcOverride {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow!("--rc needs a key before '=': {s}"));
        }
        Ok(Self {
            key: key.to_string(),
            value: value.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "hrcal",
    version,
    about = "HR calendar: payroll, onboarding and other HR events around Korean public holidays",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<RcOverride>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<RcOverride>,

    #[arg(long = "hrcalrc")]
    pub hrcalrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

/// `-q` beats `-v`; `RUST_LOG` beats both.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        (0, _) => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let stderr_is_tty = std::io::stderr().is_terminal();
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(stderr_is_tty)
        .try_init()
    {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let (cleaned_args, rc_overrides): (Vec<_>, Vec<_>) = raw
        .iter()
        .enumerate()
        .map(|(idx, arg)| match positional_override(idx, arg) {
            Some(pair) => (None, Some(pair)),
            None => (Some(arg.clone()), None),
        })
        .unzip();

    let rc_overrides: Vec<(String, String)> = rc_overrides.into_iter().flatten().collect();
    for (key, value) in &rc_overrides {
        debug!(key = %key, value = %value, "captured positional rc override");
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned_args.into_iter().flatten().collect(),
        rc_overrides,
    })
}

/// The binary name at index 0 is never an override.
fn positional_override(idx: usize, arg: &OsString) -> Option<(String, String)> {
    if idx == 0 {
        return None;
    }
    let text = arg.to_string_lossy();
    let rest = text.strip_prefix("rc.")?;
    let (key, value) = rest.split_once('=').or_else(|| rest.split_once(':'))?;
    Some((format!("rc.{key}"), value.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// The command must come first; otherwise every token is handed to
    /// `default.command` as its arguments.
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let known = known_command_names();
        if let Some(first) = tokens.first()
            && let Some(full) = expand_command_abbrev(first, &known)
        {
            debug!(token = %first, expanded = %full, "resolved command token");
            return Ok(Self {
                command: full.to_string(),
                args: tokens[1..].to_vec(),
            });
        }

        let default = cfg
            .get("default.command")
            .unwrap_or_else(|| "show".to_string());
        let command = expand_command_abbrev(&default, &known)
            .ok_or_else(|| anyhow!("default.command is not a known command: {default}"))?
            .to_string();
        debug!(command = %command, args = ?tokens, "no explicit command, using default");

        Ok(Self {
            command,
            args: tokens,
        })
    }
}
