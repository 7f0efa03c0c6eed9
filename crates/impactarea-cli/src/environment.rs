//! Deployment environment and run mode resolution

use crate::errors::{self, CliError};
use std::env;
use std::path::PathBuf;

pub const RUN_MODE_VAR: &str = "RUN_MODE_ENV";
pub const APP_ENVIRONMENT_VAR: &str = "APP_ENVIRONMENT";
pub const INPUT_JSON_PATH_VAR: &str = "INPUT_JSON_PATH";

/// What the binary does when started without a subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Api,
    Processor,
}

impl RunMode {
    pub fn parse(value: Option<&str>) -> Result<Self, CliError> {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("processor") => Ok(RunMode::Processor),
            Some("api") => Ok(RunMode::Api),
            Some(other) => Err(errors::unknown_run_mode(other)),
        }
    }

    pub fn from_env() -> Result<Self, CliError> {
        Self::parse(env::var(RUN_MODE_VAR).ok().as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Local,
    Integration,
    Validation,
    Production,
}

impl AppEnvironment {
    /// Unset means `local`
    pub fn parse(value: Option<&str>) -> Result<Self, CliError> {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("local") => Ok(AppEnvironment::Local),
            Some("integration") => Ok(AppEnvironment::Integration),
            Some("validation") => Ok(AppEnvironment::Validation),
            Some("production") => Ok(AppEnvironment::Production),
            Some(other) => Err(errors::unknown_environment(other)),
        }
    }

    pub fn from_env() -> Result<Self, CliError> {
        Self::parse(env::var(APP_ENVIRONMENT_VAR).ok().as_deref())
    }

    /// Where the input document is read from
    ///
    /// `local` takes `--input-path` or `INPUT_JSON_PATH`; deployed
    /// environments only accept `--input-path`.
    pub fn input_path(
        &self,
        argument: Option<PathBuf>,
        input_json_path: Option<String>,
    ) -> Result<PathBuf, CliError> {
        match self {
            AppEnvironment::Local => argument
                .or_else(|| {
                    input_json_path
                        .filter(|p| !p.trim().is_empty())
                        .map(PathBuf::from)
                })
                .ok_or_else(|| errors::input_path_missing(*self)),
            _ => argument.ok_or_else(|| errors::input_path_missing(*self)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnvironment::Local => "local",
            AppEnvironment::Integration => "integration",
            AppEnvironment::Validation => "validation",
            AppEnvironment::Production => "production",
        }
    }
}
