use crate::environment::AppEnvironment;
use console::style;
use impactarea_core::ImpactError;
use std::fmt;

/// Error shown to the user with suggestions
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            help_command: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn unknown_run_mode(value: &str) -> CliError {
    CliError::new(format!("Unknown run mode '{}'", value))
        .with_suggestion("Set RUN_MODE_ENV to api or processor")
        .with_suggestion("Or pick a subcommand: impactarea process | impactarea serve")
        .with_help("Run: impactarea --help")
}

pub fn unknown_environment(value: &str) -> CliError {
    CliError::new(format!("Unknown application environment '{}'", value))
        .with_context("APP_ENVIRONMENT must be local, integration, validation or production.")
        .with_suggestion("export APP_ENVIRONMENT=local")
}

pub fn input_path_missing(environment: AppEnvironment) -> CliError {
    let error = CliError::new("No input document given")
        .with_context(format!("Application environment: {}", environment.as_str()));
    match environment {
        AppEnvironment::Local => error
            .with_suggestion("Pass --input-path path/to/input.json")
            .with_suggestion("Or set INPUT_JSON_PATH")
            .with_help("Run: impactarea process --help"),
        _ => error
            .with_suggestion("Pass --input-path path/to/input.json")
            .with_help("Run: impactarea process --help"),
    }
}

pub fn store_not_found(path: &str) -> CliError {
    CliError::new("Store not found")
        .with_context(format!("No exported store exists at this path.\n\nPath: {}", path))
        .with_suggestion("Check the path of the .zarr directory")
        .with_suggestion("Export locally: impactarea process --cloud-storage-provider LOCAL")
        .with_help("Run: impactarea inspect --help")
}

/// Map a domain error onto a message with remedies
pub fn from_impact(error: &ImpactError) -> CliError {
    let base = CliError::new(error.to_string());
    match error {
        ImpactError::MissingCredentials { provider } if provider.starts_with("AWS") => base
            .with_suggestion("Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY")
            .with_suggestion("Or export locally: --cloud-storage-provider LOCAL"),
        ImpactError::MissingCredentials { .. } => base
            .with_suggestion(
                "Set AZURE_ACCOUNT_NAME, AZURE_SAS_CREDENTIAL and AZURE_BLOB_CONTAINER_NAME",
            )
            .with_suggestion("Or export locally: --cloud-storage-provider LOCAL"),
        ImpactError::ConfigMissing { key } => {
            base.with_suggestion(format!("Set {} in the environment", key))
        }
        ImpactError::Authentication { .. } | ImpactError::NotAuthorized => base
            .with_suggestion("Pass a valid --bearer-token")
            .with_suggestion("Or set API_CLIENT_ID, API_CLIENT_SECRET, API_USERNAME and API_PASSWORD"),
        ImpactError::UnknownIndex { .. } => base
            .with_suggestion("Use an index code such as NDVI, EVI or NDWI in \"indicator\""),
        ImpactError::InsufficientData { .. } | ImpactError::DataUnavailable { .. } => base
            .with_suggestion("Check that imagery exists around the event date")
            .with_suggestion("Or widen the search: --search-window-months 12"),
        _ => base,
    }
}

/// Convert anyhow::Error to CliError with context
pub fn from_anyhow(error: anyhow::Error) -> CliError {
    if let Some(cli) = error.downcast_ref::<CliError>() {
        return CliError {
            message: cli.message.clone(),
            context: cli.context.clone(),
            suggestions: cli.suggestions.clone(),
            help_command: cli.help_command.clone(),
        };
    }
    if let Some(impact) = error.chain().find_map(|e| e.downcast_ref::<ImpactError>()) {
        let mut converted = from_impact(impact);
        if error.to_string() != impact.to_string() {
            converted = converted.with_context(format!("{:#}", error));
        }
        return converted;
    }

    let message = error.to_string();
    if message.contains("No such file or directory") {
        CliError::new("File not found")
            .with_context(format!("Error: {:#}", error))
            .with_suggestion("Check the file path and try again")
    } else {
        CliError::new(format!("{:#}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_missing_aws_credentials_suggests_local() {
        let err = from_impact(&ImpactError::MissingCredentials {
            provider: "AWS S3".to_string(),
        });
        assert_eq!(err.message, "Missing AWS S3 credentials");
        assert!(err.suggestions.iter().any(|s| s.contains("LOCAL")));
    }

    #[test]
    fn test_from_anyhow_keeps_domain_error() {
        let result: anyhow::Result<()> = Err(ImpactError::UnknownIndex {
            name: "NDXI".to_string(),
        })
        .context("Failed to validate input");

        let err = from_anyhow(result.unwrap_err());
        assert!(err.message.contains("NDXI"));
        assert!(err.context.unwrap().contains("Failed to validate input"));
        assert_eq!(err.suggestions.len(), 1);
    }

    #[test]
    fn test_from_anyhow_keeps_cli_error() {
        let err = from_anyhow(anyhow::Error::new(store_not_found("/tmp/missing.zarr")));
        assert_eq!(err.message, "Store not found");
        assert_eq!(err.suggestions.len(), 2);
    }
}
