//! Configuration validation
//!
//! Validates configuration and reports issues.

use secrecy::ExposeSecret;

use super::types::Config;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    result = validate_credentials(config, result);
    result = validate_retrieval_config(config, result);
    result = validate_backfill_config(config, result);

    result
}

fn validate_credentials(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if config.google.api_key.expose_secret().is_empty() {
        result = result.with_error(
            ValidationIssue::new("google.api_key", "No Google API key configured")
                .with_suggestion("Set the GOOGLE_API_KEY environment variable"),
        );
    }

    if config.database.url.expose_secret().is_empty() {
        result = result.with_error(
            ValidationIssue::new("database.url", "No PostgreSQL URL configured")
                .with_suggestion("Set the DATABASE_URL environment variable"),
        );
    }

    result
}

fn validate_retrieval_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let retrieval = &config.retrieval;

    if !(0.0..=1.0).contains(&retrieval.threshold) {
        result = result.with_error(ValidationIssue::new(
            "retrieval.threshold",
            format!("Threshold must be within [0, 1], got {}", retrieval.threshold),
        ));
    }

    if retrieval.limit == 0 {
        result = result.with_error(ValidationIssue::new(
            "retrieval.limit",
            "Limit must be at least 1",
        ));
    }

    if retrieval.dimensions == 0 {
        result = result.with_error(ValidationIssue::new(
            "retrieval.dimensions",
            "Embedding dimensionality must be positive",
        ));
    }

    if retrieval.limit > 20 {
        result = result.with_warning(
            ValidationIssue::new(
                "retrieval.limit",
                format!("{} matches per prompt is unusually large", retrieval.limit),
            )
            .with_suggestion("Values between 3 and 10 keep the context block focused"),
        );
    }

    result
}

fn validate_backfill_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if config.backfill.batch_size == 0 {
        result = result.with_error(ValidationIssue::new(
            "backfill.batch_size",
            "Batch size must be at least 1",
        ));
    }

    result
}
