//! Engine configuration module.
//!
//! This module provides configuration loading for the record engine from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `RECORD_ENGINE_USER_RECORD_TYPE`: Record type holding user records (default: `user`)
//! - `RECORD_ENGINE_ADMIN_ROLES`: Comma-separated roles that bypass ACL checks (default: `admin`)
//! - `RECORD_ENGINE_LOG`: Default tracing filter (default: `record_engine=info`)
//!
//! # Invariants
//!
//! - `user_record_type` is never empty and never contains `/`
//! - `admin_roles` never contains an empty role name

/// Engine configuration.
///
/// # Post-conditions
///
/// When constructed via `from_env()` or `default()`, all invariants of the
/// module hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// The designated user record type.
    /// Records of this type cannot be deleted through the engine, and the
    /// reserved user keypaths (`_owner_id`, `_created_by`, `_updated_by`)
    /// resolve to records of this type.
    pub user_record_type: String,
    /// Roles treated as elevated, like the master key.
    pub admin_roles: Vec<String>,
    /// Default tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is missing.
    MissingEnvVar(String),
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEnvVar(name) => {
                write!(f, "missing required environment variable: {name}")
            }
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_record_type: Self::DEFAULT_USER_RECORD_TYPE.to_owned(),
            admin_roles: vec![Self::DEFAULT_ADMIN_ROLE.to_owned()],
            log_filter: Self::DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}

impl EngineConfig {
    /// Default user record type.
    pub const DEFAULT_USER_RECORD_TYPE: &'static str = "user";
    /// Default admin role.
    pub const DEFAULT_ADMIN_ROLE: &'static str = "admin";
    /// Default tracing filter.
    pub const DEFAULT_LOG_FILTER: &'static str = "record_engine=info";

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `RECORD_ENGINE_USER_RECORD_TYPE` is set but empty or contains `/`
    /// - `RECORD_ENGINE_ADMIN_ROLES` is set but contains an empty role
    pub fn from_env() -> Result<Self, ConfigError> {
        let user_record_type = Self::load_user_record_type()?;
        let admin_roles = Self::load_admin_roles()?;
        let log_filter = Self::load_log_filter();

        Ok(Self {
            user_record_type,
            admin_roles,
            log_filter,
        })
    }

    /// Load the user record type from environment.
    ///
    /// Returns the default if not set.
    fn load_user_record_type() -> Result<String, ConfigError> {
        match std::env::var("RECORD_ENGINE_USER_RECORD_TYPE") {
            Ok(value) => Self::validate_user_record_type(value),
            Err(_) => Ok(Self::DEFAULT_USER_RECORD_TYPE.to_owned()),
        }
    }

    fn validate_user_record_type(value: String) -> Result<String, ConfigError> {
        if value.is_empty() || value.contains('/') {
            return Err(ConfigError::InvalidValue {
                name: "RECORD_ENGINE_USER_RECORD_TYPE".to_owned(),
                message: format!("'{value}' must be non-empty and must not contain '/'"),
            });
        }
        Ok(value)
    }

    /// Load the admin roles from environment.
    ///
    /// Returns the default if not set.
    fn load_admin_roles() -> Result<Vec<String>, ConfigError> {
        match std::env::var("RECORD_ENGINE_ADMIN_ROLES") {
            Ok(value) => Self::parse_admin_roles(&value),
            Err(_) => Ok(vec![Self::DEFAULT_ADMIN_ROLE.to_owned()]),
        }
    }

    fn parse_admin_roles(value: &str) -> Result<Vec<String>, ConfigError> {
        if value.trim().is_empty() {
            return Ok(Vec::new());
        }
        value
            .split(',')
            .map(str::trim)
            .map(|role| {
                if role.is_empty() {
                    Err(ConfigError::InvalidValue {
                        name: "RECORD_ENGINE_ADMIN_ROLES".to_owned(),
                        message: format!("'{value}' contains an empty role name"),
                    })
                } else {
                    Ok(role.to_owned())
                }
            })
            .collect()
    }

    /// Load the default log filter from environment.
    fn load_log_filter() -> String {
        std::env::var("RECORD_ENGINE_LOG").unwrap_or_else(|_| Self::DEFAULT_LOG_FILTER.to_owned())
    }
}
