//! Caller-supplied request context.
//!
//! The engine never authenticates anyone. The caller hands it the
//! viewing identity and whether the request carries the master key.

/// An authenticated viewer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthInfo {
    /// The user ID. Stamped as owner/creator/updater on writes.
    pub user_id: String,
    /// Roles held by the user.
    pub roles: Vec<String>,
}

impl AuthInfo {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: Vec::new(),
        }
    }

    /// Add a role to this viewer.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Context for a single request.
///
/// # Invariants
///
/// - Each request receives its own context; contexts are never shared
///   across concurrent requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestContext {
    /// The viewing user, if authenticated.
    pub auth: Option<AuthInfo>,
    /// Whether the request was made with the master key.
    pub master_key: bool,
}

impl RequestContext {
    /// An unauthenticated request.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A request made by the given user.
    #[must_use]
    pub const fn user(auth: AuthInfo) -> Self {
        Self {
            auth: Some(auth),
            master_key: false,
        }
    }

    /// Mark the request as carrying the master key.
    #[must_use]
    pub const fn with_master_key(mut self) -> Self {
        self.master_key = true;
        self
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.auth.as_ref().map(|auth| auth.user_id.as_str())
    }

    /// Whether the request bypasses record ACL and field ACL checks.
    ///
    /// A request is elevated when it carries the master key or when the
    /// viewer holds one of `admin_roles`.
    #[must_use]
    pub fn is_elevated(&self, admin_roles: &[String]) -> bool {
        self.master_key
            || self
                .auth
                .as_ref()
                .is_some_and(|auth| admin_roles.iter().any(|role| auth.has_role(role)))
    }
}
