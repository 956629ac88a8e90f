//! Declarative platform statements.
//!
//! Statements are kept structured until they reach the platform so that
//! tests can interpret them and the audit script can annotate them.

use std::fmt;

/// Kind of platform object a statement targets.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ObjectKind {
    /// A database.
    Database,
    /// An egress network rule.
    NetworkRule,
    /// An external access integration.
    ExternalAccessIntegration,
    /// A stage holding files.
    Stage,
    /// A compute pool.
    ComputePool,
    /// A container service (long-running or job).
    Service,
}

impl ObjectKind {
    /// Keyword used when creating the object.
    #[must_use]
    pub const fn create_keyword(self) -> &'static str {
        match self {
            Self::Database => "DATABASE",
            Self::NetworkRule => "NETWORK RULE",
            Self::ExternalAccessIntegration => "EXTERNAL ACCESS INTEGRATION",
            Self::Stage => "STAGE",
            Self::ComputePool => "COMPUTE POOL",
            Self::Service => "SERVICE",
        }
    }

    /// Keyword used when granting on, altering, or dropping the object.
    #[must_use]
    pub const fn reference_keyword(self) -> &'static str {
        match self {
            Self::ExternalAccessIntegration => "INTEGRATION",
            other => other.create_keyword(),
        }
    }

    /// Lower-case label used in audit comments.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::NetworkRule => "network rule",
            Self::ExternalAccessIntegration => "external access integration",
            Self::Stage => "stage",
            Self::ComputePool => "compute pool",
            Self::Service => "service",
        }
    }
}

/// How a `CREATE` statement treats an existing object.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CreateMode {
    /// Leave an existing object untouched.
    IfNotExists,
    /// Replace an existing object with the new definition.
    OrReplace,
}

/// A single declarative statement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Statement {
    /// Switch the session to a role.
    UseRole(String),
    /// Create an object.
    Create {
        /// Object kind.
        kind: ObjectKind,
        /// Object name, possibly qualified.
        name: String,
        /// Existing-object behaviour.
        mode: CreateMode,
        /// Rendered `KEY = value` clauses in order.
        properties: Vec<String>,
    },
    /// Grant usage on an object to a role.
    GrantUsage {
        /// Object kind.
        kind: ObjectKind,
        /// Object name.
        name: String,
        /// Receiving role.
        role: String,
    },
    /// Alter an object if it exists.
    Alter {
        /// Object kind.
        kind: ObjectKind,
        /// Object name.
        name: String,
        /// Trailing action, for example `SUSPEND`.
        action: String,
    },
    /// Drop an object if it exists.
    Drop {
        /// Object kind.
        kind: ObjectKind,
        /// Object name.
        name: String,
    },
}

impl Statement {
    /// Builds an [`Statement::Alter`].
    #[must_use]
    pub fn alter(kind: ObjectKind, name: impl Into<String>, action: impl Into<String>) -> Self {
        Self::Alter {
            kind,
            name: name.into(),
            action: action.into(),
        }
    }

    /// Builds a [`Statement::Drop`].
    #[must_use]
    pub fn drop_object(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::Drop {
            kind,
            name: name.into(),
        }
    }

    /// One-line description used as a comment in audit scripts.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::UseRole(role) => format!("Switch to role {role}"),
            Self::Create {
                kind,
                name,
                mode: CreateMode::IfNotExists,
                ..
            } => format!("Create {} {name} if missing", kind.label()),
            Self::Create { kind, name, .. } => format!("Create or replace {} {name}", kind.label()),
            Self::GrantUsage { kind, name, role } => {
                format!("Grant usage on {} {name} to {role}", kind.label())
            }
            Self::Alter { kind, name, action } => format!("{action} {} {name}", kind.label()),
            Self::Drop { kind, name } => format!("Drop {} {name}", kind.label()),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UseRole(role) => write!(formatter, "USE ROLE {role}"),
            Self::Create {
                kind,
                name,
                mode,
                properties,
            } => {
                match mode {
                    CreateMode::IfNotExists => write!(
                        formatter,
                        "CREATE {} IF NOT EXISTS {name}",
                        kind.create_keyword()
                    )?,
                    CreateMode::OrReplace => write!(
                        formatter,
                        "CREATE OR REPLACE {} {name}",
                        kind.create_keyword()
                    )?,
                }
                for property in properties {
                    write!(formatter, " {property}")?;
                }
                Ok(())
            }
            Self::GrantUsage { kind, name, role } => write!(
                formatter,
                "GRANT USAGE ON {} {name} TO ROLE {role}",
                kind.reference_keyword()
            ),
            Self::Alter { kind, name, action } => write!(
                formatter,
                "ALTER {} IF EXISTS {name} {action}",
                kind.reference_keyword()
            ),
            Self::Drop { kind, name } => write!(
                formatter,
                "DROP {} IF EXISTS {name}",
                kind.reference_keyword()
            ),
        }
    }
}

/// Renders statements as a commented script for review.
#[must_use]
pub fn render_script(title: &str, statements: &[Statement]) -> String {
    let mut script = format!("-- {title}\n");
    for statement in statements {
        script.push_str(&format!("\n-- {}\n{statement};\n", statement.summary()));
    }
    script
}
