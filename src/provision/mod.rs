//! Resource provisioner: creates and removes the platform objects an ML
//! workload needs.
//!
//! Provisioning is expressed as an ordered batch of idempotent statements
//! executed in a single platform session. Running the batch twice leaves the
//! account in the same state as running it once.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::platform::Platform;

mod config;
mod statement;

pub use config::InfraConfig;
pub use statement::{CreateMode, ObjectKind, Statement, render_script};

/// Compute pool sizing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComputePoolSpec {
    /// Pool name.
    pub name: String,
    /// Instance family for nodes.
    pub instance_family: String,
    /// Minimum node count.
    pub min_nodes: u32,
    /// Maximum node count.
    pub max_nodes: u32,
}

/// Full description of the infrastructure to provision.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InfraSpec {
    /// Database name.
    pub database: String,
    /// Schema inside the database.
    pub schema: String,
    /// Role the batch runs as and that receives integration usage.
    pub admin_role: String,
    /// Compute pool settings.
    pub pool: ComputePoolSpec,
    /// Unqualified stage name.
    pub stage_name: String,
    /// Stage encryption type.
    pub stage_encryption: String,
    /// External access integration name.
    pub integration_name: String,
    /// `host:port` egress destinations.
    pub egress_hosts: Vec<String>,
}

/// Errors raised by [`InfraSpec::validate`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SpecError {
    /// A name contains characters outside `[A-Za-z0-9_$]` or starts with a digit.
    #[error("{field} '{value}' is not a valid identifier")]
    InvalidIdentifier {
        /// Field holding the value.
        field: &'static str,
        /// Rejected value.
        value: String,
    },
    /// Node counts are zero or inverted.
    #[error("node range {min}..={max} is invalid: need 0 < min_nodes <= max_nodes")]
    InvalidNodeRange {
        /// Configured minimum.
        min: u32,
        /// Configured maximum.
        max: u32,
    },
    /// No egress destinations were configured.
    #[error("at least one egress host is required")]
    NoEgressHosts,
    /// An egress destination is not `host:port`.
    #[error("egress host '{0}' must look like host:port with a port in 1..=65535")]
    InvalidEgressHost(String),
}

impl SpecError {
    /// Configuration field responsible for the error.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { field, .. } => *field,
            Self::InvalidNodeRange { .. } => "min_nodes",
            Self::NoEgressHosts | Self::InvalidEgressHost(_) => "egress_hosts",
        }
    }
}

pub(crate) fn check_identifier(field: &'static str, value: &str) -> Result<(), SpecError> {
    let valid = value
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$');
    if valid {
        Ok(())
    } else {
        Err(SpecError::InvalidIdentifier {
            field,
            value: value.to_owned(),
        })
    }
}

/// Accepts `NAME`, `SCHEMA.NAME` or `DB.SCHEMA.NAME` where every part is an
/// identifier.
pub(crate) fn check_qualified_identifier(
    field: &'static str,
    value: &str,
) -> Result<(), SpecError> {
    let parts_valid = value.split('.').count() <= 3
        && value
            .split('.')
            .all(|part| check_identifier(field, part).is_ok());
    if parts_valid {
        Ok(())
    } else {
        Err(SpecError::InvalidIdentifier {
            field,
            value: value.to_owned(),
        })
    }
}

fn check_egress_host(entry: &str) -> Result<(), SpecError> {
    let invalid = || SpecError::InvalidEgressHost(entry.to_owned());
    let (host, port) = entry.rsplit_once(':').ok_or_else(invalid)?;
    let host_ok = !host.is_empty()
        && host
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '*'));
    let port_ok = port.parse::<u16>().is_ok_and(|number| number > 0);
    if host_ok && port_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}

impl InfraSpec {
    /// Checks names, node range, and egress destinations.
    ///
    /// # Errors
    ///
    /// Returns the first [`SpecError`] found.
    pub fn validate(&self) -> Result<(), SpecError> {
        check_identifier("database", &self.database)?;
        check_identifier("schema", &self.schema)?;
        check_identifier("admin_role", &self.admin_role)?;
        check_identifier("pool_name", &self.pool.name)?;
        check_identifier("instance_family", &self.pool.instance_family)?;
        check_identifier("stage_name", &self.stage_name)?;
        check_identifier("stage_encryption", &self.stage_encryption)?;
        check_identifier("integration_name", &self.integration_name)?;
        if self.pool.min_nodes == 0 || self.pool.min_nodes > self.pool.max_nodes {
            return Err(SpecError::InvalidNodeRange {
                min: self.pool.min_nodes,
                max: self.pool.max_nodes,
            });
        }
        if self.egress_hosts.is_empty() {
            return Err(SpecError::NoEgressHosts);
        }
        self.egress_hosts
            .iter()
            .try_for_each(|entry| check_egress_host(entry))
    }

    /// Fully qualified stage name.
    #[must_use]
    pub fn qualified_stage(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.stage_name)
    }

    /// Fully qualified network rule name derived from the integration.
    #[must_use]
    pub fn network_rule(&self) -> String {
        format!(
            "{}.{}.{}_RULE",
            self.database, self.schema, self.integration_name
        )
    }

    /// Statements that create the infrastructure, in dependency order.
    #[must_use]
    pub fn setup_statements(&self) -> Vec<Statement> {
        let hosts = self
            .egress_hosts
            .iter()
            .map(|host| format!("'{host}'"))
            .collect::<Vec<_>>()
            .join(", ");
        vec![
            Statement::UseRole(self.admin_role.clone()),
            Statement::Create {
                kind: ObjectKind::Database,
                name: self.database.clone(),
                mode: CreateMode::IfNotExists,
                properties: Vec::new(),
            },
            Statement::Create {
                kind: ObjectKind::NetworkRule,
                name: self.network_rule(),
                mode: CreateMode::OrReplace,
                properties: vec![
                    String::from("MODE = EGRESS"),
                    String::from("TYPE = HOST_PORT"),
                    format!("VALUE_LIST = ({hosts})"),
                ],
            },
            Statement::Create {
                kind: ObjectKind::ExternalAccessIntegration,
                name: self.integration_name.clone(),
                mode: CreateMode::OrReplace,
                properties: vec![
                    format!("ALLOWED_NETWORK_RULES = ({})", self.network_rule()),
                    String::from("ENABLED = TRUE"),
                ],
            },
            Statement::GrantUsage {
                kind: ObjectKind::ExternalAccessIntegration,
                name: self.integration_name.clone(),
                role: self.admin_role.clone(),
            },
            Statement::Create {
                kind: ObjectKind::Stage,
                name: self.qualified_stage(),
                mode: CreateMode::IfNotExists,
                properties: vec![format!("ENCRYPTION = (TYPE = '{}')", self.stage_encryption)],
            },
            Statement::Create {
                kind: ObjectKind::ComputePool,
                name: self.pool.name.clone(),
                mode: CreateMode::IfNotExists,
                properties: vec![
                    format!("MIN_NODES = {}", self.pool.min_nodes),
                    format!("MAX_NODES = {}", self.pool.max_nodes),
                    format!("INSTANCE_FAMILY = {}", self.pool.instance_family),
                ],
            },
        ]
    }

    /// Statements that remove the infrastructure, dependants first.
    #[must_use]
    pub fn teardown_statements(&self, options: TeardownOptions) -> Vec<Statement> {
        let mut statements = vec![
            Statement::UseRole(self.admin_role.clone()),
            Statement::drop_object(
                ObjectKind::ExternalAccessIntegration,
                self.integration_name.clone(),
            ),
            Statement::drop_object(ObjectKind::NetworkRule, self.network_rule()),
            Statement::alter(ObjectKind::ComputePool, self.pool.name.clone(), "STOP ALL"),
            Statement::alter(ObjectKind::ComputePool, self.pool.name.clone(), "SUSPEND"),
            Statement::drop_object(ObjectKind::ComputePool, self.pool.name.clone()),
        ];
        if options.drop_stage {
            statements.push(Statement::drop_object(
                ObjectKind::Stage,
                self.qualified_stage(),
            ));
        }
        if options.drop_database {
            statements.push(Statement::drop_object(
                ObjectKind::Database,
                self.database.clone(),
            ));
        }
        statements
    }
}

/// Optional destructive steps for teardown. Both default to keeping data.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TeardownOptions {
    /// Drop the stage and every file in it.
    pub drop_stage: bool,
    /// Drop the database.
    pub drop_database: bool,
}

/// Names of the objects a successful provisioning run guarantees exist.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProvisionedInfra {
    /// Database name.
    pub database: String,
    /// Compute pool name.
    pub compute_pool: String,
    /// Fully qualified stage name.
    pub stage: String,
    /// Fully qualified network rule name.
    pub network_rule: String,
    /// External access integration name.
    pub integration: String,
}

impl From<&InfraSpec> for ProvisionedInfra {
    fn from(spec: &InfraSpec) -> Self {
        Self {
            database: spec.database.clone(),
            compute_pool: spec.pool.name.clone(),
            stage: spec.qualified_stage(),
            network_rule: spec.network_rule(),
            integration: spec.integration_name.clone(),
        }
    }
}

/// Errors surfaced by [`Provisioner`].
#[derive(Debug, Error)]
pub enum ProvisionError<E>
where
    E: std::error::Error + 'static,
{
    /// The infrastructure description failed validation; nothing was sent.
    #[error("invalid infrastructure settings: {0}")]
    Validation(#[from] SpecError),
    /// The platform rejected a statement.
    #[error("provisioning failed: {0}")]
    Platform(#[source] E),
}

/// Applies [`InfraSpec`] batches through a [`Platform`].
#[derive(Clone, Debug)]
pub struct Provisioner<P> {
    platform: P,
}

impl<P: Platform> Provisioner<P> {
    /// Wraps a platform.
    #[must_use]
    pub const fn new(platform: P) -> Self {
        Self { platform }
    }

    /// Creates any missing objects described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Validation`] before any remote call when the
    /// spec is invalid, or [`ProvisionError::Platform`] when the batch fails.
    pub async fn ensure(
        &self,
        spec: &InfraSpec,
    ) -> Result<ProvisionedInfra, ProvisionError<P::Error>> {
        spec.validate()?;
        let statements = spec.setup_statements();
        info!(
            database = %spec.database,
            pool = %spec.pool.name,
            statements = statements.len(),
            "provisioning infrastructure"
        );
        self.platform
            .execute_batch(&statements)
            .await
            .map_err(ProvisionError::Platform)?;
        Ok(ProvisionedInfra::from(spec))
    }

    /// Removes the objects described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] on validation or platform failure.
    pub async fn teardown(
        &self,
        spec: &InfraSpec,
        options: TeardownOptions,
    ) -> Result<(), ProvisionError<P::Error>> {
        spec.validate()?;
        let statements = spec.teardown_statements(options);
        info!(
            pool = %spec.pool.name,
            drop_stage = options.drop_stage,
            drop_database = options.drop_database,
            "tearing down infrastructure"
        );
        self.platform
            .execute_batch(&statements)
            .await
            .map_err(ProvisionError::Platform)
    }
}
