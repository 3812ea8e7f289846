//! Per-request authorisation: the authenticated manager identity and the
//! OAuth scope table mapping each operation to the scopes that allow it.
//!
//! Authentication itself happens upstream; the engine only consumes the
//! extracted [`CallContext`].

use crate::errors::Error;
use crate::models::Manager;
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

/// Scope for operational intent coordination
pub const STRATEGIC_COORDINATION_SCOPE: &str = "utm.strategic_coordination";
/// Scope for constraint administration
pub const CONSTRAINT_MANAGEMENT_SCOPE: &str = "utm.constraint_management";
/// Scope for reading constraints and subscribing to them
pub const CONSTRAINT_PROCESSING_SCOPE: &str = "utm.constraint_processing";
/// Scope for off-nominal state declarations
pub const CONFORMANCE_MONITORING_SA_SCOPE: &str = "utm.conformance_monitoring_sa";
/// Blanket scope granting the full operation surface
pub const VERTIPORT_MANAGEMENT_SCOPE: &str = "utm.vertiport_management";

/// Operations of the public surface, used as keys into the scope table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateOperationalIntent,
    UpdateOperationalIntent,
    DeleteOperationalIntent,
    GetOperationalIntent,
    QueryOperationalIntents,
    CreateConstraint,
    UpdateConstraint,
    DeleteConstraint,
    GetConstraint,
    QueryConstraints,
    CreateSubscription,
    UpdateSubscription,
    DeleteSubscription,
    GetSubscription,
    QuerySubscriptions,
    PutVertiport,
    DeleteVertiport,
    GetVertiport,
    GetFatoAvailableTimes,
    GetNumberOfUsedParkingPlaces,
}

lazy_static! {
    /// Required scope sets per operation; any one claimed scope suffices
    static ref AUTH_SCOPES: HashMap<Operation, Vec<&'static str>> = {
        let mut scopes = HashMap::new();
        scopes.insert(
            Operation::CreateOperationalIntent,
            vec![STRATEGIC_COORDINATION_SCOPE, CONFORMANCE_MONITORING_SA_SCOPE],
        );
        scopes.insert(
            Operation::UpdateOperationalIntent,
            vec![STRATEGIC_COORDINATION_SCOPE, CONFORMANCE_MONITORING_SA_SCOPE],
        );
        scopes.insert(
            Operation::DeleteOperationalIntent,
            vec![STRATEGIC_COORDINATION_SCOPE, CONFORMANCE_MONITORING_SA_SCOPE],
        );
        scopes.insert(
            Operation::GetOperationalIntent,
            vec![STRATEGIC_COORDINATION_SCOPE, CONFORMANCE_MONITORING_SA_SCOPE],
        );
        scopes.insert(
            Operation::QueryOperationalIntents,
            vec![STRATEGIC_COORDINATION_SCOPE, CONFORMANCE_MONITORING_SA_SCOPE],
        );
        scopes.insert(Operation::CreateConstraint, vec![CONSTRAINT_MANAGEMENT_SCOPE]);
        scopes.insert(Operation::UpdateConstraint, vec![CONSTRAINT_MANAGEMENT_SCOPE]);
        scopes.insert(Operation::DeleteConstraint, vec![CONSTRAINT_MANAGEMENT_SCOPE]);
        scopes.insert(
            Operation::GetConstraint,
            vec![CONSTRAINT_MANAGEMENT_SCOPE, CONSTRAINT_PROCESSING_SCOPE],
        );
        scopes.insert(
            Operation::QueryConstraints,
            vec![CONSTRAINT_PROCESSING_SCOPE, CONSTRAINT_MANAGEMENT_SCOPE],
        );
        scopes.insert(
            Operation::CreateSubscription,
            vec![STRATEGIC_COORDINATION_SCOPE, CONSTRAINT_PROCESSING_SCOPE],
        );
        scopes.insert(
            Operation::UpdateSubscription,
            vec![STRATEGIC_COORDINATION_SCOPE, CONSTRAINT_PROCESSING_SCOPE],
        );
        scopes.insert(
            Operation::DeleteSubscription,
            vec![STRATEGIC_COORDINATION_SCOPE, CONSTRAINT_PROCESSING_SCOPE],
        );
        scopes.insert(
            Operation::GetSubscription,
            vec![STRATEGIC_COORDINATION_SCOPE, CONSTRAINT_PROCESSING_SCOPE],
        );
        scopes.insert(
            Operation::QuerySubscriptions,
            vec![STRATEGIC_COORDINATION_SCOPE, CONSTRAINT_PROCESSING_SCOPE],
        );
        // Vertiport administration is reserved for the blanket scope
        scopes.insert(Operation::PutVertiport, vec![]);
        scopes.insert(Operation::DeleteVertiport, vec![]);
        scopes.insert(
            Operation::GetVertiport,
            vec![STRATEGIC_COORDINATION_SCOPE, CONSTRAINT_PROCESSING_SCOPE],
        );
        scopes.insert(
            Operation::GetFatoAvailableTimes,
            vec![STRATEGIC_COORDINATION_SCOPE, CONSTRAINT_PROCESSING_SCOPE],
        );
        scopes.insert(
            Operation::GetNumberOfUsedParkingPlaces,
            vec![STRATEGIC_COORDINATION_SCOPE, CONSTRAINT_PROCESSING_SCOPE],
        );
        scopes
    };
}

/// The authenticated identity and claimed scopes of one request
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Manager identity extracted from the access token, if any
    pub manager: Option<Manager>,

    /// Scopes claimed by the access token
    pub scopes: HashSet<String>,
}

impl CallContext {
    /// Builds a context for `manager` claiming `scopes`
    pub fn new<I, S>(manager: Manager, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CallContext {
            manager: Some(manager),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the manager identity or the missing-context error
    pub fn manager(&self) -> Result<&Manager, Error> {
        self.manager
            .as_ref()
            .ok_or_else(|| Error::PermissionDenied("Missing manager from context".to_string()))
    }

    /// Checks `operation` against the scope table and returns the manager.
    ///
    /// Any claimed scope in the operation's required set authorises the
    /// call; the vertiport management scope authorises everything.
    pub fn authorize(&self, operation: Operation) -> Result<&Manager, Error> {
        let manager = self.manager()?;

        if self.scopes.contains(VERTIPORT_MANAGEMENT_SCOPE) {
            return Ok(manager);
        }

        let required = AUTH_SCOPES.get(&operation).ok_or_else(|| {
            Error::Internal(format!("No scopes registered for {:?}", operation))
        })?;

        if required.iter().any(|scope| self.scopes.contains(*scope)) {
            return Ok(manager);
        }

        Err(Error::PermissionDenied(format!(
            "Operation {:?} requires one of scopes {:?}",
            operation, required
        )))
    }
}
