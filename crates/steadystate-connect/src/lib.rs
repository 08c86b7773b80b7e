//! Contact-center resource kinds for steadystate
//!
//! Each kind implements [`steadystate_core::Resource`] against the
//! [`ConnectApi`] client trait.
//!
//! # Resource kinds
//!
//! | Type name | Identity | Shape |
//! |-----------|----------|-------|
//! | `connect_approved_origin` | `instanceID,origin` | association |
//! | `connect_queue_quick_connects` | `instanceID,queueID` | association set |
//! | `connect_phone_number_contact_flow` | `instanceID:phoneNumberID:contactFlowID` | association |
//! | `connect_rule` | `instanceID,ruleID` | object |
//!
//! # Example
//!
//! ```ignore
//! use steadystate_connect::{ResourceKind, SandboxConnect};
//! use steadystate_core::{EngineConfig, InvocationContext, ResourceData};
//!
//! let sandbox = SandboxConnect::new();
//! sandbox.add_instance("inst-1");
//!
//! let mut data = ResourceData::with_attributes("connect_approved_origin", attrs);
//! ResourceKind::ApprovedOrigin
//!     .create(&EngineConfig::default(), &InvocationContext::new(), &sandbox, &mut data)
//!     .await?;
//! assert_eq!(data.id(), Some("inst-1,https://example.com"));
//! ```

pub mod api;
pub mod approved_origin;
pub mod error;
pub mod phone_number_contact_flow;
pub mod queue_quick_connects;
pub mod registry;
pub mod rule;
pub mod sandbox;

pub use api::{ConnectApi, PublishStatus, RuleAction};
pub use approved_origin::ApprovedOrigin;
pub use error::{ApiError, ApiErrorCode, Result};
pub use phone_number_contact_flow::PhoneNumberContactFlow;
pub use queue_quick_connects::QueueQuickConnects;
pub use registry::{KindInfo, ResourceKind, registry};
pub use rule::ConnectRule;
pub use sandbox::{CallRecord, SandboxConnect, SandboxSettings};

use steadystate_core::{CoreError, ResourceData};

/// Borrow exactly `N` decoded key parts
pub(crate) fn key_parts<const N: usize>(key: &[String]) -> steadystate_core::Result<[&str; N]> {
    let parts: Vec<&str> = key.iter().map(String::as_str).collect();
    parts
        .try_into()
        .map_err(|parts: Vec<&str>| CoreError::MalformedIdentity {
            token: parts.join("|"),
            expected: format!("{} parts", N),
        })
}

/// Required non-empty string attribute
pub(crate) fn required(data: &ResourceData, field: &str) -> steadystate_core::Result<String> {
    let value: String = data.get(field)?;
    if value.trim().is_empty() {
        return Err(CoreError::validation(format!(
            "{}: \"{}\" must not be empty",
            data.resource_type(),
            field
        )));
    }
    Ok(value)
}
