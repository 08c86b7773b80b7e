//! Resource kind registry
//!
//! Maps host type names to the resource implementations and runs the
//! lifecycle entry points without the caller naming a concrete type.

use crate::api::ConnectApi;
use crate::approved_origin::ApprovedOrigin;
use crate::phone_number_contact_flow::PhoneNumberContactFlow;
use crate::queue_quick_connects::QueueQuickConnects;
use crate::rule::ConnectRule;
use serde::Serialize;
use std::str::FromStr;
use steadystate_core::{
    ChangeSummary, CoreError, Diagnostics, EngineConfig, InvocationContext, Lifecycle,
    ReadOutcome, Resource, ResourceData,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ApprovedOrigin,
    QueueQuickConnects,
    PhoneNumberContactFlow,
    Rule,
}

/// Static description of a kind, for listings
#[derive(Debug, Clone, Serialize)]
pub struct KindInfo {
    pub type_name: &'static str,
    pub description: &'static str,
    pub identity: String,
    pub force_new: &'static [&'static str],
}

macro_rules! dispatch {
    ($kind:expr, |$resource:ident| $body:expr) => {
        match $kind {
            ResourceKind::ApprovedOrigin => {
                let $resource = ApprovedOrigin;
                $body
            }
            ResourceKind::QueueQuickConnects => {
                let $resource = QueueQuickConnects;
                $body
            }
            ResourceKind::PhoneNumberContactFlow => {
                let $resource = PhoneNumberContactFlow;
                $body
            }
            ResourceKind::Rule => {
                let $resource = ConnectRule;
                $body
            }
        }
    };
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::ApprovedOrigin,
        ResourceKind::QueueQuickConnects,
        ResourceKind::PhoneNumberContactFlow,
        ResourceKind::Rule,
    ];

    pub fn type_name(&self) -> &'static str {
        dispatch!(self, |r| r.type_name())
    }

    pub fn description(&self) -> &'static str {
        match self {
            ResourceKind::ApprovedOrigin => "Origin approved for an instance's embedded clients",
            ResourceKind::QueueQuickConnects => "Quick connects available from a queue",
            ResourceKind::PhoneNumberContactFlow => "Contact flow answering a phone number",
            ResourceKind::Rule => "Event-triggered rule with its actions",
        }
    }

    pub fn info(&self) -> KindInfo {
        dispatch!(self, |r| KindInfo {
            type_name: r.type_name(),
            description: self.description(),
            identity: r.identity().format(),
            force_new: r.force_new_fields(),
        })
    }

    pub async fn create(
        &self,
        config: &EngineConfig,
        ctx: &InvocationContext,
        client: &(dyn ConnectApi + 'static),
        data: &mut ResourceData,
    ) -> Result<(), Diagnostics> {
        dispatch!(self, |r| Lifecycle::new(r, config.clone())
            .create(ctx, client, data)
            .await)
    }

    pub async fn read(
        &self,
        config: &EngineConfig,
        ctx: &InvocationContext,
        client: &(dyn ConnectApi + 'static),
        data: &mut ResourceData,
    ) -> Result<ReadOutcome, Diagnostics> {
        dispatch!(self, |r| Lifecycle::new(r, config.clone())
            .read(ctx, client, data)
            .await)
    }

    pub async fn update(
        &self,
        config: &EngineConfig,
        ctx: &InvocationContext,
        client: &(dyn ConnectApi + 'static),
        data: &mut ResourceData,
    ) -> Result<ChangeSummary, Diagnostics> {
        dispatch!(self, |r| Lifecycle::new(r, config.clone())
            .update(ctx, client, data)
            .await)
    }

    pub async fn delete(
        &self,
        config: &EngineConfig,
        ctx: &InvocationContext,
        client: &(dyn ConnectApi + 'static),
        data: &mut ResourceData,
    ) -> Result<(), Diagnostics> {
        dispatch!(self, |r| Lifecycle::new(r, config.clone())
            .delete(ctx, client, data)
            .await)
    }

    pub async fn import(
        &self,
        config: &EngineConfig,
        ctx: &InvocationContext,
        client: &(dyn ConnectApi + 'static),
        id: &str,
    ) -> Result<ResourceData, Diagnostics> {
        dispatch!(self, |r| Lifecycle::new(r, config.clone())
            .import(ctx, client, id)
            .await)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.type_name() == s)
            .ok_or_else(|| {
                let known: Vec<_> = ResourceKind::ALL.iter().map(|k| k.type_name()).collect();
                CoreError::validation(format!(
                    "unknown resource type {} (expected one of: {})",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// Every registered kind, in a stable order
pub fn registry() -> Vec<KindInfo> {
    ResourceKind::ALL.iter().map(ResourceKind::info).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.type_name().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_type_name() {
        let err = "connect_queue".parse::<ResourceKind>().unwrap_err();
        assert!(err.to_string().contains("connect_approved_origin"));
    }

    #[test]
    fn test_registry_identity_formats() {
        let formats: Vec<_> = registry().into_iter().map(|k| k.identity).collect();
        assert_eq!(
            formats,
            vec![
                "instanceID,origin",
                "instanceID,queueID",
                "instanceID:phoneNumberID:contactFlowID",
                "instanceID,ruleID",
            ]
        );
    }
}
