//! Contact-center API surface
//!
//! `ConnectApi` is the narrow client interface the resource kinds depend
//! on. Requests and responses are plain serde types; list calls return one
//! [`Page`] per request and take the continuation token of the previous one.

use crate::error::{ApiError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use steadystate_core::Page;

/// Remote contact-center API
#[async_trait]
pub trait ConnectApi: Send + Sync {
    async fn associate_approved_origin(&self, instance_id: &str, origin: &str) -> Result<()>;

    async fn disassociate_approved_origin(&self, instance_id: &str, origin: &str) -> Result<()>;

    async fn list_approved_origins(
        &self,
        instance_id: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>>;

    async fn associate_queue_quick_connects(
        &self,
        instance_id: &str,
        queue_id: &str,
        quick_connect_ids: &[String],
    ) -> Result<()>;

    async fn disassociate_queue_quick_connects(
        &self,
        instance_id: &str,
        queue_id: &str,
        quick_connect_ids: &[String],
    ) -> Result<()>;

    async fn list_queue_quick_connects(
        &self,
        instance_id: &str,
        queue_id: &str,
        next_token: Option<String>,
    ) -> Result<Page<QuickConnectSummary>>;

    async fn associate_phone_number_contact_flow(
        &self,
        instance_id: &str,
        phone_number_id: &str,
        contact_flow_id: &str,
    ) -> Result<()>;

    /// Removes whatever flow the phone number is associated with
    async fn disassociate_phone_number_contact_flow(
        &self,
        instance_id: &str,
        phone_number_id: &str,
    ) -> Result<()>;

    async fn list_flow_associations(
        &self,
        instance_id: &str,
        next_token: Option<String>,
    ) -> Result<Page<FlowAssociationSummary>>;

    async fn create_rule(&self, input: CreateRuleInput) -> Result<CreateRuleOutput>;

    async fn describe_rule(&self, instance_id: &str, rule_id: &str) -> Result<Rule>;

    /// Full replace; the trigger event source cannot be changed
    async fn update_rule(&self, input: UpdateRuleInput) -> Result<()>;

    async fn delete_rule(&self, instance_id: &str, rule_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickConnectSummary {
    pub id: String,
    pub arn: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowAssociationSummary {
    /// Phone number id
    pub resource_id: String,
    pub flow_id: String,
    pub resource_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTriggerEventSource {
    pub event_source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_association_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRuleInput {
    pub instance_id: String,
    pub name: String,
    pub trigger_event_source: RuleTriggerEventSource,
    pub function: String,
    pub actions: Vec<ActionWire>,
    pub publish_status: PublishStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRuleOutput {
    pub rule_id: String,
    pub rule_arn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRuleInput {
    pub instance_id: String,
    pub rule_id: String,
    pub name: String,
    pub function: String,
    pub actions: Vec<ActionWire>,
    pub publish_status: PublishStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    pub rule_arn: String,
    pub name: String,
    pub trigger_event_source: RuleTriggerEventSource,
    pub function: String,
    pub actions: Vec<ActionWire>,
    pub publish_status: PublishStatus,
    pub last_updated_time: DateTime<Utc>,
}

/// One rule action; exactly one kind by construction.
///
/// Serialized externally tagged, which is also the host attribute form:
/// `{"event_bridge_action": {"name": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleAction {
    #[serde(rename = "assign_contact_category_action")]
    AssignContactCategory(AssignContactCategoryAction),
    #[serde(rename = "event_bridge_action")]
    EventBridge(EventBridgeAction),
    #[serde(rename = "send_notification_action")]
    SendNotification(SendNotificationAction),
    #[serde(rename = "task_action")]
    Task(TaskAction),
    #[serde(rename = "create_case_action")]
    CreateCase(CreateCaseAction),
}

impl RuleAction {
    /// Attribute keys of every action kind
    pub const KINDS: [&'static str; 5] = [
        "assign_contact_category_action",
        "event_bridge_action",
        "send_notification_action",
        "task_action",
        "create_case_action",
    ];

    pub fn action_type(&self) -> ActionType {
        match self {
            RuleAction::AssignContactCategory(_) => ActionType::AssignContactCategory,
            RuleAction::EventBridge(_) => ActionType::GenerateEventbridgeEvent,
            RuleAction::SendNotification(_) => ActionType::SendNotification,
            RuleAction::Task(_) => ActionType::CreateTask,
            RuleAction::CreateCase(_) => ActionType::CreateCase,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignContactCategoryAction {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventBridgeAction {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationDeliveryMethod {
    #[default]
    Email,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationContentType {
    #[default]
    PlainText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationRecipient {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendNotificationAction {
    #[serde(default)]
    pub delivery_method: NotificationDeliveryMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub content: String,
    #[serde(default)]
    pub content_type: NotificationContentType,
    pub recipient: NotificationRecipient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    Url,
    Attachment,
    Number,
    String,
    Date,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskReference {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub reference_type: ReferenceType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskAction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub contact_flow_id: String,
    #[serde(rename = "reference", default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<TaskReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseField {
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCaseAction {
    pub template_id: String,
    pub fields: Vec<CaseField>,
}

/// Wire discriminator of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    AssignContactCategory,
    GenerateEventbridgeEvent,
    SendNotification,
    CreateTask,
    CreateCase,
}

/// Action as the remote API carries it: a discriminator plus one populated
/// sub-object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionWire {
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign_contact_category_action: Option<AssignContactCategoryAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_bridge_action: Option<EventBridgeAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_notification_action: Option<SendNotificationAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_action: Option<TaskAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_case_action: Option<CreateCaseAction>,
}

impl ActionWire {
    fn empty(action_type: ActionType) -> Self {
        Self {
            action_type,
            assign_contact_category_action: None,
            event_bridge_action: None,
            send_notification_action: None,
            task_action: None,
            create_case_action: None,
        }
    }

    fn populated(&self) -> usize {
        [
            self.assign_contact_category_action.is_some(),
            self.event_bridge_action.is_some(),
            self.send_notification_action.is_some(),
            self.task_action.is_some(),
            self.create_case_action.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

impl From<&RuleAction> for ActionWire {
    fn from(action: &RuleAction) -> Self {
        let mut wire = ActionWire::empty(action.action_type());
        match action.clone() {
            RuleAction::AssignContactCategory(a) => wire.assign_contact_category_action = Some(a),
            RuleAction::EventBridge(a) => wire.event_bridge_action = Some(a),
            RuleAction::SendNotification(a) => wire.send_notification_action = Some(a),
            RuleAction::Task(a) => wire.task_action = Some(a),
            RuleAction::CreateCase(a) => wire.create_case_action = Some(a),
        }
        wire
    }
}

impl TryFrom<ActionWire> for RuleAction {
    type Error = ApiError;

    fn try_from(wire: ActionWire) -> Result<Self> {
        if wire.populated() != 1 {
            return Err(ApiError::internal(format!(
                "action {:?} carries {} sub-objects",
                wire.action_type,
                wire.populated()
            )));
        }

        let action = match wire.action_type {
            ActionType::AssignContactCategory => wire
                .assign_contact_category_action
                .map(RuleAction::AssignContactCategory),
            ActionType::GenerateEventbridgeEvent => {
                wire.event_bridge_action.map(RuleAction::EventBridge)
            }
            ActionType::SendNotification => {
                wire.send_notification_action.map(RuleAction::SendNotification)
            }
            ActionType::CreateTask => wire.task_action.map(RuleAction::Task),
            ActionType::CreateCase => wire.create_case_action.map(RuleAction::CreateCase),
        };

        action.ok_or_else(|| {
            ApiError::internal(format!(
                "action {:?} does not match its sub-object",
                wire.action_type
            ))
        })
    }
}
