//! Rule of an instance
//!
//! An independently addressable object whose id is assigned by the remote
//! on creation. The remote only supports full replacement, so any change
//! to name, function, publish status or actions becomes exactly one
//! `UpdateRule` call.

use crate::api::{
    ActionWire, ConnectApi, CreateRuleInput, PublishStatus, Rule, RuleAction,
    RuleTriggerEventSource, UpdateRuleInput,
};
use crate::error::Classify;
use crate::{key_parts, required};
use async_trait::async_trait;
use serde_json::Value;
use steadystate_core::{
    ChangeSet, CoreError, FieldDiff, IdentityCodec, Resource, ResourceData, Result,
};

const IDENTITY: IdentityCodec = IdentityCodec::new(",", &["instanceID", "ruleID"]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleConfig {
    pub instance_id: String,
    pub name: String,
    pub trigger: RuleTriggerEventSource,
    pub function: String,
    pub publish_status: PublishStatus,
    pub actions: Vec<RuleAction>,
}

/// Rule as last described by the remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSnapshot {
    pub rule_id: String,
    pub rule_arn: String,
    pub name: String,
    pub trigger: RuleTriggerEventSource,
    pub function: String,
    pub publish_status: PublishStatus,
    pub actions: Vec<RuleAction>,
}

impl TryFrom<Rule> for RuleSnapshot {
    type Error = crate::error::ApiError;

    fn try_from(rule: Rule) -> crate::error::Result<Self> {
        let actions = rule
            .actions
            .into_iter()
            .map(RuleAction::try_from)
            .collect::<crate::error::Result<Vec<_>>>()?;

        Ok(Self {
            rule_id: rule.rule_id,
            rule_arn: rule.rule_arn,
            name: rule.name,
            trigger: rule.trigger_event_source,
            function: rule.function,
            publish_status: rule.publish_status,
            actions,
        })
    }
}

/// Parse the `actions` attribute. Each block must set exactly one action
/// kind; anything else is rejected before a call is made.
fn expand_actions(value: &Value) -> Result<Vec<RuleAction>> {
    let blocks = value
        .as_array()
        .ok_or_else(|| CoreError::validation("connect_rule: actions must be a list"))?;

    if blocks.is_empty() {
        return Err(CoreError::validation(
            "connect_rule: at least one action is required",
        ));
    }

    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| expand_action(i, block))
        .collect()
}

fn expand_action(index: usize, block: &Value) -> Result<RuleAction> {
    let object = block.as_object().ok_or_else(|| {
        CoreError::validation(format!("connect_rule: actions[{}] must be an object", index))
    })?;

    if let Some(unknown) = object
        .keys()
        .find(|k| !RuleAction::KINDS.contains(&k.as_str()))
    {
        return Err(CoreError::validation(format!(
            "connect_rule: actions[{}]: unknown action \"{}\"",
            index, unknown
        )));
    }

    let present: Vec<(&String, &Value)> = object.iter().filter(|(_, v)| !v.is_null()).collect();
    match present.as_slice() {
        [(kind, body)] => {
            let mut single = serde_json::Map::new();
            single.insert(kind.to_string(), (*body).clone());
            serde_json::from_value(Value::Object(single)).map_err(|e| {
                CoreError::validation(format!("connect_rule: actions[{}].{}: {}", index, kind, e))
            })
        }
        _ => Err(CoreError::validation(format!(
            "connect_rule: actions[{}] must set exactly one of {}, found {}",
            index,
            RuleAction::KINDS.join(", "),
            present.len()
        ))),
    }
}

fn to_wire(actions: &[RuleAction]) -> Vec<ActionWire> {
    actions.iter().map(ActionWire::from).collect()
}

pub struct ConnectRule;

#[async_trait]
impl Resource for ConnectRule {
    type Client = dyn ConnectApi;
    type Desired = RuleConfig;
    type Observed = RuleSnapshot;
    type Call = UpdateRuleInput;

    fn type_name(&self) -> &'static str {
        "connect_rule"
    }

    fn identity(&self) -> IdentityCodec {
        IDENTITY
    }

    fn force_new_fields(&self) -> &'static [&'static str] {
        &["instance_id", "event_source_name", "integration_association_id"]
    }

    fn expand(&self, data: &ResourceData) -> Result<RuleConfig> {
        let actions = match data.raw("actions") {
            Some(value) => expand_actions(value)?,
            None => {
                return Err(CoreError::validation(
                    "connect_rule: missing required attribute \"actions\"",
                ));
            }
        };

        Ok(RuleConfig {
            instance_id: required(data, "instance_id")?,
            name: required(data, "name")?,
            trigger: RuleTriggerEventSource {
                event_source_name: required(data, "event_source_name")?,
                integration_association_id: data.get_opt("integration_association_id")?,
            },
            function: required(data, "function")?,
            publish_status: data.get("publish_status")?,
            actions,
        })
    }

    async fn create(&self, client: &Self::Client, desired: &RuleConfig) -> Result<Vec<String>> {
        let output = client
            .create_rule(CreateRuleInput {
                instance_id: desired.instance_id.clone(),
                name: desired.name.clone(),
                trigger_event_source: desired.trigger.clone(),
                function: desired.function.clone(),
                actions: to_wire(&desired.actions),
                publish_status: desired.publish_status,
            })
            .await
            .classify("CreateRule", &desired.instance_id)?;

        Ok(vec![desired.instance_id.clone(), output.rule_id])
    }

    async fn find(&self, client: &Self::Client, key: &[String]) -> Result<RuleSnapshot> {
        let [instance_id, rule_id] = key_parts::<2>(key)?;
        let token = IDENTITY.encode(key);

        let rule = client
            .describe_rule(instance_id, rule_id)
            .await
            .classify("DescribeRule", &token)?;

        RuleSnapshot::try_from(rule).classify("DescribeRule", &token)
    }

    fn plan(&self, desired: &RuleConfig, observed: &RuleSnapshot) -> Result<ChangeSet<UpdateRuleInput>> {
        let mut diff = FieldDiff::new();
        diff.compare("name", &desired.name, &observed.name)
            .compare("function", &desired.function, &observed.function)
            .compare(
                "publish_status",
                &desired.publish_status,
                &observed.publish_status,
            )
            .compare("actions", &desired.actions, &observed.actions);

        Ok(ChangeSet::replace_if_changed(&diff, "UpdateRule", || {
            UpdateRuleInput {
                instance_id: desired.instance_id.clone(),
                rule_id: observed.rule_id.clone(),
                name: desired.name.clone(),
                function: desired.function.clone(),
                actions: to_wire(&desired.actions),
                publish_status: desired.publish_status,
            }
        }))
    }

    async fn apply(&self, client: &Self::Client, key: &[String], call: &UpdateRuleInput) -> Result<()> {
        client
            .update_rule(call.clone())
            .await
            .classify("UpdateRule", &IDENTITY.encode(key))
    }

    fn converged(&self, desired: &RuleConfig, observed: &RuleSnapshot) -> bool {
        desired.name == observed.name
            && desired.function == observed.function
            && desired.publish_status == observed.publish_status
            && desired.actions == observed.actions
    }

    async fn delete(&self, client: &Self::Client, key: &[String], _desired: &RuleConfig) -> Result<()> {
        let [instance_id, rule_id] = key_parts::<2>(key)?;
        client
            .delete_rule(instance_id, rule_id)
            .await
            .classify("DeleteRule", &IDENTITY.encode(key))
    }

    fn flatten(&self, key: &[String], observed: &RuleSnapshot, data: &mut ResourceData) -> Result<()> {
        let [instance_id, _] = key_parts::<2>(key)?;
        data.set("instance_id", instance_id)?;
        data.set("rule_id", &observed.rule_id)?;
        data.set("rule_arn", &observed.rule_arn)?;
        data.set("name", &observed.name)?;
        data.set("event_source_name", &observed.trigger.event_source_name)?;
        data.set(
            "integration_association_id",
            &observed.trigger.integration_association_id,
        )?;
        data.set("function", &observed.function)?;
        data.set("publish_status", observed.publish_status)?;
        data.set("actions", &observed.actions)
    }
}
