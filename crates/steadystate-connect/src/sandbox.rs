//! In-process contact-center API
//!
//! `SandboxConnect` implements [`ConnectApi`] over in-memory state with the
//! two behaviors the engine has to cope with in a real deployment:
//!
//! - **Pagination**: list calls return at most `page_size` items and an
//!   opaque continuation token.
//! - **Eventual consistency**: a mutation stays invisible to the next
//!   `visibility_lag` read calls.
//!
//! The whole state is serde-serializable so a host can persist it between
//! processes.

use crate::api::{
    ActionWire, ConnectApi, CreateRuleInput, CreateRuleOutput, FlowAssociationSummary,
    PublishStatus, QuickConnectSummary, Rule, RuleTriggerEventSource, UpdateRuleInput,
};
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use steadystate_core::Page;

const ARN_PREFIX: &str = "arn:aws:connect:sandbox:000000000000:instance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Items per list page
    pub page_size: usize,

    /// Reads a mutation stays invisible for
    pub visibility_lag: u32,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            visibility_lag: 0,
        }
    }
}

/// One logged API call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub operation: String,
    pub target: String,
}

/// A value with the read tick range in which it is visible
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tracked<T> {
    value: T,
    visible_from: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hidden_from: Option<u64>,
}

/// History of a collection, so reads can lag behind writes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
struct Timeline<T> {
    entries: Vec<Tracked<T>>,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone + PartialEq> Timeline<T> {
    /// Authoritative current values, regardless of visibility
    fn live(&self) -> impl Iterator<Item = &T> {
        self.entries
            .iter()
            .filter(|e| e.hidden_from.is_none())
            .map(|e| &e.value)
    }

    /// Values a read at tick `at` observes
    fn visible(&self, at: u64) -> impl Iterator<Item = &T> {
        self.entries
            .iter()
            .filter(move |e| e.visible_from <= at && e.hidden_from.is_none_or(|h| at < h))
            .map(|e| &e.value)
    }

    fn insert(&mut self, value: T, visible_from: u64) -> bool {
        if self.live().any(|v| *v == value) {
            return false;
        }
        self.entries.push(Tracked {
            value,
            visible_from,
            hidden_from: None,
        });
        true
    }

    fn remove_where(&mut self, hidden_from: u64, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let mut removed = 0;
        for entry in self.entries.iter_mut() {
            if entry.hidden_from.is_none() && predicate(&entry.value) {
                entry.hidden_from = Some(hidden_from);
                removed += 1;
            }
        }
        removed
    }

    /// Forget entries no future read can observe
    fn compact(&mut self, now: u64) {
        self.entries.retain(|e| e.hidden_from.is_none_or(|h| h > now));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredRule {
    rule_id: String,
    name: String,
    trigger_event_source: RuleTriggerEventSource,
    function: String,
    actions: Vec<ActionWire>,
    publish_status: PublishStatus,
    last_updated_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct InstanceState {
    approved_origins: Timeline<String>,
    queues: BTreeMap<String, Timeline<String>>,
    quick_connects: BTreeMap<String, String>,
    phone_numbers: BTreeSet<String>,
    contact_flows: BTreeSet<String>,
    /// (phone number id, contact flow id)
    flow_associations: Timeline<(String, String)>,
    rules: BTreeMap<String, Timeline<StoredRule>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SandboxState {
    settings: SandboxSettings,
    instances: BTreeMap<String, InstanceState>,

    /// Read tick counter
    reads: u64,
    next_id: u64,

    #[serde(skip)]
    calls: Vec<CallRecord>,
    #[serde(skip)]
    faults: HashMap<String, VecDeque<ApiError>>,
}

impl SandboxState {
    /// Tick at which a mutation made now becomes visible
    fn visible_from(&self) -> u64 {
        self.reads + u64::from(self.settings.visibility_lag) + 1
    }

    fn begin(&mut self, operation: &str, target: &str) -> Result<()> {
        tracing::debug!("sandbox {} {}", operation, target);
        self.calls.push(CallRecord {
            operation: operation.to_string(),
            target: target.to_string(),
        });
        match self.faults.get_mut(operation).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn begin_read(&mut self, operation: &str, target: &str) -> Result<u64> {
        self.begin(operation, target)?;
        self.reads += 1;
        Ok(self.reads)
    }

    fn instance(&self, instance_id: &str) -> Result<&InstanceState> {
        self.instances
            .get(instance_id)
            .ok_or_else(|| ApiError::not_found(format!("instance {} not found", instance_id)))
    }

    fn instance_mut(&mut self, instance_id: &str) -> Result<&mut InstanceState> {
        self.instances
            .get_mut(instance_id)
            .ok_or_else(|| ApiError::not_found(format!("instance {} not found", instance_id)))
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", prefix, self.next_id)
    }

    fn page<T: Clone>(&self, items: Vec<T>, next_token: Option<String>) -> Result<Page<T>> {
        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ApiError::invalid_request(format!("invalid next token {}", token)))?,
            None => 0,
        };
        let size = self.settings.page_size.max(1);
        let end = (start + size).min(items.len());
        let next = (end < items.len()).then(|| end.to_string());
        Ok(Page::new(
            items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
            next,
        ))
    }
}

fn rule_arn(instance_id: &str, rule_id: &str) -> String {
    format!("{}/{}/rule/{}", ARN_PREFIX, instance_id, rule_id)
}

/// In-memory `ConnectApi`
#[derive(Debug, Default)]
pub struct SandboxConnect {
    state: Mutex<SandboxState>,
}

impl SandboxConnect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: SandboxSettings) -> Self {
        let sandbox = Self::new();
        sandbox.lock().settings = settings;
        sandbox
    }

    fn lock(&self) -> MutexGuard<'_, SandboxState> {
        // A panic while holding the lock leaves the data consistent enough
        // for a test double
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn settings(&self) -> SandboxSettings {
        self.lock().settings
    }

    pub fn set_settings(&self, settings: SandboxSettings) {
        self.lock().settings = settings;
    }

    /// Load a persisted sandbox; a missing file yields an empty one
    pub async fn load(path: &Path) -> steadystate_core::Result<Self> {
        if !path.exists() {
            tracing::debug!("Sandbox file not found, starting empty");
            return Ok(Self::new());
        }
        let content = tokio::fs::read_to_string(path).await?;
        let state: SandboxState = serde_json::from_str(&content)?;
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    pub async fn save(&self, path: &Path) -> steadystate_core::Result<()> {
        let content = {
            let mut state = self.lock();
            let now = state.reads;
            for instance in state.instances.values_mut() {
                instance.approved_origins.compact(now);
                instance.flow_associations.compact(now);
                instance.queues.values_mut().for_each(|q| q.compact(now));
                instance.rules.values_mut().for_each(|r| r.compact(now));
            }
            serde_json::to_string_pretty(&*state)?
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn add_instance(&self, instance_id: &str) {
        self.lock()
            .instances
            .entry(instance_id.to_string())
            .or_default();
    }

    pub fn add_queue(&self, instance_id: &str, queue_id: &str) -> Result<()> {
        self.lock()
            .instance_mut(instance_id)?
            .queues
            .entry(queue_id.to_string())
            .or_default();
        Ok(())
    }

    pub fn add_quick_connect(&self, instance_id: &str, id: &str, name: &str) -> Result<()> {
        self.lock()
            .instance_mut(instance_id)?
            .quick_connects
            .insert(id.to_string(), name.to_string());
        Ok(())
    }

    pub fn add_phone_number(&self, instance_id: &str, phone_number_id: &str) -> Result<()> {
        self.lock()
            .instance_mut(instance_id)?
            .phone_numbers
            .insert(phone_number_id.to_string());
        Ok(())
    }

    pub fn add_contact_flow(&self, instance_id: &str, contact_flow_id: &str) -> Result<()> {
        self.lock()
            .instance_mut(instance_id)?
            .contact_flows
            .insert(contact_flow_id.to_string());
        Ok(())
    }

    /// Fail the next call to `operation` with `error`
    pub fn fail_next(&self, operation: &str, error: ApiError) {
        self.lock()
            .faults
            .entry(operation.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Human readable dump of the authoritative state
    pub fn describe(&self) -> serde_json::Value {
        let state = self.lock();
        let instances: serde_json::Map<String, serde_json::Value> = state
            .instances
            .iter()
            .map(|(id, i)| {
                let queues: serde_json::Map<String, serde_json::Value> = i
                    .queues
                    .iter()
                    .map(|(q, t)| (q.clone(), serde_json::json!(t.live().collect::<Vec<_>>())))
                    .collect();
                let flows: Vec<_> = i
                    .flow_associations
                    .live()
                    .map(|(p, f)| serde_json::json!({"phone_number_id": p, "contact_flow_id": f}))
                    .collect();
                let rules: Vec<_> = i
                    .rules
                    .iter()
                    .filter_map(|(id, t)| t.live().next().map(|r| (id, r)))
                    .map(|(id, r)| {
                        serde_json::json!({"rule_id": id, "name": r.name, "publish_status": r.publish_status})
                    })
                    .collect();
                (
                    id.clone(),
                    serde_json::json!({
                        "approved_origins": i.approved_origins.live().collect::<Vec<_>>(),
                        "queues": queues,
                        "quick_connects": i.quick_connects,
                        "phone_numbers": i.phone_numbers,
                        "contact_flows": i.contact_flows,
                        "flow_associations": flows,
                        "rules": rules,
                    }),
                )
            })
            .collect();
        serde_json::json!({
            "settings": state.settings,
            "instances": instances,
        })
    }
}

#[async_trait]
impl ConnectApi for SandboxConnect {
    async fn associate_approved_origin(&self, instance_id: &str, origin: &str) -> Result<()> {
        let mut state = self.lock();
        state.begin("AssociateApprovedOrigin", &format!("{},{}", instance_id, origin))?;
        let at = state.visible_from();
        let instance = state.instance_mut(instance_id)?;
        if !instance.approved_origins.insert(origin.to_string(), at) {
            return Err(ApiError::conflict(format!(
                "origin {} is already approved",
                origin
            )));
        }
        Ok(())
    }

    async fn disassociate_approved_origin(&self, instance_id: &str, origin: &str) -> Result<()> {
        let mut state = self.lock();
        state.begin("DisassociateApprovedOrigin", &format!("{},{}", instance_id, origin))?;
        let at = state.visible_from();
        let instance = state.instance_mut(instance_id)?;
        if instance.approved_origins.remove_where(at, |o| o == origin) == 0 {
            return Err(ApiError::not_found(format!(
                "origin {} is not approved",
                origin
            )));
        }
        Ok(())
    }

    async fn list_approved_origins(
        &self,
        instance_id: &str,
        next_token: Option<String>,
    ) -> Result<Page<String>> {
        let mut state = self.lock();
        let at = state.begin_read("ListApprovedOrigins", instance_id)?;
        let origins: Vec<String> = state
            .instance(instance_id)?
            .approved_origins
            .visible(at)
            .cloned()
            .collect();
        state.page(origins, next_token)
    }

    async fn associate_queue_quick_connects(
        &self,
        instance_id: &str,
        queue_id: &str,
        quick_connect_ids: &[String],
    ) -> Result<()> {
        let mut state = self.lock();
        state.begin(
            "AssociateQueueQuickConnects",
            &format!("{},{}", instance_id, queue_id),
        )?;
        if quick_connect_ids.is_empty() {
            return Err(ApiError::invalid_request("QuickConnectIds must not be empty"));
        }
        let at = state.visible_from();
        let instance = state.instance_mut(instance_id)?;
        if let Some(unknown) = quick_connect_ids
            .iter()
            .find(|id| !instance.quick_connects.contains_key(*id))
        {
            return Err(ApiError::not_found(format!(
                "quick connect {} not found",
                unknown
            )));
        }
        let queue = instance
            .queues
            .get_mut(queue_id)
            .ok_or_else(|| ApiError::not_found(format!("queue {} not found", queue_id)))?;
        for id in quick_connect_ids {
            queue.insert(id.clone(), at);
        }
        Ok(())
    }

    async fn disassociate_queue_quick_connects(
        &self,
        instance_id: &str,
        queue_id: &str,
        quick_connect_ids: &[String],
    ) -> Result<()> {
        let mut state = self.lock();
        state.begin(
            "DisassociateQueueQuickConnects",
            &format!("{},{}", instance_id, queue_id),
        )?;
        let at = state.visible_from();
        let queue = state
            .instance_mut(instance_id)?
            .queues
            .get_mut(queue_id)
            .ok_or_else(|| ApiError::not_found(format!("queue {} not found", queue_id)))?;
        queue.remove_where(at, |id| quick_connect_ids.contains(id));
        Ok(())
    }

    async fn list_queue_quick_connects(
        &self,
        instance_id: &str,
        queue_id: &str,
        next_token: Option<String>,
    ) -> Result<Page<QuickConnectSummary>> {
        let mut state = self.lock();
        let at = state.begin_read(
            "ListQueueQuickConnects",
            &format!("{},{}", instance_id, queue_id),
        )?;
        let instance = state.instance(instance_id)?;
        let queue = instance
            .queues
            .get(queue_id)
            .ok_or_else(|| ApiError::not_found(format!("queue {} not found", queue_id)))?;
        let summaries: Vec<QuickConnectSummary> = queue
            .visible(at)
            .map(|id| QuickConnectSummary {
                id: id.clone(),
                arn: format!("{}/{}/transfer-destination/{}", ARN_PREFIX, instance_id, id),
                name: instance.quick_connects.get(id).cloned().unwrap_or_default(),
            })
            .collect();
        state.page(summaries, next_token)
    }

    async fn associate_phone_number_contact_flow(
        &self,
        instance_id: &str,
        phone_number_id: &str,
        contact_flow_id: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        state.begin(
            "AssociatePhoneNumberContactFlow",
            &format!("{}:{}:{}", instance_id, phone_number_id, contact_flow_id),
        )?;
        let at = state.visible_from();
        let instance = state.instance_mut(instance_id)?;
        if !instance.phone_numbers.contains(phone_number_id) {
            return Err(ApiError::not_found(format!(
                "phone number {} not found",
                phone_number_id
            )));
        }
        if !instance.contact_flows.contains(contact_flow_id) {
            return Err(ApiError::not_found(format!(
                "contact flow {} not found",
                contact_flow_id
            )));
        }
        // A phone number routes to one flow at a time
        instance
            .flow_associations
            .remove_where(at, |(phone, flow)| phone == phone_number_id && flow != contact_flow_id);
        instance.flow_associations.insert(
            (phone_number_id.to_string(), contact_flow_id.to_string()),
            at,
        );
        Ok(())
    }

    async fn disassociate_phone_number_contact_flow(
        &self,
        instance_id: &str,
        phone_number_id: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        state.begin(
            "DisassociatePhoneNumberContactFlow",
            &format!("{}:{}", instance_id, phone_number_id),
        )?;
        let at = state.visible_from();
        let instance = state.instance_mut(instance_id)?;
        if instance
            .flow_associations
            .remove_where(at, |(phone, _)| phone == phone_number_id)
            == 0
        {
            return Err(ApiError::not_found(format!(
                "phone number {} has no contact flow",
                phone_number_id
            )));
        }
        Ok(())
    }

    async fn list_flow_associations(
        &self,
        instance_id: &str,
        next_token: Option<String>,
    ) -> Result<Page<FlowAssociationSummary>> {
        let mut state = self.lock();
        let at = state.begin_read("ListFlowAssociations", instance_id)?;
        let associations: Vec<FlowAssociationSummary> = state
            .instance(instance_id)?
            .flow_associations
            .visible(at)
            .map(|(phone, flow)| FlowAssociationSummary {
                resource_id: phone.clone(),
                flow_id: flow.clone(),
                resource_type: "VOICE_PHONE_NUMBER".to_string(),
            })
            .collect();
        state.page(associations, next_token)
    }

    async fn create_rule(&self, input: CreateRuleInput) -> Result<CreateRuleOutput> {
        let mut state = self.lock();
        state.begin("CreateRule", &format!("{},{}", input.instance_id, input.name))?;
        if input.actions.is_empty() {
            return Err(ApiError::invalid_request("Actions must not be empty"));
        }
        state.instance(&input.instance_id)?;

        let rule_id = state.next_id("rule");
        let at = state.visible_from();
        let instance = state.instance_mut(&input.instance_id)?;
        if instance
            .rules
            .values()
            .any(|t| t.live().any(|r| r.name == input.name))
        {
            return Err(ApiError::conflict(format!(
                "rule named {} already exists",
                input.name
            )));
        }

        let mut timeline = Timeline::default();
        timeline.insert(
            StoredRule {
                rule_id: rule_id.clone(),
                name: input.name,
                trigger_event_source: input.trigger_event_source,
                function: input.function,
                actions: input.actions,
                publish_status: input.publish_status,
                last_updated_time: Utc::now(),
            },
            at,
        );
        instance.rules.insert(rule_id.clone(), timeline);

        Ok(CreateRuleOutput {
            rule_arn: rule_arn(&input.instance_id, &rule_id),
            rule_id,
        })
    }

    async fn describe_rule(&self, instance_id: &str, rule_id: &str) -> Result<Rule> {
        let mut state = self.lock();
        let at = state.begin_read("DescribeRule", &format!("{},{}", instance_id, rule_id))?;
        let rule = state
            .instance(instance_id)?
            .rules
            .get(rule_id)
            .and_then(|t| t.visible(at).last())
            .ok_or_else(|| ApiError::not_found(format!("rule {} not found", rule_id)))?;

        Ok(Rule {
            rule_id: rule.rule_id.clone(),
            rule_arn: rule_arn(instance_id, rule_id),
            name: rule.name.clone(),
            trigger_event_source: rule.trigger_event_source.clone(),
            function: rule.function.clone(),
            actions: rule.actions.clone(),
            publish_status: rule.publish_status,
            last_updated_time: rule.last_updated_time,
        })
    }

    async fn update_rule(&self, input: UpdateRuleInput) -> Result<()> {
        let mut state = self.lock();
        state.begin("UpdateRule", &format!("{},{}", input.instance_id, input.rule_id))?;
        if input.actions.is_empty() {
            return Err(ApiError::invalid_request("Actions must not be empty"));
        }
        let at = state.visible_from();
        let timeline = state
            .instance_mut(&input.instance_id)?
            .rules
            .get_mut(&input.rule_id)
            .ok_or_else(|| ApiError::not_found(format!("rule {} not found", input.rule_id)))?;
        let current = timeline
            .live()
            .next()
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("rule {} not found", input.rule_id)))?;

        timeline.remove_where(at, |_| true);
        timeline.insert(
            StoredRule {
                name: input.name,
                function: input.function,
                actions: input.actions,
                publish_status: input.publish_status,
                last_updated_time: Utc::now(),
                ..current
            },
            at,
        );
        Ok(())
    }

    async fn delete_rule(&self, instance_id: &str, rule_id: &str) -> Result<()> {
        let mut state = self.lock();
        state.begin("DeleteRule", &format!("{},{}", instance_id, rule_id))?;
        let at = state.visible_from();
        let removed = state
            .instance_mut(instance_id)?
            .rules
            .get_mut(rule_id)
            .map(|t| t.remove_where(at, |_| true))
            .unwrap_or(0);
        if removed == 0 {
            return Err(ApiError::not_found(format!("rule {} not found", rule_id)));
        }
        Ok(())
    }
}
