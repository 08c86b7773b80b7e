//! Quick connects associated with a queue
//!
//! The desired set of quick connect ids is kept in sync with the queue's
//! association list. Neither the queue nor the quick connects are ever
//! created or deleted here.

use crate::api::ConnectApi;
use crate::error::Classify;
use crate::{key_parts, required};
use async_trait::async_trait;
use steadystate_core::{
    Change, ChangeKind, ChangeSet, CoreError, IdentityCodec, Resource, ResourceData, Result,
    collect_all, membership_delta, paginate,
};

const IDENTITY: IdentityCodec = IdentityCodec::new(",", &["instanceID", "queueID"]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAssociation {
    pub instance_id: String,
    pub queue_id: String,

    /// Sorted, deduplicated
    pub quick_connect_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueCall {
    Associate(Vec<String>),
    Disassociate(Vec<String>),
}

pub struct QueueQuickConnects;

#[async_trait]
impl Resource for QueueQuickConnects {
    type Client = dyn ConnectApi;
    type Desired = QueueAssociation;
    /// Sorted ids of the associated quick connects
    type Observed = Vec<String>;
    type Call = QueueCall;

    fn type_name(&self) -> &'static str {
        "connect_queue_quick_connects"
    }

    fn identity(&self) -> IdentityCodec {
        IDENTITY
    }

    fn force_new_fields(&self) -> &'static [&'static str] {
        &["instance_id", "queue_id"]
    }

    fn expand(&self, data: &ResourceData) -> Result<QueueAssociation> {
        let mut ids: Vec<String> = data.get("quick_connect_ids")?;
        ids.retain(|id| !id.trim().is_empty());
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Err(CoreError::validation(
                "connect_queue_quick_connects: quick_connect_ids must contain at least one id",
            ));
        }

        Ok(QueueAssociation {
            instance_id: required(data, "instance_id")?,
            queue_id: required(data, "queue_id")?,
            quick_connect_ids: ids,
        })
    }

    async fn create(&self, client: &Self::Client, desired: &QueueAssociation) -> Result<Vec<String>> {
        let key = vec![desired.instance_id.clone(), desired.queue_id.clone()];
        client
            .associate_queue_quick_connects(
                &desired.instance_id,
                &desired.queue_id,
                &desired.quick_connect_ids,
            )
            .await
            .classify("AssociateQueueQuickConnects", &IDENTITY.encode(&key))?;
        Ok(key)
    }

    async fn find(&self, client: &Self::Client, key: &[String]) -> Result<Vec<String>> {
        let [instance_id, queue_id] = key_parts::<2>(key)?;
        let token = IDENTITY.encode(key);
        let token = token.as_str();

        let summaries = collect_all(paginate(move |next| async move {
            client
                .list_queue_quick_connects(instance_id, queue_id, next)
                .await
                .classify("ListQueueQuickConnects", token)
        }))
        .await?;

        // Every id is gone: the association no longer exists
        if summaries.is_empty() {
            return Err(CoreError::not_found(format!(
                "quick connects of queue {} in instance {}",
                queue_id, instance_id
            )));
        }

        let mut ids: Vec<String> = summaries.into_iter().map(|s| s.id).collect();
        ids.sort();
        Ok(ids)
    }

    fn created(&self, desired: &QueueAssociation, observed: &Vec<String>) -> bool {
        desired
            .quick_connect_ids
            .iter()
            .all(|id| observed.contains(id))
    }

    fn plan(&self, desired: &QueueAssociation, observed: &Vec<String>) -> Result<ChangeSet<QueueCall>> {
        let (to_add, to_remove) = membership_delta(&desired.quick_connect_ids, observed);

        let mut changes = ChangeSet::empty();
        if !to_add.is_empty() {
            changes.push(
                Change::new(
                    ChangeKind::Add,
                    "AssociateQueueQuickConnects",
                    QueueCall::Associate(to_add),
                )
                .with_fields(["quick_connect_ids"]),
            );
        }
        if !to_remove.is_empty() {
            changes.push(
                Change::new(
                    ChangeKind::Remove,
                    "DisassociateQueueQuickConnects",
                    QueueCall::Disassociate(to_remove),
                )
                .with_fields(["quick_connect_ids"]),
            );
        }
        Ok(changes)
    }

    async fn apply(&self, client: &Self::Client, key: &[String], call: &QueueCall) -> Result<()> {
        let [instance_id, queue_id] = key_parts::<2>(key)?;
        let token = IDENTITY.encode(key);
        match call {
            QueueCall::Associate(ids) => client
                .associate_queue_quick_connects(instance_id, queue_id, ids)
                .await
                .classify("AssociateQueueQuickConnects", &token),
            QueueCall::Disassociate(ids) => client
                .disassociate_queue_quick_connects(instance_id, queue_id, ids)
                .await
                .classify("DisassociateQueueQuickConnects", &token),
        }
    }

    fn converged(&self, desired: &QueueAssociation, observed: &Vec<String>) -> bool {
        desired.quick_connect_ids == *observed
    }

    async fn delete(
        &self,
        client: &Self::Client,
        key: &[String],
        desired: &QueueAssociation,
    ) -> Result<()> {
        let [instance_id, queue_id] = key_parts::<2>(key)?;
        client
            .disassociate_queue_quick_connects(instance_id, queue_id, &desired.quick_connect_ids)
            .await
            .classify("DisassociateQueueQuickConnects", &IDENTITY.encode(key))
    }

    fn flatten(&self, key: &[String], observed: &Vec<String>, data: &mut ResourceData) -> Result<()> {
        let [instance_id, queue_id] = key_parts::<2>(key)?;
        data.set("instance_id", instance_id)?;
        data.set("queue_id", queue_id)?;
        data.set("quick_connect_ids", observed)
    }
}
