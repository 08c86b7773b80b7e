//! Resource contract and the generic lifecycle orchestrator
//!
//! A resource kind describes how to expand desired attributes, how to
//! create, find, update and delete the remote object, and how to write the
//! observed object back into the host record. `Lifecycle` runs the four
//! entry points (plus import) once for every kind:
//!
//! ```text
//! create: expand → create call → store token → stabilize → read
//! read:   decode → find → flatten (NotFound drops the instance)
//! update: decode → expand → find → plan → apply → stabilize → read
//! delete: decode → expand → delete call (NotFound is success) → clear
//! ```
//!
//! When stabilization times out, the last snapshot seen is flattened into
//! the record but not committed, and a warning diagnostic says so.

use crate::config::{EngineConfig, Phase};
use crate::context::InvocationContext;
use crate::error::{CoreError, Result};
use crate::host::{Diagnostic, Diagnostics, ResourceData};
use crate::identity::IdentityCodec;
use crate::plan::{ChangeSet, ChangeSummary};
use crate::stabilizer::{StabilizeError, Stabilizer};
use async_trait::async_trait;
use std::fmt;

/// One resource kind
#[async_trait]
pub trait Resource: Send + Sync {
    /// Remote API client the resource talks to
    type Client: ?Sized + Send + Sync;

    /// Validated desired configuration
    type Desired: fmt::Debug + Send + Sync;

    /// One snapshot of the remote object
    type Observed: fmt::Debug + Send + Sync;

    /// Mutating request produced by the planner
    type Call: fmt::Debug + Send + Sync;

    /// Host-facing type name, e.g. `connect_rule`
    fn type_name(&self) -> &'static str;

    fn identity(&self) -> IdentityCodec;

    /// Attributes that cannot be changed in place
    fn force_new_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Validate host attributes into the desired configuration
    fn expand(&self, data: &ResourceData) -> Result<Self::Desired>;

    /// Issue the creation call and return the key parts of the new object
    async fn create(&self, client: &Self::Client, desired: &Self::Desired) -> Result<Vec<String>>;

    /// Look up the remote object; absence is `NotFound`
    async fn find(&self, client: &Self::Client, key: &[String]) -> Result<Self::Observed>;

    /// Whether a just-created object is fully visible
    fn created(&self, _desired: &Self::Desired, _observed: &Self::Observed) -> bool {
        true
    }

    /// Calls needed to make `observed` match `desired`
    fn plan(
        &self,
        _desired: &Self::Desired,
        _observed: &Self::Observed,
    ) -> Result<ChangeSet<Self::Call>> {
        Ok(ChangeSet::empty())
    }

    async fn apply(
        &self,
        _client: &Self::Client,
        _key: &[String],
        _call: &Self::Call,
    ) -> Result<()> {
        Err(CoreError::validation(format!(
            "{} does not support in-place updates",
            self.type_name()
        )))
    }

    /// Whether the remote object reflects an update
    fn converged(&self, _desired: &Self::Desired, _observed: &Self::Observed) -> bool {
        true
    }

    /// Issue the deletion call(s). For associations only the edge is removed.
    async fn delete(
        &self,
        client: &Self::Client,
        key: &[String],
        desired: &Self::Desired,
    ) -> Result<()>;

    /// Write observed attributes, including every key part, into `data`
    fn flatten(
        &self,
        key: &[String],
        observed: &Self::Observed,
        data: &mut ResourceData,
    ) -> Result<()>;
}

/// Result of a Read invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Attributes were refreshed
    Found,

    /// The object is gone; the host should stop tracking the instance
    Removed,
}

/// Runs the lifecycle entry points for one resource kind
pub struct Lifecycle<R> {
    resource: R,
    config: EngineConfig,
}

impl<R: Resource> Lifecycle<R> {
    pub fn new(resource: R, config: EngineConfig) -> Self {
        Self { resource, config }
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn create(
        &self,
        ctx: &InvocationContext,
        client: &R::Client,
        data: &mut ResourceData,
    ) -> std::result::Result<(), Diagnostics> {
        let result = self.do_create(&self.phase(ctx, Phase::Create), client, data).await;
        let unsettled = is_unsettled(&result);
        self.report("create", data.id(), result)
            .map_err(|diags| self.note_unsettled(diags, "create", data.id(), unsettled))
    }

    pub async fn read(
        &self,
        ctx: &InvocationContext,
        client: &R::Client,
        data: &mut ResourceData,
    ) -> std::result::Result<ReadOutcome, Diagnostics> {
        let id = data.id().map(str::to_string);
        let result = self.refresh(&self.phase(ctx, Phase::Read), client, data, false).await;
        self.report("read", id.as_deref(), result)
    }

    /// Converge an existing instance; returns what was issued
    pub async fn update(
        &self,
        ctx: &InvocationContext,
        client: &R::Client,
        data: &mut ResourceData,
    ) -> std::result::Result<ChangeSummary, Diagnostics> {
        let result = self.do_update(&self.phase(ctx, Phase::Update), client, data).await;
        let unsettled = is_unsettled(&result);
        self.report("update", data.id(), result)
            .map_err(|diags| self.note_unsettled(diags, "update", data.id(), unsettled))
    }

    pub async fn delete(
        &self,
        ctx: &InvocationContext,
        client: &R::Client,
        data: &mut ResourceData,
    ) -> std::result::Result<(), Diagnostics> {
        let id = data.id().map(str::to_string);
        let result = self.do_delete(&self.phase(ctx, Phase::Delete), client, data).await;
        self.report("delete", id.as_deref(), result)
    }

    /// Build a host record from a raw identity string
    pub async fn import(
        &self,
        ctx: &InvocationContext,
        client: &R::Client,
        id: &str,
    ) -> std::result::Result<ResourceData, Diagnostics> {
        let mut data = ResourceData::new(self.resource.type_name());
        data.set_id(id);
        let result = self
            .refresh(&self.phase(ctx, Phase::Read), client, &mut data, true)
            .await;
        self.report("import", Some(id), result).map(|_| data)
    }

    fn phase(&self, ctx: &InvocationContext, phase: Phase) -> InvocationContext {
        ctx.clone().with_timeout(self.config.timeouts.for_phase(phase))
    }

    fn stabilizer(&self, phase: Phase) -> Stabilizer {
        Stabilizer::new(self.config.stabilize(phase))
    }

    fn summary(&self, operation: &str, id: Option<&str>) -> String {
        format!(
            "{} {} ({})",
            operation,
            self.resource.type_name(),
            id.unwrap_or("<new>")
        )
    }

    fn report<T>(
        &self,
        operation: &str,
        id: Option<&str>,
        result: Result<T>,
    ) -> std::result::Result<T, Diagnostics> {
        result.map_err(|err| {
            let summary = self.summary(operation, id);
            tracing::error!("{}: {}", summary, err);
            Diagnostics::from(Diagnostic::error(summary, &err))
        })
    }

    fn note_unsettled(
        &self,
        mut diagnostics: Diagnostics,
        operation: &str,
        id: Option<&str>,
        unsettled: bool,
    ) -> Diagnostics {
        if unsettled {
            diagnostics.push(Diagnostic::warning(
                self.summary(operation, id),
                "attributes show the last observed state; it was not committed",
            ));
        }
        diagnostics
    }

    /// Turn a failed wait into the invocation error. A timed-out wait leaves
    /// its last snapshot in `data`, uncommitted.
    fn give_up(
        &self,
        operation: &str,
        key: &[String],
        err: StabilizeError<R::Observed>,
        data: &mut ResourceData,
    ) -> CoreError {
        if let Some(observed) = err.last_observed() {
            if let Err(e) = self.resource.flatten(key, observed, data) {
                tracing::warn!("could not record last observed state: {}", e);
            }
        }
        err.into_error(operation)
    }

    async fn do_create(
        &self,
        ctx: &InvocationContext,
        client: &R::Client,
        data: &mut ResourceData,
    ) -> Result<()> {
        let type_name = self.resource.type_name();
        let desired = self.resource.expand(data)?;

        let key = ctx
            .call("create", type_name, self.resource.create(client, &desired))
            .await?;
        let token = self.resource.identity().encode(&key);
        tracing::info!("Created {} {}", type_name, token);

        data.set_id(&token);
        data.mark_new();

        let (token_ref, key_ref) = (token.as_str(), key.as_slice());
        let waited = self
            .stabilizer(Phase::Create)
            .wait(
                ctx,
                token_ref,
                move || self.observe(ctx, client, token_ref, key_ref),
                |observed| self.resource.created(&desired, observed),
            )
            .await;
        if let Err(err) = waited {
            return Err(self.give_up("create", &key, err, data));
        }

        self.refresh(ctx, client, data, false).await?;
        Ok(())
    }

    async fn observe(
        &self,
        ctx: &InvocationContext,
        client: &R::Client,
        token: &str,
        key: &[String],
    ) -> Result<R::Observed> {
        ctx.call("find", token, self.resource.find(client, key)).await
    }

    /// Decode → find → flatten. `must_exist` turns NotFound into an error;
    /// so does a brand-new instance.
    async fn refresh(
        &self,
        ctx: &InvocationContext,
        client: &R::Client,
        data: &mut ResourceData,
        must_exist: bool,
    ) -> Result<ReadOutcome> {
        let type_name = self.resource.type_name();
        let token = data.require_id()?.to_string();
        let key = self.resource.identity().decode(&token)?;

        match ctx
            .call("read", &token, self.resource.find(client, &key))
            .await
        {
            Ok(observed) => {
                self.resource.flatten(&key, &observed, data)?;
                data.commit();
                Ok(ReadOutcome::Found)
            }
            Err(err) if err.is_not_found() && data.is_new() => {
                tracing::error!("{} {} disappeared right after creation", type_name, token);
                Err(err)
            }
            Err(err) if err.is_not_found() && !must_exist => {
                tracing::warn!(
                    "{} {} not found, removing from state",
                    type_name,
                    token
                );
                data.clear_id();
                Ok(ReadOutcome::Removed)
            }
            Err(err) => Err(err),
        }
    }

    async fn do_update(
        &self,
        ctx: &InvocationContext,
        client: &R::Client,
        data: &mut ResourceData,
    ) -> Result<ChangeSummary> {
        let type_name = self.resource.type_name();
        let token = data.require_id()?.to_string();
        let key = self.resource.identity().decode(&token)?;

        let force_new = self.resource.force_new_fields();
        if data.has_changes(force_new) {
            let fields = force_new
                .iter()
                .filter(|f| data.has_change(f))
                .map(|f| f.to_string())
                .collect();
            return Err(CoreError::RequiresReplacement { fields });
        }

        let desired = self.resource.expand(data)?;
        let observed = ctx
            .call("read", &token, self.resource.find(client, &key))
            .await?;

        let changes = self.resource.plan(&desired, &observed)?;
        let summary = changes.summary();

        if changes.is_empty() {
            tracing::debug!("{} {} is up to date", type_name, token);
        } else {
            tracing::info!("Updating {} {}: {}", type_name, token, summary);
            for change in changes.iter() {
                tracing::debug!("{} ({})", change.description, change.kind);
                ctx.call(
                    &change.description,
                    &token,
                    self.resource.apply(client, &key, &change.call),
                )
                .await?;
            }

            let (token_ref, key_ref) = (token.as_str(), key.as_slice());
            let waited = self
                .stabilizer(Phase::Update)
                .wait(
                    ctx,
                    token_ref,
                    move || self.observe(ctx, client, token_ref, key_ref),
                    |observed| self.resource.converged(&desired, observed),
                )
                .await;
            if let Err(err) = waited {
                return Err(self.give_up("update", &key, err, data));
            }
        }

        self.refresh(ctx, client, data, true).await?;
        Ok(summary)
    }

    async fn do_delete(
        &self,
        ctx: &InvocationContext,
        client: &R::Client,
        data: &mut ResourceData,
    ) -> Result<()> {
        let type_name = self.resource.type_name();
        let token = data.require_id()?.to_string();
        let key = self.resource.identity().decode(&token)?;
        let desired = self.resource.expand(data)?;

        match ctx
            .call("delete", &token, self.resource.delete(client, &key, &desired))
            .await
        {
            Ok(()) => tracing::info!("Deleted {} {}", type_name, token),
            Err(err) if err.is_not_found() => {
                tracing::debug!("{} {} already gone", type_name, token);
            }
            Err(err) => return Err(err),
        }

        data.clear_id();
        Ok(())
    }
}

fn is_unsettled<T>(result: &Result<T>) -> bool {
    matches!(
        result,
        Err(CoreError::NotStable {
            last_observed: Some(_),
            ..
        })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use crate::host::Severity;
    use crate::plan::FieldDiff;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory store: "shelf,label" -> colour. New writes stay invisible
    /// for `lag` reads.
    #[derive(Default)]
    struct Shelves {
        items: Mutex<HashMap<String, (String, u32)>>,
        lag: u32,
        calls: Mutex<Vec<String>>,
        fail_delete_not_found: bool,
        /// Accept repaints without applying them
        frozen: bool,
    }

    impl Shelves {
        fn with_lag(lag: u32) -> Self {
            Self {
                lag,
                ..Default::default()
            }
        }

        fn log(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn mutations(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| !c.starts_with("get"))
                .cloned()
                .collect()
        }

        fn put(&self, key: String, colour: String) {
            self.items.lock().unwrap().insert(key, (colour, self.lag));
        }
    }

    #[derive(Debug)]
    struct Label {
        shelf: String,
        name: String,
        colour: String,
    }

    struct LabelResource;

    #[async_trait]
    impl Resource for LabelResource {
        type Client = Shelves;
        type Desired = Label;
        type Observed = String;
        type Call = String;

        fn type_name(&self) -> &'static str {
            "test_label"
        }

        fn identity(&self) -> IdentityCodec {
            IdentityCodec::new(",", &["shelf", "name"])
        }

        fn force_new_fields(&self) -> &'static [&'static str] {
            &["shelf", "name"]
        }

        fn expand(&self, data: &ResourceData) -> Result<Label> {
            Ok(Label {
                shelf: data.get("shelf")?,
                name: data.get("name")?,
                colour: data.get("colour")?,
            })
        }

        async fn create(&self, client: &Shelves, desired: &Label) -> Result<Vec<String>> {
            client.log("put");
            client.put(
                format!("{},{}", desired.shelf, desired.name),
                desired.colour.clone(),
            );
            Ok(vec![desired.shelf.clone(), desired.name.clone()])
        }

        async fn find(&self, client: &Shelves, key: &[String]) -> Result<String> {
            client.log("get");
            let mut items = client.items.lock().unwrap();
            match items.get_mut(&key.join(",")) {
                Some((_, lag)) if *lag > 0 => {
                    *lag -= 1;
                    Err(CoreError::not_found(key.join(",")))
                }
                Some((colour, _)) => Ok(colour.clone()),
                None => Err(CoreError::not_found(key.join(","))),
            }
        }

        fn plan(&self, desired: &Label, observed: &String) -> Result<ChangeSet<String>> {
            let mut diff = FieldDiff::new();
            diff.compare("colour", &desired.colour, observed);
            Ok(ChangeSet::replace_if_changed(&diff, "repaint", || {
                desired.colour.clone()
            }))
        }

        async fn apply(&self, client: &Shelves, key: &[String], call: &String) -> Result<()> {
            client.log("repaint");
            if !client.frozen {
                client.put(key.join(","), call.clone());
            }
            Ok(())
        }

        fn converged(&self, desired: &Label, observed: &String) -> bool {
            desired.colour == *observed
        }

        async fn delete(&self, client: &Shelves, key: &[String], _desired: &Label) -> Result<()> {
            client.log("remove");
            if client.fail_delete_not_found {
                return Err(CoreError::not_found(key.join(",")));
            }
            client.items.lock().unwrap().remove(&key.join(","));
            Ok(())
        }

        fn flatten(&self, key: &[String], observed: &String, data: &mut ResourceData) -> Result<()> {
            data.set("shelf", &key[0])?;
            data.set("name", &key[1])?;
            data.set("colour", observed)
        }
    }

    fn lifecycle() -> Lifecycle<LabelResource> {
        let config = EngineConfig {
            timeouts: Timeouts::uniform(Duration::from_secs(60)),
            poll_interval_ms: Some(1000),
        };
        Lifecycle::new(LabelResource, config)
    }

    fn desired(colour: &str) -> ResourceData {
        let attrs = json!({"shelf": "top", "name": "jam", "colour": colour});
        ResourceData::with_attributes("test_label", attrs.as_object().cloned().unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_stores_token_and_reads_back() {
        let client = Shelves::with_lag(2);
        let ctx = InvocationContext::new();
        let mut data = desired("red");

        lifecycle().create(&ctx, &client, &mut data).await.unwrap();

        assert_eq!(data.id(), Some("top,jam"));
        assert!(!data.is_new());
        assert_eq!(data.get::<String>("colour").unwrap(), "red");
        assert_eq!(client.mutations(), vec!["put"]);
    }

    #[tokio::test]
    async fn test_create_failure_stores_no_token() {
        let client = Shelves::default();
        let mut data = ResourceData::new("test_label");

        let diags = lifecycle()
            .create(&InvocationContext::new(), &client, &mut data)
            .await
            .unwrap_err();

        assert!(data.id().is_none());
        assert!(client.mutations().is_empty());
        let d = diags.iter().next().unwrap();
        assert_eq!(d.summary, "create test_label (<new>)");
        assert!(!d.retryable);
    }

    #[tokio::test]
    async fn test_read_missing_drops_instance() {
        let client = Shelves::default();
        let mut data = desired("red");
        data.set_id("top,jam");

        let outcome = lifecycle()
            .read(&InvocationContext::new(), &client, &mut data)
            .await
            .unwrap();

        assert_eq!(outcome, ReadOutcome::Removed);
        assert!(data.id().is_none());
    }

    #[tokio::test]
    async fn test_read_missing_new_instance_is_error() {
        let client = Shelves::default();
        let mut data = desired("red");
        data.set_id("top,jam");
        data.mark_new();

        let diags = lifecycle()
            .read(&InvocationContext::new(), &client, &mut data)
            .await
            .unwrap_err();

        assert!(diags.has_error());
        assert_eq!(data.id(), Some("top,jam"));
    }

    #[tokio::test]
    async fn test_malformed_identity_aborts_before_any_call() {
        let client = Shelves::default();
        let mut data = desired("red");
        data.set_id("top");

        let diags = lifecycle()
            .read(&InvocationContext::new(), &client, &mut data)
            .await
            .unwrap_err();

        assert!(client.calls.lock().unwrap().is_empty());
        let d = diags.iter().next().unwrap();
        assert_eq!(d.summary, "read test_label (top)");
        assert!(d.detail.contains("expected shelf,name"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_emits_one_call_then_none() {
        let client = Shelves::default();
        let ctx = InvocationContext::new();
        let lifecycle = lifecycle();
        let mut data = desired("red");
        lifecycle.create(&ctx, &client, &mut data).await.unwrap();

        data.set("colour", "blue").unwrap();
        let summary = lifecycle.update(&ctx, &client, &mut data).await.unwrap();
        assert_eq!(summary.replace, 1);
        assert_eq!(client.mutations(), vec!["put", "repaint"]);

        let summary = lifecycle.update(&ctx, &client, &mut data).await.unwrap();
        assert_eq!(summary.replace, 0);
        assert_eq!(client.mutations(), vec!["put", "repaint"]);
        assert_eq!(data.get::<String>("colour").unwrap(), "blue");
    }

    #[tokio::test]
    async fn test_update_of_force_new_field_requires_replacement() {
        let client = Shelves::default();
        let attrs = json!({"shelf": "top", "name": "jam", "colour": "red"});
        let mut data =
            ResourceData::from_state("test_label", "top,jam", attrs.as_object().cloned().unwrap());
        data.set("shelf", "bottom").unwrap();

        let diags = lifecycle()
            .update(&InvocationContext::new(), &client, &mut data)
            .await
            .unwrap_err();

        assert!(diags.to_string().contains("requires replacing"));
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_not_stable_is_retryable() {
        let client = Shelves::default();
        let ctx = InvocationContext::new();
        let lifecycle = lifecycle();
        let mut data = desired("red");
        lifecycle.create(&ctx, &client, &mut data).await.unwrap();

        // The repaint never becomes visible within the timeout
        let mut client = client;
        client.lag = 1000;
        data.set("colour", "green").unwrap();

        let diags = lifecycle.update(&ctx, &client, &mut data).await.unwrap_err();
        assert!(diags.is_retryable());
        assert!(diags.to_string().contains("did not stabilize"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_not_stable_keeps_last_observed_uncommitted() {
        let client = Shelves::default();
        let ctx = InvocationContext::new();
        let lifecycle = lifecycle();
        let mut data = desired("red");
        lifecycle.create(&ctx, &client, &mut data).await.unwrap();

        // Reads keep returning the old colour
        let mut client = client;
        client.frozen = true;
        data.set("colour", "green").unwrap();

        let diags = lifecycle.update(&ctx, &client, &mut data).await.unwrap_err();
        assert!(diags.has_error());
        assert!(
            diags
                .iter()
                .any(|d| d.severity == Severity::Warning && d.detail.contains("not committed"))
        );

        assert_eq!(data.get::<String>("colour").unwrap(), "red");
        assert_eq!(data.id(), Some("top,jam"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let client = Shelves {
            fail_delete_not_found: true,
            ..Default::default()
        };
        let mut data = desired("red");
        data.set_id("top,jam");

        lifecycle()
            .delete(&InvocationContext::new(), &client, &mut data)
            .await
            .unwrap();

        assert!(data.id().is_none());
        assert_eq!(client.mutations(), vec!["remove"]);
    }

    #[tokio::test]
    async fn test_import_populates_attributes() {
        let client = Shelves::default();
        client.put("top,jam".to_string(), "red".to_string());

        let data = lifecycle()
            .import(&InvocationContext::new(), &client, "top,jam")
            .await
            .unwrap();

        assert_eq!(data.get::<String>("shelf").unwrap(), "top");
        assert_eq!(data.get::<String>("name").unwrap(), "jam");
        assert_eq!(data.get::<String>("colour").unwrap(), "red");
    }

    #[tokio::test]
    async fn test_import_missing_is_error() {
        let client = Shelves::default();
        let diags = lifecycle()
            .import(&InvocationContext::new(), &client, "top,jam")
            .await
            .unwrap_err();
        assert!(diags.has_error());
    }
}
