//! Approved origin of an instance
//!
//! A pure association: the remote "object" is the origin's presence in the
//! instance's approved-origins list.

use crate::api::ConnectApi;
use crate::error::Classify;
use crate::{key_parts, required};
use async_trait::async_trait;
use steadystate_core::{IdentityCodec, Resource, ResourceData, Result, find_member, paginate};

const IDENTITY: IdentityCodec = IdentityCodec::new(",", &["instanceID", "origin"]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginAssociation {
    pub instance_id: String,
    pub origin: String,
}

pub struct ApprovedOrigin;

#[async_trait]
impl Resource for ApprovedOrigin {
    type Client = dyn ConnectApi;
    type Desired = OriginAssociation;
    type Observed = String;
    type Call = ();

    fn type_name(&self) -> &'static str {
        "connect_approved_origin"
    }

    fn identity(&self) -> IdentityCodec {
        IDENTITY
    }

    fn force_new_fields(&self) -> &'static [&'static str] {
        &["instance_id", "origin"]
    }

    fn expand(&self, data: &ResourceData) -> Result<OriginAssociation> {
        Ok(OriginAssociation {
            instance_id: required(data, "instance_id")?,
            origin: required(data, "origin")?,
        })
    }

    async fn create(
        &self,
        client: &Self::Client,
        desired: &OriginAssociation,
    ) -> Result<Vec<String>> {
        let key = vec![desired.instance_id.clone(), desired.origin.clone()];
        client
            .associate_approved_origin(&desired.instance_id, &desired.origin)
            .await
            .classify("AssociateApprovedOrigin", &IDENTITY.encode(&key))?;
        Ok(key)
    }

    async fn find(&self, client: &Self::Client, key: &[String]) -> Result<String> {
        let [instance_id, origin] = key_parts::<2>(key)?;

        let origins = paginate(move |token| async move {
            client
                .list_approved_origins(instance_id, token)
                .await
                .classify("ListApprovedOrigins", instance_id)
        });

        find_member(
            origins,
            &format!("approved origin {} of instance {}", origin, instance_id),
            |o| o == origin,
        )
        .await
    }

    async fn delete(
        &self,
        client: &Self::Client,
        key: &[String],
        _desired: &OriginAssociation,
    ) -> Result<()> {
        let [instance_id, origin] = key_parts::<2>(key)?;
        client
            .disassociate_approved_origin(instance_id, origin)
            .await
            .classify("DisassociateApprovedOrigin", &IDENTITY.encode(key))
    }

    fn flatten(&self, key: &[String], _observed: &String, data: &mut ResourceData) -> Result<()> {
        let [instance_id, origin] = key_parts::<2>(key)?;
        data.set("instance_id", instance_id)?;
        data.set("origin", origin)
    }
}
