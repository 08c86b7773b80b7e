//! Contact flow handling calls to a phone number

use crate::api::{ConnectApi, FlowAssociationSummary};
use crate::error::Classify;
use crate::{key_parts, required};
use async_trait::async_trait;
use steadystate_core::{IdentityCodec, Resource, ResourceData, Result, find_member, paginate};

const IDENTITY: IdentityCodec =
    IdentityCodec::new(":", &["instanceID", "phoneNumberID", "contactFlowID"]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowAssociation {
    pub instance_id: String,
    pub phone_number_id: String,
    pub contact_flow_id: String,
}

pub struct PhoneNumberContactFlow;

#[async_trait]
impl Resource for PhoneNumberContactFlow {
    type Client = dyn ConnectApi;
    type Desired = FlowAssociation;
    type Observed = FlowAssociationSummary;
    type Call = ();

    fn type_name(&self) -> &'static str {
        "connect_phone_number_contact_flow"
    }

    fn identity(&self) -> IdentityCodec {
        IDENTITY
    }

    fn force_new_fields(&self) -> &'static [&'static str] {
        &["instance_id", "phone_number_id", "contact_flow_id"]
    }

    fn expand(&self, data: &ResourceData) -> Result<FlowAssociation> {
        Ok(FlowAssociation {
            instance_id: required(data, "instance_id")?,
            phone_number_id: required(data, "phone_number_id")?,
            contact_flow_id: required(data, "contact_flow_id")?,
        })
    }

    async fn create(&self, client: &Self::Client, desired: &FlowAssociation) -> Result<Vec<String>> {
        let key = vec![
            desired.instance_id.clone(),
            desired.phone_number_id.clone(),
            desired.contact_flow_id.clone(),
        ];
        client
            .associate_phone_number_contact_flow(
                &desired.instance_id,
                &desired.phone_number_id,
                &desired.contact_flow_id,
            )
            .await
            .classify("AssociatePhoneNumberContactFlow", &IDENTITY.encode(&key))?;
        Ok(key)
    }

    async fn find(&self, client: &Self::Client, key: &[String]) -> Result<FlowAssociationSummary> {
        let [instance_id, phone_number_id, contact_flow_id] = key_parts::<3>(key)?;

        let associations = paginate(move |token| async move {
            client
                .list_flow_associations(instance_id, token)
                .await
                .classify("ListFlowAssociations", instance_id)
        });

        find_member(
            associations,
            &format!(
                "contact flow {} on phone number {} in instance {}",
                contact_flow_id, phone_number_id, instance_id
            ),
            |a| a.resource_id == phone_number_id && a.flow_id == contact_flow_id,
        )
        .await
    }

    async fn delete(
        &self,
        client: &Self::Client,
        key: &[String],
        _desired: &FlowAssociation,
    ) -> Result<()> {
        let [instance_id, phone_number_id, _] = key_parts::<3>(key)?;

        // The remote call only names the number; leave it alone when it
        // already routes to a different flow
        self.find(client, key).await?;
        client
            .disassociate_phone_number_contact_flow(instance_id, phone_number_id)
            .await
            .classify("DisassociatePhoneNumberContactFlow", &IDENTITY.encode(key))
    }

    fn flatten(
        &self,
        key: &[String],
        observed: &FlowAssociationSummary,
        data: &mut ResourceData,
    ) -> Result<()> {
        let [instance_id, _, _] = key_parts::<3>(key)?;
        data.set("instance_id", instance_id)?;
        data.set("phone_number_id", &observed.resource_id)?;
        data.set("contact_flow_id", &observed.flow_id)
    }
}
