//! gRPC implementation of [`ProtocolClient`].

use async_trait::async_trait;
use futures::StreamExt;
use http::uri::PathAndQuery;
use tokio_util::sync::CancellationToken;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::transport::Channel;
use tracing::debug;

use super::{
    forward_until_cancelled, ClientError, MessageStream, MetadataStream, ProtocolClient, Result,
};
use crate::proto::{
    ActivateGroupReply, ActivateGroupRequest, DeactivateGroupReply, DeactivateGroupRequest,
    GroupLogListRequest, GroupMessageEvent, GroupMetadataEvent, ServiceGetConfigurationReply,
    ServiceGetConfigurationRequest,
};
use crate::transport::connect_to_address;
use crate::utils::ids::encode_pk;

const SERVICE: &str = "weshnet.protocol.v1.ProtocolService";

const GET_CONFIGURATION: &str = "/weshnet.protocol.v1.ProtocolService/ServiceGetConfiguration";
const ACTIVATE_GROUP: &str = "/weshnet.protocol.v1.ProtocolService/ActivateGroup";
const DEACTIVATE_GROUP: &str = "/weshnet.protocol.v1.ProtocolService/DeactivateGroup";
const GROUP_METADATA_LIST: &str = "/weshnet.protocol.v1.ProtocolService/GroupMetadataList";
const GROUP_MESSAGE_LIST: &str = "/weshnet.protocol.v1.ProtocolService/GroupMessageList";

/// Protocol client over a tonic channel (TCP or Unix socket).
#[derive(Clone)]
pub struct GrpcProtocolClient {
    inner: Grpc<Channel>,
}

impl GrpcProtocolClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: Grpc::new(channel),
        }
    }

    /// Connect to the protocol service at `address`.
    pub async fn connect(address: &str) -> Result<Self> {
        let channel = connect_to_address(address).await?;
        debug!(service = SERVICE, address = %address, "Protocol client connected");
        Ok(Self::new(channel))
    }

    async fn unary<Req, Resp>(&self, request: Req, path: &'static str) -> Result<Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready().await?;

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                codec,
            )
            .await?;
        Ok(response.into_inner())
    }

    async fn server_streaming<Resp>(
        &self,
        request: GroupLogListRequest,
        path: &'static str,
        cancel: CancellationToken,
    ) -> Result<futures::stream::BoxStream<'static, Result<Resp>>>
    where
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready().await?;

        let codec: ProstCodec<GroupLogListRequest, Resp> = ProstCodec::default();
        let response = grpc
            .server_streaming(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                codec,
            )
            .await?;

        let stream = response
            .into_inner()
            .map(|item| item.map_err(ClientError::from));
        Ok(forward_until_cancelled(stream, cancel))
    }
}

#[async_trait]
impl ProtocolClient for GrpcProtocolClient {
    async fn get_configuration(&self) -> Result<ServiceGetConfigurationReply> {
        self.unary(ServiceGetConfigurationRequest {}, GET_CONFIGURATION)
            .await
    }

    async fn activate_group(&self, group_pk: &[u8], local_only: bool) -> Result<()> {
        let request = ActivateGroupRequest {
            group_pk: group_pk.to_vec(),
            local_only,
        };
        let _: ActivateGroupReply = self.unary(request, ACTIVATE_GROUP).await?;
        Ok(())
    }

    async fn deactivate_group(&self, group_pk: &[u8]) -> Result<()> {
        let request = DeactivateGroupRequest {
            group_pk: group_pk.to_vec(),
        };
        let _: DeactivateGroupReply = self.unary(request, DEACTIVATE_GROUP).await?;
        Ok(())
    }

    async fn list_group_metadata(
        &self,
        group_pk: &[u8],
        cancel: CancellationToken,
    ) -> Result<MetadataStream> {
        debug!(group = %encode_pk(group_pk), "Opening metadata list");
        self.server_streaming::<GroupMetadataEvent>(
            GroupLogListRequest::until_now(group_pk),
            GROUP_METADATA_LIST,
            cancel,
        )
        .await
    }

    async fn list_group_messages(
        &self,
        group_pk: &[u8],
        cancel: CancellationToken,
    ) -> Result<MessageStream> {
        debug!(group = %encode_pk(group_pk), "Opening message list");
        self.server_streaming::<GroupMessageEvent>(
            GroupLogListRequest::until_now(group_pk),
            GROUP_MESSAGE_LIST,
            cancel,
        )
        .await
    }
}
