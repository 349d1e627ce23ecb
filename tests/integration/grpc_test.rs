//! gRPC client against an in-process protocol service over a Unix socket.
#![cfg(unix)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::Path;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use prost::Message;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::body::BoxBody;
use tonic::codec::ProstCodec;
use tonic::codegen::{http, BoxFuture, Context, Poll, Service};
use tonic::server::{Grpc, NamedService};
use tonic::transport::Server;
use tonic::Status;

use messenger_replay::client::{GrpcProtocolClient, ProtocolClient};
use messenger_replay::proto::{
    AccountGroupJoined, ActivateGroupReply, ActivateGroupRequest, DeactivateGroupReply,
    DeactivateGroupRequest, EventType, Group, GroupLogListRequest, GroupMessageEvent,
    GroupMetadataEvent, GroupType, ServiceGetConfigurationReply, ServiceGetConfigurationRequest,
};
use messenger_replay::replay_logs_to_store;
use messenger_replay::storage::{init_store, LocalStore, StorageConfig};
use messenger_replay::test_utils::{metadata_event, user_message_event};
use messenger_replay::utils::ids::encode_pk;

const HOME: &[u8] = &[1u8; 32];
const GROUP_A: &[u8] = &[2u8; 32];
const DEVICE: &[u8] = &[9u8; 32];

/// Request seen by the service.
#[derive(Debug, Clone, PartialEq)]
enum Received {
    Activate(ActivateGroupRequest),
    Deactivate(DeactivateGroupRequest),
    Metadata(GroupLogListRequest),
    Messages(GroupLogListRequest),
}

#[derive(Default)]
struct Logs {
    metadata: HashMap<Vec<u8>, Vec<GroupMetadataEvent>>,
    messages: HashMap<Vec<u8>, Vec<GroupMessageEvent>>,
}

/// Protocol service serving fixed logs for one account.
#[derive(Clone)]
struct ProtocolServer {
    logs: Arc<Logs>,
    received: Arc<Mutex<Vec<Received>>>,
}

impl ProtocolServer {
    fn new(logs: Logs) -> Self {
        Self {
            logs: Arc::new(logs),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

async fn unary<Req, Resp, F>(
    req: http::Request<BoxBody>,
    mut handler: F,
) -> http::Response<BoxBody>
where
    Req: Message + Default + Send + 'static,
    Resp: Message + Send + 'static,
    F: FnMut(Req) -> Resp + Send + 'static,
{
    let method = tower::service_fn(move |request: tonic::Request<Req>| {
        let reply = handler(request.into_inner());
        async move { Ok::<_, Status>(tonic::Response::new(reply)) }
    });
    let codec: ProstCodec<Resp, Req> = ProstCodec::default();
    let mut grpc = Grpc::new(codec);
    grpc.unary(method, req).await
}

async fn server_streaming<Req, Resp, F>(
    req: http::Request<BoxBody>,
    mut handler: F,
) -> http::Response<BoxBody>
where
    Req: Message + Default + Send + 'static,
    Resp: Message + Send + 'static,
    F: FnMut(Req) -> Vec<Resp> + Send + 'static,
{
    let method = tower::service_fn(move |request: tonic::Request<Req>| {
        let items = handler(request.into_inner());
        async move {
            let stream = futures::stream::iter(items.into_iter().map(Ok::<Resp, Status>));
            Ok::<_, Status>(tonic::Response::new(stream))
        }
    });
    let codec: ProstCodec<Resp, Req> = ProstCodec::default();
    let mut grpc = Grpc::new(codec);
    grpc.server_streaming(method, req).await
}

impl Service<http::Request<BoxBody>> for ProtocolServer {
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<BoxBody>) -> Self::Future {
        let logs = Arc::clone(&self.logs);
        let received = Arc::clone(&self.received);

        match req.uri().path() {
            "/weshnet.protocol.v1.ProtocolService/ServiceGetConfiguration" => Box::pin(async move {
                Ok(unary(req, |_: ServiceGetConfigurationRequest| {
                    ServiceGetConfigurationReply {
                        account_group_pk: HOME.to_vec(),
                        device_pk: DEVICE.to_vec(),
                        ..Default::default()
                    }
                })
                .await)
            }),
            "/weshnet.protocol.v1.ProtocolService/ActivateGroup" => Box::pin(async move {
                Ok(unary(req, move |request: ActivateGroupRequest| {
                    received.lock().unwrap().push(Received::Activate(request));
                    ActivateGroupReply {}
                })
                .await)
            }),
            "/weshnet.protocol.v1.ProtocolService/DeactivateGroup" => Box::pin(async move {
                Ok(unary(req, move |request: DeactivateGroupRequest| {
                    received.lock().unwrap().push(Received::Deactivate(request));
                    DeactivateGroupReply {}
                })
                .await)
            }),
            "/weshnet.protocol.v1.ProtocolService/GroupMetadataList" => Box::pin(async move {
                Ok(server_streaming(req, move |request: GroupLogListRequest| {
                    let events = logs
                        .metadata
                        .get(&request.group_pk)
                        .cloned()
                        .unwrap_or_default();
                    received.lock().unwrap().push(Received::Metadata(request));
                    events
                })
                .await)
            }),
            "/weshnet.protocol.v1.ProtocolService/GroupMessageList" => Box::pin(async move {
                Ok(server_streaming(req, move |request: GroupLogListRequest| {
                    let events = logs
                        .messages
                        .get(&request.group_pk)
                        .cloned()
                        .unwrap_or_default();
                    received.lock().unwrap().push(Received::Messages(request));
                    events
                })
                .await)
            }),
            path => {
                let status = Status::unimplemented(path.to_string());
                Box::pin(async move { Ok(status.into_http()) })
            }
        }
    }
}

impl NamedService for ProtocolServer {
    const NAME: &'static str = "weshnet.protocol.v1.ProtocolService";
}

fn account_logs() -> Logs {
    let mut logs = Logs::default();
    logs.metadata.insert(
        HOME.to_vec(),
        vec![metadata_event(
            HOME,
            b"h-m1",
            EventType::AccountGroupJoined,
            AccountGroupJoined {
                device_pk: DEVICE.to_vec(),
                group: Some(Group {
                    public_key: GROUP_A.to_vec(),
                    secret: vec![4u8; 32],
                    group_type: GroupType::MultiMember as i32,
                }),
            },
        )],
    );
    logs.messages.insert(
        GROUP_A.to_vec(),
        vec![
            user_message_event(GROUP_A, b"a-1", DEVICE, "first"),
            user_message_event(GROUP_A, b"a-2", DEVICE, "second"),
        ],
    );
    logs
}

async fn start_server(socket: &Path, server: ProtocolServer) {
    let listener = UnixListener::bind(socket).unwrap();

    tokio::spawn(async move {
        Server::builder()
            .add_service(server)
            .serve_with_incoming(UnixListenerStream::new(listener))
            .await
            .unwrap();
    });
}

async fn connect(socket: &Path) -> GrpcProtocolClient {
    GrpcProtocolClient::connect(socket.to_str().unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_unary_calls_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("protocol.sock");
    let server = ProtocolServer::new(account_logs());
    start_server(&socket, server.clone()).await;
    let client = connect(&socket).await;

    let config = client.get_configuration().await.unwrap();
    assert_eq!(config.account_group_pk, HOME);
    assert_eq!(config.device_pk, DEVICE);

    client.activate_group(GROUP_A, true).await.unwrap();
    client.deactivate_group(GROUP_A).await.unwrap();

    assert_eq!(
        server.received(),
        vec![
            Received::Activate(ActivateGroupRequest {
                group_pk: GROUP_A.to_vec(),
                local_only: true,
            }),
            Received::Deactivate(DeactivateGroupRequest {
                group_pk: GROUP_A.to_vec(),
            }),
        ]
    );
}

#[tokio::test]
async fn test_log_listings_stream_every_entry() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("protocol.sock");
    let server = ProtocolServer::new(account_logs());
    start_server(&socket, server.clone()).await;
    let client = connect(&socket).await;

    let metadata: Vec<_> = client
        .list_group_metadata(HOME, CancellationToken::new())
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(metadata.len(), 1);
    assert_eq!(
        metadata[0].as_ref().unwrap(),
        &account_logs().metadata[HOME][0]
    );

    let messages: Vec<_> = client
        .list_group_messages(GROUP_A, CancellationToken::new())
        .await
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;
    assert_eq!(messages, account_logs().messages[GROUP_A]);

    assert_eq!(
        server.received(),
        vec![
            Received::Metadata(GroupLogListRequest::until_now(HOME)),
            Received::Messages(GroupLogListRequest::until_now(GROUP_A)),
        ]
    );
}

#[tokio::test]
async fn test_unknown_group_lists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("protocol.sock");
    start_server(&socket, ProtocolServer::new(Logs::default())).await;
    let client = connect(&socket).await;

    let messages: Vec<_> = client
        .list_group_messages(GROUP_A, CancellationToken::new())
        .await
        .unwrap()
        .collect()
        .await;
    assert!(messages.is_empty());
}

#[tokio::test]
async fn test_replay_over_grpc() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("protocol.sock");
    let server = ProtocolServer::new(account_logs());
    start_server(&socket, server.clone()).await;
    let client = Arc::new(connect(&socket).await);
    let store = Arc::new(
        init_store(&StorageConfig {
            path: ":memory:".to_string(),
        })
        .await
        .unwrap(),
    );

    let summary = replay_logs_to_store(&CancellationToken::new(), client, store.clone())
        .await
        .unwrap();

    assert_eq!(summary.groups, 1);
    assert_eq!(summary.messages_applied, 2);
    let interactions = store.list_interactions(&encode_pk(GROUP_A)).await.unwrap();
    assert_eq!(
        interactions.iter().map(|i| i.cid.clone()).collect::<Vec<_>>(),
        vec![encode_pk(b"a-1"), encode_pk(b"a-2")]
    );

    let received = server.received();
    assert_eq!(
        received.first(),
        Some(&Received::Metadata(GroupLogListRequest::until_now(HOME)))
    );
    assert_eq!(
        received.last(),
        Some(&Received::Deactivate(DeactivateGroupRequest {
            group_pk: GROUP_A.to_vec(),
        }))
    );
    assert!(received.contains(&Received::Activate(ActivateGroupRequest {
        group_pk: GROUP_A.to_vec(),
        local_only: true,
    })));
}
