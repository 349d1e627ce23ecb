//! End-to-end replay into SQLite through the store projection.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use messenger_replay::client::MockProtocolClient;
use messenger_replay::proto::{
    AccountGroupJoined, EventType, Group, GroupMemberDeviceAdded, GroupType,
};
use messenger_replay::replay_logs_to_store;
use messenger_replay::storage::{
    init_store, Account, Conversation, ConversationType, Interaction, LocalStore, Member,
    SqliteStore, StorageConfig,
};
use messenger_replay::test_utils::{
    acknowledge_event, metadata_event, user_message_event, CallLog,
};
use messenger_replay::utils::ids::encode_pk;

const HOME: &[u8] = &[1u8; 32];
const GROUP_A: &[u8] = &[2u8; 32];
const GROUP_B: &[u8] = &[3u8; 32];
const OWN_DEVICE: &[u8] = &[8u8; 32];
const PEER: &[u8] = &[5u8; 32];
const PEER_DEVICE: &[u8] = &[6u8; 32];

#[derive(Debug, PartialEq)]
struct Snapshot {
    account: Option<Account>,
    conversations: Vec<Conversation>,
    members: Vec<Member>,
    interactions: Vec<Interaction>,
}

async fn snapshot(store: &dyn LocalStore) -> Snapshot {
    let conversations = store.list_conversations().await.unwrap();
    let mut members = Vec::new();
    let mut interactions = Vec::new();
    for conversation in &conversations {
        members.extend(store.list_members(&conversation.public_key).await.unwrap());
        interactions.extend(
            store
                .list_interactions(&conversation.public_key)
                .await
                .unwrap(),
        );
    }
    Snapshot {
        account: store.get_account(&encode_pk(HOME)).await.unwrap(),
        conversations,
        members,
        interactions,
    }
}

fn joined(group_pk: &[u8], group_type: GroupType) -> AccountGroupJoined {
    AccountGroupJoined {
        device_pk: OWN_DEVICE.to_vec(),
        group: Some(Group {
            public_key: group_pk.to_vec(),
            secret: vec![7u8; 32],
            group_type: group_type as i32,
        }),
    }
}

fn device_added(member_pk: &[u8], device_pk: &[u8]) -> GroupMemberDeviceAdded {
    GroupMemberDeviceAdded {
        member_pk: member_pk.to_vec(),
        device_pk: device_pk.to_vec(),
        member_sig: vec![],
    }
}

/// Protocol service holding the logs of an account with two groups.
async fn protocol_service() -> Arc<MockProtocolClient> {
    let client = Arc::new(MockProtocolClient::new(HOME, CallLog::new()));

    client
        .push_metadata(
            HOME,
            metadata_event(
                HOME,
                b"h-m1",
                EventType::GroupMemberDeviceAdded,
                device_added(HOME, OWN_DEVICE),
            ),
        )
        .await;
    client
        .push_metadata(
            HOME,
            metadata_event(
                HOME,
                b"h-m2",
                EventType::AccountGroupJoined,
                joined(GROUP_A, GroupType::MultiMember),
            ),
        )
        .await;
    client
        .push_metadata(
            HOME,
            metadata_event(
                HOME,
                b"h-m3",
                EventType::AccountGroupJoined,
                joined(GROUP_B, GroupType::Contact),
            ),
        )
        .await;

    client
        .push_metadata(
            GROUP_A,
            metadata_event(
                GROUP_A,
                b"a-m1",
                EventType::GroupMemberDeviceAdded,
                device_added(PEER, PEER_DEVICE),
            ),
        )
        .await;
    client
        .push_message(
            GROUP_A,
            user_message_event(GROUP_A, b"a-1", PEER_DEVICE, "hello"),
        )
        .await;
    client
        .push_message(
            GROUP_A,
            user_message_event(GROUP_A, b"a-2", OWN_DEVICE, "hi there"),
        )
        .await;
    client
        .push_message(
            GROUP_A,
            acknowledge_event(GROUP_A, b"a-3", OWN_DEVICE, &encode_pk(b"a-1")),
        )
        .await;

    client
        .push_message(
            GROUP_B,
            user_message_event(GROUP_B, b"b-1", PEER_DEVICE, "contact request accepted"),
        )
        .await;

    client
}

async fn memory_store() -> Arc<SqliteStore> {
    let config = StorageConfig {
        path: ":memory:".to_string(),
    };
    Arc::new(init_store(&config).await.unwrap())
}

#[tokio::test]
async fn test_replay_builds_store() {
    let client = protocol_service().await;
    let store = memory_store().await;

    let summary = replay_logs_to_store(&CancellationToken::new(), client.clone(), store.clone())
        .await
        .unwrap();

    assert_eq!(summary.groups, 3);
    assert_eq!(summary.metadata_applied, 4);
    assert_eq!(summary.messages_applied, 4);

    let state = snapshot(store.as_ref()).await;
    assert_eq!(
        state.account,
        Some(Account {
            public_key: encode_pk(HOME),
            display_name: String::new(),
        })
    );
    assert_eq!(
        state
            .conversations
            .iter()
            .map(|c| (c.public_key.clone(), c.conversation_type))
            .collect::<Vec<_>>(),
        vec![
            (encode_pk(HOME), ConversationType::Account),
            (encode_pk(GROUP_A), ConversationType::MultiMember),
            (encode_pk(GROUP_B), ConversationType::Contact),
        ]
    );
    assert_eq!(state.members.len(), 2);

    let group_a = store.list_interactions(&encode_pk(GROUP_A)).await.unwrap();
    assert_eq!(group_a.len(), 2);
    assert_eq!(group_a[0].cid, encode_pk(b"a-1"));
    assert!(group_a[0].acknowledged);
    assert!(!group_a[1].acknowledged);

    let group_b = store.list_interactions(&encode_pk(GROUP_B)).await.unwrap();
    assert_eq!(group_b.len(), 1);
    assert_eq!(group_b[0].device_public_key, encode_pk(PEER_DEVICE));

    assert!(!client.is_active(GROUP_A).await);
    assert!(!client.is_active(GROUP_B).await);
}

#[tokio::test]
async fn test_replay_is_idempotent() {
    let client = protocol_service().await;
    let store = memory_store().await;
    let cancel = CancellationToken::new();

    replay_logs_to_store(&cancel, client.clone(), store.clone())
        .await
        .unwrap();
    let first = snapshot(store.as_ref()).await;

    replay_logs_to_store(&cancel, client.clone(), store.clone())
        .await
        .unwrap();
    let second = snapshot(store.as_ref()).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_acknowledgement_ahead_of_target_is_idempotent() {
    let client = protocol_service().await;
    client
        .push_message(
            GROUP_B,
            acknowledge_event(GROUP_B, b"b-2", OWN_DEVICE, &encode_pk(b"b-3")),
        )
        .await;
    client
        .push_message(
            GROUP_B,
            user_message_event(GROUP_B, b"b-3", PEER_DEVICE, "late target"),
        )
        .await;
    let store = memory_store().await;
    let cancel = CancellationToken::new();

    replay_logs_to_store(&cancel, client.clone(), store.clone())
        .await
        .unwrap();
    let once = snapshot(store.as_ref()).await;

    let late = once
        .interactions
        .iter()
        .find(|i| i.cid == encode_pk(b"b-3"))
        .unwrap();
    assert!(late.acknowledged);

    replay_logs_to_store(&cancel, client, store.clone())
        .await
        .unwrap();
    assert_eq!(snapshot(store.as_ref()).await, once);
}

#[tokio::test]
async fn test_replay_into_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        path: dir
            .path()
            .join("nested")
            .join("messenger.db")
            .to_string_lossy()
            .into_owned(),
    };
    let client = protocol_service().await;

    let store = Arc::new(init_store(&config).await.unwrap());
    replay_logs_to_store(&CancellationToken::new(), client.clone(), store.clone())
        .await
        .unwrap();
    let before = snapshot(store.as_ref()).await;
    drop(store);

    let reopened = Arc::new(init_store(&config).await.unwrap());
    assert_eq!(snapshot(reopened.as_ref()).await, before);

    replay_logs_to_store(&CancellationToken::new(), client, reopened.clone())
        .await
        .unwrap();
    assert_eq!(snapshot(reopened.as_ref()).await, before);
}
