//! Wire messages of the protocol service and the application-message envelope.
//!
//! Declared by hand with `prost` derives; field tags match the protocol
//! service's `.proto` definitions so the gRPC adapter and the store can
//! exchange bytes with real peers.

/// Request for the instance configuration.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ServiceGetConfigurationRequest {}

/// Instance configuration of the account served by the protocol service.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ServiceGetConfigurationReply {
    #[prost(bytes = "vec", tag = "1")]
    pub account_pk: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub device_pk: Vec<u8>,
    /// Public key of the account ("home") group.
    #[prost(bytes = "vec", tag = "3")]
    pub account_group_pk: Vec<u8>,
    #[prost(string, tag = "4")]
    pub peer_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ActivateGroupRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub group_pk: Vec<u8>,
    /// Activate without announcing the group on the network.
    #[prost(bool, tag = "2")]
    pub local_only: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ActivateGroupReply {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeactivateGroupRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub group_pk: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeactivateGroupReply {}

/// Bounds of a metadata or message log listing.
///
/// Replay only ever sets `until_now`; the other bounds exist for callers that
/// page through a log.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupLogListRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub group_pk: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub since_id: Vec<u8>,
    #[prost(bool, tag = "3")]
    pub since_now: bool,
    #[prost(bytes = "vec", tag = "4")]
    pub until_id: Vec<u8>,
    #[prost(bool, tag = "5")]
    pub until_now: bool,
    #[prost(bool, tag = "6")]
    pub reverse_order: bool,
}

impl GroupLogListRequest {
    /// Everything in the log from its start up to the moment the stream opens.
    pub fn until_now(group_pk: &[u8]) -> Self {
        Self {
            group_pk: group_pk.to_vec(),
            until_now: true,
            ..Default::default()
        }
    }
}

/// Position of an event in a group log.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EventContext {
    #[prost(bytes = "vec", tag = "1")]
    pub id: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub parent_ids: Vec<Vec<u8>>,
    #[prost(bytes = "vec", tag = "3")]
    pub group_pk: Vec<u8>,
}

/// Kind of a metadata log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EventType {
    Undefined = 0,
    GroupMemberDeviceAdded = 1,
    GroupDeviceChainKeyAdded = 2,
    GroupMetadataPayloadSent = 3,
    GroupReplicating = 4,
    AccountGroupJoined = 101,
    AccountGroupLeft = 102,
    AccountContactRequestDisabled = 103,
    AccountContactRequestEnabled = 104,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupMetadata {
    #[prost(enumeration = "EventType", tag = "1")]
    pub event_type: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub sig: Vec<u8>,
}

/// One entry of a group's metadata log.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupMetadataEvent {
    #[prost(message, optional, tag = "1")]
    pub event_context: Option<EventContext>,
    #[prost(message, optional, tag = "2")]
    pub metadata: Option<GroupMetadata>,
    /// Decrypted event payload, interpreted according to `metadata.event_type`.
    #[prost(bytes = "vec", tag = "3")]
    pub event: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MessageHeaders {
    #[prost(uint64, tag = "1")]
    pub counter: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub device_pk: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub sig: Vec<u8>,
}

/// One entry of a group's message log.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupMessageEvent {
    #[prost(message, optional, tag = "1")]
    pub event_context: Option<EventContext>,
    #[prost(message, optional, tag = "2")]
    pub headers: Option<MessageHeaders>,
    /// Serialized [`AppMessage`].
    #[prost(bytes = "vec", tag = "3")]
    pub message: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Group {
    #[prost(bytes = "vec", tag = "1")]
    pub public_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub secret: Vec<u8>,
    #[prost(enumeration = "GroupType", tag = "4")]
    pub group_type: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum GroupType {
    Undefined = 0,
    Account = 1,
    Contact = 2,
    MultiMember = 3,
}

/// Payload of [`EventType::AccountGroupJoined`].
#[derive(Clone, PartialEq, prost::Message)]
pub struct AccountGroupJoined {
    #[prost(bytes = "vec", tag = "1")]
    pub device_pk: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub group: Option<Group>,
}

/// Payload of [`EventType::GroupMemberDeviceAdded`].
#[derive(Clone, PartialEq, prost::Message)]
pub struct GroupMemberDeviceAdded {
    #[prost(bytes = "vec", tag = "1")]
    pub member_pk: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub device_pk: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub member_sig: Vec<u8>,
}

/// Kind of an application message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AppMessageType {
    Undefined = 0,
    UserMessage = 1,
    Acknowledge = 3,
    GroupInvitation = 4,
    SetGroupInfo = 5,
    SetUserInfo = 6,
}

/// Application-level envelope carried in a message log entry.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AppMessage {
    #[prost(enumeration = "AppMessageType", tag = "1")]
    pub r#type: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
    /// Milliseconds since the Unix epoch, as claimed by the sender.
    #[prost(int64, tag = "3")]
    pub sent_date: i64,
    /// Content id of the interaction this message refers to, if any.
    #[prost(string, tag = "5")]
    pub target_cid: String,
}

/// Payload of [`AppMessageType::UserMessage`].
#[derive(Clone, PartialEq, prost::Message)]
pub struct UserMessage {
    #[prost(string, tag = "1")]
    pub body: String,
}
