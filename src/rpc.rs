use std::borrow::Cow;

use futures_util::stream::StreamExt;
use lapin::{
    options::*,
    types::{FieldTable, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::data_structure::{MetadataBlob, RobotState, TorqueCommand};
use crate::error::RpcError;

pub const INIT_ROBOT_CLIENT_QUEUE: &str = "init_robot_client";
pub const CONTROL_UPDATE_QUEUE: &str = "control_update";

/// The controller server as seen by the latency client. Only success or
/// failure of each call matters to the caller.
pub trait ControllerRpc {
    fn init_robot_client(&mut self, metadata: &MetadataBlob) -> Result<(), RpcError>;

    fn control_update(&mut self, state: &RobotState) -> Result<TorqueCommand, RpcError>;
}

impl<T: ControllerRpc + ?Sized> ControllerRpc for Box<T> {
    fn init_robot_client(&mut self, metadata: &MetadataBlob) -> Result<(), RpcError> {
        (**self).init_robot_client(metadata)
    }

    fn control_update(&mut self, state: &RobotState) -> Result<TorqueCommand, RpcError> {
        (**self).control_update(state)
    }
}

/// One outgoing call: which queue it goes to and the body it publishes.
#[derive(Debug, Clone, Copy)]
pub enum RpcRequest<'a> {
    InitRobotClient(&'a MetadataBlob),
    ControlUpdate(&'a RobotState),
}

impl<'a> RpcRequest<'a> {
    pub fn op(&self) -> &'static str {
        match self {
            Self::InitRobotClient(_) => "InitRobotClient",
            Self::ControlUpdate(_) => "ControlUpdate",
        }
    }

    pub fn queue(&self) -> &'static str {
        match self {
            Self::InitRobotClient(_) => INIT_ROBOT_CLIENT_QUEUE,
            Self::ControlUpdate(_) => CONTROL_UPDATE_QUEUE,
        }
    }

    /// Metadata goes out byte-for-byte as read from disk; state is JSON encoded.
    pub fn body(&self) -> Result<Cow<'a, [u8]>, RpcError> {
        match *self {
            Self::InitRobotClient(blob) => Ok(Cow::Borrowed(blob.as_bytes())),
            Self::ControlUpdate(state) => Ok(Cow::Owned(serde_json::to_vec(state)?)),
        }
    }
}

/// Reply envelope the server sends back on the reply queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcReply {
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub command: Option<TorqueCommand>,
}

impl RpcReply {
    fn into_result(self, op: &'static str) -> Result<Option<TorqueCommand>, RpcError> {
        if self.ok {
            Ok(self.command)
        } else {
            Err(RpcError::Rejected {
                op,
                message: self.message.unwrap_or_else(|| "no status message".into()),
            })
        }
    }
}

/// Blocking request/reply client over AMQP. Each call publishes a JSON body
/// with `reply_to` and `correlation_id` set and waits, without a timeout, for
/// the matching reply.
pub struct AmqpControllerRpc {
    runtime: Runtime,
    _connection: Connection,
    channel: Channel,
    replies: Consumer,
    reply_to: ShortString,
    session: u32,
    next_id: u64,
}

impl AmqpControllerRpc {
    pub fn connect(address: &str) -> Result<Self, RpcError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (connection, channel, replies, reply_to) = runtime.block_on(async {
            let conn = Connection::connect(address, ConnectionProperties::default()).await?;
            let channel = conn.create_channel().await?;

            let reply_queue = channel
                .queue_declare(
                    "",
                    QueueDeclareOptions {
                        exclusive: true,
                        auto_delete: true,
                        ..QueueDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await?;
            let reply_to = reply_queue.name().clone();

            let replies = channel
                .basic_consume(
                    reply_to.as_str(),
                    "latency_client",
                    BasicConsumeOptions {
                        no_ack: true,
                        ..BasicConsumeOptions::default()
                    },
                    FieldTable::default(),
                )
                .await?;

            Ok::<_, RpcError>((conn, channel, replies, reply_to))
        })?;

        info!(
            address,
            reply_queue = reply_to.as_str(),
            "connected to controller server"
        );

        Ok(Self {
            runtime,
            _connection: connection,
            channel,
            replies,
            reply_to,
            session: fastrand::u32(..),
            next_id: 0,
        })
    }

    fn call(&mut self, request: RpcRequest<'_>) -> Result<RpcReply, RpcError> {
        let op = request.op();
        let payload = request.body()?;
        let correlation_id = format!("{:08x}-{}", self.session, self.next_id);
        self.next_id += 1;

        let Self {
            runtime,
            channel,
            replies,
            reply_to,
            ..
        } = self;

        runtime.block_on(async {
            channel
                .basic_publish(
                    "",
                    request.queue(),
                    BasicPublishOptions::default(),
                    &payload,
                    BasicProperties::default()
                        .with_reply_to(reply_to.clone())
                        .with_correlation_id(ShortString::from(correlation_id.clone())),
                )
                .await?
                .await?;

            while let Some(delivery) = replies.next().await {
                let delivery = delivery?;
                let matches = delivery
                    .properties
                    .correlation_id()
                    .as_ref()
                    .is_some_and(|id| id.as_str() == correlation_id);
                if !matches {
                    // late reply to an earlier call
                    debug!(op, "discarding reply with foreign correlation id");
                    continue;
                }
                return Ok(serde_json::from_slice(&delivery.data)?);
            }

            Err(RpcError::ReplyStreamClosed { op })
        })
    }
}

impl ControllerRpc for AmqpControllerRpc {
    fn init_robot_client(&mut self, metadata: &MetadataBlob) -> Result<(), RpcError> {
        self.call(RpcRequest::InitRobotClient(metadata))?
            .into_result("InitRobotClient")?;
        Ok(())
    }

    fn control_update(&mut self, state: &RobotState) -> Result<TorqueCommand, RpcError> {
        let command = self
            .call(RpcRequest::ControlUpdate(state))?
            .into_result("ControlUpdate")?;
        Ok(command.unwrap_or_default())
    }
}
