// Copyright 2018-2026 the Deno authors. MIT license.

//! Bridges the V8 inspector to an embedder.
//!
//! Outbound protocol messages are converted to owned strings and handed to
//! an [`InspectorHost`]; while script execution is paused the host's
//! `block` callback is pumped until [`ResumeHandle::resume`] is called.
//!
//! The documentation for the inspector API is sparse, but these are helpful:
//! <https://chromedevtools.github.io/devtools-protocol/>
//! <https://hyperandroid.com/2020/02/12/v8-inspector-from-an-embedder-standpoint/>

mod client;
pub mod error;
mod flags;
mod frontend;
mod host;
mod message;
mod pause;
mod registry;
mod server;
#[cfg(feature = "v8")]
mod v8_session;

// Re-exports
pub use futures;
pub use serde_json;
#[cfg(feature = "v8")]
pub use v8;

pub use crate::client::DebugSessionClient;
pub use crate::client::EngineSession;
pub use crate::client::SessionOptions;
pub use crate::error::InspectorError;
pub use crate::flags::InspectFlags;
pub use crate::flags::InspectOptions;
pub use crate::flags::DEFAULT_INSPECTOR_ADDRESS;
pub use crate::flags::inspect_args;
pub use crate::frontend::MessageFrontend;
pub use crate::host::CallbackHost;
pub use crate::host::ChannelHost;
pub use crate::host::InspectorHost;
pub use crate::message::InspectorMsg;
pub use crate::message::InspectorMsgKind;
pub use crate::message::MAX_STRING_LENGTH;
pub use crate::message::ProtocolMessage;
pub use crate::pause::ResumeHandle;
pub use crate::pause::SessionState;
pub use crate::registry::ContextId;
pub use crate::registry::SessionRegistry;
pub use crate::server::InspectorInfo;
pub use crate::server::InspectorServer;
#[cfg(feature = "v8")]
pub use crate::v8_session::V8DebugSession;
