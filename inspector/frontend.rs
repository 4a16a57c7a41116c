// Copyright 2018-2026 the Deno authors. MIT license.

use crate::error::InspectorError;
use crate::host::InspectorHost;
use crate::message::InspectorMsg;
use crate::message::InspectorMsgKind;
use crate::message::ProtocolMessage;
use log::trace;
use std::rc::Rc;

/// Receives outbound protocol traffic from the inspector session and relays
/// it to the host as owned strings.
pub struct MessageFrontend {
  host: Rc<dyn InspectorHost>,
  max_message_length: usize,
}

impl MessageFrontend {
  pub fn new(host: Rc<dyn InspectorHost>, max_message_length: usize) -> Self {
    Self {
      host,
      max_message_length,
    }
  }

  pub fn send_response(
    &self,
    call_id: i32,
    message: ProtocolMessage<'_>,
  ) -> Result<(), InspectorError> {
    self.send(InspectorMsgKind::Message(call_id), message)
  }

  pub fn send_notification(
    &self,
    message: ProtocolMessage<'_>,
  ) -> Result<(), InspectorError> {
    self.send(InspectorMsgKind::Notification, message)
  }

  fn send(
    &self,
    kind: InspectorMsgKind,
    message: ProtocolMessage<'_>,
  ) -> Result<(), InspectorError> {
    let content = message.to_host_string(self.max_message_length)?;
    trace!("V8->host: {}", content);
    self.host.deliver(InspectorMsg { kind, content });
    Ok(())
  }
}
