// Copyright 2018-2026 the Deno authors. MIT license.

//! Glue between [`DebugSessionClient`] and the V8 inspector.

use crate::client::DebugSessionClient;
use crate::client::EngineSession;
use crate::client::SessionOptions;
use crate::error::InspectorError;
use crate::frontend::MessageFrontend;
use crate::host::InspectorHost;
use crate::message::ProtocolMessage;
use crate::registry::SessionRegistry;
use log::error;
use std::rc::Rc;
use std::rc::Weak;
use v8::inspector::ChannelBase;
use v8::inspector::ChannelImpl;
use v8::inspector::StringBuffer;
use v8::inspector::StringView;
use v8::inspector::V8Inspector;
use v8::inspector::V8InspectorClientBase;
use v8::inspector::V8InspectorClientImpl;
use v8::inspector::V8InspectorClientTrustLevel;
use v8::inspector::V8InspectorSession;

/// A V8 inspector attached to one context, with a single connected session.
///
/// The session is owned by the [`DebugSessionClient`] and is torn down when
/// this value is dropped, before the inspector itself.
pub struct V8DebugSession {
  client: Rc<DebugSessionClient>,
  inspector: v8::UniqueRef<V8Inspector>,
  // The inspector holds raw pointers to these two.
  _channel: Box<FrontendChannel>,
  _pause_client: Box<PauseClient>,
}

impl Drop for V8DebugSession {
  fn drop(&mut self) {
    self.client.close();
  }
}

impl V8DebugSession {
  /// Creates an inspector for `context`, connects a session to it and
  /// registers the resulting client in `registry`.
  pub fn new<'s>(
    scope: &mut v8::HandleScope<'s>,
    context: v8::Local<'s, v8::Context>,
    registry: &SessionRegistry,
    host: Rc<dyn InspectorHost>,
    options: SessionOptions,
  ) -> Result<Self, InspectorError> {
    let context_id = registry.allocate_context_id();
    let client = DebugSessionClient::new(context_id, options, host);
    registry.register(&client)?;

    let mut pause_client = Box::new(PauseClient::new(Rc::downgrade(&client)));
    let mut inspector = V8Inspector::create(scope, &mut *pause_client);

    let options = client.options();
    let mut channel = Box::new(FrontendChannel::new(client.frontend()));
    let session = inspector.connect(
      options.context_group_id,
      &mut *channel,
      StringView::empty(),
      V8InspectorClientTrustLevel::FullyTrusted,
    );
    client.attach_session(Box::new(V8Session(session)));

    let aux_data = options.aux_data.as_deref().unwrap_or_default();
    inspector.context_created(
      context,
      options.context_group_id,
      StringView::from(options.context_name.as_bytes()),
      StringView::from(aux_data.as_bytes()),
    );

    Ok(Self {
      client,
      inspector,
      _channel: channel,
      _pause_client: pause_client,
    })
  }

  pub fn client(&self) -> &Rc<DebugSessionClient> {
    &self.client
  }

  /// Tells the inspector that `context` is about to be collected and ends
  /// the session: the engine session is detached and the context is removed
  /// from `registry`.
  pub fn context_destroyed(
    &mut self,
    context: v8::Local<v8::Context>,
    registry: &SessionRegistry,
  ) {
    self.inspector.context_destroyed(context);
    self.client.close();
    registry.unregister(self.client.context_id());
  }
}

struct V8Session(v8::UniqueRef<V8InspectorSession>);

impl EngineSession for V8Session {
  fn dispatch_protocol_message(&mut self, message: &str) {
    self
      .0
      .dispatch_protocol_message(StringView::from(message.as_bytes()));
  }

  fn schedule_pause_on_next_statement(&mut self, reason: &str, detail: &str) {
    self.0.schedule_pause_on_next_statement(
      StringView::from(reason.as_bytes()),
      StringView::from(detail.as_bytes()),
    );
  }
}

/// Receives protocol messages from V8 and forwards them to the frontend.
struct FrontendChannel {
  base: ChannelBase,
  frontend: Rc<MessageFrontend>,
}

impl FrontendChannel {
  fn new(frontend: Rc<MessageFrontend>) -> Self {
    Self {
      base: ChannelBase::new::<Self>(),
      frontend,
    }
  }
}

impl ChannelImpl for FrontendChannel {
  fn base(&self) -> &ChannelBase {
    &self.base
  }

  fn base_mut(&mut self) -> &mut ChannelBase {
    &mut self.base
  }

  unsafe fn base_ptr(this: *const Self) -> *const ChannelBase {
    // SAFETY: `this` points to a live `FrontendChannel`.
    unsafe { &raw const (*this).base }
  }

  fn send_response(
    &mut self,
    call_id: i32,
    message: v8::UniquePtr<StringBuffer>,
  ) {
    let message = message.unwrap();
    let view = message.string();
    if let Err(err) =
      self.frontend.send_response(call_id, ProtocolMessage::from(&view))
    {
      error!("Dropping inspector response {}: {}", call_id, err);
    }
  }

  fn send_notification(&mut self, message: v8::UniquePtr<StringBuffer>) {
    let message = message.unwrap();
    let view = message.string();
    if let Err(err) =
      self.frontend.send_notification(ProtocolMessage::from(&view))
    {
      error!("Dropping inspector notification: {}", err);
    }
  }

  fn flush_protocol_notifications(&mut self) {}
}

/// Forwards the inspector's pause callbacks to the session client.
struct PauseClient {
  base: V8InspectorClientBase,
  client: Weak<DebugSessionClient>,
}

impl PauseClient {
  fn new(client: Weak<DebugSessionClient>) -> Self {
    Self {
      base: V8InspectorClientBase::new::<Self>(),
      client,
    }
  }
}

impl V8InspectorClientImpl for PauseClient {
  fn base(&self) -> &V8InspectorClientBase {
    &self.base
  }

  fn base_mut(&mut self) -> &mut V8InspectorClientBase {
    &mut self.base
  }

  unsafe fn base_ptr(this: *const Self) -> *const V8InspectorClientBase {
    // SAFETY: `this` points to a live `PauseClient`.
    unsafe { &raw const (*this).base }
  }

  // TODO(inspector): messages sent while paused inside a dispatch stay queued
  // until the pause ends, because the session is borrowed by the outer
  // dispatch. Nested dispatch needs the session behind a re-entrant handle.
  fn run_message_loop_on_pause(&mut self, context_group_id: i32) {
    let Some(client) = self.client.upgrade() else {
      return;
    };
    if let Err(err) = client.run_message_loop_on_pause(context_group_id) {
      error!("Cannot enter inspector pause loop: {}", err);
    }
  }

  fn quit_message_loop_on_pause(&mut self) {
    if let Some(client) = self.client.upgrade() {
      client.resume();
    }
  }

  fn run_if_waiting_for_debugger(&mut self, context_group_id: i32) {
    if let Some(client) = self.client.upgrade() {
      if let Err(err) = client.run_if_waiting_for_debugger(context_group_id) {
        error!("{}", err);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::host::CallbackHost;
  use crate::message::InspectorMsg;
  use crate::message::InspectorMsgKind;
  use serde_json::Value;
  use std::cell::Cell;
  use std::cell::RefCell;
  use std::sync::Once;

  fn init_v8() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
      let platform = v8::new_default_platform(0, false).make_shared();
      v8::V8::initialize_platform(platform);
      v8::V8::initialize();
    });
  }

  fn response(delivered: &[InspectorMsg], call_id: i32) -> Value {
    let msg = delivered
      .iter()
      .find(|msg| msg.kind == InspectorMsgKind::Message(call_id))
      .unwrap();
    serde_json::from_str(&msg.content).unwrap()
  }

  #[test]
  fn evaluate_and_pause_on_debugger_statement() {
    init_v8();
    let isolate = &mut v8::Isolate::new(Default::default());
    let scope = &mut v8::HandleScope::new(isolate);
    let context = v8::Context::new(scope, Default::default());
    let scope = &mut v8::ContextScope::new(scope, context);

    let delivered = Rc::new(RefCell::new(Vec::new()));
    let sink = delivered.clone();
    let blocks = Rc::new(Cell::new(0));
    let counter = blocks.clone();
    let host = CallbackHost::new(
      move |msg| sink.borrow_mut().push(msg),
      move |resume| {
        counter.set(counter.get() + 1);
        resume.resume();
      },
    );
    let registry = SessionRegistry::new();
    let session = V8DebugSession::new(
      scope,
      context,
      &registry,
      Rc::new(host),
      Default::default(),
    )
    .unwrap();
    let client = registry.lookup(session.client().context_id()).unwrap();

    client
      .dispatch_protocol_message(
        r#"{"id":1,"method":"Runtime.evaluate","params":{"expression":"1 + 2"}}"#,
      )
      .unwrap();
    assert_eq!(
      response(&delivered.borrow(), 1)["result"]["result"]["value"],
      3
    );

    client
      .dispatch_protocol_message(r#"{"id":2,"method":"Debugger.enable"}"#)
      .unwrap();
    client
      .dispatch_protocol_message(
        r#"{"id":3,"method":"Runtime.evaluate","params":{"expression":"debugger; 5"}}"#,
      )
      .unwrap();
    assert_eq!(blocks.get(), 1);
    let delivered = delivered.borrow();
    assert!(delivered.iter().any(|msg| {
      msg.kind == InspectorMsgKind::Notification
        && msg.content.contains("\"Debugger.paused\"")
    }));
    assert_eq!(response(&delivered, 3)["result"]["result"]["value"], 5);
  }

  #[test]
  fn context_destroyed_ends_session() {
    init_v8();
    let isolate = &mut v8::Isolate::new(Default::default());
    let scope = &mut v8::HandleScope::new(isolate);
    let context = v8::Context::new(scope, Default::default());
    let scope = &mut v8::ContextScope::new(scope, context);

    let host = CallbackHost::new(|_| {}, |resume| resume.resume());
    let registry = SessionRegistry::new();
    let mut session = V8DebugSession::new(
      scope,
      context,
      &registry,
      Rc::new(host),
      Default::default(),
    )
    .unwrap();
    let client = session.client().clone();
    let mut deregister_rx = client.add_deregister_handler();

    session.context_destroyed(context, &registry);
    assert!(!client.has_session());
    assert!(matches!(
      client.dispatch_protocol_message(r#"{"id":1,"method":"Runtime.enable"}"#),
      Err(InspectorError::NoActiveSession(_))
    ));
    assert!(matches!(
      registry.lookup(client.context_id()),
      Err(InspectorError::NoActiveSession(_))
    ));
    assert_eq!(deregister_rx.try_recv().unwrap(), Some(()));
  }
}
