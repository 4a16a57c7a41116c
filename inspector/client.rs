// Copyright 2018-2026 the Deno authors. MIT license.

use crate::error::InspectorError;
use crate::frontend::MessageFrontend;
use crate::futures::channel::mpsc;
use crate::futures::channel::mpsc::UnboundedReceiver;
use crate::futures::channel::mpsc::UnboundedSender;
use crate::futures::channel::oneshot;
use crate::host::InspectorHost;
use crate::message::MAX_STRING_LENGTH;
use crate::pause::ResumeHandle;
use crate::pause::SessionState;
use crate::registry::ContextId;
use log::debug;
use std::cell::Cell;
use std::cell::RefCell;
use std::mem::take;
use std::rc::Rc;

/// The engine half of a connected inspector session.
///
/// Implemented by the V8 binding; anything that can accept protocol
/// messages and schedule a pause can drive a [`DebugSessionClient`].
pub trait EngineSession {
  fn dispatch_protocol_message(&mut self, message: &str);
  fn schedule_pause_on_next_statement(&mut self, reason: &str, detail: &str);
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
  pub context_group_id: i32,
  /// Human readable name reported for the context.
  pub context_name: String,
  /// Auxiliary data passed along with the context (JSON).
  pub aux_data: Option<String>,
  /// Outbound messages must be strictly shorter than this many code units.
  pub max_message_length: usize,
}

impl Default for SessionOptions {
  fn default() -> Self {
    Self {
      context_group_id: 1,
      context_name: "main realm".to_string(),
      aux_data: Some(r#"{"isDefault": true}"#.to_string()),
      max_message_length: MAX_STRING_LENGTH,
    }
  }
}

#[derive(Default)]
struct ClientFlags {
  waiting_for_session: bool,
  session_handshake_done: bool,
}

/// Owns the inspector session of one execution context.
///
/// Outbound traffic goes through the [`MessageFrontend`]. Inbound traffic
/// is queued through [`DebugSessionClient::dispatch_sender`] and pumped into
/// the session either by the embedder's event loop or by the pause loop.
pub struct DebugSessionClient {
  context_id: ContextId,
  options: SessionOptions,
  host: Rc<dyn InspectorHost>,
  frontend: Rc<MessageFrontend>,
  session: RefCell<Option<Box<dyn EngineSession>>>,
  resume: ResumeHandle,
  state: Cell<SessionState>,
  flags: RefCell<ClientFlags>,
  inbound_tx: UnboundedSender<String>,
  inbound_rx: RefCell<UnboundedReceiver<String>>,
  deregister_tx: RefCell<Option<oneshot::Sender<()>>>,
}

impl Drop for DebugSessionClient {
  fn drop(&mut self) {
    self.close();
  }
}

impl DebugSessionClient {
  pub fn new(
    context_id: ContextId,
    options: SessionOptions,
    host: Rc<dyn InspectorHost>,
  ) -> Rc<Self> {
    let frontend =
      Rc::new(MessageFrontend::new(host.clone(), options.max_message_length));
    let (inbound_tx, inbound_rx) = mpsc::unbounded::<String>();
    Rc::new(Self {
      context_id,
      options,
      host,
      frontend,
      session: RefCell::new(None),
      resume: ResumeHandle::new(),
      state: Cell::new(SessionState::Idle),
      flags: Default::default(),
      inbound_tx,
      inbound_rx: RefCell::new(inbound_rx),
      deregister_tx: RefCell::new(None),
    })
  }

  pub fn context_id(&self) -> ContextId {
    self.context_id
  }

  pub fn options(&self) -> &SessionOptions {
    &self.options
  }

  pub fn frontend(&self) -> Rc<MessageFrontend> {
    self.frontend.clone()
  }

  pub fn state(&self) -> SessionState {
    self.state.get()
  }

  pub fn resume_handle(&self) -> ResumeHandle {
    self.resume.clone()
  }

  pub fn has_session(&self) -> bool {
    self.session.borrow().is_some()
  }

  /// Connects the engine session. Replaces and returns a previously
  /// attached one.
  pub fn attach_session(
    &self,
    session: Box<dyn EngineSession>,
  ) -> Option<Box<dyn EngineSession>> {
    self.session.borrow_mut().replace(session)
  }

  /// Sender for messages that should be dispatched to the session. Can be
  /// moved to other threads; messages are delivered on the next pump.
  pub fn dispatch_sender(&self) -> UnboundedSender<String> {
    self.inbound_tx.clone()
  }

  pub fn dispatch_protocol_message(
    &self,
    message: &str,
  ) -> Result<(), InspectorError> {
    let mut session = self
      .session
      .try_borrow_mut()
      .map_err(|_| InspectorError::SessionBusy)?;
    let session = session
      .as_mut()
      .ok_or(InspectorError::NoActiveSession(self.context_id))?;
    debug!("host->V8: {}", message);
    session.dispatch_protocol_message(message);
    Ok(())
  }

  /// Dispatches every queued inbound message. Returns how many were
  /// dispatched. Messages stay queued while the session is busy, e.g. when
  /// the pause was entered from within a dispatch.
  pub fn pump_messages(&self) -> usize {
    let Ok(mut session) = self.session.try_borrow_mut() else {
      debug!("Inspector session busy, deferring inbound messages");
      return 0;
    };
    let Some(session) = session.as_mut() else {
      return 0;
    };
    let mut inbound_rx = self.inbound_rx.borrow_mut();
    let mut count = 0;
    while let Ok(message) = inbound_rx.try_recv() {
      debug!("host->V8: {}", message);
      session.dispatch_protocol_message(&message);
      count += 1;
    }
    count
  }

  /// Blocks the calling thread while script execution is paused.
  ///
  /// Each iteration calls the host's `block` callback and then pumps queued
  /// inbound messages. The loop exits at the end of the iteration in which
  /// the resume signal is observed, so `block` runs at least once. Returns
  /// the number of iterations.
  pub fn run_message_loop_on_pause(
    &self,
    context_group_id: i32,
  ) -> Result<usize, InspectorError> {
    self.check_context_group(context_group_id)?;
    self.resume.arm();
    self.state.set(SessionState::Paused);
    debug!("Entered pause loop for context {}", self.context_id);
    let mut iterations = 0;
    loop {
      iterations += 1;
      self.host.block(&self.resume);
      self.pump_messages();
      if self.resume.is_resumed() {
        break;
      }
    }
    self.state.set(SessionState::Idle);
    debug!(
      "Exited pause loop for context {} after {} iterations",
      self.context_id, iterations
    );
    Ok(iterations)
  }

  pub fn resume(&self) {
    self.resume.resume();
  }

  pub fn run_if_waiting_for_debugger(
    &self,
    context_group_id: i32,
  ) -> Result<(), InspectorError> {
    self.check_context_group(context_group_id)?;
    self.flags.borrow_mut().session_handshake_done = true;
    Ok(())
  }

  /// Blocks until the frontend has sent `Runtime.runIfWaitingForDebugger`,
  /// then instructs the engine to pause at the next statement.
  pub fn wait_for_session_and_break_on_next_statement(
    &self,
  ) -> Result<(), InspectorError> {
    self.flags.borrow_mut().waiting_for_session = true;
    // Armed so that hosts sleeping on the signal actually block.
    self.resume.arm();
    loop {
      if take(&mut self.flags.borrow_mut().session_handshake_done) {
        break;
      }
      self.host.block(&self.resume);
      self.pump_messages();
    }
    self.resume.resume();
    self.flags.borrow_mut().waiting_for_session = false;
    self.break_on_next_statement()
  }

  pub fn is_waiting_for_session(&self) -> bool {
    self.flags.borrow().waiting_for_session
  }

  pub fn break_on_next_statement(&self) -> Result<(), InspectorError> {
    let mut session = self
      .session
      .try_borrow_mut()
      .map_err(|_| InspectorError::SessionBusy)?;
    session
      .as_mut()
      .ok_or(InspectorError::NoActiveSession(self.context_id))?
      .schedule_pause_on_next_statement("debugCommand", "");
    Ok(())
  }

  /// Create a channel that notifies when the session is closed.
  ///
  /// NOTE: Only a single handler is currently available.
  pub fn add_deregister_handler(&self) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel::<()>();
    let prev = self.deregister_tx.borrow_mut().replace(tx);
    assert!(
      prev.is_none(),
      "Only a single deregister handler is allowed"
    );
    rx
  }

  /// Disconnects the engine session and notifies the deregister handler.
  pub fn close(&self) {
    if let Ok(mut session) = self.session.try_borrow_mut() {
      session.take();
    }
    self.resume.resume();
    if let Some(deregister_tx) = self.deregister_tx.borrow_mut().take() {
      // The counterparty might have already dropped the receiver.
      let _ = deregister_tx.send(());
    }
  }

  fn check_context_group(
    &self,
    context_group_id: i32,
  ) -> Result<(), InspectorError> {
    if context_group_id != self.options.context_group_id {
      return Err(InspectorError::ContextGroupMismatch {
        expected: self.options.context_group_id,
        actual: context_group_id,
      });
    }
    Ok(())
  }
}
