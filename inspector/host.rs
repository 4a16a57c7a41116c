// Copyright 2018-2026 the Deno authors. MIT license.

use crate::futures::channel::mpsc;
use crate::futures::channel::mpsc::UnboundedReceiver;
use crate::futures::channel::mpsc::UnboundedSender;
use crate::message::InspectorMsg;
use crate::pause::ResumeHandle;
use std::time::Duration;

/// The embedder side of an inspector session.
///
/// Callbacks run on the thread that owns the isolate. A callback that never
/// returns from `block` without resuming will keep script execution paused
/// forever; failures inside callbacks are not observed by the inspector.
pub trait InspectorHost {
  /// Receives a response or notification produced by the inspector.
  fn deliver(&self, message: InspectorMsg);

  /// Called once per iteration of the pause loop. May sleep or yield; the
  /// loop exits after this returns if `resume` has been signalled.
  fn block(&self, resume: &ResumeHandle);
}

/// Host built from a pair of closures.
pub struct CallbackHost {
  deliver_fn: Box<dyn Fn(InspectorMsg)>,
  block_fn: Box<dyn Fn(&ResumeHandle)>,
}

impl CallbackHost {
  pub fn new(
    deliver_fn: impl Fn(InspectorMsg) + 'static,
    block_fn: impl Fn(&ResumeHandle) + 'static,
  ) -> Self {
    Self {
      deliver_fn: Box::new(deliver_fn),
      block_fn: Box::new(block_fn),
    }
  }
}

impl InspectorHost for CallbackHost {
  fn deliver(&self, message: InspectorMsg) {
    (self.deliver_fn)(message)
  }

  fn block(&self, resume: &ResumeHandle) {
    (self.block_fn)(resume)
  }
}

/// Host that forwards outbound messages to a channel, typically consumed by
/// a websocket on another thread. While paused it sleeps on the resume
/// signal for at most `poll_interval`, so that queued inbound messages get
/// pumped regularly.
///
/// Inbound messages cannot be pumped while the pause was entered from
/// inside a dispatch (e.g. `Runtime.evaluate` reaching a `debugger`
/// statement), so a `Debugger.resume` sent by the frontend stays queued and
/// the pause never ends on its own. In that case the embedder has to call
/// [`ResumeHandle::resume`] itself, for instance from
/// [`crate::DebugSessionClient::resume_handle`] on another thread.
pub struct ChannelHost {
  tx: UnboundedSender<InspectorMsg>,
  poll_interval: Duration,
}

impl ChannelHost {
  pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

  pub fn new(
    poll_interval: Duration,
  ) -> (Self, UnboundedReceiver<InspectorMsg>) {
    let (tx, rx) = mpsc::unbounded();
    (Self { tx, poll_interval }, rx)
  }
}

impl InspectorHost for ChannelHost {
  fn deliver(&self, message: InspectorMsg) {
    // The receiving end goes away when the frontend disconnects.
    if self.tx.unbounded_send(message).is_err() {
      log::trace!("Dropping inspector message, frontend is gone");
    }
  }

  fn block(&self, resume: &ResumeHandle) {
    resume.wait_for_resume(self.poll_interval);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::message::InspectorMsgKind;
  use std::cell::RefCell;
  use std::rc::Rc;

  #[test]
  fn callback_host_forwards() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let blocks = Rc::new(RefCell::new(0));
    let host = {
      let seen = seen.clone();
      let blocks = blocks.clone();
      CallbackHost::new(
        move |msg| seen.borrow_mut().push(msg.content),
        move |resume| {
          *blocks.borrow_mut() += 1;
          resume.resume();
        },
      )
    };
    host.deliver(InspectorMsg {
      kind: InspectorMsgKind::Notification,
      content: "hello".to_string(),
    });
    let resume = ResumeHandle::new();
    resume.arm();
    host.block(&resume);
    assert_eq!(*seen.borrow(), vec!["hello".to_string()]);
    assert_eq!(*blocks.borrow(), 1);
    assert!(resume.is_resumed());
  }

  #[test]
  fn channel_host_forwards_and_survives_closed_receiver() {
    let (host, mut rx) = ChannelHost::new(Duration::from_millis(1));
    let msg = InspectorMsg {
      kind: InspectorMsgKind::Message(7),
      content: r#"{"id":7,"result":{}}"#.to_string(),
    };
    host.deliver(msg.clone());
    assert_eq!(rx.try_recv().unwrap(), msg);
    drop(rx);
    host.deliver(msg);
  }

  #[test]
  fn channel_host_block_returns_after_poll_interval() {
    let (host, _rx) = ChannelHost::new(Duration::from_millis(5));
    let resume = ResumeHandle::new();
    resume.arm();
    host.block(&resume);
    assert!(!resume.is_resumed());
  }
}
