// Copyright 2018-2026 the Deno authors. MIT license.

use crate::client::DebugSessionClient;
use crate::error::InspectorError;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::rc::Weak;

/// Identifies one execution context known to the inspector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

impl ContextId {
  pub const fn new(id: u32) -> Self {
    Self(id)
  }

  pub fn get(self) -> u32 {
    self.0
  }
}

impl fmt::Display for ContextId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Maps execution contexts to their session clients.
///
/// Entries are weak: the registry never keeps a client alive, and entries
/// whose client has been dropped are treated as absent. Clients hold
/// isolate-bound state, so a registry lives on the isolate's thread.
#[derive(Default)]
pub struct SessionRegistry {
  sessions: RefCell<HashMap<ContextId, Weak<DebugSessionClient>>>,
  next_context_id: Cell<u32>,
}

impl SessionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Hands out a context id that has not been allocated by this registry
  /// before.
  pub fn allocate_context_id(&self) -> ContextId {
    let id = self.next_context_id.get() + 1;
    self.next_context_id.set(id);
    ContextId(id)
  }

  pub fn register(
    &self,
    client: &Rc<DebugSessionClient>,
  ) -> Result<(), InspectorError> {
    let context_id = client.context_id();
    let mut sessions = self.sessions.borrow_mut();
    if sessions
      .get(&context_id)
      .is_some_and(|existing| existing.strong_count() > 0)
    {
      return Err(InspectorError::SessionAlreadyRegistered(context_id));
    }
    log::debug!("Registered inspector session for context {}", context_id);
    sessions.insert(context_id, Rc::downgrade(client));
    Ok(())
  }

  pub fn lookup(
    &self,
    context_id: ContextId,
  ) -> Result<Rc<DebugSessionClient>, InspectorError> {
    let mut sessions = self.sessions.borrow_mut();
    match sessions.get(&context_id).map(Weak::upgrade) {
      Some(Some(client)) => Ok(client),
      Some(None) => {
        sessions.remove(&context_id);
        Err(InspectorError::NoActiveSession(context_id))
      }
      None => Err(InspectorError::NoActiveSession(context_id)),
    }
  }

  /// Removes the entry for `context_id`, returning the client if it is
  /// still alive.
  pub fn unregister(
    &self,
    context_id: ContextId,
  ) -> Option<Rc<DebugSessionClient>> {
    let client = self
      .sessions
      .borrow_mut()
      .remove(&context_id)
      .and_then(|weak| weak.upgrade());
    if client.is_some() {
      log::debug!("Unregistered inspector session for context {}", context_id);
    }
    client
  }

  /// Number of live sessions.
  pub fn len(&self) -> usize {
    self.prune();
    self.sessions.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Ids of contexts with a live session, in ascending order.
  pub fn context_ids(&self) -> Vec<ContextId> {
    self.prune();
    let mut ids = self.sessions.borrow().keys().copied().collect::<Vec<_>>();
    ids.sort();
    ids
  }

  fn prune(&self) {
    self
      .sessions
      .borrow_mut()
      .retain(|_, client| client.strong_count() > 0);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::host::CallbackHost;

  fn client(context_id: ContextId) -> Rc<DebugSessionClient> {
    let host = CallbackHost::new(|_| {}, |resume| resume.resume());
    DebugSessionClient::new(context_id, Default::default(), Rc::new(host))
  }

  #[test]
  fn allocates_distinct_ids() {
    let registry = SessionRegistry::new();
    let a = registry.allocate_context_id();
    let b = registry.allocate_context_id();
    assert_ne!(a, b);
    assert_eq!(a.to_string(), "#1");
  }

  #[test]
  fn lookup_returns_same_instance_for_its_context_only() {
    let registry = SessionRegistry::new();
    let c1 = client(registry.allocate_context_id());
    let c2 = client(registry.allocate_context_id());
    registry.register(&c1).unwrap();
    registry.register(&c2).unwrap();

    let found = registry.lookup(c1.context_id()).unwrap();
    assert!(Rc::ptr_eq(&found, &c1));
    assert!(!Rc::ptr_eq(&found, &c2));
    let found = registry.lookup(c2.context_id()).unwrap();
    assert!(Rc::ptr_eq(&found, &c2));
    assert_eq!(registry.context_ids(), vec![c1.context_id(), c2.context_id()]);
  }

  #[test]
  fn lookup_unknown_context_fails() {
    let registry = SessionRegistry::new();
    let err = registry.lookup(ContextId::new(42)).err().unwrap();
    assert!(
      matches!(err, InspectorError::NoActiveSession(id) if id.get() == 42)
    );
    assert_eq!(err.to_string(), "No active inspector session for context #42");
  }

  #[test]
  fn duplicate_registration_is_rejected() {
    let registry = SessionRegistry::new();
    let id = registry.allocate_context_id();
    let first = client(id);
    let second = client(id);
    registry.register(&first).unwrap();
    assert!(matches!(
      registry.register(&second),
      Err(InspectorError::SessionAlreadyRegistered(_))
    ));
    // Once the first client is gone the context can be reused.
    drop(first);
    registry.register(&second).unwrap();
    assert!(Rc::ptr_eq(&registry.lookup(id).unwrap(), &second));
  }

  #[test]
  fn registry_does_not_own_clients() {
    let registry = SessionRegistry::new();
    let c = client(registry.allocate_context_id());
    let id = c.context_id();
    registry.register(&c).unwrap();
    assert_eq!(registry.len(), 1);
    drop(c);
    assert!(registry.is_empty());
    assert!(matches!(
      registry.lookup(id),
      Err(InspectorError::NoActiveSession(_))
    ));
  }

  #[test]
  fn unregister_removes_entry() {
    let registry = SessionRegistry::new();
    let c = client(registry.allocate_context_id());
    registry.register(&c).unwrap();
    let removed = registry.unregister(c.context_id()).unwrap();
    assert!(Rc::ptr_eq(&removed, &c));
    assert!(registry.unregister(c.context_id()).is_none());
    assert!(registry.lookup(c.context_id()).is_err());
  }
}
