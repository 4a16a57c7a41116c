// Copyright 2018-2026 the Deno authors. MIT license.

use deno_error::JsError;
use thiserror::Error;

use crate::ContextId;

#[derive(Debug, Error, JsError)]
pub enum InspectorError {
  #[class(range)]
  #[error(
    "Inspector message of {length} code units exceeds the maximum string length of {max}"
  )]
  MessageTooLarge { length: usize, max: usize },
  #[class(reference)]
  #[error("No active inspector session for context {0}")]
  NoActiveSession(ContextId),
  #[class(generic)]
  #[error("An inspector session is already registered for context {0}")]
  SessionAlreadyRegistered(ContextId),
  #[class(generic)]
  #[error("Inspector session is busy dispatching another message")]
  SessionBusy,
  #[class(type)]
  #[error("Unexpected context group id {actual}, expected {expected}")]
  ContextGroupMismatch { expected: i32, actual: i32 },
  #[class(inherit)]
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[class(generic)]
  #[error("Cannot start inspector server: {0}")]
  Server(#[from] hyper::Error),
}
