// Copyright 2018-2026 the Deno authors. MIT license.

use crate::error::InspectorError;

/// Largest string V8 is able to allocate (`v8::String::kMaxLength`).
#[cfg(target_pointer_width = "64")]
pub const MAX_STRING_LENGTH: usize = (1 << 29) - 24;
#[cfg(not(target_pointer_width = "64"))]
pub const MAX_STRING_LENGTH: usize = (1 << 28) - 16;

/// A borrowed protocol message as produced by the inspector. The inspector
/// hands out either one-byte (Latin-1) or two-byte (UTF-16) code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMessage<'a> {
  OneByte(&'a [u8]),
  TwoByte(&'a [u16]),
}

impl ProtocolMessage<'_> {
  /// Length in code units.
  pub fn len(&self) -> usize {
    match self {
      Self::OneByte(units) => units.len(),
      Self::TwoByte(units) => units.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn is_8bit(&self) -> bool {
    matches!(self, Self::OneByte(_))
  }

  /// Copies the message into an owned string. Lone surrogates in two-byte
  /// messages are replaced with U+FFFD, as `v8::String::Utf8Value` does.
  pub fn to_host_string(&self, max: usize) -> Result<String, InspectorError> {
    let length = self.len();
    if length >= max {
      return Err(InspectorError::MessageTooLarge { length, max });
    }
    let string = match self {
      Self::OneByte(units) => units.iter().map(|&b| b as char).collect(),
      Self::TwoByte(units) => String::from_utf16_lossy(units),
    };
    Ok(string)
  }
}

impl<'a> From<&'a [u8]> for ProtocolMessage<'a> {
  fn from(units: &'a [u8]) -> Self {
    Self::OneByte(units)
  }
}

impl<'a> From<&'a [u16]> for ProtocolMessage<'a> {
  fn from(units: &'a [u16]) -> Self {
    Self::TwoByte(units)
  }
}

#[cfg(feature = "v8")]
impl<'a> From<&'a v8::inspector::StringView<'a>> for ProtocolMessage<'a> {
  fn from(view: &'a v8::inspector::StringView<'a>) -> Self {
    match view {
      v8::inspector::StringView::U8(chars) => Self::OneByte(&chars[..]),
      v8::inspector::StringView::U16(chars) => Self::TwoByte(&chars[..]),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectorMsgKind {
  Notification,
  /// A response to the request with the given call id.
  Message(i32),
}

/// An owned protocol message handed over to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorMsg {
  pub kind: InspectorMsgKind,
  pub content: String,
}
