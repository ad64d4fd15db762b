//! Content-derived message identity.
//!
//! Messages from the history files carry no server-issued key, so reactions
//! are keyed by a short hash of `role|content|timestamp`. The hash is the
//! classic 31-multiplier string fold over UTF-16 code units with 32-bit
//! wraparound, so identities stay stable across restarts and agree with
//! anything else that keys the same triple the same way. Collisions are
//! possible and accepted.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Message;

/// Prefix on every rendered identity.
pub const IDENTITY_PREFIX: &str = "msg_";

/// Stable label for a message, used as the reaction store key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageIdentity(String);

impl MessageIdentity {
    pub fn for_message(message: &Message) -> Self {
        identity(
            Some(message.role.as_str()),
            Some(message.content.as_str()),
            message.timestamp.as_deref(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MessageIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageIdentity {
    fn from(s: &str) -> Self {
        MessageIdentity(s.to_string())
    }
}

/// Derive the identity of `(role, content, timestamp)`. Absent parts hash
/// as the empty string.
pub fn identity(role: Option<&str>, content: Option<&str>, timestamp: Option<&str>) -> MessageIdentity {
    let mut acc: i32 = 0;
    let parts = [role.unwrap_or(""), content.unwrap_or(""), timestamp.unwrap_or("")];
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            acc = fold(acc, u16::from(b'|'));
        }
        for unit in part.encode_utf16() {
            acc = fold(acc, unit);
        }
    }
    MessageIdentity(format!("{}{}", IDENTITY_PREFIX, to_base36(acc.unsigned_abs())))
}

#[inline]
fn fold(acc: i32, unit: u16) -> i32 {
    // (acc << 5) - acc == acc * 31
    acc.wrapping_mul(31).wrapping_add(i32::from(unit))
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(7);
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
