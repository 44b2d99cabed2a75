// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging identifiers (`user[:device]@server`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GatewayError;

/// Server used by one-to-one user chats.
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Server used by group chats.
pub const GROUP_SERVER: &str = "g.us";

/// A parsed chat, user, or group identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    pub user: String,
    pub server: String,
    /// Companion device number; `None` for the primary device.
    pub device: Option<u16>,
}

impl Jid {
    /// Creates a primary-device JID.
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
            device: None,
        }
    }

    /// Parses `user@server`, `user:device@server`, or a bare `server`.
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let invalid = |reason: &str| GatewayError::InvalidJid {
            jid: raw.to_string(),
            reason: reason.to_string(),
        };

        let raw_trimmed = raw.trim();
        if raw_trimmed.is_empty() {
            return Err(invalid("identifier is empty"));
        }

        let Some((user_part, server)) = raw_trimmed.split_once('@') else {
            return Ok(Jid::new("", raw_trimmed));
        };

        if server.is_empty() {
            return Err(invalid("server part is empty"));
        }
        if server.contains('@') {
            return Err(invalid("more than one `@`"));
        }
        if user_part.is_empty() {
            return Err(invalid("user part is empty"));
        }

        let (user, device) = match user_part.split_once(':') {
            Some((user, device)) => {
                let device = device
                    .parse::<u16>()
                    .map_err(|_| invalid("device must be a number"))?;
                (user, Some(device))
            }
            None => (user_part, None),
        };

        if user.is_empty() {
            return Err(invalid("user part is empty"));
        }

        Ok(Jid {
            user: user.to_string(),
            server: server.to_string(),
            device,
        })
    }

    /// The same identity without its device number.
    pub fn to_non_device(&self) -> Jid {
        Jid::new(self.user.clone(), self.server.clone())
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            return write!(f, "{}", self.server);
        }
        match self.device {
            Some(device) => write!(f, "{}:{}@{}", self.user, device, self.server),
            None => write!(f, "{}@{}", self.user, self.server),
        }
    }
}

impl FromStr for Jid {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Jid::parse(s)
    }
}

impl Serialize for Jid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Jid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Jid::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_jid() {
        let jid = Jid::parse("1234567890@s.whatsapp.net").unwrap();
        assert_eq!(jid.user, "1234567890");
        assert_eq!(jid.server, USER_SERVER);
        assert_eq!(jid.device, None);
        assert_eq!(jid.to_string(), "1234567890@s.whatsapp.net");
    }

    #[test]
    fn parses_device_jid_and_strips_device() {
        let jid = Jid::parse("1234567890:12@s.whatsapp.net").unwrap();
        assert_eq!(jid.device, Some(12));
        assert_eq!(jid.to_string(), "1234567890:12@s.whatsapp.net");
        assert_eq!(jid.to_non_device().to_string(), "1234567890@s.whatsapp.net");
    }

    #[test]
    fn server_only_jid() {
        let jid = Jid::parse("status").unwrap();
        assert!(jid.user.is_empty());
        assert_eq!(jid.to_string(), "status");
    }

    #[test]
    fn group_detection() {
        assert!(Jid::parse("123456-7890@g.us").unwrap().is_group());
        assert!(!Jid::parse("123@s.whatsapp.net").unwrap().is_group());
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let jid = Jid::parse("  42@s.whatsapp.net ").unwrap();
        assert_eq!(jid.to_string(), "42@s.whatsapp.net");
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for raw in ["", "   ", "@s.whatsapp.net", "123@", "1:x@s.whatsapp.net", ":3@g.us", "a@b@c"] {
            let err = Jid::parse(raw).unwrap_err();
            assert_eq!(err.code(), "INVALID_JID", "input {raw:?}");
        }
    }

    #[test]
    fn serde_uses_canonical_string() {
        let jid = Jid::parse("99:1@s.whatsapp.net").unwrap();
        let json = serde_json::to_string(&jid).unwrap();
        assert_eq!(json, "\"99:1@s.whatsapp.net\"");
        let back: Jid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, jid);
        assert!(serde_json::from_str::<Jid>("\"@nope\"").is_err());
    }
}
