//! Which end of a channel this engine is.

/// Side of the channel, fixed when the channel is created.
///
/// Decides who writes the upgrade request and which direction masks
/// Draft-07+ frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Opened the channel with `Endpoint::connect`; writes the GET request
    /// and masks every frame it sends.
    Client,
    /// Accepted the channel; answers the upgrade and never masks.
    Server,
}

impl Role {
    /// Outgoing Draft-07+ frames carry a mask key.
    #[inline]
    #[must_use]
    pub const fn must_mask(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Incoming Draft-07+ frames must carry a mask key.
    #[inline]
    #[must_use]
    pub const fn expects_masked(&self) -> bool {
        matches!(self, Role::Server)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masking_direction() {
        assert!(Role::Client.must_mask());
        assert!(!Role::Client.expects_masked());
        assert!(!Role::Server.must_mask());
        assert!(Role::Server.expects_masked());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Client.to_string(), "client");
        assert_eq!(Role::Server.to_string(), "server");
    }
}
