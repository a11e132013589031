use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Id del mensaje o interacción que disparó la resolución.
    RequestId
);
id_type!(GuildId);
id_type!(UserId);

/// Quién pidió la resolución y dónde.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub guild_id: GuildId,
    pub requester: UserId,
}

impl RequestContext {
    pub fn new(request_id: impl Into<RequestId>, guild_id: impl Into<GuildId>, requester: impl Into<UserId>) -> Self {
        Self {
            request_id: request_id.into(),
            guild_id: guild_id.into(),
            requester: requester.into(),
        }
    }

    /// Contexto para trabajo que el bot inicia por su cuenta (autoplay).
    /// Las escrituras diferidas quedan bajo el id del servidor.
    pub fn for_guild(guild_id: GuildId, bot_user: UserId) -> Self {
        Self {
            request_id: RequestId(guild_id.0),
            guild_id,
            requester: bot_user,
        }
    }
}
