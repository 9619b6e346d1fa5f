//! Type-safe identifier wrappers.
//!
//! Row identities (memories, topics, rumors, quests, ...) are UUID v4
//! newtypes so that identifiers of different entities cannot be mixed at
//! compile time. Agent and player identifiers are opaque strings supplied
//! by the game client ("vera", "steam:7656...") and get their own string
//! newtypes with the same no-mixing guarantee.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl TryFrom<String> for $name {
            type Error = uuid::Error;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }
    };
}

/// Generates a newtype wrapper around `String` for game-supplied names.
macro_rules! define_name_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap a raw identifier string.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

define_name_id! {
    /// Identifier of an agent (NPC), assigned at registration.
    AgentId
}

define_name_id! {
    /// Identifier of a player, supplied by the game client.
    PlayerId
}

define_id! {
    /// Unique identifier for a stored memory.
    MemoryId
}

define_id! {
    /// Unique identifier for a conversation topic.
    TopicId
}

define_id! {
    /// Unique identifier for a rumor.
    RumorId
}

define_id! {
    /// Unique identifier for a quest.
    QuestId
}

define_id! {
    /// Unique identifier for a quest chain.
    ChainId
}

define_id! {
    /// Unique identifier for a trade route.
    RouteId
}

define_id! {
    /// Unique identifier for a territory.
    TerritoryId
}

define_id! {
    /// Unique identifier for a territorial battle.
    BattleId
}

define_id! {
    /// Unique identifier for an agent goal.
    GoalId
}

define_id! {
    /// Unique identifier for a conversation group.
    GroupId
}
