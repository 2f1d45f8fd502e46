use std::fmt;
use std::str::FromStr;

/// Internal dispatch tag mirroring `entities.entity_type`. The string form is
/// what actually lives on the wire and in storage; this enum only exists so
/// exporters and the orchestrator can match exhaustively instead of on `&str`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Channel,
    Message,
    Reaction,
    Attachment,
    CustomEmoji,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Channel => "channel",
            EntityKind::Message => "message",
            EntityKind::Reaction => "reaction",
            EntityKind::Attachment => "attachment",
            EntityKind::CustomEmoji => "custom_emoji",
        }
    }

    /// Job-unscoped types: shared across re-imports, keyed only by slack_id.
    pub const fn is_global(self) -> bool {
        matches!(self, EntityKind::User | EntityKind::Channel | EntityKind::CustomEmoji)
    }

    /// Fixed barrier order the export orchestrator advances through.
    pub const EXPORT_ORDER: [EntityKind; 6] = [
        EntityKind::User,
        EntityKind::CustomEmoji,
        EntityKind::Channel,
        EntityKind::Attachment,
        EntityKind::Message,
        EntityKind::Reaction,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(EntityKind::User),
            "channel" => Ok(EntityKind::Channel),
            "message" => Ok(EntityKind::Message),
            "reaction" => Ok(EntityKind::Reaction),
            "attachment" => Ok(EntityKind::Attachment),
            "custom_emoji" => Ok(EntityKind::CustomEmoji),
            other => Err(format!("unknown entity_type: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for kind in EntityKind::EXPORT_ORDER {
            assert_eq!(kind, kind.as_str().parse().unwrap());
        }
    }

    #[test]
    fn global_classification_matches_spec() {
        assert!(EntityKind::User.is_global());
        assert!(EntityKind::Channel.is_global());
        assert!(EntityKind::CustomEmoji.is_global());
        assert!(!EntityKind::Message.is_global());
        assert!(!EntityKind::Reaction.is_global());
        assert!(!EntityKind::Attachment.is_global());
    }
}
