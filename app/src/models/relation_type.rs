/// Relation type tags stored verbatim in `entity_relations.relation_type`.
pub mod relation {
    pub const POSTED_IN: &str = "posted_in";
    pub const POSTED_BY: &str = "posted_by";
    pub const THREAD_REPLY: &str = "thread_reply";
    pub const ATTACHED_TO: &str = "attached_to";
    pub const REACTED_BY: &str = "reacted_by";
    pub const REACTED_TO: &str = "reacted_to";
    pub const CUSTOM_EMOJI_USED: &str = "custom_emoji_used";
    pub const MEMBER_OF: &str = "member_of";
}
