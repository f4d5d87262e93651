use slotmap::new_key_type;

new_key_type! {
    /// Identifies an entity hosting a state machine. Handles stay valid
    /// until the entity is despawned and are cheap to copy and compare.
    pub struct EntityId;
}
