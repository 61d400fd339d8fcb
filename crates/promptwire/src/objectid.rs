use uuid::Uuid;

/// A random id such as `msg_6f1c…`
pub fn create_object_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// A stable id derived from a seed and a key; the same inputs always give the same id
pub fn derive_object_id(prefix: &str, seed: &Uuid, key: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v5(seed, key.as_bytes()).simple())
}

/// Seed for the ids of one generation, derived from the name the caller gives it
pub fn generation_seed(generation: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, generation.as_bytes())
}
