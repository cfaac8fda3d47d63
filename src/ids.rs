use uuid::Uuid;

/// Generate `count` fresh, unique per-text identifiers, rendered as
/// lowercase hex-with-dashes. Never supplied by the client; texts are
/// matched back to clients positionally via the sidecar, not by ID.
pub fn generate_ids(count: usize) -> Vec<String> {
    (0..count).map(|_| Uuid::new_v4().to_string()).collect()
}
