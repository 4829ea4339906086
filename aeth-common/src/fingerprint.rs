//! Content-addressed keys for generated concept graphs

use sha2::{Digest, Sha256};

/// Compute the graph cache fingerprint for a (topic, education stage) pair.
///
/// The topic is lowercased before hashing; the education stage is hashed
/// verbatim. Output is 64 lowercase hex characters (SHA-256).
///
/// # Examples
///
/// ```
/// use aeth_common::fingerprint::topic_fingerprint;
///
/// let a = topic_fingerprint("Photosynthesis", "Undergraduate");
/// let b = topic_fingerprint("photosynthesis", "Undergraduate");
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
pub fn topic_fingerprint(topic: &str, education_stage: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}::{}", topic.to_lowercase(), education_stage).as_bytes());
    format!("{:x}", hasher.finalize())
}
