use rand::{thread_rng, Rng};

/// Length of every generated paste id.
pub const ID_LENGTH: usize = 10;

/// URL-safe symbols used in ids; none of them need escaping in a path segment.
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Source of candidate paste ids.
///
/// Implementations are not required to produce unique ids; the store checks
/// every candidate against existing records before using it.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random ids drawn from a cryptographically secure generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn generate(&self) -> String {
        generate_id()
    }
}

/// Generate a random id of [`ID_LENGTH`] characters.
pub fn generate_id() -> String {
    // thread_rng is a CSPRNG seeded from the OS
    let mut rng = thread_rng();
    (0..ID_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
