//! Multipart boundary token

use std::fmt;

use rand::distr::Alphanumeric;
use rand::Rng;

/// Length of every generated boundary token
pub const BOUNDARY_LEN: usize = 40;

/// Random delimiter separating the parts of a multipart body.
///
/// Drawn from `[0-9A-Za-z]` with a non-cryptographic RNG. Payloads are opaque
/// audio frames, so a collision with the payload bytes is not guarded against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Boundary(String);

impl Boundary {
    /// Generate a fresh boundary from `rng`
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let token = (0..BOUNDARY_LEN)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_boundary_is_alphanumeric() {
        let mut rng = StdRng::seed_from_u64(7);
        let boundary = Boundary::generate(&mut rng);

        assert_eq!(boundary.len(), BOUNDARY_LEN);
        assert!(boundary.as_str().bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn same_seed_same_boundary() {
        let a = Boundary::generate(&mut StdRng::seed_from_u64(42));
        let b = Boundary::generate(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn consecutive_boundaries_differ() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = Boundary::generate(&mut rng);
        let b = Boundary::generate(&mut rng);
        assert_ne!(a, b);
    }
}
