use rand::{rngs::OsRng, Rng};

pub const CODE_LEN: usize = 8;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draws a referral code from the OS CSPRNG. Uniqueness is left to the
/// `users.referral_code` constraint; callers retry on collision.
pub fn generate() -> String {
    let mut rng = OsRng;
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_eight_uppercase_alphanumerics() {
        for _ in 0..100 {
            let code = generate();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn codes_vary() {
        assert_ne!(generate(), generate());
    }
}
