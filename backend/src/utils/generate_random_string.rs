use rand::{Rng, distributions::Alphanumeric};

/// Generates a random alphanumeric string of the specified length.
///
/// The generated string contains uppercase letters (A-Z), lowercase letters (a-z),
/// and digits (0-9). Used for email verification tokens.
///
/// # Examples
///
/// ```ignore
/// let token = generate_random_string(32);
/// assert_eq!(token.len(), 32);
/// ```
pub fn generate_random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generates a six-digit numeric one-time code, zero-padded.
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{code:06}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_string_has_requested_length() {
        let token = generate_random_string(40);
        assert_eq!(token.len(), 40);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
