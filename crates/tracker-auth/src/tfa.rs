//! One-time two-factor codes delivered by email or SMS.

use rand::Rng;

/// A random six-digit code.
pub fn generate_code() -> String {
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

/// Compare a submitted code with the stored one.
pub fn code_matches(stored: Option<&str>, submitted: &str) -> bool {
    match stored {
        Some(code) => {
            let submitted = submitted.trim();
            code.len() == submitted.len()
                && code
                    .bytes()
                    .zip(submitted.bytes())
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                    == 0
        }
        None => false,
    }
}
