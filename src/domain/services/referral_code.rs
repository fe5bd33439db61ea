use rand::Rng;

pub const CODE_PREFIX: &str = "amb_";
pub const CODE_LEN: usize = 6;
/// Upper-case letters and digits minus the look-alikes I, O, 0 and 1.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const MAX_CODE_ATTEMPTS: usize = 10;

pub fn generate_referral_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let suffix: String = (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", CODE_PREFIX, suffix)
}

/// Canonical form used for lookups: lower-case prefix, upper-case suffix.
/// Anything that cannot be a code yields `None`.
pub fn normalize_referral_code(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.len() != CODE_PREFIX.len() + CODE_LEN || !raw.is_ascii() {
        return None;
    }
    let (prefix, suffix) = raw.split_at(CODE_PREFIX.len());
    if !prefix.eq_ignore_ascii_case(CODE_PREFIX) {
        return None;
    }
    let suffix = suffix.to_ascii_uppercase();
    if !suffix.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
        return None;
    }
    Some(format!("{}{}", CODE_PREFIX, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_codes_use_unambiguous_alphabet() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let code = generate_referral_code(&mut rng);
            assert!(code.starts_with("amb_"));
            assert_eq!(code.len(), 10);
            for ch in code[4..].chars() {
                assert!(!matches!(ch, 'I' | 'O' | '0' | '1'), "ambiguous char in {}", code);
            }
            assert_eq!(normalize_referral_code(&code).as_deref(), Some(code.as_str()));
        }
    }

    #[test]
    fn test_codes_are_mostly_distinct() {
        // 32^6 space; collisions among 1000 draws are possible but rare, and the
        // signup path retries on them.
        let mut rng = rand::thread_rng();
        let codes: HashSet<String> = (0..1000).map(|_| generate_referral_code(&mut rng)).collect();
        assert!(codes.len() >= 995);
    }

    #[test]
    fn test_normalization_is_case_insensitive() {
        assert_eq!(normalize_referral_code("AMB_k7qx2m").as_deref(), Some("amb_K7QX2M"));
        assert_eq!(normalize_referral_code("  amb_K7QX2M ").as_deref(), Some("amb_K7QX2M"));
        assert_eq!(normalize_referral_code("amb_K7QX2"), None);
        assert_eq!(normalize_referral_code("ref_K7QX2M"), None);
        assert_eq!(normalize_referral_code("amb_K7QX0M"), None);
        assert_eq!(normalize_referral_code(""), None);
    }
}
