/// Canonical form used for every coupon code comparison: surrounding
/// whitespace removed, Unicode lowercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

pub fn codes_match(a: &str, b: &str) -> bool {
    normalize_code(a) == normalize_code(b)
}
