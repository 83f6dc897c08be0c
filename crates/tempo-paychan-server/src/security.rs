use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Constant-time comparison that leaks neither content nor length.
///
/// Both inputs are hashed to SHA-256 first, then compared with `subtle`.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let ha = Sha256::digest(a);
    let hb = Sha256::digest(b);
    ha.ct_eq(&hb).into()
}

/// True if the request's `Authorization: Bearer <token>` matches `expected`.
pub fn bearer_matches(req: &actix_web::HttpRequest, expected: &str) -> bool {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| constant_time_eq(token.as_bytes(), expected.as_bytes()))
        .unwrap_or(false)
}
