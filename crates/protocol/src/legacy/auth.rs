use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use checksums::Md4;

/// Builds the `<user> <response>` line answering an `AUTHREQD` challenge.
///
/// The response is `base64(MD4(0u32 ‖ password ‖ challenge))` with the `=`
/// padding removed. No trailing newline is included.
#[must_use]
pub fn auth_response(user: &str, password: &[u8], challenge: &str) -> String {
    let mut hasher = Md4::new();
    hasher.update(&0i32.to_le_bytes());
    hasher.update(password);
    hasher.update(challenge.as_bytes());
    let digest = hasher.finalize();
    format!("{user} {}", STANDARD_NO_PAD.encode(digest))
}
