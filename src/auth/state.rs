use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::Result;

const STATE_BYTES: usize = 16;

/// Generates the CSRF `state` parameter for one authorization attempt.
///
/// 16 bytes straight from the OS entropy source, URL-safe base64 without
/// padding so the value can be embedded in a query string unescaped.
pub fn generate_state() -> Result<String> {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
