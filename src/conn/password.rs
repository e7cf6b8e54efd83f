use rand::rngs::OsRng;
use rand::RngCore;

use super::ConnectionSpec;

const PASSWORD_BYTES: usize = 16;

/// A fresh random password, hex encoded.
pub fn generate_password() -> String {
    let mut buf = [0u8; PASSWORD_BYTES];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Effective password for one invocation.
///
/// With `password_generate` set, a new value is produced on every call and
/// nothing here keeps it. Callers that do not store the result rotate the
/// credential on each run.
pub fn resolve_password(spec: &ConnectionSpec) -> Option<String> {
    if spec.password_generate {
        tracing::debug!("generated password for connection");
        return Some(generate_password());
    }
    spec.password.clone()
}
