/// DearMe Crypto Library
///
/// Server-side helpers: AES-256-GCM sealing of diary text at rest, key
/// encoding for configuration, and HMAC-SHA256 signatures for one-shot
/// account links.
pub mod encrypt;
pub mod keys;
pub mod sign;
