//! Canonical JSON and signatures over it.
//!
//! Trust signatures on the backup descriptor are computed over a canonical
//! byte serialization: object keys sorted lexicographically by UTF-8 code
//! unit, no insignificant whitespace, UTF-8 output. Any verifying client
//! must reproduce these exact bytes, so this form is a contract shared by
//! signer and verifier, not an implementation detail.
//!
//! Non-integer numbers are rejected outright: float formatting differs
//! across implementations and would silently break signature verification.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use serde_json::Value;
use thiserror::Error;

/// Errors produced while canonicalizing or signing JSON.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanonicalJsonError {
    /// The value contains a number that is not an integer.
    #[error("non-integer number {0} cannot be canonicalized")]
    NonIntegerNumber(String),

    /// A signature failed to decode from base64.
    #[error("malformed signature encoding: {0}")]
    MalformedSignature(String),

    /// The signature did not verify against the canonical bytes.
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Serialize a JSON value to its canonical byte form.
pub fn canonical_json(value: &Value) -> Result<Vec<u8>, CanonicalJsonError> {
    let mut out = Vec::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalJsonError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.extend_from_slice(i.to_string().as_bytes());
            } else if let Some(u) = n.as_u64() {
                out.extend_from_slice(u.to_string().as_bytes());
            } else {
                return Err(CanonicalJsonError::NonIntegerNumber(n.to_string()));
            }
        },
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        },
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();

            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                // Key came from the map, lookup cannot miss.
                if let Some(item) = map.get(key.as_str()) {
                    write_canonical(item, out)?;
                }
            }
            out.push(b'}');
        },
    }
    Ok(())
}

/// JSON string escaping with the standard short escapes; non-ASCII passes
/// through as UTF-8 rather than `\uXXXX`.
fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{08}' => out.extend_from_slice(b"\\b"),
            '\u{0c}' => out.extend_from_slice(b"\\f"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                let mut buf = [0u8; 6];
                let escaped = format_control_escape(c as u32, &mut buf);
                out.extend_from_slice(escaped);
            },
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            },
        }
    }
    out.push(b'"');
}

fn format_control_escape(code: u32, buf: &mut [u8; 6]) -> &[u8] {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    buf[0] = b'\\';
    buf[1] = b'u';
    buf[2] = b'0';
    buf[3] = b'0';
    buf[4] = HEX[((code >> 4) & 0xf) as usize];
    buf[5] = HEX[(code & 0xf) as usize];
    buf
}

/// Sign a JSON value: ed25519 over the canonical bytes, unpadded base64.
pub fn sign_json(key: &SigningKey, value: &Value) -> Result<String, CanonicalJsonError> {
    let bytes = canonical_json(value)?;
    let signature = key.sign(&bytes);
    Ok(STANDARD_NO_PAD.encode(signature.to_bytes()))
}

/// Verify an unpadded-base64 ed25519 signature over a value's canonical
/// bytes.
pub fn verify_json(
    key: &VerifyingKey,
    value: &Value,
    signature_b64: &str,
) -> Result<(), CanonicalJsonError> {
    let bytes = canonical_json(value)?;
    let raw = STANDARD_NO_PAD
        .decode(signature_b64)
        .map_err(|e| CanonicalJsonError::MalformedSignature(e.to_string()))?;
    let signature = Signature::from_slice(&raw)
        .map_err(|e| CanonicalJsonError::MalformedSignature(e.to_string()))?;
    key.verify(&bytes, &signature).map_err(|_| CanonicalJsonError::VerificationFailed)
}

/// Unpadded-base64 encoding of an ed25519 public key, as used in signature
/// key identifiers.
pub fn encode_public_key(key: &VerifyingKey) -> String {
    STANDARD_NO_PAD.encode(key.as_bytes())
}
