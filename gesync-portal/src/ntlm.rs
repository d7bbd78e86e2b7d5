//! NTLMv2 message construction.
//!
//! Only the client half of the handshake is implemented: build the
//! NEGOTIATE message, read the server's CHALLENGE, answer with an
//! AUTHENTICATE message carrying an NTLMv2 response. No signing or
//! sealing is negotiated; the portal only uses NTLM to authenticate the
//! HTTP connection.

use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const NEGOTIATE_OEM: u32 = 0x0000_0002;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;
const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;
const NEGOTIATE_128: u32 = 0x2000_0000;
const NEGOTIATE_56: u32 = 0x8000_0000;

const NEGOTIATE_FLAGS: u32 = NEGOTIATE_UNICODE
    | NEGOTIATE_OEM
    | REQUEST_TARGET
    | NEGOTIATE_NTLM
    | NEGOTIATE_ALWAYS_SIGN
    | NEGOTIATE_EXTENDED_SESSIONSECURITY
    | NEGOTIATE_TARGET_INFO
    | NEGOTIATE_128
    | NEGOTIATE_56;

/// AV pair id carrying the server's FILETIME timestamp.
const MSV_AV_TIMESTAMP: u16 = 7;
const MSV_AV_EOL: u16 = 0;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_OFFSET: i64 = 11_644_473_600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NtlmError {
    Truncated(&'static str),
    BadSignature,
    UnexpectedMessageType(u32),
}

impl std::fmt::Display for NtlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NtlmError::Truncated(field) => write!(f, "NTLM challenge truncated at {}", field),
            NtlmError::BadSignature => write!(f, "NTLM challenge has no NTLMSSP signature"),
            NtlmError::UnexpectedMessageType(t) => {
                write!(f, "expected NTLM challenge (type 2), got type {}", t)
            }
        }
    }
}

impl std::error::Error for NtlmError {}

/// User, password and (possibly empty) domain for the handshake.
#[derive(Clone)]
pub struct NtlmCredentials {
    pub domain: String,
    pub username: String,
    pub password: String,
}

impl NtlmCredentials {
    /// Split a `DOMAIN\user` login. A bare `user` gets an empty domain.
    pub fn new(login: &str, password: &str) -> Self {
        let (domain, username) = match login.split_once('\\') {
            Some((domain, user)) => (domain, user),
            None => ("", login),
        };

        NtlmCredentials {
            domain: domain.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl std::fmt::Debug for NtlmCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NtlmCredentials")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The parts of a CHALLENGE message needed to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub flags: u32,
    pub server_challenge: [u8; 8],
    pub target_info: Vec<u8>,
}

impl Challenge {
    pub fn parse(bytes: &[u8]) -> Result<Self, NtlmError> {
        if bytes.len() < 32 {
            return Err(NtlmError::Truncated("header"));
        }
        if &bytes[0..8] != SIGNATURE {
            return Err(NtlmError::BadSignature);
        }

        let message_type = read_u32(bytes, 8)?;
        if message_type != 2 {
            return Err(NtlmError::UnexpectedMessageType(message_type));
        }

        let flags = read_u32(bytes, 20)?;
        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(&bytes[24..32]);

        // Target info buffer is only present in the longer message form.
        let target_info = if bytes.len() >= 48 {
            read_buffer(bytes, 40)?.to_vec()
        } else {
            Vec::new()
        };

        Ok(Challenge {
            flags,
            server_challenge,
            target_info,
        })
    }

    /// Server timestamp from the target info, if the server sent one.
    pub fn timestamp(&self) -> Option<u64> {
        let info = &self.target_info;
        let mut pos = 0;

        while pos + 4 <= info.len() {
            let id = u16::from_le_bytes([info[pos], info[pos + 1]]);
            let len = usize::from(u16::from_le_bytes([info[pos + 2], info[pos + 3]]));
            let value = info.get(pos + 4..pos + 4 + len)?;

            match id {
                MSV_AV_EOL => return None,
                MSV_AV_TIMESTAMP if len == 8 => {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(value);
                    return Some(u64::from_le_bytes(raw));
                }
                _ => pos += 4 + len,
            }
        }

        None
    }
}

/// Type 1 message opening the handshake.
pub fn negotiate_message() -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&1u32.to_le_bytes());
    msg.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
    // Empty domain and workstation buffers
    msg.extend_from_slice(&[0u8; 16]);
    msg
}

/// Type 3 message answering `challenge`.
///
/// `client_challenge` must be random per handshake; `now` is the client's
/// FILETIME and is only used when the server did not send a timestamp.
pub fn authenticate_message(
    credentials: &NtlmCredentials,
    challenge: &Challenge,
    client_challenge: [u8; 8],
    now: u64,
) -> Vec<u8> {
    let response_key = ntowf_v2(credentials);
    let timestamp = challenge.timestamp().unwrap_or(now);

    let blob = client_blob(timestamp, client_challenge, &challenge.target_info);

    let mut nt_response = hmac_md5(
        &response_key,
        &[&challenge.server_challenge[..], &blob[..]],
    )
    .to_vec();
    nt_response.extend_from_slice(&blob);

    let lm_response = lm_v2_response(&response_key, &challenge.server_challenge, &client_challenge);

    let domain = utf16le(&credentials.domain);
    let user = utf16le(&credentials.username);
    let workstation: Vec<u8> = Vec::new();

    let flags = (challenge.flags & NEGOTIATE_FLAGS) | NEGOTIATE_UNICODE | NEGOTIATE_NTLM;

    const HEADER_LEN: usize = 64;
    let mut payload = Vec::new();
    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(SIGNATURE);
    header.extend_from_slice(&3u32.to_le_bytes());

    // Payload order: domain, user, workstation, LM, NT
    let domain_buf = push_payload(&mut payload, HEADER_LEN, &domain);
    let user_buf = push_payload(&mut payload, HEADER_LEN, &user);
    let workstation_buf = push_payload(&mut payload, HEADER_LEN, &workstation);
    let lm_buf = push_payload(&mut payload, HEADER_LEN, &lm_response);
    let nt_buf = push_payload(&mut payload, HEADER_LEN, &nt_response);
    let session_key_buf = security_buffer(0, HEADER_LEN + payload.len());

    header.extend_from_slice(&lm_buf);
    header.extend_from_slice(&nt_buf);
    header.extend_from_slice(&domain_buf);
    header.extend_from_slice(&user_buf);
    header.extend_from_slice(&workstation_buf);
    header.extend_from_slice(&session_key_buf);
    header.extend_from_slice(&flags.to_le_bytes());

    header.extend_from_slice(&payload);
    header
}

/// Current time as a Windows FILETIME (100ns ticks since 1601).
pub fn filetime_now() -> u64 {
    let now = chrono::Utc::now();
    let secs = u64::try_from(now.timestamp() + FILETIME_EPOCH_OFFSET).unwrap_or_default();
    secs * 10_000_000 + u64::from(now.timestamp_subsec_nanos() / 100)
}

pub(crate) fn nt_hash(password: &str) -> [u8; 16] {
    Md4::digest(utf16le(password)).into()
}

pub(crate) fn ntowf_v2(credentials: &NtlmCredentials) -> [u8; 16] {
    let identity = utf16le(&format!(
        "{}{}",
        credentials.username.to_uppercase(),
        credentials.domain
    ));
    hmac_md5(&nt_hash(&credentials.password), &[&identity])
}

pub(crate) fn lm_v2_response(
    response_key: &[u8; 16],
    server_challenge: &[u8; 8],
    client_challenge: &[u8; 8],
) -> Vec<u8> {
    let mut response =
        hmac_md5(response_key, &[&server_challenge[..], &client_challenge[..]]).to_vec();
    response.extend_from_slice(client_challenge);
    response
}

fn client_blob(timestamp: u64, client_challenge: [u8; 8], target_info: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(32 + target_info.len());
    blob.extend_from_slice(&[0x01, 0x01, 0x00, 0x00]);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&[0u8; 4]);
    blob
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> [u8; 16] {
    let mut mac =
        Hmac::<Md5>::new_from_slice(key).expect("HMAC-MD5 accepts keys of any length");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn push_payload(payload: &mut Vec<u8>, header_len: usize, data: &[u8]) -> [u8; 8] {
    let buf = security_buffer(data.len(), header_len + payload.len());
    payload.extend_from_slice(data);
    buf
}

fn security_buffer(len: usize, offset: usize) -> [u8; 8] {
    let len = u16::try_from(len).unwrap_or(u16::MAX).to_le_bytes();
    let offset = u32::try_from(offset).unwrap_or(u32::MAX).to_le_bytes();
    [
        len[0], len[1], len[0], len[1], offset[0], offset[1], offset[2], offset[3],
    ]
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, NtlmError> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(NtlmError::Truncated("u32 field"))
}

fn read_buffer(bytes: &[u8], at: usize) -> Result<&[u8], NtlmError> {
    let header = bytes
        .get(at..at + 8)
        .ok_or(NtlmError::Truncated("security buffer"))?;
    let len = usize::from(u16::from_le_bytes([header[0], header[1]]));
    let offset = read_u32(header, 4)? as usize;

    bytes
        .get(offset..offset + len)
        .ok_or(NtlmError::Truncated("security buffer payload"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Build a type 2 message the way a server would.
    pub(crate) fn challenge_message(server_challenge: [u8; 8], target_info: &[u8]) -> Vec<u8> {
        let mut msg = Vec::new();
        msg.extend_from_slice(SIGNATURE);
        msg.extend_from_slice(&2u32.to_le_bytes());
        msg.extend_from_slice(&security_buffer(0, 48));
        msg.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
        msg.extend_from_slice(&server_challenge);
        msg.extend_from_slice(&[0u8; 8]);
        msg.extend_from_slice(&security_buffer(target_info.len(), 48));
        msg.extend_from_slice(target_info);
        msg
    }

    fn spec_credentials() -> NtlmCredentials {
        NtlmCredentials {
            domain: "Domain".to_string(),
            username: "User".to_string(),
            password: "Password".to_string(),
        }
    }

    #[test]
    fn test_nt_hash_known_value() {
        assert_eq!(hex(&nt_hash("Password")), "a4f49c406510bdcab6824ee7c30fd852");
    }

    #[test]
    fn test_ntowf_v2_known_value() {
        assert_eq!(
            hex(&ntowf_v2(&spec_credentials())),
            "0c868a403bfd7a93a3001ef22ef02e3f"
        );
    }

    #[test]
    fn test_lm_v2_known_value() {
        let key = ntowf_v2(&spec_credentials());
        let server = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
        let client = [0xaa; 8];
        assert_eq!(
            hex(&lm_v2_response(&key, &server, &client)),
            "86c35097ac9cec102554764a57cccc19aaaaaaaaaaaaaaaa"
        );
    }

    #[test]
    fn test_credentials_split_domain() {
        let creds = NtlmCredentials::new("UNI\\jdoe", "pw");
        assert_eq!(creds.domain, "UNI");
        assert_eq!(creds.username, "jdoe");

        let creds = NtlmCredentials::new("\\jdoe", "pw");
        assert_eq!(creds.domain, "");
        assert_eq!(creds.username, "jdoe");

        let creds = NtlmCredentials::new("jdoe", "pw");
        assert_eq!(creds.domain, "");
        assert_eq!(creds.username, "jdoe");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = NtlmCredentials::new("jdoe", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn test_negotiate_message_layout() {
        let msg = negotiate_message();
        assert_eq!(msg.len(), 32);
        assert_eq!(&msg[0..8], SIGNATURE);
        assert_eq!(read_u32(&msg, 8).unwrap(), 1);
        assert_eq!(read_u32(&msg, 12).unwrap(), NEGOTIATE_FLAGS);
    }

    #[test]
    fn test_parse_challenge_reads_target_info_and_timestamp() {
        let mut info = Vec::new();
        info.extend_from_slice(&MSV_AV_TIMESTAMP.to_le_bytes());
        info.extend_from_slice(&8u16.to_le_bytes());
        info.extend_from_slice(&42u64.to_le_bytes());
        info.extend_from_slice(&[0, 0, 0, 0]);

        let challenge = Challenge::parse(&challenge_message([7; 8], &info)).unwrap();
        assert_eq!(challenge.server_challenge, [7u8; 8]);
        assert_eq!(challenge.target_info, info);
        assert_eq!(challenge.timestamp(), Some(42));
    }

    #[test]
    fn test_parse_challenge_rejects_garbage() {
        assert_eq!(Challenge::parse(b"short"), Err(NtlmError::Truncated("header")));
        assert_eq!(Challenge::parse(&[0u8; 48]), Err(NtlmError::BadSignature));
        assert_eq!(
            Challenge::parse(&negotiate_message()),
            Err(NtlmError::UnexpectedMessageType(1))
        );
    }

    #[test]
    fn test_authenticate_message_buffers_point_at_payload() {
        let creds = NtlmCredentials::new("jdoe", "secret");
        let challenge = Challenge::parse(&challenge_message([1; 8], &[0, 0, 0, 0])).unwrap();
        let msg = authenticate_message(&creds, &challenge, [2; 8], 1234);

        assert_eq!(&msg[0..8], SIGNATURE);
        assert_eq!(read_u32(&msg, 8).unwrap(), 3);
        assert_eq!(read_buffer(&msg, 36).unwrap(), utf16le("jdoe").as_slice());
        assert_eq!(read_buffer(&msg, 28).unwrap(), b"");

        let lm = read_buffer(&msg, 12).unwrap();
        assert_eq!(lm.len(), 24);
        assert_eq!(&lm[16..], &[2u8; 8]);

        // NTProofStr (16) + blob header (28) + target info (4) + trailer (4)
        let nt = read_buffer(&msg, 20).unwrap();
        assert_eq!(nt.len(), 16 + 28 + 4 + 4);
        assert_eq!(&nt[24..32], &1234u64.to_le_bytes());
    }
}
