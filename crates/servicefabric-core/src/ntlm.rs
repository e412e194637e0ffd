//! NTLM-negotiated basic authentication.
//!
//! Every request first carries HTTP Basic credentials. When the gateway rejects it
//! with `401` and offers `NTLM` or `Negotiate`, the transport runs the three-leg NTLM
//! handshake (negotiate, challenge, NTLMv2 authenticate) for that request and
//! returns whatever the final leg produced.

use crate::transport::{empty_post, read_response, HttpResponse, HttpTransport};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use url::Url;

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

const AV_EOL: u16 = 0;
const AV_TIMESTAMP: u16 = 7;

// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_OFFSET: u64 = 11_644_473_600;

/// Credentials presented as Basic auth and, on challenge, through NTLM.
#[derive(Debug)]
pub struct NtlmCredentials {
    account: String,
    domain: String,
    username: String,
    password: SecretString,
}

impl NtlmCredentials {
    /// Create credentials; a `DOMAIN\user` account name supplies the NTLM domain.
    #[must_use]
    pub fn new(account: impl Into<String>, password: SecretString) -> Self {
        let account = account.into();
        let (domain, username) = match account.split_once('\\') {
            Some((domain, user)) => (domain.to_string(), user.to_string()),
            None => (String::new(), account.clone()),
        };
        Self {
            account,
            domain,
            username,
            password,
        }
    }

    /// NTLM domain (empty when the account carries none).
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// NTLM user name without the domain prefix.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Parsed NTLM `CHALLENGE_MESSAGE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    /// Flags chosen by the server
    pub flags: u32,
    /// Eight-byte server nonce
    pub server_challenge: [u8; 8],
    /// Raw `AV_PAIR` list
    pub target_info: Vec<u8>,
}

impl ChallengeMessage {
    /// Parse a challenge message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the bytes are not a well-formed challenge.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 32 || &bytes[..8] != SIGNATURE || read_u32(bytes, 8) != 2 {
            return Err(Error::Transport(
                "NTLM: malformed challenge message".to_string(),
            ));
        }

        let flags = read_u32(bytes, 20);
        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(&bytes[24..32]);

        let target_info = if bytes.len() >= 48 {
            let len = usize::from(read_u16(bytes, 40));
            let offset = read_u32(bytes, 44) as usize;
            bytes
                .get(offset..offset + len)
                .ok_or_else(|| {
                    Error::Transport("NTLM: target info out of bounds".to_string())
                })?
                .to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            flags,
            server_challenge,
            target_info,
        })
    }

    /// Server timestamp (`MsvAvTimestamp`) from the target info, if present.
    #[must_use]
    pub fn timestamp(&self) -> Option<u64> {
        let info = &self.target_info;
        let mut pos = 0;
        while pos + 4 <= info.len() {
            let id = read_u16(info, pos);
            let len = usize::from(read_u16(info, pos + 2));
            if id == AV_EOL {
                break;
            }
            let value = info.get(pos + 4..pos + 4 + len)?;
            if id == AV_TIMESTAMP && len == 8 {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(value);
                return Some(u64::from_le_bytes(raw));
            }
            pos += 4 + len;
        }
        None
    }
}

/// Build the `NEGOTIATE_MESSAGE` that opens the handshake.
#[must_use]
pub fn negotiate_message() -> Vec<u8> {
    let mut message = Vec::with_capacity(32);
    message.extend_from_slice(SIGNATURE);
    message.extend_from_slice(&1u32.to_le_bytes());
    message.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
    // Empty domain and workstation fields.
    message.extend_from_slice(&[0u8; 16]);
    message
}

/// `NTOWFv2`: the NTLMv2 response key for a user.
///
/// # Errors
///
/// Returns an error only if the MAC cannot be keyed.
pub fn nt_owf_v2(username: &str, domain: &str, password: &str) -> Result<[u8; 16]> {
    let nt_hash = Md4::digest(utf16le(password));
    let identity = utf16le(&format!("{}{domain}", username.to_uppercase()));
    hmac_md5(&nt_hash, &[&identity])
}

/// NTLMv2 `NtChallengeResponse` (`NTProofStr` followed by the client blob).
///
/// # Errors
///
/// Returns an error only if the MAC cannot be keyed.
pub fn ntlmv2_response(
    response_key: &[u8; 16],
    server_challenge: &[u8; 8],
    client_challenge: &[u8; 8],
    timestamp: u64,
    target_info: &[u8],
) -> Result<Vec<u8>> {
    let mut blob = Vec::with_capacity(32 + target_info.len());
    blob.extend_from_slice(&[0x01, 0x01, 0, 0, 0, 0, 0, 0]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&[0u8; 4]);

    let proof = hmac_md5(response_key, &[server_challenge, &blob])?;
    let mut response = proof.to_vec();
    response.extend_from_slice(&blob);
    Ok(response)
}

/// Build the `AUTHENTICATE_MESSAGE` answering `challenge`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if a credential is too long to encode and
/// an error if the MAC cannot be keyed.
pub fn authenticate_message(
    credentials: &NtlmCredentials,
    challenge: &ChallengeMessage,
    client_challenge: [u8; 8],
    now: u64,
) -> Result<Vec<u8>> {
    let key = nt_owf_v2(
        &credentials.username,
        &credentials.domain,
        credentials.password.expose_secret(),
    )?;

    let server_timestamp = challenge.timestamp();
    let nt_response = ntlmv2_response(
        &key,
        &challenge.server_challenge,
        &client_challenge,
        server_timestamp.unwrap_or(now),
        &challenge.target_info,
    )?;

    // With a server timestamp the LM response is sent as zeros.
    let lm_response = if server_timestamp.is_some() {
        vec![0u8; 24]
    } else {
        let mut lm = hmac_md5(&key, &[&challenge.server_challenge, &client_challenge])?.to_vec();
        lm.extend_from_slice(&client_challenge);
        lm
    };

    let flags = (challenge.flags & NEGOTIATE_FLAGS) | NEGOTIATE_UNICODE;
    let fields = [
        lm_response,
        nt_response,
        utf16le(&credentials.domain),
        utf16le(&credentials.username),
        Vec::new(),
        Vec::new(),
    ];
    // Payload order differs from header order: domain, user, workstation, lm, nt, key.
    let payload_order = [2usize, 3, 4, 0, 1, 5];

    let mut offsets = [0u32; 6];
    let mut payload = Vec::new();
    let header_len = 64u32;
    for index in payload_order {
        offsets[index] = header_len + field_length::<u32>(payload.len())?;
        payload.extend_from_slice(&fields[index]);
    }
    let lengths = fields
        .iter()
        .map(|field| field_length::<u16>(field.len()))
        .collect::<Result<Vec<_>>>()?;

    let mut message = Vec::with_capacity(header_len as usize + payload.len());
    message.extend_from_slice(SIGNATURE);
    message.extend_from_slice(&3u32.to_le_bytes());
    for (len, offset) in lengths.into_iter().zip(offsets) {
        message.extend_from_slice(&len.to_le_bytes());
        message.extend_from_slice(&len.to_le_bytes());
        message.extend_from_slice(&offset.to_le_bytes());
    }
    message.extend_from_slice(&flags.to_le_bytes());
    message.extend_from_slice(&payload);
    Ok(message)
}

fn field_length<N: TryFrom<usize>>(len: usize) -> Result<N> {
    N::try_from(len).map_err(|_| {
        Error::Configuration(format!(
            "NTLM: authenticate message field of {len} bytes is too long"
        ))
    })
}

/// Transport attaching Basic credentials and answering NTLM challenges.
#[derive(Debug)]
pub struct NtlmTransport {
    http: Client,
    credentials: NtlmCredentials,
}

#[derive(Debug, Clone, Copy)]
enum Verb {
    Get,
    Post,
}

impl NtlmTransport {
    /// Wrap an existing `reqwest` client.
    #[must_use]
    pub const fn new(http: Client, credentials: NtlmCredentials) -> Self {
        Self { http, credentials }
    }

    fn request(&self, verb: Verb, url: &Url) -> RequestBuilder {
        let builder = match verb {
            Verb::Get => self.http.get(url.clone()),
            Verb::Post => empty_post(&self.http, url.clone()),
        };
        builder.header(ACCEPT, "application/json")
    }

    async fn exchange(&self, verb: Verb, url: Url) -> Result<HttpResponse> {
        debug!(url = %url, ?verb, "sending request with basic credentials");
        let response = self
            .request(verb, &url)
            .basic_auth(
                &self.credentials.account,
                Some(self.credentials.password.expose_secret()),
            )
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return read_response(response).await;
        }
        let Some(scheme) = offered_scheme(response.headers()) else {
            return read_response(response).await;
        };
        response.bytes().await?;

        debug!(scheme, "server requested NTLM negotiation");
        let negotiate = BASE64.encode(negotiate_message());
        let response = self
            .request(verb, &url)
            .header(AUTHORIZATION, format!("{scheme} {negotiate}"))
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return read_response(response).await;
        }
        let Some(token) = challenge_token(response.headers(), scheme) else {
            return read_response(response).await;
        };
        let raw = BASE64
            .decode(token)
            .map_err(|err| Error::Transport(format!("NTLM: invalid challenge encoding: {err}")))?;
        response.bytes().await?;

        let challenge = ChallengeMessage::parse(&raw)?;
        let authenticate =
            authenticate_message(&self.credentials, &challenge, rand::random(), filetime_now())?;

        debug!(scheme, "answering NTLM challenge");
        let response = self
            .request(verb, &url)
            .header(
                AUTHORIZATION,
                format!("{scheme} {}", BASE64.encode(authenticate)),
            )
            .send()
            .await?;
        read_response(response).await
    }
}

#[async_trait]
impl HttpTransport for NtlmTransport {
    async fn get(&self, url: Url) -> Result<HttpResponse> {
        self.exchange(Verb::Get, url).await
    }

    async fn post(&self, url: Url) -> Result<HttpResponse> {
        self.exchange(Verb::Post, url).await
    }
}

fn offered_scheme(headers: &HeaderMap) -> Option<&'static str> {
    let offered: Vec<&str> = headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .collect();

    ["NTLM", "Negotiate"].into_iter().find(|scheme| {
        offered.iter().any(|value| {
            value
                .split_whitespace()
                .next()
                .is_some_and(|first| first.eq_ignore_ascii_case(scheme))
        })
    })
}

fn challenge_token<'a>(headers: &'a HeaderMap, scheme: &str) -> Option<&'a str> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            let (name, token) = value.trim().split_once(' ')?;
            let token = token.trim();
            (name.eq_ignore_ascii_case(scheme) && !token.is_empty()).then_some(token)
        })
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 16]> {
    let mut mac = <Hmac<Md5> as Mac>::new_from_slice(key)
        .map_err(|err| Error::Transport(format!("NTLM: {err}")))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn utf16le(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn filetime_now() -> u64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (since_epoch.as_secs() + FILETIME_EPOCH_OFFSET) * 10_000_000
        + u64::from(since_epoch.subsec_nanos() / 100)
}
