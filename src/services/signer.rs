//! AWS Signature Version 4 request signing (header form).
//!
//! Only the headers a caller needs to replay the request are produced:
//! `Authorization`, `x-amz-date` and `x-amz-content-sha256`. The signed
//! header set is `host;x-amz-date` and the payload is always empty.

use crate::{
    config::Credentials,
    errors::{GatewayError, GatewayResult},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{
    AsciiSet, NON_ALPHANUMERIC, percent_decode_str, percent_encode, utf8_percent_encode,
};
use reqwest::Method;
use sha2::{Digest, Sha256};
use url::Url;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "host;x-amz-date";

/// Everything but the unreserved set `A-Z a-z 0-9 - . _ ~`.
const AWS_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Headers produced by a signer for one verb/URI pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub content_sha256: String,
}

/// Signs a request for a verb and URI with the given credentials.
pub trait RequestSigner: Send + Sync {
    fn sign(
        &self,
        method: &Method,
        uri: &Url,
        credentials: &Credentials,
    ) -> GatewayResult<SignedHeaders>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SigV4Signer;

impl RequestSigner for SigV4Signer {
    fn sign(
        &self,
        method: &Method,
        uri: &Url,
        credentials: &Credentials,
    ) -> GatewayResult<SignedHeaders> {
        self.sign_at(method, uri, credentials, Utc::now())
    }
}

impl SigV4Signer {
    /// Sign with an explicit timestamp.
    pub fn sign_at(
        &self,
        method: &Method,
        uri: &Url,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> GatewayResult<SignedHeaders> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, credentials.region, credentials.service
        );

        let host = host_header(uri)?;
        let payload_hash = hex::encode(Sha256::digest(b""));
        let canonical_request = format!(
            "{}\n{}\n{}\nhost:{}\nx-amz-date:{}\n\n{}\n{}",
            method.as_str(),
            canonical_uri(uri.path()),
            canonical_query(uri),
            host,
            amz_date,
            SIGNED_HEADERS,
            payload_hash
        );
        tracing::debug!("canonical request for {} {}:\n{}", method, uri, canonical_request);

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let mut key = hmac_sha256(
            format!("AWS4{}", credentials.secret_access_key).as_bytes(),
            date_stamp.as_bytes(),
        )?;
        key = hmac_sha256(&key, credentials.region.as_bytes())?;
        key = hmac_sha256(&key, credentials.service.as_bytes())?;
        key = hmac_sha256(&key, b"aws4_request")?;
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

        Ok(SignedHeaders {
            authorization: format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, credentials.access_key_id, credential_scope, SIGNED_HEADERS, signature
            ),
            amz_date,
            content_sha256: payload_hash,
        })
    }
}

fn host_header(uri: &Url) -> GatewayResult<String> {
    let host = uri
        .host_str()
        .ok_or_else(|| GatewayError::Signing(format!("URI `{}` has no host", uri)))?;
    Ok(match uri.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn canonical_uri(path: &str) -> String {
    let out = path.split('/').map(encode_segment).collect::<Vec<_>>().join("/");
    if out.starts_with('/') { out } else { format!("/{}", out) }
}

fn canonical_query(uri: &Url) -> String {
    let mut pairs = uri.query_pairs().into_owned().collect::<Vec<(String, String)>>();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", encode(&k), encode(&v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Encode a path segment that may already carry `%XX` escapes.
fn encode_segment(segment: &str) -> String {
    let raw = percent_decode_str(segment).collect::<Vec<u8>>();
    percent_encode(&raw, AWS_ENCODE_SET).to_string()
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, AWS_ENCODE_SET).to_string()
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> GatewayResult<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|err| GatewayError::Signing(err.to_string()))?;
    mac.update(msg);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials() -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into(),
            region: "us-east-1".into(),
            service: "service".into(),
        }
    }

    fn example_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    #[test]
    fn matches_published_get_vanilla_vector() {
        let uri = Url::parse("https://example.amazonaws.com/").unwrap();
        let headers = SigV4Signer
            .sign_at(&Method::GET, &uri, &example_credentials(), example_time())
            .unwrap();

        assert_eq!(headers.amz_date, "20150830T123600Z");
        assert_eq!(
            headers.authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert_eq!(
            headers.content_sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn verb_and_path_change_the_signature() {
        let creds = example_credentials();
        let uri = Url::parse("https://store.example.com/docs/a.pdf").unwrap();
        let get = SigV4Signer.sign_at(&Method::GET, &uri, &creds, example_time()).unwrap();
        let put = SigV4Signer.sign_at(&Method::PUT, &uri, &creds, example_time()).unwrap();
        assert_ne!(get.authorization, put.authorization);

        let other = Url::parse("https://store.example.com/docs/b.pdf").unwrap();
        let get_other = SigV4Signer.sign_at(&Method::GET, &other, &creds, example_time()).unwrap();
        assert_ne!(get.authorization, get_other.authorization);
        assert_eq!(get.amz_date, get_other.amz_date);
    }

    #[test]
    fn canonical_parts_are_normalized() {
        assert_eq!(canonical_uri("/docs/a%2fb/c d"), "/docs/a%2Fb/c%20d");
        assert_eq!(canonical_uri("/docs/it's(1).pdf"), "/docs/it%27s%281%29.pdf");
        assert_eq!(canonical_uri(""), "/");
        assert_eq!(canonical_uri("/docs/a%23b/k.pdf%3facl"), "/docs/a%23b/k.pdf%3Facl");
        assert_eq!(canonical_uri("/docs/%C3%A9t%C3%A9"), "/docs/%C3%A9t%C3%A9");

        let uri = Url::parse("https://h/b?z=1&a=2&a=1&sp=a b").unwrap();
        assert_eq!(canonical_query(&uri), "a=1&a=2&sp=a%20b&z=1");
    }

    #[test]
    fn explicit_port_is_part_of_host() {
        let uri = Url::parse("http://localhost:9000/docs/k").unwrap();
        assert_eq!(host_header(&uri).unwrap(), "localhost:9000");

        let uri = Url::parse("https://store.example.com:443/docs/k").unwrap();
        assert_eq!(host_header(&uri).unwrap(), "store.example.com");
    }
}
