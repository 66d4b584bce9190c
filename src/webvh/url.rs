//! DID to HTTPS transformation for the `did:webvh` method.
//!
//! <https://identity.foundation/didwebvh/#the-did-to-https-transformation>

use std::fmt::Write as _;

use crate::document::Service;
use crate::error::Error;
use crate::webvh::METHOD;

/// Convert a `did:webvh` DID into the base HTTP URL it is published under.
///
/// The colon-separated tail of the DID becomes the host and path: any `:`
/// inside a segment arrives percent-encoded (`%3A`) and is decoded here.
/// Internationalized host labels are normalized to their punycode (ASCII)
/// form. `localhost` gets the `http` scheme, everything else `https`.
///
/// # Errors
///
/// Will fail if the DID is not a structurally valid `did:webvh` or the host
/// cannot be parsed.
pub fn base_url(did: &str) -> Result<String, Error> {
    let parts: Vec<&str> = did.split(':').collect();
    if parts.len() < 4 || parts[0] != "did" || parts[1] != METHOD {
        return Err(Error::Format(format!("not a valid did:{METHOD}: {did}")));
    }

    let host_and_path = parts[3..].join("/").replace("%3A", ":").replace("%3a", ":");
    let scheme = if host_and_path.split(['/', ':']).next() == Some("localhost") {
        "http"
    } else {
        "https"
    };

    // parsing through `url` normalizes IDN labels to punycode
    let url = url::Url::parse(&format!("{scheme}://{host_and_path}"))
        .map_err(|e| Error::Format(format!("invalid host in {did}: {e}")))?;
    let Some(host) = url.host_str() else {
        return Err(Error::Format(format!("no host in {did}")));
    };

    let mut base = format!("{}://{host}", url.scheme());
    if let Some(port) = url.port() {
        let _ = write!(base, ":{port}");
    }
    base.push_str(url.path().trim_end_matches('/'));
    Ok(base)
}

/// The URL of the `did.jsonl` log file for a DID.
///
/// A DID with no path beyond the host publishes its log under
/// `/.well-known/`; otherwise the log sits directly under the path.
///
/// # Errors
///
/// Will fail if the DID is not a structurally valid `did:webvh`.
pub fn log_url(did: &str) -> Result<String, Error> {
    let base = base_url(did)?;
    if did.split(':').count() == 4 {
        Ok(format!("{base}/.well-known/did.jsonl"))
    } else {
        Ok(format!("{base}/did.jsonl"))
    }
}

/// The URL of the `did-witness.json` file for a DID: the sibling of the
/// log file.
///
/// # Errors
///
/// Will fail if the DID is not a structurally valid `did:webvh`.
pub fn witness_url(did: &str) -> Result<String, Error> {
    let log = log_url(did)?;
    let Some(parent) = log.strip_suffix("did.jsonl") else {
        return Err(Error::Format(format!("unexpected log URL shape: {log}")));
    };
    Ok(format!("{parent}did-witness.json"))
}

/// Construct a placeholder `did:webvh` DID from the HTTP URL it will be
/// published under.
///
/// The output carries the `{SCID}` placeholder in place of the
/// self-certifying identifier; the create operation substitutes the real
/// SCID during its build.
///
/// # Errors
///
/// Will fail if the URL is not a valid HTTP URL or has no host.
pub fn default_did(url: &str) -> Result<String, Error> {
    let url = url::Url::parse(url).map_err(|e| Error::Format(format!("invalid URL: {e}")))?;
    let Some(host) = url.host_str() else {
        return Err(Error::Format("no host in URL".to_string()));
    };

    let mut id = host.to_string();
    if let Some(port) = url.port() {
        let _ = write!(id, "%3A{port}");
    }
    if let Some(path) = url.path().strip_prefix('/') {
        if !path.is_empty() {
            let path = path.trim_end_matches('/').replace('/', ":");
            let _ = write!(id, ":{path}");
        }
    }
    Ok(format!("did:{METHOD}:{}:{id}", crate::webvh::SCID_PLACEHOLDER))
}

/// The implicit services a resolved document carries when not declared
/// explicitly: `#files` pointing at the base URL and `#whois` pointing at
/// the linked verifiable presentation next to the log.
///
/// # Errors
///
/// Will fail if the DID is not a structurally valid `did:webvh`.
pub fn default_services(did: &str) -> Result<Vec<Service>, Error> {
    let base = base_url(did)?;
    Ok(vec![
        Service::new(format!("{did}#files"), "LinkedDomains", base.clone()),
        Service::new(
            format!("{did}#whois"),
            "LinkedVerifiablePresentation",
            format!("{base}/whois.vp"),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCID: &str = "QmaJp6pmb6RUk4oaDyWQcjeqYbvxsc3kvmHWPpz7B5JwDU";

    #[test]
    fn default_url() {
        let did = format!("did:webvh:{SCID}:domain.with-hyphens.computer");
        assert_eq!(base_url(&did).unwrap(), "https://domain.with-hyphens.computer");
        assert_eq!(
            log_url(&did).unwrap(),
            "https://domain.with-hyphens.computer/.well-known/did.jsonl"
        );
        assert_eq!(
            witness_url(&did).unwrap(),
            "https://domain.with-hyphens.computer/.well-known/did-witness.json"
        );
    }

    #[test]
    fn path_url() {
        let did = format!("did:webvh:{SCID}:domain.with-hyphens.computer:dids:issuer");
        assert_eq!(
            base_url(&did).unwrap(),
            "https://domain.with-hyphens.computer/dids/issuer"
        );
        assert_eq!(
            log_url(&did).unwrap(),
            "https://domain.with-hyphens.computer/dids/issuer/did.jsonl"
        );
        assert_eq!(
            witness_url(&did).unwrap(),
            "https://domain.with-hyphens.computer/dids/issuer/did-witness.json"
        );
    }

    #[test]
    fn port_url() {
        let did = format!("did:webvh:{SCID}:domain.with-hyphens.computer%3A8080");
        assert_eq!(base_url(&did).unwrap(), "https://domain.with-hyphens.computer:8080");
        assert_eq!(
            log_url(&did).unwrap(),
            "https://domain.with-hyphens.computer:8080/.well-known/did.jsonl"
        );
    }

    #[test]
    fn localhost_gets_http() {
        let did = format!("did:webvh:{SCID}:localhost%3A8080");
        assert_eq!(base_url(&did).unwrap(), "http://localhost:8080");
    }

    #[test]
    fn idn_host_is_punycoded() {
        let did = format!("did:webvh:{SCID}:bücher.example");
        assert_eq!(base_url(&did).unwrap(), "https://xn--bcher-kva.example");
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        assert!(base_url("did:web:example.com").is_err());
        assert!(base_url("did:webvh:example.com").is_err());
        assert!(base_url("not-a-did").is_err());
    }

    #[test]
    fn default_did_round_trip() {
        let did = default_did("https://example.com").unwrap();
        assert_eq!(did, "did:webvh:{SCID}:example.com");

        let did = default_did("https://example.com:8080/issuers/example/").unwrap();
        assert_eq!(did, "did:webvh:{SCID}:example.com%3A8080:issuers:example");
    }

    #[test]
    fn implicit_services() {
        let did = format!("did:webvh:{SCID}:example.com");
        let services = default_services(&did).unwrap();
        assert_eq!(services[0].id, format!("{did}#files"));
        assert_eq!(services[1].id, format!("{did}#whois"));
    }
}
