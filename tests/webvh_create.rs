//! Tests for the creation of a new `did:webvh` document and associated log
//! entry.

mod kms;

use didwebvh::webvh::{
    CreateBuilder, SpecVersion, Witness, WitnessWeight, default_did, parse_log, resolve_log,
    serialize_log,
};
use didwebvh::{Document, DocumentBuilder, Error, KeyPurpose, VerificationMethod};
use kms::{Ed25519Verifier, Keyring, new_keyring};

fn genesis_document(did: &str, keyring: &Keyring) -> Document {
    let vm = VerificationMethod::multikey(keyring.verifying_multibase(), did)
        .for_purpose(KeyPurpose::Authentication);
    DocumentBuilder::new(did).verification_method(vm).build().expect("should build document")
}

// Happy path: create a DID from one keypair and make sure the log resolves.
#[tokio::test]
async fn create_and_resolve() {
    let signer = new_keyring();
    let update_multi = signer.verifying_multibase();

    let did = default_did("https://example.com").expect("should derive DID");
    assert_eq!(did, "did:webvh:{SCID}:example.com");

    let result = CreateBuilder::new()
        .document(&genesis_document(&did, &signer))
        .expect("should apply document")
        .update_keys(vec![update_multi])
        .expect("should apply update keys")
        .version_time("2024-01-01T08:32:55Z".parse().expect("should parse"))
        .signer(&signer)
        .build(&Ed25519Verifier)
        .await
        .expect("should create");

    assert!(result.did.starts_with("did:webvh:"));
    assert!(result.did.ends_with(":example.com"));
    assert_eq!(result.log.len(), 1);
    assert!(result.metadata.version_id.starts_with("1-"));
    assert!(!result.metadata.deactivated);
    assert_eq!(result.metadata.method, SpecVersion::V1_0.to_string());
    assert_eq!(result.document.id, result.did);

    // the serialized log parses back and resolves to the same result
    let serialized = serialize_log(&result.log).expect("should serialize");
    let parsed = parse_log(&serialized).expect("should parse");
    assert_eq!(parsed, result.log);

    let resolved =
        resolve_log(&parsed, None, None, &Ed25519Verifier).await.expect("should resolve");
    assert_eq!(resolved.did, result.did);
    assert_eq!(resolved.document, result.document);
    assert_eq!(resolved.metadata, result.metadata);

    // implicit services are materialized on resolution
    assert!(resolved.document.service(&format!("{}#files", result.did)).is_some());
    assert!(resolved.document.service(&format!("{}#whois", result.did)).is_some());
}

#[tokio::test]
async fn create_requires_update_keys() {
    let err = CreateBuilder::new()
        .update_keys(vec![])
        .map(|_| ())
        .expect_err("should reject empty update keys");
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn create_requires_placeholder_did() {
    let doc = DocumentBuilder::new("did:webvh:zQmS:example.com")
        .build()
        .expect("should build document");

    let err = CreateBuilder::new().document(&doc).map(|_| ()).expect_err("should reject");
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn create_validates_witness_shape() {
    let witness = Witness {
        threshold: 3,
        witnesses: vec![
            WitnessWeight { id: new_keyring().did_key(), weight: None },
            WitnessWeight { id: new_keyring().did_key(), weight: None },
        ],
    };
    // threshold exceeds the number of witnesses at 1.0
    let err = CreateBuilder::new().witness(&witness).map(|_| ()).expect_err("should reject");
    assert!(matches!(err, Error::Witness(_)));
}

// Any post-signing modification of the genesis entry must break resolution.
#[tokio::test]
async fn tampered_entry_fails_integrity() {
    let signer = new_keyring();
    let did = default_did("https://example.com").expect("should derive DID");

    let result = CreateBuilder::new()
        .document(&genesis_document(&did, &signer))
        .expect("should apply document")
        .update_keys(vec![signer.verifying_multibase()])
        .expect("should apply update keys")
        .signer(&signer)
        .build(&Ed25519Verifier)
        .await
        .expect("should create");

    let mut tampered = result.log.clone();
    tampered[0].state.also_known_as = Some(vec!["https://elsewhere.example".to_string()]);

    let err = resolve_log(&tampered, None, None, &Ed25519Verifier)
        .await
        .expect_err("should fail integrity");
    assert!(matches!(err, Error::Integrity(_)));

    // a broken version number prefix is a format error
    let mut renumbered = result.log.clone();
    renumbered[0].version_id = format!("2-{}", &result.log[0].version_id[2..]);
    let err = resolve_log(&renumbered, None, None, &Ed25519Verifier)
        .await
        .expect_err("should fail format");
    assert!(matches!(err, Error::Format(_)));
}

// A signer outside the update keys must be rejected even when its signature
// is valid.
#[tokio::test]
async fn unauthorized_signer_is_rejected() {
    let signer = new_keyring();
    let interloper = new_keyring();
    let did = default_did("https://example.com").expect("should derive DID");

    // authorized keys name `signer` but the entry is signed by `interloper`
    let err = CreateBuilder::new()
        .document(&genesis_document(&did, &signer))
        .expect("should apply document")
        .update_keys(vec![signer.verifying_multibase()])
        .expect("should apply update keys")
        .signer(&interloper)
        .build(&Ed25519Verifier)
        .await
        .expect_err("should reject unauthorized signer");
    assert!(matches!(err, Error::Authorization(_)));
}

// The per-call policy can relax a single assertion so the others stay
// testable in isolation. A resolution under a relaxed policy is never
// authoritative.
#[tokio::test]
async fn policy_isolates_key_authorization() {
    use didwebvh::webvh::{ResolveOptions, VerifyPolicy};

    let signer = new_keyring();
    let interloper = new_keyring();
    let did = default_did("https://example.com").expect("should derive DID");

    let result = CreateBuilder::new()
        .document(&genesis_document(&did, &signer))
        .expect("should apply document")
        .update_keys(vec![signer.verifying_multibase()])
        .expect("should apply update keys")
        .signer(&signer)
        .build(&Ed25519Verifier)
        .await
        .expect("should create");

    // replace the controller proof with one from an unauthorized key
    let mut log = result.log;
    log[0].proof = vec![];
    let proof = log[0].proof(&interloper).await.expect("should prove");
    log[0].proof.push(proof);

    let err = resolve_log(&log, None, None, &Ed25519Verifier)
        .await
        .expect_err("should reject unauthorized proof");
    assert!(matches!(err, Error::Authorization(_)));

    // with the authorization check alone disabled, the signature itself
    // still verifies and resolution completes
    let options = ResolveOptions {
        policy: VerifyPolicy { key_authorization: false, ..VerifyPolicy::default() },
        ..ResolveOptions::default()
    };
    resolve_log(&log, None, Some(&options), &Ed25519Verifier)
        .await
        .expect("should resolve under relaxed policy");
}
