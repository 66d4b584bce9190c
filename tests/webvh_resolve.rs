//! Tests for resolving a `did:webvh` log into a DID document.

mod kms;

use didwebvh::webvh::{
    CreateBuilder, DidLog, ResolveOptions, UpdateBuilder, default_did, resolve, resolve_log,
    serialize_log,
};
use didwebvh::{
    DocumentBuilder, Error, LogFetcher, VerificationMethod,
};
use kms::{Ed25519Verifier, Keyring, new_keyring};

fn vm_for(keyring: &Keyring, did: &str) -> VerificationMethod {
    VerificationMethod::multikey(keyring.verifying_multibase(), did)
}

// A log created in January 2021 and updated monthly, rotating the update key
// from K1 through K4.
async fn four_version_log() -> (String, Vec<Keyring>, DidLog) {
    let keyrings: Vec<Keyring> = (0..4).map(|_| new_keyring()).collect();

    let placeholder_did = default_did("https://example.com").expect("should derive DID");
    let doc = DocumentBuilder::new(&placeholder_did)
        .verification_method(vm_for(&keyrings[0], &placeholder_did))
        .build()
        .expect("should build document");

    let created = CreateBuilder::new()
        .document(&doc)
        .expect("should apply document")
        .update_keys(vec![keyrings[0].verifying_multibase()])
        .expect("should apply update keys")
        .version_time("2021-01-01T08:32:55Z".parse().expect("should parse"))
        .signer(&keyrings[0])
        .build(&Ed25519Verifier)
        .await
        .expect("should create");

    let did = created.did;
    let mut log = created.log;

    for month in 1..4 {
        let new_doc = DocumentBuilder::new(&did)
            .verification_method(vm_for(&keyrings[month], &did))
            .build()
            .expect("should build document");

        let updated = UpdateBuilder::from(log)
            .expect("should accept log")
            .document(new_doc)
            .rotate_keys(&[keyrings[month].verifying_multibase()], &[])
            .version_time(
                format!("2021-0{}-01T08:32:55Z", month + 1).parse().expect("should parse"),
            )
            .signer(&keyrings[month - 1])
            .build(&Ed25519Verifier)
            .await
            .expect("should update");
        log = updated.log;
    }

    (did, keyrings, log)
}

// The latest version wins when no selector is given, and its metadata
// mirrors the final entry.
#[tokio::test]
async fn resolve_latest() {
    let (did, keyrings, log) = four_version_log().await;

    let resolved = resolve_log(&log, None, None, &Ed25519Verifier).await.expect("should resolve");
    assert_eq!(resolved.did, did);
    assert_eq!(resolved.metadata.version_id, log[3].version_id);
    assert!(resolved.metadata.version_id.starts_with("4-"));
    assert_eq!(resolved.metadata.update_keys, vec![keyrings[3].verifying_multibase()]);
    assert_eq!(
        resolved.metadata.previous_log_entry_hash.as_deref(),
        log[2].version_id.split_once('-').map(|(_, hash)| hash)
    );
}

// Resolving at a historic time returns the version in effect at that time.
#[tokio::test]
async fn resolve_at_time() {
    let (_, _, log) = four_version_log().await;

    let options = ResolveOptions {
        version_time: Some("2021-02-15T08:32:55Z".parse().expect("should parse")),
        ..ResolveOptions::default()
    };
    let resolved =
        resolve_log(&log, None, Some(&options), &Ed25519Verifier).await.expect("should resolve");
    assert!(resolved.metadata.version_id.starts_with("2-"));

    // a time before the first entry matches nothing
    let options = ResolveOptions {
        version_time: Some("2020-06-01T00:00:00Z".parse().expect("should parse")),
        ..ResolveOptions::default()
    };
    let err = resolve_log(&log, None, Some(&options), &Ed25519Verifier)
        .await
        .expect_err("should not match");
    assert!(matches!(err, Error::NotFound(_)));
}

// Version number and version ID selectors pin an exact revision, and a
// prefix replay resolves to the same state.
#[tokio::test]
async fn resolve_by_version() {
    let (_, _, log) = four_version_log().await;

    let options =
        ResolveOptions { version_number: Some(2), ..ResolveOptions::default() };
    let by_number =
        resolve_log(&log, None, Some(&options), &Ed25519Verifier).await.expect("should resolve");
    assert_eq!(by_number.metadata.version_id, log[1].version_id);

    let options = ResolveOptions {
        version_id: Some(log[1].version_id.clone()),
        ..ResolveOptions::default()
    };
    let by_id =
        resolve_log(&log, None, Some(&options), &Ed25519Verifier).await.expect("should resolve");
    assert_eq!(by_id.metadata.version_id, log[1].version_id);

    // replaying the prefix yields the same document and metadata
    let prefix =
        resolve_log(&log[..2], None, None, &Ed25519Verifier).await.expect("should resolve");
    assert_eq!(prefix.document, by_number.document);
    assert_eq!(prefix.metadata, by_number.metadata);

    let options =
        ResolveOptions { version_number: Some(9), ..ResolveOptions::default() };
    let err = resolve_log(&log, None, Some(&options), &Ed25519Verifier)
        .await
        .expect_err("should not match");
    assert!(matches!(err, Error::NotFound(_)));
}

// A verification method selector returns the first version declaring the
// method.
#[tokio::test]
async fn resolve_by_verification_method() {
    let (_, keyrings, log) = four_version_log().await;

    let multibase = keyrings[2].verifying_multibase();
    let fragment = format!("#{}", &multibase[multibase.len() - 8..]);

    let options = ResolveOptions {
        verification_method: Some(fragment),
        ..ResolveOptions::default()
    };
    let resolved =
        resolve_log(&log, None, Some(&options), &Ed25519Verifier).await.expect("should resolve");
    assert!(resolved.metadata.version_id.starts_with("3-"));
}

struct FixtureFetcher {
    log: String,
}

impl LogFetcher for FixtureFetcher {
    async fn fetch_log(&self, _url: &str) -> anyhow::Result<String> {
        Ok(self.log.clone())
    }

    async fn fetch_witness_proofs(&self, _url: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

// Fetch-mode resolution produces the same result as handing over the
// pre-fetched log.
#[tokio::test]
async fn fetched_and_prefetched_agree() {
    let (did, _, log) = four_version_log().await;

    let fetcher = FixtureFetcher { log: serialize_log(&log).expect("should serialize") };
    let fetched =
        resolve(&did, None, &fetcher, &Ed25519Verifier).await.expect("should resolve");
    let prefetched =
        resolve_log(&log, None, None, &Ed25519Verifier).await.expect("should resolve");

    assert_eq!(fetched.did, prefetched.did);
    assert_eq!(fetched.document, prefetched.document);
    assert_eq!(fetched.metadata, prefetched.metadata);

    // selectors can ride along as DID query parameters
    let by_query = resolve(
        &format!("{did}?versionTime=2021-02-15T08:32:55Z"),
        None,
        &fetcher,
        &Ed25519Verifier,
    )
    .await
    .expect("should resolve");
    assert!(by_query.metadata.version_id.starts_with("2-"));

    // a log belonging to some other SCID is rejected
    let foreign = did.replace(
        did.split(':').nth(2).expect("should have SCID"),
        "QmaJp6pmb6RUk4oaDyWQcjeqYbvxsc3kvmHWPpz7B5JwDU",
    );
    let err = resolve(&foreign, None, &fetcher, &Ed25519Verifier)
        .await
        .expect_err("should reject foreign log");
    assert!(matches!(err, Error::Integrity(_)));
}

// An unsupported method is reported as such.
#[tokio::test]
async fn unsupported_method_is_rejected() {
    let fetcher = FixtureFetcher { log: String::new() };
    let err = resolve("did:web:example.com", None, &fetcher, &Ed25519Verifier)
        .await
        .expect_err("should reject");
    // did:web is not parseable by this crate at all
    assert!(matches!(err, Error::Format(_)));

    let err = resolve("did:webvh", None, &fetcher, &Ed25519Verifier)
        .await
        .expect_err("should reject");
    assert!(matches!(err, Error::Format(_)));
}

// An empty log file resolves to not-found.
#[tokio::test]
async fn empty_log_is_not_found() {
    let (did, _, _) = four_version_log().await;
    let fetcher = FixtureFetcher { log: "\n".to_string() };
    let err =
        resolve(&did, None, &fetcher, &Ed25519Verifier).await.expect_err("should be not found");
    assert!(matches!(err, Error::NotFound(_)));
}
