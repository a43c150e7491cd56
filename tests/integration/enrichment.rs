//! Stage 2 over persisted records with an in-memory commit source

use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use vuln_harvester::harvester::{CommitEnrichment, EnrichmentCorrelator};
use vuln_harvester::output::{read_enrichment_results, read_error_ledger, RecordWriter};
use vuln_harvester::shutdown::ShutdownCoordinator;
use vuln_harvester::{TimeBucket, VulnerabilityRecord};

use crate::support::{enrichment_config, FakeCommitApi};

const API: &str = "https://api.test";

fn commit_response(sha: &str) -> Value {
    json!({
        "sha": sha,
        "url": format!("{API}/repos/acme/vault/commits/{sha}"),
        "html_url": format!("https://github.com/acme/vault/commit/{sha}"),
        "commit": {
            "message": format!("fix {sha}"),
            "committer": {"date": "2024-05-06T07:08:09Z"}
        },
        "files": [{"filename": "src/keys.rs", "additions": 3}]
    })
}

fn query(sha: &str) -> String {
    format!("{API}/repos/acme/vault/commits/{sha}")
}

fn seed_records(dir: &TempDir, bucket: &TimeBucket) {
    let mut first = VulnerabilityRecord::new(0, "CVE-2024-0401");
    first.reference_links = vec![
        "https://github.com/acme/vault/commit/aaaaaaa".to_string(),
        "https://nvd.nist.gov/vuln/detail/CVE-2024-0401".to_string(),
        "https://github.com/acme/vault/commit/bbbbbbb".to_string(),
    ];
    let mut second = VulnerabilityRecord::new(4, "CVE-2024-0405");
    second.reference_links = vec!["https://github.com/acme/vault/commit/ccccccc".to_string()];

    let path = dir
        .path()
        .join("results")
        .join(format!("{}.jsonl", bucket.stem()));
    let mut writer = RecordWriter::new(&path);
    writer.append(&first).unwrap();
    writer.append(&second).unwrap();
}

#[tokio::test]
async fn test_partial_failure_goes_to_ledger() {
    let dir = TempDir::new().unwrap();
    let bucket = TimeBucket::new(2024, 5).unwrap();
    seed_records(&dir, &bucket);

    let mut missing_files = commit_response("bbbbbbb");
    missing_files.as_object_mut().unwrap().remove("files");
    let api = Arc::new(
        FakeCommitApi::new()
            .respond(query("aaaaaaa"), commit_response("aaaaaaa"))
            .respond(query("bbbbbbb"), missing_files)
            .respond(query("ccccccc"), commit_response("ccccccc")),
    );

    let correlator = EnrichmentCorrelator::new(api.clone(), enrichment_config(&dir, API));
    let report = correlator.enrich_bucket(bucket).await.unwrap().unwrap();

    assert_eq!(api.queries(), vec![query("aaaaaaa"), query("bbbbbbb"), query("ccccccc")]);
    assert_eq!(report.records, 2);
    assert_eq!(report.queries, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);

    let results: Vec<CommitEnrichment> =
        read_enrichment_results(&dir.path().join("crawl_result/2024_5_patch.jsonl")).unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.commit_id.as_str()).collect();
    assert_eq!(ids, vec!["aaaaaaa", "ccccccc"]);
    assert_eq!(results[0].message, "fix aaaaaaa");
    assert_eq!(results[0].commit_date, "2024-05-06T07:08:09Z");
    assert_eq!(results[1].files[0]["filename"], "src/keys.rs");

    let ledger = read_error_ledger(&dir.path().join("crawl_result/2024_5_patch_error.txt")).unwrap();
    assert_eq!(ledger, vec![query("bbbbbbb")]);
}

#[tokio::test]
async fn test_unreachable_queries_are_ledgered() {
    let dir = TempDir::new().unwrap();
    let bucket = TimeBucket::new(2024, 6).unwrap();
    seed_records(&dir, &bucket);

    let api = Arc::new(FakeCommitApi::new());
    let report = EnrichmentCorrelator::new(api, enrichment_config(&dir, API))
        .enrich_bucket(bucket)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 3);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("crawl_result/2024_6_patch.jsonl")).unwrap(),
        "[]\n"
    );
    assert_eq!(
        read_error_ledger(&dir.path().join("crawl_result/2024_6_patch_error.txt"))
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn test_bucket_without_records_is_skipped() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FakeCommitApi::new());

    let outcome = EnrichmentCorrelator::new(api.clone(), enrichment_config(&dir, API))
        .enrich_bucket(TimeBucket::new(2024, 7).unwrap())
        .await
        .unwrap();

    assert!(outcome.is_none());
    assert!(api.queries().is_empty());
    assert!(!dir.path().join("crawl_result").exists());
}

#[tokio::test]
async fn test_shutdown_still_writes_artifacts() {
    let dir = TempDir::new().unwrap();
    let bucket = TimeBucket::new(2024, 8).unwrap();
    seed_records(&dir, &bucket);

    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let api = Arc::new(FakeCommitApi::new().respond(query("aaaaaaa"), commit_response("aaaaaaa")));
    let report = EnrichmentCorrelator::new(api.clone(), enrichment_config(&dir, API))
        .with_shutdown(shutdown)
        .enrich_bucket(bucket)
        .await
        .unwrap()
        .unwrap();

    assert!(report.interrupted);
    assert!(api.queries().is_empty());
    assert!(dir.path().join("crawl_result/2024_8_patch.jsonl").exists());
    assert!(dir.path().join("crawl_result/2024_8_patch_error.txt").exists());
}
