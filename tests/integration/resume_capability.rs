//! Resume behaviour: cursor skipping, idempotent reruns, torn tails and locking

use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use vuln_harvester::harvester::{HarvestError, HarvestExecutor};
use vuln_harvester::output::{read_records, write_link_log, ArtifactLayout, RecordWriter};
use vuln_harvester::resume::{ArtifactLock, ResumeError};
use vuln_harvester::{ItemReference, TimeBucket, VulnerabilityRecord};

use crate::support::{detail_page, detail_url, harvest_config, location, FakeSite};

const IDS: [&str; 3] = ["CVE-2024-0301", "CVE-2024-0302", "CVE-2024-0303"];

fn bucket() -> TimeBucket {
    TimeBucket::new(2024, 4).unwrap()
}

fn seed_link_log(dir: &TempDir) {
    let layout = ArtifactLayout::new(dir.path().to_path_buf());
    layout.ensure_directories().unwrap();
    let items: Vec<ItemReference> = IDS
        .iter()
        .map(|id| ItemReference {
            display_text: id.to_string(),
            location: location(id),
        })
        .collect();
    write_link_log(&layout.for_bucket(&bucket()).link_log, &items).unwrap();
}

fn site_with_all_details() -> FakeSite {
    IDS.iter().fold(FakeSite::new(), |site, id| {
        site.page(
            detail_url(id),
            detail_page(Some("April 01, 2024"), &["CWE-321"], &["https://example.test/fix"]),
        )
    })
}

fn persisted_record(index: u64, id: &str) -> VulnerabilityRecord {
    let mut record = VulnerabilityRecord::new(index, id);
    record.language = Some("Go".to_string());
    record.published_date = Some("April 01, 2024".to_string());
    record.reference_links = vec!["https://example.test/fix".to_string()];
    record.classification_codes = vec!["CWE-321".to_string()];
    record.severity_score = Some(String::new());
    record
}

#[tokio::test]
async fn test_cursor_skips_covered_items() {
    let dir = TempDir::new().unwrap();
    seed_link_log(&dir);
    let records_path = dir.path().join("results/2024_4.jsonl");
    RecordWriter::new(&records_path)
        .append(&persisted_record(1, IDS[1]))
        .unwrap();

    let site = Arc::new(site_with_all_details());
    let executor = HarvestExecutor::new(site.clone(), harvest_config(&dir)).unwrap();
    let report = executor.harvest_bucket(bucket(), None).await.unwrap();

    // the link log exists, so no listing page is fetched either
    assert_eq!(site.fetched_urls(), vec![detail_url(IDS[2])]);
    assert_eq!(report.skipped_by_cursor, 2);
    assert_eq!(report.persisted, 1);

    let indices: Vec<u64> = read_records(&records_path)
        .unwrap()
        .iter()
        .map(|r| r.sequence_index)
        .collect();
    assert_eq!(indices, vec![1, 2]);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    seed_link_log(&dir);
    let records_path = dir.path().join("results/2024_4.jsonl");

    let first_site = Arc::new(site_with_all_details());
    HarvestExecutor::new(first_site.clone(), harvest_config(&dir))
        .unwrap()
        .harvest_bucket(bucket(), None)
        .await
        .unwrap();
    assert_eq!(first_site.fetched_urls().len(), 3);
    let after_first = std::fs::read_to_string(&records_path).unwrap();

    let second_site = Arc::new(site_with_all_details());
    let report = HarvestExecutor::new(second_site.clone(), harvest_config(&dir))
        .unwrap()
        .harvest_bucket(bucket(), None)
        .await
        .unwrap();

    assert!(second_site.fetched_urls().is_empty());
    assert_eq!(report.skipped_by_cursor, 3);
    assert_eq!(report.persisted, 0);
    assert_eq!(std::fs::read_to_string(&records_path).unwrap(), after_first);
}

#[tokio::test]
async fn test_torn_tail_is_repaired_before_resuming() {
    let dir = TempDir::new().unwrap();
    seed_link_log(&dir);
    let records_path = dir.path().join("results/2024_4.jsonl");
    RecordWriter::new(&records_path)
        .append(&persisted_record(0, IDS[0]))
        .unwrap();
    {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&records_path)
            .unwrap();
        file.write_all(br#"{"q_id":1,"cve_id":"CVE-2024-03"#).unwrap();
    }

    let site = Arc::new(site_with_all_details());
    let report = HarvestExecutor::new(site.clone(), harvest_config(&dir))
        .unwrap()
        .harvest_bucket(bucket(), None)
        .await
        .unwrap();

    assert_eq!(site.fetched_urls(), vec![detail_url(IDS[1]), detail_url(IDS[2])]);
    assert_eq!(report.persisted, 2);

    let contents = std::fs::read_to_string(&records_path).unwrap();
    assert!(contents.ends_with('\n'));
    assert_eq!(contents.lines().count(), 3);
    assert_eq!(read_records(&records_path).unwrap().len(), 3);
}

#[tokio::test]
async fn test_second_writer_on_same_bucket_is_rejected() {
    let dir = TempDir::new().unwrap();
    seed_link_log(&dir);
    let records_path = dir.path().join("results/2024_4.jsonl");

    let mut lock = ArtifactLock::open(&records_path).unwrap();
    let _guard = lock.try_exclusive().unwrap();

    let site = Arc::new(site_with_all_details());
    let result = HarvestExecutor::new(site.clone(), harvest_config(&dir))
        .unwrap()
        .harvest_bucket(bucket(), None)
        .await;

    assert!(matches!(
        result,
        Err(HarvestError::Resume(ResumeError::Locked(_)))
    ));
    assert!(site.fetched_urls().is_empty());
}

#[tokio::test]
async fn test_multiline_href_keeps_indices_stable_across_restarts() {
    use crate::support::listing_url;

    let dir = TempDir::new().unwrap();
    let listing = String::from(
        "<a href=\"/vulnerability-database/CVE-2024-0311\">A</a>\
         <a href=\"/vulnerability-database/CVE-2024-0312\n/vulnerability-database/CVE-2024-0319\">B</a>\
         <a href=\"/vulnerability-database/CVE-2024-0314 \">D</a>"
    );
    let site = || {
        FakeSite::new()
            .page(listing_url(2024, 10, 1), listing.clone())
            .page(
                detail_url("CVE-2024-0314"),
                detail_page(Some("October 02, 2024"), &["CWE-321"], &["https://example.test/fix"]),
            )
            .page(
                detail_url("CVE-2024-0319"),
                detail_page(Some("October 03, 2024"), &["CWE-321"], &["https://example.test/fix"]),
            )
    };
    let bucket = TimeBucket::new(2024, 10).unwrap();
    let records_path = dir.path().join("results/2024_10.jsonl");

    let first = HarvestExecutor::new(Arc::new(site()), harvest_config(&dir))
        .unwrap()
        .harvest_bucket(bucket, None)
        .await
        .unwrap();
    assert_eq!(first.links, 3);
    assert_eq!(first.persisted, 1);
    let after_first = std::fs::read_to_string(&records_path).unwrap();

    let second = HarvestExecutor::new(Arc::new(site()), harvest_config(&dir))
        .unwrap()
        .harvest_bucket(bucket, None)
        .await
        .unwrap();

    assert_eq!(second.links, 3);
    assert_eq!(second.persisted, 0);
    assert_eq!(std::fs::read_to_string(&records_path).unwrap(), after_first);
    let records = read_records(&records_path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].sequence_index, 2);
    assert_eq!(records[0].identifier, "CVE-2024-0314");
}
