//! End-to-end stage 1 over in-memory listing and detail pages

use std::sync::Arc;
use tempfile::TempDir;
use vuln_harvester::harvester::{HarvestExecutor, TaxonomyFilter};
use vuln_harvester::output::{read_link_log, read_records};
use vuln_harvester::TimeBucket;

use crate::support::{
    detail_page, detail_url, harvest_config, listing_page, listing_url, location, FakeSite,
    DETAIL_REFERER,
};

fn two_page_site() -> FakeSite {
    FakeSite::new()
        .page(listing_url(2024, 1, 1), listing_page(&["CVE-2024-0001", "CVE-2024-0002"], 2))
        .page(listing_url(2024, 1, 2), listing_page(&["CVE-2024-0003"], 2))
        .page(
            detail_url("CVE-2024-0001"),
            detail_page(
                Some("January 03, 2024"),
                &["CWE-798"],
                &["https://github.com/acme/vault/commit/1a2b3c4d"],
            ),
        )
        .page(
            detail_url("CVE-2024-0002"),
            detail_page(Some("January 04, 2024"), &["CWE-79"], &["https://example.test/xss"]),
        )
    // CVE-2024-0003 has no detail page: it stays unavailable
}

#[tokio::test]
async fn test_two_page_bucket_end_to_end() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(two_page_site());
    let mut config = harvest_config(&dir);
    config.filter = TaxonomyFilter::from_ids([798]);

    let executor = HarvestExecutor::new(site.clone(), config).unwrap();
    let report = executor
        .harvest_bucket(TimeBucket::new(2024, 1).unwrap(), None)
        .await
        .unwrap();

    assert_eq!(report.links, 3);
    assert_eq!(report.persisted, 1);
    assert_eq!(report.filtered, 1);
    assert_eq!(report.unavailable, 1);
    assert_eq!(report.skipped_by_cursor, 0);
    assert!(!report.interrupted);

    let link_log = read_link_log(&dir.path().join("logs/2024_1.log")).unwrap();
    assert_eq!(
        link_log,
        vec![
            location("CVE-2024-0001"),
            location("CVE-2024-0002"),
            location("CVE-2024-0003"),
        ]
    );

    let records = read_records(&dir.path().join("results/2024_1.jsonl")).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].sequence_index, 0);
    assert_eq!(records[0].identifier, "CVE-2024-0001");
    assert_eq!(records[0].published_date.as_deref(), Some("January 03, 2024"));
    assert_eq!(records[0].metrics.attack_vector.as_deref(), Some("Network"));
    assert_eq!(records[0].metrics.scope, None);
}

#[tokio::test]
async fn test_referers_follow_the_site_flow() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(two_page_site());

    let executor = HarvestExecutor::new(site.clone(), harvest_config(&dir)).unwrap();
    executor
        .harvest_bucket(TimeBucket::new(2024, 1).unwrap(), None)
        .await
        .unwrap();

    let fetches = site.fetches();
    assert_eq!(fetches[0], (listing_url(2024, 1, 1), None));
    assert_eq!(fetches[1], (listing_url(2024, 1, 2), Some(listing_url(2024, 1, 1))));
    for (url, referer) in &fetches[2..] {
        assert!(url.starts_with("https://www.mend.io/vulnerability-database/CVE-"));
        assert_eq!(referer.as_deref(), Some(DETAIL_REFERER));
    }
    assert_eq!(fetches.len(), 5);
}

#[tokio::test]
async fn test_incomplete_record_is_not_written() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        FakeSite::new()
            .page(listing_url(2024, 2, 1), listing_page(&["CVE-2024-0100"], 1))
            .page(
                detail_url("CVE-2024-0100"),
                detail_page(None, &["CWE-327"], &["https://example.test/advisory"]),
            ),
    );

    let executor = HarvestExecutor::new(site, harvest_config(&dir)).unwrap();
    let report = executor
        .harvest_bucket(TimeBucket::new(2024, 2).unwrap(), None)
        .await
        .unwrap();

    assert_eq!(report.incomplete, 1);
    assert_eq!(report.persisted, 0);
    assert!(!dir.path().join("results/2024_2.jsonl").exists());
}

#[tokio::test]
async fn test_unavailable_first_page_leaves_bucket_unwalked() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::new());

    let executor = HarvestExecutor::new(site.clone(), harvest_config(&dir)).unwrap();
    let report = executor
        .harvest_bucket(TimeBucket::new(2023, 12).unwrap(), None)
        .await
        .unwrap();

    assert!(report.listing_unavailable);
    assert_eq!(site.fetched_urls(), vec![listing_url(2023, 12, 1)]);
    assert!(!dir.path().join("logs/2023_12.log").exists());
}

#[tokio::test]
async fn test_unavailable_later_page_drops_only_its_links() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        FakeSite::new()
            .page(listing_url(2024, 3, 1), listing_page(&["CVE-2024-0201"], 3))
            .page(listing_url(2024, 3, 3), listing_page(&["CVE-2024-0203"], 3)),
    );

    let executor = HarvestExecutor::new(site, harvest_config(&dir)).unwrap();
    let report = executor
        .harvest_bucket(TimeBucket::new(2024, 3).unwrap(), None)
        .await
        .unwrap();

    assert_eq!(report.links, 2);
    let link_log = read_link_log(&dir.path().join("logs/2024_3.log")).unwrap();
    assert_eq!(link_log, vec![location("CVE-2024-0201"), location("CVE-2024-0203")]);
}

#[tokio::test]
async fn test_custom_schema_locates_item_links() {
    use vuln_harvester::markup::schema::Locator;
    use vuln_harvester::markup::{Landmark, SiteSchema};

    let dir = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::new().page(
        listing_url(2024, 9, 1),
        r#"<a class="entry" href="/advisories/GHSA-1">GHSA-1</a>
           <a href="/vulnerability-database/CVE-2024-0901">CVE-2024-0901</a>"#,
    ));
    let schema = SiteSchema::mend()
        .unwrap()
        .with_locator(Landmark::ItemLink, Locator::parse(&["a.entry"], None).unwrap());

    let executor = HarvestExecutor::new(site, harvest_config(&dir))
        .unwrap()
        .with_schema(schema);
    executor
        .harvest_bucket(TimeBucket::new(2024, 9).unwrap(), None)
        .await
        .unwrap();

    let link_log = read_link_log(&dir.path().join("logs/2024_9.log")).unwrap();
    assert_eq!(link_log, vec!["/advisories/GHSA-1".to_string()]);
}
