//! Unit tests for the persisted record line format

use tempfile::TempDir;
use vuln_harvester::output::{last_sequence_index, read_records, RecordWriter};
use vuln_harvester::{CvssMetrics, VulnerabilityRecord};

fn sample() -> VulnerabilityRecord {
    VulnerabilityRecord {
        sequence_index: 7,
        identifier: "CVE-2024-0707".to_string(),
        language: Some("JavaScript".to_string()),
        published_date: Some("July 07, 2024".to_string()),
        reference_links: vec!["https://github.com/acme/web/commit/0707070".to_string()],
        classification_codes: vec!["CWE-338".to_string()],
        severity_score: Some("5.3".to_string()),
        description: Some("Prédiction du jeton de session – 予測可能".to_string()),
        metrics: CvssMetrics {
            attack_vector: Some("Network".to_string()),
            availability: Some("None".to_string()),
            ..CvssMetrics::default()
        },
    }
}

#[test]
fn test_wire_keys_are_stable() {
    let value = serde_json::to_value(sample()).unwrap();
    let object = value.as_object().unwrap();

    for key in [
        "q_id", "cve_id", "language", "date", "resources", "CWEs", "cvss", "description", "AV",
        "AC", "PR", "UI", "S", "C", "I", "A",
    ] {
        assert!(object.contains_key(key), "missing key {key}");
    }
    assert_eq!(object.len(), 16);
    assert_eq!(value["q_id"], 7);
    assert_eq!(value["AV"], "Network");
    assert!(value["AC"].is_null());
}

#[test]
fn test_non_ascii_is_written_verbatim() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("2024_7.jsonl");
    RecordWriter::new(&path).append(&sample()).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("Prédiction du jeton de session – 予測可能"));
    assert!(!contents.contains("\\u"));
    assert_eq!(contents.lines().count(), 1);

    assert_eq!(read_records(&path).unwrap(), vec![sample()]);
    assert_eq!(last_sequence_index(&path).unwrap(), Some(7));
}
