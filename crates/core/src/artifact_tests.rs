// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn claim(id: &str, text: &str, speaker: Option<&str>) -> Claim {
    Claim {
        id: id.to_string(),
        claim: text.to_string(),
        quotes: Vec::new(),
        speaker: speaker.map(String::from),
    }
}

fn sample_tree() -> SortedTree {
    vec![
        (
            "Pets".to_string(),
            TopicNode {
                topics: vec![
                    (
                        "Dogs".to_string(),
                        SubtopicNode {
                            claims: vec![
                                claim("cl1", "Dogs are loyal", Some("Ada")),
                                claim("cl2", "Dogs need walks", Some("Bo")),
                            ],
                            speakers: vec!["Ada".to_string(), "Bo".to_string()],
                            counts: TreeCounts {
                                claims: 2,
                                speakers: 2,
                            },
                        },
                    ),
                    (
                        "Cats".to_string(),
                        SubtopicNode {
                            claims: vec![claim("cl3", "Cats are independent", Some("Ada"))],
                            speakers: vec!["Ada".to_string()],
                            counts: TreeCounts {
                                claims: 1,
                                speakers: 1,
                            },
                        },
                    ),
                ],
                speakers: vec!["Ada".to_string(), "Bo".to_string()],
                counts: TreeCounts {
                    claims: 3,
                    speakers: 2,
                },
            },
        ),
    ]
}

fn sample_report() -> Report {
    Report {
        version: ARTIFACT_VERSION.to_string(),
        report_details: crate::job::ReportDetails {
            title: "Pets".to_string(),
            description: "pet opinions".to_string(),
            question: "pets?".to_string(),
            filename: "pets".to_string(),
        },
        sorted_tree: sample_tree(),
        analytics: Analytics {
            total_tokens: 100,
            total_cost: 0.25,
            total_duration_ms: 1234,
            step_analytics: BTreeMap::new(),
        },
        cruxes: None,
        prompts: Prompts {
            system_instructions: "be fair".to_string(),
            clustering_instructions: "cluster".to_string(),
            extraction_instructions: "extract".to_string(),
            dedup_instructions: "dedup".to_string(),
            summaries_instructions: "summarize".to_string(),
            crux_instructions: None,
            output_language: None,
        },
        completed_at: chrono::Utc::now(),
    }
}

#[test]
fn tree_serializes_as_name_node_pairs() {
    let value = serde_json::to_value(sample_tree()).unwrap();
    assert_eq!(value[0][0], "Pets");
    assert_eq!(value[0][1]["topics"][0][0], "Dogs");
    assert_eq!(value[0][1]["counts"]["claims"], 3);
}

#[test]
fn report_serializes_camel_case() {
    let value = serde_json::to_value(sample_report()).unwrap();
    assert_eq!(value["version"], ARTIFACT_VERSION);
    assert_eq!(value["reportDetails"]["title"], "Pets");
    assert!(value["sortedTree"].is_array());
    assert_eq!(value["analytics"]["totalTokens"], 100);
    assert!(value.get("cruxes").is_none());
    assert!(value["completedAt"].is_string());
}

#[test]
fn derive_counts_single_pass() {
    let comments = vec![
        CommentRecord {
            id: "c1".to_string(),
            text: "x".to_string(),
            speaker: Some("Ada".to_string()),
        },
        CommentRecord {
            id: "c2".to_string(),
            text: "y".to_string(),
            speaker: Some("Ada".to_string()),
        },
        CommentRecord {
            id: "c3".to_string(),
            text: "z".to_string(),
            speaker: Some(" ".to_string()),
        },
        CommentRecord {
            id: "c4".to_string(),
            text: "w".to_string(),
            speaker: None,
        },
        CommentRecord {
            id: "c5".to_string(),
            text: "v".to_string(),
            speaker: Some("Bo".to_string()),
        },
    ];
    let counts = ReportCounts::derive(&sample_tree(), &comments);
    assert_eq!(counts.topics, 1);
    assert_eq!(counts.subtopics, 2);
    assert_eq!(counts.claims, 3);
    // blank and missing speakers are not people
    assert_eq!(counts.people, 2);
}

#[test]
fn validate_accepts_consistent_report() {
    assert_eq!(sample_report().validate(), Ok(()));
}

#[test]
fn validate_rejects_version_mismatch() {
    let mut report = sample_report();
    report.version = "pipeline-worker-v0.9".to_string();
    assert!(report.validate().is_err());
}

#[test]
fn validate_rejects_count_mismatch() {
    let mut report = sample_report();
    report.sorted_tree[0].1.counts.claims = 99;
    let err = report.validate().unwrap_err();
    assert!(err.contains("Pets"), "unexpected error: {err}");
}
