//! Integration tests for the mapping engine
//!
//! Exercises complete runs: configuration parsing, source merging, pipeline
//! placement, the external transform step and output finalisation.


use datamorph_core::{MappingConfig, MappingEngine, SourcePayloads};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use test_support::*;

async fn run(config: Value, payloads: &SourcePayloads) -> Value {
    MappingEngine::new().execute_json(config, payloads).await
}

#[tokio::test]
async fn test_single_source_with_transform_conditional_and_fallback() {
    let config = json!({
        "sourceSelection": {"sources": [{"id": "shop", "name": "Shop", "primaryPath": "products"}]},
        "fieldMappings": [
            {"targetPath": "name", "sourcePath": "title", "transformId": "upper"},
            {"targetPath": "price.amount", "sourcePath": "cost", "transformId": "two-dp"},
            {"targetPath": "stock", "sourcePath": "qty", "fallbackValue": -1},
            {"targetPath": "badge", "sourcePath": "title",
             "conditional": {"when": "qty", "operator": "greater_than", "value": 0, "then": "in stock", "else": "sold out"}},
            {"targetPath": "firstTag", "sourcePath": "tags[0]"}
        ],
        "transformations": [
            {"id": "upper", "type": "uppercase", "config": {}},
            {"id": "two-dp", "type": "round", "config": {"precision": 2}}
        ]
    });
    let payloads = SourcePayloads::from([(
        "shop".to_string(),
        json!({"products": [
            {"title": "lamp", "cost": 12.346, "qty": 0, "tags": ["home", "light"]},
            {"title": "desk", "cost": "99.999", "qty": 4}
        ]}),
    )]);

    let output = run(config, &payloads).await;

    assert_eq!(
        output,
        json!([
            {"name": "LAMP", "price": {"amount": 12.35}, "stock": 0, "badge": "sold out", "firstTag": "home"},
            {"name": "DESK", "price": {"amount": 100}, "stock": 4, "badge": "in stock", "firstTag": null}
        ])
    );
}

#[tokio::test]
async fn test_combined_merge_uses_each_sources_mapping() {
    let output = run(news_config("combined"), &news_payloads()).await;

    assert_eq!(column(&output, "title"), vec!["A0", "A1", "B0", "B1", "B2"]);
    assert_eq!(
        column(&output, "origin"),
        vec!["Alpha Wire", "Alpha Wire", "Beta Feed", "Beta Feed", "Beta Feed"]
    );
}

#[tokio::test]
async fn test_combined_merge_strategies() {
    let mut config = news_config("combined");
    config["fieldMappings"]
        .as_array_mut()
        .unwrap()
        .push(json!({"targetPath": "date", "sourcePath": "date"}));

    config["sourceSelection"]["mergeStrategy"] = json!("interleaved");
    let interleaved = run(config.clone(), &news_payloads()).await;
    assert_eq!(column(&interleaved, "title"), vec!["A0", "B0", "A1", "B1", "B2"]);

    config["sourceSelection"]["mergeStrategy"] = json!("chronological");
    let chronological = run(config.clone(), &news_payloads()).await;
    assert_eq!(column(&chronological, "title"), vec!["B0", "A0", "B2", "A1", "B1"]);

    config["sourceSelection"]["mergeStrategy"] = json!("priority");
    let priority = run(config, &news_payloads()).await;
    assert_eq!(column(&priority, "title"), vec!["A0", "A1", "B0", "B1", "B2"]);
}

#[tokio::test]
async fn test_separate_mode_drops_sourceless_mappings() {
    let output = run(news_config("separate"), &news_payloads()).await;

    assert_eq!(
        output,
        json!({
            "Alpha Wire": [{"title": "A0"}, {"title": "A1"}],
            "Beta Feed": [{"title": "B0"}, {"title": "B1"}, {"title": "B2"}]
        })
    );
}

#[tokio::test]
async fn test_unset_merge_mode_with_many_sources_is_separate() {
    let mut config = news_config("combined");
    config["sourceSelection"]
        .as_object_mut()
        .unwrap()
        .remove("mergeMode");
    let output = run(config, &news_payloads()).await;
    assert!(output.is_object());
    assert_eq!(output.as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn test_wrapper_and_template() {
    let mut config = news_config("combined");
    config["outputWrapper"] = json!({
        "enabled": true,
        "wrapperKey": "articles",
        "includeCount": true,
        "includeSource": true,
        "includeSourceCounts": true,
        "includeVersion": true,
        "includeTimestamp": true
    });
    config["outputTemplate"] = json!({"feed": "{{data}}", "summary": "{{count}} articles"});

    let output = run(config, &news_payloads()).await;

    let feed = &output["feed"];
    assert_eq!(feed["articles"].as_array().unwrap().len(), 5);
    assert_eq!(feed["metadata"]["count"], json!(5));
    assert_eq!(feed["metadata"]["sourceCounts"], json!({"A": 2, "B": 3}));
    assert_eq!(feed["metadata"]["sources"][1]["type"], json!("rss"));
    assert_eq!(feed["metadata"]["version"], json!("1.0"));
    assert!(feed["metadata"]["timestamp"].is_string());
    assert_eq!(output["summary"], json!("5 articles"));
}

#[tokio::test]
async fn test_configuration_errors_are_structured() {
    let no_sources = run(json!({"fieldMappings": [{"targetPath": "a", "sourcePath": "a"}]}), &SourcePayloads::new()).await;
    assert_eq!(no_sources["kind"], json!("configuration"));
    assert!(no_sources["error"].as_str().unwrap().contains("No sources"));

    let mut blank_key = news_config("combined");
    blank_key["outputWrapper"] = json!({"enabled": true, "wrapperKey": ""});
    let output = run(blank_key, &news_payloads()).await;
    assert_eq!(output["field"], json!("outputWrapper.wrapperKey"));
}

#[tokio::test]
async fn test_pipeline_before_and_after_mapping() {
    let mut config = news_config("combined");
    config["transformations"] = json!([
        {"id": "top", "type": "limit", "config": {"count": 1}}
    ]);

    let after = run(config.clone(), &news_payloads()).await;
    assert_eq!(column(&after, "title"), vec!["A0"]);

    config["pipelineStage"] = json!("before");
    let before = run(config, &news_payloads()).await;
    assert_eq!(column(&before, "title"), vec!["A0", "B0"]);
}

#[tokio::test]
async fn test_faulty_pipeline_step_keeps_previous_value() {
    let mut config = news_config("combined");
    config["transformations"] = json!([
        {"id": "broken", "type": "sum", "config": {}},
        {"id": "mystery", "type": "reticulate", "config": {}},
        {"id": "sorted", "type": "sort", "config": {"field": "title", "order": "desc"}}
    ]);

    let output = run(config, &news_payloads()).await;
    assert_eq!(column(&output, "title"), vec!["B2", "B1", "B0", "A1", "A0"]);
}

#[tokio::test]
async fn test_ai_transform_respects_cap() {
    let client = Arc::new(CountingTransform::default());
    let engine = MappingEngine::new().with_external_transform(client.clone());

    let config = MappingConfig::from_value(json!({
        "sourceSelection": {"sources": [{"id": "posts"}]},
        "fieldMappings": [{"targetPath": "body", "sourcePath": "text"}],
        "transformations": [
            {"id": "summarise", "type": "ai-transform",
             "config": {"field": "body", "targetField": "summary", "prompt": "Summarise", "maxItems": 2, "batchDelayMs": 0}}
        ]
    }))
    .unwrap();
    let payloads = SourcePayloads::from([(
        "posts".to_string(),
        json!([{"text": "one"}, {"text": "three"}, {"text": "x"}, {"text": "y"}, {"text": "z"}]),
    )]);

    let output = engine.execute(&config, &payloads).await;

    assert_eq!(client.call_count(), 2);
    assert_eq!(
        output,
        json!([
            {"body": "one", "summary": "3 chars"},
            {"body": "three", "summary": "5 chars"},
            {"body": "x"},
            {"body": "y"},
            {"body": "z"}
        ])
    );
}

#[tokio::test(start_paused = true)]
async fn test_fetch_and_execute_tolerates_failing_sources() {
    let config = MappingConfig::from_value(news_config("combined")).unwrap();
    let fetcher = MemoryFetcher::new().with(
        "A",
        json!({"data": {"articles": [{"headline": "only A"}]}}),
    );

    let engine = MappingEngine::new().with_fetch_timeout(Duration::from_secs(2));
    let output = engine.fetch_and_execute(&config, &fetcher).await;
    assert_eq!(column(&output, "title"), vec!["only A"]);

    let slow = MemoryFetcher::new()
        .with("A", json!({"data": {"articles": [{"headline": "fast"}]}}))
        .with_slow("B", json!({"channel": {"item": [{"name": "late"}]}}));
    let output = engine.fetch_and_execute(&config, &slow).await;
    assert_eq!(column(&output, "title"), vec!["fast"]);
}

#[tokio::test]
async fn test_validation_report_is_independent() {
    let mut config = news_config("separate");
    config["fieldMappings"]
        .as_array_mut()
        .unwrap()
        .push(json!({"targetPath": "extra", "sourcePath": "x", "sourceId": "Z"}));
    config["targetFields"] = json!({"required": ["title", "link"], "optional": ["origin", "image"]});
    let config = MappingConfig::from_value(config).unwrap();

    let report = MappingEngine::new().validate(&config);
    assert!(!report.valid);
    assert_eq!(report.unmapped_required, vec!["link".to_string()]);
    assert_eq!(report.unmapped_optional, vec!["image".to_string()]);
    assert_eq!(report.unknown_source_ids, vec!["Z".to_string()]);
    assert!(report.warnings.iter().any(|w| w.contains("separate mode")));
}
