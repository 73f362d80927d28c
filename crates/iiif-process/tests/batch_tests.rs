//! Batch runner Tests
//!
//! Sequential processing of several sources and per-source report writes.

use iiif_cache::{Cache, CacheConfig};
use iiif_process::prelude::*;
use iiif_process::{Dimensions, ProcessManifest};
use iiif_test_utils::{
    avocado_instructions, init_tracing, label, FailingCache, FakeDriver, FakePalette,
    FakeProcessor, AVOCADO_DIMENSIONS,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const BANANA: Dimensions = Dimensions {
    width: 800,
    height: 600,
};

fn sources() -> Vec<Uri> {
    vec![
        Uri::parse("avocado.png").unwrap(),
        Uri::parse("banana.png").unwrap(),
    ]
}

fn options_with(config: ProcessConfig) -> BatchOptions {
    BatchOptions::new(
        Arc::new(config),
        Arc::new(FakeDriver::avocado().with_image("banana.png", BANANA)),
        Arc::new(FakeProcessor::avocado().with_source("banana.png", BANANA)),
        Arc::new(FakePalette::new()),
        Arc::new(avocado_instructions()),
    )
}

fn options() -> BatchOptions {
    options_with(ProcessConfig::new())
}

fn decode(body: &[u8]) -> ProcessManifest {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_single_source_report_shape() {
    init_tracing();
    let report = process_many(&options(), &sources()[..1]).await;

    let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(
        value,
        json!({"avocado.png": {
            "uris": {
                "o": "avocado.png/full/full/-1/color.jpg",
                "b": "avocado.png/full/!2048,1536/0/color.jpg",
                "d": "avocado.png/-1,-1,320,320/full/0/dither.jpg"
            },
            "dimensions": {"o": [4032, 3024], "b": [2048, 1536], "d": [320, 320]}
        }})
    );
}

#[tokio::test]
async fn test_sources_get_independent_manifests() {
    let report = process_many(&options(), &sources()).await;

    assert_eq!(report.len(), 2);
    let avocado = report.get("avocado.png").unwrap();
    let banana = report.get("banana.png").unwrap();

    assert_eq!(
        avocado.dimensions[&label("o")],
        [AVOCADO_DIMENSIONS.width, AVOCADO_DIMENSIONS.height]
    );
    assert_eq!(banana.dimensions[&label("o")], [800, 600]);
    assert_eq!(
        banana.uris[&label("d")],
        "banana.png/-1,-1,320,320/full/0/dither.jpg"
    );
    assert!(report.failed_reports().is_empty());
}

#[tokio::test]
async fn test_empty_batch() {
    let sink = Arc::new(FailingCache::new());
    let options = options().with_reporting(Reporting::new(sink.clone()));

    let report = process_many(&options, &[]).await;

    assert!(report.is_empty());
    assert_eq!(report.to_json().unwrap(), "{}");
    assert!(sink.writes().is_empty());
}

#[tokio::test]
async fn test_reporting_writes_once_per_source() {
    let sink = Arc::new(FailingCache::new());
    let options = options().with_reporting(Reporting::new(sink.clone()));

    let report = process_many(&options, &sources()).await;

    let mut writes = sink.writes();
    writes.sort();
    assert_eq!(
        writes,
        vec![
            "avocado.png/process.json".to_string(),
            "banana.png/process.json".to_string()
        ]
    );

    for (origin, manifest) in report.iter() {
        let stored = decode(&sink.get(&format!("{origin}/process.json")).await.unwrap());
        assert_eq!(stored.uris, manifest.uris);
        assert_eq!(stored.dimensions, manifest.dimensions);
    }
}

#[tokio::test]
async fn test_failed_report_write_is_isolated() {
    let sink = Arc::new(FailingCache::new().failing_on("avocado.png/process.json"));
    let options = options().with_reporting(Reporting::new(sink.clone()));

    let report = process_many(&options, &sources()).await;

    assert_eq!(report.len(), 2);
    assert_eq!(report.get("avocado.png").unwrap().uris.len(), 3);
    assert_eq!(report.get("banana.png").unwrap().uris.len(), 3);
    assert_eq!(report.failed_reports(), ["avocado.png/process.json".to_string()]);

    assert!(!sink.exists("avocado.png/process.json").await);
    assert!(sink.exists("banana.png/process.json").await);
}

#[tokio::test]
async fn test_custom_report_name() {
    let sink = Arc::new(FailingCache::new());
    let options =
        options().with_reporting(Reporting::new(sink.clone()).with_name("derivatives.json"));

    process_many(&options, &sources()[..1]).await;

    assert_eq!(sink.writes(), vec!["avocado.png/derivatives.json".to_string()]);
}

#[tokio::test]
async fn test_duplicate_origin_keeps_one_entry() {
    let sources = vec![
        Uri::parse("avocado.png").unwrap(),
        Uri::parse("file:///avocado.png").unwrap(),
    ];

    let report = process_many(&options(), &sources).await;

    assert_eq!(report.len(), 1);
    assert!(report.get("avocado.png").is_some());
}

#[tokio::test]
async fn test_duplicate_origin_persists_later_manifest() {
    let sink = Arc::new(FailingCache::new().with_slow_first_write(Duration::from_millis(100)));
    let options = options().with_reporting(Reporting::new(sink.clone()));
    let sources = vec![
        Uri::parse("idsecret:///avocado.png?id=1234&secret=s3cr3t&secret_o=0r1g").unwrap(),
        Uri::parse("avocado.png").unwrap(),
    ];

    let report = process_many(&options, &sources).await;

    let kept = report.get("avocado.png").unwrap();
    assert_eq!(kept.uris[&label("o")], "avocado.png/full/full/-1/color.jpg");
    assert_eq!(
        sink.writes(),
        vec![
            "avocado.png/process.json".to_string(),
            "avocado.png/process.json".to_string()
        ]
    );
    assert!(report.failed_reports().is_empty());

    let stored = decode(&sink.get("avocado.png/process.json").await.unwrap());
    assert_eq!(stored.uris, kept.uris);
}

#[tokio::test]
async fn test_from_config_without_reporting() {
    let options = BatchOptions::from_config(
        Arc::new(ProcessConfig::new()),
        Arc::new(FakeDriver::avocado()),
        Arc::new(FakeProcessor::avocado()),
        Arc::new(FakePalette::new()),
        Arc::new(avocado_instructions()),
    )
    .unwrap();

    assert!(options.reporting().is_none());
}

#[tokio::test]
async fn test_from_config_rejects_disk_report_without_path() {
    let config = ProcessConfig::new()
        .with_report(true)
        .with_derivatives_cache(CacheConfig::named("disk"));

    let result = BatchOptions::from_config(
        Arc::new(config),
        Arc::new(FakeDriver::avocado()),
        Arc::new(FakeProcessor::avocado()),
        Arc::new(FakePalette::new()),
        Arc::new(avocado_instructions()),
    );

    assert!(matches!(result, Err(ProcessError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_reports_land_in_disk_cache() {
    let dir = tempfile::tempdir().unwrap();
    let config = ProcessConfig::new()
        .with_palette()
        .with_report(true)
        .with_derivatives_cache(CacheConfig::disk(dir.path()));

    let options = BatchOptions::from_config(
        Arc::new(config),
        Arc::new(FakeDriver::avocado().with_image("banana.png", BANANA)),
        Arc::new(FakeProcessor::avocado().with_source("banana.png", BANANA)),
        Arc::new(FakePalette::new()),
        Arc::new(avocado_instructions()),
    )
    .unwrap();
    assert_eq!(options.reporting().unwrap().name(), "process.json");

    let report = process_many(&options, &sources()).await;
    assert!(report.failed_reports().is_empty());

    for origin in ["avocado.png", "banana.png"] {
        let body = tokio::fs::read(dir.path().join(origin).join("process.json"))
            .await
            .unwrap();
        let stored = decode(&body);
        assert_eq!(stored.uris, report.get(origin).unwrap().uris);
        assert!(stored.palette.is_some());
    }
}
