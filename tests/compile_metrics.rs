use std::{collections::HashSet, fs};

use axum::http::{
    HeaderMap,
    header::{ETAG, IF_NONE_MATCH},
};
use metrics_util::debugging::DebuggingRecorder;
use stylecache::{application::CacheCompiler, infra::telemetry};
use tempfile::tempdir;

#[test]
fn compile_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("a.css"), "a { top : 0 }").expect("write");
    fs::create_dir(dir.path().join("broken.css")).expect("mkdir");

    let compiler = CacheCompiler::new(dir.path()).expect("compiler");
    compiler.process(&HeaderMap::new()).expect("regenerate");
    let fresh = compiler.process(&HeaderMap::new()).expect("cache hit");

    let mut conditional = HeaderMap::new();
    let etag = fresh.headers()[ETAG].clone();
    conditional.insert(IF_NONE_MATCH, etag);
    let not_modified = compiler.process(&conditional).expect("conditional");
    assert!(not_modified.is_not_modified());

    let keys: HashSet<(String, Vec<String>)> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| {
            let key = composite_key.key();
            let labels = key
                .labels()
                .map(|label| format!("{}={}", label.key(), label.value()))
                .collect();
            (key.name().to_string(), labels)
        })
        .collect();

    for expected in [
        ("stylecache_compile_total", vec!["outcome=stale"]),
        ("stylecache_compile_total", vec!["outcome=hit"]),
        ("stylecache_not_modified_total", vec![]),
        ("stylecache_skipped_file_total", vec![]),
    ] {
        let expected = (
            expected.0.to_string(),
            expected.1.into_iter().map(String::from).collect(),
        );
        assert!(keys.contains(&expected), "missing metric {expected:?}");
    }
}
