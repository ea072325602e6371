//! Tests for the subprocess-backed acquisition and trim backends, using
//! mock shell scripts in place of the real wrapper and ffmpeg.

#![cfg(unix)]

mod common;

use common::{test_store, write_script};
use dialtone_media::{
    CommandSource, FfmpegTrimmer, MediaError, MediaSource, Reslicer, SearchScope, Trimmer,
};
use std::sync::Arc;
use std::time::Duration;

const MOCK_FETCH: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/fetch-args.log"
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
head -c 4096 /dev/zero > "$out"
echo ""
echo "Mock Artist - Mock Song"
"#;

const MOCK_TRIM: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/trim-args.log"
for last; do :; done
head -c 4096 /dev/zero > "$last"
"#;

#[tokio::test]
async fn command_source_passes_duration_filter_only_when_filtered() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "fetch.sh", MOCK_FETCH);
    let source = CommandSource::new(&script, 600, Duration::from_secs(10));

    let first = dir.path().join("first.mp3");
    let title = source
        .fetch("kind of blue", SearchScope::Filtered, &first)
        .await
        .expect("filtered fetch should succeed");
    assert_eq!(title.as_deref(), Some("Mock Artist - Mock Song"));
    assert_eq!(std::fs::metadata(&first).unwrap().len(), 4096);

    let second = dir.path().join("second.mp3");
    source
        .fetch("kind of blue", SearchScope::Broad, &second)
        .await
        .expect("broad fetch should succeed");

    let log = std::fs::read_to_string(dir.path().join("fetch-args.log")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("--query kind of blue"));
    assert!(lines[0].contains("--max-duration 600"));
    assert!(!lines[1].contains("--max-duration"));
}

#[tokio::test]
async fn command_source_reports_stderr_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "fail.sh",
        "#!/bin/sh\necho 'no results for query' >&2\nexit 3\n",
    );
    let source = CommandSource::new(&script, 600, Duration::from_secs(10));

    let result = source
        .fetch("nothing", SearchScope::Broad, &dir.path().join("x.mp3"))
        .await;
    match result {
        Err(MediaError::Fetch(msg)) => assert!(msg.contains("no results for query")),
        other => panic!("expected fetch error, got {:?}", other),
    }
}

#[tokio::test]
async fn command_source_rejects_empty_query_without_spawning() {
    let source = CommandSource::new("/nonexistent/fetch", 600, Duration::from_secs(1));
    let result = source
        .fetch("   ", SearchScope::Filtered, std::path::Path::new("/tmp/unused.mp3"))
        .await;
    assert!(matches!(result, Err(MediaError::Fetch(msg)) if msg.contains("empty")));
}

#[tokio::test]
async fn command_source_times_out_slow_backends() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "slow.sh", "#!/bin/sh\nsleep 5\n");
    let source = CommandSource::new(&script, 600, Duration::from_millis(200));

    let result = source
        .fetch("slow", SearchScope::Filtered, &dir.path().join("slow.mp3"))
        .await;
    assert!(matches!(result, Err(MediaError::Fetch(msg)) if msg.contains("timed out")));
}

#[tokio::test]
async fn ffmpeg_trimmer_seeks_to_offset() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "ffmpeg.sh", MOCK_TRIM);
    let trimmer = FfmpegTrimmer::new(&script, Duration::from_secs(10));

    let source = dir.path().join("source.mp3");
    std::fs::write(&source, [0u8; 8192]).unwrap();
    let output = dir.path().join("out.mp3");

    trimmer
        .trim(&source, 20.0, &output)
        .await
        .expect("trim should succeed");

    let log = std::fs::read_to_string(dir.path().join("trim-args.log")).unwrap();
    assert!(log.contains("-ss 20.000"));
    assert!(log.contains(&format!("-i {}", source.display())));
    assert!(output.exists());
}

#[tokio::test]
async fn ffmpeg_trimmer_rejects_missing_source_and_bad_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let trimmer = FfmpegTrimmer::new("ffmpeg", Duration::from_secs(10));
    let output = dir.path().join("out.mp3");

    let missing = trimmer
        .trim(&dir.path().join("gone.mp3"), 1.0, &output)
        .await;
    assert!(matches!(missing, Err(MediaError::Missing(_))));

    let source = dir.path().join("source.mp3");
    std::fs::write(&source, [0u8; 16]).unwrap();
    let negative = trimmer.trim(&source, -1.0, &output).await;
    assert!(matches!(negative, Err(MediaError::Trim(_))));
}

#[tokio::test]
async fn reslicer_serves_new_file_under_new_url() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "ffmpeg.sh", MOCK_TRIM);
    let store = test_store(dir.path());
    let reslicer = Reslicer::new(
        store,
        Arc::new(FfmpegTrimmer::new(&script, Duration::from_secs(10))),
    );

    let source = dir.path().join("original.mp3");
    std::fs::write(&source, [0u8; 8192]).unwrap();

    let a = reslicer.slice_from(&source, 12.5).await.expect("slice a");
    let b = reslicer.slice_from(&source, 12.5).await.expect("slice b");

    assert_ne!(a.url, b.url);
    assert!(a.url.starts_with("https://ivr.test/media/"));
    assert!(a.path.exists());
    assert!(source.exists(), "original must be kept for later slices");
}

#[tokio::test]
async fn reslicer_rejects_empty_output() {
    let dir = tempfile::tempdir().unwrap();
    // Offset past the end: ffmpeg succeeds but writes almost nothing.
    let script = write_script(
        dir.path(),
        "ffmpeg.sh",
        "#!/bin/sh\nfor last; do :; done\n: > \"$last\"\n",
    );
    let reslicer = Reslicer::new(
        test_store(dir.path()),
        Arc::new(FfmpegTrimmer::new(&script, Duration::from_secs(10))),
    );
    let source = dir.path().join("original.mp3");
    std::fs::write(&source, [0u8; 8192]).unwrap();

    let result = reslicer.slice_from(&source, 9_999.0).await;
    assert!(matches!(result, Err(MediaError::TooSmall { bytes: 0, .. })));

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name() != "original.mp3" && e.file_name() != "ffmpeg.sh")
        .collect();
    assert!(leftovers.is_empty(), "failed slice should be cleaned up");
}
