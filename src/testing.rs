use crate::progress::{ProgressFactory, ProgressReporter};
use crate::tracks::{TagReader, TrackTags};
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tempfile::TempDir;

static INIT: Once = Once::new();

pub fn init() -> TempDir {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    });
    TempDir::new().expect("failed to create temp dir")
}

/// Deterministic fake audio bytes. Every byte has its high bit set, so the buffer never contains
/// an ASCII `ID3` or `TAG` marker by accident.
pub fn payload(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| ((i as u32).wrapping_mul(31).wrapping_add(seed as u32 * 17) % 128) as u8 | 0x80)
        .collect()
}

/// An ID3v2.4 header announcing `body_len` bytes of frames, followed by that many zero bytes.
pub fn id3v2_block(body_len: usize, with_footer: bool) -> Vec<u8> {
    assert!(body_len < 128 * 128 * 128 * 128);
    let mut block = b"ID3".to_vec();
    block.extend_from_slice(&[4, 0, if with_footer { 0x10 } else { 0 }]);
    block.extend_from_slice(&[
        ((body_len >> 21) & 0x7f) as u8,
        ((body_len >> 14) & 0x7f) as u8,
        ((body_len >> 7) & 0x7f) as u8,
        (body_len & 0x7f) as u8,
    ]);
    if with_footer {
        // Header-only size for a footer-flagged tag counts the 10 footer bytes too.
        block.extend_from_slice(&[0u8; 10]);
    }
    block.extend(std::iter::repeat(0u8).take(body_len));
    block
}

/// A 128-byte ID3v1 trailer carrying `title`.
pub fn id3v1_block(title: &str) -> Vec<u8> {
    let mut block = vec![0u8; 128];
    block[..3].copy_from_slice(b"TAG");
    let title = title.as_bytes();
    let n = title.len().min(30);
    block[3..3 + n].copy_from_slice(&title[..n]);
    block
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create parent dir");
    }
    fs::write(&path, bytes).expect("failed to write file");
    path
}

/// Five files: three distinct payloads, plus two copies of the first payload wrapped in different
/// tags.
pub fn seeded_library(dir: &Path) -> Vec<PathBuf> {
    let first = payload(1, 4096);
    let mut retagged = id3v2_block(300, false);
    retagged.extend_from_slice(&first);
    let mut with_trailer = first.clone();
    with_trailer.extend_from_slice(&id3v1_block("Spring Chicken"));

    vec![
        write_file(dir, "a/first.mp3", &first),
        write_file(dir, "a/second.mp3", &payload(2, 2048)),
        write_file(dir, "b/third.MP3", &payload(3, 8192)),
        write_file(dir, "b/first-retagged.mp3", &retagged),
        write_file(dir, "c/first-with-id3v1.mp3", &with_trailer),
    ]
}

/// Tag reader that hands back the file stem as the title and counts calls.
#[derive(Default)]
pub struct StubTagReader {
    pub calls: AtomicUsize,
}

impl TagReader for StubTagReader {
    fn read_tags(&self, path: &Path) -> Result<TrackTags> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TrackTags {
            title: path.file_stem().map(|s| s.to_string_lossy().into_owned()),
            artist: Some("Bryan Teoh".to_string()),
            track_number: Some(1),
            ..TrackTags::default()
        })
    }
}

/// Progress factory whose reporters all add into one shared counter.
#[derive(Default, Clone)]
pub struct CountingProgress {
    pub advanced: Arc<AtomicU64>,
    pub started: Arc<AtomicUsize>,
}

struct CountingReporter {
    advanced: Arc<AtomicU64>,
}

impl ProgressReporter for CountingReporter {
    fn advance(&self, n: u64) {
        self.advanced.fetch_add(n, Ordering::SeqCst);
    }
}

impl ProgressFactory for CountingProgress {
    fn start(&self, _total: u64, _description: &str) -> Box<dyn ProgressReporter> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingReporter {
            advanced: Arc::clone(&self.advanced),
        })
    }
}
