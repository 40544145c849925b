//! The commands module implements the user-facing subcommands on top of the pipeline. Output goes to
//! the writer the caller hands in, so the binary passes stdout and tests pass a buffer.
use crate::config::{FindNewOptions, RecordOptions};
use crate::error::{Result, SmartExpectedError};
use crate::files::find_audio_files;
use crate::fingerprint::hash_file;
use crate::pipeline::{self, FindNewReport, FindNewSettings, RecordSettings, RecordSummary};
use crate::progress::ProgressFactory;
use crate::store::Store;
use crate::tracks::TagReader;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Print the content hash of each file, as `"<path>": <hash>`. Directories are expanded to the
/// audio files they contain. Stops at the first file that cannot be hashed.
pub fn sum(out: &mut impl Write, paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        if path.is_dir() {
            let mut files = find_audio_files(path)?;
            files.sort();
            debug!("expanded {} to {} audio files", path.display(), files.len());
            for file in &files {
                print_sum(out, file)?;
            }
        } else {
            print_sum(out, path)?;
        }
    }
    Ok(())
}

fn print_sum(out: &mut impl Write, path: &Path) -> Result<()> {
    let hash = hash_file(path)?;
    writeln!(out, "{:?}: {}", path, hash)?;
    Ok(())
}

pub fn record(
    out: &mut impl Write,
    options: RecordOptions,
    reader: &dyn TagReader,
    progress: &dyn ProgressFactory,
) -> Result<RecordSummary> {
    validate(&options.directory, options.dop)?;
    let mut store = Store::open(&options.db_path)?;
    let summary = pipeline::record(
        &mut store,
        &options.directory,
        RecordSettings {
            reparse: options.reparse,
            dop: options.dop,
        },
        reader,
        progress,
    )?;
    writeln!(
        out,
        "({} songs recorded, {} reused, {} skipped)",
        summary.recorded, summary.reused, summary.skipped
    )?;
    Ok(summary)
}

pub fn find_new(
    out: &mut impl Write,
    options: FindNewOptions,
    progress: &dyn ProgressFactory,
) -> Result<FindNewReport> {
    validate(&options.directory, options.dop)?;
    let mut store = Store::open(&options.db_path)?;
    let report = pipeline::find_new(
        &mut store,
        &options.directory,
        FindNewSettings {
            rehash: options.rehash,
            dop: options.dop,
        },
        progress,
    )?;

    if options.folders_only {
        let folders: BTreeSet<&Path> = report.new_files.iter().filter_map(|p| p.parent()).collect();
        for folder in folders {
            writeln!(out, "{}", folder.display())?;
        }
    } else {
        for file in &report.new_files {
            writeln!(out, "{}", file.display())?;
        }
    }
    writeln!(out, "({} new songs)", report.new_files.len())?;
    Ok(report)
}

/// Reject bad input before the database is opened, so a typo never creates an empty catalog.
fn validate(directory: &Path, dop: usize) -> Result<()> {
    if dop == 0 {
        return Err(SmartExpectedError::InvalidParallelism { dop }.into());
    }
    if !directory.is_dir() {
        return Err(SmartExpectedError::NotADirectory {
            path: directory.to_path_buf(),
        }
        .into());
    }
    Ok(())
}
