//! The tracks module holds the catalog record for a single file and the tag-reading collaborator
//! that fills in its descriptive fields.
use crate::error::{Result, SmartError};
use crate::fingerprint;
use id3::TagLike;
use lofty::prelude::{Accessor, ItemKey, TaggedFileExt};
use lofty::probe::Probe;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One row of the catalog. `path` is the primary key; `hash` only covers the audio payload, so two
/// tracks with identical audio share a hash whatever their tags say.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Track {
    pub path: PathBuf,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub genre: Option<String>,
    pub album_artist: Option<String>,
    pub track_number: Option<u32>,
    pub total_tracks: Option<u32>,
    pub disc_number: Option<u32>,
    pub total_discs: Option<u32>,
    pub hash: String,
}

/// The descriptive half of a [`Track`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub genre: Option<String>,
    pub album_artist: Option<String>,
    pub track_number: Option<u32>,
    pub total_tracks: Option<u32>,
    pub disc_number: Option<u32>,
    pub total_discs: Option<u32>,
}

impl Track {
    pub fn new(path: PathBuf, tags: TrackTags, hash: String) -> Track {
        Track {
            path,
            artist: tags.artist,
            album: tags.album,
            title: tags.title,
            genre: tags.genre,
            album_artist: tags.album_artist,
            track_number: tags.track_number,
            total_tracks: tags.total_tracks,
            disc_number: tags.disc_number,
            total_discs: tags.total_discs,
            hash,
        }
    }
}

/// Extracts descriptive fields from an audio file. Shared by every scan worker.
pub trait TagReader: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<TrackTags>;
}

/// Reads ID3v2 frames with `id3`, and falls back to `lofty` for files without an ID3v2 tag (ID3v1
/// trailers, APE tags).
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTagReader;

impl TagReader for FileTagReader {
    fn read_tags(&self, path: &Path) -> Result<TrackTags> {
        match id3::Tag::read_from_path(path) {
            Ok(tag) => Ok(tags_from_id3(&tag)),
            Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => read_tags_with_lofty(path),
            Err(e) => Err(e.into()),
        }
    }
}

fn tags_from_id3(tag: &id3::Tag) -> TrackTags {
    TrackTags {
        artist: tag.artist().map(String::from),
        album: tag.album().map(String::from),
        title: tag.title().map(String::from),
        genre: tag.genre().map(String::from),
        album_artist: tag.album_artist().map(String::from),
        track_number: tag.track(),
        total_tracks: tag.total_tracks(),
        disc_number: tag.disc(),
        total_discs: tag.total_discs(),
    }
}

fn read_tags_with_lofty(path: &Path) -> Result<TrackTags> {
    let tagged_file = Probe::open(path)?.read()?;
    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return Ok(TrackTags::default());
    };
    Ok(TrackTags {
        artist: tag.artist().map(|s| s.into_owned()),
        album: tag.album().map(|s| s.into_owned()),
        title: tag.title().map(|s| s.into_owned()),
        genre: tag.genre().map(|s| s.into_owned()),
        album_artist: tag.get_string(&ItemKey::AlbumArtist).map(String::from),
        track_number: tag.track(),
        total_tracks: tag.track_total(),
        disc_number: tag.disk(),
        total_discs: tag.disk_total(),
    })
}

/// Read, hash and tag-parse one file.
///
/// The hash comes from the raw bytes and is computed first. A file whose tags cannot be read still
/// yields a track, with empty descriptive fields; a file that cannot be hashed is an error.
pub fn parse_track(path: &Path, reader: &dyn TagReader) -> Result<Track> {
    let bytes = fs::read(path).map_err(|source| SmartError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let hash = fingerprint::hash_bytes(&bytes)?;
    drop(bytes);

    let tags = match reader.read_tags(path) {
        Ok(tags) => tags,
        Err(e) => {
            debug!("could not read tags of {}, recording without them: {}", path.display(), e);
            TrackTags::default()
        }
    };
    Ok(Track::new(path.to_path_buf(), tags, hash))
}
