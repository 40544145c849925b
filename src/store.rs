//! The store module owns the SQLite database that backs both the catalog (`Songs`) and the
//! fingerprint cache (`Caches`).
//!
//! The catalog is the source of truth for which songs we already have, so unlike a read cache it is
//! never dropped and rebuilt: the schema is only ever created if missing. Rows are never deleted
//! either; a file that disappears from disk keeps its catalog row.
use crate::error::Result;
use crate::tracks::Track;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

static SCHEMA: &str = include_str!("schema.sql");

const TRACK_COLUMNS: &str = "s.Path, s.Artist, s.Album, s.Title, s.Hash, s.Genre, s.AlbumArtist, \
     s.TrackNumber, s.TotalTracks, s.DiscNumber, s.TotalDiscs";

const UPSERT_TRACK: &str = "
    INSERT INTO Songs (Path, Artist, Album, Title, Hash, Genre, AlbumArtist, TrackNumber, TotalTracks, DiscNumber, TotalDiscs)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT (Path) DO UPDATE SET
        Artist      = excluded.Artist
      , Album       = excluded.Album
      , Title       = excluded.Title
      , Hash        = excluded.Hash
      , Genre       = excluded.Genre
      , AlbumArtist = excluded.AlbumArtist
      , TrackNumber = excluded.TrackNumber
      , TotalTracks = excluded.TotalTracks
      , DiscNumber  = excluded.DiscNumber
      , TotalDiscs  = excluded.TotalDiscs
";

const UPSERT_CACHE: &str = "
    INSERT INTO Caches (Path, Hash) VALUES (?1, ?2)
    ON CONFLICT (Path) DO UPDATE SET Hash = excluded.Hash
";

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path` and make sure both tables exist.
    pub fn open(path: &Path) -> Result<Store> {
        debug!("opening store at {}", path.display());
        Store::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Store> {
        Store::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Store> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 15000;
            ",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Store { conn })
    }

    /// Begin the single write transaction of a run.
    pub fn begin(&mut self) -> Result<StoreBatch<'_>> {
        Ok(StoreBatch {
            tx: self.conn.transaction()?,
        })
    }

    pub fn cached_hash(&self, path: &Path) -> Result<Option<String>> {
        let hash = self
            .conn
            .prepare_cached("SELECT Hash FROM Caches WHERE Path = ?1")?
            .query_row([path_key(path)], |row| row.get(0))
            .optional()?;
        Ok(hash)
    }

    pub fn cache_hash(&self, path: &Path, hash: &str) -> Result<()> {
        put_cached_hash(&self.conn, path, hash)
    }

    /// Snapshot of the whole fingerprint cache.
    pub fn cached_hashes(&self) -> Result<HashMap<PathBuf, String>> {
        let mut stmt = self.conn.prepare("SELECT Path, Hash FROM Caches")?;
        let rows = stmt.query_map([], |row| Ok((PathBuf::from(row.get::<_, String>(0)?), row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<HashMap<_, _>>>()?)
    }

    /// Insert or overwrite `tracks` atomically.
    pub fn upsert_tracks(&mut self, tracks: &[Track]) -> Result<()> {
        let batch = self.begin()?;
        batch.upsert_tracks(tracks)?;
        batch.commit()
    }

    /// Every catalog row, ordered by path.
    pub fn tracks(&self) -> Result<Vec<Track>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TRACK_COLUMNS} FROM Songs s ORDER BY s.Path"))?;
        let tracks = stmt
            .query_map([], track_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    /// Catalog rows whose hash is one of `hashes`, ordered by path.
    ///
    /// The hashes are staged in a temporary table and joined against, rather than issuing one query
    /// per hash or building an unbounded `IN (...)` list.
    pub fn tracks_by_hashes(&mut self, hashes: &[String]) -> Result<Vec<Track>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TEMP TABLE IF NOT EXISTS DesiredHashes (Hash TEXT NOT NULL PRIMARY KEY);
            DELETE FROM temp.DesiredHashes;
            ",
        )?;
        {
            let mut insert = tx.prepare_cached("INSERT OR IGNORE INTO temp.DesiredHashes (Hash) VALUES (?1)")?;
            for hash in hashes {
                insert.execute([hash])?;
            }
        }
        let tracks = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {TRACK_COLUMNS} FROM Songs s
                 INNER JOIN temp.DesiredHashes dh ON dh.Hash = s.Hash
                 ORDER BY s.Path"
            ))?;
            let rows = stmt.query_map([], track_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.execute_batch("DELETE FROM temp.DesiredHashes")?;
        tx.commit()?;
        Ok(tracks)
    }

    /// The distinct hashes of everything in the catalog.
    pub fn known_hashes(&self) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT Hash FROM Songs WHERE Hash IS NOT NULL")?;
        let hashes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(hashes)
    }
}

/// A write transaction on the store. Dropping it without calling [`StoreBatch::commit`] rolls back
/// every write made through it.
pub struct StoreBatch<'a> {
    tx: Transaction<'a>,
}

impl StoreBatch<'_> {
    pub fn cache_hash(&self, path: &Path, hash: &str) -> Result<()> {
        put_cached_hash(&self.tx, path, hash)
    }

    pub fn upsert_tracks(&self, tracks: &[Track]) -> Result<()> {
        let mut stmt = self.tx.prepare_cached(UPSERT_TRACK)?;
        for t in tracks {
            stmt.execute(params![
                path_key(&t.path),
                t.artist,
                t.album,
                t.title,
                t.hash,
                t.genre,
                t.album_artist,
                t.track_number,
                t.total_tracks,
                t.disc_number,
                t.total_discs,
            ])?;
        }
        debug!("upserted {} tracks", tracks.len());
        Ok(())
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

fn put_cached_hash(conn: &Connection, path: &Path, hash: &str) -> Result<()> {
    conn.prepare_cached(UPSERT_CACHE)?
        .execute(params![path_key(path), hash])?;
    Ok(())
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn track_from_row(row: &Row) -> rusqlite::Result<Track> {
    Ok(Track {
        path: PathBuf::from(row.get::<_, String>(0)?),
        artist: row.get(1)?,
        album: row.get(2)?,
        title: row.get(3)?,
        hash: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        genre: row.get(5)?,
        album_artist: row.get(6)?,
        track_number: row.get(7)?,
        total_tracks: row.get(8)?,
        disc_number: row.get(9)?,
        total_discs: row.get(10)?,
    })
}
