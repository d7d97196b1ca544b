//! On-disk layout of a cabinet's backing location.
//!
//! Every function here is synchronous; the cabinet runs them on the blocking
//! thread pool.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use cabinet_catalog::DatasetRecord;
use cabinet_store::Table;
use cabinet_types::{CabinetId, Ticket};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{CabinetError, CabinetResult};

pub const MANIFEST_FILE: &str = "cabinet.toml";
pub const RECORDS_DIR: &str = "records";
pub const RECORD_FILE: &str = "record.json";
pub const PAYLOAD_FILE: &str = "payload.bin";
pub const FORMAT_VERSION: u32 = 1;

const MAGIC: &[u8; 4] = b"FCAB";
/// Header: magic, compressed length (u32 LE), CRC32 of the compressed bytes (u32 LE).
const HEADER_SIZE: usize = 12;
/// Prefix of staging directories; anything carrying it is garbage on open.
const TMP_PREFIX: &str = ".tmp-";
const RETIRED_PREFIX: &str = ".old-";

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Identity of the cabinet that owns a location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: CabinetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub format_version: u32,
}

/// `record.json`: the catalog record plus the BLAKE3 hex digest of
/// `payload.bin`.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    #[serde(flatten)]
    record: DatasetRecord,
    checksum: String,
}

// ---------------------------------------------------------------------------
// Payload framing
// ---------------------------------------------------------------------------

/// Encode a table as `[FCAB][len][crc32][zstd(bincode(table))]`.
pub fn encode_payload(table: &Table, level: i32) -> CabinetResult<Vec<u8>> {
    let raw = bincode::serialize(table)
        .map_err(|e| CabinetError::Internal(format!("payload serialization: {e}")))?;
    let compressed = zstd::encode_all(raw.as_slice(), level)
        .map_err(|e| CabinetError::Internal(format!("payload compression: {e}")))?;
    let len = u32::try_from(compressed.len())
        .map_err(|_| CabinetError::Internal("payload exceeds 4 GiB".into()))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(&compressed).to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Decode a framed payload, validating magic, length and CRC.
pub fn decode_payload(bytes: &[u8]) -> Result<Table, String> {
    if bytes.len() < HEADER_SIZE {
        return Err(format!("payload too short: {} bytes", bytes.len()));
    }
    if &bytes[..4] != MAGIC {
        return Err("bad magic".into());
    }
    let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let expected_crc = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let body = &bytes[HEADER_SIZE..];
    if body.len() != len {
        return Err(format!("length mismatch: header says {len}, found {}", body.len()));
    }
    let actual_crc = crc32fast::hash(body);
    if actual_crc != expected_crc {
        return Err(format!(
            "CRC mismatch: expected {expected_crc:08x}, got {actual_crc:08x}"
        ));
    }
    let raw = zstd::decode_all(body).map_err(|e| format!("decompression: {e}"))?;
    bincode::deserialize(&raw).map_err(|e| format!("deserialization: {e}"))
}

fn checksum(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// What `load_records` found.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<(DatasetRecord, Table)>,
    pub skipped: usize,
}

/// Paths and file operations for one backing location.
#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn records_dir(&self) -> PathBuf {
        self.root.join(RECORDS_DIR)
    }

    pub fn record_dir(&self, ticket: &Ticket) -> PathBuf {
        self.records_dir().join(ticket.to_string())
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Read `cabinet.toml` if the location has one.
    pub fn read_manifest(&self) -> CabinetResult<Option<Manifest>> {
        let path = self.manifest_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CabinetError::io(path, e)),
        };
        let manifest: Manifest =
            toml::from_str(&text).map_err(|e| CabinetError::corrupt(&path, e))?;
        if manifest.format_version > FORMAT_VERSION {
            return Err(CabinetError::corrupt(
                &path,
                format!("unsupported format version {}", manifest.format_version),
            ));
        }
        Ok(Some(manifest))
    }

    /// Create the location if needed and claim it for `id`.
    ///
    /// A location already claimed by a different id is refused.
    pub fn prepare(&self, id: CabinetId, name: Option<&str>) -> CabinetResult<Manifest> {
        let records = self.records_dir();
        fs::create_dir_all(&records).map_err(|e| CabinetError::io(&records, e))?;

        if let Some(existing) = self.read_manifest()? {
            if existing.id != id {
                return Err(CabinetError::LocationClaimed {
                    location: self.root.clone(),
                    expected: id,
                    found: existing.id,
                });
            }
            return Ok(existing);
        }

        let manifest = Manifest {
            id,
            name: name.map(str::to_string),
            format_version: FORMAT_VERSION,
        };
        let text = toml::to_string(&manifest)
            .map_err(|e| CabinetError::Internal(format!("manifest serialization: {e}")))?;
        write_atomic(&self.root, MANIFEST_FILE, text.as_bytes())?;
        debug!(location = %self.root.display(), %id, "claimed location");
        Ok(manifest)
    }

    /// Tidy up after an interrupted close.
    ///
    /// Staging directories are removed. A retired record directory is moved
    /// back into place if its replacement never landed, otherwise removed.
    /// Returns the number of directories cleaned.
    pub fn clean_temp(&self) -> CabinetResult<usize> {
        let mut cleaned = 0;
        for dir in self.record_dirs()? {
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with(TMP_PREFIX) {
                warn!(path = %dir.display(), "removing leftover staging directory");
                fs::remove_dir_all(&dir).map_err(|e| CabinetError::io(&dir, e))?;
                cleaned += 1;
            } else if let Some(ticket) = name.strip_prefix(RETIRED_PREFIX) {
                let live = self.records_dir().join(ticket);
                if live.exists() {
                    fs::remove_dir_all(&dir).map_err(|e| CabinetError::io(&dir, e))?;
                } else {
                    warn!(path = %dir.display(), "restoring retired record directory");
                    fs::rename(&dir, &live).map_err(|e| CabinetError::io(&live, e))?;
                }
                cleaned += 1;
            }
        }
        Ok(cleaned)
    }

    /// Tickets with a record directory on disk.
    pub fn stored_tickets(&self) -> CabinetResult<BTreeSet<Ticket>> {
        Ok(self
            .record_dirs()?
            .iter()
            .filter_map(|dir| dir.file_name()?.to_str()?.parse().ok())
            .collect())
    }

    /// Read every valid record, in `seq` order.
    ///
    /// A record whose files are missing, unparsable, or fail their checksum
    /// is skipped with a warning; one bad record never blocks the rest.
    pub fn load_records(&self) -> CabinetResult<LoadedRecords> {
        let mut loaded = LoadedRecords::default();
        for dir in self.record_dirs()? {
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with(TMP_PREFIX) || name.starts_with(RETIRED_PREFIX) {
                continue;
            }
            match read_record_dir(&dir, name) {
                Ok(pair) => loaded.records.push(pair),
                Err(reason) => {
                    warn!(path = %dir.display(), %reason, "skipping unreadable record");
                    loaded.skipped += 1;
                }
            }
        }
        loaded.records.sort_by_key(|(record, _)| record.seq);
        Ok(loaded)
    }

    /// Write one record and its payload.
    ///
    /// A new record is staged in a temporary directory and renamed into
    /// place. An existing directory is first renamed aside and only deleted
    /// once the new one is in place, so a crash leaves one complete copy for
    /// [`Layout::clean_temp`] to recover. When the same payload is already on
    /// disk only `record.json` is replaced, via a temporary file and rename.
    pub fn write_record(&self, record: &DatasetRecord, table: &Table, level: i32) -> CabinetResult<()> {
        let payload = encode_payload(table, level)?;
        let stored = StoredRecord {
            record: record.clone(),
            checksum: checksum(&payload),
        };
        let json = serde_json::to_vec_pretty(&stored)
            .map_err(|e| CabinetError::Internal(format!("record serialization: {e}")))?;

        let final_dir = self.record_dir(&record.ticket);
        if self.on_disk_checksum(&final_dir).as_deref() == Some(stored.checksum.as_str()) {
            return write_atomic(&final_dir, RECORD_FILE, &json);
        }

        let records = self.records_dir();
        let staging = tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .tempdir_in(&records)
            .map_err(|e| CabinetError::io(&records, e))?;
        write_file(&staging.path().join(PAYLOAD_FILE), &payload)?;
        write_file(&staging.path().join(RECORD_FILE), &json)?;

        let retired = records.join(format!("{RETIRED_PREFIX}{}", record.ticket));
        if retired.exists() {
            fs::remove_dir_all(&retired).map_err(|e| CabinetError::io(&retired, e))?;
        }
        let replaced = final_dir.exists();
        if replaced {
            fs::rename(&final_dir, &retired).map_err(|e| CabinetError::io(&retired, e))?;
        }
        fs::rename(staging.path(), &final_dir).map_err(|e| CabinetError::io(&final_dir, e))?;
        if replaced {
            fs::remove_dir_all(&retired).map_err(|e| CabinetError::io(&retired, e))?;
        }
        Ok(())
    }

    /// Remove a record directory. Returns `true` if one existed.
    pub fn remove_record(&self, ticket: &Ticket) -> CabinetResult<bool> {
        let dir = self.record_dir(ticket);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CabinetError::io(dir, e)),
        }
    }

    /// Remove the whole location.
    pub fn destroy(&self) -> CabinetResult<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CabinetError::io(&self.root, e)),
        }
    }

    fn record_dirs(&self) -> CabinetResult<Vec<PathBuf>> {
        let records = self.records_dir();
        if !records.is_dir() {
            return Ok(Vec::new());
        }
        let mut dirs = Vec::new();
        for entry in WalkDir::new(&records).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                CabinetError::io(&records, source)
            })?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            }
        }
        Ok(dirs)
    }

    fn on_disk_checksum(&self, dir: &Path) -> Option<String> {
        if !dir.join(PAYLOAD_FILE).is_file() {
            return None;
        }
        let bytes = fs::read(dir.join(RECORD_FILE)).ok()?;
        serde_json::from_slice::<StoredRecord>(&bytes)
            .ok()
            .map(|s| s.checksum)
    }
}

fn read_record_dir(dir: &Path, name: &str) -> Result<(DatasetRecord, Table), String> {
    let json = fs::read(dir.join(RECORD_FILE)).map_err(|e| format!("{RECORD_FILE}: {e}"))?;
    let stored: StoredRecord =
        serde_json::from_slice(&json).map_err(|e| format!("{RECORD_FILE}: {e}"))?;
    if stored.record.ticket.to_string() != name {
        return Err(format!(
            "directory name does not match ticket {}",
            stored.record.ticket
        ));
    }
    let payload = fs::read(dir.join(PAYLOAD_FILE)).map_err(|e| format!("{PAYLOAD_FILE}: {e}"))?;
    if checksum(&payload) != stored.checksum {
        return Err("payload checksum mismatch".into());
    }
    let table = decode_payload(&payload)?;
    Ok((stored.record, table))
}

fn write_file(path: &Path, bytes: &[u8]) -> CabinetResult<()> {
    let mut file = fs::File::create(path).map_err(|e| CabinetError::io(path, e))?;
    file.write_all(bytes).map_err(|e| CabinetError::io(path, e))?;
    file.sync_all().map_err(|e| CabinetError::io(path, e))
}

/// Replace `dir/file_name` by writing a sibling temp file and renaming it.
fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> CabinetResult<()> {
    let target = dir.join(file_name);
    let mut tmp = tempfile::Builder::new()
        .prefix(TMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| CabinetError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| CabinetError::io(&target, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| CabinetError::io(&target, e))?;
    tmp.persist(&target)
        .map_err(|e| CabinetError::io(&target, e.error))?;
    Ok(())
}
