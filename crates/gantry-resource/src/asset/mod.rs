//! Content-addressed assets and archives.
//!
//! An [`Asset`] is a single blob sourced from inline text, a filesystem path,
//! or a URI. An [`Archive`] is a collection sourced from a map of named
//! members, a filesystem path, or a URI. Both carry an optional SHA-256 hex
//! hash of their contents. A value whose source has been dropped and only the
//! hash kept is *elided*: it still identifies its contents but can no longer
//! produce them.
//!
//! On the wire both are flattened to a [`PropertyMap`] tagged with
//! [`SIG_KEY`]; see [`Asset::to_property_map`] and
//! [`Archive::from_property_map`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::trace;
use url::Url;

use crate::error::AssetError;
use crate::map::PropertyMap;
use crate::sig::{
    ARCHIVE_SIG, ASSET_SIG, ASSETS_FIELD, HASH_FIELD, PATH_FIELD, SIG_KEY, TEXT_FIELD, URI_FIELD,
};
use crate::value::PropertyValue;

const ASSET_TARGET: &str = "gantry_resource::asset";

const ASSET_KIND: &str = "asset";
const ARCHIVE_KIND: &str = "archive";
const ASSET_SOURCES: &str = "`text`, `path` or `uri`";
const ARCHIVE_SOURCES: &str = "`assets`, `path` or `uri`";

/// Where an asset's contents come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// Inline UTF-8 text.
    Text(String),
    /// A file on the local filesystem.
    Path(String),
    /// A URI; only `file://` URIs can be read locally.
    Uri(String),
}

/// A single content-addressed blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    hash: Option<String>,
    source: Option<AssetSource>,
}

impl Asset {
    /// Builds an asset from inline text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::from_source(AssetSource::Text(text.into()))
    }

    /// Builds an asset backed by a local file.
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self::from_source(AssetSource::Path(path.into()))
    }

    /// Builds an asset backed by a URI.
    #[must_use]
    pub fn uri(uri: impl Into<String>) -> Self {
        Self::from_source(AssetSource::Uri(uri.into()))
    }

    /// Builds an elided asset that carries only its hash.
    #[must_use]
    pub fn hash_only(hash: impl Into<String>) -> Self {
        Self {
            hash: non_empty(hash.into()),
            source: None,
        }
    }

    const fn from_source(source: AssetSource) -> Self {
        Self {
            hash: None,
            source: Some(source),
        }
    }

    /// Sets the hash. An empty hash clears it.
    #[must_use]
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = non_empty(hash.into());
        self
    }

    /// Returns the content hash, if known.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// Returns the source, or `None` if the asset is elided.
    #[must_use]
    pub const fn source(&self) -> Option<&AssetSource> {
        self.source.as_ref()
    }

    /// Returns the inline text of a text asset.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.source {
            Some(AssetSource::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Whether the contents have been dropped in favour of the hash.
    #[must_use]
    pub const fn is_elided(&self) -> bool {
        self.source.is_none()
    }

    /// Returns a copy carrying only the hash.
    #[must_use]
    pub fn elided(&self) -> Self {
        Self {
            hash: self.hash.clone(),
            source: None,
        }
    }

    /// Reads the asset's contents.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] if the asset is elided, its file cannot be read,
    /// or its URI cannot be resolved to a local file.
    pub fn read(&self) -> Result<Vec<u8>, AssetError> {
        match &self.source {
            Some(AssetSource::Text(text)) => Ok(text.clone().into_bytes()),
            Some(AssetSource::Path(path)) => read_file(Path::new(path)),
            Some(AssetSource::Uri(uri)) => read_file(&local_path(ASSET_KIND, uri)?),
            None => Err(AssetError::Elided { kind: ASSET_KIND }),
        }
    }

    /// Computes the SHA-256 hex digest of the contents.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] if the contents cannot be read.
    pub fn compute_hash(&self) -> Result<String, AssetError> {
        let contents = self.read()?;
        Ok(hex_digest(&contents))
    }

    /// Returns a copy with the hash filled in, computing it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] if the hash is missing and the contents cannot
    /// be read.
    pub fn ensure_hash(&self) -> Result<Self, AssetError> {
        if self.hash.is_some() {
            return Ok(self.clone());
        }
        let digest = self.compute_hash()?;
        trace!(target: ASSET_TARGET, hash = %digest, "computed asset hash");
        Ok(self.clone().with_hash(digest))
    }

    /// Flattens the asset into a signature-tagged map.
    #[must_use]
    pub fn to_property_map(&self) -> PropertyMap {
        let mut map = PropertyMap::new().with(SIG_KEY, ASSET_SIG);
        if let Some(hash) = &self.hash {
            map.insert(HASH_FIELD, hash.as_str());
        }
        match &self.source {
            Some(AssetSource::Text(text)) => {
                map.insert(TEXT_FIELD, text.as_str());
            }
            Some(AssetSource::Path(path)) => {
                map.insert(PATH_FIELD, path.as_str());
            }
            Some(AssetSource::Uri(uri)) => {
                map.insert(URI_FIELD, uri.as_str());
            }
            None => {}
        }
        map
    }

    /// Rebuilds an asset from a signature-tagged map.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] if the signature is missing, a field has the
    /// wrong type, or the map names more than one source or neither a source
    /// nor a hash.
    pub fn from_property_map(map: &PropertyMap) -> Result<Self, AssetError> {
        check_signature(map, ASSET_KIND, ASSET_SIG)?;
        let hash = string_field(map, ASSET_KIND, HASH_FIELD)?.and_then(non_empty);
        let text = string_field(map, ASSET_KIND, TEXT_FIELD)?.map(AssetSource::Text);
        let path = string_field(map, ASSET_KIND, PATH_FIELD)?.map(AssetSource::Path);
        let uri = string_field(map, ASSET_KIND, URI_FIELD)?.map(AssetSource::Uri);

        let source = single_source([text, path, uri], ASSET_KIND, ASSET_SOURCES)?;
        if source.is_none() && hash.is_none() {
            return Err(AssetError::MissingSource {
                kind: ASSET_KIND,
                expected: ASSET_SOURCES,
            });
        }
        Ok(Self { hash, source })
    }
}

/// Where an archive's contents come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSource {
    /// Named members, each an asset or a nested archive.
    Assets(BTreeMap<String, ArchiveMember>),
    /// A file or directory on the local filesystem.
    Path(String),
    /// A URI; only `file://` URIs can be read locally.
    Uri(String),
}

/// A member of an assets archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveMember {
    /// A single blob.
    Asset(Asset),
    /// A nested archive.
    Archive(Archive),
}

impl ArchiveMember {
    fn compute_hash(&self) -> Result<String, AssetError> {
        match self {
            Self::Asset(asset) => asset
                .hash()
                .map_or_else(|| asset.compute_hash(), |hash| Ok(hash.to_owned())),
            Self::Archive(archive) => archive
                .hash()
                .map_or_else(|| archive.compute_hash(), |hash| Ok(hash.to_owned())),
        }
    }

    fn to_property_value(&self) -> PropertyValue {
        match self {
            Self::Asset(asset) => PropertyValue::Asset(asset.clone()),
            Self::Archive(archive) => PropertyValue::Archive(archive.clone()),
        }
    }

    fn from_property_value(name: &str, value: &PropertyValue) -> Result<Self, AssetError> {
        match value {
            PropertyValue::Asset(asset) => Ok(Self::Asset(asset.clone())),
            PropertyValue::Archive(archive) => Ok(Self::Archive(archive.clone())),
            PropertyValue::Object(map) => match map.get(SIG_KEY).and_then(PropertyValue::as_str) {
                Some(ASSET_SIG) => Asset::from_property_map(map).map(Self::Asset),
                Some(ARCHIVE_SIG) => Archive::from_property_map(map).map(Self::Archive),
                _ => Err(AssetError::MemberKind {
                    name: name.to_owned(),
                }),
            },
            _ => Err(AssetError::MemberKind {
                name: name.to_owned(),
            }),
        }
    }
}

impl From<Asset> for ArchiveMember {
    fn from(asset: Asset) -> Self {
        Self::Asset(asset)
    }
}

impl From<Archive> for ArchiveMember {
    fn from(archive: Archive) -> Self {
        Self::Archive(archive)
    }
}

/// A content-addressed collection of assets and archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    hash: Option<String>,
    source: Option<ArchiveSource>,
}

impl Archive {
    /// Builds an archive from named members.
    #[must_use]
    pub fn assets<K, M>(entries: impl IntoIterator<Item = (K, M)>) -> Self
    where
        K: Into<String>,
        M: Into<ArchiveMember>,
    {
        let members = entries
            .into_iter()
            .map(|(name, member)| (name.into(), member.into()))
            .collect();
        Self::from_source(ArchiveSource::Assets(members))
    }

    /// Builds an archive backed by a local file or directory.
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self::from_source(ArchiveSource::Path(path.into()))
    }

    /// Builds an archive backed by a URI.
    #[must_use]
    pub fn uri(uri: impl Into<String>) -> Self {
        Self::from_source(ArchiveSource::Uri(uri.into()))
    }

    /// Builds an elided archive that carries only its hash.
    #[must_use]
    pub fn hash_only(hash: impl Into<String>) -> Self {
        Self {
            hash: non_empty(hash.into()),
            source: None,
        }
    }

    const fn from_source(source: ArchiveSource) -> Self {
        Self {
            hash: None,
            source: Some(source),
        }
    }

    /// Sets the hash. An empty hash clears it.
    #[must_use]
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = non_empty(hash.into());
        self
    }

    /// Returns the content hash, if known.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// Returns the source, or `None` if the archive is elided.
    #[must_use]
    pub const fn source(&self) -> Option<&ArchiveSource> {
        self.source.as_ref()
    }

    /// Whether the contents have been dropped in favour of the hash.
    #[must_use]
    pub const fn is_elided(&self) -> bool {
        self.source.is_none()
    }

    /// Returns a copy carrying only the hash.
    #[must_use]
    pub fn elided(&self) -> Self {
        Self {
            hash: self.hash.clone(),
            source: None,
        }
    }

    /// Computes the SHA-256 hex digest of the archive.
    ///
    /// A path naming a regular file hashes the file's bytes. A directory or
    /// a member map hashes the sorted member names together with each
    /// member's own hash, so the digest is independent of traversal order.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] if the archive is elided or any member cannot
    /// be read.
    pub fn compute_hash(&self) -> Result<String, AssetError> {
        match &self.source {
            Some(ArchiveSource::Assets(members)) => {
                let mut entries = Vec::with_capacity(members.len());
                for (name, member) in members {
                    entries.push((name.clone(), member.compute_hash()?));
                }
                Ok(digest_entries(&entries))
            }
            Some(ArchiveSource::Path(path)) => hash_path(Path::new(path)),
            Some(ArchiveSource::Uri(uri)) => hash_path(&local_path(ARCHIVE_KIND, uri)?),
            None => Err(AssetError::Elided { kind: ARCHIVE_KIND }),
        }
    }

    /// Returns a copy with the hash filled in, computing it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] if the hash is missing and the contents cannot
    /// be read.
    pub fn ensure_hash(&self) -> Result<Self, AssetError> {
        if self.hash.is_some() {
            return Ok(self.clone());
        }
        let digest = self.compute_hash()?;
        trace!(target: ASSET_TARGET, hash = %digest, "computed archive hash");
        Ok(self.clone().with_hash(digest))
    }

    /// Flattens the archive into a signature-tagged map.
    ///
    /// Members of an assets archive are stored as [`PropertyValue::Asset`]
    /// and [`PropertyValue::Archive`] values so the marshaler can encode them
    /// recursively.
    #[must_use]
    pub fn to_property_map(&self) -> PropertyMap {
        let mut map = PropertyMap::new().with(SIG_KEY, ARCHIVE_SIG);
        if let Some(hash) = &self.hash {
            map.insert(HASH_FIELD, hash.as_str());
        }
        match &self.source {
            Some(ArchiveSource::Assets(members)) => {
                let assets: PropertyMap = members
                    .iter()
                    .map(|(name, member)| (name.as_str(), member.to_property_value()))
                    .collect();
                map.insert(ASSETS_FIELD, assets);
            }
            Some(ArchiveSource::Path(path)) => {
                map.insert(PATH_FIELD, path.as_str());
            }
            Some(ArchiveSource::Uri(uri)) => {
                map.insert(URI_FIELD, uri.as_str());
            }
            None => {}
        }
        map
    }

    /// Rebuilds an archive from a signature-tagged map.
    ///
    /// Members may be already-decoded assets and archives or their flattened
    /// maps.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError`] if the signature is missing, a field or member
    /// has the wrong type, or the map names more than one source or neither
    /// a source nor a hash.
    pub fn from_property_map(map: &PropertyMap) -> Result<Self, AssetError> {
        check_signature(map, ARCHIVE_KIND, ARCHIVE_SIG)?;
        let hash = string_field(map, ARCHIVE_KIND, HASH_FIELD)?.and_then(non_empty);
        let assets = match map.get(ASSETS_FIELD) {
            None | Some(PropertyValue::Null) => None,
            Some(PropertyValue::Object(members)) => {
                let mut parsed = BTreeMap::new();
                for (name, member) in members {
                    let entry = ArchiveMember::from_property_value(name.as_str(), member)?;
                    parsed.insert(name.as_str().to_owned(), entry);
                }
                Some(ArchiveSource::Assets(parsed))
            }
            Some(other) => {
                return Err(AssetError::FieldKind {
                    kind: ARCHIVE_KIND,
                    field: ASSETS_FIELD,
                    expected: "an object",
                    found: other.type_string(),
                });
            }
        };
        let path = string_field(map, ARCHIVE_KIND, PATH_FIELD)?.map(ArchiveSource::Path);
        let uri = string_field(map, ARCHIVE_KIND, URI_FIELD)?.map(ArchiveSource::Uri);

        let source = single_source([assets, path, uri], ARCHIVE_KIND, ARCHIVE_SOURCES)?;
        if source.is_none() && hash.is_none() {
            return Err(AssetError::MissingSource {
                kind: ARCHIVE_KIND,
                expected: ARCHIVE_SOURCES,
            });
        }
        Ok(Self { hash, source })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn digest_entries(entries: &[(String, String)]) -> String {
    let mut hasher = Sha256::new();
    for (name, hash) in entries {
        hasher.update(name.as_bytes());
        hasher.update([0_u8]);
        hasher.update(hash.as_bytes());
        hasher.update([0_u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn check_signature(map: &PropertyMap, kind: &'static str, sig: &str) -> Result<(), AssetError> {
    match map.get(SIG_KEY).and_then(PropertyValue::as_str) {
        Some(found) if found == sig => Ok(()),
        _ => Err(AssetError::Signature { kind }),
    }
}

fn string_field(
    map: &PropertyMap,
    kind: &'static str,
    field: &'static str,
) -> Result<Option<String>, AssetError> {
    match map.get(field) {
        None | Some(PropertyValue::Null) => Ok(None),
        Some(PropertyValue::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(AssetError::FieldKind {
            kind,
            field,
            expected: "a string",
            found: other.type_string(),
        }),
    }
}

fn single_source<S, const N: usize>(
    candidates: [Option<S>; N],
    kind: &'static str,
    expected: &'static str,
) -> Result<Option<S>, AssetError> {
    let mut present = candidates.into_iter().flatten();
    let first = present.next();
    if present.next().is_some() {
        return Err(AssetError::AmbiguousSource { kind, expected });
    }
    Ok(first)
}

fn local_path(kind: &'static str, uri: &str) -> Result<PathBuf, AssetError> {
    let parsed = Url::parse(uri).map_err(|err| AssetError::InvalidUri {
        kind,
        uri: uri.to_owned(),
        message: err.to_string(),
    })?;
    if parsed.scheme() != "file" {
        return Err(AssetError::UnsupportedScheme {
            kind,
            uri: uri.to_owned(),
            scheme: parsed.scheme().to_owned(),
        });
    }
    parsed.to_file_path().map_err(|()| AssetError::InvalidUri {
        kind,
        uri: uri.to_owned(),
        message: "not a local file path".to_owned(),
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>, AssetError> {
    if path.is_dir() {
        return Err(AssetError::IsDirectory {
            path: path.to_path_buf(),
        });
    }
    fs::read(path).map_err(|err| AssetError::read(path, err))
}

fn hash_path(path: &Path) -> Result<String, AssetError> {
    if !path.is_dir() {
        return read_file(path).map(|contents| hex_digest(&contents));
    }
    let mut entries = Vec::new();
    collect_directory(path, path, &mut entries)?;
    entries.sort();
    Ok(digest_entries(&entries))
}

fn collect_directory(
    root: &Path,
    dir: &Path,
    entries: &mut Vec<(String, String)>,
) -> Result<(), AssetError> {
    let listing = fs::read_dir(dir).map_err(|err| AssetError::read(dir, err))?;
    for entry in listing {
        let entry_path = entry.map_err(|err| AssetError::read(dir, err))?.path();
        if entry_path.is_dir() {
            collect_directory(root, &entry_path, entries)?;
            continue;
        }
        let relative = entry_path.strip_prefix(root).unwrap_or(&entry_path);
        let name = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let contents = read_file(&entry_path)?;
        entries.push((name, hex_digest(&contents)));
    }
    Ok(())
}
