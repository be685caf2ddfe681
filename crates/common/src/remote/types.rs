//! Documents returned by the design-time file API
//!
//! The service answers with PascalCase JSON. A stat request yields either a
//! directory document or a file document; the two share most fields but only
//! the file document carries the activation state in `SapBackPack`.

use serde::Deserialize;

/// Flags shared by file and directory documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeAttributes {
    pub read_only: bool,
    pub executable: bool,
    pub hidden: bool,
    pub archive: bool,
    pub symbolic_link: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BackPack {
    pub activated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FileAttributes {
    #[serde(flatten)]
    pub common: NodeAttributes,
    pub sap_back_pack: BackPack,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectoryMeta {
    pub name: String,
    #[serde(default)]
    pub content_location: String,
    pub directory: bool,
    #[serde(default)]
    pub local_time_stamp: i64,
    #[serde(default)]
    pub attributes: NodeAttributes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileMeta {
    pub name: String,
    #[serde(default)]
    pub content_location: String,
    #[serde(default)]
    pub directory: bool,
    #[serde(default)]
    pub local_time_stamp: i64,
    #[serde(default)]
    pub attributes: FileAttributes,
}

/// Immediate child entry of a `depth=1` listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectoryChild {
    pub name: String,
    /// Absolute location of the child's content on the service
    #[serde(default)]
    pub content_location: String,
    pub directory: bool,
}

/// A `depth=1` listing of a directory
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectoryDetail {
    pub name: String,
    #[serde(default)]
    pub content_location: String,
    #[serde(default)]
    pub children: Vec<DirectoryChild>,
}

/// Uniform metadata for one remote path, whichever document shape it came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathStat {
    pub directory: bool,
    pub executable: bool,
    pub archive: bool,
    pub hidden: bool,
    pub read_only: bool,
    pub symbolic_link: bool,
    /// Only ever set for files
    pub activated: bool,
    /// Milliseconds since the unix epoch, 0 when the service omits it
    pub timestamp_ms: i64,
}

/// Just enough of a stat document to tell which variant it is
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatEnvelope {
    #[serde(default)]
    directory: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum StatDocument {
    Directory(DirectoryMeta),
    File(FileMeta),
}

impl StatDocument {
    pub(crate) fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope: StatEnvelope = serde_json::from_slice(body)?;
        if envelope.directory {
            serde_json::from_slice(body).map(Self::Directory)
        } else {
            serde_json::from_slice(body).map(Self::File)
        }
    }
}

impl From<StatDocument> for PathStat {
    fn from(document: StatDocument) -> Self {
        match document {
            StatDocument::Directory(dir) => Self::from_attributes(
                dir.directory,
                &dir.attributes,
                false,
                dir.local_time_stamp,
            ),
            StatDocument::File(file) => Self::from_attributes(
                file.directory,
                &file.attributes.common,
                file.attributes.sap_back_pack.activated,
                file.local_time_stamp,
            ),
        }
    }
}

impl PathStat {
    fn from_attributes(
        directory: bool,
        attributes: &NodeAttributes,
        activated: bool,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            directory,
            executable: attributes.executable,
            archive: attributes.archive,
            hidden: attributes.hidden,
            read_only: attributes.read_only,
            symbolic_link: attributes.symbolic_link,
            activated,
            timestamp_ms,
        }
    }
}
