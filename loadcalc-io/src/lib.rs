use std::fs;
use std::path::{Path, PathBuf};

use loadcalc_core::document::Document;
use loadcalc_core::drawing::DrawingObject;
use loadcalc_core::load::{BuildingInformation, UnitInformation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod snapshot;
pub mod templates;

pub use snapshot::{ImportSummary, SnapshotStore};
pub use templates::JsonTemplateStore;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub(crate) fn read_json<T>(path: &Path) -> Result<T, IoError>
where
    T: for<'de> Deserialize<'de>,
{
    let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_json<T>(path: &Path, value: &T) -> Result<(), IoError>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| IoError::WriteError {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| IoError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// 绘图文档的 JSON 读写。
pub struct JsonDocumentFacade;

impl JsonDocumentFacade {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonDocumentFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for JsonDocumentFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        read_json(path)
    }
}

impl DocumentSaver for JsonDocumentFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        write_json(path, document)
    }
}

/// 单文件工程：一次性给出全部单元与建筑。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProjectFile {
    pub units: Vec<UnitInformation>,
    pub buildings: Vec<BuildingInformation>,
}

impl ProjectFile {
    pub fn load(path: &Path) -> Result<Self, IoError> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), IoError> {
        write_json(path, self)
    }
}

/// 读取绝对坐标图元列表（`[{"Type": ...}, ...]`）。
pub fn read_entities(path: &Path) -> Result<Vec<DrawingObject>, IoError> {
    read_json(path)
}

pub fn write_entities(path: &Path, entities: &[DrawingObject]) -> Result<(), IoError> {
    write_json(path, entities)
}
