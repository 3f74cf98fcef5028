//! 模板文件：`{dir}/{name}.json`，缺失时退回内嵌的默认模板。

use std::fs;
use std::path::{Path, PathBuf};

use loadcalc_core::drawing::DrawingObjectSet;
use loadcalc_core::template::{
    MemoryTemplateStore, TemplateError, TemplateStore, UNIT_BODY_TEMPLATE, UNIT_HEADER_TEMPLATE,
};
use tracing::debug;

use crate::{read_json, write_json};

const EMBEDDED: [(&str, &str); 2] = [
    (
        UNIT_HEADER_TEMPLATE,
        include_str!("../templates/UnitLoadCalculationHeader.json"),
    ),
    (
        UNIT_BODY_TEMPLATE,
        include_str!("../templates/UnitLoadCalculationBody.json"),
    ),
];

fn storage_error(name: &str, error: impl std::error::Error + Send + Sync + 'static) -> TemplateError {
    TemplateError::Storage {
        name: name.to_string(),
        source: Box::new(error),
    }
}

fn parse_embedded(name: &str, json: &str) -> Result<DrawingObjectSet, TemplateError> {
    serde_json::from_str(json).map_err(|err| TemplateError::Invalid {
        name: name.to_string(),
        message: err.to_string(),
    })
}

/// 内嵌默认模板组成的内存模板库。
pub fn embedded_templates() -> Result<MemoryTemplateStore, TemplateError> {
    let mut store = MemoryTemplateStore::new();
    for (name, json) in EMBEDDED {
        store.save(name, &parse_embedded(name, json)?)?;
    }
    Ok(store)
}

#[derive(Debug, Clone)]
pub struct JsonTemplateStore {
    directory: PathBuf,
    use_embedded: bool,
}

impl JsonTemplateStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            use_embedded: true,
        }
    }

    /// 是否在文件缺失时使用内嵌模板。
    pub fn with_embedded_defaults(mut self, enabled: bool) -> Self {
        self.use_embedded = enabled;
        self
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.json"))
    }

    fn embedded(&self, name: &str) -> Option<&'static str> {
        if !self.use_embedded {
            return None;
        }
        EMBEDDED
            .iter()
            .find_map(|(embedded, json)| (*embedded == name).then_some(*json))
    }
}

impl TemplateStore for JsonTemplateStore {
    fn load(&self, name: &str) -> Result<DrawingObjectSet, TemplateError> {
        let path = self.path_for(name);
        if path.is_file() {
            debug!(template = name, path = %path.display(), "读取模板文件");
            return read_json(&path).map_err(|err| storage_error(name, err));
        }
        match self.embedded(name) {
            Some(json) => parse_embedded(name, json),
            None => Err(TemplateError::NotFound(name.to_string())),
        }
    }

    fn save(&mut self, name: &str, set: &DrawingObjectSet) -> Result<(), TemplateError> {
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(TemplateError::Invalid {
                name: name.to_string(),
                message: "template name must be a plain file name".to_string(),
            });
        }
        write_json(&self.path_for(name), set).map_err(|err| storage_error(name, err))
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(&self.directory) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                .filter_map(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
                .collect(),
            Err(_) => Vec::new(),
        };
        if self.use_embedded {
            names.extend(EMBEDDED.iter().map(|(name, _)| name.to_string()));
        }
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_templates_carry_placeholders() {
        let store = embedded_templates().expect("内嵌模板可解析");
        let header = store.load(UNIT_HEADER_TEMPLATE).expect("页眉模板");
        assert!(header.rich_text_containing("SERVICE LOAD CALCULATION").is_some());
        let body = store.load(UNIT_BODY_TEMPLATE).expect("主体模板");
        assert!(body.rich_text_containing("Title").is_some());
        assert!(body.rich_text_containing("Subtitle VA").is_some());
        assert!(body.polylines.is_empty());
    }

    #[test]
    fn directory_without_files_falls_back_to_embedded() {
        let store = JsonTemplateStore::new("/nonexistent/templates");
        assert!(store.load(UNIT_BODY_TEMPLATE).is_ok());
        assert_eq!(
            store.names(),
            vec![UNIT_BODY_TEMPLATE.to_string(), UNIT_HEADER_TEMPLATE.to_string()]
        );

        let strict = store.with_embedded_defaults(false);
        assert!(matches!(
            strict.load(UNIT_BODY_TEMPLATE),
            Err(TemplateError::NotFound(_))
        ));
    }
}
