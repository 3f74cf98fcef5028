use std::collections::HashMap;

use thiserror::Error;

use crate::drawing::DrawingObjectSet;

/// 报表页眉模板名。
pub const UNIT_HEADER_TEMPLATE: &str = "UnitLoadCalculationHeader";
/// 报表分节主体模板名。
pub const UNIT_BODY_TEMPLATE: &str = "UnitLoadCalculationBody";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {0} not found")]
    NotFound(String),
    #[error("template {name} is invalid: {message}")]
    Invalid { name: String, message: String },
    #[error("template storage failed for {name}: {source}")]
    Storage {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 具名模板的读取与保存。
pub trait TemplateStore {
    fn load(&self, name: &str) -> Result<DrawingObjectSet, TemplateError>;
    fn save(&mut self, name: &str, set: &DrawingObjectSet) -> Result<(), TemplateError>;
    fn names(&self) -> Vec<String>;
}

/// 内存模板库，测试与嵌入式模板共用。
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplateStore {
    templates: HashMap<String, DrawingObjectSet>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, name: impl Into<String>, set: DrawingObjectSet) -> Self {
        self.templates.insert(name.into(), set);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<DrawingObjectSet> {
        self.templates.remove(name)
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn load(&self, name: &str) -> Result<DrawingObjectSet, TemplateError> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    fn save(&mut self, name: &str, set: &DrawingObjectSet) -> Result<(), TemplateError> {
        if name.trim().is_empty() {
            return Err(TemplateError::Invalid {
                name: name.to_string(),
                message: "template name is empty".to_string(),
            });
        }
        self.templates.insert(name.to_string(), set.clone());
        Ok(())
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        names.sort();
        names
    }
}
