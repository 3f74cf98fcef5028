//! 内存绘图文档：模型空间、具名块（容器）、块参照与文字样式。
//!
//! 该文档是绘图宿主接口的参考实现，CLI 与测试都通过它落地报表图元。

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::drawing::DrawingObject;
use crate::geometry::{Bounds2D, Vector3};
use crate::transform::Translate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// 提供原始数值，便于序列化或日志输出。
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub is_visible: bool,
}

impl Layer {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_visible: true,
        }
    }
}

/// 文字样式定义。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub name: String,
    pub height: f64,
    pub width_factor: f64,
    pub font_file: String,
}

/// 具名块定义，内部图元坐标相对块基点。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub name: String,
    pub entities: Vec<(EntityId, DrawingObject)>,
}

/// 块参照。`graphics_revision` 在块内容刷新时递增。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockReference {
    pub id: EntityId,
    pub block_name: String,
    pub insert: Vector3,
    pub graphics_revision: u64,
}

/// 图元写入位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space<'a> {
    Model,
    Block(&'a str),
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("block {0} not found")]
    BlockNotFound(String),
    #[error("block {0} already exists")]
    BlockExists(String),
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Document {
    layers: HashMap<String, Layer>,
    model_space: Vec<(EntityId, DrawingObject)>,
    blocks: BTreeMap<String, BlockDefinition>,
    references: Vec<BlockReference>,
    text_styles: BTreeMap<String, TextStyle>,
    next_entity_id: u64,
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self::default();
        doc.ensure_layer("0");
        doc
    }

    pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
        let key = name.as_ref();
        self.layers
            .entry(key.to_string())
            .or_insert_with(|| Layer::new(key));
    }

    /// 在 `space` 中以 `base` 为基点写入一个图元，返回新图元 ID。
    pub fn add_object(
        &mut self,
        space: Space<'_>,
        base: Vector3,
        object: &DrawingObject,
    ) -> Result<EntityId, DocumentError> {
        if let Space::Block(name) = space {
            if !self.blocks.contains_key(name) {
                return Err(DocumentError::BlockNotFound(name.to_string()));
            }
        }
        self.ensure_layer(object.layer_name());
        let mut placed = object.clone();
        placed.translate(base);
        let id = self.next_id();
        match space {
            Space::Model => self.model_space.push((id, placed)),
            Space::Block(name) => {
                if let Some(block) = self.blocks.get_mut(name) {
                    block.entities.push((id, placed));
                }
            }
        }
        Ok(id)
    }

    #[inline]
    pub fn entities(&self) -> impl Iterator<Item = &(EntityId, DrawingObject)> {
        self.model_space.iter()
    }

    /// 新建空块；同名块已存在时报错。
    pub fn create_block(&mut self, name: impl Into<String>) -> Result<(), DocumentError> {
        let name = name.into();
        if self.blocks.contains_key(&name) {
            return Err(DocumentError::BlockExists(name));
        }
        self.blocks.insert(
            name.clone(),
            BlockDefinition {
                name,
                entities: Vec::new(),
            },
        );
        Ok(())
    }

    #[inline]
    pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
        self.blocks.get(name)
    }

    #[inline]
    pub fn blocks(&self) -> impl Iterator<Item = &BlockDefinition> {
        self.blocks.values()
    }

    /// 块改名，同时更新所有参照。
    pub fn rename_block(&mut self, from: &str, to: &str) -> Result<(), DocumentError> {
        if from == to {
            return Ok(());
        }
        if self.blocks.contains_key(to) {
            return Err(DocumentError::BlockExists(to.to_string()));
        }
        let mut block = self
            .blocks
            .remove(from)
            .ok_or_else(|| DocumentError::BlockNotFound(from.to_string()))?;
        block.name = to.to_string();
        self.blocks.insert(to.to_string(), block);
        for reference in &mut self.references {
            if reference.block_name == from {
                reference.block_name = to.to_string();
            }
        }
        Ok(())
    }

    /// 清空块内容，返回删除的图元数量。
    pub fn clear_block(&mut self, name: &str) -> Result<usize, DocumentError> {
        let block = self
            .blocks
            .get_mut(name)
            .ok_or_else(|| DocumentError::BlockNotFound(name.to_string()))?;
        let removed = block.entities.len();
        block.entities.clear();
        Ok(removed)
    }

    pub fn insert_block_reference(
        &mut self,
        name: &str,
        insert: Vector3,
    ) -> Result<EntityId, DocumentError> {
        if !self.blocks.contains_key(name) {
            return Err(DocumentError::BlockNotFound(name.to_string()));
        }
        let id = self.next_id();
        self.references.push(BlockReference {
            id,
            block_name: name.to_string(),
            insert,
            graphics_revision: 0,
        });
        Ok(id)
    }

    #[inline]
    pub fn block_references(&self) -> impl Iterator<Item = &BlockReference> {
        self.references.iter()
    }

    /// 标记引用该块的所有参照需要重绘，返回受影响数量。
    pub fn mark_references_modified(&mut self, name: &str) -> usize {
        let mut touched = 0;
        for reference in &mut self.references {
            if reference.block_name == name {
                reference.graphics_revision += 1;
                touched += 1;
            }
        }
        touched
    }

    /// 样式不存在时创建，返回是否新建。
    pub fn ensure_text_style(&mut self, style: TextStyle) -> bool {
        if self.text_styles.contains_key(&style.name) {
            return false;
        }
        self.text_styles.insert(style.name.clone(), style);
        true
    }

    #[inline]
    pub fn text_style(&self, name: &str) -> Option<&TextStyle> {
        self.text_styles.get(name)
    }

    /// 模型空间与全部块参照展开后的范围。
    pub fn bounds(&self) -> Option<Bounds2D> {
        let mut bounds = Bounds2D::empty();
        let mut has = false;
        for (_, entity) in &self.model_space {
            if let Some(entity_bounds) = entity.bounds() {
                bounds.include_bounds(&entity_bounds);
                has = true;
            }
        }
        for reference in &self.references {
            let Some(block) = self.blocks.get(&reference.block_name) else {
                continue;
            };
            for (_, entity) in &block.entities {
                let mut placed = entity.clone();
                placed.translate(reference.insert);
                if let Some(entity_bounds) = placed.bounds() {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
        }
        if has { Some(bounds) } else { None }
    }

    #[inline]
    fn next_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        EntityId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::{Circle, Line};

    fn line(layer: &str) -> DrawingObject {
        DrawingObject::Line(Line {
            layer: layer.to_string(),
            start: Vector3::xy(0.0, 0.0),
            end: Vector3::xy(1.0, 0.0),
        })
    }

    #[test]
    fn document_stores_objects_relative_to_base() {
        let mut doc = Document::new();
        let id = doc
            .add_object(Space::Model, Vector3::xy(5.0, 5.0), &line("GEOM"))
            .expect("写入模型空间");
        assert_eq!(id.get(), 0);
        match doc.entities().find(|(entity_id, _)| *entity_id == id) {
            Some((_, DrawingObject::Line(line))) => {
                assert_eq!(line.start, Vector3::xy(5.0, 5.0));
                assert_eq!(line.end, Vector3::xy(6.0, 5.0));
            }
            other => panic!("unexpected entity lookup result: {other:?}"),
        }
    }

    #[test]
    fn blocks_support_rename_clear_and_references() {
        let mut doc = Document::new();
        doc.create_block("Unit A ID1").expect("新建块");
        assert!(matches!(
            doc.create_block("Unit A ID1"),
            Err(DocumentError::BlockExists(_))
        ));
        doc.add_object(Space::Block("Unit A ID1"), Vector3::ZERO, &line("E-TEXT"))
            .expect("写入块");
        let reference = doc
            .insert_block_reference("Unit A ID1", Vector3::xy(-7.0, 0.0))
            .expect("插入参照");

        doc.rename_block("Unit A ID1", "Unit B ID1").expect("块改名");
        assert!(doc.block("Unit A ID1").is_none());
        let block = doc.block("Unit B ID1").expect("改名后的块");
        assert_eq!(block.entities.len(), 1);
        let placed = doc
            .block_references()
            .find(|r| r.id == reference)
            .expect("参照仍存在");
        assert_eq!(placed.block_name, "Unit B ID1");

        assert_eq!(doc.mark_references_modified("Unit B ID1"), 1);
        assert_eq!(doc.block_references().next().map(|r| r.graphics_revision), Some(1));

        let bounds = doc.bounds().expect("参照展开后有范围");
        assert!((bounds.min().x() + 7.0).abs() < 1e-9);

        assert_eq!(doc.clear_block("Unit B ID1").expect("清空块"), 1);
        assert!(matches!(
            doc.add_object(Space::Block("Missing"), Vector3::ZERO, &line("0")),
            Err(DocumentError::BlockNotFound(_))
        ));
        assert!(doc.insert_block_reference("Missing", Vector3::ZERO).is_err());
    }

    #[test]
    fn text_styles_are_created_once() {
        let mut doc = Document::new();
        let style = TextStyle {
            name: "Load Calcs".to_string(),
            height: 0.0,
            width_factor: 1.0,
            font_file: "Arial.ttf".to_string(),
        };
        assert!(doc.ensure_text_style(style.clone()));
        assert!(!doc.ensure_text_style(TextStyle {
            width_factor: 2.0,
            ..style
        }));
        assert_eq!(doc.text_style("Load Calcs").map(|s| s.width_factor), Some(1.0));

        doc.add_object(
            Space::Model,
            Vector3::ZERO,
            &DrawingObject::Circle(Circle {
                layer: "0".to_string(),
                center: Vector3::xy(1.0, 1.0),
                radius: 1.0,
            }),
        )
        .expect("写入圆");
        let bounds = doc.bounds().expect("存在范围");
        assert!((bounds.width() - 2.0).abs() < 1e-9);
    }
}
