//! 绘图宿主接口与报表落地。
//!
//! 报表在内存中完整生成后才调用宿主；宿主负责容器（块）、图元、文字样式与参照的实际创建。

use std::collections::BTreeSet;

use loadcalc_core::document::{Document, EntityId, Space, TextStyle};
use loadcalc_core::drawing::{DrawingObject, DrawingObjectSet};
use loadcalc_core::geometry::Vector3;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::errors::{ContainerWriteError, HostError};

static ID_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"ID(\d+)").expect("ID 标记正则有效"));

/// 宿主提供的绘图能力。
pub trait DrawingHost {
    fn container_names(&self) -> Vec<String>;

    /// 容器不存在时新建，返回是否新建。
    fn get_or_create_container(&mut self, name: &str) -> Result<bool, HostError>;

    fn rename_container(&mut self, from: &str, to: &str) -> Result<(), HostError>;

    /// 清空容器内容，返回删除的图元数。
    fn wipe_container(&mut self, name: &str) -> Result<usize, HostError>;

    fn create_entity(
        &mut self,
        space: Space<'_>,
        base: Vector3,
        object: &DrawingObject,
    ) -> Result<EntityId, HostError>;

    fn ensure_text_style(&mut self, style: &TextStyle) -> Result<bool, HostError>;

    /// 通知引用该容器的所有实例重绘。
    fn refresh_instances(&mut self, name: &str) -> Result<usize, HostError>;

    fn place_instance(&mut self, name: &str, base: Vector3) -> Result<EntityId, HostError>;

    /// 模型空间中可自由选取的图元（绝对坐标）。
    fn model_space(&self) -> Vec<DrawingObject>;
}

impl DrawingHost for Document {
    fn container_names(&self) -> Vec<String> {
        self.blocks().map(|block| block.name.clone()).collect()
    }

    fn get_or_create_container(&mut self, name: &str) -> Result<bool, HostError> {
        if self.block(name).is_some() {
            return Ok(false);
        }
        self.create_block(name)?;
        Ok(true)
    }

    fn rename_container(&mut self, from: &str, to: &str) -> Result<(), HostError> {
        Ok(self.rename_block(from, to)?)
    }

    fn wipe_container(&mut self, name: &str) -> Result<usize, HostError> {
        Ok(self.clear_block(name)?)
    }

    fn create_entity(
        &mut self,
        space: Space<'_>,
        base: Vector3,
        object: &DrawingObject,
    ) -> Result<EntityId, HostError> {
        Ok(self.add_object(space, base, object)?)
    }

    fn ensure_text_style(&mut self, style: &TextStyle) -> Result<bool, HostError> {
        Ok(Document::ensure_text_style(self, style.clone()))
    }

    fn refresh_instances(&mut self, name: &str) -> Result<usize, HostError> {
        if self.block(name).is_none() {
            return Err(HostError::ContainerNotFound(name.to_string()));
        }
        Ok(self.mark_references_modified(name))
    }

    fn place_instance(&mut self, name: &str, base: Vector3) -> Result<EntityId, HostError> {
        Ok(self.insert_block_reference(name, base)?)
    }

    fn model_space(&self) -> Vec<DrawingObject> {
        self.entities().map(|(_, entity)| entity.clone()).collect()
    }
}

/// 报表专用文字样式。
pub fn default_text_style() -> TextStyle {
    TextStyle {
        name: "Load Calcs".to_string(),
        height: 0.0,
        width_factor: 1.0,
        font_file: "Arial.ttf".to_string(),
    }
}

/// 名称中全部 `ID{n}` 标记。
pub fn id_tokens(name: &str) -> BTreeSet<u32> {
    ID_TOKEN
        .captures_iter(name)
        .filter_map(|caps| caps.get(1).and_then(|m| m.as_str().parse().ok()))
        .collect()
}

fn container_kind(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or_default()
}

/// 查找与 `name` 同类且 ID 标记集合完全相同的已有容器。
pub fn find_matching_container<H>(host: &H, name: &str) -> Option<String>
where
    H: DrawingHost + ?Sized,
{
    let wanted = id_tokens(name);
    if wanted.is_empty() {
        return None;
    }
    let kind = container_kind(name);
    host.container_names()
        .into_iter()
        .find(|candidate| container_kind(candidate) == kind && id_tokens(candidate) == wanted)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedReport {
    pub container_name: String,
    pub created: bool,
    pub entity_count: usize,
    pub refreshed_instances: usize,
    pub instance: Option<EntityId>,
}

/// 把生成好的报表写入同名容器：已有容器改名并清空后重建，否则新建。
///
/// 容器清空或新建之后的失败会在 `partial` 中带回容器名。
pub fn publish_set<H>(
    host: &mut H,
    container_name: &str,
    set: &DrawingObjectSet,
    text_style: &TextStyle,
    placement: Option<Vector3>,
) -> Result<PublishedReport, ContainerWriteError>
where
    H: DrawingHost + ?Sized,
{
    let created = prepare_container(host, container_name).map_err(|source| ContainerWriteError {
        partial: None,
        source,
    })?;
    let (entity_count, refreshed_instances, instance) =
        fill_container(host, container_name, set, text_style, placement).map_err(|source| {
            warn!(container = container_name, error = %source, "容器写入中断，内容不完整");
            ContainerWriteError {
                partial: Some(container_name.to_string()),
                source,
            }
        })?;

    info!(
        container = container_name,
        created,
        entities = entity_count,
        refreshed_instances,
        placed = instance.is_some(),
        "报表已写入容器"
    );
    Ok(PublishedReport {
        container_name: container_name.to_string(),
        created,
        entity_count,
        refreshed_instances,
        instance,
    })
}

fn prepare_container<H>(host: &mut H, container_name: &str) -> Result<bool, HostError>
where
    H: DrawingHost + ?Sized,
{
    match find_matching_container(host, container_name) {
        Some(existing) => {
            if existing != container_name {
                host.rename_container(&existing, container_name)?;
                debug!(from = %existing, to = container_name, "容器改名");
            }
            let removed = host.wipe_container(container_name)?;
            debug!(container = container_name, removed, "清空旧报表内容");
            Ok(false)
        }
        None => host.get_or_create_container(container_name),
    }
}

fn fill_container<H>(
    host: &mut H,
    container_name: &str,
    set: &DrawingObjectSet,
    text_style: &TextStyle,
    placement: Option<Vector3>,
) -> Result<(usize, usize, Option<EntityId>), HostError>
where
    H: DrawingHost + ?Sized,
{
    if !set.plain_texts.is_empty() {
        host.ensure_text_style(text_style)?;
    }
    let objects = set.objects();
    for object in &objects {
        host.create_entity(Space::Block(container_name), Vector3::ZERO, object)?;
    }
    let refreshed_instances = host.refresh_instances(container_name)?;
    let instance = placement
        .map(|point| host.place_instance(container_name, point))
        .transpose()?;
    Ok((objects.len(), refreshed_instances, instance))
}
