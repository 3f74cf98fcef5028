//! 会话：持有全部单元与建筑，负责 ID 分配以及批量生成/更新报表。

use loadcalc_core::document::TextStyle;
use loadcalc_core::drawing::DrawingObjectSet;
use loadcalc_core::geometry::Vector3;
use loadcalc_core::load::{BuildingInformation, UnitInformation, UnitLoad};
use loadcalc_core::template::{TemplateError, TemplateStore, UNIT_BODY_TEMPLATE, UNIT_HEADER_TEMPLATE};
use tracing::{info, warn};

use crate::building::{self, BuildingPlan};
use crate::demand::{LoadSheet, ServiceRatingTable, Totals, validate_unit};
use crate::errors::{EngineError, PublishError, ValidationError};
use crate::host::{DrawingHost, PublishedReport, default_text_style, publish_set};
use crate::report::{Report, ReportLayout, render, unit_report};

/// 单调递增的 ID 分配器，从 1 开始。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// 记录已存在的 ID，保证之后分配的值更大。
    pub fn observe(&mut self, id: u32) {
        self.next = self.next.max(id.saturating_add(1));
    }

    #[inline]
    pub fn peek(&self) -> u32 {
        self.next
    }
}

/// 重复 ID 修复记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdReassignment {
    pub name: String,
    pub old_id: u32,
    pub new_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedReport {
    pub report: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub published: Vec<PublishedReport>,
    pub skipped: Vec<SkippedReport>,
}

#[derive(Debug, Clone)]
pub struct Session {
    units: Vec<UnitInformation>,
    buildings: Vec<BuildingInformation>,
    unit_ids: IdAllocator,
    building_ids: IdAllocator,
    pub ratings: ServiceRatingTable,
    pub layout: ReportLayout,
    pub text_style: TextStyle,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ServiceRatingTable::default(), ReportLayout::default())
    }
}

impl Session {
    pub fn new(ratings: ServiceRatingTable, layout: ReportLayout) -> Self {
        Self {
            units: Vec::new(),
            buildings: Vec::new(),
            unit_ids: IdAllocator::default(),
            building_ids: IdAllocator::default(),
            ratings,
            layout,
            text_style: default_text_style(),
        }
    }

    /// 以已有数据构造会话，重复的单元 ID 会被修复。
    pub fn with_data(
        mut self,
        units: Vec<UnitInformation>,
        buildings: Vec<BuildingInformation>,
    ) -> (Self, Vec<IdReassignment>) {
        for unit in units {
            self.unit_ids.observe(unit.id);
            self.units.push(unit);
        }
        for building in buildings {
            self.building_ids.observe(building.id);
            self.buildings.push(building);
        }
        let repairs = self.repair_duplicate_unit_ids();
        (self, repairs)
    }

    #[inline]
    pub fn units(&self) -> &[UnitInformation] {
        &self.units
    }

    #[inline]
    pub fn buildings(&self) -> &[BuildingInformation] {
        &self.buildings
    }

    pub fn unit(&self, id: u32) -> Option<&UnitInformation> {
        self.units.iter().find(|unit| unit.id == id)
    }

    pub fn unit_mut(&mut self, id: u32) -> Option<&mut UnitInformation> {
        self.units.iter_mut().find(|unit| unit.id == id)
    }

    pub fn building(&self, id: u32) -> Option<&BuildingInformation> {
        self.buildings.iter().find(|building| building.id == id)
    }

    pub fn building_mut(&mut self, id: u32) -> Option<&mut BuildingInformation> {
        self.buildings.iter_mut().find(|building| building.id == id)
    }

    /// 新建带默认值的单元，返回其 ID。
    pub fn add_unit(&mut self, name: impl Into<String>) -> u32 {
        let id = self.unit_ids.allocate();
        self.units.push(UnitInformation::new(id, name));
        id
    }

    /// 插入外部单元；ID 已被占用或为 0 时重新分配。
    pub fn insert_unit(&mut self, mut unit: UnitInformation) -> u32 {
        if unit.id == 0 || self.unit(unit.id).is_some() {
            unit.id = self.unit_ids.allocate();
        } else {
            self.unit_ids.observe(unit.id);
        }
        let id = unit.id;
        self.units.push(unit);
        id
    }

    /// 删除单元并移除所有建筑中对它的计数。
    pub fn remove_unit(&mut self, id: u32) -> Result<UnitInformation, EngineError> {
        let index = self
            .units
            .iter()
            .position(|unit| unit.id == id)
            .ok_or(EngineError::UnitNotFound(id))?;
        let removed = self.units.remove(index);
        let touched = self
            .buildings
            .iter_mut()
            .map(|building| building.remove_unit(id))
            .filter(|changed| *changed)
            .count();
        info!(unit = id, buildings = touched, "删除单元");
        Ok(removed)
    }

    /// 复制单元的全部输入并分配新 ID。
    pub fn duplicate_unit(&mut self, id: u32) -> Result<u32, EngineError> {
        let mut copy = self.unit(id).cloned().ok_or(EngineError::UnitNotFound(id))?;
        copy.id = self.unit_ids.allocate();
        let new_id = copy.id;
        self.units.push(copy);
        Ok(new_id)
    }

    pub fn add_building(&mut self, name: impl Into<String>) -> u32 {
        let id = self.building_ids.allocate();
        self.buildings.push(BuildingInformation::new(id, name));
        id
    }

    pub fn insert_building(&mut self, mut building: BuildingInformation) -> u32 {
        if building.id == 0 || self.building(building.id).is_some() {
            building.id = self.building_ids.allocate();
        } else {
            self.building_ids.observe(building.id);
        }
        let id = building.id;
        self.buildings.push(building);
        id
    }

    pub fn duplicate_building(&mut self, id: u32) -> Result<u32, EngineError> {
        let mut copy = self
            .building(id)
            .cloned()
            .ok_or(EngineError::BuildingNotFound(id))?;
        copy.id = self.building_ids.allocate();
        let new_id = copy.id;
        self.buildings.push(copy);
        Ok(new_id)
    }

    /// 设置建筑中某单元的数量；单元必须存在。
    pub fn set_unit_count(&mut self, building_id: u32, unit_id: u32, count: u32) -> Result<(), EngineError> {
        if self.unit(unit_id).is_none() {
            return Err(EngineError::UnitNotFound(unit_id));
        }
        let building = self
            .building_mut(building_id)
            .ok_or(EngineError::BuildingNotFound(building_id))?;
        building.set_count(unit_id, count);
        Ok(())
    }

    /// 每个重复 ID 的后续出现依次改为当前最大 ID + 1。
    pub fn repair_duplicate_unit_ids(&mut self) -> Vec<IdReassignment> {
        let mut max_id = self.units.iter().map(|unit| unit.id).max().unwrap_or(0);
        let mut seen = std::collections::HashSet::new();
        let mut repairs = Vec::new();
        for unit in &mut self.units {
            if seen.insert(unit.id) {
                continue;
            }
            max_id += 1;
            warn!(unit = %unit.name, old_id = unit.id, new_id = max_id, "单元 ID 重复，已重新分配");
            repairs.push(IdReassignment {
                name: unit.name.clone(),
                old_id: unit.id,
                new_id: max_id,
            });
            unit.id = max_id;
            seen.insert(max_id);
        }
        self.unit_ids.observe(max_id);
        repairs
    }

    pub fn totals_for(&self, unit_id: u32) -> Result<Totals, EngineError> {
        let unit = self.unit(unit_id).ok_or(EngineError::UnitNotFound(unit_id))?;
        Ok(LoadSheet::for_unit(unit)?.totals(&self.ratings))
    }

    /// 校验全部输入并生成所有报表的行数据（单元、双单元合并、建筑汇总）。
    pub fn reports(&self) -> Result<Vec<Report>, ValidationError> {
        let mut reports = Vec::new();
        for unit in &self.units {
            validate_unit(unit)?;
        }
        for building in &self.buildings {
            building::validate_building(building, &self.units)?;
        }
        for unit in &self.units {
            let sheet = LoadSheet::for_unit(unit)?;
            reports.push(unit_report(&sheet, &sheet.totals(&self.ratings)));
        }
        for building in &self.buildings {
            if let Some(sheet) = building::combo_sheet(building, &self.units)? {
                reports.push(unit_report(&sheet, &sheet.totals(&self.ratings)));
            }
        }
        for building in &self.buildings {
            if building::plan_for(building) == BuildingPlan::Aggregate {
                let aggregate = building::aggregate(building, &self.units, &self.ratings)?;
                reports.push(building::building_report(&aggregate));
            }
        }
        Ok(reports)
    }

    /// 批量生成（`placement` 为插入起点）或更新（`None`，只重建容器）全部报表。
    ///
    /// 校验失败时不触碰宿主；缺少模板只跳过当前报表；宿主错误中止整批。
    pub fn publish_all<H, T>(
        &self,
        host: &mut H,
        templates: &T,
        placement: Option<Vector3>,
    ) -> Result<BatchOutcome, PublishError>
    where
        H: DrawingHost + ?Sized,
        T: TemplateStore + ?Sized,
    {
        let reports = self.reports()?;
        let mut outcome = BatchOutcome::default();
        let mut point = placement;
        for report in &reports {
            let instance_point = point;
            if let Some(current) = point.as_mut() {
                *current = current.translate(Vector3::xy(-self.layout.width, 0.0));
            }
            let set = match load_templates(templates).and_then(|(header, body)| {
                render(report, &header, &body, &self.layout)
            }) {
                Ok(set) => set,
                Err(err) => {
                    warn!(report = %report.container_name, error = %err, "模板不可用，跳过报表");
                    outcome.skipped.push(SkippedReport {
                        report: report.container_name.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            match publish_set(host, &report.container_name, &set, &self.text_style, instance_point) {
                Ok(published) => outcome.published.push(published),
                Err(failure) => {
                    return Err(PublishError::Host {
                        completed: outcome
                            .published
                            .iter()
                            .map(|published| published.container_name.clone())
                            .collect(),
                        partial: failure.partial,
                        source: failure.source,
                    });
                }
            }
        }
        info!(
            published = outcome.published.len(),
            skipped = outcome.skipped.len(),
            create = placement.is_some(),
            "负荷计算批处理完成"
        );
        Ok(outcome)
    }

    /// 两个示例单元与一栋两单元建筑，供 CLI 演示使用。
    pub fn demo() -> Self {
        let mut session = Self::default();
        let a = session.add_unit("A");
        let b = session.add_unit("B");
        if let Some(unit) = session.unit_mut(a) {
            unit.dwelling_area.floor_area = "1200".to_string();
            unit.general_loads.set_lighting_from_floor_area(1200);
            unit.general_loads.dishwasher.va = 1_200;
            unit.general_loads.water_heater.va = 4_500;
            unit.ac_loads.condenser = 3_000;
            unit.ac_loads.fan_coil = 500;
        }
        if let Some(unit) = session.unit_mut(b) {
            unit.dwelling_area.floor_area = "950".to_string();
            unit.general_loads.set_lighting_from_floor_area(950);
            unit.general_loads.range.va = 8_000;
            unit.custom_loads.push(UnitLoad::new("Fireplace", 500, 1));
        }
        let building = session.add_building("Duplex");
        if let Some(duplex) = session.building_mut(building) {
            duplex.set_count(a, 1);
            duplex.set_count(b, 1);
        }
        session
    }
}

fn load_templates<T>(
    templates: &T,
) -> Result<(DrawingObjectSet, DrawingObjectSet), TemplateError>
where
    T: TemplateStore + ?Sized,
{
    Ok((
        templates.load(UNIT_HEADER_TEMPLATE)?,
        templates.load(UNIT_BODY_TEMPLATE)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HostError;
    use loadcalc_core::document::{Document, EntityId, Space};
    use loadcalc_core::drawing::{DrawingObject, RichText};
    use loadcalc_core::template::MemoryTemplateStore;

    fn templates() -> MemoryTemplateStore {
        let mut header = DrawingObjectSet::new();
        header.push(RichText {
            contents: "SERVICE LOAD CALCULATION".to_string(),
            ..RichText::default()
        });
        let mut body = DrawingObjectSet::new();
        body.push(RichText {
            justification: "TopLeft".to_string(),
            contents: "Title".to_string(),
            location: Vector3::xy(-6.9, -0.08),
            ..RichText::default()
        });
        body.push(RichText {
            justification: "TopRight".to_string(),
            contents: "Subtitle VA".to_string(),
            location: Vector3::xy(-0.1, -0.08),
            ..RichText::default()
        });
        MemoryTemplateStore::new()
            .with_template(UNIT_HEADER_TEMPLATE, header)
            .with_template(UNIT_BODY_TEMPLATE, body)
    }

    /// 在第 N 次创建图元时失败的宿主。
    struct FailingHost {
        inner: Document,
        remaining: usize,
    }

    impl DrawingHost for FailingHost {
        fn container_names(&self) -> Vec<String> {
            self.inner.container_names()
        }
        fn get_or_create_container(&mut self, name: &str) -> Result<bool, HostError> {
            self.inner.get_or_create_container(name)
        }
        fn rename_container(&mut self, from: &str, to: &str) -> Result<(), HostError> {
            self.inner.rename_container(from, to)
        }
        fn wipe_container(&mut self, name: &str) -> Result<usize, HostError> {
            self.inner.wipe_container(name)
        }
        fn create_entity(
            &mut self,
            space: Space<'_>,
            base: Vector3,
            object: &DrawingObject,
        ) -> Result<EntityId, HostError> {
            if self.remaining == 0 {
                return Err(HostError::Rejected {
                    operation: "create_entity",
                    message: "document locked".to_string(),
                });
            }
            self.remaining -= 1;
            self.inner.create_entity(space, base, object)
        }
        fn ensure_text_style(&mut self, style: &TextStyle) -> Result<bool, HostError> {
            DrawingHost::ensure_text_style(&mut self.inner, style)
        }
        fn refresh_instances(&mut self, name: &str) -> Result<usize, HostError> {
            self.inner.refresh_instances(name)
        }
        fn place_instance(&mut self, name: &str, base: Vector3) -> Result<EntityId, HostError> {
            self.inner.place_instance(name, base)
        }
        fn model_space(&self) -> Vec<DrawingObject> {
            self.inner.model_space()
        }
    }

    #[test]
    fn allocator_skips_observed_ids() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.allocate(), 1);
        ids.observe(7);
        assert_eq!(ids.allocate(), 8);
        ids.observe(3);
        assert_eq!(ids.peek(), 9);
    }

    #[test]
    fn duplicate_ids_are_reassigned_after_maximum() {
        let units = vec![
            UnitInformation::new(2, "A"),
            UnitInformation::new(2, "B"),
            UnitInformation::new(5, "C"),
            UnitInformation::new(2, "D"),
        ];
        let (mut session, repairs) = Session::default().with_data(units, Vec::new());
        assert_eq!(
            repairs,
            vec![
                IdReassignment { name: "B".into(), old_id: 2, new_id: 6 },
                IdReassignment { name: "D".into(), old_id: 2, new_id: 7 },
            ]
        );
        let ids: Vec<u32> = session.units().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![2, 6, 5, 7]);
        assert_eq!(session.add_unit("E"), 8);
    }

    #[test]
    fn removing_unit_cascades_into_buildings() {
        let mut session = Session::default();
        let a = session.add_unit("A");
        let b = session.add_unit("B");
        let building = session.add_building("North");
        session.set_unit_count(building, a, 2).expect("设置数量");
        session.set_unit_count(building, b, 1).expect("设置数量");
        assert!(matches!(
            session.set_unit_count(building, 99, 1),
            Err(EngineError::UnitNotFound(99))
        ));

        session.remove_unit(a).expect("删除单元");
        let north = session.building(building).expect("建筑仍在");
        assert_eq!(north.total_number_of_units(), 1);
        assert!(matches!(session.remove_unit(a), Err(EngineError::UnitNotFound(_))));
    }

    #[test]
    fn duplicates_get_fresh_ids() {
        let mut session = Session::default();
        let a = session.add_unit("A");
        session.unit_mut(a).expect("单元").ac_loads.condenser = 1_000;
        let copy = session.duplicate_unit(a).expect("复制单元");
        assert_ne!(copy, a);
        assert_eq!(session.unit(copy).map(|u| u.ac_loads.condenser), Some(1_000));

        let building = session.add_building("North");
        let building_copy = session.duplicate_building(building).expect("复制建筑");
        assert_eq!(building_copy, building + 1);
        assert_eq!(session.insert_unit(UnitInformation::new(a, "Clash")), copy + 1);
    }

    #[test]
    fn publish_all_creates_units_and_combo() {
        let session = Session::demo();
        let mut doc = Document::new();
        let outcome = session
            .publish_all(&mut doc, &templates(), Some(Vector3::ZERO))
            .expect("批量生成");
        let names: Vec<&str> = outcome
            .published
            .iter()
            .map(|p| p.container_name.as_str())
            .collect();
        assert_eq!(names, vec!["Unit A ID1", "Unit B ID2", "Unit A ID1 & B ID2"]);
        assert!(outcome.skipped.is_empty());

        let inserts: Vec<f64> = doc.block_references().map(|r| r.insert.x()).collect();
        assert_eq!(inserts, vec![0.0, -7.0, -14.0]);

        // 更新不新增参照，只刷新
        let again = session.publish_all(&mut doc, &templates(), None).expect("批量更新");
        assert!(again.published.iter().all(|p| !p.created && p.instance.is_none()));
        assert_eq!(doc.block_references().count(), 3);
        assert!(doc.block_references().all(|r| r.graphics_revision == 1));
    }

    #[test]
    fn validation_failure_touches_nothing() {
        let mut session = Session::demo();
        session.unit_mut(1).expect("单元").dwelling_area.floor_area = "big".to_string();
        let mut doc = Document::new();
        assert!(matches!(
            session.publish_all(&mut doc, &templates(), Some(Vector3::ZERO)),
            Err(PublishError::Validation(ValidationError::FloorArea { .. }))
        ));
        assert!(doc.container_names().is_empty());
    }

    #[test]
    fn missing_templates_skip_reports() {
        let session = Session::demo();
        let mut store = templates();
        store.remove(UNIT_BODY_TEMPLATE);
        let mut doc = Document::new();
        let outcome = session
            .publish_all(&mut doc, &store, Some(Vector3::ZERO))
            .expect("批处理继续");
        assert!(outcome.published.is_empty());
        assert_eq!(outcome.skipped.len(), 3);
        assert!(outcome.skipped[0].reason.contains(UNIT_BODY_TEMPLATE));
    }

    #[test]
    fn host_failure_aborts_batch_with_progress() {
        let session = Session::demo();
        let mut doc = Document::new();
        let first_size = {
            let outcome = session
                .publish_all(&mut doc, &templates(), None)
                .expect("统计图元数量");
            outcome.published[0].entity_count
        };
        let mut host = FailingHost {
            inner: Document::new(),
            remaining: first_size + 1,
        };
        match session.publish_all(&mut host, &templates(), None) {
            Err(PublishError::Host { completed, partial, source }) => {
                assert_eq!(completed, vec!["Unit A ID1".to_string()]);
                assert_eq!(partial.as_deref(), Some("Unit B ID2"));
                assert_eq!(host.inner.block("Unit B ID2").map(|b| b.entities.len()), Some(1));
                assert!(matches!(source, HostError::Rejected { .. }));
            }
            other => panic!("expected host failure, got {other:?}"),
        }
    }

    #[test]
    fn building_with_three_units_gets_aggregate_report() {
        let mut session = Session::demo();
        let building = session.buildings()[0].id;
        session.set_unit_count(building, 1, 2).expect("设置数量");
        let reports = session.reports().expect("生成报表");
        let names: Vec<&str> = reports.iter().map(|r| r.container_name.as_str()).collect();
        assert_eq!(names, vec!["Unit A ID1", "Unit B ID2", "Building Duplex ID1"]);
        assert!(session.totals_for(1).is_ok());
        assert!(matches!(session.totals_for(42), Err(EngineError::UnitNotFound(42))));
    }
}
