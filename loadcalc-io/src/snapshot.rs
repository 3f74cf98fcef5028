//! 单元与建筑的时间戳快照。
//!
//! 目录布局：`{root}/Unit/Unit {名称} - ID{id}/{yyyyMMddHHmmss}.json`，建筑同理放在
//! `{root}/Building` 下。读取时每个目录只取最新的文件。

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use loadcalc_core::load::{BuildingInformation, UnitInformation};
use loadcalc_engine::demand::{LoadSheet, ServiceRatingTable, Totals};
use loadcalc_engine::report::ReportLayout;
use loadcalc_engine::session::{IdReassignment, Session};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{IoError, read_json, write_json};

const UNIT_DIR: &str = "Unit";
const BUILDING_DIR: &str = "Building";

static UNIT_SNAPSHOT_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Unit .+ - ID(\d+)$").expect("单元目录正则有效"));

/// 写入快照时附带推导出的汇总值，读取时忽略。
#[derive(Serialize)]
struct UnitSnapshot<'a> {
    #[serde(flatten)]
    unit: &'a UnitInformation,
    #[serde(rename = "Totals", skip_serializing_if = "Option::is_none")]
    totals: Option<Totals>,
}

/// 去掉文件名中不允许出现的字符。
pub fn filter_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect()
}

fn unit_dir_name(unit: &UnitInformation) -> String {
    format!("Unit {} - ID{}", filter_file_name(&unit.name), unit.id)
}

fn building_dir_name(building: &BuildingInformation) -> String {
    format!("Building {} - ID{}", filter_file_name(&building.name), building.id)
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}

fn read_dir_error(path: &Path, source: std::io::Error) -> IoError {
    IoError::ReadError {
        path: path.to_path_buf(),
        source,
    }
}

/// 列出子目录；目录不存在时返回空。
fn subdirectories(path: &Path) -> Result<Vec<PathBuf>, IoError> {
    if !path.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(path)
        .map_err(|source| read_dir_error(path, source))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// 目录中文件名最大的 `.json`（时间戳命名，字典序即时间序）。
fn newest_snapshot(dir: &Path) -> Result<Option<PathBuf>, IoError> {
    let newest = fs::read_dir(dir)
        .map_err(|source| read_dir_error(dir, source))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .max_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(newest)
}

fn remove_dir(path: &Path) -> Result<(), IoError> {
    fs::remove_dir_all(path).map_err(|source| IoError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 从另一份快照导入的结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub units: usize,
    pub buildings: usize,
    /// 源 ID → 新 ID。
    pub unit_id_map: HashMap<u32, u32>,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unit_root(&self) -> PathBuf {
        self.root.join(UNIT_DIR)
    }

    fn building_root(&self) -> PathBuf {
        self.root.join(BUILDING_DIR)
    }

    pub fn unit_dir(&self, unit: &UnitInformation) -> PathBuf {
        self.unit_root().join(unit_dir_name(unit))
    }

    pub fn building_dir(&self, building: &BuildingInformation) -> PathBuf {
        self.building_root().join(building_dir_name(building))
    }

    /// 为每个单元写入一份新快照，并清理已不对应任何单元的旧目录（改名或删除）。
    pub fn save_units(&self, units: &[UnitInformation], ratings: &ServiceRatingTable) -> Result<usize, IoError> {
        let stamp = timestamp();
        let mut current = BTreeSet::new();
        for unit in units {
            let totals = match LoadSheet::for_unit(unit) {
                Ok(sheet) => Some(sheet.totals(ratings)),
                Err(err) => {
                    warn!(unit = %unit.name, error = %err, "单元输入无效，快照不含汇总值");
                    None
                }
            };
            let dir = self.unit_dir(unit);
            write_json(&dir.join(format!("{stamp}.json")), &UnitSnapshot { unit, totals })?;
            current.insert(dir_name(&dir));
        }

        for dir in subdirectories(&self.unit_root())? {
            let name = dir_name(&dir);
            if UNIT_SNAPSHOT_DIR.is_match(&name) && !current.contains(&name) {
                debug!(dir = %dir.display(), "清理过期单元快照目录");
                remove_dir(&dir)?;
            }
        }
        info!(root = %self.root.display(), units = units.len(), "单元快照已保存");
        Ok(units.len())
    }

    /// 建筑快照整体替换：先删除所有 `Building *` 目录再写入。
    pub fn save_buildings(&self, buildings: &[BuildingInformation]) -> Result<usize, IoError> {
        for dir in subdirectories(&self.building_root())? {
            if dir_name(&dir).starts_with("Building ") {
                remove_dir(&dir)?;
            }
        }
        let stamp = timestamp();
        for building in buildings {
            write_json(&self.building_dir(building).join(format!("{stamp}.json")), building)?;
        }
        info!(root = %self.root.display(), buildings = buildings.len(), "建筑快照已保存");
        Ok(buildings.len())
    }

    pub fn save_session(&self, session: &Session) -> Result<(), IoError> {
        self.save_units(session.units(), &session.ratings)?;
        self.save_buildings(session.buildings())?;
        Ok(())
    }

    pub fn load_units(&self) -> Result<Vec<UnitInformation>, IoError> {
        self.load_newest(&self.unit_root())
    }

    pub fn load_buildings(&self) -> Result<Vec<BuildingInformation>, IoError> {
        self.load_newest(&self.building_root())
    }

    fn load_newest<T>(&self, root: &Path) -> Result<Vec<T>, IoError>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let mut items = Vec::new();
        for dir in subdirectories(root)? {
            match newest_snapshot(&dir)? {
                Some(path) => {
                    debug!(path = %path.display(), "读取快照");
                    items.push(read_json(&path)?);
                }
                None => debug!(dir = %dir.display(), "目录中没有快照"),
            }
        }
        Ok(items)
    }

    /// 读取全部快照并构造会话，返回重复 ID 的修复记录。
    pub fn load_session(
        &self,
        ratings: ServiceRatingTable,
        layout: ReportLayout,
    ) -> Result<(Session, Vec<IdReassignment>), IoError> {
        let units = self.load_units()?;
        let buildings = self.load_buildings()?;
        info!(
            root = %self.root.display(),
            units = units.len(),
            buildings = buildings.len(),
            "快照已读取"
        );
        Ok(Session::new(ratings, layout).with_data(units, buildings))
    }

    /// 删除某单元的全部快照目录（按 ID 匹配，不依赖当前名称）。
    pub fn delete_unit(&self, unit_id: u32) -> Result<usize, IoError> {
        let mut removed = 0;
        for dir in subdirectories(&self.unit_root())? {
            let matches_id = UNIT_SNAPSHOT_DIR
                .captures(&dir_name(&dir))
                .and_then(|caps| caps.get(1))
                .and_then(|id| id.as_str().parse::<u32>().ok())
                == Some(unit_id);
            if matches_id {
                remove_dir(&dir)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// 把另一份快照中的单元与建筑追加到会话中。
    ///
    /// 导入的对象一律分配新 ID，建筑计数器随之改写；指向源中不存在单元的计数器被丢弃。
    pub fn import_into(source_root: &Path, session: &mut Session) -> Result<ImportSummary, IoError> {
        let source = SnapshotStore::new(source_root);
        let units = source.load_units()?;
        let buildings = source.load_buildings()?;

        let mut summary = ImportSummary::default();
        for mut unit in units {
            let old_id = unit.id;
            unit.id = 0;
            let new_id = session.insert_unit(unit);
            if summary.unit_id_map.insert(old_id, new_id).is_some() {
                warn!(old_id, new_id, "导入源中单元 ID 重复，计数器指向最后一个");
            }
            summary.units += 1;
        }
        for mut building in buildings {
            building.id = 0;
            building.counters.retain_mut(|counter| match summary.unit_id_map.get(&counter.unit_id) {
                Some(new_id) => {
                    counter.unit_id = *new_id;
                    true
                }
                None => {
                    warn!(building = %building.name, unit_id = counter.unit_id, "导入的建筑引用未知单元，已忽略");
                    false
                }
            });
            session.insert_building(building);
            summary.buildings += 1;
        }
        info!(
            source = %source_root.display(),
            units = summary.units,
            buildings = summary.buildings,
            "快照已导入"
        );
        Ok(summary)
    }
}
