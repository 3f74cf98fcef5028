use std::path::PathBuf;

use loadcalc_config::{AppConfig, LayoutConfig, TextStyleConfig};
use loadcalc_core::document::TextStyle;
use loadcalc_engine::demand::ServiceRatingTable;
use loadcalc_engine::report::ReportLayout;
use loadcalc_engine::session::{IdReassignment, Session};
use loadcalc_io::{JsonTemplateStore, ProjectFile, SnapshotStore};
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 会话数据来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSource {
    /// 快照根目录（`Unit/`、`Building/`）。
    Snapshots(PathBuf),
    /// 单文件工程 JSON。
    Project(PathBuf),
    Demo,
}

/// 加载后的会话与元信息。
#[derive(Debug)]
pub struct LoadedSession {
    pub session: Session,
    pub source: SessionSource,
    pub repairs: Vec<IdReassignment>,
}

pub fn ratings_from_config(config: &AppConfig) -> ServiceRatingTable {
    ServiceRatingTable::new(config.service.standard_ratings.clone())
}

pub fn layout_from_config(layout: &LayoutConfig) -> ReportLayout {
    ReportLayout {
        row_height: layout.row_height,
        margin_top: layout.margin_top,
        margin_bottom: layout.margin_bottom,
        width: layout.width,
        header_height: layout.header_height,
        frame_layer: layout.frame_layer.clone(),
        ..ReportLayout::default()
    }
}

pub fn text_style_from_config(style: &TextStyleConfig) -> TextStyle {
    TextStyle {
        name: style.name.clone(),
        height: style.height,
        width_factor: style.width_factor,
        font_file: style.font_file.clone(),
    }
}

pub fn template_store(config: &AppConfig) -> JsonTemplateStore {
    JsonTemplateStore::new(config.templates.directory.clone())
        .with_embedded_defaults(config.templates.use_embedded)
}

/// 按来源构造会话，并套用配置中的额定值表、排版与文字样式。
pub fn load_session(source: SessionSource, config: &AppConfig) -> Result<LoadedSession, FrontendError> {
    let ratings = ratings_from_config(config);
    let mut layout = layout_from_config(&config.layout);
    let text_style = text_style_from_config(&config.text_style);
    layout.text_style = text_style.name.clone();

    let (mut session, repairs) = match &source {
        SessionSource::Snapshots(root) => SnapshotStore::new(root).load_session(ratings, layout)?,
        SessionSource::Project(path) => {
            let project = ProjectFile::load(path)?;
            Session::new(ratings, layout).with_data(project.units, project.buildings)
        }
        SessionSource::Demo => {
            let mut session = Session::demo();
            session.ratings = ratings;
            session.layout = layout;
            (session, Vec::new())
        }
    };
    session.text_style = text_style;

    for repair in &repairs {
        warn!(unit = %repair.name, old_id = repair.old_id, new_id = repair.new_id, "加载时修复重复单元 ID");
    }
    info!(
        source = ?source,
        units = session.units().len(),
        buildings = session.buildings().len(),
        "会话已加载"
    );
    Ok(LoadedSession {
        session,
        source,
        repairs,
    })
}

/// 读取配置，失败时使用默认值。
pub fn load_app_config() -> AppConfig {
    match AppConfig::discover() {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(error = %err, "读取配置失败，使用默认配置");
            AppConfig::default()
        }
    }
}
