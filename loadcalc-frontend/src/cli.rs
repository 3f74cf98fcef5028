use std::path::{Path, PathBuf};

use loadcalc_config::AppConfig;
use loadcalc_core::document::{Document, Space};
use loadcalc_core::drawing::DrawingObject;
use loadcalc_core::geometry::{Bounds2D, Vector3};
use loadcalc_engine::command::{CommandBus, CommandContext, CommandRequest};
use loadcalc_engine::demand::Totals;
use loadcalc_engine::host::DrawingHost;
use loadcalc_engine::session::Session;
use loadcalc_io::{
    DocumentLoader, DocumentSaver, JsonDocumentFacade, SnapshotStore, read_entities, write_entities,
};
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{LoadedSession, SessionSource, load_session, template_store};

/// 批量生成（在指定点插入）或仅更新已有报表。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalculationMode {
    Create { at: Vector3 },
    Update,
}

#[derive(Debug, Clone)]
pub struct CalculateOptions {
    pub source: SessionSource,
    pub mode: CalculationMode,
    /// 已有图纸（JSON），更新模式下通常需要。
    pub document: Option<PathBuf>,
    /// 输出图纸（JSON）。
    pub output: Option<PathBuf>,
    /// 计算后把会话写回该快照根目录。
    pub save_snapshots: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitSummary {
    pub id: u32,
    pub name: String,
    pub totals: Option<Totals>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalculationSummary {
    pub units: Vec<UnitSummary>,
    pub containers: Vec<String>,
    /// 参照展开后的图纸范围。
    pub extents: Option<Bounds2D>,
    pub message: String,
}

fn dispatch_cli_command(
    bus: &CommandBus,
    request: CommandRequest,
    context: &mut CommandContext<'_>,
) -> Result<String, FrontendError> {
    let response = bus.dispatch(&request, context);
    let message = response.message.unwrap_or_default();
    if response.success {
        info!(command = %request.name, %message, "命令执行成功");
        Ok(message)
    } else {
        Err(FrontendError::Command {
            command: request.name,
            message,
        })
    }
}

fn point_args(point: Vector3) -> [String; 2] {
    [point.x().to_string(), point.y().to_string()]
}

fn open_document(path: Option<&Path>) -> Result<Document, FrontendError> {
    match path {
        Some(path) if path.exists() => Ok(JsonDocumentFacade::new().load(path)?),
        Some(path) => {
            warn!(path = %path.display(), "图纸文件不存在，使用空白图纸");
            Ok(Document::new())
        }
        None => Ok(Document::new()),
    }
}

/// 执行负荷计算并把报表写入图纸。
pub fn run_calculate(config: &AppConfig, options: CalculateOptions) -> Result<CalculationSummary, FrontendError> {
    let LoadedSession { mut session, .. } = load_session(options.source.clone(), config)?;
    let mut document = open_document(options.document.as_deref())?;
    let mut templates = template_store(config);

    let args: Vec<String> = match options.mode {
        CalculationMode::Create { at } => std::iter::once("create".to_string())
            .chain(point_args(at))
            .collect(),
        CalculationMode::Update => vec!["update".to_string()],
    };
    let bus = CommandBus::new();
    let message = {
        let mut context = CommandContext {
            session: &mut session,
            host: &mut document,
            templates: &mut templates,
        };
        dispatch_cli_command(&bus, CommandRequest::new("load_calculation", args), &mut context)?
    };

    if let Some(path) = &options.output {
        JsonDocumentFacade::new().save(&document, path)?;
        info!(path = %path.display(), "图纸已保存");
    }
    if let Some(root) = &options.save_snapshots {
        SnapshotStore::new(root).save_session(&session)?;
    }

    Ok(CalculationSummary {
        units: unit_summaries(&session),
        containers: document.container_names(),
        extents: document.bounds(),
        message,
    })
}

fn unit_summaries(session: &Session) -> Vec<UnitSummary> {
    session
        .units()
        .iter()
        .map(|unit| UnitSummary {
            id: unit.id,
            name: unit.name.clone(),
            totals: session.totals_for(unit.id).ok(),
        })
        .collect()
}

pub fn print_summary(summary: &CalculationSummary) {
    println!("[命令] {}", summary.message);
    println!("单元负荷：");
    for unit in &summary.units {
        match &unit.totals {
            Some(totals) => println!(
                "  - Unit {} (ID{}): 一般负荷 {}VA, 空调 {}VA, 附加 {}VA, 服务电流 {:.2}A, 额定 {}A",
                unit.name,
                unit.id,
                totals.subtotal_general_load,
                totals.total_ac_load,
                totals.custom_load,
                totals.service_load,
                totals.service_rating
            ),
            None => println!("  - Unit {} (ID{}): 输入无效", unit.name, unit.id),
        }
    }
    println!("图纸中的报表容器：");
    for name in &summary.containers {
        println!("  - {name}");
    }
    if let Some(bounds) = &summary.extents {
        println!(
            "图纸范围: 左下角=({:.2}, {:.2}), 宽={:.2}, 高={:.2}",
            bounds.min().x(),
            bounds.min().y(),
            bounds.width(),
            bounds.height()
        );
    }
}

/// 截取实体文件中的图元，以 `origin` 为原点保存为模板，返回模板文件路径。
pub fn run_capture(
    config: &AppConfig,
    entities: &Path,
    name: &str,
    origin: Vector3,
) -> Result<PathBuf, FrontendError> {
    let objects = read_entities(entities)?;
    let mut document = Document::new();
    for object in &objects {
        DrawingHost::create_entity(&mut document, Space::Model, Vector3::ZERO, object).map_err(
            |err| FrontendError::Command {
                command: "capture_template".to_string(),
                message: err.to_string(),
            },
        )?;
    }
    let mut session = Session::default();
    let mut templates = template_store(config);
    let request = CommandRequest::new(
        "capture_template",
        std::iter::once(name.to_string()).chain(point_args(origin)),
    );
    {
        let mut context = CommandContext {
            session: &mut session,
            host: &mut document,
            templates: &mut templates,
        };
        dispatch_cli_command(&CommandBus::new(), request, &mut context)?;
    }
    Ok(templates.path_for(name))
}

/// 在 `base` 处还原模板，返回绝对坐标图元；给出 `output` 时同时写入文件。
pub fn run_instantiate(
    config: &AppConfig,
    name: &str,
    base: Vector3,
    output: Option<&Path>,
) -> Result<Vec<DrawingObject>, FrontendError> {
    let mut document = Document::new();
    let mut session = Session::default();
    let mut templates = template_store(config);
    let request = CommandRequest::new(
        "instantiate_template",
        std::iter::once(name.to_string()).chain(point_args(base)),
    );
    {
        let mut context = CommandContext {
            session: &mut session,
            host: &mut document,
            templates: &mut templates,
        };
        dispatch_cli_command(&CommandBus::new(), request, &mut context)?;
    }
    let placed = document.model_space();
    if let Some(path) = output {
        write_entities(path, &placed)?;
    }
    Ok(placed)
}

pub fn entities_to_json(entities: &[DrawingObject]) -> Result<String, FrontendError> {
    serde_json::to_string_pretty(entities).map_err(FrontendError::Output)
}

/// 命令总线中注册的命令，按名称排序。
pub fn available_commands() -> Vec<&'static str> {
    let bus = CommandBus::new();
    let mut names: Vec<&'static str> = bus.available_commands().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadcalc_core::drawing::Line;
    use loadcalc_core::template::UNIT_HEADER_TEMPLATE;

    fn config_with_templates(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.templates.directory = dir.to_path_buf();
        config
    }

    #[test]
    fn demo_calculation_creates_unit_and_combo_reports() {
        let dir = tempfile::tempdir().expect("临时目录");
        let output = dir.path().join("drawing.json");
        let config = config_with_templates(&dir.path().join("templates"));
        let summary = run_calculate(
            &config,
            CalculateOptions {
                source: SessionSource::Demo,
                mode: CalculationMode::Create { at: Vector3::ZERO },
                document: None,
                output: Some(output.clone()),
                save_snapshots: Some(dir.path().join("snapshots")),
            },
        )
        .expect("演示计算");

        assert_eq!(summary.units.len(), 2);
        assert!(summary.units.iter().all(|unit| unit.totals.is_some()));
        assert_eq!(summary.containers.len(), 3);
        let extents = summary.extents.expect("图纸有范围");
        assert!(extents.width() > 0.0 && extents.height() > 0.0);
        assert!(extents.min().y() < 0.0);
        assert!(output.is_file());
        assert!(dir.path().join("snapshots").join("Unit").is_dir());

        // 在已有图纸上更新不会新增参照
        let updated = run_calculate(
            &config,
            CalculateOptions {
                source: SessionSource::Snapshots(dir.path().join("snapshots")),
                mode: CalculationMode::Update,
                document: Some(output.clone()),
                output: Some(output.clone()),
                save_snapshots: None,
            },
        )
        .expect("更新");
        assert_eq!(updated.containers, summary.containers);
        let document = JsonDocumentFacade::new().load(&output).expect("读取图纸");
        assert_eq!(document.block_references().count(), 3);
    }

    #[test]
    fn capture_then_instantiate_moves_entities() {
        let dir = tempfile::tempdir().expect("临时目录");
        let config = config_with_templates(&dir.path().join("templates"));
        let entities = dir.path().join("entities.json");
        write_entities(
            &entities,
            &[DrawingObject::Line(Line {
                layer: "E-TEXT".to_string(),
                start: Vector3::xy(5.0, 5.0),
                end: Vector3::xy(6.0, 5.0),
            })],
        )
        .expect("写入图元");

        let path = run_capture(&config, &entities, "Stub", Vector3::xy(5.0, 5.0)).expect("截取");
        assert!(path.is_file());

        let placed = run_instantiate(&config, "Stub", Vector3::xy(1.0, 2.0), None).expect("放置");
        match placed.as_slice() {
            [DrawingObject::Line(line)] => {
                assert_eq!(line.start, Vector3::xy(1.0, 2.0));
                assert_eq!(line.end, Vector3::xy(2.0, 2.0));
            }
            other => panic!("unexpected entities: {other:?}"),
        }
        assert!(entities_to_json(&placed).expect("序列化").contains("LineData"));
    }

    #[test]
    fn embedded_templates_can_be_instantiated() {
        let dir = tempfile::tempdir().expect("临时目录");
        let config = config_with_templates(dir.path());
        let placed = run_instantiate(&config, UNIT_HEADER_TEMPLATE, Vector3::ZERO, None).expect("放置页眉");
        assert!(!placed.is_empty());
        assert!(matches!(
            run_instantiate(&config, "Missing", Vector3::ZERO, None),
            Err(FrontendError::Command { .. })
        ));
        assert_eq!(
            available_commands(),
            vec!["capture_template", "instantiate_template", "load_calculation"]
        );
    }
}
