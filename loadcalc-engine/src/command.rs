use std::collections::HashMap;

use loadcalc_core::document::Space;
use loadcalc_core::geometry::Vector3;
use loadcalc_core::template::TemplateStore;
use loadcalc_core::transform::capture_relative;

use crate::host::DrawingHost;
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut Session,
    pub host: &'a mut dyn DrawingHost,
    pub templates: &'a mut dyn TemplateStore,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(LoadCalculationCommand);
        bus.register(CaptureTemplateCommand);
        bus.register(InstantiateTemplateCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

/// 解析 `x y` 两个参数；缺省时为 `None`。
fn parse_point(args: &[String]) -> Result<Option<Vector3>, String> {
    match args {
        [] => Ok(None),
        [x, y] => {
            let x: f64 = x.parse().map_err(|_| format!("无法解析坐标: {x}"))?;
            let y: f64 = y.parse().map_err(|_| format!("无法解析坐标: {y}"))?;
            Ok(Some(Vector3::xy(x, y)))
        }
        _ => Err("坐标需要 x 与 y 两个参数".to_string()),
    }
}

/// `load_calculation create [x y]` 或 `load_calculation update`。
struct LoadCalculationCommand;

impl CommandHandler for LoadCalculationCommand {
    fn name(&self) -> &'static str {
        "load_calculation"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let (mode, rest) = match request.args.split_first() {
            Some((mode, rest)) => (mode.as_str(), rest),
            None => ("create", &request.args[..]),
        };
        let placement = match mode {
            "create" => match parse_point(rest) {
                Ok(point) => Some(point.unwrap_or(Vector3::ZERO)),
                Err(message) => return CommandResponse::err(message),
            },
            "update" => None,
            other => return CommandResponse::err(format!("未知模式: {other}")),
        };
        match context
            .session
            .publish_all(&mut *context.host, &*context.templates, placement)
        {
            Ok(outcome) if outcome.skipped.is_empty() => CommandResponse::ok(format!(
                "已生成 {} 份负荷计算表",
                outcome.published.len()
            )),
            Ok(outcome) => CommandResponse::ok(format!(
                "已生成 {} 份负荷计算表，跳过 {} 份",
                outcome.published.len(),
                outcome.skipped.len()
            )),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

/// `capture_template <name> <x> <y>`：以给定原点截取模型空间图元并保存为模板。
struct CaptureTemplateCommand;

impl CommandHandler for CaptureTemplateCommand {
    fn name(&self) -> &'static str {
        "capture_template"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some((name, rest)) = request.args.split_first() else {
            return CommandResponse::err("缺少模板名称");
        };
        let origin = match parse_point(rest) {
            Ok(point) => point.unwrap_or(Vector3::ZERO),
            Err(message) => return CommandResponse::err(message),
        };
        let entities = context.host.model_space();
        if entities.is_empty() {
            return CommandResponse::err("模型空间中没有可截取的图元");
        }
        let set = capture_relative(&entities, origin);
        match context.templates.save(name, &set) {
            Ok(()) => CommandResponse::ok(format!("模板 {name} 已保存，共 {} 个图元", set.len())),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

/// `instantiate_template <name> <x> <y>`：在模型空间基点处还原模板图元。
struct InstantiateTemplateCommand;

impl CommandHandler for InstantiateTemplateCommand {
    fn name(&self) -> &'static str {
        "instantiate_template"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some((name, rest)) = request.args.split_first() else {
            return CommandResponse::err("缺少模板名称");
        };
        let base = match parse_point(rest) {
            Ok(point) => point.unwrap_or(Vector3::ZERO),
            Err(message) => return CommandResponse::err(message),
        };
        let set = match context.templates.load(name) {
            Ok(set) => set,
            Err(err) => return CommandResponse::err(err.to_string()),
        };
        for object in set.objects() {
            if let Err(err) = context.host.create_entity(Space::Model, base, &object) {
                return CommandResponse::err(err.to_string());
            }
        }
        CommandResponse::ok(format!("模板 {name} 已放置，共 {} 个图元", set.len()))
    }
}
