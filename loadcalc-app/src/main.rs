use std::path::PathBuf;

use clap::{Parser, Subcommand};
use loadcalc_config::{AppConfig, ConfigError};
use loadcalc_core::geometry::Vector3;
use loadcalc_frontend::cli::{self, CalculateOptions, CalculationMode};
use loadcalc_frontend::errors::FrontendError;
use loadcalc_frontend::loader::SessionSource;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "loadcalc")]
#[command(about = "Residential service load calculations rendered into drawing blocks", long_about = None)]
struct Cli {
    /// Configuration file (default: $LOADCALC_CONFIG or ./config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Template directory, overrides the configuration
    #[arg(long, global = true)]
    templates: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute every report and write it into a drawing
    Calculate {
        /// Snapshot root with Unit/ and Building/ directories
        #[arg(long, conflicts_with = "project")]
        snapshots: Option<PathBuf>,
        /// Single JSON project file with Units and Buildings
        #[arg(long)]
        project: Option<PathBuf>,
        /// Only rebuild existing report blocks, do not insert new references
        #[arg(long, conflicts_with = "at")]
        update: bool,
        /// Insertion point of the first report
        #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
        at: Option<Vec<f64>>,
        /// Existing drawing (JSON) to update
        #[arg(long)]
        document: Option<PathBuf>,
        /// Write the resulting drawing (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Save the session back to this snapshot root
        #[arg(long)]
        save_snapshots: Option<PathBuf>,
    },
    /// Capture entities (JSON) relative to an origin as a named template
    Capture {
        /// Entities file (JSON array of drawing objects)
        entities: PathBuf,
        #[arg(short, long)]
        name: String,
        #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
        origin: Option<Vec<f64>>,
    },
    /// Place a template at a base point and print the absolute entities
    Instantiate {
        name: String,
        #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
        at: Option<Vec<f64>>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the registered commands
    Commands,
}

fn main() {
    let cli = Cli::parse();
    let mut config = load_configuration(cli.config);
    if let Some(dir) = cli.templates {
        config.templates.directory = dir;
    }
    init_logging(&config);
    info!("启动负荷计算工具");

    if let Err(err) = run(cli.command, &config) {
        error!(error = %err, "执行失败");
        eprintln!("错误: {err}");
        std::process::exit(1);
    }
}

fn run(command: Option<Commands>, config: &AppConfig) -> Result<(), FrontendError> {
    match command {
        Some(Commands::Calculate {
            snapshots,
            project,
            update,
            at,
            document,
            output,
            save_snapshots,
        }) => {
            let source = match (snapshots, project) {
                (Some(root), _) => SessionSource::Snapshots(root),
                (None, Some(path)) => SessionSource::Project(path),
                (None, None) => match &config.storage.root {
                    Some(root) => SessionSource::Snapshots(root.clone()),
                    None => SessionSource::Demo,
                },
            };
            let mode = if update {
                CalculationMode::Update
            } else {
                CalculationMode::Create { at: to_point(at) }
            };
            let summary = cli::run_calculate(
                config,
                CalculateOptions {
                    source,
                    mode,
                    document,
                    output,
                    save_snapshots,
                },
            )?;
            cli::print_summary(&summary);
        }
        Some(Commands::Capture {
            entities,
            name,
            origin,
        }) => {
            let path = cli::run_capture(config, &entities, &name, to_point(origin))?;
            println!("模板已保存: {}", path.display());
        }
        Some(Commands::Instantiate { name, at, output }) => {
            let placed = cli::run_instantiate(config, &name, to_point(at), output.as_deref())?;
            match output {
                Some(path) => println!("已写入 {} 个图元: {}", placed.len(), path.display()),
                None => println!("{}", cli::entities_to_json(&placed)?),
            }
        }
        Some(Commands::Commands) => {
            println!("支持的命令: {}", cli::available_commands().join(", "));
        }
        None => loadcalc_frontend::run_cli_demo(config)?,
    }
    Ok(())
}

fn to_point(values: Option<Vec<f64>>) -> Vector3 {
    match values.as_deref() {
        Some([x, y]) => Vector3::xy(*x, *y),
        _ => Vector3::ZERO,
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    // 日志写到 stderr，stdout 留给 JSON 输出
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
