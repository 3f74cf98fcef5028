pub mod cli;
pub mod errors;
pub mod loader;

use loadcalc_config::AppConfig;
use loadcalc_core::geometry::Vector3;
use tracing::info;

use errors::FrontendError;
use loader::SessionSource;

/// 以内置示例执行一次完整的创建流程并打印概览。
pub fn run_cli_demo(config: &AppConfig) -> Result<(), FrontendError> {
    info!("启动 CLI 演示前端");
    let summary = cli::run_calculate(
        config,
        cli::CalculateOptions {
            source: SessionSource::Demo,
            mode: cli::CalculationMode::Create { at: Vector3::ZERO },
            document: None,
            output: None,
            save_snapshots: None,
        },
    )?;
    cli::print_summary(&summary);
    Ok(())
}
