use loadcalc_core::template::TemplateError;
use loadcalc_engine::errors::{PublishError, ValidationError};
use loadcalc_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("命令 {command} 执行失败: {message}")]
    Command { command: String, message: String },
    #[error("序列化输出失败: {0}")]
    Output(#[source] serde_json::Error),
}
