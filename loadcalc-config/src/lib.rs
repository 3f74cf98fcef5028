use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub text_style: TextStyleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `LOADCALC_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("LOADCALC_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 模板目录；文件缺失时可退回内嵌模板。
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    #[serde(default = "TemplateConfig::default_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_true")]
    pub use_embedded: bool,
}

impl TemplateConfig {
    fn default_directory() -> PathBuf {
        PathBuf::from("templates")
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            directory: Self::default_directory(),
            use_embedded: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// 报表排版参数（图纸单位）。
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "LayoutConfig::default_row_height")]
    pub row_height: f64,
    #[serde(default = "LayoutConfig::default_margin_top")]
    pub margin_top: f64,
    #[serde(default = "LayoutConfig::default_margin_bottom")]
    pub margin_bottom: f64,
    #[serde(default = "LayoutConfig::default_width")]
    pub width: f64,
    #[serde(default = "LayoutConfig::default_header_height")]
    pub header_height: f64,
    #[serde(default = "LayoutConfig::default_frame_layer")]
    pub frame_layer: String,
}

impl LayoutConfig {
    fn default_row_height() -> f64 {
        0.25
    }

    fn default_margin_top() -> f64 {
        0.16
    }

    fn default_margin_bottom() -> f64 {
        0.08
    }

    fn default_width() -> f64 {
        7.0
    }

    fn default_header_height() -> f64 {
        0.75
    }

    fn default_frame_layer() -> String {
        "E-TEXT".to_string()
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_height: Self::default_row_height(),
            margin_top: Self::default_margin_top(),
            margin_bottom: Self::default_margin_bottom(),
            width: Self::default_width(),
            header_height: Self::default_header_height(),
            frame_layer: Self::default_frame_layer(),
        }
    }
}

/// 服务额定电流表；为空时使用内置标准表。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub standard_ratings: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextStyleConfig {
    #[serde(default = "TextStyleConfig::default_name")]
    pub name: String,
    #[serde(default)]
    pub height: f64,
    #[serde(default = "TextStyleConfig::default_width_factor")]
    pub width_factor: f64,
    #[serde(default = "TextStyleConfig::default_font_file")]
    pub font_file: String,
}

impl TextStyleConfig {
    fn default_name() -> String {
        "Load Calcs".to_string()
    }

    fn default_width_factor() -> f64 {
        1.0
    }

    fn default_font_file() -> String {
        "Arial.ttf".to_string()
    }
}

impl Default for TextStyleConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            height: 0.0,
            width_factor: Self::default_width_factor(),
            font_file: Self::default_font_file(),
        }
    }
}

/// 快照根目录；未设置时 CLI 需显式给出路径。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
