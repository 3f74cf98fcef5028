pub mod building;
pub mod command;
pub mod demand;
pub mod host;
pub mod report;
pub mod session;

pub mod errors {
    use loadcalc_core::document::DocumentError;
    use loadcalc_core::template::TemplateError;
    use thiserror::Error;

    /// 输入数据错误，在任何计算之前报告。
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum ValidationError {
        #[error("unit {unit} has a floor area that is not a whole number: {value:?}")]
        FloorArea { unit: String, value: String },
        #[error("unit {unit} uses unsupported voltage {voltage}V")]
        Voltage { unit: String, voltage: u32 },
        #[error("unit {unit} has a negative value for {load}")]
        NegativeLoad { unit: String, load: String },
        #[error("unit {unit} exceeds the supported load range at {load}")]
        LoadTooLarge { unit: String, load: String },
        #[error("units {first} and {second} use different voltages")]
        VoltageMismatch { first: String, second: String },
        #[error("building {building} references unknown unit id {unit_id}")]
        UnknownUnit { building: String, unit_id: u32 },
    }

    #[derive(Debug, Error)]
    pub enum HostError {
        #[error("container {0} not found")]
        ContainerNotFound(String),
        #[error("container {0} already exists")]
        ContainerExists(String),
        #[error("host rejected {operation}: {message}")]
        Rejected {
            operation: &'static str,
            message: String,
        },
    }

    /// 单个报表写入宿主失败。
    #[derive(Debug, Error)]
    #[error("writing report container failed: {source}")]
    pub struct ContainerWriteError {
        /// 已清空或新建但内容不完整的容器，由宿主决定是否回滚。
        pub partial: Option<String>,
        #[source]
        pub source: HostError,
    }

    impl From<DocumentError> for HostError {
        fn from(value: DocumentError) -> Self {
            match value {
                DocumentError::BlockNotFound(name) => HostError::ContainerNotFound(name),
                DocumentError::BlockExists(name) => HostError::ContainerExists(name),
            }
        }
    }

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("unit with id {0} not found")]
        UnitNotFound(u32),
        #[error("building with id {0} not found")]
        BuildingNotFound(u32),
        #[error(transparent)]
        Validation(#[from] ValidationError),
    }

    /// 批量生成报表时的错误。模板错误只中止单个报表，宿主错误中止整批。
    #[derive(Debug, Error)]
    pub enum PublishError {
        #[error(transparent)]
        Validation(#[from] ValidationError),
        #[error("report {report} aborted: {source}")]
        Template {
            report: String,
            #[source]
            source: TemplateError,
        },
        #[error("drawing host failed after {count} completed reports: {source}", count = .completed.len())]
        Host {
            completed: Vec<String>,
            partial: Option<String>,
            #[source]
            source: HostError,
        },
    }
}
