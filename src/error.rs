use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 字段校验错误
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 信息提取错误
    #[error("提取错误: {0}")]
    Extraction(#[from] ExtractionError),
    /// 存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 状态迁移错误
    #[error("状态迁移错误: {0}")]
    Transition(#[from] TransitionError),
    /// 批处理错误
    #[error("批处理错误: {0}")]
    Batch(#[from] BatchError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
}

/// 字段校验错误
///
/// 在任何存储写入之前同步返回，不会持久化任何内容
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 必填字段为空
    #[error("必填字段为空: {field}")]
    MissingField { field: &'static str },
    /// 发文日期格式无效
    #[error("发文日期无效: '{value}' (应为 YYYY-MM-DD)")]
    InvalidLetterDate { value: String },
    /// 发送信息不完整
    #[error("发送信息不完整，缺少: {field}")]
    IncompleteDispatch { field: &'static str },
    /// 批次为空
    #[error("当前批次中没有任何文档")]
    EmptyBatch,
    /// 索引超出范围
    #[error("索引 {index} 超出范围 (共 {len} 项)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// 信息提取错误
///
/// 只作用于单个批次项，记录为该项的 error，不影响同批其他项
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// 请求失败（网络/接口错误）
    #[error("提取请求失败 (模型: {model}): {message}")]
    RequestFailed { model: String, message: String },
    /// 返回内容为空
    #[error("提取服务返回内容为空 (模型: {model})")]
    EmptyResponse { model: String },
    /// 返回内容无法解析
    #[error("无法解析提取结果: {message}")]
    MalformedResponse { message: String },
    /// 返回结果缺少必需字段
    #[error("提取结果缺少字段: {field}")]
    MissingKey { field: &'static str },
    /// 提取任务异常终止
    #[error("提取任务异常终止: {message}")]
    TaskAborted { message: String },
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 文档不存在
    #[error("文档不存在: {id}")]
    NotFound { id: String },
    /// 存储内容损坏（加载时在本地恢复为空集合）
    #[error("存储内容已损坏: {message}")]
    Corrupted { message: String },
    /// 后端读写失败
    #[error("存储后端读写失败 ({location}): {source}")]
    Backend {
        location: String,
        #[source]
        source: std::io::Error,
    },
    /// 序列化失败
    #[error("序列化文档集合失败: {0}")]
    Serialize(#[from] serde_json::Error),
    /// 连续生成的标识都已被占用
    #[error("连续 {attempts} 次生成的文档标识均已存在")]
    IdCollision { attempts: usize },
    /// 待写入的文档违反不变量
    #[error("文档 {id} 无效: {message}")]
    InvalidDocument { id: String, message: String },
}

/// 状态迁移错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// 时间戳早于最后一条历史记录
    #[error("时间戳 {attempted} 早于最后一条状态记录 {last}")]
    NonMonotonic { last: String, attempted: String },
    /// 不允许的状态迁移
    #[error("不允许从 '{from}' 迁移到 '{to}'")]
    Illegal { from: String, to: String },
    /// 缺少发送信息
    #[error("状态 '{status}' 需要完整的发送信息")]
    MissingDispatchDetails { status: String },
    /// 发送信息不完整
    #[error("发送信息不完整: {0}")]
    IncompleteDetails(ValidationError),
}

/// 多页文档渲染错误
///
/// 展开阶段只记录日志并跳过对应文件或页面
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// 文档无法解析
    #[error("无法解析文档: {0}")]
    Parse(String),
    /// 单页无法渲染
    #[error("第 {page} 页无法渲染: {message}")]
    Page { page: u32, message: String },
    /// 渲染库无法加载
    #[error("渲染库不可用: {0}")]
    Unavailable(String),
}

/// 批处理错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// 没有可提交的已完成项
    #[error("没有任何成功处理的文档可以保存 (共 {total} 项)")]
    NothingToCommit { total: usize },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("无法读取配置文件 {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("配置文件 {path} 解析失败: {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: &'static str,
    },
}

/// 文件错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建必填字段错误
    pub fn missing_field(field: &'static str) -> Self {
        AppError::Validation(ValidationError::MissingField { field })
    }

    /// 创建文档不存在错误
    pub fn not_found(id: impl Into<String>) -> Self {
        AppError::Store(StoreError::NotFound { id: id.into() })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }
}

impl StoreError {
    /// 创建后端读写错误
    pub fn backend(location: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Backend {
            location: location.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
