//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 录制数据解析失败
    #[error("failed to parse {source_id} line {line}: {message}")]
    ParseFailed {
        source_id: String,
        /// 1-based line number
        line: usize,
        message: String,
    },

    /// 录制文件读取失败
    #[error("failed to read {source_id} from {path}: {source}")]
    Io {
        source_id: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 通道已关闭
    #[error("event queue closed for source {source_id}")]
    ChannelClosed { source_id: String },

    /// 录制为空
    #[error("recording for {source_id} is empty")]
    EmptyRecording { source_id: String },
}

impl From<IngestionError> for ContractError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::Io { source, .. } => ContractError::Io(source),
            IngestionError::EmptyRecording { ref source_id } => {
                ContractError::sensor_unavailable(source_id.clone(), err.to_string())
            }
            IngestionError::ParseFailed { ref source_id, .. }
            | IngestionError::ChannelClosed { ref source_id } => {
                ContractError::sensor_read(source_id.clone(), err.to_string())
            }
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
