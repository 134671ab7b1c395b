//! 存储后端 - 基础设施层
//!
//! 只负责保存/读取一段序列化文本，不认识 Document

use crate::error::StoreError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// 存储后端
///
/// 职责：
/// - 读取上次写入的完整内容（从未写入时返回 None）
/// - 整体覆盖写入
/// - 不解析内容，不处理业务
pub trait StoreBackend: Send {
    fn read(&self) -> Result<Option<String>, StoreError>;

    fn write(&mut self, payload: &str) -> Result<(), StoreError>;

    /// 用于日志的描述
    fn describe(&self) -> String;
}

/// 内存后端
///
/// clone 出的句柄共享同一份内容，测试中可以用它模拟"重新打开"存储
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已有内容初始化
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(payload.into()))),
        }
    }

    /// 当前保存的内容
    pub fn payload(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl StoreBackend for MemoryBackend {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.payload())
    }

    fn write(&mut self, payload: &str) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(payload.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// 文件后端
///
/// 先写入同目录下的临时文件再重命名，避免写到一半的文件覆盖旧内容
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StoreBackend for FileBackend {
    fn read(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::backend(self.describe(), e)),
        }
    }

    fn write(&mut self, payload: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::backend(self.describe(), e))?;
        }

        let temp = self.temp_path();
        std::fs::write(&temp, payload).map_err(|e| StoreError::backend(self.describe(), e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| StoreError::backend(self.describe(), e))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_handles_share_content() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.read().unwrap(), None);

        let mut writer = backend.clone();
        writer.write("[]").unwrap();
        assert_eq!(backend.payload().as_deref(), Some("[]"));
    }

    #[test]
    fn test_file_backend_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("documents.json"));
        assert_eq!(backend.read().unwrap(), None);
    }

    #[test]
    fn test_file_backend_overwrites_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("documents.json");
        let mut backend = FileBackend::new(&path);

        backend.write("[1]").unwrap();
        backend.write("[2]").unwrap();

        assert_eq!(backend.read().unwrap().as_deref(), Some("[2]"));
        assert!(!dir.path().join("data").join("documents.json.tmp").exists());
    }
}
