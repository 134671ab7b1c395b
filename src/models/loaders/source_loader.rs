use crate::error::{AppError, AppResult, FileError};
use crate::models::source_file::{media_type_for, SourceFile, OCTET_STREAM};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 读取单个源文件，媒体类型按扩展名推断
pub async fn load_source_file(path: &Path) -> AppResult<SourceFile> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let media_type = media_type_for(path).unwrap_or(OCTET_STREAM);

    Ok(SourceFile::new(name, media_type, bytes))
}

/// 读取文件夹中的所有源文件（按文件名排序）
///
/// 单个文件读取失败只记录警告，不影响其他文件
pub async fn load_all_source_files(folder_path: &str) -> AppResult<Vec<SourceFile>> {
    let folder = PathBuf::from(folder_path);

    if !folder.is_dir() {
        return Err(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        }
        .into());
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?
    {
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        tracing::debug!(
            "正在读取: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_source_file(&path).await {
            Ok(file) => files.push(file),
            Err(e) => {
                tracing::warn!("读取文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_all_source_files_sorted_with_media_types() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("a.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();
        std::fs::write(dir.path().join("c.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let files = load_all_source_files(dir.path().to_str().unwrap())
            .await
            .unwrap();

        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.pdf", "c.txt"]);
        assert_eq!(files[0].media_type, "image/jpeg");
        assert_eq!(files[1].media_type, "application/pdf");
        assert_eq!(files[2].media_type, OCTET_STREAM);
    }

    #[tokio::test]
    async fn test_missing_folder_is_error() {
        let err = load_all_source_files("/no/such/intake/folder")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::File(FileError::DirectoryNotFound { .. })
        ));
    }
}
