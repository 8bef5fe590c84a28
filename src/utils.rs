use thiserror::Error;
use std::path::{Path, PathBuf};

/// 自定义错误类型
#[derive(Error, Debug)]
pub enum AlsError {
    /// 负载无法解码，或解码后不是格式良好的 XML
    #[error("Format error: {0}")]
    FormatError(String),

    /// 之前定位到的元素已不在预期位置
    #[error("Structure error: {0}")]
    StructureError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// `clean` 输出文件名的固定后缀
pub const CLEAN_SUFFIX: &str = "-clean";

/// `extract` 输出文件名的固定后缀
pub const EXTRACT_SUFFIX: &str = "-extracted";

/// 取得输入文件的主干名
fn file_stem(input: &Path) -> Result<String, AlsError> {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            AlsError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("cannot derive a file name from {}", input.display()),
            ))
        })
}

/// 输出目录：显式指定的目录，否则为输入文件所在目录
fn output_dir(input: &Path, dest_dir: Option<&Path>) -> PathBuf {
    match dest_dir {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default(),
    }
}

/// 计算 `clean` 的输出路径：`<dest>/<stem>-clean.als`
pub fn clean_output_path(input: &Path, dest_dir: Option<&Path>) -> Result<PathBuf, AlsError> {
    let stem = file_stem(input)?;
    Ok(output_dir(input, dest_dir).join(format!("{}{}.als", stem, CLEAN_SUFFIX)))
}

/// 计算 `extract` 的输出路径：`<dest>/<stem>-extracted.xml`
pub fn extract_output_path(input: &Path, dest_dir: Option<&Path>) -> Result<PathBuf, AlsError> {
    let stem = file_stem(input)?;
    Ok(output_dir(input, dest_dir).join(format!("{}{}.xml", stem, EXTRACT_SUFFIX)))
}

/// 创建文件备份
pub fn create_backup(file_path: &Path) -> Result<PathBuf, AlsError> {
    if !file_path.exists() {
        return Err(AlsError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("source file does not exist: {}", file_path.display()),
        )));
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let backup_path = file_path.with_extension(format!("{}.bak", timestamp));

    std::fs::copy(file_path, &backup_path)?;

    Ok(backup_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_output_path_next_to_input() {
        let path = clean_output_path(Path::new("projects/My Song.als"), None).unwrap();
        assert_eq!(path, PathBuf::from("projects/My Song-clean.als"));
    }

    #[test]
    fn test_clean_output_path_in_dest_dir() {
        let path = clean_output_path(Path::new("projects/set.als"), Some(Path::new("out"))).unwrap();
        assert_eq!(path, PathBuf::from("out/set-clean.als"));
    }

    #[test]
    fn test_extract_output_path() {
        let path = extract_output_path(Path::new("set.als"), None).unwrap();
        assert_eq!(path, PathBuf::from("set-extracted.xml"));
    }

    #[test]
    fn test_backup_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.als");
        assert!(matches!(create_backup(&missing), Err(AlsError::IoError(_))));

        let source = dir.path().join("set.als");
        std::fs::write(&source, b"payload").unwrap();
        let backup = create_backup(&source).unwrap();
        assert_eq!(std::fs::read(backup).unwrap(), b"payload");
    }
}
