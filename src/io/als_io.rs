/// ALS 文件 IO 实现
///
/// 提供基于文件系统的默认读写实现
use std::io::Write;
use std::path::Path;
use super::traits::{AlsReader, AlsWriter, RawAlsData};
use crate::utils::AlsError;

/// 默认的 ALS 文件读取器（基于 std::fs）
#[derive(Debug, Clone, Default)]
pub struct DefaultAlsReader;

impl AlsReader for DefaultAlsReader {
    fn read(&self, path: &Path) -> Result<RawAlsData, AlsError> {
        // fs::read 在返回前关闭句柄
        let bytes = std::fs::read(path)?;
        tracing::debug!("read {} bytes from {}", bytes.len(), path.display());
        Ok(RawAlsData { bytes })
    }
}

/// 原子写入器：先写同目录临时文件，fsync 后再重命名
///
/// 写入失败时临时文件随 `NamedTempFile` 一起删除，目标路径保持原状。
#[derive(Debug, Clone, Default)]
pub struct AtomicAlsWriter;

impl AlsWriter for AtomicAlsWriter {
    fn write(&self, data: &RawAlsData, path: &Path) -> Result<u64, AlsError> {
        // 确保父目录存在
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(&data.bytes)?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| AlsError::IoError(e.error))?;

        tracing::debug!("wrote {} bytes to {}", data.bytes.len(), path.display());
        Ok(data.bytes.len() as u64)
    }
}
