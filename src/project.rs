pub mod stats;
pub mod tracks;
pub mod writer;

pub use stats::ProjectStats;
pub use tracks::TrackSummary;
pub use writer::write_document;

use std::path::{Path, PathBuf};
use crate::document::Document;
use crate::io::{AlsReader, ContainerCodec, DefaultAlsReader, GzipCodec, Payload};
use crate::locator::{find, Matches, Predicate};
use crate::utils::AlsError;

/// 已加载的 Live Set 工程
#[derive(Debug, Clone)]
pub struct AlsProject {
    /// 文件路径
    pub path: PathBuf,
    /// 解析后的文档树
    pub document: Document,
    /// 源文件是否经过 gzip 压缩
    pub was_compressed: bool,
}

impl AlsProject {
    /// 加载工程文件
    ///
    /// # 参数
    /// * `path` - .als 文件路径
    ///
    /// # 示例
    /// ```rust,ignore
    /// let project = AlsProject::load(Path::new("song.als"))?;
    /// ```
    pub fn load(path: &Path) -> Result<Self, AlsError> {
        Self::load_with(path, &DefaultAlsReader, &GzipCodec::default())
    }

    /// 使用指定的读取器与编解码器加载
    pub fn load_with(
        path: &Path,
        reader: &dyn AlsReader,
        codec: &dyn ContainerCodec,
    ) -> Result<Self, AlsError> {
        let payload = Self::read_payload_with(path, reader, codec)?;
        let document = Document::parse(&payload.xml)?;
        tracing::info!(
            "loaded {} ({} elements, compressed: {})",
            path.display(),
            document.element_count(),
            payload.was_compressed
        );

        Ok(Self {
            path: path.to_path_buf(),
            document,
            was_compressed: payload.was_compressed,
        })
    }

    /// 读取并解码负载，不解析
    pub fn read_payload(path: &Path) -> Result<Payload, AlsError> {
        Self::read_payload_with(path, &DefaultAlsReader, &GzipCodec::default())
    }

    pub fn read_payload_with(
        path: &Path,
        reader: &dyn AlsReader,
        codec: &dyn ContainerCodec,
    ) -> Result<Payload, AlsError> {
        let raw = reader.read(path)?;
        codec.decode(&raw)
    }

    /// 从 XML 文本创建（不读取文件）
    pub fn from_xml(path: impl Into<PathBuf>, xml: &str) -> Result<Self, AlsError> {
        Ok(Self {
            path: path.into(),
            document: Document::parse(xml)?,
            was_compressed: false,
        })
    }

    /// 文件名
    pub fn get_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("Unknown")
    }

    /// 在工程中查找元素
    pub fn find(&self, predicate: Predicate) -> Matches<'_> {
        find(&self.document, predicate)
    }
}
