use super::AlsProject;
use crate::document::Document;
use crate::io::{AlsWriter, AtomicAlsWriter, ContainerCodec, GzipCodec};
use crate::utils::AlsError;
use std::path::Path;

/// 序列化文档并写入目标路径
///
/// 规范 XML（不缩进）→ 容器编码 → 原子写入。返回写入的字节数。
pub fn write_document(
    document: &Document,
    destination: &Path,
    codec: &dyn ContainerCodec,
    writer: &dyn AlsWriter,
) -> Result<u64, AlsError> {
    let xml = document.to_xml()?;
    let data = codec.encode(&xml)?;
    let written = writer.write(&data, destination)?;
    tracing::info!("wrote {} ({} bytes)", destination.display(), written);
    Ok(written)
}

impl AlsProject {
    /// 以 gzip 写入文件
    pub fn write_to_file(&self, path: &Path) -> Result<u64, AlsError> {
        self.write_with(path, &GzipCodec::default(), &AtomicAlsWriter)
    }

    /// 使用指定的编解码器与写入器写入
    pub fn write_with(
        &self,
        path: &Path,
        codec: &dyn ContainerCodec,
        writer: &dyn AlsWriter,
    ) -> Result<u64, AlsError> {
        write_document(&self.document, path, codec, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{RawAlsData, GZIP_MAGIC};
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// 记录写入内容的内存写入器
    #[derive(Default)]
    struct RecordingWriter {
        written: RefCell<Vec<(PathBuf, Vec<u8>)>>,
    }

    impl AlsWriter for RecordingWriter {
        fn write(&self, data: &RawAlsData, path: &Path) -> Result<u64, AlsError> {
            self.written.borrow_mut().push((path.to_path_buf(), data.bytes.clone()));
            Ok(data.bytes.len() as u64)
        }
    }

    #[test]
    fn test_write_document_is_gzipped_canonical_xml() {
        let doc = Document::parse("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Ableton>\n  <LiveSet/>\n</Ableton>").unwrap();
        let writer = RecordingWriter::default();
        let codec = GzipCodec::default();

        let written = write_document(&doc, Path::new("out.als"), &codec, &writer).unwrap();

        let calls = writer.written.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, PathBuf::from("out.als"));
        assert_eq!(written, calls[0].1.len() as u64);
        assert!(calls[0].1.starts_with(&GZIP_MAGIC));

        let payload = codec.decode(&RawAlsData { bytes: calls[0].1.clone() }).unwrap();
        assert_eq!(payload.xml, "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Ableton><LiveSet/></Ableton>");
    }

    #[test]
    fn test_write_to_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song-clean.als");
        let project = AlsProject::from_xml("song.als", r#"<Ableton a="1"><LiveSet>text</LiveSet></Ableton>"#).unwrap();

        project.write_to_file(&path).unwrap();

        let reloaded = AlsProject::load(&path).unwrap();
        assert!(reloaded.was_compressed);
        assert_eq!(reloaded.document.to_xml().unwrap(), project.document.to_xml().unwrap());
    }

    #[test]
    fn test_write_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let project = AlsProject::from_xml("song.als", "<Ableton/>").unwrap();
        // 目标是已存在的目录
        let result = project.write_to_file(dir.path());
        assert!(matches!(result, Err(AlsError::IoError(_))));
    }
}
