/// gzip 容器编解码
///
/// ALS 文件就是 gzip 压缩的 XML。解压失败时把原始字节当作已解码的文本，
/// 这是格式探测，不是吞掉错误：明文 XML 也能被直接处理。
use std::io::{BufRead, BufReader, Read, Write};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use super::traits::{ContainerCodec, Payload, RawAlsData};
use crate::utils::AlsError;

/// gzip 魔数
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// 默认的 gzip 容器编解码器
#[derive(Debug, Clone)]
pub struct GzipCodec {
    /// 写出时使用的压缩级别
    pub level: Compression,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self { level: Compression::default() }
    }
}

impl GzipCodec {
    /// 尝试 gunzip
    fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut decoder = MultiGzDecoder::new(bytes);
        let mut output = Vec::new();
        decoder.read_to_end(&mut output)?;
        Ok(output)
    }
}

impl ContainerCodec for GzipCodec {
    fn decode(&self, raw: &RawAlsData) -> Result<Payload, AlsError> {
        let (bytes, was_compressed) = match Self::gunzip(&raw.bytes) {
            Ok(decompressed) => (decompressed, true),
            Err(e) => {
                tracing::debug!("gunzip failed ({}), treating payload as plain text", e);
                (raw.bytes.clone(), false)
            }
        };

        let xml = decode_text(&bytes)?;
        Ok(Payload { xml, was_compressed })
    }

    fn encode(&self, xml: &str) -> Result<RawAlsData, AlsError> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder.write_all(xml.as_bytes())?;
        let bytes = encoder.finish()?;
        Ok(RawAlsData { bytes })
    }
}

/// 把负载字节解码为文本（带 BOM 探测）
fn decode_text(bytes: &[u8]) -> Result<String, AlsError> {
    let (text, encoding, had_errors) = encoding_rs::UTF_8.decode(bytes);
    if had_errors {
        return Err(AlsError::FormatError(format!(
            "payload is not valid {} text",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

/// 为流式读取准备负载：以 gzip 魔数开头时边读边解压，否则原样读取
pub fn open_payload_reader<'a, R: BufRead + 'a>(mut reader: R) -> std::io::Result<Box<dyn BufRead + 'a>> {
    let compressed = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if compressed {
        let decoder = flate2::bufread::MultiGzDecoder::new(reader);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(reader))
    }
}
