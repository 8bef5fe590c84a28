/// IO 抽象层 - trait 定义
///
/// 该模块定义了文件读写与容器编解码的抽象接口，支持依赖注入和测试 mock。

use std::path::Path;
use crate::utils::AlsError;

/// ALS 文件原始数据
#[derive(Debug, Clone)]
pub struct RawAlsData {
    /// 文件的原始字节数据
    pub bytes: Vec<u8>,
}

/// 容器解码后的负载
#[derive(Debug, Clone)]
pub struct Payload {
    /// 解码后的 XML 文本
    pub xml: String,
    /// 原始数据是否经过压缩（false 表示走了明文回退）
    pub was_compressed: bool,
}

/// ALS 文件读取 trait
///
/// # 职责
/// - 从文件系统读取 ALS 文件的原始字节数据
/// - 不负责解码，仅负责 IO；返回前必须释放文件句柄
pub trait AlsReader {
    /// 读取 ALS 文件的原始数据
    fn read(&self, path: &Path) -> Result<RawAlsData, AlsError>;
}

/// ALS 文件写入 trait
///
/// # 职责
/// - 将编码后的数据写入文件系统
/// - 不负责序列化，仅负责 IO
pub trait AlsWriter {
    /// 写入数据，返回写入的字节数
    fn write(&self, data: &RawAlsData, path: &Path) -> Result<u64, AlsError>;
}

/// 容器编解码 trait
///
/// 把原始文件字节变成 XML 文本，或把 XML 文本包装回容器字节。
pub trait ContainerCodec {
    /// 解码原始字节
    fn decode(&self, raw: &RawAlsData) -> Result<Payload, AlsError>;

    /// 编码 XML 文本
    fn encode(&self, xml: &str) -> Result<RawAlsData, AlsError>;
}
