/// IO 抽象层模块
///
/// 该模块把"读写文件"和"容器编解码"放在 trait 后面，加载器与序列化器只依赖接口。
/// 测试可以注入内存实现，容器格式的细节也可以整体替换。
///
/// # 架构设计
///
/// - **traits**: 定义 AlsReader / AlsWriter / ContainerCodec 接口
/// - **als_io**: 基于文件系统的默认实现（原子写入）
/// - **codec**: gzip 容器编解码（解压失败时按明文处理）
///
/// # 使用示例
///
/// ```rust,ignore
/// use als_cleaner::io::{AlsReader, ContainerCodec, DefaultAlsReader, GzipCodec};
///
/// let raw = DefaultAlsReader.read(Path::new("song.als"))?;
/// let payload = GzipCodec::default().decode(&raw)?;
/// println!("{}", payload.xml.len());
/// ```
pub mod traits;
pub mod als_io;
pub mod codec;

// === 导出 trait 定义 ===
pub use traits::{AlsReader, AlsWriter, ContainerCodec, Payload, RawAlsData};

// === 导出默认实现 ===
pub use als_io::{AtomicAlsWriter, DefaultAlsReader};
pub use codec::{open_payload_reader, GzipCodec, GZIP_MAGIC};
