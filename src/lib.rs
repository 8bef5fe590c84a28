pub mod utils;
pub mod io;
pub mod document;
pub mod locator;
pub mod presenter;
pub mod editor;
pub mod project;
pub mod debug;

// 重新导出主要结构
pub use document::{Document, Element, ElementId};
pub use locator::{find, DeviceMatch, Predicate, StreamLocator, StreamedDevice, Strictness};
pub use presenter::{render, DEFAULT_MAX_LENGTH, TRUNCATION_MARKER};
pub use editor::{remove_matches, ProjectEditor, RemovalEntry, RemovalManifest};
pub use project::{write_document, AlsProject, ProjectStats, TrackSummary};
pub use utils::AlsError;
pub use debug::AlsDebugger;

// 常量定义
pub const SUPPORTED_EXTENSIONS: &[&str] = &["als"];
