/// 编辑器层模块
///
/// 该模块提供删除设备子树的接口，并为每次删除生成可审计的清单。
/// 遵循"修改-保存分离"原则，所有修改操作仅在内存中进行，需要显式调用保存。
///
/// # 架构设计
///
/// - **project_editor**: 删除操作本身（`remove_matches`）以及持有工程状态的 `ProjectEditor`
/// - **manifest**: 删除清单，记录每个被移除元素的序列化文本与逻辑路径
///
/// # 使用示例
///
/// ```rust,ignore
/// use als_cleaner::{AlsProject, Predicate, ProjectEditor};
/// use als_cleaner::io::{AtomicAlsWriter, GzipCodec};
///
/// let project = AlsProject::load(Path::new("song.als"))?;
/// let mut editor = ProjectEditor::new(project);
///
/// let removed = editor.remove_where(Predicate::sampler_family())?;
/// println!("removed {} blocks", removed.len());
///
/// editor.save(&GzipCodec::default(), &AtomicAlsWriter, Path::new("song-clean.als"))?;
/// ```
pub mod manifest;
pub mod project_editor;

pub use manifest::{RemovalEntry, RemovalManifest};
pub use project_editor::{remove_matches, ProjectEditor};
