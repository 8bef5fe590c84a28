/// 工程编辑器模块
///
/// 删除命中的设备子树，并提供有状态的编辑接口，支持多次删除后统一保存。
use std::collections::HashSet;
use std::path::Path;
use crate::document::{Document, ElementId};
use crate::io::{AlsWriter, ContainerCodec};
use crate::locator::{find, DeviceMatch, Predicate};
use crate::project::{write_document, AlsProject};
use crate::utils::AlsError;
use super::manifest::{RemovalEntry, RemovalManifest};

/// 从文档中删除命中的元素
///
/// 按传入顺序处理：先检查元素仍在原处，记录删除前的序列化文本与路径，再从父元素中摘下。
/// 嵌套在（或等同于）同批次已删除元素中的命中不再重复摘下，只在清单中标记，
/// 因此清单长度总是等于命中数量。
///
/// # 错误
/// 元素不属于该文档、标签已变化、已被批次外的操作摘下、父元素与定位时不同，
/// 或不在父元素的子序列中时返回 `StructureError`；根元素不能删除。
pub fn remove_matches(document: &mut Document, matches: &[DeviceMatch]) -> Result<RemovalManifest, AlsError> {
    let mut manifest = RemovalManifest::new();
    let mut removed: HashSet<ElementId> = HashSet::new();

    for found in matches {
        let element = document.get(found.element).ok_or_else(|| {
            AlsError::StructureError(format!(
                "<{}> at {} (#{}) does not belong to this document",
                found.tag, found.path, found.element
            ))
        })?;
        if element.tag != found.tag {
            return Err(AlsError::StructureError(format!(
                "element #{} is <{}>, expected <{}> at {}",
                found.element, element.tag, found.tag, found.path
            )));
        }

        let covered = std::iter::once(found.element)
            .chain(document.ancestors(found.element))
            .any(|id| removed.contains(&id));
        if covered {
            let xml = document.element_to_xml(found.element)?;
            tracing::debug!("<{}> at {} already left with an earlier removal", found.tag, found.path);
            manifest.push(RemovalEntry::from_match(found, xml, true));
            continue;
        }

        if !document.is_attached(found.element) {
            return Err(AlsError::StructureError(format!(
                "<{}> at {} is no longer attached to the document",
                found.tag, found.path
            )));
        }
        // 重新从 arena 取父元素，与定位时的记录比对
        let parent = document.parent(found.element);
        if parent != found.parent {
            return Err(AlsError::StructureError(format!(
                "<{}> at {} has moved: parent is {:?}, expected {:?}",
                found.tag, found.path, parent, found.parent
            )));
        }

        let xml = document.element_to_xml(found.element)?;
        let index = document.detach(found.element)?;
        tracing::debug!("detached <{}> at {} (child index {})", found.tag, found.path, index);

        removed.insert(found.element);
        manifest.push(RemovalEntry::from_match(found, xml, false));
    }

    Ok(manifest)
}

/// 工程编辑器 - 管理工程的删除状态
///
/// # 核心特性
/// - **Stateful**: 累积多次删除的清单，最后统一保存
/// - **可追踪**: 每个被删除的元素都在清单中留有记录
pub struct ProjectEditor {
    project: AlsProject,
    manifest: RemovalManifest,
}

impl ProjectEditor {
    pub fn new(project: AlsProject) -> Self {
        Self {
            project,
            manifest: RemovalManifest::new(),
        }
    }

    /// 删除所有命中谓词的元素，返回本次的清单
    pub fn remove_where(&mut self, predicate: Predicate) -> Result<RemovalManifest, AlsError> {
        let matches: Vec<DeviceMatch> = find(&self.project.document, predicate).collect();
        self.remove_matches(&matches)
    }

    /// 删除给定的命中，返回本次的清单
    pub fn remove_matches(&mut self, matches: &[DeviceMatch]) -> Result<RemovalManifest, AlsError> {
        let batch = remove_matches(&mut self.project.document, matches)?;
        self.manifest.extend(batch.clone());
        Ok(batch)
    }

    /// 检查是否有修改
    pub fn is_modified(&self) -> bool {
        !self.manifest.is_empty()
    }

    /// 累积的删除清单
    pub fn manifest(&self) -> &RemovalManifest {
        &self.manifest
    }

    pub fn project(&self) -> &AlsProject {
        &self.project
    }

    /// 保存到文件（需要显式调用）
    pub fn save(
        &self,
        codec: &dyn ContainerCodec,
        writer: &dyn AlsWriter,
        path: &Path,
    ) -> Result<u64, AlsError> {
        write_document(&self.project.document, path, codec, writer)
    }

    /// 生成编辑摘要
    pub fn summary(&self) -> String {
        format!(
            "project: {}, modified: {}, {}",
            self.project.get_name(),
            if self.is_modified() { "yes" } else { "no" },
            self.manifest.summary()
        )
    }
}
