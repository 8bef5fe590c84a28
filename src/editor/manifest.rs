/// 删除清单
///
/// 按应用顺序记录一次删除中处理过的每个命中，用于删除报告与审计。
use serde::Serialize;
use crate::document::ElementId;
use crate::locator::DeviceMatch;

/// 单个被删除的元素
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalEntry {
    /// 元素在原文档 arena 中的 id（删除后数据仍保留，可用于展示）
    #[serde(skip)]
    pub element: ElementId,
    /// 删除前的逻辑路径
    pub path: String,
    pub tag: String,
    /// 删除前的规范序列化文本
    pub xml: String,
    pub track_number: Option<usize>,
    pub track_name: Option<String>,
    /// 元素已随同批次中更早删除的祖先一起离开文档
    pub via_earlier_removal: bool,
}

impl RemovalEntry {
    pub fn from_match(found: &DeviceMatch, xml: String, via_earlier_removal: bool) -> Self {
        Self {
            element: found.element,
            path: found.path.clone(),
            tag: found.tag.clone(),
            xml,
            track_number: found.track_number,
            track_name: found.track_name.clone(),
            via_earlier_removal,
        }
    }
}

impl std::fmt::Display for RemovalEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}> at {}", self.tag, self.path)?;
        if let (Some(number), Some(name)) = (self.track_number, &self.track_name) {
            write!(f, " (track {} '{}')", number, name)?;
        }
        if self.via_earlier_removal {
            write!(f, " [inside an earlier removal]")?;
        }
        Ok(())
    }
}

/// 删除清单
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovalManifest {
    entries: Vec<RemovalEntry>,
}

impl RemovalManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: RemovalEntry) {
        self.entries.push(entry);
    }

    /// 追加另一份清单（保持顺序）
    pub fn extend(&mut self, other: RemovalManifest) {
        self.entries.extend(other.entries);
    }

    /// 条目数量（等于传入的命中数量）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemovalEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[RemovalEntry] {
        &self.entries
    }

    /// 实际从父元素摘下的子树数量
    pub fn detached_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.via_earlier_removal).count()
    }

    /// 生成清单摘要
    pub fn summary(&self) -> String {
        format!(
            "entries: {}, detached subtrees: {}, nested in earlier removals: {}",
            self.len(),
            self.detached_count(),
            self.len() - self.detached_count()
        )
    }
}

impl<'a> IntoIterator for &'a RemovalManifest {
    type Item = &'a RemovalEntry;
    type IntoIter = std::slice::Iter<'a, RemovalEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
