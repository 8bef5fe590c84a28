/// 元素定位模块
///
/// 按谓词在文档中查找元素，并为每个命中记录所在音轨与逻辑路径。
/// 所有标签比较都集中在 [`Predicate`] 中，显示与删除使用同一套匹配规则。
///
/// # 架构设计
///
/// - **locator**: 内存文档上的惰性查找（[`find`]）
/// - **stream**: 基于 `BufRead` 的流式查找，只物化候选子树
pub mod stream;

pub use stream::{StreamLocator, StreamedDevice};

use serde::Serialize;
use crate::document::{Descendants, Document, ElementId};

/// 音轨列表元素的标签
pub const TRACK_LIST_TAG: &str = "Tracks";

/// 被识别为音轨的标签
pub const TRACK_TAGS: &[&str] = &["MidiTrack", "AudioTrack", "GroupTrack", "ReturnTrack"];

/// 采样器族的已知容器标签（按内容判断）
pub const SAMPLER_CONTAINER_TAGS: &[&str] = &["InstrumentGroupDevice"];

/// 采样器族内容标记（区分大小写）
pub const SAMPLER_MARKERS: &[&str] = &["Simpler", "Sampler"];

/// 音轨名称元素
pub const TRACK_NAME_TAG: &str = "UserName";

/// 音轨没有名称时的占位
pub const NO_NAME: &str = "(no name)";

/// 采样器族匹配的严格程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Strictness {
    /// 容器标签的子树中出现 "Simpler"/"Sampler" 时也算命中
    #[default]
    Broad,
    /// 只看标签名
    Strict,
}

/// 查找谓词
///
/// 标签比较均为 ASCII 大小写不敏感；内容标记 [`SAMPLER_MARKERS`] 区分大小写。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// 标签名完全相同
    Tag(String),
    /// 标签名包含给定片段
    TagContains(String),
    /// 采样器族设备
    SamplerFamily(Strictness),
}

impl Predicate {
    /// 默认（宽松）的采样器族谓词
    pub fn sampler_family() -> Self {
        Predicate::SamplerFamily(Strictness::Broad)
    }

    /// 只看标签名能否成为候选
    ///
    /// 能命中的元素一定是候选，流式定位据此决定哪些子树需要物化。
    pub fn is_candidate(&self, tag: &str) -> bool {
        match self {
            Predicate::Tag(name) => tag.eq_ignore_ascii_case(name),
            Predicate::TagContains(fragment) => {
                tag.to_ascii_lowercase().contains(&fragment.to_ascii_lowercase())
            }
            Predicate::SamplerFamily(_) => {
                is_sampler_tag(tag)
                    || SAMPLER_CONTAINER_TAGS
                        .iter()
                        .any(|container| tag.eq_ignore_ascii_case(container))
            }
        }
    }

    /// 元素是否命中
    pub fn matches(&self, document: &Document, id: ElementId) -> bool {
        let tag = document.tag(id);
        if !self.is_candidate(tag) {
            return false;
        }
        match self {
            Predicate::SamplerFamily(strictness) => {
                if is_sampler_tag(tag) {
                    return true;
                }
                let hit = *strictness == Strictness::Broad && subtree_mentions_sampler(document, id);
                if hit {
                    tracing::warn!("<{}> matched only through its content", tag);
                }
                hit
            }
            _ => true,
        }
    }
}

/// 标签名本身属于采样器族
fn is_sampler_tag(tag: &str) -> bool {
    let lower = tag.to_ascii_lowercase();
    lower.contains("sampler") || lower.contains("simpler")
}

/// 子树的序列化文本中是否出现采样器标记
///
/// 标记出现在标签、属性或文本中的任意一处即可，与在序列化结果中做子串查找等价。
fn subtree_mentions_sampler(document: &Document, id: ElementId) -> bool {
    document.subtree(id).any(|node| {
        let element = document.element(node);
        // 子树根的 tail 在子树之外
        let tail = if node == id { None } else { element.tail.as_deref() };
        SAMPLER_MARKERS
            .iter()
            .any(|marker| element.mentions(marker) || tail.is_some_and(|t| t.contains(marker)))
    })
}

/// 一个命中结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceMatch {
    /// 命中的元素
    #[serde(skip)]
    pub element: ElementId,
    /// 定位时的父元素
    #[serde(skip)]
    pub parent: Option<ElementId>,
    /// 元素标签
    pub tag: String,
    /// 所在音轨在同标签音轨中的序号（从 1 开始）
    pub track_number: Option<usize>,
    /// 所在音轨名称
    pub track_name: Option<String>,
    /// 逻辑路径
    pub path: String,
}

impl DeviceMatch {
    /// 为文档中的一个元素生成命中记录
    pub fn locate(document: &Document, id: ElementId) -> Self {
        let lineage = lineage(document, id);
        let chain = ordinal_chain(document, &lineage);
        let track_index = track_position(&chain);

        let (track_number, track_name) = match track_index {
            Some(index) => (Some(chain[index].1), Some(track_name(document, lineage[index]))),
            None => (None, None),
        };

        DeviceMatch {
            element: id,
            parent: document.parent(id),
            tag: document.tag(id).to_string(),
            track_number,
            track_name,
            path: format_path(&chain, track_index),
        }
    }
}

/// 惰性命中迭代器：一次先序遍历，用完即止
pub struct Matches<'a> {
    document: &'a Document,
    predicate: Predicate,
    walk: Descendants<'a>,
}

impl Iterator for Matches<'_> {
    type Item = DeviceMatch;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.walk.next()?;
            if self.predicate.matches(self.document, id) {
                return Some(DeviceMatch::locate(self.document, id));
            }
        }
    }
}

/// 按谓词查找元素，结果按文档先序排列
pub fn find(document: &Document, predicate: Predicate) -> Matches<'_> {
    Matches {
        document,
        predicate,
        walk: document.iter(),
    }
}

/// 元素是否是音轨：标签属于音轨类型且父元素是音轨列表
pub fn is_track(document: &Document, id: ElementId) -> bool {
    TRACK_TAGS.contains(&document.tag(id))
        && document
            .parent(id)
            .is_some_and(|parent| document.tag(parent) == TRACK_LIST_TAG)
}

/// 音轨名称：第一个 `UserName` 后代的 `Value` 属性或文本
pub fn track_name(document: &Document, track: ElementId) -> String {
    document
        .find_descendant(track, TRACK_NAME_TAG)
        .and_then(|name| {
            let element = document.element(name);
            element
                .attribute("Value")
                .or(element.text.as_deref().filter(|text| !text.trim().is_empty()))
                .map(|value| value.to_string())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| NO_NAME.to_string())
}

/// 从根到元素（包含自身）的 id 序列
pub(crate) fn lineage(document: &Document, id: ElementId) -> Vec<ElementId> {
    let mut lineage: Vec<ElementId> = std::iter::once(id).chain(document.ancestors(id)).collect();
    lineage.reverse();
    lineage
}

/// 把 id 序列转换为 (标签, 同标签序号) 链
pub(crate) fn ordinal_chain(document: &Document, lineage: &[ElementId]) -> Vec<(String, usize)> {
    lineage
        .iter()
        .map(|&node| (document.tag(node).to_string(), document.same_tag_position(node)))
        .collect()
}

/// 链中音轨所在的下标（最内层）
pub(crate) fn track_position<S: AsRef<str>>(chain: &[(S, usize)]) -> Option<usize> {
    (1..chain.len()).rev().find(|&index| {
        TRACK_TAGS.contains(&chain[index].0.as_ref()) && chain[index - 1].0.as_ref() == TRACK_LIST_TAG
    })
}

/// 生成逻辑路径
///
/// 音轨之上的层级原样写出，音轨写成 `Tag[n]`，音轨与目标之间的层级用 `...` 省略。
/// 不在音轨中的元素写成 `Root/.../Tag`。
pub(crate) fn format_path<S: AsRef<str>>(chain: &[(S, usize)], track_index: Option<usize>) -> String {
    let Some(last) = chain.len().checked_sub(1) else {
        return String::new();
    };
    let mut segments: Vec<String> = Vec::new();

    match track_index {
        Some(track) => {
            segments.extend(chain[..track].iter().map(|(tag, _)| tag.as_ref().to_string()));
            segments.push(format!("{}[{}]", chain[track].0.as_ref(), chain[track].1));
            if last > track {
                if last > track + 1 {
                    segments.push("...".to_string());
                }
                segments.push(chain[last].0.as_ref().to_string());
            }
        }
        None => {
            segments.push(chain[0].0.as_ref().to_string());
            if last > 0 {
                if last > 1 {
                    segments.push("...".to_string());
                }
                segments.push(chain[last].0.as_ref().to_string());
            }
        }
    }

    segments.join("/")
}
