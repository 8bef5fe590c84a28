/// XML 文档树模块
///
/// 文档以 arena 形式保存：所有元素存放在一个 `Vec<Element>` 中，通过 `ElementId`（下标）互相引用。
/// 父引用在解析时建立，只是一个下标，不拥有父元素；删除元素时只需把它从父元素的子序列中摘下。
///
/// # 架构设计
///
/// - **parser**: 基于 quick-xml 事件的树构建器
/// - **writer**: 规范（紧凑）与美化两种序列化
pub mod parser;
pub mod writer;

pub use parser::TreeBuilder;

use crate::utils::AlsError;

/// 元素在文档 arena 中的下标
pub type ElementId = usize;

/// XML 声明（`<?xml version="1.0" encoding="UTF-8"?>`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// 元素节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// 标签名（区分大小写）
    pub tag: String,
    /// 属性列表，保持原始顺序
    pub attributes: Vec<(String, String)>,
    /// 第一个子元素之前的文本；子元素之间仅空白的排版文本不保存
    pub text: Option<String>,
    /// 紧跟在本元素结束标签之后、下一个兄弟之前的文本（属于父元素的内容）
    pub tail: Option<String>,
    /// 父元素（非拥有引用）
    parent: Option<ElementId>,
    /// 子元素，顺序有意义
    children: Vec<ElementId>,
}

impl Element {
    /// 创建一个没有父元素和子元素的元素
    pub fn new(tag: impl Into<String>, attributes: Vec<(String, String)>) -> Self {
        Self {
            tag: tag.into(),
            attributes,
            text: None,
            tail: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// 按名称查找属性值
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    /// 元素自身（标签、属性名、属性值、文本）是否包含给定字符串
    pub fn mentions(&self, needle: &str) -> bool {
        self.tag.contains(needle)
            || self
                .attributes
                .iter()
                .any(|(key, value)| key.contains(needle) || value.contains(needle))
            || self.text.as_deref().is_some_and(|text| text.contains(needle))
    }
}

/// 解析后的完整 XML 文档
#[derive(Debug, Clone)]
pub struct Document {
    elements: Vec<Element>,
    root: ElementId,
    /// 原文档的 XML 声明
    pub declaration: Option<XmlDeclaration>,
}

impl Document {
    /// 从 XML 文本解析文档
    pub fn parse(xml: &str) -> Result<Self, AlsError> {
        parser::parse_document(xml)
    }

    pub(crate) fn from_parts(
        elements: Vec<Element>,
        root: ElementId,
        declaration: Option<XmlDeclaration>,
    ) -> Self {
        Self { elements, root, declaration }
    }

    /// 根元素
    pub fn root(&self) -> ElementId {
        self.root
    }

    /// 按 id 获取元素
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    /// 按 id 获取元素
    ///
    /// # Panics
    /// `id` 不属于本文档时 panic；id 只应来自同一文档。
    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id]
    }

    pub fn tag(&self, id: ElementId) -> &str {
        &self.elements[id].tag
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        &self.elements[id].children
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.elements.get(id).and_then(|e| e.parent)
    }

    /// 祖先元素（不含自身），由近到远
    pub fn ancestors(&self, id: ElementId) -> Ancestors<'_> {
        Ancestors {
            document: self,
            next: self.parent(id),
        }
    }

    /// 以 `id` 为根的子树，先序遍历（包含自身）
    pub fn subtree(&self, id: ElementId) -> Descendants<'_> {
        Descendants {
            document: self,
            stack: vec![id],
        }
    }

    /// 后代元素，先序遍历（不含自身）
    pub fn descendants(&self, id: ElementId) -> Descendants<'_> {
        Descendants {
            document: self,
            stack: self.children(id).iter().rev().copied().collect(),
        }
    }

    /// 从根开始的先序遍历
    pub fn iter(&self) -> Descendants<'_> {
        self.subtree(self.root)
    }

    /// 第一个标签为 `tag` 的后代（先序）
    pub fn find_descendant(&self, id: ElementId, tag: &str) -> Option<ElementId> {
        self.descendants(id).find(|&d| self.tag(d) == tag)
    }

    /// 从根可达的元素数量
    pub fn element_count(&self) -> usize {
        self.iter().count()
    }

    /// 元素当前是否仍挂在根下
    pub fn is_attached(&self, id: ElementId) -> bool {
        if id == self.root {
            return true;
        }
        match self.ancestors(id).last() {
            Some(top) => top == self.root,
            None => false,
        }
    }

    /// 元素在同标签兄弟中的序号（从 1 开始）；根元素为 1
    pub fn same_tag_position(&self, id: ElementId) -> usize {
        let Some(parent) = self.parent(id) else {
            return 1;
        };
        let tag = self.tag(id);
        self.children(parent)
            .iter()
            .filter(|&&sibling| self.tag(sibling) == tag)
            .position(|&sibling| sibling == id)
            .map_or(1, |index| index + 1)
    }

    /// 把元素从父元素的子序列中摘下，返回它原来的位置
    ///
    /// 整个子树随之脱离文档，元素的 tail 文本一并移除；arena 中的数据保留，但从根不再可达。
    pub fn detach(&mut self, id: ElementId) -> Result<usize, AlsError> {
        if id == self.root {
            return Err(AlsError::StructureError("the root element cannot be removed".to_string()));
        }
        let element = self.elements.get(id).ok_or_else(|| {
            AlsError::StructureError(format!("element #{} does not belong to this document", id))
        })?;
        let parent = element.parent.ok_or_else(|| {
            AlsError::StructureError(format!("<{}> (#{}) is not attached to a parent", element.tag, id))
        })?;

        let index = self.elements[parent]
            .children
            .iter()
            .position(|&child| child == id)
            .ok_or_else(|| {
                AlsError::StructureError(format!(
                    "<{}> (#{}) is no longer a child of its recorded parent #{}",
                    self.elements[id].tag, id, parent
                ))
            })?;
        self.elements[parent].children.remove(index);
        self.elements[id].parent = None;

        Ok(index)
    }

    /// 把一棵子树复制为独立的文档
    pub fn extract_subtree(&self, id: ElementId) -> Document {
        let mut elements = Vec::new();
        // (原 id, 新父 id)
        let mut stack: Vec<(ElementId, Option<ElementId>)> = vec![(id, None)];

        while let Some((source, parent)) = stack.pop() {
            let original = &self.elements[source];
            let new_id = elements.len();
            elements.push(Element {
                tag: original.tag.clone(),
                attributes: original.attributes.clone(),
                text: original.text.clone(),
                // 子树根之后的文本不属于子树
                tail: if source == id { None } else { original.tail.clone() },
                parent,
                children: Vec::new(),
            });
            if let Some(parent) = parent {
                let parent_element: &mut Element = &mut elements[parent];
                parent_element.children.push(new_id);
            }
            stack.extend(original.children.iter().rev().map(|&child| (child, Some(new_id))));
        }

        Document::from_parts(elements, 0, None)
    }

    /// 按逻辑路径查找元素
    ///
    /// 路径由 `/` 分隔；段可以是 `Tag`、`Tag[n]`（同标签兄弟中的第 n 个）或 `...`（省略任意层级）。
    /// 第一段必须是根元素。省略号让路径可能对应多个元素，因此返回候选集合。
    pub fn resolve_path(&self, path: &str) -> Vec<ElementId> {
        let mut segments = path.split('/');
        let Some((root_tag, root_ordinal)) = segments.next().and_then(parse_segment) else {
            return Vec::new();
        };
        if self.tag(self.root) != root_tag || root_ordinal.is_some_and(|n| n != 1) {
            return Vec::new();
        }

        let mut current = vec![self.root];
        let mut deep = false;

        for segment in segments {
            if segment == "..." {
                deep = true;
                continue;
            }
            let Some((tag, ordinal)) = parse_segment(segment) else {
                return Vec::new();
            };

            let mut next = Vec::new();
            for &candidate in &current {
                let pool: Vec<ElementId> = if deep {
                    self.descendants(candidate).collect()
                } else {
                    self.children(candidate).to_vec()
                };
                for id in pool {
                    if self.tag(id) != tag {
                        continue;
                    }
                    if ordinal.is_some_and(|n| self.same_tag_position(id) != n) {
                        continue;
                    }
                    if !next.contains(&id) {
                        next.push(id);
                    }
                }
            }

            current = next;
            deep = false;
        }

        current
    }
}

/// 解析路径段：`Tag` 或 `Tag[n]`
fn parse_segment(segment: &str) -> Option<(&str, Option<usize>)> {
    if segment.is_empty() {
        return None;
    }
    match segment.strip_suffix(']').and_then(|s| s.split_once('[')) {
        Some((tag, ordinal)) => ordinal.parse().ok().map(|n| (tag, Some(n))),
        None => Some((segment, None)),
    }
}

/// 祖先迭代器
pub struct Ancestors<'a> {
    document: &'a Document,
    next: Option<ElementId>,
}

impl Iterator for Ancestors<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.document.parent(current);
        Some(current)
    }
}

/// 先序遍历迭代器
pub struct Descendants<'a> {
    document: &'a Document,
    stack: Vec<ElementId>,
}

impl Iterator for Descendants<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.document.children(current).iter().rev().copied());
        Some(current)
    }
}
