use super::{Document, Element, ElementId, XmlDeclaration};
use crate::utils::AlsError;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::Reader;
use std::fmt::Display;

/// 文档树构建器
///
/// 按 start / text / end 事件增量构建 arena，同时建立父引用。
/// 全量解析和流式定位共用这一构建器。
#[derive(Debug, Default)]
pub struct TreeBuilder {
    elements: Vec<Element>,
    stack: Vec<ElementId>,
    root: Option<ElementId>,
    declaration: Option<XmlDeclaration>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开一个元素
    pub fn start(&mut self, tag: String, attributes: Vec<(String, String)>) -> Result<ElementId, AlsError> {
        let parent = self.stack.last().copied();
        if parent.is_none() && self.root.is_some() {
            return Err(AlsError::FormatError(format!(
                "multiple root elements: found <{}> after the document element",
                tag
            )));
        }

        let id = self.elements.len();
        let mut element = Element::new(tag, attributes);
        element.parent = parent;
        self.elements.push(element);

        match parent {
            Some(parent) => self.elements[parent].children.push(id),
            None => self.root = Some(id),
        }
        self.stack.push(id);

        Ok(id)
    }

    /// 追加文本
    ///
    /// 还没有子元素时记入元素自身的 text，否则记入最后一个子元素的 tail，
    /// 这样混合内容保持原来的先后顺序。
    pub fn text(&mut self, text: &str) -> Result<(), AlsError> {
        let Some(&id) = self.stack.last() else {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(AlsError::FormatError(format!(
                "text outside of the document element: {:?}",
                text.trim()
            )));
        };

        let last_child = self.elements[id].children.last().copied();
        let slot = match last_child {
            Some(child) => &mut self.elements[child].tail,
            None => &mut self.elements[id].text,
        };
        slot.get_or_insert_with(String::new).push_str(text);
        Ok(())
    }

    /// 关闭当前元素
    ///
    /// 有子元素时，子元素之间仅空白的文本只是排版，在这里丢弃；叶子元素的空白文本保留。
    pub fn end(&mut self) -> Result<ElementId, AlsError> {
        let id = self
            .stack
            .pop()
            .ok_or_else(|| AlsError::FormatError("closing tag without a matching opening tag".to_string()))?;

        if !self.elements[id].children.is_empty() {
            let children = self.elements[id].children.clone();
            drop_blank(&mut self.elements[id].text);
            for child in children {
                drop_blank(&mut self.elements[child].tail);
            }
        }
        Ok(id)
    }

    pub fn set_declaration(&mut self, declaration: XmlDeclaration) {
        self.declaration = Some(declaration);
    }

    /// 结束构建
    pub fn finish(self) -> Result<Document, AlsError> {
        if let Some(&open) = self.stack.last() {
            return Err(AlsError::FormatError(format!(
                "unexpected end of document: <{}> is not closed",
                self.elements[open].tag
            )));
        }
        let root = self
            .root
            .ok_or_else(|| AlsError::FormatError("document has no root element".to_string()))?;

        Ok(Document::from_parts(self.elements, root, self.declaration))
    }
}

fn drop_blank(text: &mut Option<String>) {
    if text.as_deref().is_some_and(|t| t.trim().is_empty()) {
        *text = None;
    }
}

/// 把 quick-xml 的错误包装为 FormatError
pub(crate) fn xml_error(position: impl Display, err: impl Display) -> AlsError {
    AlsError::FormatError(format!("malformed XML at byte {}: {}", position, err))
}

/// 解码开始标签：标签名与属性
pub(crate) fn decode_start(start: &BytesStart<'_>) -> Result<(String, Vec<(String, String)>), AlsError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|e| AlsError::FormatError(format!("bad attribute in <{}>: {}", tag, e)))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| AlsError::FormatError(format!("bad value for {}.{}: {}", tag, key, e)))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok((tag, attributes))
}

/// 解码文本内容（处理实体转义）
pub(crate) fn decode_text(text: &BytesText<'_>) -> Result<String, AlsError> {
    text.unescape()
        .map(|t| t.into_owned())
        .map_err(|e| AlsError::FormatError(format!("bad text content: {}", e)))
}

/// 解码 XML 声明
pub(crate) fn decode_declaration(decl: &BytesDecl<'_>) -> Result<XmlDeclaration, AlsError> {
    let version = decl
        .version()
        .map(|v| String::from_utf8_lossy(&v).into_owned())
        .map_err(|e| AlsError::FormatError(format!("bad XML declaration: {}", e)))?;
    let encoding = decl
        .encoding()
        .transpose()
        .map_err(|e| AlsError::FormatError(format!("bad XML declaration: {}", e)))?
        .map(|v| String::from_utf8_lossy(&v).into_owned());
    let standalone = decl
        .standalone()
        .transpose()
        .map_err(|e| AlsError::FormatError(format!("bad XML declaration: {}", e)))?
        .map(|v| String::from_utf8_lossy(&v).into_owned());

    Ok(XmlDeclaration { version, encoding, standalone })
}

/// 全量解析 XML 文本
pub fn parse_document(xml: &str) -> Result<Document, AlsError> {
    let mut reader = Reader::from_str(xml);
    let mut builder = TreeBuilder::new();

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Decl(decl)) => builder.set_declaration(decode_declaration(&decl)?),
            Ok(Event::Start(start)) => {
                let (tag, attributes) = decode_start(&start)?;
                builder.start(tag, attributes)?;
            }
            Ok(Event::Empty(start)) => {
                let (tag, attributes) = decode_start(&start)?;
                builder.start(tag, attributes)?;
                builder.end()?;
            }
            Ok(Event::End(_)) => {
                builder.end()?;
            }
            Ok(Event::Text(text)) => builder.text(&decode_text(&text)?)?,
            Ok(Event::CData(data)) => {
                builder.text(&String::from_utf8_lossy(&data.into_inner()))?;
            }
            Ok(Event::Eof) => break,
            // 注释、处理指令与 DOCTYPE 不进入文档树
            Ok(_) => {}
            Err(e) => return Err(xml_error(position, e)),
        }
    }

    builder.finish()
}
