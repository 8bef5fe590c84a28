use super::{Document, ElementId};
use crate::utils::AlsError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

/// 美化输出的缩进宽度
pub const PRETTY_INDENT: usize = 2;

fn write_error(err: impl std::fmt::Display) -> AlsError {
    AlsError::FormatError(format!("failed to serialize XML: {}", err))
}

impl Document {
    /// 规范序列化整个文档（不缩进，保留原 XML 声明）
    pub fn to_xml(&self) -> Result<String, AlsError> {
        let mut writer = Writer::new(Vec::new());

        if let Some(decl) = &self.declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new(
                    &decl.version,
                    decl.encoding.as_deref(),
                    decl.standalone.as_deref(),
                )))
                .map_err(write_error)?;
        }
        self.write_element(self.root, &mut writer)?;

        into_string(writer)
    }

    /// 规范序列化一棵子树
    pub fn element_to_xml(&self, id: ElementId) -> Result<String, AlsError> {
        let mut writer = Writer::new(Vec::new());
        self.write_element(id, &mut writer)?;
        into_string(writer)
    }

    /// 带缩进地序列化一棵子树
    pub fn element_to_pretty_xml(&self, id: ElementId) -> Result<String, AlsError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', PRETTY_INDENT);
        self.write_element(id, &mut writer)?;
        into_string(writer)
    }

    /// 递归写出元素：无文本无子元素时写成自闭合标签
    fn write_element<W: Write>(&self, id: ElementId, writer: &mut Writer<W>) -> Result<(), AlsError> {
        let element = self.element(id);

        let mut start = BytesStart::new(element.tag.as_str());
        for (key, value) in &element.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if element.children().is_empty() && element.text.is_none() {
            return writer.write_event(Event::Empty(start)).map_err(write_error);
        }

        writer.write_event(Event::Start(start)).map_err(write_error)?;
        if let Some(text) = &element.text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error)?;
        }
        for &child in element.children() {
            self.write_element(child, writer)?;
            if let Some(tail) = &self.element(child).tail {
                writer
                    .write_event(Event::Text(BytesText::new(tail)))
                    .map_err(write_error)?;
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(element.tag.as_str())))
            .map_err(write_error)
    }
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String, AlsError> {
    String::from_utf8(writer.into_inner()).map_err(write_error)
}
