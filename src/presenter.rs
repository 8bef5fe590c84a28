/// 命中元素的展示
use crate::document::{Document, ElementId};
use crate::utils::AlsError;

/// 默认的展示长度上限（字符数）
pub const DEFAULT_MAX_LENGTH: usize = 400;

/// 截断后追加的标记
pub const TRUNCATION_MARKER: &str = "\n... (truncated) ...";

/// 把元素子树渲染为带缩进的 XML，超过 `max_length` 个字符时截断
pub fn render(document: &Document, id: ElementId, max_length: usize) -> Result<String, AlsError> {
    let pretty = document.element_to_pretty_xml(id)?;
    Ok(truncate(&pretty, max_length))
}

/// 按字符（而非字节）截断，并追加截断标记
pub fn truncate(text: &str, max_length: usize) -> String {
    match text.char_indices().nth(max_length) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
