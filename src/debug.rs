use crate::document::{Document, ElementId};
use crate::project::AlsProject;
use crate::utils::AlsError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// 文档结构调试器
pub struct AlsDebugger;

impl AlsDebugger {
    /// 生成结构大纲并写入文件
    pub fn dump_to_file(project: &AlsProject, output_path: &Path) -> Result<(), AlsError> {
        let mut output = BufWriter::new(File::create(output_path)?);
        Self::dump_structure(project, &mut output)?;
        output.flush()?;
        Ok(())
    }

    /// 生成结构大纲：每个元素一行（标签、属性数、子元素数、文本长度）
    pub fn dump_structure<W: Write>(project: &AlsProject, output: &mut W) -> Result<(), AlsError> {
        let document = &project.document;

        writeln!(output, "=== ALS structure dump ===")?;
        writeln!(output, "File: {}", project.get_name())?;
        writeln!(output, "Compressed: {}", if project.was_compressed { "yes" } else { "no" })?;
        writeln!(output, "Elements: {}", document.element_count())?;
        if let Some(decl) = &document.declaration {
            writeln!(
                output,
                "Declaration: version {}, encoding {}",
                decl.version,
                decl.encoding.as_deref().unwrap_or("-")
            )?;
        }
        writeln!(output)?;

        Self::dump_element(document, document.root(), output, 0)
    }

    fn dump_element<W: Write>(
        document: &Document,
        id: ElementId,
        output: &mut W,
        indent: usize,
    ) -> Result<(), AlsError> {
        let element = document.element(id);
        let prefix = "  ".repeat(indent);

        write!(
            output,
            "{}{} (attributes: {}, children: {})",
            prefix,
            element.tag,
            element.attributes.len(),
            element.children().len()
        )?;
        if let Some(value) = element.attribute("Value") {
            write!(output, " Value={:?}", value)?;
        }
        if let Some(text) = &element.text {
            write!(output, " text: {} chars", text.chars().count())?;
        }
        writeln!(output)?;

        for &child in element.children() {
            Self::dump_element(document, child, output, indent + 1)?;
        }
        Ok(())
    }

    /// 对比两个文档的结构，返回所有差异（为空表示结构一致）
    pub fn compare_documents(original: &Document, rebuilt: &Document) -> Vec<String> {
        let mut differences = Vec::new();
        let root_label = original.tag(original.root()).to_string();
        Self::compare_elements(
            original,
            original.root(),
            rebuilt,
            rebuilt.root(),
            &root_label,
            &mut differences,
        );
        differences
    }

    fn compare_elements(
        original: &Document,
        a: ElementId,
        rebuilt: &Document,
        b: ElementId,
        label: &str,
        differences: &mut Vec<String>,
    ) {
        let left = original.element(a);
        let right = rebuilt.element(b);

        if left.tag != right.tag {
            differences.push(format!("{}: tag mismatch: {} vs {}", label, left.tag, right.tag));
            return;
        }
        if left.attributes != right.attributes {
            differences.push(format!(
                "{}: attributes differ: {:?} vs {:?}",
                label, left.attributes, right.attributes
            ));
        }
        if left.text != right.text {
            differences.push(format!("{}: text differs: {:?} vs {:?}", label, left.text, right.text));
        }
        if left.tail != right.tail {
            differences.push(format!("{}: tail text differs: {:?} vs {:?}", label, left.tail, right.tail));
        }
        if left.children().len() != right.children().len() {
            differences.push(format!(
                "{}: child count mismatch: {} vs {}",
                label,
                left.children().len(),
                right.children().len()
            ));
        }

        for (index, (&x, &y)) in left.children().iter().zip(right.children()).enumerate() {
            let child_label = format!("{}/{}#{}", label, original.tag(x), index + 1);
            Self::compare_elements(original, x, rebuilt, y, &child_label, differences);
        }
    }
}
