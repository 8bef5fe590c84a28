/// 流式定位
///
/// 逐个读取 XML 事件，只为候选标签开头的子树构建小型文档；子树关闭并完成匹配后即释放。
/// 命中记录与内存定位完全一致（顺序、音轨序号、名称、路径）。
/// 音轨名称可能出现在设备之后，所以音轨内的命中会暂存到音轨关闭为止。
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;

use super::{format_path, lineage, ordinal_chain, track_name, track_position, Predicate};
use super::{NO_NAME, TRACK_LIST_TAG, TRACK_NAME_TAG, TRACK_TAGS};
use crate::document::parser::{decode_start, decode_text, xml_error};
use crate::document::{Document, TreeBuilder};
use crate::io::open_payload_reader;
use crate::utils::AlsError;

/// 流式定位的命中结果
#[derive(Debug, Clone, Serialize)]
pub struct StreamedDevice {
    pub tag: String,
    pub track_number: Option<usize>,
    pub track_name: Option<String>,
    pub path: String,
    /// 命中元素的独立子树
    #[serde(skip)]
    pub subtree: Document,
}

/// 已打开元素的状态
#[derive(Debug)]
struct Frame {
    tag: String,
    ordinal: usize,
    is_track: bool,
    name: NameState,
    child_counts: HashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameState {
    Unknown,
    Reading,
    Known(String),
}

impl NameState {
    fn resolve(&self) -> String {
        match self {
            NameState::Known(name) if !name.is_empty() => name.clone(),
            _ => NO_NAME.to_string(),
        }
    }
}

/// 正在读取文本的 `UserName`
#[derive(Debug)]
struct Naming {
    depth: usize,
    tracks: Vec<usize>,
    /// 第一个子元素之前的文本
    text: String,
    has_child: bool,
}

/// 正在物化的候选子树
struct Capture {
    builder: TreeBuilder,
    /// 子树根所在的层数
    depth: usize,
    ordinal: usize,
    /// 子树根之上的 (标签, 序号) 链
    prefix: Vec<(String, usize)>,
}

/// 读出的事件（已脱离缓冲区）
enum XmlEvent {
    Start(String, Vec<(String, String)>),
    Empty(String, Vec<(String, String)>),
    End,
    Text(String),
    Eof,
    Skip,
}

/// 流式定位器
///
/// 迭代产出 `Result<StreamedDevice, AlsError>`；出错后迭代结束。
pub struct StreamLocator<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    predicate: Predicate,
    frames: Vec<Frame>,
    capture: Option<Capture>,
    naming: Option<Naming>,
    /// 等待音轨名称的命中：(结果, 等待的音轨层下标)
    pending: VecDeque<(StreamedDevice, Option<usize>)>,
    seen_root: bool,
    finished: bool,
}

impl<R: BufRead> StreamLocator<R> {
    /// 从已解码的 XML 源创建
    pub fn from_reader(source: R, predicate: Predicate) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            predicate,
            frames: Vec::new(),
            capture: None,
            naming: None,
            pending: VecDeque::new(),
            seen_root: false,
            finished: false,
        }
    }

    fn next_event(&mut self) -> Result<XmlEvent, AlsError> {
        self.buf.clear();
        let position = self.reader.buffer_position();
        let event = match self.reader.read_event_into(&mut self.buf) {
            Ok(Event::Start(start)) => {
                let (tag, attributes) = decode_start(&start)?;
                XmlEvent::Start(tag, attributes)
            }
            Ok(Event::Empty(start)) => {
                let (tag, attributes) = decode_start(&start)?;
                XmlEvent::Empty(tag, attributes)
            }
            Ok(Event::End(_)) => XmlEvent::End,
            Ok(Event::Text(text)) => XmlEvent::Text(decode_text(&text)?),
            Ok(Event::CData(data)) => XmlEvent::Text(String::from_utf8_lossy(&data).into_owned()),
            Ok(Event::Eof) => XmlEvent::Eof,
            Ok(_) => XmlEvent::Skip,
            Err(e) => return Err(xml_error(position, e)),
        };
        Ok(event)
    }

    /// 处理一个事件；返回 false 表示到达文档末尾
    fn advance(&mut self) -> Result<bool, AlsError> {
        match self.next_event()? {
            XmlEvent::Start(tag, attributes) => self.on_start(tag, attributes)?,
            XmlEvent::Empty(tag, attributes) => {
                self.on_start(tag, attributes)?;
                self.on_end()?;
            }
            XmlEvent::End => self.on_end()?,
            XmlEvent::Text(text) => self.on_text(&text)?,
            XmlEvent::Skip => {}
            XmlEvent::Eof => {
                if let Some(open) = self.frames.last() {
                    return Err(AlsError::FormatError(format!(
                        "unexpected end of document: <{}> is not closed",
                        open.tag
                    )));
                }
                if !self.seen_root {
                    return Err(AlsError::FormatError("document has no root element".to_string()));
                }
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn on_start(&mut self, tag: String, attributes: Vec<(String, String)>) -> Result<(), AlsError> {
        if self.frames.is_empty() {
            if self.seen_root {
                return Err(AlsError::FormatError(format!(
                    "multiple root elements: found <{}> after the document element",
                    tag
                )));
            }
            self.seen_root = true;
        }

        let ordinal = match self.frames.last_mut() {
            Some(parent) => {
                let count = parent.child_counts.entry(tag.clone()).or_insert(0);
                *count += 1;
                *count
            }
            None => 1,
        };
        let is_track = TRACK_TAGS.contains(&tag.as_str())
            && self.frames.last().is_some_and(|parent| parent.tag == TRACK_LIST_TAG);
        let depth = self.frames.len() + 1;

        if let Some(naming) = &mut self.naming {
            naming.has_child = true;
        } else if tag == TRACK_NAME_TAG {
            self.begin_naming(&attributes, depth);
        }

        if let Some(capture) = &mut self.capture {
            capture.builder.start(tag.clone(), attributes)?;
        } else if self.predicate.is_candidate(&tag) {
            let mut builder = TreeBuilder::new();
            builder.start(tag.clone(), attributes)?;
            self.capture = Some(Capture {
                builder,
                depth,
                ordinal,
                prefix: self.frames.iter().map(|f| (f.tag.clone(), f.ordinal)).collect(),
            });
        }

        self.frames.push(Frame {
            tag,
            ordinal,
            is_track,
            name: NameState::Unknown,
            child_counts: HashMap::new(),
        });
        Ok(())
    }

    /// 遇到 `UserName`：为还没有名称的音轨确定名称
    fn begin_naming(&mut self, attributes: &[(String, String)], depth: usize) {
        let tracks: Vec<usize> = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.is_track && frame.name == NameState::Unknown)
            .map(|(index, _)| index)
            .collect();
        if tracks.is_empty() {
            return;
        }

        match attributes.iter().find(|(key, _)| key == "Value") {
            Some((_, value)) => {
                for &index in &tracks {
                    self.frames[index].name = NameState::Known(value.clone());
                }
            }
            None => {
                for &index in &tracks {
                    self.frames[index].name = NameState::Reading;
                }
                self.naming = Some(Naming { depth, tracks, text: String::new(), has_child: false });
            }
        }
    }

    fn on_text(&mut self, text: &str) -> Result<(), AlsError> {
        if self.frames.is_empty() {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(AlsError::FormatError(format!(
                "text outside of the document element: {:?}",
                text.trim()
            )));
        }

        if let Some(capture) = &mut self.capture {
            capture.builder.text(text)?;
        }
        if let Some(naming) = &mut self.naming {
            if naming.depth == self.frames.len() && !naming.has_child {
                naming.text.push_str(text);
            }
        }
        Ok(())
    }

    fn on_end(&mut self) -> Result<(), AlsError> {
        let depth = self.frames.len();

        if self.naming.as_ref().is_some_and(|naming| naming.depth == depth) {
            if let Some(naming) = self.naming.take() {
                let name = if naming.text.trim().is_empty() { String::new() } else { naming.text };
                for index in naming.tracks {
                    self.frames[index].name = NameState::Known(name.clone());
                }
            }
        }

        let closes_capture = match &mut self.capture {
            Some(capture) => {
                capture.builder.end()?;
                capture.depth == depth
            }
            None => false,
        };
        if closes_capture {
            if let Some(capture) = self.capture.take() {
                self.emit(capture)?;
            }
        }

        let frame = self
            .frames
            .pop()
            .ok_or_else(|| AlsError::FormatError("closing tag without a matching opening tag".to_string()))?;

        if frame.is_track {
            let name = frame.name.resolve();
            let index = self.frames.len();
            for (device, waiting) in self.pending.iter_mut() {
                if *waiting == Some(index) {
                    device.track_name = Some(name.clone());
                    *waiting = None;
                }
            }
        }
        Ok(())
    }

    /// 在关闭的候选子树中按先序匹配，结果进入队列
    fn emit(&mut self, capture: Capture) -> Result<(), AlsError> {
        let Capture { builder, ordinal, prefix, .. } = capture;
        let subtree = builder.finish()?;

        for id in subtree.iter() {
            if !self.predicate.matches(&subtree, id) {
                continue;
            }

            let local = lineage(&subtree, id);
            let mut chain = prefix.clone();
            let offset = chain.len();
            chain.extend(ordinal_chain(&subtree, &local));
            // 子树根在小文档中没有兄弟，序号取自外层
            chain[offset].1 = ordinal;

            let track_index = track_position(&chain);
            let (track_number, track_name, waiting) = match track_index {
                Some(index) if index >= offset => (
                    Some(chain[index].1),
                    Some(track_name(&subtree, local[index - offset])),
                    None,
                ),
                Some(index) => match &self.frames[index].name {
                    NameState::Known(_) => (Some(chain[index].1), Some(self.frames[index].name.resolve()), None),
                    _ => (Some(chain[index].1), None, Some(index)),
                },
                None => (None, None, None),
            };

            let device = StreamedDevice {
                tag: subtree.tag(id).to_string(),
                track_number,
                track_name,
                path: format_path(&chain, track_index),
                subtree: subtree.extract_subtree(id),
            };
            tracing::debug!("streamed match <{}> at {}", device.tag, device.path);
            self.pending.push_back((device, waiting));
        }
        Ok(())
    }
}

impl<'a> StreamLocator<Box<dyn BufRead + 'a>> {
    /// 从可能经过 gzip 压缩的源创建（按魔数判断）
    pub fn open<S: BufRead + 'a>(source: S, predicate: Predicate) -> Result<Self, AlsError> {
        let reader = open_payload_reader(source)?;
        Ok(StreamLocator::from_reader(reader, predicate))
    }

    /// 从文件创建；文件句柄随定位器一起释放
    pub fn from_path(path: &Path, predicate: Predicate) -> Result<Self, AlsError> {
        let file = File::open(path)?;
        tracing::info!("streaming {}", path.display());
        Self::open(BufReader::new(file), predicate)
    }
}

impl<R: BufRead> Iterator for StreamLocator<R> {
    type Item = Result<StreamedDevice, AlsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if matches!(self.pending.front(), Some((_, None))) {
                return self.pending.pop_front().map(|(device, _)| Ok(device));
            }
            if self.finished {
                return None;
            }
            match self.advance() {
                Ok(true) => {}
                Ok(false) => self.finished = true,
                Err(e) => {
                    self.finished = true;
                    self.pending.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ContainerCodec, GzipCodec};
    use crate::locator::{find, Strictness};

    const SET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Ableton>
  <LiveSet>
    <Tracks>
      <MidiTrack Id="1">
        <DeviceChain><Devices><MultiSampler Id="10"><Player/></MultiSampler></Devices></DeviceChain>
        <Name><EffectiveName Value="x"/><UserName>Bass</UserName></Name>
      </MidiTrack>
      <MidiTrack Id="2">
        <Name><UserName Value=""/></Name>
        <DeviceChain><Devices>
          <InstrumentGroupDevice><Branches><OriginalSimpler/></Branches></InstrumentGroupDevice>
          <InstrumentGroupDevice><Branches><Operator/></Branches></InstrumentGroupDevice>
        </Devices></DeviceChain>
      </MidiTrack>
    </Tracks>
    <MasterTrack><DeviceChain><Devices><Sampler/></Devices></DeviceChain></MasterTrack>
  </LiveSet>
</Ableton>"#;

    fn stream(xml: &str, predicate: Predicate) -> Vec<StreamedDevice> {
        StreamLocator::from_reader(xml.as_bytes(), predicate)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_stream_matches_in_memory_results() {
        let doc = Document::parse(SET).unwrap();
        for predicate in [
            Predicate::sampler_family(),
            Predicate::SamplerFamily(Strictness::Strict),
            Predicate::Tag("miditrack".into()),
            Predicate::TagContains("Track".into()),
        ] {
            let expected: Vec<_> = find(&doc, predicate.clone())
                .map(|m| (m.tag, m.track_number, m.track_name, m.path))
                .collect();
            let actual: Vec<_> = stream(SET, predicate.clone())
                .into_iter()
                .map(|d| (d.tag, d.track_number, d.track_name, d.path))
                .collect();
            assert_eq!(actual, expected, "{:?}", predicate);
        }
    }

    #[test]
    fn test_track_name_after_device() {
        let devices = stream(SET, Predicate::Tag("MultiSampler".into()));
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].track_number, Some(1));
        assert_eq!(devices[0].track_name.as_deref(), Some("Bass"));
        assert_eq!(devices[0].path, "Ableton/LiveSet/Tracks/MidiTrack[1]/.../MultiSampler");
        assert_eq!(devices[0].subtree.element_count(), 2);
    }

    #[test]
    fn test_nested_matches_keep_document_order() {
        let tags: Vec<String> = stream(SET, Predicate::sampler_family())
            .into_iter()
            .map(|d| d.tag)
            .collect();
        assert_eq!(tags, vec!["MultiSampler", "InstrumentGroupDevice", "OriginalSimpler", "Sampler"]);
    }

    #[test]
    fn test_open_handles_gzip_source() {
        let compressed = GzipCodec::default().encode(SET).unwrap().bytes;
        let devices: Vec<_> = StreamLocator::open(compressed.as_slice(), Predicate::sampler_family())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(devices.len(), 4);
    }

    #[test]
    fn test_malformed_stream_yields_error() {
        let mut locator = StreamLocator::from_reader("<a><Sampler></a>".as_bytes(), Predicate::sampler_family());
        assert!(matches!(locator.next(), Some(Err(AlsError::FormatError(_)))));
        assert!(locator.next().is_none());

        let mut unclosed = StreamLocator::from_reader("<a><b/>".as_bytes(), Predicate::sampler_family());
        assert!(matches!(unclosed.next(), Some(Err(AlsError::FormatError(_)))));
    }
}
