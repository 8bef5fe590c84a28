use super::AlsProject;
use crate::document::{Document, ElementId};
use crate::locator::{is_track, track_name};
use serde::Serialize;

/// 设备链元素
pub const DEVICE_CHAIN_TAG: &str = "DeviceChain";
/// 设备列表元素
pub const DEVICES_TAG: &str = "Devices";

/// 单条音轨的设备概览
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackSummary {
    /// 音轨标签（MidiTrack 等）
    pub tag: String,
    /// 在同标签音轨中的序号
    pub number: usize,
    pub name: String,
    /// 设备标签，按文档顺序
    pub devices: Vec<String>,
}

impl std::fmt::Display for TrackSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Track {} ('{}') [{}]:", self.number, self.name, self.tag)?;
        if self.devices.is_empty() {
            writeln!(f, "  (No devices found)")?;
        }
        for device in &self.devices {
            writeln!(f, "  - {}", device)?;
        }
        Ok(())
    }
}

impl AlsProject {
    /// 按文档顺序列出所有音轨及其设备
    pub fn tracks(&self) -> Vec<TrackSummary> {
        let document = &self.document;
        document
            .iter()
            .filter(|&id| is_track(document, id))
            .map(|track| TrackSummary {
                tag: document.tag(track).to_string(),
                number: document.same_tag_position(track),
                name: track_name(document, track),
                devices: device_tags(document, track),
            })
            .collect()
    }
}

/// 音轨内所有设备链中 `Devices` 的直接子元素
fn device_tags(document: &Document, track: ElementId) -> Vec<String> {
    document
        .descendants(track)
        .filter(|&id| document.tag(id) == DEVICES_TAG && inside_device_chain(document, id, track))
        .flat_map(|devices| document.children(devices).iter().copied())
        .map(|device| document.tag(device).to_string())
        .collect()
}

/// `id` 与音轨之间是否有 `DeviceChain`
fn inside_device_chain(document: &Document, id: ElementId, track: ElementId) -> bool {
    document
        .ancestors(id)
        .take_while(|&ancestor| ancestor != track)
        .any(|ancestor| document.tag(ancestor) == DEVICE_CHAIN_TAG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_and_devices() {
        let project = AlsProject::from_xml(
            "set.als",
            r#"<Ableton><LiveSet><Tracks>
                <MidiTrack>
                    <Name><UserName Value="Bass"/></Name>
                    <DeviceChain><DeviceChain><Devices><MultiSampler/><Compressor2/></Devices></DeviceChain></DeviceChain>
                </MidiTrack>
                <MidiTrack><Name><UserName Value="Drums"/></Name><DeviceChain><Devices/></DeviceChain></MidiTrack>
                <AudioTrack><Devices><NotInAChain/></Devices></AudioTrack>
            </Tracks></LiveSet></Ableton>"#,
        )
        .unwrap();

        let tracks = project.tracks();
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[0].devices, vec!["MultiSampler", "Compressor2"]);
        assert_eq!(tracks[1].name, "Drums");
        assert!(tracks[1].devices.is_empty());
        assert_eq!(tracks[2].number, 1);
        assert!(tracks[2].devices.is_empty());

        assert_eq!(
            tracks[0].to_string(),
            "Track 1 ('Bass') [MidiTrack]:\n  - MultiSampler\n  - Compressor2\n"
        );
        assert_eq!(tracks[1].to_string(), "Track 2 ('Drums') [MidiTrack]:\n  (No devices found)\n");
        assert_eq!(tracks[2].to_string(), "Track 1 ('(no name)') [AudioTrack]:\n  (No devices found)\n");
    }
}
