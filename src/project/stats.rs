use super::AlsProject;
use crate::locator::{is_track, Predicate, TRACK_TAGS};
use serde::Serialize;
use std::collections::BTreeMap;

/// 工程统计信息
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub name: String,
    pub compressed: bool,
    pub element_count: usize,
    /// 各类音轨的数量
    pub tracks: BTreeMap<String, usize>,
    pub device_count: usize,
    pub sampler_family_count: usize,
}

impl std::fmt::Display for ProjectStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Project statistics ===")?;
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Compressed: {}", if self.compressed { "yes" } else { "no" })?;
        writeln!(f, "Elements: {}", self.element_count)?;
        for (tag, count) in &self.tracks {
            writeln!(f, "{}: {}", tag, count)?;
        }
        writeln!(f, "Devices: {}", self.device_count)?;
        writeln!(f, "Sampler-family devices: {}", self.sampler_family_count)?;
        Ok(())
    }
}

impl AlsProject {
    /// 获取统计信息
    pub fn get_stats(&self) -> ProjectStats {
        let document = &self.document;

        let mut tracks: BTreeMap<String, usize> = TRACK_TAGS
            .iter()
            .map(|tag| (tag.to_string(), 0))
            .collect();
        for id in document.iter().filter(|&id| is_track(document, id)) {
            *tracks.entry(document.tag(id).to_string()).or_insert(0) += 1;
        }

        ProjectStats {
            name: self.get_name().to_string(),
            compressed: self.was_compressed,
            element_count: document.element_count(),
            tracks,
            device_count: self.count_devices(),
            sampler_family_count: self.find(Predicate::sampler_family()).count(),
        }
    }

    /// 所有音轨设备链中的设备总数
    fn count_devices(&self) -> usize {
        self.tracks().iter().map(|track| track.devices.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats() {
        let project = AlsProject::from_xml(
            "set.als",
            r#"<Ableton><LiveSet><Tracks>
                <MidiTrack><DeviceChain><Devices><MultiSampler/><Reverb/></Devices></DeviceChain></MidiTrack>
                <AudioTrack/>
                <MidiTrack/>
            </Tracks></LiveSet></Ableton>"#,
        )
        .unwrap();

        let stats = project.get_stats();
        assert_eq!(stats.tracks["MidiTrack"], 2);
        assert_eq!(stats.tracks["AudioTrack"], 1);
        assert_eq!(stats.tracks["ReturnTrack"], 0);
        assert_eq!(stats.device_count, 2);
        assert_eq!(stats.sampler_family_count, 1);

        let text = stats.to_string();
        assert!(text.contains("Name: set.als"));
        assert!(text.contains("MidiTrack: 2"));
    }
}
