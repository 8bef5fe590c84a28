#![allow(dead_code)]

use als_cleaner::io::{AlsWriter, AtomicAlsWriter, ContainerCodec, GzipCodec};
use std::path::{Path, PathBuf};

/// 测试用音轨：(标签, 名称, 设备标签)
pub struct TrackFixture<'a> {
    pub tag: &'a str,
    pub name: Option<&'a str>,
    pub devices: &'a [&'a str],
}

impl<'a> TrackFixture<'a> {
    pub fn midi(name: &'a str, devices: &'a [&'a str]) -> Self {
        Self { tag: "MidiTrack", name: Some(name), devices }
    }
}

/// 生成一个最小的 Live Set XML
pub fn live_set(tracks: &[TrackFixture<'_>]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Ableton MajorVersion=\"5\" Creator=\"Ableton Live 11.3\">\n  <LiveSet>\n    <Tracks>\n",
    );
    for (index, track) in tracks.iter().enumerate() {
        xml.push_str(&format!("      <{} Id=\"{}\">\n", track.tag, index));
        if let Some(name) = track.name {
            xml.push_str(&format!(
                "        <Name><EffectiveName Value=\"{0}\"/><UserName Value=\"{0}\"/></Name>\n",
                name
            ));
        }
        xml.push_str("        <DeviceChain><DeviceChain><Devices>\n");
        for device in track.devices {
            xml.push_str(&format!(
                "          <{0} Id=\"{1}\"><LomId Value=\"0\"/><On><Manual Value=\"true\"/></On></{0}>\n",
                device, index
            ));
        }
        xml.push_str("        </Devices></DeviceChain></DeviceChain>\n");
        xml.push_str(&format!("      </{}>\n", track.tag));
    }
    xml.push_str("    </Tracks>\n    <MasterTrack><DeviceChain><DeviceChain><Devices/></DeviceChain></DeviceChain></MasterTrack>\n  </LiveSet>\n</Ableton>\n");
    xml
}

/// "Bass"（一个 MultiSampler）+ "Drums"（没有设备）
pub fn bass_and_drums() -> String {
    live_set(&[
        TrackFixture::midi("Bass", &["MultiSampler"]),
        TrackFixture::midi("Drums", &[]),
    ])
}

/// 以 gzip 写出 .als 文件
pub fn write_als(dir: &Path, file_name: &str, xml: &str) -> PathBuf {
    let path = dir.join(file_name);
    let raw = GzipCodec::default().encode(xml).unwrap();
    AtomicAlsWriter.write(&raw, &path).unwrap();
    path
}

/// 写出未压缩的 .als 文件
pub fn write_plain_als(dir: &Path, file_name: &str, xml: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, xml).unwrap();
    path
}
