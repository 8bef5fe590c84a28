mod common;

use als_cleaner::utils::clean_output_path;
use als_cleaner::{find, remove_matches, AlsProject, DeviceMatch, Document, Predicate, ProjectEditor, Strictness};
use als_cleaner::io::{AtomicAlsWriter, GzipCodec};
use common::{bass_and_drums, live_set, write_als, write_plain_als, TrackFixture};

#[test]
fn test_bass_and_drums_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_als(dir.path(), "Bass and Drums.als", &bass_and_drums());

    let project = AlsProject::load(&input).unwrap();
    let matches: Vec<DeviceMatch> = project.find(Predicate::sampler_family()).collect();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].track_number, Some(1));
    assert_eq!(matches[0].track_name.as_deref(), Some("Bass"));
    assert_eq!(matches[0].path, "Ableton/LiveSet/Tracks/MidiTrack[1]/.../MultiSampler");

    let tracks = project.tracks();
    assert_eq!(tracks[1].name, "Drums");
    assert!(tracks[1].to_string().contains("(No devices found)"));

    let mut editor = ProjectEditor::new(project);
    let manifest = editor.remove_where(Predicate::sampler_family()).unwrap();
    assert_eq!(manifest.detached_count(), 1);

    let output = clean_output_path(&input, None).unwrap();
    assert_eq!(output.file_name().unwrap(), "Bass and Drums-clean.als");
    editor.save(&GzipCodec::default(), &AtomicAlsWriter, &output).unwrap();

    let cleaned = AlsProject::load(&output).unwrap();
    assert!(cleaned.was_compressed);
    assert_eq!(cleaned.find(Predicate::sampler_family()).count(), 0);
    // 输入文件保持不变
    assert_eq!(AlsProject::load(&input).unwrap().find(Predicate::sampler_family()).count(), 1);
}

#[test]
fn test_plain_xml_payload_loads_without_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_plain_als(dir.path(), "plain.als", &bass_and_drums());

    let project = AlsProject::load(&input).unwrap();
    assert!(!project.was_compressed);
    assert_eq!(project.find(Predicate::sampler_family()).count(), 1);
}

#[test]
fn test_second_same_tag_track_reports_ordinal_two() {
    let xml = live_set(&[
        TrackFixture { tag: "AudioTrack", name: Some("Loop"), devices: &["Simpler"] },
        TrackFixture::midi("Lead", &[]),
        TrackFixture::midi("Keys", &["OriginalSimpler"]),
    ]);
    let doc = Document::parse(&xml).unwrap();

    let matches: Vec<DeviceMatch> = find(&doc, Predicate::sampler_family()).collect();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].track_number, Some(1));
    assert_eq!(matches[0].path, "Ableton/LiveSet/Tracks/AudioTrack[1]/.../Simpler");
    assert_eq!(matches[1].track_number, Some(2));
    assert_eq!(matches[1].track_name.as_deref(), Some("Keys"));
    assert_eq!(matches[1].path, "Ableton/LiveSet/Tracks/MidiTrack[2]/.../OriginalSimpler");
}

#[test]
fn test_removal_is_complete_and_local() {
    let xml = live_set(&[
        TrackFixture::midi("A", &["Reverb", "MultiSampler", "Delay"]),
        TrackFixture::midi("B", &["InstrumentGroupDevice", "Eq8"]),
        TrackFixture::midi("C", &["OriginalSimpler"]),
    ]);
    let original = Document::parse(&xml).unwrap();
    let mut doc = original.clone();

    let matches: Vec<DeviceMatch> = find(&doc, Predicate::sampler_family()).collect();
    // InstrumentGroupDevice 的内容里没有采样器标记
    assert_eq!(matches.iter().map(|m| m.tag.as_str()).collect::<Vec<_>>(), vec!["MultiSampler", "OriginalSimpler"]);

    let manifest = remove_matches(&mut doc, &matches).unwrap();
    assert_eq!(manifest.len(), matches.len());
    assert_eq!(find(&doc, Predicate::sampler_family()).count(), 0);

    // 每个清单路径都能在删除前的文档中解析到原元素
    for (entry, found) in manifest.iter().zip(&matches) {
        assert!(original.resolve_path(&entry.path).contains(&found.element));
        assert_eq!(entry.xml, original.element_to_xml(found.element).unwrap());
    }

    // 未命中且不是被删元素祖先的元素保持原样
    let removed: Vec<_> = matches.iter().map(|m| m.element).collect();
    for id in doc.iter() {
        let is_ancestor = removed
            .iter()
            .any(|&r| original.ancestors(r).any(|a| a == id));
        if is_ancestor {
            continue;
        }
        assert_eq!(doc.element(id), original.element(id));
    }

    let devices = project_devices(&doc);
    assert_eq!(devices[0], vec!["Reverb", "Delay"]);
    assert_eq!(devices[1], vec!["InstrumentGroupDevice", "Eq8"]);
    assert!(devices[2].is_empty());
}

#[test]
fn test_strict_mode_ignores_content_matches() {
    let xml = r#"<Ableton><LiveSet><Tracks><MidiTrack><DeviceChain><Devices>
        <InstrumentGroupDevice><Branches><Branch><Name Value="Simpler Kit"/></Branch></Branches></InstrumentGroupDevice>
    </Devices></DeviceChain></MidiTrack></Tracks></LiveSet></Ableton>"#;
    let doc = Document::parse(xml).unwrap();

    assert_eq!(find(&doc, Predicate::sampler_family()).count(), 1);
    assert_eq!(find(&doc, Predicate::SamplerFamily(Strictness::Strict)).count(), 0);
}

#[test]
fn test_nested_matches_are_recorded_once_removed() {
    let xml = r#"<Ableton><LiveSet><Tracks><MidiTrack><DeviceChain><Devices>
        <InstrumentGroupDevice><Branches><OriginalSimpler/><MultiSampler/></Branches></InstrumentGroupDevice>
    </Devices></DeviceChain></MidiTrack></Tracks></LiveSet></Ableton>"#;
    let mut doc = Document::parse(xml).unwrap();
    let matches: Vec<DeviceMatch> = find(&doc, Predicate::sampler_family()).collect();
    assert_eq!(matches.len(), 3);

    let manifest = remove_matches(&mut doc, &matches).unwrap();
    assert_eq!(manifest.len(), 3);
    assert_eq!(manifest.detached_count(), 1);
    assert!(manifest.entries()[1..].iter().all(|entry| entry.via_earlier_removal));
}

/// 每条音轨的设备标签
fn project_devices(doc: &Document) -> Vec<Vec<String>> {
    let project = AlsProject::from_xml("set.als", &doc.to_xml().unwrap()).unwrap();
    project.tracks().into_iter().map(|track| track.devices).collect()
}
