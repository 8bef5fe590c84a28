use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use als_cleaner::io::{AlsWriter, AtomicAlsWriter, GzipCodec, RawAlsData};
use als_cleaner::utils::{clean_output_path, create_backup, extract_output_path};
use als_cleaner::{
    render, AlsDebugger, AlsError, AlsProject, DeviceMatch, Document, Predicate, ProjectEditor,
    StreamLocator, StreamedDevice, Strictness, DEFAULT_MAX_LENGTH, SUPPORTED_EXTENSIONS,
};

/// 退出码
const EXIT_SUCCESS: i32 = 0;
/// 参数缺失或无效
const EXIT_USAGE: i32 = 1;
const EXIT_FAILURE: i32 = 2;
const EXIT_FORMAT: i32 = 3;
const EXIT_STRUCTURE: i32 = 4;
const EXIT_IO: i32 = 5;

/// 标准输入的占位路径
const STDIN_PATH: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// 删除采样器族设备并写出 <stem>-clean.als
    Clean,
    /// 写出解码后的 XML
    Extract,
    /// clean 之后重新统计剩余的采样器族设备
    Summary,
    /// 列出每条音轨的设备
    Devices,
    /// 流式扫描采样器族设备（输入可为 "-"）
    Scan,
    /// 按标签查找元素
    Find,
}

#[derive(Parser)]
#[command(name = "als_cleaner")]
#[command(about = "Inspect Ableton Live Sets and remove sampler-family devices")]
#[command(version)]
struct Cli {
    /// 操作模式
    #[arg(value_enum, ignore_case = true)]
    mode: Mode,

    /// 输入 .als 文件
    input: PathBuf,

    /// 输出目录（默认为输入文件所在目录）
    destination: Option<PathBuf>,

    /// 展示每个块时的最大字符数（0 表示不截断）
    #[arg(long, default_value_t = DEFAULT_MAX_LENGTH)]
    max_length: usize,

    /// 只按标签名匹配采样器族设备
    #[arg(long)]
    strict: bool,

    /// 覆盖输入文件（先创建带时间戳的备份）
    #[arg(long)]
    in_place: bool,

    /// 把结果以 JSON 写入该文件
    #[arg(long)]
    report: Option<PathBuf>,

    /// extract 时额外写出结构大纲
    #[arg(long)]
    dump: bool,

    /// find 模式使用的标签
    #[arg(long, default_value = "MultiSampler")]
    tag: String,

    /// 静默模式(仅输出错误)
    #[arg(short, long)]
    quiet: bool,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn sampler_predicate(&self) -> Predicate {
        Predicate::SamplerFamily(if self.strict { Strictness::Strict } else { Strictness::Broad })
    }

    fn max_length(&self) -> usize {
        match self.max_length {
            0 => usize::MAX,
            n => n,
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help / --version 不是错误
            std::process::exit(if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS });
        }
    };

    init_logging(&cli);

    if let Err(message) = validate_input(&cli) {
        eprintln!("error: {}", message);
        eprintln!("Usage: als_cleaner <clean|extract|summary|devices|scan|find> <input.als> [destination_directory]");
        std::process::exit(EXIT_USAGE);
    }

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .init();
}

/// 验证输入文件
fn validate_input(cli: &Cli) -> Result<(), String> {
    if cli.input == Path::new(STDIN_PATH) {
        if cli.mode == Mode::Scan {
            return Ok(());
        }
        return Err("reading from stdin is only supported by the scan mode".to_string());
    }
    if !cli.input.is_file() {
        return Err(format!("input file does not exist: {}", cli.input.display()));
    }
    if let Some(dir) = &cli.destination {
        if cli.in_place {
            return Err(format!(
                "--in-place overwrites the input and cannot be combined with a destination directory ({})",
                dir.display()
            ));
        }
        if dir.exists() && !dir.is_dir() {
            return Err(format!("destination is not a directory: {}", dir.display()));
        }
    }

    let extension = cli
        .input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());
    if !SUPPORTED_EXTENSIONS.iter().any(|&ext| Some(ext) == extension.as_deref()) {
        tracing::warn!("{} does not have an .als extension", cli.input.display());
    }
    Ok(())
}

/// 按错误类型映射退出码
fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<AlsError>() {
        Some(AlsError::FormatError(_)) => EXIT_FORMAT,
        Some(AlsError::StructureError(_)) => EXIT_STRUCTURE,
        Some(AlsError::IoError(_)) => EXIT_IO,
        _ => EXIT_FAILURE,
    }
}

fn run(cli: &Cli) -> Result<()> {
    match cli.mode {
        Mode::Clean => handle_clean(cli).map(|_| ()),
        Mode::Extract => handle_extract(cli),
        Mode::Summary => handle_summary(cli),
        Mode::Devices => handle_devices(cli),
        Mode::Scan => handle_scan(cli),
        Mode::Find => handle_find(cli),
    }
}

/// 加载输入工程
fn load_project(cli: &Cli) -> Result<AlsProject> {
    AlsProject::load(&cli.input).with_context(|| format!("failed to load {}", cli.input.display()))
}

/// 删除采样器族设备，返回输出路径
fn handle_clean(cli: &Cli) -> Result<PathBuf> {
    let project = load_project(cli)?;

    let output_path = if cli.in_place {
        let backup = create_backup(&cli.input).context("failed to back up the input file")?;
        if !cli.quiet {
            println!("Backup written to: {}", backup.display());
        }
        cli.input.clone()
    } else {
        clean_output_path(&cli.input, cli.destination.as_deref())?
    };
    if output_path == cli.input && !cli.in_place {
        bail!("refusing to overwrite {} without --in-place", cli.input.display());
    }

    let mut editor = ProjectEditor::new(project);
    let matches: Vec<DeviceMatch> = editor.project().find(cli.sampler_predicate()).collect();
    let manifest = editor
        .remove_matches(&matches)
        .context("failed to remove sampler-family devices")?;

    if !cli.quiet {
        println!("Removed {} sampler-family blocks:", manifest.detached_count());
        for (index, entry) in manifest.iter().enumerate() {
            println!("Block {}: {}", index + 1, entry);
            if !entry.via_earlier_removal {
                println!("{}\n", render(&editor.project().document, entry.element, cli.max_length())?);
            }
        }
    }

    editor
        .save(&GzipCodec::default(), &AtomicAlsWriter, &output_path)
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    if let Some(report) = &cli.report {
        write_report(report, editor.manifest())?;
    }
    if !cli.quiet {
        println!("Cleaned file saved to: {}", output_path.display());
    }
    Ok(output_path)
}

/// 写出解码后的 XML
fn handle_extract(cli: &Cli) -> Result<()> {
    let payload = AlsProject::read_payload(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let output_path = extract_output_path(&cli.input, cli.destination.as_deref())?;

    let data = RawAlsData { bytes: payload.xml.as_bytes().to_vec() };
    AtomicAlsWriter
        .write(&data, &output_path)
        .with_context(|| format!("failed to write {}", output_path.display()))?;
    if !cli.quiet {
        println!(
            "Extracted XML from '{}' to '{}'",
            cli.input.display(),
            output_path.display()
        );
    }

    // 提取本身已经完成；负载不是合法 XML 时只跳过统计与结构输出
    let document = match Document::parse(&payload.xml) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!("extracted payload is not well-formed XML, skipping statistics: {}", e);
            return Ok(());
        }
    };
    let project = AlsProject {
        path: cli.input.clone(),
        document,
        was_compressed: payload.was_compressed,
    };

    if cli.dump {
        let dump_path = output_path.with_extension("structure.txt");
        AlsDebugger::dump_to_file(&project, &dump_path)?;
        if !cli.quiet {
            println!("Structure outline written to: {}", dump_path.display());
        }
    }

    let stats = project.get_stats();
    if !cli.quiet {
        println!("\n{}", stats);
    }
    if let Some(report) = &cli.report {
        write_report(report, &stats)?;
    }
    Ok(())
}

/// clean 之后重新检查输出文件
fn handle_summary(cli: &Cli) -> Result<()> {
    let output_path = handle_clean(cli)?;

    let cleaned = AlsProject::load(&output_path)
        .with_context(|| format!("failed to reload {}", output_path.display()))?;
    let remaining: Vec<DeviceMatch> = cleaned.find(cli.sampler_predicate()).collect();

    println!("Found {} sampler-family devices in the cleaned file:", remaining.len());
    for found in &remaining {
        println!("{}", describe(found.track_number, found.track_name.as_deref(), &found.path));
    }
    Ok(())
}

/// 列出每条音轨的设备
fn handle_devices(cli: &Cli) -> Result<()> {
    let project = load_project(cli)?;
    let tracks = project.tracks();

    for track in &tracks {
        print!("{}", track);
    }
    if !cli.quiet {
        println!("\n{}", project.get_stats());
    }
    if let Some(report) = &cli.report {
        write_report(report, &tracks)?;
    }
    Ok(())
}

/// 流式扫描采样器族设备
fn handle_scan(cli: &Cli) -> Result<()> {
    let predicate = cli.sampler_predicate();
    let devices: Vec<StreamedDevice> = if cli.input == Path::new(STDIN_PATH) {
        let stdin = std::io::stdin();
        StreamLocator::open(stdin.lock(), predicate)?.collect::<Result<_, AlsError>>()?
    } else {
        StreamLocator::from_path(&cli.input, predicate)?.collect::<Result<_, AlsError>>()?
    };

    println!("Found {} Simpler/Sampler-related device blocks:", devices.len());
    if !cli.quiet {
        for device in &devices {
            println!("{}", describe(device.track_number, device.track_name.as_deref(), &device.path));
            println!("{}\n", render(&device.subtree, device.subtree.root(), cli.max_length())?);
        }
    }
    if let Some(report) = &cli.report {
        write_report(report, &devices)?;
    }
    Ok(())
}

/// 按标签查找
fn handle_find(cli: &Cli) -> Result<()> {
    let project = load_project(cli)?;
    let matches: Vec<DeviceMatch> = project.find(Predicate::Tag(cli.tag.clone())).collect();

    println!("Found {} {} devices:", matches.len(), cli.tag);
    for found in &matches {
        println!("{}", describe(found.track_number, found.track_name.as_deref(), &found.path));
        if !cli.quiet {
            println!("{}\n", render(&project.document, found.element, cli.max_length())?);
        }
    }
    if let Some(report) = &cli.report {
        write_report(report, &matches)?;
    }
    Ok(())
}

/// 命中的一行描述
fn describe(track_number: Option<usize>, track_name: Option<&str>, path: &str) -> String {
    match (track_number, track_name) {
        (Some(number), Some(name)) => format!("Track {} ('{}') at {}", number, name, path),
        _ => format!("(no track) at {}", path),
    }
}

/// 写出 JSON 报告
fn write_report<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write report {}", path.display()))?;
    tracing::info!("report written to {}", path.display());
    Ok(())
}
