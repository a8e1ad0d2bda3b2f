//! OpenWail command-line workbench for Marathon 'snd2' sound files
//!
//! # Commands
//!
//! - `openwail info <file>` - print the header and class table
//! - `openwail compare <base> <other> -o <out>` - keep only the differences
//! - `openwail shuttle <source> -o <dest> --classes 1,4,7` - build a patch
//! - `openwail export <file> --class N --sound I -o out.snd` - extract a sound
//! - `openwail import <file> <sound.snd> --class N -o <out>` - add a sound

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use openwail_common::{ClassNameCatalog, CompareMode, EditorConfig};
use openwail_sndfile::macsnd::{to_mac_sound, to_marathon_sound};
use openwail_sndfile::wire::CHANCE_BUCKETS;
use openwail_sndfile::SoundFile;
use openwail_shuttle::{InstallAction, ShuttleWork};

/// Workbench for Marathon 'snd2' sound files
#[derive(Parser)]
#[command(name = "openwail")]
#[command(about = "Workbench for Marathon 'snd2' sound files")]
#[command(version)]
struct Cli {
    /// Editor config file
    #[arg(long, global = true, default_value = "openwail.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header and class table of a sound file
    Info(InfoArgs),

    /// Reduce a copy of one file to what differs from another
    Compare(CompareArgs),

    /// Build a patch file carrying a chosen subset of classes
    Shuttle(ShuttleArgs),

    /// Extract one sound as a playable Mac 'snd ' resource
    Export(ExportArgs),

    /// Add a Mac 'snd ' resource to a class
    Import(ImportArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Sound file to inspect
    file: PathBuf,

    /// Class-names list, overriding the configured one
    #[arg(long)]
    names: Option<PathBuf>,
}

#[derive(Args)]
struct CompareArgs {
    /// File whose differing content survives
    base: PathBuf,

    /// File compared against
    other: PathBuf,

    /// Where to write the reduced file
    #[arg(short, long)]
    output: PathBuf,

    /// together or separately (defaults to the configured mode)
    #[arg(long)]
    mode: Option<CompareMode>,
}

#[derive(Args)]
struct ShuttleArgs {
    /// Source sound file
    source: PathBuf,

    /// Where to write the patch
    #[arg(short, long)]
    output: PathBuf,

    /// Class slots to install, comma separated
    #[arg(long, value_delimiter = ',')]
    classes: Vec<usize>,

    /// Class slots to install as empty, comma separated
    #[arg(long, value_delimiter = ',')]
    empty: Vec<usize>,

    /// Write a JSON manifest of the run here
    #[arg(long)]
    manifest: Option<PathBuf>,
}

#[derive(Args)]
struct ExportArgs {
    /// Sound file to read
    file: PathBuf,

    /// Class slot index
    #[arg(long)]
    class: usize,

    /// Sound index within the class
    #[arg(long)]
    sound: usize,

    /// Take the sound from the 16-bit set
    #[arg(long)]
    sixteen_bit: bool,

    /// Where to write the 'snd ' resource
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct ImportArgs {
    /// Sound file to start from (not modified; the result goes to --output)
    file: PathBuf,

    /// Mac 'snd ' resource to add
    sound: PathBuf,

    /// Class slot index
    #[arg(long)]
    class: usize,

    /// Add to the 16-bit set
    #[arg(long)]
    sixteen_bit: bool,

    /// Where to write the modified file
    #[arg(short, long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let config = EditorConfig::load(&cli.config)?;

    match cli.command {
        Commands::Info(args) => cmd_info(args, &config),
        Commands::Compare(args) => cmd_compare(args, &config),
        Commands::Shuttle(args) => cmd_shuttle(args),
        Commands::Export(args) => cmd_export(args),
        Commands::Import(args) => cmd_import(args),
    }
}

// ============================================================
// Commands
// ============================================================

fn cmd_info(args: InfoArgs, config: &EditorConfig) -> Result<()> {
    let doc = load_sound_file(&args.file)?;

    let names = match args.names.as_ref().or(config.class_names_file.as_ref()) {
        Some(path) => ClassNameCatalog::load(path)
            .with_context(|| format!("Failed to read class names from {}", path.display()))?,
        None => ClassNameCatalog::default(),
    };

    let used = doc.classes.iter().filter(|c| !c.is_unused()).count();
    println!("{}", args.file.display());
    println!(
        "  Layout: {}",
        if doc.demo_layout() {
            "demo (8-bit sounds only)"
        } else {
            "normal (8-bit and 16-bit sets)"
        }
    );
    println!("  Classes: {} used of {} slots", used, doc.classes.len());
    println!();
    println!(
        "{:>5}  {:<24} {:>5} {:>4} {:>7} {:>7} {:>12}  {:<14} {}",
        "slot", "name", "id", "vol", "flags", "chance", "pitch", "8-bit", "16-bit"
    );

    for (index, class) in doc.classes.iter().enumerate() {
        if class.is_unused() {
            println!("{:>5}  (unused)", index);
            continue;
        }
        let pitch = format!(
            "{:.2}-{:.2}",
            fixed_to_float(class.low_pitch),
            fixed_to_float(class.high_pitch)
        );
        let eight = format!(
            "{} ({} B)",
            class.sounds_8bit().len(),
            byte_total(class.sounds_8bit())
        );
        let sixteen = if class.remap_8bit() {
            "remaps 8-bit".to_string()
        } else {
            format!(
                "{} ({} B)",
                class.sounds_16bit().len(),
                byte_total(class.sounds_16bit())
            )
        };
        println!(
            "{:>5}  {:<24} {:>5} {:>4} {:>#7x} {:>7} {:>12}  {:<14} {}",
            index,
            names.name_for(index),
            class.class_id,
            class.volume,
            class.flags as u16,
            format_chance(class.chance),
            pitch,
            eight,
            sixteen
        );
    }
    Ok(())
}

fn cmd_compare(args: CompareArgs, config: &EditorConfig) -> Result<()> {
    let mut base = load_sound_file(&args.base)?;
    let other = load_sound_file(&args.other)?;
    let mode = args.mode.unwrap_or(config.compare_mode);

    base.compare_and_keep_only_diffs(&other, mode);
    save_sound_file(&base, &args.output)?;

    let kept = base.classes.iter().filter(|c| !c.is_unused()).count();
    println!(
        "Kept {} differing classes ({} mode): {}",
        kept,
        mode,
        args.output.display()
    );
    Ok(())
}

fn cmd_shuttle(args: ShuttleArgs) -> Result<()> {
    let source = BufReader::new(
        File::open(&args.source)
            .with_context(|| format!("Failed to open {}", args.source.display()))?,
    );
    let dest = BufWriter::new(
        File::create(&args.output)
            .with_context(|| format!("Failed to create {}", args.output.display()))?,
    );

    let mut work = ShuttleWork::new(source, dest)?;
    for &class in &args.classes {
        work.select(class)?;
    }
    for &class in &args.empty {
        work.select_empty(class)?;
    }

    let manifest = work.manifest();
    let total = work.class_count();
    work.run(|done| tracing::debug!("Class slots written: {}/{}", done, total))?;

    for entry in &manifest.entries {
        match entry.action {
            InstallAction::Skip => {}
            InstallAction::Install => println!(
                "  slot {:4}  id {:5}  {} bytes",
                entry.class_index,
                entry.class_id,
                entry.bytes_8bit + entry.bytes_16bit
            ),
            InstallAction::InstallEmpty => {
                println!("  slot {:4}  installed empty", entry.class_index)
            }
        }
    }
    println!("Created: {}", args.output.display());

    if let Some(path) = &args.manifest {
        let json = serde_json::to_string_pretty(&manifest)
            .context("Failed to serialize the shuttle manifest")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Manifest: {}", path.display());
    }
    Ok(())
}

fn cmd_export(args: ExportArgs) -> Result<()> {
    let doc = load_sound_file(&args.file)?;
    let class = doc.class(args.class)?;

    if args.sixteen_bit && class.remap_8bit() {
        bail!(
            "class {} remaps its 8-bit sounds to the 16-bit set; export those instead",
            args.class
        );
    }
    let (sounds, set_name) = if args.sixteen_bit {
        (class.sounds_16bit(), "16-bit")
    } else {
        (class.sounds_8bit(), "8-bit")
    };
    let sound = sounds.get(args.sound).with_context(|| {
        format!(
            "class {} has {} {} sounds, no index {}",
            args.class,
            sounds.len(),
            set_name,
            args.sound
        )
    })?;

    let mac = to_mac_sound(sound);
    std::fs::write(&args.output, &mac)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("Created: {} ({} bytes)", args.output.display(), mac.len());
    Ok(())
}

fn cmd_import(args: ImportArgs) -> Result<()> {
    let mut doc = load_sound_file(&args.file)?;
    if args.sixteen_bit && doc.demo_layout() {
        bail!(
            "{} is a demo-layout file and carries no 16-bit set",
            args.file.display()
        );
    }

    let mac = std::fs::read(&args.sound)
        .with_context(|| format!("Failed to read {}", args.sound.display()))?;
    let data = to_marathon_sound(&mac)
        .with_context(|| format!("{} is not a usable 'snd ' resource", args.sound.display()))?;
    let len = data.len();

    let class = doc.class_mut(args.class)?;
    if class.is_unused() {
        bail!("class slot {} is unused; pick an installed class", args.class);
    }
    if args.sixteen_bit {
        class.add_sound_16bit(data)?;
    } else {
        class.add_sound_8bit(data)?;
    }

    save_sound_file(&doc, &args.output)?;
    println!(
        "Imported {} sound bytes into class {}: {}",
        len,
        args.class,
        args.output.display()
    );
    Ok(())
}

// ============================================================
// Helpers
// ============================================================

fn load_sound_file(path: &Path) -> Result<SoundFile> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    SoundFile::load(&mut reader).with_context(|| format!("Failed to load {}", path.display()))
}

fn save_sound_file(doc: &SoundFile, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    doc.save(&mut writer)?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn byte_total(sounds: &[Vec<u8>]) -> usize {
    sounds.iter().map(|s| s.len()).sum()
}

fn fixed_to_float(value: i32) -> f64 {
    value as f64 / 65536.0
}

/// Render a chance value as the percentage it encodes, or the raw number
/// for values outside the legal buckets.
fn format_chance(chance: i16) -> String {
    match CHANCE_BUCKETS.iter().position(|&b| b == chance) {
        Some(index) => format!("{}%", (index + 1) * 10),
        None => format!("raw {}", chance),
    }
}
