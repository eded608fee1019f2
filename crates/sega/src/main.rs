use clap::{Parser, Subcommand, ValueEnum};
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    io::{self, Cursor, Write},
    path::{Path, PathBuf},
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use sega_afs::{AfsArchive, AfsVersion, AfsWriter, AfsWriterOptions};
use sega_formats::Format;
use sega_tex::bitmap::Bitmap;
use sega_tex::gvr::{GvrDataFormat, GvrPixelFormat, GvrTexture, GvrWriter, GvrWriterOptions};
use sega_tex::pvr::{PvrDataFormat, PvrPixelFormat, PvrTexture, PvrWriter, PvrWriterOptions};
use sega_tex::svr::{SvrDataFormat, SvrPixelFormat, SvrTexture, SvrWriter, SvrWriterOptions};

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report which format a file holds
    Identify {
        /// An input file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Handle PRS compressed streams
    Prs {
        #[command(subcommand)]
        command: PrsCommands,
    },
    /// Handle AFS archives
    Afs {
        #[command(subcommand)]
        command: AfsCommands,
    },
    /// Handle PVR/GVR/SVR textures
    Tex {
        #[command(subcommand)]
        command: TexCommands,
    },
}

#[derive(Subcommand)]
enum PrsCommands {
    /// Compress a file into a PRS stream
    Compress {
        /// An input file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// The target PRS file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Allow overwriting the target
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Decompress a PRS stream
    Decompress {
        /// An input PRS file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// The target file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Allow overwriting the target
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
}

#[derive(Subcommand)]
enum AfsCommands {
    /// List the entries of an AFS archive
    List {
        /// An input AFS file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Extract an AFS archive into a directory
    Extract {
        /// An input AFS file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// A target directory
        #[arg(short, long, value_name = "DIR")]
        directory: PathBuf,

        /// Allow overwriting the target
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Pack a directory into an AFS archive
    Create {
        /// An input directory
        #[arg(short, long, value_name = "DIR")]
        directory: PathBuf,

        /// A target AFS file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// Alignment quantum for entry data
        #[arg(long, default_value_t = 2048)]
        block_size: u32,

        /// Store the metadata pointer after the entry table (V2 layout)
        #[arg(long, default_value_t = false)]
        v2: bool,

        /// Write zeroed timestamps instead of file modification times
        #[arg(long, default_value_t = false)]
        no_timestamps: bool,

        /// Allow overwriting the target
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TexFamily {
    Pvr,
    Gvr,
    Svr,
}

#[derive(Subcommand)]
enum TexCommands {
    /// Print a texture's header properties
    Info {
        /// An input texture file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Decode a texture to a PNG image
    Decode {
        /// An input texture file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// The target PNG file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// An external palette file; defaults to the texture's companion
        #[arg(short, long, value_name = "FILE")]
        palette: Option<PathBuf>,
    },
    /// Encode a PNG image into a texture
    Encode {
        /// An input PNG file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// The target texture file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Texture family to emit
        #[arg(long, value_enum)]
        family: TexFamily,

        /// Pixel format name, e.g. rgb565, rgb5a3, argb1555, argb4444, argb8
        /// (optional for truecolor GVR formats)
        #[arg(long)]
        pixel_format: Option<String>,

        /// Data format name, e.g. square, rectangle, index4, index8
        #[arg(long)]
        data_format: String,

        /// Emit a global-index chunk with this value
        #[arg(long)]
        global_index: Option<u32>,

        /// Keep an indexed GVR palette in a companion file
        #[arg(long, default_value_t = false)]
        external_palette: bool,
    },
}

fn create_output(path: &Path, overwrite: bool) -> Result<File> {
    if overwrite {
        File::create(path)
    } else {
        File::create_new(path)
    }
    .into_diagnostic()
    .context(format!("creating {}", path.display()))
}

fn main_identify(file: &Path) -> Result<()> {
    let mut input = File::open(file)
        .into_diagnostic()
        .context(format!("path: {}", file.display()))?;

    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match sega_formats::identify(&mut input, &filename).into_diagnostic()? {
        Some(descriptor) => println!("{}: {}", file.display(), descriptor.name),
        None => println!("{}: unrecognized", file.display()),
    }
    Ok(())
}

fn main_prs_compress(file: &Path, output: &Path, overwrite: bool) -> Result<()> {
    let mut input = File::open(file)
        .into_diagnostic()
        .context(format!("path: {}", file.display()))?;
    let mut out = create_output(output, overwrite)?;

    let consumed = sega_prs::compress(&mut input, &mut out).into_diagnostic()?;
    info!("compressed {} bytes into {}", consumed, output.display());
    Ok(())
}

fn main_prs_decompress(file: &Path, output: &Path, overwrite: bool) -> Result<()> {
    let mut input = File::open(file)
        .into_diagnostic()
        .context(format!("path: {}", file.display()))?;

    let decoded = sega_prs::decompress(&mut input).into_diagnostic()?;
    let mut out = create_output(output, overwrite)?;
    out.write_all(&decoded).into_diagnostic()?;

    info!("decompressed {} bytes into {}", decoded.len(), output.display());
    Ok(())
}

fn main_afs_list(file: &Path) -> Result<()> {
    let input = File::open(file)
        .into_diagnostic()
        .context(format!("path: {}", file.display()))?;
    let mut afs = AfsArchive::new(input).into_diagnostic()?;

    for index in 0..afs.len() {
        let entry = afs.by_index(index).into_diagnostic()?;
        match entry.timestamp() {
            Some(stamp) => println!("{:10}  {}  {}", entry.size(), stamp, entry.name()),
            None => println!("{:10}  {:19}  {}", entry.size(), "-", entry.name()),
        }
    }
    Ok(())
}

fn main_afs_extract(file: &Path, output: PathBuf, overwrite: bool) -> Result<()> {
    let input = File::open(file)
        .into_diagnostic()
        .context(format!("path: {}", file.display()))?;
    let mut afs = AfsArchive::new(input).into_diagnostic()?;

    for index in 0..afs.len() {
        let mut entry = afs.by_index(index).into_diagnostic()?;

        let name = if entry.name().is_empty() {
            format!("entry_{index:04}.bin")
        } else {
            entry.name().to_owned()
        };

        let target = output.join(&name);
        info!("writing {}", target.display());

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).into_diagnostic()?;
        }
        let mut out = create_output(&target, overwrite)?;
        io::copy(&mut entry, &mut out).into_diagnostic()?;
    }
    Ok(())
}

fn main_afs_create(
    directory: &Path,
    target: &Path,
    block_size: u32,
    v2: bool,
    no_timestamps: bool,
    overwrite: bool,
) -> Result<()> {
    info!("creating {}", target.display());

    let files = walkdir::WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .collect::<Vec<_>>();

    if files.is_empty() {
        return Err(miette!("directory is empty"));
    }

    let out = create_output(target, overwrite)?;
    let mut afs = AfsWriter::new(
        out,
        AfsWriterOptions::builder()
            .block_size(block_size)
            .version(if v2 { AfsVersion::V2 } else { AfsVersion::V1 })
            .has_timestamps(!no_timestamps)
            .build(),
    )
    .into_diagnostic()?;

    afs.on_entry_written(|_, name| info!("added {name}"));

    for file in files {
        let name = file
            .file_name()
            .to_str()
            .ok_or(miette!("unable to convert {:?} to a string", file.file_name()))?;

        afs.add_path(name, file.path())
            .into_diagnostic()
            .context(format!("adding {}", file.path().display()))?;
    }

    afs.finish().into_diagnostic().context("finalizing afs file")?;
    Ok(())
}

/// The palette companion expected next to an externally-paletted texture.
fn companion_path(file: &Path, format: Format) -> PathBuf {
    let extension = match format {
        Format::Gvr => "gvp",
        Format::Svr => "svp",
        _ => "pvp",
    };
    file.with_extension(extension)
}

fn open_palette(file: &Path, palette: Option<&PathBuf>, format: Format) -> Result<Cursor<Vec<u8>>> {
    let path = palette
        .cloned()
        .unwrap_or_else(|| companion_path(file, format));

    let bytes = std::fs::read(&path)
        .into_diagnostic()
        .context(format!("loading palette {}", path.display()))?;
    Ok(Cursor::new(bytes))
}

fn identify_texture(file: &Path) -> Result<(File, Format)> {
    let mut input = File::open(file)
        .into_diagnostic()
        .context(format!("path: {}", file.display()))?;

    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let format = sega_formats::identify(&mut input, &filename)
        .into_diagnostic()?
        .map(|descriptor| descriptor.format)
        .ok_or(miette!("{} is not a recognized texture", file.display()))?;

    match format {
        Format::Pvr | Format::Gvr | Format::Svr => Ok((input, format)),
        _ => Err(miette!("{} is not a recognized texture", file.display())),
    }
}

fn main_tex_info(file: &Path) -> Result<()> {
    let (input, format) = identify_texture(file)?;

    match format {
        Format::Pvr => {
            let texture = PvrTexture::new(input).into_diagnostic()?;
            println!("PVR texture, {}x{}", texture.width(), texture.height());
            println!("pixel format: {:?}", texture.pixel_format());
            println!("data format:  {:?}", texture.data_format());
            if let Some(index) = texture.global_index() {
                println!("global index: {index}");
            }
            if texture.needs_external_palette() {
                println!("palette:      external");
            }
        }
        Format::Gvr => {
            let texture = GvrTexture::new(input).into_diagnostic()?;
            println!("GVR texture, {}x{}", texture.width(), texture.height());
            if let Some(pixel) = texture.pixel_format() {
                println!("pixel format: {pixel:?}");
            }
            println!("data format:  {:?}", texture.data_format());
            if let Some(index) = texture.global_index() {
                println!("global index: {index}");
            }
            if texture.needs_external_palette() {
                println!("palette:      external");
            }
        }
        _ => {
            let texture = SvrTexture::new(input).into_diagnostic()?;
            println!("SVR texture, {}x{}", texture.width(), texture.height());
            println!("pixel format: {:?}", texture.pixel_format());
            println!("data format:  {:?}", texture.data_format());
            if let Some(index) = texture.global_index() {
                println!("global index: {index}");
            }
            if texture.needs_external_palette() {
                println!("palette:      external");
            }
        }
    }
    Ok(())
}

fn main_tex_decode(file: &Path, output: &Path, palette: Option<&PathBuf>) -> Result<()> {
    let (input, format) = identify_texture(file)?;

    // Externally-paletted textures fail their first decode; recover by
    // feeding the companion file and retrying.
    let bitmap = match format {
        Format::Pvr => {
            let mut texture = PvrTexture::new(input).into_diagnostic()?;
            if texture.needs_external_palette() {
                let mut source = open_palette(file, palette, format)?;
                texture.set_palette(&mut source).into_diagnostic()?;
            }
            texture.decode().into_diagnostic()?
        }
        Format::Gvr => {
            let mut texture = GvrTexture::new(input).into_diagnostic()?;
            if texture.needs_external_palette() {
                let mut source = open_palette(file, palette, format)?;
                texture.set_palette(&mut source).into_diagnostic()?;
            }
            texture.decode().into_diagnostic()?
        }
        _ => {
            let mut texture = SvrTexture::new(input).into_diagnostic()?;
            if texture.needs_external_palette() {
                let mut source = open_palette(file, palette, format)?;
                texture.set_palette(&mut source).into_diagnostic()?;
            }
            texture.decode().into_diagnostic()?
        }
    };

    let image = image::RgbaImage::from_vec(bitmap.width(), bitmap.height(), bitmap.into_data())
        .ok_or(miette!("decoded bitmap has inconsistent dimensions"))?;
    image.save(output).into_diagnostic()?;

    info!("decoded {} into {}", file.display(), output.display());
    Ok(())
}

fn load_png(file: &Path) -> Result<Bitmap> {
    let image = image::open(file)
        .into_diagnostic()
        .context(format!("loading {}", file.display()))?
        .to_rgba8();

    Bitmap::from_rgba(image.width(), image.height(), image.into_raw()).into_diagnostic()
}

fn save_companion<F>(path: PathBuf, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> sega_tex::error::Result<()>,
{
    let mut out = File::create(&path)
        .into_diagnostic()
        .context(format!("creating {}", path.display()))?;
    write(&mut out).into_diagnostic()?;
    info!("wrote palette companion {}", path.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn main_tex_encode(
    file: &Path,
    output: &Path,
    family: TexFamily,
    pixel_format: Option<&str>,
    data_format: &str,
    global_index: Option<u32>,
    external_palette: bool,
) -> Result<()> {
    let bitmap = load_png(file)?;
    let out = create_output(output, true)?;
    let required = || miette!("--pixel-format is required for this family");

    match family {
        TexFamily::Pvr => {
            let pixel = match pixel_format.ok_or_else(required)?.to_lowercase().as_str() {
                "argb1555" => PvrPixelFormat::Argb1555,
                "rgb565" => PvrPixelFormat::Rgb565,
                "argb4444" => PvrPixelFormat::Argb4444,
                other => return Err(miette!("unknown PVR pixel format {other:?}")),
            };
            let data = match data_format.to_lowercase().as_str() {
                "square" => PvrDataFormat::Square,
                "index4" => PvrDataFormat::Index4,
                "index8" => PvrDataFormat::Index8,
                "rectangle" => PvrDataFormat::Rectangle,
                other => return Err(miette!("unknown PVR data format {other:?}")),
            };

            let mut writer = PvrWriter::new(
                out,
                PvrWriterOptions::builder()
                    .pixel_format(pixel)
                    .data_format(data)
                    .maybe_global_index(global_index)
                    .build(),
            );
            if let Some(companion) = writer.write(&bitmap).into_diagnostic()? {
                save_companion(output.with_extension("pvp"), |f| companion.write(f))?;
            }
            writer.finish().into_diagnostic()?;
        }
        TexFamily::Gvr => {
            let pixel = match pixel_format.map(str::to_lowercase).as_deref() {
                None => None,
                Some("intensitya8") | Some("ia8") => Some(GvrPixelFormat::IntensityA8),
                Some("rgb565") => Some(GvrPixelFormat::Rgb565),
                Some("rgb5a3") => Some(GvrPixelFormat::Rgb5a3),
                Some(other) => return Err(miette!("unknown GVR pixel format {other:?}")),
            };
            let data = match data_format.to_lowercase().as_str() {
                "rgb565" => GvrDataFormat::Rgb565,
                "rgb5a3" => GvrDataFormat::Rgb5a3,
                "argb8888" => GvrDataFormat::Argb8888,
                "index4" => GvrDataFormat::Index4,
                "index8" => GvrDataFormat::Index8,
                other => return Err(miette!("unknown GVR data format {other:?}")),
            };

            let mut writer = GvrWriter::new(
                out,
                GvrWriterOptions::builder()
                    .data_format(data)
                    .maybe_pixel_format(pixel)
                    .maybe_global_index(global_index)
                    .external_palette(external_palette)
                    .build(),
            );
            if let Some(companion) = writer.write(&bitmap).into_diagnostic()? {
                save_companion(output.with_extension("gvp"), |f| companion.write(f))?;
            }
            writer.finish().into_diagnostic()?;
        }
        TexFamily::Svr => {
            let pixel = match pixel_format.ok_or_else(required)?.to_lowercase().as_str() {
                "rgb5a3" => SvrPixelFormat::Rgb5a3,
                "argb8" | "argb8888" => SvrPixelFormat::Argb8,
                other => return Err(miette!("unknown SVR pixel format {other:?}")),
            };
            let data = match data_format.to_lowercase().as_str() {
                "rectangle" => SvrDataFormat::Rectangle,
                "index4" => SvrDataFormat::Index4Rgb5a3Rect,
                "index8" => SvrDataFormat::Index8Rgb5a3Rect,
                "index4extclut" => SvrDataFormat::Index4ExtClut,
                "index8extclut" => SvrDataFormat::Index8ExtClut,
                other => return Err(miette!("unknown SVR data format {other:?}")),
            };

            let mut writer = SvrWriter::new(
                out,
                SvrWriterOptions::builder()
                    .pixel_format(pixel)
                    .data_format(data)
                    .maybe_global_index(global_index)
                    .build(),
            );
            if let Some(companion) = writer.write(&bitmap).into_diagnostic()? {
                save_companion(output.with_extension("svp"), |f| companion.write(f))?;
            }
            writer.finish().into_diagnostic()?;
        }
    }

    info!("encoded {} into {}", file.display(), output.display());
    Ok(())
}

fn main_prs(command: &PrsCommands) -> Result<()> {
    match command {
        PrsCommands::Compress {
            file,
            output,
            overwrite,
        } => main_prs_compress(file, output, *overwrite),
        PrsCommands::Decompress {
            file,
            output,
            overwrite,
        } => main_prs_decompress(file, output, *overwrite),
    }
}

fn main_afs(command: &AfsCommands) -> Result<()> {
    match command {
        AfsCommands::List { file } => main_afs_list(file),
        AfsCommands::Extract {
            file,
            directory,
            overwrite,
        } => main_afs_extract(file, directory.to_path_buf(), *overwrite),
        AfsCommands::Create {
            directory,
            file,
            block_size,
            v2,
            no_timestamps,
            overwrite,
        } => main_afs_create(directory, file, *block_size, *v2, *no_timestamps, *overwrite),
    }
}

fn main_tex(command: &TexCommands) -> Result<()> {
    match command {
        TexCommands::Info { file } => main_tex_info(file),
        TexCommands::Decode {
            file,
            output,
            palette,
        } => main_tex_decode(file, output, palette.as_ref()),
        TexCommands::Encode {
            file,
            output,
            family,
            pixel_format,
            data_format,
            global_index,
            external_palette,
        } => main_tex_encode(
            file,
            output,
            *family,
            pixel_format.as_deref(),
            data_format,
            *global_index,
            *external_palette,
        ),
    }
}

fn main() -> miette::Result<()> {
    better_panic::install();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    match &cli.command {
        Commands::Identify { file } => main_identify(file)?,
        Commands::Prs { command } => main_prs(command)?,
        Commands::Afs { command } => main_afs(command)?,
        Commands::Tex { command } => main_tex(command)?,
    }

    Ok(())
}
