//! htblock CLI - encode, decode and inspect single HTJ2K codeblocks.
//!
//! Coefficients are exchanged as raw little-endian i32 values, row by row;
//! coded blocks are stored in `HTCB` files.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use htj2k_block_rs::{
    BlockCodec, BlockFile, CodeBlock, CodingParameters, SubbandOrientation, TransformKind,
    ht_cleanup_decode,
};
use log::{LevelFilter, info};
use std::fs;
use std::path::PathBuf;

/// Encode and decode HTJ2K (JPEG 2000 Part 15) codeblocks
#[derive(Parser)]
#[command(name = "htblock")]
#[command(version)]
#[command(about = "Cleanup-pass codeblock coder for High-Throughput JPEG 2000", long_about = None)]
#[command(after_help = "EXAMPLES:
    htblock encode -i coeffs.raw -o block.htcb -w 64 -H 64 -b 12
    htblock decode -i block.htcb -o coeffs.raw
    htblock -v info -i block.htcb --extended")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode raw i32 coefficients into an HTCB file
    #[command(visible_alias = "e")]
    Encode {
        /// Raw little-endian i32 coefficients, width x height
        #[arg(short, long)]
        input: PathBuf,

        /// Output HTCB file
        #[arg(short, long)]
        output: PathBuf,

        /// Codeblock width
        #[arg(short, long)]
        width: u16,

        /// Codeblock height
        #[arg(short = 'H', long)]
        height: u16,

        /// Magnitude bit-planes of the subband (M_b)
        #[arg(short, long, default_value = "16")]
        bit_depth: u8,

        /// Wavelet transform the coefficients come from
        #[arg(short, long, default_value = "reversible", value_enum)]
        transform: Transform,

        /// Quantization step size, irreversible transform only
        #[arg(short, long, default_value = "1.0")]
        step_size: f32,

        /// Subband orientation
        #[arg(long, default_value = "ll", value_enum)]
        orientation: Orientation,
    },

    /// Decode an HTCB file into raw i32 coefficients
    #[command(visible_alias = "d")]
    Decode {
        /// Input HTCB file
        #[arg(short, long)]
        input: PathBuf,

        /// Output raw little-endian i32 coefficients
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Display the header and segment layout of an HTCB file
    #[command(visible_alias = "i")]
    Info {
        /// Input HTCB file
        #[arg(short, long)]
        input: PathBuf,

        /// Decode the block and show context statistics
        #[arg(short, long)]
        extended: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Transform {
    /// 5-3 reversible integer transform
    Reversible,
    /// 9-7 irreversible transform with scalar quantization
    Irreversible,
}

#[derive(Clone, Copy, ValueEnum)]
enum Orientation {
    Ll,
    Hl,
    Lh,
    Hh,
}

impl From<Orientation> for SubbandOrientation {
    fn from(o: Orientation) -> Self {
        match o {
            Orientation::Ll => Self::LL,
            Orientation::Hl => Self::HL,
            Orientation::Lh => Self::LH,
            Orientation::Hh => Self::HH,
        }
    }
}

/// A simple stderr logger.
static LOGGER: StderrLogger = StderrLogger;
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let level = match record.level() {
                log::Level::Error => "Error",
                log::Level::Warn => "Warning",
                log::Level::Info => "Info",
                log::Level::Debug => "Debug",
                log::Level::Trace => "Trace",
            };
            eprintln!("{} (in {}): {}", level, record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Encode {
            input,
            output,
            width,
            height,
            bit_depth,
            transform,
            step_size,
            orientation,
        } => {
            let params = CodingParameters {
                orientation: orientation.into(),
                ..match transform {
                    Transform::Reversible => CodingParameters::reversible(bit_depth),
                    Transform::Irreversible => CodingParameters::irreversible(bit_depth, step_size),
                }
            };
            encode_block(&input, &output, width, height, params)
        }
        Commands::Decode { input, output } => decode_block(&input, &output),
        Commands::Info { input, extended } => show_info(&input, extended),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn encode_block(
    input: &PathBuf,
    output: &PathBuf,
    width: u16,
    height: u16,
    params: CodingParameters,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = fs::read(input)?;
    let count = width as usize * height as usize;
    if raw.len() != count * 4 {
        return Err(format!(
            "expected {} bytes of i32 coefficients for {}x{}, found {}",
            count * 4,
            width,
            height,
            raw.len()
        )
        .into());
    }
    let coefficients: Vec<i32> = raw
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let mut codec = BlockCodec::new();
    let encoded = codec.encode(
        &coefficients,
        width as usize,
        &params,
        width as u32,
        height as u32,
        None,
    )?;
    info!(
        "{}x{} codeblock: {} passes, {} bytes, num_zbp {}",
        width,
        height,
        encoded.num_passes_total,
        encoded.data.len(),
        encoded.num_zbp
    );
    let file = BlockFile::new(width, height, params, encoded);
    fs::write(output, file.to_bytes())?;
    println!(
        "✓ Encoded {}x{} codeblock to {:?} ({} bytes)",
        width,
        height,
        output,
        file.data.len()
    );
    Ok(())
}

fn decode_block(input: &PathBuf, output: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let file = BlockFile::from_bytes(&fs::read(input)?)?;
    let (width, height) = (file.width as u32, file.height as u32);
    let mut coefficients = vec![0i32; width as usize * height as usize];

    let mut codec = BlockCodec::new();
    codec.decode(
        &[file.data.as_slice()],
        file.num_passes,
        file.num_zbp,
        &file.params,
        width,
        height,
        &mut coefficients,
        width as usize,
    )?;

    let raw: Vec<u8> = coefficients.iter().flat_map(|c| c.to_le_bytes()).collect();
    fs::write(output, raw)?;
    println!("✓ Decoded {}x{} codeblock to {:?}", width, height, output);
    Ok(())
}

fn show_info(input: &PathBuf, extended: bool) -> Result<(), Box<dyn std::error::Error>> {
    let file = BlockFile::from_bytes(&fs::read(input)?)?;
    let params = file.params;

    println!("File: {:?}", input);
    println!("Codeblock: {}x{}", file.width, file.height);
    println!("Orientation: {:?}", params.orientation);
    println!("Transform: {:?}", params.transform);
    if params.transform == TransformKind::Irreversible97 {
        println!("Step size: {}", params.step_size);
    }
    println!("M_b: {}", params.m_b);
    println!("Zero bit-planes: {}", file.num_zbp);
    println!("Coding passes: {}", file.num_passes);
    println!("Lcup: {}", file.data.len());

    if file.num_passes == 0 || file.data.is_empty() {
        return Ok(());
    }
    let mut segment = file.data.clone();
    let lengths = htj2k_block_rs::jpeg2000::codeblock::split_cleanup_segment(&mut segment)?;
    println!("Pcup: {}", lengths.pcup);
    println!("Scup: {}", lengths.scup);

    if extended {
        let mut block = CodeBlock::new(file.width as u32, file.height as u32, params)?;
        block.enable_context_trace();
        block.num_passes = file.num_passes;
        block.num_zbp = file.num_zbp;
        block.pass_length[0] = file.data.len() as u32;
        block.set_compressed_data(&file.data, 0)?;
        let lengths = block.split_cleanup_segment()?;
        ht_cleanup_decode(
            &mut block,
            params.p_lsb(),
            lengths.lcup,
            lengths.pcup,
            lengths.scup,
        )?;

        let significant = block
            .samples()
            .rows()
            .flat_map(|row| row.iter())
            .filter(|&&word| word & 0x7FFF_FFFF != 0)
            .count();
        println!();
        println!("Significant samples: {}", significant);

        if let Some(trace) = block.context_trace() {
            let mut quads = [0usize; 8];
            for &c in &trace.significance {
                quads[c as usize] += 1;
            }
            println!("Quads: {}", trace.significance.len());
            for (context, count) in quads.iter().enumerate() {
                println!("  significance context {}: {}", context, count);
            }
            let mut signs = [0usize; 5];
            for &label in &trace.sign {
                signs[(label - 9) as usize] += 1;
            }
            for (i, count) in signs.iter().enumerate() {
                println!("  sign context {}: {}", i + 9, count);
            }
        }
    }
    Ok(())
}
