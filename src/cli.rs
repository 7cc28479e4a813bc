// Command-line front end for rolldelta.
//
// Subcommands:
//   encode   target -> delta
//   decode   delta -> target
//   inspect  print a delta's header and op listing
//   config   print build features and defaults
//
// Inputs default to stdin and outputs to stdout when no path is given.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use log::info;

use crate::codec::{self, Codec};
use crate::delta::encoder::DeltaEncoder;
use crate::delta::format::{self, DecodeOptions, FormatFlags, FormatOptions};
use crate::delta::ops::OpStats;
use crate::hash::config::{self, IndexConfig};

const DEFAULT_LEVEL: u32 = 6;
const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Rolling-hash block-matching delta encoder.
#[derive(Parser, Debug)]
#[command(
    name = "rolldelta",
    version,
    about = "Rolling-hash block-matching delta encoder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Encode a file against itself into a delta.
    Encode(EncodeArgs),
    /// Rebuild the original file from a delta.
    Decode(DecodeArgs),
    /// Print a delta's header and ops.
    Inspect(InspectArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CodecArg {
    None,
    Zlib,
    Lzma,
}

#[derive(Args, Debug)]
struct EncodeTuningArgs {
    /// Compression level (0-9); selects the matcher profile.
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(0..=9), default_value_t = DEFAULT_LEVEL)]
    level: u32,

    /// Block (window) size in bytes; at least 3.
    #[arg(long = "block-size", short = 'b', value_parser = clap::value_parser!(u32).range(3..))]
    block_size: Option<u32>,

    /// Chain entries compared per bucket scan.
    #[arg(long = "max-probes")]
    max_probes: Option<usize>,

    /// Verified candidates extended per match query.
    #[arg(long = "max-candidates")]
    max_candidates: Option<usize>,

    /// Literal-section compressor.
    #[arg(long, value_enum, default_value_t = CodecArg::None)]
    codec: CodecArg,

    /// Do not store an Adler-32 of the target.
    #[arg(long = "no-checksum")]
    no_checksum: bool,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    #[command(flatten)]
    tuning: EncodeTuningArgs,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Input file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Output delta file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Skip Adler-32 verification.
    #[arg(long = "no-checksum")]
    no_checksum: bool,

    /// Refuse deltas that declare a larger target (bytes).
    #[arg(long = "max-size", default_value_t = format::DEFAULT_MAX_TARGET_LEN)]
    max_size: usize,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Input delta file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Print the header only.
    #[arg(long = "header-only")]
    header_only: bool,

    /// Delta file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Encode,
    Decode,
    Inspect,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    level: u32,
    block_size: Option<usize>,
    max_probes: Option<usize>,
    max_candidates: Option<usize>,
    codec: CodecArg,
    no_checksum: bool,
    max_size: usize,
    header_only: bool,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

impl Options {
    fn new(command: Command, cli: &Cli) -> Self {
        Self {
            command,
            use_stdout: false,
            force: cli.force,
            quiet: cli.quiet,
            verbose: cli.verbose.min(2),
            json_output: cli.json_output,
            level: DEFAULT_LEVEL,
            block_size: None,
            max_probes: None,
            max_candidates: None,
            codec: CodecArg::None,
            no_checksum: false,
            max_size: format::DEFAULT_MAX_TARGET_LEN,
            header_only: false,
            input_file: None,
            output_file: None,
        }
    }
}

fn resolve_options(cli: Cli) -> Options {
    match &cli.command {
        Cmd::Encode(args) => Options {
            use_stdout: args.stdout,
            level: args.tuning.level,
            block_size: args.tuning.block_size.map(|b| b as usize),
            max_probes: args.tuning.max_probes,
            max_candidates: args.tuning.max_candidates,
            codec: args.tuning.codec,
            no_checksum: args.tuning.no_checksum,
            input_file: args.input.clone(),
            output_file: args.output.clone(),
            ..Options::new(Command::Encode, &cli)
        },
        Cmd::Decode(args) => Options {
            use_stdout: args.stdout,
            no_checksum: args.no_checksum,
            max_size: args.max_size,
            input_file: args.input.clone(),
            output_file: args.output.clone(),
            ..Options::new(Command::Decode, &cli)
        },
        Cmd::Inspect(args) => Options {
            header_only: args.header_only,
            input_file: Some(args.input.clone()),
            ..Options::new(Command::Inspect, &cli)
        },
        Cmd::Config => Options::new(Command::Config, &cli),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("rolldelta".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = index_config(&opts);
        let _ = format_options(&opts);
    }
}

// ---------------------------------------------------------------------------
// Options -> library configuration
// ---------------------------------------------------------------------------

fn index_config(opts: &Options) -> IndexConfig {
    let mut cfg = config::config_for_level(opts.level);
    if let Some(b) = opts.block_size {
        cfg.block_size = b;
    }
    if let Some(p) = opts.max_probes {
        cfg.max_probes = p;
    }
    if let Some(c) = opts.max_candidates {
        cfg.max_candidates = c;
    }
    cfg
}

fn codec_for(arg: CodecArg, level: u32) -> Result<Codec, String> {
    match arg {
        CodecArg::None => Ok(Codec::None),
        #[cfg(feature = "zlib")]
        CodecArg::Zlib => Ok(Codec::Zlib { level }),
        #[cfg(feature = "lzma")]
        CodecArg::Lzma => Ok(Codec::Lzma),
        #[allow(unreachable_patterns)]
        other => {
            let _ = level;
            Err(format!(
                "codec '{}' not compiled in (available: {})",
                format!("{other:?}").to_lowercase(),
                codec::available().join(", ")
            ))
        }
    }
}

fn format_options(opts: &Options) -> Result<FormatOptions, String> {
    Ok(FormatOptions {
        checksum: !opts.no_checksum,
        codec: codec_for(opts.codec, opts.level)?,
    })
}

// ---------------------------------------------------------------------------
// I/O helpers
// ---------------------------------------------------------------------------

fn read_input(path: Option<&Path>) -> Result<Vec<u8>, String> {
    match path {
        Some(p) => std::fs::read(p).map_err(|e| format!("input file: {}: {e}", p.display())),
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .lock()
                .read_to_end(&mut buf)
                .map_err(|e| format!("stdin: {e}"))?;
            Ok(buf)
        }
    }
}

fn open_output(opts: &Options) -> Result<Box<dyn Write>, String> {
    match (opts.use_stdout, &opts.output_file) {
        (true, _) | (_, None) => Ok(Box::new(BufWriter::with_capacity(
            BUF_SIZE,
            io::stdout().lock(),
        ))),
        (false, Some(path)) => {
            if path.exists() && !opts.force {
                return Err(format!(
                    "output file exists, use -f to overwrite: {}",
                    path.display()
                ));
            }
            File::create(path)
                .map(|f| Box::new(BufWriter::with_capacity(BUF_SIZE, f)) as Box<dyn Write>)
                .map_err(|e| format!("output file: {}: {e}", path.display()))
        }
    }
}

fn write_output(opts: &Options, data: &[u8]) -> Result<(), String> {
    let mut w = open_output(opts)?;
    w.write_all(data)
        .and_then(|()| w.flush())
        .map_err(|e| format!("write error: {e}"))
}

fn emit_json(value: serde_json::Value) {
    match serde_json::to_string_pretty(&value) {
        Ok(s) => eprintln!("{s}"),
        Err(e) => eprintln!("rolldelta: json: {e}"),
    }
}

fn fail(msg: impl std::fmt::Display) -> i32 {
    eprintln!("rolldelta: {msg}");
    1
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("rolldelta version {version}");

    let cfg = IndexConfig::default();
    eprintln!("ZLIB={}", cfg!(feature = "zlib") as u8);
    eprintln!("LZMA={}", cfg!(feature = "lzma") as u8);
    eprintln!("ADLER32_SIMD={}", cfg!(feature = "adler32") as u8);
    eprintln!("FILE_IO={}", cfg!(feature = "file-io") as u8);
    eprintln!("PARALLEL={}", cfg!(feature = "parallel") as u8);
    eprintln!("CODECS={}", codec::available().join(","));
    eprintln!("DEFAULT_LEVEL={DEFAULT_LEVEL}");
    eprintln!("BLOCK_SIZE={}", cfg.block_size);
    eprintln!("MAX_PROBES={}", cfg.max_probes);
    eprintln!("MAX_CANDIDATES={}", cfg.max_candidates);
    eprintln!("sizeof(usize)={}", std::mem::size_of::<usize>());

    0
}

// ---------------------------------------------------------------------------
// Encode command
// ---------------------------------------------------------------------------

fn cmd_encode(opts: &Options) -> i32 {
    let cfg = index_config(opts);
    let fmt = match format_options(opts) {
        Ok(f) => f,
        Err(e) => return fail(e),
    };
    let target = match read_input(opts.input_file.as_deref()) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };

    let ops = match DeltaEncoder::new(cfg).and_then(|enc| enc.encode(&target)) {
        Ok(ops) => ops,
        Err(e) => return fail(format!("encode error: {e}")),
    };
    let mut delta = Vec::new();
    if let Err(e) = format::write_delta(&ops, &target, &fmt, &mut delta) {
        return fail(format!("encode error: {e}"));
    }
    if let Err(e) = write_output(opts, &delta) {
        return fail(e);
    }

    let stats = OpStats::from_ops(&ops);
    info!(
        "profile {} (block {}, probes {}, candidates {})",
        cfg.name, cfg.block_size, cfg.max_probes, cfg.max_candidates
    );
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "rolldelta: encoder: input size: {}, delta size: {}, adds: {}, copies: {}",
            target.len(),
            delta.len(),
            stats.adds,
            stats.copies
        );
    }
    if opts.json_output {
        emit_json(serde_json::json!({
            "command": "encode",
            "input_size": target.len(),
            "delta_size": delta.len(),
            "level": opts.level,
            "block_size": cfg.block_size,
            "codec": fmt.codec.name(),
            "adds": stats.adds,
            "copies": stats.copies,
            "literal_bytes": stats.literal_bytes,
            "copied_bytes": stats.copied_bytes,
        }));
    }
    0
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn cmd_decode(opts: &Options) -> i32 {
    let delta = match read_input(opts.input_file.as_deref()) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    let dopts = DecodeOptions {
        verify_checksum: !opts.no_checksum,
        max_target_len: opts.max_size,
        ..DecodeOptions::default()
    };
    let target = match format::decode_delta_with(&delta, &dopts) {
        Ok(t) => t,
        Err(e) => return fail(format!("decode error: {e}")),
    };
    if let Err(e) = write_output(opts, &target) {
        return fail(e);
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "rolldelta: decoder: delta size: {}, output size: {}",
            delta.len(),
            target.len()
        );
    }
    if opts.json_output {
        emit_json(serde_json::json!({
            "command": "decode",
            "delta_size": delta.len(),
            "output_size": target.len(),
            "checksum_verified": !opts.no_checksum,
        }));
    }
    0
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

fn flag_names(flags: FormatFlags) -> String {
    let names: Vec<&str> = flags.iter_names().map(|(name, _)| name).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(" | ")
    }
}

fn cmd_inspect(opts: &Options) -> i32 {
    let delta = match read_input(opts.input_file.as_deref()) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    let header = match format::read_header(&delta) {
        Ok(h) => h,
        Err(e) => return fail(format!("invalid delta header: {e}")),
    };

    println!("magic:          {}", String::from_utf8_lossy(&format::MAGIC));
    println!("flags:          {}", flag_names(header.flags));
    if let Some(id) = header.codec_id {
        println!("codec:          {} ({id})", codec::name_for_id(id));
    }
    println!("target size:    {}", header.target_len);
    if let Some(sum) = header.checksum {
        println!("adler32:        {sum:#010x}");
    }
    println!("op count:       {}", header.op_count);
    println!("header size:    {}", header.header_len);
    println!("delta size:     {}", delta.len());

    if opts.header_only {
        return 0;
    }

    let parsed = match format::parse_ops(&delta) {
        Ok(p) => p,
        Err(e) => return fail(format!("invalid delta: {e}")),
    };
    let stats = OpStats::from_ops(&parsed.ops);
    println!("adds:           {} ({} bytes)", stats.adds, stats.literal_bytes);
    println!("copies:         {} ({} bytes)", stats.copies, stats.copied_bytes);
    println!();
    println!("  {:>8}  {:<4} {:>10} {:>10}", "#", "op", "offset", "length");
    for (i, op) in parsed.ops.iter().enumerate() {
        println!("  {i:>8}  {op}");
    }

    if opts.json_output {
        emit_json(serde_json::json!({
            "command": "inspect",
            "target_size": header.target_len,
            "op_count": header.op_count,
            "adds": stats.adds,
            "copies": stats.copies,
            "literal_bytes": stats.literal_bytes,
            "copied_bytes": stats.copied_bytes,
        }));
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    }
}

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(opts.verbose, opts.quiet)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    let exit_code = match opts.command {
        Command::Encode => cmd_encode(&opts),
        Command::Decode => cmd_decode(&opts),
        Command::Inspect => cmd_inspect(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
