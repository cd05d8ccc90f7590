use log::{debug, info, warn};
use sim8086::config::Config;
use sim8086::disassembler::ListingLine;
use sim8086::{Disassembler, ErrorPolicy, MAX_PROGRAM_BYTES};
use std::env;
use std::fs;
use std::io::{self, Write};

fn print_usage(program: &str) {
    eprintln!("Usage: {} [options] <binary-file>", program);
    eprintln!("\nOptions:");
    eprintln!("  -c <file>              Read decoder/output settings from a TOML file");
    eprintln!("  -n                     Prefix each line with its byte offset");
    eprintln!("  -d                     Dump hex bytes of instructions");
    eprintln!("  -b, --bits             Start the listing with a 'bits 16' header");
    eprintln!("  -k, --keep-going       Skip unsupported instructions instead of stopping");
    eprintln!("  --max-iterations <n>   Stop after decoding n instructions");
    eprintln!("  -h, --help             Show this help message");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("sim8086");

    let mut config_path = None;
    let mut show_offsets = false;
    let mut dump_hex = false;
    let mut bits = false;
    let mut keep_going = false;
    let mut max_iterations = None;
    let mut filename = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" => {
                i += 1;
                config_path = Some(args.get(i).ok_or("-c needs a file name")?.clone());
            }
            "-n" => show_offsets = true,
            "-d" => dump_hex = true,
            "-b" | "--bits" => bits = true,
            "-k" | "--keep-going" => keep_going = true,
            "--max-iterations" => {
                i += 1;
                let value = args.get(i).ok_or("--max-iterations needs a value")?;
                max_iterations = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid iteration limit: {}", value))?,
                );
            }
            "-h" | "--help" => {
                print_usage(program);
                return Ok(());
            }
            arg if !arg.starts_with('-') && filename.is_none() => {
                filename = Some(arg.to_string());
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage(program);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(filename) = filename else {
        print_usage(program);
        std::process::exit(1);
    };

    let mut config = match &config_path {
        Some(path) => {
            debug!("Loading configuration from {}", path);
            Config::from_toml_str(&fs::read_to_string(path)?)?
        }
        None => Config::default(),
    };

    // Command line flags win over the file
    config.output.show_offsets |= show_offsets;
    config.output.dump_hex |= dump_hex;
    config.output.bits_header |= bits;
    if keep_going {
        config.decoder.policy = ErrorPolicy::Recoverable;
    }
    if let Some(limit) = max_iterations {
        config.decoder.max_iterations = limit;
    }

    let tables = config.build_tables()?;

    let mut program_bytes = match fs::read(&filename) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: Cannot read '{}': {}", filename, e);
            std::process::exit(1);
        }
    };
    if program_bytes.len() > MAX_PROGRAM_BYTES {
        warn!(
            "{} is {} bytes; only the first {} are decoded",
            filename,
            program_bytes.len(),
            MAX_PROGRAM_BYTES
        );
        program_bytes.truncate(MAX_PROGRAM_BYTES);
    }
    info!("Loaded {} bytes from {}", program_bytes.len(), filename);
    debug!("Decoder settings: {:?}, output: {:?}", config.decoder, config.output);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let disasm = Disassembler::new(&tables, config.decoder, config.output);
    for line in disasm.lines(&program_bytes) {
        match line {
            Ok(ListingLine::Text(text)) => writeln!(out, "{}", text)?,
            Ok(ListingLine::Skipped(text)) => {
                out.flush()?;
                eprintln!("{}", text);
            }
            Err(e) => {
                out.flush()?;
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
