use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rfdump_core::dump::DumpRunner;
use rfdump_core::session::{DumpConfig, UbootSession};
use rfdump_core::transport::{ConsoleTransport, ParityMode, SerialConsole, SerialSettings};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "U-Boot serial console firmware dumper", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dump device memory through the bootloader console
    Dump {
        /// Serial port to use (see `rfdump ports`)
        #[arg(long)]
        port: String,

        /// Output image path
        #[arg(long, default_value = "firmware.bin")]
        output: PathBuf,

        /// Optional TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Baud rate
        #[arg(long, default_value_t = 115_200)]
        baud: u32,

        /// Data bits (5-8)
        #[arg(long, default_value_t = 8)]
        data_bits: u8,

        /// Parity: none, odd or even
        #[arg(long, default_value = "none")]
        parity: String,

        /// Stop bits (1 or 2)
        #[arg(long, default_value_t = 1)]
        stop_bits: u8,

        /// Bytes requested per memory-read command
        #[arg(long)]
        chunk_size: Option<u32>,

        /// Total bytes to dump
        #[arg(long)]
        span: Option<u32>,

        /// Bootloader detection deadline in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// List all detected serial ports
    Ports,

    /// Mirror raw console output from a port
    Monitor {
        /// Serial port to monitor
        #[arg(long)]
        port: String,

        /// Baud rate
        #[arg(long, default_value_t = 115_200)]
        baud: u32,
    },
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match args.command {
        Command::Dump {
            port,
            output,
            config,
            baud,
            data_bits,
            parity,
            stop_bits,
            chunk_size,
            span,
            timeout,
        } => run_dump(DumpArgs {
            port,
            output,
            config,
            baud,
            data_bits,
            parity,
            stop_bits,
            chunk_size,
            span,
            timeout,
        }),
        Command::Ports => run_ports(),
        Command::Monitor { port, baud } => run_monitor(&port, baud),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

struct DumpArgs {
    port: String,
    output: PathBuf,
    config: Option<PathBuf>,
    baud: u32,
    data_bits: u8,
    parity: String,
    stop_bits: u8,
    chunk_size: Option<u32>,
    span: Option<u32>,
    timeout: Option<u64>,
}

fn run_dump(args: DumpArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => DumpConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => DumpConfig::default(),
    };

    config.serial.baud_rate = args.baud;
    config.serial.data_bits = args.data_bits;
    config.serial.parity = parse_parity(&args.parity)?;
    config.serial.stop_bits = args.stop_bits;
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(span) = args.span {
        config.span = span;
    }
    if let Some(timeout) = args.timeout {
        config.detect_timeout_secs = timeout;
    }

    info!(port = %args.port, output = %args.output.display(), "Starting dump");

    let console = SerialConsole::open(&args.port, &config.serial)?;
    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let session = UbootSession::new(console);

    let mut runner = DumpRunner::new(session, BufWriter::new(file), config);
    runner.run()?;

    info!(output = %args.output.display(), "Firmware image written");
    Ok(())
}

fn parse_parity(text: &str) -> Result<ParityMode> {
    match text {
        "none" => Ok(ParityMode::None),
        "odd" => Ok(ParityMode::Odd),
        "even" => Ok(ParityMode::Even),
        other => bail!("unknown parity '{other}', expected none, odd or even"),
    }
}

fn run_ports() -> Result<()> {
    let ports = SerialConsole::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports detected - is the device plugged in?");
        return Ok(());
    }
    println!("Available ports:");
    for port in ports {
        println!("  {port}");
    }
    Ok(())
}

fn run_monitor(port: &str, baud: u32) -> Result<()> {
    let settings = SerialSettings {
        baud_rate: baud,
        ..Default::default()
    };
    let mut console = SerialConsole::open(port, &settings)?;

    info!(port = %port, baud = baud, "Monitoring serial port, Ctrl-C to exit");
    loop {
        let chunk = console.read_available()?;
        if !chunk.is_empty() {
            print!("{chunk}");
            io::stdout().flush()?;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
