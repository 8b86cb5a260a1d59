//! Command-line driver for the coprocessor mailbox.
//!
//! Starts native reference workers, pushes requests through the same
//! submit/wait/status path a guest program uses, and prints what came back.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use coproc::{CoprocConfig, CoprocError, Coprocessor, CpuFamily, SubmitRequest, TicketStatus};
use services_loader::{FsLoader, MemoryLoader};
use services_reference::{ReferenceFactory, OP_ADD, OP_CHECKSUM, OP_COPY};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Scratch buffers used for request payloads.
const SRC_BUF: u32 = 0x10_0000;
const DST_BUF: u32 = 0x18_0000;
const DST_CAP: u32 = 0x1_0000;

/// Text rendering helpers used by the CLI commands.
mod render {
    use coproc::{TicketInfo, WorkerInfo};

    /// One line per worker record.
    pub fn workers(workers: &[WorkerInfo]) -> String {
        let mut out = String::new();
        for w in workers {
            out.push_str(&format!(
                "{:<12} {:<7} window={:06X}-{:06X} gen={} queued={} served={}\n",
                w.label,
                if w.running { "RUNNING" } else { "STOPPED" },
                w.window.base,
                w.window.end,
                w.generation,
                w.queued,
                w.progress
            ));
        }
        out
    }

    pub fn ticket(info: &TicketInfo) -> String {
        format!(
            "ticket {} on {} slot {}: {} result={:#x} len={}\n",
            info.id, info.family, info.slot, info.status, info.result_code, info.resp_len
        )
    }

    /// Summary of a flood run.
    pub fn flood(submitted: u32, rejected: u32, ok: u32, failed: u32, millis: u128) -> String {
        format!(
            "submitted={submitted} queue_full={rejected} ok={ok} failed={failed} elapsed={millis}ms\n"
        )
    }

    pub fn hexdump(base: u32, bytes: &[u8]) -> String {
        let mut out = String::new();
        for (row, chunk) in bytes.chunks(16).enumerate() {
            out.push_str(&format!("{:06X}:", base as usize + row * 16));
            for byte in chunk {
                out.push_str(&format!(" {byte:02X}"));
            }
            out.push('\n');
        }
        out
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive coprocessor workers through the mailbox", long_about = None)]
struct Cli {
    /// Directory holding service images. Without it, built-in placeholder
    /// images `svc_add`, `svc_copy` and `svc_checksum` are used.
    #[arg(long, value_name = "DIR")]
    images: Option<PathBuf>,

    /// JSON file with core configuration overrides.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add two numbers on a worker.
    Add {
        #[arg(long, default_value = "6502")]
        cpu: CpuFamily,
        #[arg(long, default_value = "svc_add")]
        service: String,
        #[arg(value_parser = parse_u32)]
        a: u32,
        #[arg(value_parser = parse_u32)]
        b: u32,
        /// Wait timeout in milliseconds (0 selects the configured default).
        #[arg(long, default_value_t = 5000)]
        timeout: u32,
    },
    /// Copy a string through a worker and dump the destination buffer.
    Copy {
        #[arg(long, default_value = "z80")]
        cpu: CpuFamily,
        #[arg(long, default_value = "svc_copy")]
        service: String,
        text: String,
        /// Destination capacity in bytes.
        #[arg(long, value_parser = parse_u32, default_value = "64")]
        cap: u32,
    },
    /// Byte checksum of a string, computed by a worker.
    Checksum {
        #[arg(long, default_value = "ie32")]
        cpu: CpuFamily,
        #[arg(long, default_value = "svc_checksum")]
        service: String,
        text: String,
    },
    /// Submit many requests as fast as possible and report ring pressure.
    Flood {
        #[arg(long, default_value = "m68k")]
        cpu: CpuFamily,
        #[arg(long, default_value = "svc_add")]
        service: String,
        #[arg(long, default_value_t = 1000)]
        count: u32,
    },
    /// Start the given families and print every worker record.
    Workers {
        #[arg(value_name = "CPU")]
        start: Vec<CpuFamily>,
        #[arg(long, default_value = "svc_add")]
        service: String,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let coproc = build(cli.images.as_deref(), config)?;

    match cli.command {
        Command::Add {
            cpu,
            service,
            a,
            b,
            timeout,
        } => handle_add(&coproc, cpu, &service, a, b, timeout),
        Command::Copy {
            cpu,
            service,
            text,
            cap,
        } => handle_copy(&coproc, cpu, &service, &text, cap),
        Command::Checksum { cpu, service, text } => {
            handle_checksum(&coproc, cpu, &service, &text)
        }
        Command::Flood {
            cpu,
            service,
            count,
        } => handle_flood(&coproc, cpu, &service, count),
        Command::Workers {
            start,
            service,
            json,
        } => handle_workers(&coproc, &start, &service, json),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt().with_env_filter(env_filter).try_init();
}

fn load_config(path: Option<&Path>) -> Result<CoprocConfig> {
    let Some(path) = path else {
        return Ok(CoprocConfig::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read config {path:?}"))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {path:?}"))
}

fn builtin_images() -> Result<MemoryLoader> {
    let loader = MemoryLoader::new();
    for name in ["svc_add", "svc_copy", "svc_checksum"] {
        loader.insert(name, name.as_bytes().to_vec())?;
    }
    Ok(loader)
}

fn build(images: Option<&Path>, config: CoprocConfig) -> Result<Coprocessor> {
    let builder = Coprocessor::builder()
        .config(config)
        .factory(ReferenceFactory::new());
    let builder = match images {
        Some(dir) => builder.loader(FsLoader::new(dir)),
        None => builder.loader(builtin_images()?),
    };
    builder.build()
}

fn start(coproc: &Coprocessor, cpu: CpuFamily, service: &str) -> Result<()> {
    coproc
        .start(cpu, service)
        .with_context(|| format!("starting {service} on {cpu}"))?;
    info!(%cpu, service, "worker ready");
    Ok(())
}

/// Submits, waits, and reads the final status the way a guest would.
fn call(coproc: &Coprocessor, request: SubmitRequest, timeout: u32) -> Result<TicketStatus> {
    let ticket = coproc.submit(request).context("submit")?;
    coproc.wait(ticket, timeout).context("wait")?;
    let info = coproc.inspect(ticket)?;
    print!("{}", render::ticket(&info));
    Ok(coproc.status(ticket)?)
}

fn handle_add(
    coproc: &Coprocessor,
    cpu: CpuFamily,
    service: &str,
    a: u32,
    b: u32,
    timeout: u32,
) -> Result<()> {
    start(coproc, cpu, service)?;
    let memory = coproc.memory();
    memory.write_u32(SRC_BUF, a)?;
    memory.write_u32(SRC_BUF + 4, b)?;
    let request = SubmitRequest::new(cpu, OP_ADD)
        .source(SRC_BUF, 8)
        .destination(DST_BUF, 4);
    match call(coproc, request, timeout)? {
        TicketStatus::Ok => {
            println!("{a} + {b} = {}", memory.read_u32(DST_BUF)?);
            Ok(())
        }
        other => bail!("add finished with {other}"),
    }
}

fn handle_copy(
    coproc: &Coprocessor,
    cpu: CpuFamily,
    service: &str,
    text: &str,
    cap: u32,
) -> Result<()> {
    if cap > DST_CAP {
        bail!("capacity {cap} exceeds scratch buffer of {DST_CAP} bytes");
    }
    start(coproc, cpu, service)?;
    let memory = coproc.memory();
    memory.write_bytes(SRC_BUF, text.as_bytes())?;
    let request = SubmitRequest::new(cpu, OP_COPY)
        .source(SRC_BUF, text.len() as u32)
        .destination(DST_BUF, cap);
    let ticket = coproc.submit(request)?;
    let status = coproc.wait(ticket, 0)?;
    let copied = coproc.inspect(ticket)?.resp_len;
    if status != TicketStatus::Ok {
        bail!("copy finished with {status}");
    }
    let mut out = vec![0u8; copied as usize];
    memory.read_bytes(DST_BUF, &mut out)?;
    print!("{}", render::hexdump(DST_BUF, &out));
    Ok(())
}

fn handle_checksum(coproc: &Coprocessor, cpu: CpuFamily, service: &str, text: &str) -> Result<()> {
    start(coproc, cpu, service)?;
    let memory = coproc.memory();
    memory.write_bytes(SRC_BUF, text.as_bytes())?;
    let request = SubmitRequest::new(cpu, OP_CHECKSUM)
        .source(SRC_BUF, text.len() as u32)
        .destination(DST_BUF, 4);
    match call(coproc, request, 0)? {
        TicketStatus::Ok => {
            println!("checksum = {:#010x}", memory.read_u32(DST_BUF)?);
            Ok(())
        }
        other => bail!("checksum finished with {other}"),
    }
}

fn handle_flood(coproc: &Coprocessor, cpu: CpuFamily, service: &str, count: u32) -> Result<()> {
    start(coproc, cpu, service)?;
    let memory = coproc.memory();
    memory.write_u32(SRC_BUF, 1)?;
    memory.write_u32(SRC_BUF + 4, 2)?;
    let request = SubmitRequest::new(cpu, OP_ADD)
        .source(SRC_BUF, 8)
        .destination(DST_BUF, 4);

    let started = Instant::now();
    let (mut submitted, mut rejected, mut ok, mut failed) = (0, 0, 0, 0);
    let mut in_flight = Vec::new();
    while submitted < count {
        match coproc.submit(request) {
            Ok(ticket) => {
                submitted += 1;
                in_flight.push(ticket);
            }
            Err(CoprocError::QueueFull(_)) => {
                rejected += 1;
                for ticket in in_flight.drain(..) {
                    match coproc.wait(ticket, 0)? {
                        TicketStatus::Ok => ok += 1,
                        _ => failed += 1,
                    }
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
    for ticket in in_flight {
        match coproc.wait(ticket, 0)? {
            TicketStatus::Ok => ok += 1,
            _ => failed += 1,
        }
    }
    print!(
        "{}",
        render::flood(submitted, rejected, ok, failed, started.elapsed().as_millis())
    );
    Ok(())
}

fn handle_workers(
    coproc: &Coprocessor,
    families: &[CpuFamily],
    service: &str,
    json: bool,
) -> Result<()> {
    for &family in families {
        start(coproc, family, service)?;
    }
    let workers = coproc.workers();
    if json {
        println!("{}", serde_json::to_string_pretty(&workers)?);
    } else {
        print!("{}", render::workers(&workers));
        println!("worker_state = {:#06x}", coproc.worker_state().bits());
    }
    Ok(())
}

fn parse_u32(input: &str) -> Result<u32, String> {
    if let Some(stripped) = input.strip_prefix("0x") {
        u32::from_str_radix(stripped, 16).map_err(|_| format!("invalid hex value '{input}'"))
    } else {
        input
            .parse::<u32>()
            .map_err(|_| format!("invalid number '{input}'"))
    }
}
