//! Entry point for `rudp`: a reliable file transfer over the transport.
//!
//! Parses CLI arguments and dispatches into either **server** or **client**
//! mode.  The client uploads its file and then downloads the server's file;
//! the server does the mirror image.  All reliability lives in the library;
//! `main.rs` owns only process setup (logging, argument parsing) and file
//! I/O.
//!
//! Files travel over a minimal app-level framing: an 8-byte big-endian
//! length, then the raw bytes in [`DATA_SIZE`]-byte chunks.  (FIN is
//! reserved for connection teardown, so end-of-file needs its own marker.)

use std::error::Error;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use rudp::connection::Connection;
use rudp::packet::DATA_SIZE;
use rudp::socket::Socket;

/// Reliable file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive a client's upload, then send `file` back to it.
    Server {
        /// Local address to bind (e.g. 0.0.0.0:9000).
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
        /// File to send to the client once its upload completes.
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Upload `file` to the server, then download the server's file.
    Client {
        /// Remote server address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        server: SocketAddr,
        /// File to upload.
        #[arg(short, long)]
        file: PathBuf,
    },
}

type AppResult = Result<(), Box<dyn Error>>;

#[tokio::main]
async fn main() {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.mode {
        Mode::Server { bind, file } => run_server(bind, &file).await,
        Mode::Client { server, file } => run_client(server, &file).await,
    };

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}

async fn run_server(bind: SocketAddr, file: &Path) -> AppResult {
    let socket = Socket::bind(bind).await?;
    let mut conn = Connection::accept(socket).await?;

    let upload = receive_file(&mut conn).await?;
    let out = prefixed_name("received_from_client_", file);
    std::fs::write(&out, &upload)?;
    log::info!("stored {} bytes in {}", upload.len(), out.display());

    send_file(&mut conn, file).await?;
    conn.wait_close().await?;
    Ok(())
}

async fn run_client(server: SocketAddr, file: &Path) -> AppResult {
    let socket = Socket::bind("0.0.0.0:0".parse::<SocketAddr>()?).await?;
    let mut conn = Connection::connect(socket, server).await?;

    send_file(&mut conn, file).await?;

    let download = receive_file(&mut conn).await?;
    let out = prefixed_name("received_from_server_", file);
    std::fs::write(&out, &download)?;
    log::info!("stored {} bytes in {}", download.len(), out.display());

    conn.close().await?;
    Ok(())
}

async fn send_file(conn: &mut Connection, path: &Path) -> AppResult {
    let contents = std::fs::read(path)?;
    conn.send(&(contents.len() as u64).to_be_bytes()).await?;
    for chunk in contents.chunks(DATA_SIZE) {
        conn.send(chunk).await?;
    }
    log::info!("sent {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

async fn receive_file(conn: &mut Connection) -> Result<Vec<u8>, Box<dyn Error>> {
    let header = conn.recv().await?;
    let total = u64::from_be_bytes(header.as_slice().try_into()?) as usize;

    let mut contents = Vec::with_capacity(total);
    while contents.len() < total {
        contents.extend_from_slice(&conn.recv().await?);
    }
    contents.truncate(total);
    Ok(contents)
}

/// `received_from_client_report.pdf` for `prefix` + `/some/dir/report.pdf`.
fn prefixed_name(prefix: &str, path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    PathBuf::from(format!("{prefix}{name}"))
}
