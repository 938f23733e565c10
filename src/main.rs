use std::env;
use std::process;
use tailing_writer::{TailingWriter, WriterOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_stream::StreamExt;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Copies stdin into the file while tailing the file back out to stdout.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tailing_writer=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <file_path>", args[0]);
        process::exit(1);
    }

    let file_path = &args[1];
    let mut options = WriterOptions::default();
    if let Ok(value) = env::var("TAILING_WRITER_BUFFER_SIZE") {
        match value.parse() {
            Ok(size) => options = options.with_buffer_size(size),
            Err(e) => {
                eprintln!("Invalid TAILING_WRITER_BUFFER_SIZE {:?}: {}", value, e);
                process::exit(1);
            }
        }
    }

    let writer = TailingWriter::create(file_path, options);
    let mut reader = writer.reader();
    tracing::info!(path = %file_path, "Writing stdin");

    let tail = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(chunk) = reader.next().await {
            stdout.write_all(&chunk?).await?;
        }
        stdout.flush().await?;
        Ok::<_, tailing_writer::Error>(())
    });

    let mut stdin = tokio::io::stdin();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = writer.append(buf[..n].to_vec()) {
                    eprintln!("Error writing file: {}", e);
                    process::exit(1);
                }
            }
            Err(e) => {
                writer.fail(e.into());
                break;
            }
        }
    }

    if let Err(e) = writer.finish().await {
        eprintln!("Error writing file: {}", e);
        process::exit(1);
    }

    match tail.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("Error reading file: {}", e);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Reader task failed: {}", e);
            process::exit(1);
        }
    }
}
