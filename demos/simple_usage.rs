use std::time::Duration;
use tailing_writer::{TailingWriter, WriterOptions};
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("tailing_writer=debug").init();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("download.bin");

    // A small window so the late reader has to catch up from the file.
    let writer = TailingWriter::create(&path, WriterOptions::default().with_buffer_size(1024));
    let mut early = writer.reader();

    let producer = async {
        for i in 0..20 {
            writer.append(format!("chunk {:02}\n", i).repeat(32))?;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        writer.finish().await
    };

    let consumer = async {
        let mut total = 0;
        while let Some(chunk) = early.next().await {
            total += chunk?.len();
        }
        Ok::<_, tailing_writer::Error>(total)
    };

    let (written, early_total) = tokio::join!(producer, consumer);
    written?;
    println!("Early reader received {} bytes", early_total?);

    let late = writer.reader().read_to_end().await?;
    println!("Late reader received {} bytes", late.len());
    println!("File holds {} bytes", std::fs::metadata(&path)?.len());

    Ok(())
}
