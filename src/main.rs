use std::process::exit;
use tracing::{error, info, Level};
use modules::config::get_arguments;
use modules::error::UploadError;
use modules::firestore::Firestore;
use modules::uploader::{preview_on_stdin, Preview, Uploader};

mod modules;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).with_target(false).init();

    if let Err(error) = run().await {
        error!("{}", error);
        exit(1);
    }
}

async fn run() -> Result<(), UploadError> {
    let (filenames, config) = get_arguments()?;

    let client = Firestore::from_config(&config)?;
    let preview: Option<Preview> = if config.should_preview_record {
        Some(Box::new(preview_on_stdin))
    } else {
        None
    };
    let mut uploader = Uploader::new(client, config.collection, config.field, preview);

    // files are uploaded one after another; a failure leaves later files untouched
    for filename in &filenames {
        uploader.upload_file(filename).await?;
    }

    info!("{} locations have been saved to Firestore", uploader.uploaded());
    Ok(())
}
