use async_trait::async_trait;
use std::{fs::File, io, io::Read};
use tracing::info;
use super::error::UploadError;
use super::firestore::Document;
use super::parser::LocationRows;
use super::utility::read_yes_or_no;

// destination for uploaded documents, returns the name of each created document
#[async_trait]
pub trait DocumentSink {
    async fn add_document(&mut self, collection: &str, document: &Document) -> Result<String, UploadError>;
}

// shown the first document of the run; false cancels the upload
pub type Preview = Box<dyn FnMut(&Document) -> io::Result<bool>>;

pub struct Uploader<S> {
    sink: S,
    collection: String,
    field: String,
    preview: Option<Preview>,
    uploaded: usize,
}

impl<S: DocumentSink> Uploader<S> {

    pub fn new(sink: S, collection: String, field: String, preview: Option<Preview>) -> Uploader<S> {
        Uploader {
            sink: sink,
            collection: collection,
            field: field,
            preview: preview,
            uploaded: 0,
        }
    }

    // total number of documents written so far, across all files
    pub fn uploaded(&self) -> usize {
        self.uploaded
    }

    pub async fn upload_file(&mut self, filename: &str) -> Result<usize, UploadError> {
        info!("Reading {}...", filename);
        let file = File::open(filename).map_err(|source| UploadError::OpenFile {
            path: filename.to_owned(),
            source: source,
        })?;

        let count = self.upload_reader(file).await?;
        info!("{} locations from {} have been saved to {}", count, filename, self.collection);
        Ok(count)
    }

    // one write per row, in order; the first bad row or failed write ends the run
    pub async fn upload_reader<R: Read>(&mut self, reader: R) -> Result<usize, UploadError> {
        let mut rows = LocationRows::new(reader);
        let mut count = 0;

        while let Some(point) = rows.next_point()? {
            let document = Document::with_geo_point(&self.field, point);

            if let Some(mut preview) = self.preview.take() {
                if !preview(&document)? {
                    return Err(UploadError::Cancelled);
                }
            }

            self.sink.add_document(&self.collection, &document).await?;
            info!("Uploaded location: {}", point);

            count += 1;
            self.uploaded += 1;
        }

        Ok(count)
    }
}

// show the first document so the user can check the field layout before anything is written
pub fn preview_on_stdin(document: &Document) -> io::Result<bool> {
    let json = serde_json::to_string(document).map_err(io::Error::from)?;
    println!("Preview the first record in Firestore JSON format: {}", json);

    let accepted = read_yes_or_no("Does the record format look correct?", true)?;
    println!();
    Ok(accepted)
}
