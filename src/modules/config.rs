use clap::{clap_app, crate_version};
use std::{env, ffi::OsString};
use super::error::UploadError;
use super::utility::{read_text, read_yes_or_no};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // path of the service account JSON key
    pub key_path: Option<String>,
    pub project_id: Option<String>,
    pub collection: String,
    pub field: String,
    // host:port of a running Firestore emulator, replaces the production endpoint
    pub emulator_host: Option<String>,
    pub should_preview_record: bool,
}

pub const COLLECTION_DEFAULT: &str = "DangerousLocations";
pub const FIELD_DEFAULT: &str = "WGS84";
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";
pub const EMULATOR_ENV: &str = "FIRESTORE_EMULATOR_HOST";


pub fn get_arguments() -> Result<(Vec<String>, Config), UploadError> {
    let args: Vec<String> = env::args().collect();

    let (filenames, mut config) = if args.len() == 2 && !args[1].starts_with('-') {
        get_arguments_interactive_mode(args[1].to_string())?
    } else {
        get_arguments_command_mode(args)
    };

    config.apply_environment(|name| env::var(name).ok());
    Ok((filenames, config))
}

impl Config {
    // fill what the command line left open from the environment
    pub fn apply_environment<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if self.key_path.is_none() {
            self.key_path = lookup(CREDENTIALS_ENV);
        }
        if self.project_id.is_none() {
            self.project_id = lookup(PROJECT_ENV);
        }
        if self.emulator_host.is_none() {
            self.emulator_host = lookup(EMULATOR_ENV).filter(|host| !host.is_empty());
        }
    }
}

fn get_arguments_command_mode<I, T>(args: I) -> (Vec<String>, Config)
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = clap_app!(x =>
        (name: "CSV_To_Firestore")
        (version: crate_version!())
        (about: "Upload latitude,longitude rows from header-less CSV files as Firestore geo points")
        (@arg FILENAME: +required +multiple "CSV files to upload, in order")
        (@arg KEY: -k --key +takes_value "Service account JSON key. Defaults to $GOOGLE_APPLICATION_CREDENTIALS")
        (@arg PROJECT: -P --project +takes_value "Firebase project id. Defaults to $GOOGLE_CLOUD_PROJECT, then the key's project_id")
        (@arg COLLECTION: -c --collection +takes_value "Target collection. Default DangerousLocations")
        (@arg FIELD: -f --field +takes_value "Name of the geo point field. Default WGS84")
        (@arg PREVIEW: -p --preview "Preview the first record before uploading")
    )
    .get_matches_from(args);

    let filenames: Vec<String> = matches
        .values_of("FILENAME")
        .map(|values| values.map(|value| value.to_string()).collect())
        .unwrap_or_default();

    let config = Config {
        key_path: matches.value_of("KEY").map(|value| value.to_string()),
        project_id: matches.value_of("PROJECT").map(|value| value.to_string()),
        collection: matches.value_of("COLLECTION")
            .unwrap_or(COLLECTION_DEFAULT)
            .to_string(),
        field: matches.value_of("FIELD")
            .unwrap_or(FIELD_DEFAULT)
            .to_string(),
        emulator_host: None,
        should_preview_record: matches.is_present("PREVIEW"),
    };

    (filenames, config)
}

fn get_arguments_interactive_mode(filename: String) -> Result<(Vec<String>, Config), UploadError> {
    let default_key = env::var(CREDENTIALS_ENV).ok();

    let key_path = read_text("Input service account key path", default_key.as_deref())?;
    let project_id = read_text("Input project id (blank to use the key's project)", None)?;
    let collection = read_text("Input collection name", Some(COLLECTION_DEFAULT))?;
    let should_preview_record = read_yes_or_no("Would you like to preview the first record before uploading?", true)?;
    println!();

    Ok((vec![filename], Config {
        key_path: Some(key_path).filter(|path| !path.is_empty()),
        project_id: Some(project_id).filter(|id| !id.is_empty()),
        collection: collection,
        field: FIELD_DEFAULT.to_string(),
        emulator_host: None,
        should_preview_record: should_preview_record,
    }))
}
