use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Scan root '{0}' does not exist or is not a directory")]
    InvalidRoot(PathBuf),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to read metadata for '{path}': {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),
}

#[derive(Error, Debug)]
pub enum HashError {
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Entry '{0}' does not refer to a local file")]
    NotAFile(String),

    #[error("Source file is missing: {0}")]
    SourceMissing(PathBuf),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {algorithm} digest '{value}'")]
    InvalidDigest {
        algorithm: &'static str,
        value: String,
    },

    #[error("Hash task failed: {0}")]
    TaskFailed(String),
}

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Unknown report reason: {0}")]
    InvalidReason(String),

    #[error("Invalid report description: {0}")]
    InvalidDescription(String),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Filename is required")]
    MissingFilename,

    #[error("File must have an extension")]
    MissingExtension,

    #[error("Invalid file type '{0}'. Supported: NSP, NSZ, XCI")]
    UnsupportedFormat(String),

    #[error("A file with the name '{0}' already exists")]
    DuplicateName(String),

    #[error("An entry for '{0}' already exists")]
    DuplicateSource(String),

    #[error("Path '{0}' escapes the upload directory")]
    PathTraversal(PathBuf),

    #[error("Uploaded file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Failed to create upload directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read metadata for '{path}': {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, VaultError>;
