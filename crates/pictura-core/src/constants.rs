//! Application-wide constants.

/// Media type prefix every processable upload must carry.
pub const IMAGE_CONTENT_TYPE_PREFIX: &str = "image/";

/// Generation marker the object store assigns to a freshly created object.
pub const FIRST_GENERATION: i64 = 1;

/// Object metadata key holding a derivative's access token.
pub const DOWNLOAD_TOKEN_METADATA_KEY: &str = "firebaseStorageDownloadTokens";

/// Host embedded in derivative download URLs unless configured otherwise.
pub const DEFAULT_DOWNLOAD_URL_HOST: &str = "firebasestorage.googleapis.com";

/// Document store collections written by the pipeline.
pub mod collections {
    pub const IMAGES: &str = "images";
    pub const EXIF: &str = "exif";
    pub const LABELS: &str = "labels";
    pub const SAFE_SEARCH: &str = "safeSearch";
    pub const WEB_DETECTION: &str = "webDetection";
}
