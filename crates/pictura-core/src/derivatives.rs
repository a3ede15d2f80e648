//! Registry of derivative renditions produced for every accepted upload.

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// How the transform tool fits an image into a derivative's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Resize and strip profiles/comments (ImageMagick `-thumbnail`).
    Thumbnail,
    /// Plain resize keeping embedded profiles (ImageMagick `-resize`).
    Resize,
}

impl ResizeMode {
    pub fn as_flag(&self) -> &'static str {
        match self {
            ResizeMode::Thumbnail => "-thumbnail",
            ResizeMode::Resize => "-resize",
        }
    }
}

impl Display for ResizeMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ResizeMode::Thumbnail => write!(f, "thumbnail"),
            ResizeMode::Resize => write!(f, "resize"),
        }
    }
}

/// One derivative rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivativeSpec {
    pub name: &'static str,
    pub filename_prefix: &'static str,
    pub max_width: u32,
    pub max_height: u32,
    pub resize_mode: ResizeMode,
}

impl DerivativeSpec {
    /// Target geometry; the trailing `>` only ever shrinks the source.
    pub fn geometry(&self) -> String {
        format!("{}x{}>", self.max_width, self.max_height)
    }

    /// File name of this derivative for a given source file name.
    pub fn file_name(&self, source_file_name: &str) -> String {
        format!("{}{}", self.filename_prefix, source_file_name)
    }

    /// Object path of this derivative, namespaced by the image identifier.
    pub fn object_path(&self, image_id: &str, source_file_name: &str) -> String {
        format!("{}/{}", image_id, self.file_name(source_file_name))
    }
}

pub const DEFAULT_DERIVATIVES: &[DerivativeSpec] = &[
    DerivativeSpec {
        name: "thumbnail",
        filename_prefix: "thumb_",
        max_width: 200,
        max_height: 200,
        resize_mode: ResizeMode::Thumbnail,
    },
    DerivativeSpec {
        name: "small",
        filename_prefix: "small_",
        max_width: 400,
        max_height: 400,
        resize_mode: ResizeMode::Resize,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let names: Vec<&str> = DEFAULT_DERIVATIVES.iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["thumbnail", "small"]);
        assert_eq!(DEFAULT_DERIVATIVES[0].geometry(), "200x200>");
        assert_eq!(DEFAULT_DERIVATIVES[1].resize_mode.as_flag(), "-resize");
    }

    #[test]
    fn test_object_path() {
        let thumb = DEFAULT_DERIVATIVES[0];
        assert_eq!(thumb.object_path("abc", "photo.jpg"), "abc/thumb_photo.jpg");
    }
}
