//! In-memory collaborators for exercising the pipeline without a network,
//! a database or ImageMagick.

pub mod mock_collaborators;

pub use mock_collaborators::{MockAnnotator, MockImageTool, MockObjectStore};

/// Abbreviated `identify -verbose` output.
pub const SAMPLE_REPORT: &str = "\
Image: /tmp/photo.jpg
  Image:
    Filename: /tmp/photo.jpg
    Format: JPEG (Joint Photographic Experts Group JFIF format)
    Geometry: 800x600+0+0
  Channel depth:
    red: 8-bit
    green: 8-bit
    blue: 8-bit
  Channel statistics:
    Pixels: 480000
    Red:
      min: 0  (0)
      max: 255 (1)
  Colorspace: sRGB
  Properties:
    date:create: 2024-05-01T10:00:00+00:00
    exif:Make: Canon
    jpeg:sampling-factor: 2x2,1x1,1x1
  Version: ImageMagick 6.9.11-60 Q16 x86_64 2021-01-25 https://imagemagick.org
";
