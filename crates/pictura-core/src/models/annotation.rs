use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::constants::collections;

/// Annotation kinds requested from the annotation service for every image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnnotationKind {
    Labels,
    SafeSearch,
    WebDetection,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 3] = [
        AnnotationKind::Labels,
        AnnotationKind::SafeSearch,
        AnnotationKind::WebDetection,
    ];

    /// Collection holding one record of this kind per image.
    pub fn collection(&self) -> &'static str {
        match self {
            AnnotationKind::Labels => collections::LABELS,
            AnnotationKind::SafeSearch => collections::SAFE_SEARCH,
            AnnotationKind::WebDetection => collections::WEB_DETECTION,
        }
    }

    /// Document field the raw payload is stored under.
    pub fn field(&self) -> &'static str {
        self.collection()
    }
}

impl Display for AnnotationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.field())
    }
}
