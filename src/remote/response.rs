//! Wire types for the remote catalog search endpoint.
//!
//! The response shape is `{ "results": [ { uid, name, description?,
//! thumbnails?, viewerUrl?, downloadUrl? } ] }`. Unknown fields are
//! ignored so upstream schema additions do not break deserialization.

use crate::catalog::ProductSummary;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub results: Vec<ModelResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelResult {
    pub uid: String,
    pub name: String,
    pub description: Option<String>,
    pub thumbnails: Option<Thumbnails>,
    #[serde(rename = "viewerUrl")]
    pub viewer_url: Option<String>,
    #[serde(rename = "downloadUrl")]
    pub download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Thumbnails {
    pub images: Option<Vec<ThumbnailImage>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThumbnailImage {
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl ModelResult {
    /// Flatten a wire result into a [`ProductSummary`], picking the widest
    /// thumbnail when several sizes are offered.
    pub(crate) fn into_summary(self) -> ProductSummary {
        let thumbnail_url = self.thumbnails.and_then(|t| {
            t.images
                .unwrap_or_default()
                .into_iter()
                .max_by_key(|img| img.width)
                .map(|img| img.url)
        });

        ProductSummary {
            id: self.uid,
            name: self.name,
            thumbnail_url,
            description: self.description,
            viewer_url: self.viewer_url,
            download_url: self.download_url,
        }
    }
}
