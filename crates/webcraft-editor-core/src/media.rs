//! Natural image dimensions for the image-swap affordance.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;
use webcraft_dom::{DomTree, NodeId};

/// Width and height of an image as the media picker should see them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NaturalSize {
    pub width: u32,
    pub height: u32,
}

impl NaturalSize {
    /// Width over height, or 0 when the height is unknown.
    pub fn aspect_ratio(self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }
}

/// Decode the dimensions of a base64 `data:` URI image.
pub fn data_uri_dimensions(src: &str) -> Option<NaturalSize> {
    let rest = src.trim().strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    if !meta.ends_with(";base64") {
        return None;
    }
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    match reader.into_dimensions() {
        Ok((width, height)) => Some(NaturalSize { width, height }),
        Err(err) => {
            debug!(%err, "could not read embedded image dimensions");
            None
        }
    }
}

fn pixel_attr(tree: &DomTree, img: NodeId, name: &str) -> u32 {
    tree.attr(img, name)
        .map(|v| v.trim().trim_end_matches("px"))
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u32)
        .unwrap_or(0)
}

/// Natural size of `img`: decoded from an embedded source when possible,
/// otherwise taken from its `width`/`height` attributes.
pub fn natural_size(tree: &DomTree, img: NodeId) -> NaturalSize {
    tree.attr(img, "src")
        .and_then(data_uri_dimensions)
        .unwrap_or_else(|| NaturalSize {
            width: pixel_attr(tree, img, "width"),
            height: pixel_attr(tree, img, "height"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG.
    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    #[test]
    fn test_data_uri_dimensions() {
        assert_eq!(
            data_uri_dimensions(PIXEL),
            Some(NaturalSize { width: 1, height: 1 })
        );
        assert_eq!(data_uri_dimensions("https://example.com/a.png"), None);
        assert_eq!(data_uri_dimensions("data:image/png;base64,!!!"), None);
    }

    #[test]
    fn test_falls_back_to_attributes() {
        let tree = DomTree::parse(r#"<img src="a.png" width="300" height="200px">"#);
        let img = tree
            .elements()
            .into_iter()
            .find(|n| tree.tag_name(*n) == Some("img"))
            .unwrap();
        let size = natural_size(&tree, img);
        assert_eq!((size.width, size.height), (300, 200));
        assert_eq!(size.aspect_ratio(), 1.5);
        assert_eq!(NaturalSize { width: 5, height: 0 }.aspect_ratio(), 0.0);
    }
}
