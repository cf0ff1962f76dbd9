//! Static assets: the institutional logo.
//!
//! Assets live under a single configured root (config file or the
//! `CONTROL_REPORT_ASSET_ROOT` environment variable). A missing logo is not an
//! error; the header is drawn without it.

use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use crate::config::AssetConfig;
use crate::error::{Error, Result};

/// Outcome of looking up an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLookup {
    /// No asset root is configured
    NotConfigured,
    /// The root is configured but the file does not exist
    Missing(PathBuf),
    Found(PathBuf),
}

/// Resolves asset files under the configured root.
#[derive(Debug, Clone)]
pub struct AssetLocator {
    root: Option<PathBuf>,
    logo_file: String,
}

impl AssetLocator {
    pub fn new(config: &AssetConfig) -> Self {
        Self {
            root: config.root.clone(),
            logo_file: config.logo_file.clone(),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Look up the logo file.
    pub fn locate_logo(&self) -> AssetLookup {
        let Some(root) = &self.root else {
            return AssetLookup::NotConfigured;
        };
        let path = root.join(&self.logo_file);
        if path.is_file() {
            AssetLookup::Found(path)
        } else {
            AssetLookup::Missing(path)
        }
    }

    /// Look up and decode the logo. Problems are logged and yield `None`.
    pub fn load_logo(&self) -> Option<LogoImage> {
        match self.locate_logo() {
            AssetLookup::NotConfigured => {
                debug!("No asset root configured, header without logo");
                None
            }
            AssetLookup::Missing(path) => {
                warn!("Logo not found at {}, header without logo", path.display());
                None
            }
            AssetLookup::Found(path) => match LogoImage::from_path(&path) {
                Ok(logo) => {
                    debug!(
                        width = logo.width,
                        height = logo.height,
                        "Loaded logo from {}",
                        path.display()
                    );
                    Some(logo)
                }
                Err(e) => {
                    warn!("{e}, header without logo");
                    None
                }
            },
        }
    }
}

/// A decoded raster logo, ready to embed as an image XObject.
#[derive(Clone, PartialEq, Eq)]
pub struct LogoImage {
    pub width: u32,
    pub height: u32,
    /// 8-bit RGB samples, row major
    rgb: Vec<u8>,
    /// 8-bit alpha samples when the image is not fully opaque
    alpha: Option<Vec<u8>>,
}

impl LogoImage {
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::AssetDecode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::decode(&bytes).map_err(|reason| Error::AssetDecode {
            path: path.display().to_string(),
            reason,
        })
    }

    /// Decode any format the `image` crate recognises.
    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, String> {
        let decoded = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err("image has no pixels".to_string());
        }

        let pixels = rgba.as_raw().len() / 4;
        let mut rgb = Vec::with_capacity(pixels * 3);
        let mut alpha = Vec::with_capacity(pixels);
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            rgb.extend_from_slice(&[r, g, b]);
            alpha.push(a);
        }
        let alpha = alpha.iter().any(|a| *a != u8::MAX).then_some(alpha);

        Ok(Self {
            width,
            height,
            rgb,
            alpha,
        })
    }

    pub const fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    /// Add the image (and its soft mask) to a document.
    pub(crate) fn embed(&self, doc: &mut Document) -> ObjectId {
        let mut dict = self.image_dictionary(b"DeviceRGB");
        if let Some(alpha) = &self.alpha {
            let mask = Stream::new(self.image_dictionary(b"DeviceGray"), alpha.clone());
            let mask_id = doc.add_object(mask);
            dict.set("SMask", Object::Reference(mask_id));
        }
        doc.add_object(Stream::new(dict, self.rgb.clone()))
    }

    fn image_dictionary(&self, color_space: &[u8]) -> Dictionary {
        Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(i64::from(self.width))),
            ("Height", Object::Integer(i64::from(self.height))),
            ("ColorSpace", Object::Name(color_space.to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
        ])
    }
}

impl std::fmt::Debug for LogoImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogoImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("has_alpha", &self.has_alpha())
            .finish_non_exhaustive()
    }
}
