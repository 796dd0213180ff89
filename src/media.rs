use std::path::{Component, Path, PathBuf};

use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};
use uuid::Uuid;

pub const BOOK_PLACEHOLDER: &str = "default_book.svg";
pub const PROFILE_PLACEHOLDER: &str = "default_profile.svg";

static BOOK_PLACEHOLDER_SVG: &str = include_str!("../assets/default_book.svg");
static PROFILE_PLACEHOLDER_SVG: &str = include_str!("../assets/default_profile.svg");

pub const MEGABYTE: usize = 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    #[error("Could not decode or encode the image")]
    Image(#[from] image::ImageError),
    #[error("Could not write the image")]
    Io(#[from] std::io::Error),
    #[error("Image processing task failed")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    BookCover,
    ProfilePicture,
}

impl MediaKind {
    fn directory(&self) -> &'static str {
        match self {
            MediaKind::BookCover => "books_pics",
            MediaKind::ProfilePicture => "profile_pics",
        }
    }

    /// Largest stored size, in pixels.
    pub fn bounds(&self) -> (u32, u32) {
        match self {
            MediaKind::BookCover => (400, 500),
            MediaKind::ProfilePicture => (300, 300),
        }
    }
}

pub fn url(image: &str) -> String {
    format!("/media/{image}")
}

pub fn is_placeholder(image: &str) -> bool {
    image == BOOK_PLACEHOLDER || image == PROFILE_PLACEHOLDER
}

pub fn embedded_placeholder(image: &str) -> Option<&'static str> {
    match image {
        BOOK_PLACEHOLDER => Some(BOOK_PLACEHOLDER_SVG),
        PROFILE_PLACEHOLDER => Some(PROFILE_PLACEHOLDER_SVG),
        _ => None,
    }
}

pub fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Checks an upload against the size limit, returning the message shown next
/// to the form field on failure.
pub fn check_upload_size(len: usize, max_mb: u32) -> Result<(), String> {
    if len > max_mb as usize * MEGABYTE {
        Err(format!("Max file size is {:.2} MB", f64::from(max_mb)))
    } else {
        Ok(())
    }
}

/// Shrinks `image` to fit in the bounds of `kind`. Smaller images are kept as
/// is.
pub fn fit(image: DynamicImage, kind: MediaKind) -> DynamicImage {
    let (max_width, max_height) = kind.bounds();
    let (width, height) = image.dimensions();

    if width <= max_width && height <= max_height {
        image
    } else {
        image.resize(max_width, max_height, FilterType::Lanczos3)
    }
}

pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Maps a stored image name to a file under the media root, refusing
    /// anything that could escape it.
    pub fn resolve(&self, image: &str) -> Option<PathBuf> {
        let relative = Path::new(image);
        let mut components = relative.components().peekable();
        components.peek()?;

        if components.all(|c| matches!(c, Component::Normal(_))) {
            Some(self.root.join(relative))
        } else {
            None
        }
    }

    /// Decodes, resizes and stores an uploaded image, returning its name
    /// relative to the media root.
    pub async fn save(&self, kind: MediaKind, data: Vec<u8>) -> Result<String, MediaError> {
        let name = format!("{}/{}.jpg", kind.directory(), Uuid::new_v4());
        let path = self.root.join(&name);

        tokio::task::spawn_blocking(move || -> Result<(), MediaError> {
            let image = image::load_from_memory(&data)?;
            let image = DynamicImage::ImageRgb8(fit(image, kind).into_rgb8());

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            image.save_with_format(&path, ImageFormat::Jpeg)?;
            Ok(())
        })
        .await??;

        tracing::debug!("Stored image '{name}'");

        Ok(name)
    }

    /// Deletes a stored image. Placeholders and already missing files are
    /// ignored.
    pub async fn remove(&self, image: &str) -> Result<(), MediaError> {
        if is_placeholder(image) {
            return Ok(());
        }

        let Some(path) = self.resolve(image) else {
            tracing::warn!("Refusing to remove '{image}' outside of the media root");
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Removed image '{image}'");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
