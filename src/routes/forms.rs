use std::collections::{BTreeMap, HashMap};

use axum::extract::{multipart::MultipartError, DefaultBodyLimit, Multipart};
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::media::{check_upload_size, MEGABYTE};

pub(crate) type FieldErrors = BTreeMap<&'static str, String>;

/// Name of the file input on every form that uploads a picture.
const IMAGE_FIELD: &str = "image";

/// Requests may be this many times larger than the image limit. Anything in
/// between is drained so the form can report the size error.
const BODY_LIMIT_FACTOR: usize = 10;

pub(crate) const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// `datetime-local` inputs submit minutes, some browsers add seconds.
const POSTED_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];
pub(crate) const POSTED_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

pub(crate) fn upload_body_limit(max_upload_mb: u32) -> DefaultBodyLimit {
    let image_limit = max_upload_mb as usize * MEGABYTE;
    DefaultBodyLimit::max(image_limit.saturating_mul(BODY_LIMIT_FACTOR) + MEGABYTE)
}

/// An uploaded picture. Files over the size limit are not kept in memory, only
/// their size is.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Upload {
    Image(Vec<u8>),
    TooLarge(usize),
}

impl Upload {
    fn len(&self) -> usize {
        match self {
            Upload::Image(data) => data.len(),
            Upload::TooLarge(len) => *len,
        }
    }

    pub fn into_image(self) -> Option<Vec<u8>> {
        match self {
            Upload::Image(data) => Some(data),
            Upload::TooLarge(_) => None,
        }
    }
}

struct RawForm {
    fields: HashMap<String, String>,
    image: Option<Upload>,
}

impl RawForm {
    async fn read(mut multipart: Multipart, max_upload_mb: u32) -> Result<Self, MultipartError> {
        let max_bytes = max_upload_mb as usize * MEGABYTE;
        let mut fields = HashMap::new();
        let mut image = None;

        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            if name == IMAGE_FIELD {
                // Browsers send an empty part when no file was chosen
                let chosen = field.file_name().is_some_and(|f| !f.is_empty());

                let mut len = 0;
                let mut data = Some(Vec::new());
                while let Some(chunk) = field.chunk().await? {
                    len += chunk.len();
                    if len > max_bytes {
                        data = None;
                    } else if let Some(data) = data.as_mut() {
                        data.extend_from_slice(&chunk);
                    }
                }

                if chosen && len > 0 {
                    image = Some(match data {
                        Some(data) => Upload::Image(data),
                        None => Upload::TooLarge(len),
                    });
                }
            } else {
                fields.insert(name, field.text().await?);
            }
        }

        Ok(Self { fields, image })
    }

    fn take(&mut self, name: &str) -> String {
        self.fields
            .remove(name)
            .map(|v| v.trim().to_owned())
            .unwrap_or_default()
    }
}

fn check_required(errors: &mut FieldErrors, field: &'static str, value: &str, max_len: usize) {
    if value.is_empty() {
        errors.insert(field, "This field is required.".into());
    } else {
        let len = value.chars().count();
        if len > max_len {
            errors.insert(
                field,
                format!("Ensure this value has at most {max_len} characters (it has {len})."),
            );
        }
    }
}

fn check_image(errors: &mut FieldErrors, image: Option<&Upload>, max_upload_mb: u32) {
    if let Some(image) = image {
        if let Err(e) = check_upload_size(image.len(), max_upload_mb) {
            errors.insert(IMAGE_FIELD, e);
        }
    }
}

fn parse_posted(value: &str) -> Option<DateTime<Utc>> {
    POSTED_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|posted| posted.and_utc())
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct BookFields {
    pub title: String,
    pub author: String,
    pub language: String,
    pub genre: String,
    pub description: String,
    /// Optional override of the posting date, as typed in the form.
    pub posted: String,
}

impl BookFields {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_required(&mut errors, "title", &self.title, 255);
        check_required(&mut errors, "author", &self.author, 255);
        check_required(&mut errors, "language", &self.language, 100);
        check_required(&mut errors, "genre", &self.genre, 50);
        check_required(&mut errors, "description", &self.description, usize::MAX);
        if !self.posted.is_empty() && parse_posted(&self.posted).is_none() {
            errors.insert("posted", "Enter a valid date/time.".into());
        }
        errors
    }

    /// The posting date, if one was given. Only meaningful once validated.
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        parse_posted(&self.posted)
    }
}

pub(crate) struct BookSubmission {
    pub fields: BookFields,
    pub image: Option<Upload>,
}

impl BookSubmission {
    pub async fn read(multipart: Multipart, max_upload_mb: u32) -> Result<Self, MultipartError> {
        let mut raw = RawForm::read(multipart, max_upload_mb).await?;

        Ok(Self {
            fields: BookFields {
                title: raw.take("title"),
                author: raw.take("author"),
                language: raw.take("language"),
                genre: raw.take("genre"),
                description: raw.take("description"),
                posted: raw.take("posted"),
            },
            image: raw.image,
        })
    }

    pub fn validate(&self, max_upload_mb: u32) -> FieldErrors {
        let mut errors = self.fields.validate();
        check_image(&mut errors, self.image.as_ref(), max_upload_mb);
        errors
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProfileFields {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

fn is_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
}

impl ProfileFields {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        check_required(&mut errors, "email", &self.email, 254);
        if !errors.contains_key("email") && !is_email(&self.email) {
            errors.insert("email", "Enter a valid email address.".into());
        }

        if self.first_name.chars().count() > 150 {
            errors.insert("first_name", "Ensure this value has at most 150 characters.".into());
        }
        if self.last_name.chars().count() > 150 {
            errors.insert("last_name", "Ensure this value has at most 150 characters.".into());
        }

        errors
    }
}

pub(crate) struct ProfileSubmission {
    pub fields: ProfileFields,
    pub image: Option<Upload>,
}

impl ProfileSubmission {
    pub async fn read(multipart: Multipart, max_upload_mb: u32) -> Result<Self, MultipartError> {
        let mut raw = RawForm::read(multipart, max_upload_mb).await?;

        Ok(Self {
            fields: ProfileFields {
                email: raw.take("email"),
                first_name: raw.take("first_name"),
                last_name: raw.take("last_name"),
            },
            image: raw.image,
        })
    }

    pub fn validate(&self, max_upload_mb: u32) -> FieldErrors {
        let mut errors = self.fields.validate();
        check_image(&mut errors, self.image.as_ref(), max_upload_mb);
        errors
    }
}
