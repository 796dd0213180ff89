use axum::{
    body::Body,
    extract::Path,
    http::header,
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

use crate::{media, State};

use super::RouteError;

pub(crate) async fn serve_media(
    state: State,
    Path(image): Path<String>,
) -> Result<Response, RouteError> {
    let path = state.media.resolve(&image).ok_or(RouteError::NotFound)?;

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => (),
        Ok(_) => return Err(RouteError::NotFound),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // Placeholders are built in unless the media root overrides them
            return match media::embedded_placeholder(&image) {
                Some(svg) => Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()),
                None => Err(RouteError::NotFound),
            };
        }
        Err(e) => return Err(e.into()),
    }

    let file = tokio::fs::File::open(&path).await?;

    Ok((
        [(header::CONTENT_TYPE, media::content_type(&path))],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
