use std::convert::Infallible;

use axum::{body::Body, extract::State, http::header, response::IntoResponse};
use bytes::{BufMut, Bytes, BytesMut};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};
use tracing::{debug, instrument};

use crate::state::AppState;

/// Live camera feed as an endless multipart stream. The body ends only
/// when the client goes away; a silent camera just means no parts for a
/// while.
#[instrument(skip_all)]
pub async fn video_feed(State(state): State<AppState>) -> impl IntoResponse {
    let frames = BroadcastStream::new(state.relay.subscribe()).filter_map(|item| match item {
        Ok(jpeg) => Some(Ok::<Bytes, Infallible>(multipart_chunk(&jpeg))),
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            debug!(missed, "viewer lagging; frames skipped");
            None
        }
    });

    (
        [(
            header::CONTENT_TYPE,
            "multipart/x-mixed-replace; boundary=frame",
        )],
        Body::from_stream(frames),
    )
}

fn multipart_chunk(jpeg: &Bytes) -> Bytes {
    let mut part = BytesMut::with_capacity(jpeg.len() + 96);
    part.put_slice(b"--frame\r\nContent-Type: image/jpeg\r\n");
    part.put_slice(format!("Content-Length: {}\r\n\r\n", jpeg.len()).as_bytes());
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_carry_boundary_content_type_and_payload() {
        let jpeg = Bytes::from_static(&[0xFF, 0xD8, 0x00, 0xFF, 0xD9]);
        let part = multipart_chunk(&jpeg);

        let text = String::from_utf8_lossy(&part);
        assert!(text.starts_with("--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 5\r\n\r\n"));
        assert!(part.ends_with(b"\xFF\xD9\r\n"));
    }
}
