use super::models::{ListenRequest, ListenResponse};
use super::FirestoreError;
use crate::core::parse_error_response;
use bytes::{Buf, Bytes, BytesMut};
use futures::stream::{self, Stream};
use reqwest_middleware::ClientWithMiddleware;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A stream of `ListenResponse` messages.
///
/// The server writes the responses as the elements of one long JSON array
/// (`[{...},\n{...}`); the stream cuts that body into individual objects.
pub struct ListenStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: BytesMut,
}

impl ListenStream {
    pub fn new(inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
        }
    }
}

impl Stream for ListenStream {
    type Item = Result<ListenResponse, FirestoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // Drop array punctuation and whitespace between objects.
            let skip = self
                .buffer
                .iter()
                .take_while(|&&b| b.is_ascii_whitespace() || matches!(b, b'[' | b',' | b']'))
                .count();
            self.buffer.advance(skip);

            if let Some(len) = find_json_boundary(&self.buffer) {
                let bytes = self.buffer.split_to(len);
                return match serde_json::from_slice::<ListenResponse>(&bytes) {
                    Ok(msg) => Poll::Ready(Some(Ok(msg))),
                    Err(e) => Poll::Ready(Some(Err(FirestoreError::SerializationError(e)))),
                };
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(FirestoreError::RequestError(e))));
                }
                Poll::Ready(None) => {
                    if !self.buffer.is_empty() {
                        self.buffer.clear();
                        return Poll::Ready(Some(Err(FirestoreError::ListenError(
                            "Stream ended with incomplete JSON".into(),
                        ))));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Finds the length of the JSON object starting at the front of the buffer.
fn find_json_boundary(buf: &[u8]) -> Option<usize> {
    if buf.first() != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in buf.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// Opens `documents:listen` under `database_url` (`{api root}/projects/{p}/databases/{d}`).
pub async fn listen_request(
    client: &ClientWithMiddleware,
    database_url: &str,
    request: &ListenRequest,
) -> Result<ListenStream, FirestoreError> {
    let url = format!("{}/documents:listen", database_url);

    let response = client.post(&url).json(request).send().await?;

    if !response.status().is_success() {
        return Err(FirestoreError::ApiError(
            parse_error_response(response, "Listen failed").await,
        ));
    }

    let stream = stream::unfold(response, |mut resp| async move {
        match resp.chunk().await {
            Ok(Some(bytes)) => Some((Ok(bytes), resp)),
            Ok(None) => None,
            Err(e) => Some((Err(e), resp)),
        }
    });

    Ok(ListenStream::new(Box::pin(stream)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::models::TargetChangeType;
    use futures::StreamExt;

    fn stream_of(chunks: Vec<&'static str>) -> ListenStream {
        let inner = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, reqwest::Error>(Bytes::from_static(c.as_bytes()))),
        );
        ListenStream::new(Box::pin(inner))
    }

    #[test]
    fn test_find_json_boundary() {
        assert_eq!(find_json_boundary(br#"{"a":1}"#), Some(7));
        assert_eq!(find_json_boundary(br#"{"a":{"b":2}}"#), Some(13));
        assert_eq!(find_json_boundary(br#"{"a":1"#), None);
        assert_eq!(find_json_boundary(br#"{"a":"}"}"#), Some(9));
        assert_eq!(find_json_boundary(br#"{"a":"\"}"}"#), Some(11));
        assert_eq!(find_json_boundary(br#"{"a":[1,2]}"#), Some(11));
        assert_eq!(find_json_boundary(br#"{"a":1}{"b":2}"#), Some(7));
        assert_eq!(find_json_boundary(b"[{}]"), None);
    }

    #[tokio::test]
    async fn test_stream_splits_array_across_chunks() {
        let mut stream = stream_of(vec![
            "[{\"targetChange\": {\"targetChangeType\": \"ADD\", \"targetIds\": [1]}}\n,",
            "{\"targetChange\": {\"targetChangeType\": \"CUR",
            "RENT\", \"targetIds\": [1]}}\n]",
        ]);

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert!(stream.next().await.is_none());

        assert_eq!(first.target_change.unwrap().target_change_type, TargetChangeType::Add);
        assert_eq!(second.target_change.unwrap().target_change_type, TargetChangeType::Current);
    }

    #[tokio::test]
    async fn test_truncated_stream_is_an_error() {
        let mut stream = stream_of(vec!["[{\"targetChange\": {"]);
        assert!(matches!(
            stream.next().await,
            Some(Err(FirestoreError::ListenError(_)))
        ));
        assert!(stream.next().await.is_none());
    }
}
