use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

/// A fixed-sized HTTP body based on a single input buffer.
#[derive(Clone, Debug)]
pub struct FixedBody {
    data: Option<Bytes>,
}

impl FixedBody {
    /// Create a new `FixedBody` from the given data.
    pub fn new<D: Into<Bytes>>(data: D) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}

impl Body for FixedBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(self.get_mut().data.take().map(|data| Ok(Frame::data(data))))
    }

    fn is_end_stream(&self) -> bool {
        self.data.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.data.as_ref().map_or(0, |data| data.len() as u64))
    }
}
