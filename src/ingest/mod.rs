//! Ingestion: upload-notification parsing, object streaming, and feed
//! routing.

mod event_parser;
mod object_reader;
mod stream_router;

pub use event_parser::parse_upload_event;
pub use object_reader::{LineStream, ObjectBody, ObjectReader, ObjectStore};
pub use stream_router::{
    CanonicalFeedProcessor, FeedProcessor, LegacyFeedProcessor, StreamRouter,
};
