//! HTTP API handlers for shelf-enrich

pub mod books;
pub mod enrich;
pub mod health;
pub mod images;
pub mod locations;
pub mod sse;

pub use books::book_routes;
pub use enrich::enrich_routes;
pub use health::health_routes;
pub use images::image_routes;
pub use locations::location_routes;
pub use sse::enrichment_event_stream;
