pub mod paginator;
pub mod session;
pub mod web;

#[cfg(test)]
mod tests;

pub use paginator::{
    PageEvent, Paginator, TraversalState, crawl, crawl_scoped, crawl_site, stream_pages,
};
pub use session::PageSession;
pub use web::WebDriverSession;
