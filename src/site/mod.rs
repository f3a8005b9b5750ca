pub mod handlers;
pub mod routes;

pub use handlers::{SiteError, SiteState};
pub use routes::create_site_router;
