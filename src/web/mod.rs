pub mod auth;
pub mod flash;
pub mod landing;
pub mod receipts;
pub mod responses;
pub mod results;
pub mod router;
pub mod state;
pub mod status;
pub mod templates;
#[cfg(test)]
pub mod testing;
pub mod upload_ui;
pub mod uploads;
pub mod workspace;

pub use responses::{ApiMessage, json_error};
pub use state::AppState;
pub use templates::escape_html;
