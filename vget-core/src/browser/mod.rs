mod capture;
mod error;
mod session;

pub use capture::{StreamCapture, StreamCollector};
pub use error::{BrowserError, BrowserResult};
pub use session::BrowserSession;
