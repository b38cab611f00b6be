//! API routes.

pub mod browser;
pub mod device;
pub mod health;
pub mod starred;

pub use browser::{CallbackResponse, RejectionResponse, callback_handler, login_browser_handler};
pub use device::{DeviceLoginResponse, login_cli_handler};
pub use health::{RootResponse, health_routes};
pub use starred::starred_handler;
