//! Auth Center (spec.md §4.8): token storage, device-flow login, proactive
//! refresh, and maintenance mode for provider authentication.

mod center;
mod device_flow;
mod error;
mod token;

pub use center::{AuthCenter, AuthHeader};
pub use device_flow::{DeviceAuthorization, DeviceFlowClient, Pkce};
pub use error::AuthError;
pub use token::{TokenBundle, TokenStore};
