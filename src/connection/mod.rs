//! Connection provider: turns a named profile into an authenticated
//! platform context.

mod profile;
mod provider;
mod snow;

pub use profile::{AuthMethod, ConnectionProfile, ProfileError, ProfileStore};
pub use provider::{ConnectError, ConnectionProvider};
pub use snow::{Connection, PlatformError};
