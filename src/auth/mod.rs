pub mod credential;
pub mod login;
pub mod logout;
pub mod oauth_server;
pub mod provider;
pub mod session;
pub mod state;

pub use credential::{Credential, CredentialStore};
pub use login::{BrowserLauncher, LoginOrchestrator, SystemBrowser};
pub use logout::{LogoutOrchestrator, LogoutOutcome};
pub use oauth_server::{CallbackHandler, CallbackServer, Completion};
pub use provider::ProviderClient;
pub use session::{Session, SessionValidator};
pub use state::generate_state;
