pub mod credential;
pub mod crypto;
pub mod login;
pub mod session;
pub mod store;

pub use credential::CredentialService;
pub use crypto::SecretCipher;
pub use login::{LoginOutcome, LoginService};
pub use session::{MockSessionBackend, RedisSessionBackend, SessionBackend, SessionService};
pub use store::{InMemoryStore, MongoStore, Store};
