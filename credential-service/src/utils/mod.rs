pub mod secrets;
pub mod validation;

pub use secrets::{generate_client_id, generate_client_secret, generate_session_token, mask};
pub use validation::ValidatedJson;
