pub mod credential;
pub mod organization;
pub mod session;
pub mod user;

pub use credential::Credential;
pub use organization::Organization;
pub use session::SessionData;
pub use user::User;
