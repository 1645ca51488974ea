//! Authentication Module
//! Mission: Stateless login and bearer-token gating, no server-side sessions

pub mod api;
pub mod authenticator;
pub mod error;
pub mod gate;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod user_store;

pub use api::AuthState;
pub use authenticator::Authenticator;
pub use error::{AuthError, AuthResult, TokenRejection};
pub use gate::{GateDecision, PublicRoutes, RequestGate};
pub use jwt::{Clock, JwtHandler, ManualClock, SecretKey, SystemClock, TokenConfig};
pub use middleware::auth_middleware;
pub use models::{Account, AuthenticatedIdentity, Role};
pub use password::{SecretHasher, MIN_COST};
pub use user_store::{CredentialStore, InMemoryCredentialStore, UserStore};
