pub mod reference;
pub mod session;
pub mod user;

pub use reference::{Entity, ObjectId, Reference, ReferenceResolver};
pub use session::{Session, SessionInfo, UserResolver};
pub use user::{AuthResponse, LoginInput, RegisterInput, User, UserProfile};
