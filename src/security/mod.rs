pub mod authn;
pub mod authorization;
pub mod digest;
pub mod signature;
pub mod validate;
