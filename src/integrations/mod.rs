//! External service integrations.

pub mod identity_client {
    pub use crate::identity_client::*;
}

pub mod llm_client {
    pub use crate::llm_client::*;
}
