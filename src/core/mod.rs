// Domain-layer modules and shared errors/models
pub mod aggregation {
    pub use crate::aggregation::*;
}

pub mod comparison {
    pub use crate::comparison::*;
}

pub mod enrichment {
    pub use crate::enrichment::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod services {
    pub use crate::services::*;
}

pub mod errors {
    pub use crate::errors::*;
}
