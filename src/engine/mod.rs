pub mod policy;
pub mod upkeep;

pub use policy::UpkeepPolicy;
pub use upkeep::UpkeepEngine;
