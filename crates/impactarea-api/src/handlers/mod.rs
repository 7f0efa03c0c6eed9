mod health;
mod impact;

pub use health::health_check;
pub use impact::{impacted_area_from_map_reference, impacted_area_from_stac};
