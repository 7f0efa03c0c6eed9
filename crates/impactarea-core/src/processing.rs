pub mod dates;
pub mod impact;
pub mod indices;

pub use dates::{find_nearest_dates, select_observation_pair, NearestDates, ObservationPair};
pub use impact::{compute_impact, pixel_difference};
pub use indices::{compute_index, SpectralBands};
