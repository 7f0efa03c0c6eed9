mod impact;

pub use impact::ImpactService;
