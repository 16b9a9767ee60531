pub mod area_key;
pub mod radio;
pub mod station_set;

pub use area_key::AreaKey;
pub use radio::Radio;
pub use station_set::StationSet;
