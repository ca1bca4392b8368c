pub mod blob;
pub mod bucket;
pub mod granularity;
pub mod merged;
pub mod observation;
pub mod parameter;
pub mod station;
