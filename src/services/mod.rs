pub mod co2;
pub mod matching;
pub mod rides;
pub mod study;
pub mod sync;
