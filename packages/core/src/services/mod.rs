pub mod mock;
pub mod openweather;
pub mod waqi;
