pub mod animals;
pub mod rand_ride_input_format;
pub mod taxi_ride;
