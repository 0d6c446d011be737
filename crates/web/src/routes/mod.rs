pub mod alerts;
pub mod departures;
pub mod health;
pub mod stations;
