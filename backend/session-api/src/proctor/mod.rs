pub mod controller;
pub mod lockdown;
pub mod monitor;
pub mod signals;
pub mod state;
