//! Built-in arenas
//!
//! - Balance: tilt a board to keep two balls on it
//! - Parking: drive a car into a parking bay
//! - Pellet: collect scattered pellets without touching the walls
//! - Chase: a cat and a mouse sharing one arena

pub mod balance;
pub mod chase;
pub mod parking;
pub mod pellet;

// Re-export main types for convenience
pub use balance::{BalanceBoard, BalanceConfig, BalanceEnv};
pub use chase::{Cat, ChaseBodies, ChaseConfig, ChaseEnv, ChaseObservation, ChaseStep, Mouse, Role};
pub use parking::{ParkingBodies, ParkingConfig, ParkingEnv, ParkingLot};
pub use pellet::{PelletConfig, PelletEnv, PelletGrabber};
