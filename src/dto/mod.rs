pub mod game;
pub mod health;
pub mod level;
pub mod player;
pub mod results;
pub mod sse;
pub mod validation;
