// UI module - terminal front end
//
// This module contains:
// - input: line parsing into AppMessages
// - render: ASCII boards and the step-by-step search observer
// - GameController: applies messages to the session through StateManager
// - EventLoopBridge: stdin task + timer ticks feeding the controller

pub mod bridge;
pub mod controller;
pub mod input;
pub mod render;

pub use bridge::{EventLoopBridge, EventLoopBridgeHandle, spawn_state_logger};
pub use controller::{Demo, Flow, GameController};
pub use input::{AppMessage, InputError, InputParser};
