pub mod action;
pub mod engine;
pub mod history;
pub mod loop_control;
pub mod parser;
pub mod repeat_guard;
pub mod session;
pub mod state;
