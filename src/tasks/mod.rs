//! Background periodic tasks for the monitor.

pub mod sweeper;
