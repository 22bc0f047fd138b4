//! Background loops driving the fuel engine.

pub mod notification_loop;
