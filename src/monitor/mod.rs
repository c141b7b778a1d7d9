mod changes;
mod schedule;
mod service;

pub use service::{Monitor, MonitorCycle, MonitorRequest, MonitorStatus};
