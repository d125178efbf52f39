pub mod ack;
pub mod branch;
pub mod history;
pub mod intent;
pub mod notification;
pub mod options;
pub mod timer;
