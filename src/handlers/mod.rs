pub mod admin_handlers;
pub mod batch_handlers;
pub mod health_handlers;
pub mod transfer_handlers;
