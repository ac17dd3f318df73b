/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `workflow`: Workflow intent execution
/// - `inbox`: Inbox reads, mark-read, and the live SSE stream
pub mod health;
pub mod inbox;
pub mod workflow;
