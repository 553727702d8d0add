/// Router Module Index
///
/// Splits the HTTP surface by the access check each route needs, so the check
/// is applied as a layer on the whole group and never forgotten in a handler.

/// Routes open to anonymous clients.
pub mod public;

/// Routes that need a valid session but no particular permission.
pub mod authenticated;

/// Routes gated by a named permission through `role_gate`.
pub mod admin;
