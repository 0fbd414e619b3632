/// Shared DearMe types.
///
/// Plain data records for everything the service stores, the JSON shapes of
/// the HTTP API, and the typed validation that turns raw input into values
/// the rest of the workspace can trust.
pub mod api;
pub mod models;
pub mod normalize;
pub mod validation;
