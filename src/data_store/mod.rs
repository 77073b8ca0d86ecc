/// The shared cell behind a `TVar`: committed value, commit lock and waiters.
pub(crate) mod var_cell;
/// Committed values tagged with the version they were installed at.
pub(crate) mod versioned_value;
